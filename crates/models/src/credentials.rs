use serde::{Deserialize, Serialize};
use std::fmt;

/// Severity classifies rendered alerts for routing. Alert rules are
/// expected to carry a `severity` label with one of these values.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    #[serde(rename = "CRITICAL")]
    Critical,
    #[serde(rename = "WARNING")]
    Warning,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "CRITICAL",
            Severity::Warning => "WARNING",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Severity {
    type Err = crate::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "CRITICAL" => Ok(Severity::Critical),
            "WARNING" => Ok(Severity::Warning),
            _ => Err(crate::Error::InvalidSeverity {
                value: s.to_string(),
            }),
        }
    }
}

/// SlackChannel is a Slack destination plus the identity used to post
/// there.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SlackChannel {
    pub channel: String,
    /// Incoming-webhook URL of the channel's workspace.
    pub webhook: String,
    /// Username notifications are posted as.
    #[serde(default)]
    pub username: String,
}

impl SlackChannel {
    /// Discard this channel when no webhook is configured, since no
    /// receiver can be built without one.
    pub fn normalized(self) -> Option<SlackChannel> {
        if self.webhook.trim().is_empty() {
            None
        } else {
            Some(self)
        }
    }
}

/// TeamCredential is the complete notification identity of one team
/// within a tenant. Absent fields mean the matching receiver is not
/// rendered for this team.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct TeamCredential {
    pub tenant: String,
    pub team: String,
    /// PagerDuty service key for paging on critical production alerts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pagerduty_key: Option<String>,
    /// Channel receiving CRITICAL notifications.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slack_critical: Option<SlackChannel>,
    /// Channel receiving WARNING notifications.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slack_warning: Option<SlackChannel>,
}

impl TeamCredential {
    pub fn validate(&self) -> Result<(), crate::Error> {
        crate::validate_token("tenant", &self.tenant)?;
        crate::validate_token("team", &self.team)?;
        Ok(())
    }

    /// Map empty-string members into explicit absences.
    pub fn normalized(self) -> Self {
        let TeamCredential {
            tenant,
            team,
            pagerduty_key,
            slack_critical,
            slack_warning,
        } = self;

        TeamCredential {
            tenant,
            team,
            pagerduty_key: pagerduty_key.filter(|key| !key.trim().is_empty()),
            slack_critical: slack_critical.and_then(SlackChannel::normalized),
            slack_warning: slack_warning.and_then(SlackChannel::normalized),
        }
    }
}
