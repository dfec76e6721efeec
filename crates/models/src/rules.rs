use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Prefix of every alert-rule group name minted by this service.
/// It marks managed groups apart from groups created by other writers
/// sharing the same rule-engine tenant.
pub const RULE_NAME_PREFIX: &str = "klaxon_api";

/// RuleVariable binds one template variable to a concrete value.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RuleVariable {
    pub name: String,
    pub value: String,
}

/// RuleDraft is the requested state of a single rule, as accepted from
/// callers. Drafts are keyed on (tenant, namespace, group, template):
/// re-submitting a draft with that same key updates the existing rule.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RuleDraft {
    pub tenant: String,
    pub namespace: String,
    pub group: String,
    /// Name of the template this rule instantiates.
    pub template: String,
    /// Disabled rules are kept in the store but withheld from the
    /// rule engine.
    pub enabled: bool,
    /// Variable overrides, applied on top of the template's defaults.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub variables: Vec<RuleVariable>,
}

impl RuleDraft {
    pub fn validate(&self) -> Result<(), crate::Error> {
        crate::validate_token("tenant", &self.tenant)?;
        crate::validate_token("namespace", &self.namespace)?;
        crate::validate_token("group", &self.group)?;
        crate::validate_token("template", &self.template)?;
        Ok(())
    }

    /// The unique, deterministic name under which this draft is stored.
    pub fn canonical_name(&self) -> String {
        format!(
            "{RULE_NAME_PREFIX}_{}_{}_{}_{}",
            self.tenant, self.namespace, self.group, self.template
        )
    }

    pub fn group_key(&self) -> GroupKey {
        GroupKey {
            tenant: self.tenant.clone(),
            namespace: self.namespace.clone(),
            group: self.group.clone(),
        }
    }
}

/// Rule is the persisted form of a RuleDraft. Its variables hold the full
/// merged set (defaults and overrides), not just the caller's overrides.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Rule {
    pub id: i64,
    pub name: String,
    pub tenant: String,
    pub namespace: String,
    pub group: String,
    pub template: String,
    pub enabled: bool,
    pub variables: Vec<RuleVariable>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// GroupKey identifies one rule group: the unit of synchronization with
/// the rule engine.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GroupKey {
    pub tenant: String,
    pub namespace: String,
    pub group: String,
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.tenant, self.namespace, self.group)
    }
}
