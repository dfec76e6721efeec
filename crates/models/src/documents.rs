use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// AlertRuleNode is a single alerting rule, shaped as the rule engine's
/// rule-group schema expects. Template bodies parse into lists of these.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct AlertRuleNode {
    pub alert: String,
    pub expr: String,
    /// Duration the expression must hold before the alert fires.
    #[serde(default, rename = "for", skip_serializing_if = "String::is_empty")]
    pub hold: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

/// RuleGroupDocument is the desired remote state of one rule group.
/// An empty document means the group must not exist remotely.
#[derive(Clone, Debug, PartialEq)]
pub struct RuleGroupDocument {
    pub tenant: String,
    pub namespace: String,
    pub group: String,
    pub nodes: Vec<AlertRuleNode>,
}

impl RuleGroupDocument {
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

/// RoutingDocument is the complete notification-routing state of one
/// tenant, pushed wholesale to the routing daemon.
#[derive(Clone, Debug, PartialEq)]
pub struct RoutingDocument {
    pub tenant: String,
    pub config: RoutingConfig,
    /// Notification templates shipped alongside the configuration,
    /// keyed by file name.
    pub template_files: BTreeMap<String, String>,
}

/// RoutingConfig is the subset of Alertmanager configuration this service
/// manages. It serializes directly into the daemon's expected YAML.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct RoutingConfig {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub templates: Vec<String>,
    pub global: GlobalConfig,
    pub receivers: Vec<Receiver>,
    pub route: Route,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct GlobalConfig {
    /// How long the daemon waits before declaring a silent alert resolved.
    pub resolve_timeout: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct Receiver {
    pub name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub slack_configs: Vec<SlackConfig>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub pagerduty_configs: Vec<PagerdutyConfig>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SlackConfig {
    pub channel: String,
    /// Incoming-webhook URL notifications are posted through.
    pub api_url: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub icon_emoji: String,
    pub link_names: bool,
    pub send_resolved: bool,
    /// Attachment fields, evaluated by the daemon against its own
    /// notification templates at delivery time.
    pub color: String,
    pub pretext: String,
    pub text: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<SlackAction>,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct SlackAction {
    #[serde(rename = "type")]
    pub type_: String,
    pub text: String,
    pub url: String,
}

#[derive(Serialize, Deserialize, Clone, Debug, PartialEq)]
pub struct PagerdutyConfig {
    pub service_key: String,
}

/// Route is one node of the Alertmanager routing tree.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq)]
pub struct Route {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub receiver: Option<String>,
    #[serde(default, rename = "match", skip_serializing_if = "BTreeMap::is_empty")]
    pub match_: BTreeMap<String, String>,
    /// Whether evaluation continues to later siblings after this node
    /// matches.
    #[serde(default, rename = "continue", skip_serializing_if = "crate::is_false")]
    pub continue_: bool,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub group_by: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_wait: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_interval: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repeat_interval: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub routes: Vec<Route>,
}
