mod credentials;
mod documents;
mod names;
mod rules;
mod templates;

pub use credentials::{Severity, SlackChannel, TeamCredential};
pub use documents::{
    AlertRuleNode, GlobalConfig, PagerdutyConfig, Receiver, Route, RoutingConfig,
    RoutingDocument, RuleGroupDocument, SlackAction, SlackConfig,
};
pub use names::validate_token;
pub use rules::{GroupKey, Rule, RuleDraft, RuleVariable, RULE_NAME_PREFIX};
pub use templates::{Template, VariableSpec};

#[must_use]
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("{entity} name cannot be empty")]
    NameEmpty { entity: &'static str },
    #[error("{name:?} is not a valid {entity} name (letters, numbers, '-' and '_' only)")]
    NameInvalid { entity: &'static str, name: String },
    #[error("template {name} has an empty body")]
    EmptyTemplateBody { name: String },
    #[error("{value:?} is not a severity (expected CRITICAL or WARNING)")]
    InvalidSeverity { value: String },
}

// Used with serde's skip_serializing_if annotation.
fn is_false(b: &bool) -> bool {
    !*b
}
