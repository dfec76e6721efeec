//! Assembly of the documents pushed to remote collaborators: rule-group
//! documents for the rule engine, and per-tenant routing documents for
//! the notification daemon. Assembly is pure: stored records in, typed
//! documents out, no I/O.

mod routing;
mod rules;

pub use routing::{routing_config, HELPER_TEMPLATE, HELPER_TEMPLATE_NAME};
pub use rules::rule_group;

#[must_use]
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("rule {rule} references template {template}, which is not stored")]
    TemplateNotFound { rule: String, template: String },
    #[error("merging variables of rule {rule}")]
    Merge {
        rule: String,
        #[source]
        source: template::Error,
    },
    #[error("rendering rule {rule} through template {template}")]
    Render {
        rule: String,
        template: String,
        #[source]
        source: template::Error,
    },
    #[error("rule {rule} rendered into invalid alert-rule YAML")]
    Fragment {
        rule: String,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("alert {alert} is produced by both rule {lhs} and rule {rhs}")]
    DuplicateAlert {
        alert: String,
        lhs: String,
        rhs: String,
    },
}
