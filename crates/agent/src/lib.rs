//! The agent owns the durable store of alerting configuration and keeps
//! two remote systems caught up with it: every rule change re-derives
//! and replaces the containing rule group in the rule engine, and every
//! credential change re-derives and replaces the tenant's document in
//! the routing daemon. Remote pushes happen inside the local
//! transaction, which rolls back if the push fails.

pub mod apply;
pub mod locks;
pub mod resync;
mod routing;
mod rules;
pub mod store;

#[cfg(test)]
pub(crate) mod testutil;

pub use apply::{apply, ApplyOutcome};
pub use resync::{resync, ResyncOutcome};
pub use routing::RoutingSync;
pub use rules::RuleSync;

use models::GroupKey;

#[must_use]
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] models::Error),
    #[error("template {name} is not stored")]
    TemplateNotFound { name: String },
    #[error("template {name} failed validation")]
    InvalidTemplate {
        name: String,
        #[source]
        source: template::Error,
    },
    #[error("variables of rule {name} are invalid")]
    InvalidVariables {
        name: String,
        #[source]
        source: template::Error,
    },
    #[error("building rule group {key}")]
    Compose {
        key: GroupKey,
        #[source]
        source: compose::Error,
    },
    #[error("syncing rule group {key} with the rule engine")]
    RuleSync {
        key: GroupKey,
        #[source]
        source: upstream::Error,
    },
    #[error("pushing the routing configuration of tenant {tenant}")]
    RoutingSync {
        tenant: String,
        #[source]
        source: upstream::Error,
    },
    #[error(transparent)]
    Store(#[from] sqlx::Error),
    #[error("decoding stored {what} {name}")]
    Decode {
        what: &'static str,
        name: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("reading {path:?}")]
    ReadFile {
        path: std::path::PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("parsing {path:?}")]
    ParseFile {
        path: std::path::PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("{path:?} has unsupported object type {type_:?} (expected template, rule, or credential)")]
    UnknownObjectType {
        path: std::path::PathBuf,
        type_: String,
    },
}
