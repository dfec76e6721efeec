//! Clients of the remote systems this service feeds: the rule engine
//! which evaluates alert rules, and the routing daemon which groups and
//! delivers notifications. Both expose Cortex-style HTTP APIs scoped by
//! a tenant header, and both receive only full replacements.

mod http;

pub use http::{HttpRoutingDaemon, HttpRuleEngine};

use models::{RoutingDocument, RuleGroupDocument};

/// Header carrying the tenant scope of every remote call.
pub const TENANT_HEADER: &str = "X-Scope-OrgID";

#[must_use]
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("the remote doesn't know this resource")]
    NotFound,
    #[error("remote returned status {status}: {detail}")]
    Status { status: u16, detail: String },
    #[error("remote address {address:?} is not a valid base URL")]
    Address {
        address: String,
        #[source]
        source: url::ParseError,
    },
    #[error("encoding document for the remote")]
    Encode(#[from] serde_yaml::Error),
    #[error(transparent)]
    Request(#[from] reqwest::Error),
}

impl Error {
    /// Whether the remote reported the acted-on resource as absent.
    /// Deletions treat this as success; creations never do.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound)
    }
}

/// RuleEngine evaluates tenant-scoped groups of alert rules. A group is
/// created and replaced as a unit, keyed by (tenant, namespace, group).
#[async_trait::async_trait]
pub trait RuleEngine: Send + Sync {
    /// Create the document's rule group, or replace it wholesale if it
    /// already exists.
    async fn create_rule_group(&self, doc: &RuleGroupDocument) -> Result<(), Error>;
    /// Remove a rule group outright.
    async fn delete_rule_group(
        &self,
        tenant: &str,
        namespace: &str,
        group: &str,
    ) -> Result<(), Error>;
}

/// RoutingDaemon owns notification routing and delivery for a tenant.
/// A push replaces the tenant's entire routing state.
#[async_trait::async_trait]
pub trait RoutingDaemon: Send + Sync {
    async fn push_config(&self, doc: &RoutingDocument) -> Result<(), Error>;
}

#[async_trait::async_trait]
impl<T: RuleEngine> RuleEngine for std::sync::Arc<T> {
    async fn create_rule_group(&self, doc: &RuleGroupDocument) -> Result<(), Error> {
        (**self).create_rule_group(doc).await
    }
    async fn delete_rule_group(
        &self,
        tenant: &str,
        namespace: &str,
        group: &str,
    ) -> Result<(), Error> {
        (**self).delete_rule_group(tenant, namespace, group).await
    }
}

#[async_trait::async_trait]
impl<T: RoutingDaemon> RoutingDaemon for std::sync::Arc<T> {
    async fn push_config(&self, doc: &RoutingDocument) -> Result<(), Error> {
        (**self).push_config(doc).await
    }
}
