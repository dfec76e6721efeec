use crate::{Error, RoutingDaemon, RuleEngine, TENANT_HEADER};
use models::{AlertRuleNode, RoutingDocument, RuleGroupDocument};
use serde::Serialize;
use std::collections::BTreeMap;
use std::time::Duration;

const YAML_CONTENT_TYPE: &str = "application/yaml";

/// Wire form of a rule group: the engine keys it by `name` within the
/// posted namespace, and by path segment on delete.
#[derive(Serialize)]
struct RuleGroupBody<'a> {
    name: &'a str,
    rules: &'a [AlertRuleNode],
}

/// Wire envelope of a routing push: the daemon takes the rendered
/// configuration as one embedded YAML string, with its notification
/// template files alongside.
#[derive(Serialize)]
struct RoutingEnvelope<'a> {
    template_files: &'a BTreeMap<String, String>,
    alertmanager_config: String,
}

/// Rule engine client speaking the Cortex ruler API.
pub struct HttpRuleEngine {
    base: String,
    client: reqwest::Client,
}

impl HttpRuleEngine {
    pub fn new(address: &str, timeout: Duration) -> Result<Self, Error> {
        Ok(Self {
            base: parse_base(address)?,
            client: http_client(timeout)?,
        })
    }
}

#[async_trait::async_trait]
impl RuleEngine for HttpRuleEngine {
    async fn create_rule_group(&self, doc: &RuleGroupDocument) -> Result<(), Error> {
        let body = serde_yaml::to_string(&RuleGroupBody {
            name: &doc.group,
            rules: &doc.nodes,
        })?;
        let url = format!("{}/api/v1/rules/{}", self.base, doc.namespace);
        tracing::debug!(%url, tenant = %doc.tenant, group = %doc.group, "posting rule group");

        send(self
            .client
            .post(url)
            .header(TENANT_HEADER, &doc.tenant)
            .header(reqwest::header::CONTENT_TYPE, YAML_CONTENT_TYPE)
            .body(body))
        .await
    }

    async fn delete_rule_group(
        &self,
        tenant: &str,
        namespace: &str,
        group: &str,
    ) -> Result<(), Error> {
        let url = format!("{}/api/v1/rules/{namespace}/{group}", self.base);
        tracing::debug!(%url, %tenant, "deleting rule group");

        send(self.client.delete(url).header(TENANT_HEADER, tenant)).await
    }
}

/// Routing daemon client speaking the Cortex alertmanager-config API.
pub struct HttpRoutingDaemon {
    base: String,
    client: reqwest::Client,
}

impl HttpRoutingDaemon {
    pub fn new(address: &str, timeout: Duration) -> Result<Self, Error> {
        Ok(Self {
            base: parse_base(address)?,
            client: http_client(timeout)?,
        })
    }
}

#[async_trait::async_trait]
impl RoutingDaemon for HttpRoutingDaemon {
    async fn push_config(&self, doc: &RoutingDocument) -> Result<(), Error> {
        let envelope = serde_yaml::to_string(&RoutingEnvelope {
            template_files: &doc.template_files,
            alertmanager_config: serde_yaml::to_string(&doc.config)?,
        })?;
        let url = format!("{}/api/v1/alerts", self.base);
        tracing::debug!(%url, tenant = %doc.tenant, "posting routing configuration");

        send(self
            .client
            .post(url)
            .header(TENANT_HEADER, &doc.tenant)
            .header(reqwest::header::CONTENT_TYPE, YAML_CONTENT_TYPE)
            .body(envelope))
        .await
    }
}

fn parse_base(address: &str) -> Result<String, Error> {
    if let Err(source) = url::Url::parse(address) {
        return Err(Error::Address {
            address: address.to_string(),
            source,
        });
    }
    Ok(address.trim_end_matches('/').to_string())
}

fn http_client(timeout: Duration) -> Result<reqwest::Client, Error> {
    Ok(reqwest::Client::builder().timeout(timeout).build()?)
}

async fn send(request: reqwest::RequestBuilder) -> Result<(), Error> {
    let response = request.send().await?;
    let status = response.status();

    if status.is_success() {
        Ok(())
    } else if status == reqwest::StatusCode::NOT_FOUND {
        Err(Error::NotFound)
    } else {
        Err(Error::Status {
            status: status.as_u16(),
            detail: response.text().await.unwrap_or_default(),
        })
    }
}
