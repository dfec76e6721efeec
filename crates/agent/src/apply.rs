//! Declarative application of YAML files. A file's `type` member picks
//! what it declares: a template, a file of rules, or a team credential.
//! Rules and credentials go through the full synchronizers, so applying
//! a file also replaces the affected remote state.

use crate::store;
use crate::{RoutingSync, RuleSync};
use models::{
    AlertRuleNode, RuleDraft, RuleVariable, SlackChannel, TeamCredential, Template, VariableSpec,
};
use serde::Deserialize;
use sqlx::SqlitePool;
use std::collections::BTreeMap;
use std::path::Path;
use upstream::{RoutingDaemon, RuleEngine};

/// First pass over a file: just the discriminator.
#[derive(Deserialize)]
struct Probe {
    #[serde(rename = "type", default)]
    type_: String,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct TemplateFile {
    #[serde(rename = "apiVersion", default)]
    api_version: String,
    #[serde(rename = "type")]
    type_: String,
    name: String,
    /// Alert rules with placeholders still in their string members.
    /// Parsing them up front rejects files which could never render
    /// into valid rules.
    body: Vec<AlertRuleNode>,
    #[serde(default)]
    tags: Vec<String>,
    #[serde(default)]
    variables: Vec<VariableSpec>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct RuleFile {
    #[serde(rename = "apiVersion", default)]
    api_version: String,
    #[serde(rename = "type")]
    type_: String,
    tenant: String,
    namespace: String,
    groups: BTreeMap<String, GroupEntry>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct GroupEntry {
    template: String,
    #[serde(default = "default_true")]
    enabled: bool,
    #[serde(default)]
    variables: Vec<RuleVariable>,
}

fn default_true() -> bool {
    true
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct CredentialFile {
    #[serde(rename = "apiVersion", default)]
    api_version: String,
    #[serde(rename = "type")]
    type_: String,
    tenant: String,
    team: String,
    #[serde(default)]
    pagerduty_key: Option<String>,
    #[serde(default)]
    slack_critical: Option<SlackChannel>,
    #[serde(default)]
    slack_warning: Option<SlackChannel>,
}

/// Names of the objects an apply touched.
#[derive(Debug, Default, PartialEq)]
pub struct ApplyOutcome {
    pub templates: Vec<String>,
    pub rules: Vec<String>,
    pub credentials: Vec<String>,
}

/// Apply one declarative file.
pub async fn apply<E: RuleEngine, D: RoutingDaemon>(
    pool: &SqlitePool,
    rules: &RuleSync<E>,
    routing: &RoutingSync<D>,
    path: &Path,
) -> Result<ApplyOutcome, crate::Error> {
    let raw = std::fs::read_to_string(path).map_err(|source| crate::Error::ReadFile {
        path: path.to_path_buf(),
        source,
    })?;
    let parse_err = |source| crate::Error::ParseFile {
        path: path.to_path_buf(),
        source,
    };
    let probe: Probe = serde_yaml::from_str(&raw).map_err(&parse_err)?;

    let mut outcome = ApplyOutcome::default();
    match probe.type_.to_lowercase().as_str() {
        "template" => {
            let file: TemplateFile = serde_yaml::from_str(&raw).map_err(parse_err)?;
            tracing::debug!(
                path = %path.display(),
                kind = %file.type_,
                api_version = %file.api_version,
                "applying template file"
            );

            let template = Template {
                name: file.name,
                body: serde_yaml::to_string(&file.body)
                    .expect("alert nodes always serialize"),
                tags: file.tags,
                variables: file.variables,
            };
            template.validate()?;
            // Defaults alone must produce a complete rendering.
            template::validate_body(&template.body, &template.variables).map_err(|source| {
                crate::Error::InvalidTemplate {
                    name: template.name.clone(),
                    source,
                }
            })?;

            let mut conn = pool.acquire().await?;
            store::templates::upsert(&mut conn, &template).await?;
            outcome.templates.push(template.name);
        }
        "rule" => {
            let file: RuleFile = serde_yaml::from_str(&raw).map_err(parse_err)?;
            tracing::debug!(
                path = %path.display(),
                kind = %file.type_,
                api_version = %file.api_version,
                groups = file.groups.len(),
                "applying rule file"
            );

            // BTreeMap order makes application deterministic.
            for (group, entry) in file.groups {
                let draft = RuleDraft {
                    tenant: file.tenant.clone(),
                    namespace: file.namespace.clone(),
                    group,
                    template: entry.template,
                    enabled: entry.enabled,
                    variables: entry.variables,
                };
                let rule = rules.upsert(draft).await?;
                outcome.rules.push(rule.name);
            }
        }
        "credential" => {
            let file: CredentialFile = serde_yaml::from_str(&raw).map_err(parse_err)?;
            tracing::debug!(
                path = %path.display(),
                kind = %file.type_,
                api_version = %file.api_version,
                "applying credential file"
            );

            let stored = routing
                .upsert_credential(TeamCredential {
                    tenant: file.tenant,
                    team: file.team,
                    pagerduty_key: file.pagerduty_key,
                    slack_critical: file.slack_critical,
                    slack_warning: file.slack_warning,
                })
                .await?;
            outcome
                .credentials
                .push(format!("{}/{}", stored.tenant, stored.team));
        }
        _ => {
            return Err(crate::Error::UnknownObjectType {
                path: path.to_path_buf(),
                type_: probe.type_,
            })
        }
    }

    Ok(outcome)
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testutil::{self, EngineCall, FakeDaemon, FakeEngine};
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;
    use std::sync::Arc;

    struct Fixture {
        pool: SqlitePool,
        engine: Arc<FakeEngine>,
        daemon: Arc<FakeDaemon>,
        rules: RuleSync<Arc<FakeEngine>>,
        routing: RoutingSync<Arc<FakeDaemon>>,
        dir: tempfile::TempDir,
    }

    async fn fixture() -> Fixture {
        let pool = testutil::pool().await;
        let engine = Arc::new(FakeEngine::default());
        let daemon = Arc::new(FakeDaemon::default());
        Fixture {
            rules: RuleSync::new(pool.clone(), engine.clone()),
            routing: RoutingSync::new(pool.clone(), daemon.clone()),
            dir: tempfile::tempdir().unwrap(),
            pool,
            engine,
            daemon,
        }
    }

    impl Fixture {
        fn write(&self, name: &str, contents: &str) -> PathBuf {
            let path = self.dir.path().join(name);
            std::fs::write(&path, contents).unwrap();
            path
        }

        async fn apply(&self, path: &Path) -> Result<ApplyOutcome, crate::Error> {
            apply(&self.pool, &self.rules, &self.routing, path).await
        }
    }

    const TEMPLATE_FILE: &str = r#"
type: template
apiVersion: v2
name: cpu-usage
body:
  - alert: CPUHigh
    expr: "avg by (host) (cpu_usage_percent) > [[ .max ]]"
    for: "[[ .for ]]"
    labels:
      severity: WARNING
      team: "[[ .team ]]"
    annotations:
      summary: "CPU usage stayed above [[ .max ]]% for [[ .for ]]"
tags:
  - infra
variables:
  - name: for
    default: "10m"
    description: how long the expression must hold
  - name: max
    default: "90"
  - name: team
    default: odpf
"#;

    const RULE_FILE: &str = r#"
type: rule
apiVersion: v2
tenant: gojek
namespace: kube-system
groups:
  instance-health:
    template: cpu-usage
    variables:
      - name: for
        value: "20m"
"#;

    const CREDENTIAL_FILE: &str = r##"
type: credential
apiVersion: v2
tenant: gojek
team: foo
pagerduty_key: pd-key-foo
slack_critical:
  channel: "#foo-critical"
  webhook: https://hooks.slack.com/services/T0/B0/foo
  username: klaxon
"##;

    #[tokio::test]
    async fn test_template_then_rule_file() {
        let fx = fixture().await;

        let path = fx.write("template.yaml", TEMPLATE_FILE);
        let outcome = fx.apply(&path).await.unwrap();
        assert_eq!(outcome.templates, vec!["cpu-usage".to_string()]);
        assert!(outcome.rules.is_empty());

        let path = fx.write("rules.yaml", RULE_FILE);
        let outcome = fx.apply(&path).await.unwrap();
        assert_eq!(
            outcome.rules,
            vec!["klaxon_api_gojek_kube-system_instance-health_cpu-usage".to_string()]
        );

        // The applied rule reached the engine with its override bound.
        let calls = fx.engine.calls();
        assert_eq!(calls.len(), 1);
        let EngineCall::Create(doc) = &calls[0] else {
            panic!("expected a create, got {calls:?}");
        };
        assert_eq!(doc.nodes[0].hold, "20m");
        assert_eq!(doc.nodes[0].labels["team"], "odpf");
    }

    #[tokio::test]
    async fn test_credential_file_pushes_routing() {
        let fx = fixture().await;

        let path = fx.write("credential.yaml", CREDENTIAL_FILE);
        let outcome = fx.apply(&path).await.unwrap();
        assert_eq!(outcome.credentials, vec!["gojek/foo".to_string()]);

        let pushes = fx.daemon.pushes();
        assert_eq!(pushes.len(), 1);
        let receivers: Vec<&str> = pushes[0]
            .config
            .receivers
            .iter()
            .map(|r| r.name.as_str())
            .collect();
        // No warning channel was declared, so no warning receiver.
        assert_eq!(
            receivers,
            vec!["default", "pagerduty-foo", "slack-critical-foo"]
        );

        let stored = testutil::read_team(&fx.pool, "gojek", "foo").await.unwrap();
        assert_eq!(stored.slack_warning, None);
    }

    #[tokio::test]
    async fn test_object_type_is_matched_case_insensitively() {
        let fx = fixture().await;

        let path = fx.write("template.yaml", &TEMPLATE_FILE.replace("type: template", "type: Template"));
        let outcome = fx.apply(&path).await.unwrap();
        assert_eq!(outcome.templates, vec!["cpu-usage".to_string()]);
    }

    #[tokio::test]
    async fn test_unknown_type_is_an_error() {
        let fx = fixture().await;

        let path = fx.write("dashboard.yaml", "type: dashboard\nname: overview\n");
        let err = fx.apply(&path).await.unwrap_err();
        assert!(
            matches!(err, crate::Error::UnknownObjectType { ref type_, .. } if type_ == "dashboard"),
            "got: {err:?}"
        );
    }

    #[tokio::test]
    async fn test_template_with_undeclared_variable_is_rejected() {
        let fx = fixture().await;

        let path = fx.write(
            "broken.yaml",
            r#"
type: template
name: disk-usage
body:
  - alert: DiskFull
    expr: "disk_used_percent > [[ .threshold ]]"
"#,
        );
        let err = fx.apply(&path).await.unwrap_err();
        assert!(
            matches!(err, crate::Error::InvalidTemplate { ref name, .. } if name == "disk-usage"),
            "got: {err:?}"
        );

        // Nothing was stored.
        let count: i64 = sqlx::query_scalar("SELECT count(*) FROM templates")
            .fetch_one(&fx.pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_missing_file_is_a_read_error() {
        let fx = fixture().await;
        let err = fx.apply(&fx.dir.path().join("absent.yaml")).await.unwrap_err();
        assert!(matches!(err, crate::Error::ReadFile { .. }), "got: {err:?}");
    }
}
