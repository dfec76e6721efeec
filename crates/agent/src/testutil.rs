//! Shared fixtures: an in-memory store, canned templates and
//! credentials, and hand-rolled fakes of the remote systems.

use models::{
    Rule, RoutingDocument, RuleGroupDocument, SlackChannel, TeamCredential, Template, VariableSpec,
};
use sqlx::SqlitePool;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

pub async fn pool() -> SqlitePool {
    let pool = crate::store::open("sqlite::memory:").await.unwrap();
    crate::store::migrate(&pool).await.unwrap();
    pool
}

const CPU_BODY: &str = r#"
- alert: CPUHigh
  expr: avg by (host) (cpu_usage_percent) > [[ .max ]]
  for: "[[ .for ]]"
  labels:
    severity: WARNING
    team: [[ .team ]]
  annotations:
    summary: CPU usage stayed above [[ .max ]]% for [[ .for ]]
"#;

pub fn cpu_template() -> Template {
    let spec = |name: &str, default: &str| VariableSpec {
        name: name.to_string(),
        type_: "string".to_string(),
        default: default.to_string(),
        description: String::new(),
    };
    Template {
        name: "cpu-usage".to_string(),
        body: CPU_BODY.to_string(),
        tags: vec!["firehose".to_string()],
        variables: vec![spec("for", "10m"), spec("max", "90"), spec("team", "odpf")],
    }
}

pub fn slack_channel(team: &str, severity: &str) -> SlackChannel {
    SlackChannel {
        channel: format!("#{team}-{severity}"),
        webhook: format!("https://hooks.slack.com/services/T0/B0/{team}-{severity}"),
        username: "klaxon".to_string(),
    }
}

pub fn full_credential(tenant: &str, team: &str) -> TeamCredential {
    TeamCredential {
        tenant: tenant.to_string(),
        team: team.to_string(),
        pagerduty_key: Some(format!("pd-key-{team}")),
        slack_critical: Some(slack_channel(team, "critical")),
        slack_warning: Some(slack_channel(team, "warning")),
    }
}

pub async fn seed_template(pool: &SqlitePool, template: &Template) {
    let mut conn = pool.acquire().await.unwrap();
    crate::store::templates::upsert(&mut conn, template)
        .await
        .unwrap();
}

pub async fn read_rule(pool: &SqlitePool, name: &str) -> Option<Rule> {
    let mut conn = pool.acquire().await.unwrap();
    crate::store::rules::fetch_by_name(&mut conn, name)
        .await
        .unwrap()
}

pub async fn read_team(pool: &SqlitePool, tenant: &str, team: &str) -> Option<TeamCredential> {
    let mut conn = pool.acquire().await.unwrap();
    crate::store::credentials::fetch_team(&mut conn, tenant, team)
        .await
        .unwrap()
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    Create(RuleGroupDocument),
    Delete {
        tenant: String,
        namespace: String,
        group: String,
    },
}

/// In-memory rule engine. `fail` makes every call return a 500;
/// `absent_on_delete` makes deletions report the group as unknown,
/// after recording the attempt.
#[derive(Default)]
pub struct FakeEngine {
    pub calls: Mutex<Vec<EngineCall>>,
    pub fail: AtomicBool,
    pub absent_on_delete: AtomicBool,
}

impl FakeEngine {
    pub fn calls(&self) -> Vec<EngineCall> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl upstream::RuleEngine for FakeEngine {
    async fn create_rule_group(&self, doc: &RuleGroupDocument) -> Result<(), upstream::Error> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(upstream::Error::Status {
                status: 500,
                detail: "injected engine failure".to_string(),
            });
        }
        self.calls
            .lock()
            .unwrap()
            .push(EngineCall::Create(doc.clone()));
        Ok(())
    }

    async fn delete_rule_group(
        &self,
        tenant: &str,
        namespace: &str,
        group: &str,
    ) -> Result<(), upstream::Error> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(upstream::Error::Status {
                status: 500,
                detail: "injected engine failure".to_string(),
            });
        }
        self.calls.lock().unwrap().push(EngineCall::Delete {
            tenant: tenant.to_string(),
            namespace: namespace.to_string(),
            group: group.to_string(),
        });
        if self.absent_on_delete.load(Ordering::SeqCst) {
            return Err(upstream::Error::NotFound);
        }
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeDaemon {
    pub pushes: Mutex<Vec<RoutingDocument>>,
    pub fail: AtomicBool,
}

impl FakeDaemon {
    pub fn pushes(&self) -> Vec<RoutingDocument> {
        self.pushes.lock().unwrap().clone()
    }
}

#[async_trait::async_trait]
impl upstream::RoutingDaemon for FakeDaemon {
    async fn push_config(&self, doc: &RoutingDocument) -> Result<(), upstream::Error> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(upstream::Error::Status {
                status: 500,
                detail: "injected daemon failure".to_string(),
            });
        }
        self.pushes.lock().unwrap().push(doc.clone());
        Ok(())
    }
}
