use crate::locks::KeyLocks;
use crate::store;
use models::{Severity, TeamCredential};
use sqlx::{Sqlite, SqlitePool, Transaction};
use upstream::RoutingDaemon;

/// RoutingSync applies team credentials: each upsert persists the
/// team's Slack and PagerDuty members, re-derives the tenant's whole
/// routing configuration, and pushes it to the routing daemon, all
/// under one transaction and one tenant lock.
pub struct RoutingSync<D: RoutingDaemon> {
    pool: SqlitePool,
    daemon: D,
    locks: KeyLocks,
}

impl<D: RoutingDaemon> RoutingSync<D> {
    pub fn new(pool: SqlitePool, daemon: D) -> Self {
        Self {
            pool,
            daemon,
            locks: KeyLocks::default(),
        }
    }

    /// Create or update one team's credential, returning its stored
    /// form. Credentials normalize on the way in: blank members are
    /// stored as absences, and disable the matching receiver.
    #[tracing::instrument(err, skip_all, fields(tenant = %draft.tenant, team = %draft.team))]
    pub async fn upsert_credential(
        &self,
        draft: TeamCredential,
    ) -> Result<TeamCredential, crate::Error> {
        draft.validate()?;
        let draft = draft.normalized();

        let _guard = self.locks.lock(&format!("routing/{}", draft.tenant)).await;
        let mut txn = self.pool.begin().await?;

        match self.apply_within(&mut txn, &draft).await {
            Ok(stored) => {
                txn.commit().await?;
                tracing::info!(team = %draft.team, "applied credential");
                Ok(stored)
            }
            Err(err) => {
                if let Err(rollback) = txn.rollback().await {
                    tracing::error!(error = %rollback, "rollback after failed routing sync");
                }
                Err(err)
            }
        }
    }

    async fn apply_within(
        &self,
        txn: &mut Transaction<'static, Sqlite>,
        draft: &TeamCredential,
    ) -> Result<TeamCredential, crate::Error> {
        store::credentials::upsert_slack(
            &mut **txn,
            &draft.tenant,
            &draft.team,
            Severity::Critical,
            draft.slack_critical.as_ref(),
        )
        .await?;
        store::credentials::upsert_slack(
            &mut **txn,
            &draft.tenant,
            &draft.team,
            Severity::Warning,
            draft.slack_warning.as_ref(),
        )
        .await?;
        store::credentials::upsert_pagerduty(
            &mut **txn,
            &draft.tenant,
            &draft.team,
            draft.pagerduty_key.as_deref(),
        )
        .await?;

        let credentials = store::credentials::fetch_tenant(&mut **txn, &draft.tenant).await?;
        let document = compose::routing_config(&draft.tenant, &credentials);

        self.daemon
            .push_config(&document)
            .await
            .map_err(|source| crate::Error::RoutingSync {
                tenant: draft.tenant.clone(),
                source,
            })?;
        tracing::info!(
            tenant = %draft.tenant,
            teams = credentials.len(),
            "replaced routing configuration"
        );

        store::credentials::fetch_team(&mut **txn, &draft.tenant, &draft.team)
            .await?
            .ok_or(crate::Error::Store(sqlx::Error::RowNotFound))
    }

    /// The stored credential of one team, if any. Reads don't lock.
    pub async fn get_credential(
        &self,
        tenant: &str,
        team: &str,
    ) -> Result<Option<TeamCredential>, crate::Error> {
        let mut conn = self.pool.acquire().await?;
        store::credentials::fetch_team(&mut conn, tenant, team).await
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testutil::{self, FakeDaemon};
    use pretty_assertions::assert_eq;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    async fn fixture() -> (SqlitePool, Arc<FakeDaemon>, RoutingSync<Arc<FakeDaemon>>) {
        let pool = testutil::pool().await;
        let daemon = Arc::new(FakeDaemon::default());
        let sync = RoutingSync::new(pool.clone(), daemon.clone());
        (pool, daemon, sync)
    }

    #[tokio::test]
    async fn test_upsert_pushes_the_whole_tenant() {
        let (_pool, daemon, sync) = fixture().await;

        sync.upsert_credential(testutil::full_credential("gojek", "foo"))
            .await
            .unwrap();
        let stored = sync
            .upsert_credential(testutil::full_credential("gojek", "bar"))
            .await
            .unwrap();
        assert_eq!(stored.team, "bar");
        assert_eq!(stored.pagerduty_key.as_deref(), Some("pd-key-bar"));

        let pushes = daemon.pushes();
        assert_eq!(pushes.len(), 2);

        // The second push reflects both teams, in name order.
        let doc = &pushes[1];
        assert_eq!(doc.tenant, "gojek");
        let receivers: Vec<&str> = doc
            .config
            .receivers
            .iter()
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(
            receivers,
            vec![
                "default",
                "pagerduty-bar",
                "slack-critical-bar",
                "slack-warning-bar",
                "pagerduty-foo",
                "slack-critical-foo",
                "slack-warning-foo",
            ]
        );
    }

    #[tokio::test]
    async fn test_blank_members_store_as_absences() {
        let (_pool, _daemon, sync) = fixture().await;

        let mut draft = testutil::full_credential("gojek", "bar");
        draft.pagerduty_key = Some("   ".to_string());
        draft.slack_critical.as_mut().unwrap().webhook = String::new();

        let stored = sync.upsert_credential(draft).await.unwrap();
        assert_eq!(stored.pagerduty_key, None);
        assert_eq!(stored.slack_critical, None);
        assert!(stored.slack_warning.is_some());
    }

    #[tokio::test]
    async fn test_push_failure_rolls_the_store_back() {
        let (_pool, daemon, sync) = fixture().await;

        sync.upsert_credential(testutil::full_credential("gojek", "foo"))
            .await
            .unwrap();

        daemon.fail.store(true, Ordering::SeqCst);
        let mut update = testutil::full_credential("gojek", "foo");
        update.pagerduty_key = Some("pd-key-rotated".to_string());
        let err = sync.upsert_credential(update).await.unwrap_err();
        assert!(
            matches!(err, crate::Error::RoutingSync { .. }),
            "got: {err:?}"
        );

        // The stored credential still carries the original key.
        let stored = sync.get_credential("gojek", "foo").await.unwrap().unwrap();
        assert_eq!(stored.pagerduty_key.as_deref(), Some("pd-key-foo"));

        // A brand-new team whose first push fails is not stored at all.
        let err = sync
            .upsert_credential(testutil::full_credential("gojek", "ghost"))
            .await
            .unwrap_err();
        assert!(matches!(err, crate::Error::RoutingSync { .. }));
        assert!(sync.get_credential("gojek", "ghost").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_credential_of_unknown_team_is_none() {
        let (_pool, _daemon, sync) = fixture().await;
        assert!(sync.get_credential("gojek", "foo").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_invalid_names_are_rejected_before_any_push() {
        let (_pool, daemon, sync) = fixture().await;

        let mut draft = testutil::full_credential("gojek", "foo");
        draft.team = "not a team".to_string();
        let err = sync.upsert_credential(draft).await.unwrap_err();
        assert!(matches!(err, crate::Error::Validation(_)), "got: {err:?}");
        assert!(daemon.pushes().is_empty());
    }
}
