//! Full re-derivation of remote state from the store: every rule group
//! is rebuilt and pushed (or deleted, when wholly disabled), and every
//! tenant's routing document is rebuilt and pushed. Pushes are
//! idempotent replacements, so running this twice is harmless.
//!
//! Resync runs unlocked and outside any transaction: it is an operator
//! action for a quiesced agent, recovering a remote which lost state or
//! was repointed, not part of the serving path.

use crate::store;
use sqlx::SqlitePool;
use std::collections::BTreeSet;
use upstream::{RoutingDaemon, RuleEngine};

#[derive(Debug, Default, PartialEq)]
pub struct ResyncOutcome {
    pub groups_replaced: usize,
    pub groups_removed: usize,
    pub tenants_replaced: usize,
}

#[tracing::instrument(err, skip_all)]
pub async fn resync<E: RuleEngine, D: RoutingDaemon>(
    pool: &SqlitePool,
    engine: &E,
    daemon: &D,
) -> Result<ResyncOutcome, crate::Error> {
    let mut conn = pool.acquire().await?;
    let mut outcome = ResyncOutcome::default();

    for key in store::rules::group_keys(&mut conn).await? {
        let rules = store::rules::fetch_group(&mut conn, &key).await?;
        let wanted: BTreeSet<String> = rules.iter().map(|rule| rule.template.clone()).collect();
        let templates = store::templates::fetch_many(&mut conn, &wanted).await?;

        let document =
            compose::rule_group(&key, &rules, &templates).map_err(|source| crate::Error::Compose {
                key: key.clone(),
                source,
            })?;

        if document.is_empty() {
            match engine
                .delete_rule_group(&key.tenant, &key.namespace, &key.group)
                .await
            {
                Ok(()) => {}
                Err(err) if err.is_not_found() => {}
                Err(source) => {
                    return Err(crate::Error::RuleSync {
                        key: key.clone(),
                        source,
                    })
                }
            }
            outcome.groups_removed += 1;
            tracing::info!(%key, "removed remote rule group");
        } else {
            engine
                .create_rule_group(&document)
                .await
                .map_err(|source| crate::Error::RuleSync {
                    key: key.clone(),
                    source,
                })?;
            outcome.groups_replaced += 1;
            tracing::info!(%key, rules = document.nodes.len(), "replaced remote rule group");
        }
    }

    for tenant in store::credentials::tenants(&mut conn).await? {
        let credentials = store::credentials::fetch_tenant(&mut conn, &tenant).await?;
        let document = compose::routing_config(&tenant, &credentials);

        daemon
            .push_config(&document)
            .await
            .map_err(|source| crate::Error::RoutingSync {
                tenant: tenant.clone(),
                source,
            })?;
        outcome.tenants_replaced += 1;
        tracing::info!(%tenant, teams = credentials.len(), "replaced routing configuration");
    }

    Ok(outcome)
}
