use crate::locks::KeyLocks;
use crate::store;
use models::{GroupKey, Rule, RuleDraft, RuleVariable};
use sqlx::{Sqlite, SqlitePool, Transaction};
use std::collections::BTreeSet;
use upstream::RuleEngine;

/// RuleSync applies rule drafts: each upsert persists the rule, derives
/// the full desired state of its group, and replaces that group in the
/// rule engine, all under one transaction and one group lock.
pub struct RuleSync<E: RuleEngine> {
    pool: SqlitePool,
    engine: E,
    locks: KeyLocks,
}

impl<E: RuleEngine> RuleSync<E> {
    pub fn new(pool: SqlitePool, engine: E) -> Self {
        Self {
            pool,
            engine,
            locks: KeyLocks::default(),
        }
    }

    /// Create or update the rule identified by the draft's
    /// (tenant, namespace, group, template), returning its stored form.
    /// The remote group is replaced before the transaction commits, so
    /// a refused push leaves the store as it was.
    #[tracing::instrument(err, skip_all, fields(
        tenant = %draft.tenant,
        namespace = %draft.namespace,
        group = %draft.group,
        template = %draft.template
    ))]
    pub async fn upsert(&self, draft: RuleDraft) -> Result<Rule, crate::Error> {
        draft.validate()?;
        let name = draft.canonical_name();
        let key = draft.group_key();

        // Resolve the template and normalize the draft's overrides
        // before taking the group lock. A draft that can't bind never
        // contends with writers that can.
        let template = {
            let mut conn = self.pool.acquire().await?;
            store::templates::fetch(&mut conn, &draft.template).await?
        }
        .ok_or_else(|| crate::Error::TemplateNotFound {
            name: draft.template.clone(),
        })?;

        let variables = template::normalized_variables(&template.variables, &draft.variables)
            .map_err(|source| crate::Error::InvalidVariables {
                name: name.clone(),
                source,
            })?;

        let _guard = self.locks.lock(&format!("rules/{key}")).await;
        let mut txn = self.pool.begin().await?;

        match self
            .apply_within(&mut txn, &name, &key, &draft, &variables)
            .await
        {
            Ok(rule) => {
                txn.commit().await?;
                tracing::info!(rule = %name, "applied rule");
                Ok(rule)
            }
            Err(err) => {
                if let Err(rollback) = txn.rollback().await {
                    tracing::error!(error = %rollback, "rollback after failed rule sync");
                }
                Err(err)
            }
        }
    }

    /// The store write, group re-derivation, and remote replacement,
    /// inside the caller's transaction.
    async fn apply_within(
        &self,
        txn: &mut Transaction<'static, Sqlite>,
        name: &str,
        key: &GroupKey,
        draft: &RuleDraft,
        variables: &[RuleVariable],
    ) -> Result<Rule, crate::Error> {
        store::rules::upsert(&mut **txn, name, draft, variables).await?;

        let rules = store::rules::fetch_group(&mut **txn, key).await?;
        let wanted: BTreeSet<String> = rules.iter().map(|rule| rule.template.clone()).collect();
        let templates = store::templates::fetch_many(&mut **txn, &wanted).await?;

        let document =
            compose::rule_group(key, &rules, &templates).map_err(|source| crate::Error::Compose {
                key: key.clone(),
                source,
            })?;

        if document.is_empty() {
            // Every rule of the group is disabled. The remote group must
            // go, and a group the remote never had counts as gone.
            match self
                .engine
                .delete_rule_group(&key.tenant, &key.namespace, &key.group)
                .await
            {
                Ok(()) => tracing::info!(%key, "removed remote rule group"),
                Err(err) if err.is_not_found() => {
                    tracing::debug!(%key, "remote rule group was already absent")
                }
                Err(source) => {
                    return Err(crate::Error::RuleSync {
                        key: key.clone(),
                        source,
                    })
                }
            }
        } else {
            self.engine
                .create_rule_group(&document)
                .await
                .map_err(|source| crate::Error::RuleSync {
                    key: key.clone(),
                    source,
                })?;
            tracing::info!(%key, rules = document.nodes.len(), "replaced remote rule group");
        }

        store::rules::fetch_by_name(&mut **txn, name)
            .await?
            .ok_or(crate::Error::Store(sqlx::Error::RowNotFound))
    }

    /// The stored rule, if any. Reads don't lock.
    pub async fn get(&self, name: &str) -> Result<Option<Rule>, crate::Error> {
        let mut conn = self.pool.acquire().await?;
        store::rules::fetch_by_name(&mut conn, name).await
    }
}
