use models::{GroupKey, Rule, RuleDraft, RuleVariable};
use sqlx::{Row, SqliteConnection};

/// Insert or update the rule row addressed by `name`, leaving the other
/// members of its group untouched. `variables` is the normalized full
/// binding list, not the draft's raw overrides.
pub async fn upsert(
    conn: &mut SqliteConnection,
    name: &str,
    draft: &RuleDraft,
    variables: &[RuleVariable],
) -> Result<(), crate::Error> {
    let variables = serde_json::to_string(variables).expect("variable bindings always serialize");

    sqlx::query(
        r#"
        INSERT INTO rules
            (name, tenant, namespace, group_name, template, enabled, variables, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?8)
        ON CONFLICT (name) DO UPDATE SET
            enabled = excluded.enabled,
            variables = excluded.variables,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(name)
    .bind(&draft.tenant)
    .bind(&draft.namespace)
    .bind(&draft.group)
    .bind(&draft.template)
    .bind(draft.enabled)
    .bind(&variables)
    .bind(chrono::Utc::now())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn fetch_by_name(
    conn: &mut SqliteConnection,
    name: &str,
) -> Result<Option<Rule>, crate::Error> {
    let row = sqlx::query(&format!("{SELECT_RULE} WHERE name = ?1"))
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?;

    row.map(|row| from_row(&row)).transpose()
}

/// All rules of one group, enabled or not, ordered by name.
pub async fn fetch_group(
    conn: &mut SqliteConnection,
    key: &GroupKey,
) -> Result<Vec<Rule>, crate::Error> {
    let rows = sqlx::query(&format!(
        "{SELECT_RULE} WHERE tenant = ?1 AND namespace = ?2 AND group_name = ?3 ORDER BY name"
    ))
    .bind(&key.tenant)
    .bind(&key.namespace)
    .bind(&key.group)
    .fetch_all(&mut *conn)
    .await?;

    rows.iter().map(from_row).collect()
}

/// Every distinct group key present in the store, in stable order.
pub async fn group_keys(conn: &mut SqliteConnection) -> Result<Vec<GroupKey>, crate::Error> {
    let rows = sqlx::query(
        r#"
        SELECT DISTINCT tenant, namespace, group_name FROM rules
        ORDER BY tenant, namespace, group_name
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;

    rows.iter()
        .map(|row| {
            Ok(GroupKey {
                tenant: row.try_get("tenant")?,
                namespace: row.try_get("namespace")?,
                group: row.try_get("group_name")?,
            })
        })
        .collect()
}

const SELECT_RULE: &str = r#"
    SELECT id, name, tenant, namespace, group_name, template, enabled,
           variables, created_at, updated_at
    FROM rules
"#;

fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Rule, crate::Error> {
    let name: String = row.try_get("name")?;
    let variables: String = row.try_get("variables")?;
    let variables = serde_json::from_str(&variables).map_err(|source| crate::Error::Decode {
        what: "rule",
        name: name.clone(),
        source,
    })?;

    Ok(Rule {
        id: row.try_get("id")?,
        tenant: row.try_get("tenant")?,
        namespace: row.try_get("namespace")?,
        group: row.try_get("group_name")?,
        template: row.try_get("template")?,
        enabled: row.try_get("enabled")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
        variables,
        name,
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testutil;

    fn draft(group: &str, template: &str, enabled: bool) -> RuleDraft {
        RuleDraft {
            tenant: "gojek".to_string(),
            namespace: "kube-system".to_string(),
            group: group.to_string(),
            template: template.to_string(),
            enabled,
            variables: Vec::new(),
        }
    }

    fn binding(name: &str, value: &str) -> RuleVariable {
        RuleVariable {
            name: name.to_string(),
            value: value.to_string(),
        }
    }

    #[tokio::test]
    async fn test_upsert_updates_in_place() {
        let pool = testutil::pool().await;
        let mut conn = pool.acquire().await.unwrap();

        let d = draft("health", "cpu-usage", true);
        let name = d.canonical_name();
        upsert(&mut conn, &name, &d, &[binding("for", "10m")])
            .await
            .unwrap();

        let first = fetch_by_name(&mut conn, &name).await.unwrap().unwrap();
        assert!(first.enabled);
        assert_eq!(first.variables, vec![binding("for", "10m")]);

        let d = draft("health", "cpu-usage", false);
        upsert(&mut conn, &name, &d, &[binding("for", "20m")])
            .await
            .unwrap();

        let second = fetch_by_name(&mut conn, &name).await.unwrap().unwrap();
        assert_eq!(second.id, first.id);
        assert_eq!(second.created_at, first.created_at);
        assert!(!second.enabled);
        assert_eq!(second.variables, vec![binding("for", "20m")]);
    }

    #[tokio::test]
    async fn test_fetch_group_and_group_keys() {
        let pool = testutil::pool().await;
        let mut conn = pool.acquire().await.unwrap();

        for (group, template) in [
            ("health", "cpu-usage"),
            ("health", "memory-usage"),
            ("capacity", "disk-usage"),
        ] {
            let d = draft(group, template, true);
            upsert(&mut conn, &d.canonical_name(), &d, &[]).await.unwrap();
        }

        let key = GroupKey {
            tenant: "gojek".to_string(),
            namespace: "kube-system".to_string(),
            group: "health".to_string(),
        };
        let rules = fetch_group(&mut conn, &key).await.unwrap();
        assert_eq!(rules.len(), 2);
        assert!(rules[0].name < rules[1].name);

        let keys = group_keys(&mut conn).await.unwrap();
        let groups: Vec<&str> = keys.iter().map(|k| k.group.as_str()).collect();
        assert_eq!(groups, vec!["capacity", "health"]);
    }
}
