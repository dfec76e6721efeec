use models::{Severity, SlackChannel, TeamCredential};
use sqlx::{Row, SqliteConnection};
use std::collections::BTreeMap;

/// Write the Slack row of `(tenant, team, severity)`. A missing channel
/// still writes its row, with empty members, so the three-row upsert of
/// a credential stays idempotent; emptiness maps back to None on read.
pub async fn upsert_slack(
    conn: &mut SqliteConnection,
    tenant: &str,
    team: &str,
    severity: Severity,
    channel: Option<&SlackChannel>,
) -> Result<(), crate::Error> {
    let (chan, webhook, username) = match channel {
        Some(c) => (c.channel.as_str(), c.webhook.as_str(), c.username.as_str()),
        None => ("", "", ""),
    };

    sqlx::query(
        r#"
        INSERT INTO slack_credentials
            (tenant, team, severity, channel, webhook, username, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?7)
        ON CONFLICT (tenant, team, severity) DO UPDATE SET
            channel = excluded.channel,
            webhook = excluded.webhook,
            username = excluded.username,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(tenant)
    .bind(team)
    .bind(severity.as_str())
    .bind(chan)
    .bind(webhook)
    .bind(username)
    .bind(chrono::Utc::now())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn upsert_pagerduty(
    conn: &mut SqliteConnection,
    tenant: &str,
    team: &str,
    service_key: Option<&str>,
) -> Result<(), crate::Error> {
    sqlx::query(
        r#"
        INSERT INTO pagerduty_credentials (tenant, team, service_key, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?4)
        ON CONFLICT (tenant, team) DO UPDATE SET
            service_key = excluded.service_key,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(tenant)
    .bind(team)
    .bind(service_key.unwrap_or(""))
    .bind(chrono::Utc::now())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

/// Assemble every team credential of `tenant`, normalized: empty stored
/// members come back as None.
pub async fn fetch_tenant(
    conn: &mut SqliteConnection,
    tenant: &str,
) -> Result<Vec<TeamCredential>, crate::Error> {
    let teams = assemble(conn, tenant, None).await?;
    Ok(teams.into_values().collect())
}

/// One team's credential, or None when the team has no rows at all.
pub async fn fetch_team(
    conn: &mut SqliteConnection,
    tenant: &str,
    team: &str,
) -> Result<Option<TeamCredential>, crate::Error> {
    let mut teams = assemble(conn, tenant, Some(team)).await?;
    Ok(teams.remove(team))
}

/// Tenants with any stored credential, in stable order.
pub async fn tenants(conn: &mut SqliteConnection) -> Result<Vec<String>, crate::Error> {
    let tenants = sqlx::query_scalar(
        r#"
        SELECT tenant FROM slack_credentials
        UNION
        SELECT tenant FROM pagerduty_credentials
        ORDER BY tenant
        "#,
    )
    .fetch_all(&mut *conn)
    .await?;

    Ok(tenants)
}

async fn assemble(
    conn: &mut SqliteConnection,
    tenant: &str,
    team: Option<&str>,
) -> Result<BTreeMap<String, TeamCredential>, crate::Error> {
    // A None `team` filter matches every row of the tenant.
    let mut teams: BTreeMap<String, TeamCredential> = BTreeMap::new();

    let rows = sqlx::query(
        r#"
        SELECT team, severity, channel, webhook, username FROM slack_credentials
        WHERE tenant = ?1 AND (?2 IS NULL OR team = ?2)
        ORDER BY team, severity
        "#,
    )
    .bind(tenant)
    .bind(team)
    .fetch_all(&mut *conn)
    .await?;

    for row in &rows {
        let team: String = row.try_get("team")?;
        let severity: Severity = row.try_get::<String, _>("severity")?.parse()?;
        let channel = SlackChannel {
            channel: row.try_get("channel")?,
            webhook: row.try_get("webhook")?,
            username: row.try_get("username")?,
        }
        .normalized();

        let entry = entry(&mut teams, tenant, &team);
        match severity {
            Severity::Critical => entry.slack_critical = channel,
            Severity::Warning => entry.slack_warning = channel,
        }
    }

    let rows = sqlx::query(
        r#"
        SELECT team, service_key FROM pagerduty_credentials
        WHERE tenant = ?1 AND (?2 IS NULL OR team = ?2)
        ORDER BY team
        "#,
    )
    .bind(tenant)
    .bind(team)
    .fetch_all(&mut *conn)
    .await?;

    for row in &rows {
        let team: String = row.try_get("team")?;
        let service_key: String = row.try_get("service_key")?;

        entry(&mut teams, tenant, &team).pagerduty_key =
            Some(service_key).filter(|key| !key.trim().is_empty());
    }

    Ok(teams)
}

fn entry<'m>(
    teams: &'m mut BTreeMap<String, TeamCredential>,
    tenant: &str,
    team: &str,
) -> &'m mut TeamCredential {
    teams
        .entry(team.to_string())
        .or_insert_with(|| TeamCredential {
            tenant: tenant.to_string(),
            team: team.to_string(),
            pagerduty_key: None,
            slack_critical: None,
            slack_warning: None,
        })
}
