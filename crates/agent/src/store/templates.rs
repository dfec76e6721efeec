use models::Template;
use sqlx::{Row, SqliteConnection};
use std::collections::{BTreeMap, BTreeSet};

/// Insert or update the template addressed by its name.
pub async fn upsert(conn: &mut SqliteConnection, template: &Template) -> Result<(), crate::Error> {
    let tags = serde_json::to_string(&template.tags).expect("tags always serialize");
    let variables =
        serde_json::to_string(&template.variables).expect("variable specs always serialize");

    sqlx::query(
        r#"
        INSERT INTO templates (name, body, tags, variables, created_at, updated_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?5)
        ON CONFLICT (name) DO UPDATE SET
            body = excluded.body,
            tags = excluded.tags,
            variables = excluded.variables,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(&template.name)
    .bind(&template.body)
    .bind(&tags)
    .bind(&variables)
    .bind(chrono::Utc::now())
    .execute(&mut *conn)
    .await?;

    Ok(())
}

pub async fn fetch(
    conn: &mut SqliteConnection,
    name: &str,
) -> Result<Option<Template>, crate::Error> {
    let row = sqlx::query("SELECT name, body, tags, variables FROM templates WHERE name = ?1")
        .bind(name)
        .fetch_optional(&mut *conn)
        .await?;

    row.map(|row| from_row(&row)).transpose()
}

/// Fetch the named templates, keyed by name. Names with no stored
/// template are simply absent from the result; whether that's an error
/// is the caller's call.
pub async fn fetch_many(
    conn: &mut SqliteConnection,
    names: &BTreeSet<String>,
) -> Result<BTreeMap<String, Template>, crate::Error> {
    let mut out = BTreeMap::new();
    for name in names {
        if let Some(template) = fetch(&mut *conn, name).await? {
            out.insert(name.clone(), template);
        }
    }
    Ok(out)
}

fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Template, crate::Error> {
    let name: String = row.try_get("name")?;
    let tags: String = row.try_get("tags")?;
    let variables: String = row.try_get("variables")?;

    let decode = |source| crate::Error::Decode {
        what: "template",
        name: name.clone(),
        source,
    };

    Ok(Template {
        body: row.try_get("body")?,
        tags: serde_json::from_str(&tags).map_err(&decode)?,
        variables: serde_json::from_str(&variables).map_err(&decode)?,
        name,
    })
}
