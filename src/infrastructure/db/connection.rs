use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::info;

use crate::domain::error::{AppError, Result};

/// A SQLite schema shipped with the binary, versioned via `PRAGMA user_version`.
pub struct SchemaSpec {
    pub label: &'static str,
    pub sql: &'static str,
    pub version: i32,
}

pub const STAGING_SCHEMA: SchemaSpec = SchemaSpec {
    label: "staging",
    sql: include_str!("../../../resources/staging_schema.sql"),
    version: 1,
};

pub const VECTOR_SCHEMA: SchemaSpec = SchemaSpec {
    label: "vector index",
    sql: include_str!("../../../resources/vector_schema.sql"),
    version: 1,
};

/// Opens (creating if needed) the database at `db_path`, applies `schema`
/// additively and returns the pool every caller shares.
pub async fn init_database(db_path: &Path, schema: &SchemaSpec) -> Result<SqlitePool> {
    let pool = connect_pool(db_path).await?;

    // A database written by a newer binary may have columns we do not know.
    let current_version = read_user_version(&pool).await?;
    if current_version > schema.version {
        return Err(AppError::DatabaseError(format!(
            "{} database schema too new: db user_version={} > supported_version={}",
            schema.label, current_version, schema.version
        )));
    }

    for stmt in split_sql_statements(schema.sql) {
        sqlx::query(&stmt).execute(&pool).await.map_err(|e| {
            AppError::DatabaseError(format!(
                "Failed to apply {} schema statement: {}",
                schema.label, e
            ))
        })?;
    }

    set_user_version(&pool, schema.version).await?;

    sqlx::query("SELECT 1").execute(&pool).await.map_err(|e| {
        AppError::DatabaseError(format!("{} database health check failed: {}", schema.label, e))
    })?;

    info!(
        db = %db_path.display(),
        schema = schema.label,
        version = schema.version,
        "Database ready"
    );
    Ok(pool)
}

pub async fn connect_pool(db_path: &Path) -> Result<SqlitePool> {
    let db_url = db_path_to_url(db_path)?;
    let options = SqliteConnectOptions::from_str(&db_url)
        .map_err(|e| AppError::DatabaseError(format!("Failed to parse DB URL: {}", e)))?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .synchronous(SqliteSynchronous::Normal)
        .busy_timeout(Duration::from_secs(5));

    SqlitePoolOptions::new()
        .max_connections(4)
        .acquire_timeout(Duration::from_secs(5))
        .connect_with(options)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to connect to database: {}", e)))
}

fn db_path_to_url(db_path: &Path) -> Result<String> {
    let db_path_str = db_path.to_str().ok_or_else(|| {
        AppError::DatabaseError("Database path is not valid UTF-8".to_string())
    })?;
    Ok(format!("sqlite://{}", db_path_str.replace('\\', "/")))
}

async fn read_user_version(pool: &SqlitePool) -> Result<i32> {
    sqlx::query_scalar("PRAGMA user_version")
        .fetch_one(pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to read PRAGMA user_version: {}", e)))
}

async fn set_user_version(pool: &SqlitePool, version: i32) -> Result<()> {
    let sql = format!("PRAGMA user_version = {}", version);
    sqlx::query(&sql)
        .execute(pool)
        .await
        .map_err(|e| AppError::DatabaseError(format!("Failed to set PRAGMA user_version: {}", e)))?;
    Ok(())
}

/// Splits a schema file on `;`, ignoring semicolons inside quotes and
/// `--` comments.
fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut out = Vec::new();
    let mut buf = String::new();
    let mut in_single = false;
    let mut in_double = false;
    let mut in_comment = false;

    let mut chars = sql.chars().peekable();
    while let Some(c) = chars.next() {
        if in_comment {
            if c == '\n' {
                in_comment = false;
                buf.push(c);
            }
            continue;
        }
        match c {
            '-' if !in_single && !in_double && chars.peek() == Some(&'-') => {
                in_comment = true;
                chars.next();
            }
            '\'' if !in_double => {
                in_single = !in_single;
                buf.push(c);
            }
            '"' if !in_single => {
                in_double = !in_double;
                buf.push(c);
            }
            ';' if !in_single && !in_double => {
                let stmt = buf.trim();
                if !stmt.is_empty() {
                    out.push(stmt.to_string());
                }
                buf.clear();
            }
            _ => buf.push(c),
        }
    }

    let tail = buf.trim();
    if !tail.is_empty() {
        out.push(tail.to_string());
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_ignores_comments_and_quoted_semicolons() {
        let sql = "-- header; comment\nCREATE TABLE a (x TEXT DEFAULT ';');\n\nCREATE INDEX i ON a(x);";
        let statements = split_sql_statements(sql);
        assert_eq!(statements.len(), 2);
        assert_eq!(statements[0], "CREATE TABLE a (x TEXT DEFAULT ';')");
        assert_eq!(statements[1], "CREATE INDEX i ON a(x)");
    }

    #[test]
    fn test_bundled_schemas_split_into_statements() {
        assert_eq!(split_sql_statements(STAGING_SCHEMA.sql).len(), 2);
        assert_eq!(split_sql_statements(VECTOR_SCHEMA.sql).len(), 4);
    }

    #[tokio::test]
    async fn test_init_is_idempotent_and_rejects_newer_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vectors.db");

        let pool = init_database(&path, &VECTOR_SCHEMA).await.unwrap();
        pool.close().await;
        let pool = init_database(&path, &VECTOR_SCHEMA).await.unwrap();
        set_user_version(&pool, VECTOR_SCHEMA.version + 1).await.unwrap();
        pool.close().await;

        assert!(matches!(
            init_database(&path, &VECTOR_SCHEMA).await,
            Err(AppError::DatabaseError(_))
        ));
    }
}
