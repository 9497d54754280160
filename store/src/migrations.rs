//! Versioned schema migrations for the SQLite backend.

use sqlx::sqlite::SqlitePool;
use tracing::info;

use crate::error::{StoreError, StoreResult};

pub(crate) struct MigrationManager;

impl MigrationManager {
    /// Bring the schema up to the latest version.
    pub(crate) async fn ensure_current_schema(pool: &SqlitePool) -> StoreResult<()> {
        Self::create_version_table(pool).await?;

        let current_version = Self::current_version(pool).await?;
        let target_version = MIGRATIONS.len() as i32;

        for version in (current_version + 1)..=target_version {
            if let Some(migration) = MIGRATIONS.get((version - 1) as usize) {
                Self::apply_migration(pool, version, migration).await?;
            }
        }

        Ok(())
    }

    async fn create_version_table(pool: &SqlitePool) -> StoreResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS schema_version (
                version INTEGER PRIMARY KEY,
                applied_at INTEGER DEFAULT (strftime('%s', 'now'))
            )
            "#,
        )
        .execute(pool)
        .await?;

        Ok(())
    }

    async fn current_version(pool: &SqlitePool) -> StoreResult<i32> {
        let version: Option<i32> = sqlx::query_scalar("SELECT MAX(version) FROM schema_version")
            .fetch_optional(pool)
            .await?
            .flatten();

        Ok(version.unwrap_or(0))
    }

    async fn apply_migration(pool: &SqlitePool, version: i32, migration: &Migration) -> StoreResult<()> {
        let wrap = |source| StoreError::Migration { version, source };

        let mut tx = pool.begin().await?;

        sqlx::query(migration.sql)
            .execute(&mut *tx)
            .await
            .map_err(wrap)?;

        sqlx::query("INSERT INTO schema_version (version) VALUES (?)")
            .bind(version)
            .execute(&mut *tx)
            .await
            .map_err(wrap)?;

        tx.commit().await?;

        info!(version, description = migration.description, "Applied schema migration");
        Ok(())
    }
}

struct Migration {
    description: &'static str,
    sql: &'static str,
}

static MIGRATIONS: &[Migration] = &[Migration {
    description: "currencies and currency_rates tables",
    sql: include_str!(concat!(
        env!("CARGO_MANIFEST_DIR"),
        "/migrations/0001_initial_schema.sql"
    )),
}];
