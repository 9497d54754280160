//! SQLite [`RateStore`] backend built on sqlx.

use std::str::FromStr;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, Sqlite, SqliteConnection};
use tracing::{debug, info, instrument, warn};

use ratewatch_common::{CurrencyCode, CurrencyId, CurrencyPair, RateId, RateObservation};

use crate::error::{StoreError, StoreResult};
use crate::migrations::MigrationManager;
use crate::store::{RateStore, Upserted};

/// Connection settings for [`SqliteRateStore`].
#[derive(Debug, Clone)]
pub struct SqliteStoreConfig {
    /// sqlx connection URL, e.g. `sqlite://rates.db` or `sqlite::memory:`.
    pub url: String,
    /// Pool size. Forced to 1 for in-memory databases.
    pub max_connections: u32,
    /// How long a writer waits on a locked database.
    pub busy_timeout: Duration,
}

impl Default for SqliteStoreConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://ratewatch.db".to_string(),
            max_connections: 5,
            busy_timeout: Duration::from_secs(5),
        }
    }
}

impl SqliteStoreConfig {
    fn is_memory(&self) -> bool {
        self.url.contains(":memory:") || self.url.contains("mode=memory")
    }
}

/// Store persisted in a SQLite database.
pub struct SqliteRateStore {
    pool: SqlitePool,
}

impl SqliteRateStore {
    /// Open (creating if needed) the database and migrate it.
    #[instrument(skip(config), fields(url = %config.url))]
    pub async fn connect(config: &SqliteStoreConfig) -> StoreResult<Self> {
        let memory = config.is_memory();

        let mut options = SqliteConnectOptions::from_str(&config.url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(config.busy_timeout);

        if !memory {
            options = options.journal_mode(SqliteJournalMode::Wal);
        }

        // Every connection to `:memory:` is its own database, so keep exactly one alive.
        let pool_options = if memory {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(config.max_connections.max(1))
        };

        let pool = pool_options.connect_with(options).await?;

        MigrationManager::ensure_current_schema(&pool).await?;

        info!(memory, "SQLite rate store ready");
        Ok(Self { pool })
    }

    /// Shorthand for a private in-memory database.
    pub async fn in_memory() -> StoreResult<Self> {
        Self::connect(&SqliteStoreConfig {
            url: "sqlite::memory:".to_string(),
            ..Default::default()
        })
        .await
    }

    /// Close the pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// A write transaction opened with `BEGIN IMMEDIATE`.
///
/// The write lock is taken before the first read, so a busy database is
/// waited on for `busy_timeout` instead of failing a read-to-write upgrade.
/// If dropped before `commit` or `rollback`, the connection is detached from
/// the pool and closed, which discards the transaction.
struct WriteTransaction {
    conn: Option<PoolConnection<Sqlite>>,
}

impl WriteTransaction {
    async fn begin(pool: &SqlitePool) -> StoreResult<Self> {
        let mut conn = pool.acquire().await?;
        sqlx::query("BEGIN IMMEDIATE").execute(&mut *conn).await?;
        Ok(Self { conn: Some(conn) })
    }

    fn connection(&mut self) -> StoreResult<&mut SqliteConnection> {
        self.conn.as_deref_mut().ok_or(StoreError::TransactionClosed)
    }

    async fn commit(mut self) -> StoreResult<()> {
        sqlx::query("COMMIT").execute(self.connection()?).await?;
        self.conn.take();
        Ok(())
    }

    async fn rollback(mut self) -> StoreResult<()> {
        sqlx::query("ROLLBACK").execute(self.connection()?).await?;
        self.conn.take();
        Ok(())
    }

    /// Commit on success, roll back on failure, returning the body's result.
    async fn finish<T>(self, result: StoreResult<T>) -> StoreResult<T> {
        match result {
            Ok(value) => {
                self.commit().await?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback) = self.rollback().await {
                    warn!(error = %rollback, "Rollback failed");
                }
                Err(err)
            }
        }
    }
}

impl Drop for WriteTransaction {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.take() {
            warn!("Write transaction abandoned, closing its connection");
            drop(conn.detach());
        }
    }
}

fn pair_from_row(row: &SqliteRow) -> StoreResult<CurrencyPair> {
    Ok(CurrencyPair::new(
        CurrencyId::new(row.try_get("currency_id")?),
        CurrencyCode::unchecked(row.try_get::<String, _>("domain")?),
        CurrencyCode::unchecked(row.try_get::<String, _>("codomain")?),
    ))
}

fn observation_from_row(row: &SqliteRow) -> StoreResult<RateObservation> {
    Ok(RateObservation::new(
        RateId::new(row.try_get("currency_rate_id")?),
        CurrencyId::new(row.try_get("currency_id")?),
        row.try_get::<NaiveDate, _>("date")?,
        row.try_get("rate")?,
    ))
}

async fn select_pair(
    conn: &mut SqliteConnection,
    domain: &CurrencyCode,
    codomain: &CurrencyCode,
) -> StoreResult<Option<CurrencyPair>> {
    let row = sqlx::query("SELECT currency_id, domain, codomain FROM currencies WHERE domain = ? AND codomain = ?")
        .bind(domain.as_str())
        .bind(codomain.as_str())
        .fetch_optional(conn)
        .await?;

    row.as_ref().map(pair_from_row).transpose()
}

async fn insert_pair_row(
    conn: &mut SqliteConnection,
    domain: &CurrencyCode,
    codomain: &CurrencyCode,
) -> StoreResult<CurrencyPair> {
    let result = sqlx::query("INSERT INTO currencies (domain, codomain) VALUES (?, ?)")
        .bind(domain.as_str())
        .bind(codomain.as_str())
        .execute(conn)
        .await
        .map_err(|e| {
            StoreError::from_write(e, || format!("currency pair {}/{} already exists", domain, codomain))
        })?;

    Ok(CurrencyPair::new(
        CurrencyId::new(result.last_insert_rowid()),
        domain.clone(),
        codomain.clone(),
    ))
}

async fn select_observation(
    conn: &mut SqliteConnection,
    currency_id: CurrencyId,
    date: NaiveDate,
) -> StoreResult<Option<RateObservation>> {
    let row = sqlx::query(
        "SELECT currency_rate_id, currency_id, rate, date FROM currency_rates \
         WHERE currency_id = ? AND date = ?",
    )
    .bind(currency_id.get())
    .bind(date)
    .fetch_optional(conn)
    .await?;

    row.as_ref().map(observation_from_row).transpose()
}

async fn delete_pair_row(
    conn: &mut SqliteConnection,
    currency_id: CurrencyId,
) -> StoreResult<Option<CurrencyPair>> {
    let row = sqlx::query("SELECT currency_id, domain, codomain FROM currencies WHERE currency_id = ?")
        .bind(currency_id.get())
        .fetch_optional(&mut *conn)
        .await?;
    let existing = row.as_ref().map(pair_from_row).transpose()?;

    if existing.is_some() {
        // currency_rates rows go with it through ON DELETE CASCADE
        sqlx::query("DELETE FROM currencies WHERE currency_id = ?")
            .bind(currency_id.get())
            .execute(&mut *conn)
            .await?;
    }

    Ok(existing)
}

/// Find-or-create the pair, then insert or overwrite the day's rate.
async fn upsert_rows(
    conn: &mut SqliteConnection,
    domain: &CurrencyCode,
    codomain: &CurrencyCode,
    date: NaiveDate,
    rate: f64,
) -> StoreResult<Upserted> {
    let (pair, pair_created) = match select_pair(&mut *conn, domain, codomain).await? {
        Some(pair) => (pair, false),
        None => (insert_pair_row(&mut *conn, domain, codomain).await?, true),
    };

    let existing = select_observation(&mut *conn, pair.currency_id, date).await?;
    let observation_created = existing.is_none();

    let observation = match existing {
        None => {
            let result = sqlx::query("INSERT INTO currency_rates (currency_id, rate, date) VALUES (?, ?, ?)")
                .bind(pair.currency_id.get())
                .bind(rate)
                .bind(date)
                .execute(&mut *conn)
                .await
                .map_err(|e| {
                    StoreError::from_write(e, || format!("rate for {} on {} already exists", pair, date))
                })?;

            RateObservation::new(RateId::new(result.last_insert_rowid()), pair.currency_id, date, rate)
        }
        Some(mut observation) => {
            sqlx::query("UPDATE currency_rates SET rate = ? WHERE currency_rate_id = ?")
                .bind(rate)
                .bind(observation.currency_rate_id.get())
                .execute(&mut *conn)
                .await?;

            observation.rate = rate;
            observation
        }
    };

    Ok(Upserted {
        pair,
        observation,
        pair_created,
        observation_created,
    })
}

#[async_trait]
impl RateStore for SqliteRateStore {
    async fn insert_pair(
        &self,
        domain: &CurrencyCode,
        codomain: &CurrencyCode,
    ) -> StoreResult<CurrencyPair> {
        let mut conn = self.pool.acquire().await?;
        insert_pair_row(&mut conn, domain, codomain).await
    }

    async fn find_pair(
        &self,
        domain: &CurrencyCode,
        codomain: &CurrencyCode,
    ) -> StoreResult<Option<CurrencyPair>> {
        let mut conn = self.pool.acquire().await?;
        select_pair(&mut conn, domain, codomain).await
    }

    async fn delete_pair(&self, currency_id: CurrencyId) -> StoreResult<Option<CurrencyPair>> {
        let mut tx = WriteTransaction::begin(&self.pool).await?;
        let result = delete_pair_row(tx.connection()?, currency_id).await;
        tx.finish(result).await
    }

    async fn list_pairs(&self) -> StoreResult<Vec<CurrencyPair>> {
        sqlx::query("SELECT currency_id, domain, codomain FROM currencies ORDER BY currency_id")
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(pair_from_row)
            .collect()
    }

    async fn upsert_observation(
        &self,
        domain: &CurrencyCode,
        codomain: &CurrencyCode,
        date: NaiveDate,
        rate: f64,
    ) -> StoreResult<Upserted> {
        let mut tx = WriteTransaction::begin(&self.pool).await?;
        let result = upsert_rows(tx.connection()?, domain, codomain, date, rate).await;
        let upserted = tx.finish(result).await?;

        debug!(
            pair = %upserted.pair,
            date = %date,
            pair_created = upserted.pair_created,
            observation_created = upserted.observation_created,
            "Upserted observation"
        );

        Ok(upserted)
    }

    async fn observations_after(
        &self,
        currency_id: CurrencyId,
        after: NaiveDate,
    ) -> StoreResult<Vec<RateObservation>> {
        sqlx::query(
            "SELECT currency_rate_id, currency_id, rate, date FROM currency_rates \
             WHERE currency_id = ? AND date > ? ORDER BY date",
        )
        .bind(currency_id.get())
        .bind(after)
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(observation_from_row)
        .collect()
    }

    async fn pairs_with_observation_on(&self, date: NaiveDate) -> StoreResult<Vec<CurrencyPair>> {
        sqlx::query(
            "SELECT c.currency_id, c.domain, c.codomain FROM currencies c \
             WHERE EXISTS (SELECT 1 FROM currency_rates r WHERE r.currency_id = c.currency_id AND r.date = ?) \
             ORDER BY c.currency_id",
        )
        .bind(date)
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(pair_from_row)
        .collect()
    }

    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").fetch_one(&self.pool).await?;
        Ok(())
    }
}
