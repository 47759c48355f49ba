use anyhow::{Context, Result};
use sqlx::{postgres::PgPoolOptions, PgPool};
use tracing::debug;

use crate::{record, CounterStore, StoreError};

pub const ENV_DB_URL: &str = "TALLY_DATABASE_URL";

/// Build a lazily-connecting pool.
///
/// Only the URL is validated here; an unreachable database surfaces later as
/// `StoreError::Unavailable` on the first read or publish.
pub fn connect(url: &str) -> Result<PgPool> {
    PgPoolOptions::new()
        .max_connections(4)
        .connect_lazy(url)
        .context("invalid Postgres connection settings")
}

/// Run embedded SQLx migrations.
pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations")
        .run(pool)
        .await
        .context("db migrate failed")?;
    Ok(())
}

/// Shared record in the `tally_counters` table.
///
/// A publish locks the row (`for update`), compares the decoded value with
/// `expected`, then updates or inserts inside the same transaction. Two
/// first writers racing on an absent row both see "no row"; the loser's
/// insert hits the primary key and is reported as a conflict.
#[derive(Debug, Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn decode_row(key: &str, raw: Option<String>) -> Result<u64, StoreError> {
    match raw {
        Some(raw) => record::decode(&raw).map_err(|e| StoreError::unavailable(key, e)),
        None => Ok(0),
    }
}

/// Postgres unique_violation is 23505.
fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().as_deref() == Some("23505"),
        _ => false,
    }
}

#[async_trait::async_trait]
impl CounterStore for PostgresStore {
    fn backend_name(&self) -> &'static str {
        "postgres"
    }

    async fn read(&self, key: &str) -> Result<u64, StoreError> {
        let raw = sqlx::query_scalar::<_, String>("select value from tally_counters where key = $1")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::unavailable(key, e))?;
        decode_row(key, raw)
    }

    async fn publish_if_unchanged(
        &self,
        key: &str,
        expected: u64,
        new_value: u64,
    ) -> Result<(), StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::unavailable(key, e))?;

        let raw = sqlx::query_scalar::<_, String>(
            "select value from tally_counters where key = $1 for update",
        )
        .bind(key)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| StoreError::unavailable(key, e))?;

        let row_exists = raw.is_some();
        let current = decode_row(key, raw)?;
        if current != expected {
            // Dropping the transaction rolls it back and releases the row lock.
            return Err(StoreError::conflict(key, expected));
        }

        let res = if row_exists {
            sqlx::query(
                r#"
                update tally_counters
                set value = $2,
                    updated_at = now()
                where key = $1
                "#,
            )
            .bind(key)
            .bind(record::encode(new_value))
            .execute(&mut *tx)
            .await
        } else {
            sqlx::query("insert into tally_counters (key, value) values ($1, $2)")
                .bind(key)
                .bind(record::encode(new_value))
                .execute(&mut *tx)
                .await
        };

        match res {
            Ok(_) => {}
            Err(e) if is_unique_violation(&e) => {
                debug!(key, expected, "concurrent first insert won the race");
                return Err(StoreError::conflict(key, expected));
            }
            Err(e) => return Err(StoreError::unavailable(key, e)),
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::unavailable(key, e))
    }
}
