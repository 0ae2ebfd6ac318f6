//! PostgreSQL-backed breaker store.
//!
//! One row per service in `warden_circuit_breakers`; `INSERT .. ON CONFLICT
//! DO NOTHING` gives atomic create-if-absent across processes. Queries are
//! runtime-checked so the crate builds without a database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};

use super::CircuitBreakerStore;
use crate::error::{Result, WardenError};
use crate::models::{CircuitBreakerRecord, CircuitState};

#[derive(Debug, Clone)]
pub struct PostgresCircuitBreakerStore {
    pool: PgPool,
}

/// Raw row shape; `state` is stored as text and validated on the way out.
#[derive(Debug, FromRow)]
struct CircuitBreakerRow {
    service_name: String,
    state: String,
    failure_count: i32,
    success_count: i32,
    last_failure_at: Option<DateTime<Utc>>,
    last_success_at: Option<DateTime<Utc>>,
    opened_at: Option<DateTime<Utc>>,
}

impl TryFrom<CircuitBreakerRow> for CircuitBreakerRecord {
    type Error = WardenError;

    fn try_from(row: CircuitBreakerRow) -> Result<Self> {
        let state = CircuitState::parse(&row.state).ok_or_else(|| {
            WardenError::Storage(format!(
                "unknown circuit state '{}' for service '{}'",
                row.state, row.service_name
            ))
        })?;
        Ok(CircuitBreakerRecord {
            service_name: row.service_name,
            state,
            failure_count: row.failure_count.max(0) as u32,
            success_count: row.success_count.max(0) as u32,
            last_failure_at: row.last_failure_at,
            last_success_at: row.last_success_at,
            opened_at: row.opened_at,
        })
    }
}

impl PostgresCircuitBreakerStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the breaker table if it does not exist. Idempotent.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS warden_circuit_breakers (
                service_name     TEXT PRIMARY KEY,
                state            TEXT NOT NULL DEFAULT 'closed',
                failure_count    INTEGER NOT NULL DEFAULT 0,
                success_count    INTEGER NOT NULL DEFAULT 0,
                last_failure_at  TIMESTAMPTZ,
                last_success_at  TIMESTAMPTZ,
                opened_at        TIMESTAMPTZ
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl CircuitBreakerStore for PostgresCircuitBreakerStore {
    async fn fetch_or_create(&self, service_name: &str) -> Result<CircuitBreakerRecord> {
        sqlx::query(
            "INSERT INTO warden_circuit_breakers (service_name) VALUES ($1)
             ON CONFLICT (service_name) DO NOTHING",
        )
        .bind(service_name)
        .execute(&self.pool)
        .await?;

        let row = sqlx::query_as::<_, CircuitBreakerRow>(
            "SELECT service_name, state, failure_count, success_count,
                    last_failure_at, last_success_at, opened_at
             FROM warden_circuit_breakers WHERE service_name = $1",
        )
        .bind(service_name)
        .fetch_one(&self.pool)
        .await?;

        row.try_into()
    }

    async fn refresh(&self, service_name: &str) -> Result<Option<CircuitBreakerRecord>> {
        let row = sqlx::query_as::<_, CircuitBreakerRow>(
            "SELECT service_name, state, failure_count, success_count,
                    last_failure_at, last_success_at, opened_at
             FROM warden_circuit_breakers WHERE service_name = $1",
        )
        .bind(service_name)
        .fetch_optional(&self.pool)
        .await?;

        row.map(CircuitBreakerRecord::try_from).transpose()
    }

    async fn update(&self, record: &CircuitBreakerRecord) -> Result<()> {
        sqlx::query(
            "UPDATE warden_circuit_breakers
             SET state = $2,
                 failure_count = $3,
                 success_count = $4,
                 last_failure_at = $5,
                 last_success_at = $6,
                 opened_at = $7
             WHERE service_name = $1",
        )
        .bind(&record.service_name)
        .bind(record.state.as_str())
        .bind(record.failure_count as i32)
        .bind(record.success_count as i32)
        .bind(record.last_failure_at)
        .bind(record.last_success_at)
        .bind(record.opened_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
