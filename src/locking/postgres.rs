//! PostgreSQL-backed lock service.
//!
//! Locks live in a `warden_locks` table rather than session-scoped advisory
//! locks, so any pooled connection can release a lease and a crashed holder
//! is reclaimed by expiry. The acquire step is a single upsert that wins
//! only when the key is free or its lease has expired.

use async_trait::async_trait;
use std::time::{Duration, Instant};
use sqlx::PgPool;
use uuid::Uuid;

use super::{LockLease, LockService};
use crate::error::{Result, WardenError};

const ACQUIRE_POLL_INTERVAL: Duration = Duration::from_millis(100);

#[derive(Debug, Clone)]
pub struct PostgresLockService {
    pool: PgPool,
}

impl PostgresLockService {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Create the lock table if it does not exist. Idempotent.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS warden_locks (
                key        TEXT PRIMARY KEY,
                token      UUID NOT NULL,
                expires_at TIMESTAMPTZ NOT NULL
            )
            "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// One atomic grab attempt: insert wins on a free key, the conflict arm
    /// wins only on an expired lease.
    async fn try_acquire(&self, key: &str, ttl: Duration) -> Result<Option<LockLease>> {
        let token = Uuid::new_v4();
        let claimed = sqlx::query_scalar::<_, Uuid>(
            r#"
            INSERT INTO warden_locks (key, token, expires_at)
            VALUES ($1, $2, NOW() + $3::interval)
            ON CONFLICT (key) DO UPDATE
                SET token = EXCLUDED.token,
                    expires_at = EXCLUDED.expires_at
                WHERE warden_locks.expires_at < NOW()
            RETURNING token
            "#,
        )
        .bind(key)
        .bind(token)
        .bind(format!("{} milliseconds", ttl.as_millis()))
        .fetch_optional(&self.pool)
        .await?;

        Ok(claimed.filter(|t| *t == token).map(|token| LockLease {
            key: key.to_string(),
            token,
        }))
    }
}

#[async_trait]
impl LockService for PostgresLockService {
    async fn acquire(&self, key: &str, ttl: Duration, wait: Duration) -> Result<LockLease> {
        let started = Instant::now();
        loop {
            if let Some(lease) = self.try_acquire(key, ttl).await? {
                return Ok(lease);
            }
            if started.elapsed() >= wait {
                return Err(WardenError::LockUnavailable {
                    key: key.to_string(),
                    waited: wait,
                });
            }
            tokio::time::sleep(ACQUIRE_POLL_INTERVAL).await;
        }
    }

    async fn release(&self, lease: LockLease) -> Result<()> {
        // Owner-checked delete; a stolen or expired lease deletes nothing.
        sqlx::query("DELETE FROM warden_locks WHERE key = $1 AND token = $2")
            .bind(&lease.key)
            .bind(lease.token)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
