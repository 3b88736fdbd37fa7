//! Rate-limit aware row persistence.
//!
//! The roster sheet allows roughly one write per second. Batches stay under
//! that proactively with a fixed pacing sleep after every write, and
//! `save_with_retry` reacts to quota failures with bounded exponential
//! backoff. Nothing else is ever retried.

use std::collections::BTreeMap;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use tracing::{debug, warn};

use crate::config::{PacingConfig, RetryPolicy};
use crate::error::{EngineError, EngineResult};
use crate::store::{Row, StoreResult, TabularStore};

#[derive(Debug, Clone)]
pub struct RetryingPersister {
    policy: RetryPolicy,
    write_delay: Duration,
}

impl RetryingPersister {
    pub fn new(policy: RetryPolicy, pacing: &PacingConfig) -> Self {
        Self {
            policy,
            write_delay: Duration::from_millis(pacing.write_delay_ms),
        }
    }

    /// Backoff before retry number `attempt + 1`:
    /// `min(cap, base * 2^attempt)` plus up to `jitter_ms` of random jitter.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let factor = 1u64.checked_shl(attempt).unwrap_or(u64::MAX);
        let exp = self.policy.base_ms.saturating_mul(factor).min(self.policy.cap_ms);
        let jitter = if self.policy.jitter_ms > 0 {
            rand::thread_rng().gen_range(0..=self.policy.jitter_ms)
        } else {
            0
        };
        Duration::from_millis(exp + jitter)
    }

    /// Run a write, retrying only on rate-limit failures.
    ///
    /// `member` names the row being written so an exhausted retry budget
    /// can be reported against it.
    pub async fn save_with_retry<T, F, Fut>(&self, member: &str, mut write: F) -> EngineResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = StoreResult<T>>,
    {
        let attempts = self.policy.max_attempts.max(1);
        for attempt in 0..attempts {
            match write().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_rate_limited() => {
                    if attempt + 1 == attempts {
                        break;
                    }
                    let delay = self.backoff_delay(attempt);
                    warn!(
                        member = %member,
                        attempt = attempt + 1,
                        delay_ms = delay.as_millis() as u64,
                        "Rate limited, backing off"
                    );
                    tokio::time::sleep(delay).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
        Err(EngineError::PersistenceExhausted {
            member: member.to_string(),
            attempts,
        })
    }

    /// Save an existing row with retry, then pace.
    pub async fn save_row(
        &self,
        store: &dyn TabularStore,
        row: &Row,
        member: &str,
    ) -> EngineResult<()> {
        self.save_with_retry(member, || store.save_row(row)).await?;
        self.pace().await;
        Ok(())
    }

    /// Append a row with retry, then pace.
    pub async fn add_row(
        &self,
        store: &dyn TabularStore,
        cells: &BTreeMap<String, String>,
        member: &str,
    ) -> EngineResult<Row> {
        let row = self
            .save_with_retry(member, || store.add_row(cells.clone()))
            .await?;
        self.pace().await;
        Ok(row)
    }

    /// Write-if-changed: save only when `changed`. Returns whether a write happened.
    pub async fn save_if_changed(
        &self,
        store: &dyn TabularStore,
        row: &Row,
        changed: bool,
        member: &str,
    ) -> EngineResult<bool> {
        if !changed {
            debug!(member = %member, "Row unchanged, skipping write");
            return Ok(false);
        }
        self.save_row(store, row, member).await?;
        Ok(true)
    }

    /// Fixed inter-write delay.
    pub async fn pace(&self) {
        if !self.write_delay.is_zero() {
            tokio::time::sleep(self.write_delay).await;
        }
    }
}
