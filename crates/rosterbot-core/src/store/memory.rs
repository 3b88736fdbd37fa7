//! In-memory tabular store.
//!
//! Backs the integration tests and the CLI's offline snapshot mode. Write
//! counters and scripted rate-limit failures let tests assert the
//! write-if-changed and backoff behaviour without a real spreadsheet.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;

use super::{Row, StoreError, StoreResult, TabularStore};

#[derive(Debug, Default)]
struct Inner {
    rows: Vec<Row>,
    grids: HashMap<String, Vec<Vec<String>>>,
    saves: usize,
    adds: usize,
    rate_limit_next: usize,
    writes_before_limit: usize,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed data rows, positions are reassigned in order.
    pub fn with_rows(self, cells: Vec<BTreeMap<String, String>>) -> Self {
        {
            let mut inner = self.lock();
            inner.rows = cells
                .into_iter()
                .enumerate()
                .map(|(i, c)| Row::new(i, c))
                .collect();
        }
        self
    }

    /// Seed the cell grid returned for an exact A1 range.
    pub fn with_grid(self, range: &str, grid: Vec<Vec<String>>) -> Self {
        self.lock().grids.insert(range.to_string(), grid);
        self
    }

    /// Make the next `n` writes (saves or appends) fail with `RateLimited`.
    pub fn fail_next_writes(&self, n: usize) {
        self.lock().rate_limit_next = n;
    }

    /// Let `allowed` writes through, then fail the `n` after them.
    pub fn fail_writes_after(&self, allowed: usize, n: usize) {
        let mut inner = self.lock();
        inner.writes_before_limit = allowed;
        inner.rate_limit_next = n;
    }

    /// Number of successful `save_row` calls.
    pub fn save_count(&self) -> usize {
        self.lock().saves
    }

    /// Number of successful `add_row` calls.
    pub fn add_count(&self) -> usize {
        self.lock().adds
    }

    /// Current contents of every data row.
    pub fn snapshot(&self) -> Vec<Row> {
        self.lock().rows.clone()
    }

    pub fn grid(&self, range: &str) -> Option<Vec<Vec<String>>> {
        self.lock().grids.get(range).cloned()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned lock only means a test panicked mid-write; the data is still usable.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn take_rate_limit(inner: &mut Inner) -> StoreResult<()> {
        if inner.writes_before_limit > 0 {
            inner.writes_before_limit -= 1;
            return Ok(());
        }
        if inner.rate_limit_next > 0 {
            inner.rate_limit_next -= 1;
            return Err(StoreError::RateLimited("Quota exceeded (simulated)".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl TabularStore for MemoryStore {
    async fn rows(&self) -> StoreResult<Vec<Row>> {
        Ok(self.lock().rows.clone())
    }

    async fn save_row(&self, row: &Row) -> StoreResult<()> {
        let mut inner = self.lock();
        Self::take_rate_limit(&mut inner)?;
        let slot = inner
            .rows
            .get_mut(row.position)
            .ok_or_else(|| StoreError::NotFound(format!("row {}", row.position)))?;
        *slot = row.clone();
        inner.saves += 1;
        Ok(())
    }

    async fn add_row(&self, cells: BTreeMap<String, String>) -> StoreResult<Row> {
        let mut inner = self.lock();
        Self::take_rate_limit(&mut inner)?;
        let row = Row::new(inner.rows.len(), cells);
        inner.rows.push(row.clone());
        inner.adds += 1;
        Ok(row)
    }

    async fn read_grid(&self, range: &str) -> StoreResult<Vec<Vec<String>>> {
        self.lock()
            .grids
            .get(range)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(format!("range {}", range)))
    }
}
