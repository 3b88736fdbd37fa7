//! Local roster snapshot for running commands without sheet access.
//!
//! The snapshot mirrors the sheet's row/column model: data rows as
//! header -> cell maps plus the raw ladder grid. Files live in the cache
//! directory as JSON, stamped with the time they were written.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::debug;

use rosterbot_core::store::{Row, StoreResult, TabularStore};
use rosterbot_core::{Member, MemoryStore};

const ROSTER_FILE: &str = "roster";
const MEMBERS_FILE: &str = "members";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
}

impl<T> CachedData<T> {
    pub fn new(data: T) -> Self {
        Self {
            data,
            cached_at: Utc::now(),
        }
    }

    /// Snapshot age as printed on startup, rounded down to the unit.
    pub fn age_display(&self) -> String {
        match (Utc::now() - self.cached_at).num_minutes() {
            // Also covers clock skew
            m if m < 1 => "just now".to_string(),
            m if m < 60 => format!("{}m ago", m),
            m if m < 24 * 60 => format!("{}h ago", m / 60),
            m => format!("{}d ago", m / (24 * 60)),
        }
    }
}

/// Rows and ladder grid as stored in `roster.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RosterSnapshot {
    pub rows: Vec<BTreeMap<String, String>>,
    pub ladder: Vec<Vec<String>>,
}

pub struct SnapshotCache {
    cache_dir: PathBuf,
}

impl SnapshotCache {
    pub fn new(cache_dir: PathBuf) -> Result<Self> {
        std::fs::create_dir_all(&cache_dir)?;
        Ok(Self { cache_dir })
    }

    fn cache_path(&self, name: &str) -> PathBuf {
        self.cache_dir.join(format!("{}.json", name))
    }

    /// Read one snapshot file; a file that was never written reads as `None`.
    fn read<T: DeserializeOwned>(&self, name: &str) -> Result<Option<CachedData<T>>> {
        let path = self.cache_path(name);
        let contents = match std::fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(e).with_context(|| format!("Failed to read {}", path.display()))
            }
        };
        serde_json::from_str(&contents)
            .map(Some)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    fn write<T: Serialize>(&self, name: &str, data: &T) -> Result<()> {
        let path = self.cache_path(name);
        std::fs::write(&path, serde_json::to_string_pretty(&CachedData::new(data))?)
            .with_context(|| format!("Failed to write {}", path.display()))?;
        debug!(file = %path.display(), "Saved snapshot");
        Ok(())
    }

    // ===== Roster =====

    pub fn load_roster(&self) -> Result<Option<CachedData<RosterSnapshot>>> {
        self.read(ROSTER_FILE)
    }

    pub fn save_roster(&self, roster: &RosterSnapshot) -> Result<()> {
        self.write(ROSTER_FILE, roster)
    }

    // ===== Members =====

    pub fn load_members(&self) -> Result<Option<CachedData<Vec<Member>>>> {
        self.read(MEMBERS_FILE)
    }

    pub fn save_members(&self, members: &[Member]) -> Result<()> {
        self.write(MEMBERS_FILE, &members)
    }
}

/// `TabularStore` over the snapshot. Writes land in memory until `flush`.
pub struct SnapshotStore {
    cache: SnapshotCache,
    ladder_range: String,
    memory: MemoryStore,
}

impl SnapshotStore {
    /// Open the roster snapshot; fails if none has been written yet.
    pub fn open(cache: SnapshotCache, ladder_range: &str) -> Result<(Self, String)> {
        let cached = cache.load_roster()?.ok_or_else(|| {
            anyhow::anyhow!(
                "No roster snapshot at {}. Set SHEETS_ACCESS_TOKEN to use the live sheet.",
                cache.cache_path(ROSTER_FILE).display()
            )
        })?;
        let age = cached.age_display();
        let memory = MemoryStore::new()
            .with_rows(cached.data.rows)
            .with_grid(ladder_range, cached.data.ladder);
        Ok((
            Self {
                cache,
                ladder_range: ladder_range.to_string(),
                memory,
            },
            age,
        ))
    }

    pub fn cache(&self) -> &SnapshotCache {
        &self.cache
    }

    /// Write the current rows back to `roster.json`.
    pub fn flush(&self) -> Result<()> {
        let snapshot = RosterSnapshot {
            rows: self
                .memory
                .snapshot()
                .into_iter()
                .map(|r| r.cells().clone())
                .collect(),
            ladder: self.memory.grid(&self.ladder_range).unwrap_or_default(),
        };
        self.cache.save_roster(&snapshot)
    }

    pub fn write_count(&self) -> usize {
        self.memory.save_count() + self.memory.add_count()
    }
}

#[async_trait]
impl TabularStore for SnapshotStore {
    async fn rows(&self) -> StoreResult<Vec<Row>> {
        self.memory.rows().await
    }

    async fn save_row(&self, row: &Row) -> StoreResult<()> {
        self.memory.save_row(row).await
    }

    async fn add_row(&self, cells: BTreeMap<String, String>) -> StoreResult<Row> {
        self.memory.add_row(cells).await
    }

    async fn read_grid(&self, range: &str) -> StoreResult<Vec<Vec<String>>> {
        self.memory.read_grid(range).await
    }
}
