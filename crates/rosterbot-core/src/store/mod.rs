//! Tabular store collaborator.
//!
//! The roster lives in a spreadsheet: one header row naming the columns,
//! one row per member below it, and a dedicated two-column region holding
//! the rank ladder. This module defines the seam the engine talks through:
//!
//! - `TabularStore`: async row CRUD plus a raw cell-grid read
//! - `Row`: one data row as a header -> cell map
//! - `StoreError`: typed failures, with rate limiting classified once
//!
//! Implementations: `MemoryStore` (tests, offline snapshots) and
//! `SheetsClient` (Google Sheets v4 REST).

pub mod error;
pub mod memory;
pub mod sheets;

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

pub use error::StoreError;
pub use memory::MemoryStore;
pub use sheets::SheetsClient;

/// Result type for store operations
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// One data row of the roster sheet.
///
/// `position` is the 0-based index below the header row. Cells are kept as
/// the strings the sheet holds; typed reads go through `models::RosterEntry`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Row {
    pub position: usize,
    cells: BTreeMap<String, String>,
}

impl Row {
    pub fn new(position: usize, cells: BTreeMap<String, String>) -> Self {
        Self { position, cells }
    }

    /// Cell value for a column, empty when the column is absent.
    pub fn get(&self, column: &str) -> &str {
        self.cells.get(column).map(String::as_str).unwrap_or("")
    }

    pub fn set(&mut self, column: &str, value: impl Into<String>) {
        self.cells.insert(column.to_string(), value.into());
    }

    /// Set a cell only when the new value differs from the stored one.
    /// Returns true when the row was modified.
    pub fn set_if_changed(&mut self, column: &str, value: &str) -> bool {
        if cells_equal(self.get(column), value) {
            return false;
        }
        self.set(column, value);
        true
    }

    pub fn cells(&self) -> &BTreeMap<String, String> {
        &self.cells
    }
}

/// Compare two cell values the way the sheet displays them: numbers by
/// value ("20" == "20.0"), everything else as trimmed strings.
pub fn cells_equal(a: &str, b: &str) -> bool {
    let (a, b) = (a.trim(), b.trim());
    if a == b {
        return true;
    }
    match (a.parse::<f64>(), b.parse::<f64>()) {
        (Ok(x), Ok(y)) => x == y,
        _ => false,
    }
}

/// Backend-agnostic access to the roster sheet.
#[async_trait]
pub trait TabularStore: Send + Sync {
    /// All data rows below the header, in sheet order.
    async fn rows(&self) -> StoreResult<Vec<Row>>;

    /// Write every cell of an existing row back to the sheet.
    async fn save_row(&self, row: &Row) -> StoreResult<()>;

    /// Append a new row and return it with its assigned position.
    async fn add_row(&self, cells: BTreeMap<String, String>) -> StoreResult<Row>;

    /// Raw cell grid for an A1 range such as `L1:M100`. Rows may be
    /// shorter than the range width when trailing cells are empty.
    async fn read_grid(&self, range: &str) -> StoreResult<Vec<Vec<String>>>;
}
