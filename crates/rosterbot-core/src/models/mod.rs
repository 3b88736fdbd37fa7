//! Data models for roster rows and audit input.
//!
//! - `RosterEntry`: typed view of one roster row, with write-if-changed
//!   application back onto the row
//! - `PromotionRecord`: one promotion decided by a run
//! - `BattleLogEntry`, `AggregatedStat`: parsed and summed audit records

pub mod battle;
pub mod roster;

pub use battle::{AggregatedStat, BattleLogEntry};
pub use roster::{PromotionRecord, RosterEntry};
