//! Promotion and scoring engine for a spreadsheet-backed community roster.
//!
//! The roster lives in a tabular store (`store`). A rank ladder is read from
//! a dedicated region of the same sheet (`ladder`). Battle logs are scored
//! into point totals (`scoring`), members are promoted along the ladder
//! (`promotion`), and server members are bulk-imported (`sync`). Every write
//! goes through `persist`, which paces batches and backs off on quota errors.
//!
//! `commands` ties these together into the bot's command surface on top of
//! the `chat` platform trait.

pub mod chat;
pub mod commands;
pub mod config;
pub mod error;
pub mod fakes;
pub mod ladder;
pub mod models;
pub mod persist;
pub mod promotion;
pub mod reactions;
pub mod scoring;
pub mod store;
pub mod sync;
pub mod utils;

pub use chat::{ChatError, ChatPlatform, Member};
pub use commands::{Commands, Invocation, Reply};
pub use config::EngineConfig;
pub use error::{EngineError, EngineResult};
pub use ladder::{RankLadder, Requirement};
pub use models::{AggregatedStat, BattleLogEntry, PromotionRecord, RosterEntry};
pub use persist::RetryingPersister;
pub use promotion::{PromotionEngine, PromotionOutcome};
pub use scoring::ScoringAggregator;
pub use store::{MemoryStore, Row, SheetsClient, StoreError, TabularStore};
pub use sync::RosterSyncOrchestrator;
