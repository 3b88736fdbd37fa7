//! Utility functions for message formatting.

pub mod format;

pub use format::{format_timestamp, truncate_message, MESSAGE_LIMIT};
