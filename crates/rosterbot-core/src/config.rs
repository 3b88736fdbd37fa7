//! Engine configuration.
//!
//! Every identifier the bot needs (sheet coordinates, column headers,
//! role names, channel ids) and every product-policy number (bonus points,
//! audit record separator) lives in `EngineConfig`, which callers pass
//! explicitly into each command.
//!
//! Configuration is stored at `~/.config/rosterbot/config.json` unless
//! `ROSTERBOT_CONFIG` points elsewhere.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Application name used for config/cache directory paths
const APP_NAME: &str = "rosterbot";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable overriding the config file location
pub const CONFIG_ENV: &str = "ROSTERBOT_CONFIG";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    pub sheet: SheetConfig,
    #[serde(default)]
    pub columns: RosterColumns,
    #[serde(default)]
    pub roles: RoleConfig,
    #[serde(default)]
    pub channels: ChannelConfig,
    /// message id -> emoji -> role name
    #[serde(default)]
    pub reaction_roles: HashMap<String, HashMap<String, String>>,
    pub scoring: ScoringPolicy,
    /// Separator between records of one audit paste. Historical inputs
    /// used both "\n" and "!", so there is no default.
    pub audit_separator: String,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub pacing: PacingConfig,
    #[serde(default)]
    pub announcements: AnnouncementConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SheetConfig {
    pub spreadsheet_id: String,
    pub sheet_name: String,
    #[serde(default = "default_ladder_range")]
    pub ladder_range: String,
}

fn default_ladder_range() -> String {
    "L1:M100".to_string()
}

/// Header names of the roster columns.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RosterColumns {
    pub display_name: String,
    pub member_id: String,
    pub current_rank: String,
    pub projected_next_rank: String,
    pub current_points: String,
    pub next_rank_points: String,
    pub points_until_promotion: String,
    pub kills: String,
    pub deaths: String,
    pub assists: String,
    pub battles: String,
    pub manual_promotion: String,
}

impl Default for RosterColumns {
    fn default() -> Self {
        Self {
            display_name: "RobloxUsername".to_string(),
            member_id: "DiscordUserID".to_string(),
            current_rank: "OldRank".to_string(),
            projected_next_rank: "NewRank".to_string(),
            current_points: "CurrentPoints".to_string(),
            next_rank_points: "NextRankPoints".to_string(),
            points_until_promotion: "PointsDiff".to_string(),
            kills: "Kills".to_string(),
            deaths: "Deaths".to_string(),
            assists: "Assists".to_string(),
            battles: "Battles".to_string(),
            manual_promotion: "ManualPromotion".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleConfig {
    pub admin: String,
    pub verified: String,
    pub high_command: String,
    pub unassigned: String,
    /// Granted alongside the starting rank on enlistment.
    pub enlist_extra: Vec<String>,
    /// Role id pinged at the end of a promotion announcement.
    pub promotion_ping: Option<String>,
}

impl Default for RoleConfig {
    fn default() -> Self {
        Self {
            admin: "Admin".to_string(),
            verified: "Verified".to_string(),
            high_command: "highcode".to_string(),
            unassigned: "Unassigned".to_string(),
            enlist_extra: Vec::new(),
            promotion_ping: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChannelConfig {
    /// Channel *name* the enlist command must be used in.
    pub enlistment: String,
    pub general: Option<String>,
    pub announcements: Option<String>,
    pub bot_logs: Option<String>,
    pub performance: Option<String>,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        Self {
            enlistment: "enlistment".to_string(),
            general: None,
            announcements: None,
            bot_logs: None,
            performance: None,
        }
    }
}

/// Audit bonus policy. All values are required in the config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringPolicy {
    pub per_entry_points: u32,
    pub kill_bonus_threshold: u32,
    pub kill_bonus: u32,
    pub assist_bonus_threshold: u32,
    pub assist_bonus: u32,
    pub top_performer_bonus: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_ms: u64,
    pub cap_ms: u64,
    pub jitter_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_ms: 1000,
            cap_ms: 15_000,
            jitter_ms: 300,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PacingConfig {
    /// Fixed sleep after each row write in a batch.
    pub write_delay_ms: u64,
    /// Import progress is reported every N members.
    pub progress_every: usize,
}

impl Default for PacingConfig {
    fn default() -> Self {
        Self {
            write_delay_ms: 1200,
            progress_every: 5,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnouncementConfig {
    pub promotion_title: String,
    pub promotion_subtitle: String,
    pub promotion_line_prefix: String,
    pub promotion_footer: String,
    pub performance_title: String,
    pub performance_footer: String,
}

impl Default for AnnouncementConfig {
    fn default() -> Self {
        Self {
            promotion_title: "# TO BE RAISED TO THE RANKS OF:".to_string(),
            promotion_subtitle: "This week's promotions".to_string(),
            promotion_line_prefix: "-".to_string(),
            promotion_footer: "Good job everyone, keep up the good work!".to_string(),
            performance_title: "Todays battles performance:".to_string(),
            performance_footer: "Good job everyone!".to_string(),
        }
    }
}

impl EngineConfig {
    /// Load from `$ROSTERBOT_CONFIG` or the default config path.
    pub fn load() -> Result<Self> {
        let path = match std::env::var(CONFIG_ENV) {
            Ok(p) if !p.trim().is_empty() => PathBuf::from(p),
            _ => Self::config_path()?,
        };
        Self::load_from(&path)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values that would only fail later, mid-batch.
    pub fn validate(&self) -> EngineResult<()> {
        let invalid = |msg: &str| Err(EngineError::Config(msg.to_string()));
        if self.audit_separator.is_empty() {
            return invalid("audit_separator must not be empty");
        }
        if self.sheet.ladder_range.trim().is_empty() {
            return invalid("sheet.ladder_range must not be empty");
        }
        if self.retry.max_attempts == 0 {
            return invalid("retry.max_attempts must be at least 1");
        }
        if self.pacing.progress_every == 0 {
            return invalid("pacing.progress_every must be at least 1");
        }
        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Cache directory for offline snapshots and logs, per spreadsheet.
    pub fn cache_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME).join(&self.sheet.spreadsheet_id))
    }
}
