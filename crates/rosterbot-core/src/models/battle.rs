use serde::{Deserialize, Serialize};

/// One parsed audit record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BattleLogEntry {
    pub member_key: String,
    pub kills: u32,
    pub deaths: u32,
    pub assists: u32,
}

/// Summed stats for one member key across an audit batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AggregatedStat {
    pub kills: u32,
    pub deaths: u32,
    pub assists: u32,
    /// Number of records that contributed.
    pub entries: u32,
}

impl AggregatedStat {
    pub fn add(&mut self, entry: &BattleLogEntry) {
        self.kills = self.kills.saturating_add(entry.kills);
        self.deaths = self.deaths.saturating_add(entry.deaths);
        self.assists = self.assists.saturating_add(entry.assists);
        self.entries = self.entries.saturating_add(1);
    }
}
