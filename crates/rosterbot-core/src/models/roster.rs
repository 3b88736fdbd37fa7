use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::RosterColumns;
use crate::ladder::RankLadder;
use crate::store::Row;

/// Cell values that turn the manual promotion flag on.
const FLAG_TRUE_VALUES: [&str; 2] = ["yes", "true"];

/// Cell value written for a set manual promotion flag.
const FLAG_SET: &str = "yes";

/// One member's rank and combat state, as stored in a roster row.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RosterEntry {
    pub member_id: String,
    pub display_name: String,
    pub current_rank: String,
    pub projected_next_rank: String,
    pub next_rank_points: u32,
    pub points_until_promotion: u32,
    pub current_points: u32,
    pub kills: u32,
    pub deaths: u32,
    pub assists: u32,
    pub battles: u32,
    pub manual_promotion: bool,
}

impl RosterEntry {
    /// Fresh entry at `rank` with zero stats and the projection for the
    /// rank after it.
    pub fn bootstrap(member_id: &str, display_name: &str, rank: &str, ladder: &RankLadder) -> Self {
        let next = ladder.next_of(rank);
        let next_points = ladder.requirement(next).map(|r| r.points()).unwrap_or(0);
        Self {
            member_id: member_id.to_string(),
            display_name: display_name.to_string(),
            current_rank: rank.to_string(),
            projected_next_rank: next.to_string(),
            next_rank_points: next_points,
            points_until_promotion: next_points,
            ..Self::default()
        }
    }

    /// Typed read of a row. Counters that are blank or not numbers read as 0.
    pub fn from_row(row: &Row, columns: &RosterColumns) -> Self {
        Self {
            member_id: row.get(&columns.member_id).trim().to_string(),
            display_name: row.get(&columns.display_name).trim().to_string(),
            current_rank: row.get(&columns.current_rank).trim().to_string(),
            projected_next_rank: row.get(&columns.projected_next_rank).trim().to_string(),
            next_rank_points: parse_counter(row, &columns.next_rank_points),
            points_until_promotion: parse_counter(row, &columns.points_until_promotion),
            current_points: parse_counter(row, &columns.current_points),
            kills: parse_counter(row, &columns.kills),
            deaths: parse_counter(row, &columns.deaths),
            assists: parse_counter(row, &columns.assists),
            battles: parse_counter(row, &columns.battles),
            manual_promotion: flag_is_set(row, columns),
        }
    }

    /// Write fields whose rendered cell differs from what the row holds.
    /// Numbers compare by value ("05" matches 5), but a blank cell never
    /// matches a computed 0. Returns true when at least one cell was modified.
    pub fn apply_to(&self, row: &mut Row, columns: &RosterColumns) -> bool {
        let stored_flag = flag_is_set(row, columns);
        let mut changed = false;

        for (column, value) in self.to_cells(columns) {
            if column != columns.manual_promotion {
                changed |= row.set_if_changed(&column, &value);
            }
        }
        // "no" and "" both read as unset
        if stored_flag != self.manual_promotion {
            row.set(&columns.manual_promotion, flag_cell(self.manual_promotion));
            changed = true;
        }

        changed
    }

    /// Full cell map for appending a new row.
    pub fn to_cells(&self, columns: &RosterColumns) -> BTreeMap<String, String> {
        let mut cells = BTreeMap::new();
        cells.insert(columns.member_id.clone(), self.member_id.clone());
        cells.insert(columns.display_name.clone(), self.display_name.clone());
        cells.insert(columns.current_rank.clone(), self.current_rank.clone());
        cells.insert(columns.projected_next_rank.clone(), self.projected_next_rank.clone());
        cells.insert(columns.next_rank_points.clone(), self.next_rank_points.to_string());
        cells.insert(
            columns.points_until_promotion.clone(),
            self.points_until_promotion.to_string(),
        );
        cells.insert(columns.current_points.clone(), self.current_points.to_string());
        cells.insert(columns.kills.clone(), self.kills.to_string());
        cells.insert(columns.deaths.clone(), self.deaths.to_string());
        cells.insert(columns.assists.clone(), self.assists.to_string());
        cells.insert(columns.battles.clone(), self.battles.to_string());
        cells.insert(
            columns.manual_promotion.clone(),
            flag_cell(self.manual_promotion).to_string(),
        );
        cells
    }
}

fn flag_is_set(row: &Row, columns: &RosterColumns) -> bool {
    let flag = row.get(&columns.manual_promotion).trim().to_lowercase();
    FLAG_TRUE_VALUES.contains(&flag.as_str())
}

fn flag_cell(set: bool) -> &'static str {
    if set {
        FLAG_SET
    } else {
        ""
    }
}

fn parse_counter(row: &Row, column: &str) -> u32 {
    let raw = row.get(column).trim();
    if raw.is_empty() {
        return 0;
    }
    if let Ok(n) = raw.parse::<u32>() {
        return n;
    }
    match raw.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => v.min(u32::MAX as f64) as u32,
        _ => {
            debug!(column = %column, value = %raw, "Non-numeric counter cell read as 0");
            0
        }
    }
}

/// One promotion decided by a promotion run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromotionRecord {
    pub member_id: String,
    pub from_rank: String,
    pub to_rank: String,
}
