//! Battle-log scoring.
//!
//! An audit paste is a list of records `name,kills,deaths,assists` split by
//! a configured separator. Records are summed per member key, the top
//! performer is picked, and each member earns bonus points according to
//! the configured `ScoringPolicy`.
//!
//! A member name may carry its canonical identifier in a trailing
//! `(@identifier)` marker; the identifier is then the aggregation key.

use std::collections::HashMap;

use tracing::{debug, info, warn};

use crate::config::{EngineConfig, RosterColumns, ScoringPolicy};
use crate::error::{EngineError, EngineResult};
use crate::models::{AggregatedStat, BattleLogEntry, RosterEntry};
use crate::persist::RetryingPersister;
use crate::store::TabularStore;

/// Fields per audit record: name, kills, deaths, assists.
const RECORD_FIELDS: usize = 4;

/// Result of parsing one audit paste.
#[derive(Debug, Default)]
pub struct ParsedLog {
    pub entries: Vec<BattleLogEntry>,
    /// `EngineError::MalformedRecord` for every record that was skipped.
    pub rejected: Vec<EngineError>,
}

/// Per-key sums in first-seen key order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Aggregates {
    order: Vec<String>,
    stats: HashMap<String, AggregatedStat>,
}

impl Aggregates {
    pub fn get(&self, key: &str) -> Option<&AggregatedStat> {
        self.stats.get(key)
    }

    /// Entries in the order their key first appeared in the input.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &AggregatedStat)> {
        self.order
            .iter()
            .filter_map(|k| self.stats.get(k).map(|s| (k.as_str(), s)))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Key with strictly the most kills; ties go to the earliest key.
    pub fn top_performer(&self) -> Option<(&str, &AggregatedStat)> {
        let mut best: Option<(&str, &AggregatedStat)> = None;
        for (key, stat) in self.iter() {
            match best {
                Some((_, b)) if stat.kills <= b.kills => {}
                _ => best = Some((key, stat)),
            }
        }
        best
    }
}

/// What happened to one aggregated member during an audit.
#[derive(Debug, Clone, PartialEq)]
pub enum AuditOutcome {
    Applied {
        key: String,
        stat: AggregatedStat,
        bonus: u32,
    },
    NotFound {
        key: String,
    },
}

#[derive(Debug, Clone)]
pub struct ScoringAggregator {
    policy: ScoringPolicy,
    separator: String,
}

impl ScoringAggregator {
    pub fn new(policy: ScoringPolicy, separator: impl Into<String>) -> Self {
        Self {
            policy,
            separator: separator.into(),
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.scoring.clone(), config.audit_separator.clone())
    }

    /// Split a paste into records and parse each one. Blank records are
    /// ignored; malformed ones are rejected individually.
    pub fn parse(&self, raw: &str) -> ParsedLog {
        let mut parsed = ParsedLog::default();
        for (i, record) in raw.trim().split(self.separator.as_str()).enumerate() {
            if record.trim().is_empty() {
                continue;
            }
            match parse_record(i + 1, record) {
                Ok(entry) => parsed.entries.push(entry),
                Err(e) => {
                    warn!(error = %e, "Skipping malformed audit record");
                    parsed.rejected.push(e);
                }
            }
        }
        debug!(
            accepted = parsed.entries.len(),
            rejected = parsed.rejected.len(),
            "Parsed audit input"
        );
        parsed
    }

    pub fn aggregate(entries: &[BattleLogEntry]) -> Aggregates {
        let mut aggregates = Aggregates::default();
        for entry in entries {
            if !aggregates.stats.contains_key(&entry.member_key) {
                aggregates.order.push(entry.member_key.clone());
            }
            aggregates
                .stats
                .entry(entry.member_key.clone())
                .or_default()
                .add(entry);
        }
        aggregates
    }

    pub fn compute_bonus(&self, stat: &AggregatedStat, is_top_performer: bool) -> u32 {
        let p = &self.policy;
        let mut bonus = p.per_entry_points.saturating_mul(stat.entries);
        if stat.kills >= p.kill_bonus_threshold {
            bonus = bonus.saturating_add(p.kill_bonus);
        }
        if stat.assists >= p.assist_bonus_threshold {
            bonus = bonus.saturating_add(p.assist_bonus);
        }
        if is_top_performer {
            bonus = bonus.saturating_add(p.top_performer_bonus);
        }
        bonus
    }

    /// Add aggregated stats and bonus points to matching roster rows.
    ///
    /// Rows are matched by display name, case-insensitively. A persistence
    /// failure aborts the remaining batch; rows already written stay written.
    pub async fn apply(
        &self,
        store: &dyn TabularStore,
        persister: &RetryingPersister,
        columns: &RosterColumns,
        aggregates: &Aggregates,
    ) -> EngineResult<Vec<AuditOutcome>> {
        let top = aggregates.top_performer().map(|(k, _)| k.to_string());
        let mut rows = store.rows().await?;
        let mut outcomes = Vec::with_capacity(aggregates.len());

        for (key, stat) in aggregates.iter() {
            let wanted = key.to_lowercase();
            let Some(row) = rows
                .iter_mut()
                .find(|r| r.get(&columns.display_name).trim().to_lowercase() == wanted)
            else {
                warn!(member = %key, "Audited member not found in roster");
                outcomes.push(AuditOutcome::NotFound { key: key.to_string() });
                continue;
            };

            let bonus = self.compute_bonus(stat, top.as_deref() == Some(key));
            let mut entry = RosterEntry::from_row(row, columns);
            credit(&mut entry, stat, bonus);
            let changed = entry.apply_to(row, columns);
            persister.save_if_changed(store, row, changed, key).await?;

            debug!(member = %key, bonus, kills = stat.kills, "Audit applied");
            outcomes.push(AuditOutcome::Applied {
                key: key.to_string(),
                stat: *stat,
                bonus,
            });
        }

        info!(members = outcomes.len(), "Audit batch complete");
        Ok(outcomes)
    }
}

/// Add one batch's stats to an entry: counters, points, one battle, and the
/// refreshed distance to the stored next-rank requirement.
pub fn credit(entry: &mut RosterEntry, stat: &AggregatedStat, bonus: u32) {
    entry.kills = entry.kills.saturating_add(stat.kills);
    entry.deaths = entry.deaths.saturating_add(stat.deaths);
    entry.assists = entry.assists.saturating_add(stat.assists);
    entry.current_points = entry.current_points.saturating_add(bonus);
    entry.battles = entry.battles.saturating_add(1);
    entry.points_until_promotion = entry.next_rank_points.saturating_sub(entry.current_points);
}

/// Aggregation key for a record's name field.
pub fn member_key(name: &str) -> String {
    let name = name.trim();
    if let Some(inner) = name.strip_suffix(')') {
        if let Some(start) = inner.rfind("(@") {
            let id = inner[start + 2..].trim();
            if !id.is_empty() {
                return id.to_string();
            }
        }
    }
    name.to_string()
}

fn parse_record(index: usize, record: &str) -> EngineResult<BattleLogEntry> {
    let malformed = |reason: String| EngineError::MalformedRecord {
        index,
        record: record.trim().to_string(),
        reason,
    };

    let fields: Vec<&str> = record.split(',').collect();
    if fields.len() != RECORD_FIELDS {
        return Err(malformed(format!(
            "expected {} comma-separated fields, found {}",
            RECORD_FIELDS,
            fields.len()
        )));
    }

    let key = member_key(fields[0]);
    if key.is_empty() {
        return Err(malformed("missing member name".to_string()));
    }

    let count = |label: &str, raw: &str| {
        let raw = raw.trim();
        raw.parse::<u32>().map_err(|_| {
            malformed(format!("{} {:?} is not a non-negative whole number", label, raw))
        })
    };

    Ok(BattleLogEntry {
        member_key: key,
        kills: count("kills", fields[1])?,
        deaths: count("deaths", fields[2])?,
        assists: count("assists", fields[3])?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PacingConfig, RetryPolicy};
    use crate::store::{MemoryStore, Row};
    use std::collections::BTreeMap;

    fn policy() -> ScoringPolicy {
        ScoringPolicy {
            per_entry_points: 15,
            kill_bonus_threshold: 20,
            kill_bonus: 5,
            assist_bonus_threshold: 20,
            assist_bonus: 1,
            top_performer_bonus: 10,
        }
    }

    fn aggregator(separator: &str) -> ScoringAggregator {
        ScoringAggregator::new(policy(), separator)
    }

    #[test]
    fn test_aggregate_sums_same_key() {
        let parsed = aggregator("\n").parse("Alice,10,2,3\nAlice,5,1,1");
        assert!(parsed.rejected.is_empty());
        let agg = ScoringAggregator::aggregate(&parsed.entries);
        assert_eq!(
            agg.get("Alice"),
            Some(&AggregatedStat {
                kills: 15,
                deaths: 3,
                assists: 4,
                entries: 2
            })
        );
    }

    #[test]
    fn test_separator_is_configurable() {
        let parsed = aggregator("!").parse("Alice,1,0,0!Bob,2,0,0!");
        assert_eq!(parsed.entries.len(), 2);
        assert_eq!(parsed.entries[1].member_key, "Bob");

        // With "!" as the separator a newline paste is one bad record
        let parsed = aggregator("!").parse("Alice,1,0,0\nBob,2,0,0");
        assert!(parsed.entries.is_empty());
        assert_eq!(parsed.rejected.len(), 1);
    }

    #[test]
    fn test_identifier_marker_is_key() {
        assert_eq!(member_key("Sir Alice (@alice_rbx)"), "alice_rbx");
        assert_eq!(member_key("  Bob  "), "Bob");
        assert_eq!(member_key("Carol (@)"), "Carol (@)");
        assert_eq!(member_key("Dan (sniper)"), "Dan (sniper)");

        let parsed = aggregator("\n").parse("Sir Alice (@alice),3,0,0\nalice fan (@alice),2,0,0");
        let agg = ScoringAggregator::aggregate(&parsed.entries);
        assert_eq!(agg.get("alice").map(|s| s.kills), Some(5));
    }

    #[test]
    fn test_malformed_records_skipped_not_poisoning() {
        let input = "Alice,10,2,3\nBob,ten,0,0\nCarol,1,2\nAlice,1,1,1\nDave,-1,0,0\n,1,1,1";
        let parsed = aggregator("\n").parse(input);
        assert_eq!(parsed.entries.len(), 2);
        assert_eq!(parsed.rejected.len(), 4);
        assert!(parsed
            .rejected
            .iter()
            .all(|e| matches!(e, EngineError::MalformedRecord { .. })));
        assert!(matches!(
            parsed.rejected[0],
            EngineError::MalformedRecord { index: 2, .. }
        ));

        let agg = ScoringAggregator::aggregate(&parsed.entries);
        assert_eq!(agg.len(), 1);
        assert_eq!(agg.get("Alice").map(|s| s.kills), Some(11));
    }

    #[test]
    fn test_blank_records_ignored() {
        let parsed = aggregator("\n").parse("\n\nAlice,1,0,0\n   \n");
        assert_eq!(parsed.entries.len(), 1);
        assert!(parsed.rejected.is_empty());
    }

    #[test]
    fn test_aggregation_independent_of_record_order() {
        let records = ["A,1,2,3", "B,4,5,6", "A,7,8,9", "C,0,0,1", "B,1,1,1"];
        let forward = aggregator("\n").parse(&records.join("\n"));
        let mut reversed_records = records;
        reversed_records.reverse();
        let backward = aggregator("\n").parse(&reversed_records.join("\n"));

        let f = ScoringAggregator::aggregate(&forward.entries);
        let b = ScoringAggregator::aggregate(&backward.entries);
        for key in ["A", "B", "C"] {
            assert_eq!(f.get(key), b.get(key));
        }
    }

    #[test]
    fn test_top_performer_tie_goes_to_first_key() {
        let parsed = aggregator("\n").parse("Zed,8,0,0\nAmy,8,0,0\nBo,3,0,0");
        let agg = ScoringAggregator::aggregate(&parsed.entries);
        assert_eq!(agg.top_performer().map(|(k, _)| k), Some("Zed"));

        let parsed = aggregator("\n").parse("Bo,3,0,0\nAmy,9,0,0\nZed,8,0,0");
        let agg = ScoringAggregator::aggregate(&parsed.entries);
        assert_eq!(agg.top_performer().map(|(k, _)| k), Some("Amy"));

        assert!(Aggregates::default().top_performer().is_none());
    }

    #[test]
    fn test_top_performer_with_zero_kills() {
        let parsed = aggregator("\n").parse("Amy,0,1,0\nBo,0,2,0");
        let agg = ScoringAggregator::aggregate(&parsed.entries);
        assert_eq!(agg.top_performer().map(|(k, _)| k), Some("Amy"));
    }

    #[test]
    fn test_compute_bonus() {
        let a = aggregator("\n");
        let stat = AggregatedStat {
            kills: 20,
            deaths: 0,
            assists: 19,
            entries: 2,
        };
        assert_eq!(a.compute_bonus(&stat, false), 30 + 5);
        assert_eq!(a.compute_bonus(&stat, true), 30 + 5 + 10);

        let assists = AggregatedStat {
            assists: 20,
            entries: 1,
            ..AggregatedStat::default()
        };
        assert_eq!(a.compute_bonus(&assists, false), 15 + 1);
    }

    #[test]
    fn test_credit_refreshes_distance() {
        let mut entry = RosterEntry {
            next_rank_points: 40,
            current_points: 10,
            ..RosterEntry::default()
        };
        let stat = AggregatedStat {
            kills: 3,
            deaths: 1,
            assists: 2,
            entries: 1,
        };
        credit(&mut entry, &stat, 15);
        assert_eq!(entry.current_points, 25);
        assert_eq!(entry.points_until_promotion, 15);
        assert_eq!(entry.battles, 1);

        credit(&mut entry, &stat, 30);
        assert_eq!(entry.points_until_promotion, 0);
        assert_eq!(entry.kills, 6);
    }

    #[tokio::test(start_paused = true)]
    async fn test_apply_updates_rows_and_reports_missing() {
        let cells = |name: &str| -> BTreeMap<String, String> {
            [
                ("RobloxUsername", name),
                ("DiscordUserID", "1"),
                ("CurrentPoints", "5"),
                ("NextRankPoints", "20"),
                ("Kills", "1"),
            ]
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
        };
        let store = MemoryStore::new().with_rows(vec![cells("Alice"), cells("Bob")]);
        let persister = RetryingPersister::new(RetryPolicy::default(), &PacingConfig::default());
        let a = aggregator("\n");
        let parsed = a.parse("alice,4,1,0\nGhost,9,9,9");
        let agg = ScoringAggregator::aggregate(&parsed.entries);

        let outcomes = a
            .apply(&store, &persister, &RosterColumns::default(), &agg)
            .await
            .unwrap();

        assert_eq!(outcomes.len(), 2);
        assert!(matches!(outcomes[0], AuditOutcome::Applied { bonus: 15, .. }));
        assert_eq!(outcomes[1], AuditOutcome::NotFound { key: "Ghost".to_string() });

        let rows: Vec<Row> = store.snapshot();
        assert_eq!(rows[0].get("Kills"), "5");
        assert_eq!(rows[0].get("CurrentPoints"), "20");
        assert_eq!(rows[0].get("PointsDiff"), "0");
        assert_eq!(rows[0].get("Battles"), "1");
        assert_eq!(rows[1].get("Kills"), "1");
        assert_eq!(store.save_count(), 1);
    }
}
