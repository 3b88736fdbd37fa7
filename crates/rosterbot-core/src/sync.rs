//! Bulk member import.
//!
//! Turns a chat-platform member list into bootstrapped roster rows. Each
//! new row costs one paced write, so a large server takes minutes; the
//! caller receives progress reports as the import moves along.

use std::collections::HashSet;

use tracing::{debug, info};

use crate::chat::Member;
use crate::config::RosterColumns;
use crate::error::EngineResult;
use crate::ladder::RankLadder;
use crate::models::RosterEntry;
use crate::persist::RetryingPersister;
use crate::store::TabularStore;

/// Progress of a running import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportProgress {
    pub processed: usize,
    pub added: usize,
    pub total: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportOutcome {
    pub added: usize,
    /// Members that already had a roster row.
    pub existing: usize,
    pub bots: usize,
    pub total: usize,
}

/// The first of the member's roles that names a ladder rank, in the order
/// the platform lists the roles. Returns the ladder spelling.
pub fn match_rank<'l>(member: &Member, ladder: &'l RankLadder) -> Option<&'l str> {
    member.roles.iter().find_map(|role| ladder.canonical(role))
}

/// Fresh roster entry for a member: matched rank or the ladder's first.
pub fn bootstrap_entry(member: &Member, ladder: &RankLadder) -> RosterEntry {
    let rank = match_rank(member, ladder).unwrap_or_else(|| ladder.first());
    RosterEntry::bootstrap(&member.id, member.display_name(), rank, ladder)
}

pub struct RosterSyncOrchestrator<'a> {
    ladder: &'a RankLadder,
    columns: &'a RosterColumns,
    persister: &'a RetryingPersister,
    progress_every: usize,
}

impl<'a> RosterSyncOrchestrator<'a> {
    pub fn new(
        ladder: &'a RankLadder,
        columns: &'a RosterColumns,
        persister: &'a RetryingPersister,
        progress_every: usize,
    ) -> Self {
        Self {
            ladder,
            columns,
            persister,
            progress_every: progress_every.max(1),
        }
    }

    /// Append a row for every non-bot member without one.
    ///
    /// `on_progress` fires every `progress_every` processed members and once
    /// for the last member.
    pub async fn import_members<F>(
        &self,
        store: &dyn TabularStore,
        members: &[Member],
        mut on_progress: F,
    ) -> EngineResult<ImportOutcome>
    where
        F: FnMut(ImportProgress),
    {
        let mut known: HashSet<String> = store
            .rows()
            .await?
            .iter()
            .map(|r| r.get(&self.columns.member_id).trim().to_string())
            .filter(|id| !id.is_empty())
            .collect();

        let mut outcome = ImportOutcome {
            total: members.len(),
            ..ImportOutcome::default()
        };

        for (i, member) in members.iter().enumerate() {
            if member.bot {
                outcome.bots += 1;
            } else if known.contains(&member.id) {
                debug!(member = %member.id, "Already on roster, skipping");
                outcome.existing += 1;
            } else {
                let entry = bootstrap_entry(member, self.ladder);
                self.persister
                    .add_row(store, &entry.to_cells(self.columns), &member.id)
                    .await?;
                debug!(member = %member.id, rank = %entry.current_rank, "Imported member");
                known.insert(member.id.clone());
                outcome.added += 1;
            }

            let processed = i + 1;
            if processed % self.progress_every == 0 || processed == members.len() {
                on_progress(ImportProgress {
                    processed,
                    added: outcome.added,
                    total: members.len(),
                });
            }
        }

        info!(
            added = outcome.added,
            existing = outcome.existing,
            bots = outcome.bots,
            total = outcome.total,
            "Member import complete"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{PacingConfig, RetryPolicy};
    use crate::store::MemoryStore;
    use std::collections::BTreeMap;
    use std::time::Duration;
    use tokio::time::Instant;

    fn ladder() -> RankLadder {
        RankLadder::build([("Rekrut", "0"), ("Gefreiter", "20"), ("Korporal", "40")]).unwrap()
    }

    fn member(id: &str, roles: &[&str]) -> Member {
        Member {
            id: id.to_string(),
            username: format!("user{}", id),
            nickname: None,
            roles: roles.iter().map(|r| r.to_string()).collect(),
            bot: false,
        }
    }

    fn persister(write_delay_ms: u64) -> RetryingPersister {
        RetryingPersister::new(
            RetryPolicy::default(),
            &PacingConfig {
                write_delay_ms,
                progress_every: 2,
            },
        )
    }

    #[test]
    fn test_match_rank_uses_ladder_spelling() {
        let ladder = ladder();
        let m = member("1", &["Verified", " gefreiter ", "Korporal"]);
        assert_eq!(match_rank(&m, &ladder), Some("Gefreiter"));
        assert_eq!(match_rank(&member("2", &["Verified"]), &ladder), None);
    }

    #[test]
    fn test_bootstrap_defaults_to_first_rank() {
        let ladder = ladder();
        let entry = bootstrap_entry(&member("2", &["Verified"]), &ladder);
        assert_eq!(entry.current_rank, "Rekrut");
        assert_eq!(entry.projected_next_rank, "Gefreiter");
        assert_eq!(entry.next_rank_points, 20);
        assert_eq!(entry.display_name, "user2");

        let entry = bootstrap_entry(&member("3", &["Korporal"]), &ladder);
        assert_eq!(entry.projected_next_rank, "Korporal");
        assert_eq!(entry.points_until_promotion, 40);
    }

    #[tokio::test(start_paused = true)]
    async fn test_import_skips_bots_and_existing_and_reports_progress() {
        let ladder = ladder();
        let columns = RosterColumns::default();
        let existing: BTreeMap<String, String> =
            [("DiscordUserID".to_string(), "2".to_string())].into_iter().collect();
        let store = MemoryStore::new().with_rows(vec![existing]);
        let persister = persister(1200);

        let mut bot = member("9", &[]);
        bot.bot = true;
        let members = vec![
            member("1", &["Gefreiter"]),
            member("2", &["Rekrut"]),
            bot,
            member("3", &[]),
            member("3", &[]),
        ];

        let mut reports = Vec::new();
        let start = Instant::now();
        let outcome = RosterSyncOrchestrator::new(&ladder, &columns, &persister, 2)
            .import_members(&store, &members, |p| reports.push(p))
            .await
            .unwrap();

        assert_eq!(
            outcome,
            ImportOutcome {
                added: 2,
                existing: 2,
                bots: 1,
                total: 5
            }
        );
        assert_eq!(store.add_count(), 2);
        assert_eq!(
            reports.iter().map(|p| p.processed).collect::<Vec<_>>(),
            vec![2, 4, 5]
        );
        assert_eq!(reports[2].added, 2);
        // One paced write per added member
        assert!(start.elapsed() >= Duration::from_millis(2400));

        let rows = store.snapshot();
        assert_eq!(rows[1].get("OldRank"), "Gefreiter");
        assert_eq!(rows[1].get("NewRank"), "Korporal");
        assert_eq!(rows[2].get("OldRank"), "Rekrut");
    }

    #[tokio::test]
    async fn test_import_empty_member_list() {
        let ladder = ladder();
        let columns = RosterColumns::default();
        let store = MemoryStore::new();
        let persister = persister(0);
        let mut calls = 0;

        let outcome = RosterSyncOrchestrator::new(&ladder, &columns, &persister, 5)
            .import_members(&store, &[], |_| calls += 1)
            .await
            .unwrap();

        assert_eq!(outcome.total, 0);
        assert_eq!(calls, 0);
    }
}
