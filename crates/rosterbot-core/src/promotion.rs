//! Promotion evaluation.
//!
//! Each roster entry is evaluated on its own against the ladder: the
//! projection fields are refreshed, and an eligible entry moves up exactly
//! one rank. Chat-side effects (role swaps, announcements) are left to the
//! caller, which receives every promotion that reached the sheet.

use tracing::{debug, info, warn};

use crate::config::RosterColumns;
use crate::error::{EngineError, EngineResult};
use crate::ladder::{RankLadder, Requirement};
use crate::models::{PromotionRecord, RosterEntry};
use crate::persist::RetryingPersister;
use crate::store::TabularStore;

/// Summary of one promotion run.
#[derive(Debug, Default)]
pub struct PromotionOutcome {
    pub promotions: Vec<PromotionRecord>,
    /// Rows actually written back.
    pub writes: usize,
    /// Rows skipped for a missing id, missing rank, or a rank not on the ladder.
    pub skipped: usize,
    /// Write failure that stopped the run. `promotions` still lists the
    /// rows committed before it.
    pub aborted: Option<EngineError>,
}

pub struct PromotionEngine<'a> {
    ladder: &'a RankLadder,
    columns: &'a RosterColumns,
}

impl<'a> PromotionEngine<'a> {
    pub fn new(ladder: &'a RankLadder, columns: &'a RosterColumns) -> Self {
        Self { ladder, columns }
    }

    /// Refresh one entry's projection and promote it if eligible.
    ///
    /// At most one rank is gained per evaluation. After a promotion the
    /// projection is recomputed from the rank just reached.
    ///
    /// Fails with `UnrecognizedRank` when the current rank is not on the
    /// ladder; the entry is left untouched in that case.
    pub fn evaluate(&self, entry: &mut RosterEntry) -> EngineResult<Option<PromotionRecord>> {
        if self.ladder.index_of(&entry.current_rank).is_none() {
            return Err(EngineError::UnrecognizedRank(entry.current_rank.clone()));
        }

        let requirement = self.project(entry);
        if requirement == Requirement::ManualOnly && !entry.manual_promotion {
            return Ok(None);
        }

        let eligible = entry.manual_promotion || entry.current_points >= entry.next_rank_points;
        if !eligible || entry.projected_next_rank == entry.current_rank {
            return Ok(None);
        }

        let to_rank = entry.projected_next_rank.clone();
        let record = PromotionRecord {
            member_id: entry.member_id.clone(),
            from_rank: std::mem::replace(&mut entry.current_rank, to_rank.clone()),
            to_rank,
        };
        entry.manual_promotion = false;
        self.project(entry);
        Ok(Some(record))
    }

    /// Point the projection fields at the rank after the current one.
    /// A manual-only next rank projects 0 points unless the flag is set.
    fn project(&self, entry: &mut RosterEntry) -> Requirement {
        let next = self.ladder.next_of(&entry.current_rank).to_string();
        let requirement = self
            .ladder
            .requirement(&next)
            .unwrap_or(Requirement::Points(0));

        entry.projected_next_rank = next;
        if requirement == Requirement::ManualOnly && !entry.manual_promotion {
            entry.next_rank_points = 0;
            entry.points_until_promotion = 0;
        } else {
            let needed = requirement.points();
            entry.next_rank_points = needed;
            entry.points_until_promotion = needed.saturating_sub(entry.current_points);
        }
        requirement
    }

    /// Evaluate every roster row, writing back only rows that changed.
    ///
    /// A write failure aborts the rest of the run and is recorded in
    /// `aborted`; earlier writes are kept. Failing to read the roster is
    /// returned as an error.
    pub async fn run(
        &self,
        store: &dyn TabularStore,
        persister: &RetryingPersister,
    ) -> EngineResult<PromotionOutcome> {
        let mut outcome = PromotionOutcome::default();

        for mut row in store.rows().await? {
            let mut entry = RosterEntry::from_row(&row, self.columns);
            if entry.member_id.is_empty() || entry.current_rank.is_empty() {
                outcome.skipped += 1;
                continue;
            }

            let promotion = match self.evaluate(&mut entry) {
                Ok(p) => p,
                Err(EngineError::UnrecognizedRank(rank)) => {
                    debug!(member = %entry.member_id, rank = %rank, "Rank not on ladder, skipping");
                    outcome.skipped += 1;
                    continue;
                }
                Err(e) => return Err(e),
            };

            let changed = entry.apply_to(&mut row, self.columns);
            match persister
                .save_if_changed(store, &row, changed, &entry.member_id)
                .await
            {
                Ok(true) => outcome.writes += 1,
                Ok(false) => {}
                Err(e) => {
                    warn!(member = %entry.member_id, error = %e, "Promotion run aborted");
                    outcome.aborted = Some(e);
                    break;
                }
            }

            if let Some(record) = promotion {
                debug!(
                    member = %record.member_id,
                    from = %record.from_rank,
                    to = %record.to_rank,
                    "Promoted"
                );
                outcome.promotions.push(record);
            }
        }

        info!(
            promotions = outcome.promotions.len(),
            writes = outcome.writes,
            skipped = outcome.skipped,
            "Promotion run complete"
        );
        Ok(outcome)
    }
}
