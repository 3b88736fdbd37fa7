use super::{failure, Commands, Invocation, Reply};
use crate::chat::mention;
use crate::error::EngineResult;
use crate::models::RosterEntry;

impl<'a> Commands<'a> {
    /// Rank, distance to promotion and combat record of one member.
    pub async fn stats(&self, _inv: &Invocation, target_id: &str) -> Reply {
        match self.try_stats(target_id).await {
            Ok(reply) => reply,
            Err(e) => failure("retrieving stats", &e),
        }
    }

    async fn try_stats(&self, target_id: &str) -> EngineResult<Reply> {
        let who = mention(target_id);
        let Some(row) = self.find_row(target_id).await? else {
            return Ok(Reply::private(format!("❌ {} is not in the roster.", who)));
        };

        let columns = &self.config.columns;
        let entry = RosterEntry::from_row(&row, columns);
        let rank = if entry.current_rank.is_empty() {
            "Unknown"
        } else {
            entry.current_rank.as_str()
        };
        let until = if row.get(&columns.points_until_promotion).trim().is_empty() {
            "N/A".to_string()
        } else {
            entry.points_until_promotion.to_string()
        };

        Ok(Reply::public(format!(
            "{who} is currently a {rank} and {until} points from a promotion!\n\
             {who} currently has {} kills and {} deaths.",
            entry.kills, entry.deaths
        )))
    }
}
