//! enlist, adduser, update and member import.

use tracing::{info, warn};

use super::{failure, has_role, Commands, Invocation, Reply};
use crate::chat::{mention, Member};
use crate::error::EngineResult;
use crate::models::RosterEntry;
use crate::sync::{match_rank, ImportProgress, RosterSyncOrchestrator};

impl<'a> Commands<'a> {
    /// Enlist a verified member at the ladder's first rank.
    pub async fn enlist(&self, inv: &Invocation, target_id: &str) -> Reply {
        match self.try_enlist(inv, target_id).await {
            Ok(reply) => reply,
            Err(e) => failure("enlisting this user", &e),
        }
    }

    async fn try_enlist(&self, inv: &Invocation, target_id: &str) -> EngineResult<Reply> {
        let channels = &self.config.channels;
        let roles = &self.config.roles;

        if inv.channel_name != channels.enlistment {
            return Ok(Reply::private(format!(
                "❌ Use this command in #{} only.",
                channels.enlistment
            )));
        }
        if !has_role(inv, &roles.admin) {
            return Ok(Reply::private("❌ Only admins can use this command."));
        }
        let Some(target) = self.chat.fetch_member(target_id).await? else {
            return Ok(Reply::private("❌ That user is not a member of this server."));
        };
        if !target.has_role(&roles.verified) {
            return Ok(Reply::private("❌ That user isn't verified."));
        }
        if self.find_row(&target.id).await?.is_some() {
            return Ok(Reply::private(format!(
                "⚠️ {} is already on the roster.",
                target.mention()
            )));
        }

        let ladder = self.ladder().await?;
        let rank = ladder.first();
        let entry = RosterEntry::bootstrap(&target.id, target.display_name(), rank, &ladder);
        self.persister
            .add_row(self.store, &entry.to_cells(&self.config.columns), &target.id)
            .await?;

        for role in std::iter::once(rank).chain(roles.enlist_extra.iter().map(String::as_str)) {
            if let Err(e) = self.chat.add_role(&target.id, role).await {
                warn!(
                    member = %target.id,
                    role = %role,
                    error = %e,
                    "Failed to grant enlistment role"
                );
            }
        }
        if let Err(e) = self.chat.set_nickname(&target.id, target.display_name()).await {
            warn!(member = %target.id, error = %e, "Failed to set nickname");
        }

        self.post(
            channels.general.as_ref(),
            &format!(
                "Welcome to the regiment {}, you've been assigned as {}!",
                target.mention(),
                rank
            ),
        )
        .await;

        info!(member = %target.id, rank = %rank, "Enlisted member");
        Ok(Reply::private(format!(
            "✅ {} has been added to the roster as {}.",
            target.mention(),
            rank
        )))
    }

    /// Add a member at the rank their roles show, or refresh their row.
    pub async fn adduser(&self, _inv: &Invocation, target_id: &str) -> Reply {
        match self.try_adduser(target_id).await {
            Ok(reply) => reply,
            Err(e) => failure("adding or updating this user", &e),
        }
    }

    async fn try_adduser(&self, target_id: &str) -> EngineResult<Reply> {
        let Some(target) = self.chat.fetch_member(target_id).await? else {
            return Ok(Reply::private("❌ That user is not a member of this server."));
        };
        let ladder = self.ladder().await?;
        let rank = match_rank(&target, &ladder).unwrap_or_else(|| ladder.first());
        let columns = &self.config.columns;

        if let Some(mut row) = self.find_row(&target.id).await? {
            let mut entry = RosterEntry::from_row(&row, columns);
            entry.display_name = target.display_name().to_string();
            entry.current_rank = rank.to_string();
            let changed = entry.apply_to(&mut row, columns);
            self.persister
                .save_if_changed(self.store, &row, changed, &target.id)
                .await?;
            return Ok(Reply::private(format!("🔄 Updated {} in the roster.", target.mention())));
        }

        let entry = RosterEntry::bootstrap(&target.id, target.display_name(), rank, &ladder);
        self.persister
            .add_row(self.store, &entry.to_cells(columns), &target.id)
            .await?;
        Ok(Reply::private(format!(
            "✅ Added {} to the roster as {}.",
            target.mention(),
            rank
        )))
    }

    /// Re-derive a member's rank and projection from their current roles.
    pub async fn update(&self, _inv: &Invocation, target_id: &str) -> Reply {
        match self.try_update(target_id).await {
            Ok(reply) => reply,
            Err(e) => failure("updating this user", &e),
        }
    }

    async fn try_update(&self, target_id: &str) -> EngineResult<Reply> {
        let Some(target) = self.chat.fetch_member(target_id).await? else {
            return Ok(Reply::private("❌ That user is not a member of this server."));
        };
        let ladder = self.ladder().await?;
        let Some(rank) = match_rank(&target, &ladder) else {
            return Ok(Reply::private(
                "❌ This user has no rank role that matches the rank list.",
            ));
        };
        let Some(mut row) = self.find_row(&target.id).await? else {
            return Ok(Reply::private(format!(
                "⚠️ {} is not listed in the roster.",
                target.mention()
            )));
        };

        let columns = &self.config.columns;
        let mut entry = RosterEntry::from_row(&row, columns);
        let next = ladder.next_of(rank);
        entry.display_name = target.display_name().to_string();
        entry.current_rank = rank.to_string();
        entry.projected_next_rank = next.to_string();
        entry.next_rank_points = ladder.requirement(next).map(|r| r.points()).unwrap_or(0);
        entry.points_until_promotion = entry.next_rank_points.saturating_sub(entry.current_points);

        let changed = entry.apply_to(&mut row, columns);
        self.persister
            .save_if_changed(self.store, &row, changed, &target.id)
            .await?;

        Ok(Reply::private(format!(
            "✅ {} has been updated to **{}** in the roster.",
            mention(&target.id),
            rank
        )))
    }

    /// Import every server member without a roster row.
    ///
    /// `on_progress` receives a status line suitable for editing a deferred
    /// reply while the paced import runs.
    pub async fn import_members<F>(&self, inv: &Invocation, mut on_progress: F) -> Reply
    where
        F: FnMut(&str),
    {
        let high_command = &self.config.roles.high_command;
        if !has_role(inv, high_command) {
            return Reply::private(format!(
                "❌ You must be in {} to use this command.",
                high_command
            ));
        }
        match self.try_import(&mut on_progress).await {
            Ok(reply) => reply,
            Err(e) => failure("importing members", &e),
        }
    }

    async fn try_import(&self, on_progress: &mut dyn FnMut(&str)) -> EngineResult<Reply> {
        let members: Vec<Member> = self.chat.list_members().await?;
        let ladder = self.ladder().await?;
        let outcome = RosterSyncOrchestrator::new(
            &ladder,
            &self.config.columns,
            &self.persister,
            self.config.pacing.progress_every,
        )
        .import_members(self.store, &members, |p: ImportProgress| {
            on_progress(&format!(
                "📦 Importing members... {}/{} done ({} added)",
                p.processed, p.total, p.added
            ))
        })
        .await?;

        Ok(Reply::private(format!(
            "✅ Imported {} members to the roster from the server ({} already listed).",
            outcome.added, outcome.existing
        )))
    }
}
