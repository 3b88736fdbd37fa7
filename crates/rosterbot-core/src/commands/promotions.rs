use chrono::Local;
use tracing::warn;

use super::{failure, has_role, Commands, Invocation, Reply};
use crate::chat::mention;
use crate::error::EngineResult;
use crate::models::PromotionRecord;
use crate::promotion::PromotionEngine;
use crate::utils::format_timestamp;

impl<'a> Commands<'a> {
    /// Promote every eligible member, swap their rank roles and announce.
    /// When a write failure stops the run, members already promoted in the
    /// sheet still get their roles and announcement.
    pub async fn run_promotions(&self, inv: &Invocation) -> Reply {
        let high_command = &self.config.roles.high_command;
        if !has_role(inv, high_command) {
            return Reply::private(format!(
                "❌ Only members of {} can run promotions.",
                high_command
            ));
        }
        match self.try_run_promotions().await {
            Ok(reply) => reply,
            Err(e) => failure("running promotions", &e),
        }
    }

    async fn try_run_promotions(&self) -> EngineResult<Reply> {
        let ladder = self.ladder().await?;
        let outcome = PromotionEngine::new(&ladder, &self.config.columns)
            .run(self.store, &self.persister)
            .await?;
        let timestamp = format_timestamp(Local::now());
        let channels = &self.config.channels;

        if outcome.promotions.is_empty() {
            if let Some(e) = &outcome.aborted {
                return Ok(failure("running promotions", e));
            }
            self.post(
                channels.bot_logs.as_ref(),
                &format!("📅 /runpromotions executed on {} — No promotions.", timestamp),
            )
            .await;
            return Ok(Reply::private("ℹ️ No eligible users for promotion."));
        }

        for record in &outcome.promotions {
            self.swap_rank_roles(record).await;
        }

        self.post(
            channels.announcements.as_ref(),
            &self.promotion_announcement(&outcome.promotions),
        )
        .await;

        let log_lines: Vec<String> = outcome
            .promotions
            .iter()
            .map(|p| format!("{}: {} → {}", mention(&p.member_id), p.from_rank, p.to_rank))
            .collect();
        self.post(
            channels.bot_logs.as_ref(),
            &format!("📅 Promotions run on {}:\n{}", timestamp, log_lines.join("\n")),
        )
        .await;

        let promoted = format!("✅ {} users promoted.", outcome.promotions.len());
        Ok(match &outcome.aborted {
            Some(e) => {
                let reply = failure("running promotions", e);
                Reply::private(format!("{}\n{}", promoted, reply.content))
            }
            None => Reply::private(promoted),
        })
    }

    /// Remove the old rank role and grant the new one. Failures are logged;
    /// the sheet already holds the promotion.
    async fn swap_rank_roles(&self, record: &PromotionRecord) {
        let member = match self.chat.fetch_member(&record.member_id).await {
            Ok(Some(m)) => m,
            Ok(None) => {
                warn!(member = %record.member_id, "Promoted member left the server");
                return;
            }
            Err(e) => {
                warn!(member = %record.member_id, error = %e, "Failed to fetch promoted member");
                return;
            }
        };

        if member.has_role_ignore_case(&record.from_rank) {
            if let Err(e) = self.chat.remove_role(&member.id, &record.from_rank).await {
                warn!(
                    member = %member.id,
                    role = %record.from_rank,
                    error = %e,
                    "Role update failed"
                );
            }
        }
        if !member.has_role_ignore_case(&record.to_rank) {
            if let Err(e) = self.chat.add_role(&member.id, &record.to_rank).await {
                warn!(
                    member = %member.id,
                    role = %record.to_rank,
                    error = %e,
                    "Role update failed"
                );
            }
        }
    }

    fn promotion_announcement(&self, promotions: &[PromotionRecord]) -> String {
        let texts = &self.config.announcements;
        let lines: Vec<String> = promotions
            .iter()
            .map(|p| {
                format!(
                    "{} {} → {} {}",
                    texts.promotion_line_prefix,
                    p.from_rank,
                    p.to_rank,
                    mention(&p.member_id)
                )
            })
            .collect();

        let mut announcement = format!(
            "{}\n{}\n\n{}\n\n{}",
            texts.promotion_title,
            texts.promotion_subtitle,
            lines.join("\n"),
            texts.promotion_footer
        );
        if let Some(role_id) = &self.config.roles.promotion_ping {
            announcement.push_str(&format!("\n<@&{}>", role_id));
        }
        announcement
    }
}
