use super::{failure, Commands, Invocation, Reply};
use crate::error::{EngineError, EngineResult};
use crate::scoring::{AuditOutcome, ScoringAggregator};

impl<'a> Commands<'a> {
    /// Score a pasted battle log into the roster.
    pub async fn audit(&self, _inv: &Invocation, raw: &str) -> Reply {
        match self.try_audit(raw).await {
            Ok(reply) => reply,
            Err(e) => failure("processing the audit", &e),
        }
    }

    async fn try_audit(&self, raw: &str) -> EngineResult<Reply> {
        let aggregator = ScoringAggregator::from_config(self.config);
        let parsed = aggregator.parse(raw);
        let aggregates = ScoringAggregator::aggregate(&parsed.entries);

        let mut reply_lines = Vec::new();
        let mut stat_lines = Vec::new();

        if !aggregates.is_empty() {
            let outcomes = aggregator
                .apply(self.store, &self.persister, &self.config.columns, &aggregates)
                .await?;
            for outcome in outcomes {
                match outcome {
                    AuditOutcome::Applied { key, stat, bonus } => {
                        let line = format!(
                            "✅ {}: +{} points ({}K/{}D/{}A)",
                            key, bonus, stat.kills, stat.deaths, stat.assists
                        );
                        reply_lines.push(line.clone());
                        stat_lines.push(line);
                    }
                    AuditOutcome::NotFound { key } => {
                        reply_lines.push(format!("⚠️ {}: not found in roster.", key));
                    }
                }
            }
        }

        for rejected in &parsed.rejected {
            if let EngineError::MalformedRecord { index, reason, .. } = rejected {
                reply_lines.push(format!("⚠️ Skipped record {}: {}", index, reason));
            }
        }

        if reply_lines.is_empty() {
            return Ok(Reply::private("ℹ️ No audit records found."));
        }

        if let Some((top, stat)) = aggregates.top_performer() {
            if !stat_lines.is_empty() {
                let texts = &self.config.announcements;
                self.post(
                    self.config.channels.performance.as_ref(),
                    &format!(
                        "{}\n\n{}\n\n🏆 Top performer: {} with {} kills\n\n{}",
                        texts.performance_title,
                        stat_lines.join("\n"),
                        top,
                        stat.kills,
                        texts.performance_footer
                    ),
                )
                .await;
            }
        }

        Ok(Reply::private(reply_lines.join("\n")))
    }
}
