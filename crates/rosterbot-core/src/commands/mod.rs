//! Command surface.
//!
//! One method per bot command. The gateway layer parses the slash command,
//! builds an `Invocation` and sends back the returned `Reply`. Handlers
//! never fail: every engine error is turned into a reply here.

mod audit;
mod members;
mod promotions;
mod stats;

use tracing::error;

use crate::chat::{ChatPlatform, Member};
use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::ladder::RankLadder;
use crate::persist::RetryingPersister;
use crate::store::{Row, TabularStore};
use crate::utils::{truncate_message, MESSAGE_LIMIT};

/// Who ran a command, and where.
#[derive(Debug, Clone)]
pub struct Invocation {
    pub invoker: Member,
    /// Name (not id) of the channel the command was used in.
    pub channel_name: String,
}

/// Response to the invoking user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    pub content: String,
    /// Visible only to the invoker.
    pub ephemeral: bool,
}

impl Reply {
    pub fn private(content: impl Into<String>) -> Self {
        Self {
            content: truncate_message(&content.into(), MESSAGE_LIMIT),
            ephemeral: true,
        }
    }

    pub fn public(content: impl Into<String>) -> Self {
        Self {
            content: truncate_message(&content.into(), MESSAGE_LIMIT),
            ephemeral: false,
        }
    }
}

pub struct Commands<'a> {
    store: &'a dyn TabularStore,
    chat: &'a dyn ChatPlatform,
    config: &'a EngineConfig,
    persister: RetryingPersister,
}

impl<'a> Commands<'a> {
    pub fn new(
        store: &'a dyn TabularStore,
        chat: &'a dyn ChatPlatform,
        config: &'a EngineConfig,
    ) -> Self {
        Self {
            store,
            chat,
            config,
            persister: RetryingPersister::new(config.retry.clone(), &config.pacing),
        }
    }

    async fn ladder(&self) -> EngineResult<RankLadder> {
        RankLadder::load(self.store, &self.config.sheet.ladder_range).await
    }

    /// The roster row holding `member_id`, if any.
    async fn find_row(&self, member_id: &str) -> EngineResult<Option<Row>> {
        let column = &self.config.columns.member_id;
        Ok(self
            .store
            .rows()
            .await?
            .into_iter()
            .find(|r| r.get(column).trim() == member_id))
    }

    /// Send to an optional channel, logging instead of failing.
    async fn post(&self, channel: Option<&String>, content: &str) {
        let Some(channel) = channel else {
            return;
        };
        let content = truncate_message(content, MESSAGE_LIMIT);
        if let Err(e) = self.chat.send_message(channel, &content).await {
            tracing::warn!(channel = %channel, error = %e, "Failed to post message");
        }
    }
}

fn has_role(inv: &Invocation, role: &str) -> bool {
    inv.invoker.has_role(role)
}

/// Reply for a command that hit an engine error.
fn failure(action: &str, err: &EngineError) -> Reply {
    error!(error = %err, "Error while {}", action);
    Reply::private(format!("⚠️ Something went wrong while {}: {}", action, err))
}
