//! Reaction roles.
//!
//! Reacting to a configured message with a configured emoji grants the
//! mapped role; removing the reaction revokes it. Granting also clears the
//! placeholder `roles.unassigned` role.

use tracing::{debug, info};

use crate::chat::ChatPlatform;
use crate::config::EngineConfig;
use crate::error::EngineResult;

#[derive(Debug, Clone)]
pub struct Reaction {
    pub message_id: String,
    pub emoji: String,
    pub user_id: String,
    pub user_is_bot: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReactionOutcome {
    /// Bot reaction, or a message/emoji pair with no mapped role.
    Ignored,
    Granted { role: String },
    Revoked { role: String },
    /// The member already held (or already lacked) the role.
    Unchanged { role: String },
}

fn mapped_role<'c>(config: &'c EngineConfig, reaction: &Reaction) -> Option<&'c str> {
    if reaction.user_is_bot {
        return None;
    }
    config
        .reaction_roles
        .get(&reaction.message_id)
        .and_then(|emojis| emojis.get(&reaction.emoji))
        .map(String::as_str)
}

pub async fn on_reaction_add(
    chat: &dyn ChatPlatform,
    config: &EngineConfig,
    reaction: &Reaction,
) -> EngineResult<ReactionOutcome> {
    let Some(role) = mapped_role(config, reaction) else {
        debug!(message = %reaction.message_id, emoji = %reaction.emoji, "Reaction not watched");
        return Ok(ReactionOutcome::Ignored);
    };
    let Some(member) = chat.fetch_member(&reaction.user_id).await? else {
        return Ok(ReactionOutcome::Ignored);
    };

    let outcome = if member.has_role_ignore_case(role) {
        ReactionOutcome::Unchanged {
            role: role.to_string(),
        }
    } else {
        chat.add_role(&member.id, role).await?;
        info!(member = %member.id, role = %role, "Granted reaction role");
        ReactionOutcome::Granted {
            role: role.to_string(),
        }
    };

    let unassigned = &config.roles.unassigned;
    if member.has_role_ignore_case(unassigned) {
        chat.remove_role(&member.id, unassigned).await?;
    }
    Ok(outcome)
}

pub async fn on_reaction_remove(
    chat: &dyn ChatPlatform,
    config: &EngineConfig,
    reaction: &Reaction,
) -> EngineResult<ReactionOutcome> {
    let Some(role) = mapped_role(config, reaction) else {
        return Ok(ReactionOutcome::Ignored);
    };
    let Some(member) = chat.fetch_member(&reaction.user_id).await? else {
        return Ok(ReactionOutcome::Ignored);
    };

    if !member.has_role_ignore_case(role) {
        return Ok(ReactionOutcome::Unchanged {
            role: role.to_string(),
        });
    }
    chat.remove_role(&member.id, role).await?;
    info!(member = %member.id, role = %role, "Revoked reaction role");
    Ok(ReactionOutcome::Revoked {
        role: role.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chat::Member;
    use crate::config::tests::test_config;
    use crate::fakes::RecordingChat;
    use std::collections::HashMap;

    fn config() -> EngineConfig {
        let mut config = test_config();
        let mut emojis = HashMap::new();
        emojis.insert("✅".to_string(), "Freikorps Infantry".to_string());
        config.reaction_roles.insert("msg-1".to_string(), emojis);
        config
    }

    fn chat() -> RecordingChat {
        RecordingChat::new()
            .with_roles(&["Freikorps Infantry", "Unassigned"])
            .with_member(Member {
                id: "7".to_string(),
                username: "rider".to_string(),
                nickname: None,
                roles: vec!["Unassigned".to_string()],
                bot: false,
            })
    }

    fn reaction(message_id: &str, emoji: &str, bot: bool) -> Reaction {
        Reaction {
            message_id: message_id.to_string(),
            emoji: emoji.to_string(),
            user_id: "7".to_string(),
            user_is_bot: bot,
        }
    }

    #[tokio::test]
    async fn test_grant_removes_unassigned() {
        let chat = chat();
        let config = config();

        let outcome = on_reaction_add(&chat, &config, &reaction("msg-1", "✅", false))
            .await
            .unwrap();
        assert_eq!(
            outcome,
            ReactionOutcome::Granted {
                role: "Freikorps Infantry".to_string()
            }
        );
        assert_eq!(chat.member("7").unwrap().roles, vec!["Freikorps Infantry"]);

        let again = on_reaction_add(&chat, &config, &reaction("msg-1", "✅", false))
            .await
            .unwrap();
        assert!(matches!(again, ReactionOutcome::Unchanged { .. }));
    }

    #[tokio::test]
    async fn test_unwatched_and_bot_reactions_ignored() {
        let chat = chat();
        let config = config();

        for r in [
            reaction("msg-2", "✅", false),
            reaction("msg-1", "❌", false),
            reaction("msg-1", "✅", true),
        ] {
            assert_eq!(
                on_reaction_add(&chat, &config, &r).await.unwrap(),
                ReactionOutcome::Ignored
            );
        }
        assert_eq!(chat.member("7").unwrap().roles, vec!["Unassigned"]);
    }

    #[tokio::test]
    async fn test_remove_revokes_role() {
        let chat = chat();
        let config = config();
        let r = reaction("msg-1", "✅", false);

        on_reaction_add(&chat, &config, &r).await.unwrap();
        let outcome = on_reaction_remove(&chat, &config, &r).await.unwrap();
        assert!(matches!(outcome, ReactionOutcome::Revoked { .. }));
        assert!(chat.member("7").unwrap().roles.is_empty());

        let outcome = on_reaction_remove(&chat, &config, &r).await.unwrap();
        assert!(matches!(outcome, ReactionOutcome::Unchanged { .. }));
    }
}
