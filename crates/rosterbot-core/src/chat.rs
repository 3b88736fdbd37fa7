//! Chat platform collaborator.
//!
//! The gateway connection and slash-command dispatch live outside this
//! crate. Commands only need to look members up, mutate their roles and
//! nickname, and post to channels; `ChatPlatform` is that surface.
//! Role and channel identifiers are opaque strings from `EngineConfig`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ChatError {
    #[error("Member not found: {0}")]
    MemberNotFound(String),

    #[error("Role not found: {0}")]
    RoleNotFound(String),

    #[error("Channel not found: {0}")]
    ChannelNotFound(String),

    #[error("Platform error: {0}")]
    Platform(String),
}

pub type ChatResult<T> = std::result::Result<T, ChatError>;

/// A server member as the chat platform reports it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub nickname: Option<String>,
    /// Role names, in the order the platform returns them.
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default)]
    pub bot: bool,
}

impl Member {
    /// Server nickname if set, else the account username.
    pub fn display_name(&self) -> &str {
        self.nickname
            .as_deref()
            .filter(|n| !n.trim().is_empty())
            .unwrap_or(&self.username)
    }

    /// Exact role-name match.
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    /// Trimmed, case-insensitive role-name match.
    pub fn has_role_ignore_case(&self, role: &str) -> bool {
        let wanted = role.trim().to_lowercase();
        self.roles.iter().any(|r| r.trim().to_lowercase() == wanted)
    }

    /// Chat mention markup for this member.
    pub fn mention(&self) -> String {
        mention(&self.id)
    }
}

pub fn mention(member_id: &str) -> String {
    format!("<@{}>", member_id)
}

/// Operations the engine's commands perform on the chat platform.
///
/// Implementations resolve role names trimmed and case-insensitively and
/// return `RoleNotFound` when the server has no such role.
#[async_trait]
pub trait ChatPlatform: Send + Sync {
    async fn fetch_member(&self, member_id: &str) -> ChatResult<Option<Member>>;

    async fn list_members(&self) -> ChatResult<Vec<Member>>;

    async fn add_role(&self, member_id: &str, role: &str) -> ChatResult<()>;

    async fn remove_role(&self, member_id: &str, role: &str) -> ChatResult<()>;

    async fn send_message(&self, channel_id: &str, content: &str) -> ChatResult<()>;

    async fn set_nickname(&self, member_id: &str, nickname: &str) -> ChatResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(nickname: Option<&str>) -> Member {
        Member {
            id: "42".to_string(),
            username: "alice_account".to_string(),
            nickname: nickname.map(String::from),
            roles: vec!["Rekrut".to_string(), " Verified ".to_string()],
            bot: false,
        }
    }

    #[test]
    fn test_display_name_prefers_nickname() {
        assert_eq!(member(Some("Alice")).display_name(), "Alice");
        assert_eq!(member(None).display_name(), "alice_account");
        assert_eq!(member(Some("  ")).display_name(), "alice_account");
    }

    #[test]
    fn test_role_matching() {
        let m = member(None);
        assert!(m.has_role("Rekrut"));
        assert!(!m.has_role("rekrut"));
        assert!(!m.has_role("Verified"));
        assert!(m.has_role_ignore_case("verified"));
        assert_eq!(m.mention(), "<@42>");
    }
}
