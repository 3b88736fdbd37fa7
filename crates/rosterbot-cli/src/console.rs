//! Chat platform for operator runs: members come from the cached member
//! list, role and nickname changes are applied to it, and messages are
//! printed instead of posted.

use std::sync::Mutex;

use async_trait::async_trait;

use rosterbot_core::chat::{ChatError, ChatPlatform, ChatResult, Member};

pub struct ConsoleChat {
    members: Mutex<Vec<Member>>,
}

impl ConsoleChat {
    pub fn new(members: Vec<Member>) -> Self {
        Self {
            members: Mutex::new(members),
        }
    }

    /// Members with every change applied so far.
    pub fn members(&self) -> Vec<Member> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Member>> {
        self.members.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn with_member<F>(&self, member_id: &str, f: F) -> ChatResult<()>
    where
        F: FnOnce(&mut Member),
    {
        let mut members = self.lock();
        let member = members
            .iter_mut()
            .find(|m| m.id == member_id)
            .ok_or_else(|| ChatError::MemberNotFound(member_id.to_string()))?;
        f(member);
        Ok(())
    }
}

#[async_trait]
impl ChatPlatform for ConsoleChat {
    async fn fetch_member(&self, member_id: &str) -> ChatResult<Option<Member>> {
        Ok(self.lock().iter().find(|m| m.id == member_id).cloned())
    }

    async fn list_members(&self) -> ChatResult<Vec<Member>> {
        Ok(self.members())
    }

    async fn add_role(&self, member_id: &str, role: &str) -> ChatResult<()> {
        self.with_member(member_id, |m| {
            if !m.has_role_ignore_case(role) {
                m.roles.push(role.trim().to_string());
            }
        })?;
        println!("[role] +{} for {}", role, member_id);
        Ok(())
    }

    async fn remove_role(&self, member_id: &str, role: &str) -> ChatResult<()> {
        let wanted = role.trim().to_lowercase();
        self.with_member(member_id, |m| {
            m.roles.retain(|r| r.trim().to_lowercase() != wanted)
        })?;
        println!("[role] -{} for {}", role, member_id);
        Ok(())
    }

    async fn send_message(&self, channel_id: &str, content: &str) -> ChatResult<()> {
        println!("[#{}]\n{}\n", channel_id, content);
        Ok(())
    }

    async fn set_nickname(&self, member_id: &str, nickname: &str) -> ChatResult<()> {
        self.with_member(member_id, |m| m.nickname = Some(nickname.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_role_changes_apply_to_members() {
        let chat = ConsoleChat::new(vec![Member {
            id: "1".to_string(),
            username: "rider".to_string(),
            nickname: None,
            roles: vec!["Rekrut".to_string()],
            bot: false,
        }]);

        chat.add_role("1", "Gefreiter").await.unwrap();
        chat.remove_role("1", "rekrut").await.unwrap();
        chat.set_nickname("1", "Rider").await.unwrap();

        let member = chat.fetch_member("1").await.unwrap().unwrap();
        assert_eq!(member.roles, vec!["Gefreiter"]);
        assert_eq!(member.display_name(), "Rider");
        assert!(matches!(
            chat.add_role("2", "Gefreiter").await,
            Err(ChatError::MemberNotFound(_))
        ));
    }
}
