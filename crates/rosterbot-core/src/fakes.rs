//! In-memory chat platform (testing and offline runs)
//!
//! `RecordingChat` holds a member list and the server's role names, applies
//! role and nickname changes to its members, and records every message sent.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::chat::{ChatError, ChatPlatform, ChatResult, Member};

#[derive(Debug, Default)]
struct Inner {
    /// Member id -> member, plus insertion order for `list_members`.
    members: HashMap<String, Member>,
    order: Vec<String>,
    roles: Vec<String>,
    messages: Vec<(String, String)>,
}

#[derive(Debug, Default)]
pub struct RecordingChat {
    inner: Mutex<Inner>,
}

impl RecordingChat {
    pub fn new() -> Self {
        Self::default()
    }

    /// Role names that exist on the server.
    pub fn with_roles(self, roles: &[&str]) -> Self {
        self.lock()
            .roles
            .extend(roles.iter().map(|r| r.to_string()));
        self
    }

    pub fn with_member(self, member: Member) -> Self {
        {
            let mut inner = self.lock();
            if !inner.members.contains_key(&member.id) {
                inner.order.push(member.id.clone());
            }
            inner.members.insert(member.id.clone(), member);
        }
        self
    }

    pub fn member(&self, member_id: &str) -> Option<Member> {
        self.lock().members.get(member_id).cloned()
    }

    /// Every `(channel_id, content)` sent so far, oldest first.
    pub fn messages(&self) -> Vec<(String, String)> {
        self.lock().messages.clone()
    }

    pub fn messages_in(&self, channel_id: &str) -> Vec<String> {
        self.lock()
            .messages
            .iter()
            .filter(|(c, _)| c == channel_id)
            .map(|(_, m)| m.clone())
            .collect()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn resolve_role(inner: &Inner, role: &str) -> ChatResult<String> {
        let wanted = role.trim().to_lowercase();
        inner
            .roles
            .iter()
            .find(|r| r.trim().to_lowercase() == wanted)
            .cloned()
            .ok_or_else(|| ChatError::RoleNotFound(role.to_string()))
    }
}

#[async_trait]
impl ChatPlatform for RecordingChat {
    async fn fetch_member(&self, member_id: &str) -> ChatResult<Option<Member>> {
        Ok(self.member(member_id))
    }

    async fn list_members(&self) -> ChatResult<Vec<Member>> {
        let inner = self.lock();
        Ok(inner
            .order
            .iter()
            .filter_map(|id| inner.members.get(id).cloned())
            .collect())
    }

    async fn add_role(&self, member_id: &str, role: &str) -> ChatResult<()> {
        let mut inner = self.lock();
        let role = Self::resolve_role(&inner, role)?;
        let member = inner
            .members
            .get_mut(member_id)
            .ok_or_else(|| ChatError::MemberNotFound(member_id.to_string()))?;
        if !member.has_role(&role) {
            member.roles.push(role);
        }
        Ok(())
    }

    async fn remove_role(&self, member_id: &str, role: &str) -> ChatResult<()> {
        let mut inner = self.lock();
        let role = Self::resolve_role(&inner, role)?;
        let member = inner
            .members
            .get_mut(member_id)
            .ok_or_else(|| ChatError::MemberNotFound(member_id.to_string()))?;
        member.roles.retain(|r| r != &role);
        Ok(())
    }

    async fn send_message(&self, channel_id: &str, content: &str) -> ChatResult<()> {
        self.lock()
            .messages
            .push((channel_id.to_string(), content.to_string()));
        Ok(())
    }

    async fn set_nickname(&self, member_id: &str, nickname: &str) -> ChatResult<()> {
        let mut inner = self.lock();
        let member = inner
            .members
            .get_mut(member_id)
            .ok_or_else(|| ChatError::MemberNotFound(member_id.to_string()))?;
        member.nickname = Some(nickname.to_string());
        Ok(())
    }
}
