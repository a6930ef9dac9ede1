use serde::{Deserialize, Serialize};

use crate::error::{CoreError, Result};
use crate::id::{ID_LENGTH, new_id};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ConversationKind {
    #[default]
    #[serde(rename = "O")]
    Open,
    #[serde(rename = "P")]
    Private,
    #[serde(rename = "D")]
    Direct,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Conversation {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
    #[serde(rename = "Type")]
    pub kind: ConversationKind,
    pub name: String,
    #[serde(default)]
    pub display_name: String,
}

impl Conversation {
    #[must_use]
    pub fn new(kind: ConversationKind, team_id: Option<String>, name: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            team_id,
            kind,
            name: name.into(),
            display_name: String::new(),
        }
    }

    /// A direct conversation between two users.
    ///
    /// The name is both user ids in sorted order joined by `__`, so either
    /// participant produces the same name.
    #[must_use]
    pub fn direct(user_a: &str, user_b: &str) -> Self {
        let name = if user_a <= user_b {
            format!("{user_a}__{user_b}")
        } else {
            format!("{user_b}__{user_a}")
        };
        Self::new(ConversationKind::Direct, None, name)
    }

    pub fn pre_save(&mut self) {
        if self.id.is_empty() {
            self.id = new_id();
        }
        if self.display_name.is_empty() {
            self.display_name.clone_from(&self.name);
        }
    }

    /// # Errors
    ///
    /// Returns an error if the id is malformed, the name is empty, or a
    /// direct conversation is attached to a team.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason| CoreError::InvalidConversation {
            id: self.id.clone(),
            reason,
        };
        if self.id.len() != ID_LENGTH {
            return Err(invalid("id must be a generated identifier"));
        }
        if self.name.is_empty() {
            return Err(invalid("name must not be empty"));
        }
        if self.kind == ConversationKind::Direct && self.team_id.is_some() {
            return Err(invalid("direct conversations do not belong to a team"));
        }
        Ok(())
    }

    #[must_use]
    pub fn is_direct(&self) -> bool {
        self.kind == ConversationKind::Direct
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Membership {
    #[serde(default)]
    pub conversation_id: String,
    pub user_id: String,
    #[serde(default)]
    pub roles: String,
}

impl Membership {
    #[must_use]
    pub fn new(conversation_id: impl Into<String>, user_id: impl Into<String>) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            user_id: user_id.into(),
            roles: String::new(),
        }
    }

    /// # Errors
    ///
    /// Returns an error if either id is missing or malformed.
    pub fn validate(&self) -> Result<()> {
        let invalid = |reason| CoreError::InvalidMembership {
            conversation_id: self.conversation_id.clone(),
            user_id: self.user_id.clone(),
            reason,
        };
        if self.conversation_id.len() != ID_LENGTH {
            return Err(invalid("conversation id must be a generated identifier"));
        }
        if self.user_id.is_empty() {
            return Err(invalid("user id must not be empty"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_name_is_order_independent() {
        let ab = Conversation::direct("alice", "bob");
        let ba = Conversation::direct("bob", "alice");

        assert_eq!(ab.name, "alice__bob");
        assert_eq!(ab.name, ba.name);
        assert!(ab.is_direct());
        assert!(ab.team_id.is_none());
    }

    #[test]
    fn pre_save_fills_id_and_display_name() -> anyhow::Result<()> {
        let mut conversation = Conversation::direct("alice", "bob");
        conversation.pre_save();

        assert_eq!(conversation.id.len(), ID_LENGTH);
        assert_eq!(conversation.display_name, "alice__bob");
        conversation.validate()?;
        Ok(())
    }

    #[test]
    fn unsaved_conversation_is_invalid() {
        let conversation = Conversation::direct("alice", "bob");

        assert!(matches!(
            conversation.validate(),
            Err(CoreError::InvalidConversation { .. })
        ));
    }

    #[test]
    fn direct_conversation_with_team_is_invalid() {
        let mut conversation = Conversation::direct("alice", "bob");
        conversation.pre_save();
        conversation.team_id = Some("team".to_string());

        let err = conversation.validate().expect_err("team on direct conversation");

        assert!(err.to_string().contains("team"));
    }

    #[test]
    fn membership_requires_user() {
        let membership = Membership::new(new_id(), "");

        assert!(membership.validate().is_err());
    }

    #[test]
    fn membership_requires_conversation_id() {
        let membership = Membership::new("", "alice");

        assert!(membership.validate().is_err());
    }

    #[test]
    fn kind_serializes_as_single_letter() -> anyhow::Result<()> {
        assert_eq!(serde_json::to_string(&ConversationKind::Direct)?, "\"D\"");
        assert_eq!(serde_json::to_string(&ConversationKind::Open)?, "\"O\"");
        Ok(())
    }
}
