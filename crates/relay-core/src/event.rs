use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::id::new_id;

/// What happened, as seen by connected clients.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Typing,
    Posted,
    PostEdited,
    PostDeleted,
    ChannelDeleted,
    ChannelViewed,
    DirectAdded,
    NewUser,
    LeaveTeam,
    UserAdded,
    UserRemoved,
    PreferenceChanged,
    EphemeralMessage,
    StatusChange,
    Hello,
}

/// A user-visible change broadcast to live connections. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Event {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub team_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    pub user_id: String,
    pub action: Action,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub props: BTreeMap<String, String>,
}

impl Event {
    #[must_use]
    pub fn new(action: Action, user_id: impl Into<String>) -> Self {
        Self {
            id: String::new(),
            team_id: None,
            channel_id: None,
            user_id: user_id.into(),
            action,
            props: BTreeMap::new(),
        }
    }

    #[must_use]
    pub fn with_team(mut self, team_id: impl Into<String>) -> Self {
        self.team_id = Some(team_id.into());
        self
    }

    #[must_use]
    pub fn with_channel(mut self, channel_id: impl Into<String>) -> Self {
        self.channel_id = Some(channel_id.into());
        self
    }

    #[must_use]
    pub fn with_prop(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.props.insert(key.into(), value.into());
        self
    }

    pub fn pre_save(&mut self) {
        if self.id.is_empty() {
            self.id = new_id();
        }
    }
}
