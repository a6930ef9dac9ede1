use relay_core::{Action, Event};

use crate::connection::Connection;

/// Whether `event` may be delivered to `connection`.
///
/// A user's own events skip typing notices and stay inside channels the
/// user can see. Other users never see view, preference or ephemeral events,
/// and only see events from teams and channels they belong to. Channel
/// deletions are exempt from the channel check so that members still learn
/// about them.
#[must_use]
pub fn should_send(connection: &dyn Connection, event: &Event) -> bool {
    let channel = non_empty(event.channel_id.as_deref());

    if connection.user_id() == event.user_id {
        if event.action == Action::Typing {
            return false;
        }
        if let Some(channel) = channel {
            return connection.has_permission_to_channel(channel);
        }
        return true;
    }

    if matches!(
        event.action,
        Action::ChannelViewed | Action::PreferenceChanged | Action::EphemeralMessage
    ) {
        return false;
    }
    if let Some(team) = non_empty(event.team_id.as_deref()) {
        if !connection.has_permission_to_team(team) {
            return false;
        }
    }
    if let Some(channel) = channel {
        if event.action != Action::ChannelDeleted && !connection.has_permission_to_channel(channel)
        {
            return false;
        }
    }
    true
}

fn non_empty(id: Option<&str>) -> Option<&str> {
    id.filter(|id| !id.is_empty())
}
