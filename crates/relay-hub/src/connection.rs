use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use relay_core::{Event, new_id};
use tokio::sync::{mpsc, watch};
use tracing::trace;

/// Why an event could not be queued for a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendError {
    /// The outbound buffer is full.
    Full,
    /// The outbound sink has been closed.
    Closed,
}

/// A live client connection as seen by the hub.
///
/// The hub owns each registered connection exclusively; only its loop calls
/// these methods.
pub trait Connection: Send {
    fn id(&self) -> &str;

    fn user_id(&self) -> &str;

    fn has_permission_to_channel(&self, channel_id: &str) -> bool;

    fn has_permission_to_team(&self, team_id: &str) -> bool;

    /// Queue an event without waiting.
    ///
    /// # Errors
    ///
    /// Returns an error if the event cannot be queued right now.
    fn try_send(&self, event: Arc<Event>) -> Result<(), SendError>;

    /// Close the outbound sink. Queued events can still be drained.
    fn close_sink(&mut self);

    /// Close the underlying transport.
    fn close_transport(&mut self);

    /// Forget every cached permission.
    fn invalidate_cache(&self);

    fn invalidate_cache_for_channel(&self, channel_id: &str);
}

/// Source of truth for what a user may see.
pub trait PermissionChecker: Send + Sync {
    fn can_access_channel(&self, user_id: &str, channel_id: &str) -> bool;

    fn can_access_team(&self, user_id: &str, team_id: &str) -> bool;
}

/// A connection backed by a bounded queue, caching permission answers.
pub struct LiveConnection {
    id: String,
    user_id: String,
    sink: Option<mpsc::Sender<Arc<Event>>>,
    transport: watch::Sender<bool>,
    permissions: Arc<dyn PermissionChecker>,
    channels: RefCell<HashMap<String, bool>>,
    teams: RefCell<HashMap<String, bool>>,
}

/// Client side of a [`LiveConnection`].
pub struct Outbound {
    id: String,
    events: mpsc::Receiver<Arc<Event>>,
    transport: watch::Receiver<bool>,
}

impl LiveConnection {
    /// Create a connection for `user_id` with room for `buffer` undelivered
    /// events.
    #[must_use]
    pub fn new(
        user_id: impl Into<String>,
        permissions: Arc<dyn PermissionChecker>,
        buffer: usize,
    ) -> (Self, Outbound) {
        let (sink, events) = mpsc::channel(buffer.max(1));
        let (transport, transport_rx) = watch::channel(false);
        let id = new_id();
        let outbound = Outbound {
            id: id.clone(),
            events,
            transport: transport_rx,
        };
        let connection = Self {
            id,
            user_id: user_id.into(),
            sink: Some(sink),
            transport,
            permissions,
            channels: RefCell::new(HashMap::new()),
            teams: RefCell::new(HashMap::new()),
        };
        (connection, outbound)
    }

    fn cached(
        cache: &RefCell<HashMap<String, bool>>,
        key: &str,
        lookup: impl FnOnce() -> bool,
    ) -> bool {
        let known = cache.borrow().get(key).copied();
        if let Some(allowed) = known {
            return allowed;
        }
        let allowed = lookup();
        cache.borrow_mut().insert(key.to_string(), allowed);
        allowed
    }
}

impl Connection for LiveConnection {
    fn id(&self) -> &str {
        &self.id
    }

    fn user_id(&self) -> &str {
        &self.user_id
    }

    fn has_permission_to_channel(&self, channel_id: &str) -> bool {
        Self::cached(&self.channels, channel_id, || {
            self.permissions
                .can_access_channel(&self.user_id, channel_id)
        })
    }

    fn has_permission_to_team(&self, team_id: &str) -> bool {
        Self::cached(&self.teams, team_id, || {
            self.permissions.can_access_team(&self.user_id, team_id)
        })
    }

    fn try_send(&self, event: Arc<Event>) -> Result<(), SendError> {
        let Some(sink) = &self.sink else {
            return Err(SendError::Closed);
        };
        sink.try_send(event).map_err(|err| match err {
            mpsc::error::TrySendError::Full(_) => SendError::Full,
            mpsc::error::TrySendError::Closed(_) => SendError::Closed,
        })
    }

    fn close_sink(&mut self) {
        self.sink = None;
    }

    fn close_transport(&mut self) {
        self.sink = None;
        self.transport.send_replace(true);
    }

    fn invalidate_cache(&self) {
        trace!(connection = %self.id, "clearing permission cache");
        self.channels.borrow_mut().clear();
        self.teams.borrow_mut().clear();
    }

    fn invalidate_cache_for_channel(&self, channel_id: &str) {
        self.channels.borrow_mut().remove(channel_id);
    }
}

impl Outbound {
    /// Id of the connection this side belongs to.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Next queued event, or `None` once the sink is closed and drained.
    pub async fn recv(&mut self) -> Option<Arc<Event>> {
        self.events.recv().await
    }

    /// Next queued event if one is ready.
    pub fn try_recv(&mut self) -> Option<Arc<Event>> {
        self.events.try_recv().ok()
    }

    #[must_use]
    pub fn is_transport_closed(&self) -> bool {
        *self.transport.borrow()
    }
}
