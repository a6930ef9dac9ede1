use std::collections::HashMap;
use std::sync::Arc;

use relay_core::{Event, HubConfig};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use crate::connection::{Connection, LiveConnection, Outbound, PermissionChecker};
use crate::error::{HubError, Result};
use crate::filter::should_send;

enum HubCommand {
    Register(Box<dyn Connection>),
    Unregister(String),
    Broadcast(Arc<Event>),
    InvalidateUser(String),
    InvalidateChannel(String),
    ConnectionCount(oneshot::Sender<usize>),
    Stop(oneshot::Sender<()>),
}

/// Handle to the hub loop. Cheap to clone; every clone feeds the same loop.
#[derive(Clone)]
pub struct Hub {
    commands: mpsc::Sender<HubCommand>,
    connection_buffer: usize,
}

impl Hub {
    /// Spawn the hub loop.
    #[must_use]
    pub fn start(config: &HubConfig) -> (Self, JoinHandle<()>) {
        let (commands, inbox) = mpsc::channel(config.mailbox_capacity.max(1));
        let task = tokio::spawn(HubLoop::new(inbox).run());
        let hub = Self {
            commands,
            connection_buffer: config.connection_buffer,
        };
        (hub, task)
    }

    async fn send(&self, command: HubCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| HubError::Stopped)
    }

    /// # Errors
    ///
    /// Returns `HubError::Stopped` if the hub loop has ended.
    pub async fn register(&self, connection: impl Connection + 'static) -> Result<()> {
        self.send(HubCommand::Register(Box::new(connection))).await
    }

    /// Register a [`LiveConnection`] for `user_id` that holds up to the
    /// configured `connection_buffer` undelivered events.
    ///
    /// # Errors
    ///
    /// Returns `HubError::Stopped` if the hub loop has ended.
    pub async fn connect(
        &self,
        user_id: impl Into<String>,
        permissions: Arc<dyn PermissionChecker>,
    ) -> Result<Outbound> {
        let (connection, outbound) =
            LiveConnection::new(user_id, permissions, self.connection_buffer);
        self.register(connection).await?;
        Ok(outbound)
    }

    /// Remove a connection and close its outbound sink.
    ///
    /// # Errors
    ///
    /// Returns `HubError::Stopped` if the hub loop has ended.
    pub async fn unregister(&self, connection_id: &str) -> Result<()> {
        self.send(HubCommand::Unregister(connection_id.to_string()))
            .await
    }

    /// Deliver an event to every connection allowed to see it.
    ///
    /// Connections that cannot take the event immediately are closed and
    /// removed. `None` is accepted and ignored.
    ///
    /// # Errors
    ///
    /// Returns `HubError::Stopped` if the hub loop has ended.
    pub async fn broadcast(&self, event: Option<Event>) -> Result<()> {
        let Some(event) = event else {
            return Ok(());
        };
        self.send(HubCommand::Broadcast(Arc::new(event))).await
    }

    /// Ask every connection of `user_id` to drop its cached permissions.
    ///
    /// # Errors
    ///
    /// Returns `HubError::Stopped` if the hub loop has ended.
    pub async fn invalidate_for_user(&self, user_id: &str) -> Result<()> {
        self.send(HubCommand::InvalidateUser(user_id.to_string()))
            .await
    }

    /// Ask every connection to drop what it cached for `channel_id`.
    ///
    /// # Errors
    ///
    /// Returns `HubError::Stopped` if the hub loop has ended.
    pub async fn invalidate_for_channel(&self, channel_id: &str) -> Result<()> {
        self.send(HubCommand::InvalidateChannel(channel_id.to_string()))
            .await
    }

    /// Number of registered connections once every earlier request has been
    /// handled.
    ///
    /// # Errors
    ///
    /// Returns `HubError::Stopped` if the hub loop has ended.
    pub async fn connection_count(&self) -> Result<usize> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(HubCommand::ConnectionCount(reply_tx)).await?;
        reply_rx.await.map_err(|_| HubError::Stopped)
    }

    /// Close every connection's transport and end the loop.
    ///
    /// # Errors
    ///
    /// Returns `HubError::Stopped` if the hub loop had already ended.
    pub async fn stop(&self) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(HubCommand::Stop(reply_tx)).await?;
        reply_rx.await.map_err(|_| HubError::Stopped)
    }
}

/// State owned by the hub task.
struct HubLoop {
    inbox: mpsc::Receiver<HubCommand>,
    connections: HashMap<String, Box<dyn Connection>>,
}

impl HubLoop {
    fn new(inbox: mpsc::Receiver<HubCommand>) -> Self {
        Self {
            inbox,
            connections: HashMap::new(),
        }
    }

    async fn run(mut self) {
        info!("hub started");
        while let Some(command) = self.inbox.recv().await {
            match command {
                HubCommand::Register(connection) => self.register(connection),
                HubCommand::Unregister(id) => self.unregister(&id),
                HubCommand::Broadcast(event) => self.broadcast(&event),
                HubCommand::InvalidateUser(user_id) => self.invalidate_user(&user_id),
                HubCommand::InvalidateChannel(channel_id) => {
                    for connection in self.connections.values() {
                        connection.invalidate_cache_for_channel(&channel_id);
                    }
                }
                HubCommand::ConnectionCount(reply) => {
                    let _ = reply.send(self.connections.len());
                }
                HubCommand::Stop(reply) => {
                    self.close_all();
                    let _ = reply.send(());
                    return;
                }
            }
        }
        self.close_all();
    }

    fn register(&mut self, connection: Box<dyn Connection>) {
        debug!(connection = %connection.id(), user = %connection.user_id(), "connection registered");
        self.connections
            .insert(connection.id().to_string(), connection);
    }

    fn unregister(&mut self, id: &str) {
        if let Some(mut connection) = self.connections.remove(id) {
            connection.close_sink();
            debug!(connection = %id, "connection unregistered");
        }
    }

    fn broadcast(&mut self, event: &Arc<Event>) {
        let mut dead = Vec::new();
        for (id, connection) in &self.connections {
            if !should_send(connection.as_ref(), event) {
                continue;
            }
            if let Err(err) = connection.try_send(Arc::clone(event)) {
                dead.push((id.clone(), err));
            }
        }
        trace!(event = %event.id, action = ?event.action, dropped = dead.len(), "event broadcast");
        for (id, reason) in dead {
            if let Some(mut connection) = self.connections.remove(&id) {
                connection.close_sink();
                warn!(connection = %id, user = %connection.user_id(), reason = ?reason, "dropped connection that could not keep up");
            }
        }
    }

    fn invalidate_user(&self, user_id: &str) {
        for connection in self.connections.values() {
            if connection.user_id() == user_id {
                connection.invalidate_cache();
            }
        }
    }

    fn close_all(&mut self) {
        let count = self.connections.len();
        for (_, mut connection) in self.connections.drain() {
            connection.close_transport();
        }
        info!(connections = count, "hub stopped");
    }
}
