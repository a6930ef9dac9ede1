//! Realtime fan-out of events to live connections.
//!
//! The [`Hub`] owns every registered connection inside one task and is
//! driven only through its mailbox, so registration, removal and delivery
//! never race. Writers [`Publisher::publish`] events into the event log and a
//! [`HubFeed`] relays the log's inserts to the hub, which keeps producers
//! independent of who is connected right now.

mod connection;
mod error;
mod filter;
mod hub;
mod publish;

pub use connection::{Connection, LiveConnection, Outbound, PermissionChecker, SendError};
pub use error::{HubError, Result};
pub use filter::should_send;
pub use hub::Hub;
pub use publish::{HubFeed, Publisher};
