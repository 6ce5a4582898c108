//! Connections to the server and aggregates of connections.
//!
//! Everything that can execute a command implements [`Connection`]: a single
//! [`StreamConnection`], the [`ClusterConnection`] and
//! [`ReplicationConnection`] aggregates, and the [`CacheProxyConnection`]
//! that can wrap any of them.
//!
//! Requests and responses are strictly paired per connection: one command is
//! in flight at a time and replies are consumed in the order commands were
//! written. Push messages share that ordered stream.

mod cluster;
mod dialer;
mod proxy;
mod push;
mod replication;
mod retry;
mod stream;

#[cfg(test)]
pub(crate) mod mock;

pub use cluster::{ClusterConnection, KeyHashSlots, SlotResolver, SLOT_COUNT};
pub use dialer::{Dialer, TcpDialer};
pub use proxy::{CacheProxyConnection, ProxyOptions, TrackingMode};
pub use push::{PushDispatcher, PushHandler, PushPolicy};
pub use replication::ReplicationConnection;
pub use retry::{BoxFuture, RetryPolicy};
pub use stream::{ConnectionParameters, StreamConnection};

use crate::command::Command;
use crate::error::Result;
use crate::resp::Response;
use async_trait::async_trait;

#[async_trait]
pub trait Connection: Send {
    /// Open the transport and run the handshake. A no-op when connected.
    async fn connect(&mut self) -> Result<()>;

    async fn disconnect(&mut self);

    fn is_connected(&self) -> bool;

    /// Serialize and send a command, connecting first if needed.
    async fn write_request(&mut self, command: &Command) -> Result<()>;

    /// Read the reply to `command`.
    async fn read_response(&mut self, command: &Command) -> Result<Response>;

    /// Read the next frame regardless of which command it answers.
    async fn read(&mut self) -> Result<Response>;

    /// Whether a frame can be read without waiting on the network.
    async fn has_data_to_read(&mut self) -> bool;

    async fn execute_command(&mut self, command: &Command) -> Result<Response> {
        self.write_request(command).await?;
        self.read_response(command).await
    }

    /// Run `command` on every physical node behind this connection.
    async fn execute_on_each_node(&mut self, command: &Command) -> Result<Vec<Response>> {
        Ok(vec![self.execute_command(command).await?])
    }

    /// Register a command to run after the handshake on every (re)connect.
    fn add_connect_command(&mut self, command: Command);

    /// Changes whenever a physical connection is (re)established.
    fn epoch(&self) -> u64;
}
