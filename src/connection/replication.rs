//! Master/replica routing.
//!
//! Reads rotate over the replicas (the master serves them when there are
//! none) and writes always go to the master. The node that received the
//! last request also answers the following reads, so a reply is never
//! looked for on a different socket than its command. Unsolicited frames
//! such as invalidation pushes can arrive on any node; `read` and
//! `has_data_to_read` look at every socket for those.

use super::Connection;
use crate::command::{Command, CommandMode};
use crate::error::Result;
use crate::resp::Response;
use async_trait::async_trait;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Master,
    Replica(usize),
}

pub struct ReplicationConnection<C> {
    master: C,
    replicas: Vec<C>,
    next_replica: usize,
    current: Role,
}

impl<C: Connection> ReplicationConnection<C> {
    pub fn new(master: C) -> Self {
        ReplicationConnection {
            master,
            replicas: Vec::new(),
            next_replica: 0,
            current: Role::Master,
        }
    }

    pub fn add_replica(&mut self, replica: C) {
        self.replicas.push(replica);
    }

    pub fn master(&self) -> &C {
        &self.master
    }

    pub fn replicas(&self) -> &[C] {
        &self.replicas
    }

    pub fn replicas_mut(&mut self) -> &mut [C] {
        &mut self.replicas
    }

    fn route(&mut self, command: &Command) -> Role {
        if command.routing_mode() == CommandMode::Write || self.replicas.is_empty() {
            return Role::Master;
        }
        let index = self.next_replica % self.replicas.len();
        self.next_replica = index + 1;
        Role::Replica(index)
    }

    fn connection(&mut self, role: Role) -> &mut C {
        match role {
            Role::Replica(index) if index < self.replicas.len() => &mut self.replicas[index],
            _ => &mut self.master,
        }
    }

    fn select(&mut self, command: &Command) -> &mut C {
        self.current = self.route(command);
        self.connection(self.current)
    }

    /// First node with a frame already waiting, trying the one that served
    /// the last request before the master and the replicas.
    async fn pending_node(&mut self) -> Option<Role> {
        let mut roles = vec![self.current, Role::Master];
        roles.extend((0..self.replicas.len()).map(Role::Replica));
        for role in roles {
            if self.connection(role).has_data_to_read().await {
                return Some(role);
            }
        }
        None
    }
}

#[async_trait]
impl<C: Connection> Connection for ReplicationConnection<C> {
    async fn connect(&mut self) -> Result<()> {
        self.master.connect().await?;
        for replica in &mut self.replicas {
            replica.connect().await?;
        }
        Ok(())
    }

    async fn disconnect(&mut self) {
        self.master.disconnect().await;
        for replica in &mut self.replicas {
            replica.disconnect().await;
        }
    }

    fn is_connected(&self) -> bool {
        self.master.is_connected() || self.replicas.iter().any(|r| r.is_connected())
    }

    async fn write_request(&mut self, command: &Command) -> Result<()> {
        self.select(command).write_request(command).await
    }

    async fn read_response(&mut self, command: &Command) -> Result<Response> {
        self.connection(self.current).read_response(command).await
    }

    async fn read(&mut self) -> Result<Response> {
        let role = self.pending_node().await.unwrap_or(self.current);
        self.connection(role).read().await
    }

    async fn has_data_to_read(&mut self) -> bool {
        self.pending_node().await.is_some()
    }

    async fn execute_command(&mut self, command: &Command) -> Result<Response> {
        self.select(command).execute_command(command).await
    }

    async fn execute_on_each_node(&mut self, command: &Command) -> Result<Vec<Response>> {
        let mut responses = vec![self.master.execute_command(command).await?];
        for replica in &mut self.replicas {
            responses.push(replica.execute_command(command).await?);
        }
        Ok(responses)
    }

    fn add_connect_command(&mut self, command: Command) {
        for replica in &mut self.replicas {
            replica.add_connect_command(command.clone());
        }
        self.master.add_connect_command(command);
    }

    fn epoch(&self) -> u64 {
        self.master.epoch() + self.replicas.iter().map(|r| r.epoch()).sum::<u64>()
    }
}
