//! Scripted in-memory connection for exercising wrappers and aggregates.

use super::Connection;
use crate::command::Command;
use crate::error::{Error, Result};
use crate::resp::Response;
use async_trait::async_trait;
use std::collections::VecDeque;

#[derive(Default)]
pub(crate) struct MockConnection {
    /// Replies handed out by reads, in order
    pub replies: VecDeque<Response>,
    /// Frames already waiting on the socket, read before any reply
    pub pending: VecDeque<Response>,
    /// Every command written
    pub written: Vec<Command>,
    pub connect_commands: Vec<Command>,
    pub connected: bool,
    pub epoch: u64,
}

impl MockConnection {
    pub(crate) fn new(replies: impl IntoIterator<Item = Response>) -> Self {
        MockConnection {
            replies: replies.into_iter().collect(),
            ..Self::default()
        }
    }

    pub(crate) fn written_ids(&self) -> Vec<String> {
        self.written
            .iter()
            .map(|command| {
                let mut words = vec![command.id().to_string()];
                words.extend(
                    command
                        .arguments()
                        .iter()
                        .map(|arg| String::from_utf8_lossy(arg).into_owned()),
                );
                words.join(" ")
            })
            .collect()
    }
}

#[async_trait]
impl Connection for MockConnection {
    async fn connect(&mut self) -> Result<()> {
        if !self.connected {
            self.connected = true;
            self.epoch += 1;
        }
        Ok(())
    }

    async fn disconnect(&mut self) {
        self.connected = false;
    }

    fn is_connected(&self) -> bool {
        self.connected
    }

    async fn write_request(&mut self, command: &Command) -> Result<()> {
        self.connect().await?;
        self.written.push(command.clone());
        Ok(())
    }

    async fn read_response(&mut self, _command: &Command) -> Result<Response> {
        self.read().await
    }

    async fn read(&mut self) -> Result<Response> {
        self.pending
            .pop_front()
            .or_else(|| self.replies.pop_front())
            .ok_or_else(|| Error::communication("no scripted reply"))
    }

    async fn has_data_to_read(&mut self) -> bool {
        !self.pending.is_empty()
    }

    fn add_connect_command(&mut self, command: Command) {
        self.connect_commands.push(command);
    }

    fn epoch(&self) -> u64 {
        self.epoch
    }
}
