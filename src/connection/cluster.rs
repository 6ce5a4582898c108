//! Client-side sharding over a pool of node connections.
//!
//! Each key hashes to one of [`SLOT_COUNT`] slots and the slots are split
//! into contiguous ranges, one per node, in insertion order. Nodes live in
//! a slab so ids stay stable while others are added and removed.

use super::{Connection, RetryPolicy};
use crate::command::Command;
use crate::error::{Error, Result};
use crate::resp::Response;
use async_trait::async_trait;
use slab::Slab;
use tracing::debug;

pub const SLOT_COUNT: u16 = 16384;

/// Maps storage keys to slots.
pub trait SlotResolver: Send + Sync {
    fn slot(&self, key: &str) -> u16;

    /// The slot shared by every key of `command`, or `None` when it has no
    /// keys or its keys span several slots.
    fn command_slot(&self, command: &Command) -> Option<u16> {
        let mut slots = command.routing_keys().iter().map(|key| self.slot(key));
        let first = slots.next()?;
        slots.all(|slot| slot == first).then_some(first)
    }
}

/// CRC16 (XMODEM) of the key modulo [`SLOT_COUNT`]. A non-empty `{tag}`
/// in the key hashes the tag alone, so related keys can share a slot.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeyHashSlots;

impl SlotResolver for KeyHashSlots {
    fn slot(&self, key: &str) -> u16 {
        crc16(hash_tag(key.as_bytes())) % SLOT_COUNT
    }
}

fn hash_tag(key: &[u8]) -> &[u8] {
    let Some(open) = key.iter().position(|&b| b == b'{') else {
        return key;
    };
    match key[open + 1..].iter().position(|&b| b == b'}') {
        Some(len) if len > 0 => &key[open + 1..open + 1 + len],
        _ => key,
    }
}

fn crc16(data: &[u8]) -> u16 {
    data.iter().fold(0u16, |crc, &byte| {
        let mut crc = crc ^ ((byte as u16) << 8);
        for _ in 0..8 {
            crc = if crc & 0x8000 != 0 {
                (crc << 1) ^ 0x1021
            } else {
                crc << 1
            };
        }
        crc
    })
}

pub struct ClusterConnection<C, R = KeyHashSlots> {
    nodes: Slab<C>,
    /// Node id owning each slot
    slots: Vec<usize>,
    resolver: R,
    connect_commands: Vec<Command>,
    /// Polling policy for `read_any`
    read_retry: RetryPolicy,
}

impl<C: Connection> Default for ClusterConnection<C> {
    fn default() -> Self {
        Self::new(KeyHashSlots)
    }
}

impl<C: Connection, R: SlotResolver> ClusterConnection<C, R> {
    pub fn new(resolver: R) -> Self {
        ClusterConnection {
            nodes: Slab::new(),
            slots: Vec::new(),
            resolver,
            connect_commands: Vec::new(),
            read_retry: RetryPolicy::default(),
        }
    }

    pub fn with_read_retry(mut self, policy: RetryPolicy) -> Self {
        self.read_retry = policy;
        self
    }

    /// Add a node, returning its id. Connect commands registered on the
    /// cluster are registered on the new node too.
    pub fn add(&mut self, mut connection: C) -> usize {
        for command in &self.connect_commands {
            connection.add_connect_command(command.clone());
        }
        let id = self.nodes.insert(connection);
        self.rebuild_slots();
        debug!(node = id, nodes = self.nodes.len(), "Node added");
        id
    }

    pub fn remove(&mut self, id: usize) -> Option<C> {
        let connection = self.nodes.try_remove(id)?;
        self.rebuild_slots();
        debug!(node = id, nodes = self.nodes.len(), "Node removed");
        Some(connection)
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, id: usize) -> Option<&C> {
        self.nodes.get(id)
    }

    pub fn node_mut(&mut self, id: usize) -> Option<&mut C> {
        self.nodes.get_mut(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &C)> {
        self.nodes.iter()
    }

    pub fn resolver(&self) -> &R {
        &self.resolver
    }

    /// Id of the node owning `slot`.
    pub fn node_for_slot(&self, slot: u16) -> Option<usize> {
        self.slots.get(slot as usize).copied()
    }

    pub fn node_for_key(&self, key: &str) -> Option<usize> {
        self.node_for_slot(self.resolver.slot(key))
    }

    fn rebuild_slots(&mut self) {
        let ids: Vec<usize> = self.nodes.iter().map(|(id, _)| id).collect();
        self.slots = if ids.is_empty() {
            Vec::new()
        } else {
            (0..SLOT_COUNT as usize)
                .map(|slot| ids[slot * ids.len() / SLOT_COUNT as usize])
                .collect()
        };
    }

    fn node_for_command(&mut self, command: &Command) -> Result<&mut C> {
        let id = self
            .resolver
            .command_slot(command)
            .and_then(|slot| self.node_for_slot(slot))
            .ok_or_else(|| Error::NotSupported(command.id().to_string()))?;
        self.nodes
            .get_mut(id)
            .ok_or_else(|| Error::NotSupported(command.id().to_string()))
    }

    /// Read a frame from whichever node has one buffered, polling with
    /// backoff until one does.
    pub async fn read_any(&mut self) -> Option<Result<Response>> {
        let policy = self.read_retry;
        policy
            .retry_on_false(&mut self.nodes, |nodes| {
                Box::pin(async move {
                    for (_, node) in nodes.iter_mut() {
                        if node.has_data_to_read().await {
                            return Some(node.read().await);
                        }
                    }
                    None
                })
            })
            .await
    }
}

#[async_trait]
impl<C: Connection, R: SlotResolver> Connection for ClusterConnection<C, R> {
    async fn connect(&mut self) -> Result<()> {
        for (_, node) in self.nodes.iter_mut() {
            node.connect().await?;
        }
        Ok(())
    }

    async fn disconnect(&mut self) {
        for (_, node) in self.nodes.iter_mut() {
            node.disconnect().await;
        }
    }

    fn is_connected(&self) -> bool {
        self.nodes.iter().any(|(_, node)| node.is_connected())
    }

    async fn write_request(&mut self, command: &Command) -> Result<()> {
        self.node_for_command(command)?.write_request(command).await
    }

    async fn read_response(&mut self, command: &Command) -> Result<Response> {
        self.node_for_command(command)?.read_response(command).await
    }

    async fn read(&mut self) -> Result<Response> {
        self.read_any()
            .await
            .unwrap_or_else(|| Err(Error::communication("no node has a reply to read")))
    }

    async fn has_data_to_read(&mut self) -> bool {
        for (_, node) in self.nodes.iter_mut() {
            if node.has_data_to_read().await {
                return true;
            }
        }
        false
    }

    async fn execute_command(&mut self, command: &Command) -> Result<Response> {
        self.node_for_command(command)?.execute_command(command).await
    }

    async fn execute_on_each_node(&mut self, command: &Command) -> Result<Vec<Response>> {
        let mut responses = Vec::with_capacity(self.nodes.len());
        for (_, node) in self.nodes.iter_mut() {
            responses.push(node.execute_command(command).await?);
        }
        Ok(responses)
    }

    fn add_connect_command(&mut self, command: Command) {
        for (_, node) in self.nodes.iter_mut() {
            node.add_connect_command(command.clone());
        }
        self.connect_commands.push(command);
    }

    fn epoch(&self) -> u64 {
        self.nodes.iter().map(|(_, node)| node.epoch()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::mock::MockConnection;

    fn cluster(nodes: usize) -> ClusterConnection<MockConnection> {
        let mut cluster = ClusterConnection::default();
        for _ in 0..nodes {
            cluster.add(MockConnection::default());
        }
        cluster
    }

    #[test]
    fn test_crc16_xmodem() {
        assert_eq!(crc16(b"123456789"), 0x31C3);
        assert_eq!(crc16(b""), 0);
    }

    #[test]
    fn test_key_slots() {
        assert_eq!(KeyHashSlots.slot("foo"), 12182);
        assert_eq!(
            KeyHashSlots.slot("{user1000}.following"),
            KeyHashSlots.slot("{user1000}.followers")
        );
        assert_eq!(KeyHashSlots.slot("{user1000}.following"), KeyHashSlots.slot("user1000"));
    }

    #[test]
    fn test_empty_hash_tag_hashes_whole_key() {
        assert_eq!(hash_tag(b"foo{}bar"), b"foo{}bar");
        assert_eq!(hash_tag(b"foo{bar"), b"foo{bar");
        assert_eq!(hash_tag(b"foo{bar}{zap}"), b"bar");
    }

    #[test]
    fn test_command_slot() {
        let get = Command::new("GET").arg("foo");
        assert_eq!(KeyHashSlots.command_slot(&get), Some(12182));

        let mget = Command::new("MGET").args(["{a}1", "{a}2"]);
        assert!(KeyHashSlots.command_slot(&mget).is_some());

        let cross = Command::new("MGET").args(["foo", "bar"]);
        assert_eq!(KeyHashSlots.command_slot(&cross), None);

        assert_eq!(KeyHashSlots.command_slot(&Command::new("PING")), None);
    }

    #[test]
    fn test_slot_ranges_are_contiguous() {
        let cluster = cluster(3);
        assert_eq!(cluster.node_for_slot(0), Some(0));
        assert_eq!(cluster.node_for_slot(5461), Some(0));
        assert_eq!(cluster.node_for_slot(5462), Some(1));
        assert_eq!(cluster.node_for_slot(SLOT_COUNT - 1), Some(2));
        assert_eq!(cluster.node_for_slot(SLOT_COUNT), None);
    }

    #[test]
    fn test_remove_rebalances() {
        let mut cluster = cluster(2);
        assert!(cluster.remove(0).is_some());
        assert!(cluster.remove(0).is_none());
        assert_eq!(cluster.node_for_slot(0), Some(1));
        assert_eq!(cluster.len(), 1);
    }

    #[tokio::test]
    async fn test_routes_by_key() {
        let mut cluster = cluster(2);
        let id = cluster.node_for_key("foo").unwrap();
        cluster
            .node_mut(id)
            .unwrap()
            .replies
            .push_back(Response::bulk("bar"));

        let response = cluster
            .execute_command(&Command::new("GET").arg("foo"))
            .await
            .unwrap();
        assert_eq!(response, Response::bulk("bar"));
        assert_eq!(cluster.node(id).unwrap().written.len(), 1);
        assert_eq!(cluster.node(1 - id).unwrap().written.len(), 0);
    }

    #[tokio::test]
    async fn test_keyless_command_not_supported() {
        let mut cluster = cluster(2);
        let err = cluster.execute_command(&Command::new("PING")).await.unwrap_err();
        assert!(matches!(err, Error::NotSupported(id) if id == "PING"));
    }

    #[tokio::test]
    async fn test_routed_like_follows_hint() {
        let mut cluster = cluster(2);
        let get = Command::new("GET").arg("foo");
        let id = cluster.node_for_key("foo").unwrap();
        cluster
            .node_mut(id)
            .unwrap()
            .replies
            .push_back(Response::status("OK"));

        let caching = Command::raw("CLIENT", ["CACHING", "YES"]).routed_like(&get);
        cluster.execute_command(&caching).await.unwrap();
        assert_eq!(cluster.node(id).unwrap().written_ids(), ["CLIENT CACHING YES"]);
    }

    #[tokio::test]
    async fn test_execute_on_each_node() {
        let mut cluster = cluster(3);
        for id in 0..3 {
            cluster
                .node_mut(id)
                .unwrap()
                .replies
                .push_back(Response::status("OK"));
        }

        let tracking = Command::raw("CLIENT", ["TRACKING", "ON"]);
        let responses = cluster.execute_on_each_node(&tracking).await.unwrap();
        assert_eq!(responses.len(), 3);
        assert_eq!(cluster.epoch(), 3);
    }

    #[tokio::test]
    async fn test_connect_commands_reach_late_nodes() {
        let mut cluster = cluster(1);
        cluster.add_connect_command(Command::raw("CLIENT", ["TRACKING", "ON"]));
        let id = cluster.add(MockConnection::default());

        assert_eq!(cluster.node(0).unwrap().connect_commands.len(), 1);
        assert_eq!(cluster.node(id).unwrap().connect_commands.len(), 1);
    }

    #[tokio::test]
    async fn test_read_any() {
        let mut cluster = cluster(2).with_read_retry(RetryPolicy::new(1, 10, 2));
        assert!(cluster.read_any().await.is_none());

        cluster
            .node_mut(1)
            .unwrap()
            .pending
            .push_back(Response::invalidate(None));
        let response = cluster.read_any().await.unwrap().unwrap();
        assert!(response.is_push());
    }
}
