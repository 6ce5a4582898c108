//! Client-side caching over any [`Connection`].
//!
//! Replies to cacheable reads are kept in a [`CacheStore`] under
//! `<command id>_<key1>_<key2>...`. Server-assisted tracking keeps the store
//! honest: the server pushes an `invalidate` message whenever a key this
//! client read is modified, and the proxy deletes every cached reply whose
//! cache key contains that storage key. A null key list flushes the store.
//!
//! Push messages can arrive ahead of any reply, so every network round trip
//! drains them before handing the reply back. Pushes already buffered on
//! the socket are also drained before each cache lookup.
//!
//! A proxy is driven through `&mut self`, one command at a time. The store
//! itself may be shared between proxies; two proxies missing on the same
//! key both fetch it and the second `add` loses, which is harmless.

use super::{Connection, PushDispatcher, PushHandler, PushPolicy};
use crate::cache::{CacheConfiguration, CacheStats, CacheStore};
use crate::command::{ClientTrackingOptions, Command};
use crate::error::{Error, Result};
use crate::resp::{Response, INVALIDATE_DATA_TYPE};
use async_trait::async_trait;
use regex::Regex;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// How the server decides which keys to report.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TrackingMode {
    /// Every key read by this connection
    #[default]
    Default,
    /// Only keys read right after `CLIENT CACHING YES`
    OptIn,
    /// Every key under the given prefixes, read or not
    Broadcast { prefixes: Vec<String> },
}

impl TrackingMode {
    pub fn options(&self) -> ClientTrackingOptions {
        match self {
            TrackingMode::Default => ClientTrackingOptions::new(),
            TrackingMode::OptIn => ClientTrackingOptions::new().opt_in(),
            TrackingMode::Broadcast { prefixes } => ClientTrackingOptions::new()
                .broadcast()
                .prefix(prefixes.iter().cloned()),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyOptions {
    pub tracking: TrackingMode,
    pub push_policy: PushPolicy,
}

pub struct CacheProxyConnection<C> {
    connection: C,
    configuration: CacheConfiguration,
    cache: Arc<dyn CacheStore>,
    dispatcher: PushDispatcher,
    tracking: TrackingMode,
    /// Epoch of the underlying connection the cache contents belong to
    epoch: u64,
}

impl<C: Connection> CacheProxyConnection<C> {
    /// Wrap `connection`, enabling tracking on every node behind it.
    ///
    /// The tracking command is also registered as a connect command so a
    /// reconnected socket gets it again.
    pub async fn new(
        mut connection: C,
        configuration: CacheConfiguration,
        cache: Arc<dyn CacheStore>,
        options: ProxyOptions,
    ) -> Result<Self> {
        let tracking = options.tracking.options().to_command();

        connection.connect().await?;
        for reply in connection.execute_on_each_node(&tracking).await? {
            if let Response::Error(err) = reply {
                return Err(Error::Server(err));
            }
        }
        connection.add_connect_command(tracking);
        info!(
            tracking = ?options.tracking,
            max_count = configuration.max_count(),
            ttl = configuration.ttl(),
            "Client-side caching enabled"
        );

        let mut dispatcher = PushDispatcher::new(options.push_policy);
        dispatcher.register(HashMap::from([(
            INVALIDATE_DATA_TYPE.to_string(),
            invalidation_handler(Arc::clone(&cache)),
        )]));

        Ok(CacheProxyConnection {
            epoch: connection.epoch(),
            connection,
            configuration,
            cache,
            dispatcher,
            tracking: options.tracking,
        })
    }

    pub fn cache(&self) -> &Arc<dyn CacheStore> {
        &self.cache
    }

    pub fn configuration(&self) -> &CacheConfiguration {
        &self.configuration
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats::of(self.cache.as_ref())
    }

    pub fn inner(&self) -> &C {
        &self.connection
    }

    pub fn inner_mut(&mut self) -> &mut C {
        &mut self.connection
    }

    /// Cached entries predate a reconnect whose invalidations were lost.
    fn check_epoch(&mut self) {
        let epoch = self.connection.epoch();
        if epoch != self.epoch {
            warn!(from = self.epoch, to = epoch, "Connection re-established, flushing cache");
            self.cache.flush();
            self.epoch = epoch;
        }
    }

    /// Execute `command`, dispatching every push frame that arrives before
    /// its reply.
    async fn execute_draining(&mut self, command: &Command) -> Result<Response> {
        let mut response = self.connection.execute_command(command).await?;
        while let Response::Push(push) = &response {
            self.dispatcher.dispatch(push)?;
            response = self.connection.read_response(command).await?;
        }
        Ok(response)
    }

    /// Dispatch push frames already sitting on the socket.
    async fn drain_pending(&mut self) -> Result<()> {
        while self.connection.has_data_to_read().await {
            match self.connection.read().await? {
                Response::Push(push) => self.dispatcher.dispatch(&push)?,
                response => warn!(?response, "Discarding unsolicited reply"),
            }
        }
        Ok(())
    }
}

fn cache_key(command: &Command) -> String {
    format!("{}_{}", command.id(), command.keys().join("_"))
}

fn invalidation_handler(cache: Arc<dyn CacheStore>) -> PushHandler {
    Box::new(move |payload: &[Response]| match payload.first() {
        Some(Response::Null) => {
            debug!("Invalidation of all keys, flushing cache");
            cache.flush();
            Ok(())
        }
        Some(Response::Array(keys)) => {
            for key in keys {
                let key = key.as_str().ok_or_else(|| {
                    Error::PushNotification(format!("invalidated key is not a string: {key:?}"))
                })?;
                let pattern = Regex::new(&regex::escape(key))
                    .map_err(|e| Error::PushNotification(e.to_string()))?;
                let stale = cache.find_matching_keys(&pattern);
                let removed = cache.batch_delete(&stale);
                debug!(key, removed, "Invalidated cached replies");
            }
            Ok(())
        }
        other => Err(Error::PushNotification(format!(
            "unexpected invalidation payload: {other:?}"
        ))),
    })
}

#[async_trait]
impl<C: Connection> Connection for CacheProxyConnection<C> {
    async fn connect(&mut self) -> Result<()> {
        self.connection.connect().await
    }

    async fn disconnect(&mut self) {
        self.connection.disconnect().await
    }

    fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    async fn write_request(&mut self, command: &Command) -> Result<()> {
        self.connection.write_request(command).await
    }

    async fn read_response(&mut self, command: &Command) -> Result<Response> {
        self.connection.read_response(command).await
    }

    async fn read(&mut self) -> Result<Response> {
        self.connection.read().await
    }

    async fn has_data_to_read(&mut self) -> bool {
        self.connection.has_data_to_read().await
    }

    async fn execute_command(&mut self, command: &Command) -> Result<Response> {
        self.check_epoch();

        // Keyless reads have nothing the server could invalidate
        if !self.configuration.is_whitelisted(command) || command.keys().is_empty() {
            return self.execute_draining(command).await;
        }

        self.drain_pending().await?;
        self.check_epoch();

        let key = cache_key(command);
        if let Some(response) = self.cache.read(&key) {
            debug!(key = %key, "Cache hit");
            return Ok(response);
        }
        debug!(key = %key, "Cache miss");

        if self.tracking == TrackingMode::OptIn {
            let caching = Command::raw("CLIENT", ["CACHING", "YES"]).routed_like(command);
            if let Response::Error(err) = self.execute_draining(&caching).await? {
                warn!(error = %err, "CLIENT CACHING YES rejected");
            }
        }

        let response = self.execute_draining(command).await?;
        self.check_epoch();

        if response.is_error() {
            return Ok(response);
        }
        if self
            .configuration
            .is_exceeds_max_count(self.cache.total_count() + 1)
        {
            debug!(key = %key, "Cache full, not storing");
            return Ok(response);
        }
        if !self.cache.add(&key, response.clone(), self.configuration.ttl()) {
            debug!(key = %key, "Entry already cached, keeping existing");
        }
        Ok(response)
    }

    async fn execute_on_each_node(&mut self, command: &Command) -> Result<Vec<Response>> {
        self.connection.execute_on_each_node(command).await
    }

    fn add_connect_command(&mut self, command: Command) {
        self.connection.add_connect_command(command)
    }

    fn epoch(&self) -> u64 {
        self.connection.epoch()
    }
}
