//! Entry point tying a connection and the optional cache proxy together.

use crate::cache::{CacheStats, CacheStore, MemoryCache};
use crate::command::Command;
use crate::config::ClientConfig;
use crate::connection::{CacheProxyConnection, Connection, StreamConnection};
use crate::error::{Error, Result};
use crate::resp::Response;
use std::sync::Arc;
use tracing::info;

pub struct Client {
    connection: Box<dyn Connection>,
    cache: Option<Arc<dyn CacheStore>>,
}

impl Client {
    /// Open a TCP connection, wrapping it in the cache proxy when caching
    /// is configured.
    pub async fn connect(config: &ClientConfig) -> Result<Self> {
        let mut connection = StreamConnection::tcp(config.connection.clone());

        let Some(settings) = &config.cache else {
            connection.connect().await?;
            info!(address = %config.connection.address, "Connected");
            return Ok(Client::new(Box::new(connection)));
        };

        // Invalidations arrive as push frames on the same socket
        if config.connection.protocol < 3 {
            return Err(Error::InvalidConfiguration(
                "client-side caching requires RESP3 (protocol 3)".to_string(),
            ));
        }

        let cache: Arc<dyn CacheStore> = Arc::new(MemoryCache::new());
        let proxy = CacheProxyConnection::new(
            connection,
            settings.configuration.clone(),
            Arc::clone(&cache),
            settings.options.clone(),
        )
        .await?;
        info!(address = %config.connection.address, "Connected with client-side caching");

        Ok(Client {
            connection: Box::new(proxy),
            cache: Some(cache),
        })
    }

    /// Use an already built connection, without caching.
    pub fn new(connection: Box<dyn Connection>) -> Self {
        Client {
            connection,
            cache: None,
        }
    }

    pub async fn execute(&mut self, command: &Command) -> Result<Response> {
        self.connection.execute_command(command).await
    }

    pub fn connection(&mut self) -> &mut dyn Connection {
        self.connection.as_mut()
    }

    /// None when caching is disabled
    pub fn cache_stats(&self) -> Option<CacheStats> {
        self.cache.as_deref().map(CacheStats::of)
    }

    pub async fn disconnect(&mut self) {
        self.connection.disconnect().await
    }
}
