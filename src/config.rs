//! Configuration for the command-line client.
//!
//! Supports both command-line arguments and a TOML configuration file.
//! CLI arguments take precedence over config file values.

use crate::cache::CacheConfiguration;
use crate::connection::{ConnectionParameters, ProxyOptions, PushPolicy, RetryPolicy, TrackingMode};
use clap::Parser;
use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Command-line arguments for the client
#[derive(Parser, Debug)]
#[command(name = "resp-cache")]
#[command(version = "0.1.0")]
#[command(about = "A RESP client with server-assisted client-side caching", long_about = None)]
pub struct CliArgs {
    /// Path to TOML configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Server address (e.g., 127.0.0.1:6379)
    #[arg(short = 'a', long)]
    pub address: Option<String>,

    /// RESP protocol version (2 or 3)
    #[arg(short = 'p', long)]
    pub protocol: Option<u8>,

    /// Enable client-side caching
    #[arg(long)]
    pub cache: bool,

    /// Number of times to send the command
    #[arg(short = 'n', long, default_value_t = 1)]
    pub repeat: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    pub log_level: String,

    /// Command and arguments to send (defaults to PING)
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub command: Vec<String>,
}

/// TOML configuration file structure
#[derive(Debug, Deserialize, Default)]
pub struct TomlConfig {
    #[serde(default)]
    pub connection: ConnectionConfig,
    #[serde(default)]
    pub retry: RetryPolicy,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server and handshake settings
#[derive(Debug, Deserialize)]
pub struct ConnectionConfig {
    #[serde(default = "default_address")]
    pub address: String,
    #[serde(default = "default_protocol")]
    pub protocol: u8,
    pub username: Option<String>,
    pub password: Option<String>,
    pub database: Option<u32>,
    pub client_name: Option<String>,
    #[serde(default = "default_connect_timeout_ms")]
    pub connect_timeout_ms: u64,
    /// Socket read/write timeout (unset = wait forever)
    pub read_write_timeout_ms: Option<u64>,
    /// Raise error replies instead of returning them
    #[serde(default)]
    pub exceptions: bool,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            address: default_address(),
            protocol: default_protocol(),
            username: None,
            password: None,
            database: None,
            client_name: None,
            connect_timeout_ms: default_connect_timeout_ms(),
            read_write_timeout_ms: None,
            exceptions: false,
        }
    }
}

/// Client-side caching settings
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CacheConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_max_count", alias = "max-count")]
    pub max_count: usize,
    /// Entry lifetime in seconds (0 = until invalidated)
    #[serde(default, alias = "time_to_live")]
    pub ttl: u64,
    /// default, optin or broadcast
    #[serde(default = "default_tracking")]
    pub tracking: String,
    /// Key prefixes for broadcast tracking
    #[serde(default)]
    pub prefixes: Vec<String>,
    #[serde(default)]
    pub push_policy: PushPolicy,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            max_count: default_max_count(),
            ttl: 0,
            tracking: default_tracking(),
            prefixes: Vec::new(),
            push_policy: PushPolicy::default(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_address() -> String {
    "127.0.0.1:6379".to_string()
}

fn default_protocol() -> u8 {
    3
}

fn default_connect_timeout_ms() -> u64 {
    5000
}

fn default_max_count() -> usize {
    1000
}

fn default_tracking() -> String {
    "default".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Validated caching setup handed to the proxy
#[derive(Debug, Clone, PartialEq)]
pub struct CacheSettings {
    pub configuration: CacheConfiguration,
    pub options: ProxyOptions,
}

/// Everything needed to open a client
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub connection: ConnectionParameters,
    /// None when caching is disabled
    pub cache: Option<CacheSettings>,
}

impl ClientConfig {
    pub fn new(connection: ConnectionParameters) -> Self {
        ClientConfig {
            connection,
            cache: None,
        }
    }

    pub fn with_cache(mut self, configuration: CacheConfiguration, options: ProxyOptions) -> Self {
        self.cache = Some(CacheSettings {
            configuration,
            options,
        });
        self
    }
}

/// Final resolved configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub client: ClientConfig,
    pub log_level: String,
    pub command: Vec<String>,
    pub repeat: usize,
}

impl Config {
    /// Load configuration from CLI args and optional TOML file.
    /// CLI arguments take precedence over TOML file values.
    pub fn load() -> Result<Self, ConfigError> {
        let cli = CliArgs::parse();

        // Load TOML config if specified
        let toml_config = if let Some(ref config_path) = cli.config {
            let contents = std::fs::read_to_string(config_path)
                .map_err(|e| ConfigError::FileRead(config_path.clone(), e))?;
            toml::from_str(&contents)
                .map_err(|e| ConfigError::TomlParse(config_path.clone(), e))?
        } else {
            TomlConfig::default()
        };

        Self::merge(cli, toml_config)
    }

    fn merge(cli: CliArgs, toml_config: TomlConfig) -> Result<Self, ConfigError> {
        let TomlConfig {
            connection,
            retry,
            cache,
            logging,
        } = toml_config;

        let protocol = cli.protocol.unwrap_or(connection.protocol);
        if !(2..=3).contains(&protocol) {
            return Err(ConfigError::Invalid(format!(
                "unsupported protocol version {protocol}"
            )));
        }

        let parameters = ConnectionParameters {
            address: cli.address.unwrap_or(connection.address),
            protocol,
            username: connection.username,
            password: connection.password,
            database: connection.database,
            client_name: connection.client_name,
            connect_timeout: Duration::from_millis(connection.connect_timeout_ms),
            read_write_timeout: connection.read_write_timeout_ms.map(Duration::from_millis),
            exceptions: connection.exceptions,
            retry,
        };

        let mut client = ClientConfig::new(parameters);
        if cli.cache || cache.enabled {
            let configuration = CacheConfiguration::new(cache.max_count, cache.ttl)
                .map_err(|e| ConfigError::Invalid(e.to_string()))?;
            let tracking = match cache.tracking.to_ascii_lowercase().as_str() {
                "default" => TrackingMode::Default,
                "optin" => TrackingMode::OptIn,
                "broadcast" | "bcast" => TrackingMode::Broadcast {
                    prefixes: cache.prefixes,
                },
                other => {
                    return Err(ConfigError::Invalid(format!(
                        "unknown tracking mode '{other}'"
                    )))
                }
            };
            client = client.with_cache(
                configuration,
                ProxyOptions {
                    tracking,
                    push_policy: cache.push_policy,
                },
            );
        }

        Ok(Config {
            client,
            log_level: if cli.log_level != "info" {
                cli.log_level
            } else {
                logging.level
            },
            command: cli.command,
            repeat: cli.repeat,
        })
    }
}

/// Configuration loading errors
#[derive(Debug)]
pub enum ConfigError {
    FileRead(PathBuf, std::io::Error),
    TomlParse(PathBuf, toml::de::Error),
    Invalid(String),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::FileRead(path, e) => {
                write!(f, "Failed to read config file '{}': {}", path.display(), e)
            }
            ConfigError::TomlParse(path, e) => {
                write!(f, "Failed to parse config file '{}': {}", path.display(), e)
            }
            ConfigError::Invalid(msg) => write!(f, "Invalid configuration: {}", msg),
        }
    }
}

impl std::error::Error for ConfigError {}
