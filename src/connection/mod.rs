//! Connection management for MongoDB
//!
//! The database handle talks to the server through a single primitive,
//! [`Connection::run_command`]: send a command document to a named database
//! and get the decoded reply back. This module provides:
//! - the [`Connection`] trait itself
//! - [`ConnectionManager`], the driver-backed implementation (connection
//!   establishment with retries, pool settings, health checks)

use async_trait::async_trait;
use mongodb::bson::{Document, doc};
use mongodb::error::{CommandError, ErrorKind};
use mongodb::{Client, options::ClientOptions};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use crate::config::ConnectionConfig;
use crate::error::{DbError, Result, TransportError};

#[cfg(test)]
pub(crate) mod testing;

/// Command execution primitive shared by every handle.
///
/// Implementations own transport concerns: retries, timeouts, cancellation
/// and authentication. A reply whose `ok` flag is not 1 must be returned as a
/// document, not as an error; only failures to obtain a reply are errors.
///
/// Failed replies from [`ConnectionManager`] are narrowed: the driver keeps
/// only `code`, `codeName` and `errmsg` of an `ok: 0` reply, so fields such
/// as `errno` never reach the caller. Successful replies arrive whole.
#[async_trait]
pub trait Connection: Send + Sync {
    /// Execute `command` against `database` and return the server reply.
    async fn run_command(&self, database: &str, command: Document) -> Result<Document>;
}

/// MongoDB connection manager
///
/// Wraps a driver [`Client`] built from [`ConnectionConfig`].
pub struct ConnectionManager {
    /// MongoDB client instance
    client: Option<Client>,

    /// Connection configuration
    config: ConnectionConfig,

    /// Current connection state
    state: Arc<RwLock<ConnectionState>>,

    /// Connection URI
    uri: String,
}

/// Connection state information
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionState {
    /// Not connected
    Disconnected,

    /// Currently connecting
    Connecting,

    /// Connected and ready
    Connected,

    /// Connection failed
    Failed(String),
}

/// Health check result
#[derive(Debug, Clone)]
pub struct HealthStatus {
    /// Whether the connection is healthy
    pub is_healthy: bool,

    /// Response time in milliseconds
    pub response_time_ms: u64,

    /// Server version
    pub server_version: Option<String>,
}

impl ConnectionManager {
    /// Create a new connection manager
    ///
    /// # Arguments
    /// * `uri` - MongoDB connection URI
    /// * `config` - Connection configuration
    pub fn new(uri: String, config: ConnectionConfig) -> Self {
        Self {
            client: None,
            config,
            state: Arc::new(RwLock::new(ConnectionState::Disconnected)),
            uri,
        }
    }

    /// Establish connection to MongoDB
    ///
    /// Retries up to `retry_attempts` times, verifying each attempt with a
    /// `ping`.
    pub async fn connect(&mut self) -> Result<()> {
        self.set_state(ConnectionState::Connecting).await;

        let options = match Self::parse_uri(&self.uri).await {
            Ok(options) => self.configure_pool(options),
            Err(e) => {
                self.set_state(ConnectionState::Failed(e.to_string())).await;
                return Err(e);
            }
        };

        match self.connect_with_retry(options).await {
            Ok(client) => {
                info!("Connected to {}", self.uri);
                self.client = Some(client);
                self.set_state(ConnectionState::Connected).await;
                Ok(())
            }
            Err(e) => {
                self.set_state(ConnectionState::Failed(e.to_string())).await;
                Err(e)
            }
        }
    }

    /// Disconnect from MongoDB
    ///
    /// Shuts the driver client down; handles created from this manager keep
    /// their reference but every later command fails with `NotConnected`.
    pub async fn disconnect(&mut self) -> Result<()> {
        if let Some(client) = self.client.take() {
            client.shutdown().await;
            info!("Disconnected from {}", self.uri);
        }
        self.set_state(ConnectionState::Disconnected).await;
        Ok(())
    }

    /// Perform health check on the connection
    pub async fn health_check(&self) -> Result<HealthStatus> {
        let client = self.get_client()?;
        let start = Instant::now();

        let is_healthy = self.ping().await.unwrap_or(false);
        let response_time_ms = start.elapsed().as_millis() as u64;

        let server_version = if is_healthy {
            Self::server_version(client).await.ok()
        } else {
            None
        };

        Ok(HealthStatus {
            is_healthy,
            response_time_ms,
            server_version,
        })
    }

    /// Get the MongoDB client
    pub fn get_client(&self) -> Result<&Client> {
        self.client
            .as_ref()
            .ok_or(DbError::Transport(TransportError::NotConnected))
    }

    /// Get current connection state
    pub async fn get_state(&self) -> ConnectionState {
        self.state.read().await.clone()
    }

    /// Check if currently connected
    pub async fn is_connected(&self) -> bool {
        matches!(*self.state.read().await, ConnectionState::Connected)
    }

    /// The configuration this manager was built with.
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Parse connection URI and create client options
    async fn parse_uri(uri: &str) -> Result<ClientOptions> {
        ClientOptions::parse(uri)
            .await
            .map_err(|e| TransportError::InvalidUri(format!("{uri}: {e}")).into())
    }

    /// Configure client options with pool settings
    fn configure_pool(&self, mut options: ClientOptions) -> ClientOptions {
        let timeout = Duration::from_secs(self.config.timeout);

        options.max_pool_size = Some(self.config.max_pool_size);
        options.min_pool_size = Some(self.config.min_pool_size);
        options.max_idle_time = Some(Duration::from_secs(self.config.idle_timeout));
        options.connect_timeout = Some(timeout);
        options.server_selection_timeout = Some(timeout);

        if options.app_name.is_none() {
            options.app_name = self.config.app_name.clone();
        }

        options
    }

    /// Update connection state
    async fn set_state(&self, new_state: ConnectionState) {
        *self.state.write().await = new_state;
    }

    /// Attempt connection with retries
    async fn connect_with_retry(&self, options: ClientOptions) -> Result<Client> {
        let attempts = self.config.retry_attempts.max(1);
        let mut last_error = String::new();

        for attempt in 1..=attempts {
            debug!("Connection attempt {}/{}", attempt, attempts);

            let client = Client::with_options(options.clone())
                .map_err(|e| TransportError::ConnectionFailed(e.to_string()))?;

            match client.database("admin").run_command(doc! { "ping": 1 }).await {
                Ok(_) => return Ok(client),
                Err(e) => {
                    warn!("Connection attempt {} failed: {}", attempt, e);
                    last_error = e.to_string();
                }
            }

            if attempt < attempts {
                tokio::time::sleep(Duration::from_millis(200 * u64::from(attempt))).await;
            }
        }

        Err(TransportError::ConnectionFailed(last_error).into())
    }

    /// Verify connection is alive by sending a ping
    async fn ping(&self) -> Result<bool> {
        let client = self.get_client()?;
        let reply = client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await?;
        Ok(crate::response::is_ok(&reply))
    }

    /// Fetch the server version through `buildInfo`
    async fn server_version(client: &Client) -> Result<String> {
        let reply = client
            .database("admin")
            .run_command(doc! { "buildInfo": 1 })
            .await?;
        reply
            .get_str("version")
            .map(str::to_string)
            .map_err(|_| DbError::MalformedResponse("buildInfo has no version".to_string()))
    }
}

#[async_trait]
impl Connection for ConnectionManager {
    async fn run_command(&self, database: &str, command: Document) -> Result<Document> {
        let client = self.get_client()?;

        match client.database(database).run_command(command).await {
            Ok(reply) => Ok(reply),
            // The driver raises on `ok: 0`; hand the failure back as a reply.
            Err(e) => match e.kind.as_ref() {
                ErrorKind::Command(CommandError {
                    code,
                    code_name,
                    message,
                    ..
                }) => Ok(command_error_reply(*code, code_name, message)),
                _ => Err(e.into()),
            },
        }
    }
}

/// Rebuild the `ok: 0` reply the driver turned into a [`CommandError`].
fn command_error_reply(code: i32, code_name: &str, message: &str) -> Document {
    let mut reply = doc! {
        "ok": 0.0,
        "errmsg": message,
        "code": code,
    };
    if !code_name.is_empty() {
        reply.insert("codeName", code_name);
    }
    reply
}
