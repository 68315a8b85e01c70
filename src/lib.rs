//! MongoDB database handle library
//!
//! This library provides a logical handle on one database of a MongoDB
//! deployment: administrative commands, collection and GridFS handles, and
//! DBRef creation and resolution, all over a shared connection.
//!
//! # Modules
//!
//! - `cli`: Command-line interface and argument parsing
//! - `collection`: Collection handles and cursor reads
//! - `command`: Administrative command documents
//! - `config`: Configuration management
//! - `connection`: The connection seam and the driver-backed manager
//! - `database`: The database handle
//! - `error`: Error types and handling
//! - `gridfs`: GridFS collection pairs
//! - `reference`: DBRef values and resolution
//! - `response`: Command reply interpretation
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use dbhandle::{config::Config, ConnectionManager, Database};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let mut manager = ConnectionManager::new(
//!         "mongodb://localhost:27017".to_string(),
//!         config.connection,
//!     );
//!     manager.connect().await?;
//!
//!     let db = Database::new(Arc::new(manager), "app")?;
//!     println!("{:?}", db.list_collections().await?);
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod collection;
pub mod command;
pub mod config;
pub mod connection;
pub mod database;
pub mod error;
pub mod gridfs;
pub mod reference;
pub mod response;

// Re-export commonly used types
pub use collection::Collection;
pub use command::{CreateCollectionOptions, ProfilingLevel};
pub use config::Config;
pub use connection::{Connection, ConnectionManager};
pub use database::Database;
pub use error::{DbError, Result};
pub use gridfs::GridFs;
pub use reference::DbRef;
pub use response::{CommandOutcome, ProfilingOutcome};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Get library version string
pub fn version() -> &'static str {
    VERSION
}
