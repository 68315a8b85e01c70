//! Error handling for the database handle.
//!
//! Three tiers of failure exist and only two of them are errors:
//! - local validation failures (an invalid database name) are [`DbError::InvalidName`];
//! - transport failures raised by the connection propagate as
//!   [`DbError::Transport`] or [`DbError::MongoDb`];
//! - command failures (`ok != 1`) are ordinary return values, see
//!   [`crate::response::CommandOutcome`]. [`ErrorInfo`] gives them a structured,
//!   JSON-friendly shape.
//!
//! # Example
//!
//! ```rust
//! use dbhandle::error::{DbError, Result};
//!
//! fn check(result: Result<()>) -> bool {
//!     matches!(result, Err(DbError::InvalidName(_)))
//! }
//! ```

pub mod kinds;
pub mod mongo;

pub use kinds::{
    ConfigError, DbError, InvalidNameError, InvalidNameReason, Result, TransportError,
};
pub use mongo::ErrorInfo;
