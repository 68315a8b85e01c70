//! Logical database handle
//!
//! [`Database`] binds a validated database name to a shared [`Connection`].
//! It builds administrative commands, sends them through the connection and
//! interprets the replies. It is also the only place that constructs
//! [`Collection`] and [`GridFs`] handles.
//!
//! Server-side failures come back as [`CommandOutcome::Failed`] or
//! [`ProfilingOutcome::Failed`]; only an invalid name at construction and
//! transport failures are errors.

use mongodb::bson::{Bson, Document, doc};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::collection::Collection;
use crate::command::{self, CreateCollectionOptions, DatabaseCommand};
use crate::connection::Connection;
use crate::error::{InvalidNameError, InvalidNameReason, Result};
use crate::gridfs::GridFs;
use crate::reference::{self, DbRef};
use crate::response::{CommandOutcome, ProfilingOutcome};

/// Collection listing namespaces of a database (pre-3.0 servers).
pub const SYSTEM_NAMESPACES: &str = "system.namespaces";

/// Validate a database name.
///
/// The value's string form must be non-empty and contain neither a space nor
/// a `.`. Everything else is accepted, `$` included.
pub fn validate_name(name: impl fmt::Display) -> std::result::Result<String, InvalidNameError> {
    let name = name.to_string();

    let reason = if name.is_empty() {
        Some(InvalidNameReason::Empty)
    } else if name.contains(' ') {
        Some(InvalidNameReason::ContainsSpace)
    } else if name.contains('.') {
        Some(InvalidNameReason::ContainsDot)
    } else {
        None
    };

    match reason {
        Some(reason) => Err(InvalidNameError { name, reason }),
        None => Ok(name),
    }
}

/// Either a collection name or an existing handle.
#[derive(Debug, Clone)]
pub enum CollectionTarget {
    Name(String),
    Handle(Collection),
}

impl From<&str> for CollectionTarget {
    fn from(name: &str) -> Self {
        CollectionTarget::Name(name.to_string())
    }
}

impl From<String> for CollectionTarget {
    fn from(name: String) -> Self {
        CollectionTarget::Name(name)
    }
}

impl From<Collection> for CollectionTarget {
    fn from(collection: Collection) -> Self {
        CollectionTarget::Handle(collection)
    }
}

impl From<&Collection> for CollectionTarget {
    fn from(collection: &Collection) -> Self {
        CollectionTarget::Handle(collection.clone())
    }
}

/// A database on a shared connection.
///
/// Cloning is cheap and clones share the same connection. The handle never
/// opens or closes the connection.
#[derive(Clone)]
pub struct Database {
    inner: Arc<DatabaseInner>,
}

struct DatabaseInner {
    name: String,
    connection: Arc<dyn Connection>,
}

impl Database {
    /// Create a handle for `name` on `connection`.
    ///
    /// Fails with [`crate::DbError::InvalidName`] when the name is empty or
    /// contains a space or a `.`; that is the only failure mode.
    pub fn new(connection: Arc<dyn Connection>, name: impl fmt::Display) -> Result<Self> {
        let name = validate_name(name)?;
        Ok(Self {
            inner: Arc::new(DatabaseInner { name, connection }),
        })
    }

    /// Gets the name of the database.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Send a raw command document and return the raw reply.
    pub(crate) async fn run_command(&self, command: Document) -> Result<Document> {
        debug!("Running command on '{}': {}", self.name(), command);
        self.inner
            .connection
            .run_command(self.name(), command)
            .await
    }

    async fn run(&self, command: DatabaseCommand) -> Result<Document> {
        self.run_command(command.to_document()).await
    }

    /// Run an arbitrary command document against this database.
    pub async fn command(&self, command: Document) -> Result<CommandOutcome> {
        let reply = self.run_command(command).await?;
        Ok(CommandOutcome::interpret(reply))
    }

    /// Read the current profiling level.
    pub async fn get_profiling_level(&self) -> Result<ProfilingOutcome> {
        let reply = self.run(command::get_profiling_level()).await?;
        Ok(ProfilingOutcome::interpret(reply))
    }

    /// Change the profiling level; the outcome carries the previous level.
    pub async fn set_profiling_level(&self, level: i32) -> Result<ProfilingOutcome> {
        info!("Setting profiling level of '{}' to {}", self.name(), level);
        let reply = self.run(command::set_profiling_level(level)).await?;
        Ok(ProfilingOutcome::interpret(reply))
    }

    /// Drop this database.
    pub async fn drop(&self) -> Result<CommandOutcome> {
        info!("Dropping database '{}'", self.name());
        let reply = self.run(command::drop_database()).await?;
        Ok(CommandOutcome::interpret(reply))
    }

    /// Repair this database.
    pub async fn repair(
        &self,
        preserve_cloned_files_on_failure: bool,
        backup_original_files: bool,
    ) -> Result<CommandOutcome> {
        info!("Repairing database '{}'", self.name());
        let reply = self
            .run(command::repair_database(
                preserve_cloned_files_on_failure,
                backup_original_files,
            ))
            .await?;
        Ok(CommandOutcome::interpret(reply))
    }

    /// Gets a handle to a collection of this database.
    ///
    /// Nothing is sent to the server.
    pub fn collection(&self, name: &str) -> Collection {
        Collection::new(self.clone(), name)
    }

    /// Declare a collection, then hand back a handle to it.
    ///
    /// The create outcome is logged and otherwise ignored: the handle is
    /// returned even when the server refused (e.g. the collection already
    /// exists). Transport errors still propagate.
    pub async fn create_collection(
        &self,
        name: &str,
        options: CreateCollectionOptions,
    ) -> Result<Collection> {
        info!("Creating collection '{}.{}'", self.name(), name);
        let reply = self.run(command::create_collection(name, options)).await?;

        if let CommandOutcome::Failed(failure) = CommandOutcome::interpret(reply) {
            warn!(
                "Create of '{}.{}' was not acknowledged: {}",
                self.name(),
                name,
                failure.info().to_json_compact().unwrap_or_default()
            );
        }

        Ok(self.collection(name))
    }

    /// Drop a collection given by name or by handle.
    pub async fn drop_collection(
        &self,
        target: impl Into<CollectionTarget>,
    ) -> Result<CommandOutcome> {
        let collection = match target.into() {
            CollectionTarget::Name(name) => self.collection(&name),
            CollectionTarget::Handle(collection) => collection,
        };
        collection.drop().await
    }

    /// Names of the collections of this database.
    ///
    /// Reads `system.namespaces`. Entries whose name has a `$` after the
    /// first character (index namespaces) are skipped; a leading `$` is
    /// kept. Order is whatever the server returned.
    pub async fn list_collections(&self) -> Result<Vec<String>> {
        let namespaces = self.collection(SYSTEM_NAMESPACES).find(doc! {}).await?;
        let prefix = format!("{}.", self.name());

        let names: Vec<String> = namespaces
            .iter()
            .filter_map(|entry| entry.get_str("name").ok())
            .filter(|ns| !ns.find('$').is_some_and(|pos| pos > 0))
            .map(|ns| ns.strip_prefix(&prefix).unwrap_or(ns).to_string())
            .collect();

        debug!("Found {} collections in '{}'", names.len(), self.name());
        Ok(names)
    }

    /// Gets a GridFS handle on `<prefix>.files` and `<chunks_name>.chunks`.
    ///
    /// Nothing is sent to the server.
    pub fn gridfs(&self, prefix: &str, chunks_name: &str) -> GridFs {
        GridFs::new(self.clone(), prefix, chunks_name)
    }

    /// Build a reference to a document of `namespace`.
    ///
    /// See [`DbRef::create`] for the accepted sources.
    pub fn create_db_ref(&self, namespace: &str, source: impl Into<Bson>) -> Option<DbRef> {
        DbRef::create(namespace, source)
    }

    /// Fetch the document a reference points to.
    ///
    /// `Ok(None)` both when `reference` is not a reference and when no
    /// document matched.
    pub async fn get_db_ref(&self, reference: impl Into<Bson>) -> Result<Option<Document>> {
        reference::resolve(self, &reference.into()).await
    }

    /// Evaluate JavaScript on the server.
    pub async fn execute(&self, code: &str, args: Vec<Bson>) -> Result<CommandOutcome> {
        let reply = self.run(command::eval(code, args)).await?;
        Ok(CommandOutcome::interpret(reply))
    }

    /// Cursor bookkeeping information.
    pub async fn index_info(&self) -> Result<CommandOutcome> {
        let reply = self.run(command::index_info()).await?;
        Ok(CommandOutcome::interpret(reply))
    }

    /// Error status of the last operation on this connection.
    pub async fn last_error(&self) -> Result<CommandOutcome> {
        self.error_status(DatabaseCommand::LastError).await
    }

    /// Error status of the last failed operation on this connection.
    pub async fn prev_error(&self) -> Result<CommandOutcome> {
        self.error_status(DatabaseCommand::PrevError).await
    }

    /// Clear the error status of this connection.
    pub async fn reset_error(&self) -> Result<CommandOutcome> {
        self.error_status(DatabaseCommand::ResetError).await
    }

    /// Make the server raise a database error.
    pub async fn force_error(&self) -> Result<CommandOutcome> {
        self.error_status(DatabaseCommand::ForceError).await
    }

    async fn error_status(&self, command: DatabaseCommand) -> Result<CommandOutcome> {
        let reply = self.run(command).await?;
        Ok(CommandOutcome::interpret(reply))
    }
}

impl fmt::Display for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl fmt::Debug for Database {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Database")
            .field("name", &self.inner.name)
            .finish_non_exhaustive()
    }
}
