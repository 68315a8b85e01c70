//! Collection handles
//!
//! A [`Collection`] is obtained from [`crate::Database`] and only carries
//! what the database layer needs from a collection: reads by filter or by
//! `_id` (used by DBRef resolution and collection listing) and `drop`.
//! Reads go through the `find`/`getMore` commands on the database's
//! connection.

use mongodb::bson::{Bson, Document, doc};
use tracing::{debug, warn};

use crate::database::Database;
use crate::error::{DbError, ErrorInfo, Result};
use crate::response::{self, CommandOutcome};

/// Reserved key holding a document's identifier.
pub const ID_FIELD: &str = "_id";

/// A collection of a [`Database`].
#[derive(Debug, Clone)]
pub struct Collection {
    database: Database,
    name: String,
}

impl Collection {
    pub(crate) fn new(database: Database, name: &str) -> Self {
        Self {
            database,
            name: name.to_string(),
        }
    }

    /// Gets the name of the collection.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The database this collection belongs to.
    pub fn database(&self) -> &Database {
        &self.database
    }

    /// The `<database>.<collection>` namespace.
    pub fn full_name(&self) -> String {
        format!("{}.{}", self.database.name(), self.name)
    }

    /// All documents matching `filter`, following the cursor to the end.
    pub async fn find(&self, filter: Document) -> Result<Vec<Document>> {
        self.query(doc! { "find": self.name.as_str(), "filter": filter })
            .await
    }

    /// First document matching `filter`.
    pub async fn find_one(&self, filter: Document) -> Result<Option<Document>> {
        let docs = self
            .query(doc! {
                "find": self.name.as_str(),
                "filter": filter,
                "limit": 1_i64,
                "singleBatch": true,
            })
            .await?;
        Ok(docs.into_iter().next())
    }

    /// The document whose `_id` equals `id`.
    pub async fn find_by_id(&self, id: impl Into<Bson>) -> Result<Option<Document>> {
        let id: Bson = id.into();
        self.find_one(doc! { ID_FIELD: id }).await
    }

    /// Drop this collection. A missing collection is a failed outcome.
    pub async fn drop(&self) -> Result<CommandOutcome> {
        debug!("Dropping collection '{}'", self.full_name());
        let reply = self
            .database
            .run_command(doc! { "drop": self.name.as_str() })
            .await?;
        Ok(CommandOutcome::interpret(reply))
    }

    async fn query(&self, command: Document) -> Result<Vec<Document>> {
        let reply = self.database.run_command(command).await?;
        let (mut cursor_id, mut docs) = read_batch(reply, "firstBatch")?;

        while cursor_id != 0 {
            let (next_id, batch) = match self.get_more(cursor_id).await {
                Ok(next) => next,
                Err(e) => {
                    self.kill_cursor(cursor_id).await;
                    return Err(e);
                }
            };
            docs.extend(batch);
            cursor_id = next_id;
        }

        debug!("Read {} documents from '{}'", docs.len(), self.full_name());
        Ok(docs)
    }

    async fn get_more(&self, cursor_id: i64) -> Result<(i64, Vec<Document>)> {
        let reply = self
            .database
            .run_command(doc! { "getMore": cursor_id, "collection": self.name.as_str() })
            .await?;
        read_batch(reply, "nextBatch")
    }

    /// Release a server cursor abandoned mid-read. Failures are only logged.
    async fn kill_cursor(&self, cursor_id: i64) {
        let command = doc! { "killCursors": self.name.as_str(), "cursors": [cursor_id] };
        if let Err(e) = self.database.run_command(command).await {
            warn!("Failed to kill cursor {} on '{}': {}", cursor_id, self.full_name(), e);
        }
    }
}

/// Split a cursor reply into its id and its batch of documents.
fn read_batch(reply: Document, batch_key: &str) -> Result<(i64, Vec<Document>)> {
    if !response::is_ok(&reply) {
        return Err(DbError::QueryFailed(ErrorInfo::from_command_response(
            &reply,
        )));
    }

    let cursor = reply
        .get_document("cursor")
        .map_err(|_| DbError::MalformedResponse("reply has no cursor".to_string()))?;

    let id = match cursor.get("id") {
        Some(Bson::Int64(id)) => *id,
        Some(Bson::Int32(id)) => i64::from(*id),
        _ => return Err(DbError::MalformedResponse("cursor has no id".to_string())),
    };

    let batch = cursor
        .get_array(batch_key)
        .map_err(|_| DbError::MalformedResponse(format!("cursor has no {batch_key}")))?
        .iter()
        .filter_map(|value| match value {
            Bson::Document(doc) => Some(doc.clone()),
            _ => None,
        })
        .collect();

    Ok((id, batch))
}
