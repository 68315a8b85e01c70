//! GridFS handles
//!
//! GridFS stores a file as one metadata document in `<prefix>.files` and its
//! content as chunk documents in `<chunks>.chunks`. This crate only locates
//! the two collections; reading and writing chunks is up to the caller.

use crate::collection::Collection;
use crate::database::Database;

/// The pair of collections backing a GridFS store.
#[derive(Debug, Clone)]
pub struct GridFs {
    database: Database,
    prefix: String,
    chunks_name: String,
}

impl GridFs {
    pub(crate) fn new(database: Database, prefix: &str, chunks_name: &str) -> Self {
        Self {
            database,
            prefix: prefix.to_string(),
            chunks_name: chunks_name.to_string(),
        }
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn chunks_name(&self) -> &str {
        &self.chunks_name
    }

    /// The metadata collection, `<prefix>.files`.
    pub fn files(&self) -> Collection {
        self.database.collection(&format!("{}.files", self.prefix))
    }

    /// The content collection, `<chunks_name>.chunks`.
    pub fn chunks(&self) -> Collection {
        self.database
            .collection(&format!("{}.chunks", self.chunks_name))
    }
}

#[cfg(test)]
mod tests {
    use crate::connection::testing::MockConnection;
    use crate::database::Database;
    use std::sync::Arc;

    #[test]
    fn test_separate_chunks_prefix() {
        let db = Database::new(Arc::new(MockConnection::new()), "media").unwrap();
        let fs = db.gridfs("images", "blobs");

        assert_eq!(fs.prefix(), "images");
        assert_eq!(fs.chunks_name(), "blobs");
        assert_eq!(fs.database().name(), "media");
        assert_eq!(fs.files().name(), "images.files");
        assert_eq!(fs.chunks().name(), "blobs.chunks");
    }
}
