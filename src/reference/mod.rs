//! Database references (DBRefs)
//!
//! A DBRef points at a document in another collection of the same database:
//! `{ "$ref": <collection>, "$id": <_id> }`. References are a typed
//! [`DbRef`] value, but documents produced elsewhere are recognized by shape
//! too, so a plain document with exactly those two keys is a reference.

use mongodb::bson::{Bson, Document, doc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::collection::ID_FIELD;
use crate::database::Database;
use crate::error::Result;

/// Key naming the referenced collection.
pub const REF: &str = "$ref";
/// Key holding the referenced identifier.
pub const ID: &str = "$id";

/// A reference to a document by collection and `_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DbRef {
    #[serde(rename = "$ref")]
    pub namespace: String,

    #[serde(rename = "$id")]
    pub id: Bson,
}

impl DbRef {
    pub fn new(namespace: impl Into<String>, id: impl Into<Bson>) -> Self {
        Self {
            namespace: namespace.into(),
            id: id.into(),
        }
    }

    /// Build a reference from a document or a bare identifier.
    ///
    /// A document source must carry `_id`, whose value becomes the
    /// reference id. A bare `ObjectId` is used as is. Any other source gives
    /// `None`; callers may pass arbitrary values and only get a reference
    /// back when one can be made.
    pub fn create(namespace: impl Into<String>, source: impl Into<Bson>) -> Option<Self> {
        let id = match source.into() {
            Bson::Document(doc) => doc.get(ID_FIELD)?.clone(),
            id @ Bson::ObjectId(_) => id,
            _ => return None,
        };
        Some(Self::new(namespace, id))
    }

    /// Recognize a reference by shape.
    pub fn from_bson(candidate: &Bson) -> Option<Self> {
        match candidate {
            Bson::Document(doc) => Self::from_document(doc),
            _ => None,
        }
    }

    /// Recognize a reference document: exactly `$ref` (a string) and `$id`.
    pub fn from_document(doc: &Document) -> Option<Self> {
        if doc.len() != 2 {
            return None;
        }
        let namespace = doc.get_str(REF).ok()?;
        let id = doc.get(ID)?;
        Some(Self::new(namespace, id.clone()))
    }

    pub fn to_document(&self) -> Document {
        doc! { REF: self.namespace.as_str(), ID: self.id.clone() }
    }
}

impl From<DbRef> for Document {
    fn from(reference: DbRef) -> Self {
        reference.to_document()
    }
}

impl From<DbRef> for Bson {
    fn from(reference: DbRef) -> Self {
        Bson::Document(reference.to_document())
    }
}

/// Whether `candidate` is a reference document.
pub fn is_reference(candidate: &Bson) -> bool {
    DbRef::from_bson(candidate).is_some()
}

/// Fetch the document `candidate` refers to.
///
/// Returns `Ok(None)` when `candidate` is not a reference, and also when the
/// referenced document does not exist.
pub async fn resolve(database: &Database, candidate: &Bson) -> Result<Option<Document>> {
    let Some(reference) = DbRef::from_bson(candidate) else {
        return Ok(None);
    };

    debug!(
        "Resolving reference to '{}.{}'",
        database.name(),
        reference.namespace
    );
    database
        .collection(&reference.namespace)
        .find_by_id(reference.id)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::connection::testing::MockConnection;
    use mongodb::bson::oid::ObjectId;
    use std::sync::Arc;

    #[test]
    fn test_document_and_bare_id_converge() {
        let oid = ObjectId::new();
        let from_doc = DbRef::create("ns", doc! { "_id": oid, "name": "x" });
        let from_id = DbRef::create("ns", oid);
        assert!(from_doc.is_some());
        assert_eq!(from_doc, from_id);
        assert_eq!(
            from_id.unwrap().to_document(),
            doc! { "$ref": "ns", "$id": oid }
        );
    }

    #[test]
    fn test_document_id_of_any_type() {
        let reference = DbRef::create("coll", doc! { "_id": 7 }).unwrap();
        assert_eq!(reference.id, Bson::Int32(7));
    }

    #[test]
    fn test_create_declines_unusable_sources() {
        assert_eq!(DbRef::create("ns", doc! { "name": "no id" }), None);
        assert_eq!(DbRef::create("ns", 7), None);
        assert_eq!(DbRef::create("ns", "507f1f77bcf86cd799439011"), None);
        assert_eq!(DbRef::create("ns", Bson::Null), None);
    }

    #[test]
    fn test_is_reference_requires_exactly_both_keys() {
        assert!(is_reference(&Bson::Document(doc! { "$ref": "a", "$id": 1 })));
        assert!(!is_reference(&Bson::Document(doc! { "$ref": "a" })));
        assert!(!is_reference(&Bson::Document(doc! { "$id": 1 })));
        assert!(!is_reference(&Bson::Document(
            doc! { "$ref": "a", "$id": 1, "$db": "other" }
        )));
        assert!(!is_reference(&Bson::Document(doc! { "$ref": 5, "$id": 1 })));
        assert!(!is_reference(&Bson::Int32(1)));
        assert!(!is_reference(&Bson::String("$ref".to_string())));
    }

    #[test]
    fn test_external_document_is_recognized() {
        let external = doc! { "$id": "abc", "$ref": "people" };
        assert_eq!(
            DbRef::from_document(&external),
            Some(DbRef::new("people", "abc"))
        );
    }

    #[test]
    fn test_serde_shape_matches_document() {
        let reference = DbRef::new("people", 42);
        let serialized = bson::to_bson(&reference).unwrap();
        assert_eq!(serialized, Bson::from(&reference));

        let back: DbRef = bson::from_bson(serialized).unwrap();
        assert_eq!(back, reference);
    }

    #[tokio::test]
    async fn test_resolve_missing_document_is_none() {
        let mock = Arc::new(MockConnection::new().collection("app.people", vec![]));
        let db = Database::new(mock.clone(), "app").unwrap();

        let found = resolve(&db, &DbRef::new("people", 1).into()).await.unwrap();
        assert_eq!(found, None);
        assert_eq!(mock.sent().len(), 1);
    }

    #[tokio::test]
    async fn test_resolve_non_reference_sends_nothing() {
        let mock = Arc::new(MockConnection::new());
        let db = Database::new(mock.clone(), "app").unwrap();

        assert_eq!(resolve(&db, &Bson::Int32(7)).await.unwrap(), None);
        assert!(mock.sent().is_empty());
    }
}
