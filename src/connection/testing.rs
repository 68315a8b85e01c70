//! Scripted in-memory connection for unit tests
//!
//! Understands just enough of the command protocol for the handle's own
//! needs: `find`/`getMore` over seeded collections, `drop`, and canned
//! replies keyed by command verb. Every command sent is recorded.

use async_trait::async_trait;
use mongodb::bson::{Bson, Document, doc};
use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use crate::error::{Result, TransportError};

use super::Connection;

pub(crate) struct MockConnection {
    replies: Mutex<HashMap<String, VecDeque<Document>>>,
    collections: Mutex<HashMap<String, Vec<Document>>>,
    cursors: Mutex<HashMap<i64, Vec<Document>>>,
    sent: Mutex<Vec<(String, Document)>>,
    batch_size: usize,
    broken: bool,
}

impl MockConnection {
    pub(crate) fn new() -> Self {
        Self {
            replies: Mutex::new(HashMap::new()),
            collections: Mutex::new(HashMap::new()),
            cursors: Mutex::new(HashMap::new()),
            sent: Mutex::new(Vec::new()),
            batch_size: 2,
            broken: false,
        }
    }

    /// A connection whose every command fails in transport.
    pub(crate) fn broken() -> Self {
        Self {
            broken: true,
            ..Self::new()
        }
    }

    /// Queue a reply for the next command with this verb.
    pub(crate) fn reply(self, verb: &str, reply: Document) -> Self {
        self.replies
            .lock()
            .unwrap()
            .entry(verb.to_string())
            .or_default()
            .push_back(reply);
        self
    }

    /// Seed a collection, addressed by its full `db.collection` namespace.
    pub(crate) fn collection(self, namespace: &str, docs: Vec<Document>) -> Self {
        self.collections
            .lock()
            .unwrap()
            .insert(namespace.to_string(), docs);
        self
    }

    /// Every `(database, command)` pair received so far.
    pub(crate) fn sent(&self) -> Vec<(String, Document)> {
        self.sent.lock().unwrap().clone()
    }

    pub(crate) fn last_command(&self) -> Option<Document> {
        self.sent.lock().unwrap().last().map(|(_, cmd)| cmd.clone())
    }

    fn answer(&self, database: &str, command: &Document) -> Document {
        let Some(verb) = command.keys().next().cloned() else {
            return doc! { "ok": 0.0, "errmsg": "no command" };
        };

        if let Some(reply) = self
            .replies
            .lock()
            .unwrap()
            .get_mut(&verb)
            .and_then(VecDeque::pop_front)
        {
            return reply;
        }

        match verb.as_str() {
            "find" => self.find(database, command),
            "getMore" => self.get_more(command),
            "drop" => self.drop_collection(database, command),
            _ => doc! { "ok": 1.0 },
        }
    }

    fn find(&self, database: &str, command: &Document) -> Document {
        let collection = command.get_str("find").unwrap_or_default();
        let namespace = format!("{database}.{collection}");
        let filter = command.get_document("filter").cloned().unwrap_or_default();
        let limit = command.get_i64("limit").ok();

        let mut matched: Vec<Document> = self
            .collections
            .lock()
            .unwrap()
            .get(&namespace)
            .map(|docs| {
                docs.iter()
                    .filter(|d| filter.iter().all(|(k, v)| d.get(k) == Some(v)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        if let Some(limit) = limit {
            matched.truncate(limit as usize);
        }

        let rest = if matched.len() > self.batch_size {
            matched.split_off(self.batch_size)
        } else {
            Vec::new()
        };

        let mut cursors = self.cursors.lock().unwrap();
        let id = if rest.is_empty() {
            0
        } else {
            let id = cursors.keys().max().copied().unwrap_or(0) + 1;
            cursors.insert(id, rest);
            id
        };

        doc! {
            "cursor": {
                "firstBatch": matched.into_iter().map(Bson::Document).collect::<Vec<_>>(),
                "id": id,
                "ns": namespace,
            },
            "ok": 1.0,
        }
    }

    fn get_more(&self, command: &Document) -> Document {
        let id = command.get_i64("getMore").unwrap_or_default();
        let mut cursors = self.cursors.lock().unwrap();
        let mut remaining = cursors.remove(&id).unwrap_or_default();

        let rest = if remaining.len() > self.batch_size {
            remaining.split_off(self.batch_size)
        } else {
            Vec::new()
        };
        let next_id = if rest.is_empty() {
            0
        } else {
            cursors.insert(id, rest);
            id
        };

        doc! {
            "cursor": {
                "nextBatch": remaining.into_iter().map(Bson::Document).collect::<Vec<_>>(),
                "id": next_id,
            },
            "ok": 1.0,
        }
    }

    fn drop_collection(&self, database: &str, command: &Document) -> Document {
        let collection = command.get_str("drop").unwrap_or_default();
        let namespace = format!("{database}.{collection}");
        match self.collections.lock().unwrap().remove(&namespace) {
            Some(_) => doc! { "ns": namespace, "nIndexesWas": 1, "ok": 1.0 },
            None => doc! { "ok": 0.0, "errmsg": "ns not found", "code": 26 },
        }
    }
}

#[async_trait]
impl Connection for MockConnection {
    async fn run_command(&self, database: &str, command: Document) -> Result<Document> {
        self.sent
            .lock()
            .unwrap()
            .push((database.to_string(), command.clone()));

        if self.broken {
            return Err(TransportError::Disconnected("socket closed".to_string()).into());
        }

        Ok(self.answer(database, &command))
    }
}
