//! An in-memory [`Producer`] for tests and standalone operation.
//!
//! Concrete wire producers (Prometheus queries, OpenStack REST clients,
//! database drivers) are external to this crate; this is the one producer
//! shipped here, useful both in tests and as a way to run `cortexd` without
//! a live upstream by seeding a table's rows from the settings document or
//! a sidecar file instead of polling one.

use crate::{Error, Producer};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;

/// A producer whose snapshot is set directly rather than fetched, guarded
/// by a lock so it can be updated between refreshes (e.g. by a test, or by
/// a file-watcher wired up by the bootstrap binary).
#[derive(Default)]
pub struct StaticProducer {
    rows: RwLock<HashMap<String, Value>>,
}

impl StaticProducer {
    /// Builds a producer that always returns `rows` until [`StaticProducer::set`]
    /// replaces it.
    #[must_use]
    pub fn new(rows: HashMap<String, Value>) -> Self {
        Self { rows: RwLock::new(rows) }
    }

    /// Replaces the rows this producer returns on its next call.
    pub fn set(&self, rows: HashMap<String, Value>) {
        *self.rows.write() = rows;
    }
}

#[async_trait]
impl Producer for StaticProducer {
    async fn produce(&self) -> Result<HashMap<String, Value>, Error> {
        Ok(self.rows.read().clone())
    }
}
