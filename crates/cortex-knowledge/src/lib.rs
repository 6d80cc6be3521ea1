//! Runtime store for knowledge tables.
//!
//! A knowledge table is a named, versioned snapshot of per-host data (e.g.
//! CPU usage, maintenance state) that pipeline steps query while filtering
//! and weighing candidates. `cortex-refresher` owns *producing* snapshots;
//! this crate only owns holding the latest one per table and notifying
//! anyone waiting on a table's readiness.
//!
//! The store is pre-registered with every table name known at startup
//! (from the settings document) so a step can always subscribe to a table
//! even before its first successful refresh, and a lookup for an
//! unregistered name is always an error rather than a silent empty result.

pub mod error;

pub use error::Error;

use cortex_config::{KnowledgeName, Version};
use parking_lot::RwLock;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::watch;

/// A published snapshot of a knowledge table: a version number plus the
/// per-host data as of that publish.
///
/// `data` is keyed by host id (or volume id, share id, etc. — whatever the
/// domain's candidates are identified by) to an arbitrary JSON value; steps
/// agree out of band on the shape they expect from a given table.
#[derive(Debug, Clone)]
pub struct Snapshot {
    /// The version this snapshot was published as.
    pub version: Version,
    /// The snapshot's data, keyed by host id.
    pub data: Arc<HashMap<String, Value>>,
}

impl Snapshot {
    fn empty() -> Self {
        Self {
            version: Version::initial(),
            data: Arc::new(HashMap::new()),
        }
    }

    /// Looks up a single host's entry in this snapshot.
    #[must_use]
    pub fn get(&self, host_id: &str) -> Option<&Value> {
        self.data.get(host_id)
    }
}

struct Entry {
    snapshot: Snapshot,
    ready: bool,
    version_tx: watch::Sender<Version>,
}

/// The runtime store of every knowledge table in the process.
///
/// Cheap to clone: internally an `Arc`-free `RwLock`-guarded map behind a
/// `parking_lot::RwLock`, shared by reference across the process (the
/// engine, the refresher, and the admin API each hold a `&KnowledgeStore`
/// or an `Arc<KnowledgeStore>` constructed once at startup).
pub struct KnowledgeStore {
    tables: RwLock<HashMap<KnowledgeName, Entry>>,
}

impl KnowledgeStore {
    /// Builds a store pre-registered with the given table names, each
    /// starting out unpublished (not ready, version 0).
    #[must_use]
    pub fn new(names: impl IntoIterator<Item = KnowledgeName>) -> Self {
        let mut tables = HashMap::new();
        for name in names {
            let (version_tx, _rx) = watch::channel(Version::initial());
            tables.insert(
                name,
                Entry {
                    snapshot: Snapshot::empty(),
                    ready: false,
                    version_tx,
                },
            );
        }
        Self {
            tables: RwLock::new(tables),
        }
    }

    /// Publishes a new snapshot for `name`, assigning it the next version
    /// after the table's current one, and wakes any subscriber.
    ///
    /// # Errors
    /// Returns [`Error::UnknownTable`] if `name` was not passed to
    /// [`KnowledgeStore::new`].
    pub fn publish(&self, name: &str, data: HashMap<String, Value>) -> Result<Version, Error> {
        let mut tables = self.tables.write();
        let entry = tables
            .get_mut(name)
            .ok_or_else(|| Error::UnknownTable { name: name.to_string() })?;
        let version = entry.snapshot.version.next();
        entry.snapshot = Snapshot {
            version,
            data: Arc::new(data),
        };
        entry.ready = true;
        // A stale receiver with no subscribers is fine; `send` only errors
        // when every receiver has been dropped, which does not invalidate
        // the publish.
        let _ = entry.version_tx.send(version);
        tracing::debug!(table = name, %version, "published knowledge snapshot");
        Ok(version)
    }

    /// Marks `name` as not ready, e.g. after a refresh failure that should
    /// not tolerate serving the stale snapshot.
    ///
    /// # Errors
    /// Returns [`Error::UnknownTable`] if `name` was not registered.
    pub fn mark_not_ready(&self, name: &str) -> Result<(), Error> {
        let mut tables = self.tables.write();
        let entry = tables
            .get_mut(name)
            .ok_or_else(|| Error::UnknownTable { name: name.to_string() })?;
        entry.ready = false;
        Ok(())
    }

    /// Returns the current snapshot for `name`, regardless of readiness.
    ///
    /// # Errors
    /// Returns [`Error::UnknownTable`] if `name` was not registered.
    pub fn get(&self, name: &str) -> Result<Snapshot, Error> {
        let tables = self.tables.read();
        tables
            .get(name)
            .map(|entry| entry.snapshot.clone())
            .ok_or_else(|| Error::UnknownTable { name: name.to_string() })
    }

    /// Returns whether `name` currently has a published, non-stale
    /// snapshot.
    ///
    /// # Errors
    /// Returns [`Error::UnknownTable`] if `name` was not registered.
    pub fn is_ready(&self, name: &str) -> Result<bool, Error> {
        let tables = self.tables.read();
        tables
            .get(name)
            .map(|entry| entry.ready)
            .ok_or_else(|| Error::UnknownTable { name: name.to_string() })
    }

    /// Subscribes to version changes for `name`. The returned receiver's
    /// current value is the table's version as of the call; awaiting
    /// `changed()` resolves the next time a snapshot is published.
    ///
    /// # Errors
    /// Returns [`Error::UnknownTable`] if `name` was not registered.
    pub fn subscribe(&self, name: &str) -> Result<watch::Receiver<Version>, Error> {
        let tables = self.tables.read();
        tables
            .get(name)
            .map(|entry| entry.version_tx.subscribe())
            .ok_or_else(|| Error::UnknownTable { name: name.to_string() })
    }

    /// Returns the names of every registered table.
    pub fn table_names(&self) -> Vec<KnowledgeName> {
        self.tables.read().keys().cloned().collect()
    }
}
