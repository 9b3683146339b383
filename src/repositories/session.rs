use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::models::session::SessionRecord;
use crate::storage::{Filter, KvStore, Record, SqliteStore, StoreError};

/// CRUD over [`SessionRecord`]s with expiry-aware lookup.
///
/// Cheap to clone; every clone shares the same store.
pub struct SessionRepository<S: KvStore = SqliteStore> {
    store: Arc<S>,
}

impl<S: KvStore> Clone for SessionRepository<S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
        }
    }
}

impl<S: KvStore> SessionRepository<S> {
    /// Creates a repository, registering the session schema with the store.
    pub fn new(store: Arc<S>) -> Result<Self> {
        store.register(&SessionRecord::SCHEMA)?;
        Ok(Self { store })
    }

    /// Finds a session record that has not expired yet.
    ///
    /// An expired record is reported as absent but left in place; removing it
    /// is the sweeper's job.
    pub fn find_live(&self, id: &str) -> Result<Option<SessionRecord>> {
        let filter = Filter::eq("id", id).and(Filter::gt("expires_at", Utc::now()));
        self.find(&filter)
    }

    /// Finds a session record regardless of its expiry.
    pub fn find_by_id(&self, id: &str) -> Result<Option<SessionRecord>> {
        self.find(&Filter::eq("id", id))
    }

    fn find(&self, filter: &Filter) -> Result<Option<SessionRecord>> {
        match self.store.find_one::<SessionRecord>(filter) {
            Ok(record) => Ok(Some(record)),
            Err(StoreError::NotFound) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    pub fn insert(&self, record: &SessionRecord) -> Result<()> {
        self.store.insert(record.key(), record)?;
        Ok(())
    }

    pub fn update(&self, record: &SessionRecord) -> Result<()> {
        self.store.update(record.key(), record)?;
        Ok(())
    }

    /// Deletes a session record, returning whether it existed.
    pub fn delete(&self, id: &str) -> Result<bool> {
        Ok(self.store.delete::<SessionRecord>(id)?)
    }

    /// Deletes every record with `expires_at <= now`.
    ///
    /// Idempotent and safe to run concurrently with request traffic.
    pub fn delete_expired(&self, now: DateTime<Utc>) -> Result<usize> {
        Ok(self
            .store
            .delete_matching::<SessionRecord>(&Filter::le("expires_at", now))?)
    }

    /// The number of stored records, expired ones included.
    pub fn count(&self) -> Result<usize> {
        Ok(self.store.count::<SessionRecord>(None)?)
    }
}
