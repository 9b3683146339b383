use std::collections::HashMap;

use serde::{Serialize, de::DeserializeOwned};
use sonic_rs::Value;

use crate::error::{Result, SessionError};
use crate::models::options::Options;

/// Reserved key holding pending flash messages.
pub const FLASH_KEY: &str = "_flash";

/// Application data carried by a session.
pub type Values = HashMap<String, Value>;

/// Request-scoped view of one named session.
///
/// Never persisted directly: only its values are, encoded by the key ring.
#[derive(Debug, Clone)]
pub struct Session {
    name: String,
    /// The record ID; empty until the first save.
    pub id: String,
    pub values: Values,
    pub options: Options,
    /// Whether no live record backed this session when it was loaded.
    pub is_new: bool,
}

impl Session {
    /// Creates an empty, unsaved session.
    pub fn new(name: impl Into<String>, options: Options) -> Self {
        Self {
            name: name.into(),
            id: String::new(),
            values: Values::new(),
            options,
            is_new: true,
        }
    }

    /// The logical session name, also used as the cookie name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the value under `key` converted to `T`, if present and compatible.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        self.values
            .get(key)
            .and_then(|value| sonic_rs::from_value(value).ok())
    }

    pub fn insert<T: Serialize>(&mut self, key: impl Into<String>, value: T) -> Result<()> {
        let value =
            sonic_rs::to_value(&value).map_err(|e| SessionError::EncodingFailed(e.to_string()))?;
        self.values.insert(key.into(), value);
        Ok(())
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.values.remove(key)
    }

    /// Drops every value, flashes included.
    pub fn clear(&mut self) {
        self.values.clear();
    }

    /// Queues a flash message, delivered once by [`Session::flashes`].
    pub fn add_flash<T: Serialize>(&mut self, value: T) -> Result<()> {
        let value =
            sonic_rs::to_value(&value).map_err(|e| SessionError::EncodingFailed(e.to_string()))?;
        let mut pending = self.pending_flashes();
        pending.push(value);
        self.insert(FLASH_KEY, pending)
    }

    /// Takes all queued flash messages.
    pub fn flashes(&mut self) -> Vec<Value> {
        let pending = self.pending_flashes();
        self.values.remove(FLASH_KEY);
        pending
    }

    fn pending_flashes(&self) -> Vec<Value> {
        self.get::<Vec<Value>>(FLASH_KEY).unwrap_or_default()
    }
}
