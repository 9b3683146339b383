use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::storage::{FieldKind, FieldRole, FieldSpec, FieldValue, Record, Schema};

/// The persisted form of one session.
///
/// ⚠️ `data` holds the session values ENCODED by the key ring (authenticated
/// and, with a block key, encrypted) under the session name. It is opaque to
/// the repository and must only be read back through the same key ring.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// The session ID (base-32, no padding). Primary key.
    pub id: String,
    /// The encoded session values.
    pub data: String,
    /// The timestamp when the record was inserted.
    pub created_at: DateTime<Utc>,
    /// The timestamp of the last save.
    pub updated_at: DateTime<Utc>,
    /// The timestamp after which the record is dead.
    pub expires_at: DateTime<Utc>,
}

impl Record for SessionRecord {
    const SCHEMA: Schema = Schema {
        table: "sessions",
        fields: &[
            FieldSpec {
                name: "id",
                role: FieldRole::PrimaryKey,
                kind: FieldKind::Text,
            },
            FieldSpec {
                name: "expires_at",
                role: FieldRole::Indexed,
                kind: FieldKind::Timestamp,
            },
        ],
    };

    fn key(&self) -> &str {
        &self.id
    }

    fn indexed_value(&self, field: &str) -> Option<FieldValue> {
        match field {
            "expires_at" => Some(self.expires_at.into()),
            _ => None,
        }
    }
}
