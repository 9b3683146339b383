use std::path::Path;

use parking_lot::{Mutex, MutexGuard};
use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, ErrorCode, OptionalExtension, params_from_iter};

use super::{FieldRole, FieldKind, FieldValue, Filter, KvStore, Record, Schema, StoreError};

const KEY_COLUMN: &str = "key";
const BODY_COLUMN: &str = "body";

/// [`KvStore`] backed by an embedded SQLite database.
///
/// Each registered schema becomes one table holding the primary key, the
/// JSON body and one column per indexed field. Thread-safe via an internal
/// `Mutex<Connection>`.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (or creates) the database at `path`.
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Opens a private in-memory database.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock()
    }
}

impl KvStore for SqliteStore {
    fn register(&self, schema: &Schema) -> Result<(), StoreError> {
        let mut columns = vec![
            format!("\"{KEY_COLUMN}\" TEXT PRIMARY KEY NOT NULL"),
            format!("\"{BODY_COLUMN}\" TEXT NOT NULL"),
        ];
        let mut indexes = Vec::new();
        for spec in schema.indexed() {
            let sql_type = match spec.kind {
                FieldKind::Text => "TEXT",
                FieldKind::Timestamp => "INTEGER",
            };
            columns.push(format!("\"{}\" {}", spec.name, sql_type));
            indexes.push(format!(
                "CREATE INDEX IF NOT EXISTS \"{table}_{field}_idx\" ON \"{table}\" (\"{field}\");",
                table = schema.table,
                field = spec.name,
            ));
        }

        let ddl = format!(
            "CREATE TABLE IF NOT EXISTS \"{}\" ({});\n{}",
            schema.table,
            columns.join(", "),
            indexes.join("\n"),
        );
        self.conn().execute_batch(&ddl)?;

        tracing::debug!("✅ Schema registered: {}", schema.table);
        Ok(())
    }

    fn insert<R: Record>(&self, key: &str, record: &R) -> Result<(), StoreError> {
        let schema = R::SCHEMA;
        let mut columns = vec![KEY_COLUMN, BODY_COLUMN];
        let mut values = vec![
            SqlValue::Text(key.to_string()),
            SqlValue::Text(encode_body(record)?),
        ];
        for spec in schema.indexed() {
            columns.push(spec.name);
            values.push(indexed_column(record, spec.name));
        }

        let sql = format!(
            "INSERT INTO \"{}\" ({}) VALUES ({})",
            schema.table,
            quoted(&columns),
            placeholders(values.len()),
        );

        match self.conn().execute(&sql, params_from_iter(values)) {
            Ok(_) => Ok(()),
            Err(rusqlite::Error::SqliteFailure(e, _)) if e.code == ErrorCode::ConstraintViolation => {
                Err(StoreError::KeyExists(key.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn update<R: Record>(&self, key: &str, record: &R) -> Result<(), StoreError> {
        let schema = R::SCHEMA;
        let mut assignments = vec![format!("\"{BODY_COLUMN}\" = ?1")];
        let mut values = vec![SqlValue::Text(encode_body(record)?)];
        for spec in schema.indexed() {
            values.push(indexed_column(record, spec.name));
            assignments.push(format!("\"{}\" = ?{}", spec.name, values.len()));
        }
        values.push(SqlValue::Text(key.to_string()));

        let sql = format!(
            "UPDATE \"{}\" SET {} WHERE \"{KEY_COLUMN}\" = ?{}",
            schema.table,
            assignments.join(", "),
            values.len(),
        );

        let changed = self.conn().execute(&sql, params_from_iter(values))?;
        if changed == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    fn delete<R: Record>(&self, key: &str) -> Result<bool, StoreError> {
        let sql = format!(
            "DELETE FROM \"{}\" WHERE \"{KEY_COLUMN}\" = ?1",
            R::SCHEMA.table
        );
        let changed = self.conn().execute(&sql, [key])?;
        Ok(changed > 0)
    }

    fn find_one<R: Record>(&self, filter: &Filter) -> Result<R, StoreError> {
        let schema = R::SCHEMA;
        let mut params = Vec::new();
        let predicate = compile(&schema, filter, &mut params)?;
        let sql = format!(
            "SELECT \"{BODY_COLUMN}\" FROM \"{}\" WHERE {} LIMIT 1",
            schema.table, predicate
        );

        let body: Option<String> = self
            .conn()
            .query_row(&sql, params_from_iter(params), |row| row.get(0))
            .optional()?;

        match body {
            Some(body) => decode_body(&body),
            None => Err(StoreError::NotFound),
        }
    }

    fn delete_matching<R: Record>(&self, filter: &Filter) -> Result<usize, StoreError> {
        let schema = R::SCHEMA;
        let mut params = Vec::new();
        let predicate = compile(&schema, filter, &mut params)?;
        let sql = format!("DELETE FROM \"{}\" WHERE {}", schema.table, predicate);

        Ok(self.conn().execute(&sql, params_from_iter(params))?)
    }

    fn count<R: Record>(&self, filter: Option<&Filter>) -> Result<usize, StoreError> {
        let schema = R::SCHEMA;
        let mut params = Vec::new();
        let mut sql = format!("SELECT COUNT(*) FROM \"{}\"", schema.table);
        if let Some(filter) = filter {
            sql.push_str(" WHERE ");
            sql.push_str(&compile(&schema, filter, &mut params)?);
        }

        let count: i64 = self
            .conn()
            .query_row(&sql, params_from_iter(params), |row| row.get(0))?;
        Ok(count as usize)
    }
}

/// Translates `filter` into an SQL predicate, appending bound values to `params`.
fn compile(
    schema: &Schema,
    filter: &Filter,
    params: &mut Vec<SqlValue>,
) -> Result<String, StoreError> {
    match filter {
        Filter::Eq(field, value) => compare(schema, *field, "=", value, params),
        Filter::Gt(field, value) => compare(schema, *field, ">", value, params),
        Filter::Le(field, value) => compare(schema, *field, "<=", value, params),
        Filter::And(left, right) => {
            let left = compile(schema, left, params)?;
            let right = compile(schema, right, params)?;
            Ok(format!("({left}) AND ({right})"))
        }
    }
}

fn compare(
    schema: &Schema,
    field: &'static str,
    op: &str,
    value: &FieldValue,
    params: &mut Vec<SqlValue>,
) -> Result<String, StoreError> {
    let column = match schema.field(field) {
        Some(spec) if spec.role == FieldRole::PrimaryKey => KEY_COLUMN,
        Some(spec) => spec.name,
        None => {
            return Err(StoreError::UnknownField {
                table: schema.table,
                field,
            });
        }
    };
    params.push(to_sql(value));
    Ok(format!("\"{column}\" {op} ?{}", params.len()))
}

fn to_sql(value: &FieldValue) -> SqlValue {
    match value {
        FieldValue::Text(text) => SqlValue::Text(text.clone()),
        FieldValue::Time(time) => SqlValue::Integer(time.timestamp_micros()),
    }
}

fn indexed_column<R: Record>(record: &R, field: &str) -> SqlValue {
    record
        .indexed_value(field)
        .map(|value| to_sql(&value))
        .unwrap_or(SqlValue::Null)
}

fn encode_body<R: Record>(record: &R) -> Result<String, StoreError> {
    sonic_rs::to_string(record).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn decode_body<R: Record>(body: &str) -> Result<R, StoreError> {
    sonic_rs::from_str(body).map_err(|e| StoreError::Serialization(e.to_string()))
}

fn quoted(columns: &[&str]) -> String {
    columns
        .iter()
        .map(|c| format!("\"{c}\""))
        .collect::<Vec<_>>()
        .join(", ")
}

fn placeholders(n: usize) -> String {
    (1..=n)
        .map(|i| format!("?{i}"))
        .collect::<Vec<_>>()
        .join(", ")
}
