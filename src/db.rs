use std::path::Path;
use std::sync::Arc;

use crate::error::Result;
use crate::storage::SqliteStore;

/// Opens the embedded session database.
///
/// # Arguments
///
/// * `path` - The database file; created if missing. `:memory:` opens a
///   private in-memory database.
///
/// # Returns
///
/// A `Result` containing the shared store handle.
pub fn open_store(path: &Path) -> Result<Arc<SqliteStore>> {
    let store = if path == Path::new(":memory:") {
        SqliteStore::open_in_memory()?
    } else {
        SqliteStore::open(path)?
    };

    tracing::info!("✅ Session database opened: {}", path.display());
    Ok(Arc::new(store))
}
