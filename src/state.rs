use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;
use crate::repositories::session::SessionRepository;
use crate::services::backend::SessionBackend;

/// The application's state.
#[derive(Clone)]
pub struct AppState {
    /// The session backend.
    pub sessions: Arc<SessionBackend>,
}

impl AppState {
    /// Creates a new `AppState`.
    ///
    /// # Arguments
    ///
    /// * `config` - The application's configuration.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `AppState`.
    pub fn new(config: &Config) -> Result<Self> {
        let store = crate::db::open_store(&config.database_path)?;
        let repo = SessionRepository::new(store)?;

        let backend = if config.hardened_cookies {
            SessionBackend::hardened(repo, &config.key_pairs)?
        } else {
            SessionBackend::new(repo, &config.key_pairs)?
        };
        backend.max_age(config.max_age);
        backend.max_length(config.max_length);
        tracing::info!(
            "✅ Session backend configured (max-age {}s, max-length {})",
            config.max_age,
            config.max_length
        );

        Ok(Self::with_backend(Arc::new(backend)))
    }

    /// Wraps an already configured backend.
    pub fn with_backend(sessions: Arc<SessionBackend>) -> Self {
        Self { sessions }
    }
}
