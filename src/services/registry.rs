use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::{StatusCode, request::Parts};
use parking_lot::Mutex;
use tower_cookies::Cookies;

use crate::error::Result;
use crate::models::handle::Session;
use crate::services::session_store::SessionStore;

/// A session shared by everything that handles one request.
pub type SharedSession = Arc<Mutex<Session>>;

/// Request-scoped cache of sessions by name.
///
/// Extracting a `Registry` twice during the same request yields the same
/// instance, so middleware and handlers observe the same session objects.
#[derive(Clone)]
pub struct Registry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    cookies: Cookies,
    sessions: Mutex<HashMap<String, SharedSession>>,
}

impl Registry {
    pub fn new(cookies: Cookies) -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                cookies,
                sessions: Mutex::new(HashMap::new()),
            }),
        }
    }

    /// The request cookie jar, which also collects outgoing cookies.
    pub fn cookies(&self) -> &Cookies {
        &self.inner.cookies
    }

    /// Returns the registered session `name`, loading it through `store` on
    /// first use.
    pub fn get<B: SessionStore + ?Sized>(&self, store: &B, name: &str) -> Result<SharedSession> {
        if let Some(session) = self.inner.sessions.lock().get(name) {
            return Ok(session.clone());
        }

        let session = Arc::new(Mutex::new(store.new_session(&self.inner.cookies, name)?));
        Ok(self
            .inner
            .sessions
            .lock()
            .entry(name.to_string())
            .or_insert(session)
            .clone())
    }

    /// Saves every session loaded through this registry.
    pub fn save_all<B: SessionStore + ?Sized>(&self, store: &B) -> Result<()> {
        let sessions: Vec<SharedSession> = self.inner.sessions.lock().values().cloned().collect();
        for session in sessions {
            store.save(&self.inner.cookies, &mut session.lock())?;
        }
        Ok(())
    }
}

impl<S> FromRequestParts<S> for Registry
where
    S: Send + Sync,
{
    type Rejection = (StatusCode, &'static str);

    async fn from_request_parts(parts: &mut Parts, state: &S) -> std::result::Result<Self, Self::Rejection> {
        if let Some(registry) = parts.extensions.get::<Registry>() {
            return Ok(registry.clone());
        }

        let cookies = Cookies::from_request_parts(parts, state).await?;
        let registry = Registry::new(cookies);
        parts.extensions.insert(registry.clone());
        Ok(registry)
    }
}
