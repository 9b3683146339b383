use axum::{
    extract::State,
    http::header,
    response::IntoResponse,
};

use crate::{
    error::{Result, SessionError},
    services::{registry::Registry, session_store::SessionStore},
    state::AppState,
};

/// The name of the demo session (and its cookie).
pub const SESSION_NAME: &str = "session";

/// Increments the visit counter stored in the session.
pub async fn count(State(state): State<AppState>, registry: Registry) -> Result<String> {
    let shared = state.sessions.get(&registry, SESSION_NAME)?;
    let mut session = shared.lock();

    let count = session.get::<i64>("count").unwrap_or(0) + 1;
    session.insert("count", count)?;
    state.sessions.save(registry.cookies(), &mut session)?;

    tracing::debug!("🔢 Session count is now {}", count);
    Ok(count.to_string())
}

/// Deletes the session and expires its cookie.
pub async fn forget(State(state): State<AppState>, registry: Registry) -> Result<String> {
    let shared = state.sessions.get(&registry, SESSION_NAME)?;
    let mut session = shared.lock();

    session.options.max_age = -1;
    state.sessions.save(registry.cookies(), &mut session)?;

    tracing::info!("👋 Session forgotten");
    Ok(String::new())
}

/// Queues the request body as a flash message.
pub async fn push_flash(
    State(state): State<AppState>,
    registry: Registry,
    message: String,
) -> Result<String> {
    let shared = state.sessions.get(&registry, SESSION_NAME)?;
    let mut session = shared.lock();

    session.add_flash(message)?;
    state.sessions.save(registry.cookies(), &mut session)?;

    Ok(String::new())
}

/// Returns and clears the queued flash messages as a JSON array.
pub async fn take_flashes(
    State(state): State<AppState>,
    registry: Registry,
) -> Result<impl IntoResponse> {
    let shared = state.sessions.get(&registry, SESSION_NAME)?;
    let mut session = shared.lock();

    let flashes = session.flashes();
    state.sessions.save(registry.cookies(), &mut session)?;

    let body =
        sonic_rs::to_string(&flashes).map_err(|e| SessionError::EncodingFailed(e.to_string()))?;
    Ok(([(header::CONTENT_TYPE, "application/json")], body))
}
