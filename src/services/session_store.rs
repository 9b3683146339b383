use tower_cookies::Cookies;

use crate::error::Result;
use crate::models::handle::Session;
use crate::models::options::Options;
use crate::services::registry::{Registry, SharedSession};

/// The generic session-handler contract.
///
/// A store resolves a request's cookies to a [`Session`], persists sessions
/// and writes the matching `Set-Cookie`. `Cookies` doubles as the request
/// jar and the response writer.
pub trait SessionStore: Send + Sync {
    /// Returns the session `name`, loading it at most once per request.
    fn get(&self, registry: &Registry, name: &str) -> Result<SharedSession> {
        registry.get(self, name)
    }

    /// Loads the session `name` without registering it.
    fn new_session(&self, cookies: &Cookies, name: &str) -> Result<Session>;

    /// Persists `session` and sets its cookie.
    fn save(&self, cookies: &Cookies, session: &mut Session) -> Result<()>;

    /// The options given to new sessions.
    fn options(&self) -> Options;

    fn set_options(&self, options: Options);
}
