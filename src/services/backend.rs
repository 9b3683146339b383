use chrono::{Duration, Utc};
use parking_lot::RwLock;
use tower_cookies::Cookies;

use crate::crypto::codec::{KeyPair, KeyRing};
use crate::crypto::session_id::generate_session_id;
use crate::error::{Result, SessionError};
use crate::models::handle::{Session, Values};
use crate::models::options::Options;
use crate::models::session::SessionRecord;
use crate::repositories::session::SessionRepository;
use crate::services::session_store::SessionStore;
use crate::storage::{KvStore, SqliteStore};

/// Backend-wide settings shared by every request.
pub struct StoreConfig {
    /// The options given to new sessions.
    pub options: Options,
    /// Codecs used for both the cookie and the stored data, newest first.
    pub codecs: KeyRing,
}

/// Session store keeping encrypted session values in an embedded key-value
/// store, referenced by an authenticated session-ID cookie.
///
/// The configuration sits behind a lock, so `max_age`, `max_length` and
/// `set_options` may run while requests are in flight. Each operation reads
/// one consistent snapshot of it.
///
/// ⚠️ `new_session` and `save` are synchronous and hit the store directly.
/// With [`SqliteStore`] every call serializes on one connection, so an async
/// caller blocks its worker thread for the duration of the query. That is
/// fine for short single-row statements on a local file; callers expecting
/// slow storage should move the call onto `tokio::task::spawn_blocking`,
/// as the sweeper does.
pub struct SessionBackend<S: KvStore = SqliteStore> {
    repo: SessionRepository<S>,
    config: RwLock<StoreConfig>,
}

impl<S: KvStore> SessionBackend<S> {
    /// Creates a backend with default options (path `/`, max-age 30 days).
    ///
    /// # Arguments
    ///
    /// * `repo` - The session repository.
    /// * `key_pairs` - Key pairs, newest first. The first one encodes; all of
    ///   them are tried when decoding.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `SessionBackend`.
    pub fn new(repo: SessionRepository<S>, key_pairs: &[KeyPair]) -> Result<Self> {
        let options = Options::default();
        let mut codecs = KeyRing::from_pairs(key_pairs)?;
        codecs.set_max_age(options.max_age);

        tracing::info!("✅ Session backend initialized with {} key pair(s)", codecs.len());

        Ok(Self {
            repo,
            config: RwLock::new(StoreConfig { options, codecs }),
        })
    }

    /// Creates a backend whose cookies are `Secure` and `HttpOnly`.
    pub fn hardened(repo: SessionRepository<S>, key_pairs: &[KeyPair]) -> Result<Self> {
        let backend = Self::new(repo, key_pairs)?;
        {
            let mut config = backend.config.write();
            config.options.secure = true;
            config.options.http_only = true;
        }
        Ok(backend)
    }

    pub fn repository(&self) -> &SessionRepository<S> {
        &self.repo
    }

    /// Sets the default max-age and propagates it to every codec.
    ///
    /// Codecs check the age at decode time, so the new value also applies
    /// to cookies issued before the call. Individual sessions can still be
    /// deleted by saving them with `options.max_age = -1`.
    pub fn max_age(&self, age: i64) {
        let mut config = self.config.write();
        config.options.max_age = age;
        config.codecs.set_max_age(age);
        tracing::debug!("Session max-age set to {}s", age);
    }

    /// Restricts the encoded length of new sessions.
    ///
    /// 0 removes the limit; the default is 4096. Oversized sessions fail to
    /// save with `PayloadTooLarge`.
    pub fn max_length(&self, length: usize) {
        self.config.write().codecs.set_max_length(length);
        tracing::debug!("Session max-length set to {} bytes", length);
    }

    /// Deletes every expired record once.
    pub fn cleanup(&self) -> Result<usize> {
        self.repo.delete_expired(Utc::now())
    }

    /// Resolves the live record referenced by the cookie `name`, if any.
    ///
    /// A missing, forged or expired cookie resolves to `None`.
    fn record_from_cookie(
        &self,
        codecs: &KeyRing,
        cookies: &Cookies,
        name: &str,
    ) -> Result<Option<SessionRecord>> {
        let Some(cookie) = cookies.get(name) else {
            return Ok(None);
        };

        let session_id: String = match codecs.decode(name, cookie.value()) {
            Ok(id) => id,
            Err(e) => {
                tracing::debug!("Ignoring session cookie {}: {}", name, e);
                return Ok(None);
            }
        };

        self.repo.find_live(&session_id)
    }
}

impl<S: KvStore> SessionStore for SessionBackend<S> {
    fn new_session(&self, cookies: &Cookies, name: &str) -> Result<Session> {
        let config = self.config.read();
        let mut session = Session::new(name, config.options.clone());

        let Some(record) = self.record_from_cookie(&config.codecs, cookies, name)? else {
            return Ok(session);
        };

        match config.codecs.decode::<Values>(name, &record.data) {
            Ok(values) => {
                session.values = values;
                session.id = record.id;
                session.is_new = false;
                tracing::debug!("🔑 Session loaded: {}", name);
            }
            Err(e) => {
                tracing::debug!("Ignoring undecodable data for session {}: {}", name, e);
            }
        }

        Ok(session)
    }

    fn save(&self, cookies: &Cookies, session: &mut Session) -> Result<()> {
        let config = self.config.read();
        let name = session.name().to_string();
        let existing = self.record_from_cookie(&config.codecs, cookies, &name)?;

        if session.options.max_age < 0 {
            if let Some(record) = existing {
                self.repo.delete(&record.id)?;
                tracing::debug!("🗑️ Session deleted: {}", name);
            }
            cookies.add(session.options.cookie(&name, String::new()));
            session.id.clear();
            return Ok(());
        }

        let data = config.codecs.encode(&name, &session.values)?;
        let lifetime = if session.options.max_age > 0 {
            session.options.max_age
        } else {
            config.options.max_age
        };
        let now = Utc::now();
        let expires_at = Duration::try_seconds(lifetime)
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or(SessionError::InvalidMaxAge(lifetime))?;

        let (record, is_insert) = match existing {
            Some(mut record) => {
                record.data = data;
                record.updated_at = now;
                record.expires_at = expires_at;
                (record, false)
            }
            None => {
                let record = SessionRecord {
                    id: generate_session_id(),
                    data,
                    created_at: now,
                    updated_at: now,
                    expires_at,
                };
                (record, true)
            }
        };

        let token = config.codecs.encode(&name, &record.id)?;

        if is_insert {
            self.repo.insert(&record)?;
        } else {
            self.repo.update(&record)?;
        }

        cookies.add(session.options.cookie(&name, token));
        session.id = record.id;
        session.is_new = false;

        Ok(())
    }

    fn options(&self) -> Options {
        self.config.read().options.clone()
    }

    /// Replaces the default options; the new max-age also reaches the codecs.
    fn set_options(&self, options: Options) {
        let mut config = self.config.write();
        config.codecs.set_max_age(options.max_age);
        config.options = options;
    }
}
