use tower_cookies::Cookie;
use tower_cookies::cookie::SameSite;
use tower_cookies::cookie::time::{Duration, OffsetDateTime};

/// The default session max-age in seconds (30 days).
pub const DEFAULT_MAX_AGE: i64 = 60 * 60 * 24 * 30;
/// The default cookie path.
pub const DEFAULT_PATH: &str = "/";

/// Per-session cookie options.
///
/// `max_age` drives both the cookie and the backing record:
/// * `> 0` - persistent cookie, record expires after that many seconds.
/// * `0` - browser-session cookie (no `Max-Age`).
/// * `< 0` - delete the session and expire the cookie immediately.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Options {
    pub path: String,
    pub domain: Option<String>,
    pub max_age: i64,
    pub secure: bool,
    pub http_only: bool,
    pub same_site: Option<SameSite>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            path: DEFAULT_PATH.to_string(),
            domain: None,
            max_age: DEFAULT_MAX_AGE,
            secure: false,
            http_only: false,
            same_site: None,
        }
    }
}

impl Options {
    /// Builds the `Set-Cookie` for `name` carrying `value` under these options.
    pub fn cookie(&self, name: &str, value: String) -> Cookie<'static> {
        let mut cookie = Cookie::new(name.to_string(), value);
        cookie.set_path(self.path.clone());

        if let Some(domain) = &self.domain {
            cookie.set_domain(domain.clone());
        }

        if self.max_age > 0 {
            let max_age = Duration::seconds(self.max_age);
            cookie.set_max_age(max_age);
            // Past the calendar range browsers rely on Max-Age alone.
            if let Some(expires) = OffsetDateTime::now_utc().checked_add(max_age) {
                cookie.set_expires(expires);
            }
        } else if self.max_age < 0 {
            cookie.set_max_age(Duration::ZERO);
            cookie.set_expires(OffsetDateTime::UNIX_EPOCH);
        }

        if self.secure {
            cookie.set_secure(true);
        }
        if self.http_only {
            cookie.set_http_only(true);
        }
        if let Some(same_site) = self.same_site {
            cookie.set_same_site(same_site);
        }

        cookie
    }
}
