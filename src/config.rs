use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use zeroize::Zeroize;

use crate::crypto::codec::KeyPair;
use crate::crypto::securecookie::DEFAULT_MAX_LENGTH;
use crate::models::options::DEFAULT_MAX_AGE;

/// The application's configuration.
#[derive(Clone)]
pub struct Config {
    /// The path of the embedded session database.
    pub database_path: PathBuf,
    /// Cookie key pairs, newest first.
    pub key_pairs: Vec<KeyPair>,
    /// The default session max-age in seconds.
    pub max_age: i64,
    /// The maximum encoded session length in bytes (0 = unlimited).
    pub max_length: usize,
    /// How often expired sessions are swept; `None` disables the sweeper.
    pub cleanup_interval: Option<Duration>,
    /// Whether cookies are issued `Secure` and `HttpOnly`.
    pub hardened_cookies: bool,
    /// The address the demo server listens on.
    pub bind_addr: SocketAddr,
}

impl Config {
    /// Creates a new `Config` from environment variables.
    ///
    /// # Returns
    ///
    /// A `Result` containing the `Config`.
    pub fn from_env() -> Result<Self> {
        let mut keys = env::var("SESSION_KEYS").context(
            "SESSION_KEYS must be set (generate with: openssl rand -hex 32, optionally followed by :<hex block key>)",
        )?;
        let key_pairs = parse_key_pairs(&keys);
        keys.zeroize();
        let key_pairs = key_pairs?;

        let cleanup_secs: u64 = env::var("SESSION_CLEANUP_INTERVAL_SECS")
            .unwrap_or_else(|_| "3600".to_string())
            .parse()
            .context("Invalid SESSION_CLEANUP_INTERVAL_SECS")?;

        Ok(Self {
            database_path: env::var("SESSION_DB_PATH")
                .unwrap_or_else(|_| "sessions.db".to_string())
                .into(),
            key_pairs,
            max_age: env::var("SESSION_MAX_AGE_SECS")
                .unwrap_or_else(|_| DEFAULT_MAX_AGE.to_string())
                .parse()
                .context("Invalid SESSION_MAX_AGE_SECS")?,
            max_length: env::var("SESSION_MAX_LENGTH")
                .unwrap_or_else(|_| DEFAULT_MAX_LENGTH.to_string())
                .parse()
                .context("Invalid SESSION_MAX_LENGTH")?,
            cleanup_interval: (cleanup_secs > 0).then(|| Duration::from_secs(cleanup_secs)),
            hardened_cookies: env::var("APP_ENV")
                .unwrap_or_else(|_| "development".to_string())
                == "production",
            bind_addr: env::var("BIND_ADDR")
                .unwrap_or_else(|_| "127.0.0.1:3000".to_string())
                .parse()
                .context("Invalid BIND_ADDR")?,
        })
    }
}

/// Parses `hashhex[:blockhex]` entries separated by commas, newest first.
pub fn parse_key_pairs(raw: &str) -> Result<Vec<KeyPair>> {
    let mut pairs = Vec::new();

    for (i, entry) in raw.split(',').map(str::trim).enumerate() {
        if entry.is_empty() {
            continue;
        }
        let (hash_hex, block_hex) = match entry.split_once(':') {
            Some((hash, block)) => (hash, Some(block)),
            None => (entry, None),
        };

        let hash_key = hex::decode(hash_hex)
            .with_context(|| format!("Key pair {} has an invalid hash key", i + 1))?;
        if hash_key.is_empty() {
            anyhow::bail!("Key pair {} has an empty hash key", i + 1);
        }
        let mut pair = KeyPair::new(hash_key);

        if let Some(block_hex) = block_hex {
            let block_key = hex::decode(block_hex)
                .with_context(|| format!("Key pair {} has an invalid block key", i + 1))?;
            if ![16, 24, 32].contains(&block_key.len()) {
                anyhow::bail!(
                    "Key pair {} block key must be 16, 24 or 32 bytes, got {}",
                    i + 1,
                    block_key.len()
                );
            }
            pair = pair.with_block_key(block_key);
        }

        pairs.push(pair);
    }

    if pairs.is_empty() {
        anyhow::bail!("SESSION_KEYS must contain at least one key pair");
    }
    Ok(pairs)
}
