//! Server-side session persistence on an embedded key-value store.
//!
//! Session values are encoded by a rotating key ring and stored in a
//! [`storage::KvStore`]; the browser only ever holds an authenticated cookie
//! carrying the session ID.

pub mod config;
pub mod db;
pub mod error;
pub mod routes;
pub mod state;
pub mod storage;

pub mod crypto {
    pub mod aes;
    pub mod codec;
    pub mod securecookie;
    pub mod session_id;
}

pub mod models {
    pub mod handle;
    pub mod options;
    pub mod session;
}

pub mod repositories {
    pub mod session;
}

pub mod services {
    pub mod backend;
    pub mod registry;
    pub mod session_store;
    pub mod sweeper;
}

pub mod handlers {
    pub mod counter;
}

pub use crypto::codec::KeyPair;
pub use error::{Result, SessionError};
pub use models::handle::Session;
pub use models::options::Options;
pub use services::backend::SessionBackend;
pub use services::registry::Registry;
pub use services::session_store::SessionStore;
pub use services::sweeper::Sweeper;
