//! Ember Session
//!
//! Two cookie jars have to agree: the embedded browser's live session and
//! the cookies sent to (and set by) server-side rendering. Everything that
//! reads or writes either jar goes through [`CookieBridge`].

mod bridge;
mod cookie;
mod error;
mod sqlite;
mod store;

pub use bridge::CookieBridge;
pub use cookie::{parse_set_cookie, CookieRecord};
pub use error::SessionError;
pub use sqlite::SqliteCookieStore;
pub use store::{CookieStore, MemoryCookieStore};

pub type Result<T> = std::result::Result<T, SessionError>;
