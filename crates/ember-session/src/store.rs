//! Cookie store abstraction and the in-memory browser jar

use parking_lot::RwLock;
use std::collections::BTreeMap;

use crate::cookie::CookieRecord;
use crate::Result;

/// Key/value cookie persistence, keyed by cookie name.
///
/// Implementations must tolerate concurrent readers and writers; concurrent
/// writes to the same name resolve last-writer-wins.
pub trait CookieStore: Send + Sync {
    fn all(&self) -> Result<Vec<CookieRecord>>;

    fn set(&self, cookie: CookieRecord) -> Result<()>;

    fn remove(&self, name: &str) -> Result<()>;

    /// Make the store hold exactly `cookies`.
    fn replace_all(&self, cookies: &[CookieRecord]) -> Result<()> {
        for existing in self.all()? {
            if !cookies.iter().any(|c| c.name == existing.name) {
                self.remove(&existing.name)?;
            }
        }
        for cookie in cookies {
            self.set(cookie.clone())?;
        }
        Ok(())
    }
}

/// The embedded browser session's live jar.
#[derive(Debug, Default)]
pub struct MemoryCookieStore {
    cookies: RwLock<BTreeMap<String, CookieRecord>>,
}

impl MemoryCookieStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.cookies.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.read().is_empty()
    }
}

impl CookieStore for MemoryCookieStore {
    fn all(&self) -> Result<Vec<CookieRecord>> {
        Ok(self.cookies.read().values().cloned().collect())
    }

    fn set(&self, cookie: CookieRecord) -> Result<()> {
        self.cookies.write().insert(cookie.name.clone(), cookie);
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<()> {
        self.cookies.write().remove(name);
        Ok(())
    }

    fn replace_all(&self, cookies: &[CookieRecord]) -> Result<()> {
        let replacement = cookies
            .iter()
            .map(|c| (c.name.clone(), c.clone()))
            .collect();
        *self.cookies.write() = replacement;
        Ok(())
    }
}
