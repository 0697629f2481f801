//! Cookie synchronisation between the browser session and SSR requests

use chrono::Utc;
use std::sync::Arc;

use ember_protocol::{header, HeaderMap, HeaderValue, Request};

use crate::cookie::{parse_set_cookie, CookieRecord};
use crate::error::SessionError;
use crate::store::CookieStore;
use crate::Result;

/// Keeps the embedded browser's live jar and the persistent store
/// eventually consistent around each SSR round-trip.
///
/// The live jar is the single source of truth for outgoing requests; the
/// persistent store only mirrors it so the session survives a restart.
#[derive(Clone)]
pub struct CookieBridge {
    jar: Arc<dyn CookieStore>,
    persistent: Arc<dyn CookieStore>,
}

impl CookieBridge {
    pub fn new(jar: Arc<dyn CookieStore>, persistent: Arc<dyn CookieStore>) -> Self {
        Self { jar, persistent }
    }

    /// Seed the live jar from the persistent store. Run once at startup.
    pub async fn restore(&self) -> Result<usize> {
        let bridge = self.clone();
        let restored = blocking(move || {
            let now = Utc::now();
            let mut restored = 0;

            for cookie in bridge.persistent.all()? {
                if cookie.is_expired(now) {
                    bridge.persistent.remove(&cookie.name)?;
                    continue;
                }
                bridge.jar.set(cookie)?;
                restored += 1;
            }
            Ok(restored)
        })
        .await?;

        tracing::info!(count = restored, "Restored persisted cookies");
        Ok(restored)
    }

    /// Replace the request's `Cookie` header with the live jar contents.
    ///
    /// Returns the number of cookies attached. An empty jar removes any
    /// `Cookie` header the request carried. Store access runs on the
    /// blocking pool.
    pub async fn attach_outbound(&self, request: &mut Request) -> Result<usize> {
        let bridge = self.clone();
        let cookies = blocking(move || {
            let live = bridge.live_cookies()?;
            if !live.is_empty() {
                bridge.persistent.replace_all(&live)?;
            }
            Ok(live)
        })
        .await?;

        let pairs: Vec<String> = cookies
            .iter()
            .filter_map(|cookie| {
                let pair = cookie.pair();
                if HeaderValue::from_str(&pair).is_ok() {
                    Some(pair)
                } else {
                    tracing::warn!(name = %cookie.name, "Skipping cookie not valid in a header");
                    None
                }
            })
            .collect();

        if pairs.is_empty() {
            request.headers.remove(header::COOKIE);
            return Ok(0);
        }

        let value = HeaderValue::from_str(&pairs.join("; "))
            .map_err(|e| SessionError::InvalidHeader(e.to_string()))?;
        request.headers.insert(header::COOKIE, value);

        tracing::debug!(count = pairs.len(), url = %request.url, "Attached session cookies");
        Ok(pairs.len())
    }

    /// Apply the `Set-Cookie` headers of an SSR response to the live jar and
    /// mirror the resulting jar into the persistent store.
    pub async fn persist_inbound(&self, headers: &HeaderMap) -> Result<usize> {
        let now = Utc::now();
        let mut parsed = Vec::new();

        for value in headers.get_all(header::SET_COOKIE) {
            let Ok(raw) = value.to_str() else {
                tracing::warn!("Ignoring non-UTF-8 Set-Cookie header");
                continue;
            };
            let Some(cookie) = parse_set_cookie(raw, now) else {
                tracing::warn!(header = raw, "Ignoring malformed Set-Cookie header");
                continue;
            };
            parsed.push(cookie);
        }

        let applied = parsed.len();
        let bridge = self.clone();
        let total = blocking(move || {
            for cookie in parsed {
                if cookie.is_expired(now) {
                    bridge.jar.remove(&cookie.name)?;
                } else {
                    bridge.jar.set(cookie)?;
                }
            }

            let snapshot = bridge.live_cookies()?;
            bridge.persistent.replace_all(&snapshot)?;
            Ok(snapshot.len())
        })
        .await?;

        if applied > 0 {
            tracing::debug!(applied, total, "Persisted cookies from response");
        }
        Ok(applied)
    }

    /// Unexpired jar contents; expired entries are evicted on the way.
    fn live_cookies(&self) -> Result<Vec<CookieRecord>> {
        let now = Utc::now();
        let mut live = Vec::new();

        for cookie in self.jar.all()? {
            if cookie.is_expired(now) {
                self.jar.remove(&cookie.name)?;
            } else {
                live.push(cookie);
            }
        }

        Ok(live)
    }
}

/// Run store work off the async workers; stores may do disk I/O.
async fn blocking<T, F>(task: F) -> Result<T>
where
    F: FnOnce() -> Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(task)
        .await
        .map_err(|e| SessionError::Task(e.to_string()))?
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::SqliteCookieStore;
    use crate::store::MemoryCookieStore;
    use ember_storage::Database;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn bridge() -> (CookieBridge, Arc<MemoryCookieStore>, Arc<SqliteCookieStore>) {
        let jar = Arc::new(MemoryCookieStore::new());
        let persistent = Arc::new(SqliteCookieStore::new(Database::open_in_memory().unwrap()));
        let bridge = CookieBridge::new(jar.clone(), persistent.clone());
        (bridge, jar, persistent)
    }

    fn set_cookie_headers(values: &[&'static str]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for value in values {
            headers.append(header::SET_COOKIE, HeaderValue::from_static(value));
        }
        headers
    }

    /// Persistent store whose writes hold the calling thread.
    struct SlowStore(Duration);

    impl CookieStore for SlowStore {
        fn all(&self) -> Result<Vec<CookieRecord>> {
            Ok(Vec::new())
        }

        fn set(&self, _cookie: CookieRecord) -> Result<()> {
            Ok(())
        }

        fn remove(&self, _name: &str) -> Result<()> {
            Ok(())
        }

        fn replace_all(&self, _cookies: &[CookieRecord]) -> Result<()> {
            std::thread::sleep(self.0);
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_persisted_cookies_visible_to_next_request() {
        let (bridge, _jar, _persistent) = bridge();

        let applied = bridge
            .persist_inbound(&set_cookie_headers(&[
                "__session=abc; Path=/; HttpOnly",
                "theme=dark",
            ]))
            .await
            .unwrap();
        assert_eq!(applied, 2);

        let mut request = Request::get("http://localhost:5173/").unwrap();
        let attached = bridge.attach_outbound(&mut request).await.unwrap();
        assert_eq!(attached, 2);
        assert_eq!(
            request.header_str(&header::COOKIE),
            Some("__session=abc; theme=dark")
        );
    }

    #[tokio::test]
    async fn test_outbound_overwrites_existing_header() {
        let (bridge, jar, _persistent) = bridge();
        jar.set(CookieRecord::new("a", "1")).unwrap();

        let mut request = Request::get("http://localhost:5173/")
            .unwrap()
            .with_header(header::COOKIE, HeaderValue::from_static("stale=yes"));
        bridge.attach_outbound(&mut request).await.unwrap();

        assert_eq!(request.header_str(&header::COOKIE), Some("a=1"));
    }

    #[tokio::test]
    async fn test_empty_jar_strips_cookie_header() {
        let (bridge, _jar, _persistent) = bridge();

        let mut request = Request::get("http://localhost:5173/")
            .unwrap()
            .with_header(header::COOKIE, HeaderValue::from_static("stale=yes"));
        assert_eq!(bridge.attach_outbound(&mut request).await.unwrap(), 0);
        assert!(request.headers.get(header::COOKIE).is_none());
    }

    #[tokio::test]
    async fn test_unencodable_cookie_is_skipped() {
        let (bridge, jar, _persistent) = bridge();
        jar.set(CookieRecord::new("broken", "line\nbreak")).unwrap();
        jar.set(CookieRecord::new("ok", "1")).unwrap();

        let mut request = Request::get("http://localhost:5173/").unwrap();
        assert_eq!(bridge.attach_outbound(&mut request).await.unwrap(), 1);
        assert_eq!(request.header_str(&header::COOKIE), Some("ok=1"));

        // A jar holding only the bad cookie sends no header at all
        jar.remove("ok").unwrap();
        let mut request = Request::get("http://localhost:5173/")
            .unwrap()
            .with_header(header::COOKIE, HeaderValue::from_static("stale=yes"));
        assert_eq!(bridge.attach_outbound(&mut request).await.unwrap(), 0);
        assert!(request.headers.get(header::COOKIE).is_none());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_slow_store_does_not_stall_runtime() {
        let jar = Arc::new(MemoryCookieStore::new());
        jar.set(CookieRecord::new("a", "1")).unwrap();
        let bridge = CookieBridge::new(jar, Arc::new(SlowStore(Duration::from_millis(300))));

        let ticks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&ticks);
        let ticker = tokio::spawn(async move {
            loop {
                tokio::time::sleep(Duration::from_millis(10)).await;
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        let mut request = Request::get("http://localhost:5173/").unwrap();
        assert_eq!(bridge.attach_outbound(&mut request).await.unwrap(), 1);
        bridge
            .persist_inbound(&set_cookie_headers(&["b=2"]))
            .await
            .unwrap();
        ticker.abort();

        // Two 300ms writes; the only runtime thread kept ticking throughout
        assert!(ticks.load(Ordering::SeqCst) >= 10);
    }

    #[tokio::test]
    async fn test_deletion_cookie_removes_from_both_stores() {
        let (bridge, jar, persistent) = bridge();
        bridge
            .persist_inbound(&set_cookie_headers(&["token=xyz"]))
            .await
            .unwrap();
        assert_eq!(persistent.all().unwrap().len(), 1);

        bridge
            .persist_inbound(&set_cookie_headers(&["token=; Max-Age=0"]))
            .await
            .unwrap();
        assert!(jar.is_empty());
        assert!(persistent.all().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_restore_after_restart() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("ember.db");

        {
            let jar = Arc::new(MemoryCookieStore::new());
            let persistent = Arc::new(SqliteCookieStore::new(Database::open(&path).unwrap()));
            let bridge = CookieBridge::new(jar, persistent);
            bridge
                .persist_inbound(&set_cookie_headers(&["__session=abc; Max-Age=3600"]))
                .await
                .unwrap();
        }

        let jar = Arc::new(MemoryCookieStore::new());
        let persistent = Arc::new(SqliteCookieStore::new(Database::open(&path).unwrap()));
        let bridge = CookieBridge::new(jar.clone(), persistent);

        assert_eq!(bridge.restore().await.unwrap(), 1);
        assert_eq!(jar.all().unwrap()[0].value, "abc");
    }

    #[tokio::test]
    async fn test_malformed_set_cookie_ignored() {
        let (bridge, jar, _persistent) = bridge();
        let applied = bridge
            .persist_inbound(&set_cookie_headers(&["garbage", "ok=1"]))
            .await
            .unwrap();
        assert_eq!(applied, 1);
        assert_eq!(jar.len(), 1);
    }
}
