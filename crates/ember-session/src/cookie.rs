//! Cookie record and `Set-Cookie` parsing

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CookieRecord {
    pub name: String,
    pub value: String,
    pub domain: Option<String>,
    pub path: String,
    /// `None` for session cookies
    pub expires: Option<DateTime<Utc>>,
    pub secure: bool,
    pub http_only: bool,
}

impl CookieRecord {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            domain: None,
            path: "/".to_string(),
            expires: None,
            secure: false,
            http_only: false,
        }
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires.is_some_and(|at| at <= now)
    }

    /// `name=value`, as sent in a `Cookie` request header
    pub fn pair(&self) -> String {
        format!("{}={}", self.name, self.value)
    }
}

/// Parse one `Set-Cookie` header value.
///
/// Returns `None` when there is no usable `name=value` pair. `Max-Age` wins
/// over `Expires`; a non-positive `Max-Age` yields an already-expired record,
/// which callers treat as a deletion.
pub fn parse_set_cookie(header: &str, now: DateTime<Utc>) -> Option<CookieRecord> {
    let mut parts = header.split(';');
    let (name, value) = parts.next()?.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    let mut cookie = CookieRecord::new(name, value.trim().trim_matches('"'));
    let mut max_age: Option<i64> = None;

    for attr in parts {
        let (key, val) = match attr.split_once('=') {
            Some((k, v)) => (k.trim(), v.trim()),
            None => (attr.trim(), ""),
        };

        match key.to_ascii_lowercase().as_str() {
            "domain" if !val.is_empty() => {
                cookie.domain = Some(val.trim_start_matches('.').to_ascii_lowercase());
            }
            "path" if val.starts_with('/') => cookie.path = val.to_string(),
            "expires" => {
                if let Ok(at) = DateTime::parse_from_rfc2822(val) {
                    cookie.expires = Some(at.with_timezone(&Utc));
                }
            }
            "max-age" => max_age = val.parse().ok(),
            "secure" => cookie.secure = true,
            "httponly" => cookie.http_only = true,
            _ => {}
        }
    }

    if let Some(seconds) = max_age {
        cookie.expires = if seconds <= 0 {
            Some(DateTime::<Utc>::UNIX_EPOCH)
        } else {
            // Out-of-range lifetimes degrade to a session cookie
            Duration::try_seconds(seconds).and_then(|ttl| now.checked_add_signed(ttl))
        };
    }

    Some(cookie)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_full_cookie() {
        let cookie = parse_set_cookie(
            "__session=abc123; Path=/app; Domain=.Example.com; HttpOnly; Secure; Max-Age=60",
            now(),
        )
        .unwrap();

        assert_eq!(cookie.name, "__session");
        assert_eq!(cookie.value, "abc123");
        assert_eq!(cookie.path, "/app");
        assert_eq!(cookie.domain.as_deref(), Some("example.com"));
        assert!(cookie.http_only);
        assert!(cookie.secure);
        assert_eq!(cookie.expires, Some(now() + Duration::seconds(60)));
    }

    #[test]
    fn test_parse_expires_date() {
        let cookie =
            parse_set_cookie("theme=dark; Expires=Wed, 21 Oct 2015 07:28:00 GMT", now()).unwrap();
        assert!(cookie.is_expired(now()));
        assert_eq!(cookie.path, "/");
    }

    #[test]
    fn test_zero_max_age_is_deletion() {
        let cookie = parse_set_cookie("token=; Max-Age=0", now()).unwrap();
        assert_eq!(cookie.value, "");
        assert!(cookie.is_expired(now()));
    }

    #[test]
    fn test_rejects_nameless() {
        assert!(parse_set_cookie("=value", now()).is_none());
        assert!(parse_set_cookie("novalue", now()).is_none());
    }

    #[test]
    fn test_value_may_contain_equals() {
        let cookie = parse_set_cookie("data=a=b==; Path=/", now()).unwrap();
        assert_eq!(cookie.value, "a=b==");
        assert_eq!(cookie.pair(), "data=a=b==");
    }
}
