//! Persistent cookie store backed by the shell database

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};

use ember_storage::Database;

use crate::cookie::CookieRecord;
use crate::store::CookieStore;
use crate::Result;

#[derive(Clone)]
pub struct SqliteCookieStore {
    db: Database,
}

impl SqliteCookieStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

fn insert_cookie(conn: &Connection, cookie: &CookieRecord) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT OR REPLACE INTO cookies
            (name, value, domain, path, expires_at, secure, http_only, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            cookie.name,
            cookie.value,
            cookie.domain,
            cookie.path,
            cookie.expires.map(|at| at.to_rfc3339()),
            cookie.secure as i32,
            cookie.http_only as i32,
            Utc::now().to_rfc3339(),
        ],
    )?;
    Ok(())
}

impl CookieStore for SqliteCookieStore {
    fn all(&self) -> Result<Vec<CookieRecord>> {
        let cookies = self.db.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT name, value, domain, path, expires_at, secure, http_only
                 FROM cookies ORDER BY name",
            )?;

            let cookies: Vec<CookieRecord> = stmt
                .query_map([], |row| {
                    let expires_str: Option<String> = row.get(4)?;
                    let expires = expires_str.and_then(|s| {
                        DateTime::parse_from_rfc3339(&s)
                            .map(|dt| dt.with_timezone(&Utc))
                            .ok()
                    });

                    Ok(CookieRecord {
                        name: row.get(0)?,
                        value: row.get(1)?,
                        domain: row.get(2)?,
                        path: row.get(3)?,
                        expires,
                        secure: row.get::<_, i32>(5)? != 0,
                        http_only: row.get::<_, i32>(6)? != 0,
                    })
                })?
                .filter_map(|r| r.ok())
                .collect();

            Ok(cookies)
        })?;

        Ok(cookies)
    }

    fn set(&self, cookie: CookieRecord) -> Result<()> {
        self.db.with_connection(|conn| {
            insert_cookie(conn, &cookie)?;
            Ok(())
        })?;
        Ok(())
    }

    fn remove(&self, name: &str) -> Result<()> {
        self.db.with_connection(|conn| {
            conn.execute("DELETE FROM cookies WHERE name = ?1", [name])?;
            Ok(())
        })?;
        Ok(())
    }

    fn replace_all(&self, cookies: &[CookieRecord]) -> Result<()> {
        self.db.transaction(|conn| {
            conn.execute("DELETE FROM cookies", [])?;
            for cookie in cookies {
                insert_cookie(conn, cookie)?;
            }
            Ok(())
        })?;

        tracing::debug!(count = cookies.len(), "Persisted cookie jar");
        Ok(())
    }
}
