//! Store-level operations on the SQLite backend.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_rusqlite::params;

use super::connection::CacheDb;
use super::entries::SqliteCache;
use super::{Cache, CacheStorage};
use crate::Error;
use crate::net::{Request, Response};

#[async_trait]
impl CacheStorage for CacheDb {
    async fn open(&self, name: &str) -> Result<Arc<dyn Cache>, Error> {
        let store_name = name.to_string();
        let created = self
            .conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute(
                    "INSERT OR IGNORE INTO cache_stores (name, created_seq, created_at)
                     VALUES (?1, (SELECT COALESCE(MAX(created_seq), 0) + 1 FROM cache_stores), ?2)",
                    params![store_name, chrono::Utc::now().to_rfc3339()],
                )?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)?;

        if created {
            tracing::debug!(cache = name, "created cache store");
        }

        Ok(Arc::new(SqliteCache::new(self.conn.clone(), name.to_string())))
    }

    async fn open_existing(&self, name: &str) -> Result<Option<Arc<dyn Cache>>, Error> {
        if !self.has(name).await? {
            return Ok(None);
        }
        Ok(Some(Arc::new(SqliteCache::new(self.conn.clone(), name.to_string()))))
    }

    async fn has(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists: bool = conn.query_row(
                    "SELECT EXISTS(SELECT 1 FROM cache_stores WHERE name = ?1)",
                    params![name],
                    |row| row.get(0),
                )?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    async fn delete(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM cache_stores WHERE name = ?1", params![name])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM cache_stores ORDER BY created_seq ASC")?;
                let rows = stmt.query_map([], |row| row.get::<_, String>(0))?;
                let mut names = Vec::new();
                for name in rows {
                    names.push(name?);
                }
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    async fn match_request(&self, cache_name: &str, request: &Request) -> Result<Option<Response>, Error> {
        if !self.has(cache_name).await? {
            return Ok(None);
        }
        SqliteCache::new(self.conn.clone(), cache_name.to_string()).match_request(request).await
    }
}
