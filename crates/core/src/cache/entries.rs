//! Entry CRUD for SQLite-backed stores.
//!
//! Provides reading, writing and deleting cached response snapshots within
//! one named store.

use async_trait::async_trait;
use http::header::{HeaderMap, HeaderName, HeaderValue};
use http::{Method, StatusCode};
use tokio_rusqlite::{Connection, params, rusqlite};
use url::Url;

use super::{Cache, validate_put};
use crate::Error;
use crate::net::{Request, Response, ResponseType};

const UPSERT_ENTRY: &str = "INSERT INTO cache_entries (
        store_name, key_hash, method, url, status_code, response_type, headers_json, body, stored_at
    ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
    ON CONFLICT(store_name, key_hash) DO UPDATE SET
        method = excluded.method,
        url = excluded.url,
        status_code = excluded.status_code,
        response_type = excluded.response_type,
        headers_json = excluded.headers_json,
        body = excluded.body,
        stored_at = excluded.stored_at";

/// A store inside a [`super::CacheDb`].
#[derive(Clone, Debug)]
pub struct SqliteCache {
    conn: Connection,
    name: String,
}

impl SqliteCache {
    pub(crate) fn new(conn: Connection, name: String) -> Self {
        Self { conn, name }
    }
}

/// A snapshot flattened into column values.
struct EncodedEntry {
    key_hash: String,
    method: String,
    url: String,
    status_code: i64,
    response_type: String,
    headers_json: String,
    body: Vec<u8>,
}

impl EncodedEntry {
    fn encode(request: &Request, response: Response) -> Result<Self, Error> {
        let headers: Vec<(String, String)> = response
            .headers()
            .iter()
            .map(|(name, value)| (name.as_str().to_string(), String::from_utf8_lossy(value.as_bytes()).into_owned()))
            .collect();

        Ok(Self {
            key_hash: request.cache_key(),
            method: request.method().as_str().to_string(),
            url: request.url().to_string(),
            status_code: i64::from(response.status().as_u16()),
            response_type: response.response_type().as_str().to_string(),
            headers_json: serde_json::to_string(&headers)?,
            body: response.into_body().to_vec(),
        })
    }

    fn insert(&self, conn: &rusqlite::Connection, store_name: &str, stored_at: &str) -> Result<(), Error> {
        conn.execute(
            UPSERT_ENTRY,
            params![
                store_name,
                &self.key_hash,
                &self.method,
                &self.url,
                self.status_code,
                &self.response_type,
                &self.headers_json,
                &self.body,
                stored_at,
            ],
        )?;
        Ok(())
    }
}

/// Raw columns of a stored snapshot.
struct StoredRow {
    status_code: i64,
    response_type: String,
    headers_json: String,
    body: Vec<u8>,
}

impl StoredRow {
    fn decode(self) -> Result<Response, Error> {
        let status = u16::try_from(self.status_code)
            .ok()
            .and_then(|code| StatusCode::from_u16(code).ok())
            .ok_or_else(|| Error::CorruptEntry(format!("status {}", self.status_code)))?;
        let response_type: ResponseType = self.response_type.parse().map_err(Error::CorruptEntry)?;

        let pairs: Vec<(String, String)> = serde_json::from_str(&self.headers_json)?;
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            let name = HeaderName::from_bytes(name.as_bytes()).map_err(|e| Error::CorruptEntry(e.to_string()))?;
            let value = HeaderValue::from_str(&value).map_err(|e| Error::CorruptEntry(e.to_string()))?;
            headers.append(name, value);
        }

        Ok(Response::new(status, self.body).with_type(response_type).with_headers(headers))
    }
}

/// Select a single entry's columns within a store.
fn select_entry(
    conn: &rusqlite::Connection, store_name: &str, key_hash: &str,
) -> Result<Option<StoredRow>, Error> {
    let mut stmt = conn.prepare(
        "SELECT status_code, response_type, headers_json, body
         FROM cache_entries WHERE store_name = ?1 AND key_hash = ?2",
    )?;

    let result = stmt.query_row(params![store_name, key_hash], |row| {
        Ok(StoredRow { status_code: row.get(0)?, response_type: row.get(1)?, headers_json: row.get(2)?, body: row.get(3)? })
    });

    match result {
        Ok(row) => Ok(Some(row)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e.into()),
    }
}

#[async_trait]
impl Cache for SqliteCache {
    fn name(&self) -> &str {
        &self.name
    }

    async fn match_request(&self, request: &Request) -> Result<Option<Response>, Error> {
        if request.method() != Method::GET {
            return Ok(None);
        }
        let name = self.name.clone();
        let key_hash = request.cache_key();
        let row = self
            .conn
            .call(move |conn| -> Result<Option<StoredRow>, Error> { select_entry(conn, &name, &key_hash) })
            .await
            .map_err(Error::from)?;
        row.map(StoredRow::decode).transpose()
    }

    async fn put(&self, request: &Request, response: Response) -> Result<(), Error> {
        validate_put(request, &response)?;
        let entry = EncodedEntry::encode(request, response)?;
        let name = self.name.clone();
        let stored_at = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> { entry.insert(conn, &name, &stored_at) })
            .await
            .map_err(Error::from)
    }

    async fn put_all(&self, batch: Vec<(Request, Response)>) -> Result<(), Error> {
        for (request, response) in &batch {
            validate_put(request, response)?;
        }
        let encoded = batch
            .into_iter()
            .map(|(request, response)| EncodedEntry::encode(&request, response))
            .collect::<Result<Vec<_>, Error>>()?;
        let name = self.name.clone();
        let stored_at = chrono::Utc::now().to_rfc3339();

        self.conn
            .call(move |conn| -> Result<(), Error> {
                let tx = conn.transaction()?;
                for entry in &encoded {
                    entry.insert(&tx, &name, &stored_at)?;
                }
                tx.commit()?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn delete(&self, request: &Request) -> Result<bool, Error> {
        let name = self.name.clone();
        let key_hash = request.cache_key();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute(
                    "DELETE FROM cache_entries WHERE store_name = ?1 AND key_hash = ?2",
                    params![name, key_hash],
                )?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    async fn keys(&self) -> Result<Vec<Url>, Error> {
        let name = self.name.clone();
        let urls = self
            .conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT url FROM cache_entries WHERE store_name = ?1 ORDER BY url")?;
                let rows = stmt.query_map(params![name], |row| row.get::<_, String>(0))?;
                let mut urls = Vec::new();
                for url in rows {
                    urls.push(url?);
                }
                Ok(urls)
            })
            .await
            .map_err(Error::from)?;

        urls.iter().map(|u| Url::parse(u).map_err(|e| Error::CorruptEntry(e.to_string()))).collect()
    }
}
