use std::collections::HashMap;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use arbiter_core::{AttributeKey, DecisionResult, IndividualDecisionRequest};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use serde::Serialize;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use super::{reject_unknown, ttl, DecisionCache, DecisionCacheFactory};
use crate::error::{CacheError, CacheResult, PdpError, PdpResult};

pub const SQLITE_CACHE_ID: &str = "sqlite";

/// On-disk decision cache. Requests are indexed by the SHA-256 digest of
/// their normalized JSON; results are stored as JSON.
#[derive(Debug)]
pub struct SqliteDecisionCache {
    conn: Mutex<Connection>,
    ttl_secs: Option<i64>,
}

#[derive(Serialize)]
struct NormalizedRequest<'a> {
    attributes: Vec<(&'a AttributeKey, Vec<String>)>,
    return_policy_id_list: bool,
}

/// Hex SHA-256 of the request with every value in its normalized lexical
/// form. Attributes are kept sorted, so requests that compare equal always
/// produce the same key.
pub fn request_key(request: &IndividualDecisionRequest) -> CacheResult<String> {
    let normalized = NormalizedRequest {
        attributes: request
            .iter()
            .map(|(key, values)| (key, values.iter().map(|v| v.normalized()).collect()))
            .collect(),
        return_policy_id_list: request.return_policy_id_list(),
    };
    let bytes = serde_json::to_vec(&normalized)?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}

impl SqliteDecisionCache {
    /// Open or create the cache database at `path` (`:memory:` for a
    /// private in-memory database).
    pub fn open(path: &str, ttl: Option<Duration>) -> CacheResult<Self> {
        let conn = Connection::open(path)
            .map_err(|e| CacheError::Storage(format!("failed to open database: {}", e)))?;

        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS decisions (
                request_key TEXT PRIMARY KEY NOT NULL,
                result TEXT NOT NULL,
                inserted_at INTEGER NOT NULL
            );",
        )
        .map_err(|e| CacheError::Storage(format!("failed to create tables: {}", e)))?;

        let ttl_secs = ttl
            .map(|d| i64::try_from(d.as_secs()))
            .transpose()
            .map_err(|e| CacheError::Storage(format!("invalid TTL: {}", e)))?;
        Ok(Self {
            conn: Mutex::new(conn),
            ttl_secs,
        })
    }

    pub fn in_memory() -> CacheResult<Self> {
        Self::open(":memory:", None)
    }

    fn lock_conn(&self) -> CacheResult<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| CacheError::Storage(format!("lock poisoned: {}", e)))
    }

    /// Number of stored rows, expired ones included.
    pub fn count(&self) -> CacheResult<usize> {
        let conn = self.lock_conn()?;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM decisions", [], |row| row.get(0))?;
        Ok(n as usize)
    }

    fn get_all_at<'a>(
        &self,
        requests: &'a [IndividualDecisionRequest],
        now: i64,
    ) -> CacheResult<HashMap<&'a IndividualDecisionRequest, Option<DecisionResult>>> {
        let conn = self.lock_conn()?;
        let mut select =
            conn.prepare_cached("SELECT result, inserted_at FROM decisions WHERE request_key = ?1")?;
        let mut found = HashMap::with_capacity(requests.len());
        let mut undecodable = Vec::new();
        for request in requests {
            if found.contains_key(request) {
                continue;
            }
            let key = request_key(request)?;
            let row: Option<(String, i64)> = select
                .query_row(params![key], |row| Ok((row.get(0)?, row.get(1)?)))
                .optional()?;
            let hit = match row {
                Some((_, inserted_at)) if self.is_expired(inserted_at, now) => None,
                Some((json, _)) => match serde_json::from_str::<DecisionResult>(&json) {
                    Ok(result) => Some(result),
                    Err(e) => {
                        warn!(key = %key, error = %e, "dropping undecodable cached decision");
                        undecodable.push(key);
                        None
                    }
                },
                None => None,
            };
            found.insert(request, hit);
        }
        drop(select);

        for key in undecodable {
            let deleted = conn.execute("DELETE FROM decisions WHERE request_key = ?1", params![key]);
            if let Err(e) = deleted {
                warn!(key = %key, error = %e, "failed to delete undecodable cached decision");
            }
        }
        Ok(found)
    }

    fn put_all_at(
        &self,
        entries: &[(IndividualDecisionRequest, DecisionResult)],
        now: i64,
    ) -> CacheResult<()> {
        let mut conn = self.lock_conn()?;
        let tx = conn.transaction()?;
        {
            let mut insert = tx.prepare_cached(
                "INSERT OR REPLACE INTO decisions (request_key, result, inserted_at) VALUES (?1, ?2, ?3)",
            )?;
            for (request, result) in entries {
                let json = serde_json::to_string(result)?;
                insert.execute(params![request_key(request)?, json, now])?;
            }
        }
        tx.commit()?;
        Ok(())
    }

    fn is_expired(&self, inserted_at: i64, now: i64) -> bool {
        match self.ttl_secs {
            Some(ttl) => now - inserted_at > ttl,
            None => false,
        }
    }
}

impl DecisionCache for SqliteDecisionCache {
    fn get_all<'a>(
        &self,
        requests: &'a [IndividualDecisionRequest],
    ) -> CacheResult<HashMap<&'a IndividualDecisionRequest, Option<DecisionResult>>> {
        self.get_all_at(requests, Utc::now().timestamp())
    }

    fn put_all(&self, entries: &[(IndividualDecisionRequest, DecisionResult)]) -> CacheResult<()> {
        self.put_all_at(entries, Utc::now().timestamp())
    }

    fn close(self: Box<Self>) -> CacheResult<()> {
        let SqliteDecisionCache { conn, ttl_secs } = *self;
        let conn = conn
            .into_inner()
            .map_err(|e| CacheError::Storage(format!("lock poisoned: {}", e)))?;
        if let Some(ttl) = ttl_secs {
            let cutoff = Utc::now().timestamp() - ttl;
            let purged = conn.execute(
                "DELETE FROM decisions WHERE inserted_at < ?1",
                params![cutoff],
            )?;
            debug!(purged, "purged expired decisions");
        }
        conn.close()
            .map_err(|(_, e)| CacheError::Storage(format!("failed to close database: {}", e)))
    }
}

/// Parameters: `path` (required), `ttl_secs` (optional). Building a cache
/// creates missing parent directories of `path`.
#[derive(Debug, Default)]
pub struct SqliteDecisionCacheFactory;

impl SqliteDecisionCacheFactory {
    fn parse_params(params: &toml::Table) -> PdpResult<(&str, Option<Duration>)> {
        reject_unknown(SQLITE_CACHE_ID, params, &["path", "ttl_secs"])?;
        let path = params
            .get("path")
            .and_then(toml::Value::as_str)
            .filter(|p| !p.is_empty())
            .ok_or_else(|| PdpError::Config("sqlite cache: 'path' string is required".into()))?;
        Ok((path, ttl(SQLITE_CACHE_ID, params)?))
    }
}

impl DecisionCacheFactory for SqliteDecisionCacheFactory {
    fn id(&self) -> &str {
        SQLITE_CACHE_ID
    }

    fn validate(&self, params: &toml::Table) -> PdpResult<()> {
        Self::parse_params(params).map(|_| ())
    }

    fn new_cache(&self, params: &toml::Table) -> PdpResult<Box<dyn DecisionCache>> {
        let (path, ttl) = Self::parse_params(params)?;
        if path != ":memory:" {
            if let Some(parent) = Path::new(path).parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
        }
        Ok(Box::new(SqliteDecisionCache::open(path, ttl)?))
    }
}
