//! Redis-backed key store.
//!
//! Layout under namespace `ns`:
//! - `ns:key:{id}` hash with fields `id`, `issued`, `canceled` (`"0"`/`"1"`)
//! - `ns:unissued` set of ids not yet issued
//!
//! Every state transition is a Lua script so the check and the write happen
//! in one server-side step.

use super::{ensure_insertable, KeyStore};
use crate::error::StoreError;
use crate::key::Key;
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use tracing::info;

// KEYS[1] record hash, KEYS[2] unissued set, ARGV[1] id
const INSERT_SCRIPT: &str = r"
if redis.call('EXISTS', KEYS[1]) == 1 then
    return 0
end
redis.call('HSET', KEYS[1], 'id', ARGV[1], 'issued', '0', 'canceled', '0')
redis.call('SADD', KEYS[2], ARGV[1])
return 1
";

// KEYS[1] unissued set, ARGV[1] record key prefix.
// The record key is derived from the popped id inside the script, so it is
// not declared in KEYS. Requires a single (non-cluster) server and an ACL
// that grants access to the whole namespace.
const ALLOCATE_SCRIPT: &str = r"
local id = redis.call('SPOP', KEYS[1])
if not id then
    return false
end
redis.call('HSET', ARGV[1] .. id, 'issued', '1')
return id
";

// KEYS[1] record hash
const CANCEL_SCRIPT: &str = r"
local state = redis.call('HMGET', KEYS[1], 'issued', 'canceled')
if not state[1] then
    return -1
end
if state[1] ~= '1' then
    return -2
end
if state[2] == '1' then
    return -3
end
redis.call('HSET', KEYS[1], 'canceled', '1')
return 1
";

/// Key store persisted in Redis.
pub struct RedisKeyStore {
    conn: ConnectionManager,
    namespace: String,
    insert_script: Script,
    allocate_script: Script,
    cancel_script: Script,
}

impl RedisKeyStore {
    /// Connect to Redis and prepare the transition scripts.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if the URL is invalid or the server
    /// cannot be reached.
    pub async fn connect(redis_url: &str, namespace: impl Into<String>) -> Result<Self, StoreError> {
        let client = redis::Client::open(redis_url)?;
        let conn = ConnectionManager::new(client).await?;
        let namespace = namespace.into();

        info!(namespace = %namespace, "Established redis connection");

        Ok(Self {
            conn,
            namespace,
            insert_script: Script::new(INSERT_SCRIPT),
            allocate_script: Script::new(ALLOCATE_SCRIPT),
            cancel_script: Script::new(CANCEL_SCRIPT),
        })
    }

    /// Namespace prefixed to every entry.
    #[must_use]
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    fn record_prefix(&self) -> String {
        format!("{}:key:", self.namespace)
    }

    fn record_key(&self, id: &str) -> String {
        format!("{}:key:{}", self.namespace, id)
    }

    fn unissued_key(&self) -> String {
        format!("{}:unissued", self.namespace)
    }
}

/// Decode a stored `"0"`/`"1"` flag.
fn parse_flag(field: &str, value: Option<&str>) -> Result<bool, StoreError> {
    match value {
        Some("1") => Ok(true),
        Some("0") => Ok(false),
        other => Err(StoreError::backend(format!(
            "corrupt {field} flag: {other:?}"
        ))),
    }
}

#[async_trait]
impl KeyStore for RedisKeyStore {
    async fn insert(&self, key: &Key) -> Result<(), StoreError> {
        ensure_insertable(key)?;

        let mut conn = self.conn.clone();
        let mut invocation = self.insert_script.prepare_invoke();
        invocation
            .key(self.record_key(&key.id))
            .key(self.unissued_key())
            .arg(&key.id);
        let inserted: i64 = invocation.invoke_async(&mut conn).await?;

        if inserted == 0 {
            return Err(StoreError::DuplicateId(key.id.clone()));
        }
        Ok(())
    }

    async fn allocate_one(&self) -> Result<Key, StoreError> {
        let mut conn = self.conn.clone();
        let mut invocation = self.allocate_script.prepare_invoke();
        invocation.key(self.unissued_key()).arg(self.record_prefix());
        let claimed: Option<String> = invocation.invoke_async(&mut conn).await?;

        let id = claimed.ok_or(StoreError::NotFound)?;
        Ok(Key {
            id,
            issued: true,
            canceled: false,
        })
    }

    async fn cancel(&self, id: &str) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let mut invocation = self.cancel_script.prepare_invoke();
        invocation.key(self.record_key(id));
        let outcome: i64 = invocation.invoke_async(&mut conn).await?;

        match outcome {
            1 => Ok(()),
            -1 => Err(StoreError::NotFound),
            -2 => Err(StoreError::NotIssued),
            -3 => Err(StoreError::AlreadyCanceled),
            other => Err(StoreError::backend(format!(
                "unexpected cancel script result {other}"
            ))),
        }
    }

    async fn get(&self, id: &str) -> Result<Key, StoreError> {
        let mut conn = self.conn.clone();
        let fields: Vec<Option<String>> = redis::cmd("HMGET")
            .arg(self.record_key(id))
            .arg("issued")
            .arg("canceled")
            .query_async(&mut conn)
            .await?;

        let issued = fields.first().and_then(Option::as_deref);
        let canceled = fields.get(1).and_then(Option::as_deref);
        if issued.is_none() {
            return Err(StoreError::NotFound);
        }

        Ok(Key {
            id: id.to_string(),
            issued: parse_flag("issued", issued)?,
            canceled: parse_flag("canceled", canceled)?,
        })
    }

    async fn list_unissued(&self) -> Result<Vec<Key>, StoreError> {
        let mut conn = self.conn.clone();
        let mut ids: Vec<String> = conn.smembers(self.unissued_key()).await?;
        if ids.is_empty() {
            return Err(StoreError::NotFound);
        }

        ids.sort_unstable();
        Ok(ids.into_iter().map(Key::new).collect())
    }

    async fn ping(&self) -> Result<(), StoreError> {
        let mut conn = self.conn.clone();
        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "redis"
    }
}
