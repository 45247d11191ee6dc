//! Key/value + ordered-set store shared by the resource cache and the change detector.
//!
//! Plain key writes are last-writer-wins; no operation here takes a lock that spans calls.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

use crate::error::FplError;

#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, FplError>;

    async fn set(&self, key: &str, value: &str) -> Result<(), FplError>;

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), FplError>;

    /// Writes only when the key is absent. Returns whether the write happened.
    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, FplError>;

    async fn del(&self, key: &str) -> Result<(), FplError>;

    /// Deletes `key` only while it still holds `expected`. Returns whether it was deleted.
    async fn del_if_eq(&self, key: &str, expected: &str) -> Result<bool, FplError>;

    /// Adds `member` to the ordered set, or moves it to `score` if already present.
    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<(), FplError>;

    /// Members with `min <= score <= max`, lowest score first.
    async fn zrange_by_score(&self, key: &str, min: f64, max: f64)
        -> Result<Vec<String>, FplError>;

    /// Removes members with `min <= score <= max` and returns how many went.
    async fn zrem_range_by_score(&self, key: &str, min: f64, max: f64)
        -> Result<usize, FplError>;
}

#[derive(Debug, Clone)]
struct StoredValue {
    value: String,
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }
}

#[derive(Debug, Default)]
struct StoreData {
    values: HashMap<String, StoredValue>,
    // key -> members sorted by (score, member)
    sorted: HashMap<String, Vec<(f64, String)>>,
}

/// In-process store. Expiry uses tokio's clock so paused-time tests can advance it.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    inner: Arc<RwLock<StoreData>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, FplError> {
        let now = Instant::now();
        {
            let inner = self.inner.read().await;
            match inner.values.get(key) {
                Some(stored) if stored.is_live(now) => return Ok(Some(stored.value.clone())),
                Some(_) => {}
                None => return Ok(None),
            }
        }
        // Lazy eviction; re-check in case a writer refilled it meanwhile.
        let mut inner = self.inner.write().await;
        if inner
            .values
            .get(key)
            .is_some_and(|stored| !stored.is_live(Instant::now()))
        {
            inner.values.remove(key);
            debug!(key, "evicted expired key");
        }
        Ok(inner
            .values
            .get(key)
            .map(|stored| stored.value.clone()))
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), FplError> {
        let mut inner = self.inner.write().await;
        inner.values.insert(
            key.to_owned(),
            StoredValue {
                value: value.to_owned(),
                expires_at: None,
            },
        );
        Ok(())
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), FplError> {
        let mut inner = self.inner.write().await;
        inner.values.insert(
            key.to_owned(),
            StoredValue {
                value: value.to_owned(),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, FplError> {
        let now = Instant::now();
        let mut inner = self.inner.write().await;
        if inner.values.get(key).is_some_and(|stored| stored.is_live(now)) {
            return Ok(false);
        }
        inner.values.insert(
            key.to_owned(),
            StoredValue {
                value: value.to_owned(),
                expires_at: Some(now + ttl),
            },
        );
        Ok(true)
    }

    async fn del(&self, key: &str) -> Result<(), FplError> {
        let mut inner = self.inner.write().await;
        inner.values.remove(key);
        inner.sorted.remove(key);
        Ok(())
    }

    async fn del_if_eq(&self, key: &str, expected: &str) -> Result<bool, FplError> {
        let now = Instant::now();
        let mut inner = self.inner.write().await;
        let matches = inner
            .values
            .get(key)
            .is_some_and(|stored| stored.is_live(now) && stored.value == expected);
        if matches {
            inner.values.remove(key);
        }
        Ok(matches)
    }

    async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<(), FplError> {
        let mut inner = self.inner.write().await;
        let set = inner.sorted.entry(key.to_owned()).or_default();
        set.retain(|(_, existing)| existing != member);
        let at = set.partition_point(|(s, m)| (*s, m.as_str()) < (score, member));
        set.insert(at, (score, member.to_owned()));
        Ok(())
    }

    async fn zrange_by_score(
        &self,
        key: &str,
        min: f64,
        max: f64,
    ) -> Result<Vec<String>, FplError> {
        let inner = self.inner.read().await;
        Ok(inner
            .sorted
            .get(key)
            .map(|set| {
                set.iter()
                    .filter(|(score, _)| *score >= min && *score <= max)
                    .map(|(_, member)| member.clone())
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn zrem_range_by_score(
        &self,
        key: &str,
        min: f64,
        max: f64,
    ) -> Result<usize, FplError> {
        let mut inner = self.inner.write().await;
        let Some(set) = inner.sorted.get_mut(key) else {
            return Ok(0);
        };
        let before = set.len();
        set.retain(|(score, _)| *score < min || *score > max);
        Ok(before - set.len())
    }
}

#[cfg(feature = "redis")]
pub use self::redis_store::RedisStore;

#[cfg(feature = "redis")]
mod redis_store {
    use std::time::Duration;

    use async_trait::async_trait;
    use redis::aio::MultiplexedConnection;
    use redis::{AsyncCommands, Client};
    use tracing::info;

    use super::CacheStore;
    use crate::error::FplError;

    /// Redis-backed store. Every key is namespaced as `{prefix}:{key}` so several
    /// deployments can share one server.
    #[derive(Clone)]
    pub struct RedisStore {
        conn: MultiplexedConnection,
        prefix: String,
    }

    impl RedisStore {
        pub async fn connect(url: &str, prefix: &str) -> Result<Self, FplError> {
            let client = Client::open(url)?;
            let conn = client.get_multiplexed_async_connection().await?;
            info!(url, prefix, "connected to redis");
            Ok(Self {
                conn,
                prefix: prefix.to_owned(),
            })
        }

        fn key(&self, suffix: &str) -> String {
            format!("{}:{}", self.prefix, suffix)
        }
    }

    const DEL_IF_EQ: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
end
return 0
"#;

    fn ttl_secs(ttl: Duration) -> u64 {
        ttl.as_secs().max(1)
    }

    #[async_trait]
    impl CacheStore for RedisStore {
        async fn get(&self, key: &str) -> Result<Option<String>, FplError> {
            let mut conn = self.conn.clone();
            Ok(conn.get(self.key(key)).await?)
        }

        async fn set(&self, key: &str, value: &str) -> Result<(), FplError> {
            let mut conn = self.conn.clone();
            conn.set::<_, _, ()>(self.key(key), value).await?;
            Ok(())
        }

        async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<(), FplError> {
            let mut conn = self.conn.clone();
            conn.set_ex::<_, _, ()>(self.key(key), value, ttl_secs(ttl))
                .await?;
            Ok(())
        }

        async fn set_nx_ex(
            &self,
            key: &str,
            value: &str,
            ttl: Duration,
        ) -> Result<bool, FplError> {
            let mut conn = self.conn.clone();
            let reply: Option<String> = redis::cmd("SET")
                .arg(self.key(key))
                .arg(value)
                .arg("NX")
                .arg("EX")
                .arg(ttl_secs(ttl))
                .query_async(&mut conn)
                .await?;
            Ok(reply.is_some())
        }

        async fn del(&self, key: &str) -> Result<(), FplError> {
            let mut conn = self.conn.clone();
            conn.del::<_, ()>(self.key(key)).await?;
            Ok(())
        }

        async fn del_if_eq(&self, key: &str, expected: &str) -> Result<bool, FplError> {
            let mut conn = self.conn.clone();
            let removed: i64 = redis::Script::new(DEL_IF_EQ)
                .key(self.key(key))
                .arg(expected)
                .invoke_async(&mut conn)
                .await?;
            Ok(removed > 0)
        }

        async fn zadd(&self, key: &str, member: &str, score: f64) -> Result<(), FplError> {
            let mut conn = self.conn.clone();
            conn.zadd::<_, _, _, ()>(self.key(key), member, score)
                .await?;
            Ok(())
        }

        async fn zrange_by_score(
            &self,
            key: &str,
            min: f64,
            max: f64,
        ) -> Result<Vec<String>, FplError> {
            let mut conn = self.conn.clone();
            Ok(conn.zrangebyscore(self.key(key), min, max).await?)
        }

        async fn zrem_range_by_score(
            &self,
            key: &str,
            min: f64,
            max: f64,
        ) -> Result<usize, FplError> {
            let mut conn = self.conn.clone();
            Ok(conn.zrembyscore(self.key(key), min, max).await?)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn set_ex_expires_after_ttl() {
        let store = MemoryStore::new();
        store
            .set_ex("k", "v", Duration::from_secs(60))
            .await
            .unwrap();
        tokio::time::advance(Duration::from_secs(59)).await;
        assert_eq!(store.get("k").await.unwrap().as_deref(), Some("v"));
        tokio::time::advance(Duration::from_secs(2)).await;
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn set_nx_ex_only_acquires_free_key() {
        let store = MemoryStore::new();
        let ttl = Duration::from_secs(30);
        assert!(store.set_nx_ex("lease", "a", ttl).await.unwrap());
        assert!(!store.set_nx_ex("lease", "b", ttl).await.unwrap());
        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(store.set_nx_ex("lease", "b", ttl).await.unwrap());
        assert_eq!(store.get("lease").await.unwrap().as_deref(), Some("b"));
    }

    #[tokio::test(start_paused = true)]
    async fn del_if_eq_leaves_other_owners_alone() {
        let store = MemoryStore::new();
        let ttl = Duration::from_secs(30);
        store.set_nx_ex("lease", "a", ttl).await.unwrap();
        assert!(!store.del_if_eq("lease", "b").await.unwrap());
        assert_eq!(store.get("lease").await.unwrap().as_deref(), Some("a"));

        tokio::time::advance(Duration::from_secs(31)).await;
        // an expired value no longer counts as held by its old owner
        assert!(!store.del_if_eq("lease", "a").await.unwrap());
        assert!(store.set_nx_ex("lease", "b", ttl).await.unwrap());
        assert!(!store.del_if_eq("lease", "a").await.unwrap());
        assert!(store.del_if_eq("lease", "b").await.unwrap());
        assert_eq!(store.get("lease").await.unwrap(), None);
    }

    #[tokio::test]
    async fn sorted_set_orders_by_score_and_prunes_ranges() {
        let store = MemoryStore::new();
        store.zadd("log", "c", 30.0).await.unwrap();
        store.zadd("log", "a", 10.0).await.unwrap();
        store.zadd("log", "b", 20.0).await.unwrap();
        // re-adding moves the member instead of duplicating it
        store.zadd("log", "a", 40.0).await.unwrap();

        let all = store
            .zrange_by_score("log", f64::NEG_INFINITY, f64::INFINITY)
            .await
            .unwrap();
        assert_eq!(all, vec!["b", "c", "a"]);

        let removed = store.zrem_range_by_score("log", 0.0, 25.0).await.unwrap();
        assert_eq!(removed, 1);
        let rest = store.zrange_by_score("log", 30.0, 40.0).await.unwrap();
        assert_eq!(rest, vec!["c", "a"]);
    }
}
