use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::error::IndicatorError;

/// The `KeyValueStore` trait is the remote cache protocol the feature store talks to.
/// Network implementations and the in-memory store below both satisfy it.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, IndicatorError>;

    /// Store a value that expires after `ttl`
    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), IndicatorError>;

    /// Returns true if a key was removed
    async fn delete(&self, key: &str) -> Result<bool, IndicatorError>;

    /// Keys matching a glob pattern (`*` wildcard only)
    async fn keys(&self, pattern: &str) -> Result<Vec<String>, IndicatorError>;

    /// Multi-get in one round trip; the outer error means the whole call failed
    async fn mget(&self, keys: &[String]) -> Result<Vec<Result<Option<String>, IndicatorError>>, IndicatorError>;

    /// Multi-set in one round trip
    async fn mset(&self, entries: Vec<(String, String, Duration)>) -> Result<Vec<Result<(), IndicatorError>>, IndicatorError>;
}

/// `*` 만 지원하는 glob 매칭
pub fn glob_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();

    let (mut pi, mut ti) = (0, 0);
    let mut star: Option<usize> = None;
    let mut mark = 0;

    while ti < t.len() {
        if pi < p.len() && p[pi] != '*' && p[pi] == t[ti] {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '*' {
            star = Some(pi);
            mark = ti;
            pi += 1;
        } else if let Some(s) = star {
            pi = s + 1;
            mark += 1;
            ti = mark;
        } else {
            return false;
        }
    }

    while pi < p.len() && p[pi] == '*' {
        pi += 1;
    }

    pi == p.len()
}

/// 프로세스 내 키-값 저장소 (테스트 / 단일 노드 배포용)
#[derive(Debug, Default)]
pub struct InMemoryKeyValueStore {
    entries: RwLock<HashMap<String, (String, Instant)>>,
    round_trips: AtomicU64,
}

impl InMemoryKeyValueStore {
    pub fn new() -> Self {
        InMemoryKeyValueStore::default()
    }

    /// 지금까지 처리한 호출 수 (배치는 1회)
    pub fn round_trips(&self) -> u64 {
        self.round_trips.load(Ordering::Relaxed)
    }

    pub async fn len(&self) -> usize {
        let now = Instant::now();
        self.entries.read().await.values().filter(|(_, expires)| *expires > now).count()
    }

    fn record_trip(&self) {
        self.round_trips.fetch_add(1, Ordering::Relaxed);
    }
}

#[async_trait]
impl KeyValueStore for InMemoryKeyValueStore {
    async fn get(&self, key: &str) -> Result<Option<String>, IndicatorError> {
        self.record_trip();
        let now = Instant::now();

        let mut entries = self.entries.write().await;
        match entries.get(key) {
            Some((value, expires)) if *expires > now => Ok(Some(value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), IndicatorError> {
        self.record_trip();
        let expires = Instant::now() + ttl;
        self.entries.write().await.insert(key.to_string(), (value, expires));
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<bool, IndicatorError> {
        self.record_trip();
        Ok(self.entries.write().await.remove(key).is_some())
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, IndicatorError> {
        self.record_trip();
        let now = Instant::now();

        let entries = self.entries.read().await;
        Ok(entries
            .iter()
            .filter(|(key, (_, expires))| *expires > now && glob_match(pattern, key))
            .map(|(key, _)| key.clone())
            .collect())
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Result<Option<String>, IndicatorError>>, IndicatorError> {
        self.record_trip();
        let now = Instant::now();

        let entries = self.entries.read().await;
        Ok(keys
            .iter()
            .map(|key| match entries.get(key) {
                Some((value, expires)) if *expires > now => Ok(Some(value.clone())),
                _ => Ok(None),
            })
            .collect())
    }

    async fn mset(&self, entries: Vec<(String, String, Duration)>) -> Result<Vec<Result<(), IndicatorError>>, IndicatorError> {
        self.record_trip();
        let now = Instant::now();

        let mut store = self.entries.write().await;
        // 배치 쓰기만 오는 경우에도 만료 항목이 쌓이지 않도록 정리
        store.retain(|_, (_, expires)| *expires > now);
        Ok(entries
            .into_iter()
            .map(|(key, value, ttl)| {
                store.insert(key, (value, now + ttl));
                Ok(())
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_glob_match() {
        assert!(glob_match("xfeature:vector:BTC:*", "xfeature:vector:BTC:1000:v1"));
        assert!(!glob_match("xfeature:vector:BTC:*", "xfeature:vector:ETH:1000:v1"));
        assert!(glob_match("*:v1", "a:b:v1"));
        assert!(glob_match("a*c*e", "abcde"));
        assert!(!glob_match("a*c", "abd"));
        assert!(glob_match("*", ""));
    }

    #[tokio::test]
    async fn test_set_get_delete() {
        let store = InMemoryKeyValueStore::new();
        store.set("k", "v".to_string(), Duration::from_secs(60)).await.unwrap();

        assert_eq!(store.get("k").await.unwrap(), Some("v".to_string()));
        assert!(store.delete("k").await.unwrap());
        assert!(!store.delete("k").await.unwrap());
        assert_eq!(store.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_entries_expire() {
        let store = InMemoryKeyValueStore::new();
        store.set("k", "v".to_string(), Duration::from_millis(20)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(store.get("k").await.unwrap(), None);
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn test_batch_is_one_round_trip() {
        let store = InMemoryKeyValueStore::new();
        let entries = (0..5)
            .map(|i| (format!("k{}", i), i.to_string(), Duration::from_secs(60)))
            .collect();
        store.mset(entries).await.unwrap();

        let keys: Vec<String> = (0..6).map(|i| format!("k{}", i)).collect();
        let values = store.mget(&keys).await.unwrap();

        assert_eq!(store.round_trips(), 2);
        assert_eq!(values.len(), 6);
        assert_eq!(values[3], Ok(Some("3".to_string())));
        assert_eq!(values[5], Ok(None));
    }

    #[tokio::test]
    async fn test_batch_writes_purge_expired_entries() {
        let store = InMemoryKeyValueStore::new();
        let short = (0..10)
            .map(|i| (format!("old{}", i), i.to_string(), Duration::from_millis(10)))
            .collect();
        store.mset(short).await.unwrap();
        tokio::time::sleep(Duration::from_millis(30)).await;

        store.mget(&["old0".to_string()]).await.unwrap();
        store.mset(vec![("new".to_string(), "v".to_string(), Duration::from_secs(60))]).await.unwrap();

        assert_eq!(store.entries.read().await.len(), 1);
        assert_eq!(store.get("new").await.unwrap(), Some("v".to_string()));
    }
}
