/**
* filename : store
* author : HAMA
* date: 2025. 6. 2.
* description: 원격 키-값 저장소 위의 피처 벡터 캐시 (TTL 등급, 배치, 헬스체크)
**/

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::FeatureStoreConfig;
use crate::error::IndicatorError;
use crate::models::feature::FeatureVector;
use crate::utils::{self, logging};
use super::kv::KeyValueStore;

/// 데이터 나이에 따른 TTL 등급
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TtlTier {
  Recent,
  Medium,
  Historical,
}

/// (심볼, 타임스탬프) 조회 요청
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeatureRequest {
  pub symbol: String,
  pub timestamp: i64,
}

impl FeatureRequest {
  pub fn new(symbol: impl Into<String>, timestamp: i64) -> Self {
    FeatureRequest { symbol: symbol.into(), timestamp }
  }
}

#[derive(Debug, Clone, PartialEq)]
pub struct BatchError {
  pub request: FeatureRequest,
  pub error: IndicatorError,
}

/// 배치 조회 결과. 실패한 키는 `errors` 에 남고 `to_compute` 로도 분류된다
#[derive(Debug, Default)]
pub struct BatchLookup {
  pub cached: HashMap<FeatureRequest, FeatureVector>,
  pub to_compute: Vec<FeatureRequest>,
  pub errors: Vec<BatchError>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureStoreStats {
  pub hits: u64,
  pub misses: u64,
  /// 버전 불일치 또는 오래된 계산 결과로 거부된 항목
  pub stale: u64,
  pub errors: u64,
  pub writes: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HealthStatus {
  Healthy,
  Degraded,
  Unhealthy,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthReport {
  pub status: HealthStatus,
  pub latency_ms: f64,
  pub message: String,
}

#[derive(Debug, Default)]
struct StoreCounters {
  hits: AtomicU64,
  misses: AtomicU64,
  stale: AtomicU64,
  errors: AtomicU64,
  writes: AtomicU64,
}

impl StoreCounters {
  fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
  }
}

pub struct FeatureStore {
  backend: Arc<dyn KeyValueStore>,
  config: FeatureStoreConfig,
  counters: StoreCounters,
}

impl std::fmt::Debug for FeatureStore {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("FeatureStore")
      .field("config", &self.config)
      .field("stats", &self.stats())
      .finish()
  }
}

impl FeatureStore {
  pub fn new(backend: Arc<dyn KeyValueStore>, config: FeatureStoreConfig) -> Self {
    FeatureStore {
      backend,
      config,
      counters: StoreCounters::default(),
    }
  }

  pub fn config(&self) -> &FeatureStoreConfig {
    &self.config
  }

  /// `<namespace>:<type>:<symbol>:<timestamp>:v<version>`
  pub fn key(&self, symbol: &str, timestamp: i64) -> String {
    format!(
      "{}:{}:{}:{}:v{}",
      self.config.namespace, self.config.feature_type, symbol, timestamp, self.config.schema_version
    )
  }

  fn symbol_pattern(&self, symbol: &str) -> String {
    format!("{}:{}:{}:*", self.config.namespace, self.config.feature_type, symbol)
  }

  /// 쓰기 시점의 데이터 나이로 등급 결정
  pub fn ttl_tier(&self, timestamp: i64, now: i64) -> TtlTier {
    let age = utils::age_ms(timestamp, now) as u64;
    if age <= self.config.recent_max_age_ms {
      TtlTier::Recent
    } else if age <= self.config.medium_max_age_ms {
      TtlTier::Medium
    } else {
      TtlTier::Historical
    }
  }

  pub fn tier_ttl(&self, tier: TtlTier) -> Duration {
    let ms = match tier {
      TtlTier::Recent => self.config.recent_ttl_ms,
      TtlTier::Medium => self.config.medium_ttl_ms,
      TtlTier::Historical => self.config.historical_ttl_ms,
    };
    Duration::from_millis(ms)
  }

  /// 스키마 버전이 같고, 최근 데이터라면 계산 시각이 너무 오래되지 않아야 한다
  pub fn is_acceptable(&self, vector: &FeatureVector, now: i64) -> bool {
    if vector.metadata.version != self.config.schema_version {
      return false;
    }

    let data_age = utils::age_ms(vector.timestamp, now);
    if data_age <= self.config.freshness_window_ms {
      return utils::age_ms(vector.metadata.computed_at, now) <= self.config.max_computed_age_ms;
    }
    true
  }

  /// 페이로드 해석 + 신선도 판정. 거부된 값은 미스
  fn accept(&self, key: &str, payload: Option<String>, now: i64) -> Result<Option<FeatureVector>, IndicatorError> {
    let payload = match payload {
      Some(payload) => payload,
      None => {
        StoreCounters::bump(&self.counters.misses);
        return Ok(None);
      }
    };

    let vector: FeatureVector = match serde_json::from_str(&payload) {
      Ok(vector) => vector,
      Err(e) => {
        StoreCounters::bump(&self.counters.errors);
        StoreCounters::bump(&self.counters.misses);
        let error = IndicatorError::from(e);
        logging::log_remote_cache_failure("decode", key, &error);
        return Err(error);
      }
    };

    if !self.is_acceptable(&vector, now) {
      log::debug!("오래된 피처 벡터 무시: {}", key);
      StoreCounters::bump(&self.counters.stale);
      StoreCounters::bump(&self.counters.misses);
      return Ok(None);
    }

    StoreCounters::bump(&self.counters.hits);
    Ok(Some(vector))
  }

  pub async fn get(&self, symbol: &str, timestamp: i64) -> Result<Option<FeatureVector>, IndicatorError> {
    let key = self.key(symbol, timestamp);

    let payload = match self.backend.get(&key).await {
      Ok(payload) => payload,
      Err(e) => {
        StoreCounters::bump(&self.counters.errors);
        StoreCounters::bump(&self.counters.misses);
        logging::log_remote_cache_failure("get", &key, &e);
        return Err(e);
      }
    };

    self.accept(&key, payload, utils::current_timestamp_ms())
  }

  /// 저장 후 적용된 TTL 등급 반환
  pub async fn set(&self, vector: &FeatureVector) -> Result<TtlTier, IndicatorError> {
    let key = self.key(&vector.symbol, vector.timestamp);
    let tier = self.ttl_tier(vector.timestamp, utils::current_timestamp_ms());
    let payload = serde_json::to_string(vector)?;

    if let Err(e) = self.backend.set(&key, payload, self.tier_ttl(tier)).await {
      StoreCounters::bump(&self.counters.errors);
      logging::log_remote_cache_failure("set", &key, &e);
      return Err(e);
    }

    StoreCounters::bump(&self.counters.writes);
    log::debug!("피처 저장: {} ({:?})", key, tier);
    Ok(tier)
  }

  pub async fn delete(&self, symbol: &str, timestamp: i64) -> Result<bool, IndicatorError> {
    self.backend.delete(&self.key(symbol, timestamp)).await
  }

  /// 한 번의 mget 으로 조회. 개별 실패는 해당 키만 재계산 대상으로 돌린다
  pub async fn get_batch(&self, requests: &[FeatureRequest]) -> BatchLookup {
    let mut lookup = BatchLookup::default();
    if requests.is_empty() {
      return lookup;
    }

    let keys: Vec<String> = requests.iter().map(|r| self.key(&r.symbol, r.timestamp)).collect();

    let results = match self.backend.mget(&keys).await {
      Ok(results) if results.len() == keys.len() => results,
      Ok(results) => {
        let error = IndicatorError::Cache(format!(
          "mget returned {} results for {} keys", results.len(), keys.len()
        ));
        return self.fail_batch(requests, error);
      }
      Err(e) => return self.fail_batch(requests, e),
    };

    let now = utils::current_timestamp_ms();
    for ((request, key), result) in requests.iter().zip(keys.iter()).zip(results) {
      let accepted = match result {
        Ok(payload) => self.accept(key, payload, now),
        Err(e) => {
          StoreCounters::bump(&self.counters.errors);
          StoreCounters::bump(&self.counters.misses);
          logging::log_remote_cache_failure("mget", key, &e);
          Err(e)
        }
      };

      match accepted {
        Ok(Some(vector)) => {
          lookup.cached.insert(request.clone(), vector);
        }
        Ok(None) => lookup.to_compute.push(request.clone()),
        Err(error) => {
          lookup.to_compute.push(request.clone());
          lookup.errors.push(BatchError { request: request.clone(), error });
        }
      }
    }

    lookup
  }

  fn fail_batch(&self, requests: &[FeatureRequest], error: IndicatorError) -> BatchLookup {
    logging::log_remote_cache_failure("mget", &format!("{} keys", requests.len()), &error);
    self.counters.errors.fetch_add(1, Ordering::Relaxed);
    self.counters.misses.fetch_add(requests.len() as u64, Ordering::Relaxed);

    BatchLookup {
      cached: HashMap::new(),
      to_compute: requests.to_vec(),
      errors: requests
        .iter()
        .map(|request| BatchError { request: request.clone(), error: error.clone() })
        .collect(),
    }
  }

  /// 한 번의 mset 으로 저장. 실패한 항목만 반환
  pub async fn set_batch(&self, vectors: &[FeatureVector]) -> Vec<BatchError> {
    let now = utils::current_timestamp_ms();
    let mut failures = Vec::new();
    let mut requests = Vec::with_capacity(vectors.len());
    let mut entries = Vec::with_capacity(vectors.len());

    for vector in vectors {
      let request = FeatureRequest::new(vector.symbol.clone(), vector.timestamp);
      match serde_json::to_string(vector) {
        Ok(payload) => {
          let ttl = self.tier_ttl(self.ttl_tier(vector.timestamp, now));
          entries.push((self.key(&vector.symbol, vector.timestamp), payload, ttl));
          requests.push(request);
        }
        Err(e) => failures.push(BatchError { request, error: e.into() }),
      }
    }

    if entries.is_empty() {
      return failures;
    }

    match self.backend.mset(entries).await {
      Ok(results) if results.len() == requests.len() => {
        for (request, result) in requests.into_iter().zip(results) {
          match result {
            Ok(()) => StoreCounters::bump(&self.counters.writes),
            Err(error) => {
              StoreCounters::bump(&self.counters.errors);
              logging::log_remote_cache_failure("mset", &self.key(&request.symbol, request.timestamp), &error);
              failures.push(BatchError { request, error });
            }
          }
        }
      }
      Ok(results) => {
        let error = IndicatorError::Cache(format!(
          "mset returned {} results for {} entries", results.len(), requests.len()
        ));
        self.counters.errors.fetch_add(1, Ordering::Relaxed);
        failures.extend(requests.into_iter().map(|request| BatchError { request, error: error.clone() }));
      }
      Err(error) => {
        logging::log_remote_cache_failure("mset", &format!("{} entries", requests.len()), &error);
        self.counters.errors.fetch_add(1, Ordering::Relaxed);
        failures.extend(requests.into_iter().map(|request| BatchError { request, error: error.clone() }));
      }
    }

    failures
  }

  /// 심볼의 모든 피처 삭제, 삭제된 키 수 반환
  pub async fn invalidate_symbol(&self, symbol: &str) -> Result<usize, IndicatorError> {
    let keys = self.backend.keys(&self.symbol_pattern(symbol)).await?;

    let mut removed = 0;
    for key in &keys {
      if self.backend.delete(key).await? {
        removed += 1;
      }
    }

    log::info!("피처 무효화: {} - {}건", symbol, removed);
    Ok(removed)
  }

  /// set/get/delete 왕복을 제한 시간 안에 수행
  pub async fn health_check(&self) -> HealthReport {
    let started = Instant::now();
    let timeout = Duration::from_millis(self.config.health_check_timeout_ms);

    let outcome = tokio::time::timeout(timeout, self.probe()).await;
    let latency_ms = started.elapsed().as_secs_f64() * 1000.0;

    let report = match outcome {
      Ok(Ok(())) if latency_ms <= self.config.degraded_latency_ms as f64 => HealthReport {
        status: HealthStatus::Healthy,
        latency_ms,
        message: "feature store round trip ok".to_string(),
      },
      Ok(Ok(())) => HealthReport {
        status: HealthStatus::Degraded,
        latency_ms,
        message: format!("round trip took {:.1}ms", latency_ms),
      },
      Ok(Err(e)) => HealthReport {
        status: HealthStatus::Unhealthy,
        latency_ms,
        message: e.to_string(),
      },
      Err(_) => HealthReport {
        status: HealthStatus::Unhealthy,
        latency_ms,
        message: IndicatorError::Timeout(format!(
          "health check timed out after {}ms", self.config.health_check_timeout_ms
        ))
        .to_string(),
      },
    };

    if report.status != HealthStatus::Healthy {
      log::warn!("피처 저장소 상태 {:?}: {}", report.status, report.message);
    }
    report
  }

  async fn probe(&self) -> Result<(), IndicatorError> {
    let key = format!("{}:health:{}", self.config.namespace, Uuid::new_v4());
    let value = utils::current_timestamp_ms().to_string();

    self.backend.set(&key, value.clone(), Duration::from_secs(10)).await?;
    let read = self.backend.get(&key).await?;
    self.backend.delete(&key).await?;

    if read.as_deref() != Some(value.as_str()) {
      return Err(IndicatorError::Cache("health probe read back a different value".to_string()));
    }
    Ok(())
  }

  pub fn stats(&self) -> FeatureStoreStats {
    FeatureStoreStats {
      hits: self.counters.hits.load(Ordering::Relaxed),
      misses: self.counters.misses.load(Ordering::Relaxed),
      stale: self.counters.stale.load(Ordering::Relaxed),
      errors: self.counters.errors.load(Ordering::Relaxed),
      writes: self.counters.writes.load(Ordering::Relaxed),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::feature_store::kv::{InMemoryKeyValueStore, MockKeyValueStore};
  use crate::models::feature::{FeatureMetadata, IndicatorSnapshot};
  use async_trait::async_trait;
  use rstest::rstest;

  const MINUTE: i64 = 60_000;

  fn vector(symbol: &str, timestamp: i64, computed_at: i64) -> FeatureVector {
    FeatureVector {
      symbol: symbol.to_string(),
      timestamp,
      indicators: IndicatorSnapshot { sma: Some(101.5), ..IndicatorSnapshot::default() },
      patterns: Vec::new(),
      metadata: FeatureMetadata {
        version: 1,
        computed_at,
        data_points_used: 30,
        confidence: 0.8,
        data_quality: 1.0,
      },
    }
  }

  fn memory_store(config: FeatureStoreConfig) -> (Arc<InMemoryKeyValueStore>, FeatureStore) {
    let backend = Arc::new(InMemoryKeyValueStore::new());
    let store = FeatureStore::new(backend.clone(), config);
    (backend, store)
  }

  #[test]
  fn test_key_layout() {
    let (_, store) = memory_store(FeatureStoreConfig::default());
    assert_eq!(store.key("BTCUSDT", 1_700_000_000_000), "xfeature:vector:BTCUSDT:1700000000000:v1");
  }

  #[rstest]
  #[case(0, TtlTier::Recent)]
  #[case(10 * MINUTE, TtlTier::Recent)]
  #[case(30 * MINUTE, TtlTier::Medium)]
  #[case(2 * 60 * MINUTE, TtlTier::Historical)]
  fn test_ttl_tier_by_age(#[case] age: i64, #[case] expected: TtlTier) {
    let (_, store) = memory_store(FeatureStoreConfig::default());
    let now = 1_700_000_000_000;
    assert_eq!(store.ttl_tier(now - age, now), expected);
  }

  #[test]
  fn test_acceptance_rules() {
    let (_, store) = memory_store(FeatureStoreConfig::default());
    let now = 1_700_000_000_000;

    assert!(store.is_acceptable(&vector("A", now - MINUTE, now), now));

    // 최근 데이터인데 계산이 2시간 전
    assert!(!store.is_acceptable(&vector("A", now - MINUTE, now - 120 * MINUTE), now));

    // 오래된 데이터는 계산 시각을 보지 않음
    assert!(store.is_acceptable(&vector("A", now - 30 * MINUTE, now - 120 * MINUTE), now));

    let mut old_schema = vector("A", now, now);
    old_schema.metadata.version = 0;
    assert!(!store.is_acceptable(&old_schema, now));
  }

  #[tokio::test]
  async fn test_set_then_get() {
    let (_, store) = memory_store(FeatureStoreConfig::default());
    let now = utils::current_timestamp_ms();
    let v = vector("BTCUSDT", now - 10 * MINUTE, now);

    assert_eq!(store.set(&v).await.unwrap(), TtlTier::Recent);
    assert_eq!(store.get("BTCUSDT", v.timestamp).await.unwrap(), Some(v.clone()));
    assert_eq!(store.get("BTCUSDT", v.timestamp + 1).await.unwrap(), None);

    let stats = store.stats();
    assert_eq!((stats.hits, stats.misses, stats.writes), (1, 1, 1));
  }

  #[tokio::test]
  async fn test_historical_tier_on_write() {
    let (_, store) = memory_store(FeatureStoreConfig::default());
    let now = utils::current_timestamp_ms();
    assert_eq!(store.set(&vector("ETH", now - 120 * MINUTE, now)).await.unwrap(), TtlTier::Historical);
  }

  #[tokio::test]
  async fn test_expired_entry_is_a_miss() {
    let config = FeatureStoreConfig { recent_ttl_ms: 30, ..FeatureStoreConfig::default() };
    let (_, store) = memory_store(config);
    let now = utils::current_timestamp_ms();
    let v = vector("BTC", now, now);

    store.set(&v).await.unwrap();
    tokio::time::sleep(Duration::from_millis(80)).await;

    assert_eq!(store.get("BTC", v.timestamp).await.unwrap(), None);
  }

  #[tokio::test]
  async fn test_stale_computation_rejected() {
    let (_, store) = memory_store(FeatureStoreConfig::default());
    let now = utils::current_timestamp_ms();
    let v = vector("BTC", now - MINUTE, now - 3 * 60 * MINUTE);

    store.set(&v).await.unwrap();
    assert_eq!(store.get("BTC", v.timestamp).await.unwrap(), None);
    assert_eq!(store.stats().stale, 1);
  }

  #[tokio::test]
  async fn test_corrupt_payload_is_error() {
    let (backend, store) = memory_store(FeatureStoreConfig::default());
    backend.set(&store.key("BTC", 1), "{not json".to_string(), Duration::from_secs(60)).await.unwrap();

    assert!(matches!(store.get("BTC", 1).await, Err(IndicatorError::Serialization(_))));
    assert_eq!(store.stats().errors, 1);
  }

  #[tokio::test]
  async fn test_batch_partial_failure() {
    let now = utils::current_timestamp_ms();
    let hit_a = serde_json::to_string(&vector("BTC", now - 40 * MINUTE, now)).unwrap();
    let hit_d = serde_json::to_string(&vector("BTC", now - 10 * MINUTE, now)).unwrap();

    let mut backend = MockKeyValueStore::new();
    backend.expect_mget().times(1).returning(move |keys| {
      assert_eq!(keys.len(), 4);
      Ok(vec![
        Ok(Some(hit_a.clone())),
        Err(IndicatorError::Cache("connection reset".to_string())),
        Ok(None),
        Ok(Some(hit_d.clone())),
      ])
    });

    let store = FeatureStore::new(Arc::new(backend), FeatureStoreConfig::default());
    let requests = vec![
      FeatureRequest::new("BTC", now - 40 * MINUTE),
      FeatureRequest::new("BTC", now - 30 * MINUTE),
      FeatureRequest::new("BTC", now - 20 * MINUTE),
      FeatureRequest::new("BTC", now - 10 * MINUTE),
    ];

    let lookup = store.get_batch(&requests).await;

    assert_eq!(lookup.cached.len(), 2);
    assert!(lookup.cached.contains_key(&requests[0]));
    assert!(lookup.cached.contains_key(&requests[3]));
    assert_eq!(lookup.to_compute, vec![requests[1].clone(), requests[2].clone()]);
    assert_eq!(lookup.errors.len(), 1);
    assert_eq!(lookup.errors[0].request, requests[1]);
  }

  #[tokio::test]
  async fn test_batch_total_failure_recomputes_everything() {
    let mut backend = MockKeyValueStore::new();
    backend
      .expect_mget()
      .returning(|_| Err(IndicatorError::Cache("unreachable".to_string())));

    let store = FeatureStore::new(Arc::new(backend), FeatureStoreConfig::default());
    let requests: Vec<_> = (0..3).map(|i| FeatureRequest::new("ETH", i * MINUTE)).collect();

    let lookup = store.get_batch(&requests).await;
    assert!(lookup.cached.is_empty());
    assert_eq!(lookup.to_compute.len(), 3);
    assert_eq!(lookup.errors.len(), 3);
  }

  #[tokio::test]
  async fn test_set_batch_round_trip() {
    let (backend, store) = memory_store(FeatureStoreConfig::default());
    let now = utils::current_timestamp_ms();
    let vectors: Vec<_> = (0..5).map(|i| vector("SOL", now - i * MINUTE, now)).collect();

    assert!(store.set_batch(&vectors).await.is_empty());
    assert_eq!(backend.round_trips(), 1);

    let requests: Vec<_> = vectors.iter().map(|v| FeatureRequest::new("SOL", v.timestamp)).collect();
    let lookup = store.get_batch(&requests).await;

    assert_eq!(backend.round_trips(), 2);
    assert_eq!(lookup.cached.len(), 5);
    assert!(lookup.to_compute.is_empty());
  }

  #[tokio::test]
  async fn test_set_batch_reports_per_entry_failures() {
    let mut backend = MockKeyValueStore::new();
    backend.expect_mset().returning(|entries| {
      Ok(entries
        .iter()
        .enumerate()
        .map(|(i, _)| if i == 1 { Err(IndicatorError::Cache("oom".to_string())) } else { Ok(()) })
        .collect())
    });

    let store = FeatureStore::new(Arc::new(backend), FeatureStoreConfig::default());
    let vectors: Vec<_> = (0..3).map(|i| vector("ADA", i * MINUTE, i * MINUTE)).collect();

    let failures = store.set_batch(&vectors).await;
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].request, FeatureRequest::new("ADA", MINUTE));
    assert_eq!(store.stats().writes, 2);
  }

  #[tokio::test]
  async fn test_invalidate_symbol() {
    let (_, store) = memory_store(FeatureStoreConfig::default());
    let now = utils::current_timestamp_ms();

    for i in 0..3 {
      store.set(&vector("BTC", now - i * MINUTE, now)).await.unwrap();
    }
    store.set(&vector("ETH", now, now)).await.unwrap();

    assert_eq!(store.invalidate_symbol("BTC").await.unwrap(), 3);
    assert!(store.get("BTC", now).await.unwrap().is_none());
    assert!(store.get("ETH", now).await.unwrap().is_some());
  }

  #[tokio::test]
  async fn test_health_check_healthy() {
    let (_, store) = memory_store(FeatureStoreConfig::default());
    let report = store.health_check().await;
    assert_eq!(report.status, HealthStatus::Healthy);
  }

  #[tokio::test]
  async fn test_health_check_backend_error() {
    let mut backend = MockKeyValueStore::new();
    backend
      .expect_set()
      .returning(|_, _, _| Err(IndicatorError::Cache("refused".to_string())));

    let store = FeatureStore::new(Arc::new(backend), FeatureStoreConfig::default());
    let report = store.health_check().await;

    assert_eq!(report.status, HealthStatus::Unhealthy);
    assert!(report.message.contains("refused"));
  }

  /// 모든 호출이 지정한 시간만큼 늦게 응답
  struct SlowStore {
    inner: InMemoryKeyValueStore,
    delay: Duration,
  }

  #[async_trait]
  impl KeyValueStore for SlowStore {
    async fn get(&self, key: &str) -> Result<Option<String>, IndicatorError> {
      tokio::time::sleep(self.delay).await;
      self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: String, ttl: Duration) -> Result<(), IndicatorError> {
      tokio::time::sleep(self.delay).await;
      self.inner.set(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<bool, IndicatorError> {
      tokio::time::sleep(self.delay).await;
      self.inner.delete(key).await
    }

    async fn keys(&self, pattern: &str) -> Result<Vec<String>, IndicatorError> {
      self.inner.keys(pattern).await
    }

    async fn mget(&self, keys: &[String]) -> Result<Vec<Result<Option<String>, IndicatorError>>, IndicatorError> {
      self.inner.mget(keys).await
    }

    async fn mset(&self, entries: Vec<(String, String, Duration)>) -> Result<Vec<Result<(), IndicatorError>>, IndicatorError> {
      self.inner.mset(entries).await
    }
  }

  #[tokio::test]
  async fn test_health_check_degraded_and_timeout() {
    let slow = SlowStore { inner: InMemoryKeyValueStore::new(), delay: Duration::from_millis(20) };
    let config = FeatureStoreConfig {
      degraded_latency_ms: 10,
      health_check_timeout_ms: 2_000,
      ..FeatureStoreConfig::default()
    };
    let store = FeatureStore::new(Arc::new(slow), config);
    assert_eq!(store.health_check().await.status, HealthStatus::Degraded);

    let stuck = SlowStore { inner: InMemoryKeyValueStore::new(), delay: Duration::from_millis(500) };
    let config = FeatureStoreConfig { health_check_timeout_ms: 50, ..FeatureStoreConfig::default() };
    let store = FeatureStore::new(Arc::new(stuck), config);

    let report = store.health_check().await;
    assert_eq!(report.status, HealthStatus::Unhealthy);
    assert!(report.message.contains("timed out"));
  }
}
