/**
* filename : manager
* author : HAMA
* date: 2025. 6. 2.
* description: 항목 수 / 메모리 상한을 갖는 TTL + LRU 캐시
**/

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;

use crate::config::CacheConfig;
use crate::error::IndicatorError;
use crate::utils::{self, logging};
use super::CacheCost;

/// 항목당 고정 부가 비용 (키 / 타임스탬프 / 접근 순서 인덱스)
const ENTRY_OVERHEAD_BYTES: usize = 64;

/// 항목 수 상한에 걸렸을 때 남길 비율
const EVICTION_HEADROOM: f64 = 0.8;

#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<T> {
  pub result: T,
  pub written_at_ms: i64,
  pub ttl_ms: u64,
  pub key: String,
  pub approx_size_bytes: usize,
}

impl<T> CacheEntry<T> {
  /// now > writtenAt + ttl 이면 물리적으로 남아 있어도 만료
  pub fn is_expired(&self, now_ms: i64) -> bool {
    now_ms > self.written_at_ms.saturating_add(i64::try_from(self.ttl_ms).unwrap_or(i64::MAX))
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
  pub size: usize,
  pub hits: u64,
  pub misses: u64,
  pub hit_ratio: f64,
  pub memory_usage: usize,
  pub cleanup_count: u64,
  pub evictions: u64,
  pub max_size: usize,
  pub memory_limit: usize,
}

#[derive(Debug)]
struct Slot<T> {
  entry: CacheEntry<T>,
  last_access: u64,
}

#[derive(Debug)]
struct CacheState<T> {
  entries: HashMap<String, Slot<T>>,
  /// 접근 순번 -> 키. 가장 작은 순번이 LRU
  access_order: BTreeMap<u64, String>,
  access_counter: u64,
  memory_usage: usize,
  hits: u64,
  misses: u64,
  cleanup_count: u64,
  evictions: u64,
}

impl<T> CacheState<T> {
  fn new() -> Self {
    CacheState {
      entries: HashMap::new(),
      access_order: BTreeMap::new(),
      access_counter: 0,
      memory_usage: 0,
      hits: 0,
      misses: 0,
      cleanup_count: 0,
      evictions: 0,
    }
  }

  fn next_access(&mut self) -> u64 {
    self.access_counter += 1;
    self.access_counter
  }

  fn touch(&mut self, key: &str) {
    let seq = self.next_access();
    if let Some(slot) = self.entries.get_mut(key) {
      self.access_order.remove(&slot.last_access);
      slot.last_access = seq;
      self.access_order.insert(seq, key.to_string());
    }
  }

  fn remove(&mut self, key: &str) -> Option<CacheEntry<T>> {
    let slot = self.entries.remove(key)?;
    self.access_order.remove(&slot.last_access);
    self.memory_usage = self.memory_usage.saturating_sub(slot.entry.approx_size_bytes);
    Some(slot.entry)
  }

  fn evict_lru(&mut self) -> bool {
    let key = match self.access_order.iter().next() {
      Some((_, key)) => key.clone(),
      None => return false,
    };
    self.remove(&key);
    self.evictions += 1;
    true
  }

  /// 삽입 전에 상한을 넘지 않도록 LRU 순으로 축출
  fn make_room(&mut self, incoming_bytes: usize, max_size: usize, memory_limit: usize) -> usize {
    let mut evicted = 0;

    if self.entries.len() >= max_size {
      let target = ((max_size as f64 * EVICTION_HEADROOM).floor() as usize).min(max_size.saturating_sub(1));
      while self.entries.len() > target && self.evict_lru() {
        evicted += 1;
      }
    }

    while self.memory_usage + incoming_bytes > memory_limit && self.evict_lru() {
      evicted += 1;
    }

    evicted
  }
}

/// 지표 배치 결과를 메모이즈하는 범용 캐시.
///
/// 모든 변경은 하나의 뮤텍스로 직렬화된다. 축출 계산이 맵 / 접근 순번 /
/// 메모리 합계의 일관된 상태에 의존하기 때문이다.
#[derive(Debug)]
pub struct CacheManager<T> {
  config: CacheConfig,
  state: Mutex<CacheState<T>>,
  cleanup_task: Mutex<Option<JoinHandle<()>>>,
}

impl<T> CacheManager<T>
where
  T: Clone + CacheCost + Send + 'static,
{
  pub fn new(config: CacheConfig) -> Result<Self, IndicatorError> {
    config.validate()?;

    Ok(CacheManager {
      config,
      state: Mutex::new(CacheState::new()),
      cleanup_task: Mutex::new(None),
    })
  }

  pub fn config(&self) -> &CacheConfig {
    &self.config
  }

  pub fn is_enabled(&self) -> bool {
    self.config.enabled
  }

  fn lock(&self) -> MutexGuard<'_, CacheState<T>> {
    self.state.lock().unwrap_or_else(|poisoned| {
      log::warn!("캐시 뮤텍스가 오염됨, 상태를 그대로 복구");
      poisoned.into_inner()
    })
  }

  pub fn get(&self, key: &str) -> Option<T> {
    self.get_at(key, utils::current_timestamp_ms())
  }

  pub(crate) fn get_at(&self, key: &str, now_ms: i64) -> Option<T> {
    if !self.config.enabled {
      return None;
    }

    let mut state = self.lock();

    let expired = match state.entries.get(key) {
      Some(slot) => slot.entry.is_expired(now_ms),
      None => {
        state.misses += 1;
        return None;
      }
    };

    if expired {
      state.remove(key);
      state.misses += 1;
      return None;
    }

    state.hits += 1;
    state.touch(key);
    state.entries.get(key).map(|slot| slot.entry.result.clone())
  }

  /// 기본 TTL 로 저장
  pub fn set(&self, key: &str, value: T) -> Result<(), IndicatorError> {
    self.set_with_ttl(key, value, self.config.default_ttl_ms)
  }

  pub fn set_with_ttl(&self, key: &str, value: T, ttl_ms: u64) -> Result<(), IndicatorError> {
    self.set_at(key, value, ttl_ms, utils::current_timestamp_ms())
  }

  pub(crate) fn set_at(&self, key: &str, value: T, ttl_ms: u64, now_ms: i64) -> Result<(), IndicatorError> {
    if !self.config.enabled {
      return Ok(());
    }

    let size = key.len() + value.approx_size() + ENTRY_OVERHEAD_BYTES;
    if size > self.config.memory_limit_bytes {
      return Err(IndicatorError::Cache(format!(
        "Entry {} ({} bytes) exceeds memory limit {}", key, size, self.config.memory_limit_bytes
      )));
    }

    let mut state = self.lock();
    state.remove(key);

    let evicted = state.make_room(size, self.config.max_size, self.config.memory_limit_bytes);
    if evicted > 0 {
      logging::log_cache_eviction(evicted, state.entries.len(), state.memory_usage);
    }

    let seq = state.next_access();
    state.access_order.insert(seq, key.to_string());
    state.memory_usage += size;
    state.entries.insert(key.to_string(), Slot {
      entry: CacheEntry {
        result: value,
        written_at_ms: now_ms,
        ttl_ms,
        key: key.to_string(),
        approx_size_bytes: size,
      },
      last_access: seq,
    });

    Ok(())
  }

  /// 접근 순서를 갱신하지 않는 존재 확인
  pub fn has(&self, key: &str) -> bool {
    self.has_at(key, utils::current_timestamp_ms())
  }

  pub(crate) fn has_at(&self, key: &str, now_ms: i64) -> bool {
    let state = self.lock();
    state.entries
      .get(key)
      .map(|slot| !slot.entry.is_expired(now_ms))
      .unwrap_or(false)
  }

  pub fn delete(&self, key: &str) -> bool {
    self.lock().remove(key).is_some()
  }

  pub fn clear(&self) {
    let mut state = self.lock();
    state.entries.clear();
    state.access_order.clear();
    state.memory_usage = 0;
  }

  pub fn keys(&self) -> Vec<String> {
    self.lock().entries.keys().cloned().collect()
  }

  pub fn len(&self) -> usize {
    self.lock().entries.len()
  }

  pub fn is_empty(&self) -> bool {
    self.len() == 0
  }

  pub fn stats(&self) -> CacheStats {
    let state = self.lock();
    let lookups = state.hits + state.misses;

    CacheStats {
      size: state.entries.len(),
      hits: state.hits,
      misses: state.misses,
      hit_ratio: if lookups == 0 { 0.0 } else { state.hits as f64 / lookups as f64 },
      memory_usage: state.memory_usage,
      cleanup_count: state.cleanup_count,
      evictions: state.evictions,
      max_size: self.config.max_size,
      memory_limit: self.config.memory_limit_bytes,
    }
  }

  /// 만료 항목 일괄 제거, 제거 건수 반환
  pub fn cleanup_expired(&self) -> usize {
    self.cleanup_expired_at(utils::current_timestamp_ms())
  }

  pub(crate) fn cleanup_expired_at(&self, now_ms: i64) -> usize {
    let mut state = self.lock();

    let expired: Vec<String> = state.entries
      .iter()
      .filter(|(_, slot)| slot.entry.is_expired(now_ms))
      .map(|(key, _)| key.clone())
      .collect();

    for key in &expired {
      state.remove(key);
    }
    state.cleanup_count += expired.len() as u64;

    if !expired.is_empty() {
      log::debug!("만료 캐시 정리: {}건 - 남은 항목: {}", expired.len(), state.entries.len());
    }

    expired.len()
  }

  /// 주기적 만료 정리 작업 시작 (tokio 런타임 안에서 호출)
  ///
  /// 작업은 약한 참조만 들고 있어 캐시가 해제되면 스스로 종료된다.
  pub fn start_cleanup(self: &Arc<Self>) {
    if !self.config.enabled || self.config.cleanup_interval_ms == 0 {
      return;
    }

    let runtime = match tokio::runtime::Handle::try_current() {
      Ok(handle) => handle,
      Err(_) => {
        log::warn!("tokio 런타임이 없어 캐시 정리 작업을 시작하지 않음");
        return;
      }
    };

    let weak = Arc::downgrade(self);
    let period = Duration::from_millis(self.config.cleanup_interval_ms);

    let handle = runtime.spawn(async move {
      let mut interval = tokio::time::interval(period);
      // 첫 tick 은 즉시 완료됨
      interval.tick().await;

      loop {
        interval.tick().await;

        match weak.upgrade() {
          Some(cache) => {
            cache.cleanup_expired();
          }
          None => break,
        }
      }
    });

    let mut task = self.cleanup_task.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(previous) = task.replace(handle) {
      previous.abort();
    }
  }

  pub fn shutdown(&self) {
    let mut task = self.cleanup_task.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    if let Some(handle) = task.take() {
      handle.abort();
      log::debug!("캐시 정리 작업 종료");
    }
  }
}

impl<T> Drop for CacheManager<T> {
  fn drop(&mut self) {
    if let Ok(mut task) = self.cleanup_task.lock() {
      if let Some(handle) = task.take() {
        handle.abort();
      }
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn config(max_size: usize, memory_limit_bytes: usize) -> CacheConfig {
    CacheConfig {
      max_size,
      memory_limit_bytes,
      default_ttl_ms: 1_000,
      ..CacheConfig::default()
    }
  }

  #[test]
  fn test_lru_evicts_least_recently_used() {
    let cache: CacheManager<f64> = CacheManager::new(config(2, 1 << 20)).unwrap();

    cache.set_at("A", 1.0, 1_000, 0).unwrap();
    cache.set_at("B", 2.0, 1_000, 0).unwrap();
    assert_eq!(cache.get_at("A", 1), Some(1.0));
    cache.set_at("C", 3.0, 1_000, 2).unwrap();

    assert!(cache.has_at("A", 3));
    assert!(!cache.has_at("B", 3));
    assert!(cache.has_at("C", 3));
    assert_eq!(cache.stats().evictions, 1);
  }

  #[test]
  fn test_expired_get_is_miss_and_deletes() {
    let cache: CacheManager<f64> = CacheManager::new(config(10, 1 << 20)).unwrap();
    cache.set_at("k", 1.0, 100, 1_000).unwrap();

    // 경계값은 아직 유효
    assert_eq!(cache.get_at("k", 1_100), Some(1.0));
    assert_eq!(cache.get_at("k", 1_101), None);
    assert_eq!(cache.len(), 0);

    let stats = cache.stats();
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hit_ratio, 0.5);
  }

  #[test]
  fn test_has_does_not_refresh_order() {
    let cache: CacheManager<f64> = CacheManager::new(config(2, 1 << 20)).unwrap();
    cache.set_at("A", 1.0, 1_000, 0).unwrap();
    cache.set_at("B", 2.0, 1_000, 0).unwrap();
    assert!(cache.has_at("A", 1));
    cache.set_at("C", 3.0, 1_000, 2).unwrap();

    assert!(!cache.has_at("A", 3));
    assert!(cache.has_at("B", 3));
  }

  #[test]
  fn test_count_eviction_restores_headroom() {
    let cache: CacheManager<f64> = CacheManager::new(config(10, 1 << 20)).unwrap();
    for i in 0..10 {
      cache.set_at(&format!("k{}", i), i as f64, 1_000, i).unwrap();
    }
    cache.set_at("k10", 10.0, 1_000, 10).unwrap();

    // 8개까지 줄인 뒤 삽입
    assert_eq!(cache.len(), 9);
    assert!(!cache.has_at("k0", 11));
    assert!(!cache.has_at("k1", 11));
    assert!(cache.has_at("k2", 11));
  }

  #[test]
  fn test_memory_limit_never_exceeded() {
    let entry_size = "k0".len() + 8 + ENTRY_OVERHEAD_BYTES;
    let limit = entry_size * 3;
    let cache: CacheManager<f64> = CacheManager::new(config(100, limit)).unwrap();

    for i in 0..10 {
      cache.set_at(&format!("k{}", i), i as f64, 1_000, i).unwrap();
      assert!(cache.stats().memory_usage <= limit);
    }
    assert_eq!(cache.len(), 3);
    assert!(cache.has_at("k9", 10));
  }

  #[test]
  fn test_oversized_entry_rejected() {
    let cache: CacheManager<String> = CacheManager::new(config(10, 128)).unwrap();
    let result = cache.set_at("big", "x".repeat(1_000), 1_000, 0);

    assert!(matches!(result, Err(IndicatorError::Cache(_))));
    assert!(cache.is_empty());
  }

  #[test]
  fn test_overwrite_keeps_accounting() {
    let cache: CacheManager<f64> = CacheManager::new(config(10, 1 << 20)).unwrap();
    cache.set_at("k", 1.0, 1_000, 0).unwrap();
    let usage = cache.stats().memory_usage;
    cache.set_at("k", 2.0, 1_000, 1).unwrap();

    assert_eq!(cache.len(), 1);
    assert_eq!(cache.stats().memory_usage, usage);
    assert_eq!(cache.get_at("k", 2), Some(2.0));
  }

  #[test]
  fn test_cleanup_expired() {
    let cache: CacheManager<f64> = CacheManager::new(config(10, 1 << 20)).unwrap();
    cache.set_at("short", 1.0, 10, 0).unwrap();
    cache.set_at("long", 2.0, 10_000, 0).unwrap();

    assert_eq!(cache.cleanup_expired_at(100), 1);
    assert_eq!(cache.keys(), vec!["long".to_string()]);
    assert_eq!(cache.stats().cleanup_count, 1);
  }

  #[test]
  fn test_disabled_cache_stores_nothing() {
    let cache: CacheManager<f64> = CacheManager::new(CacheConfig { enabled: false, ..CacheConfig::default() }).unwrap();
    cache.set("k", 1.0).unwrap();
    assert_eq!(cache.get("k"), None);
    assert!(cache.is_empty());
  }

  #[test]
  fn test_zero_capacity_config_rejected() {
    let no_room = CacheManager::<f64>::new(config(0, 1 << 20));
    assert!(matches!(no_room, Err(IndicatorError::Config(_))));

    let no_memory = CacheManager::<f64>::new(config(10, 0));
    assert!(matches!(no_memory, Err(IndicatorError::Config(_))));

    let single = CacheManager::<f64>::new(config(1, 1 << 20)).unwrap();
    single.set_at("a", 1.0, 1_000, 0).unwrap();
    single.set_at("b", 2.0, 1_000, 1).unwrap();
    assert_eq!(single.len(), 1);
    assert!(single.has_at("b", 2));
  }

  #[test]
  fn test_huge_ttl_does_not_wrap() {
    let cache: CacheManager<f64> = CacheManager::new(config(10, 1 << 20)).unwrap();
    cache.set_at("forever", 1.0, u64::MAX, 1_000).unwrap();

    assert_eq!(cache.get_at("forever", 1_000_000_000_000), Some(1.0));
    assert_eq!(cache.cleanup_expired_at(i64::MAX - 1), 0);
  }

  #[tokio::test]
  async fn test_background_cleanup_sweeps() {
    let cache: Arc<CacheManager<f64>> = Arc::new(CacheManager::new(CacheConfig {
      cleanup_interval_ms: 20,
      ..CacheConfig::default()
    }).unwrap());
    cache.set_with_ttl("k", 1.0, 1).unwrap();
    cache.start_cleanup();

    tokio::time::sleep(Duration::from_millis(120)).await;
    assert!(cache.is_empty());

    cache.shutdown();
  }
}
