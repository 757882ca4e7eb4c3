/**
* filename : integration
* author : HAMA
* date: 2025. 6. 2.
* description: 지표 계산과 피처 저장소를 묶는 피처 서비스
**/

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex as StdMutex};

use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::cache::CacheStats;
use crate::config::Config;
use crate::error::IndicatorError;
use crate::indicators::{EngineMetrics, IndicatorSuite};
use crate::models::feature::{FeatureMetadata, FeatureVector};
use crate::models::market_data::MarketDataPoint;
use crate::utils::{self, logging};
use crate::validation::DataValidator;
use super::kv::KeyValueStore;
use super::store::{FeatureRequest, FeatureStore, FeatureStoreStats, HealthReport};

/// 배치 조회 단위: 심볼의 시계열에서 몇 번째 포인트인지
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FeatureLookup {
  pub symbol: String,
  pub index: usize,
}

impl FeatureLookup {
  pub fn new(symbol: impl Into<String>, index: usize) -> Self {
    FeatureLookup { symbol: symbol.into(), index }
  }
}

#[derive(Debug, Default)]
pub struct BatchFeatures {
  pub features: HashMap<FeatureLookup, FeatureVector>,
  pub failed: Vec<(FeatureLookup, IndicatorError)>,
  pub cached_count: usize,
  pub computed_count: usize,
}

type InFlight = StdMutex<HashMap<String, Arc<Mutex<()>>>>;

/// 키별 계산 게이트 참여권. 마지막 참여자가 빠질 때 맵에서 지운다
struct InFlightGuard<'a> {
  in_flight: &'a InFlight,
  key: String,
  gate: Arc<Mutex<()>>,
}

impl<'a> InFlightGuard<'a> {
  fn enter(in_flight: &'a InFlight, key: String) -> Self {
    let mut map = in_flight.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    let gate = map.entry(key.clone()).or_insert_with(|| Arc::new(Mutex::new(()))).clone();
    InFlightGuard { in_flight, key, gate }
  }
}

impl Drop for InFlightGuard<'_> {
  fn drop(&mut self) {
    let mut map = self.in_flight.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
    // 맵 + 자기 자신 외에 참조가 없으면 대기자가 없다
    let idle = map
      .get(&self.key)
      .map(|gate| Arc::ptr_eq(gate, &self.gate) && Arc::strong_count(gate) == 2)
      .unwrap_or(false);
    if idle {
      map.remove(&self.key);
    }
  }
}

#[derive(Debug)]
pub struct FeatureService {
  store: Arc<FeatureStore>,
  suite: IndicatorSuite,
  validator: DataValidator,
  in_flight: InFlight,
}

impl FeatureService {
  pub fn new(store: Arc<FeatureStore>, suite: IndicatorSuite, validator: DataValidator) -> Self {
    FeatureService {
      store,
      suite,
      validator,
      in_flight: StdMutex::new(HashMap::new()),
    }
  }

  pub fn from_config(config: &Config, backend: Arc<dyn KeyValueStore>) -> Result<Self, IndicatorError> {
    let store = Arc::new(FeatureStore::new(backend, config.feature_store.clone()));
    let suite = IndicatorSuite::from_config(config)?;
    let validator = DataValidator::from_config(&config.validation);
    Ok(FeatureService::new(store, suite, validator))
  }

  pub fn store(&self) -> &Arc<FeatureStore> {
    &self.store
  }

  pub fn suite(&self) -> &IndicatorSuite {
    &self.suite
  }

  /// 저장소 조회 후 미스면 `data[..=index]` 로 계산해서 저장
  pub async fn get_features(
    &self,
    symbol: &str,
    data: &[MarketDataPoint],
    index: usize,
  ) -> Result<FeatureVector, IndicatorError> {
    let point = data.get(index).ok_or_else(|| {
      IndicatorError::InvalidParameter(format!("index {} out of range for {} points", index, data.len()))
    })?;

    if let Some(vector) = self.lookup(symbol, point.timestamp).await {
      return Ok(vector);
    }

    // 같은 키의 동시 미스는 한 번만 계산. 취소되어도 가드가 맵을 정리한다
    let key = self.store.key(symbol, point.timestamp);
    let entry = InFlightGuard::enter(&self.in_flight, key.clone());
    let _held = entry.gate.lock().await;

    if let Some(vector) = self.lookup(symbol, point.timestamp).await {
      return Ok(vector);
    }

    let computed = self.compute_vector(symbol, &data[..=index]);
    if let Ok(vector) = &computed {
      if let Err(e) = self.store.set(vector).await {
        logging::log_error(&format!("피처 저장 실패 {}", key), &e);
      }
    }

    computed
  }

  /// 원격 실패는 미스로 처리
  async fn lookup(&self, symbol: &str, timestamp: i64) -> Option<FeatureVector> {
    match self.store.get(symbol, timestamp).await {
      Ok(vector) => vector,
      Err(e) if e.is_recoverable() => {
        log::debug!("피처 조회 실패, 재계산: {}", e);
        None
      }
      Err(e) => {
        logging::log_error(&format!("피처 조회 {}@{}", symbol, timestamp), &e);
        None
      }
    }
  }

  /// `[start, end]` 구간을 동시에 조회. 실패한 인덱스는 결과에서 빠진다
  pub async fn get_features_range(
    &self,
    symbol: &str,
    data: &[MarketDataPoint],
    start: usize,
    end: usize,
  ) -> BTreeMap<usize, FeatureVector> {
    if data.is_empty() || start > end {
      return BTreeMap::new();
    }
    let end = end.min(data.len() - 1);

    let lookups = (start..=end).map(|index| async move { (index, self.get_features(symbol, data, index).await) });

    let mut features = BTreeMap::new();
    for (index, result) in join_all(lookups).await {
      match result {
        Ok(vector) => {
          features.insert(index, vector);
        }
        Err(e) => log::debug!("{} [{}] 피처 없음: {}", symbol, index, e),
      }
    }

    log::info!("{} 피처 구간 {}..={}: {}건", symbol, start, end, features.len());
    features
  }

  /// 여러 (심볼, 인덱스) 를 mget / mset 한 번씩으로 처리
  pub async fn get_features_batch(
    &self,
    series: &HashMap<String, Vec<MarketDataPoint>>,
    lookups: &[FeatureLookup],
  ) -> BatchFeatures {
    let mut batch = BatchFeatures::default();
    let mut resolved = Vec::with_capacity(lookups.len());

    for lookup in lookups {
      match series.get(&lookup.symbol).and_then(|data| data.get(lookup.index)) {
        Some(point) => resolved.push((lookup, FeatureRequest::new(lookup.symbol.clone(), point.timestamp))),
        None => batch.failed.push((
          lookup.clone(),
          IndicatorError::InvalidParameter(format!("no data point {} for {}", lookup.index, lookup.symbol)),
        )),
      }
    }

    let requests: Vec<FeatureRequest> = resolved.iter().map(|(_, request)| request.clone()).collect();
    let cached = self.store.get_batch(&requests).await;

    let mut computed = Vec::new();
    for (lookup, request) in resolved {
      if let Some(vector) = cached.cached.get(&request) {
        batch.features.insert(lookup.clone(), vector.clone());
        batch.cached_count += 1;
        continue;
      }

      // resolved 단계에서 존재를 확인했으므로 시계열은 반드시 있다
      let data = match series.get(&lookup.symbol) {
        Some(data) => data,
        None => continue,
      };

      match self.compute_vector(&lookup.symbol, &data[..=lookup.index]) {
        Ok(vector) => {
          computed.push(vector.clone());
          batch.features.insert(lookup.clone(), vector);
          batch.computed_count += 1;
        }
        Err(e) => batch.failed.push((lookup.clone(), e)),
      }
    }

    if !computed.is_empty() {
      for failure in self.store.set_batch(&computed).await {
        logging::log_error(
          &format!("피처 배치 저장 실패 {}@{}", failure.request.symbol, failure.request.timestamp),
          &failure.error,
        );
      }
    }

    batch
  }

  /// 마지막 포인트 기준 피처 벡터 계산
  pub fn compute_vector(&self, symbol: &str, window: &[MarketDataPoint]) -> Result<FeatureVector, IndicatorError> {
    let required = self.suite.min_data_points();
    let last = window
      .last()
      .ok_or(IndicatorError::InsufficientData { required, actual: 0 })?;

    let report = self.validator.validate(window, required);
    if let Some(error) = report.to_error() {
      return Err(error);
    }

    let indicators = self.suite.snapshot(window);
    if indicators.is_empty() {
      return Err(IndicatorError::InsufficientData { required, actual: window.len() });
    }

    let confidence = (report.quality_score * indicators.coverage()).max(0.0).min(1.0);

    Ok(FeatureVector {
      symbol: symbol.to_string(),
      timestamp: last.timestamp,
      patterns: self.suite.patterns(&indicators, last.close),
      indicators,
      metadata: FeatureMetadata {
        version: self.store.config().schema_version,
        computed_at: utils::current_timestamp_ms(),
        data_points_used: window.len(),
        confidence,
        data_quality: report.quality_score,
      },
    })
  }

  pub async fn invalidate_symbol(&self, symbol: &str) -> Result<usize, IndicatorError> {
    self.store.invalidate_symbol(symbol).await
  }

  pub async fn health_check(&self) -> HealthReport {
    self.store.health_check().await
  }

  pub fn stats(&self) -> FeatureStoreStats {
    self.store.stats()
  }

  pub fn cache_stats(&self) -> Vec<(String, CacheStats)> {
    self.suite.cache_stats()
  }

  pub fn metrics(&self) -> Vec<(String, EngineMetrics)> {
    self.suite.metrics()
  }

  /// 지표 캐시 정리 작업 시작 (tokio 런타임 안에서 호출)
  pub fn start_maintenance(&self) {
    self.suite.start_maintenance();
  }

  pub fn shutdown(&self) {
    self.suite.shutdown();
    log::info!("피처 서비스 종료");
  }
}
