/**
* filename : base
* author : HAMA
* date: 2025. 6. 2.
* description: 검증 + 캐시 + 메트릭을 지표 계산에 두르는 엔진
**/

use std::mem::size_of;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use serde::{Deserialize, Serialize};

use crate::cache::{CacheCost, CacheManager, CacheStats};
use crate::config::CacheConfig;
use crate::error::IndicatorError;
use crate::models::market_data::MarketDataPoint;
use crate::utils::{self, logging, math};
use crate::validation::DataValidator;
use super::{
  cache_key, data_fingerprint, Indicator, IndicatorConfig, IndicatorOptions, IndicatorOutput,
  IndicatorParams, LevelCross,
};

/// 이 시간(ms)만큼 지난 입력은 신선도가 절반
const FRESHNESS_HALF_LIFE_MS: f64 = 300_000.0;

/// 실시간 경고 하나당 품질 감쇠 비율
const WARNING_DECAY: f64 = 0.9;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultMetadata {
  pub name: String,
  pub config: IndicatorConfig,
  pub min_data_points: usize,
  pub valid_from: usize,
  pub computation_time_ms: f64,
  pub cached: bool,
  pub data_quality: f64,
  pub timestamp: i64,
}

/// 배치 계산 결과. 입력 포인트 하나당 값 하나, valid_from 이전은 None
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorResult<T> {
  pub values: Vec<Option<T>>,
  pub validity: Vec<bool>,
  pub metadata: ResultMetadata,
  pub error: Option<IndicatorError>,
}

impl<T: IndicatorOutput> IndicatorResult<T> {
  fn failure(metadata: ResultMetadata, error: IndicatorError) -> Self {
    IndicatorResult {
      values: Vec::new(),
      validity: Vec::new(),
      metadata: ResultMetadata { data_quality: 0.0, ..metadata },
      error: Some(error),
    }
  }

  pub fn is_success(&self) -> bool {
    self.error.is_none()
  }

  /// 마지막 유효값
  pub fn latest(&self) -> Option<T> {
    self.values.iter().rev().find_map(|v| *v)
  }

  pub fn value_at(&self, index: usize) -> Option<T> {
    self.values.get(index).copied().flatten()
  }

  pub fn len(&self) -> usize {
    self.values.len()
  }

  pub fn is_empty(&self) -> bool {
    self.values.is_empty()
  }
}

impl<T: CacheCost> CacheCost for IndicatorResult<T> {
  fn approx_size(&self) -> usize {
    size_of::<Self>()
      + self.values.iter().map(|v| v.approx_size()).sum::<usize>()
      + self.validity.len()
      + self.metadata.name.len()
  }
}

/// 스트리밍 갱신 한 번의 결과
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorUpdate<T> {
  pub timestamp: i64,
  pub value: Option<T>,
  pub is_valid: bool,
  pub confidence: f64,
  pub change: Option<f64>,
  pub percent_change: Option<f64>,
  pub level_crosses: Vec<LevelCross>,
}

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct EngineMetrics {
  pub calls: u64,
  pub cache_hits: u64,
  pub cache_misses: u64,
  pub failures: u64,
  pub total_computation_ms: f64,
  pub last_computation_ms: f64,
  pub average_computation_ms: f64,
}

#[derive(Debug, Default)]
struct EngineCounters {
  calls: AtomicU64,
  cache_hits: AtomicU64,
  cache_misses: AtomicU64,
  failures: AtomicU64,
  computations: AtomicU64,
  total_us: AtomicU64,
  last_us: AtomicU64,
}

/// 전용 스트리밍 상태가 어디까지 소비했는지
#[derive(Debug)]
struct StreamTracker<T> {
  last_timestamp: Option<i64>,
  last_value: Option<T>,
  unsupported: bool,
}

impl<T> StreamTracker<T> {
  fn reset(&mut self) {
    self.last_timestamp = None;
    self.last_value = None;
  }
}

/// 업데이트 신뢰도: 품질 × 신선도 × 안정도, [0, 1]
///
/// 신선도는 입력 나이에 대해 단조 감소한다.
pub fn update_confidence(quality: f64, age_ms: i64, count: u64, min_points: usize, stable: bool) -> f64 {
  let freshness = 1.0 / (1.0 + age_ms.max(0) as f64 / FRESHNESS_HALF_LIFE_MS);
  let stability = if stable {
    1.0
  } else if min_points == 0 {
    0.5
  } else {
    0.5 * (count as f64 / min_points as f64).min(1.0)
  };

  let confidence = math::clamp(quality, 0.0, 1.0) * freshness * stability;
  if confidence.is_finite() {
    math::clamp(confidence, 0.0, 1.0)
  } else {
    0.0
  }
}

/// 지표 하나의 오케스트레이션 (검증 → 캐시 조회 → 계산 → 저장)
#[derive(Debug)]
pub struct IndicatorEngine<I: Indicator> {
  indicator: I,
  options: IndicatorOptions,
  validator: DataValidator,
  cache: Arc<CacheManager<IndicatorResult<I::Output>>>,
  counters: EngineCounters,
  stream: StreamTracker<I::Output>,
  last_quality: AtomicU64,
}

impl<I: Indicator> IndicatorEngine<I> {
  pub fn new(indicator: I, options: IndicatorOptions, cache_config: &CacheConfig) -> Result<Self, IndicatorError> {
    let cache_config = CacheConfig {
      enabled: cache_config.enabled && options.cache_enabled,
      default_ttl_ms: options.cache_ttl_ms,
      ..cache_config.clone()
    };
    let cache = CacheManager::new(cache_config)?;
    Ok(IndicatorEngine::with_cache(indicator, options, Arc::new(cache)))
  }

  /// 외부에서 만든 캐시를 공유
  pub fn with_cache(
    indicator: I,
    options: IndicatorOptions,
    cache: Arc<CacheManager<IndicatorResult<I::Output>>>,
  ) -> Self {
    IndicatorEngine {
      validator: DataValidator::new(options.strictness, options.outlier_method),
      indicator,
      options,
      cache,
      counters: EngineCounters::default(),
      stream: StreamTracker {
        last_timestamp: None,
        last_value: None,
        unsupported: false,
      },
      last_quality: AtomicU64::new(1.0_f64.to_bits()),
    }
  }

  pub fn name(&self) -> &str {
    self.indicator.name()
  }

  pub fn indicator(&self) -> &I {
    &self.indicator
  }

  pub fn options(&self) -> &IndicatorOptions {
    &self.options
  }

  pub fn min_data_points(&self) -> usize {
    self.indicator.min_data_points()
  }

  pub fn valid_from(&self) -> usize {
    self.min_data_points().saturating_sub(1)
  }

  pub fn cache(&self) -> &Arc<CacheManager<IndicatorResult<I::Output>>> {
    &self.cache
  }

  pub fn cache_stats(&self) -> CacheStats {
    self.cache.stats()
  }

  fn last_quality(&self) -> f64 {
    f64::from_bits(self.last_quality.load(Ordering::Relaxed))
  }

  fn metadata(&self, computation_time_ms: f64, cached: bool, data_quality: f64) -> ResultMetadata {
    ResultMetadata {
      name: self.indicator.name().to_string(),
      config: self.indicator.config().to_variant(),
      min_data_points: self.min_data_points(),
      valid_from: self.valid_from(),
      computation_time_ms,
      cached,
      data_quality,
      timestamp: utils::current_timestamp_ms(),
    }
  }

  fn fail(&self, error: IndicatorError) -> IndicatorResult<I::Output> {
    self.counters.failures.fetch_add(1, Ordering::Relaxed);
    log::warn!("지표 계산 실패 - {}: {}", self.indicator.name(), error);
    IndicatorResult::failure(self.metadata(0.0, false, 0.0), error)
  }

  /// 배치 계산. 실패도 오류 필드를 채운 결과로 반환한다.
  pub fn calculate(&self, data: &[MarketDataPoint]) -> IndicatorResult<I::Output> {
    self.counters.calls.fetch_add(1, Ordering::Relaxed);

    let min_points = self.min_data_points();
    let report = self.validator.validate(data, min_points);
    self.last_quality.store(report.quality_score.to_bits(), Ordering::Relaxed);

    if let Some(error) = report.to_error() {
      return self.fail(error);
    }

    let key = if self.options.cache_enabled && self.cache.is_enabled() {
      match cache_key(self.indicator.name(), &self.indicator.config().to_variant(), &data_fingerprint(data)) {
        Ok(key) => Some(key),
        Err(e) => {
          logging::log_error("캐시 키 생성", &e);
          None
        }
      }
    } else {
      None
    };

    if let Some(key) = key.as_deref() {
      if let Some(mut hit) = self.cache.get(key) {
        self.counters.cache_hits.fetch_add(1, Ordering::Relaxed);
        hit.metadata.cached = true;
        hit.metadata.timestamp = utils::current_timestamp_ms();
        logging::log_calculation(self.indicator.name(), data.len(), 0.0, true);
        return hit;
      }
      self.counters.cache_misses.fetch_add(1, Ordering::Relaxed);
    }

    let started = Instant::now();
    let mut values = match self.indicator.compute(data) {
      Ok(values) => values,
      Err(e) => return self.fail(e),
    };

    if values.len() != data.len() {
      return self.fail(IndicatorError::Calculation(format!(
        "{} produced {} values for {} points", self.indicator.name(), values.len(), data.len()
      )));
    }
    if let Some(index) = values.iter().position(|v| v.map(|v| !v.is_finite()).unwrap_or(false)) {
      return self.fail(IndicatorError::Calculation(format!(
        "{} produced a non-finite value at index {}", self.indicator.name(), index
      )));
    }

    let valid_from = self.valid_from();
    for value in values.iter_mut().take(valid_from) {
      *value = None;
    }
    let validity = values.iter()
      .enumerate()
      .map(|(i, v)| i >= valid_from && v.is_some())
      .collect();

    let elapsed_us = started.elapsed().as_micros() as u64;
    self.counters.computations.fetch_add(1, Ordering::Relaxed);
    self.counters.total_us.fetch_add(elapsed_us, Ordering::Relaxed);
    self.counters.last_us.store(elapsed_us, Ordering::Relaxed);

    let elapsed_ms = elapsed_us as f64 / 1000.0;
    let result = IndicatorResult {
      values,
      validity,
      metadata: self.metadata(elapsed_ms, false, report.quality_score),
      error: None,
    };
    logging::log_calculation(self.indicator.name(), data.len(), elapsed_ms, false);

    if let Some(key) = key.as_deref() {
      if let Err(e) = self.cache.set_with_ttl(key, result.clone(), self.options.cache_ttl_ms) {
        log::warn!("지표 결과 캐시 저장 실패 - {}: {}", self.indicator.name(), e);
      }
    }

    result
  }

  /// 전용 스트리밍 상태로 한 포인트 진행. 지원하지 않으면 None
  fn stream_step(
    &mut self,
    point: &MarketDataPoint,
    existing: &[MarketDataPoint],
  ) -> Option<(Option<I::Output>, Option<I::Output>, bool, u64)> {
    if self.stream.unsupported {
      return None;
    }

    let expected_tail = existing.last().map(|p| p.timestamp);
    if self.stream.last_timestamp != expected_tail {
      // 기존 데이터가 상태가 멈춘 지점에서 끝나지 않으면 처음부터 재생
      self.indicator.stream_reset();
      self.stream.reset();

      for p in existing {
        match self.indicator.stream_update(p) {
          Some(step) => {
            self.stream.last_timestamp = Some(p.timestamp);
            self.stream.last_value = step.value;
          }
          None => {
            self.stream.unsupported = true;
            return None;
          }
        }
      }
    }

    let previous = self.stream.last_value;
    match self.indicator.stream_update(point) {
      Some(step) => {
        self.stream.last_timestamp = Some(point.timestamp);
        self.stream.last_value = step.value;
        Some((previous, step.value, step.state.is_stable, step.state.count))
      }
      None => {
        self.stream.unsupported = true;
        None
      }
    }
  }

  /// 새 포인트 하나를 반영한 갱신 결과
  pub fn update(
    &mut self,
    point: &MarketDataPoint,
    existing: &[MarketDataPoint],
  ) -> Result<IndicatorUpdate<I::Output>, IndicatorError> {
    let check = self.validator.validate_point(point, existing.last());
    if !check.is_valid {
      return Err(IndicatorError::Validation(check.errors));
    }

    let min_points = self.min_data_points();
    let streamed = if self.options.streaming_enabled {
      self.stream_step(point, existing)
    } else {
      None
    };

    let (previous, current, stable, count) = match streamed {
      Some(step) => step,
      None => {
        let mut combined = Vec::with_capacity(existing.len() + 1);
        combined.extend_from_slice(existing);
        combined.push(*point);

        let values = self.indicator.compute(&combined)?;
        let n = values.len();
        let current = values.last().copied().flatten();
        let previous = if n >= 2 { values[n - 2] } else { None };
        (previous, current, n >= min_points, n as u64)
      }
    };

    if let Some(value) = current {
      if !value.is_finite() {
        return Err(IndicatorError::Calculation(format!(
          "{} produced a non-finite streaming value", self.indicator.name()
        )));
      }
    }

    let (change, percent_change, level_crosses) = match (previous, current) {
      (Some(prev), Some(curr)) => (
        Some(curr.primary() - prev.primary()),
        math::percent_change(prev.primary(), curr.primary()),
        <I::Output as IndicatorOutput>::level_crosses(&prev, &curr),
      ),
      _ => (None, None, Vec::new()),
    };

    let quality = self.last_quality() * WARNING_DECAY.powi(check.warnings.len() as i32);
    let age = utils::age_ms(point.timestamp, utils::current_timestamp_ms());

    Ok(IndicatorUpdate {
      timestamp: point.timestamp,
      value: current,
      is_valid: stable && current.is_some(),
      confidence: update_confidence(quality, age, count, min_points, stable),
      change,
      percent_change,
      level_crosses,
    })
  }

  /// 설정 교체. 이전 설정의 캐시 항목은 키가 달라져 더 이상 조회되지 않는다.
  pub fn set_config(&mut self, config: I::Config) -> Result<(), IndicatorError> {
    config.validate()?;
    self.indicator.set_config(config)?;
    self.reset();
    Ok(())
  }

  pub fn set_options(&mut self, options: IndicatorOptions) {
    self.validator = DataValidator::new(options.strictness, options.outlier_method);
    self.options = options;
    self.reset();
  }

  /// 스트리밍 상태 초기화
  pub fn reset(&mut self) {
    self.indicator.stream_reset();
    self.stream.reset();
    self.stream.unsupported = false;
  }

  pub fn metrics(&self) -> EngineMetrics {
    let computations = self.counters.computations.load(Ordering::Relaxed);
    let total_ms = self.counters.total_us.load(Ordering::Relaxed) as f64 / 1000.0;

    EngineMetrics {
      calls: self.counters.calls.load(Ordering::Relaxed),
      cache_hits: self.counters.cache_hits.load(Ordering::Relaxed),
      cache_misses: self.counters.cache_misses.load(Ordering::Relaxed),
      failures: self.counters.failures.load(Ordering::Relaxed),
      total_computation_ms: total_ms,
      last_computation_ms: self.counters.last_us.load(Ordering::Relaxed) as f64 / 1000.0,
      average_computation_ms: if computations == 0 { 0.0 } else { total_ms / computations as f64 },
    }
  }
}
