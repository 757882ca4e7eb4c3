/**
* filename : config
* author : HAMA
* date: 2025. 6. 2.
* description: 캐시 / 피처 저장소 / 검증 / 지표 설정
**/

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::IndicatorError;
use crate::indicators::{
  BollingerConfig, EmaConfig, IndicatorOptions, IndicatorParams, MacdConfig, RsiConfig, SmaConfig,
  StochasticConfig,
};
use crate::validation::{OutlierMethod, Strictness};

/// 환경변수 접두어 (`XFEATURE__CACHE__MAX_SIZE=500`)
pub const ENV_PREFIX: &str = "XFEATURE";

const MINUTE_MS: u64 = 60_000;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub cache: CacheConfig,
  #[serde(default)]
  pub feature_store: FeatureStoreConfig,
  #[serde(default)]
  pub validation: ValidationConfig,
  #[serde(default)]
  pub indicators: IndicatorsConfig,
  #[serde(default)]
  pub logging: LoggingConfig,
}

/// 프로세스 내 캐시 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
  pub max_size: usize,
  pub default_ttl_ms: u64,
  pub enabled: bool,
  pub cleanup_interval_ms: u64,
  pub memory_limit_bytes: usize,
}

impl Default for CacheConfig {
  fn default() -> Self {
    CacheConfig {
      max_size: 1000,
      default_ttl_ms: 300_000,
      enabled: true,
      cleanup_interval_ms: 60_000,
      memory_limit_bytes: 50 * 1024 * 1024,
    }
  }
}

impl CacheConfig {
  /// 0 용량이면 크기 상한을 지킬 수 없다
  pub fn validate(&self) -> Result<(), IndicatorError> {
    if self.max_size == 0 {
      return Err(IndicatorError::Config("cache.max_size must be at least 1".to_string()));
    }
    if self.memory_limit_bytes == 0 {
      return Err(IndicatorError::Config("cache.memory_limit_bytes must be positive".to_string()));
    }
    Ok(())
  }
}

/// 원격 피처 저장소 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureStoreConfig {
  pub namespace: String,
  pub feature_type: String,
  pub schema_version: u32,
  /// 데이터 나이가 이 값 이하이면 recent 등급
  pub recent_max_age_ms: u64,
  pub recent_ttl_ms: u64,
  pub medium_max_age_ms: u64,
  pub medium_ttl_ms: u64,
  pub historical_ttl_ms: u64,
  /// 이 시간 안의 데이터는 계산 시각도 확인
  pub freshness_window_ms: i64,
  pub max_computed_age_ms: i64,
  pub health_check_timeout_ms: u64,
  pub degraded_latency_ms: u64,
}

impl Default for FeatureStoreConfig {
  fn default() -> Self {
    FeatureStoreConfig {
      namespace: "xfeature".to_string(),
      feature_type: "vector".to_string(),
      schema_version: 1,
      recent_max_age_ms: 15 * MINUTE_MS,
      recent_ttl_ms: 5 * MINUTE_MS,
      medium_max_age_ms: 60 * MINUTE_MS,
      medium_ttl_ms: 30 * MINUTE_MS,
      historical_ttl_ms: 24 * 60 * MINUTE_MS,
      freshness_window_ms: 5 * MINUTE_MS as i64,
      max_computed_age_ms: 60 * MINUTE_MS as i64,
      health_check_timeout_ms: 2000,
      degraded_latency_ms: 250,
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
  pub strictness: Strictness,
  pub outlier_method: OutlierMethod,
}

/// 지표별 기본 파라미터와 공통 옵션
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorsConfig {
  pub sma: SmaConfig,
  pub ema: EmaConfig,
  pub rsi: RsiConfig,
  pub macd: MacdConfig,
  pub bollinger: BollingerConfig,
  pub stochastic: StochasticConfig,
  pub cache_enabled: bool,
  pub cache_ttl_ms: u64,
  pub streaming_enabled: bool,
}

impl Default for IndicatorsConfig {
  fn default() -> Self {
    IndicatorsConfig {
      sma: SmaConfig::default(),
      ema: EmaConfig::default(),
      rsi: RsiConfig::default(),
      macd: MacdConfig::default(),
      bollinger: BollingerConfig::default(),
      stochastic: StochasticConfig::default(),
      cache_enabled: true,
      cache_ttl_ms: 300_000,
      streaming_enabled: true,
    }
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
  pub level: String,
}

impl Default for LoggingConfig {
  fn default() -> Self {
    LoggingConfig { level: "info".to_string() }
  }
}

impl Config {
  /// 작업 디렉터리의 `config.{toml,json,yaml}` (선택) + `XFEATURE__*` 환경변수
  pub fn load() -> Result<Self, IndicatorError> {
    let settings = ::config::Config::builder()
      .add_source(::config::File::with_name("config").required(false))
      .add_source(env_source())
      .build()?;

    let config: Config = settings.try_deserialize()?;
    config.validate()?;
    Ok(config)
  }

  /// 지정한 파일에서 로드 (형식은 확장자로 판단), 환경변수가 우선
  pub fn from_file(path: impl AsRef<Path>) -> Result<Self, IndicatorError> {
    let settings = ::config::Config::builder()
      .add_source(::config::File::from(path.as_ref()))
      .add_source(env_source())
      .build()?;

    let config: Config = settings.try_deserialize()?;
    config.validate()?;
    Ok(config)
  }

  pub fn validate(&self) -> Result<(), IndicatorError> {
    self.cache.validate()?;
    if self.cache.default_ttl_ms == 0 || self.indicators.cache_ttl_ms == 0 {
      return Err(IndicatorError::Config("cache TTL must be positive".to_string()));
    }

    let store = &self.feature_store;
    if store.namespace.is_empty() || store.feature_type.is_empty() {
      return Err(IndicatorError::Config("feature_store namespace and type must be set".to_string()));
    }
    if store.schema_version == 0 {
      return Err(IndicatorError::Config("feature_store.schema_version must be at least 1".to_string()));
    }
    if store.recent_max_age_ms > store.medium_max_age_ms {
      return Err(IndicatorError::Config(
        "feature_store.recent_max_age_ms must not exceed medium_max_age_ms".to_string()
      ));
    }
    if store.recent_ttl_ms == 0 || store.medium_ttl_ms == 0 || store.historical_ttl_ms == 0 {
      return Err(IndicatorError::Config("feature_store TTL tiers must be positive".to_string()));
    }

    self.indicators.sma.validate()?;
    self.indicators.ema.validate()?;
    self.indicators.rsi.validate()?;
    self.indicators.macd.validate()?;
    self.indicators.bollinger.validate()?;
    self.indicators.stochastic.validate()?;

    Ok(())
  }

  /// 모든 지표 인스턴스에 공통으로 적용할 옵션
  pub fn indicator_options(&self) -> IndicatorOptions {
    IndicatorOptions {
      cache_enabled: self.indicators.cache_enabled && self.cache.enabled,
      cache_ttl_ms: self.indicators.cache_ttl_ms,
      strictness: self.validation.strictness,
      outlier_method: self.validation.outlier_method,
      streaming_enabled: self.indicators.streaming_enabled,
    }
  }
}

fn env_source() -> ::config::Environment {
  ::config::Environment::with_prefix(ENV_PREFIX)
    .prefix_separator("__")
    .separator("__")
    .try_parsing(true)
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::fs;
  use uuid::Uuid;

  #[test]
  fn test_defaults_validate() {
    let config = Config::default();
    assert!(config.validate().is_ok());
    assert_eq!(config.cache.memory_limit_bytes, 52_428_800);
    assert_eq!(config.feature_store.schema_version, 1);
  }

  #[test]
  fn test_zero_cache_size_rejected() {
    let mut config = Config::default();
    config.cache.max_size = 0;
    assert!(matches!(config.validate(), Err(IndicatorError::Config(_))));
  }

  #[test]
  fn test_invalid_indicator_rejected() {
    let mut config = Config::default();
    config.indicators.macd = MacdConfig::new(30, 26, 9);
    assert!(matches!(config.validate(), Err(IndicatorError::Config(_))));
  }

  #[test]
  fn test_from_file_partial_sections() {
    let path = std::env::temp_dir().join(format!("xfeature-{}.json", Uuid::new_v4()));
    fs::write(&path, r#"{
      "cache": { "max_size": 42 },
      "validation": { "strictness": "strict" },
      "indicators": { "rsi": { "period": 7 } }
    }"#).unwrap();

    let config = Config::from_file(&path);
    let _ = fs::remove_file(&path);
    let config = config.unwrap();

    assert_eq!(config.cache.max_size, 42);
    assert_eq!(config.cache.default_ttl_ms, 300_000);
    assert_eq!(config.validation.strictness, Strictness::Strict);
    assert_eq!(config.indicators.rsi.period, 7);
    assert_eq!(config.indicators.rsi.overbought, 70.0);
    assert_eq!(config.feature_store.namespace, "xfeature");
  }

  #[test]
  fn test_indicator_options_follow_cache_switch() {
    let mut config = Config::default();
    config.cache.enabled = false;
    let options = config.indicator_options();
    assert!(!options.cache_enabled);
    assert_eq!(options.strictness, Strictness::Normal);
  }
}
