/**
* filename : params
* author : HAMA
* date: 2025. 6. 2.
* description: 지표별 설정 (태그 union) 및 공통 옵션
**/

use serde::{Deserialize, Serialize};

use crate::error::IndicatorError;
use crate::models::market_data::PriceSource;
use crate::validation::{OutlierMethod, Strictness};
use super::IndicatorParams;

fn require_period(name: &str, value: usize) -> Result<(), IndicatorError> {
  if value == 0 {
    return Err(IndicatorError::Config(format!("{} must be at least 1", name)));
  }
  Ok(())
}

fn require_thresholds(oversold: f64, overbought: f64) -> Result<(), IndicatorError> {
  if !(0.0..=100.0).contains(&oversold) || !(0.0..=100.0).contains(&overbought) {
    return Err(IndicatorError::Config(format!(
      "Thresholds must lie in [0, 100], got oversold={} overbought={}", oversold, overbought
    )));
  }
  if oversold >= overbought {
    return Err(IndicatorError::Config(format!(
      "Oversold threshold {} must be below overbought threshold {}", oversold, overbought
    )));
  }
  Ok(())
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SmaConfig {
  pub period: usize,
  pub source: PriceSource,
}

impl Default for SmaConfig {
  fn default() -> Self {
    SmaConfig { period: 20, source: PriceSource::Close }
  }
}

impl IndicatorParams for SmaConfig {
  fn validate(&self) -> Result<(), IndicatorError> {
    require_period("SMA period", self.period)
  }

  fn to_variant(&self) -> IndicatorConfig {
    IndicatorConfig::Sma(self.clone())
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmaConfig {
  pub period: usize,
  /// 없으면 2 / (period + 1)
  pub alpha: Option<f64>,
  pub source: PriceSource,
}

impl Default for EmaConfig {
  fn default() -> Self {
    EmaConfig { period: 20, alpha: None, source: PriceSource::Close }
  }
}

impl EmaConfig {
  pub fn new(period: usize) -> Self {
    EmaConfig { period, ..EmaConfig::default() }
  }

  pub fn smoothing_factor(&self) -> f64 {
    self.alpha.unwrap_or(2.0 / (self.period as f64 + 1.0))
  }
}

impl IndicatorParams for EmaConfig {
  fn validate(&self) -> Result<(), IndicatorError> {
    require_period("EMA period", self.period)?;
    if let Some(alpha) = self.alpha {
      if !(alpha > 0.0 && alpha <= 1.0) {
        return Err(IndicatorError::Config(format!("EMA alpha must be in (0, 1], got {}", alpha)));
      }
    }
    Ok(())
  }

  fn to_variant(&self) -> IndicatorConfig {
    IndicatorConfig::Ema(self.clone())
  }
}

/// RSI 평균 상승/하락폭 평활 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RsiSmoothing {
  #[default]
  Wilder,
  Ema,
  Sma,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RsiConfig {
  pub period: usize,
  pub smoothing: RsiSmoothing,
  pub overbought: f64,
  pub oversold: f64,
  pub source: PriceSource,
}

impl Default for RsiConfig {
  fn default() -> Self {
    RsiConfig {
      period: 14,
      smoothing: RsiSmoothing::Wilder,
      overbought: 70.0,
      oversold: 30.0,
      source: PriceSource::Close,
    }
  }
}

impl RsiConfig {
  pub fn new(period: usize) -> Self {
    RsiConfig { period, ..RsiConfig::default() }
  }
}

impl IndicatorParams for RsiConfig {
  fn validate(&self) -> Result<(), IndicatorError> {
    require_period("RSI period", self.period)?;
    require_thresholds(self.oversold, self.overbought)
  }

  fn to_variant(&self) -> IndicatorConfig {
    IndicatorConfig::Rsi(self.clone())
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MacdConfig {
  pub fast_period: usize,
  pub slow_period: usize,
  pub signal_period: usize,
  pub source: PriceSource,
  /// 교차로 인정할 최소 히스토그램 변화량
  pub crossover_threshold: f64,
}

impl Default for MacdConfig {
  fn default() -> Self {
    MacdConfig {
      fast_period: 12,
      slow_period: 26,
      signal_period: 9,
      source: PriceSource::Close,
      crossover_threshold: 0.0,
    }
  }
}

impl MacdConfig {
  pub fn new(fast_period: usize, slow_period: usize, signal_period: usize) -> Self {
    MacdConfig { fast_period, slow_period, signal_period, ..MacdConfig::default() }
  }
}

impl IndicatorParams for MacdConfig {
  fn validate(&self) -> Result<(), IndicatorError> {
    require_period("MACD fast period", self.fast_period)?;
    require_period("MACD slow period", self.slow_period)?;
    require_period("MACD signal period", self.signal_period)?;
    if self.fast_period >= self.slow_period {
      return Err(IndicatorError::Config(format!(
        "MACD fast period {} must be below slow period {}", self.fast_period, self.slow_period
      )));
    }
    if !(self.crossover_threshold >= 0.0) {
      return Err(IndicatorError::Config("MACD crossover threshold must be non-negative".to_string()));
    }
    Ok(())
  }

  fn to_variant(&self) -> IndicatorConfig {
    IndicatorConfig::Macd(self.clone())
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BollingerConfig {
  pub period: usize,
  pub standard_deviations: f64,
  pub source: PriceSource,
  /// 이 값보다 좁은 밴드폭은 스퀴즈로 본다
  pub squeeze_bandwidth: f64,
}

impl Default for BollingerConfig {
  fn default() -> Self {
    BollingerConfig {
      period: 20,
      standard_deviations: 2.0,
      source: PriceSource::Close,
      squeeze_bandwidth: 0.02,
    }
  }
}

impl BollingerConfig {
  pub fn new(period: usize, standard_deviations: f64) -> Self {
    BollingerConfig { period, standard_deviations, ..BollingerConfig::default() }
  }
}

impl IndicatorParams for BollingerConfig {
  fn validate(&self) -> Result<(), IndicatorError> {
    require_period("Bollinger period", self.period)?;
    if !(self.standard_deviations.is_finite() && self.standard_deviations > 0.0) {
      return Err(IndicatorError::Config(format!(
        "Bollinger standard deviations must be positive, got {}", self.standard_deviations
      )));
    }
    Ok(())
  }

  fn to_variant(&self) -> IndicatorConfig {
    IndicatorConfig::Bollinger(self.clone())
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StochasticConfig {
  pub period: usize,
  pub k_smoothing: usize,
  pub d_smoothing: usize,
  pub overbought: f64,
  pub oversold: f64,
}

impl Default for StochasticConfig {
  fn default() -> Self {
    StochasticConfig {
      period: 14,
      k_smoothing: 3,
      d_smoothing: 3,
      overbought: 80.0,
      oversold: 20.0,
    }
  }
}

impl StochasticConfig {
  pub fn new(period: usize, k_smoothing: usize, d_smoothing: usize) -> Self {
    StochasticConfig { period, k_smoothing, d_smoothing, ..StochasticConfig::default() }
  }
}

impl IndicatorParams for StochasticConfig {
  fn validate(&self) -> Result<(), IndicatorError> {
    require_period("Stochastic period", self.period)?;
    require_period("Stochastic %K smoothing", self.k_smoothing)?;
    require_period("Stochastic %D smoothing", self.d_smoothing)?;
    require_thresholds(self.oversold, self.overbought)
  }

  fn to_variant(&self) -> IndicatorConfig {
    IndicatorConfig::Stochastic(self.clone())
  }
}

/// 지표 종류별 설정의 태그 union
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IndicatorConfig {
  Sma(SmaConfig),
  Ema(EmaConfig),
  Rsi(RsiConfig),
  Macd(MacdConfig),
  Bollinger(BollingerConfig),
  Stochastic(StochasticConfig),
}

impl IndicatorConfig {
  pub fn kind(&self) -> &'static str {
    match self {
      IndicatorConfig::Sma(_) => "sma",
      IndicatorConfig::Ema(_) => "ema",
      IndicatorConfig::Rsi(_) => "rsi",
      IndicatorConfig::Macd(_) => "macd",
      IndicatorConfig::Bollinger(_) => "bollinger",
      IndicatorConfig::Stochastic(_) => "stochastic",
    }
  }

  pub fn validate(&self) -> Result<(), IndicatorError> {
    match self {
      IndicatorConfig::Sma(c) => c.validate(),
      IndicatorConfig::Ema(c) => c.validate(),
      IndicatorConfig::Rsi(c) => c.validate(),
      IndicatorConfig::Macd(c) => c.validate(),
      IndicatorConfig::Bollinger(c) => c.validate(),
      IndicatorConfig::Stochastic(c) => c.validate(),
    }
  }
}

/// 모든 지표 인스턴스에 공통인 부가 옵션
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct IndicatorOptions {
  pub cache_enabled: bool,
  pub cache_ttl_ms: u64,
  pub strictness: Strictness,
  pub outlier_method: OutlierMethod,
  pub streaming_enabled: bool,
}

impl Default for IndicatorOptions {
  fn default() -> Self {
    IndicatorOptions {
      cache_enabled: true,
      cache_ttl_ms: 300_000,
      strictness: Strictness::Normal,
      outlier_method: OutlierMethod::Iqr,
      streaming_enabled: true,
    }
  }
}
