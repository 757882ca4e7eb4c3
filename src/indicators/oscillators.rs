/**
* filename : oscillators
* author : HAMA
* date: 2025. 6. 2.
* description: RSI / Stochastic
**/

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::cache::CacheCost;
use crate::error::IndicatorError;
use crate::models::market_data::MarketDataPoint;
use crate::utils::math;
use super::{
  CrossDirection, Indicator, IndicatorOutput, IndicatorParams, LevelCross, RsiConfig, RsiSmoothing,
  StochasticConfig, StreamStep, StreamingState, Zone,
};

/// 다이버전스 판정에 쓰는 최근 구간 길이
pub const DIVERGENCE_WINDOW: usize = 10;
/// 정규화된 기울기가 이 값을 넘어 서로 반대일 때 다이버전스로 본다
pub const DIVERGENCE_THRESHOLD: f64 = 0.001;

fn rsi_from_averages(avg_gain: f64, avg_loss: f64) -> f64 {
  if avg_loss == 0.0 {
    return 100.0;
  }

  // RS = 평균 상승폭 / 평균 하락폭
  let rs = avg_gain / avg_loss;
  100.0 - (100.0 / (1.0 + rs))
}

fn smooth(previous: f64, current: f64, period: usize, smoothing: RsiSmoothing) -> f64 {
  let p = period as f64;
  match smoothing {
    RsiSmoothing::Wilder => (previous * (p - 1.0) + current) / p,
    RsiSmoothing::Ema => {
      let alpha = 2.0 / (p + 1.0);
      current * alpha + previous * (1.0 - alpha)
    }
    // SMA 방식은 호출하는 쪽에서 창 평균으로 처리
    RsiSmoothing::Sma => previous,
  }
}

/// RSI 배치 계산 (앞쪽 period 개는 None)
pub fn rsi(values: &[f64], period: usize, smoothing: RsiSmoothing) -> Result<Vec<Option<f64>>, IndicatorError> {
  if values.is_empty() {
    return Err(IndicatorError::Calculation("RSI requires at least one value".to_string()));
  }
  if period == 0 {
    return Err(IndicatorError::InvalidParameter("RSI period must be at least 1".to_string()));
  }

  let mut out = vec![None; values.len()];
  if values.len() <= period {
    return Ok(out);
  }

  // gains[i] / losses[i] 는 i-1 -> i 변화
  let mut gains = vec![0.0; values.len()];
  let mut losses = vec![0.0; values.len()];
  for i in 1..values.len() {
    let change = values[i] - values[i - 1];
    gains[i] = if change > 0.0 { change } else { 0.0 };
    losses[i] = if change < 0.0 { -change } else { 0.0 };
  }

  let mut avg_gain = gains[1..=period].iter().sum::<f64>() / period as f64;
  let mut avg_loss = losses[1..=period].iter().sum::<f64>() / period as f64;
  out[period] = Some(rsi_from_averages(avg_gain, avg_loss));

  for i in (period + 1)..values.len() {
    match smoothing {
      RsiSmoothing::Sma => {
        avg_gain = gains[i + 1 - period..=i].iter().sum::<f64>() / period as f64;
        avg_loss = losses[i + 1 - period..=i].iter().sum::<f64>() / period as f64;
      }
      _ => {
        avg_gain = smooth(avg_gain, gains[i], period, smoothing);
        avg_loss = smooth(avg_loss, losses[i], period, smoothing);
      }
    }
    out[i] = Some(rsi_from_averages(avg_gain, avg_loss));
  }

  Ok(out)
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RsiValue {
  pub value: f64,
  pub zone: Zone,
}

impl CacheCost for RsiValue {}

impl IndicatorOutput for RsiValue {
  fn primary(&self) -> f64 {
    self.value
  }

  fn level_crosses(previous: &Self, current: &Self) -> Vec<LevelCross> {
    if previous.zone != current.zone {
      vec![LevelCross::Zone { from: previous.zone, to: current.zone }]
    } else {
      Vec::new()
    }
  }
}

/// O(1) 스트리밍 RSI
#[derive(Debug, Clone)]
pub struct StreamingRsi {
  period: usize,
  smoothing: RsiSmoothing,
  prev_price: Option<f64>,
  changes: u64,
  count: u64,
  seed_gain: f64,
  seed_loss: f64,
  avg_gain: f64,
  avg_loss: f64,
  // SMA 평활용 최근 period 개의 (상승, 하락)
  window: VecDeque<(f64, f64)>,
}

impl StreamingRsi {
  pub fn new(period: usize, smoothing: RsiSmoothing) -> Self {
    StreamingRsi {
      period,
      smoothing,
      prev_price: None,
      changes: 0,
      count: 0,
      seed_gain: 0.0,
      seed_loss: 0.0,
      avg_gain: 0.0,
      avg_loss: 0.0,
      window: VecDeque::with_capacity(period + 1),
    }
  }

  pub fn update(&mut self, price: f64) -> Option<f64> {
    self.count += 1;

    let prev_price = match self.prev_price.replace(price) {
      Some(p) => p,
      None => return None,
    };

    let change = price - prev_price;
    let gain = if change > 0.0 { change } else { 0.0 };
    let loss = if change < 0.0 { -change } else { 0.0 };
    self.changes += 1;

    if self.smoothing == RsiSmoothing::Sma {
      self.window.push_back((gain, loss));
      if self.window.len() > self.period {
        self.window.pop_front();
      }
    }

    let period = self.period as u64;
    if self.changes < period {
      self.seed_gain += gain;
      self.seed_loss += loss;
      return None;
    }

    if self.changes == period {
      self.seed_gain += gain;
      self.seed_loss += loss;
      self.avg_gain = self.seed_gain / self.period as f64;
      self.avg_loss = self.seed_loss / self.period as f64;
    } else if self.smoothing == RsiSmoothing::Sma {
      self.avg_gain = self.window.iter().map(|(g, _)| *g).sum::<f64>() / self.period as f64;
      self.avg_loss = self.window.iter().map(|(_, l)| *l).sum::<f64>() / self.period as f64;
    } else {
      self.avg_gain = smooth(self.avg_gain, gain, self.period, self.smoothing);
      self.avg_loss = smooth(self.avg_loss, loss, self.period, self.smoothing);
    }

    Some(rsi_from_averages(self.avg_gain, self.avg_loss))
  }

  pub fn is_stable(&self) -> bool {
    self.changes >= self.period as u64
  }

  pub fn state(&self) -> StreamingState {
    StreamingState { count: self.count, is_stable: self.is_stable() }
  }

  pub fn reset(&mut self) {
    *self = StreamingRsi::new(self.period, self.smoothing);
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DivergenceKind {
  /// 가격은 하락, RSI 는 상승
  Bullish,
  /// 가격은 상승, RSI 는 하락
  Bearish,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Divergence {
  pub kind: DivergenceKind,
  pub price_slope: f64,
  pub rsi_slope: f64,
  pub strength: f64,
}

/// 최근 구간의 가격 기울기와 RSI 기울기를 비교하여 다이버전스 감지
pub fn detect_divergence(prices: &[f64], rsi_values: &[Option<f64>]) -> Option<Divergence> {
  let pairs: Vec<(f64, f64)> = prices.iter()
    .zip(rsi_values.iter())
    .filter_map(|(p, r)| r.map(|r| (*p, r)))
    .collect();

  if pairs.len() < DIVERGENCE_WINDOW {
    return None;
  }

  let recent = &pairs[pairs.len() - DIVERGENCE_WINDOW..];
  let recent_prices: Vec<f64> = recent.iter().map(|(p, _)| *p).collect();
  let recent_rsi: Vec<f64> = recent.iter().map(|(_, r)| *r).collect();

  let mean_price = math::average(&recent_prices)?;
  if mean_price == 0.0 {
    return None;
  }

  // 가격은 평균 대비, RSI 는 0~100 척도 대비로 정규화
  let price_slope = math::linear_regression_slope(&recent_prices)? / mean_price.abs();
  let rsi_slope = math::linear_regression_slope(&recent_rsi)? / 100.0;

  let kind = if price_slope < -DIVERGENCE_THRESHOLD && rsi_slope > DIVERGENCE_THRESHOLD {
    DivergenceKind::Bullish
  } else if price_slope > DIVERGENCE_THRESHOLD && rsi_slope < -DIVERGENCE_THRESHOLD {
    DivergenceKind::Bearish
  } else {
    return None;
  };

  let strength = math::clamp((price_slope.abs() + rsi_slope.abs()) * 10.0, 0.0, 1.0);

  Some(Divergence { kind, price_slope, rsi_slope, strength })
}

#[derive(Debug)]
pub struct RsiIndicator {
  name: String,
  config: RsiConfig,
  stream: StreamingRsi,
}

impl RsiIndicator {
  pub fn new(config: RsiConfig) -> Result<Self, IndicatorError> {
    config.validate()?;

    Ok(RsiIndicator {
      name: format!("RSI-{}", config.period),
      stream: StreamingRsi::new(config.period, config.smoothing),
      config,
    })
  }

  fn classify(&self, value: f64) -> RsiValue {
    RsiValue {
      value,
      zone: Zone::classify(value, self.config.oversold, self.config.overbought),
    }
  }

  /// 최근 구간의 가격/RSI 다이버전스
  pub fn divergence(&self, data: &[MarketDataPoint]) -> Result<Option<Divergence>, IndicatorError> {
    let prices = self.config.source.series(data);
    let values = rsi(&prices, self.config.period, self.config.smoothing)?;
    Ok(detect_divergence(&prices, &values))
  }
}

impl Indicator for RsiIndicator {
  type Config = RsiConfig;
  type Output = RsiValue;

  fn name(&self) -> &str {
    &self.name
  }

  fn config(&self) -> &RsiConfig {
    &self.config
  }

  fn set_config(&mut self, config: RsiConfig) -> Result<(), IndicatorError> {
    *self = RsiIndicator::new(config)?;
    Ok(())
  }

  fn min_data_points(&self) -> usize {
    self.config.period + 1
  }

  fn compute(&self, data: &[MarketDataPoint]) -> Result<Vec<Option<RsiValue>>, IndicatorError> {
    let values = rsi(&self.config.source.series(data), self.config.period, self.config.smoothing)?;
    Ok(values.into_iter().map(|v| v.map(|v| self.classify(v))).collect())
  }

  fn stream_update(&mut self, point: &MarketDataPoint) -> Option<StreamStep<RsiValue>> {
    let value = self.stream.update(self.config.source.extract(point));
    Some(StreamStep {
      value: value.map(|v| self.classify(v)),
      state: self.stream.state(),
    })
  }

  fn stream_reset(&mut self) {
    self.stream.reset();
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StochasticValue {
  /// 평활된 %K
  pub k: f64,
  /// %K 의 이동 평균
  pub d: f64,
  pub zone: Zone,
}

impl CacheCost for StochasticValue {}

impl IndicatorOutput for StochasticValue {
  fn primary(&self) -> f64 {
    self.k
  }

  fn is_finite(&self) -> bool {
    self.k.is_finite() && self.d.is_finite()
  }

  fn level_crosses(previous: &Self, current: &Self) -> Vec<LevelCross> {
    let mut crosses = Vec::new();

    // %K 가 %D 를 통과
    if let Some(direction) = CrossDirection::between(previous.k - previous.d, current.k - current.d, 0.0) {
      crosses.push(LevelCross::SignalLine { direction });
    }
    if previous.zone != current.zone {
      crosses.push(LevelCross::Zone { from: previous.zone, to: current.zone });
    }

    crosses
  }
}

/// 원시 %K: 구간 고저 범위 내 종가 위치 (범위가 0이면 50)
pub fn raw_stochastic_k(data: &[MarketDataPoint], period: usize) -> Vec<Option<f64>> {
  let mut out = vec![None; data.len()];
  if period == 0 || data.len() < period {
    return out;
  }

  for i in (period - 1)..data.len() {
    let window = &data[i + 1 - period..=i];
    let highest = window.iter().map(|p| p.high).fold(f64::NEG_INFINITY, f64::max);
    let lowest = window.iter().map(|p| p.low).fold(f64::INFINITY, f64::min);
    let range = highest - lowest;

    let k = if range == 0.0 {
      50.0
    } else {
      (data[i].close - lowest) / range * 100.0
    };
    out[i] = Some(math::clamp(k, 0.0, 100.0));
  }

  out
}

/// Stochastic 배치 계산
pub fn stochastic(
  data: &[MarketDataPoint],
  config: &StochasticConfig,
) -> Result<Vec<Option<StochasticValue>>, IndicatorError> {
  if data.is_empty() {
    return Err(IndicatorError::Calculation("Stochastic requires at least one data point".to_string()));
  }
  config.validate()?;

  let raw_k = raw_stochastic_k(data, config.period);
  let smoothed_k = math::sma_of_optional(&raw_k, config.k_smoothing);
  let d = math::sma_of_optional(&smoothed_k, config.d_smoothing);

  Ok(smoothed_k.iter()
    .zip(d.iter())
    .map(|(k, d)| match (k, d) {
      (Some(k), Some(d)) => {
        let k = math::clamp(*k, 0.0, 100.0);
        Some(StochasticValue {
          k,
          d: math::clamp(*d, 0.0, 100.0),
          zone: Zone::classify(k, config.oversold, config.overbought),
        })
      }
      _ => None,
    })
    .collect())
}

#[derive(Debug)]
pub struct StochasticIndicator {
  name: String,
  config: StochasticConfig,
}

impl StochasticIndicator {
  pub fn new(config: StochasticConfig) -> Result<Self, IndicatorError> {
    config.validate()?;

    Ok(StochasticIndicator {
      name: format!("STOCH-{}-{}-{}", config.period, config.k_smoothing, config.d_smoothing),
      config,
    })
  }
}

impl Indicator for StochasticIndicator {
  type Config = StochasticConfig;
  type Output = StochasticValue;

  fn name(&self) -> &str {
    &self.name
  }

  fn config(&self) -> &StochasticConfig {
    &self.config
  }

  fn set_config(&mut self, config: StochasticConfig) -> Result<(), IndicatorError> {
    *self = StochasticIndicator::new(config)?;
    Ok(())
  }

  fn min_data_points(&self) -> usize {
    self.config.period + self.config.k_smoothing + self.config.d_smoothing - 2
  }

  fn compute(&self, data: &[MarketDataPoint]) -> Result<Vec<Option<StochasticValue>>, IndicatorError> {
    stochastic(data, &self.config)
  }
}
