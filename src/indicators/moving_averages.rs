/**
* filename : moving_averages
* author : HAMA
* date: 2025. 6. 2.
* description: SMA / EMA 배치 계산과 스트리밍 EMA
**/

use std::collections::VecDeque;

use crate::error::IndicatorError;
use crate::models::market_data::MarketDataPoint;
use crate::utils::math;
use super::{EmaConfig, Indicator, IndicatorParams, SmaConfig, StreamStep, StreamingState};

/// 단순 이동 평균 (앞쪽 period-1 개는 None)
pub fn sma(values: &[f64], period: usize) -> Result<Vec<Option<f64>>, IndicatorError> {
  if values.is_empty() {
    return Err(IndicatorError::Calculation("SMA requires at least one value".to_string()));
  }
  if period == 0 {
    return Err(IndicatorError::InvalidParameter("SMA period must be at least 1".to_string()));
  }

  Ok(math::sma_series(values, period))
}

/// 지수 이동 평균
///
/// 첫 period 개의 SMA 로 시드하고 이후 `ema[i] = v[i]*α + ema[i-1]*(1-α)`.
pub fn ema(values: &[f64], period: usize, alpha: Option<f64>) -> Result<Vec<Option<f64>>, IndicatorError> {
  if values.is_empty() {
    return Err(IndicatorError::Calculation("EMA requires at least one value".to_string()));
  }
  if period == 0 {
    return Err(IndicatorError::InvalidParameter("EMA period must be at least 1".to_string()));
  }

  let alpha = alpha.unwrap_or(2.0 / (period as f64 + 1.0));
  let mut out = vec![None; values.len()];
  if values.len() < period {
    return Ok(out);
  }

  let seed = values[..period].iter().sum::<f64>() / period as f64;
  out[period - 1] = Some(seed);

  let mut prev = seed;
  for i in period..values.len() {
    prev = values[i] * alpha + prev * (1.0 - alpha);
    out[i] = Some(prev);
  }

  Ok(out)
}

/// O(1) 스트리밍 EMA
///
/// period 개가 모일 때까지는 누적 평균을 임시값으로 내보내고,
/// 그 이후로는 영구적으로 재귀식으로 전환한다.
#[derive(Debug, Clone)]
pub struct StreamingEma {
  period: usize,
  alpha: f64,
  warmup_sum: f64,
  current: f64,
  count: u64,
  is_stable: bool,
}

impl StreamingEma {
  pub fn new(period: usize, alpha: Option<f64>) -> Result<Self, IndicatorError> {
    if period == 0 {
      return Err(IndicatorError::Config("EMA period must be at least 1".to_string()));
    }

    Ok(StreamingEma {
      period,
      alpha: alpha.unwrap_or(2.0 / (period as f64 + 1.0)),
      warmup_sum: 0.0,
      current: 0.0,
      count: 0,
      is_stable: false,
    })
  }

  pub fn update(&mut self, value: f64) -> f64 {
    self.count += 1;

    if self.is_stable {
      self.current = value * self.alpha + self.current * (1.0 - self.alpha);
    } else {
      self.warmup_sum += value;
      self.current = self.warmup_sum / self.count as f64;

      if self.count as usize >= self.period {
        self.is_stable = true;
        self.warmup_sum = 0.0;
      }
    }

    self.current
  }

  pub fn value(&self) -> Option<f64> {
    if self.count == 0 {
      None
    } else {
      Some(self.current)
    }
  }

  pub fn is_stable(&self) -> bool {
    self.is_stable
  }

  pub fn count(&self) -> u64 {
    self.count
  }

  pub fn state(&self) -> StreamingState {
    StreamingState { count: self.count, is_stable: self.is_stable }
  }

  pub fn reset(&mut self) {
    self.warmup_sum = 0.0;
    self.current = 0.0;
    self.count = 0;
    self.is_stable = false;
  }
}

/// 고정 길이 창 기반 스트리밍 SMA
#[derive(Debug, Clone)]
pub struct StreamingSma {
  period: usize,
  values: VecDeque<f64>,
  count: u64,
}

impl StreamingSma {
  pub fn new(period: usize) -> Self {
    StreamingSma {
      period,
      values: VecDeque::with_capacity(period),
      count: 0,
    }
  }

  pub fn update(&mut self, value: f64) -> Option<f64> {
    self.values.push_back(value);
    self.count += 1;

    // 오래된 값 제거
    if self.values.len() > self.period {
      self.values.pop_front();
    }

    if self.is_stable() {
      Some(self.values.iter().sum::<f64>() / self.period as f64)
    } else {
      None
    }
  }

  pub fn is_stable(&self) -> bool {
    self.period > 0 && self.values.len() >= self.period
  }

  pub fn state(&self) -> StreamingState {
    StreamingState { count: self.count, is_stable: self.is_stable() }
  }

  pub fn reset(&mut self) {
    self.values.clear();
    self.count = 0;
  }
}

#[derive(Debug)]
pub struct SmaIndicator {
  name: String,
  config: SmaConfig,
  stream: StreamingSma,
}

impl SmaIndicator {
  pub fn new(config: SmaConfig) -> Result<Self, IndicatorError> {
    config.validate()?;

    Ok(SmaIndicator {
      name: format!("SMA-{}", config.period),
      stream: StreamingSma::new(config.period),
      config,
    })
  }
}

impl Indicator for SmaIndicator {
  type Config = SmaConfig;
  type Output = f64;

  fn name(&self) -> &str {
    &self.name
  }

  fn config(&self) -> &SmaConfig {
    &self.config
  }

  fn set_config(&mut self, config: SmaConfig) -> Result<(), IndicatorError> {
    *self = SmaIndicator::new(config)?;
    Ok(())
  }

  fn min_data_points(&self) -> usize {
    self.config.period
  }

  fn compute(&self, data: &[MarketDataPoint]) -> Result<Vec<Option<f64>>, IndicatorError> {
    sma(&self.config.source.series(data), self.config.period)
  }

  fn stream_update(&mut self, point: &MarketDataPoint) -> Option<StreamStep<f64>> {
    let value = self.stream.update(self.config.source.extract(point));
    Some(StreamStep { value, state: self.stream.state() })
  }

  fn stream_reset(&mut self) {
    self.stream.reset();
  }
}

#[derive(Debug)]
pub struct EmaIndicator {
  name: String,
  config: EmaConfig,
  stream: StreamingEma,
}

impl EmaIndicator {
  pub fn new(config: EmaConfig) -> Result<Self, IndicatorError> {
    config.validate()?;

    Ok(EmaIndicator {
      name: format!("EMA-{}", config.period),
      stream: StreamingEma::new(config.period, config.alpha)?,
      config,
    })
  }
}

impl Indicator for EmaIndicator {
  type Config = EmaConfig;
  type Output = f64;

  fn name(&self) -> &str {
    &self.name
  }

  fn config(&self) -> &EmaConfig {
    &self.config
  }

  fn set_config(&mut self, config: EmaConfig) -> Result<(), IndicatorError> {
    *self = EmaIndicator::new(config)?;
    Ok(())
  }

  fn min_data_points(&self) -> usize {
    self.config.period
  }

  fn compute(&self, data: &[MarketDataPoint]) -> Result<Vec<Option<f64>>, IndicatorError> {
    ema(&self.config.source.series(data), self.config.period, self.config.alpha)
  }

  fn stream_update(&mut self, point: &MarketDataPoint) -> Option<StreamStep<f64>> {
    let value = self.stream.update(self.config.source.extract(point));
    Some(StreamStep { value: Some(value), state: self.stream.state() })
  }

  fn stream_reset(&mut self) {
    self.stream.reset();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use rand::Rng;

  fn close_enough(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * a.abs().max(b.abs()).max(1.0)
  }

  #[test]
  fn test_ema_seed_and_recurrence() {
    let values = vec![1.0, 2.0, 3.0, 4.0, 5.0];
    let out = ema(&values, 3, None).unwrap();

    assert_eq!(out[0], None);
    assert_eq!(out[1], None);
    assert_eq!(out[2], Some(2.0));
    // alpha = 0.5
    assert_eq!(out[3], Some(3.0));
    assert_eq!(out[4], Some(4.0));
  }

  #[test]
  fn test_ema_empty_input_is_error() {
    assert!(matches!(ema(&[], 3, None), Err(IndicatorError::Calculation(_))));
    assert!(matches!(sma(&[], 3), Err(IndicatorError::Calculation(_))));
  }

  #[test]
  fn test_streaming_ema_warmup_is_running_mean() {
    let mut stream = StreamingEma::new(3, None).unwrap();

    assert_eq!(stream.update(1.0), 1.0);
    assert!(!stream.is_stable());
    assert_eq!(stream.update(3.0), 2.0);
    assert!(!stream.is_stable());
    assert_eq!(stream.update(5.0), 3.0);
    assert!(stream.is_stable());

    // 재귀식으로 전환된 이후 다시 버퍼링하지 않음
    stream.update(7.0);
    assert!(stream.is_stable());
    assert_eq!(stream.value(), Some(5.0));
  }

  #[test]
  fn test_streaming_ema_matches_batch_random() {
    let mut rng = rand::thread_rng();

    for _ in 0..20 {
      let period = rng.gen_range(1..30);
      let len = rng.gen_range(1..200);
      let values: Vec<f64> = (0..len).map(|_| rng.gen_range(-1000.0..1000.0)).collect();

      let batch = ema(&values, period, None).unwrap();
      let mut stream = StreamingEma::new(period, None).unwrap();

      for (i, v) in values.iter().enumerate() {
        let streamed = stream.update(*v);
        if let Some(expected) = batch[i] {
          assert!(stream.is_stable());
          assert!(close_enough(streamed, expected), "period {} index {}: {} vs {}", period, i, streamed, expected);
        } else {
          assert!(!stream.is_stable());
        }
      }
    }
  }

  #[test]
  fn test_streaming_sma_window() {
    let mut stream = StreamingSma::new(2);
    assert_eq!(stream.update(1.0), None);
    assert_eq!(stream.update(3.0), Some(2.0));
    assert_eq!(stream.update(5.0), Some(4.0));
    stream.reset();
    assert_eq!(stream.update(5.0), None);
  }

  #[test]
  fn test_ema_indicator_name_and_min_points() {
    let indicator = EmaIndicator::new(EmaConfig::new(10)).unwrap();
    assert_eq!(indicator.name(), "EMA-10");
    assert_eq!(indicator.min_data_points(), 10);
    assert!(EmaIndicator::new(EmaConfig::new(0)).is_err());
  }
}
