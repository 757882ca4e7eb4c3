/**
* filename : trend
* author : HAMA
* date: 2025. 6. 2.
* description: MACD
**/

use serde::{Deserialize, Serialize};

use crate::cache::CacheCost;
use crate::error::IndicatorError;
use crate::models::market_data::MarketDataPoint;
use super::moving_averages::{ema, StreamingEma};
use super::{
  CrossDirection, Indicator, IndicatorOutput, IndicatorParams, LevelCross, MacdConfig, StreamStep,
  StreamingState,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacdValue {
  pub macd: f64,
  pub signal: f64,
  pub histogram: f64,
}

impl CacheCost for MacdValue {}

impl IndicatorOutput for MacdValue {
  fn primary(&self) -> f64 {
    self.macd
  }

  fn is_finite(&self) -> bool {
    self.macd.is_finite() && self.signal.is_finite() && self.histogram.is_finite()
  }

  /// 0선 교차와 시그널선 교차는 별개의 이벤트로 보고
  fn level_crosses(previous: &Self, current: &Self) -> Vec<LevelCross> {
    let mut crosses = Vec::new();

    if let Some(direction) = CrossDirection::between(previous.macd, current.macd, 0.0) {
      crosses.push(LevelCross::ZeroLine { direction });
    }
    if let Some(direction) = CrossDirection::between(previous.histogram, current.histogram, 0.0) {
      crosses.push(LevelCross::SignalLine { direction });
    }

    crosses
  }
}

/// MACD 배치 계산
///
/// 시그널선은 MACD 라인이 유효해지는 slow-1 부터의 시리즈에 대한 EMA.
pub fn macd(
  values: &[f64],
  fast_period: usize,
  slow_period: usize,
  signal_period: usize,
) -> Result<Vec<Option<MacdValue>>, IndicatorError> {
  if values.is_empty() {
    return Err(IndicatorError::Calculation("MACD requires at least one value".to_string()));
  }
  if fast_period == 0 || slow_period == 0 || signal_period == 0 || fast_period >= slow_period {
    return Err(IndicatorError::InvalidParameter(format!(
      "Invalid MACD periods {}/{}/{}", fast_period, slow_period, signal_period
    )));
  }

  let mut out = vec![None; values.len()];
  if values.len() < slow_period {
    return Ok(out);
  }

  let fast = ema(values, fast_period, None)?;
  let slow = ema(values, slow_period, None)?;

  let start = slow_period - 1;
  let mut macd_line = Vec::with_capacity(values.len() - start);
  for i in start..values.len() {
    match (fast[i], slow[i]) {
      (Some(f), Some(s)) => macd_line.push(f - s),
      _ => {
        return Err(IndicatorError::Calculation(format!("MACD line undefined at index {}", i)));
      }
    }
  }

  let signal = ema(&macd_line, signal_period, None)?;
  for (j, sig) in signal.into_iter().enumerate() {
    if let Some(sig) = sig {
      let m = macd_line[j];
      out[start + j] = Some(MacdValue {
        macd: m,
        signal: sig,
        histogram: m - sig,
      });
    }
  }

  Ok(out)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossoverKind {
  Bullish,
  Bearish,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MacdCrossover {
  pub index: usize,
  pub kind: CrossoverKind,
  /// 0 ~ 1 로 정규화된 강도
  pub strength: f64,
}

/// 연속된 두 값 사이에서 (macd - signal) 부호가 바뀐 지점 탐색
pub fn detect_crossovers(values: &[Option<MacdValue>], threshold: f64) -> Vec<MacdCrossover> {
  let max_histogram = values.iter()
    .flatten()
    .map(|v| v.histogram.abs())
    .fold(0.0, f64::max);

  let mut crossovers = Vec::new();
  for i in 1..values.len() {
    let (prev, curr) = match (values[i - 1], values[i]) {
      (Some(p), Some(c)) => (p, c),
      _ => continue,
    };

    let kind = if prev.histogram <= 0.0 && curr.histogram > 0.0 {
      CrossoverKind::Bullish
    } else if prev.histogram >= 0.0 && curr.histogram < 0.0 {
      CrossoverKind::Bearish
    } else {
      continue;
    };

    let delta = (curr.histogram - prev.histogram).abs();
    if delta < threshold {
      continue;
    }

    let strength = if max_histogram > 0.0 {
      (delta / (2.0 * max_histogram)).min(1.0)
    } else {
      0.0
    };

    crossovers.push(MacdCrossover { index: i, kind, strength });
  }

  crossovers
}

/// fast / slow / signal EMA 세 개로 구성한 O(1) 스트리밍 MACD
#[derive(Debug, Clone)]
pub struct StreamingMacd {
  fast: StreamingEma,
  slow: StreamingEma,
  signal: StreamingEma,
  count: u64,
}

impl StreamingMacd {
  pub fn new(config: &MacdConfig) -> Result<Self, IndicatorError> {
    Ok(StreamingMacd {
      fast: StreamingEma::new(config.fast_period, None)?,
      slow: StreamingEma::new(config.slow_period, None)?,
      signal: StreamingEma::new(config.signal_period, None)?,
      count: 0,
    })
  }

  pub fn update(&mut self, price: f64) -> Option<MacdValue> {
    self.count += 1;

    let fast = self.fast.update(price);
    let slow = self.slow.update(price);

    // 느린 EMA 가 안정되기 전의 MACD 라인은 시그널에 넣지 않음
    if !self.slow.is_stable() {
      return None;
    }

    let macd_line = fast - slow;
    let signal = self.signal.update(macd_line);
    if !self.signal.is_stable() {
      return None;
    }

    Some(MacdValue {
      macd: macd_line,
      signal,
      histogram: macd_line - signal,
    })
  }

  pub fn state(&self) -> StreamingState {
    StreamingState {
      count: self.count,
      is_stable: self.slow.is_stable() && self.signal.is_stable(),
    }
  }

  pub fn reset(&mut self) {
    self.fast.reset();
    self.slow.reset();
    self.signal.reset();
    self.count = 0;
  }
}

#[derive(Debug)]
pub struct MacdIndicator {
  name: String,
  config: MacdConfig,
  stream: StreamingMacd,
}

impl MacdIndicator {
  pub fn new(config: MacdConfig) -> Result<Self, IndicatorError> {
    config.validate()?;

    Ok(MacdIndicator {
      name: format!("MACD-{}-{}-{}", config.fast_period, config.slow_period, config.signal_period),
      stream: StreamingMacd::new(&config)?,
      config,
    })
  }

  /// 시그널선 교차 목록
  pub fn crossovers(&self, data: &[MarketDataPoint]) -> Result<Vec<MacdCrossover>, IndicatorError> {
    let values = self.compute(data)?;
    Ok(detect_crossovers(&values, self.config.crossover_threshold))
  }
}

impl Indicator for MacdIndicator {
  type Config = MacdConfig;
  type Output = MacdValue;

  fn name(&self) -> &str {
    &self.name
  }

  fn config(&self) -> &MacdConfig {
    &self.config
  }

  fn set_config(&mut self, config: MacdConfig) -> Result<(), IndicatorError> {
    *self = MacdIndicator::new(config)?;
    Ok(())
  }

  fn min_data_points(&self) -> usize {
    self.config.slow_period + self.config.signal_period - 1
  }

  fn compute(&self, data: &[MarketDataPoint]) -> Result<Vec<Option<MacdValue>>, IndicatorError> {
    macd(
      &self.config.source.series(data),
      self.config.fast_period,
      self.config.slow_period,
      self.config.signal_period,
    )
  }

  fn stream_update(&mut self, point: &MarketDataPoint) -> Option<StreamStep<MacdValue>> {
    let value = self.stream.update(self.config.source.extract(point));
    Some(StreamStep { value, state: self.stream.state() })
  }

  fn stream_reset(&mut self) {
    self.stream.reset();
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn uptrend(n: usize) -> Vec<f64> {
    (0..n).map(|i| 100.0 * 1.02_f64.powi(i as i32)).collect()
  }

  #[test]
  fn test_macd_uptrend_positive_histogram() {
    let values = uptrend(40);
    let out = macd(&values, 12, 26, 9).unwrap();

    // 26 + 9 - 1 = 34 개부터 유효
    assert!(out[..33].iter().all(|v| v.is_none()));
    for v in out[33..].iter() {
      let v = v.unwrap();
      assert!(v.macd > 0.0);
      assert!(v.histogram > 0.0);
    }
  }

  #[test]
  fn test_macd_short_input() {
    let out = macd(&uptrend(10), 12, 26, 9).unwrap();
    assert!(out.iter().all(|v| v.is_none()));
    assert!(macd(&[], 12, 26, 9).is_err());
    assert!(macd(&uptrend(10), 26, 12, 9).is_err());
  }

  #[test]
  fn test_streaming_macd_matches_batch() {
    let values: Vec<f64> = (0..80).map(|i| 100.0 + (i as f64 * 0.3).sin() * 4.0 + i as f64 * 0.1).collect();
    let config = MacdConfig::new(5, 13, 4);
    let batch = macd(&values, 5, 13, 4).unwrap();

    let mut stream = StreamingMacd::new(&config).unwrap();
    for (i, v) in values.iter().enumerate() {
      match (stream.update(*v), batch[i]) {
        (Some(a), Some(b)) => {
          assert!((a.macd - b.macd).abs() < 1e-9);
          assert!((a.signal - b.signal).abs() < 1e-9);
          assert!((a.histogram - b.histogram).abs() < 1e-9);
        }
        (None, None) => {}
        other => panic!("index {}: mismatch {:?}", i, other),
      }
    }
  }

  #[test]
  fn test_detect_crossovers() {
    let values = vec![
      None,
      Some(MacdValue { macd: 1.0, signal: 2.0, histogram: -1.0 }),
      Some(MacdValue { macd: 3.0, signal: 2.0, histogram: 1.0 }),
      Some(MacdValue { macd: 3.5, signal: 2.5, histogram: 1.0 }),
      Some(MacdValue { macd: 1.0, signal: 2.0, histogram: -1.0 }),
    ];

    let crossovers = detect_crossovers(&values, 0.0);
    assert_eq!(crossovers.len(), 2);
    assert_eq!(crossovers[0].index, 2);
    assert_eq!(crossovers[0].kind, CrossoverKind::Bullish);
    assert_eq!(crossovers[1].kind, CrossoverKind::Bearish);
    assert!((crossovers[0].strength - 1.0).abs() < 1e-12);

    // 임계값보다 작은 변화는 무시
    assert!(detect_crossovers(&values, 5.0).is_empty());
  }

  #[test]
  fn test_level_crosses_are_distinct() {
    let prev = MacdValue { macd: -0.5, signal: -0.2, histogram: -0.3 };
    let curr = MacdValue { macd: 0.5, signal: 0.1, histogram: 0.4 };

    let crosses = MacdValue::level_crosses(&prev, &curr);
    assert_eq!(crosses, vec![
      LevelCross::ZeroLine { direction: CrossDirection::Up },
      LevelCross::SignalLine { direction: CrossDirection::Up },
    ]);
  }
}
