/**
* filename : volatility
* author : HAMA
* date: 2025. 6. 2.
* description: 볼린저 밴드
**/

use serde::{Deserialize, Serialize};

use crate::cache::CacheCost;
use crate::error::IndicatorError;
use crate::models::market_data::MarketDataPoint;
use crate::utils::math;
use super::{BollingerConfig, Indicator, IndicatorOutput, IndicatorParams, LevelCross, Zone};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BollingerValue {
  pub upper: f64,
  pub middle: f64,
  pub lower: f64,
  /// 밴드 내 가격 위치, 클램프하지 않음
  pub percent_b: f64,
  pub bandwidth: f64,
}

impl BollingerValue {
  /// 상단 밴드 위는 과매수, 하단 밴드 아래는 과매도
  pub fn zone(&self) -> Zone {
    if self.percent_b > 1.0 {
      Zone::Overbought
    } else if self.percent_b < 0.0 {
      Zone::Oversold
    } else {
      Zone::Neutral
    }
  }

  pub fn is_squeeze(&self, squeeze_bandwidth: f64) -> bool {
    self.bandwidth < squeeze_bandwidth
  }
}

impl CacheCost for BollingerValue {}

impl IndicatorOutput for BollingerValue {
  fn primary(&self) -> f64 {
    self.middle
  }

  fn is_finite(&self) -> bool {
    self.upper.is_finite()
      && self.middle.is_finite()
      && self.lower.is_finite()
      && self.percent_b.is_finite()
      && self.bandwidth.is_finite()
  }

  fn level_crosses(previous: &Self, current: &Self) -> Vec<LevelCross> {
    let (from, to) = (previous.zone(), current.zone());
    if from != to {
      vec![LevelCross::Zone { from, to }]
    } else {
      Vec::new()
    }
  }
}

/// 볼린저 밴드 배치 계산 (모집단 표준편차)
pub fn bollinger(
  values: &[f64],
  period: usize,
  standard_deviations: f64,
) -> Result<Vec<Option<BollingerValue>>, IndicatorError> {
  if values.is_empty() {
    return Err(IndicatorError::Calculation("Bollinger Bands require at least one value".to_string()));
  }
  if period == 0 {
    return Err(IndicatorError::InvalidParameter("Bollinger period must be at least 1".to_string()));
  }

  let mut out = vec![None; values.len()];
  if values.len() < period {
    return Ok(out);
  }

  for i in (period - 1)..values.len() {
    let window = &values[i + 1 - period..=i];
    let (middle, sigma) = match (math::average(window), math::standard_deviation(window)) {
      // 상수 구간: 평균 대신 값 그대로
      (Some(_), Some(s)) if s == 0.0 => (window[0], 0.0),
      (Some(m), Some(s)) => (m, s),
      _ => continue,
    };

    let upper = middle + standard_deviations * sigma;
    let lower = middle - standard_deviations * sigma;
    let width = upper - lower;

    let percent_b = if width == 0.0 { 0.5 } else { (values[i] - lower) / width };
    let bandwidth = if middle == 0.0 { 0.0 } else { width / middle };

    out[i] = Some(BollingerValue { upper, middle, lower, percent_b, bandwidth });
  }

  Ok(out)
}

#[derive(Debug)]
pub struct BollingerIndicator {
  name: String,
  config: BollingerConfig,
}

impl BollingerIndicator {
  pub fn new(config: BollingerConfig) -> Result<Self, IndicatorError> {
    config.validate()?;

    Ok(BollingerIndicator {
      name: format!("BB-{}-{}", config.period, config.standard_deviations),
      config,
    })
  }

  pub fn squeeze_bandwidth(&self) -> f64 {
    self.config.squeeze_bandwidth
  }
}

impl Indicator for BollingerIndicator {
  type Config = BollingerConfig;
  type Output = BollingerValue;

  fn name(&self) -> &str {
    &self.name
  }

  fn config(&self) -> &BollingerConfig {
    &self.config
  }

  fn set_config(&mut self, config: BollingerConfig) -> Result<(), IndicatorError> {
    *self = BollingerIndicator::new(config)?;
    Ok(())
  }

  fn min_data_points(&self) -> usize {
    self.config.period
  }

  fn compute(&self, data: &[MarketDataPoint]) -> Result<Vec<Option<BollingerValue>>, IndicatorError> {
    bollinger(&self.config.source.series(data), self.config.period, self.config.standard_deviations)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_constant_series_collapses_bands() {
    let values = vec![50.0; 25];
    let out = bollinger(&values, 20, 2.0).unwrap();

    assert!(out[..19].iter().all(|v| v.is_none()));
    for v in out[19..].iter() {
      let v = v.unwrap();
      assert_eq!(v.upper, v.middle);
      assert_eq!(v.lower, v.middle);
      assert_eq!(v.bandwidth, 0.0);
      assert_eq!(v.percent_b, 0.5);
    }
  }

  #[test]
  fn test_inexact_constants_collapse_bands() {
    for constant in [0.1, 1.1, 99.99, 1234.56] {
      let out = bollinger(&vec![constant; 25], 20, 2.0).unwrap();
      for v in out[19..].iter() {
        let v = v.unwrap();
        assert_eq!(v.middle, constant);
        assert_eq!(v.upper, constant);
        assert_eq!(v.lower, constant);
        assert_eq!(v.bandwidth, 0.0);
        assert_eq!(v.percent_b, 0.5);
      }
    }
  }

  #[test]
  fn test_known_bands() {
    // 평균 2, 모집단 표준편차 sqrt(2/3)
    let out = bollinger(&[1.0, 2.0, 3.0], 3, 2.0).unwrap();
    let v = out[2].unwrap();
    let sigma = (2.0_f64 / 3.0).sqrt();

    assert!((v.middle - 2.0).abs() < 1e-12);
    assert!((v.upper - (2.0 + 2.0 * sigma)).abs() < 1e-12);
    assert!((v.lower - (2.0 - 2.0 * sigma)).abs() < 1e-12);
    assert!((v.percent_b - (1.0 + 2.0 * sigma) / (4.0 * sigma)).abs() < 1e-12);
  }

  #[test]
  fn test_empty_input_is_error() {
    assert!(matches!(bollinger(&[], 20, 2.0), Err(IndicatorError::Calculation(_))));
  }

  #[test]
  fn test_breakout_zone_and_squeeze() {
    let mut values = vec![100.0; 19];
    values.push(120.0);
    let v = bollinger(&values, 20, 2.0).unwrap()[19].unwrap();

    assert!(v.percent_b > 1.0);
    assert_eq!(v.zone(), Zone::Overbought);
    assert!(!v.is_squeeze(0.02));

    let flat = bollinger(&vec![100.0; 20], 20, 2.0).unwrap()[19].unwrap();
    assert!(flat.is_squeeze(0.02));
    assert_eq!(BollingerValue::level_crosses(&flat, &v), vec![
      LevelCross::Zone { from: Zone::Neutral, to: Zone::Overbought },
    ]);
  }
}
