/**
* filename : validator
* author : HAMA
* date: 2025. 6. 2.
* description: 캔들 시퀀스 / 실시간 포인트 검증기
**/

use std::collections::HashSet;

use statrs::statistics::Statistics;

use crate::config::ValidationConfig;
use crate::models::market_data::MarketDataPoint;
use crate::utils::math;
use super::outliers::{detect_outliers, median};
use super::{
  DataStatistics, OutlierMethod, QualityBreakdown, RealtimeValidation, Strictness, Thresholds,
  ValidationReport,
};

/// 이상치 / 공백 목록을 메시지에 담을 최대 개수
const MAX_LISTED_INDICES: usize = 5;

#[derive(Debug, Clone, PartialEq)]
pub struct DataValidator {
  strictness: Strictness,
  outlier_method: OutlierMethod,
  thresholds: Thresholds,
}

impl Default for DataValidator {
  fn default() -> Self {
    DataValidator::new(Strictness::Normal, OutlierMethod::Iqr)
  }
}

/// 검증 중 누적되는 발견 사항
#[derive(Default)]
struct Findings {
  errors: Vec<String>,
  warnings: Vec<String>,
  suggestions: Vec<String>,
}

impl Findings {
  fn suggest(&mut self, suggestion: &str) {
    if !self.suggestions.iter().any(|s| s == suggestion) {
      self.suggestions.push(suggestion.to_string());
    }
  }
}

fn list_indices(indices: &[usize]) -> String {
  let shown: Vec<String> = indices.iter().take(MAX_LISTED_INDICES).map(|i| i.to_string()).collect();
  if indices.len() > MAX_LISTED_INDICES {
    format!("{}, ...", shown.join(", "))
  } else {
    shown.join(", ")
  }
}

fn ratio_penalty(count: usize, total: usize) -> f64 {
  if total == 0 {
    return 0.0;
  }
  math::clamp(1.0 - count as f64 / total as f64, 0.0, 1.0)
}

impl DataValidator {
  pub fn new(strictness: Strictness, outlier_method: OutlierMethod) -> Self {
    DataValidator {
      strictness,
      outlier_method,
      thresholds: Thresholds::for_strictness(strictness),
    }
  }

  pub fn from_config(config: &ValidationConfig) -> Self {
    DataValidator::new(config.strictness, config.outlier_method)
  }

  pub fn strictness(&self) -> Strictness {
    self.strictness
  }

  pub fn outlier_method(&self) -> OutlierMethod {
    self.outlier_method
  }

  pub fn thresholds(&self) -> &Thresholds {
    &self.thresholds
  }

  /// 공백 / 급변 / 이상치 / 중복은 strict 에서만 오류
  fn record_soft(&self, findings: &mut Findings, message: String) {
    if self.strictness == Strictness::Strict {
      findings.errors.push(message);
    } else {
      findings.warnings.push(message);
    }
  }

  /// 시퀀스 전체 검증
  pub fn validate(&self, data: &[MarketDataPoint], min_points: usize) -> ValidationReport {
    let mut findings = Findings::default();
    let mut statistics = DataStatistics {
      count: data.len(),
      first_timestamp: data.first().map(|p| p.timestamp),
      last_timestamp: data.last().map(|p| p.timestamp),
      ..DataStatistics::default()
    };

    // 데이터 부족은 엄격도와 관계없이 치명적
    if data.is_empty() {
      return ValidationReport {
        is_valid: false,
        errors: vec!["No data provided".to_string()],
        warnings: Vec::new(),
        quality_score: 0.0,
        quality: QualityBreakdown::default(),
        suggestions: vec!["Supply at least one market data point".to_string()],
        statistics,
        required_points: min_points,
      };
    }
    if data.len() < min_points {
      return ValidationReport {
        is_valid: false,
        errors: vec![format!("Insufficient data: required {}, got {}", min_points, data.len())],
        warnings: Vec::new(),
        quality_score: 0.0,
        quality: QualityBreakdown::default(),
        suggestions: vec![format!("Load at least {} data points", min_points)],
        statistics,
        required_points: min_points,
      };
    }

    // 포인트별 구조 검사
    let mut inconsistent = 0;
    for (i, point) in data.iter().enumerate() {
      let mut bad = false;

      if !point.is_finite() {
        findings.errors.push(format!("Non-finite value at index {}", i));
        bad = true;
      } else if !point.is_ohlc_consistent() {
        findings.errors.push(format!(
          "OHLC inconsistency at index {}: open={} high={} low={} close={}",
          i, point.open, point.high, point.low, point.close
        ));
        bad = true;
      }

      if point.volume < 0.0 {
        findings.errors.push(format!("Negative volume at index {}: {}", i, point.volume));
        bad = true;
      } else if point.volume == 0.0 {
        findings.warnings.push(format!("Zero volume at index {}", i));
      }

      if bad {
        inconsistent += 1;
      }
    }
    if inconsistent > 0 {
      findings.suggest("Drop or repair candles with inconsistent OHLC or volume values");
    }

    // 타임스탬프 순서와 간격
    let mut order_violations = 0;
    let mut intervals = Vec::with_capacity(data.len().saturating_sub(1));
    for (i, pair) in data.windows(2).enumerate() {
      let delta = pair[1].timestamp - pair[0].timestamp;
      if delta <= 0 {
        order_violations += 1;
        findings.errors.push(format!(
          "Timestamps not strictly increasing at index {}: {} -> {}",
          i + 1, pair[0].timestamp, pair[1].timestamp
        ));
      } else {
        intervals.push(delta as f64);
      }
    }
    if order_violations > 0 {
      findings.suggest("Sort data by timestamp and remove repeated timestamps");
    }

    let median_interval = median(&intervals);
    statistics.median_interval_ms = median_interval;

    let mut gaps = Vec::new();
    if let Some(median_interval) = median_interval {
      let max_gap = median_interval * self.thresholds.max_gap_factor;
      for (i, pair) in data.windows(2).enumerate() {
        let delta = (pair[1].timestamp - pair[0].timestamp) as f64;
        if delta > max_gap {
          gaps.push(i + 1);
        }
      }
    }
    if !gaps.is_empty() {
      self.record_soft(&mut findings, format!(
        "{} time gap(s) larger than {}x the median interval at index {}",
        gaps.len(), self.thresholds.max_gap_factor, list_indices(&gaps)
      ));
      findings.suggest("Fill missing intervals or fetch the missing range from the data source");
    }
    statistics.gap_count = gaps.len();

    // 한 스텝 가격 급변
    let mut spikes = Vec::new();
    for (i, pair) in data.windows(2).enumerate() {
      if let Some(change) = math::percent_change(pair[0].close, pair[1].close) {
        if change.abs() > self.thresholds.max_price_change_pct {
          spikes.push(i + 1);
        }
      }
    }
    if !spikes.is_empty() {
      self.record_soft(&mut findings, format!(
        "{} price change(s) above {}% at index {}",
        spikes.len(), self.thresholds.max_price_change_pct, list_indices(&spikes)
      ));
      findings.suggest("Check price spikes against the source exchange before using the data");
    }
    statistics.spike_count = spikes.len();

    // 종가 이상치
    let closes: Vec<f64> = data.iter().map(|p| p.close).filter(|c| c.is_finite()).collect();
    let outliers = detect_outliers(&closes, self.outlier_method, &self.thresholds);
    if !outliers.is_empty() {
      self.record_soft(&mut findings, format!(
        "{} closing price outlier(s) ({:?}) at index {}",
        outliers.len(), self.outlier_method, list_indices(&outliers)
      ));
      findings.suggest("Review or smooth statistical outliers in closing prices");
    }
    statistics.outlier_count = outliers.len();

    // 전체 필드가 같은 중복 행
    let mut seen = HashSet::with_capacity(data.len());
    let mut duplicates = Vec::new();
    for (i, point) in data.iter().enumerate() {
      let key = (
        point.timestamp,
        point.open.to_bits(),
        point.high.to_bits(),
        point.low.to_bits(),
        point.close.to_bits(),
        point.volume.to_bits(),
      );
      if !seen.insert(key) {
        duplicates.push(i);
      }
    }
    if !duplicates.is_empty() {
      self.record_soft(&mut findings, format!(
        "{} duplicate row(s) at index {}", duplicates.len(), list_indices(&duplicates)
      ));
      findings.suggest("Deduplicate rows before computing indicators");
    }
    statistics.duplicate_count = duplicates.len();

    if !closes.is_empty() {
      statistics.mean_close = closes.iter().mean();
      statistics.std_close = closes.iter().population_std_dev();
      statistics.min_close = closes.iter().cloned().fold(f64::INFINITY, f64::min);
      statistics.max_close = closes.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    }
    let volumes: Vec<f64> = data.iter().map(|p| p.volume).filter(|v| v.is_finite()).collect();
    statistics.mean_volume = math::average(&volumes).unwrap_or(0.0);

    // 품질 점수
    let n = data.len();
    let completeness = match (median_interval, statistics.first_timestamp, statistics.last_timestamp) {
      (Some(interval), Some(first), Some(last)) if interval > 0.0 && last > first => {
        let expected = ((last - first) as f64 / interval).round() + 1.0;
        math::clamp(n as f64 / expected, 0.0, 1.0)
      }
      _ => 1.0,
    };
    let quality = QualityBreakdown {
      completeness,
      consistency: ratio_penalty(inconsistent, n),
      accuracy: ratio_penalty(spikes.len() + outliers.len(), n),
      timeliness: ratio_penalty(order_violations + gaps.len(), n.saturating_sub(1).max(1)),
      uniqueness: ratio_penalty(duplicates.len(), n),
    };

    let is_valid = findings.errors.is_empty() || self.strictness == Strictness::Relaxed;

    ValidationReport {
      is_valid,
      errors: findings.errors,
      warnings: findings.warnings,
      quality_score: quality.score(),
      quality,
      suggestions: findings.suggestions,
      statistics,
      required_points: min_points,
    }
  }

  /// 새 포인트 하나를 직전 포인트와 비교 검증
  pub fn validate_point(&self, point: &MarketDataPoint, previous: Option<&MarketDataPoint>) -> RealtimeValidation {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    if !point.is_finite() {
      errors.push("Non-finite value in data point".to_string());
    } else if !point.is_ohlc_consistent() {
      errors.push(format!(
        "OHLC inconsistency: open={} high={} low={} close={}",
        point.open, point.high, point.low, point.close
      ));
    }

    if point.volume < 0.0 {
      errors.push(format!("Negative volume: {}", point.volume));
    } else if point.volume == 0.0 {
      warnings.push("Zero volume".to_string());
    }

    if let Some(previous) = previous {
      if point.timestamp <= previous.timestamp {
        errors.push(format!(
          "Out-of-order timestamp: {} is not after {}", point.timestamp, previous.timestamp
        ));
      }

      if let Some(change) = math::percent_change(previous.close, point.close) {
        if change.abs() > self.thresholds.max_price_change_pct {
          let message = format!(
            "Price drift {:.2}% exceeds {}%", change, self.thresholds.max_price_change_pct
          );
          if self.strictness == Strictness::Strict {
            errors.push(message);
          } else {
            warnings.push(message);
          }
        }
      }
    }

    RealtimeValidation {
      is_valid: errors.is_empty(),
      errors,
      warnings,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use rstest::rstest;
  use crate::error::IndicatorError;

  const MINUTE: i64 = 60_000;

  fn candles(n: usize) -> Vec<MarketDataPoint> {
    (0..n)
      .map(|i| {
        let close = 100.0 + (i as f64 * 0.4).sin();
        MarketDataPoint::new(i as i64 * MINUTE, close - 0.1, close + 0.5, close - 0.5, close, 1_000.0)
      })
      .collect()
  }

  #[test]
  fn test_clean_data_is_valid() {
    let report = DataValidator::default().validate(&candles(50), 20);

    assert!(report.is_valid);
    assert!(report.errors.is_empty());
    assert!(report.warnings.is_empty());
    assert!((report.quality_score - 1.0).abs() < 1e-9);
    assert_eq!(report.statistics.count, 50);
    assert_eq!(report.statistics.median_interval_ms, Some(MINUTE as f64));
  }

  #[rstest]
  #[case(Strictness::Strict)]
  #[case(Strictness::Normal)]
  #[case(Strictness::Relaxed)]
  fn test_insufficient_data_is_fatal(#[case] strictness: Strictness) {
    let validator = DataValidator::new(strictness, OutlierMethod::Iqr);
    let report = validator.validate(&candles(5), 20);

    assert!(!report.is_valid);
    assert_eq!(report.to_error(), Some(IndicatorError::InsufficientData { required: 20, actual: 5 }));

    let empty = validator.validate(&[], 1);
    assert!(!empty.is_valid);
    assert_eq!(empty.quality_score, 0.0);
  }

  #[test]
  fn test_ohlc_inconsistency_is_error() {
    let mut data = candles(30);
    data[10].high = data[10].low - 1.0;
    let report = DataValidator::default().validate(&data, 10);

    assert!(!report.is_valid);
    assert!(report.errors.iter().any(|e| e.contains("OHLC inconsistency at index 10")));
    assert!(report.quality.consistency < 1.0);
    assert!(matches!(report.to_error(), Some(IndicatorError::Validation(_))));
  }

  #[test]
  fn test_relaxed_forces_valid() {
    let mut data = candles(30);
    data[3].volume = -5.0;
    let report = DataValidator::new(Strictness::Relaxed, OutlierMethod::Iqr).validate(&data, 10);

    assert!(report.is_valid);
    assert!(!report.errors.is_empty());
    assert!(report.to_error().is_none());
  }

  #[test]
  fn test_non_increasing_timestamps() {
    let mut data = candles(30);
    data[12].timestamp = data[11].timestamp;
    let report = DataValidator::default().validate(&data, 10);

    assert!(!report.is_valid);
    assert!(report.errors.iter().any(|e| e.contains("not strictly increasing at index 12")));
  }

  #[test]
  fn test_gap_is_warning_in_normal_error_in_strict() {
    let mut data = candles(30);
    for point in data.iter_mut().skip(15) {
      point.timestamp += 30 * MINUTE;
    }

    let normal = DataValidator::default().validate(&data, 10);
    assert!(normal.is_valid);
    assert_eq!(normal.statistics.gap_count, 1);
    assert!(normal.warnings.iter().any(|w| w.contains("time gap")));
    assert!(normal.quality.completeness < 1.0);

    let strict = DataValidator::new(Strictness::Strict, OutlierMethod::Iqr).validate(&data, 10);
    assert!(!strict.is_valid);
    assert!(strict.errors.iter().any(|e| e.contains("time gap")));
  }

  #[test]
  fn test_price_spike_and_outlier() {
    let mut data = candles(40);
    data[20].close = 300.0;
    data[20].high = 300.5;
    let report = DataValidator::default().validate(&data, 10);

    assert!(report.is_valid);
    assert_eq!(report.statistics.spike_count, 2);
    assert_eq!(report.statistics.outlier_count, 1);
    assert!(report.quality.accuracy < 1.0);
    assert!(!report.suggestions.is_empty());
  }

  #[test]
  fn test_duplicate_rows() {
    let mut data = candles(20);
    data[7] = data[6];
    let report = DataValidator::default().validate(&data, 10);

    assert_eq!(report.statistics.duplicate_count, 1);
    assert!(report.quality.uniqueness < 1.0);
  }

  #[test]
  fn test_validate_point() {
    let validator = DataValidator::default();
    let prev = MarketDataPoint::new(1_000, 100.0, 101.0, 99.0, 100.0, 10.0);

    let ok = validator.validate_point(&MarketDataPoint::new(2_000, 100.0, 102.0, 99.5, 101.0, 10.0), Some(&prev));
    assert!(ok.is_valid);
    assert!(ok.warnings.is_empty());

    let late = validator.validate_point(&MarketDataPoint::new(500, 100.0, 101.0, 99.0, 100.0, -1.0), Some(&prev));
    assert!(!late.is_valid);
    assert_eq!(late.errors.len(), 2);

    let drift = validator.validate_point(&MarketDataPoint::new(2_000, 150.0, 150.0, 150.0, 150.0, 0.0), Some(&prev));
    assert!(drift.is_valid);
    assert_eq!(drift.warnings.len(), 2);
  }
}
