/**
* filename : outliers
* author : HAMA
* date: 2025. 6. 2.
* description: IQR / z-score / modified z-score 이상치 탐지
**/

use statrs::statistics::{Data, OrderStatistics, Statistics};

use super::{OutlierMethod, Thresholds};

/// 통계가 의미를 갖는 최소 표본 수
pub const MIN_OUTLIER_SAMPLE: usize = 4;

/// modified z-score 정규화 상수 (정규분포에서 MAD ≈ 0.6745σ)
const MAD_SCALE: f64 = 0.6745;

pub fn median(values: &[f64]) -> Option<f64> {
  if values.is_empty() {
    return None;
  }
  let mut data = Data::new(values.to_vec());
  Some(data.quantile(0.5))
}

/// 선택한 방식으로 이상치 인덱스를 반환 (표본이 작거나 분산이 0이면 없음)
pub fn detect_outliers(values: &[f64], method: OutlierMethod, thresholds: &Thresholds) -> Vec<usize> {
  match method {
    OutlierMethod::Iqr => iqr_outliers(values, thresholds.iqr_multiplier),
    OutlierMethod::ZScore => z_score_outliers(values, thresholds.z_score),
    OutlierMethod::ModifiedZScore => modified_z_score_outliers(values, thresholds.modified_z_score),
  }
}

pub fn iqr_outliers(values: &[f64], multiplier: f64) -> Vec<usize> {
  if values.len() < MIN_OUTLIER_SAMPLE {
    return Vec::new();
  }

  let mut data = Data::new(values.to_vec());
  let q1 = data.quantile(0.25);
  let q3 = data.quantile(0.75);
  let iqr = q3 - q1;
  let lower = q1 - multiplier * iqr;
  let upper = q3 + multiplier * iqr;

  values.iter()
    .enumerate()
    .filter(|(_, v)| **v < lower || **v > upper)
    .map(|(i, _)| i)
    .collect()
}

pub fn z_score_outliers(values: &[f64], threshold: f64) -> Vec<usize> {
  if values.len() < MIN_OUTLIER_SAMPLE {
    return Vec::new();
  }

  let mean = values.iter().mean();
  let sigma = values.iter().population_std_dev();
  if !(sigma > 0.0) {
    return Vec::new();
  }

  values.iter()
    .enumerate()
    .filter(|(_, v)| ((**v - mean) / sigma).abs() > threshold)
    .map(|(i, _)| i)
    .collect()
}

pub fn modified_z_score_outliers(values: &[f64], threshold: f64) -> Vec<usize> {
  if values.len() < MIN_OUTLIER_SAMPLE {
    return Vec::new();
  }

  let med = match median(values) {
    Some(m) => m,
    None => return Vec::new(),
  };
  let deviations: Vec<f64> = values.iter().map(|v| (v - med).abs()).collect();
  let mad = match median(&deviations) {
    Some(m) if m > 0.0 => m,
    _ => return Vec::new(),
  };

  values.iter()
    .enumerate()
    .filter(|(_, v)| (MAD_SCALE * (**v - med) / mad).abs() > threshold)
    .map(|(i, _)| i)
    .collect()
}

#[cfg(test)]
mod tests {
  use super::*;
  use rstest::rstest;
  use crate::validation::Strictness;

  fn series_with_spike() -> Vec<f64> {
    let mut values: Vec<f64> = (0..30).map(|i| 100.0 + (i % 5) as f64 * 0.5).collect();
    values[17] = 400.0;
    values
  }

  #[rstest]
  #[case(OutlierMethod::Iqr)]
  #[case(OutlierMethod::ZScore)]
  #[case(OutlierMethod::ModifiedZScore)]
  fn test_each_method_finds_spike(#[case] method: OutlierMethod) {
    let thresholds = Thresholds::for_strictness(Strictness::Normal);
    assert_eq!(detect_outliers(&series_with_spike(), method, &thresholds), vec![17]);
  }

  #[rstest]
  #[case(OutlierMethod::Iqr)]
  #[case(OutlierMethod::ZScore)]
  #[case(OutlierMethod::ModifiedZScore)]
  fn test_constant_series_has_no_outliers(#[case] method: OutlierMethod) {
    let thresholds = Thresholds::for_strictness(Strictness::Strict);
    assert!(detect_outliers(&[5.0; 20], method, &thresholds).is_empty());
  }

  #[test]
  fn test_small_sample_skipped() {
    assert!(z_score_outliers(&[1.0, 2.0, 100.0], 1.0).is_empty());
  }

  #[test]
  fn test_median() {
    assert_eq!(median(&[3.0, 1.0, 2.0]), Some(2.0));
    assert_eq!(median(&[]), None);
  }
}
