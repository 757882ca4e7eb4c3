//! 수학 관련 유틸리티
//!
//! 이동 평균, 표준 편차, 회귀 기울기 등 지표 계산 공용 함수 제공

/// 값을 범위 내로 제한
pub fn clamp(value: f64, min_value: f64, max_value: f64) -> f64 {
  value.max(min_value).min(max_value)
}

/// 평균 계산
pub fn average(values: &[f64]) -> Option<f64> {
  if values.is_empty() {
    return None;
  }

  Some(values.iter().sum::<f64>() / values.len() as f64)
}

/// 모집단 표준 편차 계산
pub fn standard_deviation(values: &[f64]) -> Option<f64> {
  if values.is_empty() {
    return None;
  }

  // 상수 구간은 반올림 오차 없이 0
  if values.iter().all(|value| *value == values[0]) {
    return Some(0.0);
  }

  let avg = average(values)?;
  let variance = values.iter()
    .map(|value| {
      let diff = avg - *value;
      diff * diff
    })
    .sum::<f64>() / values.len() as f64;

  Some(variance.sqrt())
}

/// 최소제곱 선형 회귀 기울기 (x = 0, 1, 2, ...)
pub fn linear_regression_slope(values: &[f64]) -> Option<f64> {
  let n = values.len();
  if n < 2 {
    return None;
  }

  let n_f = n as f64;
  let mean_x = (n_f - 1.0) / 2.0;
  let mean_y = average(values)?;

  let mut numerator = 0.0;
  let mut denominator = 0.0;
  for (i, y) in values.iter().enumerate() {
    let dx = i as f64 - mean_x;
    numerator += dx * (y - mean_y);
    denominator += dx * dx;
  }

  if denominator == 0.0 {
    return None;
  }

  Some(numerator / denominator)
}

/// 단순 이동 평균 시리즈 (앞쪽 period-1 개는 None)
pub fn sma_series(values: &[f64], period: usize) -> Vec<Option<f64>> {
  let mut out = vec![None; values.len()];
  if period == 0 || values.len() < period {
    return out;
  }

  for i in (period - 1)..values.len() {
    let window = &values[i + 1 - period..=i];
    out[i] = average(window);
  }

  out
}

/// None 이 섞인 시리즈의 이동 평균
///
/// 첫 유효값부터 연속된 구간에 대해서만 계산한다. 창 안에 None 이 있으면 None.
pub fn sma_of_optional(series: &[Option<f64>], period: usize) -> Vec<Option<f64>> {
  let mut out = vec![None; series.len()];
  if period == 0 {
    return out;
  }

  for i in 0..series.len() {
    if i + 1 < period {
      continue;
    }
    let window = &series[i + 1 - period..=i];
    if window.iter().all(|v| v.is_some()) {
      let sum: f64 = window.iter().flatten().sum();
      out[i] = Some(sum / period as f64);
    }
  }

  out
}

/// 변화율 (백분율), 기준값이 0 이면 None
pub fn percent_change(previous: f64, current: f64) -> Option<f64> {
  if previous == 0.0 || !previous.is_finite() || !current.is_finite() {
    return None;
  }

  Some((current - previous) / previous.abs() * 100.0)
}
