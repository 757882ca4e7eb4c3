//! 시간 관련 유틸리티
//!
//! 밀리초 타임스탬프 변환, 경과 시간 계산 함수 제공

pub mod logging;
pub mod math;

use chrono::{DateTime, TimeZone, Utc};

/// 타임스탬프(밀리초)를 DateTime<Utc>로 변환
pub fn timestamp_to_datetime(timestamp_ms: i64) -> DateTime<Utc> {
  Utc.timestamp_millis_opt(timestamp_ms).single().unwrap_or_default()
}

/// DateTime<Utc>를 타임스탬프(밀리초)로 변환
pub fn datetime_to_timestamp(dt: DateTime<Utc>) -> i64 {
  dt.timestamp_millis()
}

/// 현재 시간을 타임스탬프(밀리초)로 반환
pub fn current_timestamp_ms() -> i64 {
  datetime_to_timestamp(Utc::now())
}

/// 타임스탬프(밀리초)를 포맷팅된 문자열로 변환
pub fn format_timestamp(timestamp_ms: i64, format: &str) -> String {
  let dt = timestamp_to_datetime(timestamp_ms);
  dt.format(format).to_string()
}

/// 기준 시각 대비 경과 시간 (밀리초, 미래 시각이면 0)
pub fn age_ms(timestamp_ms: i64, now_ms: i64) -> i64 {
  (now_ms - timestamp_ms).max(0)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_timestamp_conversion() {
    let now = Utc::now();
    let ts = datetime_to_timestamp(now);
    let dt = timestamp_to_datetime(ts);

    // 밀리초 변환으로 인한 손실 허용 (1초 이내)
    let diff = (now - dt).num_milliseconds().abs();
    assert!(diff < 1000);
  }

  #[test]
  fn test_format_timestamp() {
    assert_eq!(format_timestamp(0, "%Y-%m-%d"), "1970-01-01");
  }

  #[test]
  fn test_age_never_negative() {
    assert_eq!(age_ms(2_000, 1_000), 0);
    assert_eq!(age_ms(1_000, 61_000), 60_000);
  }
}
