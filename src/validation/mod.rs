/**
* filename : mod
* author : HAMA
* date: 2025. 6. 2.
* description: 시장 데이터 품질 검증
**/
pub mod outliers;
pub mod validator;

pub use outliers::*;
pub use validator::*;

use serde::{Deserialize, Serialize};

use crate::error::IndicatorError;

/// 검증 엄격도
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strictness {
  Strict,
  #[default]
  Normal,
  /// 발견 사항은 참고용, is_valid 는 항상 true (데이터 부족 제외)
  Relaxed,
}

/// 종가 이상치 탐지 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutlierMethod {
  #[default]
  Iqr,
  ZScore,
  ModifiedZScore,
}

/// 엄격도별 허용 한계
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Thresholds {
  /// 중앙값 간격의 몇 배를 넘으면 공백으로 보는지
  pub max_gap_factor: f64,
  /// 한 스텝 최대 가격 변화율 (%)
  pub max_price_change_pct: f64,
  pub iqr_multiplier: f64,
  pub z_score: f64,
  pub modified_z_score: f64,
}

impl Thresholds {
  pub fn for_strictness(strictness: Strictness) -> Self {
    match strictness {
      Strictness::Strict => Thresholds {
        max_gap_factor: 3.0,
        max_price_change_pct: 10.0,
        iqr_multiplier: 1.5,
        z_score: 2.5,
        modified_z_score: 3.0,
      },
      Strictness::Normal => Thresholds {
        max_gap_factor: 5.0,
        max_price_change_pct: 25.0,
        iqr_multiplier: 3.0,
        z_score: 3.0,
        modified_z_score: 3.5,
      },
      Strictness::Relaxed => Thresholds {
        max_gap_factor: 20.0,
        max_price_change_pct: 50.0,
        iqr_multiplier: 5.0,
        z_score: 4.0,
        modified_z_score: 5.0,
      },
    }
  }
}

/// 품질 점수 구성 요소 (각 0 ~ 1)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct QualityBreakdown {
  pub completeness: f64,
  pub consistency: f64,
  pub accuracy: f64,
  pub timeliness: f64,
  pub uniqueness: f64,
}

impl QualityBreakdown {
  pub fn score(&self) -> f64 {
    let score = self.completeness * 0.25
      + self.consistency * 0.25
      + self.accuracy * 0.2
      + self.timeliness * 0.15
      + self.uniqueness * 0.15;
    score.max(0.0).min(1.0)
  }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DataStatistics {
  pub count: usize,
  pub first_timestamp: Option<i64>,
  pub last_timestamp: Option<i64>,
  pub mean_close: f64,
  pub std_close: f64,
  pub min_close: f64,
  pub max_close: f64,
  pub mean_volume: f64,
  pub median_interval_ms: Option<f64>,
  pub gap_count: usize,
  pub spike_count: usize,
  pub outlier_count: usize,
  pub duplicate_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationReport {
  pub is_valid: bool,
  pub errors: Vec<String>,
  pub warnings: Vec<String>,
  pub quality_score: f64,
  pub quality: QualityBreakdown,
  pub suggestions: Vec<String>,
  pub statistics: DataStatistics,
  pub required_points: usize,
}

impl ValidationReport {
  pub fn is_insufficient(&self) -> bool {
    self.statistics.count < self.required_points
  }

  /// 실패한 리포트를 호출자에게 돌려줄 오류로 변환
  pub fn to_error(&self) -> Option<IndicatorError> {
    if self.is_valid {
      return None;
    }
    if self.is_insufficient() {
      return Some(IndicatorError::InsufficientData {
        required: self.required_points,
        actual: self.statistics.count,
      });
    }
    Some(IndicatorError::Validation(self.errors.clone()))
  }
}

/// 실시간 단일 포인트 검증 결과
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct RealtimeValidation {
  pub is_valid: bool,
  pub errors: Vec<String>,
  pub warnings: Vec<String>,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_thresholds_tighten_with_strictness() {
    let strict = Thresholds::for_strictness(Strictness::Strict);
    let normal = Thresholds::for_strictness(Strictness::Normal);
    let relaxed = Thresholds::for_strictness(Strictness::Relaxed);

    assert!(strict.max_gap_factor < normal.max_gap_factor);
    assert!(normal.max_price_change_pct < relaxed.max_price_change_pct);
    assert!(strict.iqr_multiplier < relaxed.iqr_multiplier);
  }

  #[test]
  fn test_quality_weights_sum_to_one() {
    let perfect = QualityBreakdown {
      completeness: 1.0,
      consistency: 1.0,
      accuracy: 1.0,
      timeliness: 1.0,
      uniqueness: 1.0,
    };
    assert!((perfect.score() - 1.0).abs() < 1e-12);
    assert_eq!(QualityBreakdown::default().score(), 0.0);
  }

  #[test]
  fn test_strictness_serde() {
    let parsed: Strictness = serde_json::from_str("\"relaxed\"").unwrap();
    assert_eq!(parsed, Strictness::Relaxed);
    assert_eq!(serde_json::to_string(&OutlierMethod::ModifiedZScore).unwrap(), "\"modified_z_score\"");
  }
}
