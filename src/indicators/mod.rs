/**
* filename : mod
* author : HAMA
* date: 2025. 6. 2.
* description: 지표 공통 계약 (배치 계산 + 스트리밍 갱신)
**/
pub mod base;
pub mod params;
pub mod moving_averages;
pub mod oscillators;
pub mod suite;
pub mod trend;
pub mod utils;
pub mod volatility;

pub use base::*;
pub use params::*;
pub use moving_averages::*;
pub use oscillators::*;
pub use suite::*;
pub use trend::*;
pub use utils::*;
pub use volatility::*;

use std::fmt::Debug;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::cache::CacheCost;
use crate::error::IndicatorError;
use crate::models::market_data::MarketDataPoint;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSignal {
  pub name: String,
  pub strength: f64,  // -1.0(강력 매도) ~ 1.0(강력 매수)
  pub message: String,
}

impl IndicatorSignal {
  pub fn new(name: impl Into<String>, strength: f64, message: impl Into<String>) -> Self {
    IndicatorSignal {
      name: name.into(),
      strength: strength.max(-1.0).min(1.0),
      message: message.into(),
    }
  }
}

/// 과매도 / 중립 / 과매수 구간
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Zone {
  Oversold,
  Neutral,
  Overbought,
}

impl Zone {
  pub fn classify(value: f64, oversold: f64, overbought: f64) -> Self {
    if value >= overbought {
      Zone::Overbought
    } else if value <= oversold {
      Zone::Oversold
    } else {
      Zone::Neutral
    }
  }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossDirection {
  Up,
  Down,
}

impl CrossDirection {
  /// 이전 값과 현재 값 사이에서 기준선을 통과한 방향
  pub fn between(previous: f64, current: f64, level: f64) -> Option<Self> {
    if previous <= level && current > level {
      Some(CrossDirection::Up)
    } else if previous >= level && current < level {
      Some(CrossDirection::Down)
    } else {
      None
    }
  }
}

/// 스트리밍 갱신 중 감지된 레벨 교차 이벤트
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LevelCross {
  ZeroLine { direction: CrossDirection },
  SignalLine { direction: CrossDirection },
  Zone { from: Zone, to: Zone },
}

/// 스트리밍 지표 인스턴스의 누적 상태 요약
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct StreamingState {
  pub count: u64,
  pub is_stable: bool,
}

/// 스트리밍 갱신 한 단계의 결과
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StreamStep<T> {
  pub value: Option<T>,
  pub state: StreamingState,
}

/// 지표별 설정 타입이 구현하는 계약
pub trait IndicatorParams: Clone + Debug + Serialize + Send + Sync {
  /// 계산 전에 잘못된 기간/임계값을 거부
  fn validate(&self) -> Result<(), IndicatorError>;

  /// 캐시 키와 결과 메타데이터에 쓰는 태그 union 표현
  fn to_variant(&self) -> IndicatorConfig;
}

/// 지표 한 시점의 출력값이 구현하는 계약
pub trait IndicatorOutput:
  Copy + Debug + PartialEq + Serialize + DeserializeOwned + Send + Sync + CacheCost + 'static
{
  /// 변화량 계산에 사용하는 대표값
  fn primary(&self) -> f64;

  fn is_finite(&self) -> bool {
    self.primary().is_finite()
  }

  fn level_crosses(_previous: &Self, _current: &Self) -> Vec<LevelCross> {
    Vec::new()
  }
}

impl IndicatorOutput for f64 {
  fn primary(&self) -> f64 {
    *self
  }
}

/// The `Indicator` trait is the numeric core shared by every indicator.
/// Batch math is pure and synchronous; streaming state is owned by the instance.
pub trait Indicator: Debug + Send + Sync {
  type Config: IndicatorParams;
  type Output: IndicatorOutput;

  fn name(&self) -> &str;

  fn config(&self) -> &Self::Config;

  /// Replace the configuration; resets any streaming state
  fn set_config(&mut self, config: Self::Config) -> Result<(), IndicatorError>;

  /// Number of points required before the first valid value
  fn min_data_points(&self) -> usize;

  /// One value per input point, `None` before `min_data_points() - 1`
  fn compute(&self, data: &[MarketDataPoint]) -> Result<Vec<Option<Self::Output>>, IndicatorError>;

  /// O(1) update of the dedicated streaming state, if the indicator has one
  fn stream_update(&mut self, _point: &MarketDataPoint) -> Option<StreamStep<Self::Output>> {
    None
  }

  fn stream_reset(&mut self) {}
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_zone_classify() {
    assert_eq!(Zone::classify(25.0, 30.0, 70.0), Zone::Oversold);
    assert_eq!(Zone::classify(50.0, 30.0, 70.0), Zone::Neutral);
    assert_eq!(Zone::classify(70.0, 30.0, 70.0), Zone::Overbought);
  }

  #[test]
  fn test_cross_direction() {
    assert_eq!(CrossDirection::between(-1.0, 1.0, 0.0), Some(CrossDirection::Up));
    assert_eq!(CrossDirection::between(1.0, -1.0, 0.0), Some(CrossDirection::Down));
    assert_eq!(CrossDirection::between(1.0, 2.0, 0.0), None);
  }

  #[test]
  fn test_signal_strength_clamped() {
    let signal = IndicatorSignal::new("test", 3.0, "too strong");
    assert_eq!(signal.strength, 1.0);
  }
}
