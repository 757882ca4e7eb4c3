use serde::{Deserialize, Serialize};

use crate::indicators::{BollingerValue, IndicatorSignal, MacdValue, RsiValue, StochasticValue};

/// 한 시점의 지표 값 모음 (계산 불가한 지표는 None)
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct IndicatorSnapshot {
    pub sma: Option<f64>,
    pub ema: Option<f64>,
    pub rsi: Option<RsiValue>,
    pub macd: Option<MacdValue>,
    pub bollinger: Option<BollingerValue>,
    pub stochastic: Option<StochasticValue>,
}

impl IndicatorSnapshot {
    /// 스냅샷에 담기는 지표 종류 수
    pub const TOTAL: usize = 6;

    pub fn available(&self) -> usize {
        [
            self.sma.is_some(),
            self.ema.is_some(),
            self.rsi.is_some(),
            self.macd.is_some(),
            self.bollinger.is_some(),
            self.stochastic.is_some(),
        ]
        .iter()
        .filter(|present| **present)
        .count()
    }

    pub fn is_empty(&self) -> bool {
        self.available() == 0
    }

    /// 사용 가능한 지표 비율 (0 ~ 1)
    pub fn coverage(&self) -> f64 {
        self.available() as f64 / Self::TOTAL as f64
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureMetadata {
    /// 스키마 버전, 다르면 캐시 히트로 인정하지 않음
    pub version: u32,
    pub computed_at: i64,
    pub data_points_used: usize,
    pub confidence: f64,
    pub data_quality: f64,
}

/// (심볼, 타임스탬프, 버전) 으로 식별되는 피처 벡터
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub symbol: String,
    pub timestamp: i64,
    pub indicators: IndicatorSnapshot,
    #[serde(default)]
    pub patterns: Vec<IndicatorSignal>,
    pub metadata: FeatureMetadata,
}
