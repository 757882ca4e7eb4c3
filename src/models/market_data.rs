use serde::{Deserialize, Serialize};

/// 하나의 OHLCV 캔들
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketDataPoint {
    pub timestamp: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl MarketDataPoint {
    pub fn new(timestamp: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> Self {
        MarketDataPoint {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    /// 시가=고가=저가=종가 인 캔들
    pub fn flat(timestamp: i64, price: f64, volume: f64) -> Self {
        MarketDataPoint::new(timestamp, price, price, price, price, volume)
    }

    pub fn typical_price(&self) -> f64 {
        (self.high + self.low + self.close) / 3.0
    }

    pub fn median_price(&self) -> f64 {
        (self.high + self.low) / 2.0
    }

    pub fn weighted_close(&self) -> f64 {
        (self.high + self.low + self.close * 2.0) / 4.0
    }

    pub fn is_finite(&self) -> bool {
        self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite()
            && self.volume.is_finite()
    }

    /// high >= low, high >= max(open, close), low <= min(open, close)
    pub fn is_ohlc_consistent(&self) -> bool {
        self.high >= self.low
            && self.high >= self.open.max(self.close)
            && self.low <= self.open.min(self.close)
    }
}

/// 지표 계산에 사용할 가격 추출 방식
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSource {
    #[default]
    Close,
    Open,
    High,
    Low,
    /// (H + L + C) / 3
    Typical,
    /// (H + L) / 2
    Median,
    /// (H + L + 2C) / 4
    Weighted,
}

impl PriceSource {
    pub fn extract(&self, point: &MarketDataPoint) -> f64 {
        match self {
            PriceSource::Close => point.close,
            PriceSource::Open => point.open,
            PriceSource::High => point.high,
            PriceSource::Low => point.low,
            PriceSource::Typical => point.typical_price(),
            PriceSource::Median => point.median_price(),
            PriceSource::Weighted => point.weighted_close(),
        }
    }

    pub fn series(&self, data: &[MarketDataPoint]) -> Vec<f64> {
        data.iter().map(|p| self.extract(p)).collect()
    }
}
