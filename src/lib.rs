//! 기술 지표 피처 엔진 라이브러리
//!
//! 데이터 검증, 지표 계산 (배치 + 스트리밍), 프로세스 내 캐시와 원격 피처 저장소를 제공합니다.

pub mod cache;
pub mod config;
pub mod error;
pub mod feature_store;
pub mod indicators;
pub mod models;
pub mod utils;
pub mod validation;

// 핵심 타입 재노출
pub use crate::cache::{CacheManager, CacheStats};
pub use crate::config::Config;
pub use crate::error::IndicatorError;
pub use crate::feature_store::{FeatureService, FeatureStore, InMemoryKeyValueStore, KeyValueStore};
pub use crate::indicators::{Indicator, IndicatorEngine, IndicatorResult, IndicatorSuite, IndicatorUpdate};
pub use crate::models::feature::FeatureVector;
pub use crate::models::market_data::MarketDataPoint;
pub use crate::validation::{DataValidator, ValidationReport};

/// 버전 정보
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 결과 타입 별칭
pub type Result<T> = std::result::Result<T, IndicatorError>;
