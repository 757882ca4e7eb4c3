//! 원격 피처 저장소 계층
//!
//! 키-값 저장소 프로토콜, 피처 벡터 캐시, 지표 계산과의 통합 서비스

pub mod integration;
pub mod kv;
pub mod store;

pub use integration::{BatchFeatures, FeatureLookup, FeatureService};
pub use kv::{InMemoryKeyValueStore, KeyValueStore};
pub use store::{
    BatchError, BatchLookup, FeatureRequest, FeatureStore, FeatureStoreStats, HealthReport, HealthStatus, TtlTier,
};
