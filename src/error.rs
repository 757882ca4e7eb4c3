/**
* filename : error
* author : HAMA
* date: 2025. 6. 2.
* description: 지표 엔진 / 캐시 계층 공통 오류
**/

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 지표 계산 결과에 그대로 담겨 캐시되므로 Clone + Serialize 를 유지한다.
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum IndicatorError {
    #[error("Validation failed: {}", .0.join("; "))]
    Validation(Vec<String>),

    #[error("Insufficient data: required {required}, got {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("Calculation error: {0}")]
    Calculation(String),

    #[error("Cache error: {0}")]
    Cache(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Timeout: {0}")]
    Timeout(String),
}

impl IndicatorError {
    /// 원격 캐시 장애처럼 "미스로 간주하고 재계산" 하면 되는 오류인지
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            IndicatorError::Cache(_) | IndicatorError::Serialization(_) | IndicatorError::Timeout(_)
        )
    }
}

impl From<serde_json::Error> for IndicatorError {
    fn from(e: serde_json::Error) -> Self {
        IndicatorError::Serialization(e.to_string())
    }
}

impl From<::config::ConfigError> for IndicatorError {
    fn from(e: ::config::ConfigError) -> Self {
        IndicatorError::Config(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = IndicatorError::Validation(vec!["a".to_string(), "b".to_string()]);
        assert_eq!(err.to_string(), "Validation failed: a; b");

        let err = IndicatorError::InsufficientData { required: 14, actual: 3 };
        assert_eq!(err.to_string(), "Insufficient data: required 14, got 3");
    }

    #[test]
    fn test_recoverable() {
        assert!(IndicatorError::Cache("down".into()).is_recoverable());
        assert!(!IndicatorError::Config("period".into()).is_recoverable());
    }
}
