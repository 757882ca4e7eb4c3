//! 로깅 유틸리티
//!
//! 로그 초기화 및 유틸리티 함수 제공

use env_logger::Builder;
use log::LevelFilter;
use std::env;

use crate::error::IndicatorError;

fn parse_level(level: &str) -> LevelFilter {
    match level.to_lowercase().as_str() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        "off" => LevelFilter::Off,
        _ => LevelFilter::Info,
    }
}

/// 로깅 시스템 초기화
///
/// RUST_LOG 환경변수가 있으면 설정값보다 우선한다.
pub fn init(configured_level: &str) -> Result<(), IndicatorError> {
    let mut builder = Builder::from_default_env();

    let log_level = env::var("RUST_LOG").unwrap_or_else(|_| configured_level.to_string());

    builder
        .filter_level(parse_level(&log_level))
        .format_timestamp_millis()
        .try_init()
        .map_err(|e| IndicatorError::Config(format!("Failed to initialise logger: {}", e)))?;

    log::info!("로깅 시스템 초기화 완료: 레벨 = {}", log_level);

    Ok(())
}

/// 지표 계산 완료 로그
pub fn log_calculation(indicator: &str, points: usize, elapsed_ms: f64, cached: bool) {
    log::debug!(
        "지표 계산: {} - 데이터: {} - 소요: {:.3}ms - 캐시: {}",
        indicator, points, elapsed_ms, cached
    );
}

/// 캐시 축출 로그
pub fn log_cache_eviction(evicted: usize, remaining: usize, memory_bytes: usize) {
    log::debug!(
        "캐시 축출: {}건 - 남은 항목: {} - 메모리: {} bytes",
        evicted, remaining, memory_bytes
    );
}

/// 원격 캐시 장애 로그 (미스로 처리하고 재계산)
pub fn log_remote_cache_failure(operation: &str, key: &str, error: &IndicatorError) {
    log::warn!("원격 캐시 실패 - {} {}: {} (재계산으로 대체)", operation, key, error);
}

/// 오류 로그
pub fn log_error(context: &str, error: &IndicatorError) {
    log::error!("오류 발생 - {}: {}", context, error);
}
