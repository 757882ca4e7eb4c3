/**
* filename : utils
* author : HAMA
* date: 2025. 6. 2.
* description: 데이터 지문 / 캐시 키 생성
**/

use sha2::{Digest, Sha256};

use crate::error::IndicatorError;
use crate::models::market_data::MarketDataPoint;
use super::IndicatorConfig;

/// 체크섬으로 남길 해시 바이트 수
const CHECKSUM_BYTES: usize = 8;

/// 데이터 내용 지문: 길이 + 첫/마지막 타임스탬프 + 가격/거래량 체크섬
pub fn data_fingerprint(data: &[MarketDataPoint]) -> String {
  let mut hasher = Sha256::new();
  for point in data {
    hasher.update(point.timestamp.to_le_bytes());
    hasher.update(point.open.to_bits().to_le_bytes());
    hasher.update(point.high.to_bits().to_le_bytes());
    hasher.update(point.low.to_bits().to_le_bytes());
    hasher.update(point.close.to_bits().to_le_bytes());
    hasher.update(point.volume.to_bits().to_le_bytes());
  }
  let digest = hasher.finalize();

  format!(
    "{}:{}:{}:{}",
    data.len(),
    data.first().map(|p| p.timestamp).unwrap_or(0),
    data.last().map(|p| p.timestamp).unwrap_or(0),
    hex::encode(&digest[..CHECKSUM_BYTES])
  )
}

/// `(이름, 설정, 지문)` 의 결정적 함수인 캐시 키
pub fn cache_key(name: &str, config: &IndicatorConfig, fingerprint: &str) -> Result<String, IndicatorError> {
  let config_json = serde_json::to_vec(config)?;
  let config_hash = Sha256::digest(&config_json);

  Ok(format!(
    "indicator:{}:{}:{}",
    name,
    hex::encode(&config_hash[..CHECKSUM_BYTES]),
    fingerprint
  ))
}
