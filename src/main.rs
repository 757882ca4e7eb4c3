/**
* filename : main
* author : HAMA
* date: 2025. 6. 2.
* description: 캔들 데이터로 피처 벡터를 계산해 JSON 으로 출력하는 데모
**/

use std::path::Path;
use std::sync::Arc;

use rand::Rng;

use xFeature::config::Config;
use xFeature::feature_store::{FeatureService, InMemoryKeyValueStore};
use xFeature::models::market_data::MarketDataPoint;
use xFeature::utils::{self, logging};

/// 합성 데이터 캔들 수
const SYNTHETIC_CANDLES: usize = 200;

/// 출력할 마지막 벡터 수
const OUTPUT_WINDOW: usize = 5;

#[tokio::main]
async fn main() -> Result<(), anyhow::Error> {
    // 설정 로드
    let config = Config::load()?;

    // 로깅 초기화
    logging::init(&config.logging.level)?;
    log::info!("피처 엔진 데모 시작 (v{})", xFeature::VERSION);

    // 명령줄 인수: [csv 경로] [심볼]
    let args: Vec<String> = std::env::args().collect();
    let symbol = args.get(2).cloned().unwrap_or_else(|| "BTCUSDT".to_string());

    let candles = match args.get(1) {
        Some(path) => load_csv(Path::new(path))?,
        None => random_walk(SYNTHETIC_CANDLES),
    };
    let (first, last) = match (candles.first(), candles.last()) {
        (Some(first), Some(last)) => (first.timestamp, last.timestamp),
        _ => anyhow::bail!("no candles to process"),
    };
    log::info!(
        "{} 캔들 {}개 준비 ({} ~ {})",
        symbol,
        candles.len(),
        utils::format_timestamp(first, "%Y-%m-%d %H:%M"),
        utils::format_timestamp(last, "%Y-%m-%d %H:%M")
    );

    let backend = Arc::new(InMemoryKeyValueStore::new());
    let service = FeatureService::from_config(&config, backend)?;
    service.start_maintenance();

    let end = candles.len() - 1;
    let start = end.saturating_sub(OUTPUT_WINDOW - 1);
    let features = service.get_features_range(&symbol, &candles, start, end).await;

    println!("{}", serde_json::to_string_pretty(&features)?);

    // 두 번째 호출은 저장소에서 바로 응답
    let again = service.get_features_range(&symbol, &candles, start, end).await;
    log::info!("재조회 {}건", again.len());

    let health = service.health_check().await;
    println!("\n=== 저장소 상태 ===");
    println!("{:?} ({:.2}ms) {}", health.status, health.latency_ms, health.message);

    let stats = service.stats();
    println!("\n=== 저장소 통계 ===");
    println!("hits: {} / misses: {} / stale: {} / errors: {} / writes: {}",
        stats.hits, stats.misses, stats.stale, stats.errors, stats.writes);

    println!("\n=== 지표 캐시 ===");
    for (name, cache) in service.cache_stats() {
        println!("{}: {} entries, hit ratio {:.2}, {} bytes", name, cache.size, cache.hit_ratio, cache.memory_usage);
    }

    service.shutdown();
    Ok(())
}

/// timestamp,open,high,low,close,volume 헤더를 가진 CSV
fn load_csv(path: &Path) -> Result<Vec<MarketDataPoint>, anyhow::Error> {
    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .from_path(path)?;

    let mut candles = Vec::new();
    for record in rdr.deserialize() {
        let point: MarketDataPoint = record?;
        candles.push(point);
    }

    candles.sort_by_key(|p| p.timestamp);
    Ok(candles)
}

/// 1분봉 랜덤 워크
fn random_walk(count: usize) -> Vec<MarketDataPoint> {
    let mut rng = rand::thread_rng();
    let start = utils::current_timestamp_ms() - count as i64 * 60_000;
    let mut price = 30_000.0_f64;

    (0..count)
        .map(|i| {
            let open = price;
            let close = (open * (1.0 + rng.gen_range(-0.004..0.004))).max(1.0);
            let high = open.max(close) * (1.0 + rng.gen_range(0.0..0.002));
            let low = open.min(close) * (1.0 - rng.gen_range(0.0..0.002));
            let volume = rng.gen_range(5.0..50.0);
            price = close;

            MarketDataPoint::new(start + i as i64 * 60_000, open, high, low, close, volume)
        })
        .collect()
}
