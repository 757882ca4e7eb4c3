/**
* filename : suite
* author : HAMA
* date: 2025. 6. 2.
* description: 피처 벡터에 들어가는 지표 엔진 묶음
**/

use crate::cache::CacheStats;
use crate::config::{CacheConfig, Config, IndicatorsConfig};
use crate::error::IndicatorError;
use crate::models::feature::IndicatorSnapshot;
use crate::models::market_data::MarketDataPoint;
use super::{
  BollingerIndicator, EmaIndicator, EngineMetrics, Indicator, IndicatorEngine, IndicatorOptions,
  IndicatorSignal, MacdIndicator, RsiIndicator, SmaIndicator, StochasticIndicator, Zone,
};

#[derive(Debug)]
pub struct IndicatorSuite {
  sma: IndicatorEngine<SmaIndicator>,
  ema: IndicatorEngine<EmaIndicator>,
  rsi: IndicatorEngine<RsiIndicator>,
  macd: IndicatorEngine<MacdIndicator>,
  bollinger: IndicatorEngine<BollingerIndicator>,
  stochastic: IndicatorEngine<StochasticIndicator>,
}

/// 엔진의 최소 데이터 수를 채운 경우에만 마지막 시점 값을 계산
fn latest_of<I: Indicator>(engine: &IndicatorEngine<I>, data: &[MarketDataPoint]) -> Option<I::Output> {
  if data.is_empty() || data.len() < engine.min_data_points() {
    return None;
  }

  let result = engine.calculate(data);
  if let Some(error) = &result.error {
    log::debug!("{} 스냅샷 제외: {}", engine.name(), error);
    return None;
  }
  result.value_at(data.len() - 1)
}

impl IndicatorSuite {
  pub fn new(
    config: &IndicatorsConfig,
    options: IndicatorOptions,
    cache: &CacheConfig,
  ) -> Result<Self, IndicatorError> {
    Ok(IndicatorSuite {
      sma: IndicatorEngine::new(SmaIndicator::new(config.sma.clone())?, options.clone(), cache)?,
      ema: IndicatorEngine::new(EmaIndicator::new(config.ema.clone())?, options.clone(), cache)?,
      rsi: IndicatorEngine::new(RsiIndicator::new(config.rsi.clone())?, options.clone(), cache)?,
      macd: IndicatorEngine::new(MacdIndicator::new(config.macd.clone())?, options.clone(), cache)?,
      bollinger: IndicatorEngine::new(BollingerIndicator::new(config.bollinger.clone())?, options.clone(), cache)?,
      stochastic: IndicatorEngine::new(StochasticIndicator::new(config.stochastic.clone())?, options, cache)?,
    })
  }

  pub fn from_config(config: &Config) -> Result<Self, IndicatorError> {
    IndicatorSuite::new(&config.indicators, config.indicator_options(), &config.cache)
  }

  /// 데이터 마지막 시점의 지표 스냅샷
  pub fn snapshot(&self, data: &[MarketDataPoint]) -> IndicatorSnapshot {
    IndicatorSnapshot {
      sma: latest_of(&self.sma, data),
      ema: latest_of(&self.ema, data),
      rsi: latest_of(&self.rsi, data),
      macd: latest_of(&self.macd, data),
      bollinger: latest_of(&self.bollinger, data),
      stochastic: latest_of(&self.stochastic, data),
    }
  }

  /// 하나라도 값을 내려면 필요한 최소 포인트 수
  pub fn min_data_points(&self) -> usize {
    [
      self.sma.min_data_points(),
      self.ema.min_data_points(),
      self.rsi.min_data_points(),
      self.macd.min_data_points(),
      self.bollinger.min_data_points(),
      self.stochastic.min_data_points(),
    ]
    .iter()
    .copied()
    .min()
    .unwrap_or(1)
  }

  /// 스냅샷에서 매수/매도 성향 신호 추출
  pub fn patterns(&self, snapshot: &IndicatorSnapshot, close: f64) -> Vec<IndicatorSignal> {
    let mut signals = Vec::new();

    if let Some(rsi) = snapshot.rsi {
      let config = self.rsi.indicator().config();
      // 과매수 영역 - 매도 신호
      if rsi.value > config.overbought {
        signals.push(IndicatorSignal::new(
          "RSI Overbought",
          -0.5 - (rsi.value - config.overbought) / 60.0,
          format!("RSI is overbought at {:.2}", rsi.value),
        ));
      }
      // 과매도 영역 - 매수 신호
      else if rsi.value < config.oversold {
        signals.push(IndicatorSignal::new(
          "RSI Oversold",
          0.5 + (config.oversold - rsi.value) / 60.0,
          format!("RSI is oversold at {:.2}", rsi.value),
        ));
      }
    }

    if let Some(macd) = snapshot.macd {
      if macd.macd > 0.0 && macd.histogram > 0.0 {
        signals.push(IndicatorSignal::new("MACD Above Zero", 0.3, "MACD is above zero line"));
      } else if macd.macd < 0.0 && macd.histogram < 0.0 {
        signals.push(IndicatorSignal::new("MACD Below Zero", -0.3, "MACD is below zero line"));
      }
    }

    if let Some(bands) = snapshot.bollinger {
      match bands.zone() {
        Zone::Overbought => signals.push(IndicatorSignal::new(
          "Bollinger Upper Breakout",
          -0.4,
          format!("Close {:.2} is above the upper band {:.2}", close, bands.upper),
        )),
        Zone::Oversold => signals.push(IndicatorSignal::new(
          "Bollinger Lower Breakout",
          0.4,
          format!("Close {:.2} is below the lower band {:.2}", close, bands.lower),
        )),
        Zone::Neutral => {}
      }

      if bands.is_squeeze(self.bollinger.indicator().squeeze_bandwidth()) {
        signals.push(IndicatorSignal::new(
          "Bollinger Squeeze",
          0.0,
          format!("Bandwidth {:.4} signals low volatility", bands.bandwidth),
        ));
      }
    }

    if let Some(stochastic) = snapshot.stochastic {
      match stochastic.zone {
        Zone::Overbought => signals.push(IndicatorSignal::new(
          "Stochastic Overbought",
          -0.4,
          format!("%K {:.2} / %D {:.2}", stochastic.k, stochastic.d),
        )),
        Zone::Oversold => signals.push(IndicatorSignal::new(
          "Stochastic Oversold",
          0.4,
          format!("%K {:.2} / %D {:.2}", stochastic.k, stochastic.d),
        )),
        Zone::Neutral => {}
      }
    }

    if let (Some(ema), Some(sma)) = (snapshot.ema, snapshot.sma) {
      if ema > sma {
        signals.push(IndicatorSignal::new("EMA Above SMA", 0.2, "Short-term momentum is positive"));
      } else if ema < sma {
        signals.push(IndicatorSignal::new("EMA Below SMA", -0.2, "Short-term momentum is negative"));
      }
    }

    signals
  }

  /// 각 엔진 캐시의 주기 정리 작업 시작
  pub fn start_maintenance(&self) {
    self.sma.cache().start_cleanup();
    self.ema.cache().start_cleanup();
    self.rsi.cache().start_cleanup();
    self.macd.cache().start_cleanup();
    self.bollinger.cache().start_cleanup();
    self.stochastic.cache().start_cleanup();
  }

  pub fn shutdown(&self) {
    self.sma.cache().shutdown();
    self.ema.cache().shutdown();
    self.rsi.cache().shutdown();
    self.macd.cache().shutdown();
    self.bollinger.cache().shutdown();
    self.stochastic.cache().shutdown();
  }

  pub fn cache_stats(&self) -> Vec<(String, CacheStats)> {
    vec![
      (self.sma.name().to_string(), self.sma.cache_stats()),
      (self.ema.name().to_string(), self.ema.cache_stats()),
      (self.rsi.name().to_string(), self.rsi.cache_stats()),
      (self.macd.name().to_string(), self.macd.cache_stats()),
      (self.bollinger.name().to_string(), self.bollinger.cache_stats()),
      (self.stochastic.name().to_string(), self.stochastic.cache_stats()),
    ]
  }

  pub fn metrics(&self) -> Vec<(String, EngineMetrics)> {
    vec![
      (self.sma.name().to_string(), self.sma.metrics()),
      (self.ema.name().to_string(), self.ema.metrics()),
      (self.rsi.name().to_string(), self.rsi.metrics()),
      (self.macd.name().to_string(), self.macd.metrics()),
      (self.bollinger.name().to_string(), self.bollinger.metrics()),
      (self.stochastic.name().to_string(), self.stochastic.metrics()),
    ]
  }
}
