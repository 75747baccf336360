//! Yahoo Finance 펀더멘털 센서.
//!
//! Yahoo Finance v8 chart API에서 1년치 일봉과 메타데이터를 받아
//! 현재가, 52주 고저가, 평균 거래량 등 요약 지표를 계산하고,
//! quote summary의 밸류에이션 지표(시가총액, PER, PBR, EPS, 배당수익률)를 더합니다.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use cryo_core::{Sensor, SensorError, SignalPayload};
use reqwest::{Client, StatusCode};
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{DataError, Result};
use crate::valuation::{ValuationMetrics, ValuationSource, YahooTickerInfo};

/// 기본 Yahoo Finance API 주소.
pub const DEFAULT_YAHOO_BASE_URL: &str = "https://query1.finance.yahoo.com";

/// 기본 요청 타임아웃.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

/// 약 3개월 거래일 수
const TRADING_DAYS_3M: usize = 63;

/// f64를 Decimal로 변환 후 소수점 4자리로 반올림.
pub(crate) fn round_decimal_from_f64(value: f64) -> Option<Decimal> {
    Decimal::from_f64(value).map(|d| d.round_dp(4))
}

/// 센서가 내보내는 펀더멘털 요약.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FundamentalSnapshot {
    pub symbol: String,
    pub currency: Option<String>,
    pub exchange: Option<String>,
    pub instrument_type: Option<String>,

    // 가격
    pub regular_market_price: Option<Decimal>,
    pub previous_close: Option<Decimal>,
    pub change_percent: Option<Decimal>,
    pub week_52_high: Option<Decimal>,
    pub week_52_low: Option<Decimal>,

    // 거래량
    pub avg_volume_10d: Option<i64>,
    pub avg_volume_3m: Option<i64>,

    pub last_trading_date: Option<NaiveDate>,

    // 밸류에이션 (quote summary)
    #[serde(flatten)]
    pub valuation: ValuationMetrics,

    pub fetched_at: DateTime<Utc>,
}

/// Yahoo Finance API v8 응답 구조
#[derive(Debug, Deserialize)]
struct YahooChartResponse {
    chart: YahooChart,
}

#[derive(Debug, Deserialize)]
struct YahooChart {
    result: Option<Vec<YahooResult>>,
    error: Option<YahooError>,
}

#[derive(Debug, Deserialize)]
struct YahooError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct YahooResult {
    meta: Option<YahooMeta>,
    timestamp: Option<Vec<i64>>,
    indicators: Option<YahooIndicators>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct YahooMeta {
    symbol: Option<String>,
    currency: Option<String>,
    exchange_name: Option<String>,
    instrument_type: Option<String>,
    regular_market_price: Option<f64>,
    chart_previous_close: Option<f64>,
    previous_close: Option<f64>,
    fifty_two_week_high: Option<f64>,
    fifty_two_week_low: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct YahooIndicators {
    quote: Vec<YahooQuote>,
}

#[derive(Debug, Default, Deserialize)]
struct YahooQuote {
    high: Option<Vec<Option<f64>>>,
    low: Option<Vec<Option<f64>>>,
    close: Option<Vec<Option<f64>>>,
    volume: Option<Vec<Option<i64>>>,
}

/// 최근 `n`개 유효 거래량의 평균.
fn average_recent_volume(volumes: &[Option<i64>], n: usize) -> Option<i64> {
    let recent: Vec<i64> = volumes.iter().rev().filter_map(|v| *v).take(n).collect();
    if recent.is_empty() {
        None
    } else {
        Some(recent.iter().sum::<i64>() / recent.len() as i64)
    }
}

/// chart API 응답 본문을 요약으로 변환합니다.
///
/// 결과가 비어 있으면 `Ok(None)`, 응답에 에러 객체가 있으면 `FetchError`.
pub fn parse_chart(ticker: &str, body: &str) -> Result<Option<FundamentalSnapshot>> {
    let response: YahooChartResponse = serde_json::from_str(body)
        .map_err(|e| DataError::ParseError(format!("Yahoo Finance 응답 파싱 실패: {}", e)))?;

    if let Some(error) = response.chart.error {
        return Err(DataError::FetchError(format!(
            "Yahoo Finance error: {} - {}",
            error.code, error.description
        )));
    }

    let Some(result) = response.chart.result.and_then(|r| r.into_iter().next()) else {
        return Ok(None);
    };

    let quote = result
        .indicators
        .and_then(|i| i.quote.into_iter().next())
        .unwrap_or_default();
    let highs = quote.high.unwrap_or_default();
    let lows = quote.low.unwrap_or_default();
    let closes = quote.close.unwrap_or_default();
    let volumes = quote.volume.unwrap_or_default();
    let timestamps = result.timestamp.unwrap_or_default();

    let Some(meta) = result.meta else {
        if closes.iter().all(Option::is_none) {
            return Ok(None);
        }
        return Err(DataError::ParseError("메타데이터 없음".to_string()));
    };

    let last_close = closes.iter().rev().find_map(|c| *c);
    let price = meta.regular_market_price.or(last_close);
    if price.is_none() {
        return Ok(None);
    }

    let previous_close = meta.previous_close.or(meta.chart_previous_close);

    // 메타데이터에 없으면 일봉에서 계산
    let week_52_high = meta.fifty_two_week_high.or_else(|| {
        highs
            .iter()
            .filter_map(|h| *h)
            .max_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
    });
    let week_52_low = meta.fifty_two_week_low.or_else(|| {
        lows.iter()
            .filter_map(|l| *l)
            .min_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal))
    });

    let change_percent = match (price, previous_close) {
        (Some(p), Some(prev)) if prev != 0.0 => {
            Decimal::from_f64((p - prev) / prev * 100.0).map(|d| d.round_dp(2))
        }
        _ => None,
    };

    let last_trading_date = timestamps
        .last()
        .and_then(|ts| DateTime::from_timestamp(*ts, 0))
        .map(|dt| dt.date_naive());

    Ok(Some(FundamentalSnapshot {
        symbol: meta.symbol.unwrap_or_else(|| ticker.to_string()),
        currency: meta.currency,
        exchange: meta.exchange_name,
        instrument_type: meta.instrument_type,
        regular_market_price: price.and_then(round_decimal_from_f64),
        previous_close: previous_close.and_then(round_decimal_from_f64),
        change_percent,
        week_52_high: week_52_high.and_then(round_decimal_from_f64),
        week_52_low: week_52_low.and_then(round_decimal_from_f64),
        avg_volume_10d: average_recent_volume(&volumes, 10),
        avg_volume_3m: average_recent_volume(&volumes, TRADING_DAYS_3M),
        last_trading_date,
        valuation: ValuationMetrics::default(),
        fetched_at: Utc::now(),
    }))
}

/// Yahoo Finance 센서 설정.
#[derive(Debug, Clone)]
pub struct YahooSensorConfig {
    /// API 주소 (테스트에서는 mock 서버)
    pub base_url: String,
    /// 요청 타임아웃
    pub timeout: Duration,
    /// quote summary 밸류에이션 조회 여부
    pub ticker_info: bool,
}

impl Default for YahooSensorConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_YAHOO_BASE_URL.to_string(),
            timeout: DEFAULT_TIMEOUT,
            ticker_info: true,
        }
    }
}

/// 단일 티커의 펀더멘털 요약을 수집하는 센서.
pub struct YahooFundamentalSensor {
    client: Client,
    ticker: String,
    base_url: String,
    valuation: Option<Arc<dyn ValuationSource>>,
}

impl YahooFundamentalSensor {
    /// 기본 설정으로 센서를 생성합니다.
    pub fn new(ticker: impl Into<String>) -> Result<Self> {
        Self::with_config(ticker, YahooSensorConfig::default())
    }

    /// 주어진 설정으로 센서를 생성합니다.
    pub fn with_config(ticker: impl Into<String>, config: YahooSensorConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .build()?;

        let valuation: Option<Arc<dyn ValuationSource>> = if config.ticker_info {
            Some(Arc::new(YahooTickerInfo::new()?))
        } else {
            None
        };

        Ok(Self {
            client,
            ticker: ticker.into(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            valuation,
        })
    }

    /// 밸류에이션 제공자를 교체합니다.
    pub fn with_valuation_source(mut self, source: Arc<dyn ValuationSource>) -> Self {
        self.valuation = Some(source);
        self
    }

    /// 대상 티커.
    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    /// chart API를 호출해 요약을 만듭니다. 404는 데이터 없음으로 취급합니다.
    pub async fn fetch_snapshot(&self) -> Result<Option<FundamentalSnapshot>> {
        let url = format!("{}/v8/finance/chart/{}", self.base_url, self.ticker);
        debug!(ticker = %self.ticker, url = %url, "Yahoo Finance 차트 조회");

        let response = self
            .client
            .get(&url)
            .query(&[("range", "1y"), ("interval", "1d")])
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            warn!(ticker = %self.ticker, "Yahoo Finance에 해당 티커 없음");
            return Ok(None);
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(DataError::FetchError(format!(
                "HTTP {}: {}",
                status.as_u16(),
                body
            )));
        }

        let body = response.text().await?;
        debug!(bytes = body.len(), "Yahoo Finance 응답 수신");

        let Some(mut snapshot) = parse_chart(&self.ticker, &body)? else {
            return Ok(None);
        };

        // 밸류에이션 실패는 가격 통계만으로 진행
        if let Some(source) = &self.valuation {
            match source.valuation(&self.ticker).await {
                Ok(metrics) => snapshot.valuation = metrics,
                Err(e) => warn!(
                    ticker = %self.ticker,
                    error = %e,
                    "밸류에이션 조회 실패, 가격 통계만 사용"
                ),
            }
        }

        info!(
            symbol = %snapshot.symbol,
            price = ?snapshot.regular_market_price,
            market_cap = ?snapshot.valuation.market_cap,
            per = ?snapshot.valuation.per,
            "펀더멘털 데이터 수집 완료"
        );
        Ok(Some(snapshot))
    }
}

#[async_trait]
impl Sensor for YahooFundamentalSensor {
    async fn fetch(&self) -> std::result::Result<Option<SignalPayload>, SensorError> {
        let Some(snapshot) = self.fetch_snapshot().await? else {
            return Ok(None);
        };
        let payload = serde_json::to_value(&snapshot)
            .map_err(|e| DataError::ParseError(format!("요약 직렬화 실패: {}", e)))?;
        Ok(Some(payload))
    }

    fn name(&self) -> &str {
        "yahoo_fundamentals"
    }
}
