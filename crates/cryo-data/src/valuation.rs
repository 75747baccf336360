//! 밸류에이션 지표 수집.
//!
//! Yahoo Finance quote summary(`get_ticker_info`)에서 시가총액, PER, PBR, EPS,
//! 배당수익률 등을 가져옵니다. crumb 토큰 인증은 `yahoo_finance_api`가 처리합니다.

use async_trait::async_trait;
use rust_decimal::prelude::FromPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::{DataError, Result};
use crate::yahoo::round_decimal_from_f64;

/// 비율(0.05)을 퍼센트(5.00)로 변환, 소수점 2자리.
fn ratio_to_percent(value: f64) -> Option<Decimal> {
    Decimal::from_f64(value * 100.0).map(|d| d.round_dp(2))
}

/// 밸류에이션 지표. 제공자가 주지 않은 값은 `None`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValuationMetrics {
    /// 종목명
    pub name: Option<String>,
    pub market_cap: Option<Decimal>,
    /// trailing PE
    pub per: Option<Decimal>,
    /// forward PE
    pub forward_per: Option<Decimal>,
    /// price to book
    pub pbr: Option<Decimal>,
    /// trailing EPS
    pub eps: Option<Decimal>,
    /// 배당수익률 (%)
    pub dividend_yield: Option<Decimal>,
    /// ROE (%)
    pub roe: Option<Decimal>,
}

impl ValuationMetrics {
    /// 지표가 하나도 없는지 확인합니다.
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// 밸류에이션 지표 제공자.
#[async_trait]
pub trait ValuationSource: Send + Sync {
    /// 티커의 밸류에이션 지표를 조회합니다.
    async fn valuation(&self, ticker: &str) -> Result<ValuationMetrics>;
}

/// `yahoo_finance_api` 기반 밸류에이션 제공자.
pub struct YahooTickerInfo {
    /// get_ticker_info가 `&mut self`를 요구하므로 Mutex로 감쌈
    connector: Mutex<yahoo_finance_api::YahooConnector>,
}

impl YahooTickerInfo {
    /// 새 제공자를 생성합니다.
    pub fn new() -> Result<Self> {
        let connector = yahoo_finance_api::YahooConnector::new()
            .map_err(|e| DataError::ConnectionError(format!("Yahoo Finance 연결 실패: {}", e)))?;
        Ok(Self {
            connector: Mutex::new(connector),
        })
    }
}

#[async_trait]
impl ValuationSource for YahooTickerInfo {
    async fn valuation(&self, ticker: &str) -> Result<ValuationMetrics> {
        let summary = self
            .connector
            .lock()
            .await
            .get_ticker_info(ticker)
            .await
            .map_err(|e| {
                DataError::FetchError(format!("Yahoo ticker info 조회 실패 ({}): {}", ticker, e))
            })?;

        let quote_summary = summary.quote_summary.ok_or_else(|| {
            DataError::FetchError(format!("Yahoo ticker info 결과 없음: {}", ticker))
        })?;
        let result_data = quote_summary
            .result
            .and_then(|r| r.into_iter().next())
            .ok_or_else(|| {
                DataError::FetchError(format!("Yahoo ticker info 결과 비어있음: {}", ticker))
            })?;

        let summary_detail = result_data.summary_detail.as_ref();
        let key_stats = result_data.default_key_statistics.as_ref();
        let financial_data = result_data.financial_data.as_ref();

        let forward_pe_from_sd = summary_detail
            .and_then(|sd| sd.forward_pe)
            .and_then(round_decimal_from_f64);

        let metrics = ValuationMetrics {
            name: result_data
                .quote_type
                .as_ref()
                .and_then(|qt| qt.long_name.clone().or(qt.short_name.clone())),
            market_cap: summary_detail
                .and_then(|sd| sd.market_cap)
                .and_then(Decimal::from_u64),
            per: summary_detail
                .and_then(|sd| sd.trailing_pe)
                .and_then(round_decimal_from_f64),
            forward_per: key_stats
                .and_then(|ks| ks.forward_pe)
                .and_then(round_decimal_from_f64)
                .or(forward_pe_from_sd),
            pbr: key_stats
                .and_then(|ks| ks.price_to_book)
                .and_then(round_decimal_from_f64),
            eps: key_stats
                .and_then(|ks| ks.trailing_eps)
                .and_then(round_decimal_from_f64),
            dividend_yield: summary_detail
                .and_then(|sd| sd.trailing_annual_dividend_yield)
                .and_then(ratio_to_percent),
            roe: financial_data
                .and_then(|fd| fd.return_on_equity)
                .and_then(ratio_to_percent),
        };

        debug!(
            ticker = ticker,
            market_cap = ?metrics.market_cap,
            per = ?metrics.per,
            pbr = ?metrics.pbr,
            "밸류에이션 지표 수집 완료"
        );
        Ok(metrics)
    }
}
