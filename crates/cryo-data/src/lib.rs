//! 시장 데이터 센서.
//!
//! 이 crate는 다음을 제공합니다:
//! - Yahoo Finance chart API 기반 펀더멘털 센서
//! - Yahoo Finance quote summary 기반 밸류에이션 지표
//! - 데이터 수집 오류 타입

pub mod error;
pub mod valuation;
pub mod yahoo;

pub use error::{DataError, Result};
pub use valuation::{ValuationMetrics, ValuationSource, YahooTickerInfo};
pub use yahoo::{
    parse_chart, FundamentalSnapshot, YahooFundamentalSensor, YahooSensorConfig,
    DEFAULT_TIMEOUT, DEFAULT_YAHOO_BASE_URL,
};
