//! 데이터 모듈 오류 타입.

use cryo_core::SensorError;
use thiserror::Error;

/// 데이터 수집 관련 오류.
#[derive(Debug, Error)]
pub enum DataError {
    /// HTTP 전송 오류
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    /// 데이터 제공자 연결 준비 실패
    #[error("Connection error: {0}")]
    ConnectionError(String),

    /// 데이터 제공자가 에러 상태나 에러 객체를 반환
    #[error("Fetch error: {0}")]
    FetchError(String),

    /// 응답 파싱 오류
    #[error("Parse error: {0}")]
    ParseError(String),
}

/// 데이터 모듈 Result 타입.
pub type Result<T> = std::result::Result<T, DataError>;

impl From<DataError> for SensorError {
    fn from(err: DataError) -> Self {
        match err {
            DataError::Network(e) => SensorError::Transport(e.to_string()),
            DataError::ConnectionError(msg) => SensorError::Transport(msg),
            DataError::FetchError(msg) => SensorError::Provider(msg),
            DataError::ParseError(msg) => SensorError::Decode(msg),
        }
    }
}
