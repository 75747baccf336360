//! 시그널 파이프라인 에러 타입.
//!
//! 설정 단계(`ConfigError`), 센서 단계(`SensorError`), 전달 단계(`SinkError`,
//! `DeliveryError`)로 나뉩니다. 설정 에러는 파이프라인에 도달하지 않습니다.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::config::Destination;

/// 설정 에러 시 프로세스 종료 코드.
pub const CONFIG_ERROR_EXIT_CODE: i32 = 2;

/// 전달 실패 시 프로세스 종료 코드.
pub const DELIVERY_ERROR_EXIT_CODE: i32 = 1;

/// 설정 검증 위반 유형.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViolationKind {
    /// 어떤 레이어에도 값이 없음 (또는 null)
    Missing,
    /// 값은 있으나 형식/내용이 잘못됨
    Invalid(String),
}

/// 단일 설정 키에 대한 검증 위반.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Violation {
    /// 문제가 된 설정 키
    pub key: String,
    /// 위반 유형
    pub kind: ViolationKind,
}

impl Violation {
    /// 누락 위반을 생성합니다.
    pub fn missing(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            kind: ViolationKind::Missing,
        }
    }

    /// 잘못된 값 위반을 생성합니다.
    pub fn invalid(key: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            kind: ViolationKind::Invalid(reason.into()),
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ViolationKind::Missing => write!(f, "{} (누락)", self.key),
            ViolationKind::Invalid(reason) => write!(f, "{} (잘못된 값: {})", self.key, reason),
        }
    }
}

fn join_violations(violations: &[Violation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// 설정 해석 에러.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 설정 파일 파싱 실패
    #[error("설정 파일 파싱 실패 ({}): {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: config::ConfigError,
    },

    /// 환경 변수 읽기 실패
    #[error("환경 변수 읽기 실패: {0}")]
    Environment(#[source] config::ConfigError),

    /// 필수 설정 누락 또는 잘못된 값 (모든 위반을 한 번에 보고)
    #[error("설정 검증 실패: {}", join_violations(.violations))]
    Validation { violations: Vec<Violation> },
}

impl ConfigError {
    /// 누락된 키 목록을 반환합니다.
    pub fn missing_keys(&self) -> Vec<&str> {
        self.violations()
            .iter()
            .filter(|v| v.kind == ViolationKind::Missing)
            .map(|v| v.key.as_str())
            .collect()
    }

    /// 검증 위반 목록 (파싱 에러면 빈 슬라이스).
    pub fn violations(&self) -> &[Violation] {
        match self {
            Self::Validation { violations } => violations,
            Self::Parse { .. } | Self::Environment(_) => &[],
        }
    }

    /// 프로세스 종료 코드.
    pub fn exit_code(&self) -> i32 {
        CONFIG_ERROR_EXIT_CODE
    }
}

/// 센서(데이터 수집) 에러.
///
/// 파이프라인은 이 에러를 해석하지 않고 "데이터 없음"으로 취급합니다.
#[derive(Debug, Error)]
pub enum SensorError {
    #[error("전송 에러: {0}")]
    Transport(String),

    #[error("데이터 제공자 에러: {0}")]
    Provider(String),

    #[error("응답 디코딩 에러: {0}")]
    Decode(String),
}

/// 싱크(전달 대상) 협력자 에러.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("전송 에러: {0}")]
    Transport(String),

    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("스트림 에러: {0}")]
    Stream(String),

    #[error("출력 에러: {0}")]
    Output(#[from] std::io::Error),

    #[error("요청 거부: {0}")]
    Rejected(String),

    #[error("모든 서버에 연결할 수 없음: {0}")]
    Unreachable(String),

    #[error("직렬화 에러: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("싱크가 구성되지 않음: {0}")]
    NotConfigured(&'static str),
}

/// 데이터 수집 이후 전달 단계에서 발생한 치명적 에러.
#[derive(Debug, Error)]
#[error("{sink} 전달 실패: {source}")]
pub struct DeliveryError {
    /// 실패한 싱크
    pub sink: Destination,
    /// 실패 전까지 이미 출력된 부분 결과 (llm 스트리밍)
    pub partial: Option<String>,
    #[source]
    pub source: SinkError,
}

impl DeliveryError {
    /// 부분 결과 없는 전달 에러를 생성합니다.
    pub fn new(sink: Destination, source: SinkError) -> Self {
        Self {
            sink,
            partial: None,
            source,
        }
    }

    /// 부분 결과를 포함한 전달 에러를 생성합니다.
    pub fn with_partial(sink: Destination, partial: String, source: SinkError) -> Self {
        Self {
            sink,
            partial: Some(partial),
            source,
        }
    }

    /// 프로세스 종료 코드.
    pub fn exit_code(&self) -> i32 {
        DELIVERY_ERROR_EXIT_CODE
    }
}
