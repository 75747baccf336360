//! # Cryo Core
//!
//! Cryorithm 센서의 핵심 타입을 제공합니다:
//! - 레이어 설정 해석 (기본값 → 파일 → 환경 변수 → CLI)
//! - 단일 수집-전달 파이프라인과 실행 상태 머신
//! - 센서/싱크 협력자 trait
//! - 에러 타입과 로깅 초기화

pub mod config;
pub mod error;
pub mod logging;
pub mod payload;
pub mod pipeline;
pub mod traits;

pub use config::{
    BrokerSettings, ConfigLayer, ConfigResolver, Configuration, Destination, LayerKind,
    LlmSettings, SettingValue,
};
pub use error::{ConfigError, DeliveryError, SensorError, SinkError, Violation, ViolationKind};
pub use logging::{init_logging, LogConfig, LogFormat};
pub use payload::{canonical_json, is_empty_payload, SignalPayload};
pub use pipeline::{summary_prompt, RunOutcome, RunState, SignalPipeline};
pub use traits::*;
