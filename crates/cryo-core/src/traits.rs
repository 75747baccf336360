//! 파이프라인 협력자 trait 정의.
//!
//! 각 외부 시스템(데이터 제공자, 로그, 브로커, 채팅 API, 출력)은 좁은 capability
//! trait 뒤에 있으며, 실제 백엔드마다 하나의 어댑터가 있고 테스트는 가짜 구현을 씁니다.

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::{Deserialize, Serialize};
use tracing::Level;

use crate::error::{SensorError, SinkError};
use crate::payload::SignalPayload;

/// 데이터를 한 번 수집하는 센서.
#[async_trait]
pub trait Sensor: Send + Sync {
    /// 데이터를 수집합니다. 데이터가 없으면 `Ok(None)`.
    async fn fetch(&self) -> Result<Option<SignalPayload>, SensorError>;

    /// 센서 이름.
    fn name(&self) -> &str;
}

/// 구조화 로그 기록기.
///
/// 호출은 fire-and-forget이며 파이프라인을 멈추지 않습니다.
pub trait EventLog: Send + Sync {
    fn record(&self, level: Level, message: &str, fields: &[(&str, String)]);
}

/// 메시지 브로커 발행기.
#[async_trait]
pub trait BrokerPublisher: Send + Sync {
    async fn publish(
        &self,
        topic: &str,
        bootstrap_servers: &[String],
        payload: &str,
    ) -> Result<(), SinkError>;
}

/// 채팅 메시지 역할. 요약 요청은 사용자 메시지 하나로만 구성됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
}

/// 채팅 메시지.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    /// 사용자 메시지를 생성합니다.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }
}

/// 스트리밍 응답 조각 스트림.
///
/// 단일 소비자, 전진 전용, 재시작 불가이며 스트림 종료 또는 에러로 끝납니다.
pub type FragmentStream = BoxStream<'static, Result<String, SinkError>>;

/// 스트리밍 채팅 완성 클라이언트.
#[async_trait]
pub trait ChatStreamClient: Send + Sync {
    async fn stream(
        &self,
        model: &str,
        messages: Vec<ChatMessage>,
    ) -> Result<FragmentStream, SinkError>;
}

/// 스트리밍 조각을 도착 즉시 출력하는 대상.
pub trait FragmentOutput: Send + Sync {
    fn forward(&self, fragment: &str) -> std::io::Result<()>;
}
