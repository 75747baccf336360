//! # Cryo Notification
//!
//! 시그널 전달 대상(싱크) 어댑터.
//!
//! 지원 대상:
//! - Kafka REST Proxy (브로커)
//! - OpenAI 스트리밍 채팅 완성 (LLM 요약)
//! - tracing 이벤트 로그
//! - stdout 조각 출력

pub mod event_log;
pub mod kafka;
pub mod openai;
pub mod output;

pub use event_log::TracingEventLog;
pub use kafka::{server_url, KafkaRestPublisher, DEFAULT_PUBLISH_TIMEOUT, KAFKA_JSON_V2};
pub use openai::{
    sse_fragments, OpenAiChatClient, OpenAiConfig, DEFAULT_CONNECT_TIMEOUT,
    DEFAULT_OPENAI_BASE_URL,
};
pub use output::StdoutFragments;
