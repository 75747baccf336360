//! Kafka REST Proxy 발행기.
//!
//! Confluent REST Proxy v2 API(`POST /topics/{topic}`)로 레코드 하나를 발행합니다.
//! 부트스트랩 서버는 순서대로 시도하며, 연결 실패만 다음 서버로 넘어갑니다.

use std::time::Duration;

use async_trait::async_trait;
use cryo_core::{BrokerPublisher, SinkError};
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, error, info, warn};

/// 레코드 본문 Content-Type.
pub const KAFKA_JSON_V2: &str = "application/vnd.kafka.json.v2+json";

const KAFKA_V2_ACCEPT: &str = "application/vnd.kafka.v2+json, application/json";

/// 기본 요청 타임아웃.
pub const DEFAULT_PUBLISH_TIMEOUT: Duration = Duration::from_secs(10);

/// 발행 응답. 레코드별로 offset 또는 에러가 담깁니다.
#[derive(Debug, Deserialize)]
struct ProduceResponse {
    #[serde(default)]
    offsets: Vec<ProduceOffset>,
}

#[derive(Debug, Deserialize)]
struct ProduceOffset {
    partition: Option<i32>,
    offset: Option<i64>,
    error_code: Option<i64>,
    error: Option<String>,
}

/// `host:port` 형식이면 `http://`를 붙입니다.
pub fn server_url(server: &str) -> String {
    let server = server.trim().trim_end_matches('/');
    if server.contains("://") {
        server.to_string()
    } else {
        format!("http://{}", server)
    }
}

/// Kafka REST Proxy 발행기.
pub struct KafkaRestPublisher {
    client: reqwest::Client,
}

impl KafkaRestPublisher {
    /// 기본 타임아웃으로 발행기를 생성합니다.
    pub fn new() -> Result<Self, SinkError> {
        Self::with_timeout(DEFAULT_PUBLISH_TIMEOUT)
    }

    /// 주어진 요청 타임아웃으로 발행기를 생성합니다.
    pub fn with_timeout(timeout: Duration) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SinkError::Transport(e.to_string()))?;
        Ok(Self { client })
    }

    async fn publish_to(&self, url: &str, body: &[u8]) -> Result<(), PublishAttempt> {
        let response = self
            .client
            .post(url)
            .header(CONTENT_TYPE, KAFKA_JSON_V2)
            .header(ACCEPT, KAFKA_V2_ACCEPT)
            .body(body.to_vec())
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() || e.is_timeout() {
                    PublishAttempt::Unreachable(e.to_string())
                } else {
                    PublishAttempt::Failed(SinkError::Transport(e.to_string()))
                }
            })?;

        let status = response.status();
        let text = response.text().await.unwrap_or_default();
        if !status.is_success() {
            error!("Kafka REST 발행 실패: {} - {}", status, text);
            return Err(PublishAttempt::Failed(SinkError::Status {
                status: status.as_u16(),
                body: text,
            }));
        }

        // 응답 본문이 없거나 형식이 다르면 성공으로 간주
        if let Ok(produced) = serde_json::from_str::<ProduceResponse>(&text) {
            for offset in produced.offsets {
                if offset.error_code.is_some() || offset.error.is_some() {
                    return Err(PublishAttempt::Failed(SinkError::Rejected(format!(
                        "error_code={:?}, error={}",
                        offset.error_code,
                        offset.error.unwrap_or_default()
                    ))));
                }
                debug!(
                    partition = ?offset.partition,
                    offset = ?offset.offset,
                    "레코드 발행됨"
                );
            }
        }
        Ok(())
    }
}

/// 서버 한 곳에 대한 시도 결과.
enum PublishAttempt {
    /// 연결 불가 (다음 서버 시도)
    Unreachable(String),
    /// 즉시 실패
    Failed(SinkError),
}

#[async_trait]
impl BrokerPublisher for KafkaRestPublisher {
    async fn publish(
        &self,
        topic: &str,
        bootstrap_servers: &[String],
        payload: &str,
    ) -> Result<(), SinkError> {
        let value: serde_json::Value = serde_json::from_str(payload)?;
        let body = serde_json::to_vec(&json!({ "records": [{ "value": value }] }))?;

        let mut last_failure = String::from("부트스트랩 서버 없음");
        for server in bootstrap_servers {
            let url = format!("{}/topics/{}", server_url(server), topic);
            match self.publish_to(&url, &body).await {
                Ok(()) => {
                    info!(server = %server, topic = %topic, "Kafka 레코드 발행 완료");
                    return Ok(());
                }
                Err(PublishAttempt::Unreachable(reason)) => {
                    warn!(server = %server, error = %reason, "Kafka REST 서버 연결 실패, 다음 서버 시도");
                    last_failure = format!("{}: {}", server, reason);
                }
                Err(PublishAttempt::Failed(e)) => return Err(e),
            }
        }

        Err(SinkError::Unreachable(last_failure))
    }
}
