//! OpenAI 스트리밍 채팅 클라이언트.
//!
//! `POST /v1/chat/completions`에 `stream: true`로 요청하고, server-sent events
//! 응답을 `choices[0].delta.content` 조각 스트림으로 변환합니다.

use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use cryo_core::{ChatMessage, ChatStreamClient, FragmentStream, SinkError};
use eventsource_stream::Eventsource;
use futures::{future, Stream, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

/// 기본 OpenAI API 주소.
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";

/// 기본 연결 타임아웃. 스트리밍 응답 자체에는 타임아웃을 두지 않습니다.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// OpenAI 클라이언트 설정.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// API 주소
    pub base_url: String,
    /// API 키
    pub api_key: SecretString,
    /// 최대 생성 토큰 수
    pub max_tokens: Option<u32>,
    /// 샘플링 온도
    pub temperature: Option<f32>,
    /// 연결 타임아웃
    pub connect_timeout: Duration,
}

impl OpenAiConfig {
    /// 기본 주소로 설정을 생성합니다.
    pub fn new(api_key: SecretString) -> Self {
        Self {
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            api_key,
            max_tokens: None,
            temperature: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// API 주소를 설정합니다.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// 최대 생성 토큰 수를 설정합니다.
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// 샘플링 온도를 설정합니다.
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    error: Option<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    delta: ChunkDelta,
}

#[derive(Debug, Deserialize)]
struct ChunkDelta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    message: String,
}

/// SSE `data:` 페이로드 하나를 조각으로 변환합니다. 내용 없는 청크는 `None`.
fn parse_chunk(data: &str) -> Result<Option<String>, SinkError> {
    let chunk: ChatCompletionChunk = serde_json::from_str(data)
        .map_err(|e| SinkError::Stream(format!("청크 파싱 실패: {}", e)))?;

    if let Some(error) = chunk.error {
        return Err(SinkError::Stream(error.message));
    }

    Ok(chunk
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.delta.content)
        .filter(|content| !content.is_empty()))
}

/// SSE 바이트 스트림을 지연 평가되는 조각 스트림으로 변환합니다.
///
/// 이벤트 경계는 `eventsource_stream`이 해석합니다.
/// `data: [DONE]`, 스트림 끝, 첫 번째 에러 중 하나에서 끝납니다.
pub fn sse_fragments<S, B, E>(bytes: S) -> FragmentStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: fmt::Display + Send + 'static,
{
    bytes
        .eventsource()
        .scan(false, |failed, event| {
            // 에러 뒤에는 더 읽지 않음
            if *failed {
                return future::ready(None);
            }
            let item = match event {
                Ok(event) if event.data == "[DONE]" => {
                    debug!("스트림 종료 신호 수신");
                    None
                }
                Ok(event) => match parse_chunk(&event.data) {
                    Ok(fragment) => Some(fragment.map(Ok)),
                    Err(e) => {
                        *failed = true;
                        Some(Some(Err(e)))
                    }
                },
                Err(e) => {
                    *failed = true;
                    Some(Some(Err(SinkError::Stream(e.to_string()))))
                }
            };
            future::ready(item)
        })
        .filter_map(future::ready)
        .boxed()
}

/// OpenAI 스트리밍 채팅 클라이언트.
pub struct OpenAiChatClient {
    config: OpenAiConfig,
    client: reqwest::Client,
}

impl OpenAiChatClient {
    /// 새 클라이언트를 생성합니다.
    pub fn new(config: OpenAiConfig) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder()
            .connect_timeout(config.connect_timeout)
            .build()
            .map_err(|e| SinkError::Transport(e.to_string()))?;
        Ok(Self { config, client })
    }
}

#[async_trait]
impl ChatStreamClient for OpenAiChatClient {
    async fn stream(
        &self,
        model: &str,
        messages: Vec<ChatMessage>,
    ) -> Result<FragmentStream, SinkError> {
        let url = format!(
            "{}/v1/chat/completions",
            self.config.base_url.trim_end_matches('/')
        );
        let request = ChatCompletionRequest {
            model,
            messages: &messages,
            stream: true,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        debug!(model = %model, messages = messages.len(), "OpenAI 스트리밍 요청");

        let response = self
            .client
            .post(&url)
            .bearer_auth(self.config.api_key.expose_secret())
            .json(&request)
            .send()
            .await
            .map_err(|e| SinkError::Transport(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            error!("OpenAI 요청 실패: {} - {}", status, body);
            return Err(SinkError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(sse_fragments(response.bytes_stream()))
    }
}
