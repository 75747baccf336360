//! 단일 수집-전달 파이프라인.
//!
//! 실행 한 번에 센서를 정확히 한 번 호출하고, 결과를 설정된 하나의 싱크
//! (로그, 브로커, LLM)로 전달합니다. 재시도와 타임아웃은 협력자의 책임입니다.

mod state;

use std::sync::Arc;

use futures::StreamExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, warn, Instrument, Level};
use uuid::Uuid;

use crate::config::{Configuration, Destination};
use crate::error::{DeliveryError, SinkError};
use crate::payload::{canonical_json, is_empty_payload, SignalPayload};
use crate::traits::{
    BrokerPublisher, ChatMessage, ChatStreamClient, EventLog, FragmentOutput, Sensor,
};

pub use state::{RunOutcome, RunState, CANCELLED_EXIT_CODE};
use state::RunTracker;

/// LLM에 보낼 요약 요청 프롬프트를 만듭니다.
///
/// 지시문 뒤에 정규화된 JSON 페이로드를 그대로 붙인 단일 사용자 메시지입니다.
pub fn summary_prompt(ticker: &str, payload_json: &str) -> String {
    format!(
        "You are a financial analyst. Summarize the following fundamental data for the \
         stock ticker {ticker}. Cover valuation, the 52-week price range and trading \
         volume in plain language, in under 200 words.\n\n{payload_json}"
    )
}

/// 수집-전달 파이프라인.
///
/// 협력자는 생성 시 주입됩니다. 파이프라인 자체는 실행 간 가변 상태가 없으므로
/// 여러 센서에 대해 동시에 실행해도 서로 간섭하지 않습니다.
pub struct SignalPipeline {
    event_log: Arc<dyn EventLog>,
    broker: Option<Arc<dyn BrokerPublisher>>,
    chat: Option<Arc<dyn ChatStreamClient>>,
    output: Option<Arc<dyn FragmentOutput>>,
}

impl SignalPipeline {
    /// 로그 싱크만 가진 파이프라인을 생성합니다.
    pub fn new(event_log: Arc<dyn EventLog>) -> Self {
        Self {
            event_log,
            broker: None,
            chat: None,
            output: None,
        }
    }

    /// 브로커 발행기를 설정합니다.
    pub fn with_broker(mut self, broker: Arc<dyn BrokerPublisher>) -> Self {
        self.broker = Some(broker);
        self
    }

    /// 채팅 클라이언트와 조각 출력 대상을 설정합니다.
    pub fn with_chat(
        mut self,
        chat: Arc<dyn ChatStreamClient>,
        output: Arc<dyn FragmentOutput>,
    ) -> Self {
        self.chat = Some(chat);
        self.output = Some(output);
        self
    }

    /// 한 번 실행합니다.
    ///
    /// # 반환
    /// - `Ok(RunOutcome::NoData)`: 센서가 데이터를 주지 않았거나 수집에 실패함
    /// - `Ok(RunOutcome::Delivered)`: 싱크 전달 완료
    /// - `Ok(RunOutcome::Cancelled)`: `cancel` 토큰으로 취소됨
    /// - `Err(DeliveryError)`: 데이터 수집 후 싱크 전달 실패 (재시도 없음)
    pub async fn run(
        &self,
        sensor: &dyn Sensor,
        config: &Configuration,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, DeliveryError> {
        let run_id = Uuid::new_v4();
        let span = info_span!(
            "signal_run",
            %run_id,
            ticker = %config.ticker(),
            destination = %config.destination(),
            sensor = sensor.name(),
        );
        self.run_once(sensor, config, cancel).instrument(span).await
    }

    async fn run_once(
        &self,
        sensor: &dyn Sensor,
        config: &Configuration,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, DeliveryError> {
        let mut tracker = RunTracker::new();

        tracker.advance(RunState::Fetching);
        let fetched = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("데이터 수집 중 취소됨");
                tracker.advance(RunState::Cancelled);
                return Ok(RunOutcome::Cancelled);
            }
            fetched = sensor.fetch() => fetched,
        };

        let payload = match fetched {
            Ok(Some(payload)) if !is_empty_payload(&payload) => payload,
            Ok(_) => {
                self.event_log.record(
                    Level::WARN,
                    "센서가 데이터를 반환하지 않았습니다",
                    &[
                        ("ticker", config.ticker().to_string()),
                        ("sensor", sensor.name().to_string()),
                    ],
                );
                tracker.advance(RunState::NoData);
                return Ok(RunOutcome::NoData);
            }
            Err(e) => {
                self.event_log.record(
                    Level::WARN,
                    "데이터 수집 실패",
                    &[
                        ("ticker", config.ticker().to_string()),
                        ("sensor", sensor.name().to_string()),
                        ("error", e.to_string()),
                    ],
                );
                tracker.advance(RunState::NoData);
                return Ok(RunOutcome::NoData);
            }
        };

        tracker.advance(RunState::Dispatching);
        let result = self.dispatch(&payload, config, cancel).await;

        match &result {
            Ok(outcome) => tracker.advance(outcome.state()),
            Err(e) => {
                warn!(sink = %e.sink, error = %e.source, "전달 실패");
                tracker.advance(RunState::Failed);
            }
        }
        debug!(state = %tracker.state(), "실행 종료");

        result
    }

    async fn dispatch(
        &self,
        payload: &SignalPayload,
        config: &Configuration,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, DeliveryError> {
        let sink = config.destination();
        let json = canonical_json(payload).map_err(|e| DeliveryError::new(sink, e.into()))?;

        match sink {
            Destination::Log => {
                self.event_log.record(
                    Level::INFO,
                    &json,
                    &[
                        ("sink", sink.to_string()),
                        ("ticker", config.ticker().to_string()),
                    ],
                );
                Ok(RunOutcome::Delivered {
                    sink: Destination::Log,
                    content: None,
                })
            }
            Destination::Broker => self.deliver_broker(&json, config, cancel).await,
            Destination::Llm => self.deliver_llm(&json, config, cancel).await,
        }
    }

    async fn deliver_broker(
        &self,
        json: &str,
        config: &Configuration,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, DeliveryError> {
        let sink = Destination::Broker;
        let broker = self
            .broker
            .as_ref()
            .ok_or_else(|| DeliveryError::new(sink, SinkError::NotConfigured("broker publisher")))?;
        let settings = config
            .broker()
            .ok_or_else(|| DeliveryError::new(sink, SinkError::NotConfigured("broker settings")))?;

        let published = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("브로커 발행 중 취소됨");
                return Ok(RunOutcome::Cancelled);
            }
            published = broker.publish(&settings.topic, &settings.bootstrap_servers, json) => published,
        };
        published.map_err(|e| DeliveryError::new(sink, e))?;

        info!(topic = %settings.topic, bytes = json.len(), "브로커 발행 완료");
        Ok(RunOutcome::Delivered {
            sink,
            content: None,
        })
    }

    async fn deliver_llm(
        &self,
        json: &str,
        config: &Configuration,
        cancel: &CancellationToken,
    ) -> Result<RunOutcome, DeliveryError> {
        let sink = Destination::Llm;
        let (Some(chat), Some(output)) = (self.chat.as_ref(), self.output.as_ref()) else {
            return Err(DeliveryError::new(
                sink,
                SinkError::NotConfigured("chat client"),
            ));
        };
        let settings = config
            .llm()
            .ok_or_else(|| DeliveryError::new(sink, SinkError::NotConfigured("llm settings")))?;

        let messages = vec![ChatMessage::user(summary_prompt(config.ticker(), json))];

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!("LLM 요청 중 취소됨");
                return Ok(RunOutcome::Cancelled);
            }
            opened = chat.stream(&settings.model, messages) => opened,
        };
        let mut fragments = opened.map_err(|e| DeliveryError::new(sink, e))?;

        let mut content = String::new();
        let mut forwarded = 0usize;
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(forwarded, "LLM 스트리밍 중 취소됨");
                    return Ok(RunOutcome::Cancelled);
                }
                next = fragments.next() => next,
            };

            match next {
                None => break,
                Some(Ok(fragment)) => {
                    if fragment.is_empty() {
                        continue;
                    }
                    output.forward(&fragment).map_err(|e| {
                        DeliveryError::with_partial(sink, content.clone(), SinkError::Output(e))
                    })?;
                    content.push_str(&fragment);
                    forwarded += 1;
                }
                Some(Err(e)) => {
                    return Err(DeliveryError::with_partial(sink, content, e));
                }
            }
        }

        info!(fragments = forwarded, chars = content.len(), "LLM 요약 완료");
        Ok(RunOutcome::Delivered {
            sink,
            content: Some(content),
        })
    }
}
