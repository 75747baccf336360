//! SignalPipeline 통합 테스트
//!
//! 가짜 협력자로 수집 1회, 전달 1회, 취소 동작을 검증합니다.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use futures::StreamExt;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::Level;

use cryo_core::{
    BrokerPublisher, ChatMessage, ChatStreamClient, ConfigLayer, ConfigResolver, Configuration,
    Destination, EventLog, FragmentOutput, FragmentStream, LayerKind, RunOutcome, Sensor,
    SensorError, SignalPayload, SignalPipeline, SinkError,
};

// ==================== 가짜 협력자 ====================

enum SensorReply {
    Data(SignalPayload),
    Nothing,
    Fail,
}

struct FakeSensor {
    reply: SensorReply,
    calls: AtomicUsize,
}

impl FakeSensor {
    fn new(reply: SensorReply) -> Self {
        Self {
            reply,
            calls: AtomicUsize::new(0),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Sensor for FakeSensor {
    async fn fetch(&self) -> Result<Option<SignalPayload>, SensorError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match &self.reply {
            SensorReply::Data(payload) => Ok(Some(payload.clone())),
            SensorReply::Nothing => Ok(None),
            SensorReply::Fail => Err(SensorError::Transport("connection reset".to_string())),
        }
    }

    fn name(&self) -> &str {
        "fake"
    }
}

#[derive(Default)]
struct RecordingLog {
    records: Mutex<Vec<(Level, String)>>,
}

impl RecordingLog {
    fn records(&self) -> Vec<(Level, String)> {
        self.records.lock().unwrap().clone()
    }
}

impl EventLog for RecordingLog {
    fn record(&self, level: Level, message: &str, _fields: &[(&str, String)]) {
        self.records
            .lock()
            .unwrap()
            .push((level, message.to_string()));
    }
}

#[derive(Default)]
struct FakeBroker {
    fail: bool,
    /// 설정 시 발행 도중 토큰을 발동하고 응답 없이 멈춥니다.
    hang_and_cancel: Option<CancellationToken>,
    published: Mutex<Vec<(String, Vec<String>, String)>>,
}

#[async_trait]
impl BrokerPublisher for FakeBroker {
    async fn publish(
        &self,
        topic: &str,
        bootstrap_servers: &[String],
        payload: &str,
    ) -> Result<(), SinkError> {
        self.published.lock().unwrap().push((
            topic.to_string(),
            bootstrap_servers.to_vec(),
            payload.to_string(),
        ));
        if let Some(token) = &self.hang_and_cancel {
            token.cancel();
            futures::future::pending::<()>().await;
        }
        if self.fail {
            return Err(SinkError::Status {
                status: 503,
                body: "unavailable".to_string(),
            });
        }
        Ok(())
    }
}

struct FakeChat {
    fragments: Vec<Result<String, &'static str>>,
    requests: Mutex<Vec<(String, Vec<ChatMessage>)>>,
}

impl FakeChat {
    fn new(fragments: Vec<Result<String, &'static str>>) -> Self {
        Self {
            fragments,
            requests: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ChatStreamClient for FakeChat {
    async fn stream(
        &self,
        model: &str,
        messages: Vec<ChatMessage>,
    ) -> Result<FragmentStream, SinkError> {
        self.requests
            .lock()
            .unwrap()
            .push((model.to_string(), messages));
        let items: Vec<Result<String, SinkError>> = self
            .fragments
            .iter()
            .map(|f| match f {
                Ok(text) => Ok(text.clone()),
                Err(reason) => Err(SinkError::Stream(reason.to_string())),
            })
            .collect();
        Ok(futures::stream::iter(items).boxed())
    }
}

/// 받은 조각을 기록하고, 설정 시 첫 조각 이후 취소 토큰을 발동합니다.
#[derive(Default)]
struct CapturingOutput {
    forwarded: Mutex<Vec<String>>,
    cancel_after_first: Option<CancellationToken>,
}

impl CapturingOutput {
    fn forwarded(&self) -> Vec<String> {
        self.forwarded.lock().unwrap().clone()
    }
}

impl FragmentOutput for CapturingOutput {
    fn forward(&self, fragment: &str) -> std::io::Result<()> {
        self.forwarded.lock().unwrap().push(fragment.to_string());
        if let Some(token) = &self.cancel_after_first {
            token.cancel();
        }
        Ok(())
    }
}

// ==================== 헬퍼 ====================

fn configuration(pairs: &[(&str, &str)]) -> Configuration {
    let mut cli = ConfigLayer::new(LayerKind::Cli);
    for (key, value) in pairs {
        cli.set(key, *value);
    }
    ConfigResolver::with_env(HashMap::<String, String>::new())
        .resolve(ConfigLayer::system_defaults(), None, "CRYORITHM", cli)
        .expect("설정 해석 실패")
}

fn log_config() -> Configuration {
    configuration(&[("ticker", "ABC"), ("destination", "log")])
}

fn broker_config() -> Configuration {
    configuration(&[
        ("ticker", "ABC"),
        ("destination", "broker"),
        ("broker_bootstrap_servers", "k1:8082,k2:8082"),
        ("broker_topic", "fundamentals"),
    ])
}

fn llm_config() -> Configuration {
    configuration(&[
        ("ticker", "ABC"),
        ("destination", "llm"),
        ("llm_api_key", "sk-test"),
    ])
}

// ==================== 데이터 없음 ====================

#[tokio::test]
async fn test_null_payload_logs_once_and_skips_sinks() {
    let log = Arc::new(RecordingLog::default());
    let broker = Arc::new(FakeBroker::default());
    let pipeline = SignalPipeline::new(log.clone()).with_broker(broker.clone());
    let sensor = FakeSensor::new(SensorReply::Nothing);

    let outcome = pipeline
        .run(&sensor, &broker_config(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome, RunOutcome::NoData);
    assert_eq!(outcome.exit_code(), 0);
    assert_eq!(sensor.calls(), 1);
    let records = log.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].0, Level::WARN);
    assert!(broker.published.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_empty_object_counts_as_no_data() {
    let log = Arc::new(RecordingLog::default());
    let pipeline = SignalPipeline::new(log.clone());
    let sensor = FakeSensor::new(SensorReply::Data(json!({})));

    let outcome = pipeline
        .run(&sensor, &log_config(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome, RunOutcome::NoData);
    assert_eq!(log.records().len(), 1);
}

#[tokio::test]
async fn test_sensor_failure_is_no_data() {
    let log = Arc::new(RecordingLog::default());
    let chat = Arc::new(FakeChat::new(vec![Ok("never".to_string())]));
    let output = Arc::new(CapturingOutput::default());
    let pipeline = SignalPipeline::new(log.clone()).with_chat(chat.clone(), output.clone());
    let sensor = FakeSensor::new(SensorReply::Fail);

    let outcome = pipeline
        .run(&sensor, &llm_config(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(outcome, RunOutcome::NoData);
    let records = log.records();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].0, Level::WARN);
    assert!(chat.requests.lock().unwrap().is_empty());
    assert!(output.forwarded().is_empty());
}

// ==================== 로그 싱크 ====================

#[tokio::test]
async fn test_log_sink_records_payload_exactly_once() {
    let log = Arc::new(RecordingLog::default());
    let pipeline = SignalPipeline::new(log.clone());
    let sensor = FakeSensor::new(SensorReply::Data(json!({"a": 1})));

    let outcome = pipeline
        .run(&sensor, &log_config(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        outcome,
        RunOutcome::Delivered {
            sink: Destination::Log,
            content: None
        }
    );
    assert_eq!(log.records(), vec![(Level::INFO, r#"{"a":1}"#.to_string())]);
    assert_eq!(sensor.calls(), 1);
}

// ==================== 브로커 싱크 ====================

#[tokio::test]
async fn test_broker_publishes_canonical_json_once() {
    let log = Arc::new(RecordingLog::default());
    let broker = Arc::new(FakeBroker::default());
    let pipeline = SignalPipeline::new(log.clone()).with_broker(broker.clone());
    let sensor = FakeSensor::new(SensorReply::Data(json!({"b": 2, "a": 1})));

    let outcome = pipeline
        .run(&sensor, &broker_config(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        outcome,
        RunOutcome::Delivered {
            sink: Destination::Broker,
            content: None
        }
    );
    let published = broker.published.lock().unwrap();
    assert_eq!(published.len(), 1);
    assert_eq!(published[0].0, "fundamentals");
    assert_eq!(published[0].1, vec!["k1:8082", "k2:8082"]);
    assert_eq!(published[0].2, r#"{"a":1,"b":2}"#);
    assert!(log.records().is_empty());
}

#[tokio::test]
async fn test_broker_failure_is_delivery_error() {
    let broker = Arc::new(FakeBroker {
        fail: true,
        ..Default::default()
    });
    let pipeline =
        SignalPipeline::new(Arc::new(RecordingLog::default())).with_broker(broker.clone());
    let sensor = FakeSensor::new(SensorReply::Data(json!({"a": 1})));

    let err = pipeline
        .run(&sensor, &broker_config(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.sink, Destination::Broker);
    assert!(matches!(err.source, SinkError::Status { status: 503, .. }));
    assert_eq!(err.exit_code(), 1);
    // 재시도 없음
    assert_eq!(broker.published.lock().unwrap().len(), 1);
}

#[tokio::test]
async fn test_broker_without_publisher_fails() {
    let pipeline = SignalPipeline::new(Arc::new(RecordingLog::default()));
    let sensor = FakeSensor::new(SensorReply::Data(json!({"a": 1})));

    let err = pipeline
        .run(&sensor, &broker_config(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err.source, SinkError::NotConfigured(_)));
}

// ==================== LLM 싱크 ====================

#[tokio::test]
async fn test_llm_forwards_fragments_in_order() {
    let chat = Arc::new(FakeChat::new(vec![
        Ok("Hel".to_string()),
        Ok(String::new()),
        Ok("lo".to_string()),
    ]));
    let output = Arc::new(CapturingOutput::default());
    let pipeline =
        SignalPipeline::new(Arc::new(RecordingLog::default())).with_chat(chat.clone(), output.clone());
    let sensor = FakeSensor::new(SensorReply::Data(json!({"pe": 12.5})));

    let outcome = pipeline
        .run(&sensor, &llm_config(), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        outcome,
        RunOutcome::Delivered {
            sink: Destination::Llm,
            content: Some("Hello".to_string())
        }
    );
    // 빈 조각은 출력하지 않음
    assert_eq!(output.forwarded(), vec!["Hel", "lo"]);

    let requests = chat.requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].0, "gpt-4-turbo");
    assert_eq!(requests[0].1.len(), 1);
    assert!(requests[0].1[0].content.ends_with(r#"{"pe":12.5}"#));
    assert!(requests[0].1[0].content.contains("ABC"));
}

#[tokio::test]
async fn test_llm_mid_stream_error_keeps_partial() {
    let chat = Arc::new(FakeChat::new(vec![
        Ok("Hel".to_string()),
        Err("connection dropped"),
        Ok("lo".to_string()),
    ]));
    let output = Arc::new(CapturingOutput::default());
    let pipeline =
        SignalPipeline::new(Arc::new(RecordingLog::default())).with_chat(chat, output.clone());
    let sensor = FakeSensor::new(SensorReply::Data(json!({"a": 1})));

    let err = pipeline
        .run(&sensor, &llm_config(), &CancellationToken::new())
        .await
        .unwrap_err();

    assert_eq!(err.sink, Destination::Llm);
    assert_eq!(err.partial.as_deref(), Some("Hel"));
    assert!(matches!(err.source, SinkError::Stream(_)));
    assert_eq!(output.forwarded(), vec!["Hel"]);
}

// ==================== 취소 ====================

#[tokio::test]
async fn test_cancel_mid_stream_stops_forwarding() {
    let cancel = CancellationToken::new();
    let chat = Arc::new(FakeChat::new(vec![
        Ok("Hel".to_string()),
        Ok("lo".to_string()),
    ]));
    let output = Arc::new(CapturingOutput {
        cancel_after_first: Some(cancel.clone()),
        ..Default::default()
    });
    let pipeline =
        SignalPipeline::new(Arc::new(RecordingLog::default())).with_chat(chat, output.clone());
    let sensor = FakeSensor::new(SensorReply::Data(json!({"a": 1})));

    let outcome = pipeline.run(&sensor, &llm_config(), &cancel).await.unwrap();

    assert_eq!(outcome, RunOutcome::Cancelled);
    assert_eq!(outcome.exit_code(), 130);
    // 이미 출력된 조각은 그대로 남음
    assert_eq!(output.forwarded(), vec!["Hel"]);
}

#[tokio::test]
async fn test_cancel_during_broker_publish() {
    let cancel = CancellationToken::new();
    let log = Arc::new(RecordingLog::default());
    let broker = Arc::new(FakeBroker {
        hang_and_cancel: Some(cancel.clone()),
        ..Default::default()
    });
    let pipeline = SignalPipeline::new(log.clone()).with_broker(broker.clone());
    let sensor = FakeSensor::new(SensorReply::Data(json!({"a": 1})));

    let outcome = tokio::time::timeout(
        std::time::Duration::from_secs(5),
        pipeline.run(&sensor, &broker_config(), &cancel),
    )
    .await
    .expect("취소 후에도 발행을 기다림")
    .unwrap();

    assert_eq!(outcome, RunOutcome::Cancelled);
    assert_eq!(outcome.exit_code(), 130);
    assert_eq!(broker.published.lock().unwrap().len(), 1);
    assert!(log.records().is_empty());
}

#[tokio::test]
async fn test_cancel_before_fetch_skips_everything() {
    let cancel = CancellationToken::new();
    cancel.cancel();

    let log = Arc::new(RecordingLog::default());
    let pipeline = SignalPipeline::new(log.clone());
    let sensor = FakeSensor::new(SensorReply::Data(json!({"a": 1})));

    let outcome = pipeline.run(&sensor, &log_config(), &cancel).await.unwrap();

    assert_eq!(outcome, RunOutcome::Cancelled);
    assert_eq!(sensor.calls(), 0);
    assert!(log.records().is_empty());
}

#[tokio::test]
async fn test_concurrent_runs_are_independent() {
    let log = Arc::new(RecordingLog::default());
    let pipeline = SignalPipeline::new(log.clone());
    let first = FakeSensor::new(SensorReply::Data(json!({"n": 1})));
    let second = FakeSensor::new(SensorReply::Nothing);
    let config = log_config();
    let cancel = CancellationToken::new();

    let (a, b) = tokio::join!(
        pipeline.run(&first, &config, &cancel),
        pipeline.run(&second, &config, &cancel)
    );

    assert!(matches!(a.unwrap(), RunOutcome::Delivered { .. }));
    assert_eq!(b.unwrap(), RunOutcome::NoData);
    assert_eq!(log.records().len(), 2);
    assert_eq!(first.calls(), 1);
    assert_eq!(second.calls(), 1);
}
