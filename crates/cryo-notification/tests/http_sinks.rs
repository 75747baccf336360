//! Kafka REST / OpenAI 어댑터 HTTP 테스트 (mockito 서버 사용)

use cryo_core::{BrokerPublisher, ChatMessage, ChatStreamClient, SinkError};
use cryo_notification::{KafkaRestPublisher, OpenAiChatClient, OpenAiConfig, KAFKA_JSON_V2};
use futures::StreamExt;
use mockito::Matcher;
use secrecy::SecretString;
use serde_json::json;

// ==================== Kafka REST ====================

#[tokio::test]
async fn test_kafka_publishes_record_envelope() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/topics/fundamentals")
        .match_header("content-type", KAFKA_JSON_V2)
        .match_body(Matcher::Json(json!({"records": [{"value": {"a": 1}}]})))
        .with_status(200)
        .with_body(r#"{"key_schema_id":null,"value_schema_id":null,"offsets":[{"partition":0,"offset":7,"error_code":null,"error":null}]}"#)
        .expect(1)
        .create_async()
        .await;

    let publisher = KafkaRestPublisher::new().unwrap();
    publisher
        .publish("fundamentals", &[server.url()], r#"{"a":1}"#)
        .await
        .unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn test_kafka_bare_host_port_gets_scheme() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/topics/t")
        .with_status(200)
        .create_async()
        .await;

    // server.url()은 "http://127.0.0.1:port" 형식
    let bare = server.url().trim_start_matches("http://").to_string();
    KafkaRestPublisher::new()
        .unwrap()
        .publish("t", &[bare], r#"{"a":1}"#)
        .await
        .unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn test_kafka_unreachable_server_falls_through_to_next() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/topics/t")
        .with_status(200)
        .expect(1)
        .create_async()
        .await;

    let servers = vec!["127.0.0.1:0".to_string(), server.url()];
    KafkaRestPublisher::new()
        .unwrap()
        .publish("t", &servers, r#"{"a":1}"#)
        .await
        .unwrap();

    mock.assert_async().await;
}

#[tokio::test]
async fn test_kafka_http_error_fails_without_trying_next() {
    let mut first = mockito::Server::new_async().await;
    let mut second = mockito::Server::new_async().await;
    first
        .mock("POST", "/topics/t")
        .with_status(404)
        .with_body(r#"{"error_code":40401,"message":"Topic not found."}"#)
        .create_async()
        .await;
    let untouched = second
        .mock("POST", "/topics/t")
        .with_status(200)
        .expect(0)
        .create_async()
        .await;

    let err = KafkaRestPublisher::new()
        .unwrap()
        .publish("t", &[first.url(), second.url()], r#"{"a":1}"#)
        .await
        .unwrap_err();

    assert!(matches!(err, SinkError::Status { status: 404, ref body } if body.contains("Topic not found")));
    untouched.assert_async().await;
}

#[tokio::test]
async fn test_kafka_record_level_error_is_rejected() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/topics/t")
        .with_status(200)
        .with_body(r#"{"offsets":[{"partition":null,"offset":null,"error_code":50002,"error":"Kafka error"}]}"#)
        .create_async()
        .await;

    let err = KafkaRestPublisher::new()
        .unwrap()
        .publish("t", &[server.url()], r#"{"a":1}"#)
        .await
        .unwrap_err();

    assert!(matches!(err, SinkError::Rejected(ref m) if m.contains("Kafka error")));
}

#[tokio::test]
async fn test_kafka_all_unreachable_names_last_failure() {
    let servers = vec!["127.0.0.1:0".to_string(), "http://127.0.0.1:0/".to_string()];
    let err = KafkaRestPublisher::new()
        .unwrap()
        .publish("t", &servers, r#"{"a":1}"#)
        .await
        .unwrap_err();

    assert!(matches!(err, SinkError::Unreachable(ref m) if m.starts_with("http://127.0.0.1:0/")));
}

// ==================== OpenAI ====================

fn openai(server: &mockito::Server) -> OpenAiChatClient {
    let config = OpenAiConfig::new(SecretString::new("sk-test".into()))
        .with_base_url(server.url())
        .with_max_tokens(512);
    OpenAiChatClient::new(config).unwrap()
}

#[tokio::test]
async fn test_openai_streams_fragments() {
    let mut server = mockito::Server::new_async().await;
    let sse = concat!(
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"role\":\"assistant\"}}]}\n\n",
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"Hel\"}}]}\n\n",
        "data: {\"choices\":[{\"index\":0,\"delta\":{\"content\":\"lo\"}}]}\n\n",
        "data: {\"choices\":[{\"index\":0,\"delta\":{},\"finish_reason\":\"stop\"}]}\n\n",
        "data: [DONE]\n\n",
    );
    let mock = server
        .mock("POST", "/v1/chat/completions")
        .match_header("authorization", "Bearer sk-test")
        .match_body(Matcher::PartialJson(json!({
            "model": "gpt-4-turbo",
            "stream": true,
            "max_tokens": 512,
            "messages": [{"role": "user", "content": "summarize"}]
        })))
        .with_status(200)
        .with_header("content-type", "text/event-stream")
        .with_body(sse)
        .create_async()
        .await;

    let stream = openai(&server)
        .stream("gpt-4-turbo", vec![ChatMessage::user("summarize")])
        .await
        .unwrap();
    let fragments: Vec<String> = stream.map(|f| f.unwrap()).collect().await;

    mock.assert_async().await;
    assert_eq!(fragments, vec!["Hel", "lo"]);
}

#[tokio::test]
async fn test_openai_error_status_carries_body() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v1/chat/completions")
        .with_status(401)
        .with_body(r#"{"error":{"message":"Incorrect API key provided"}}"#)
        .create_async()
        .await;

    let result = openai(&server)
        .stream("gpt-4-turbo", vec![ChatMessage::user("summarize")])
        .await;

    match result {
        Err(SinkError::Status { status, body }) => {
            assert_eq!(status, 401);
            assert!(body.contains("Incorrect API key"));
        }
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("expected an error"),
    }
}
