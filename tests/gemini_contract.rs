//! Gemini `generateContent` contract tests.
//!
//! Verify the request shape, credential placement, response parsing and the
//! history bookkeeping rules against a local mock server.

use jarvis_native::api::{ApiError, ConversationHistory, ConversationTurn, GeminiClient, Role};
use serde_json::json;
use wiremock::matchers::{body_json, body_partial_json, header, method, path, query_param_is_missing};
use wiremock::{Mock, MockServer, ResponseTemplate};

const GENERATE_PATH: &str = "/v1beta/models/gemini-2.0-flash:generateContent";

fn client(server: &MockServer) -> GeminiClient {
    GeminiClient::new("test-key", "gemini-2.0-flash").with_base_url(server.uri())
}

fn reply(text: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "candidates": [{ "content": { "role": "model", "parts": [{ "text": text }] } }]
    }))
}

#[tokio::test]
async fn first_turn_sends_only_the_prompt() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .and(header("x-goog-api-key", "test-key"))
        .and(query_param_is_missing("key"))
        .and(body_json(json!({
            "contents": [{ "role": "user", "parts": [{ "text": "tell me a joke" }] }]
        })))
        .respond_with(reply("Why did the robot cross the road?"))
        .expect(1)
        .mount(&server)
        .await;

    let mut history = ConversationHistory::new();
    let text = client(&server)
        .converse("tell me a joke", &mut history, false)
        .await
        .unwrap();

    assert_eq!(text, "Why did the robot cross the road?");
    assert_eq!(
        history.turns(),
        &[
            ConversationTurn::user("tell me a joke"),
            ConversationTurn::model("Why did the robot cross the road?"),
        ]
    );
}

#[tokio::test]
async fn follow_up_carries_history() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .and(body_partial_json(json!({ "contents": [{ "role": "user", "parts": [{ "text": "hi" }] }] })))
        .respond_with(reply("hello"))
        .up_to_n_times(1)
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .and(body_json(json!({
            "contents": [
                { "role": "user", "parts": [{ "text": "hi" }] },
                { "role": "model", "parts": [{ "text": "hello" }] },
                { "role": "user", "parts": [{ "text": "again" }] }
            ]
        })))
        .respond_with(reply("hello again"))
        .expect(1)
        .mount(&server)
        .await;

    let client = client(&server);
    let mut history = ConversationHistory::new();
    client.converse("hi", &mut history, false).await.unwrap();
    let text = client.converse("again", &mut history, false).await.unwrap();

    assert_eq!(text, "hello again");
    assert_eq!(history.len(), 4);
    assert_eq!(history.turns()[3].role, Role::Model);
}

#[tokio::test]
async fn translation_skips_and_preserves_history() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .and(body_json(json!({
            "contents": [{ "role": "user", "parts": [{ "text": "Translate the following text to Telugu: \"hi\"" }] }]
        })))
        .respond_with(reply("హాయ్"))
        .expect(1)
        .mount(&server)
        .await;

    let mut history = ConversationHistory::new();
    history_with_one_exchange(&server, &mut history).await;
    let before = history.clone();

    let text = client(&server)
        .converse("Translate the following text to Telugu: \"hi\"", &mut history, true)
        .await
        .unwrap();

    assert_eq!(text, "హాయ్");
    assert_eq!(history, before);
}

async fn history_with_one_exchange(server: &MockServer, history: &mut ConversationHistory) {
    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .and(body_partial_json(json!({ "contents": [{ "parts": [{ "text": "seed" }] }] })))
        .respond_with(reply("seeded"))
        .up_to_n_times(1)
        .mount(server)
        .await;
    client(server).converse("seed", history, false).await.unwrap();
    assert_eq!(history.len(), 2);
}

#[tokio::test]
async fn remote_error_uses_server_message_and_keeps_history() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error": { "code": 400, "message": "API key not valid.", "status": "INVALID_ARGUMENT" }
        })))
        .mount(&server)
        .await;

    let mut history = ConversationHistory::new();
    let err = client(&server)
        .converse("hello", &mut history, false)
        .await
        .unwrap_err();

    match err {
        ApiError::Remote(message) => assert_eq!(message, "API key not valid."),
        other => panic!("expected Remote, got {:?}", other),
    }
    assert!(history.is_empty());
}

#[tokio::test]
async fn remote_error_without_body_reports_status() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
        .mount(&server)
        .await;

    let mut history = ConversationHistory::new();
    let err = client(&server)
        .converse("hello", &mut history, false)
        .await
        .unwrap_err();

    match err {
        ApiError::Remote(message) => assert!(message.contains("503")),
        other => panic!("expected Remote, got {:?}", other),
    }
}

#[tokio::test]
async fn missing_candidates_is_malformed_and_keeps_history() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "candidates": [] })))
        .mount(&server)
        .await;

    let mut history = ConversationHistory::new();
    let err = client(&server)
        .converse("hello", &mut history, false)
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::MalformedResponse(_)));
    assert!(history.is_empty());
}

#[tokio::test]
async fn unreachable_endpoint_keeps_history() {
    // Bind then release a port so nothing is listening on it.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = GeminiClient::new("test-key", "gemini-2.0-flash").with_base_url(format!("http://{}", addr));
    let mut history = ConversationHistory::new();
    let err = client.converse("hello", &mut history, false).await.unwrap_err();

    assert!(matches!(err, ApiError::Unreachable(_)));
    assert!(history.is_empty());
}

#[tokio::test]
async fn system_instruction_is_sent_when_configured() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path(GENERATE_PATH))
        .and(body_partial_json(json!({
            "systemInstruction": { "parts": [{ "text": "Be brief." }] }
        })))
        .respond_with(reply("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let mut history = ConversationHistory::new();
    client(&server)
        .with_system_instruction("Be brief.")
        .converse("hello", &mut history, false)
        .await
        .unwrap();
}
