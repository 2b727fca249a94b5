mod common;

use avatar_chat::message::ChatResponse;
use avatar_chat::routes::create_router;
use avatar_chat::services::llm::{LlmError, PromptRole};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use tower::util::ServiceExt;

use common::{ScriptedModel, app_state};

fn chat_request(body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/chat")
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn read_json(response: axum::response::Response) -> serde_json::Value {
    let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body_bytes).unwrap()
}

#[tokio::test]
async fn test_chat_endpoint_with_speech() {
    let model = ScriptedModel::new(vec![Ok(
        r#"{"reply": "hi there", "expression": "happy"}"#.to_string(),
    )]);
    let app = create_router().with_state(app_state(model, Some(b"ID3\x04".to_vec())));

    let response = app
        .oneshot(chat_request(r#"{"message": "hello", "session_id": "default"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = read_json(response).await;
    let chat_resp: ChatResponse = serde_json::from_value(body).unwrap();
    assert_eq!(chat_resp.message, "hi there");
    assert_eq!(chat_resp.expression.as_deref(), Some("happy"));
    assert_eq!(chat_resp.audio.as_deref(), Some("SUQzBA=="));
}

#[tokio::test]
async fn test_no_speech_sends_empty_audio_and_null_expression() {
    let model = ScriptedModel::new(vec![Ok(
        "```json\n{\"message\": \"plain\", \"expression\": \"juggling\"}\n```".to_string(),
    )]);
    let app = create_router().with_state(app_state(model, None));

    let response = app.oneshot(chat_request(r#"{"message": "hello"}"#)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = read_json(response).await;
    assert_eq!(body["message"], "plain");
    assert_eq!(body["audio"], "");
    assert!(body["expression"].is_null());
}

#[tokio::test]
async fn test_empty_message_is_rejected() {
    let model = ScriptedModel::new(vec![]);
    let app = create_router().with_state(app_state(model.clone(), None));

    let response = app.oneshot(chat_request(r#"{"message": "   "}"#)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert!(read_json(response).await["error"].is_string());
    assert!(model.prompts.lock().unwrap().is_empty());
}

#[tokio::test]
async fn test_model_failure_is_bad_gateway() {
    let model = ScriptedModel::new(vec![
        Err(LlmError::EmptyCompletion),
        Ok("no json here".to_string()),
        Ok(r#"{"expression": "happy"}"#.to_string()),
    ]);
    let app = create_router().with_state(app_state(model.clone(), None));

    let response = app.oneshot(chat_request(r#"{"message": "hello"}"#)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(model.prompts.lock().unwrap().len(), 3);
}

#[tokio::test]
async fn test_history_is_sent_as_context() {
    let model = ScriptedModel::new(vec![
        Ok(r#"{"reply": "nice to meet you"}"#.to_string()),
        Ok(r#"{"reply": "you are Alice"}"#.to_string()),
    ]);
    let app = create_router().with_state(app_state(model.clone(), None));

    let first = app
        .clone()
        .oneshot(chat_request(r#"{"message": "I am Alice", "session_id": "s1"}"#))
        .await
        .unwrap();
    assert_eq!(first.status(), StatusCode::OK);

    let second = app
        .oneshot(chat_request(r#"{"message": "who am I?", "session_id": "s1"}"#))
        .await
        .unwrap();
    assert_eq!(read_json(second).await["message"], "you are Alice");

    let prompts = model.prompts.lock().unwrap();
    let last = prompts.last().unwrap();
    let roles: Vec<_> = last.iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        [PromptRole::System, PromptRole::User, PromptRole::Assistant, PromptRole::User]
    );
    assert_eq!(last[1].content, "I am Alice");
    assert_eq!(last[2].content, "nice to meet you");
}

#[tokio::test]
async fn test_health() {
    let app = create_router().with_state(app_state(ScriptedModel::new(vec![]), None));
    let response = app
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}
