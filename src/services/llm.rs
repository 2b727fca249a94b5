// src/services/llm.rs
use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("completion had no choices")]
    EmptyCompletion,

    #[error("failed to parse JSON response: {0}")]
    InvalidJson(String),

    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: Box<LlmError> },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptRole {
    System,
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptMessage {
    pub role: PromptRole,
    pub content: String,
}

impl PromptMessage {
    pub fn new(role: PromptRole, content: impl Into<String>) -> Self {
        Self { role, content: content.into() }
    }
}

/// A chat-completion backend returning the raw assistant text.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    async fn complete(&self, messages: &[PromptMessage]) -> Result<String, LlmError>;
}

/// OpenAI compatible `/chat/completions` client.
#[derive(Debug, Clone)]
pub struct OpenAiCompatible {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
}

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    messages: &'a [PromptMessage],
    temperature: f32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    content: Option<String>,
}

impl OpenAiCompatible {
    /// `timeout` bounds each completion request from connect to last byte.
    pub fn new(
        api_key: impl Into<String>,
        base_url: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: base_url.into(),
            model: model.into(),
            temperature: 0.7,
        })
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl LanguageModel for OpenAiCompatible {
    async fn complete(&self, messages: &[PromptMessage]) -> Result<String, LlmError> {
        let body = CompletionRequest {
            model: &self.model,
            messages,
            temperature: self.temperature,
        };

        let resp: CompletionResponse = self
            .client
            .post(self.completions_url())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        resp.choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(LlmError::EmptyCompletion)
    }
}

/// Asks the model for a JSON object, retrying transport and parse failures.
#[derive(Clone)]
pub struct LlmService {
    model: Arc<dyn LanguageModel>,
    max_retries: u32,
    retry_delay: Duration,
}

impl std::fmt::Debug for LlmService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmService")
            .field("max_retries", &self.max_retries)
            .field("retry_delay", &self.retry_delay)
            .finish()
    }
}

impl LlmService {
    pub fn new(model: Arc<dyn LanguageModel>, max_retries: u32) -> Self {
        Self {
            model,
            max_retries: max_retries.max(1),
            retry_delay: Duration::from_secs(1),
        }
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub async fn generate<T: DeserializeOwned>(&self, messages: &[PromptMessage]) -> Result<T, LlmError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let result = match self.model.complete(messages).await {
                Ok(raw) => {
                    debug!(raw_response = %raw, "model replied");
                    parse_json_response(&raw)
                }
                Err(e) => Err(e),
            };

            match result {
                Ok(value) => return Ok(value),
                Err(e) if attempt < self.max_retries => {
                    warn!(attempt, max = self.max_retries, error = %e, "LLM call failed, retrying");
                    tokio::time::sleep(self.retry_delay).await;
                }
                Err(e) => {
                    warn!(attempt, error = %e, "LLM call failed, giving up");
                    return Err(LlmError::Exhausted { attempts: attempt, last: Box::new(e) });
                }
            }
        }
    }
}

/// Parse model output as JSON, either bare or wrapped in a Markdown fence.
pub fn parse_json_response<T: DeserializeOwned>(raw: &str) -> Result<T, LlmError> {
    if let Ok(value) = serde_json::from_str(raw.trim()) {
        return Ok(value);
    }

    let block = fenced_block(raw).ok_or_else(|| LlmError::InvalidJson("no valid JSON block found".into()))?;
    serde_json::from_str(block.trim()).map_err(|e| LlmError::InvalidJson(e.to_string()))
}

fn fenced_block(raw: &str) -> Option<&str> {
    let start = raw.find("```")? + 3;
    let rest = &raw[start..];
    let rest = rest
        .strip_prefix("json\n")
        .or_else(|| rest.strip_prefix('\n'))
        .unwrap_or(rest);
    let end = rest.find("```")?;
    Some(&rest[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use std::sync::Mutex;

    struct Scripted(Mutex<Vec<Result<String, LlmError>>>);

    #[async_trait]
    impl LanguageModel for Scripted {
        async fn complete(&self, _messages: &[PromptMessage]) -> Result<String, LlmError> {
            self.0.lock().unwrap().remove(0)
        }
    }

    #[tokio::test]
    async fn hung_model_call_times_out() {
        // Accepts connections but never answers.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let model = OpenAiCompatible::new("key", format!("http://{addr}/v1"), "m", Duration::from_millis(200)).unwrap();
        let err = tokio::time::timeout(Duration::from_secs(5), model.complete(&[]))
            .await
            .expect("client timeout should fire first")
            .unwrap_err();
        assert!(matches!(err, LlmError::Http(ref e) if e.is_timeout()));
    }

    #[test]
    fn parses_bare_json() {
        let v: Value = parse_json_response(r#"{"reply": "hi"}"#).unwrap();
        assert_eq!(v["reply"], "hi");
    }

    #[test]
    fn parses_fenced_json() {
        let raw = "Sure!\n```json\n{\"reply\": \"hello\", \"expression\": \"happy\"}\n```\nbye";
        let v: Value = parse_json_response(raw).unwrap();
        assert_eq!(v["expression"], "happy");

        let raw = "```\n{\"reply\": \"plain fence\"}\n```";
        assert_eq!(parse_json_response::<Value>(raw).unwrap()["reply"], "plain fence");
    }

    #[test]
    fn rejects_prose() {
        assert!(matches!(
            parse_json_response::<Value>("just words"),
            Err(LlmError::InvalidJson(_))
        ));
    }

    #[tokio::test(start_paused = true)]
    async fn retries_until_valid_json() {
        let model = Scripted(Mutex::new(vec![
            Err(LlmError::EmptyCompletion),
            Ok("not json".to_string()),
            Ok(r#"{"reply":"third time"}"#.to_string()),
        ]));
        let service = LlmService::new(Arc::new(model), 3);
        let v: Value = service.generate(&[]).await.unwrap();
        assert_eq!(v["reply"], "third time");
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_max_retries() {
        let model = Scripted(Mutex::new(vec![
            Err(LlmError::EmptyCompletion),
            Err(LlmError::EmptyCompletion),
        ]));
        let service = LlmService::new(Arc::new(model), 2);
        let err = service.generate::<Value>(&[]).await.unwrap_err();
        assert!(matches!(err, LlmError::Exhausted { attempts: 2, .. }));
    }
}
