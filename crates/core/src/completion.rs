use crate::config::CompletionConfig;
use crate::error::CompletionFailure;
use crate::traits::CompletionModel;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// OpenAI-compatible chat-completions client. Responses are never streamed.
pub struct OpenAiChatModel {
    config: CompletionConfig,
    client: Client,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    #[serde(default)]
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

impl OpenAiChatModel {
    pub fn new(config: CompletionConfig) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn url(&self) -> String {
        format!(
            "{}/chat/completions",
            self.config.endpoint.trim_end_matches('/')
        )
    }
}

fn classify(error: reqwest::Error) -> CompletionFailure {
    if error.is_timeout() {
        CompletionFailure::Timeout
    } else {
        CompletionFailure::Unreachable(error.to_string())
    }
}

fn first_message(response: ChatResponse) -> Result<String, CompletionFailure> {
    response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or(CompletionFailure::EmptyResponse)
}

#[async_trait]
impl CompletionModel for OpenAiChatModel {
    async fn complete(&self, system: &str, prompt: &str) -> Result<String, CompletionFailure> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: prompt,
                },
            ],
            stream: false,
        };

        let response = self
            .client
            .post(self.url())
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await
            .map_err(classify)?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(CompletionFailure::Status(format!("{status}: {body}")));
        }

        let parsed: ChatResponse = response
            .json()
            .await
            .map_err(|error| CompletionFailure::InvalidResponse(error.to_string()))?;
        let content = first_message(parsed)?;
        debug!(model = %self.config.model, chars = content.len(), "completion received");
        Ok(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serves one HTTP response with `body` and status 200, then closes.
    async fn serve_once(body: &'static str) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap();

        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = vec![0u8; 8192];
            let _ = socket.read(&mut request).await;
            let response = format!(
                "HTTP/1.1 200 OK\r\ncontent-type: application/json\r\n\
                 content-length: {}\r\nconnection: close\r\n\r\n{}",
                body.len(),
                body
            );
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        });

        format!("http://{address}")
    }

    #[test]
    fn request_is_non_streaming_with_two_messages() {
        let request = ChatRequest {
            model: "gpt-4o-mini",
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: "Answer using only the given context",
                },
                ChatMessage {
                    role: "user",
                    content: "ctx\n\nQuestion: why?",
                },
            ],
            stream: false,
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "gpt-4o-mini");
        assert_eq!(json["stream"], false);
        assert_eq!(json["messages"].as_array().map(Vec::len), Some(2));
        assert_eq!(json["messages"][0]["role"], "system");
    }

    #[test]
    fn response_content_is_extracted() {
        let json = r#"{
            "choices": [
                {"message": {"role": "assistant", "content": "Forty-two."}, "finish_reason": "stop"}
            ]
        }"#;
        let response: ChatResponse = serde_json::from_str(json).unwrap();
        assert_eq!(first_message(response).unwrap(), "Forty-two.");
    }

    #[test]
    fn missing_choices_is_an_empty_response() {
        let response: ChatResponse = serde_json::from_str("{}").unwrap();
        assert_eq!(first_message(response), Err(CompletionFailure::EmptyResponse));
    }

    #[test]
    fn endpoint_trailing_slash_is_ignored() {
        let mut config = CompletionConfig::new("key");
        config.endpoint = "http://localhost:8080/v1/".to_string();
        let model = OpenAiChatModel::new(config).unwrap();
        assert_eq!(model.url(), "http://localhost:8080/v1/chat/completions");
        assert_eq!(model.model(), "gpt-4o-mini");
    }

    #[test]
    fn failures_render_readable_messages() {
        assert_eq!(CompletionFailure::Timeout.to_string(), "language model timed out");
        assert_eq!(
            CompletionFailure::Status("500 Internal Server Error: boom".to_string()).to_string(),
            "language model returned 500 Internal Server Error: boom"
        );
    }

    #[tokio::test]
    async fn malformed_body_is_an_invalid_response() {
        let mut config = CompletionConfig::new("key");
        config.endpoint = serve_once("{not json").await;
        let model = OpenAiChatModel::new(config).unwrap();

        let result = model.complete("system", "prompt").await;
        assert!(matches!(result, Err(CompletionFailure::InvalidResponse(_))));
    }

    #[tokio::test]
    async fn unreachable_backend_is_reported() {
        let mut config = CompletionConfig::new("key");
        config.endpoint = "http://127.0.0.1:9".to_string();
        config.timeout = Duration::from_secs(2);
        let model = OpenAiChatModel::new(config).unwrap();

        let result = model.complete("system", "prompt").await;
        assert!(matches!(
            result,
            Err(CompletionFailure::Unreachable(_)) | Err(CompletionFailure::Timeout)
        ));
    }
}
