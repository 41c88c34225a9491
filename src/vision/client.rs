//! Vision description endpoint client
//!
//! Sends one captured frame per call to a chat-completions endpoint as a
//! data-URI image part next to a fixed textual prompt, and extracts the
//! first returned description. An empty choice list is "no description
//! produced", not an error.

use std::time::Duration;

use anyhow::{Context, Result};
use base64::Engine;
use serde::{Deserialize, Serialize};

/// Vision description collaborator trait.
///
/// `Ok(None)` means the endpoint produced no description for this frame.
#[async_trait::async_trait]
pub trait VisionDescriber: Send + Sync {
    async fn describe(&self, jpeg: &[u8]) -> Result<Option<String>>;
}

/// How to reach the vision endpoint.
#[derive(Debug, Clone)]
pub struct VisionOptions {
    /// Chat-completions URL
    pub url: String,

    /// Bearer token for the Authorization header
    pub api_key: String,

    /// Model asked to describe the frame
    pub model: String,

    /// Fixed textual prompt sent with every frame
    pub prompt: String,

    /// Response length cap
    pub max_tokens: u32,

    /// Per-request timeout
    pub request_timeout: Duration,
}

/// HTTP-backed describer.
pub struct VisionClient {
    http: reqwest::Client,
    options: VisionOptions,
}

impl VisionClient {
    pub fn new(options: VisionOptions) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(options.request_timeout)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self { http, options })
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<RequestMessage<'a>>,
    max_tokens: u32,
}

#[derive(Serialize)]
struct RequestMessage<'a> {
    role: &'a str,
    content: Vec<ContentPart<'a>>,
}

#[derive(Serialize)]
#[serde(tag = "type")]
enum ContentPart<'a> {
    #[serde(rename = "text")]
    Text { text: &'a str },
    #[serde(rename = "image_url")]
    ImageUrl { image_url: ImageUrl },
}

#[derive(Serialize)]
struct ImageUrl {
    url: String,
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
    content: String,
}

/// Pull the first choice's message content out of a response body.
pub fn first_description(body: &str) -> Result<Option<String>> {
    let response: ChatResponse =
        serde_json::from_str(body).context("Malformed vision endpoint response")?;
    Ok(response
        .choices
        .into_iter()
        .next()
        .map(|choice| choice.message.content))
}

#[async_trait::async_trait]
impl VisionDescriber for VisionClient {
    async fn describe(&self, jpeg: &[u8]) -> Result<Option<String>> {
        let encoded = base64::engine::general_purpose::STANDARD.encode(jpeg);
        let request = ChatRequest {
            model: &self.options.model,
            messages: vec![RequestMessage {
                role: "user",
                content: vec![
                    ContentPart::Text {
                        text: &self.options.prompt,
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: format!("data:image/jpeg;base64,{encoded}"),
                        },
                    },
                ],
            }],
            max_tokens: self.options.max_tokens,
        };

        let response = self
            .http
            .post(&self.options.url)
            .bearer_auth(&self.options.api_key)
            .json(&request)
            .send()
            .await
            .context("Vision endpoint request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Vision endpoint returned {status}: {body}");
        }

        let body = response
            .text()
            .await
            .context("Failed to read vision endpoint response")?;
        first_description(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_first_choice_content() {
        let body = r#"{
            "choices": [
                {"message": {"role": "assistant", "content": "a red car"}},
                {"message": {"role": "assistant", "content": "ignored"}}
            ]
        }"#;
        assert_eq!(first_description(body).unwrap().as_deref(), Some("a red car"));
    }

    #[test]
    fn empty_choices_is_no_description() {
        assert_eq!(first_description(r#"{"choices": []}"#).unwrap(), None);
        assert_eq!(first_description("{}").unwrap(), None);
    }

    #[test]
    fn malformed_body_is_an_error() {
        assert!(first_description("not json").is_err());
        assert!(first_description(r#"{"choices": [{"message": {}}]}"#).is_err());
    }

    #[test]
    fn request_body_carries_prompt_and_data_uri() {
        let request = ChatRequest {
            model: "gpt-4o-mini",
            messages: vec![RequestMessage {
                role: "user",
                content: vec![
                    ContentPart::Text {
                        text: "What's in this image?",
                    },
                    ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: "data:image/jpeg;base64,AAAA".to_string(),
                        },
                    },
                ],
            }],
            max_tokens: 300,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(value["model"], "gpt-4o-mini");
        assert_eq!(value["max_tokens"], 300);
        assert_eq!(value["messages"][0]["role"], "user");
        assert_eq!(value["messages"][0]["content"][0]["type"], "text");
        assert_eq!(value["messages"][0]["content"][1]["type"], "image_url");
        assert!(value["messages"][0]["content"][1]["image_url"]["url"]
            .as_str()
            .unwrap()
            .starts_with("data:image/jpeg;base64,"));
    }
}
