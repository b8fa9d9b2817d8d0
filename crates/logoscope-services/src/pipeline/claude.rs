//! Anthropic Messages API provider

use anyhow::Context;
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use logoscope_core::{AppError, Config, ReportSection};
use serde::Deserialize;
use serde_json::{json, Value};
use std::fmt::{Debug, Formatter, Result as FmtResult};
use std::time::Duration;

use super::provider::ContentProvider;
use super::schema;

const SERVICE: &str = "anthropic";
const ANTHROPIC_VERSION: &str = "2023-06-01";
const DESCRIBE_MAX_TOKENS: u32 = 2048;
const EXTRACT_MAX_TOKENS: u32 = 2048;

pub struct ClaudeProvider {
    http_client: reqwest::Client,
    api_base: String,
    api_key: String,
    vision_model: String,
    extraction_model: String,
}

impl Debug for ClaudeProvider {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.debug_struct("ClaudeProvider")
            .field("api_base", &self.api_base)
            .field("vision_model", &self.vision_model)
            .field("extraction_model", &self.extraction_model)
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text { text: String },
    ToolUse { name: String, input: Value },
    #[serde(other)]
    Other,
}

impl ClaudeProvider {
    pub fn new(
        api_base: &str,
        api_key: &str,
        vision_model: &str,
        extraction_model: &str,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client for content generation")?;

        Ok(Self {
            http_client,
            api_base: api_base.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            vision_model: vision_model.to_string(),
            extraction_model: extraction_model.to_string(),
        })
    }

    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let api_key = match config.anthropic_api_key() {
            Some(key) => key,
            None => {
                tracing::warn!("ANTHROPIC_API_KEY not set; analysis runs will fail");
                ""
            }
        };
        Self::new(
            config.anthropic_api_base(),
            api_key,
            config.anthropic_vision_model(),
            config.anthropic_extraction_model(),
            Duration::from_secs(config.analysis_call_timeout_secs()),
        )
    }

    async fn send(&self, body: &Value) -> Result<MessagesResponse, AppError> {
        let response = self
            .http_client
            .post(format!("{}/v1/messages", self.api_base))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .json(body)
            .send()
            .await
            .map_err(|e| AppError::external(SERVICE, format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let snippet: String = body.chars().take(300).collect();
            return Err(AppError::external(
                SERVICE,
                format!("status {}: {}", status.as_u16(), snippet),
            ));
        }

        response
            .json::<MessagesResponse>()
            .await
            .map_err(|e| AppError::external(SERVICE, format!("unreadable response: {}", e)))
    }

    /// SVG is not accepted as an image block, so its markup is sent as text.
    fn image_block(image: &[u8], media_type: &str) -> Value {
        if media_type == "image/svg+xml" {
            json!({
                "type": "text",
                "text": format!("The logo is an SVG document:\n\n{}", String::from_utf8_lossy(image))
            })
        } else {
            json!({
                "type": "image",
                "source": {
                    "type": "base64",
                    "media_type": media_type,
                    "data": STANDARD.encode(image)
                }
            })
        }
    }
}

#[async_trait]
impl ContentProvider for ClaudeProvider {
    async fn describe(&self, image: &[u8], media_type: &str) -> Result<String, AppError> {
        let body = json!({
            "model": self.vision_model,
            "max_tokens": DESCRIBE_MAX_TOKENS,
            "messages": [{
                "role": "user",
                "content": [
                    Self::image_block(image, media_type),
                    { "type": "text", "text": schema::DESCRIPTION_PROMPT }
                ]
            }]
        });

        let response = self.send(&body).await?;
        let text = response
            .content
            .into_iter()
            .filter_map(|block| match block {
                ContentBlock::Text { text } => Some(text),
                _ => None,
            })
            .collect::<Vec<_>>()
            .join("\n");

        Ok(text)
    }

    async fn extract(
        &self,
        section: ReportSection,
        description: &str,
    ) -> Result<Value, AppError> {
        let tool_name = schema::tool_name(section);
        let body = json!({
            "model": self.extraction_model,
            "max_tokens": EXTRACT_MAX_TOKENS,
            "tools": [{
                "name": tool_name,
                "description": format!("Record the {} section of a logo analysis", section),
                "input_schema": schema::input_schema(section)
            }],
            "tool_choice": { "type": "tool", "name": tool_name },
            "messages": [{
                "role": "user",
                "content": format!(
                    "{}\n\nLogo description:\n{}",
                    schema::instructions(section),
                    description
                )
            }]
        });

        let response = self.send(&body).await?;
        response
            .content
            .into_iter()
            .find_map(|block| match block {
                ContentBlock::ToolUse { name, input } if name == tool_name => Some(input),
                _ => None,
            })
            .ok_or_else(|| AppError::SchemaValidation {
                section: section.to_string(),
                message: "response contained no tool call".to_string(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn provider(base: &str) -> ClaudeProvider {
        ClaudeProvider::new(
            base,
            "sk-ant-test",
            "vision-model",
            "extraction-model",
            Duration::from_secs(5),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_describe_sends_image_block() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/messages")
            .match_header("x-api-key", "sk-ant-test")
            .match_header("anthropic-version", ANTHROPIC_VERSION)
            .match_body(Matcher::PartialJson(json!({ "model": "vision-model" })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"content":[{"type":"text","text":"A blue circle"},{"type":"text","text":"over a wordmark"}]}"#,
            )
            .create_async()
            .await;

        let text = provider(&server.url())
            .describe(b"\x89PNG\r\n\x1a\n", "image/png")
            .await
            .unwrap();

        assert_eq!(text, "A blue circle\nover a wordmark");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_extract_reads_forced_tool_call() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/messages")
            .match_body(Matcher::PartialJson(json!({
                "model": "extraction-model",
                "tool_choice": { "type": "tool", "name": "record_summary" }
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"content":[{"type":"thinking","thinking":"..."},{"type":"tool_use","id":"t1","name":"record_summary","input":{"headline":"Bold"}}]}"#,
            )
            .create_async()
            .await;

        let value = provider(&server.url())
            .extract(ReportSection::Summary, "A blue circle")
            .await
            .unwrap();

        assert_eq!(value["headline"], "Bold");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_upstream_error_is_external() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/messages")
            .with_status(529)
            .with_body(r#"{"type":"error","error":{"type":"overloaded_error"}}"#)
            .create_async()
            .await;

        let err = provider(&server.url())
            .extract(ReportSection::Scoring, "desc")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ExternalService { service: "anthropic", .. }));
        assert!(err.to_string().contains("529"));
    }

    #[tokio::test]
    async fn test_missing_tool_call_is_schema_failure() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/v1/messages")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"content":[{"type":"text","text":"I cannot do that"}]}"#)
            .create_async()
            .await;

        let err = provider(&server.url())
            .extract(ReportSection::Colors, "desc")
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::SchemaValidation { .. }));
    }
}
