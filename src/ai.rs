//! AI writing suggestions over an OpenAI-compatible chat completions API.

use crate::config::AiConfig;
use crate::error::{AppError, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

/// Why a suggestion could not be produced.
///
/// Callers render this as a placeholder result instead of failing the request.
#[derive(Debug, Error)]
pub enum AiUnavailable {
    /// Suggestions are switched off in the configuration.
    #[error("AI suggestions are disabled")]
    Disabled,

    /// No API key is configured.
    #[error("no API key configured")]
    NotConfigured,

    /// The request could not be sent or the reply could not be read.
    #[error("{0}")]
    Request(#[from] reqwest::Error),

    /// The provider answered with an error status.
    #[error("provider returned {status}: {body}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body.
        body: String,
    },

    /// The reply had no completion text.
    #[error("empty response from provider")]
    EmptyResponse,
}

/// Kind of suggestion requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PromptKind {
    /// Creative content ideas.
    #[default]
    Content,
    /// Footnote suggestions.
    Footnote,
    /// Style, grammar and flow.
    Style,
    /// Publishing recommendations.
    Publishing,
    /// Marketing strategies.
    Marketing,
}

impl PromptKind {
    /// Resolve a request name; unknown names mean `Content`.
    pub fn from_name(name: &str) -> Self {
        match name.to_lowercase().as_str() {
            "footnote" => PromptKind::Footnote,
            "style" => PromptKind::Style,
            "publishing" => PromptKind::Publishing,
            "marketing" => PromptKind::Marketing,
            _ => PromptKind::Content,
        }
    }

    /// Request name of the kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            PromptKind::Content => "content",
            PromptKind::Footnote => "footnote",
            PromptKind::Style => "style",
            PromptKind::Publishing => "publishing",
            PromptKind::Marketing => "marketing",
        }
    }

    /// Build the prompt sent to the model.
    pub fn build_prompt(&self, prompt: &str, context: &str) -> String {
        match self {
            PromptKind::Content => format!(
                "As a writing assistant, provide creative content suggestions:\n\nContext: {}\n\nRequest: {}",
                context, prompt
            ),
            PromptKind::Footnote => format!(
                "Suggest relevant footnotes for this text:\n\nText: {}\n\nTopic: {}",
                context, prompt
            ),
            PromptKind::Style => format!(
                "Provide style, grammar, and flow improvements:\n\nText: {}",
                prompt
            ),
            PromptKind::Publishing => format!(
                "Provide publishing recommendations:\n\nBook: {}\n\nGenre: {}",
                prompt, context
            ),
            PromptKind::Marketing => format!(
                "Provide marketing strategies:\n\nBook: {}\n\nAudience: {}",
                prompt, context
            ),
        }
    }
}

/// Client for the configured completion endpoint.
#[derive(Clone)]
pub struct AiClient {
    http: reqwest::Client,
    config: AiConfig,
}

impl AiClient {
    /// Build a client from configuration.
    pub fn new(config: &AiConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build AI client: {}", e)))?;

        Ok(Self {
            http,
            config: config.clone(),
        })
    }

    /// Ask the model for a completion of `prompt`.
    pub async fn complete(&self, prompt: &str) -> std::result::Result<String, AiUnavailable> {
        if !self.config.enabled {
            return Err(AiUnavailable::Disabled);
        }
        if self.config.api_key.is_empty() {
            return Err(AiUnavailable::NotConfigured);
        }

        let request = serde_json::json!({
            "model": self.config.model,
            "messages": [{ "role": "user", "content": prompt }],
        });

        let response = self
            .http
            .post(&self.config.endpoint)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(AiUnavailable::Status { status, body });
        }

        let result: serde_json::Value = response.json().await?;
        completion_text(&result).ok_or(AiUnavailable::EmptyResponse)
    }
}

/// Text of the first choice of a chat completion reply.
fn completion_text(reply: &serde_json::Value) -> Option<String> {
    reply["choices"][0]["message"]["content"]
        .as_str()
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Placeholder shown instead of a suggestion.
pub fn placeholder(error: &AiUnavailable) -> String {
    format!("AI unavailable: {}", error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_templates() {
        assert_eq!(PromptKind::from_name("unknown"), PromptKind::Content);
        assert_eq!(PromptKind::from_name("Style"), PromptKind::Style);

        let prompt = PromptKind::Marketing.build_prompt("My Novel", "young adults");
        assert_eq!(
            prompt,
            "Provide marketing strategies:\n\nBook: My Novel\n\nAudience: young adults"
        );
        assert!(
            PromptKind::Style
                .build_prompt("Some text", "ignored")
                .ends_with("Text: Some text")
        );
    }

    #[test]
    fn test_completion_text() {
        let reply = serde_json::json!({
            "choices": [{ "message": { "role": "assistant", "content": "  Try this.  " } }]
        });
        assert_eq!(completion_text(&reply), Some("Try this.".to_string()));
        assert_eq!(completion_text(&serde_json::json!({ "choices": [] })), None);
    }

    #[tokio::test]
    async fn test_unconfigured_client_is_unavailable() {
        let client = AiClient::new(&AiConfig::default()).unwrap();
        let err = client.complete("hello").await.unwrap_err();
        assert!(matches!(err, AiUnavailable::NotConfigured));
        assert_eq!(placeholder(&err), "AI unavailable: no API key configured");

        let disabled = AiClient::new(&AiConfig {
            enabled: false,
            ..AiConfig::default()
        })
        .unwrap();
        assert!(matches!(
            disabled.complete("hello").await,
            Err(AiUnavailable::Disabled)
        ));
    }
}
