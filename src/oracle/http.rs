//! Chat-completions oracle client
//!
//! Talks to any OpenAI-compatible `/chat/completions` endpoint (OpenRouter by
//! default). Each call sends a single user message and expects JSON back in
//! the assistant's message content.

use super::response::{parse_analysis, parse_scores};
use super::{Analyzer, ContentAnalysis, LinkScore, OracleError, Scorer};
use crate::config::OracleConfig;
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;

const SCORE_MAX_TOKENS: u32 = 1500;
const SCORE_TEMPERATURE: f32 = 0.4;
const ANALYZE_MAX_TOKENS: u32 = 1000;
const ANALYZE_TEMPERATURE: f32 = 0.3;

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    content: Option<String>,
}

/// Oracle backed by a chat-completions HTTP API
pub struct HttpOracle {
    client: Client,
    completions_url: String,
    api_key: String,
    model: String,
    max_content_chars: usize,
}

impl HttpOracle {
    /// Creates a client for `endpoint` (the API base, without `/chat/completions`)
    pub fn new(
        endpoint: &str,
        api_key: impl Into<String>,
        model: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, OracleError> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            completions_url: format!("{}/chat/completions", endpoint.trim_end_matches('/')),
            api_key: api_key.into(),
            model: model.into(),
            max_content_chars: 4000,
        })
    }

    /// Builds the oracle from configuration, reading the API key from the
    /// environment variable the config names
    pub fn from_config(config: &OracleConfig, timeout: Duration) -> Result<Self, OracleError> {
        let api_key = std::env::var(&config.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
            .ok_or_else(|| OracleError::MissingApiKey(config.api_key_env.clone()))?;

        Ok(Self::new(&config.endpoint, api_key, &config.model, timeout)?
            .with_max_content_chars(config.max_content_chars))
    }

    /// Limits how much page text is sent for analysis
    pub fn with_max_content_chars(mut self, max: usize) -> Self {
        self.max_content_chars = max.max(1);
        self
    }

    async fn complete(
        &self,
        prompt: &str,
        max_tokens: u32,
        temperature: f32,
    ) -> Result<String, OracleError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![ChatMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens,
            temperature,
        };

        let response = self
            .client
            .post(&self.completions_url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(classify_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(OracleError::Status(status.as_u16()));
        }

        let body: ChatResponse = response
            .json()
            .await
            .map_err(|e| OracleError::Malformed(e.to_string()))?;

        body.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| OracleError::Malformed("response has no message content".to_string()))
    }
}

fn classify_error(error: reqwest::Error) -> OracleError {
    if error.is_timeout() {
        OracleError::Timeout
    } else {
        OracleError::Request(error)
    }
}

fn score_prompt(links: &[String], context: &str) -> String {
    let url_list = links
        .iter()
        .map(|url| format!("- {}", url))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Rate these URLs for crawling, considering likely content value, relevance \
         to the context, and importance for covering the site.\n\n\
         Context: {}\n\n\
         URLs:\n{}\n\n\
         Respond with JSON only, in this format:\n\
         {{\"results\": [{{\"url\": \"<url exactly as listed>\", \"priority_score\": <0-10>, \
         \"purpose_tag\": \"article|product_page|contact|docs|other\"}}]}}",
        context, url_list
    )
}

fn analyze_prompt(body: &str, context: &str) -> String {
    format!(
        "Categorize this web content and summarize it in 2-3 sentences.\n\n\
         Context: {}\n\n\
         Content: {}\n\n\
         Respond with JSON only, in this format:\n\
         {{\"categories\": [\"category1\", \"category2\"], \"summary\": \"...\"}}",
        context, body
    )
}

#[async_trait]
impl Scorer for HttpOracle {
    async fn score(&self, links: &[String], context: &str) -> Result<Vec<LinkScore>, OracleError> {
        if links.is_empty() {
            return Ok(Vec::new());
        }

        let content = self
            .complete(&score_prompt(links, context), SCORE_MAX_TOKENS, SCORE_TEMPERATURE)
            .await?;
        parse_scores(&content)
    }
}

#[async_trait]
impl Analyzer for HttpOracle {
    async fn analyze(
        &self,
        body_text: &str,
        context: &str,
    ) -> Result<ContentAnalysis, OracleError> {
        let body: String = body_text.chars().take(self.max_content_chars).collect();

        let content = self
            .complete(
                &analyze_prompt(&body, context),
                ANALYZE_MAX_TOKENS,
                ANALYZE_TEMPERATURE,
            )
            .await?;
        parse_analysis(&content)
    }
}
