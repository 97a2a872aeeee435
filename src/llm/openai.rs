use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

use crate::cache::ResponseCache;
use crate::error::{OntomapError, Result};

use super::{GenerateRequest, LlmClient, LlmResponse};

/// Request structure for the chat completions API
#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

/// Response structure from the chat completions API
#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<ChatUsage>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

#[derive(Deserialize, Default)]
struct ChatUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

/// OpenAI-compatible chat completions client
///
/// Handles generation with retry logic for rate limits and transient server
/// errors, and an optional response cache for repeated prompts.
pub struct OpenAiClient {
    client: Client,
    api_key: String,
    model: String,
    max_retries: usize,
    cache: Option<Arc<ResponseCache>>,
}

impl OpenAiClient {
    /// Create a new client
    ///
    /// # Panics
    ///
    /// Panics if HTTP client cannot be created (should not happen in normal operation)
    pub fn new(api_key: String, model: String, max_retries: usize) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            api_key,
            model,
            max_retries,
            cache: None,
        }
    }

    /// Create a new client with response caching enabled
    pub fn new_with_cache(
        api_key: String,
        model: String,
        max_retries: usize,
        cache: Option<Arc<ResponseCache>>,
    ) -> Self {
        let mut client = Self::new(api_key, model, max_retries);
        client.cache = cache;
        client
    }

    /// Make a single API request
    async fn generate_internal(&self, request: &GenerateRequest) -> Result<LlmResponse> {
        let body = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: request.system_message.clone(),
                },
                ChatMessage {
                    role: "user",
                    content: request.prompt.clone(),
                },
            ],
            temperature: request.temperature,
        };

        let response = self
            .client
            .post("https://api.openai.com/v1/chat/completions")
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| OntomapError::Llm(format!("Network error: {}", e)))?;

        let status = response.status();

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read error response".to_string());

            return Err(OntomapError::Llm(format!(
                "API error {}: {}",
                status, body
            )));
        }

        let result: ChatResponse = response
            .json()
            .await
            .map_err(|e| OntomapError::Llm(format!("Failed to parse response: {}", e)))?;

        let content = result
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| OntomapError::Llm("Empty completion in API response".to_string()))?;

        let usage = result.usage.unwrap_or_default();
        Ok(LlmResponse {
            content,
            prompt_tokens: usage.prompt_tokens,
            completion_tokens: usage.completion_tokens,
        })
    }

    /// Generate with retry on rate limits (429) and transient server errors (5xx)
    async fn generate_with_retry(&self, request: &GenerateRequest) -> Result<LlmResponse> {
        let start = std::time::Instant::now();
        let mut attempt = 0;
        let mut delay = Duration::from_secs(1);

        loop {
            match self.generate_internal(request).await {
                Ok(response) => {
                    log::debug!(
                        "LLM call took {:?} (attempt {}, {} completion tokens)",
                        start.elapsed(),
                        attempt + 1,
                        response.completion_tokens
                    );
                    return Ok(response);
                }
                Err(e) if attempt < self.max_retries => {
                    let message = e.to_string();
                    let should_retry = message.contains("429")
                        || message.contains("500")
                        || message.contains("502")
                        || message.contains("503")
                        || message.contains("504");

                    if should_retry {
                        log::warn!("Retry {}/{} after error: {}", attempt + 1, self.max_retries, e);
                        tokio::time::sleep(delay).await;
                        delay *= 2; // Exponential backoff
                        attempt += 1;
                    } else {
                        return Err(e);
                    }
                }
                Err(e) => return Err(e),
            }
        }
    }
}

#[async_trait]
impl LlmClient for OpenAiClient {
    async fn generate_response(&self, request: &GenerateRequest) -> Result<LlmResponse> {
        if let Some(cache) = &self.cache {
            if let Some(content) = cache.get(&request.system_message, &request.prompt) {
                log::debug!("Response cache hit");
                return Ok(LlmResponse {
                    content,
                    prompt_tokens: 0,
                    completion_tokens: 0,
                });
            }
        }

        let response = self.generate_with_retry(request).await?;

        if let Some(cache) = &self.cache {
            cache.put(&request.system_message, &request.prompt, response.content.clone());
        }

        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_new() {
        let client = OpenAiClient::new("test-key".to_string(), "gpt-4o-mini".to_string(), 3);
        assert_eq!(client.model, "gpt-4o-mini");
        assert_eq!(client.max_retries, 3);
        assert!(client.cache.is_none());
    }

    #[test]
    fn test_client_with_cache() {
        let cache = Arc::new(ResponseCache::new(16));
        let client = OpenAiClient::new_with_cache(
            "test-key".to_string(),
            "gpt-4o-mini".to_string(),
            3,
            Some(cache),
        );
        assert!(client.cache.is_some());
    }

    #[test]
    fn test_chat_request_serializes() {
        let body = ChatRequest {
            model: "gpt-4o-mini".to_string(),
            messages: vec![ChatMessage {
                role: "user",
                content: "hello".to_string(),
            }],
            temperature: 0.2,
        };
        let json = serde_json::to_string(&body).unwrap();
        assert!(json.contains("\"role\":\"user\""));
        assert!(json.contains("\"temperature\":0.2"));
    }

    // Note: Integration tests for actual API calls would require a real API key
    // and should be run separately with proper test fixtures
}
