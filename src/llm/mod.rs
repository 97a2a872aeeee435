//! LLM client seam: request/response types, the `LlmClient` trait and
//! helpers for parsing model output that is expected to be JSON.

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::error::{OntomapError, Result};

pub mod openai;

pub use openai::OpenAiClient;

/// A single generation request.
#[derive(Debug, Clone)]
pub struct GenerateRequest {
    pub prompt: String,
    pub system_message: String,
    pub temperature: f32,
    /// Ask the provider for extended reasoning when supported.
    pub thinking: bool,
}

/// Model output plus token accounting.
#[derive(Debug, Clone, Default)]
pub struct LlmResponse {
    pub content: String,
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// External LLM call. Response content is free text that call sites parse
/// against a documented JSON schema.
#[async_trait]
pub trait LlmClient: Send + Sync {
    async fn generate_response(&self, request: &GenerateRequest) -> Result<LlmResponse>;
}

/// Parse a JSON object out of LLM response content.
///
/// Models routinely wrap JSON in markdown code fences or surround it with
/// prose; strip fences first, then fall back to the outermost brace span.
pub fn parse_json_response<T: DeserializeOwned>(content: &str) -> Result<T> {
    let trimmed = content.trim();

    let without_fences = if trimmed.starts_with("```") {
        let inner = trimmed
            .trim_start_matches("```json")
            .trim_start_matches("```");
        inner.trim_end_matches("```").trim()
    } else {
        trimmed
    };

    if let Ok(parsed) = serde_json::from_str(without_fences) {
        return Ok(parsed);
    }

    // Prose around the object: take the outermost { ... } span.
    if let (Some(start), Some(end)) = (without_fences.find('{'), without_fences.rfind('}')) {
        if start < end {
            return serde_json::from_str(&without_fences[start..=end]).map_err(|e| {
                OntomapError::Parse(format!("LLM response is not valid JSON: {}", e))
            });
        }
    }

    Err(OntomapError::Parse(
        "LLM response contains no JSON object".to_string(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Payload {
        defining_sql: String,
    }

    #[test]
    fn test_parse_plain_json() {
        let parsed: Payload =
            parse_json_response(r#"{"defining_sql": "SELECT COUNT(*) FROM users"}"#).unwrap();
        assert_eq!(parsed.defining_sql, "SELECT COUNT(*) FROM users");
    }

    #[test]
    fn test_parse_fenced_json() {
        let content = "```json\n{\"defining_sql\": \"SELECT 1\"}\n```";
        let parsed: Payload = parse_json_response(content).unwrap();
        assert_eq!(parsed.defining_sql, "SELECT 1");
    }

    #[test]
    fn test_parse_json_with_prose() {
        let content = "Here is the query you asked for:\n{\"defining_sql\": \"SELECT 1\"}\nHope that helps!";
        let parsed: Payload = parse_json_response(content).unwrap();
        assert_eq!(parsed.defining_sql, "SELECT 1");
    }

    #[test]
    fn test_parse_rejects_non_json() {
        let result: Result<Payload> = parse_json_response("I cannot answer that.");
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_rejects_schema_mismatch() {
        let result: Result<Payload> = parse_json_response(r#"{"sql": "SELECT 1"}"#);
        assert!(result.is_err());
    }
}
