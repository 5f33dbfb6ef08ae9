use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use super::CResult;
use crate::core::errors::CollaboratorError;
use crate::model::TokenUsage;

#[derive(Debug, Clone)]
pub struct GenerateObjectResult {
    pub value: Value,
    pub usage: TokenUsage,
}

/// **LLM.generate_object** (§6): schema-constrained structured generation.
/// Implementations must support either native JSON-schema enforcement or a
/// fallback parse of loosely-formed JSON (the retry cascade in §4.5 lives in
/// the Action Generator, one layer above this trait).
#[async_trait]
pub trait Llm: Send + Sync {
    async fn generate_object(
        &self,
        schema: &Value,
        system_prompt: &str,
        messages: &[(String, String)],
    ) -> CResult<GenerateObjectResult>;
}

/// Minimal OpenAI-compatible chat-completions client, grounded in the teacher's
/// `reqwest`-based HTTP collaborator style (`core::config::ShadowDeepResearchConfig`
/// resolving base_url/api_key/model) generalized to schema-constrained JSON output.
pub struct HttpLlm {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    model: String,
}

impl HttpLlm {
    pub fn new(base_url: String, api_key: Option<String>, model: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(120))
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            base_url,
            api_key,
            model,
        }
    }

    fn endpoint(&self) -> String {
        format!("{}/chat/completions", self.base_url.trim_end_matches('/'))
    }
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[async_trait]
impl Llm for HttpLlm {
    async fn generate_object(
        &self,
        schema: &Value,
        system_prompt: &str,
        messages: &[(String, String)],
    ) -> CResult<GenerateObjectResult> {
        let mut chat_messages = vec![ChatMessage {
            role: "system",
            content: system_prompt,
        }];
        for (role, content) in messages {
            chat_messages.push(ChatMessage { role, content });
        }

        let body = serde_json::json!({
            "model": self.model,
            "messages": chat_messages,
            "response_format": {
                "type": "json_schema",
                "json_schema": { "name": "action", "schema": schema, "strict": true },
            },
        });

        let mut request = self.client.post(self.endpoint()).json(&body);
        if let Some(key) = &self.api_key {
            if !key.is_empty() {
                request = request.bearer_auth(key);
            }
        }

        let response = tokio::time::timeout(std::time::Duration::from_secs(120), request.send())
            .await
            .map_err(|_| CollaboratorError::Timeout(std::time::Duration::from_secs(120)))?
            .map_err(CollaboratorError::Http)?;

        let response_json: Value = response.json().await.map_err(CollaboratorError::Http)?;

        let content = response_json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| CollaboratorError::SchemaGeneration("missing message content".into()))?;

        let value: Value = serde_json::from_str(content)
            .map_err(|e| CollaboratorError::SchemaGeneration(e.to_string()))?;

        let usage = TokenUsage::new(
            response_json["usage"]["prompt_tokens"].as_u64().unwrap_or(0) as u32,
            response_json["usage"]["completion_tokens"].as_u64().unwrap_or(0) as u32,
        );

        Ok(GenerateObjectResult { value, usage })
    }
}
