use std::sync::Arc;

use backoff::{future::retry, ExponentialBackoffBuilder};
use schemars::schema_for;
use serde_json::Value;

use crate::collaborators::Llm;
use crate::core::errors::CollaboratorError;
use crate::model::{Action, ActionKind, ActionPermissions, KnowledgeStore, TokenUsage};

/// Action Generator (C5): builds the per-step prompt and JSON schema, invokes
/// the LLM, and parses the resulting tagged action (§4.5).
pub struct ActionGenerator {
    llm: Arc<dyn Llm>,
}

pub struct GeneratedAction {
    pub action: Action,
    pub usage: TokenUsage,
}

impl ActionGenerator {
    pub fn new(llm: Arc<dyn Llm>) -> Self {
        Self { llm }
    }

    /// Build the permitted-actions JSON schema: the full `Action` schema with
    /// its discriminated `oneOf` filtered down to the currently-permitted kinds.
    fn build_schema(permissions: &ActionPermissions) -> Value {
        let schema = schema_for!(Action);
        let mut value = serde_json::to_value(schema).unwrap_or(Value::Null);

        let permitted: Vec<&str> = permissions
            .permitted_kinds()
            .iter()
            .map(ActionKind::as_str)
            .collect();

        if let Some(variants) = value.get_mut("oneOf").and_then(|v| v.as_array_mut()) {
            variants.retain(|variant| {
                variant
                    .get("properties")
                    .and_then(|p| p.get("action"))
                    .and_then(|a| a.get("const"))
                    .and_then(|c| c.as_str())
                    .map(|kind| permitted.contains(&kind))
                    .unwrap_or(true)
            });
        }
        value
    }

    /// Render the prompt per §4.5: header (current date), context (diary),
    /// permitted-action descriptions, footer.
    pub fn build_system_prompt(
        permissions: &ActionPermissions,
        used_keywords: &[String],
        visit_shortlist_len: usize,
        improvement_plans: &[String],
    ) -> String {
        let today = chrono::Utc::now().format("%Y-%m-%d").to_string();
        let mut prompt = format!("Current date: {today}\n\n");
        prompt.push_str("You are a careful research agent. Choose exactly one action this step.\n\n");
        prompt.push_str("Permitted actions:\n");
        for kind in permissions.permitted_kinds() {
            match kind {
                ActionKind::Search => prompt.push_str(&format!(
                    "- search: issue new queries, distinct from previously used keywords: {:?}\n",
                    used_keywords
                )),
                ActionKind::Visit => prompt.push_str(&format!(
                    "- visit: pick 1-based indices from the {} ranked URL candidates shown\n",
                    visit_shortlist_len
                )),
                ActionKind::Answer => prompt.push_str("- answer: provide a final answer with references\n"),
                ActionKind::Reflect => prompt.push_str("- reflect: propose sub-questions that close a knowledge gap\n"),
                ActionKind::Code => prompt.push_str("- code: delegate a computational sub-task to a sandbox\n"),
            }
        }
        if !improvement_plans.is_empty() {
            prompt.push_str("\n<answer-requirements>\n");
            for plan in improvement_plans {
                prompt.push_str(plan);
                prompt.push('\n');
            }
            prompt.push_str("</answer-requirements>\n");
        }
        prompt.push_str("\nAlways include a `think` field explaining your reasoning before deciding.\n");
        prompt
    }

    /// Render the knowledge store as alternating user/assistant turns, per §4.5.
    pub fn build_messages(knowledge: &KnowledgeStore, current_question: &str) -> Vec<(String, String)> {
        let mut messages: Vec<(String, String)> = Vec::new();
        for item in knowledge.items() {
            messages.push(("user".to_string(), item.question.clone()));
            messages.push(("assistant".to_string(), item.answer.clone()));
        }
        messages.push(("user".to_string(), current_question.to_string()));
        messages
    }

    /// Invoke the LLM with schema-constrained output, parsing via the retry
    /// cascade in §4.5: direct parse -> lenient parse -> descriptionless-schema
    /// fallback -> fail the step. Retries bounded (default 2).
    pub async fn generate(
        &self,
        permissions: &ActionPermissions,
        system_prompt: &str,
        messages: &[(String, String)],
        max_retries: u32,
    ) -> Result<GeneratedAction, CollaboratorError> {
        let full_schema = Self::build_schema(permissions);
        let stripped_schema = strip_descriptions(full_schema.clone());

        let backoff = ExponentialBackoffBuilder::new()
            .with_max_elapsed_time(Some(std::time::Duration::from_secs(30)))
            .build();

        let attempt = move |schema: Value| {
            let llm = Arc::clone(&self.llm);
            let system_prompt = system_prompt.to_string();
            let messages = messages.to_vec();
            async move {
                llm.generate_object(&schema, &system_prompt, &messages)
                    .await
                    .map_err(backoff::Error::transient)
            }
        };

        let mut last_err = None;
        for (attempt_idx, schema) in [full_schema, stripped_schema].into_iter().enumerate() {
            if attempt_idx as u32 > max_retries {
                break;
            }
            match retry(backoff.clone(), || attempt(schema.clone())).await {
                Ok(result) => {
                    if let Some(action) = parse_action_lenient(&result.value) {
                        return Ok(GeneratedAction {
                            action,
                            usage: result.usage,
                        });
                    }
                    last_err = Some(CollaboratorError::SchemaGeneration(
                        "parsed JSON did not match any action variant".to_string(),
                    ));
                }
                Err(e) => last_err = Some(flatten_backoff_error(e)),
            }
        }

        Err(last_err.unwrap_or(CollaboratorError::SchemaGeneration("generation exhausted retries".into())))
    }
}

fn flatten_backoff_error(e: backoff::Error<CollaboratorError>) -> CollaboratorError {
    match e {
        backoff::Error::Permanent(e) => e,
        backoff::Error::Transient { err, .. } => err,
    }
}

/// Direct parse first; on failure, a lenient pass that tolerates a top-level
/// object missing the `action` discriminator by inferring it from whichever
/// known sub-object key is present.
fn parse_action_lenient(value: &Value) -> Option<Action> {
    if let Ok(action) = serde_json::from_value::<Action>(value.clone()) {
        return Some(action);
    }

    let obj = value.as_object()?;
    if obj.contains_key("action") {
        return None;
    }
    for key in ["search", "visit", "answer", "reflect", "code"] {
        if let Some(payload) = obj.get(key) {
            let mut tagged = payload.clone();
            if let Some(tagged_obj) = tagged.as_object_mut() {
                tagged_obj.insert("action".to_string(), Value::String(key.to_string()));
            }
            if let Ok(action) = serde_json::from_value::<Action>(tagged) {
                return Some(action);
            }
        }
    }
    None
}

/// Strip every `description` field from a schema value, used as the
/// descriptionless-schema fallback (§4.5).
fn strip_descriptions(mut value: Value) -> Value {
    strip_descriptions_mut(&mut value);
    value
}

fn strip_descriptions_mut(value: &mut Value) {
    match value {
        Value::Object(map) => {
            map.remove("description");
            for v in map.values_mut() {
                strip_descriptions_mut(v);
            }
        }
        Value::Array(items) => {
            for v in items {
                strip_descriptions_mut(v);
            }
        }
        _ => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_filters_to_permitted_kinds() {
        let schema = ActionGenerator::build_schema(&ActionPermissions::only(ActionKind::Search));
        let variants = schema["oneOf"].as_array().unwrap();
        assert_eq!(variants.len(), 1);
    }

    #[test]
    fn strips_descriptions_recursively() {
        let value = serde_json::json!({"description": "x", "nested": {"description": "y", "z": 1}});
        let stripped = strip_descriptions(value);
        assert!(stripped.get("description").is_none());
        assert!(stripped["nested"].get("description").is_none());
        assert_eq!(stripped["nested"]["z"], 1);
    }
}
