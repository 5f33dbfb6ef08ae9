use serde_json::Value;

use crate::collaborators::Llm;

/// Post-failure error analysis (§4.7): run once the original question's
/// answer has just failed evaluation, over the full step diary, to produce a
/// recap/blame/improvement triple distinct from the evaluator's own
/// reasoning. Grounded on the original's dedicated error-analysis tool.
#[derive(Debug, Clone)]
pub struct ErrorAnalysis {
    pub recap: String,
    pub blame: String,
    pub improvement: String,
}

const SYSTEM_PROMPT: &str = "You are an expert at analyzing search and reasoning processes. Given a sequence of research steps, determine what went wrong.\n\nConsider: the order of the steps; whether each step was productive; the logic connecting consecutive steps; alternative approaches that could have been taken; signs of a repetitive or looping pattern; whether the final answer actually matches the information gathered.\n\nThen report:\n- recap: a chronological summary of the key actions, highlighting where the process started to go wrong\n- blame: the specific step or pattern responsible for the inadequate answer\n- improvement: actionable advice that would likely produce a better result next time";

fn schema() -> Value {
    serde_json::json!({
        "type": "object",
        "properties": {
            "recap": {"type": "string"},
            "blame": {"type": "string"},
            "improvement": {"type": "string"},
        },
        "required": ["recap", "blame", "improvement"],
        "additionalProperties": false,
    })
}

/// Returns `None` on any collaborator failure or malformed response; the
/// caller falls back to the evaluator's bare reasoning in that case.
pub async fn analyze(llm: &dyn Llm, diary_context: &[String]) -> Option<ErrorAnalysis> {
    if diary_context.is_empty() {
        return None;
    }
    let messages = [("user".to_string(), diary_context.join("\n\n"))];
    let result = llm.generate_object(&schema(), SYSTEM_PROMPT, &messages).await.ok()?;
    Some(ErrorAnalysis {
        recap: result.value.get("recap")?.as_str()?.to_string(),
        blame: result.value.get("blame")?.as_str()?.to_string(),
        improvement: result.value.get("improvement")?.as_str()?.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::{CResult, GenerateObjectResult};
    use crate::model::TokenUsage;
    use async_trait::async_trait;

    struct FakeLlm(Value);

    #[async_trait]
    impl Llm for FakeLlm {
        async fn generate_object(
            &self,
            _schema: &Value,
            _system_prompt: &str,
            _messages: &[(String, String)],
        ) -> CResult<GenerateObjectResult> {
            Ok(GenerateObjectResult {
                value: self.0.clone(),
                usage: TokenUsage::default(),
            })
        }
    }

    #[tokio::test]
    async fn empty_diary_skips_the_call() {
        let llm = FakeLlm(serde_json::json!({}));
        assert!(analyze(&llm, &[]).await.is_none());
    }

    #[tokio::test]
    async fn parses_the_triple_from_a_well_formed_response() {
        let llm = FakeLlm(serde_json::json!({
            "recap": "searched then visited then answered",
            "blame": "the answer ignored the visited page's caveats",
            "improvement": "re-read the visited source before answering",
        }));
        let analysis = analyze(&llm, &["<question>q</question>".to_string()]).await.unwrap();
        assert_eq!(analysis.blame, "the answer ignored the visited page's caveats");
    }

    #[tokio::test]
    async fn malformed_response_yields_none() {
        let llm = FakeLlm(serde_json::json!({"recap": "x"}));
        assert!(analyze(&llm, &["step".to_string()]).await.is_none());
    }
}
