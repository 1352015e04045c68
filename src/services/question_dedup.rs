use std::fmt::Write as _;
use std::sync::Arc;

use schemars::JsonSchema;
use serde::Deserialize;
use tokio::time::Instant;

use crate::constants::prompts::{DEDUP_EVALUATION_CRITERIA, QUESTION_DEDUP_SYSTEM_PROMPT};
use crate::errors::GatewayError;
use crate::models::domain::{DedupResult, Question};
use crate::services::gateway::{
    invoke_with_deadline, tool_parameters, ChatGateway, ChatTurn, ToolCallRequest, ToolSpec,
};
use crate::services::transcript::TranscriptLogger;

#[derive(Debug, Deserialize, JsonSchema)]
struct CheckDuplicateArgs {
    /// Explanation for the decision.
    reason: String,
    /// Whether the new question is a duplicate of an existing question.
    is_duplicate: bool,
    /// ID of the duplicated existing question, when one was found.
    duplicate_id: Option<String>,
}

/// Judges whether an accepted candidate collides with any question already
/// accepted in this run. The accepted set is scoped to one run and only
/// grows on a non-duplicate verdict.
pub struct QuestionDeduper {
    gateway: Arc<dyn ChatGateway>,
    model: String,
    accepted: Vec<Question>,
}

impl QuestionDeduper {
    pub fn new(gateway: Arc<dyn ChatGateway>, model: String) -> Self {
        Self {
            gateway,
            model,
            accepted: Vec::new(),
        }
    }

    pub fn accepted_len(&self) -> usize {
        self.accepted.len()
    }

    fn tool_spec() -> ToolSpec {
        ToolSpec {
            name: "check_duplicate",
            description: "Check if the new question is a duplicate of any existing question",
            parameters: tool_parameters::<CheckDuplicateArgs>(),
        }
    }

    pub async fn check_duplicate(
        &mut self,
        question: &Question,
        transcript: &TranscriptLogger,
        deadline: Instant,
    ) -> Result<DedupResult, GatewayError> {
        // The first accepted candidate seeds the set unconditionally,
        // guaranteeing forward progress on an empty set.
        if self.accepted.is_empty() {
            self.accepted.push(question.clone());
            let result = DedupResult {
                is_duplicate: false,
                reason: "first question".to_string(),
                duplicate_id: None,
            };
            transcript.log_dedup_result(&question.id, false, &result.reason, None);
            return Ok(result);
        }

        log::debug!("Checking for duplicates: {}", question.id);

        let prompt = self.build_prompt(question);
        transcript.log_request("QuestionDedup", &prompt);

        let arguments = invoke_with_deadline(
            self.gateway.as_ref(),
            ToolCallRequest {
                model: self.model.clone(),
                system: QUESTION_DEDUP_SYSTEM_PROMPT,
                turns: vec![ChatTurn::User(prompt)],
                tool: Self::tool_spec(),
            },
            deadline,
        )
        .await?;

        transcript.log_response("QuestionDedup", &arguments.to_string());

        let args: CheckDuplicateArgs = serde_json::from_value(arguments).map_err(|e| {
            GatewayError::Parse(format!("unexpected check_duplicate shape: {}", e))
        })?;

        let result = DedupResult {
            is_duplicate: args.is_duplicate,
            reason: args.reason,
            duplicate_id: args.duplicate_id.filter(|id| !id.is_empty()),
        };

        if !result.is_duplicate {
            self.accepted.push(question.clone());
        }

        transcript.log_dedup_result(
            &question.id,
            result.is_duplicate,
            &result.reason,
            result.duplicate_id.as_deref(),
        );
        log::debug!(
            "Question {}: duplicate={}, reason={}",
            question.id,
            result.is_duplicate,
            result.reason
        );
        Ok(result)
    }

    fn build_prompt(&self, question: &Question) -> String {
        let mut prompt = String::new();

        prompt.push_str("Existing accepted questions:\n\n");
        for existing in &self.accepted {
            write_question_block(&mut prompt, existing);
        }

        prompt.push_str("New question to check:\n\n");
        write_question_block(&mut prompt, question);

        prompt.push_str(DEDUP_EVALUATION_CRITERIA);
        prompt
    }
}

fn write_question_block(prompt: &mut String, question: &Question) {
    let _ = writeln!(prompt, "ID: {}", question.id);
    let _ = writeln!(prompt, "Question: {}", question.text);
    prompt.push_str("Options:\n");
    for (i, option) in question.options.iter().enumerate() {
        let marker = if i == question.correct_answer { "*" } else { " " };
        let _ = writeln!(prompt, "{}{}. {}", marker, i + 1, option);
    }
    let _ = writeln!(prompt, "Correct Answer: {}", question.correct_answer + 1);
    let _ = writeln!(prompt, "Explanation: {}\n", question.explanation);
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use serde_json::Value;

    use crate::models::domain::QuestionStatus;

    struct PanickingGateway;

    #[async_trait]
    impl ChatGateway for PanickingGateway {
        async fn invoke(&self, _request: ToolCallRequest) -> Result<Value, GatewayError> {
            panic!("gateway must not be called for the seeding candidate");
        }
    }

    fn question(id: &str) -> Question {
        Question {
            id: id.to_string(),
            text: "Which planet has the most moons?".to_string(),
            options: vec![
                "Saturn".to_string(),
                "Jupiter".to_string(),
                "Uranus".to_string(),
                "Neptune".to_string(),
            ],
            correct_answer: 0,
            explanation: "Saturn overtook Jupiter with the discovery of 62 additional moons."
                .to_string(),
            topic: "Astronomy".to_string(),
            created_at: Utc::now(),
            status: QuestionStatus::Accepted,
            revision_count: 0,
        }
    }

    #[tokio::test]
    async fn test_first_candidate_seeds_without_gateway_call() {
        let mut deduper = QuestionDeduper::new(Arc::new(PanickingGateway), "gpt-4o".to_string());
        let transcript = TranscriptLogger::disabled();
        let deadline = Instant::now() + std::time::Duration::from_secs(5);

        let result = deduper
            .check_duplicate(&question("aaaa1111"), &transcript, deadline)
            .await
            .unwrap();

        assert!(!result.is_duplicate);
        assert_eq!(deduper.accepted_len(), 1);
    }

    #[test]
    fn test_prompt_lists_accepted_set_before_candidate() {
        let mut deduper = QuestionDeduper::new(Arc::new(PanickingGateway), "gpt-4o".to_string());
        deduper.accepted.push(question("aaaa1111"));

        let prompt = deduper.build_prompt(&question("bbbb2222"));

        let existing = prompt.find("ID: aaaa1111").unwrap();
        let candidate = prompt.find("ID: bbbb2222").unwrap();
        assert!(existing < candidate);
        assert!(prompt.contains("*1. Saturn"));
        assert!(prompt.contains("EXACT DUPLICATES"));
    }
}
