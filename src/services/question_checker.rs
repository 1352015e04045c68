use std::fmt::Write as _;
use std::sync::Arc;

use schemars::JsonSchema;
use serde::Deserialize;
use tokio::time::Instant;

use crate::constants::prompts::QUESTION_CHECKER_SYSTEM_PROMPT;
use crate::errors::GatewayError;
use crate::models::domain::{Question, ValidationAction, ValidationResult};
use crate::services::gateway::{
    invoke_with_deadline, tool_parameters, ChatGateway, ChatTurn, ToolCallRequest, ToolSpec,
};
use crate::services::question_maker::QuestionDraft;
use crate::services::transcript::TranscriptLogger;

/// A question exceeding this many revision cycles is rejected outright.
pub const MAX_REVISIONS: u32 = 3;

#[derive(Debug, Deserialize, JsonSchema)]
struct EvaluateQuestionArgs {
    /// Explanation for the decision.
    reason: String,
    /// What to do with this question.
    action: ValidationAction,
    /// Complete revised question, only when action is "revise".
    revised_question: Option<QuestionDraft>,
}

/// Judges a single question: accept, reject, or return a revision.
pub struct QuestionChecker {
    gateway: Arc<dyn ChatGateway>,
    model: String,
}

impl QuestionChecker {
    pub fn new(gateway: Arc<dyn ChatGateway>, model: String) -> Self {
        Self { gateway, model }
    }

    fn tool_spec() -> ToolSpec {
        ToolSpec {
            name: "evaluate_question",
            description:
                "Evaluate a quiz question and decide whether to accept, reject, or revise it",
            parameters: tool_parameters::<EvaluateQuestionArgs>(),
        }
    }

    pub async fn check(
        &self,
        question: &Question,
        transcript: &TranscriptLogger,
        deadline: Instant,
    ) -> Result<ValidationResult, GatewayError> {
        log::debug!(
            "Checking question {} (revision count: {})",
            question.id,
            question.revision_count
        );

        // Enforced here regardless of what the model would say, so revise
        // loops always terminate.
        if question.revision_count >= MAX_REVISIONS {
            let result = ValidationResult {
                question_id: question.id.clone(),
                action: ValidationAction::Reject,
                reason: format!(
                    "revision limit reached after {} attempts",
                    question.revision_count
                ),
                revised_question: None,
            };
            transcript.log_question_result(&question.id, "reject", &result.reason);
            return Ok(result);
        }

        let prompt = build_prompt(question);
        transcript.log_request("QuestionChecker", &prompt);

        let arguments = invoke_with_deadline(
            self.gateway.as_ref(),
            ToolCallRequest {
                model: self.model.clone(),
                system: QUESTION_CHECKER_SYSTEM_PROMPT,
                turns: vec![ChatTurn::User(prompt)],
                tool: Self::tool_spec(),
            },
            deadline,
        )
        .await?;

        transcript.log_response("QuestionChecker", &arguments.to_string());

        let args: EvaluateQuestionArgs = serde_json::from_value(arguments).map_err(|e| {
            GatewayError::Parse(format!("unexpected evaluate_question shape: {}", e))
        })?;

        let result = match (args.action, args.revised_question) {
            (ValidationAction::Revise, Some(draft)) if draft.is_well_formed() => {
                let revised = draft.into_question(
                    question.id.clone(),
                    question.topic.clone(),
                    question.revision_count + 1,
                );
                ValidationResult {
                    question_id: question.id.clone(),
                    action: ValidationAction::Revise,
                    reason: args.reason,
                    revised_question: Some(revised),
                }
            }
            (ValidationAction::Revise, _) => {
                // A revise verdict without a usable revision cannot make
                // progress, so it degrades to a rejection.
                ValidationResult {
                    question_id: question.id.clone(),
                    action: ValidationAction::Reject,
                    reason: format!("revise verdict without a usable revision: {}", args.reason),
                    revised_question: None,
                }
            }
            (action, _) => ValidationResult {
                question_id: question.id.clone(),
                action,
                reason: args.reason,
                revised_question: None,
            },
        };

        transcript.log_question_result(&question.id, &result.action.to_string(), &result.reason);
        log::debug!(
            "Question {}: {} - {}",
            question.id,
            result.action,
            result.reason
        );
        Ok(result)
    }
}

fn build_prompt(question: &Question) -> String {
    let mut prompt = String::new();

    let _ = writeln!(prompt, "Evaluate the following quiz question:\n");
    let _ = writeln!(prompt, "Quiz Topic: {}\n", question.topic);
    let _ = writeln!(prompt, "Question: {}\n", question.text);

    prompt.push_str("Options:\n");
    for (i, option) in question.options.iter().enumerate() {
        let marker = if i == question.correct_answer { "*" } else { " " };
        let _ = writeln!(prompt, "{}{}. {}", marker, i + 1, option);
    }

    let _ = writeln!(prompt, "\nCorrect Answer: {}", question.correct_answer + 1);
    let _ = writeln!(prompt, "Explanation: {}\n", question.explanation);

    prompt.push_str(
        "CRITICAL EVALUATION CRITERIA:\n\
         - AUTOMATIC REJECTION: the correct answer appears in the question text. REJECT, or REVISE if the question is salvageable.\n\
         - AUTOMATIC REJECTION: the question text contains obvious clues that give away the answer. REJECT, or REVISE if salvageable.\n\
         - AUTOMATIC REJECTION: the question is not relevant to the quiz topic. REJECT immediately.\n\n\
         Additional evaluation criteria:\n\
         1. Is the question clear and unambiguous?\n\
         2. Is the correct answer actually correct?\n\
         3. Are all incorrect options plausible but clearly wrong?\n\
         4. Does the question test understanding rather than just memorization?\n\
         5. Does the explanation say WHY the answer is correct rather than restating it?\n\
            For acronyms it should break down what each letter stands for.\n\n\
         Decision guidelines:\n\
         - REJECT: fundamental problems (answer in question text, obvious clues, off-topic).\n\
         - REVISE: the question has potential but needs repair (rephrasing, better distractors, stronger explanation). Provide a complete revised question.\n\
         - ACCEPT: the question passes all criteria.\n\n\
         Only revise explanations that are spectacularly bad (missing acronym definitions, wrong information, no explanation at all).\n\
         For mediocre but acceptable explanations, ACCEPT the question; a good question with a basic explanation beats no question.\n",
    );

    prompt
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
            panic!("gateway must not be called for a question at the revision limit");
        }
    }

    fn question_with_revisions(revision_count: u32) -> Question {
        Question {
            id: "cccc3333".to_string(),
            text: "What is the capital of Australia?".to_string(),
            options: vec![
                "Sydney".to_string(),
                "Canberra".to_string(),
                "Melbourne".to_string(),
                "Perth".to_string(),
            ],
            correct_answer: 1,
            explanation: "Canberra was purpose-built as the capital in 1913.".to_string(),
            topic: "Geography".to_string(),
            created_at: Utc::now(),
            status: QuestionStatus::Tentative,
            revision_count,
        }
    }

    #[tokio::test]
    async fn test_revision_limit_rejects_without_gateway_call() {
        let checker = QuestionChecker::new(Arc::new(PanickingGateway), "gpt-4o".to_string());
        let transcript = TranscriptLogger::disabled();
        let deadline = Instant::now() + std::time::Duration::from_secs(5);

        let result = checker
            .check(&question_with_revisions(3), &transcript, deadline)
            .await
            .unwrap();

        assert_eq!(result.action, ValidationAction::Reject);
        assert!(result.reason.contains("revision"));
        assert!(result.revised_question.is_none());
    }

    #[test]
    fn test_prompt_marks_correct_option() {
        let prompt = build_prompt(&question_with_revisions(0));

        assert!(prompt.contains("*2. Canberra"));
        assert!(prompt.contains(" 1. Sydney"));
        assert!(prompt.contains("Correct Answer: 2"));
    }
}
