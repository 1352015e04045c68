use std::fmt::Write as _;
use std::sync::Arc;

use chrono::Utc;
use rand::Rng;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::constants::prompts::QUESTION_MAKER_SYSTEM_PROMPT;
use crate::errors::GatewayError;
use crate::models::domain::{GenerationRequest, Question, QuestionStatus};
use crate::services::gateway::{
    invoke_with_deadline, tool_parameters, ChatGateway, ChatTurn, ToolCallRequest, ToolSpec,
};
use crate::services::transcript::TranscriptLogger;

const ID_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
const QUESTION_ID_LEN: usize = 8;

pub(crate) fn random_id<R: Rng>(rng: &mut R, len: usize) -> String {
    (0..len)
        .map(|_| ID_CHARSET[rng.gen_range(0..ID_CHARSET.len())] as char)
        .collect()
}

/// A question as returned by the model, before ids and run metadata are
/// attached. Shared with the checker's revision payload.
#[derive(Clone, Debug, Deserialize, Serialize, JsonSchema)]
pub struct QuestionDraft {
    /// The question text.
    pub text: String,
    /// Array of 4 multiple choice options.
    #[schemars(length(equal = 4))]
    pub options: Vec<String>,
    /// 0-based index of the correct answer.
    #[schemars(range(min = 0, max = 3))]
    pub correct_answer: i64,
    /// Brief explanation of why the answer is correct.
    pub explanation: String,
}

impl QuestionDraft {
    pub fn is_well_formed(&self) -> bool {
        self.options.len() == 4 && (0..4).contains(&self.correct_answer)
    }

    pub fn into_question(self, id: String, topic: String, revision_count: u32) -> Question {
        Question {
            id,
            text: self.text,
            options: self.options,
            correct_answer: self.correct_answer as usize,
            explanation: self.explanation,
            topic,
            created_at: Utc::now(),
            status: if revision_count == 0 {
                QuestionStatus::Tentative
            } else {
                QuestionStatus::Revised
            },
            revision_count,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, JsonSchema)]
struct SubmitQuestionsArgs {
    /// The generated quiz questions.
    questions: Vec<QuestionDraft>,
}

/// Produces batches of tentative questions, keeping a rolling conversation so
/// the model sees its earlier output and avoids repeating itself.
pub struct QuestionMaker {
    gateway: Arc<dyn ChatGateway>,
    model: String,
    request: GenerationRequest,
    turns: Vec<ChatTurn>,
}

impl QuestionMaker {
    pub fn new(gateway: Arc<dyn ChatGateway>, model: String, request: GenerationRequest) -> Self {
        Self {
            gateway,
            model,
            request,
            turns: Vec::new(),
        }
    }

    fn tool_spec() -> ToolSpec {
        ToolSpec {
            name: "submit_questions",
            description: "Submit generated quiz questions",
            parameters: tool_parameters::<SubmitQuestionsArgs>(),
        }
    }

    fn build_prompt(&self, batch_size: usize) -> String {
        if !self.turns.is_empty() {
            return format!(
                "Generate {} more multiple choice questions about the same topic. \
                 They must be distinct from every question you have already returned.",
                batch_size
            );
        }

        let mut prompt = String::new();
        let _ = writeln!(
            prompt,
            "Generate {} multiple choice questions about: {}\n",
            batch_size, self.request.topic
        );

        if let Some(source) = &self.request.source_material {
            let _ = writeln!(prompt, "Use the following source material as reference:");
            let _ = writeln!(prompt, "{}\n", source);
        }

        if let Some(difficulty) = &self.request.difficulty {
            let _ = writeln!(prompt, "Difficulty level: {}\n", difficulty);
        }

        prompt.push_str(
            "Requirements:\n\
             - Each question must have exactly 4 multiple choice options\n\
             - The correct answer should be non-obvious but clearly correct\n\
             - Incorrect options should be plausible but clearly wrong\n\
             - Questions should test understanding, not just memorization\n\
             - Avoid questions where the answer is given away in the question text\n\
             - Provide a brief explanation for why the correct answer is right\n\
             - Use the submit_questions tool to return your questions\n",
        );

        prompt
    }

    /// Requests one batch. On success the exchange is appended to the
    /// conversation; on failure the conversation is left as it was, so a
    /// later batch starts from a clean state rather than replaying the
    /// failed prompt.
    pub async fn next_batch<R: Rng>(
        &mut self,
        batch_size: usize,
        rng: &mut R,
        transcript: &TranscriptLogger,
        deadline: Instant,
    ) -> Result<Vec<Question>, GatewayError> {
        log::info!(
            "Generating {} questions for topic: {}",
            batch_size,
            self.request.topic
        );

        let prompt = self.build_prompt(batch_size);
        transcript.log_request("QuestionMaker", &prompt);

        let mut turns = self.turns.clone();
        turns.push(ChatTurn::User(prompt.clone()));

        let arguments = invoke_with_deadline(
            self.gateway.as_ref(),
            ToolCallRequest {
                model: self.model.clone(),
                system: QUESTION_MAKER_SYSTEM_PROMPT,
                turns: turns.clone(),
                tool: Self::tool_spec(),
            },
            deadline,
        )
        .await?;

        transcript.log_response("QuestionMaker", &arguments.to_string());

        let args: SubmitQuestionsArgs = serde_json::from_value(arguments.clone())
            .map_err(|e| GatewayError::Parse(format!("unexpected submit_questions shape: {}", e)))?;

        turns.push(ChatTurn::Assistant(arguments.to_string()));
        self.turns = turns;

        let mut questions = Vec::with_capacity(args.questions.len());
        for draft in args.questions {
            if !draft.is_well_formed() {
                log::warn!(
                    "Dropping malformed draft ({} options, correct_answer {})",
                    draft.options.len(),
                    draft.correct_answer
                );
                continue;
            }
            let id = random_id(rng, QUESTION_ID_LEN);
            questions.push(draft.into_question(id, self.request.topic.clone(), 0));
        }

        log::info!("Generated {} questions", questions.len());
        Ok(questions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn draft() -> QuestionDraft {
        QuestionDraft {
            text: "Which gas makes up most of Earth's atmosphere?".to_string(),
            options: vec![
                "Oxygen".to_string(),
                "Nitrogen".to_string(),
                "Argon".to_string(),
                "Carbon dioxide".to_string(),
            ],
            correct_answer: 1,
            explanation: "Nitrogen accounts for roughly 78% of the atmosphere by volume."
                .to_string(),
        }
    }

    #[test]
    fn test_random_id_shape() {
        let mut rng = StdRng::seed_from_u64(7);
        let id = random_id(&mut rng, QUESTION_ID_LEN);

        assert_eq!(id.len(), 8);
        assert!(id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit()));
    }

    #[test]
    fn test_random_id_deterministic_for_seed() {
        let mut a = StdRng::seed_from_u64(42);
        let mut b = StdRng::seed_from_u64(42);

        assert_eq!(random_id(&mut a, 8), random_id(&mut b, 8));
    }

    #[test]
    fn test_draft_validation() {
        assert!(draft().is_well_formed());

        let mut short = draft();
        short.options.truncate(3);
        assert!(!short.is_well_formed());

        let mut out_of_range = draft();
        out_of_range.correct_answer = 4;
        assert!(!out_of_range.is_well_formed());

        let mut negative = draft();
        negative.correct_answer = -1;
        assert!(!negative.is_well_formed());
    }

    #[test]
    fn test_draft_to_question_sets_run_metadata() {
        let question = draft().into_question("abcd1234".to_string(), "Chemistry".to_string(), 0);

        assert_eq!(question.id, "abcd1234");
        assert_eq!(question.topic, "Chemistry");
        assert_eq!(question.status, QuestionStatus::Tentative);
        assert_eq!(question.revision_count, 0);
    }

    #[test]
    fn test_revised_draft_keeps_revised_status() {
        let question = draft().into_question("abcd1234".to_string(), "Chemistry".to_string(), 2);

        assert_eq!(question.status, QuestionStatus::Revised);
        assert_eq!(question.revision_count, 2);
    }
}
