use serde::{Deserialize, Serialize};
use validator::Validate;

/// Immutable input to a generation run.
#[derive(Clone, Debug, Deserialize, Serialize, Validate)]
pub struct GenerationRequest {
    #[validate(length(min = 1, message = "topic must not be empty"))]
    pub topic: String,

    #[validate(range(min = 1, message = "at least one question must be requested"))]
    pub num_questions: usize,

    /// Long-form reference text, used verbatim only on the first LLM turn.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source_material: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub difficulty: Option<String>,
}

impl GenerationRequest {
    pub fn new(topic: impl Into<String>, num_questions: usize) -> Self {
        Self {
            topic: topic.into(),
            num_questions,
            source_material: None,
            difficulty: None,
        }
    }

    pub fn with_source_material(mut self, source_material: impl Into<String>) -> Self {
        self.source_material = Some(source_material.into());
        self
    }

    pub fn with_difficulty(mut self, difficulty: impl Into<String>) -> Self {
        self.difficulty = Some(difficulty.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_request() {
        let request = GenerationRequest::new("History of the Roman Republic", 10)
            .with_difficulty("medium");
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_empty_topic_rejected() {
        let request = GenerationRequest::new("", 10);
        assert!(request.validate().is_err());
    }

    #[test]
    fn test_zero_questions_rejected() {
        let request = GenerationRequest::new("Botany", 0);
        assert!(request.validate().is_err());
    }
}
