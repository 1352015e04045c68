use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single multiple-choice question flowing through the pipeline.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Question {
    pub id: String,
    pub text: String,
    pub options: Vec<String>,
    /// Zero-based index into `options`.
    pub correct_answer: usize,
    pub explanation: String,
    pub topic: String,
    pub created_at: DateTime<Utc>,
    pub status: QuestionStatus,
    pub revision_count: u32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionStatus {
    Tentative,
    Accepted,
    Rejected,
    Revised,
}

impl std::fmt::Display for QuestionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuestionStatus::Tentative => write!(f, "tentative"),
            QuestionStatus::Accepted => write!(f, "accepted"),
            QuestionStatus::Rejected => write!(f, "rejected"),
            QuestionStatus::Revised => write!(f, "revised"),
        }
    }
}

impl Question {
    /// Structural invariants every in-flight question must satisfy:
    /// exactly four options and an in-range correct index.
    pub fn is_well_formed(&self) -> bool {
        self.options.len() == 4 && self.correct_answer < 4
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_question() -> Question {
        Question {
            id: "abcd1234".to_string(),
            text: "Which layer of the OSI model handles routing?".to_string(),
            options: vec![
                "Network".to_string(),
                "Transport".to_string(),
                "Session".to_string(),
                "Data link".to_string(),
            ],
            correct_answer: 0,
            explanation: "Routing between networks is a layer 3 (network layer) concern."
                .to_string(),
            topic: "Computer networking".to_string(),
            created_at: Utc::now(),
            status: QuestionStatus::Tentative,
            revision_count: 0,
        }
    }

    #[test]
    fn test_question_json_round_trip() {
        let question = sample_question();
        let json = serde_json::to_string(&question).unwrap();
        let back: Question = serde_json::from_str(&json).unwrap();
        assert_eq!(question, back);
    }

    #[test]
    fn test_status_serializes_lowercase() {
        let json = serde_json::to_string(&QuestionStatus::Accepted).unwrap();
        assert_eq!(json, "\"accepted\"");
    }

    #[test]
    fn test_well_formed_checks() {
        let mut question = sample_question();
        assert!(question.is_well_formed());

        question.correct_answer = 4;
        assert!(!question.is_well_formed());

        question.correct_answer = 0;
        question.options.pop();
        assert!(!question.is_well_formed());
    }
}
