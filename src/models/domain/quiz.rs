use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::domain::Question;

/// Terminal value for non-streaming consumers: the accepted questions in
/// emission order.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize, Serialize)]
pub struct Quiz {
    pub id: String,
    pub topic: String,
    pub questions: Vec<Question>,
    pub created_at: DateTime<Utc>,
    pub total_questions: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::domain::QuestionStatus;

    #[test]
    fn test_quiz_json_round_trip() {
        let quiz = Quiz {
            id: "run123456789".to_string(),
            topic: "Rust ownership".to_string(),
            questions: vec![Question {
                id: "aaaa1111".to_string(),
                text: "What does the borrow checker enforce?".to_string(),
                options: vec![
                    "Aliasing xor mutability".to_string(),
                    "Garbage collection".to_string(),
                    "Reference counting".to_string(),
                    "Manual frees".to_string(),
                ],
                correct_answer: 0,
                explanation: "At most one mutable reference or any number of shared references may exist at a time.".to_string(),
                topic: "Rust ownership".to_string(),
                created_at: Utc::now(),
                status: QuestionStatus::Accepted,
                revision_count: 0,
            }],
            created_at: Utc::now(),
            total_questions: 1,
        };

        let json = serde_json::to_string_pretty(&quiz).unwrap();
        let back: Quiz = serde_json::from_str(&json).unwrap();
        assert_eq!(quiz, back);
    }
}
