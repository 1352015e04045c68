use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::models::domain::Question;

/// The checker's verdict on a single question.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct ValidationResult {
    pub question_id: String,
    pub reason: String,
    pub action: ValidationAction,
    /// Present when `action` is `Revise`; keeps the input's id and carries
    /// a revision count one greater than the input's.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub revised_question: Option<Question>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ValidationAction {
    Accept,
    Reject,
    Revise,
}

impl std::fmt::Display for ValidationAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationAction::Accept => write!(f, "accept"),
            ValidationAction::Reject => write!(f, "reject"),
            ValidationAction::Revise => write!(f, "revise"),
        }
    }
}

/// The deduper's verdict on an accepted candidate.
#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct DedupResult {
    pub is_duplicate: bool,
    pub reason: String,
    /// Id of the previously accepted question this candidate collides with.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duplicate_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_action_serializes_lowercase() {
        assert_eq!(
            serde_json::to_string(&ValidationAction::Revise).unwrap(),
            "\"revise\""
        );
        let back: ValidationAction = serde_json::from_str("\"accept\"").unwrap();
        assert_eq!(back, ValidationAction::Accept);
    }

    #[test]
    fn test_dedup_result_omits_absent_duplicate_id() {
        let result = DedupResult {
            is_duplicate: false,
            reason: "different aspect of the topic".to_string(),
            duplicate_id: None,
        };
        let json = serde_json::to_string(&result).unwrap();
        assert!(!json.contains("duplicate_id"));
    }
}
