pub mod question;
pub mod quiz;
pub mod request;
pub mod validation;

pub use question::{Question, QuestionStatus};
pub use quiz::Quiz;
pub use request::GenerationRequest;
pub use validation::{DedupResult, ValidationAction, ValidationResult};
