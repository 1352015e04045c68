pub mod config;
pub mod constants;
pub mod errors;
pub mod models;
pub mod repositories;
pub mod services;

pub use config::Config;
pub use errors::{GatewayError, GenResult, GenerateError};
pub use models::domain::{GenerationRequest, Question, QuestionStatus, Quiz};
pub use services::quiz_generator::{QuizGenerator, QuizStream};
