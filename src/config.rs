use std::env;
use std::path::PathBuf;

use secrecy::SecretString;

#[derive(Clone, Debug)]
pub struct Config {
    pub openai_api_key: SecretString,
    pub openai_base_url: String,
    pub model: String,
    pub transcript_dir: PathBuf,
}

impl Config {
    pub fn from_env() -> Self {
        Self {
            openai_api_key: SecretString::from(
                env::var("OPENAI_API_KEY").unwrap_or_default(),
            ),
            openai_base_url: env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            model: env::var("QUIZGEN_MODEL").unwrap_or_else(|_| "gpt-4o".to_string()),
            transcript_dir: env::var("QUIZGEN_LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("log")),
        }
    }

    #[cfg(test)]
    pub fn test_config() -> Self {
        Self {
            openai_api_key: SecretString::from("test-key".to_string()),
            openai_base_url: "http://localhost:1234/v1".to_string(),
            model: "gpt-4o".to_string(),
            transcript_dir: std::env::temp_dir().join("quizgen-test-logs"),
        }
    }
}
