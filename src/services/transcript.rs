use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;
use std::sync::Mutex;

use chrono::Utc;

use crate::models::domain::GenerationRequest;

/// Per-run diagnostic transcript: one append-only plain-text file recording
/// every prompt, response, and per-candidate decision. Never machine-parsed.
pub struct TranscriptLogger {
    file: Option<Mutex<File>>,
}

impl TranscriptLogger {
    /// Opens `<dir>/<run_id>.log` and writes the run header.
    pub fn create(dir: &Path, run_id: &str, request: &GenerationRequest) -> io::Result<Self> {
        fs::create_dir_all(dir)?;
        let file = File::create(dir.join(format!("{}.log", run_id)))?;
        let logger = Self {
            file: Some(Mutex::new(file)),
        };

        logger.logf("=== Quiz Generation Log ===");
        logger.logf(&format!("Run ID: {}", run_id));
        logger.logf(&format!("Topic: {}", request.topic));
        logger.logf(&format!("Number of Questions: {}", request.num_questions));
        logger.logf(&format!(
            "Difficulty: {}",
            request.difficulty.as_deref().unwrap_or("unspecified")
        ));
        if let Some(source) = &request.source_material {
            logger.logf(&format!("Source Material Length: {} characters", source.len()));
        }
        logger.logf(&format!("Started: {}", Utc::now().to_rfc3339()));
        logger.logf("===========================");
        logger.logf("");

        Ok(logger)
    }

    /// No-op logger for tests and callers that do not want a transcript.
    pub fn disabled() -> Self {
        Self { file: None }
    }

    fn logf(&self, message: &str) {
        let Some(file) = &self.file else {
            return;
        };

        // Transcript writes are best-effort diagnostics; a failed write must
        // not disturb the pipeline.
        if let Ok(mut file) = file.lock() {
            let timestamp = Utc::now().format("%H:%M:%S%.3f");
            let _ = writeln!(file, "[{}] {}", timestamp, message);
            let _ = file.flush();
        }
    }

    pub fn log_request(&self, stage: &str, prompt: &str) {
        self.logf(&format!("=== LLM REQUEST ({}) ===", stage));
        self.logf(prompt);
        self.logf("========================");
        self.logf("");
    }

    pub fn log_response(&self, stage: &str, response: &str) {
        self.logf(&format!("=== LLM RESPONSE ({}) ===", stage));
        self.logf(response);
        self.logf("=========================");
        self.logf("");
    }

    pub fn log_question_result(&self, question_id: &str, action: &str, reason: &str) {
        self.logf(&format!("Question {}: {} - {}", question_id, action, reason));
    }

    pub fn log_dedup_result(
        &self,
        question_id: &str,
        is_duplicate: bool,
        reason: &str,
        duplicate_id: Option<&str>,
    ) {
        if is_duplicate {
            self.logf(&format!(
                "Question {}: DUPLICATE of {} - {}",
                question_id,
                duplicate_id.unwrap_or("unknown"),
                reason
            ));
        } else {
            self.logf(&format!("Question {}: UNIQUE - {}", question_id, reason));
        }
    }

    pub fn log_run_complete(&self) {
        self.logf("=== Quiz Generation Complete ===");
        self.logf(&format!("Completed: {}", Utc::now().to_rfc3339()));
        self.logf("================================");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::domain::GenerationRequest;

    #[test]
    fn test_transcript_records_header_and_decisions() {
        let dir = tempfile::tempdir().unwrap();
        let request = GenerationRequest::new("Marine biology", 3).with_difficulty("hard");

        let logger = TranscriptLogger::create(dir.path(), "testrun12345", &request).unwrap();
        logger.log_request("QuestionChecker", "Evaluate the following quiz question");
        logger.log_question_result("aaaa1111", "accept", "clear and on-topic");
        logger.log_dedup_result("aaaa1111", false, "first question", None);
        logger.log_run_complete();

        let contents = std::fs::read_to_string(dir.path().join("testrun12345.log")).unwrap();
        assert!(contents.contains("Topic: Marine biology"));
        assert!(contents.contains("Number of Questions: 3"));
        assert!(contents.contains("Question aaaa1111: accept - clear and on-topic"));
        assert!(contents.contains("Question aaaa1111: UNIQUE - first question"));
        assert!(contents.contains("Quiz Generation Complete"));
    }

    #[test]
    fn test_disabled_logger_is_silent() {
        let logger = TranscriptLogger::disabled();
        logger.log_request("QuestionMaker", "prompt");
        logger.log_run_complete();
    }
}
