use std::collections::{HashMap, VecDeque};

use chrono::Utc;

use crate::models::domain::{Question, QuestionStatus};

/// FIFO of tentative questions awaiting judgement, with id-keyed removal.
/// Owned and driven by the single orchestrator task.
#[derive(Default)]
pub struct QuestionPool {
    questions: HashMap<String, Question>,
    queue: VecDeque<String>,
}

impl QuestionPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, mut question: Question) {
        question.status = QuestionStatus::Tentative;
        question.created_at = Utc::now();

        self.queue.push_back(question.id.clone());
        self.questions.insert(question.id.clone(), question);
    }

    /// Removes and returns the head of the queue.
    pub fn get(&mut self) -> Option<Question> {
        let id = self.queue.pop_front()?;
        self.questions.remove(&id)
    }

    pub fn remove(&mut self, question_id: &str) {
        self.questions.remove(question_id);
        self.queue.retain(|id| id != question_id);
    }

    pub fn size(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(id: &str) -> Question {
        Question {
            id: id.to_string(),
            text: format!("Question {}", id),
            options: vec![
                "a".to_string(),
                "b".to_string(),
                "c".to_string(),
                "d".to_string(),
            ],
            correct_answer: 1,
            explanation: "because".to_string(),
            topic: "testing".to_string(),
            created_at: Utc::now(),
            status: QuestionStatus::Revised,
            revision_count: 0,
        }
    }

    #[test]
    fn test_fifo_order() {
        let mut pool = QuestionPool::new();
        pool.add(question("aaaa1111"));
        pool.add(question("bbbb2222"));
        pool.add(question("cccc3333"));

        assert_eq!(pool.size(), 3);
        assert_eq!(pool.get().unwrap().id, "aaaa1111");
        assert_eq!(pool.get().unwrap().id, "bbbb2222");
        assert_eq!(pool.get().unwrap().id, "cccc3333");
        assert!(pool.get().is_none());
        assert!(pool.is_empty());
    }

    #[test]
    fn test_add_resets_status_to_tentative() {
        let mut pool = QuestionPool::new();
        pool.add(question("aaaa1111"));

        let stored = pool.get().unwrap();
        assert_eq!(stored.status, QuestionStatus::Tentative);
    }

    #[test]
    fn test_remove_mid_queue() {
        let mut pool = QuestionPool::new();
        pool.add(question("aaaa1111"));
        pool.add(question("bbbb2222"));
        pool.add(question("cccc3333"));

        pool.remove("bbbb2222");

        assert_eq!(pool.size(), 2);
        assert_eq!(pool.get().unwrap().id, "aaaa1111");
        assert_eq!(pool.get().unwrap().id, "cccc3333");
    }
}
