pub mod quiz_store;

pub use quiz_store::{
    QuizRecord, QuizRowStatus, QuizStore, SqliteQuizStore, StoreError, StoreResult, StoredQuestion,
};
