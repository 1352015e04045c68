pub mod gateway;
pub mod question_checker;
pub mod question_dedup;
pub mod question_maker;
pub mod question_pool;
pub mod quiz_generator;
pub mod transcript;
