pub mod app;
pub mod catalog;
pub mod clients;
pub mod config;
pub mod core;
pub mod error;
pub mod generator;
pub mod json_utils;
pub mod mastery;
pub mod question;
pub mod scheduler;
pub mod shuffle;
pub mod storage;

// Convenient re-exports
pub use app::{AnswerOutcome, QuizApp};
pub use error::QuizError;
pub use generator::{QuestionGenerator, QuestionSource};
pub use json_utils::extract_all;
pub use question::{DifficultyLevel, Question, Topic};
pub use scheduler::{PrefetchScheduler, SchedulerConfig, SessionPhase, SessionSnapshot};
