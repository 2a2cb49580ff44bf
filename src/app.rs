//! The UI-facing contract: one session scheduler, the user's statistics and
//! the credential, behind a single handle.

use crate::catalog::{find_topic, syllabus};
use crate::clients::flexible::{ClientType, FlexibleClient};
use crate::clients::gemini::GeminiConfig;
use crate::config::{AppConfig, CredentialStore};
use crate::core::response_schema;
use crate::error::{QuizError, SessionError};
use crate::generator::{QuestionGenerator, QuestionSource};
use crate::mastery::{MasteryTable, StatsTracker, UserStats};
use crate::question::{DifficultyLevel, Question, RawQuestion, Topic};
use crate::scheduler::{PrefetchScheduler, SchedulerConfig, SessionPhase, SessionSnapshot, SessionSummary};
use crate::storage::{JsonFileStore, KeyValueStore};
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;

/// Result of a submitted answer, with the updated statistics.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerOutcome {
    pub question_index: usize,
    pub selected: usize,
    pub correct_index: usize,
    pub is_correct: bool,
    /// Mastery of the session topic after this answer
    pub mastery: u8,
    pub stats: UserStats,
}

#[derive(Debug)]
pub struct QuizApp {
    scheduler: PrefetchScheduler,
    stats: StatsTracker,
    credentials: CredentialStore,
}

impl QuizApp {
    pub fn new(
        source: Arc<dyn QuestionSource>,
        store: Arc<dyn KeyValueStore>,
        credentials: CredentialStore,
        scheduler: SchedulerConfig,
    ) -> Self {
        Self {
            scheduler: PrefetchScheduler::new(source, scheduler),
            stats: StatsTracker::load(store),
            credentials,
        }
    }

    /// Build the app from process configuration, backed by the JSON file store.
    ///
    /// The backend is Gemini unless `client_type` names another one. A missing
    /// key is not checked here: it fails the first generation call with
    /// [`CredentialError::Missing`](crate::error::CredentialError::Missing).
    pub fn open(config: &AppConfig, client_type: Option<ClientType>) -> Result<(Self, ClientType), QuizError> {
        let store: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::open(config.store_path())?);
        let credentials = CredentialStore::new(store.clone(), config.default_credential.clone());
        let client_type = client_type.unwrap_or_default();

        let gemini = GeminiConfig::default()
            .with_model(&config.model)
            .with_response_schema(response_schema::<RawQuestion>());
        let client = FlexibleClient::from_type(client_type, gemini, credentials.clone());
        let source = Arc::new(QuestionGenerator::new(client));
        Ok((Self::new(source, store, credentials, config.scheduler.clone()), client_type))
    }

    pub fn topics(&self) -> Vec<Topic> {
        syllabus()
    }

    /// Start a session for a topic id or name, replacing any active one.
    pub async fn start_session(&self, topic: &str, difficulty: DifficultyLevel) -> Result<SessionSnapshot, QuizError> {
        let topic = find_topic(topic).ok_or_else(|| SessionError::UnknownTopic(topic.to_string()))?;
        self.scheduler.start_session(topic, difficulty).await
    }

    pub fn advance(&self) -> Result<SessionSnapshot, QuizError> {
        self.scheduler.advance()
    }

    pub fn retreat(&self) -> Result<SessionSnapshot, QuizError> {
        self.scheduler.retreat()
    }

    pub fn jump_to(&self, index: usize) -> Result<SessionSnapshot, QuizError> {
        self.scheduler.jump_to(index)
    }

    pub fn end_session(&self) -> SessionSnapshot {
        self.scheduler.end_session()
    }

    /// Lock in an answer and fold it into the statistics.
    pub fn submit_answer(&self, option: usize) -> Result<AnswerOutcome, QuizError> {
        let record = self.scheduler.submit_answer(option)?;
        let stats = self.stats.record_answer(&record.topic_id, record.is_correct)?;
        Ok(AnswerOutcome {
            question_index: record.question_index,
            selected: record.selected,
            correct_index: record.correct_index,
            is_correct: record.is_correct,
            mastery: stats.mastery_by_topic.get(&record.topic_id),
            stats,
        })
    }

    /// Resolve once the question under the cursor is loaded, or the session ended.
    pub async fn wait_until_ready(&self) -> SessionSnapshot {
        self.scheduler
            .wait_for(|s| s.is_ready() || s.phase == SessionPhase::Idle)
            .await
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        self.scheduler.snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.scheduler.subscribe()
    }

    pub fn current_question(&self) -> Option<Question> {
        self.scheduler.current_question()
    }

    pub fn question_at(&self, index: usize) -> Option<Question> {
        self.scheduler.question_at(index)
    }

    pub fn answer_for(&self, index: usize) -> Option<usize> {
        self.scheduler.answer_for(index)
    }

    pub fn session_summary(&self) -> SessionSummary {
        self.scheduler.summary()
    }

    pub fn stats(&self) -> UserStats {
        self.stats.stats()
    }

    pub fn mastery(&self, topic_id: &str) -> u8 {
        self.stats.mastery(topic_id)
    }

    pub fn mastery_table(&self) -> MasteryTable {
        self.stats.mastery_table()
    }

    pub fn accuracy_percent(&self) -> u8 {
        self.stats.accuracy_percent()
    }

    pub fn reset_topic(&self, topic_id: &str) -> Result<MasteryTable, QuizError> {
        self.stats.reset_topic(topic_id)
    }

    pub fn has_credential(&self) -> bool {
        self.credentials.has_credential()
    }

    /// Validate and store a new key. Applies to the next generation call.
    pub fn set_credential(&self, key: &str) -> Result<(), QuizError> {
        self.credentials.save(key)
    }
}
