//! Prefetch Queue Scheduler.
//!
//! Keeps a small buffer of generated questions ahead of the user's cursor.
//! All transitions go through one mutex-guarded [`SessionState`]; network
//! calls run on spawned tasks and at most one background fetch is in flight
//! per session. Completions carry the session id they were started for and
//! are dropped when it no longer matches.

use crate::error::{GenerationError, QuizError, SessionError};
use crate::generator::QuestionSource;
use crate::question::{DifficultyLevel, Question, Topic};
use crate::storage::lock;
use serde::Serialize;
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tokio::sync::watch;
use tracing::{debug, info, instrument, warn};

/// Prefetch tunables
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Refill once `queue_len <= cursor + lookahead`
    pub lookahead: usize,
    /// Questions requested in the background right after the initial load
    pub seed_batch: usize,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { lookahead: 2, seed_batch: 2 }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SessionPhase {
    Idle,
    /// Blocking on the first question of a session
    InitialLoad,
    Ready,
    /// Cursor is past the materialized queue; blocked on the next fetch
    Waiting,
}

/// Read-only view of the scheduler, published on every transition.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: u64,
    pub phase: SessionPhase,
    pub topic_id: Option<String>,
    pub difficulty: Option<DifficultyLevel>,
    pub cursor: usize,
    pub queue_length: usize,
    pub background_filling: bool,
    pub answered_count: usize,
}

impl SessionSnapshot {
    /// The question under the cursor is materialized and can be shown.
    pub fn is_ready(&self) -> bool {
        self.phase == SessionPhase::Ready
    }
}

/// A locked-in answer for one question of the session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerRecord {
    pub question_index: usize,
    pub topic_id: String,
    pub selected: usize,
    pub correct_index: usize,
    pub is_correct: bool,
}

/// Answered and correct counts for the current session only.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSummary {
    pub answered: usize,
    pub correct: usize,
}

#[derive(Debug)]
struct SessionState {
    session_id: u64,
    phase: SessionPhase,
    topic: Option<Topic>,
    difficulty: Option<DifficultyLevel>,
    queue: Vec<Question>,
    cursor: usize,
    answers: BTreeMap<usize, usize>,
    fetch_in_flight: bool,
}

impl SessionState {
    fn new() -> Self {
        Self {
            session_id: 0,
            phase: SessionPhase::Idle,
            topic: None,
            difficulty: None,
            queue: Vec::new(),
            cursor: 0,
            answers: BTreeMap::new(),
            fetch_in_flight: false,
        }
    }

    /// Drop everything belonging to the current session and move to a new identity.
    fn clear(&mut self) {
        self.session_id += 1;
        self.phase = SessionPhase::Idle;
        self.topic = None;
        self.difficulty = None;
        self.queue.clear();
        self.cursor = 0;
        self.answers.clear();
        self.fetch_in_flight = false;
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            session_id: self.session_id,
            phase: self.phase,
            topic_id: self.topic.as_ref().map(|t| t.id.clone()),
            difficulty: self.difficulty,
            cursor: self.cursor,
            queue_length: self.queue.len(),
            background_filling: self.fetch_in_flight,
            answered_count: self.answers.len(),
        }
    }

    fn ensure_active(&self) -> Result<(), SessionError> {
        match self.phase {
            SessionPhase::Idle => Err(SessionError::NoActiveSession),
            SessionPhase::InitialLoad => Err(SessionError::NotReady),
            SessionPhase::Ready | SessionPhase::Waiting => Ok(()),
        }
    }

    /// Claim the single-flight guard for a fetch of `count` questions.
    fn claim_fetch(&mut self, count: usize) -> Option<FetchJob> {
        if self.fetch_in_flight || count == 0 {
            return None;
        }
        let topic = self.topic.clone()?;
        let difficulty = self.difficulty?;
        self.fetch_in_flight = true;
        Some(FetchJob {
            session_id: self.session_id,
            topic,
            difficulty,
            count,
        })
    }

    fn needs_refill(&self, lookahead: usize) -> bool {
        matches!(self.phase, SessionPhase::Ready | SessionPhase::Waiting)
            && self.queue.len() <= self.cursor + lookahead
    }
}

#[derive(Debug)]
struct FetchJob {
    session_id: u64,
    topic: Topic,
    difficulty: DifficultyLevel,
    count: usize,
}

/// Serves questions for one (topic, difficulty) session at a time.
#[derive(Debug, Clone)]
pub struct PrefetchScheduler {
    source: Arc<dyn QuestionSource>,
    config: SchedulerConfig,
    state: Arc<Mutex<SessionState>>,
    updates: Arc<watch::Sender<SessionSnapshot>>,
}

impl PrefetchScheduler {
    pub fn new(source: Arc<dyn QuestionSource>, config: SchedulerConfig) -> Self {
        let state = SessionState::new();
        let (updates, _) = watch::channel(state.snapshot());
        Self {
            source,
            config,
            state: Arc::new(Mutex::new(state)),
            updates: Arc::new(updates),
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    // Publishing under the state lock keeps snapshots in transition order.
    fn publish(&self, state: &SessionState) {
        self.updates.send_replace(state.snapshot());
    }

    /// Start a fresh session, replacing whatever was active.
    ///
    /// Awaits exactly one question; on success the seed batch is requested in
    /// the background and the scheduler is `Ready`.
    #[instrument(target = "concurso_quiz::scheduler", skip(self, topic), fields(topic = %topic.id, difficulty = %difficulty))]
    pub async fn start_session(
        &self,
        topic: Topic,
        difficulty: DifficultyLevel,
    ) -> Result<SessionSnapshot, QuizError> {
        let session_id = {
            let mut state = lock(&self.state);
            state.clear();
            state.phase = SessionPhase::InitialLoad;
            state.topic = Some(topic.clone());
            state.difficulty = Some(difficulty);
            self.publish(&state);
            state.session_id
        };
        info!(session_id, "Starting session");

        let result = self.source.generate(&topic, 1, difficulty).await;

        let (snapshot, seed) = {
            let mut state = lock(&self.state);
            if state.session_id != session_id {
                debug!(session_id, "Initial load superseded by a newer session");
                return Err(SessionError::Superseded.into());
            }

            match result {
                Ok(questions) if !questions.is_empty() => {
                    state.queue.extend(questions);
                    state.phase = SessionPhase::Ready;
                    let seed = state.claim_fetch(self.config.seed_batch);
                    self.publish(&state);
                    (state.snapshot(), seed)
                }
                Ok(_) => {
                    state.clear();
                    self.publish(&state);
                    return Err(GenerationError::TooFewQuestions { expected: 1, got: 0 }.into());
                }
                Err(e) => {
                    warn!(error = %e, "Initial load failed");
                    state.clear();
                    self.publish(&state);
                    return Err(e);
                }
            }
        };

        if let Some(job) = seed {
            self.spawn_fetch(job);
        }
        Ok(snapshot)
    }

    /// Move to the next question, entering `Waiting` when it is not loaded yet.
    #[instrument(target = "concurso_quiz::scheduler", skip(self))]
    pub fn advance(&self) -> Result<SessionSnapshot, QuizError> {
        self.transition(|state| {
            state.ensure_active()?;
            if state.phase == SessionPhase::Ready {
                state.cursor += 1;
                if state.cursor >= state.queue.len() {
                    debug!(cursor = state.cursor, "Advanced past the loaded queue");
                    state.phase = SessionPhase::Waiting;
                }
            }
            Ok(())
        })
    }

    /// Step back one question. A no-op at the first question.
    pub fn retreat(&self) -> Result<SessionSnapshot, QuizError> {
        let mut state = lock(&self.state);
        state.ensure_active()?;
        if state.cursor > 0 {
            state.cursor -= 1;
            state.phase = SessionPhase::Ready;
            self.publish(&state);
        }
        Ok(state.snapshot())
    }

    /// Move the cursor to an already loaded question.
    pub fn jump_to(&self, index: usize) -> Result<SessionSnapshot, QuizError> {
        self.transition(|state| {
            state.ensure_active()?;
            if index >= state.queue.len() {
                return Err(SessionError::IndexOutOfRange { index, len: state.queue.len() });
            }
            state.cursor = index;
            state.phase = SessionPhase::Ready;
            Ok(())
        })
    }

    /// Lock in an answer for the question under the cursor.
    #[instrument(target = "concurso_quiz::scheduler", skip(self))]
    pub fn submit_answer(&self, option: usize) -> Result<AnswerRecord, QuizError> {
        let mut record = None;
        self.transition(|state| {
            state.ensure_active()?;
            if state.phase != SessionPhase::Ready {
                return Err(SessionError::NotReady);
            }
            let index = state.cursor;
            let question = state.queue.get(index).ok_or(SessionError::NotReady)?;
            if option >= question.options.len() {
                return Err(SessionError::InvalidOption { option, count: question.options.len() });
            }
            if state.answers.contains_key(&index) {
                return Err(SessionError::AlreadyAnswered(index));
            }

            let correct_index = question.correct_option_index;
            let topic_id = state.topic.as_ref().map(|t| t.id.clone()).unwrap_or_default();
            state.answers.insert(index, option);
            record = Some(AnswerRecord {
                question_index: index,
                topic_id,
                selected: option,
                correct_index,
                is_correct: option == correct_index,
            });
            Ok(())
        })?;
        record.ok_or_else(|| SessionError::NotReady.into())
    }

    /// Clear the session. In-flight results will be discarded when they land.
    pub fn end_session(&self) -> SessionSnapshot {
        let mut state = lock(&self.state);
        info!(session_id = state.session_id, "Ending session");
        state.clear();
        self.publish(&state);
        state.snapshot()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        lock(&self.state).snapshot()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.updates.subscribe()
    }

    /// Resolve once a published snapshot satisfies `predicate`.
    ///
    /// The predicate runs while the channel is borrowed and must not call back
    /// into the scheduler.
    pub async fn wait_for<F>(&self, mut predicate: F) -> SessionSnapshot
    where
        F: FnMut(&SessionSnapshot) -> bool,
    {
        let mut rx = self.updates.subscribe();
        let result = rx.wait_for(|s| predicate(s)).await.map(|s| (*s).clone());
        match result {
            Ok(snapshot) => snapshot,
            Err(_) => self.snapshot(),
        }
    }

    /// The question under the cursor, if it is loaded.
    pub fn current_question(&self) -> Option<Question> {
        let state = lock(&self.state);
        state.queue.get(state.cursor).cloned()
    }

    pub fn question_at(&self, index: usize) -> Option<Question> {
        lock(&self.state).queue.get(index).cloned()
    }

    pub fn answer_for(&self, index: usize) -> Option<usize> {
        lock(&self.state).answers.get(&index).copied()
    }

    pub fn summary(&self) -> SessionSummary {
        let state = lock(&self.state);
        let correct = state
            .answers
            .iter()
            .filter(|(index, selected)| {
                state
                    .queue
                    .get(**index)
                    .map(|q| q.is_correct(**selected))
                    .unwrap_or(false)
            })
            .count();
        SessionSummary { answered: state.answers.len(), correct }
    }

    /// Apply a cursor transition, then re-check the lookahead.
    fn transition<F>(&self, apply: F) -> Result<SessionSnapshot, QuizError>
    where
        F: FnOnce(&mut SessionState) -> Result<(), SessionError>,
    {
        let (snapshot, job) = {
            let mut state = lock(&self.state);
            apply(&mut state)?;
            let job = self.refill_job(&mut state);
            self.publish(&state);
            (state.snapshot(), job)
        };
        if let Some(job) = job {
            self.spawn_fetch(job);
        }
        Ok(snapshot)
    }

    fn refill_job(&self, state: &mut SessionState) -> Option<FetchJob> {
        if !state.needs_refill(self.config.lookahead) {
            return None;
        }
        let job = state.claim_fetch(1);
        if job.is_some() {
            debug!(
                cursor = state.cursor,
                queue_length = state.queue.len(),
                "Lookahead below threshold; fetching one more"
            );
        }
        job
    }

    fn spawn_fetch(&self, job: FetchJob) {
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let this = self.clone();
                handle.spawn(async move { this.run_fetch(job).await });
            }
            Err(e) => {
                warn!(error = %e, "No async runtime available for background fetch");
                let mut state = lock(&self.state);
                if state.session_id == job.session_id {
                    state.fetch_in_flight = false;
                    self.publish(&state);
                }
            }
        }
    }

    #[instrument(target = "concurso_quiz::scheduler", skip(self, job), fields(session_id = job.session_id, count = job.count))]
    async fn run_fetch(&self, job: FetchJob) {
        let result = self.source.generate(&job.topic, job.count, job.difficulty).await;

        let follow_up = {
            let mut state = lock(&self.state);
            if state.session_id != job.session_id {
                debug!(current = state.session_id, "Discarding result for a stale session");
                return;
            }
            state.fetch_in_flight = false;

            let follow_up = match result {
                Ok(questions) => {
                    state.queue.extend(questions);
                    if state.phase == SessionPhase::Waiting && state.cursor < state.queue.len() {
                        state.phase = SessionPhase::Ready;
                    }
                    debug!(queue_length = state.queue.len(), "Background fetch appended");
                    self.refill_job(&mut state)
                }
                Err(e) => {
                    // Retried by the next navigation or answer
                    warn!(error = %e, "Background fetch failed");
                    None
                }
            };
            self.publish(&state);
            follow_up
        };

        if let Some(job) = follow_up {
            self.spawn_fetch(job);
        }
    }
}
