//! Question Generator Client: turns (topic, count, difficulty) into a prompt,
//! calls the model and normalizes the returned records.

use crate::catalog::{styles_for, subtopics_for};
use crate::core::{add_schema_guidance, LowLevelClient};
use crate::error::{GenerationError, QuizError};
use crate::json_utils::extract_all;
use crate::question::{DifficultyLevel, Question, RawQuestion, Topic};
use crate::shuffle::shuffle_question_with;
use async_trait::async_trait;
use rand::seq::SliceRandom;
use rand::Rng;
use std::fmt::Debug;
use tracing::{debug, info, instrument, warn};

/// Anything that can supply normalized questions. The scheduler depends only on this.
#[async_trait]
pub trait QuestionSource: Send + Sync + Debug {
    /// Produce exactly `count` questions or fail. Never retries.
    async fn generate(
        &self,
        topic: &Topic,
        count: usize,
        difficulty: DifficultyLevel,
    ) -> Result<Vec<Question>, QuizError>;
}

/// What is asked of the generation service for one call.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub topic_name: String,
    pub difficulty: DifficultyLevel,
    pub style_hint: String,
    pub subtopic_hint: Option<String>,
    pub count: usize,
}

impl GenerationRequest {
    /// Pick a style for the difficulty and, when the topic has sub-topics, a focus.
    pub fn build<R: Rng + ?Sized>(
        topic: &Topic,
        count: usize,
        difficulty: DifficultyLevel,
        rng: &mut R,
    ) -> Self {
        let style_hint = styles_for(difficulty)
            .choose(rng)
            .map(|s| s.to_string())
            .unwrap_or_default();
        let subtopic_hint = subtopics_for(&topic.id).choose(rng).map(|s| s.to_string());

        Self {
            topic_name: topic.name.clone(),
            difficulty,
            style_hint,
            subtopic_hint,
            count,
        }
    }

    pub fn render_prompt(&self) -> String {
        let focus = self
            .subtopic_hint
            .as_ref()
            .map(|s| format!("FOCO: \"{}\"\n", s))
            .unwrap_or_default();

        let prompt = format!(
            "PAPEL: Banca examinadora de concursos públicos (FGV/Cebraspe).\n\
             TAREFA: Elabore {count} questão(ões) de múltipla escolha de {topic} (nível {difficulty}).\n\
             {focus}\
             ESTILO: {style}\n\n\
             REGRAS:\n\
             - \"options\": exatamente 4 alternativas; a PRIMEIRA é sempre a correta.\n\
             - \"correctAnswerIndex\": sempre 0.\n\
             - \"correctExplanation\": por que a correta atende à regra.\n\
             - \"distractorAnalysis\": o erro de cada alternativa incorreta, na mesma ordem de options[1..].\n\
             - \"conceptExplanation\": explicação teórica completa e didática, como uma miniaula.\n\
             - \"legalBasis\" e \"studyTip\": concisos.\n\
             - NUNCA cite \"Letra A\", \"Gabarito\" ou posições: as alternativas serão embaralhadas.\n\
             - Destaque termos-chave com **asteriscos duplos**.",
            count = self.count,
            topic = self.topic_name,
            difficulty = self.difficulty,
            focus = focus,
            style = self.style_hint,
        );

        add_schema_guidance::<RawQuestion>(prompt)
    }
}

/// Parse a model reply into exactly `count` normalized questions.
///
/// Records without exactly four options are dropped; surplus records are truncated.
pub fn parse_questions<R: Rng + ?Sized>(
    raw: &str,
    count: usize,
    topic: &Topic,
    difficulty: DifficultyLevel,
    rng: &mut R,
) -> Result<Vec<Question>, GenerationError> {
    if raw.trim().is_empty() {
        return Err(GenerationError::EmptyResponse);
    }

    let mut records: Vec<RawQuestion> = extract_all(raw);
    if records.is_empty() {
        return Err(match serde_json::from_str::<Vec<RawQuestion>>(raw) {
            Err(e) => GenerationError::JsonDeserialization(e, raw.to_string()),
            Ok(_) => GenerationError::TooFewQuestions { expected: count, got: 0 },
        });
    }
    if records.len() > count {
        debug!(got = records.len(), expected = count, "Truncating surplus records");
        records.truncate(count);
    }

    let mut questions = Vec::with_capacity(records.len());
    for record in records {
        let topic_ref = record.topic_ref.clone();
        match shuffle_question_with(record, rng) {
            Ok(mut question) => {
                question.difficulty = difficulty;
                question.topic_ref = topic_ref
                    .filter(|r| !r.trim().is_empty())
                    .unwrap_or_else(|| topic.name.clone());
                questions.push(question);
            }
            Err(e) => warn!(error = %e, "Dropping unusable record"),
        }
    }

    if questions.len() < count {
        return Err(GenerationError::TooFewQuestions { expected: count, got: questions.len() });
    }
    Ok(questions)
}

/// [`QuestionSource`] backed by a model client.
#[derive(Debug, Clone)]
pub struct QuestionGenerator<C: LowLevelClient> {
    client: C,
}

impl<C: LowLevelClient> QuestionGenerator<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &C {
        &self.client
    }
}

#[async_trait]
impl<C: LowLevelClient> QuestionSource for QuestionGenerator<C> {
    #[instrument(target = "concurso_quiz::generator", skip(self, topic), fields(topic = %topic.id, difficulty = %difficulty))]
    async fn generate(
        &self,
        topic: &Topic,
        count: usize,
        difficulty: DifficultyLevel,
    ) -> Result<Vec<Question>, QuizError> {
        if count == 0 {
            return Ok(Vec::new());
        }

        let request = GenerationRequest::build(topic, count, difficulty, &mut rand::thread_rng());
        debug!(
            style = %request.style_hint,
            subtopic = request.subtopic_hint.as_deref().unwrap_or("-"),
            "Built generation request"
        );

        let raw = self.client.ask_raw(request.render_prompt()).await?;
        let questions = parse_questions(&raw, count, topic, difficulty, &mut rand::thread_rng())?;

        info!(count = questions.len(), "Generated questions");
        Ok(questions)
    }
}
