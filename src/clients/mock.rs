use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::{core::LowLevelClient, error::AIError, storage::lock};

/// One scripted reply of the mock client
#[derive(Debug, Clone)]
pub enum MockResponse {
    Success(String),
    Error(String),
}

/// Controls a [`MockClient`]: queue replies, read back the prompts it received.
#[derive(Debug, Default)]
pub struct MockHandle {
    responses: Mutex<VecDeque<MockResponse>>,
    fallback: Mutex<Option<String>>,
    prompts: Mutex<Vec<String>>,
}

impl MockHandle {
    pub fn add_response(&self, response: MockResponse) {
        lock(&self.responses).push_back(response);
    }

    pub fn add_responses(&self, responses: impl IntoIterator<Item = MockResponse>) {
        lock(&self.responses).extend(responses);
    }

    /// Reply used once the queue is empty. Without one, an empty queue is an error.
    pub fn set_fallback(&self, reply: Option<String>) {
        *lock(&self.fallback) = reply;
    }

    pub fn prompts(&self) -> Vec<String> {
        lock(&self.prompts).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.prompts).len()
    }

    pub fn remaining(&self) -> usize {
        lock(&self.responses).len()
    }
}

/// Mock client for tests and explicit `--client mock` runs
#[derive(Debug, Clone)]
pub struct MockClient {
    handle: Arc<MockHandle>,
}

impl MockClient {
    pub fn new() -> (Self, Arc<MockHandle>) {
        let handle = Arc::new(MockHandle::default());
        (Self { handle: handle.clone() }, handle)
    }

    pub fn with_responses(responses: Vec<MockResponse>) -> (Self, Arc<MockHandle>) {
        let (client, handle) = Self::new();
        handle.add_responses(responses);
        (client, handle)
    }

    /// A mock that answers every prompt with [`SAMPLE_BATCH`], whatever the topic.
    pub fn demo() -> (Self, Arc<MockHandle>) {
        let (client, handle) = Self::new();
        handle.set_fallback(Some(SAMPLE_BATCH.to_string()));
        (client, handle)
    }
}

#[async_trait]
impl LowLevelClient for MockClient {
    async fn ask_raw(&self, prompt: String) -> Result<String, AIError> {
        lock(&self.handle.prompts).push(prompt);
        let next = lock(&self.handle.responses).pop_front();
        match next {
            Some(MockResponse::Success(text)) => Ok(text),
            Some(MockResponse::Error(message)) => Err(AIError::Mock(message)),
            None => lock(&self.handle.fallback)
                .clone()
                .ok_or_else(|| AIError::Mock("No mock responses queued".to_string())),
        }
    }

    fn clone_box(&self) -> Box<dyn LowLevelClient> {
        Box::new(self.clone())
    }
}

/// Two well-formed Portuguese records, served by the demo mock.
pub const SAMPLE_BATCH: &str = r#"[
  {
    "question": "No que tange à regência verbal, assinale a frase em conformidade com a norma-padrão:",
    "options": [
      "Todos assistiram ao filme com grande interesse.",
      "O aluno obedeceu o regulamento da escola.",
      "Eu namoro com a Maria há dois anos.",
      "Chegamos no aeroporto pontualmente."
    ],
    "correctAnswerIndex": 0,
    "correctExplanation": "**Assistir**, no sentido de ver, exige a preposição 'a'.",
    "distractorAnalysis": [
      "**Obedecer** é transitivo indireto: obedeceu ao regulamento.",
      "**Namorar** é transitivo direto: namoro a Maria.",
      "**Chegar** pede a preposição 'a': chegamos ao aeroporto."
    ],
    "conceptExplanation": "Regência verbal é a relação entre o verbo e seus complementos. Verbos como assistir (ver), obedecer e chegar exigem preposição.",
    "legalBasis": "Gramática normativa (Cegalla)",
    "studyTip": "Memorize os verbos de regência dupla.",
    "topicRef": "GEN1 - Regência",
    "difficulty": "Intermediário"
  },
  {
    "question": "Assinale a alternativa em que o acento grave indicativo de crase está empregado corretamente:",
    "options": [
      "Refiro-me à diretora da escola.",
      "Ele começou à estudar cedo.",
      "Fomos à pé até o centro.",
      "Entreguei o livro à você."
    ],
    "correctAnswerIndex": 0,
    "correctExplanation": "**Referir-se a** + **a diretora** resulta em crase.",
    "distractorAnalysis": [
      "Não há crase antes de **verbo**.",
      "Não há crase antes de palavra **masculina**.",
      "Não há crase antes de **pronome de tratamento** como você."
    ],
    "conceptExplanation": "A crase é a fusão da preposição 'a' com o artigo feminino 'a'. Ocorre quando o termo regente exige preposição e o termo regido admite artigo feminino.",
    "legalBasis": "Gramática normativa (Bechara)",
    "studyTip": "Troque a palavra feminina por uma masculina: se virar 'ao', há crase.",
    "topicRef": "GEN1 - Crase",
    "difficulty": "Intermediário"
  }
]"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::question::RawQuestion;

    #[tokio::test]
    async fn replays_queue_then_errors() {
        let (client, handle) = MockClient::with_responses(vec![
            MockResponse::Success("first".to_string()),
            MockResponse::Error("boom".to_string()),
        ]);
        assert_eq!(client.ask_raw("p1".to_string()).await.unwrap(), "first");
        assert!(matches!(client.ask_raw("p2".to_string()).await, Err(AIError::Mock(m)) if m == "boom"));
        assert!(client.ask_raw("p3".to_string()).await.is_err());
        assert_eq!(handle.prompts(), vec!["p1", "p2", "p3"]);
    }

    #[tokio::test]
    async fn demo_mock_never_runs_dry() {
        let (client, handle) = MockClient::demo();
        for _ in 0..3 {
            assert_eq!(client.ask_raw("p".to_string()).await.unwrap(), SAMPLE_BATCH);
        }
        assert_eq!(handle.call_count(), 3);
    }

    #[test]
    fn sample_batch_is_well_formed() {
        let records: Vec<RawQuestion> = serde_json::from_str(SAMPLE_BATCH).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.options.len() == 4 && r.distractor_analysis.len() == 3));
    }
}
