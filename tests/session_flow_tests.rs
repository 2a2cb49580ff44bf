
use async_trait::async_trait;
use concurso_quiz::clients::mock::{MockClient, MockResponse};
use concurso_quiz::core::LowLevelClient;
use concurso_quiz::error::{AIError, GeminiError, GenerationError, SessionError};
use concurso_quiz::storage::MemoryStore;
use concurso_quiz::{DifficultyLevel, QuizError, SessionPhase};
use std::sync::Arc;

use crate::test_utils::{
    app_over, batch_json, print_test_client_info, scripted_app, wait_idle_background, wait_ready,
};

/// Client that always reports a rejected key.
#[derive(Debug, Clone)]
struct RejectingClient;

#[async_trait]
impl LowLevelClient for RejectingClient {
    async fn ask_raw(&self, _prompt: String) -> Result<String, AIError> {
        Err(AIError::Gemini(GeminiError::Authentication))
    }

    fn clone_box(&self) -> Box<dyn LowLevelClient> {
        Box::new(self.clone())
    }
}

#[tokio::test]
async fn test_portuguese_intermediate_end_to_end() {
    print_test_client_info();
    let (app, handle, _store) = scripted_app(vec![], Some(3));

    let snapshot = app
        .start_session("Língua Portuguesa", DifficultyLevel::Intermediate)
        .await
        .expect("initial load should succeed");
    assert_eq!(snapshot.phase, SessionPhase::Ready);
    assert_eq!(snapshot.queue_length, 1);
    assert_eq!(snapshot.topic_id.as_deref(), Some("GEN1"));

    let first = app.current_question().expect("first question loaded");
    assert_eq!(first.difficulty, DifficultyLevel::Intermediate);
    assert_eq!(first.correct_option().unwrap(), "Correta 1");
    assert_eq!(first.correct_explanation, "A regra foi aplicada.");

    let outcome = app.submit_answer(first.correct_option_index).unwrap();
    assert!(outcome.is_correct);
    assert_eq!(outcome.mastery, 5);
    assert_eq!(outcome.stats.streak, 1);

    // With the seed batch buffered, the next question is served at once
    let buffered = wait_idle_background(&app).await;
    assert_eq!(buffered.queue_length, 3);
    let moved = app.advance().unwrap();
    assert_eq!(moved.cursor, 1);
    assert_eq!(moved.phase, SessionPhase::Ready);
    let second = app.current_question().expect("buffered question shown without waiting");
    let wrong = (second.correct_option_index + 1) % second.options.len();
    let outcome = app.submit_answer(wrong).unwrap();
    assert!(!outcome.is_correct);
    assert_eq!(outcome.mastery, 6);
    assert_eq!(outcome.stats.streak, 0);

    let summary = app.session_summary();
    assert_eq!((summary.answered, summary.correct), (2, 1));
    assert_eq!(app.accuracy_percent(), 50);
    assert!(handle.call_count() >= 2);
    assert!(handle.prompts()[0].contains("Língua Portuguesa (nível Intermediário)"));
}

#[tokio::test]
async fn test_initial_load_requests_one_then_seeds_two() {
    let (app, handle, _store) = scripted_app(vec![], Some(3));
    app.start_session("GEN2", DifficultyLevel::Beginner).await.unwrap();

    let settled = wait_idle_background(&app).await;
    assert_eq!(settled.queue_length, 3);
    assert_eq!(handle.call_count(), 2);
    assert!(handle.prompts()[0].contains("Elabore 1 questão(ões)"));
    assert!(handle.prompts()[1].contains("Elabore 2 questão(ões)"));
}

#[tokio::test]
async fn test_mastery_survives_restart_and_reset() {
    let store = Arc::new(MemoryStore::new());
    let (client, handle) = MockClient::new();
    handle.set_fallback(Some(batch_json(3)));
    let app = app_over(client.clone(), store.clone());

    app.start_session("GEN1", DifficultyLevel::Advanced).await.unwrap();
    let question = app.current_question().unwrap();
    app.submit_answer(question.correct_option_index).unwrap();
    app.end_session();

    let reopened = app_over(client, store);
    assert_eq!(reopened.mastery("GEN1"), 5);
    assert_eq!(reopened.stats().total_answered, 1);

    let table = reopened.reset_topic("GEN1").unwrap();
    assert_eq!(table.get("GEN1"), 0);
    assert_eq!(reopened.stats().total_answered, 1);
}

#[tokio::test]
async fn test_malformed_payload_fails_initial_load() {
    let (app, _handle, _store) = scripted_app(
        vec![MockResponse::Success("Desculpe, não consigo gerar agora.".to_string())],
        Some(3),
    );

    let err = app.start_session("GEN1", DifficultyLevel::Beginner).await.unwrap_err();
    assert!(matches!(err, QuizError::Generation(GenerationError::JsonDeserialization(_, _))));
    assert_eq!(app.snapshot().phase, SessionPhase::Idle);
    assert!(matches!(app.advance(), Err(QuizError::Session(SessionError::NoActiveSession))));

    // A manual retry goes through
    let snapshot = app.start_session("GEN1", DifficultyLevel::Beginner).await.unwrap();
    assert!(snapshot.is_ready());
}

#[tokio::test]
async fn test_rejected_key_surfaces_as_credential_error() {
    let app = app_over(RejectingClient, Arc::new(MemoryStore::new()));
    let err = app.start_session("GEN1", DifficultyLevel::Beginner).await.unwrap_err();
    assert!(err.is_credential());
    assert_eq!(app.snapshot().phase, SessionPhase::Idle);
}

#[tokio::test]
async fn test_background_failure_is_retried_by_next_advance() {
    let (app, handle, _store) = scripted_app(
        vec![
            MockResponse::Success(batch_json(1)),
            MockResponse::Error("quota".to_string()),
        ],
        Some(1),
    );
    app.start_session("GEN3", DifficultyLevel::Intermediate).await.unwrap();

    let after_failure = wait_idle_background(&app).await;
    assert_eq!(after_failure.queue_length, 1);
    assert!(after_failure.is_ready());

    let waiting = app.advance().unwrap();
    assert_eq!(waiting.phase, SessionPhase::Waiting);
    assert!(waiting.background_filling);

    let ready = wait_ready(&app).await;
    assert_eq!(ready.cursor, 1);
    assert!(handle.call_count() >= 3);
}

#[tokio::test]
async fn test_navigation_history_is_kept() {
    let (app, _handle, _store) = scripted_app(vec![], Some(3));
    app.start_session("GEN1", DifficultyLevel::Beginner).await.unwrap();
    wait_idle_background(&app).await;

    let first_text = app.current_question().unwrap().text;
    app.advance().unwrap();
    app.advance().unwrap();
    assert_eq!(app.snapshot().cursor, 2);

    let back = app.jump_to(0).unwrap();
    assert_eq!(back.cursor, 0);
    assert_eq!(app.current_question().unwrap().text, first_text);
    assert_eq!(app.retreat().unwrap().cursor, 0);
    assert!(app.question_at(2).is_some());
}

#[tokio::test]
async fn test_end_session_discards_in_flight_results() {
    let (app, handle, _store) = scripted_app(vec![], Some(3));
    app.start_session("GEN1", DifficultyLevel::Beginner).await.unwrap();
    let ended = app.end_session();
    assert_eq!(ended.phase, SessionPhase::Idle);

    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    let after = app.snapshot();
    assert_eq!(after.queue_length, 0);
    assert_eq!(after.phase, SessionPhase::Idle);
    assert!(app.current_question().is_none());
    assert!(handle.call_count() <= 2);
}
