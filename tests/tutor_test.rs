//! Integration tests for the tutoring engine
//!
//! Exercises the scaffolded stage machine, evaluation handling, and the
//! fork workflow against a mocked Gemini endpoint and an in-memory store.

use std::sync::Arc;

use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use scaffold_tutor::config::{GeminiConfig, RequestConfig};
use scaffold_tutor::error::{AppError, StorageError, TutorError};
use scaffold_tutor::provider::{GeminiProvider, ProviderRegistry};
use scaffold_tutor::store::{ForkStagePolicy, MessageRole, SqliteStorage, Storage};
use scaffold_tutor::tutor::{ChatParams, TutorEngine};

const GEMINI_PATH: &str = "/v1beta/models/gemini-2.0-flash-lite:generateContent";

async fn create_test_engine(mock_server: &MockServer) -> (TutorEngine, SqliteStorage) {
    let storage = SqliteStorage::new_in_memory()
        .await
        .expect("Failed to create in-memory storage");

    let gemini = GeminiProvider::new(
        &GeminiConfig {
            api_key: "test_key".to_string(),
            base_url: mock_server.uri(),
            model: "gemini-2.0-flash-lite".to_string(),
        },
        &RequestConfig::default(),
    )
    .expect("Failed to create provider");

    let providers = ProviderRegistry::from_parts(Arc::new(gemini), None);
    let engine = TutorEngine::new(
        Arc::new(storage.clone()),
        providers,
        "gemini-scaffolding",
        ForkStagePolicy::Reset,
    );

    (engine, storage)
}

fn completion_body(text: &str) -> serde_json::Value {
    json!({
        "candidates": [
            {
                "content": {
                    "role": "model",
                    "parts": [{ "text": text }]
                }
            }
        ]
    })
}

async fn mock_completion(mock_server: &MockServer, text: &str) {
    Mock::given(method("POST"))
        .and(path(GEMINI_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(text)))
        .mount(mock_server)
        .await;
}

#[cfg(test)]
mod stage_machine_tests {
    use super::*;

    #[tokio::test]
    async fn test_fail_keeps_stage() {
        let mock_server = MockServer::start().await;
        mock_completion(
            &mock_server,
            "SENSEMAKING What is the problem asking?\n@Evaluation: FAIL",
        )
        .await;

        let (engine, _storage) = create_test_engine(&mock_server).await;

        let turn = engine
            .chat(ChatParams::new("Help me with recursion"))
            .await
            .unwrap();

        assert_eq!(turn.conversation.metadata.stage_index, 0);
        assert!(turn.response.contains("What is the problem asking?"));
    }

    #[tokio::test]
    async fn test_missing_sentinel_is_fail_closed() {
        let mock_server = MockServer::start().await;
        mock_completion(&mock_server, "SENSEMAKING Tell me more about the task.").await;

        let (engine, _storage) = create_test_engine(&mock_server).await;

        let turn = engine.chat(ChatParams::new("Help me")).await.unwrap();

        assert_eq!(turn.conversation.metadata.stage_index, 0);
    }

    #[tokio::test]
    async fn test_malformed_sentinel_is_fail_closed() {
        let mock_server = MockServer::start().await;
        // No space after the colon, so the sentinel does not match
        mock_completion(&mock_server, "Looks good!\n@Evaluation:PASS").await;

        let (engine, _storage) = create_test_engine(&mock_server).await;

        let turn = engine.chat(ChatParams::new("Here is my restatement")).await.unwrap();

        assert_eq!(turn.conversation.metadata.stage_index, 0);
    }

    #[tokio::test]
    async fn test_pass_advances_and_answers_with_next_stage() {
        let mock_server = MockServer::start().await;

        // First call evaluates the current stage as passed; the second call
        // in the same turn produces the next stage's opening question.
        Mock::given(method("POST"))
            .and(path(GEMINI_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(
                "SENSEMAKING Well restated!\n@Evaluation: PASS",
            )))
            .up_to_n_times(1)
            .expect(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("POST"))
            .and(path(GEMINI_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(
                "REPRESENTATION What are the inputs and outputs?\n@Evaluation: FAIL",
            )))
            .expect(1)
            .mount(&mock_server)
            .await;

        let (engine, _storage) = create_test_engine(&mock_server).await;

        let turn = engine
            .chat(ChatParams::new("The problem asks for the nth Fibonacci number"))
            .await
            .unwrap();

        // Single student turn, stage advanced exactly one step, and the
        // visible reply is the next stage's question
        assert_eq!(turn.conversation.metadata.stage_index, 1);
        assert!(turn.response.starts_with("REPRESENTATION"));
    }

    #[tokio::test]
    async fn test_stage_clamps_at_final() {
        let mock_server = MockServer::start().await;
        mock_completion(&mock_server, "Great work!\n@Evaluation: PASS").await;

        let (engine, _storage) = create_test_engine(&mock_server).await;

        // Force many consecutive PASS turns; the index must clamp at the
        // final stage, never skip, and never wrap
        let first = engine.chat(ChatParams::new("turn 0")).await.unwrap();
        let id = first.conversation_id.clone();
        assert_eq!(first.conversation.metadata.stage_index, 1);

        let mut last_index = 1;
        for i in 1..10 {
            let turn = engine
                .chat(ChatParams::new(format!("turn {}", i)).with_conversation_id(id.clone()))
                .await
                .unwrap();
            let index = turn.conversation.metadata.stage_index;
            assert!(index >= last_index, "stage index must not decrease");
            assert!(index - last_index <= 1, "stage index must advance one step at most");
            last_index = index;
        }

        assert_eq!(last_index, 5);
    }

    #[tokio::test]
    async fn test_provider_failure_persists_nothing() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(GEMINI_PATH))
            .respond_with(ResponseTemplate::new(500).set_body_string("upstream error"))
            .mount(&mock_server)
            .await;

        let (engine, storage) = create_test_engine(&mock_server).await;

        let result = engine.chat(ChatParams::new("Hello")).await;
        assert!(matches!(result, Err(AppError::Provider(_))));

        // The lazy conversation must not have been created
        let summaries = storage.list_conversations().await.unwrap();
        assert!(summaries.is_empty());
    }

    #[tokio::test]
    async fn test_provider_failure_mid_conversation_is_atomic() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(GEMINI_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(completion_body(
                "SENSEMAKING Restate it for me.\n@Evaluation: FAIL",
            )))
            .up_to_n_times(1)
            .mount(&mock_server)
            .await;
        Mock::given(method("POST"))
            .and(path(GEMINI_PATH))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .mount(&mock_server)
            .await;

        let (engine, storage) = create_test_engine(&mock_server).await;

        let first = engine.chat(ChatParams::new("Help me")).await.unwrap();
        let id = first.conversation_id.clone();

        let result = engine
            .chat(ChatParams::new("Second message").with_conversation_id(id.clone()))
            .await;
        assert!(result.is_err());

        // The failed turn must leave neither message behind
        let conversation = storage.get_conversation(&id).await.unwrap().unwrap();
        assert_eq!(conversation.messages.len(), 2);
        assert_eq!(conversation.metadata.stage_index, 0);
    }

    #[tokio::test]
    async fn test_direct_mode_has_no_stage() {
        let mock_server = MockServer::start().await;
        mock_completion(&mock_server, "DIRECT ANSWER print(\"hi\")").await;

        let (engine, _storage) = create_test_engine(&mock_server).await;

        let turn = engine
            .chat(ChatParams::new("How do I print?").with_service_id("gemini-direct"))
            .await
            .unwrap();

        assert!(turn.stage.is_none());
        assert_eq!(turn.conversation.metadata.stage_index, 0);
    }
}

#[cfg(test)]
mod service_tests {
    use super::*;

    #[tokio::test]
    async fn test_unknown_provider_prefix_falls_back_silently() {
        let mock_server = MockServer::start().await;
        mock_completion(&mock_server, "DIRECT ANSWER 42").await;

        let (engine, _storage) = create_test_engine(&mock_server).await;

        // Unknown provider prefix quietly falls back to the default
        // provider, but the stored service string is preserved
        let turn = engine
            .chat(ChatParams::new("What is 6 * 7?").with_service_id("mistral-direct"))
            .await
            .unwrap();

        assert_eq!(turn.conversation.metadata.llm_service, "mistral-direct");
        assert_eq!(turn.response, "DIRECT ANSWER 42");
    }

    #[tokio::test]
    async fn test_unknown_mode_token_hard_fails() {
        let mock_server = MockServer::start().await;
        let (engine, storage) = create_test_engine(&mock_server).await;

        let result = engine
            .chat(ChatParams::new("Hello").with_service_id("gemini-dialogue"))
            .await;

        assert!(matches!(
            result,
            Err(AppError::Tutor(TutorError::UnsupportedMode { .. }))
        ));
        assert!(storage.list_conversations().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_empty_message_rejected() {
        let mock_server = MockServer::start().await;
        let (engine, _storage) = create_test_engine(&mock_server).await;

        let result = engine.chat(ChatParams::new("   ")).await;

        assert!(matches!(
            result,
            Err(AppError::Tutor(TutorError::EmptyMessage { .. }))
        ));
    }
}

#[cfg(test)]
mod continuation_tests {
    use super::*;

    #[tokio::test]
    async fn test_continue_requires_student_prefix_tail() {
        let mock_server = MockServer::start().await;
        mock_completion(&mock_server, "SENSEMAKING Restate it.\n@Evaluation: FAIL").await;

        let (engine, _storage) = create_test_engine(&mock_server).await;

        let turn = engine.chat(ChatParams::new("Help me")).await.unwrap();
        let id = turn.conversation_id;

        // The conversation ends with an assistant message
        let result = engine.continue_conversation(&id, None, None).await;
        assert!(matches!(
            result,
            Err(AppError::Storage(StorageError::InvalidRole { .. }))
        ));
    }

    #[tokio::test]
    async fn test_continue_from_student_message_appends_reply() {
        let mock_server = MockServer::start().await;
        mock_completion(&mock_server, "SENSEMAKING Another question.\n@Evaluation: FAIL").await;

        let (engine, storage) = create_test_engine(&mock_server).await;

        let turn = engine.chat(ChatParams::new("Help me")).await.unwrap();
        let id = turn.conversation_id;

        // Continue from the student message at index 0
        let continued = engine.continue_conversation(&id, Some(0), None).await.unwrap();
        assert!(continued.response.contains("Another question."));

        let conversation = storage.get_conversation(&id).await.unwrap().unwrap();
        assert_eq!(conversation.messages.len(), 3);
        assert_eq!(conversation.messages[2].role, MessageRole::Assistant);
    }

    #[tokio::test]
    async fn test_continue_out_of_bounds_index() {
        let mock_server = MockServer::start().await;
        mock_completion(&mock_server, "SENSEMAKING Hi.\n@Evaluation: FAIL").await;

        let (engine, _storage) = create_test_engine(&mock_server).await;

        let turn = engine.chat(ChatParams::new("Help me")).await.unwrap();

        let result = engine
            .continue_conversation(&turn.conversation_id, Some(7), None)
            .await;
        assert!(matches!(
            result,
            Err(AppError::Storage(StorageError::InvalidIndex { .. }))
        ));
    }

    #[tokio::test]
    async fn test_edit_regenerates_from_truncated_history() {
        let mock_server = MockServer::start().await;
        mock_completion(&mock_server, "SENSEMAKING Rephrased question.\n@Evaluation: FAIL").await;

        let (engine, storage) = create_test_engine(&mock_server).await;

        let turn = engine.chat(ChatParams::new("Original question")).await.unwrap();
        let id = turn.conversation_id;

        let edited = engine
            .edit_message(&id, 0, "Better question", None)
            .await
            .unwrap();

        // Old assistant reply gone, edited student message plus fresh reply
        assert_eq!(edited.conversation.messages.len(), 2);
        assert_eq!(edited.conversation.messages[0].content, "Better question");
        assert!(edited.conversation.messages[0].edited);
        assert_eq!(
            edited.conversation.messages[0].original_content.as_deref(),
            Some("Original question")
        );

        let persisted = storage.get_conversation(&id).await.unwrap().unwrap();
        assert_eq!(persisted.messages.len(), 2);
    }
}

#[cfg(test)]
mod fork_tests {
    use super::*;

    #[tokio::test]
    async fn test_fork_then_edit_then_continue() {
        let mock_server = MockServer::start().await;
        mock_completion(&mock_server, "SENSEMAKING A question.\n@Evaluation: FAIL").await;

        let (engine, storage) = create_test_engine(&mock_server).await;

        let turn = engine.chat(ChatParams::new("Start here")).await.unwrap();
        let source_id = turn.conversation_id;

        // Fork at the original student message, rewrite it, regenerate
        let fork = engine.fork(&source_id, 0, None).await.unwrap();
        let edited = engine
            .edit_message(&fork.id, 0, "Start differently", None)
            .await
            .unwrap();

        assert_eq!(edited.conversation.messages.len(), 2);
        assert_eq!(edited.conversation.messages[0].content, "Start differently");

        // Source untouched by the whole workflow
        let source = storage.get_conversation(&source_id).await.unwrap().unwrap();
        assert_eq!(source.messages.len(), 2);
        assert_eq!(source.messages[0].content, "Start here");
    }

    #[tokio::test]
    async fn test_fork_policy_override_inherits_stage() {
        let mock_server = MockServer::start().await;
        mock_completion(&mock_server, "Nice!\n@Evaluation: PASS").await;

        let (engine, _storage) = create_test_engine(&mock_server).await;

        let turn = engine.chat(ChatParams::new("Pass me")).await.unwrap();
        assert_eq!(turn.conversation.metadata.stage_index, 1);

        let inherited = engine
            .fork(&turn.conversation_id, 0, Some(ForkStagePolicy::Inherit))
            .await
            .unwrap();
        assert_eq!(inherited.metadata.stage_index, 1);

        // The engine default is Reset
        let reset = engine.fork(&turn.conversation_id, 0, None).await.unwrap();
        assert_eq!(reset.metadata.stage_index, 0);
    }

    #[tokio::test]
    async fn test_fork_missing_conversation() {
        let mock_server = MockServer::start().await;
        let (engine, _storage) = create_test_engine(&mock_server).await;

        let result = engine.fork("missing", 0, None).await;
        assert!(matches!(
            result,
            Err(AppError::Storage(StorageError::ConversationNotFound { .. }))
        ));
    }
}

#[cfg(test)]
mod title_tests {
    use super::*;

    #[tokio::test]
    async fn test_new_conversation_title_carries_service_label() {
        let mock_server = MockServer::start().await;
        mock_completion(&mock_server, "SENSEMAKING Q.\n@Evaluation: FAIL").await;

        let (engine, _storage) = create_test_engine(&mock_server).await;

        let turn = engine
            .chat(ChatParams::new("Explain recursion to me"))
            .await
            .unwrap();

        assert_eq!(
            turn.conversation.title,
            "[Gemini Scaffolding] Explain recursion to me"
        );
    }

    #[tokio::test]
    async fn test_generate_title_uses_model() {
        let mock_server = MockServer::start().await;
        mock_completion(&mock_server, "Recursion Basics").await;

        let (engine, _storage) = create_test_engine(&mock_server).await;

        let title = engine
            .generate_title(None, "Can you explain recursion?")
            .await;
        assert_eq!(title, "Recursion Basics");
    }

    #[tokio::test]
    async fn test_generate_title_falls_back_on_provider_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(GEMINI_PATH))
            .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
            .mount(&mock_server)
            .await;

        let (engine, _storage) = create_test_engine(&mock_server).await;

        let long_message = "a".repeat(60);
        let title = engine.generate_title(None, &long_message).await;
        assert!(title.ends_with("..."));
        assert_eq!(title.chars().count(), 33);
    }
}
