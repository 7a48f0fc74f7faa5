use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::{extract_evaluation, format_service_label, Evaluation, ServiceId, Stage};
use crate::error::{AppError, AppResult, StorageError, TutorError};
use crate::prompts::{mode_prompt, stage_prompt};
use crate::provider::{ChatMessage, ChatRole, ProviderRegistry};
use crate::store::{
    fork_conversation, Conversation, ConversationMetadata, ForkStagePolicy, MessageRole, Storage,
    StoredMessage, TITLE_MAX_LEN,
};

/// Fallback title length when the model cannot produce one.
const TITLE_FALLBACK_LEN: usize = 30;

/// Parameters for a chat turn.
#[derive(Debug, Clone, Default)]
pub struct ChatParams {
    /// Existing conversation to continue, or `None` to lazily create one.
    pub conversation_id: Option<String>,
    /// The student's message.
    pub message: String,
    /// Service identifier override (`<provider>-<mode>`).
    pub service_id: Option<String>,
    /// Replacement context scratchpad, applied before the turn.
    pub context: Option<String>,
}

impl ChatParams {
    /// Create parameters for a new conversation
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            ..Default::default()
        }
    }

    /// Target an existing conversation
    pub fn with_conversation_id(mut self, id: impl Into<String>) -> Self {
        self.conversation_id = Some(id.into());
        self
    }

    /// Select a service
    pub fn with_service_id(mut self, service_id: impl Into<String>) -> Self {
        self.service_id = Some(service_id.into());
        self
    }

    /// Attach context
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }
}

/// Result of a completed chat turn.
#[derive(Debug, Clone, Serialize)]
pub struct ChatTurn {
    /// Conversation the turn belongs to (freshly created for lazy sends).
    pub conversation_id: String,
    /// The assistant reply shown to the student.
    pub response: String,
    /// Active scaffolding stage after the turn, if the conversation is in
    /// scaffolding mode.
    pub stage: Option<Stage>,
    /// The conversation state after the turn.
    pub conversation: Conversation,
}

/// The tutoring engine: drives the scaffolded stage machine and the
/// single-shot modes over persisted conversations.
///
/// Stage progress lives on the conversation's metadata, loaded fresh at the
/// start of each turn and written back in the same transaction as the new
/// messages. A failed provider call therefore leaves no trace: neither the
/// student message, the reply, nor a stage advance is persisted.
#[derive(Clone)]
pub struct TutorEngine {
    storage: Arc<dyn Storage>,
    providers: ProviderRegistry,
    default_service: String,
    fork_stage_policy: ForkStagePolicy,
}

impl TutorEngine {
    /// Create a new engine
    pub fn new(
        storage: Arc<dyn Storage>,
        providers: ProviderRegistry,
        default_service: impl Into<String>,
        fork_stage_policy: ForkStagePolicy,
    ) -> Self {
        Self {
            storage,
            providers,
            default_service: default_service.into(),
            fork_stage_policy,
        }
    }

    /// Process one student message and return the assistant reply.
    ///
    /// Without a `conversation_id` a conversation is created lazily: it is
    /// only persisted once the provider call succeeds, so abandoned sends
    /// leave no empty conversations behind.
    pub async fn chat(&self, params: ChatParams) -> AppResult<ChatTurn> {
        let message = params.message.trim();
        if message.is_empty() {
            return Err(TutorError::EmptyMessage {
                reason: "message content is required".to_string(),
            }
            .into());
        }

        let mut conversation = match &params.conversation_id {
            Some(id) => {
                let mut conversation = self.load(id).await?;
                if let Some(service_id) = &params.service_id {
                    self.switch_service(&mut conversation, service_id)?;
                }
                conversation
            }
            None => {
                let service_id = params
                    .service_id
                    .clone()
                    .unwrap_or_else(|| self.default_service.clone());
                // Reject unknown mode tokens before anything is created
                ServiceId::parse(&service_id)?;
                let title = derive_initial_title(&service_id, message);
                Conversation::new(title, ConversationMetadata::new(service_id))
            }
        };

        if let Some(context) = params.context {
            conversation.context = context;
        }

        conversation.messages.push(StoredMessage::student(message));
        let history = build_history(&conversation.messages);

        let response = self.generate_reply(&mut conversation, history).await?;

        conversation.messages.push(StoredMessage::assistant(&response));
        conversation.updated_at = Utc::now();
        self.storage.commit_turn(&conversation, 2).await?;

        Ok(self.finish_turn(conversation, response))
    }

    /// Regenerate an assistant reply from a message prefix.
    ///
    /// The prefix runs up to and including `message_index` (defaulting to
    /// the last message) and must end with a student message. The reply is
    /// appended at the end of the conversation.
    pub async fn continue_conversation(
        &self,
        conversation_id: &str,
        message_index: Option<usize>,
        service_id: Option<&str>,
    ) -> AppResult<ChatTurn> {
        let mut conversation = self.load(conversation_id).await?;
        if let Some(service_id) = service_id {
            self.switch_service(&mut conversation, service_id)?;
        }

        let len = conversation.messages.len();
        let index = message_index.unwrap_or(len.saturating_sub(1));
        if index >= len {
            return Err(StorageError::InvalidIndex { index, len }.into());
        }

        let prefix = &conversation.messages[..=index];
        let last = &prefix[prefix.len() - 1];
        if last.role != MessageRole::Student {
            return Err(StorageError::InvalidRole {
                index,
                role: last.role.to_string(),
            }
            .into());
        }

        let history = build_history(prefix);
        let response = self.generate_reply(&mut conversation, history).await?;

        conversation.messages.push(StoredMessage::assistant(&response));
        conversation.updated_at = Utc::now();
        self.storage.commit_turn(&conversation, 1).await?;

        Ok(self.finish_turn(conversation, response))
    }

    /// Edit a past student message and regenerate from it.
    ///
    /// The edit freezes the original content, discards every message after
    /// the edited one, and then produces a fresh assistant reply to the
    /// rewritten history.
    pub async fn edit_message(
        &self,
        conversation_id: &str,
        message_index: usize,
        new_content: &str,
        service_id: Option<&str>,
    ) -> AppResult<ChatTurn> {
        let new_content = new_content.trim();
        if new_content.is_empty() {
            return Err(TutorError::EmptyMessage {
                reason: "replacement content is required".to_string(),
            }
            .into());
        }

        if let Some(service_id) = service_id {
            let mut conversation = self.load(conversation_id).await?;
            if self.switch_service(&mut conversation, service_id)? {
                self.storage
                    .update_metadata(conversation_id, &conversation.metadata)
                    .await?;
            }
        }

        let mut conversation = self
            .storage
            .edit_message(conversation_id, message_index, new_content)
            .await?;

        let history = build_history(&conversation.messages);
        let response = self.generate_reply(&mut conversation, history).await?;

        conversation.messages.push(StoredMessage::assistant(&response));
        conversation.updated_at = Utc::now();
        self.storage.commit_turn(&conversation, 1).await?;

        Ok(self.finish_turn(conversation, response))
    }

    /// Fork a conversation at a message index into a new, independent
    /// conversation.
    pub async fn fork(
        &self,
        conversation_id: &str,
        at_index: usize,
        policy: Option<ForkStagePolicy>,
    ) -> AppResult<Conversation> {
        let source = self.load(conversation_id).await?;
        let fork = fork_conversation(&source, at_index, policy.unwrap_or(self.fork_stage_policy))?;
        self.storage.create_conversation(&fork).await?;

        info!(
            source_id = %source.id,
            fork_id = %fork.id,
            at_index,
            "Forked conversation"
        );
        Ok(fork)
    }

    /// Generate a short model-written title for an opening message, falling
    /// back to a truncation of the message itself when the provider fails.
    pub async fn generate_title(&self, service_id: Option<&str>, message: &str) -> String {
        let service_id = service_id.unwrap_or(&self.default_service);
        let service = ServiceId::parse(service_id).unwrap_or_default();

        let provider = match self.providers.get(service.provider) {
            Ok(provider) => provider,
            Err(e) => {
                warn!(error = %e, "Title provider unavailable, using fallback title");
                return fallback_title(message);
            }
        };

        match provider.generate_title(message).await {
            Ok(title) if !title.is_empty() => title,
            Ok(_) => fallback_title(message),
            Err(e) => {
                warn!(error = %e, "Title generation failed, using fallback title");
                fallback_title(message)
            }
        }
    }

    async fn load(&self, id: &str) -> AppResult<Conversation> {
        Ok(self
            .storage
            .get_conversation(id)
            .await?
            .ok_or_else(|| StorageError::ConversationNotFound {
                conversation_id: id.to_string(),
            })?)
    }

    /// Point the conversation at a different service; the stored string is
    /// validated first so a bad mode token fails before anything mutates.
    /// Returns whether the service actually changed.
    fn switch_service(
        &self,
        conversation: &mut Conversation,
        service_id: &str,
    ) -> AppResult<bool> {
        if service_id == conversation.metadata.llm_service {
            return Ok(false);
        }
        ServiceId::parse(service_id)?;
        info!(
            conversation_id = %conversation.id,
            from = %conversation.metadata.llm_service,
            to = %service_id,
            "Switching conversation service"
        );
        conversation.metadata.llm_service = service_id.to_string();
        Ok(true)
    }

    /// One model turn. In scaffolding mode this runs the stage machine:
    /// render the active stage's prompt, evaluate the completion, and on a
    /// PASS below the final stage advance and immediately generate the next
    /// stage's opening question as the reply. A missing or malformed
    /// sentinel counts as FAIL.
    async fn generate_reply(
        &self,
        conversation: &mut Conversation,
        history: Vec<ChatMessage>,
    ) -> AppResult<String> {
        let service = ServiceId::parse(&conversation.metadata.llm_service)?;
        let provider = self.providers.get(service.provider)?;

        if service.mode.is_scaffolding() {
            let stage = Stage::from_index(conversation.metadata.stage_index);
            let prompt = compose_system_prompt(stage_prompt(stage), &conversation.context);
            let completion = provider.complete(&prompt, &history).await?;

            let evaluation = extract_evaluation(&completion).unwrap_or(Evaluation::Fail);
            debug!(
                conversation_id = %conversation.id,
                stage = %stage,
                evaluation = ?evaluation,
                "Evaluated scaffolding turn"
            );

            if evaluation.passed() {
                if let Some(next) = stage.next() {
                    conversation.metadata.stage_index = next.index();
                    info!(
                        conversation_id = %conversation.id,
                        from = %stage,
                        to = %next,
                        "Stage passed, advancing"
                    );

                    // The student passed mid-turn: answer with the next
                    // stage's opening question rather than a bare PASS.
                    let mut extended = history;
                    extended.push(ChatMessage::model(completion));
                    let next_prompt =
                        compose_system_prompt(stage_prompt(next), &conversation.context);
                    return Ok(provider.complete(&next_prompt, &extended).await?);
                }
            }

            Ok(completion)
        } else {
            let prompt = mode_prompt(service.mode).ok_or_else(|| AppError::Internal {
                message: format!("No fixed prompt for mode {}", service.mode),
            })?;
            let prompt = compose_system_prompt(prompt, &conversation.context);
            Ok(provider.complete(&prompt, &history).await?)
        }
    }

    fn finish_turn(&self, conversation: Conversation, response: String) -> ChatTurn {
        let service = ServiceId::parse(&conversation.metadata.llm_service)
            .unwrap_or_default();
        let stage = service
            .mode
            .is_scaffolding()
            .then(|| Stage::from_index(conversation.metadata.stage_index));

        ChatTurn {
            conversation_id: conversation.id.clone(),
            response,
            stage,
            conversation,
        }
    }
}

fn build_history(messages: &[StoredMessage]) -> Vec<ChatMessage> {
    messages
        .iter()
        .map(|message| ChatMessage {
            role: match message.role {
                MessageRole::Student => ChatRole::User,
                MessageRole::Assistant => ChatRole::Model,
            },
            content: message.content.clone(),
        })
        .collect()
}

fn compose_system_prompt(prompt: &str, context: &str) -> String {
    if context.is_empty() {
        prompt.to_string()
    } else {
        format!(
            "{}\n\nAdditional context provided by the student:\n{}",
            prompt, context
        )
    }
}

/// Title of a freshly created conversation: the service label in brackets
/// plus the opening message, truncated so the whole title stays within the
/// title budget.
fn derive_initial_title(service_id: &str, message: &str) -> String {
    let prefix = format!("[{}] ", format_service_label(service_id));
    let budget = TITLE_MAX_LEN.saturating_sub(prefix.chars().count());

    if message.chars().count() > budget {
        let truncated: String = message.chars().take(budget.saturating_sub(3)).collect();
        format!("{}{}...", prefix, truncated)
    } else {
        format!("{}{}", prefix, message)
    }
}

fn fallback_title(message: &str) -> String {
    if message.chars().count() > TITLE_FALLBACK_LEN {
        let truncated: String = message.chars().take(TITLE_FALLBACK_LEN).collect();
        format!("{}...", truncated)
    } else {
        message.to_string()
    }
}
