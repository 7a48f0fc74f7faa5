//! Storage layer for conversation persistence.
//!
//! This module provides SQLite-based storage for conversations and their
//! ordered message lists, plus the fork engine that copies a conversation
//! prefix into a new, independent conversation.

mod fork;
mod sqlite;

pub use fork::*;
pub use sqlite::SqliteStorage;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::StorageResult;

/// Who authored a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageRole {
    /// A message typed by the student.
    Student,
    /// A model-generated tutor reply.
    Assistant,
}

impl MessageRole {
    /// Get the role name as a string
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::Student => "student",
            MessageRole::Assistant => "assistant",
        }
    }
}

impl std::fmt::Display for MessageRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for MessageRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "student" => Ok(MessageRole::Student),
            "assistant" => Ok(MessageRole::Assistant),
            _ => Err(format!("Unknown message role: {}", s)),
        }
    }
}

/// A single message within a conversation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoredMessage {
    /// Message author.
    pub role: MessageRole,
    /// Current message text.
    pub content: String,
    /// Creation time, bumped on edit.
    pub timestamp: DateTime<Utc>,
    /// Whether the message has ever been edited.
    pub edited: bool,
    /// Pre-first-edit content, frozen exactly once. Present iff `edited`.
    pub original_content: Option<String>,
}

impl StoredMessage {
    /// Create a student message
    pub fn student(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Student, content)
    }

    /// Create an assistant message
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(MessageRole::Assistant, content)
    }

    fn new(role: MessageRole, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            timestamp: Utc::now(),
            edited: false,
            original_content: None,
        }
    }

    /// Apply an edit, freezing the original content on the first edit only.
    pub fn apply_edit(&mut self, new_content: impl Into<String>) {
        if !self.edited {
            self.original_content = Some(self.content.clone());
            self.edited = true;
        }
        self.content = new_content.into();
        self.timestamp = Utc::now();
    }
}

/// Conversation metadata.
///
/// `stage_index` is the persisted scaffolding stage for the conversation,
/// stored here as plain data rather than attached to any login session, so
/// each turn can load it fresh and write it back atomically with the new
/// messages.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMetadata {
    /// Service identifier of form `<provider>-<mode>`.
    pub llm_service: String,
    /// 0-based scaffolding stage index; ignored by single-shot modes.
    #[serde(default)]
    pub stage_index: u32,
    /// Optional subject label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Free-form tags.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl ConversationMetadata {
    /// Create metadata for a service
    pub fn new(llm_service: impl Into<String>) -> Self {
        Self {
            llm_service: llm_service.into(),
            stage_index: 0,
            subject: None,
            tags: Vec::new(),
        }
    }

    /// Set the subject label
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// Set the stage index
    pub fn with_stage_index(mut self, stage_index: u32) -> Self {
        self.stage_index = stage_index;
        self
    }
}

/// A persisted tutoring conversation with its ordered message list.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Conversation {
    /// Unique conversation identifier.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Optional free-text scratchpad (assignment text, code).
    pub context: String,
    /// Ordered messages; append-only in the common path, truncated by edit
    /// and fork.
    pub messages: Vec<StoredMessage>,
    /// Service selection and stage progress.
    pub metadata: ConversationMetadata,
    /// When the conversation was created.
    pub created_at: DateTime<Utc>,
    /// When the conversation was last updated.
    pub updated_at: DateTime<Utc>,
}

impl Conversation {
    /// Create a new empty conversation
    pub fn new(title: impl Into<String>, metadata: ConversationMetadata) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4().to_string(),
            title: title.into(),
            context: String::new(),
            messages: Vec::new(),
            metadata,
            created_at: now,
            updated_at: now,
        }
    }

    /// Set the context scratchpad
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }
}

/// Summary row for conversation listings (no message bodies).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationSummary {
    /// Conversation identifier.
    pub id: String,
    /// Display title.
    pub title: String,
    /// Service selection and stage progress.
    pub metadata: ConversationMetadata,
    /// When the conversation was created.
    pub created_at: DateTime<Utc>,
    /// When the conversation was last updated.
    pub updated_at: DateTime<Utc>,
}

/// Storage trait for conversation persistence.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Persist a new conversation together with any messages it already
    /// holds (used for both lazy creation and forks).
    async fn create_conversation(&self, conversation: &Conversation) -> StorageResult<()>;

    /// Get a conversation with its full message list.
    async fn get_conversation(&self, id: &str) -> StorageResult<Option<Conversation>>;

    /// List conversation summaries, most recently updated first.
    async fn list_conversations(&self) -> StorageResult<Vec<ConversationSummary>>;

    /// Commit a completed chat turn atomically: the last `appended` entries
    /// of `conversation.messages` are inserted, metadata and `updated_at`
    /// are written, and for a conversation not yet persisted the
    /// conversation row itself is created. Either everything lands or
    /// nothing does.
    async fn commit_turn(&self, conversation: &Conversation, appended: usize) -> StorageResult<()>;

    /// Edit a message in place and truncate every message after it.
    /// Freezes `original_content` on the first edit only. Returns the
    /// updated conversation.
    async fn edit_message(
        &self,
        id: &str,
        index: usize,
        new_content: &str,
    ) -> StorageResult<Conversation>;

    /// Rename a conversation.
    async fn update_title(&self, id: &str, title: &str) -> StorageResult<()>;

    /// Replace the context scratchpad.
    async fn update_context(&self, id: &str, context: &str) -> StorageResult<()>;

    /// Replace conversation metadata wholesale.
    async fn update_metadata(
        &self,
        id: &str,
        metadata: &ConversationMetadata,
    ) -> StorageResult<()>;

    /// Delete a conversation and its messages. Fails with
    /// `ConversationNotFound` if absent.
    async fn delete_conversation(&self, id: &str) -> StorageResult<()>;
}
