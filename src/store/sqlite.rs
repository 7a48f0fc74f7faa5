use async_trait::async_trait;
use chrono::Utc;
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions};
use std::str::FromStr;
use tracing::{debug, info};

use super::{
    Conversation, ConversationMetadata, ConversationSummary, MessageRole, Storage, StoredMessage,
};
use crate::config::DatabaseConfig;
use crate::error::{StorageError, StorageResult};

/// Static migrator that embeds migrations at compile time
static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// SQLite-backed storage implementation
#[derive(Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    /// Create a new SQLite storage instance
    pub async fn new(config: &DatabaseConfig) -> StorageResult<Self> {
        // Ensure parent directory exists
        if let Some(parent) = config.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::Connection {
                message: format!("Failed to create database directory: {}", e),
            })?;
        }

        let database_url = format!("sqlite://{}?mode=rwc", config.path.display());

        let options = SqliteConnectOptions::from_str(&database_url)
            .map_err(|e| StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            })?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to connect to database: {}", e),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// Create an in-memory storage instance for testing.
    ///
    /// The pool is pinned to a single long-lived connection; SQLite's
    /// in-memory databases are per-connection, so a larger pool would see
    /// a different empty database on every checkout.
    pub async fn new_in_memory() -> StorageResult<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(|e| StorageError::Connection {
                message: format!("Invalid database URL: {}", e),
            })?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .min_connections(1)
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await
            .map_err(|e| StorageError::Connection {
                message: format!("Failed to connect to database: {}", e),
            })?;

        let storage = Self { pool };
        storage.run_migrations().await?;

        Ok(storage)
    }

    /// Run database migrations using embedded sqlx migrations
    async fn run_migrations(&self) -> StorageResult<()> {
        info!("Running database migrations...");

        MIGRATOR
            .run(&self.pool)
            .await
            .map_err(|e| StorageError::Migration {
                message: format!("Failed to run migrations: {}", e),
            })?;

        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Get the underlying pool for advanced queries
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn fetch_messages(&self, conversation_id: &str) -> StorageResult<Vec<StoredMessage>> {
        let rows: Vec<MessageRow> = sqlx::query_as(
            r#"
            SELECT seq, role, content, timestamp, edited, original_content
            FROM messages
            WHERE conversation_id = ?
            ORDER BY seq ASC
            "#,
        )
        .bind(conversation_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn create_conversation(&self, conversation: &Conversation) -> StorageResult<()> {
        let metadata = serde_json::to_string(&conversation.metadata).unwrap_or_default();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO conversations (id, title, context, metadata, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&conversation.id)
        .bind(&conversation.title)
        .bind(&conversation.context)
        .bind(&metadata)
        .bind(conversation.created_at.to_rfc3339())
        .bind(conversation.updated_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        for (seq, message) in conversation.messages.iter().enumerate() {
            insert_message(&mut tx, &conversation.id, seq, message).await?;
        }

        tx.commit().await?;

        debug!(
            conversation_id = %conversation.id,
            messages = conversation.messages.len(),
            "Created conversation"
        );
        Ok(())
    }

    async fn get_conversation(&self, id: &str) -> StorageResult<Option<Conversation>> {
        let row: Option<ConversationRow> = sqlx::query_as(
            r#"
            SELECT id, title, context, metadata, created_at, updated_at
            FROM conversations
            WHERE id = ?
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let messages = self.fetch_messages(id).await?;
        let mut conversation: Conversation = row.into();
        conversation.messages = messages;
        Ok(Some(conversation))
    }

    async fn list_conversations(&self) -> StorageResult<Vec<ConversationSummary>> {
        let rows: Vec<ConversationRow> = sqlx::query_as(
            r#"
            SELECT id, title, context, metadata, created_at, updated_at
            FROM conversations
            ORDER BY updated_at DESC
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    async fn commit_turn(&self, conversation: &Conversation, appended: usize) -> StorageResult<()> {
        let metadata = serde_json::to_string(&conversation.metadata).unwrap_or_default();
        let first_new = conversation.messages.len() - appended;

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO conversations (id, title, context, metadata, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                context = excluded.context,
                metadata = excluded.metadata,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&conversation.id)
        .bind(&conversation.title)
        .bind(&conversation.context)
        .bind(&metadata)
        .bind(conversation.created_at.to_rfc3339())
        .bind(conversation.updated_at.to_rfc3339())
        .execute(&mut *tx)
        .await?;

        for (offset, message) in conversation.messages[first_new..].iter().enumerate() {
            insert_message(&mut tx, &conversation.id, first_new + offset, message).await?;
        }

        tx.commit().await?;

        debug!(
            conversation_id = %conversation.id,
            appended,
            total = conversation.messages.len(),
            "Committed turn"
        );
        Ok(())
    }

    async fn edit_message(
        &self,
        id: &str,
        index: usize,
        new_content: &str,
    ) -> StorageResult<Conversation> {
        let conversation = self
            .get_conversation(id)
            .await?
            .ok_or_else(|| StorageError::ConversationNotFound {
                conversation_id: id.to_string(),
            })?;

        let Some(target) = conversation.messages.get(index) else {
            return Err(StorageError::InvalidIndex {
                index,
                len: conversation.messages.len(),
            });
        };
        if target.role != MessageRole::Student {
            return Err(StorageError::InvalidRole {
                index,
                role: target.role.to_string(),
            });
        }

        let mut edited = target.clone();
        edited.apply_edit(new_content);
        let now = Utc::now();

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            UPDATE messages
            SET content = ?, timestamp = ?, edited = 1, original_content = ?
            WHERE conversation_id = ? AND seq = ?
            "#,
        )
        .bind(&edited.content)
        .bind(edited.timestamp.to_rfc3339())
        .bind(&edited.original_content)
        .bind(id)
        .bind(index as i64)
        .execute(&mut *tx)
        .await?;

        sqlx::query("DELETE FROM messages WHERE conversation_id = ? AND seq > ?")
            .bind(id)
            .bind(index as i64)
            .execute(&mut *tx)
            .await?;

        sqlx::query("UPDATE conversations SET updated_at = ? WHERE id = ?")
            .bind(now.to_rfc3339())
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        debug!(conversation_id = %id, index, "Edited message and truncated tail");

        let mut updated = conversation;
        updated.messages.truncate(index + 1);
        updated.messages[index] = edited;
        updated.updated_at = now;
        Ok(updated)
    }

    async fn update_title(&self, id: &str, title: &str) -> StorageResult<()> {
        let result = sqlx::query("UPDATE conversations SET title = ?, updated_at = ? WHERE id = ?")
            .bind(title)
            .bind(Utc::now().to_rfc3339())
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::ConversationNotFound {
                conversation_id: id.to_string(),
            });
        }

        Ok(())
    }

    async fn update_context(&self, id: &str, context: &str) -> StorageResult<()> {
        let result =
            sqlx::query("UPDATE conversations SET context = ?, updated_at = ? WHERE id = ?")
                .bind(context)
                .bind(Utc::now().to_rfc3339())
                .bind(id)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::ConversationNotFound {
                conversation_id: id.to_string(),
            });
        }

        Ok(())
    }

    async fn update_metadata(
        &self,
        id: &str,
        metadata: &ConversationMetadata,
    ) -> StorageResult<()> {
        let metadata_json = serde_json::to_string(metadata).unwrap_or_default();

        let result =
            sqlx::query("UPDATE conversations SET metadata = ?, updated_at = ? WHERE id = ?")
                .bind(&metadata_json)
                .bind(Utc::now().to_rfc3339())
                .bind(id)
                .execute(&self.pool)
                .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::ConversationNotFound {
                conversation_id: id.to_string(),
            });
        }

        Ok(())
    }

    async fn delete_conversation(&self, id: &str) -> StorageResult<()> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM messages WHERE conversation_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        let result = sqlx::query("DELETE FROM conversations WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        if result.rows_affected() == 0 {
            return Err(StorageError::ConversationNotFound {
                conversation_id: id.to_string(),
            });
        }

        tx.commit().await?;

        info!(conversation_id = %id, "Deleted conversation");
        Ok(())
    }
}

async fn insert_message(
    tx: &mut sqlx::Transaction<'_, sqlx::Sqlite>,
    conversation_id: &str,
    seq: usize,
    message: &StoredMessage,
) -> StorageResult<()> {
    sqlx::query(
        r#"
        INSERT INTO messages (conversation_id, seq, role, content, timestamp, edited, original_content)
        VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(conversation_id)
    .bind(seq as i64)
    .bind(message.role.as_str())
    .bind(&message.content)
    .bind(message.timestamp.to_rfc3339())
    .bind(message.edited)
    .bind(&message.original_content)
    .execute(&mut **tx)
    .await?;

    Ok(())
}

// Internal row types for SQLx mapping
#[derive(sqlx::FromRow)]
struct ConversationRow {
    id: String,
    title: String,
    context: String,
    metadata: String,
    created_at: String,
    updated_at: String,
}

impl ConversationRow {
    fn parse_metadata(&self) -> ConversationMetadata {
        serde_json::from_str(&self.metadata)
            .unwrap_or_else(|_| ConversationMetadata::new("gemini-direct"))
    }
}

impl From<ConversationRow> for Conversation {
    fn from(row: ConversationRow) -> Self {
        use chrono::DateTime;

        let metadata = row.parse_metadata();
        Self {
            id: row.id,
            title: row.title,
            context: row.context,
            messages: Vec::new(),
            metadata,
            created_at: DateTime::parse_from_rfc3339(&row.created_at)
                .map(|dt| dt.with_timezone(&chrono::Utc))
                .unwrap_or_else(|_| chrono::Utc::now()),
            updated_at: DateTime::parse_from_rfc3339(&row.updated_at)
                .map(|dt| dt.with_timezone(&chrono::Utc))
                .unwrap_or_else(|_| chrono::Utc::now()),
        }
    }
}

impl From<ConversationRow> for ConversationSummary {
    fn from(row: ConversationRow) -> Self {
        use chrono::DateTime;

        let metadata = row.parse_metadata();
        Self {
            id: row.id,
            title: row.title,
            metadata,
            created_at: DateTime::parse_from_rfc3339(&row.created_at)
                .map(|dt| dt.with_timezone(&chrono::Utc))
                .unwrap_or_else(|_| chrono::Utc::now()),
            updated_at: DateTime::parse_from_rfc3339(&row.updated_at)
                .map(|dt| dt.with_timezone(&chrono::Utc))
                .unwrap_or_else(|_| chrono::Utc::now()),
        }
    }
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    #[allow(dead_code)]
    seq: i64,
    role: String,
    content: String,
    timestamp: String,
    edited: bool,
    original_content: Option<String>,
}

impl From<MessageRow> for StoredMessage {
    fn from(row: MessageRow) -> Self {
        use chrono::DateTime;

        Self {
            role: row.role.parse().unwrap_or(MessageRole::Student),
            content: row.content,
            timestamp: DateTime::parse_from_rfc3339(&row.timestamp)
                .map(|dt| dt.with_timezone(&chrono::Utc))
                .unwrap_or_else(|_| chrono::Utc::now()),
            edited: row.edited,
            original_content: row.original_content,
        }
    }
}
