use serde::Serialize;
use serde_json::{json, Value};
use tracing::info;

use super::SharedState;
use crate::error::{AppError, AppResult, RpcError, StorageError};
use crate::store::{Conversation, ConversationMetadata, ForkStagePolicy, Storage};

/// Route a JSON-RPC method call to its handler
pub async fn handle_method(
    state: &SharedState,
    method: &str,
    params: Option<Value>,
) -> AppResult<Value> {
    info!(method = %method, "Routing method call");

    match method {
        "chat.send" => handle_chat_send(state, params).await,
        "chat.continue" => handle_chat_continue(state, params).await,
        "chat.edit" => handle_chat_edit(state, params).await,
        "conversation.create" => handle_conversation_create(state, params).await,
        "conversation.list" => handle_conversation_list(state).await,
        "conversation.get" => handle_conversation_get(state, params).await,
        "conversation.fork" => handle_conversation_fork(state, params).await,
        "conversation.update" => handle_conversation_update(state, params).await,
        "conversation.delete" => handle_conversation_delete(state, params).await,
        "conversation.generate_title" => handle_generate_title(state, params).await,
        _ => Err(RpcError::UnknownMethod {
            method: method.to_string(),
        }
        .into()),
    }
}

/// Handle chat.send
async fn handle_chat_send(state: &SharedState, params: Option<Value>) -> AppResult<Value> {
    #[derive(serde::Deserialize)]
    struct SendParams {
        conversation_id: Option<String>,
        message: String,
        service_id: Option<String>,
        context: Option<String>,
    }

    let params: SendParams = parse_params("chat.send", params)?;

    let turn = state
        .engine
        .chat(crate::tutor::ChatParams {
            conversation_id: params.conversation_id,
            message: params.message,
            service_id: params.service_id,
            context: params.context,
        })
        .await?;

    to_value(turn)
}

/// Handle chat.continue - regenerate a reply from a message prefix
async fn handle_chat_continue(state: &SharedState, params: Option<Value>) -> AppResult<Value> {
    #[derive(serde::Deserialize)]
    struct ContinueParams {
        conversation_id: String,
        message_index: Option<usize>,
        service_id: Option<String>,
    }

    let params: ContinueParams = parse_params("chat.continue", params)?;

    let turn = state
        .engine
        .continue_conversation(
            &params.conversation_id,
            params.message_index,
            params.service_id.as_deref(),
        )
        .await?;

    to_value(turn)
}

/// Handle chat.edit - edit a student message and regenerate from it
async fn handle_chat_edit(state: &SharedState, params: Option<Value>) -> AppResult<Value> {
    #[derive(serde::Deserialize)]
    struct EditParams {
        conversation_id: String,
        message_index: usize,
        new_content: String,
        service_id: Option<String>,
    }

    let params: EditParams = parse_params("chat.edit", params)?;

    let turn = state
        .engine
        .edit_message(
            &params.conversation_id,
            params.message_index,
            &params.new_content,
            params.service_id.as_deref(),
        )
        .await?;

    to_value(turn)
}

/// Handle conversation.create - explicit creation with an empty message list
async fn handle_conversation_create(state: &SharedState, params: Option<Value>) -> AppResult<Value> {
    #[derive(serde::Deserialize)]
    struct CreateParams {
        title: Option<String>,
        service_id: Option<String>,
        context: Option<String>,
    }

    let params: CreateParams = parse_params("conversation.create", params)?;

    let service_id = params
        .service_id
        .unwrap_or_else(|| state.config.tutor.default_service.clone());
    crate::tutor::ServiceId::parse(&service_id)?;

    let mut conversation = Conversation::new(
        params.title.unwrap_or_else(|| "New Conversation".to_string()),
        ConversationMetadata::new(service_id),
    );
    if let Some(context) = params.context {
        conversation.context = context;
    }

    state.storage.create_conversation(&conversation).await?;
    to_value(conversation)
}

/// Handle conversation.list
async fn handle_conversation_list(state: &SharedState) -> AppResult<Value> {
    let summaries = state.storage.list_conversations().await?;
    to_value(summaries)
}

/// Handle conversation.get
async fn handle_conversation_get(state: &SharedState, params: Option<Value>) -> AppResult<Value> {
    #[derive(serde::Deserialize)]
    struct GetParams {
        conversation_id: String,
    }

    let params: GetParams = parse_params("conversation.get", params)?;

    let conversation = state
        .storage
        .get_conversation(&params.conversation_id)
        .await?
        .ok_or_else(|| StorageError::ConversationNotFound {
            conversation_id: params.conversation_id.clone(),
        })?;

    to_value(conversation)
}

/// Handle conversation.fork
async fn handle_conversation_fork(state: &SharedState, params: Option<Value>) -> AppResult<Value> {
    #[derive(serde::Deserialize)]
    struct ForkParams {
        conversation_id: String,
        message_index: usize,
        stage_policy: Option<ForkStagePolicy>,
    }

    let params: ForkParams = parse_params("conversation.fork", params)?;

    let fork = state
        .engine
        .fork(
            &params.conversation_id,
            params.message_index,
            params.stage_policy,
        )
        .await?;

    to_value(fork)
}

/// Handle conversation.update - rename, replace context, or patch metadata
async fn handle_conversation_update(state: &SharedState, params: Option<Value>) -> AppResult<Value> {
    #[derive(serde::Deserialize)]
    struct UpdateParams {
        conversation_id: String,
        title: Option<String>,
        context: Option<String>,
        metadata: Option<MetadataPatch>,
    }

    #[derive(serde::Deserialize)]
    struct MetadataPatch {
        llm_service: Option<String>,
        subject: Option<String>,
        tags: Option<Vec<String>>,
    }

    let params: UpdateParams = parse_params("conversation.update", params)?;
    let id = &params.conversation_id;

    if let Some(title) = &params.title {
        state.storage.update_title(id, title).await?;
    }
    if let Some(context) = &params.context {
        state.storage.update_context(id, context).await?;
    }
    if let Some(patch) = params.metadata {
        let conversation =
            state
                .storage
                .get_conversation(id)
                .await?
                .ok_or_else(|| StorageError::ConversationNotFound {
                    conversation_id: id.clone(),
                })?;

        // Shallow merge into a copy so partial patches keep existing fields
        let mut metadata = conversation.metadata.clone();
        if let Some(llm_service) = patch.llm_service {
            crate::tutor::ServiceId::parse(&llm_service)?;
            metadata.llm_service = llm_service;
        }
        if let Some(subject) = patch.subject {
            metadata.subject = Some(subject);
        }
        if let Some(tags) = patch.tags {
            metadata.tags = tags;
        }
        state.storage.update_metadata(id, &metadata).await?;
    }

    let conversation =
        state
            .storage
            .get_conversation(id)
            .await?
            .ok_or_else(|| StorageError::ConversationNotFound {
                conversation_id: id.clone(),
            })?;
    to_value(conversation)
}

/// Handle conversation.delete
async fn handle_conversation_delete(state: &SharedState, params: Option<Value>) -> AppResult<Value> {
    #[derive(serde::Deserialize)]
    struct DeleteParams {
        conversation_id: String,
    }

    let params: DeleteParams = parse_params("conversation.delete", params)?;
    state
        .storage
        .delete_conversation(&params.conversation_id)
        .await?;

    Ok(json!({ "deleted": true, "conversation_id": params.conversation_id }))
}

/// Handle conversation.generate_title - model-written title for an opening
/// message, with a deterministic truncation fallback
async fn handle_generate_title(state: &SharedState, params: Option<Value>) -> AppResult<Value> {
    #[derive(serde::Deserialize)]
    struct TitleParams {
        message: String,
        service_id: Option<String>,
    }

    let params: TitleParams = parse_params("conversation.generate_title", params)?;
    let title = state
        .engine
        .generate_title(params.service_id.as_deref(), &params.message)
        .await;

    Ok(json!({ "title": title }))
}

/// Parse typed parameters out of a JSON-RPC params value
fn parse_params<T: serde::de::DeserializeOwned>(
    method: &str,
    params: Option<Value>,
) -> AppResult<T> {
    match params {
        Some(params) => serde_json::from_value(params).map_err(|e| {
            RpcError::InvalidParameters {
                method: method.to_string(),
                message: e.to_string(),
            }
            .into()
        }),
        None => Err(RpcError::InvalidParameters {
            method: method.to_string(),
            message: "Missing parameters".to_string(),
        }
        .into()),
    }
}

fn to_value<T: Serialize>(value: T) -> AppResult<Value> {
    serde_json::to_value(value).map_err(|e| AppError::Rpc(RpcError::Json(e)))
}
