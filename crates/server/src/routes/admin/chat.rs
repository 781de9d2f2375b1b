//! Staff side of support chat.

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;

use emporium_core::{ChatSender, ConversationId, ConversationStatus};

use crate::db::ChatRepository;
use crate::error::Result;
use crate::middleware::RequireAdmin;
use crate::models::Conversation;
use crate::routes::chat::{ConversationView, PostMessageRequest};
use crate::state::AppState;

#[derive(Debug, Default, Deserialize)]
pub struct ConversationListQuery {
    pub status: Option<ConversationStatus>,
}

/// Conversations, most recently active first.
pub async fn list(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Query(query): Query<ConversationListQuery>,
) -> Result<Json<Vec<Conversation>>> {
    let conversations = ChatRepository::new(state.pool())
        .list_conversations(query.status)
        .await?;
    Ok(Json(conversations))
}

pub async fn show(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<ConversationId>,
) -> Result<Json<ConversationView>> {
    let chat = state.chat();
    let conversation = chat.conversation(id).await?;
    let messages = chat.messages(id).await?;
    Ok(Json(ConversationView::new(&state, conversation, messages)))
}

/// Reply as an agent.
pub async fn reply(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<ConversationId>,
    Json(body): Json<PostMessageRequest>,
) -> Result<impl IntoResponse> {
    let message = state.chat().post(id, ChatSender::Agent, &body.body).await?;
    Ok((StatusCode::CREATED, Json(message)))
}

pub async fn close(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<ConversationId>,
) -> Result<Json<Conversation>> {
    let conversation = state.chat().close(id).await?;
    Ok(Json(conversation))
}
