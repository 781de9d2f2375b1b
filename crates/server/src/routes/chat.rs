//! Customer side of support chat and Pusher channel authorization.

use axum::{
    Form, Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use tower_sessions::Session;
use tracing::instrument;

use emporium_core::{ChatSender, ConversationId};

use crate::error::{AppError, Result};
use crate::middleware::{OptionalAuth, grant_conversation, session_conversations};
use crate::models::{ChatMessage, Conversation, CurrentUser};
use crate::services::chat::ChatError;
use crate::services::realtime::{ADMIN_CHANNEL, ChannelAuth};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct StartConversationRequest {
    pub name: String,
    pub email: String,
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub struct PostMessageRequest {
    pub body: String,
}

/// Body Pusher JS posts to the channel auth endpoint.
#[derive(Debug, Deserialize)]
pub struct ChannelAuthRequest {
    pub socket_id: String,
    pub channel_name: String,
}

/// A conversation with its messages and where to listen for more.
#[derive(Debug, Serialize)]
pub struct ConversationView {
    pub conversation: Conversation,
    pub messages: Vec<ChatMessage>,
    pub channel: String,
    /// Pusher app key; absent when realtime is not configured.
    pub pusher_key: Option<String>,
}

impl ConversationView {
    pub(crate) fn new(
        state: &AppState,
        conversation: Conversation,
        messages: Vec<ChatMessage>,
    ) -> Self {
        Self {
            channel: conversation.channel(),
            conversation,
            messages,
            pusher_key: state.pusher().map(|p| p.key().to_string()),
        }
    }
}

/// Whether the requester may read and post to `conversation`.
async fn may_access(
    user: Option<&CurrentUser>,
    session: &Session,
    conversation: &Conversation,
) -> bool {
    if let Some(user) = user
        && (user.is_admin() || conversation.user_id == Some(user.id))
    {
        return true;
    }
    session_conversations(session)
        .await
        .contains(conversation.id)
}

/// Load a conversation the requester may access. Others are reported missing.
async fn accessible_conversation(
    state: &AppState,
    user: Option<&CurrentUser>,
    session: &Session,
    id: ConversationId,
) -> Result<Conversation> {
    let conversation = state.chat().conversation(id).await?;
    if may_access(user, session, &conversation).await {
        Ok(conversation)
    } else {
        Err(ChatError::ConversationNotFound.into())
    }
}

/// Open a conversation with a first message.
#[instrument(skip_all)]
pub async fn start_conversation(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    session: Session,
    Json(body): Json<StartConversationRequest>,
) -> Result<impl IntoResponse> {
    let (conversation, message) = state
        .chat()
        .start(user.map(|u| u.id), &body.name, &body.email, &body.message)
        .await?;

    grant_conversation(&session, conversation.id).await?;

    Ok((
        StatusCode::CREATED,
        Json(ConversationView::new(&state, conversation, vec![message])),
    ))
}

/// Messages of a conversation, oldest first.
pub async fn list_messages(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    session: Session,
    Path(id): Path<ConversationId>,
) -> Result<Json<ConversationView>> {
    let conversation = accessible_conversation(&state, user.as_ref(), &session, id).await?;
    let messages = state.chat().messages(id).await?;
    Ok(Json(ConversationView::new(&state, conversation, messages)))
}

/// Post a customer message.
#[instrument(skip(state, user, session, body))]
pub async fn post_message(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    session: Session,
    Path(id): Path<ConversationId>,
    Json(body): Json<PostMessageRequest>,
) -> Result<impl IntoResponse> {
    accessible_conversation(&state, user.as_ref(), &session, id).await?;
    let message = state
        .chat()
        .post(id, ChatSender::Customer, &body.body)
        .await?;
    Ok((StatusCode::CREATED, Json(message)))
}

/// Authorize a Pusher private-channel subscription.
///
/// `private-admin-chat` is for admins only; `private-chat-{id}` for whoever
/// may access conversation `id`.
#[instrument(skip_all, fields(channel = %body.channel_name))]
pub async fn authorize_channel(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    session: Session,
    Form(body): Form<ChannelAuthRequest>,
) -> Result<Json<ChannelAuth>> {
    let pusher = state
        .pusher()
        .ok_or_else(|| AppError::ServiceUnavailable("Realtime chat".to_string()))?;

    let allowed = if body.channel_name == ADMIN_CHANNEL {
        user.as_ref().is_some_and(CurrentUser::is_admin)
    } else if let Some(id) = conversation_id_from_channel(&body.channel_name) {
        match state.chat().conversation(id).await {
            Ok(conversation) => may_access(user.as_ref(), &session, &conversation).await,
            Err(ChatError::ConversationNotFound) => false,
            Err(e) => return Err(e.into()),
        }
    } else {
        false
    };

    if !allowed {
        return Err(AppError::Forbidden(
            "Not allowed to subscribe to this channel".to_string(),
        ));
    }

    let auth = pusher
        .authorize_channel(&body.socket_id, &body.channel_name)
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    Ok(Json(auth))
}

/// Parse `private-chat-{id}`.
fn conversation_id_from_channel(channel: &str) -> Option<ConversationId> {
    channel
        .strip_prefix("private-chat-")
        .and_then(|id| id.parse::<i32>().ok())
        .filter(|id| *id > 0)
        .map(ConversationId::new)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversation_id_from_channel() {
        assert_eq!(
            conversation_id_from_channel("private-chat-42"),
            Some(ConversationId::new(42))
        );
        assert_eq!(conversation_id_from_channel("private-chat-"), None);
        assert_eq!(conversation_id_from_channel("private-chat--1"), None);
        assert_eq!(conversation_id_from_channel("private-admin-chat"), None);
        assert_eq!(conversation_id_from_channel("presence-chat-1"), None);
    }
}
