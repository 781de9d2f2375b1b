//! Authentication middleware and extractors.
//!
//! Provides extractors for requiring a logged-in user or an admin in route
//! handlers, plus helpers for the session-scoped guest grants.

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;

use emporium_core::{ConversationId, OrderId, UserRole};

use crate::db::UserRepository;
use crate::error::AppError;
use crate::models::session::keys;
use crate::models::{CurrentUser, PlacedOrders, SessionConversations};
use crate::state::AppState;

/// Extractor that requires a logged-in user.
///
/// Rejects with `401` when there is no user in the session.
pub struct RequireAuth(pub CurrentUser);

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = session_from_parts(parts)?;

        let user: CurrentUser = session
            .get(keys::CURRENT_USER)
            .await
            .ok()
            .flatten()
            .ok_or_else(|| AppError::Unauthorized("Login required".to_string()))?;

        Ok(Self(user))
    }
}

/// Extractor that optionally gets the current user.
///
/// Unlike `RequireAuth`, this does not reject the request if nobody is logged in.
pub struct OptionalAuth(pub Option<CurrentUser>);

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let user = match parts.extensions.get::<Session>() {
            Some(session) => session
                .get::<CurrentUser>(keys::CURRENT_USER)
                .await
                .ok()
                .flatten(),
            None => None,
        };

        Ok(Self(user))
    }
}

/// Extractor that requires a logged-in admin.
///
/// The role is re-read from the database so a demotion takes effect without
/// waiting for the session to expire. Rejects with `401` when nobody is
/// logged in and `403` for non-admins.
pub struct RequireAdmin(pub CurrentUser);

impl FromRequestParts<AppState> for RequireAdmin {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let RequireAuth(user) = RequireAuth::from_request_parts(parts, state).await?;

        let role = UserRepository::new(state.pool())
            .get_by_id(user.id)
            .await?
            .map(|u| u.role);

        match role {
            Some(UserRole::Admin) => Ok(Self(CurrentUser {
                role: UserRole::Admin,
                ..user
            })),
            Some(UserRole::Customer) => {
                Err(AppError::Forbidden("Admin access required".to_string()))
            }
            None => Err(AppError::Unauthorized("Login required".to_string())),
        }
    }
}

fn session_from_parts(parts: &Parts) -> Result<&Session, AppError> {
    parts
        .extensions
        .get::<Session>()
        .ok_or_else(|| AppError::Internal("session layer missing".to_string()))
}

/// Store the logged-in user, rotating the session id.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_user(
    session: &Session,
    user: &CurrentUser,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session.insert(keys::CURRENT_USER, user).await
}

/// Log out: drop the whole session, guest grants included.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_user(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session.flush().await
}

/// Orders this session placed.
pub async fn placed_orders(session: &Session) -> PlacedOrders {
    session
        .get(keys::PLACED_ORDERS)
        .await
        .ok()
        .flatten()
        .unwrap_or_default()
}

/// Allow this session to read `order_id` without logging in.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn grant_order(
    session: &Session,
    order_id: OrderId,
) -> Result<(), tower_sessions::session::Error> {
    let mut grants = placed_orders(session).await;
    grants.grant(order_id);
    session.insert(keys::PLACED_ORDERS, grants).await
}

/// Conversations this session opened.
pub async fn session_conversations(session: &Session) -> SessionConversations {
    session
        .get(keys::CONVERSATIONS)
        .await
        .ok()
        .flatten()
        .unwrap_or_default()
}

/// Allow this session to read and post to `conversation_id`.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn grant_conversation(
    session: &Session,
    conversation_id: ConversationId,
) -> Result<(), tower_sessions::session::Error> {
    let mut grants = session_conversations(session).await;
    grants.grant(conversation_id);
    session.insert(keys::CONVERSATIONS, grants).await
}
