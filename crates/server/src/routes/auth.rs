//! Account route handlers: registration, login and password reset.

use axum::{
    Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use tower_sessions::Session;
use tracing::{info, instrument, warn};

use crate::error::{AppError, Result, add_breadcrumb, clear_sentry_user, set_sentry_user};
use crate::middleware::{RequireAuth, clear_current_user, set_current_user};
use crate::models::{CurrentUser, User};
use crate::state::AppState;

/// Registration request body.
#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub email: String,
    pub name: String,
    pub password: String,
}

/// Login request body.
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Deserialize)]
pub struct ResetPasswordRequest {
    pub token: String,
    pub password: String,
}

async fn start_session(session: &Session, user: &User) -> Result<()> {
    set_current_user(session, &CurrentUser::from(user)).await?;
    set_sentry_user(&user.id, Some(user.email.as_str()));
    Ok(())
}

/// Create a customer account and log it in.
#[instrument(skip(state, session, body), fields(email = %body.email))]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<RegisterRequest>,
) -> Result<impl IntoResponse> {
    let user = state
        .auth()
        .register(&body.email, &body.name, &body.password)
        .await?;

    start_session(&session, &user).await?;
    info!(user_id = %user.id, "Customer registered");

    Ok((StatusCode::CREATED, Json(user)))
}

/// Log in with email and password.
#[instrument(skip(state, session, body), fields(email = %body.email))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<LoginRequest>,
) -> Result<Json<User>> {
    let user = state.auth().login(&body.email, &body.password).await?;

    start_session(&session, &user).await?;
    add_breadcrumb("auth", "User logged in", None);

    Ok(Json(user))
}

/// Log out and discard the session.
pub async fn logout(session: Session) -> Result<StatusCode> {
    clear_current_user(&session).await?;
    clear_sentry_user();
    Ok(StatusCode::NO_CONTENT)
}

/// The logged-in user, fresh from the database.
pub async fn me(
    State(state): State<AppState>,
    RequireAuth(current): RequireAuth,
) -> Result<Json<User>> {
    let user = state.auth().get_user(current.id).await?;
    Ok(Json(user))
}

/// Email a password reset link.
///
/// Always answers 200 so the endpoint does not reveal which emails have accounts.
#[instrument(skip(state, body))]
pub async fn forgot_password(
    State(state): State<AppState>,
    Json(body): Json<ForgotPasswordRequest>,
) -> Result<impl IntoResponse> {
    let response = Json(json!({
        "message": "If an account exists for that address, a reset link is on its way."
    }));

    let Some(email) = state.email() else {
        warn!("Password reset requested but email is not configured");
        return Ok(response);
    };

    if let Some((user, token)) = state.auth().request_password_reset(&body.email).await?
        && let Err(e) = email
            .send_password_reset(user.email.as_str(), &user.name, &token)
            .await
    {
        tracing::error!(user_id = %user.id, error = %e, "Failed to send password reset email");
    }

    Ok(response)
}

/// Consume a reset token and set a new password.
#[instrument(skip(state, session, body))]
pub async fn reset_password(
    State(state): State<AppState>,
    session: Session,
    Json(body): Json<ResetPasswordRequest>,
) -> Result<impl IntoResponse> {
    if body.token.trim().is_empty() {
        return Err(AppError::BadRequest("token is required".to_string()));
    }

    let user = state
        .auth()
        .reset_password(body.token.trim(), &body.password)
        .await?;

    // Any session that was logged in before the reset must log in again
    clear_current_user(&session).await?;
    info!(user_id = %user.id, "Password reset");

    Ok(Json(json!({ "message": "Password updated. You can now log in." })))
}
