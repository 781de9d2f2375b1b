//! Admin user management.

use axum::{
    Json,
    extract::{Path, Query, State},
};
use serde::Deserialize;
use tracing::{info, instrument};

use emporium_core::{UserId, UserRole};

use crate::db::{Page, UserRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::User;
use crate::routes::orders::PageQuery;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SetRoleRequest {
    pub role: UserRole,
}

pub async fn list(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<User>>> {
    let users = UserRepository::new(state.pool())
        .list(Page::new(query.page, query.per_page))
        .await?;
    Ok(Json(users))
}

/// Promote or demote a user.
///
/// Admins cannot demote themselves, so the store always keeps one admin.
#[instrument(skip(admin, state), fields(admin_id = %admin.id))]
pub async fn set_role(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<UserId>,
    Json(body): Json<SetRoleRequest>,
) -> Result<Json<User>> {
    if id == admin.id && body.role != UserRole::Admin {
        return Err(AppError::Conflict("You cannot remove your own admin role".to_string()));
    }

    let user = UserRepository::new(state.pool())
        .set_role(id, body.role)
        .await?;

    info!(user_id = %id, role = %body.role, "User role changed");
    Ok(Json(user))
}
