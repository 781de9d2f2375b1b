//! Admin category management.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};

use emporium_core::CategoryId;

use crate::db::CategoryRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::{Category, CategoryInput};
use crate::state::AppState;

pub async fn list(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<Vec<Category>>> {
    let categories = CategoryRepository::new(state.pool()).list().await?;
    Ok(Json(categories))
}

pub async fn create(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Json(input): Json<CategoryInput>,
) -> Result<impl IntoResponse> {
    let slug = input.validate().map_err(AppError::BadRequest)?;
    let category = CategoryRepository::new(state.pool())
        .create(&input.name, &slug, input.description.as_deref())
        .await?;

    state.catalog().invalidate();
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn update(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<CategoryId>,
    Json(input): Json<CategoryInput>,
) -> Result<Json<Category>> {
    let slug = input.validate().map_err(AppError::BadRequest)?;
    let category = CategoryRepository::new(state.pool())
        .update(id, &input.name, &slug, input.description.as_deref())
        .await?;

    state.catalog().invalidate();
    Ok(Json(category))
}

/// Delete a category; its products become uncategorized.
pub async fn delete(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<CategoryId>,
) -> Result<StatusCode> {
    CategoryRepository::new(state.pool()).delete(id).await?;

    state.catalog().invalidate();
    Ok(StatusCode::NO_CONTENT)
}
