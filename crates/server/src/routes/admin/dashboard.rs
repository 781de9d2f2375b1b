//! Admin dashboard figures.

use axum::{Json, extract::State};

use crate::db::OrderRepository;
use crate::error::Result;
use crate::middleware::RequireAdmin;
use crate::models::OrderStats;
use crate::state::AppState;

/// Order counts by status, paid revenue and product counts.
pub async fn stats(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<OrderStats>> {
    let stats = OrderRepository::new(state.pool()).stats().await?;
    Ok(Json(stats))
}
