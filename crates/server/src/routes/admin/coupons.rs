//! Admin coupon management.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;

use emporium_core::CouponId;

use crate::db::CouponRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::{Coupon, CouponInput};
use crate::state::AppState;

pub async fn list(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
) -> Result<Json<Vec<Coupon>>> {
    let coupons = CouponRepository::new(state.pool()).list().await?;
    Ok(Json(coupons))
}

/// Create a coupon; the code is stored uppercase.
pub async fn create(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Json(input): Json<CouponInput>,
) -> Result<impl IntoResponse> {
    let code = input.validate().map_err(AppError::BadRequest)?;
    let coupon = CouponRepository::new(state.pool())
        .create(&code, &input)
        .await?;

    info!(coupon_id = %coupon.id, admin_id = %admin.id, "Coupon created");
    Ok((StatusCode::CREATED, Json(coupon)))
}

pub async fn update(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<CouponId>,
    Json(input): Json<CouponInput>,
) -> Result<Json<Coupon>> {
    let code = input.validate().map_err(AppError::BadRequest)?;
    let coupon = CouponRepository::new(state.pool())
        .update(id, &code, &input)
        .await?;
    Ok(Json(coupon))
}

pub async fn delete(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<CouponId>,
) -> Result<StatusCode> {
    CouponRepository::new(state.pool()).delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
