//! Storefront coupon check.

use axum::{Json, extract::State};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::db::CouponRepository;
use crate::error::Result;
use crate::services::coupons::{CouponRejection, validate_coupon};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct ValidateCouponRequest {
    pub code: String,
    pub subtotal: Decimal,
}

/// Outcome of a coupon check. A rejected coupon is still a 200.
#[derive(Debug, Serialize)]
pub struct ValidateCouponResponse {
    pub valid: bool,
    pub code: Option<String>,
    pub discount: Decimal,
    pub reason: Option<String>,
}

impl ValidateCouponResponse {
    fn rejected(reason: &CouponRejection) -> Self {
        Self {
            valid: false,
            code: None,
            discount: Decimal::ZERO,
            reason: Some(reason.to_string()),
        }
    }
}

/// Preview the discount a code gives on `subtotal`.
pub async fn validate(
    State(state): State<AppState>,
    Json(body): Json<ValidateCouponRequest>,
) -> Result<Json<ValidateCouponResponse>> {
    let Some(coupon) = CouponRepository::new(state.pool())
        .get_by_code(&body.code)
        .await?
    else {
        return Ok(Json(ValidateCouponResponse::rejected(
            &CouponRejection::NotFound,
        )));
    };

    let response = match validate_coupon(&coupon, body.subtotal, Utc::now()) {
        Ok(discount) => ValidateCouponResponse {
            valid: true,
            code: Some(coupon.code),
            discount,
            reason: None,
        },
        Err(rejection) => ValidateCouponResponse::rejected(&rejection),
    };

    Ok(Json(response))
}
