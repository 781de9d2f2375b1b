//! Admin catalog management and image uploads.

use axum::{
    Json,
    extract::{Multipart, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use emporium_core::ProductId;

use crate::db::{Page, ProductRepository};
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::{Product, ProductInput};
use crate::routes::orders::PageQuery;
use crate::services::storage::{ALLOWED_IMAGE_TYPES, MAX_UPLOAD_BYTES, object_key_for};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SetActiveRequest {
    pub active: bool,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub url: String,
}

/// An image read from a multipart body.
struct ImageUpload {
    file_name: String,
    content_type: String,
    bytes: Vec<u8>,
}

/// All products, including inactive ones.
pub async fn list(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Query(query): Query<PageQuery>,
) -> Result<Json<Vec<Product>>> {
    let products = ProductRepository::new(state.pool())
        .list_all(Page::new(query.page, query.per_page))
        .await?;
    Ok(Json(products))
}

#[instrument(skip(admin, state, input), fields(admin_id = %admin.id))]
pub async fn create(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Json(input): Json<ProductInput>,
) -> Result<impl IntoResponse> {
    let slug = input.validate().map_err(AppError::BadRequest)?;
    let product = ProductRepository::new(state.pool())
        .create(&input, &slug)
        .await?;

    state.catalog().invalidate();
    info!(product_id = %product.id, "Product created");
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn show(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<Json<Product>> {
    let product = ProductRepository::new(state.pool())
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))?;
    Ok(Json(product))
}

#[instrument(skip(admin, state, input), fields(admin_id = %admin.id))]
pub async fn update(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    Json(input): Json<ProductInput>,
) -> Result<Json<Product>> {
    let slug = input.validate().map_err(AppError::BadRequest)?;
    let product = ProductRepository::new(state.pool())
        .update(id, &input, &slug)
        .await?;

    state.catalog().invalidate();
    Ok(Json(product))
}

#[instrument(skip(admin, state), fields(admin_id = %admin.id))]
pub async fn delete(
    RequireAdmin(admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<StatusCode> {
    ProductRepository::new(state.pool()).delete(id).await?;

    state.catalog().invalidate();
    info!(product_id = %id, "Product deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// Show or hide a product on the storefront.
pub async fn set_active(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    Json(body): Json<SetActiveRequest>,
) -> Result<Json<Product>> {
    let product = ProductRepository::new(state.pool())
        .set_active(id, body.active)
        .await?;

    state.catalog().invalidate();
    Ok(Json(product))
}

/// Upload an image and append its URL to the product's gallery.
#[instrument(skip(_admin, state, multipart))]
pub async fn upload_image(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    multipart: Multipart,
) -> Result<Json<Product>> {
    let products = ProductRepository::new(state.pool());
    if products.get_by_id(id).await?.is_none() {
        return Err(AppError::NotFound("Product".to_string()));
    }

    let url = store_image(&state, multipart).await?;
    let product = products.add_image(id, &url).await?;

    state.catalog().invalidate();
    Ok(Json(product))
}

/// Upload an image and return its public URL.
#[instrument(skip(_admin, state, multipart))]
pub async fn upload(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<impl IntoResponse> {
    let url = store_image(&state, multipart).await?;
    Ok((StatusCode::CREATED, Json(UploadResponse { url })))
}

async fn store_image(state: &AppState, multipart: Multipart) -> Result<String> {
    let storage = state
        .storage()
        .ok_or_else(|| AppError::ServiceUnavailable("Object storage".to_string()))?;

    let image = read_image(multipart).await?;
    let key = object_key_for(&image.file_name);
    let url = storage
        .put_object(&key, image.bytes, &image.content_type)
        .await?;

    info!(key = %key, "Image uploaded");
    Ok(url)
}

/// Read the `file` field of a multipart body.
async fn read_image(mut multipart: Multipart) -> Result<ImageUpload> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::BadRequest(e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }

        let file_name = field.file_name().unwrap_or("upload").to_string();
        let content_type = field
            .content_type()
            .unwrap_or_default()
            .to_ascii_lowercase();
        check_image_type(&content_type)?;

        let bytes = field
            .bytes()
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;
        check_image_size(bytes.len())?;

        return Ok(ImageUpload {
            file_name,
            content_type,
            bytes: bytes.to_vec(),
        });
    }

    Err(AppError::BadRequest("missing `file` field".to_string()))
}

fn check_image_type(content_type: &str) -> Result<()> {
    if ALLOWED_IMAGE_TYPES.contains(&content_type) {
        Ok(())
    } else {
        Err(AppError::BadRequest(format!(
            "unsupported image type; expected one of {}",
            ALLOWED_IMAGE_TYPES.join(", ")
        )))
    }
}

fn check_image_size(len: usize) -> Result<()> {
    if len == 0 {
        return Err(AppError::BadRequest("file is empty".to_string()));
    }
    if len > MAX_UPLOAD_BYTES {
        return Err(AppError::BadRequest(format!(
            "file exceeds {} MB",
            MAX_UPLOAD_BYTES / (1024 * 1024)
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_type_allowlist() {
        assert!(check_image_type("image/png").is_ok());
        assert!(check_image_type("image/webp").is_ok());
        assert!(check_image_type("image/svg+xml").is_err());
        assert!(check_image_type("").is_err());
    }

    #[test]
    fn test_image_size_limits() {
        assert!(check_image_size(0).is_err());
        assert!(check_image_size(1).is_ok());
        assert!(check_image_size(MAX_UPLOAD_BYTES).is_ok());
        assert!(check_image_size(MAX_UPLOAD_BYTES + 1).is_err());
    }
}
