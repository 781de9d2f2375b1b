//! One-shot bulk maintenance tasks.
//!
//! Each task runs to completion and logs how many rows it changed.

use std::path::Path;

use emporium_server::db::{
    CategoryRepository, CouponRepository, PasswordResetRepository, ProductRepository,
    RepositoryError,
};
use emporium_server::models::SeedCategory;
use thiserror::Error;

use super::{ConnectError, connect};

#[derive(Debug, Error)]
pub enum MaintenanceError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Could not read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Invalid category file: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Category file is empty")]
    EmptyFile,
}

/// Activate every inactive product.
pub async fn activate_products() -> Result<(), MaintenanceError> {
    let pool = connect().await?;
    let activated = ProductRepository::new(&pool).activate_all_inactive().await?;
    tracing::info!(activated, "Inactive products activated");
    Ok(())
}

/// Rewrite coupon codes in uppercase.
pub async fn uppercase_coupons() -> Result<(), MaintenanceError> {
    let pool = connect().await?;
    let changed = CouponRepository::new(&pool).uppercase_all_codes().await?;
    tracing::info!(changed, "Coupon codes uppercased");
    Ok(())
}

/// Insert starter categories from `file`, or the built-in list.
pub async fn seed_categories(file: Option<&str>) -> Result<(), MaintenanceError> {
    let seeds = match file {
        Some(path) => load_seed_file(Path::new(path)).await?,
        None => SeedCategory::defaults(),
    };

    let pool = connect().await?;
    let inserted = CategoryRepository::new(&pool).seed_defaults(&seeds).await?;
    tracing::info!(
        inserted,
        skipped = (seeds.len() as u64).saturating_sub(inserted),
        "Categories seeded"
    );
    Ok(())
}

/// Delete expired password reset tokens.
pub async fn purge_reset_tokens() -> Result<(), MaintenanceError> {
    let pool = connect().await?;
    let deleted = PasswordResetRepository::new(&pool).delete_expired().await?;
    tracing::info!(deleted, "Expired reset tokens purged");
    Ok(())
}

async fn load_seed_file(path: &Path) -> Result<Vec<SeedCategory>, MaintenanceError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| MaintenanceError::Read {
            path: path.display().to_string(),
            source,
        })?;
    parse_seed_file(&content)
}

fn parse_seed_file(content: &str) -> Result<Vec<SeedCategory>, MaintenanceError> {
    let seeds: Vec<SeedCategory> = serde_yaml::from_str(content)?;
    if seeds.is_empty() {
        return Err(MaintenanceError::EmptyFile);
    }
    Ok(seeds)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_seed_file() {
        let yaml = "- name: Posters\n  description: Wall art\n- name: Pins\n";
        let seeds = parse_seed_file(yaml).unwrap();
        let names: Vec<&str> = seeds.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, ["Posters", "Pins"]);
        assert_eq!(seeds.first().unwrap().description.as_deref(), Some("Wall art"));
        assert!(seeds.last().unwrap().description.is_none());
    }

    #[test]
    fn test_parse_seed_file_rejects_empty_list() {
        assert!(matches!(
            parse_seed_file("[]"),
            Err(MaintenanceError::EmptyFile)
        ));
    }

    #[test]
    fn test_parse_seed_file_rejects_bad_yaml() {
        assert!(matches!(
            parse_seed_file("name: [unclosed"),
            Err(MaintenanceError::Yaml(_))
        ));
    }
}
