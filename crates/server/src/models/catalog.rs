//! Catalog domain types: categories and products.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use emporium_core::{CategoryId, ProductId, Slug, SlugError};

/// A product category.
#[derive(Debug, Clone, Serialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: Slug,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields accepted when creating or updating a category.
#[derive(Debug, Clone, Deserialize)]
pub struct CategoryInput {
    pub name: String,
    /// Derived from `name` when absent.
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl CategoryInput {
    /// Validate the input and resolve its slug.
    ///
    /// # Errors
    ///
    /// Returns a message if the name is blank or the slug is invalid.
    pub fn validate(&self) -> Result<Slug, String> {
        if self.name.trim().is_empty() {
            return Err("category name is required".to_string());
        }
        resolve_slug(self.slug.as_deref(), &self.name).map_err(|e| e.to_string())
    }
}

/// A static category row inserted by the seed script.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedCategory {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

impl SeedCategory {
    /// The categories a fresh store starts with.
    #[must_use]
    pub fn defaults() -> Vec<Self> {
        [
            ("Apparel", "Shirts, hoodies and everything wearable"),
            ("Accessories", "Bags, hats and small goods"),
            ("Home & Kitchen", "Mugs, prints and things for the house"),
            ("Stationery", "Notebooks, stickers and pens"),
            ("Gift Cards", "Digital gift cards"),
        ]
        .into_iter()
        .map(|(name, description)| Self {
            name: name.to_string(),
            description: Some(description.to_string()),
        })
        .collect()
    }
}

/// A product in the catalog.
#[derive(Debug, Clone, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub category_id: Option<CategoryId>,
    pub name: String,
    pub slug: Slug,
    pub description: String,
    pub price: Decimal,
    /// Original price shown struck through, when on sale.
    pub compare_at_price: Option<Decimal>,
    pub stock: i32,
    /// Shipping weight, used for live rate quotes.
    pub weight_grams: i32,
    pub image_urls: Vec<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Whether `quantity` units can be sold right now.
    #[must_use]
    pub fn can_fulfill(&self, quantity: u32) -> bool {
        self.is_active && i64::from(self.stock) >= i64::from(quantity)
    }
}

/// Fields accepted when creating or updating a product.
#[derive(Debug, Clone, Deserialize)]
pub struct ProductInput {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    #[serde(default)]
    pub compare_at_price: Option<Decimal>,
    #[serde(default)]
    pub stock: i32,
    #[serde(default)]
    pub weight_grams: i32,
    #[serde(default)]
    pub category_id: Option<CategoryId>,
    #[serde(default)]
    pub image_urls: Vec<String>,
    #[serde(default)]
    pub is_active: bool,
}

impl ProductInput {
    /// Validate the input and resolve its slug.
    ///
    /// # Errors
    ///
    /// Returns a message describing the first invalid field.
    pub fn validate(&self) -> Result<Slug, String> {
        if self.name.trim().is_empty() {
            return Err("product name is required".to_string());
        }
        if self.price.is_sign_negative() {
            return Err("price must not be negative".to_string());
        }
        if self.compare_at_price.is_some_and(|p| p.is_sign_negative()) {
            return Err("compare_at_price must not be negative".to_string());
        }
        if self.stock < 0 {
            return Err("stock must not be negative".to_string());
        }
        if self.weight_grams < 0 {
            return Err("weight_grams must not be negative".to_string());
        }
        resolve_slug(self.slug.as_deref(), &self.name).map_err(|e| e.to_string())
    }
}

/// Storefront product listing filter.
#[derive(Debug, Clone, Default)]
pub struct ProductFilter {
    /// Category slug
    pub category: Option<String>,
    /// Case-insensitive search over name and description
    pub search: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

/// Use an explicit slug when given, otherwise derive one from the name.
fn resolve_slug(explicit: Option<&str>, name: &str) -> Result<Slug, SlugError> {
    match explicit.map(str::trim).filter(|s| !s.is_empty()) {
        Some(slug) => Slug::parse(slug),
        None => Slug::from_name(name),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn product_input() -> ProductInput {
        ProductInput {
            name: "Enamel Camp Mug".to_string(),
            slug: None,
            description: String::new(),
            price: Decimal::new(1800, 2),
            compare_at_price: None,
            stock: 10,
            weight_grams: 350,
            category_id: None,
            image_urls: Vec::new(),
            is_active: true,
        }
    }

    #[test]
    fn test_product_input_derives_slug() {
        assert_eq!(product_input().validate().unwrap().as_str(), "enamel-camp-mug");
    }

    #[test]
    fn test_product_input_explicit_slug_must_be_canonical() {
        let mut input = product_input();
        input.slug = Some("Camp Mug".to_string());
        assert!(input.validate().is_err());
        input.slug = Some("camp-mug".to_string());
        assert_eq!(input.validate().unwrap().as_str(), "camp-mug");
    }

    #[test]
    fn test_product_input_rejects_negative_price() {
        let mut input = product_input();
        input.price = Decimal::new(-1, 0);
        assert_eq!(
            input.validate().unwrap_err(),
            "price must not be negative".to_string()
        );
    }

    #[test]
    fn test_category_input_requires_name() {
        let input = CategoryInput {
            name: " ".to_string(),
            slug: None,
            description: None,
        };
        assert!(input.validate().is_err());
    }

    #[test]
    fn test_seed_defaults_have_distinct_slugs() {
        let defaults = SeedCategory::defaults();
        let mut slugs: Vec<_> = defaults
            .iter()
            .map(|c| Slug::from_name(&c.name).unwrap().into_inner())
            .collect();
        slugs.sort();
        slugs.dedup();
        assert_eq!(slugs.len(), defaults.len());
    }
}
