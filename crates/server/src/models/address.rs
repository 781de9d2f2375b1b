//! Postal address used for shipping and the warehouse origin.

use serde::{Deserialize, Serialize};

/// A postal address.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Address {
    pub name: String,
    pub street1: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub street2: Option<String>,
    pub city: String,
    /// State, province or region
    pub state: String,
    pub postal_code: String,
    /// ISO 3166-1 alpha-2 country code
    pub country: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

impl Address {
    /// Check that the fields carriers require are present.
    ///
    /// # Errors
    ///
    /// Returns a message naming the first missing or malformed field.
    pub fn validate(&self) -> Result<(), String> {
        let required = [
            ("name", &self.name),
            ("street1", &self.street1),
            ("city", &self.city),
            ("postal_code", &self.postal_code),
            ("country", &self.country),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(format!("address {field} is required"));
            }
        }

        let country = self.country.trim();
        if country.len() != 2 || !country.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err("address country must be a two-letter code".to_string());
        }

        Ok(())
    }

    /// Address lines for printed documents.
    #[must_use]
    pub fn lines(&self) -> Vec<String> {
        let mut lines = vec![self.name.clone(), self.street1.clone()];
        if let Some(street2) = self.street2.as_deref().filter(|s| !s.trim().is_empty()) {
            lines.push(street2.to_string());
        }
        lines.push(format!("{}, {} {}", self.city, self.state, self.postal_code));
        lines.push(self.country.to_uppercase());
        lines
    }
}
