//! Shippo shipping-rate quotes.

use std::str::FromStr;

use reqwest::{Client, Response};
use rust_decimal::Decimal;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, error, instrument};

use crate::config::ShippoConfig;
use crate::models::Address;

const SHIPPO_API_BASE: &str = "https://api.goshippo.com";

/// Box dimensions (inches) used when quoting; products carry weight only.
const DEFAULT_PARCEL_INCHES: (u32, u32, u32) = (12, 9, 4);

/// Weight quoted for an order whose products have no weight recorded.
const MIN_PARCEL_GRAMS: u32 = 100;

/// Errors that can occur when requesting shipping rates.
#[derive(Debug, Error)]
pub enum ShippingError {
    /// HTTP request failed.
    #[error("Shippo request failed: {0}")]
    Request(String),

    /// Failed to parse response.
    #[error("Shippo response error: {0}")]
    Response(String),

    /// Shippo rejected the call.
    #[error("Shippo API error ({status}): {body}")]
    Api { status: u16, body: String },

    /// Rate id does not exist or has expired.
    #[error("shipping rate not found")]
    RateNotFound,
}

/// Package to be shipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Parcel {
    pub weight_grams: u32,
}

impl Parcel {
    /// Parcel for a total product weight, never lighter than the packaging minimum.
    #[must_use]
    pub fn for_weight(weight_grams: u32) -> Self {
        Self {
            weight_grams: weight_grams.max(MIN_PARCEL_GRAMS),
        }
    }
}

/// A purchasable shipping option.
#[derive(Debug, Clone, Serialize)]
pub struct ShippingRate {
    /// Shippo rate object id, passed back at checkout.
    pub id: String,
    pub amount: Decimal,
    pub currency: String,
    pub carrier: String,
    pub service: String,
    pub estimated_days: Option<i32>,
}

impl ShippingRate {
    /// Label stored on the order, e.g. `USPS Priority Mail`.
    #[must_use]
    pub fn label(&self) -> String {
        format!("{} {}", self.carrier, self.service)
    }
}

#[derive(Serialize)]
struct ShippoAddress<'a> {
    name: &'a str,
    street1: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    street2: Option<&'a str>,
    city: &'a str,
    state: &'a str,
    zip: &'a str,
    country: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    phone: Option<&'a str>,
}

impl<'a> From<&'a Address> for ShippoAddress<'a> {
    fn from(address: &'a Address) -> Self {
        Self {
            name: &address.name,
            street1: &address.street1,
            street2: address.street2.as_deref(),
            city: &address.city,
            state: &address.state,
            zip: &address.postal_code,
            country: address.country.trim().to_uppercase(),
            phone: address.phone.as_deref(),
        }
    }
}

#[derive(Serialize)]
struct ShippoParcel {
    length: String,
    width: String,
    height: String,
    distance_unit: &'static str,
    weight: String,
    mass_unit: &'static str,
}

impl From<Parcel> for ShippoParcel {
    fn from(parcel: Parcel) -> Self {
        let (length, width, height) = DEFAULT_PARCEL_INCHES;
        Self {
            length: length.to_string(),
            width: width.to_string(),
            height: height.to_string(),
            distance_unit: "in",
            weight: parcel.weight_grams.to_string(),
            mass_unit: "g",
        }
    }
}

#[derive(Serialize)]
struct ShipmentRequest<'a> {
    address_from: ShippoAddress<'a>,
    address_to: ShippoAddress<'a>,
    parcels: Vec<ShippoParcel>,
    #[serde(rename = "async")]
    is_async: bool,
}

#[derive(Deserialize)]
struct ShipmentResponse {
    #[serde(default)]
    rates: Vec<RateObject>,
}

#[derive(Deserialize)]
struct RateObject {
    object_id: String,
    amount: String,
    currency: String,
    provider: String,
    servicelevel: ServiceLevel,
    #[serde(default)]
    estimated_days: Option<i32>,
}

#[derive(Deserialize)]
struct ServiceLevel {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    token: Option<String>,
}

impl TryFrom<RateObject> for ShippingRate {
    type Error = ShippingError;

    fn try_from(rate: RateObject) -> Result<Self, Self::Error> {
        let amount = Decimal::from_str(&rate.amount).map_err(|e| {
            ShippingError::Response(format!("invalid rate amount '{}': {e}", rate.amount))
        })?;

        Ok(Self {
            id: rate.object_id,
            amount,
            currency: rate.currency,
            carrier: rate.provider,
            service: rate
                .servicelevel
                .name
                .or(rate.servicelevel.token)
                .unwrap_or_else(|| "Standard".to_string()),
            estimated_days: rate.estimated_days,
        })
    }
}

/// Shippo API client.
#[derive(Clone)]
pub struct ShippoClient {
    client: Client,
    api_token: SecretString,
    ship_from: Address,
}

impl std::fmt::Debug for ShippoClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShippoClient")
            .field("api_token", &"[REDACTED]")
            .field("ship_from", &self.ship_from)
            .finish_non_exhaustive()
    }
}

impl ShippoClient {
    /// Create a new Shippo client.
    #[must_use]
    pub fn new(config: &ShippoConfig) -> Self {
        Self {
            client: Client::new(),
            api_token: config.api_token.clone(),
            ship_from: config.ship_from.clone(),
        }
    }

    /// Warehouse address parcels ship from.
    #[must_use]
    pub const fn ship_from(&self) -> &Address {
        &self.ship_from
    }

    /// Quote rates for shipping `parcel` to `to`, cheapest first.
    ///
    /// # Errors
    ///
    /// Returns error if the API request fails or Shippo rejects it.
    #[instrument(skip(self, to), fields(country = %to.country))]
    pub async fn quote(&self, to: &Address, parcel: Parcel) -> Result<Vec<ShippingRate>, ShippingError> {
        let request = ShipmentRequest {
            address_from: (&self.ship_from).into(),
            address_to: to.into(),
            parcels: vec![parcel.into()],
            is_async: false,
        };

        let response = self
            .client
            .post(format!("{SHIPPO_API_BASE}/shipments/"))
            .header(reqwest::header::AUTHORIZATION, self.auth_header())
            .json(&request)
            .send()
            .await
            .map_err(|e| ShippingError::Request(e.to_string()))?;

        let shipment: ShipmentResponse = parse_response(response).await?;
        let mut rates = shipment
            .rates
            .into_iter()
            .map(ShippingRate::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        sort_rates(&mut rates);

        debug!(rates = rates.len(), "Shipping rates quoted");
        Ok(rates)
    }

    /// Look up a previously quoted rate.
    ///
    /// # Errors
    ///
    /// Returns `ShippingError::RateNotFound` if Shippo does not know the id.
    #[instrument(skip(self))]
    pub async fn get_rate(&self, rate_id: &str) -> Result<ShippingRate, ShippingError> {
        let response = self
            .client
            .get(format!(
                "{SHIPPO_API_BASE}/rates/{}",
                urlencoding::encode(rate_id)
            ))
            .header(reqwest::header::AUTHORIZATION, self.auth_header())
            .send()
            .await
            .map_err(|e| ShippingError::Request(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(ShippingError::RateNotFound);
        }

        let rate: RateObject = parse_response(response).await?;
        rate.try_into()
    }

    fn auth_header(&self) -> String {
        format!("ShippoToken {}", self.api_token.expose_secret())
    }
}

fn sort_rates(rates: &mut [ShippingRate]) {
    rates.sort_by(|a, b| {
        a.amount
            .cmp(&b.amount)
            .then_with(|| a.estimated_days.cmp(&b.estimated_days))
    });
}

async fn parse_response<T: DeserializeOwned>(response: Response) -> Result<T, ShippingError> {
    let status = response.status();
    let body = response
        .text()
        .await
        .map_err(|e| ShippingError::Response(e.to_string()))?;

    if !status.is_success() {
        error!(status = %status, "Shippo API error");
        return Err(ShippingError::Api {
            status: status.as_u16(),
            body,
        });
    }

    serde_json::from_str(&body).map_err(|e| ShippingError::Response(e.to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn rate(id: &str, amount: &str, days: Option<i32>) -> ShippingRate {
        RateObject {
            object_id: id.to_string(),
            amount: amount.to_string(),
            currency: "USD".to_string(),
            provider: "USPS".to_string(),
            servicelevel: ServiceLevel {
                name: Some("Ground".to_string()),
                token: None,
            },
            estimated_days: days,
        }
        .try_into()
        .unwrap()
    }

    #[test]
    fn test_rates_sorted_by_amount_then_speed() {
        let mut rates = vec![
            rate("c", "12.40", Some(2)),
            rate("a", "7.10", Some(5)),
            rate("b", "7.10", Some(3)),
        ];
        sort_rates(&mut rates);
        let ids: Vec<_> = rates.iter().map(|r| r.id.as_str()).collect();
        assert_eq!(ids, ["b", "a", "c"]);
    }

    #[test]
    fn test_rate_parses_amount() {
        let r = rate("x", "5.95", None);
        assert_eq!(r.amount, Decimal::new(595, 2));
        assert_eq!(r.label(), "USPS Ground");
    }

    #[test]
    fn test_rate_bad_amount() {
        let result = ShippingRate::try_from(RateObject {
            object_id: "x".to_string(),
            amount: "n/a".to_string(),
            currency: "USD".to_string(),
            provider: "UPS".to_string(),
            servicelevel: ServiceLevel {
                name: None,
                token: Some("ups_ground".to_string()),
            },
            estimated_days: None,
        });
        assert!(matches!(result, Err(ShippingError::Response(_))));
    }

    #[test]
    fn test_parcel_minimum_weight() {
        assert_eq!(Parcel::for_weight(0).weight_grams, 100);
        assert_eq!(Parcel::for_weight(850).weight_grams, 850);
    }

    #[test]
    fn test_shipment_request_body() {
        let address = Address {
            name: "Ada".to_string(),
            street1: "1 Main St".to_string(),
            street2: None,
            city: "Portland".to_string(),
            state: "OR".to_string(),
            postal_code: "97201".to_string(),
            country: "us".to_string(),
            phone: None,
        };
        let body = serde_json::to_value(ShipmentRequest {
            address_from: (&address).into(),
            address_to: (&address).into(),
            parcels: vec![Parcel::for_weight(500).into()],
            is_async: false,
        })
        .unwrap();

        assert_eq!(body["address_to"]["zip"], "97201");
        assert_eq!(body["address_to"]["country"], "US");
        assert!(body["address_to"].get("street2").is_none());
        assert_eq!(body["parcels"][0]["weight"], "500");
        assert_eq!(body["parcels"][0]["mass_unit"], "g");
        assert_eq!(body["async"], false);
    }
}
