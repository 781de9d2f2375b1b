//! Printable invoices and packing slips.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::{Path, Query, State},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use tracing::instrument;

use emporium_core::{CurrencyCode, Money, OrderId};

use crate::db::OrderRepository;
use crate::error::{AppError, Result};
use crate::middleware::RequireAdmin;
use crate::models::{Order, OrderItem};
use crate::state::AppState;

/// Kind of printed document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    #[default]
    Invoice,
    PackingSlip,
}

#[derive(Debug, Deserialize)]
pub struct PrintQuery {
    #[serde(rename = "type", default)]
    pub doc_type: DocumentType,
}

/// Order line formatted for print.
#[derive(Debug, Clone)]
pub struct PrintLine {
    pub name: String,
    pub quantity: i32,
    pub unit_price: String,
    pub total: String,
}

/// Order formatted for print.
#[derive(Debug, Clone)]
pub struct PrintOrder {
    pub reference: String,
    pub placed_on: String,
    pub status: &'static str,
    pub email: String,
    pub address: Vec<String>,
    /// Empty when unknown
    pub shipping_method: String,
    pub notes: String,
    pub coupon_code: String,
    pub subtotal: String,
    pub has_discount: bool,
    pub discount: String,
    pub shipping: String,
    pub total: String,
}

impl PrintOrder {
    fn new(order: &Order, currency: CurrencyCode) -> Self {
        let fmt = |amount| Money::new(amount, currency).to_string();
        Self {
            reference: order.reference(),
            placed_on: order.created_at.format("%B %-d, %Y").to_string(),
            status: order.status.label(),
            email: order.email.clone(),
            address: order.shipping_address.lines(),
            shipping_method: order.shipping_method.clone().unwrap_or_default(),
            notes: order.notes.clone().unwrap_or_default(),
            coupon_code: order.coupon_code.clone().unwrap_or_default(),
            subtotal: fmt(order.subtotal),
            has_discount: !order.discount.is_zero(),
            discount: fmt(order.discount),
            shipping: fmt(order.shipping),
            total: fmt(order.total),
        }
    }
}

impl PrintLine {
    fn new(item: &OrderItem, currency: CurrencyCode) -> Self {
        Self {
            name: item.product_name.clone(),
            quantity: item.quantity,
            unit_price: Money::new(item.unit_price, currency).to_string(),
            total: Money::new(item.line_total, currency).to_string(),
        }
    }
}

#[derive(Template, WebTemplate)]
#[template(path = "print/invoice.html")]
pub struct InvoiceTemplate<'a> {
    pub store_name: &'a str,
    pub order: &'a PrintOrder,
    pub lines: &'a [PrintLine],
    pub printed_at: &'a str,
}

#[derive(Template, WebTemplate)]
#[template(path = "print/packing_slip.html")]
pub struct PackingSlipTemplate<'a> {
    pub store_name: &'a str,
    pub order: &'a PrintOrder,
    pub lines: &'a [PrintLine],
    pub printed_at: &'a str,
}

/// Render an order's invoice or packing slip.
#[instrument(skip(_admin, state))]
pub async fn print(
    RequireAdmin(_admin): RequireAdmin,
    State(state): State<AppState>,
    Path(id): Path<OrderId>,
    Query(query): Query<PrintQuery>,
) -> Result<Response> {
    let orders = OrderRepository::new(state.pool());
    let order = orders
        .get_by_id(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Order".to_string()))?;
    let items = orders.get_items(id).await?;

    let currency = state.config().currency;
    let order = PrintOrder::new(&order, currency);
    let lines: Vec<PrintLine> = items.iter().map(|i| PrintLine::new(i, currency)).collect();
    let printed_at = printed_at();
    let store_name = state.config().store_name.as_str();

    let response = match query.doc_type {
        DocumentType::Invoice => InvoiceTemplate {
            store_name,
            order: &order,
            lines: &lines,
            printed_at: &printed_at,
        }
        .into_response(),
        DocumentType::PackingSlip => PackingSlipTemplate {
            store_name,
            order: &order,
            lines: &lines,
            printed_at: &printed_at,
        }
        .into_response(),
    };

    Ok(response)
}

fn printed_at() -> String {
    chrono::Utc::now().format("%Y-%m-%d %H:%M UTC").to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn sample() -> (PrintOrder, Vec<PrintLine>) {
        let order = PrintOrder {
            reference: "#000042".to_string(),
            placed_on: "March 1, 2026".to_string(),
            status: "Paid",
            email: "ada@example.com".to_string(),
            address: vec![
                "Ada Lovelace".to_string(),
                "12 St James's Square".to_string(),
                "London, LDN SW1Y 4JH".to_string(),
                "GB".to_string(),
            ],
            shipping_method: "USPS Priority".to_string(),
            notes: "Leave at the door".to_string(),
            coupon_code: "SPRING10".to_string(),
            subtotal: "$36.00".to_string(),
            has_discount: true,
            discount: "$3.60".to_string(),
            shipping: "$8.50".to_string(),
            total: "$40.90".to_string(),
        };
        let lines = vec![PrintLine {
            name: "Enamel Camp Mug".to_string(),
            quantity: 2,
            unit_price: "$18.00".to_string(),
            total: "$36.00".to_string(),
        }];
        (order, lines)
    }

    #[test]
    fn test_query_defaults_to_invoice() {
        let query: PrintQuery = serde_json::from_str("{}").unwrap();
        assert_eq!(query.doc_type, DocumentType::Invoice);
        let query: PrintQuery = serde_json::from_str(r#"{"type":"packing_slip"}"#).unwrap();
        assert_eq!(query.doc_type, DocumentType::PackingSlip);
    }

    #[test]
    fn test_invoice_shows_prices() {
        let (order, lines) = sample();
        let html = InvoiceTemplate {
            store_name: "Emporium",
            order: &order,
            lines: &lines,
            printed_at: "now",
        }
        .render()
        .unwrap();
        assert!(html.contains("Invoice #000042"));
        assert!(html.contains("Enamel Camp Mug"));
        assert!(html.contains("$40.90"));
        assert!(html.contains("SPRING10"));
    }

    #[test]
    fn test_packing_slip_hides_prices() {
        let (order, lines) = sample();
        let html = PackingSlipTemplate {
            store_name: "Emporium",
            order: &order,
            lines: &lines,
            printed_at: "now",
        }
        .render()
        .unwrap();
        assert!(html.contains("Packing slip #000042"));
        assert!(html.contains("Enamel Camp Mug"));
        assert!(html.contains("Leave at the door"));
        assert!(!html.contains("$40.90"));
        assert!(!html.contains("$18.00"));
    }
}
