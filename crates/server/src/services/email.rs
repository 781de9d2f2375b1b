//! Transactional email.
//!
//! Uses SMTP via lettre for delivery with Askama HTML and plain-text templates.

use askama::Template;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::{MultiPart, SinglePart, header::ContentType},
    transport::smtp::{Error as SmtpError, authentication::Credentials},
};
use secrecy::ExposeSecret;
use thiserror::Error;

use emporium_core::{CurrencyCode, Money};

use crate::config::EmailConfig;
use crate::models::{Order, OrderItem};

/// One line of an order summary, pre-formatted for templates.
struct SummaryLine {
    name: String,
    quantity: i32,
    total: String,
}

/// Formatted order totals for templates.
struct SummaryTotals {
    subtotal: String,
    has_discount: bool,
    discount: String,
    shipping: String,
    total: String,
}

impl SummaryTotals {
    fn for_order(order: &Order, currency: CurrencyCode) -> Self {
        let fmt = |amount| Money::new(amount, currency).to_string();
        Self {
            subtotal: fmt(order.subtotal),
            has_discount: !order.discount.is_zero(),
            discount: fmt(order.discount),
            shipping: fmt(order.shipping),
            total: fmt(order.total),
        }
    }
}

#[derive(Template)]
#[template(path = "email/password_reset.html")]
struct PasswordResetHtml<'a> {
    name: &'a str,
    reset_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/password_reset.txt")]
struct PasswordResetText<'a> {
    name: &'a str,
    reset_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/order_confirmation.html")]
struct OrderConfirmationHtml<'a> {
    reference: &'a str,
    name: &'a str,
    lines: &'a [SummaryLine],
    totals: &'a SummaryTotals,
    address: &'a [String],
    order_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/order_confirmation.txt")]
struct OrderConfirmationText<'a> {
    reference: &'a str,
    name: &'a str,
    lines: &'a [SummaryLine],
    totals: &'a SummaryTotals,
    address: &'a [String],
    order_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/shipping_notification.html")]
struct ShippingNotificationHtml<'a> {
    reference: &'a str,
    name: &'a str,
    carrier: &'a str,
    tracking_number: &'a str,
    order_url: &'a str,
}

#[derive(Template)]
#[template(path = "email/shipping_notification.txt")]
struct ShippingNotificationText<'a> {
    reference: &'a str,
    name: &'a str,
    carrier: &'a str,
    tracking_number: &'a str,
    order_url: &'a str,
}

/// Errors that can occur when sending email.
#[derive(Debug, Error)]
pub enum EmailError {
    /// SMTP transport error.
    #[error("SMTP error: {0}")]
    Smtp(#[from] SmtpError),

    /// Failed to build email message.
    #[error("Failed to build message: {0}")]
    MessageBuild(#[from] lettre::error::Error),

    /// Invalid email address.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// Template rendering error.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),
}

/// Email service for sending transactional emails.
#[derive(Clone)]
pub struct EmailService {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from_address: String,
    base_url: String,
    currency: CurrencyCode,
}

impl EmailService {
    /// Create a new email service from configuration.
    ///
    /// `base_url` is the public store URL used to build links.
    ///
    /// # Errors
    ///
    /// Returns error if the SMTP relay cannot be configured.
    pub fn new(
        config: &EmailConfig,
        base_url: &str,
        currency: CurrencyCode,
    ) -> Result<Self, SmtpError> {
        let credentials = Credentials::new(
            config.smtp_username.clone(),
            config.smtp_password.expose_secret().to_string(),
        );

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.smtp_host)?
            .port(config.smtp_port)
            .credentials(credentials)
            .build();

        Ok(Self {
            mailer,
            from_address: config.from_address.clone(),
            base_url: base_url.to_string(),
            currency,
        })
    }

    /// Send a password reset link.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_password_reset(
        &self,
        to: &str,
        name: &str,
        token: &str,
    ) -> Result<(), EmailError> {
        let reset_url = format!(
            "{}/reset-password?token={}",
            self.base_url,
            urlencoding::encode(token)
        );
        let html = PasswordResetHtml {
            name,
            reset_url: &reset_url,
        }
        .render()?;
        let text = PasswordResetText {
            name,
            reset_url: &reset_url,
        }
        .render()?;

        self.send_multipart_email(to, "Reset your password", &text, &html)
            .await
    }

    /// Send the receipt for a paid order.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_order_confirmation(
        &self,
        order: &Order,
        items: &[OrderItem],
    ) -> Result<(), EmailError> {
        let reference = order.reference();
        let lines: Vec<SummaryLine> = items
            .iter()
            .map(|item| SummaryLine {
                name: item.product_name.clone(),
                quantity: item.quantity,
                total: Money::new(item.line_total, self.currency).to_string(),
            })
            .collect();
        let totals = SummaryTotals::for_order(order, self.currency);
        let address = order.shipping_address.lines();
        let order_url = self.order_url(order);
        let name = order.shipping_address.name.as_str();

        let html = OrderConfirmationHtml {
            reference: &reference,
            name,
            lines: &lines,
            totals: &totals,
            address: &address,
            order_url: &order_url,
        }
        .render()?;
        let text = OrderConfirmationText {
            reference: &reference,
            name,
            lines: &lines,
            totals: &totals,
            address: &address,
            order_url: &order_url,
        }
        .render()?;

        self.send_multipart_email(
            &order.email,
            &format!("Order {reference} confirmed"),
            &text,
            &html,
        )
        .await
    }

    /// Tell the customer their order is on its way.
    ///
    /// # Errors
    ///
    /// Returns error if email fails to send or template fails to render.
    pub async fn send_shipping_notification(&self, order: &Order) -> Result<(), EmailError> {
        let reference = order.reference();
        let order_url = self.order_url(order);
        let name = order.shipping_address.name.as_str();
        let carrier = order.carrier.as_deref().unwrap_or("the carrier");
        let tracking_number = order.tracking_number.as_deref().unwrap_or_default();

        let html = ShippingNotificationHtml {
            reference: &reference,
            name,
            carrier,
            tracking_number,
            order_url: &order_url,
        }
        .render()?;
        let text = ShippingNotificationText {
            reference: &reference,
            name,
            carrier,
            tracking_number,
            order_url: &order_url,
        }
        .render()?;

        self.send_multipart_email(
            &order.email,
            &format!("Order {reference} has shipped"),
            &text,
            &html,
        )
        .await
    }

    fn order_url(&self, order: &Order) -> String {
        format!("{}/orders/{}", self.base_url, order.id)
    }

    /// Send a multipart email with both plain text and HTML versions.
    async fn send_multipart_email(
        &self,
        to: &str,
        subject: &str,
        text_body: &str,
        html_body: &str,
    ) -> Result<(), EmailError> {
        let email = Message::builder()
            .from(
                self.from_address
                    .parse()
                    .map_err(|_| EmailError::InvalidAddress(self.from_address.clone()))?,
            )
            .to(to
                .parse()
                .map_err(|_| EmailError::InvalidAddress(to.to_string()))?)
            .subject(subject)
            .multipart(
                MultiPart::alternative()
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_PLAIN)
                            .body(text_body.to_string()),
                    )
                    .singlepart(
                        SinglePart::builder()
                            .header(ContentType::TEXT_HTML)
                            .body(html_body.to_string()),
                    ),
            )?;

        self.mailer.send(email).await?;

        tracing::info!(subject = %subject, "Email sent");
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_password_reset_templates_render_link() {
        let html = PasswordResetHtml {
            name: "Ada",
            reset_url: "https://shop.test/reset-password?token=abc",
        }
        .render()
        .unwrap();
        assert!(html.contains("https://shop.test/reset-password?token=abc"));
        assert!(html.contains("Ada"));

        let text = PasswordResetText {
            name: "Ada",
            reset_url: "https://shop.test/reset-password?token=abc",
        }
        .render()
        .unwrap();
        assert!(text.contains("https://shop.test/reset-password?token=abc"));
    }

    #[test]
    fn test_order_confirmation_text_lists_lines() {
        let lines = vec![SummaryLine {
            name: "Tea Mug".to_string(),
            quantity: 2,
            total: "$24.00".to_string(),
        }];
        let totals = SummaryTotals {
            subtotal: "$24.00".to_string(),
            has_discount: true,
            discount: "$2.40".to_string(),
            shipping: "$5.00".to_string(),
            total: "$26.60".to_string(),
        };
        let address = vec!["Ada".to_string(), "Portland, OR 97201".to_string()];

        let text = OrderConfirmationText {
            reference: "#000042",
            name: "Ada",
            lines: &lines,
            totals: &totals,
            address: &address,
            order_url: "https://shop.test/orders/42",
        }
        .render()
        .unwrap();

        assert!(text.contains("#000042"));
        assert!(text.contains("2 x Tea Mug"));
        assert!(text.contains("Discount: -$2.40"));
        assert!(text.contains("Total: $26.60"));
    }

    #[test]
    fn test_shipping_notification_html_escapes() {
        let html = ShippingNotificationHtml {
            reference: "#000001",
            name: "<b>Eve</b>",
            carrier: "USPS",
            tracking_number: "9400",
            order_url: "https://shop.test/orders/1",
        }
        .render()
        .unwrap();
        assert!(!html.contains("<b>Eve</b>"));
        assert!(html.contains("9400"));
    }
}
