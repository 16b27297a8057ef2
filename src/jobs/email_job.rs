//! Email background job.
//!
//! Checkout enqueues confirmation emails; the `jobs work` worker delivers
//! them. Without SMTP settings the worker logs the message instead.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::env;

#[cfg(any(test, feature = "test-utils"))]
use mockall::automock;

use apalis::prelude::Storage;
use apalis_sql::postgres::PostgresStorage;
use apalis_sql::sqlx::postgres::PgPoolOptions;

use crate::domain::{FulfillmentMethod, Order};
use crate::errors::{AppError, AppResult};

/// Email job payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailJob {
    pub to: String,
    pub subject: String,
    /// Plain text body
    pub body: String,
    /// Sender override (defaults to SMTP_FROM)
    #[serde(default)]
    pub from: Option<String>,
}

impl EmailJob {
    pub fn new(to: impl Into<String>, subject: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            to: to.into(),
            subject: subject.into(),
            body: body.into(),
            from: None,
        }
    }

    /// Confirmation sent to the order email right after checkout.
    pub fn order_confirmation(order: &Order) -> Self {
        let mut body = format!(
            "Hello {},\n\nThank you for your order {}.\n\n",
            order.name, order.order_number
        );
        for item in &order.items {
            body.push_str(&format!(
                "  {} x {} ({})  {}\n",
                item.quantity, item.product_name, item.section, item.line_total
            ));
        }
        body.push_str(&format!(
            "\nSubtotal: {}\nDiscount: {}\nTax: {}\nShipping: {}\nTotal: {}\n",
            order.subtotal, order.discount, order.tax, order.shipping, order.total
        ));
        match (order.fulfillment, &order.shipping_address) {
            (FulfillmentMethod::Delivery, Some(address)) => body.push_str(&format!(
                "\nDelivering to {}, {}, {} {}, {}\n",
                address.recipient, address.line1, address.postal_code, address.city, address.country
            )),
            _ => body.push_str("\nYour order will be ready for pickup in store.\n"),
        }
        if order.is_guest {
            body.push_str(&format!(
                "\nTrack your order with number {} and this email address.\n",
                order.order_number
            ));
        }

        Self::new(
            order.email.clone(),
            format!("Order {} confirmed", order.order_number),
            body,
        )
    }
}

/// Outbound email queue
#[cfg_attr(any(test, feature = "test-utils"), automock)]
#[async_trait]
pub trait EmailQueue: Send + Sync {
    async fn enqueue(&self, job: EmailJob) -> AppResult<()>;
}

/// apalis Postgres-backed queue
#[derive(Clone)]
pub struct PgEmailQueue {
    storage: PostgresStorage<EmailJob>,
}

impl PgEmailQueue {
    /// Connect and make sure the apalis tables exist.
    pub async fn connect(database_url: &str) -> AppResult<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(5)
            .connect(database_url)
            .await
            .map_err(|e| AppError::internal(format!("Failed to connect job queue: {}", e)))?;

        PostgresStorage::setup(&pool)
            .await
            .map_err(|e| AppError::internal(format!("Failed to setup job storage: {}", e)))?;

        Ok(Self {
            storage: PostgresStorage::new(pool),
        })
    }

    pub fn storage(&self) -> PostgresStorage<EmailJob> {
        self.storage.clone()
    }
}

#[async_trait]
impl EmailQueue for PgEmailQueue {
    async fn enqueue(&self, job: EmailJob) -> AppResult<()> {
        let mut storage = self.storage.clone();
        storage
            .push(job)
            .await
            .map_err(|e| AppError::internal(format!("Failed to enqueue email: {}", e)))?;
        Ok(())
    }
}

fn sender_address() -> String {
    env::var("SMTP_FROM").unwrap_or_else(|_| "noreply@example.com".to_string())
}

/// Email job handler
pub async fn email_job_handler(job: EmailJob) -> Result<(), AppError> {
    let from = job.from.clone().unwrap_or_else(sender_address);

    tracing::info!(
        to = %job.to,
        from = %from,
        subject = %job.subject,
        "Processing email job"
    );

    if env::var("SMTP_HOST").is_err() {
        tracing::warn!("SMTP not configured - logging email instead of sending");
    }
    tracing::info!(
        "=== EMAIL ===\nFrom: {}\nTo: {}\nSubject: {}\n\n{}\n=============",
        from,
        job.to,
        job.subject,
        job.body
    );

    Ok(())
}
