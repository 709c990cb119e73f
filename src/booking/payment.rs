use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::booking::error::{StoreError, StoreResult};
use crate::entities::booking;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentAuthorization {
    Approved { reference: String },
    Declined { reason: String },
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn authorize(&self, booking: &booking::Model) -> StoreResult<PaymentAuthorization>;
    async fn refund(&self, booking: &booking::Model, amount: Decimal) -> StoreResult<()>;
}

/// Payment settled at the rental counter; every request is approved.
#[derive(Debug, Clone, Default)]
pub struct CounterPaymentGateway;

#[async_trait]
impl PaymentGateway for CounterPaymentGateway {
    async fn authorize(&self, booking: &booking::Model) -> StoreResult<PaymentAuthorization> {
        Ok(PaymentAuthorization::Approved {
            reference: format!("COUNTER-{}", booking.booking_number),
        })
    }

    async fn refund(&self, booking: &booking::Model, amount: Decimal) -> StoreResult<()> {
        tracing::info!(
            booking_number = %booking.booking_number,
            %amount,
            "Refund to be paid out at the counter"
        );
        Ok(())
    }
}

#[derive(Debug, Serialize)]
struct AuthorizationRequest<'a> {
    booking_number: &'a str,
    amount: Decimal,
}

#[derive(Debug, Deserialize)]
struct AuthorizationResponse {
    approved: bool,
    reference: Option<String>,
    reason: Option<String>,
}

#[derive(Debug, Serialize)]
struct RefundRequest<'a> {
    booking_number: &'a str,
    reference: Option<&'a str>,
    amount: Decimal,
}

/// JSON client for an external payment processor.
#[derive(Debug, Clone)]
pub struct HttpPaymentGateway {
    client: reqwest::Client,
    base_url: String,
}

impl HttpPaymentGateway {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }
}

fn gateway_err(e: reqwest::Error) -> StoreError {
    StoreError::Backend(format!("Payment gateway error: {}", e))
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn authorize(&self, booking: &booking::Model) -> StoreResult<PaymentAuthorization> {
        let response: AuthorizationResponse = self
            .client
            .post(format!("{}/authorizations", self.base_url))
            .json(&AuthorizationRequest {
                booking_number: &booking.booking_number,
                amount: booking.total,
            })
            .send()
            .await
            .map_err(gateway_err)?
            .error_for_status()
            .map_err(gateway_err)?
            .json()
            .await
            .map_err(gateway_err)?;

        match (response.approved, response.reference) {
            (true, Some(reference)) => Ok(PaymentAuthorization::Approved { reference }),
            (true, None) => Err(StoreError::Backend(
                "Payment gateway approved without a reference".to_string(),
            )),
            (false, _) => Ok(PaymentAuthorization::Declined {
                reason: response.reason.unwrap_or_else(|| "declined".to_string()),
            }),
        }
    }

    async fn refund(&self, booking: &booking::Model, amount: Decimal) -> StoreResult<()> {
        self.client
            .post(format!("{}/refunds", self.base_url))
            .json(&RefundRequest {
                booking_number: &booking.booking_number,
                reference: booking.payment_reference.as_deref(),
                amount,
            })
            .send()
            .await
            .map_err(gateway_err)?
            .error_for_status()
            .map_err(gateway_err)?;
        Ok(())
    }
}
