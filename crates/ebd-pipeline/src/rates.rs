//! # Rate Collaborator
//!
//! Carrier quotes for a destination CEP and parcel weight.
//!
//! ```text
//! ShippingService ──► RateCollaborator::get_carrier_rates
//!                          │
//!                          ├── HttpRateClient  POST {rate_api_url}/quotes
//!                          └── test doubles
//! ```
//!
//! A key missing from a successful answer means the carrier does not serve
//! that destination. Only an error or a timeout triggers the fallback rates.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use url::Url;

use ebd_core::{CarrierQuote, CarrierRate, Money, MAX_DELIVERY_BUSINESS_DAYS, MAX_PRICE};

use crate::error::{CollaboratorStep, PipelineError, PipelineResult};
use crate::http::parse_base_url;

#[async_trait]
pub trait RateCollaborator: Send + Sync {
    /// Quotes standard (PAC) and express (SEDEX) delivery.
    ///
    /// `item_quantities` holds `(variant_id, quantity)` pairs.
    async fn get_carrier_rates(
        &self,
        postal_code: &str,
        total_weight_grams: u64,
        item_quantities: &[(String, i64)],
    ) -> PipelineResult<CarrierQuote>;
}

// =============================================================================
// Wire Format
// =============================================================================

#[derive(Debug, Serialize)]
struct QuoteRequest<'a> {
    origin_postal_code: &'a str,
    destination_postal_code: &'a str,
    total_weight_grams: u64,
    items: Vec<QuoteItem<'a>>,
}

#[derive(Debug, Serialize)]
struct QuoteItem<'a> {
    variant_id: &'a str,
    quantity: i64,
}

#[derive(Debug, Deserialize)]
struct QuoteResponse {
    #[serde(default)]
    standard: Option<QuotedRate>,
    #[serde(default)]
    express: Option<QuotedRate>,
}

#[derive(Debug, Deserialize)]
struct QuotedRate {
    cost_cents: i64,
    business_days: u32,
}

impl QuotedRate {
    /// Rejects answers no carrier would give, so the fallback rates apply.
    fn into_rate(self) -> PipelineResult<CarrierRate> {
        let implausible = |message: String| PipelineError::Collaborator {
            step: CollaboratorStep::CarrierRates,
            message,
            retryable: false,
        };
        if self.cost_cents < 0 || self.cost_cents > MAX_PRICE.cents() {
            return Err(implausible(format!("rate out of range: {}", self.cost_cents)));
        }
        if self.business_days > MAX_DELIVERY_BUSINESS_DAYS {
            return Err(implausible(format!(
                "delivery estimate of {} business days",
                self.business_days
            )));
        }
        Ok(CarrierRate {
            cost: Money::from_cents(self.cost_cents),
            business_days: self.business_days,
        })
    }
}

// =============================================================================
// HTTP Client
// =============================================================================

/// Rate collaborator over HTTP/JSON.
#[derive(Debug, Clone)]
pub struct HttpRateClient {
    client: Client,
    base_url: Url,
    origin_postal_code: String,
    timeout_secs: u64,
}

impl HttpRateClient {
    pub fn new(base_url: &str, origin_postal_code: impl Into<String>, timeout: Duration) -> PipelineResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::InvalidConfig(format!("rate client: {}", e)))?;

        Ok(HttpRateClient {
            client,
            base_url: parse_base_url(base_url)?,
            origin_postal_code: origin_postal_code.into(),
            timeout_secs: timeout.as_secs(),
        })
    }

    fn quotes_url(&self) -> PipelineResult<Url> {
        Ok(self.base_url.join("quotes")?)
    }
}

#[async_trait]
impl RateCollaborator for HttpRateClient {
    async fn get_carrier_rates(
        &self,
        postal_code: &str,
        total_weight_grams: u64,
        item_quantities: &[(String, i64)],
    ) -> PipelineResult<CarrierQuote> {
        let step = CollaboratorStep::CarrierRates;
        let request = QuoteRequest {
            origin_postal_code: &self.origin_postal_code,
            destination_postal_code: postal_code,
            total_weight_grams,
            items: item_quantities
                .iter()
                .map(|(variant_id, quantity)| QuoteItem {
                    variant_id,
                    quantity: *quantity,
                })
                .collect(),
        };

        let response = self
            .client
            .post(self.quotes_url()?)
            .json(&request)
            .send()
            .await
            .map_err(|e| PipelineError::transport(step, e, self.timeout_secs))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PipelineError::transport(step, e, self.timeout_secs))?;

        debug!(status = %status, postal_code = %postal_code, "Carrier quote response");

        if !status.is_success() {
            return Err(PipelineError::http_status(step, status, body));
        }

        let parsed: QuoteResponse = serde_json::from_str(&body).map_err(|e| PipelineError::Collaborator {
            step,
            message: format!("unreadable quote: {}", e),
            retryable: false,
        })?;

        let quote = CarrierQuote {
            standard: parsed.standard.map(QuotedRate::into_rate).transpose()?,
            express: parsed.express.map(QuotedRate::into_rate).transpose()?,
        };

        info!(
            postal_code = %postal_code,
            standard = quote.standard.is_some(),
            express = quote.express.is_some(),
            "Carrier quote received"
        );
        Ok(quote)
    }
}
