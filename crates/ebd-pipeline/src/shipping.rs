//! # Shipping Option Resolver
//!
//! Asks the rate collaborator for carrier quotes and assembles the options
//! shown to the customer.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Resolving Shipping Options                          │
//! │                                                                         │
//! │  postal code + items + discounted subtotal                             │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  validate CEP and items ──(invalid)──► ValidationError, no quote call  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  RateCollaborator (bounded by timeout)                                 │
//! │       │                                                                 │
//! │       ├── Ok(quote)          → offered services only                   │
//! │       └── Err / timeout      → fallback PAC R$ 15,00 / SEDEX R$ 25,00  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  + "Frete grátis" when subtotal ≥ threshold                            │
//! │  + pickup points (always, cost zero)                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Nothing is pre-selected. The customer picks one option.

use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use ebd_core::pricing::total_weight_grams;
use ebd_core::shipping::{assemble_shipping_options, destination_today, ShippingRules};
use ebd_core::validation::{normalize_postal_code, validate_items};
use ebd_core::{CarrierQuote, LineItem, Money, Proposal, ShippingOption};

use crate::config::ShippingSettings;
use crate::error::PipelineResult;
use crate::rates::RateCollaborator;

#[derive(Clone)]
pub struct ShippingService {
    rates: Arc<dyn RateCollaborator>,
    rules: ShippingRules,
    default_item_grams: u32,
    timeout: Duration,
}

impl ShippingService {
    pub fn new(rates: Arc<dyn RateCollaborator>, settings: &ShippingSettings) -> Self {
        ShippingService {
            rates,
            rules: settings.rules(),
            default_item_grams: settings.default_item_grams,
            timeout: settings.rate_timeout(),
        }
    }

    pub fn rules(&self) -> &ShippingRules {
        &self.rules
    }

    /// Options for a destination and a list of items.
    ///
    /// ## Errors
    /// Only validation errors. Carrier failures fall back to fixed rates.
    pub async fn resolve_shipping_options(
        &self,
        postal_code: &str,
        items: &[LineItem],
        discounted_subtotal: Money,
        now: DateTime<Utc>,
    ) -> PipelineResult<Vec<ShippingOption>> {
        let postal_code = normalize_postal_code(postal_code)?;
        validate_items(items)?;

        let weight = total_weight_grams(items, self.default_item_grams);
        let quantities: Vec<(String, i64)> = items.iter().map(|i| (i.variant_id.clone(), i.quantity)).collect();

        let quote = self.quote(&postal_code, weight, &quantities).await;
        let options = assemble_shipping_options(quote.as_ref(), discounted_subtotal, &self.rules, destination_today(now));

        debug!(
            postal_code = %postal_code,
            weight_grams = weight,
            options = options.len(),
            fallback = quote.is_none(),
            "Shipping options resolved"
        );
        Ok(options)
    }

    /// Options for a proposal's current items.
    pub async fn options_for(&self, proposal: &Proposal, now: DateTime<Utc>) -> PipelineResult<Vec<ShippingOption>> {
        let subtotal = proposal.totals()?.subtotal_discounted;
        self.resolve_shipping_options(&proposal.postal_code, &proposal.items, subtotal, now)
            .await
    }

    /// `None` when the fallback rates must be used.
    async fn quote(&self, postal_code: &str, weight: u64, quantities: &[(String, i64)]) -> Option<CarrierQuote> {
        let call = self.rates.get_carrier_rates(postal_code, weight, quantities);
        match tokio::time::timeout(self.timeout, call).await {
            Ok(Ok(quote)) => Some(quote),
            Ok(Err(e)) => {
                warn!(postal_code = %postal_code, error = %e, "Carrier quote failed, using fallback rates");
                None
            }
            Err(_) => {
                warn!(
                    postal_code = %postal_code,
                    timeout_secs = self.timeout.as_secs(),
                    "Carrier quote timed out, using fallback rates"
                );
                None
            }
        }
    }
}
