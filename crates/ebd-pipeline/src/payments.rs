//! # Payment Collaborator
//!
//! Payment links for non-invoiced proposals and orders in the invoicing
//! system for invoiced ones.
//!
//! ## Routing
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Payment Routing                                  │
//! │                                                                         │
//! │  ProposalService                                                        │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  CheckoutRouter ── proposal.checkout == Standard ──► live client        │
//! │                 └─ proposal.checkout == Sandbox  ──► sandbox client     │
//! │                                                                         │
//! │  Both clients speak the same JSON API:                                  │
//! │    POST {base}/payment-links  → { "url": ... }                          │
//! │    POST {base}/orders         → { "id": ... }                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The strategy is decided once, when the proposal is created. Nothing here
//! looks at who the seller is.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use ebd_core::shipping::destination_today;
use ebd_core::{CheckoutStrategy, InstallmentPlan, Proposal};

use crate::config::PaymentSettings;
use crate::error::{CollaboratorStep, PipelineError, PipelineResult};
use crate::http::parse_base_url;

// =============================================================================
// Results
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentLink {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvoicedOrder {
    pub external_order_id: String,
}

#[async_trait]
pub trait PaymentCollaborator: Send + Sync {
    async fn create_payment_link(&self, proposal: &Proposal) -> PipelineResult<PaymentLink>;

    async fn create_invoiced_order(&self, proposal: &Proposal, plan: InstallmentPlan) -> PipelineResult<InvoicedOrder>;
}

// =============================================================================
// Wire Format
// =============================================================================

#[derive(Debug, Serialize)]
struct WireItem<'a> {
    variant_id: &'a str,
    title: &'a str,
    quantity: i64,
    unit_price_cents: i64,
}

#[derive(Debug, Serialize)]
struct PaymentLinkRequest<'a> {
    reference: &'a str,
    payer_name: &'a str,
    items: Vec<WireItem<'a>>,
    shipping_cents: i64,
    total_cents: i64,
}

#[derive(Debug, Deserialize)]
struct PaymentLinkResponse {
    url: String,
}

#[derive(Debug, Serialize)]
struct WireInstallment {
    sequence: u32,
    amount_cents: i64,
    due_date: NaiveDate,
}

#[derive(Debug, Serialize)]
struct InvoicedOrderRequest<'a> {
    reference: &'a str,
    client_name: &'a str,
    items: Vec<WireItem<'a>>,
    discount_cents: i64,
    shipping_cents: i64,
    total_cents: i64,
    plan: InstallmentPlan,
    installments: Vec<WireInstallment>,
}

#[derive(Debug, Deserialize)]
struct InvoicedOrderResponse {
    id: String,
}

fn wire_items(proposal: &Proposal) -> Vec<WireItem<'_>> {
    proposal
        .items
        .iter()
        .map(|item| WireItem {
            variant_id: &item.variant_id,
            title: &item.title,
            quantity: item.quantity,
            unit_price_cents: item.unit_price.cents(),
        })
        .collect()
}

// =============================================================================
// HTTP Client
// =============================================================================

/// Payment and invoicing collaborator over HTTP/JSON.
#[derive(Debug, Clone)]
pub struct HttpPaymentClient {
    client: Client,
    base_url: Url,
    access_token: Option<String>,
    timeout_secs: u64,
}

impl HttpPaymentClient {
    pub fn new(base_url: &str, access_token: Option<String>, timeout: Duration) -> PipelineResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PipelineError::InvalidConfig(format!("payment client: {}", e)))?;

        Ok(HttpPaymentClient {
            client,
            base_url: parse_base_url(base_url)?,
            access_token,
            timeout_secs: timeout.as_secs(),
        })
    }

    async fn post<Req, Resp>(&self, step: CollaboratorStep, route: &str, request: &Req) -> PipelineResult<Resp>
    where
        Req: Serialize + Sync,
        Resp: DeserializeOwned + Send,
    {
        let mut builder = self.client.post(self.base_url.join(route)?).json(request);
        if let Some(token) = &self.access_token {
            builder = builder.bearer_auth(token);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| PipelineError::transport(step, e, self.timeout_secs))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| PipelineError::transport(step, e, self.timeout_secs))?;

        debug!(status = %status, route = %route, "Payment collaborator response");

        if !status.is_success() {
            return Err(PipelineError::http_status(step, status, body));
        }

        serde_json::from_str(&body).map_err(|e| PipelineError::Collaborator {
            step,
            message: format!("unreadable response: {}", e),
            retryable: false,
        })
    }
}

#[async_trait]
impl PaymentCollaborator for HttpPaymentClient {
    async fn create_payment_link(&self, proposal: &Proposal) -> PipelineResult<PaymentLink> {
        let totals = proposal.totals()?;
        let request = PaymentLinkRequest {
            reference: &proposal.id,
            payer_name: &proposal.client_name,
            items: wire_items(proposal),
            shipping_cents: totals.shipping.cents(),
            total_cents: totals.grand_total.cents(),
        };

        let response: PaymentLinkResponse = self
            .post(CollaboratorStep::PaymentLink, "payment-links", &request)
            .await?;

        info!(proposal_id = %proposal.id, total = %totals.grand_total, "Payment link created");
        Ok(PaymentLink { url: response.url })
    }

    async fn create_invoiced_order(&self, proposal: &Proposal, plan: InstallmentPlan) -> PipelineResult<InvoicedOrder> {
        let totals = proposal.totals()?;
        let base = proposal
            .confirmed_at
            .map(destination_today)
            .unwrap_or_else(|| destination_today(proposal.updated_at));

        let request = InvoicedOrderRequest {
            reference: &proposal.id,
            client_name: &proposal.client_name,
            items: wire_items(proposal),
            discount_cents: totals.total_discount.cents(),
            shipping_cents: totals.shipping.cents(),
            total_cents: totals.grand_total.cents(),
            plan,
            installments: totals
                .installments
                .iter()
                .map(|due| WireInstallment {
                    sequence: due.sequence,
                    amount_cents: due.amount.cents(),
                    due_date: due.due_date(base),
                })
                .collect(),
        };

        let response: InvoicedOrderResponse = self.post(CollaboratorStep::InvoicedOrder, "orders", &request).await?;

        info!(
            proposal_id = %proposal.id,
            external_order_id = %response.id,
            installments = plan.installment_count(),
            "Invoiced order created"
        );
        Ok(InvoicedOrder {
            external_order_id: response.id,
        })
    }
}

// =============================================================================
// Checkout Router
// =============================================================================

/// Sends each proposal to the live or the sandbox collaborator according to
/// its [`CheckoutStrategy`].
#[derive(Clone)]
pub struct CheckoutRouter {
    live: Arc<dyn PaymentCollaborator>,
    sandbox: Arc<dyn PaymentCollaborator>,
}

impl CheckoutRouter {
    pub fn new(live: Arc<dyn PaymentCollaborator>, sandbox: Arc<dyn PaymentCollaborator>) -> Self {
        CheckoutRouter { live, sandbox }
    }

    /// Builds both HTTP clients from the payment settings.
    pub fn from_settings(settings: &PaymentSettings) -> PipelineResult<Self> {
        let live = HttpPaymentClient::new(&settings.api_url, settings.access_token.clone(), settings.timeout())?;
        let sandbox = HttpPaymentClient::new(
            &settings.sandbox_api_url,
            settings.sandbox_access_token.clone(),
            settings.timeout(),
        )?;
        Ok(CheckoutRouter::new(Arc::new(live), Arc::new(sandbox)))
    }

    fn route(&self, proposal: &Proposal) -> &dyn PaymentCollaborator {
        match proposal.checkout {
            CheckoutStrategy::Standard => self.live.as_ref(),
            CheckoutStrategy::Sandbox => {
                warn!(proposal_id = %proposal.id, "Routing proposal to the sandbox payment account");
                self.sandbox.as_ref()
            }
        }
    }
}

#[async_trait]
impl PaymentCollaborator for CheckoutRouter {
    async fn create_payment_link(&self, proposal: &Proposal) -> PipelineResult<PaymentLink> {
        self.route(proposal).create_payment_link(proposal).await
    }

    async fn create_invoiced_order(&self, proposal: &Proposal, plan: InstallmentPlan) -> PipelineResult<InvoicedOrder> {
        self.route(proposal).create_invoiced_order(proposal, plan).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use ebd_core::shipping::ShippingRules;
    use ebd_core::{ClientClassification, ClientType, LineItem, Money, NewProposal, Percent, ShippingKind, ShippingOption};
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn accepted_proposal(checkout: CheckoutStrategy, invoiced: bool) -> Proposal {
        let classification = if invoiced {
            ClientClassification::invoiced(ClientType::Reseller, Percent::from_bps(3000))
        } else {
            ClientClassification::unclassified()
        };
        let now = Utc::now();
        let mut proposal = Proposal::new(
            NewProposal {
                seller_id: "seller-1".to_string(),
                client_name: "Igreja Batista Central".to_string(),
                postal_code: "01310-100".to_string(),
                classification,
                items: vec![LineItem::new("rev-adu-alu", "Revista Adultos", Money::from_cents(1000), 10).unwrap()],
                checkout,
            },
            now,
        )
        .unwrap();
        proposal
            .select_shipping(
                ShippingOption {
                    kind: ShippingKind::CarrierStandard,
                    label: "PAC".to_string(),
                    cost: Money::from_cents(1500),
                    estimated_business_days: Some(5),
                    pickup_address: None,
                    estimated_delivery: None,
                },
                &ShippingRules::default(),
                now,
            )
            .unwrap();
        if invoiced {
            proposal.set_invoicing(true, now).unwrap();
            proposal
                .select_installment_plan(InstallmentPlan::TwoInstallments30_60, now)
                .unwrap();
        }
        proposal.accept(&ShippingRules::default(), now).unwrap();
        proposal
    }

    #[tokio::test]
    async fn test_payment_link_sends_totals_and_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/payment-links"))
            .and(header("authorization", "Bearer live-token"))
            .and(body_partial_json(serde_json::json!({
                "shipping_cents": 1500,
                "total_cents": 11500
            })))
            .respond_with(ResponseTemplate::new(201).set_body_json(serde_json::json!({
                "url": "https://pay.example/p/abc"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = HttpPaymentClient::new(&server.uri(), Some("live-token".into()), Duration::from_secs(2)).unwrap();
        let link = client
            .create_payment_link(&accepted_proposal(CheckoutStrategy::Standard, false))
            .await
            .unwrap();

        assert_eq!(link.url, "https://pay.example/p/abc");
    }

    #[tokio::test]
    async fn test_invoiced_order_sends_installments() {
        let server = MockServer::start().await;
        // 10 x R$ 10,00 with 30% off = 70,00 + 15,00 shipping = 85,00
        Mock::given(method("POST"))
            .and(path("/orders"))
            .and(body_partial_json(serde_json::json!({
                "discount_cents": 3000,
                "total_cents": 8500,
                "plan": "two_30_60"
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "id": "BL-000123" })))
            .mount(&server)
            .await;

        let proposal = accepted_proposal(CheckoutStrategy::Standard, true);
        let client = HttpPaymentClient::new(&server.uri(), None, Duration::from_secs(2)).unwrap();
        let order = client
            .create_invoiced_order(&proposal, InstallmentPlan::TwoInstallments30_60)
            .await
            .unwrap();

        assert_eq!(order.external_order_id, "BL-000123");
    }

    #[tokio::test]
    async fn test_rejection_keeps_collaborator_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_string("payer email is invalid"))
            .mount(&server)
            .await;

        let client = HttpPaymentClient::new(&server.uri(), None, Duration::from_secs(2)).unwrap();
        let err = client
            .create_payment_link(&accepted_proposal(CheckoutStrategy::Standard, false))
            .await
            .unwrap_err();

        assert!(!err.is_retryable());
        assert!(err.user_message().contains("payer email is invalid"));
    }

    #[tokio::test]
    async fn test_router_sends_sandbox_proposals_to_sandbox() {
        let live = MockServer::start().await;
        let sandbox = MockServer::start().await;

        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "url": "https://live" })))
            .expect(1)
            .mount(&live)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({ "url": "https://sandbox" })))
            .expect(1)
            .mount(&sandbox)
            .await;

        let settings = PaymentSettings {
            api_url: live.uri(),
            sandbox_api_url: sandbox.uri(),
            ..Default::default()
        };
        let router = CheckoutRouter::from_settings(&settings).unwrap();

        let standard = router
            .create_payment_link(&accepted_proposal(CheckoutStrategy::Standard, false))
            .await
            .unwrap();
        let test_seller = router
            .create_payment_link(&accepted_proposal(CheckoutStrategy::Sandbox, false))
            .await
            .unwrap();

        assert_eq!(standard.url, "https://live");
        assert_eq!(test_seller.url, "https://sandbox");
    }
}
