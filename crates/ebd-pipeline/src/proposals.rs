//! # Proposal Service
//!
//! Drives proposals through their lifecycle against the collaborators.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Proposal Lifecycle                               │
//! │                                                                         │
//! │  create ──► Pending ◄──── item edits ──► ItemsChanged                  │
//! │                │                              │                         │
//! │                │                              ▼                         │
//! │                │                  re-resolve shipping options,          │
//! │                │                  clear a choice no longer offered      │
//! │                ▼                                                        │
//! │  accept ──► Accepted (totals frozen)                                   │
//! │                │                                                        │
//! │      ┌─────────┴──────────────┐                                         │
//! │      ▼ standard terms         ▼ invoiced terms                          │
//! │  request_payment_link     create_invoiced_order                        │
//! │      │                        │  (stays Accepted)                       │
//! │      ▼                        │                                         │
//! │  AwaitingPayment              │                                         │
//! │      └─────────┬──────────────┘                                         │
//! │                ▼                                                        │
//! │  mark_paid ──► Paid ──► commission installments                        │
//! │                                                                         │
//! │  cancel: from any non-terminal state                                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A failed collaborator call leaves the stored proposal untouched. The
//! error carries the collaborator's message.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tracing::{info, warn};

use ebd_core::shipping::destination_today;
use ebd_core::{
    CommissionContext, CommissionInstallment, CoreError, InstallmentPlan, LineItem, Money, NewProposal, Proposal,
    ProposalEvent, ProposalStatus, ShippingOption,
};

use crate::commissions::{CommissionService, SaleRecord};
use crate::config::CheckoutSettings;
use crate::error::{CollaboratorStep, PipelineError, PipelineResult};
use crate::payments::PaymentCollaborator;
use crate::shipping::ShippingService;
use crate::store::ProposalStore;

/// Result of an item edit: the proposal after shipping was re-resolved.
#[derive(Debug, Clone)]
pub struct RepricedProposal {
    pub proposal: Proposal,
    pub shipping_options: Vec<ShippingOption>,
    /// The customer's shipping choice is no longer offered and was dropped.
    pub shipping_cleared: bool,
}

#[derive(Clone)]
pub struct ProposalService {
    store: Arc<dyn ProposalStore>,
    shipping: ShippingService,
    payments: Arc<dyn PaymentCollaborator>,
    commissions: CommissionService,
    checkout: CheckoutSettings,
    payment_timeout: Duration,
}

impl ProposalService {
    pub fn new(
        store: Arc<dyn ProposalStore>,
        shipping: ShippingService,
        payments: Arc<dyn PaymentCollaborator>,
        commissions: CommissionService,
        checkout: CheckoutSettings,
        payment_timeout: Duration,
    ) -> Self {
        ProposalService {
            store,
            shipping,
            payments,
            commissions,
            checkout,
            payment_timeout,
        }
    }

    // =========================================================================
    // Creation and Lookup
    // =========================================================================

    /// Creates a pending proposal. The checkout strategy is resolved here,
    /// from the seller's e-mail, and never again.
    pub async fn create(&self, mut input: NewProposal, seller_email: &str) -> PipelineResult<Proposal> {
        input.checkout = self.checkout.strategy_for(seller_email);
        let proposal = Proposal::new(input, Utc::now())?;
        self.store.insert(&proposal).await?;

        info!(
            proposal_id = %proposal.id,
            seller_id = %proposal.seller_id,
            items = proposal.items.len(),
            checkout = ?proposal.checkout,
            "Proposal created"
        );
        Ok(proposal)
    }

    pub async fn get(&self, id: &str) -> PipelineResult<Proposal> {
        self.store
            .get(id)
            .await?
            .ok_or_else(|| PipelineError::ProposalNotFound(id.to_string()))
    }

    /// Options the customer can choose from right now.
    pub async fn shipping_options(&self, id: &str) -> PipelineResult<Vec<ShippingOption>> {
        let proposal = self.get(id).await?;
        self.shipping.options_for(&proposal, Utc::now()).await
    }

    // =========================================================================
    // Item Edits
    // =========================================================================

    pub async fn add_item(&self, id: &str, item: LineItem) -> PipelineResult<RepricedProposal> {
        let mut proposal = self.get(id).await?;
        let event = proposal.add_item(item, Utc::now())?;
        self.apply_items_changed(proposal, event).await
    }

    pub async fn update_quantity(&self, id: &str, variant_id: &str, quantity: i64) -> PipelineResult<RepricedProposal> {
        let mut proposal = self.get(id).await?;
        let event = proposal.update_quantity(variant_id, quantity, Utc::now())?;
        self.apply_items_changed(proposal, event).await
    }

    pub async fn remove_item(&self, id: &str, variant_id: &str) -> PipelineResult<RepricedProposal> {
        let mut proposal = self.get(id).await?;
        let event = proposal.remove_item(variant_id, Utc::now())?;
        self.apply_items_changed(proposal, event).await
    }

    /// Re-resolves shipping after an item edit and persists the result.
    ///
    /// The weight and subtotal changed, so quotes and the free-shipping
    /// option may differ. A choice still offered picks up its new cost.
    async fn apply_items_changed(&self, mut proposal: Proposal, event: ProposalEvent) -> PipelineResult<RepricedProposal> {
        let ProposalEvent::ItemsChanged { proposal_id } = event;
        let now = Utc::now();

        // Removing the last item leaves nothing to quote
        let (shipping_options, shipping_cleared) = if proposal.items.is_empty() {
            let cleared = proposal.refresh_shipping(&[], now)?;
            (Vec::new(), cleared)
        } else {
            let options = self.shipping.options_for(&proposal, now).await?;
            let cleared = proposal.refresh_shipping(&options, now)?;
            (options, cleared)
        };

        if shipping_cleared {
            warn!(proposal_id = %proposal_id, "Selected shipping no longer offered, selection cleared");
        }

        self.store.update(&proposal).await?;
        Ok(RepricedProposal {
            proposal,
            shipping_options,
            shipping_cleared,
        })
    }

    // =========================================================================
    // Customer Choices
    // =========================================================================

    /// Records the customer's choice among the options offered right now.
    ///
    /// The submitted option only names the offer. Cost and delivery estimate
    /// come from a fresh resolution, so a tampered option cannot lower the
    /// price or unlock free shipping.
    pub async fn select_shipping(&self, id: &str, option: ShippingOption) -> PipelineResult<Proposal> {
        let mut proposal = self.get(id).await?;
        if !proposal.is_editable() {
            return Err(invalid_status(&proposal, "choose shipping").into());
        }

        let now = Utc::now();
        let offered = self
            .shipping
            .options_for(&proposal, now)
            .await?
            .into_iter()
            .find(|o| o.same_offer(&option))
            .ok_or_else(|| CoreError::ShippingNotAvailable {
                label: option.label.clone(),
                reason: "not offered for this proposal".to_string(),
            })?;

        proposal.select_shipping(offered, self.shipping.rules(), now)?;
        self.store.update(&proposal).await?;
        Ok(proposal)
    }

    pub async fn set_manual_shipping(&self, id: &str, cost: Money) -> PipelineResult<Proposal> {
        self.edit(id, |proposal, now| proposal.set_manual_shipping(cost, now)).await
    }

    pub async fn set_invoicing(&self, id: &str, enabled: bool) -> PipelineResult<Proposal> {
        self.edit(id, |proposal, now| proposal.set_invoicing(enabled, now)).await
    }

    pub async fn select_installment_plan(&self, id: &str, plan: InstallmentPlan) -> PipelineResult<Proposal> {
        self.edit(id, |proposal, now| proposal.select_installment_plan(plan, now)).await
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Customer confirmation. Totals are frozen from here on.
    pub async fn accept(&self, id: &str) -> PipelineResult<Proposal> {
        let proposal = self
            .edit(id, |proposal, now| proposal.accept(self.shipping.rules(), now).map(|_| ()))
            .await?;
        if let Some(totals) = &proposal.frozen_totals {
            info!(proposal_id = %proposal.id, grand_total = %totals.grand_total, "Proposal accepted");
        }
        Ok(proposal)
    }

    /// Asks the payment collaborator for a link and moves the proposal to
    /// `AwaitingPayment`.
    ///
    /// ## Errors
    /// On collaborator failure the proposal stays `Accepted` and the error
    /// keeps the collaborator's message.
    pub async fn request_payment_link(&self, id: &str) -> PipelineResult<Proposal> {
        let mut proposal = self.get(id).await?;
        if proposal.status != ProposalStatus::Accepted || proposal.invoicing_enabled {
            return Err(invalid_status(&proposal, "request a payment link").into());
        }

        let link = self
            .bounded(CollaboratorStep::PaymentLink, self.payments.create_payment_link(&proposal))
            .await
            .inspect_err(|e| warn!(proposal_id = %proposal.id, error = %e, "Payment link failed, proposal stays accepted"))?;

        proposal.mark_awaiting_payment(link.url, Utc::now())?;
        self.store.update(&proposal).await?;

        info!(proposal_id = %proposal.id, checkout = ?proposal.checkout, "Proposal awaiting payment");
        Ok(proposal)
    }

    /// Creates the order in the invoicing system with the chosen plan. The
    /// proposal stays `Accepted` until it is marked paid.
    pub async fn create_invoiced_order(&self, id: &str) -> PipelineResult<Proposal> {
        let mut proposal = self.get(id).await?;
        if proposal.status != ProposalStatus::Accepted || proposal.external_order_id.is_some() {
            return Err(invalid_status(&proposal, "create an invoiced order").into());
        }
        if !proposal.invoicing_enabled {
            return Err(CoreError::InvoicingNotEnabled.into());
        }
        let plan = proposal
            .selected_installment_plan
            .ok_or(CoreError::InstallmentPlanNotSelected)?;

        let order = self
            .bounded(
                CollaboratorStep::InvoicedOrder,
                self.payments.create_invoiced_order(&proposal, plan),
            )
            .await
            .inspect_err(|e| warn!(proposal_id = %proposal.id, error = %e, "Invoiced order failed, proposal stays accepted"))?;

        proposal.record_invoiced_order(order.external_order_id, Utc::now())?;
        self.store.update(&proposal).await?;
        Ok(proposal)
    }

    /// Settles the sale and records the seller's commission.
    ///
    /// Invoiced sales split the commission like the customer's plan; other
    /// sales pay it in one installment.
    pub async fn mark_paid(&self, id: &str) -> PipelineResult<(Proposal, Vec<CommissionInstallment>)> {
        let proposal = self.edit(id, |proposal, now| proposal.mark_paid(now)).await?;
        info!(proposal_id = %proposal.id, "Proposal paid");

        let installments = self.record_commission(&proposal).await?;
        Ok((proposal, installments))
    }

    /// Commission installments of a paid proposal. Records them when missing,
    /// so a failed recording after payment can be retried.
    pub async fn record_commission(&self, proposal: &Proposal) -> PipelineResult<Vec<CommissionInstallment>> {
        if proposal.status != ProposalStatus::Paid {
            return Err(invalid_status(proposal, "pay commission").into());
        }

        let existing = self.commissions.installments_of_sale(&proposal.id).await?;
        if !existing.is_empty() {
            return Ok(existing);
        }

        let totals = proposal.totals()?;
        let installments = match (proposal.invoicing_enabled, proposal.selected_installment_plan) {
            (true, Some(plan)) => plan.installment_count(),
            _ => 1,
        };
        let sale = SaleRecord {
            sale_id: proposal.id.clone(),
            seller_id: proposal.seller_id.clone(),
            context: CommissionContext::GenericSale,
            sale_total: totals.grand_total,
            shipping_cost: totals.shipping,
        };

        self.commissions
            .record_sale(&sale, installments, destination_today(Utc::now()))
            .await
    }

    pub async fn cancel(&self, id: &str) -> PipelineResult<Proposal> {
        let proposal = self.edit(id, |proposal, now| proposal.cancel(now)).await?;
        info!(proposal_id = %proposal.id, "Proposal cancelled");
        Ok(proposal)
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Load, apply a state change, persist.
    async fn edit<F>(&self, id: &str, change: F) -> PipelineResult<Proposal>
    where
        F: FnOnce(&mut Proposal, DateTime<Utc>) -> Result<(), CoreError> + Send,
    {
        let mut proposal = self.get(id).await?;
        change(&mut proposal, Utc::now())?;
        self.store.update(&proposal).await?;
        Ok(proposal)
    }

    async fn bounded<T, F>(&self, step: CollaboratorStep, call: F) -> PipelineResult<T>
    where
        F: Future<Output = PipelineResult<T>> + Send,
    {
        match tokio::time::timeout(self.payment_timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(PipelineError::Timeout {
                step,
                secs: self.payment_timeout.as_secs(),
            }),
        }
    }
}

fn invalid_status(proposal: &Proposal, operation: &str) -> CoreError {
    CoreError::InvalidProposalStatus {
        proposal_id: proposal.id.clone(),
        current: proposal.status,
        operation: operation.to_string(),
    }
}
