//! # Proposal
//!
//! The proposal a seller shares with a customer: items, pricing context,
//! shipping choice and invoicing terms, plus the lifecycle that takes it from
//! editable draft to paid sale.
//!
//! ## Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │   Pending ──accept()──► Accepted ──mark_awaiting_payment()──►           │
//! │   (editable)            (totals frozen)        AwaitingPayment          │
//! │      │                     │    │                    │                  │
//! │      │                     │    └─record_invoiced_order()               │
//! │      │                     │      (stays Accepted)   │                  │
//! │      │                     │                         │                  │
//! │      │                     └───────mark_paid()───────┴──► Paid          │
//! │      │                                                                  │
//! │      └──── cancel() from any non-terminal state ─────────► Cancelled    │
//! │                                                                         │
//! │   Every transition goes through ProposalStatus::can_transition_to.      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Recomputation
//! Item edits return [`ProposalEvent::ItemsChanged`]. Whoever owns the
//! proposal reacts to it by fetching fresh shipping options and passing them
//! to [`Proposal::refresh_shipping`]. Nothing recomputes behind the caller's
//! back.

use chrono::{DateTime, Duration, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::pricing::{price_items, total_weight_grams};
use crate::shipping::{check_shipping_choice, ShippingRules};
use crate::types::{
    CheckoutStrategy, ClientClassification, InstallmentPlan, LineItem, ProposalStatus,
    ShippingOption,
};
use crate::validation::{normalize_postal_code, validate_items, validate_price, validate_quantity};
use crate::MAX_PROPOSAL_ITEMS;

// =============================================================================
// Events
// =============================================================================

/// Emitted by item mutations so the owner can re-resolve shipping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProposalEvent {
    ItemsChanged { proposal_id: String },
}

// =============================================================================
// Totals
// =============================================================================

/// One slice of the grand total under an installment plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct InstallmentDue {
    /// 1-based.
    pub sequence: u32,
    pub amount: Money,
    /// Days after confirmation.
    pub due_in_days: i64,
}

impl InstallmentDue {
    pub fn due_date(&self, base: NaiveDate) -> NaiveDate {
        base + Duration::days(self.due_in_days)
    }
}

/// Money summary of a proposal.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ProposalTotals {
    pub subtotal_original: Money,
    pub total_discount: Money,
    pub subtotal_discounted: Money,
    pub shipping: Money,
    /// `subtotal_discounted + shipping`.
    pub grand_total: Money,
    /// Empty unless invoicing is enabled and a plan is chosen.
    pub installments: Vec<InstallmentDue>,
}

/// Computes totals for a set of inputs.
///
/// Installments split the grand total evenly; leftover centavos go to the
/// last installment.
///
/// ## Example
/// ```rust
/// use ebd_core::{ClientClassification, InstallmentPlan, LineItem, Money};
/// use ebd_core::proposal::compute_totals;
///
/// let items = vec![LineItem::new("v-1", "Revista", Money::from_cents(10000), 1).unwrap()];
/// let totals = compute_totals(
///     &items,
///     &ClientClassification::unclassified(),
///     Money::from_cents(1001),
///     Some(InstallmentPlan::ThreeInstallments30_60_90),
/// ).unwrap();
///
/// assert_eq!(totals.grand_total.cents(), 11001);
/// let amounts: Vec<i64> = totals.installments.iter().map(|i| i.amount.cents()).collect();
/// assert_eq!(amounts, vec![3667, 3667, 3667]);
/// ```
pub fn compute_totals(
    items: &[LineItem],
    classification: &ClientClassification,
    shipping: Money,
    plan: Option<InstallmentPlan>,
) -> CoreResult<ProposalTotals> {
    validate_price("shipping", shipping)?;
    let priced = price_items(items, classification)?;
    let grand_total = priced.subtotal_discounted + shipping;

    let installments = match plan {
        Some(plan) => grand_total
            .split_evenly(plan.installment_count())
            .into_iter()
            .zip(plan.due_offsets_days())
            .enumerate()
            .map(|(index, (amount, offset))| InstallmentDue {
                sequence: index as u32 + 1,
                amount,
                due_in_days: *offset,
            })
            .collect(),
        None => Vec::new(),
    };

    Ok(ProposalTotals {
        subtotal_original: priced.subtotal_original,
        total_discount: priced.total_discount,
        subtotal_discounted: priced.subtotal_discounted,
        shipping,
        grand_total,
        installments,
    })
}

// =============================================================================
// Proposal
// =============================================================================

/// Input for [`Proposal::new`].
#[derive(Debug, Clone)]
pub struct NewProposal {
    pub seller_id: String,
    pub client_name: String,
    pub postal_code: String,
    pub classification: ClientClassification,
    pub items: Vec<LineItem>,
    pub checkout: CheckoutStrategy,
}

/// A priced offer to one customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Proposal {
    pub id: String,
    pub seller_id: String,
    pub client_name: String,
    /// Destination CEP, 8 digits.
    pub postal_code: String,
    pub items: Vec<LineItem>,
    pub classification: ClientClassification,

    pub selected_shipping: Option<ShippingOption>,
    /// Shipping value pre-set by the seller. Mutually exclusive with
    /// `selected_shipping`.
    pub manual_shipping: Option<Money>,

    pub invoicing_enabled: bool,
    pub selected_installment_plan: Option<InstallmentPlan>,

    pub status: ProposalStatus,
    pub checkout: CheckoutStrategy,

    /// Set at acceptance; never recomputed afterwards.
    pub frozen_totals: Option<ProposalTotals>,
    pub payment_link: Option<String>,
    /// Order id in the invoicing system.
    pub external_order_id: Option<String>,

    #[ts(as = "Option<String>")]
    pub confirmed_at: Option<DateTime<Utc>>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
    #[ts(as = "String")]
    pub updated_at: DateTime<Utc>,
}

impl Proposal {
    /// Creates a pending proposal.
    ///
    /// Items must be non-empty with unique variants; the postal code is
    /// normalized to its 8-digit form.
    pub fn new(input: NewProposal, now: DateTime<Utc>) -> CoreResult<Self> {
        if input.seller_id.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "seller".to_string(),
            }
            .into());
        }
        if input.client_name.trim().is_empty() {
            return Err(ValidationError::Required {
                field: "client name".to_string(),
            }
            .into());
        }
        let postal_code = normalize_postal_code(&input.postal_code)?;
        validate_items(&input.items)?;
        input.classification.validate()?;

        Ok(Proposal {
            id: Uuid::new_v4().to_string(),
            seller_id: input.seller_id,
            client_name: input.client_name.trim().to_string(),
            postal_code,
            items: input.items,
            classification: input.classification,
            selected_shipping: None,
            manual_shipping: None,
            invoicing_enabled: false,
            selected_installment_plan: None,
            status: ProposalStatus::Pending,
            checkout: input.checkout,
            frozen_totals: None,
            payment_link: None,
            external_order_id: None,
            confirmed_at: None,
            created_at: now,
            updated_at: now,
        })
    }

    // -------------------------------------------------------------------------
    // Derived values
    // -------------------------------------------------------------------------

    /// Shipping cost currently in effect, if any was chosen.
    pub fn shipping_cost(&self) -> Option<Money> {
        self.manual_shipping
            .or_else(|| self.selected_shipping.as_ref().map(|o| o.cost))
    }

    /// Current totals. Frozen totals win once the proposal is accepted.
    pub fn totals(&self) -> CoreResult<ProposalTotals> {
        if let Some(frozen) = &self.frozen_totals {
            return Ok(frozen.clone());
        }
        let plan = if self.invoicing_enabled {
            self.selected_installment_plan
        } else {
            None
        };
        compute_totals(
            &self.items,
            &self.classification,
            self.shipping_cost().unwrap_or_default(),
            plan,
        )
    }

    /// Weight sent to the carrier quote.
    pub fn total_weight_grams(&self, default_item_grams: u32) -> u64 {
        total_weight_grams(&self.items, default_item_grams)
    }

    /// `(variant_id, quantity)` pairs sent to the carrier quote.
    pub fn item_quantities(&self) -> Vec<(String, i64)> {
        self.items
            .iter()
            .map(|i| (i.variant_id.clone(), i.quantity))
            .collect()
    }

    pub fn is_editable(&self) -> bool {
        self.status == ProposalStatus::Pending
    }

    // -------------------------------------------------------------------------
    // Mutations (Pending only)
    // -------------------------------------------------------------------------

    pub fn add_item(&mut self, item: LineItem, now: DateTime<Utc>) -> CoreResult<ProposalEvent> {
        self.ensure_editable("add items")?;
        item.validate()?;
        if self.items.iter().any(|i| i.variant_id == item.variant_id) {
            return Err(CoreError::DuplicateItem(item.variant_id));
        }
        if self.items.len() >= MAX_PROPOSAL_ITEMS {
            return Err(CoreError::ProposalTooLarge {
                max: MAX_PROPOSAL_ITEMS,
            });
        }
        self.items.push(item);
        Ok(self.items_changed(now))
    }

    pub fn update_quantity(
        &mut self,
        variant_id: &str,
        quantity: i64,
        now: DateTime<Utc>,
    ) -> CoreResult<ProposalEvent> {
        self.ensure_editable("change quantities")?;
        validate_quantity(quantity)?;
        let item = self
            .items
            .iter_mut()
            .find(|i| i.variant_id == variant_id)
            .ok_or_else(|| CoreError::ItemNotFound(variant_id.to_string()))?;
        item.quantity = quantity;
        Ok(self.items_changed(now))
    }

    pub fn remove_item(&mut self, variant_id: &str, now: DateTime<Utc>) -> CoreResult<ProposalEvent> {
        self.ensure_editable("remove items")?;
        let before = self.items.len();
        self.items.retain(|i| i.variant_id != variant_id);
        if self.items.len() == before {
            return Err(CoreError::ItemNotFound(variant_id.to_string()));
        }
        Ok(self.items_changed(now))
    }

    /// Records the customer's shipping choice. Clears any manual value.
    ///
    /// ## Errors
    /// [`CoreError::ShippingNotAvailable`] for a charged or unknown pickup
    /// point, or free shipping below the threshold.
    pub fn select_shipping(&mut self, option: ShippingOption, rules: &ShippingRules, now: DateTime<Utc>) -> CoreResult<()> {
        self.ensure_editable("choose shipping")?;
        validate_price("shipping", option.cost)?;
        check_shipping_choice(&option, self.totals()?.subtotal_discounted, rules)?;
        self.selected_shipping = Some(option);
        self.manual_shipping = None;
        self.updated_at = now;
        Ok(())
    }

    /// Pre-sets a shipping value agreed by the seller. Clears any selected
    /// option.
    pub fn set_manual_shipping(&mut self, cost: Money, now: DateTime<Utc>) -> CoreResult<()> {
        self.ensure_editable("set shipping")?;
        validate_price("shipping", cost)?;
        self.manual_shipping = Some(cost);
        self.selected_shipping = None;
        self.updated_at = now;
        Ok(())
    }

    /// Turns invoiced terms on or off. Only clients granted invoicing may
    /// turn it on; turning it off drops the chosen plan.
    pub fn set_invoicing(&mut self, enabled: bool, now: DateTime<Utc>) -> CoreResult<()> {
        self.ensure_editable("change payment terms")?;
        if enabled && !self.classification.grants_invoicing() {
            return Err(CoreError::InvoicingNotEnabled);
        }
        self.invoicing_enabled = enabled;
        if !enabled {
            self.selected_installment_plan = None;
        }
        self.updated_at = now;
        Ok(())
    }

    pub fn select_installment_plan(&mut self, plan: InstallmentPlan, now: DateTime<Utc>) -> CoreResult<()> {
        self.ensure_editable("choose an installment plan")?;
        if !self.invoicing_enabled {
            return Err(CoreError::InvoicingNotEnabled);
        }
        self.selected_installment_plan = Some(plan);
        self.updated_at = now;
        Ok(())
    }

    /// Reconciles the selected option with a fresh list of offers.
    ///
    /// A selection still offered is replaced by the fresh offer (its cost may
    /// have changed). A selection no longer offered is cleared. Returns `true`
    /// when the selection was cleared.
    pub fn refresh_shipping(&mut self, offered: &[ShippingOption], now: DateTime<Utc>) -> CoreResult<bool> {
        self.ensure_editable("refresh shipping")?;
        let Some(selected) = &self.selected_shipping else {
            return Ok(false);
        };

        let cleared = match offered.iter().find(|o| o.same_offer(selected)) {
            Some(fresh) => {
                self.selected_shipping = Some(fresh.clone());
                false
            }
            None => {
                self.selected_shipping = None;
                true
            }
        };
        self.updated_at = now;
        Ok(cleared)
    }

    // -------------------------------------------------------------------------
    // Transitions
    // -------------------------------------------------------------------------

    /// Customer confirmation. Freezes the totals.
    ///
    /// The selected option is checked again against `rules`, since item edits
    /// may have moved the subtotal since it was chosen.
    ///
    /// ## Errors
    /// - [`CoreError::ShippingNotSelected`] without selected or manual shipping
    /// - [`CoreError::ShippingNotAvailable`] when the selection no longer holds
    /// - [`CoreError::InstallmentPlanNotSelected`] when invoiced without a plan
    /// - [`CoreError::InvalidProposalStatus`] unless `Pending`
    pub fn accept(&mut self, rules: &ShippingRules, now: DateTime<Utc>) -> CoreResult<&ProposalTotals> {
        self.ensure_transition(ProposalStatus::Accepted, "accept")?;
        validate_items(&self.items)?;
        if self.shipping_cost().is_none() {
            return Err(CoreError::ShippingNotSelected);
        }
        if self.invoicing_enabled && self.selected_installment_plan.is_none() {
            return Err(CoreError::InstallmentPlanNotSelected);
        }

        let totals = self.totals()?;
        if let Some(option) = &self.selected_shipping {
            check_shipping_choice(option, totals.subtotal_discounted, rules)?;
        }
        self.status = ProposalStatus::Accepted;
        self.confirmed_at = Some(now);
        self.updated_at = now;
        Ok(self.frozen_totals.insert(totals))
    }

    /// Attaches the payment link of a non-invoiced proposal.
    pub fn mark_awaiting_payment(&mut self, payment_link: String, now: DateTime<Utc>) -> CoreResult<()> {
        self.ensure_transition(ProposalStatus::AwaitingPayment, "request payment")?;
        if self.invoicing_enabled {
            return Err(self.invalid_status("request a payment link for an invoiced proposal"));
        }
        self.payment_link = Some(payment_link);
        self.status = ProposalStatus::AwaitingPayment;
        self.updated_at = now;
        Ok(())
    }

    /// Records the order created in the invoicing system. The proposal stays
    /// `Accepted` until it is marked paid.
    pub fn record_invoiced_order(&mut self, external_order_id: String, now: DateTime<Utc>) -> CoreResult<()> {
        if self.status != ProposalStatus::Accepted {
            return Err(self.invalid_status("create an invoiced order"));
        }
        if !self.invoicing_enabled {
            return Err(CoreError::InvoicingNotEnabled);
        }
        if self.external_order_id.is_some() {
            return Err(self.invalid_status("create a second invoiced order"));
        }
        self.external_order_id = Some(external_order_id);
        self.updated_at = now;
        Ok(())
    }

    /// Settles the sale. From `Accepted` only once an invoiced order exists.
    pub fn mark_paid(&mut self, now: DateTime<Utc>) -> CoreResult<()> {
        self.ensure_transition(ProposalStatus::Paid, "mark as paid")?;
        if self.status == ProposalStatus::Accepted && self.external_order_id.is_none() {
            return Err(self.invalid_status("mark as paid before the order is created"));
        }
        self.status = ProposalStatus::Paid;
        self.updated_at = now;
        Ok(())
    }

    pub fn cancel(&mut self, now: DateTime<Utc>) -> CoreResult<()> {
        self.ensure_transition(ProposalStatus::Cancelled, "cancel")?;
        self.status = ProposalStatus::Cancelled;
        self.updated_at = now;
        Ok(())
    }

    // -------------------------------------------------------------------------
    // Helpers
    // -------------------------------------------------------------------------

    fn items_changed(&mut self, now: DateTime<Utc>) -> ProposalEvent {
        self.updated_at = now;
        ProposalEvent::ItemsChanged {
            proposal_id: self.id.clone(),
        }
    }

    fn ensure_editable(&self, operation: &str) -> CoreResult<()> {
        if self.is_editable() {
            Ok(())
        } else {
            Err(self.invalid_status(operation))
        }
    }

    fn ensure_transition(&self, next: ProposalStatus, operation: &str) -> CoreResult<()> {
        if self.status.can_transition_to(next) {
            Ok(())
        } else {
            Err(self.invalid_status(operation))
        }
    }

    fn invalid_status(&self, operation: &str) -> CoreError {
        CoreError::InvalidProposalStatus {
            proposal_id: self.id.clone(),
            current: self.status,
            operation: operation.to_string(),
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
