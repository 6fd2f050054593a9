//! # Domain Types
//!
//! Core domain types shared by every stage of the pricing pipeline.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌──────────────────────┐   ┌─────────────────┐  │
//! │  │    LineItem     │   │ ClientClassification │   │ ShippingOption  │  │
//! │  │  ─────────────  │   │  ──────────────────  │   │  ─────────────  │  │
//! │  │  variant_id     │   │  client_type         │   │  kind           │  │
//! │  │  unit_price     │   │  onboarding          │   │  cost           │  │
//! │  │  quantity       │   │  flat discount       │   │  business days  │  │
//! │  │  category       │   │  per-category table  │   │  pickup address │  │
//! │  └─────────────────┘   └──────────────────────┘   └─────────────────┘  │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────────┐   │
//! │  │    Percent      │   │ ProposalStatus  │   │  InstallmentPlan    │   │
//! │  │  bps (u32)      │   │  Pending        │   │  Single30           │   │
//! │  │  500 = 5%       │   │  Accepted ...   │   │  Three30_60_90 ...  │   │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreResult, ValidationError};
use crate::money::Money;
use crate::validation::{validate_percent, validate_price, validate_quantity, validate_variant_id};

// =============================================================================
// Percent
// =============================================================================

/// A percentage represented in basis points (bps).
///
/// ## Why Basis Points?
/// 1 basis point = 0.01%. Commission rates like 1.5% (150 bps) and discounts
/// like 42.5% stay exact integers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Percent(u32);

impl Percent {
    /// 100%.
    pub const FULL: Percent = Percent(10_000);

    /// Creates a percentage from basis points.
    #[inline]
    pub const fn from_bps(bps: u32) -> Self {
        Percent(bps)
    }

    /// Creates a percentage from a decimal percentage (for convenience).
    ///
    /// ## Example
    /// ```rust
    /// use ebd_core::types::Percent;
    ///
    /// assert_eq!(Percent::from_percentage(1.5).bps(), 150);
    /// ```
    pub fn from_percentage(pct: f64) -> Self {
        Percent((pct * 100.0).round().max(0.0) as u32)
    }

    /// Returns the rate in basis points.
    #[inline]
    pub const fn bps(&self) -> u32 {
        self.0
    }

    /// Returns the rate as a percentage (for display only).
    #[inline]
    pub fn percentage(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Zero percent.
    #[inline]
    pub const fn zero() -> Self {
        Percent(0)
    }

    #[inline]
    pub const fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl Default for Percent {
    fn default() -> Self {
        Percent::zero()
    }
}

impl fmt::Display for Percent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 % 100 == 0 {
            write!(f, "{}%", self.0 / 100)
        } else {
            write!(f, "{}%", self.percentage())
        }
    }
}

// =============================================================================
// Line Item
// =============================================================================

/// One product line within a proposal.
///
/// Every optional field is declared here and defaulted, so the rest of the
/// pipeline never looks up ad hoc keys. Build items with [`LineItem::new`],
/// which validates the invariants once.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct LineItem {
    /// Storefront variant identifier, unique within a proposal.
    pub variant_id: String,

    /// Display title (e.g. "Revista Adultos - Professor").
    pub title: String,

    /// Unit price in centavos.
    pub unit_price: Money,

    /// Quantity (≥ 1).
    pub quantity: i64,

    /// Classification tag used by per-category discount tables
    /// (e.g. "revistas", "livros").
    #[serde(default)]
    pub category: Option<String>,

    /// Negotiated discount for this item only.
    #[serde(default)]
    pub item_discount_override: Option<Percent>,

    /// Shipping weight of one unit, when the catalog knows it.
    #[serde(default)]
    pub weight_grams: Option<u32>,
}

impl LineItem {
    /// Creates a validated line item.
    ///
    /// ## Errors
    /// - empty `variant_id`
    /// - `unit_price` negative or above [`crate::MAX_PRICE`]
    /// - `quantity` < 1 or above [`crate::MAX_ITEM_QUANTITY`]
    pub fn new(
        variant_id: impl Into<String>,
        title: impl Into<String>,
        unit_price: Money,
        quantity: i64,
    ) -> CoreResult<Self> {
        let item = LineItem {
            variant_id: variant_id.into(),
            title: title.into(),
            unit_price,
            quantity,
            category: None,
            item_discount_override: None,
            weight_grams: None,
        };
        item.validate()?;
        Ok(item)
    }

    /// Sets the category tag.
    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    /// Sets an item-level discount override.
    pub fn with_discount_override(mut self, discount: Percent) -> CoreResult<Self> {
        validate_percent("item discount", discount)?;
        self.item_discount_override = Some(discount);
        Ok(self)
    }

    /// Sets the unit weight.
    pub fn with_weight_grams(mut self, grams: u32) -> Self {
        self.weight_grams = Some(grams);
        self
    }

    /// Re-checks every invariant. Used on values that arrive deserialized.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_variant_id(&self.variant_id)?;
        validate_price("unit price", self.unit_price)?;
        validate_quantity(self.quantity)?;
        if let Some(discount) = self.item_discount_override {
            validate_percent("item discount", discount)?;
        }
        Ok(())
    }

    /// Unit price × quantity.
    #[inline]
    pub fn original_total(&self) -> Money {
        self.unit_price.multiply_quantity(self.quantity)
    }
}

// =============================================================================
// Client Classification
// =============================================================================

/// Pricing-relevant relationship with the customer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ClientType {
    /// Bookstore or distributor buying for resale.
    Reseller,
    /// Church with a complete CNPJ registration.
    ChurchWithRegistration,
    /// Person buying for themselves.
    Individual,
    /// Regional representative with a negotiated per-category table.
    Representative,
    #[default]
    Unclassified,
}

impl ClientType {
    /// Types that may buy on invoiced (faturado) terms.
    pub fn is_invoicing_eligible(&self) -> bool {
        matches!(
            self,
            ClientType::Reseller | ClientType::ChurchWithRegistration
        )
    }
}

/// Pricing-relevant facts about a customer.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ClientClassification {
    pub client_type: ClientType,

    /// Whether the client finished onboarding (documents, registration).
    pub onboarding_completed: bool,

    /// Flat discount applied to invoiced purchases.
    #[serde(default)]
    pub flat_invoicing_discount: Percent,

    /// Per-category table. When present it overrides every other rule for
    /// the categories it lists.
    #[serde(default)]
    pub per_category_discounts: Option<BTreeMap<String, Percent>>,
}

impl ClientClassification {
    /// A client nobody has classified yet: no discounts of any kind.
    pub fn unclassified() -> Self {
        Self::default()
    }

    /// An onboarded client eligible for invoicing with a flat discount.
    pub fn invoiced(client_type: ClientType, flat_discount: Percent) -> Self {
        ClientClassification {
            client_type,
            onboarding_completed: true,
            flat_invoicing_discount: flat_discount,
            per_category_discounts: None,
        }
    }

    /// A representative with a per-category table.
    pub fn representative(table: BTreeMap<String, Percent>) -> Self {
        ClientClassification {
            client_type: ClientType::Representative,
            onboarding_completed: true,
            flat_invoicing_discount: Percent::zero(),
            per_category_discounts: Some(table),
        }
    }

    /// Invoicing is granted to eligible types once onboarding is complete.
    pub fn grants_invoicing(&self) -> bool {
        self.client_type.is_invoicing_eligible() && self.onboarding_completed
    }

    /// Checks every configured percentage is within 0-100%.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_percent("flat invoicing discount", self.flat_invoicing_discount)?;
        if let Some(table) = &self.per_category_discounts {
            for pct in table.values() {
                validate_percent("category discount", *pct)?;
            }
        }
        Ok(())
    }
}

// =============================================================================
// Shipping
// =============================================================================

/// The kind of a deliverable shipping choice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ShippingKind {
    /// PAC-equivalent carrier service.
    CarrierStandard,
    /// SEDEX-equivalent carrier service.
    CarrierExpress,
    /// Free delivery unlocked by the order value.
    FreeThreshold,
    /// Collection at one of the fixed pickup points.
    PickupPoint,
}

/// One deliverable choice offered to the customer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ShippingOption {
    pub kind: ShippingKind,

    /// Name shown to the customer ("PAC", "SEDEX", "Frete grátis", pickup name).
    pub label: String,

    pub cost: Money,

    /// Absent for pickup points.
    pub estimated_business_days: Option<u32>,

    /// Present only for pickup points.
    pub pickup_address: Option<String>,

    /// Today (destination-local) advanced by the business days.
    #[ts(as = "Option<String>")]
    pub estimated_delivery: Option<chrono::NaiveDate>,
}

impl ShippingOption {
    #[inline]
    pub fn is_pickup(&self) -> bool {
        self.kind == ShippingKind::PickupPoint
    }

    /// Two options describe the same offer when kind and label match.
    /// Used to keep a customer's choice across quote refreshes.
    pub fn same_offer(&self, other: &ShippingOption) -> bool {
        self.kind == other.kind && self.label == other.label
    }
}

// =============================================================================
// Installment Plan
// =============================================================================

/// Invoicing (faturamento) schedules a customer may pick.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[ts(export)]
pub enum InstallmentPlan {
    /// One payment due in 30 days.
    #[serde(rename = "single_30")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "single_30"))]
    Single30,
    /// One payment due in 60 days.
    #[serde(rename = "single_60")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "single_60"))]
    Single60,
    /// Two payments due in 30 and 60 days.
    #[serde(rename = "two_30_60")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "two_30_60"))]
    TwoInstallments30_60,
    /// Three payments due in 30, 60 and 90 days.
    #[serde(rename = "three_30_60_90")]
    #[cfg_attr(feature = "sqlx", sqlx(rename = "three_30_60_90"))]
    ThreeInstallments30_60_90,
}

impl InstallmentPlan {
    /// Due-date offsets in days, one per installment.
    pub fn due_offsets_days(&self) -> &'static [i64] {
        match self {
            InstallmentPlan::Single30 => &[30],
            InstallmentPlan::Single60 => &[60],
            InstallmentPlan::TwoInstallments30_60 => &[30, 60],
            InstallmentPlan::ThreeInstallments30_60_90 => &[30, 60, 90],
        }
    }

    /// Number of installments.
    pub fn installment_count(&self) -> u32 {
        self.due_offsets_days().len() as u32
    }
}

// =============================================================================
// Proposal Status
// =============================================================================

/// Lifecycle of a proposal.
///
/// ```text
/// Pending ──► Accepted ──► AwaitingPayment ──► Paid
///    │            │  └──────────(invoiced)───────► Paid
///    └────────────┴──────────────┴────────────► Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    /// Shared with the customer, still editable.
    #[default]
    Pending,
    /// Customer confirmed; totals are frozen.
    Accepted,
    /// Payment link sent, waiting for the customer to pay.
    AwaitingPayment,
    Paid,
    Cancelled,
}

impl ProposalStatus {
    /// Terminal states never transition again.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProposalStatus::Paid | ProposalStatus::Cancelled)
    }

    /// The single place where transition validity is decided.
    pub fn can_transition_to(&self, next: ProposalStatus) -> bool {
        use ProposalStatus::*;
        matches!(
            (self, next),
            (Pending, Accepted)
                | (Accepted, AwaitingPayment)
                | (Accepted, Paid)
                | (AwaitingPayment, Paid)
                | (Pending, Cancelled)
                | (Accepted, Cancelled)
                | (AwaitingPayment, Cancelled)
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ProposalStatus::Pending => "pending",
            ProposalStatus::Accepted => "accepted",
            ProposalStatus::AwaitingPayment => "awaiting_payment",
            ProposalStatus::Paid => "paid",
            ProposalStatus::Cancelled => "cancelled",
        }
    }
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Checkout Strategy
// =============================================================================

/// Which payment path a proposal uses, decided once at creation.
///
/// `Sandbox` replaces the old "is this the test seller" e-mail check: the
/// proposal carries the decision and every later transition reads it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CheckoutStrategy {
    #[default]
    Standard,
    Sandbox,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_percent_from_bps() {
        let rate = Percent::from_bps(150);
        assert_eq!(rate.bps(), 150);
        assert!((rate.percentage() - 1.5).abs() < 0.001);
        assert_eq!(rate.to_string(), "1.5%");
        assert_eq!(Percent::from_bps(500).to_string(), "5%");
    }

    #[test]
    fn test_line_item_validation() {
        assert!(LineItem::new("v-1", "Revista", Money::from_cents(100), 1).is_ok());
        assert!(LineItem::new("v-1", "Revista", Money::from_cents(100), 0).is_err());
        assert!(LineItem::new("v-1", "Revista", Money::from_cents(-1), 1).is_err());
        assert!(LineItem::new("", "Revista", Money::from_cents(100), 1).is_err());

        let item = LineItem::new("v-1", "Revista", Money::from_cents(100), 1).unwrap();
        assert!(item.clone().with_discount_override(Percent::from_bps(10_001)).is_err());
        assert!(item.with_discount_override(Percent::FULL).is_ok());
    }

    #[test]
    fn test_line_item_deserializes_with_defaults() {
        let json = r#"{"variant_id":"v-9","title":"Livro","unit_price":4990,"quantity":3}"#;
        let item: LineItem = serde_json::from_str(json).unwrap();
        assert_eq!(item.category, None);
        assert_eq!(item.item_discount_override, None);
        assert_eq!(item.original_total().cents(), 14970);
    }

    #[test]
    fn test_invoicing_requires_onboarding() {
        let mut classification = ClientClassification::invoiced(
            ClientType::ChurchWithRegistration,
            Percent::from_bps(3000),
        );
        assert!(classification.grants_invoicing());

        classification.onboarding_completed = false;
        assert!(!classification.grants_invoicing());

        let individual = ClientClassification {
            client_type: ClientType::Individual,
            onboarding_completed: true,
            ..Default::default()
        };
        assert!(!individual.grants_invoicing());
    }

    #[test]
    fn test_installment_plan_offsets() {
        assert_eq!(InstallmentPlan::Single60.due_offsets_days(), &[60]);
        assert_eq!(InstallmentPlan::ThreeInstallments30_60_90.installment_count(), 3);
        assert_eq!(InstallmentPlan::TwoInstallments30_60.due_offsets_days(), &[30, 60]);
    }

    #[test]
    fn test_status_transitions_are_forward_only() {
        use ProposalStatus::*;
        assert!(Pending.can_transition_to(Accepted));
        assert!(Accepted.can_transition_to(AwaitingPayment));
        assert!(AwaitingPayment.can_transition_to(Paid));
        assert!(!Accepted.can_transition_to(Pending));
        assert!(!Paid.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Pending));
        assert!(!Pending.can_transition_to(Paid));
        assert!(Paid.is_terminal());
    }

    #[test]
    fn test_status_serializes_snake_case() {
        let json = serde_json::to_string(&ProposalStatus::AwaitingPayment).unwrap();
        assert_eq!(json, "\"awaiting_payment\"");
    }
}
