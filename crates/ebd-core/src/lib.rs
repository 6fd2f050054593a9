//! # ebd-core: Pure Pricing Logic for EBD Vendas
//!
//! This crate is the **heart** of the proposal pipeline. It turns a cart of
//! line items, a client classification and a shipping choice into a payable
//! total, and derives seller commissions from finished sales. Everything here
//! is a pure function with zero I/O dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Proposal Pricing Pipeline                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │          ebd-pipeline (carrier rates, payment links)            │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ ebd-core (THIS CRATE) ★                         │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐ ┌─────────┐ ┌──────────┐ ┌──────────┐ ┌────────┐│   │
//! │  │   │ discount │►│ pricing │►│ shipping │►│ proposal │ │commiss-││   │
//! │  │   │ resolver │ │  items  │ │ options  │ │ totals + │ │  ion   ││   │
//! │  │   │          │ │         │ │          │ │  states  │ │        ││   │
//! │  │   └──────────┘ └─────────┘ └──────────┘ └──────────┘ └────────┘│   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                    ebd-db (Database Layer)                      │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Domain types (LineItem, ClientClassification, Percent, ...)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`error`] - Domain error types
//! - [`validation`] - Boundary validation
//! - [`discount`] - Per-item discount resolution
//! - [`pricing`] - Line item pricing and subtotals
//! - [`shipping`] - Shipping option assembly and business-day math
//! - [`proposal`] - Proposal state machine and totals aggregator
//! - [`commission`] - Commission calculator and installment splitting
//! - [`church_opening`] - Church-opening document review steps
//!
//! ## Example Usage
//!
//! ```rust
//! use ebd_core::{ClientClassification, LineItem, Money};
//! use ebd_core::pricing::price_items;
//!
//! let items = vec![LineItem::new("v-1", "Revista Adultos", Money::from_cents(10000), 2).unwrap()];
//! let priced = price_items(&items, &ClientClassification::unclassified()).unwrap();
//!
//! assert_eq!(priced.subtotal_original.cents(), 20000);
//! assert_eq!(priced.subtotal_discounted.cents(), 20000);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod church_opening;
pub mod commission;
pub mod discount;
pub mod error;
pub mod money;
pub mod pricing;
pub mod proposal;
pub mod shipping;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use commission::{CommissionContext, CommissionInstallment, CommissionState, CommissionStatus, StatementLine};
pub use error::{CoreError, CoreResult, ValidationError};
pub use money::Money;
pub use pricing::{PricedItem, PricedItems};
pub use proposal::{NewProposal, Proposal, ProposalEvent, ProposalTotals};
pub use shipping::{CarrierQuote, CarrierRate, PickupPoint, ShippingRules};
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Minimum discounted product subtotal that unlocks free shipping (R$ 199,90).
pub const FREE_SHIPPING_THRESHOLD: Money = Money::from_cents(19_990);

/// Business days quoted for the free-shipping option.
pub const FREE_SHIPPING_BUSINESS_DAYS: u32 = 10;

/// Largest unit price or shipping cost accepted (R$ 1.000.000.000,00).
///
/// Keeps `price × MAX_ITEM_QUANTITY` summed over `MAX_PROPOSAL_ITEMS` lines
/// well inside `i64` centavos.
pub const MAX_PRICE: Money = Money::from_cents(100_000_000_000);

/// Longest delivery estimate accepted from a carrier or from configuration.
pub const MAX_DELIVERY_BUSINESS_DAYS: u32 = 90;

/// Maximum line items allowed in a single proposal.
pub const MAX_PROPOSAL_ITEMS: usize = 200;

/// Maximum quantity of a single line item.
///
/// ## Business Reason
/// Churches order whole classrooms of magazines at once, so this is far
/// higher than a retail cart limit, but still catches typing slips.
pub const MAX_ITEM_QUANTITY: i64 = 9_999;
