//! # Commission Calculator
//!
//! Seller commission on finished sales, optionally split into dated
//! installments that follow the customer's payment schedule.
//!
//! ## Formula
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  base       = max(0, sale_total − shipping_cost)                        │
//! │  commission = round_half_up(base × percent)                             │
//! │                                                                         │
//! │  Split into N ∈ {1, 2, 3} installments, due at +30 / +60 / +90 days:    │
//! │    gross share    = sale_total / N     (remainder on the last)          │
//! │    shipping share = shipping / N       (remainder on the last)          │
//! │    commission_i   = round_half_up((gross_i − shipping_i) × percent)     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Shipping is never commissioned: it is passed through to the carrier.

use chrono::{Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use ts_rs::TS;
use uuid::Uuid;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::Percent;
use crate::validation::{validate_percent, validate_price};

/// Days between consecutive commission installments.
pub const INSTALLMENT_INTERVAL_DAYS: i64 = 30;

/// Largest supported installment split.
pub const MAX_COMMISSION_INSTALLMENTS: u32 = 3;

// =============================================================================
// Context
// =============================================================================

/// What kind of sale produced the commission. Each has its own default rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CommissionContext {
    /// Regular curriculum sale (1.5%).
    GenericSale,
    /// Reading-challenge payout (5%).
    ReadingChallenge,
}

impl CommissionContext {
    pub fn default_percent(&self) -> Percent {
        match self {
            CommissionContext::GenericSale => Percent::from_bps(150),
            CommissionContext::ReadingChallenge => Percent::from_bps(500),
        }
    }
}

// =============================================================================
// Calculation
// =============================================================================

/// Commission owed on a sale.
///
/// ## Example
/// ```rust
/// use ebd_core::Money;
/// use ebd_core::types::Percent;
/// use ebd_core::commission::compute_commission;
///
/// let commission = compute_commission(
///     Money::from_cents(100000),  // R$ 1.000,00
///     Money::from_cents(10000),   // R$ 100,00 shipping
///     Percent::from_bps(500),     // 5%
/// ).unwrap();
/// assert_eq!(commission.cents(), 4500);
/// ```
pub fn compute_commission(sale_total: Money, shipping_cost: Money, percent: Percent) -> CoreResult<Money> {
    validate_price("sale total", sale_total)?;
    validate_price("shipping", shipping_cost)?;
    validate_percent("commission", percent)?;

    Ok((sale_total - shipping_cost).non_negative().percent_of(percent))
}

// =============================================================================
// Installments
// =============================================================================

/// Stored payout state. Only these two are ever written; overdue is a
/// [`CommissionState`] derived on read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "snake_case"))]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CommissionStatus {
    #[default]
    Awaiting,
    Paid,
}

impl CommissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommissionStatus::Awaiting => "awaiting",
            CommissionStatus::Paid => "paid",
        }
    }
}

/// Payout state as of a given day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum CommissionState {
    Awaiting,
    Overdue,
    Paid,
}

impl CommissionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommissionState::Awaiting => "awaiting",
            CommissionState::Overdue => "overdue",
            CommissionState::Paid => "paid",
        }
    }
}

/// One dated commission payout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CommissionInstallment {
    pub id: String,
    pub sale_id: String,
    pub seller_id: String,
    /// 1-based.
    pub sequence_number: u32,
    pub total_installments: u32,
    /// Share of the sale total, shipping included.
    pub gross_amount: Money,
    pub shipping_share: Money,
    pub commission_percent: Percent,
    pub commission_amount: Money,
    #[ts(as = "String")]
    pub due_date: NaiveDate,
    #[ts(as = "Option<String>")]
    pub paid_date: Option<NaiveDate>,
    pub status: CommissionStatus,
}

impl CommissionInstallment {
    /// Status as of `today`: an awaiting installment past its due date is
    /// overdue.
    pub fn effective_status(&self, today: NaiveDate) -> CommissionState {
        match self.status {
            CommissionStatus::Paid => CommissionState::Paid,
            CommissionStatus::Awaiting if self.due_date < today => CommissionState::Overdue,
            CommissionStatus::Awaiting => CommissionState::Awaiting,
        }
    }

    pub fn mark_paid(&mut self, paid_on: NaiveDate) -> CoreResult<()> {
        if self.status == CommissionStatus::Paid {
            return Err(CoreError::InstallmentAlreadyPaid(self.id.clone()));
        }
        self.status = CommissionStatus::Paid;
        self.paid_date = Some(paid_on);
        Ok(())
    }
}

/// An installment as reported on a seller statement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct StatementLine {
    pub installment: CommissionInstallment,
    pub state: CommissionState,
}

impl StatementLine {
    pub fn as_of(installment: CommissionInstallment, today: NaiveDate) -> Self {
        let state = installment.effective_status(today);
        StatementLine { installment, state }
    }
}

/// A finished sale to commission.
#[derive(Debug, Clone)]
pub struct CommissionableSale {
    pub sale_id: String,
    pub seller_id: String,
    pub sale_total: Money,
    pub shipping_cost: Money,
    pub percent: Percent,
}

/// Splits the commission of `sale` into `installments` payouts, the first
/// due 30 days after `base_date`.
///
/// ## Errors
/// - [`CoreError::InvalidInstallmentCount`] outside 1..=3
/// - negative amounts or a percent above 100%
///
/// ## Example
/// ```rust
/// use chrono::NaiveDate;
/// use ebd_core::Money;
/// use ebd_core::types::Percent;
/// use ebd_core::commission::{split_commission, CommissionableSale};
///
/// let sale = CommissionableSale {
///     sale_id: "sale-1".into(),
///     seller_id: "seller-1".into(),
///     sale_total: Money::from_cents(100000),
///     shipping_cost: Money::zero(),
///     percent: Percent::from_bps(150),
/// };
/// let base = NaiveDate::from_ymd_opt(2026, 1, 10).unwrap();
/// let parts = split_commission(&sale, 3, base).unwrap();
///
/// let gross: Money = parts.iter().map(|p| p.gross_amount).sum();
/// assert_eq!(gross, Money::from_cents(100000));
/// assert_eq!(parts[2].due_date, NaiveDate::from_ymd_opt(2026, 4, 10).unwrap());
/// ```
pub fn split_commission(
    sale: &CommissionableSale,
    installments: u32,
    base_date: NaiveDate,
) -> CoreResult<Vec<CommissionInstallment>> {
    if installments == 0 || installments > MAX_COMMISSION_INSTALLMENTS {
        return Err(CoreError::InvalidInstallmentCount(installments));
    }
    validate_price("sale total", sale.sale_total)?;
    validate_price("shipping", sale.shipping_cost)?;
    validate_percent("commission", sale.percent)?;

    let gross_shares = sale.sale_total.split_evenly(installments);
    let shipping_shares = sale.shipping_cost.split_evenly(installments);

    Ok(gross_shares
        .into_iter()
        .zip(shipping_shares)
        .enumerate()
        .map(|(index, (gross, shipping))| {
            let sequence = index as u32 + 1;
            CommissionInstallment {
                id: Uuid::new_v4().to_string(),
                sale_id: sale.sale_id.clone(),
                seller_id: sale.seller_id.clone(),
                sequence_number: sequence,
                total_installments: installments,
                gross_amount: gross,
                shipping_share: shipping,
                commission_percent: sale.percent,
                commission_amount: (gross - shipping).non_negative().percent_of(sale.percent),
                due_date: base_date + Duration::days(INSTALLMENT_INTERVAL_DAYS * sequence as i64),
                paid_date: None,
                status: CommissionStatus::Awaiting,
            }
        })
        .collect())
}

// =============================================================================
// Summary
// =============================================================================

/// Commission amounts grouped by effective status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CommissionSummary {
    pub awaiting: Money,
    pub overdue: Money,
    pub paid: Money,
}

impl CommissionSummary {
    pub fn total(&self) -> Money {
        self.awaiting + self.overdue + self.paid
    }
}

/// Groups installments by their status as of `today`.
pub fn summarize(installments: &[CommissionInstallment], today: NaiveDate) -> CommissionSummary {
    installments
        .iter()
        .fold(CommissionSummary::default(), |mut summary, installment| {
            match installment.effective_status(today) {
                CommissionState::Awaiting => summary.awaiting += installment.commission_amount,
                CommissionState::Overdue => summary.overdue += installment.commission_amount,
                CommissionState::Paid => summary.paid += installment.commission_amount,
            }
            summary
        })
}

// =============================================================================
// Unit Tests
// =============================================================================
