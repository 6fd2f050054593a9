//! # Shipping Options
//!
//! The pure half of the Shipping Option Resolver: given what the carrier
//! quoted (or that it failed), build the list of choices shown to the
//! customer. The async half that talks to the carrier lives in
//! `ebd-pipeline`.
//!
//! ## Assembled Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. Carrier standard (PAC)    ← quote, or fallback R$ 15,00 / 5 days    │
//! │  2. Carrier express (SEDEX)   ← quote, or fallback R$ 25,00 / 2 days    │
//! │  3. Free shipping             ← only if subtotal ≥ R$ 199,90 (10 days)  │
//! │  4. Pickup points             ← ALWAYS, cost zero, static config        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A quote that succeeded but lacks a service means "not offered"; only a
//! failed request triggers the fallback pair.

use chrono::{DateTime, Datelike, Days, FixedOffset, NaiveDate, Utc, Weekday};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::Money;
use crate::types::{ShippingKind, ShippingOption};
use crate::{FREE_SHIPPING_BUSINESS_DAYS, FREE_SHIPPING_THRESHOLD};

// =============================================================================
// Carrier Quote
// =============================================================================

/// Price and lead time of one carrier service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CarrierRate {
    pub cost: Money,
    pub business_days: u32,
}

/// What the rate service answered. Missing keys mean the service is not
/// available for that destination.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CarrierQuote {
    pub standard: Option<CarrierRate>,
    pub express: Option<CarrierRate>,
}

// =============================================================================
// Static Configuration
// =============================================================================

/// A fixed physical location where customers collect orders for free.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PickupPoint {
    pub name: String,
    pub address: String,
}

/// Business constants of the resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingRules {
    /// Discounted subtotal that unlocks the free-shipping option.
    pub free_threshold: Money,
    pub free_business_days: u32,
    /// Used when the carrier request fails.
    pub fallback_standard: CarrierRate,
    pub fallback_express: CarrierRate,
    pub pickup_points: Vec<PickupPoint>,
}

impl Default for ShippingRules {
    fn default() -> Self {
        ShippingRules {
            free_threshold: FREE_SHIPPING_THRESHOLD,
            free_business_days: FREE_SHIPPING_BUSINESS_DAYS,
            fallback_standard: CarrierRate {
                cost: Money::from_cents(1500),
                business_days: 5,
            },
            fallback_express: CarrierRate {
                cost: Money::from_cents(2500),
                business_days: 2,
            },
            pickup_points: default_pickup_points(),
        }
    }
}

/// The three distribution points that accept order pickup.
pub fn default_pickup_points() -> Vec<PickupPoint> {
    vec![
        PickupPoint {
            name: "Retirada - Matriz São Paulo".to_string(),
            address: "Rua Dr. Fomm, 120 - Belenzinho, São Paulo - SP, 03023-020".to_string(),
        },
        PickupPoint {
            name: "Retirada - Loja Rio de Janeiro".to_string(),
            address: "Av. Brasil, 34.401 - Bangu, Rio de Janeiro - RJ, 21852-002".to_string(),
        },
        PickupPoint {
            name: "Retirada - Centro de Distribuição Nordeste".to_string(),
            address: "Rod. BR-101 Sul, 5.400 - Prazeres, Jaboatão dos Guararapes - PE, 54335-000".to_string(),
        },
    ]
}

// =============================================================================
// Assembly
// =============================================================================

/// Builds the options offered to the customer.
///
/// `quote` is `None` when the carrier request failed; the fallback pair is
/// used instead. Pickup points are appended in every case.
///
/// ## Example
/// ```rust
/// use chrono::NaiveDate;
/// use ebd_core::Money;
/// use ebd_core::shipping::{assemble_shipping_options, ShippingRules};
/// use ebd_core::types::ShippingKind;
///
/// let today = NaiveDate::from_ymd_opt(2026, 3, 2).unwrap(); // Monday
/// let options = assemble_shipping_options(None, Money::from_cents(20000), &ShippingRules::default(), today);
///
/// assert_eq!(options[0].kind, ShippingKind::CarrierStandard);
/// assert_eq!(options[2].kind, ShippingKind::FreeThreshold);
/// assert_eq!(options.iter().filter(|o| o.is_pickup()).count(), 3);
/// ```
pub fn assemble_shipping_options(
    quote: Option<&CarrierQuote>,
    discounted_subtotal: Money,
    rules: &ShippingRules,
    today: NaiveDate,
) -> Vec<ShippingOption> {
    let (standard, express) = match quote {
        Some(quote) => (quote.standard, quote.express),
        None => (Some(rules.fallback_standard), Some(rules.fallback_express)),
    };

    let mut options = Vec::with_capacity(3 + rules.pickup_points.len());

    if let Some(rate) = standard {
        options.push(carrier_option(ShippingKind::CarrierStandard, "PAC", rate, today));
    }
    if let Some(rate) = express {
        options.push(carrier_option(ShippingKind::CarrierExpress, "SEDEX", rate, today));
    }

    if qualifies_for_free_shipping(discounted_subtotal, rules) {
        options.push(ShippingOption {
            kind: ShippingKind::FreeThreshold,
            label: "Frete grátis".to_string(),
            cost: Money::zero(),
            estimated_business_days: Some(rules.free_business_days),
            pickup_address: None,
            estimated_delivery: add_business_days(today, rules.free_business_days),
        });
    }

    options.extend(rules.pickup_points.iter().map(|point| ShippingOption {
        kind: ShippingKind::PickupPoint,
        label: point.name.clone(),
        cost: Money::zero(),
        estimated_business_days: None,
        pickup_address: Some(point.address.clone()),
        estimated_delivery: None,
    }));

    options
}

/// True when the discounted subtotal meets the free-shipping minimum.
#[inline]
pub fn qualifies_for_free_shipping(discounted_subtotal: Money, rules: &ShippingRules) -> bool {
    discounted_subtotal >= rules.free_threshold
}

/// Checks that `option` is one the rules offer at this subtotal.
///
/// Pickup points must be configured and free. The free-shipping option must
/// be free and needs the subtotal to meet the threshold. Carrier costs come
/// from the quote and are not checked here.
pub fn check_shipping_choice(option: &ShippingOption, discounted_subtotal: Money, rules: &ShippingRules) -> CoreResult<()> {
    let unavailable = |reason: &str| CoreError::ShippingNotAvailable {
        label: option.label.clone(),
        reason: reason.to_string(),
    };

    match option.kind {
        ShippingKind::PickupPoint => {
            if !rules.pickup_points.iter().any(|p| p.name == option.label) {
                return Err(unavailable("unknown pickup point"));
            }
            if !option.cost.is_zero() {
                return Err(unavailable("pickup is free"));
            }
        }
        ShippingKind::FreeThreshold => {
            if !option.cost.is_zero() {
                return Err(unavailable("free shipping has no cost"));
            }
            if !qualifies_for_free_shipping(discounted_subtotal, rules) {
                return Err(unavailable(&format!("subtotal below {}", rules.free_threshold)));
            }
        }
        ShippingKind::CarrierStandard | ShippingKind::CarrierExpress => {}
    }
    Ok(())
}

fn carrier_option(kind: ShippingKind, label: &str, rate: CarrierRate, today: NaiveDate) -> ShippingOption {
    ShippingOption {
        kind,
        label: label.to_string(),
        cost: rate.cost.non_negative(),
        estimated_business_days: Some(rate.business_days),
        pickup_address: None,
        estimated_delivery: add_business_days(today, rate.business_days),
    }
}

// =============================================================================
// Business Days
// =============================================================================

/// Advances `date` by `days` business days, skipping Saturdays and Sundays.
/// No holiday calendar. `None` past the end of the calendar.
///
/// ## Example
/// ```rust
/// use chrono::NaiveDate;
/// use ebd_core::shipping::add_business_days;
///
/// let friday = NaiveDate::from_ymd_opt(2026, 3, 6).unwrap();
/// assert_eq!(add_business_days(friday, 1), NaiveDate::from_ymd_opt(2026, 3, 9));
/// ```
pub fn add_business_days(date: NaiveDate, days: u32) -> Option<NaiveDate> {
    if days == 0 {
        return Some(date);
    }

    // A weekend start counts from the Friday before
    let start = match date.weekday() {
        Weekday::Sat => date.checked_sub_days(Days::new(1))?,
        Weekday::Sun => date.checked_sub_days(Days::new(2))?,
        _ => date,
    };

    // Five business days from a weekday is always one calendar week
    let mut current = start.checked_add_days(Days::new(u64::from(days / 5) * 7))?;
    let mut remaining = days % 5;
    while remaining > 0 {
        current = current.succ_opt()?;
        if !matches!(current.weekday(), Weekday::Sat | Weekday::Sun) {
            remaining -= 1;
        }
    }
    Some(current)
}

/// "Today" at the destination. Brazil's commercial time is UTC−3 year-round.
pub fn destination_today(now: DateTime<Utc>) -> NaiveDate {
    match FixedOffset::west_opt(3 * 3600) {
        Some(offset) => now.with_timezone(&offset).date_naive(),
        None => now.date_naive(),
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn monday() -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 3, 2).unwrap()
    }

    fn kinds(options: &[ShippingOption]) -> Vec<ShippingKind> {
        options.iter().map(|o| o.kind).collect()
    }

    #[test]
    fn test_failed_quote_uses_fallback_pair() {
        let options = assemble_shipping_options(None, Money::from_cents(5000), &ShippingRules::default(), monday());

        assert_eq!(options[0].cost.cents(), 1500);
        assert_eq!(options[0].estimated_business_days, Some(5));
        assert_eq!(options[1].cost.cents(), 2500);
        assert_eq!(options[1].estimated_business_days, Some(2));
        assert_eq!(options.len(), 5);
    }

    #[test]
    fn test_missing_service_is_not_offered() {
        let quote = CarrierQuote {
            standard: Some(CarrierRate {
                cost: Money::from_cents(2190),
                business_days: 7,
            }),
            express: None,
        };
        let options = assemble_shipping_options(Some(&quote), Money::from_cents(5000), &ShippingRules::default(), monday());

        assert_eq!(
            kinds(&options),
            vec![
                ShippingKind::CarrierStandard,
                ShippingKind::PickupPoint,
                ShippingKind::PickupPoint,
                ShippingKind::PickupPoint,
            ]
        );
        assert_eq!(options[0].cost.cents(), 2190);
    }

    #[test]
    fn test_empty_quote_still_returns_pickups() {
        let options = assemble_shipping_options(
            Some(&CarrierQuote::default()),
            Money::zero(),
            &ShippingRules::default(),
            monday(),
        );
        assert_eq!(options.len(), 3);
        assert!(options.iter().all(|o| o.is_pickup() && o.cost.is_zero()));
        assert!(options.iter().all(|o| o.pickup_address.is_some() && o.estimated_business_days.is_none()));
    }

    #[test]
    fn test_free_shipping_threshold_boundary() {
        let rules = ShippingRules::default();

        let below = assemble_shipping_options(None, Money::from_cents(19_989), &rules, monday());
        assert!(!below.iter().any(|o| o.kind == ShippingKind::FreeThreshold));

        let at = assemble_shipping_options(None, Money::from_cents(19_990), &rules, monday());
        let free_index = at.iter().position(|o| o.kind == ShippingKind::FreeThreshold).unwrap();
        let first_pickup = at.iter().position(|o| o.is_pickup()).unwrap();
        assert!(free_index < first_pickup);
        assert_eq!(at[free_index].estimated_business_days, Some(10));
        assert!(at[free_index].cost.is_zero());
    }

    #[test]
    fn test_add_business_days_skips_weekends() {
        let date = |d| NaiveDate::from_ymd_opt(2026, 3, d);
        let friday = NaiveDate::from_ymd_opt(2026, 3, 6).unwrap();
        assert_eq!(add_business_days(friday, 0), Some(friday));
        assert_eq!(add_business_days(friday, 1), date(9));
        assert_eq!(add_business_days(monday(), 5), date(9));
        assert_eq!(add_business_days(monday(), 7), date(11));
        assert_eq!(add_business_days(monday(), 10), date(16));

        let saturday = NaiveDate::from_ymd_opt(2026, 3, 7).unwrap();
        assert_eq!(add_business_days(saturday, 1), date(9));
        assert_eq!(add_business_days(saturday, 5), date(13));
        let sunday = NaiveDate::from_ymd_opt(2026, 3, 8).unwrap();
        assert_eq!(add_business_days(sunday, 6), date(16));
    }

    #[test]
    fn test_add_business_days_past_calendar_end() {
        assert_eq!(add_business_days(monday(), u32::MAX), None);
        assert_eq!(add_business_days(NaiveDate::MAX, 1), None);
    }

    #[test]
    fn test_check_shipping_choice() {
        let rules = ShippingRules::default();
        let offered = assemble_shipping_options(None, Money::from_cents(19_990), &rules, monday());
        for option in &offered {
            assert!(check_shipping_choice(option, Money::from_cents(19_990), &rules).is_ok());
        }

        let free = offered.iter().find(|o| o.kind == ShippingKind::FreeThreshold).unwrap();
        assert!(matches!(
            check_shipping_choice(free, Money::from_cents(19_989), &rules),
            Err(CoreError::ShippingNotAvailable { .. })
        ));

        let mut charged_pickup = offered.iter().find(|o| o.is_pickup()).cloned().unwrap();
        charged_pickup.cost = Money::from_cents(500);
        assert!(check_shipping_choice(&charged_pickup, Money::from_cents(19_990), &rules).is_err());

        let mut unknown_pickup = offered.iter().find(|o| o.is_pickup()).cloned().unwrap();
        unknown_pickup.label = "Retirada - Depósito Fantasma".to_string();
        assert!(check_shipping_choice(&unknown_pickup, Money::from_cents(19_990), &rules).is_err());
    }

    #[test]
    fn test_delivery_estimates_follow_business_days() {
        let options = assemble_shipping_options(None, Money::zero(), &ShippingRules::default(), monday());
        assert_eq!(options[0].estimated_delivery, Some(NaiveDate::from_ymd_opt(2026, 3, 9).unwrap()));
        assert_eq!(options[1].estimated_delivery, Some(NaiveDate::from_ymd_opt(2026, 3, 4).unwrap()));
    }

    #[test]
    fn test_destination_today_uses_brazil_offset() {
        // 02:00 UTC on March 3rd is still March 2nd in Brasília
        let now = Utc.with_ymd_and_hms(2026, 3, 3, 2, 0, 0).unwrap();
        assert_eq!(destination_today(now), monday());
    }
}
