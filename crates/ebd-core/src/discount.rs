//! # Discount Resolver
//!
//! Decides which discount percentage applies to one line item.
//!
//! ## Resolution Order (first match wins)
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. Per-category table has item.category ──► table value               │
//! │        (representatives: replaces every other rule)                    │
//! │                     │ no                                               │
//! │                     ▼                                                  │
//! │  2. item_discount_override set ───────────► override                   │
//! │                     │ no                                               │
//! │                     ▼                                                  │
//! │  3. grants invoicing && flat > 0 ─────────► flat invoicing discount    │
//! │                     │ no                                               │
//! │                     ▼                                                  │
//! │  4. 0%                                                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::types::{ClientClassification, LineItem, Percent};

/// Which rule produced a resolved discount. Shown next to the percentage in
/// the proposal so the seller can explain the price.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
#[serde(rename_all = "snake_case")]
pub enum DiscountSource {
    CategoryTable,
    ItemOverride,
    FlatInvoicing,
    NoDiscount,
}

/// A resolved discount and the rule it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ResolvedDiscount {
    pub percent: Percent,
    pub source: DiscountSource,
}

/// Resolves the discount for `item` under `classification`.
///
/// Unknown categories fall through to the next rule. Pure: same inputs give
/// the same output.
///
/// ## Example
/// ```rust
/// use std::collections::BTreeMap;
/// use ebd_core::{ClientClassification, LineItem, Money, Percent};
/// use ebd_core::discount::{resolve_discount, DiscountSource};
///
/// let table = BTreeMap::from([("revistas".to_string(), Percent::from_bps(4000))]);
/// let rep = ClientClassification::representative(table);
/// let item = LineItem::new("v-1", "Revista", Money::from_cents(1000), 1)
///     .unwrap()
///     .with_category("revistas");
///
/// let resolved = resolve_discount(&item, &rep);
/// assert_eq!(resolved.percent.bps(), 4000);
/// assert_eq!(resolved.source, DiscountSource::CategoryTable);
/// ```
pub fn resolve_discount(item: &LineItem, classification: &ClientClassification) -> ResolvedDiscount {
    if let (Some(table), Some(category)) = (&classification.per_category_discounts, &item.category) {
        if let Some(pct) = table.get(category) {
            return ResolvedDiscount {
                percent: *pct,
                source: DiscountSource::CategoryTable,
            };
        }
    }

    if let Some(pct) = item.item_discount_override {
        return ResolvedDiscount {
            percent: pct,
            source: DiscountSource::ItemOverride,
        };
    }

    if classification.grants_invoicing() && !classification.flat_invoicing_discount.is_zero() {
        return ResolvedDiscount {
            percent: classification.flat_invoicing_discount,
            source: DiscountSource::FlatInvoicing,
        };
    }

    ResolvedDiscount {
        percent: Percent::zero(),
        source: DiscountSource::NoDiscount,
    }
}

/// Shorthand for [`resolve_discount`] when only the percentage matters.
#[inline]
pub fn resolve_discount_percent(item: &LineItem, classification: &ClientClassification) -> Percent {
    resolve_discount(item, classification).percent
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::money::Money;
    use crate::types::ClientType;
    use std::collections::BTreeMap;

    fn item(category: Option<&str>, override_bps: Option<u32>) -> LineItem {
        let mut item = LineItem::new("v-1", "Revista EBD", Money::from_cents(2500), 4).unwrap();
        item.category = category.map(str::to_string);
        item.item_discount_override = override_bps.map(Percent::from_bps);
        item
    }

    fn church_with_flat(bps: u32) -> ClientClassification {
        ClientClassification::invoiced(ClientType::ChurchWithRegistration, Percent::from_bps(bps))
    }

    #[test]
    fn test_no_discount_sources_resolve_to_zero() {
        let resolved = resolve_discount(&item(Some("revistas"), None), &ClientClassification::unclassified());
        assert_eq!(resolved.percent, Percent::zero());
        assert_eq!(resolved.source, DiscountSource::NoDiscount);
    }

    #[test]
    fn test_category_table_beats_override_and_flat() {
        let mut classification = church_with_flat(3000);
        classification.per_category_discounts =
            Some(BTreeMap::from([("revistas".to_string(), Percent::from_bps(4500))]));

        let resolved = resolve_discount(&item(Some("revistas"), Some(1000)), &classification);
        assert_eq!(resolved.percent.bps(), 4500);
        assert_eq!(resolved.source, DiscountSource::CategoryTable);
    }

    #[test]
    fn test_unknown_category_falls_through_to_override() {
        let table = BTreeMap::from([("livros".to_string(), Percent::from_bps(2000))]);
        let classification = ClientClassification::representative(table);

        let resolved = resolve_discount(&item(Some("revistas"), Some(1000)), &classification);
        assert_eq!(resolved.percent.bps(), 1000);
        assert_eq!(resolved.source, DiscountSource::ItemOverride);

        let resolved = resolve_discount(&item(None, None), &classification);
        assert_eq!(resolved.source, DiscountSource::NoDiscount);
    }

    #[test]
    fn test_override_beats_flat() {
        let resolved = resolve_discount(&item(None, Some(1500)), &church_with_flat(3000));
        assert_eq!(resolved.percent.bps(), 1500);
    }

    #[test]
    fn test_flat_discount_needs_invoicing_grant() {
        let resolved = resolve_discount(&item(None, None), &church_with_flat(3000));
        assert_eq!(resolved.percent.bps(), 3000);
        assert_eq!(resolved.source, DiscountSource::FlatInvoicing);

        let mut not_onboarded = church_with_flat(3000);
        not_onboarded.onboarding_completed = false;
        assert_eq!(resolve_discount_percent(&item(None, None), &not_onboarded), Percent::zero());

        let individual = ClientClassification {
            client_type: ClientType::Individual,
            onboarding_completed: true,
            flat_invoicing_discount: Percent::from_bps(3000),
            per_category_discounts: None,
        };
        assert_eq!(resolve_discount_percent(&item(None, None), &individual), Percent::zero());
    }

    #[test]
    fn test_resolution_is_idempotent() {
        let classification = church_with_flat(2000);
        let line = item(Some("livros"), None);
        let first = resolve_discount(&line, &classification);
        let second = resolve_discount(&line, &classification);
        assert_eq!(first, second);
    }
}
