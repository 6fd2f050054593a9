//! # Line Item Pricer
//!
//! Applies the resolved discount to every item and aggregates subtotals.
//!
//! ## Precision
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Per item:  original = unit_price × quantity          (exact centavos) │
//! │             discount numerator = original × bps        (sub-centavo)   │
//! │                                                                         │
//! │  Totals:    total_discount = round(Σ numerators / 10000)   ← ONE round  │
//! │             subtotal_discounted = subtotal_original − total_discount   │
//! │                                                                         │
//! │  Per-item `discounted` values are rounded for display only; they are   │
//! │  never summed back into the totals.                                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::discount::{resolve_discount, DiscountSource};
use crate::error::CoreResult;
use crate::money::{div_round_half_up, Money};
use crate::types::{ClientClassification, LineItem, Percent};

/// Pricing of one line item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PricedItem {
    pub variant_id: String,
    pub original: Money,
    pub discount_percent: Percent,
    pub discount_source: DiscountSource,
    /// Rounded half-up to the centavo, for display.
    pub discounted: Money,
}

/// Pricing of a whole item list.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PricedItems {
    pub per_item: Vec<PricedItem>,
    pub subtotal_original: Money,
    pub total_discount: Money,
    pub subtotal_discounted: Money,
}

impl PricedItems {
    pub fn is_empty(&self) -> bool {
        self.per_item.is_empty()
    }
}

/// Prices `items` for a client.
///
/// An empty list yields all-zero totals.
///
/// ## Errors
/// Only invariant violations: negative price, quantity < 1, or a discount
/// percentage above 100% in the item or the classification.
///
/// ## Example
/// ```rust
/// use ebd_core::{ClientClassification, ClientType, LineItem, Money, Percent};
/// use ebd_core::pricing::price_items;
///
/// let church = ClientClassification::invoiced(ClientType::ChurchWithRegistration, Percent::from_bps(3000));
/// let items = vec![LineItem::new("v-1", "Revista", Money::from_cents(1990), 3).unwrap()];
///
/// let priced = price_items(&items, &church).unwrap();
/// assert_eq!(priced.subtotal_original.cents(), 5970);
/// assert_eq!(priced.total_discount.cents(), 1791);
/// assert_eq!(priced.subtotal_discounted.cents(), 4179);
/// ```
pub fn price_items(items: &[LineItem], classification: &ClientClassification) -> CoreResult<PricedItems> {
    classification.validate()?;

    let mut per_item = Vec::with_capacity(items.len());
    let mut subtotal_original = Money::zero();
    let mut discount_numerator: i128 = 0;

    for item in items {
        item.validate()?;

        let resolved = resolve_discount(item, classification);
        crate::validation::validate_percent("discount", resolved.percent)?;

        let original = item.original_total();
        let item_numerator = original.cents() as i128 * resolved.percent.bps() as i128;

        subtotal_original += original;
        discount_numerator += item_numerator;

        let item_discount = Money::from_cents(div_round_half_up(item_numerator, 10_000));
        per_item.push(PricedItem {
            variant_id: item.variant_id.clone(),
            original,
            discount_percent: resolved.percent,
            discount_source: resolved.source,
            discounted: original - item_discount,
        });
    }

    let total_discount = Money::from_cents(div_round_half_up(discount_numerator, 10_000));

    Ok(PricedItems {
        per_item,
        subtotal_original,
        total_discount,
        subtotal_discounted: subtotal_original - total_discount,
    })
}

/// Total shipping weight in grams, using `default_item_grams` for items the
/// catalog has no weight for.
pub fn total_weight_grams(items: &[LineItem], default_item_grams: u32) -> u64 {
    items
        .iter()
        .map(|item| item.weight_grams.unwrap_or(default_item_grams) as u64 * item.quantity.max(0) as u64)
        .sum()
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ClientType;
    use std::collections::BTreeMap;

    fn item(id: &str, cents: i64, qty: i64) -> LineItem {
        LineItem::new(id, format!("Item {}", id), Money::from_cents(cents), qty).unwrap()
    }

    #[test]
    fn test_empty_list_is_all_zero() {
        let priced = price_items(&[], &ClientClassification::unclassified()).unwrap();
        assert!(priced.is_empty());
        assert_eq!(priced.subtotal_original, Money::zero());
        assert_eq!(priced.total_discount, Money::zero());
        assert_eq!(priced.subtotal_discounted, Money::zero());
    }

    #[test]
    fn test_unclassified_client_pays_full_price() {
        let priced = price_items(&[item("a", 10000, 2)], &ClientClassification::unclassified()).unwrap();
        assert_eq!(priced.subtotal_original.cents(), 20000);
        assert_eq!(priced.total_discount.cents(), 0);
        assert_eq!(priced.subtotal_discounted.cents(), 20000);
        assert!(priced.per_item.iter().all(|p| p.discount_percent.is_zero()));
    }

    #[test]
    fn test_sub_centavo_discounts_round_once() {
        // 3 items of R$ 0,05 at 10% → 0.5 centavo each.
        // Rounded per item that would be 3 centavos; rounded once it is 2.
        let church = ClientClassification::invoiced(ClientType::Reseller, Percent::from_bps(1000));
        let items = vec![item("a", 5, 1), item("b", 5, 1), item("c", 5, 1)];

        let priced = price_items(&items, &church).unwrap();
        assert_eq!(priced.subtotal_original.cents(), 15);
        assert_eq!(priced.total_discount.cents(), 2);
        assert_eq!(priced.subtotal_discounted.cents(), 13);
    }

    #[test]
    fn test_subtotal_identity_holds() {
        let table = BTreeMap::from([
            ("revistas".to_string(), Percent::from_bps(4250)),
            ("livros".to_string(), Percent::from_bps(1750)),
        ]);
        let rep = ClientClassification::representative(table);
        let items = vec![
            item("a", 1999, 7).with_category("revistas"),
            item("b", 4590, 3).with_category("livros"),
            item("c", 333, 11),
        ];

        let priced = price_items(&items, &rep).unwrap();
        assert_eq!(
            priced.subtotal_discounted,
            priced.subtotal_original - priced.total_discount
        );
        assert_eq!(priced.per_item[2].discount_source, DiscountSource::NoDiscount);
    }

    #[test]
    fn test_invalid_inputs_are_rejected() {
        let mut broken = item("a", 1000, 1);
        broken.quantity = -2;
        assert!(price_items(&[broken], &ClientClassification::unclassified()).is_err());

        let mut over = ClientClassification::invoiced(ClientType::Reseller, Percent::from_bps(10_500));
        assert!(price_items(&[item("a", 1000, 1)], &over).is_err());

        over.flat_invoicing_discount = Percent::FULL;
        let priced = price_items(&[item("a", 1000, 1)], &over).unwrap();
        assert_eq!(priced.subtotal_discounted, Money::zero());
    }

    #[test]
    fn test_largest_allowed_proposal_prices_without_overflow() {
        let items: Vec<LineItem> = (0..crate::MAX_PROPOSAL_ITEMS)
            .map(|i| LineItem::new(format!("v-{}", i), "Bíblia de Estudo", crate::MAX_PRICE, crate::MAX_ITEM_QUANTITY).unwrap())
            .collect();
        let church = ClientClassification::invoiced(ClientType::ChurchWithRegistration, Percent::from_bps(3333));

        let priced = price_items(&items, &church).unwrap();
        assert_eq!(
            priced.subtotal_original.cents(),
            crate::MAX_PRICE.cents() * crate::MAX_ITEM_QUANTITY * crate::MAX_PROPOSAL_ITEMS as i64
        );
        assert_eq!(priced.subtotal_discounted, priced.subtotal_original - priced.total_discount);
    }

    #[test]
    fn test_oversized_price_is_rejected_before_pricing() {
        assert!(LineItem::new("v-1", "Revista", Money::from_cents(i64::MAX / 2), 3).is_err());

        let mut forged = item("a", 1000, 3);
        forged.unit_price = Money::from_cents(i64::MAX / 2);
        assert!(price_items(&[forged], &ClientClassification::unclassified()).is_err());
    }

    #[test]
    fn test_total_weight_uses_default_for_unknown_items() {
        let items = vec![item("a", 100, 2).with_weight_grams(300), item("b", 100, 3)];
        assert_eq!(total_weight_grams(&items, 150), 600 + 450);
    }
}
