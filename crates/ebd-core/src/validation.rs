//! # Validation Module
//!
//! Boundary validation for the pricing pipeline.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Front-end (TypeScript)                                       │
//! │  └── Immediate feedback while the seller types                         │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE                                                  │
//! │  ├── Runs once, when data enters the pipeline                          │
//! │  └── Runs BEFORE any carrier or payment service is contacted           │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Database (SQLite)                                            │
//! │  └── NOT NULL / CHECK / FOREIGN KEY constraints                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//! ```rust
//! use ebd_core::validation::{normalize_postal_code, validate_quantity};
//!
//! assert_eq!(normalize_postal_code("01310-100").unwrap(), "01310100");
//! assert!(validate_quantity(5).is_ok());
//! ```

use std::collections::HashSet;

use crate::error::ValidationError;
use crate::money::Money;
use crate::types::{LineItem, Percent};
use crate::{MAX_ITEM_QUANTITY, MAX_PRICE, MAX_PROPOSAL_ITEMS};

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates and normalizes a Brazilian postal code (CEP).
///
/// ## Rules
/// - Required
/// - Exactly 8 digits once the optional `-` and surrounding spaces are removed
///
/// ## Returns
/// The 8-digit form, which is what carrier APIs expect.
///
/// ## Example
/// ```rust
/// use ebd_core::validation::normalize_postal_code;
///
/// assert_eq!(normalize_postal_code(" 30140-071 ").unwrap(), "30140071");
/// assert!(normalize_postal_code("").is_err());
/// assert!(normalize_postal_code("3014-0071").is_ok());
/// assert!(normalize_postal_code("ABCDE-123").is_err());
/// ```
pub fn normalize_postal_code(raw: &str) -> ValidationResult<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::Required {
            field: "postal code".to_string(),
        });
    }

    let digits: String = trimmed.chars().filter(|c| *c != '-').collect();
    if digits.len() != 8 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(ValidationError::InvalidFormat {
            field: "postal code".to_string(),
            reason: "must have 8 digits (e.g. 01310-100)".to_string(),
        });
    }

    Ok(digits)
}

/// Validates a storefront variant identifier.
pub fn validate_variant_id(id: &str) -> ValidationResult<()> {
    let id = id.trim();

    if id.is_empty() {
        return Err(ValidationError::Required {
            field: "variant id".to_string(),
        });
    }

    if id.len() > 120 {
        return Err(ValidationError::TooLong {
            field: "variant id".to_string(),
            max: 120,
        });
    }

    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a quantity value.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed [`MAX_ITEM_QUANTITY`]
pub fn validate_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_ITEM_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_ITEM_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a money amount (prices, shipping costs) is between zero and
/// [`MAX_PRICE`].
///
/// ## Example
/// ```rust
/// use ebd_core::money::Money;
/// use ebd_core::validation::validate_price;
///
/// assert!(validate_price("price", Money::from_cents(0)).is_ok());
/// assert!(validate_price("price", Money::from_cents(-100)).is_err());
/// assert!(validate_price("price", Money::from_cents(i64::MAX / 2)).is_err());
/// ```
pub fn validate_price(field: &str, amount: Money) -> ValidationResult<()> {
    if amount.is_negative() || amount > MAX_PRICE {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: MAX_PRICE.cents(),
        });
    }

    Ok(())
}

/// Validates a percentage is within 0% and 100%.
pub fn validate_percent(field: &str, pct: Percent) -> ValidationResult<()> {
    if pct > Percent::FULL {
        return Err(ValidationError::OutOfRange {
            field: field.to_string(),
            min: 0,
            max: 100,
        });
    }

    Ok(())
}

// =============================================================================
// Collection Validators
// =============================================================================

/// Validates the items of a proposal as a whole.
///
/// ## Rules
/// - At least one item
/// - At most [`MAX_PROPOSAL_ITEMS`] items
/// - Each item valid on its own
/// - `variant_id` unique within the list
pub fn validate_items(items: &[LineItem]) -> ValidationResult<()> {
    if items.is_empty() {
        return Err(ValidationError::Empty {
            field: "items".to_string(),
        });
    }

    if items.len() > MAX_PROPOSAL_ITEMS {
        return Err(ValidationError::OutOfRange {
            field: "items".to_string(),
            min: 1,
            max: MAX_PROPOSAL_ITEMS as i64,
        });
    }

    let mut seen = HashSet::with_capacity(items.len());
    for item in items {
        item.validate()?;
        if !seen.insert(item.variant_id.as_str()) {
            return Err(ValidationError::InvalidFormat {
                field: "items".to_string(),
                reason: format!("variant {} appears more than once", item.variant_id),
            });
        }
    }

    Ok(())
}

// =============================================================================
// UUID Validators
// =============================================================================

/// Validates a UUID string format.
///
/// ## Example
/// ```rust
/// use ebd_core::validation::validate_uuid;
///
/// assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
/// assert!(validate_uuid("not-a-uuid").is_err());
/// ```
pub fn validate_uuid(id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: "id".to_string(),
        });
    }

    uuid::Uuid::parse_str(id).map_err(|_| ValidationError::InvalidFormat {
        field: "id".to_string(),
        reason: "must be a valid UUID".to_string(),
    })?;

    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn item(id: &str) -> LineItem {
        LineItem::new(id, "Revista", Money::from_cents(1000), 1).unwrap()
    }

    #[test]
    fn test_normalize_postal_code() {
        assert_eq!(normalize_postal_code("01310-100").unwrap(), "01310100");
        assert_eq!(normalize_postal_code("01310100").unwrap(), "01310100");

        assert!(normalize_postal_code("").is_err());
        assert!(normalize_postal_code("   ").is_err());
        assert!(normalize_postal_code("0131010").is_err());
        assert!(normalize_postal_code("013101000").is_err());
        assert!(normalize_postal_code("01310-10a").is_err());
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(MAX_ITEM_QUANTITY).is_ok());

        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-1).is_err());
        assert!(validate_quantity(MAX_ITEM_QUANTITY + 1).is_err());
    }

    #[test]
    fn test_validate_price_bounds() {
        assert!(validate_price("price", Money::zero()).is_ok());
        assert!(validate_price("price", MAX_PRICE).is_ok());
        assert!(matches!(
            validate_price("price", MAX_PRICE + Money::from_cents(1)),
            Err(ValidationError::OutOfRange { .. })
        ));
        assert!(validate_price("price", Money::from_cents(-1)).is_err());
    }

    #[test]
    fn test_validate_percent() {
        assert!(validate_percent("discount", Percent::zero()).is_ok());
        assert!(validate_percent("discount", Percent::FULL).is_ok());
        assert!(validate_percent("discount", Percent::from_bps(10_001)).is_err());
    }

    #[test]
    fn test_validate_items() {
        assert!(matches!(
            validate_items(&[]),
            Err(ValidationError::Empty { .. })
        ));
        assert!(validate_items(&[item("a"), item("b")]).is_ok());
        assert!(validate_items(&[item("a"), item("a")]).is_err());

        let mut broken = item("c");
        broken.quantity = 0;
        assert!(validate_items(&[broken]).is_err());
    }

    #[test]
    fn test_validate_uuid() {
        assert!(validate_uuid("550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(validate_uuid("").is_err());
        assert!(validate_uuid("123").is_err());
    }
}
