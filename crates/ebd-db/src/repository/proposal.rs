//! # Proposal Repository
//!
//! Persists [`Proposal`] aggregates: one row in `proposals` plus one row per
//! line item in `proposal_items`.
//!
//! ## Storage Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  proposals                                                              │
//! │  ├── scalar columns (status, checkout, postal_code, manual shipping)   │
//! │  ├── classification_json    ← snapshot, never re-read from the CRM     │
//! │  ├── selected_shipping_json ← the option as it was offered             │
//! │  └── frozen_totals_json     ← written once, at acceptance              │
//! │                                                                         │
//! │  proposal_items (proposal_id, variant_id) PK, ordered by position      │
//! │                                                                         │
//! │  insert / update rewrite both tables in ONE transaction                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{Sqlite, SqlitePool, Transaction};
use tracing::debug;

use crate::error::{DbError, DbResult};
use ebd_core::{
    CheckoutStrategy, InstallmentPlan, LineItem, Money, Percent, Proposal, ProposalStatus,
};

// =============================================================================
// Records
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ProposalRecord {
    id: String,
    seller_id: String,
    client_name: String,
    postal_code: String,
    classification_json: String,
    selected_shipping_json: Option<String>,
    manual_shipping_cents: Option<i64>,
    invoicing_enabled: bool,
    installment_plan: Option<InstallmentPlan>,
    status: ProposalStatus,
    checkout: CheckoutStrategy,
    frozen_totals_json: Option<String>,
    payment_link: Option<String>,
    external_order_id: Option<String>,
    confirmed_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, sqlx::FromRow)]
struct ItemRecord {
    variant_id: String,
    title: String,
    unit_price_cents: i64,
    quantity: i64,
    category: Option<String>,
    discount_override_bps: Option<i64>,
    weight_grams: Option<i64>,
}

impl ItemRecord {
    fn into_line_item(self) -> DbResult<LineItem> {
        let discount = self
            .discount_override_bps
            .map(|bps| {
                u32::try_from(bps)
                    .map(Percent::from_bps)
                    .map_err(|_| DbError::InvalidData(format!("discount_override_bps {}", bps)))
            })
            .transpose()?;
        let weight = self
            .weight_grams
            .map(|g| u32::try_from(g).map_err(|_| DbError::InvalidData(format!("weight_grams {}", g))))
            .transpose()?;

        Ok(LineItem {
            variant_id: self.variant_id,
            title: self.title,
            unit_price: Money::from_cents(self.unit_price_cents),
            quantity: self.quantity,
            category: self.category,
            item_discount_override: discount,
            weight_grams: weight,
        })
    }
}

impl ProposalRecord {
    fn into_proposal(self, items: Vec<LineItem>) -> DbResult<Proposal> {
        Ok(Proposal {
            id: self.id,
            seller_id: self.seller_id,
            client_name: self.client_name,
            postal_code: self.postal_code,
            items,
            classification: serde_json::from_str(&self.classification_json)?,
            selected_shipping: self
                .selected_shipping_json
                .as_deref()
                .map(serde_json::from_str)
                .transpose()?,
            manual_shipping: self.manual_shipping_cents.map(Money::from_cents),
            invoicing_enabled: self.invoicing_enabled,
            selected_installment_plan: self.installment_plan,
            status: self.status,
            checkout: self.checkout,
            frozen_totals: self
                .frozen_totals_json
                .as_deref()
                .map(serde_json::from_str)
                .transpose()?,
            payment_link: self.payment_link,
            external_order_id: self.external_order_id,
            confirmed_at: self.confirmed_at,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

/// JSON columns of a proposal, serialized once per write.
struct JsonColumns {
    classification: String,
    selected_shipping: Option<String>,
    frozen_totals: Option<String>,
    frozen_grand_total_cents: Option<i64>,
}

impl JsonColumns {
    fn of(proposal: &Proposal) -> DbResult<Self> {
        Ok(JsonColumns {
            classification: serde_json::to_string(&proposal.classification)?,
            selected_shipping: proposal
                .selected_shipping
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?,
            frozen_totals: proposal
                .frozen_totals
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?,
            frozen_grand_total_cents: proposal.frozen_totals.as_ref().map(|t| t.grand_total.cents()),
        })
    }
}

const SELECT_PROPOSAL: &str = r#"
    SELECT
        id, seller_id, client_name, postal_code,
        classification_json, selected_shipping_json, manual_shipping_cents,
        invoicing_enabled, installment_plan, status, checkout,
        frozen_totals_json, payment_link, external_order_id,
        confirmed_at, created_at, updated_at
    FROM proposals
"#;

// =============================================================================
// Repository
// =============================================================================

/// Repository for proposal database operations.
#[derive(Debug, Clone)]
pub struct ProposalRepository {
    pool: SqlitePool,
}

impl ProposalRepository {
    pub fn new(pool: SqlitePool) -> Self {
        ProposalRepository { pool }
    }

    /// Inserts a new proposal with its items.
    ///
    /// ## Errors
    /// [`DbError::UniqueViolation`] when the id already exists.
    pub async fn insert(&self, proposal: &Proposal) -> DbResult<()> {
        debug!(id = %proposal.id, seller_id = %proposal.seller_id, items = proposal.items.len(), "Inserting proposal");

        let json = JsonColumns::of(proposal)?;
        let mut tx = self.pool.begin().await?;

        sqlx::query(
            r#"
            INSERT INTO proposals (
                id, seller_id, client_name, postal_code,
                classification_json, selected_shipping_json, manual_shipping_cents,
                invoicing_enabled, installment_plan, status, checkout,
                frozen_totals_json, frozen_grand_total_cents,
                payment_link, external_order_id,
                confirmed_at, created_at, updated_at
            ) VALUES (
                ?1, ?2, ?3, ?4,
                ?5, ?6, ?7,
                ?8, ?9, ?10, ?11,
                ?12, ?13,
                ?14, ?15,
                ?16, ?17, ?18
            )
            "#,
        )
        .bind(&proposal.id)
        .bind(&proposal.seller_id)
        .bind(&proposal.client_name)
        .bind(&proposal.postal_code)
        .bind(&json.classification)
        .bind(&json.selected_shipping)
        .bind(proposal.manual_shipping.map(|m| m.cents()))
        .bind(proposal.invoicing_enabled)
        .bind(proposal.selected_installment_plan)
        .bind(proposal.status)
        .bind(proposal.checkout)
        .bind(&json.frozen_totals)
        .bind(json.frozen_grand_total_cents)
        .bind(&proposal.payment_link)
        .bind(&proposal.external_order_id)
        .bind(proposal.confirmed_at)
        .bind(proposal.created_at)
        .bind(proposal.updated_at)
        .execute(&mut *tx)
        .await?;

        write_items(&mut tx, proposal).await?;
        tx.commit().await?;

        Ok(())
    }

    /// Overwrites a stored proposal and replaces its items.
    ///
    /// Last write wins; concurrent edits are not detected.
    pub async fn update(&self, proposal: &Proposal) -> DbResult<()> {
        debug!(id = %proposal.id, status = %proposal.status, "Updating proposal");

        let json = JsonColumns::of(proposal)?;
        let mut tx = self.pool.begin().await?;

        let result = sqlx::query(
            r#"
            UPDATE proposals SET
                client_name = ?2,
                postal_code = ?3,
                classification_json = ?4,
                selected_shipping_json = ?5,
                manual_shipping_cents = ?6,
                invoicing_enabled = ?7,
                installment_plan = ?8,
                status = ?9,
                checkout = ?10,
                frozen_totals_json = ?11,
                frozen_grand_total_cents = ?12,
                payment_link = ?13,
                external_order_id = ?14,
                confirmed_at = ?15,
                updated_at = ?16
            WHERE id = ?1
            "#,
        )
        .bind(&proposal.id)
        .bind(&proposal.client_name)
        .bind(&proposal.postal_code)
        .bind(&json.classification)
        .bind(&json.selected_shipping)
        .bind(proposal.manual_shipping.map(|m| m.cents()))
        .bind(proposal.invoicing_enabled)
        .bind(proposal.selected_installment_plan)
        .bind(proposal.status)
        .bind(proposal.checkout)
        .bind(&json.frozen_totals)
        .bind(json.frozen_grand_total_cents)
        .bind(&proposal.payment_link)
        .bind(&proposal.external_order_id)
        .bind(proposal.confirmed_at)
        .bind(proposal.updated_at)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Proposal", &proposal.id));
        }

        sqlx::query("DELETE FROM proposal_items WHERE proposal_id = ?1")
            .bind(&proposal.id)
            .execute(&mut *tx)
            .await?;
        write_items(&mut tx, proposal).await?;

        tx.commit().await?;
        Ok(())
    }

    /// Gets a proposal with its items.
    pub async fn get(&self, id: &str) -> DbResult<Option<Proposal>> {
        let record = sqlx::query_as::<_, ProposalRecord>(&format!("{} WHERE id = ?1", SELECT_PROPOSAL))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        match record {
            Some(record) => {
                let items = self.get_items(&record.id).await?;
                Ok(Some(record.into_proposal(items)?))
            }
            None => Ok(None),
        }
    }

    /// Lists a seller's proposals, newest first, optionally filtered by
    /// status.
    pub async fn list_by_seller(&self, seller_id: &str, status: Option<ProposalStatus>) -> DbResult<Vec<Proposal>> {
        let records = sqlx::query_as::<_, ProposalRecord>(&format!(
            "{} WHERE seller_id = ?1 AND (?2 IS NULL OR status = ?2) ORDER BY created_at DESC",
            SELECT_PROPOSAL
        ))
        .bind(seller_id)
        .bind(status)
        .fetch_all(&self.pool)
        .await?;

        let mut proposals = Vec::with_capacity(records.len());
        for record in records {
            let items = self.get_items(&record.id).await?;
            proposals.push(record.into_proposal(items)?);
        }
        Ok(proposals)
    }

    /// Counts proposals in a status.
    pub async fn count_by_status(&self, status: ProposalStatus) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM proposals WHERE status = ?1")
            .bind(status)
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    async fn get_items(&self, proposal_id: &str) -> DbResult<Vec<LineItem>> {
        let records = sqlx::query_as::<_, ItemRecord>(
            r#"
            SELECT
                variant_id, title, unit_price_cents, quantity,
                category, discount_override_bps, weight_grams
            FROM proposal_items
            WHERE proposal_id = ?1
            ORDER BY position
            "#,
        )
        .bind(proposal_id)
        .fetch_all(&self.pool)
        .await?;

        records.into_iter().map(ItemRecord::into_line_item).collect()
    }
}

async fn write_items(tx: &mut Transaction<'_, Sqlite>, proposal: &Proposal) -> DbResult<()> {
    for (position, item) in proposal.items.iter().enumerate() {
        sqlx::query(
            r#"
            INSERT INTO proposal_items (
                proposal_id, position, variant_id, title,
                unit_price_cents, quantity, category,
                discount_override_bps, weight_grams
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            "#,
        )
        .bind(&proposal.id)
        .bind(position as i64)
        .bind(&item.variant_id)
        .bind(&item.title)
        .bind(item.unit_price.cents())
        .bind(item.quantity)
        .bind(&item.category)
        .bind(item.item_discount_override.map(|p| p.bps() as i64))
        .bind(item.weight_grams.map(|g| g as i64))
        .execute(&mut **tx)
        .await?;
    }
    Ok(())
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use ebd_core::{ClientClassification, ClientType, NewProposal};
    use ebd_core::shipping::ShippingRules;

    async fn repo() -> ProposalRepository {
        Database::new(DbConfig::in_memory()).await.unwrap().proposals()
    }

    fn proposal(seller: &str) -> Proposal {
        let items = vec![
            LineItem::new("v-1", "Revista Adultos - Aluno", Money::from_cents(1290), 40)
                .unwrap()
                .with_category("revistas")
                .with_weight_grams(120),
            LineItem::new("v-2", "Revista Adultos - Professor", Money::from_cents(1990), 4)
                .unwrap()
                .with_discount_override(Percent::from_bps(1000))
                .unwrap(),
        ];
        Proposal::new(
            NewProposal {
                seller_id: seller.to_string(),
                client_name: "Assembleia de Deus Vila Nova".to_string(),
                postal_code: "04567-000".to_string(),
                classification: ClientClassification::invoiced(
                    ClientType::ChurchWithRegistration,
                    Percent::from_bps(3000),
                ),
                items,
                checkout: CheckoutStrategy::Standard,
            },
            Utc::now(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_get_round_trip() {
        let repo = repo().await;
        let original = proposal("seller-1");
        repo.insert(&original).await.unwrap();

        let loaded = repo.get(&original.id).await.unwrap().unwrap();
        assert_eq!(loaded.items, original.items);
        assert_eq!(loaded.classification, original.classification);
        assert_eq!(loaded.status, ProposalStatus::Pending);
        assert_eq!(loaded.postal_code, "04567000");
    }

    #[tokio::test]
    async fn test_get_missing_returns_none() {
        let repo = repo().await;
        assert!(repo.get("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_insert_is_unique_violation() {
        let repo = repo().await;
        let p = proposal("seller-1");
        repo.insert(&p).await.unwrap();
        assert!(matches!(repo.insert(&p).await, Err(DbError::UniqueViolation { .. })));
    }

    #[tokio::test]
    async fn test_update_persists_acceptance() {
        let repo = repo().await;
        let mut p = proposal("seller-1");
        repo.insert(&p).await.unwrap();

        let now = Utc::now();
        p.remove_item("v-2", now).unwrap();
        p.set_invoicing(true, now).unwrap();
        p.select_installment_plan(InstallmentPlan::ThreeInstallments30_60_90, now).unwrap();
        p.set_manual_shipping(Money::from_cents(3500), now).unwrap();
        let grand_total = p.accept(&ShippingRules::default(), now).unwrap().grand_total;
        repo.update(&p).await.unwrap();

        let loaded = repo.get(&p.id).await.unwrap().unwrap();
        assert_eq!(loaded.status, ProposalStatus::Accepted);
        assert_eq!(loaded.items.len(), 1);
        assert_eq!(loaded.manual_shipping, Some(Money::from_cents(3500)));
        assert_eq!(
            loaded.selected_installment_plan,
            Some(InstallmentPlan::ThreeInstallments30_60_90)
        );
        let frozen = loaded.frozen_totals.unwrap();
        assert_eq!(frozen.grand_total, grand_total);
        assert_eq!(frozen.installments.len(), 3);
    }

    #[tokio::test]
    async fn test_update_missing_is_not_found() {
        let repo = repo().await;
        let p = proposal("seller-1");
        assert!(matches!(repo.update(&p).await, Err(DbError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_list_by_seller_and_status() {
        let repo = repo().await;
        let first = proposal("seller-1");
        let mut second = proposal("seller-1");
        let other = proposal("seller-2");
        second.cancel(Utc::now()).unwrap();

        repo.insert(&first).await.unwrap();
        repo.insert(&second).await.unwrap();
        repo.insert(&other).await.unwrap();

        assert_eq!(repo.list_by_seller("seller-1", None).await.unwrap().len(), 2);

        let pending = repo
            .list_by_seller("seller-1", Some(ProposalStatus::Pending))
            .await
            .unwrap();
        assert_eq!(pending.len(), 1);
        assert_eq!(pending[0].id, first.id);
        assert_eq!(pending[0].items.len(), 2);

        assert_eq!(repo.count_by_status(ProposalStatus::Cancelled).await.unwrap(), 1);
    }
}
