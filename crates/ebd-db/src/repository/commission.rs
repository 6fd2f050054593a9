//! # Commission Repository
//!
//! Stores dated commission installments. Only `awaiting` and `paid` are
//! written; overdue is computed from `due_date` when read.

use chrono::{NaiveDate, Utc};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::error::{DbError, DbResult};
use ebd_core::{CommissionInstallment, CommissionStatus, Money, Percent};

#[derive(Debug, sqlx::FromRow)]
struct InstallmentRecord {
    id: String,
    sale_id: String,
    seller_id: String,
    sequence_number: i64,
    total_installments: i64,
    gross_amount_cents: i64,
    shipping_share_cents: i64,
    commission_percent_bps: i64,
    commission_amount_cents: i64,
    due_date: NaiveDate,
    paid_date: Option<NaiveDate>,
    status: CommissionStatus,
}

impl TryFrom<InstallmentRecord> for CommissionInstallment {
    type Error = DbError;

    fn try_from(record: InstallmentRecord) -> DbResult<Self> {
        let narrow = |value: i64, column: &str| {
            u32::try_from(value).map_err(|_| DbError::InvalidData(format!("{} {}", column, value)))
        };

        Ok(CommissionInstallment {
            sequence_number: narrow(record.sequence_number, "sequence_number")?,
            total_installments: narrow(record.total_installments, "total_installments")?,
            commission_percent: Percent::from_bps(narrow(record.commission_percent_bps, "commission_percent_bps")?),
            id: record.id,
            sale_id: record.sale_id,
            seller_id: record.seller_id,
            gross_amount: Money::from_cents(record.gross_amount_cents),
            shipping_share: Money::from_cents(record.shipping_share_cents),
            commission_amount: Money::from_cents(record.commission_amount_cents),
            due_date: record.due_date,
            paid_date: record.paid_date,
            status: record.status,
        })
    }
}

const SELECT_INSTALLMENT: &str = r#"
    SELECT
        id, sale_id, seller_id, sequence_number, total_installments,
        gross_amount_cents, shipping_share_cents,
        commission_percent_bps, commission_amount_cents,
        due_date, paid_date, status
    FROM commission_installments
"#;

/// Repository for commission installments.
#[derive(Debug, Clone)]
pub struct CommissionRepository {
    pool: SqlitePool,
}

impl CommissionRepository {
    pub fn new(pool: SqlitePool) -> Self {
        CommissionRepository { pool }
    }

    /// Inserts all installments of one split atomically.
    pub async fn insert_batch(&self, installments: &[CommissionInstallment]) -> DbResult<()> {
        let Some(first) = installments.first() else {
            return Ok(());
        };
        debug!(sale_id = %first.sale_id, count = installments.len(), "Inserting commission installments");

        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        for installment in installments {
            sqlx::query(
                r#"
                INSERT INTO commission_installments (
                    id, sale_id, seller_id, sequence_number, total_installments,
                    gross_amount_cents, shipping_share_cents,
                    commission_percent_bps, commission_amount_cents,
                    due_date, paid_date, status, created_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
                "#,
            )
            .bind(&installment.id)
            .bind(&installment.sale_id)
            .bind(&installment.seller_id)
            .bind(installment.sequence_number as i64)
            .bind(installment.total_installments as i64)
            .bind(installment.gross_amount.cents())
            .bind(installment.shipping_share.cents())
            .bind(installment.commission_percent.bps() as i64)
            .bind(installment.commission_amount.cents())
            .bind(installment.due_date)
            .bind(installment.paid_date)
            .bind(installment.status)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Installments of one sale, in sequence order.
    pub async fn list_by_sale(&self, sale_id: &str) -> DbResult<Vec<CommissionInstallment>> {
        let records = sqlx::query_as::<_, InstallmentRecord>(&format!(
            "{} WHERE sale_id = ?1 ORDER BY sequence_number",
            SELECT_INSTALLMENT
        ))
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        records.into_iter().map(CommissionInstallment::try_from).collect()
    }

    /// All installments of a seller, by due date.
    pub async fn list_by_seller(&self, seller_id: &str) -> DbResult<Vec<CommissionInstallment>> {
        let records = sqlx::query_as::<_, InstallmentRecord>(&format!(
            "{} WHERE seller_id = ?1 ORDER BY due_date, sequence_number",
            SELECT_INSTALLMENT
        ))
        .bind(seller_id)
        .fetch_all(&self.pool)
        .await?;

        records.into_iter().map(CommissionInstallment::try_from).collect()
    }

    /// Unpaid installments due between `from` and `to`, both inclusive.
    pub async fn list_due_between(&self, from: NaiveDate, to: NaiveDate) -> DbResult<Vec<CommissionInstallment>> {
        let records = sqlx::query_as::<_, InstallmentRecord>(&format!(
            "{} WHERE status = 'awaiting' AND due_date BETWEEN ?1 AND ?2 ORDER BY due_date, seller_id",
            SELECT_INSTALLMENT
        ))
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        records.into_iter().map(CommissionInstallment::try_from).collect()
    }

    /// Marks an awaiting installment paid.
    ///
    /// ## Errors
    /// [`DbError::NotFound`] when no awaiting installment has this id.
    pub async fn mark_paid(&self, id: &str, paid_on: NaiveDate) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE commission_installments
            SET status = 'paid', paid_date = ?2
            WHERE id = ?1 AND status = 'awaiting'
            "#,
        )
        .bind(id)
        .bind(paid_on)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Awaiting commission installment", id));
        }

        info!(id = %id, paid_on = %paid_on, "Commission installment paid");
        Ok(())
    }

    /// Deletes every installment of a sale. Returns how many were removed.
    pub async fn delete_by_sale(&self, sale_id: &str) -> DbResult<u64> {
        let result = sqlx::query("DELETE FROM commission_installments WHERE sale_id = ?1")
            .bind(sale_id)
            .execute(&self.pool)
            .await?;

        debug!(sale_id = %sale_id, removed = result.rows_affected(), "Deleted commission installments");
        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Database, DbConfig};
    use ebd_core::commission::{split_commission, CommissionableSale};

    async fn repo() -> CommissionRepository {
        Database::new(DbConfig::in_memory()).await.unwrap().commissions()
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn split(sale_id: &str, seller_id: &str, parts: u32) -> Vec<CommissionInstallment> {
        let sale = CommissionableSale {
            sale_id: sale_id.to_string(),
            seller_id: seller_id.to_string(),
            sale_total: Money::from_cents(100000),
            shipping_cost: Money::from_cents(1000),
            percent: Percent::from_bps(150),
        };
        split_commission(&sale, parts, date(2026, 1, 10)).unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_list_by_sale() {
        let repo = repo().await;
        let parts = split("sale-1", "seller-1", 3);
        repo.insert_batch(&parts).await.unwrap();

        let loaded = repo.list_by_sale("sale-1").await.unwrap();
        assert_eq!(loaded, parts);
    }

    #[tokio::test]
    async fn test_duplicate_sequence_rolls_back_batch() {
        let repo = repo().await;
        repo.insert_batch(&split("sale-1", "seller-1", 2)).await.unwrap();

        let again = split("sale-1", "seller-1", 2);
        assert!(matches!(
            repo.insert_batch(&again).await,
            Err(DbError::UniqueViolation { .. })
        ));
        assert_eq!(repo.list_by_sale("sale-1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_due_between_skips_paid() {
        let repo = repo().await;
        let parts = split("sale-1", "seller-1", 3);
        repo.insert_batch(&parts).await.unwrap();
        repo.mark_paid(&parts[0].id, date(2026, 2, 9)).await.unwrap();

        // due dates: 2026-02-09, 2026-03-11, 2026-04-10
        let due = repo.list_due_between(date(2026, 2, 1), date(2026, 3, 31)).await.unwrap();
        assert_eq!(due.len(), 1);
        assert_eq!(due[0].sequence_number, 2);
    }

    #[tokio::test]
    async fn test_mark_paid_twice_fails() {
        let repo = repo().await;
        let parts = split("sale-1", "seller-1", 1);
        repo.insert_batch(&parts).await.unwrap();

        repo.mark_paid(&parts[0].id, date(2026, 2, 9)).await.unwrap();
        assert!(matches!(
            repo.mark_paid(&parts[0].id, date(2026, 2, 10)).await,
            Err(DbError::NotFound { .. })
        ));

        let stored = &repo.list_by_sale("sale-1").await.unwrap()[0];
        assert_eq!(stored.status, CommissionStatus::Paid);
        assert_eq!(stored.paid_date, Some(date(2026, 2, 9)));
    }

    #[tokio::test]
    async fn test_list_by_seller_and_delete() {
        let repo = repo().await;
        repo.insert_batch(&split("sale-1", "seller-1", 2)).await.unwrap();
        repo.insert_batch(&split("sale-2", "seller-1", 1)).await.unwrap();
        repo.insert_batch(&split("sale-3", "seller-2", 1)).await.unwrap();

        assert_eq!(repo.list_by_seller("seller-1").await.unwrap().len(), 3);
        assert_eq!(repo.delete_by_sale("sale-1").await.unwrap(), 2);
        assert_eq!(repo.list_by_seller("seller-1").await.unwrap().len(), 1);
    }
}
