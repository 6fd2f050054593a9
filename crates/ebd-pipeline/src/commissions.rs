//! # Commission Service
//!
//! Records commission installments for finished sales and reports them per
//! seller. Overdue is never stored: it is derived from the due date every
//! time installments are read.

use std::sync::Arc;

use chrono::NaiveDate;
use tracing::info;

use ebd_core::commission::{compute_commission, split_commission, summarize, CommissionSummary, CommissionableSale};
use ebd_core::{CommissionContext, CommissionInstallment, Money, StatementLine};

use crate::config::CommissionSettings;
use crate::error::PipelineResult;
use crate::store::CommissionStore;

/// A sale handed to the commission service.
#[derive(Debug, Clone)]
pub struct SaleRecord {
    pub sale_id: String,
    pub seller_id: String,
    pub context: CommissionContext,
    pub sale_total: Money,
    pub shipping_cost: Money,
}

#[derive(Clone)]
pub struct CommissionService {
    store: Arc<dyn CommissionStore>,
    settings: CommissionSettings,
}

impl CommissionService {
    pub fn new(store: Arc<dyn CommissionStore>, settings: CommissionSettings) -> Self {
        CommissionService { store, settings }
    }

    /// Commission on a whole sale, without splitting.
    pub fn compute(&self, context: CommissionContext, sale_total: Money, shipping_cost: Money) -> PipelineResult<Money> {
        Ok(compute_commission(
            sale_total,
            shipping_cost,
            self.settings.percent_for(context),
        )?)
    }

    /// Splits the commission of `sale` into `installments` payouts due
    /// every 30 days after `base_date`, and stores them.
    pub async fn record_sale(
        &self,
        sale: &SaleRecord,
        installments: u32,
        base_date: NaiveDate,
    ) -> PipelineResult<Vec<CommissionInstallment>> {
        let commissionable = CommissionableSale {
            sale_id: sale.sale_id.clone(),
            seller_id: sale.seller_id.clone(),
            sale_total: sale.sale_total,
            shipping_cost: sale.shipping_cost,
            percent: self.settings.percent_for(sale.context),
        };
        let parts = split_commission(&commissionable, installments, base_date)?;
        self.store.insert_batch(&parts).await?;

        let total: Money = parts.iter().map(|p| p.commission_amount).sum();
        info!(
            sale_id = %sale.sale_id,
            seller_id = %sale.seller_id,
            installments,
            commission = %total,
            "Commission recorded"
        );
        Ok(parts)
    }

    /// A seller's installments, with the status as of `today`.
    pub async fn statement(&self, seller_id: &str, today: NaiveDate) -> PipelineResult<Vec<StatementLine>> {
        let installments = self.store.list_by_seller(seller_id).await?;
        Ok(installments
            .into_iter()
            .map(|installment| StatementLine::as_of(installment, today))
            .collect())
    }

    pub async fn summary(&self, seller_id: &str, today: NaiveDate) -> PipelineResult<CommissionSummary> {
        let installments = self.store.list_by_seller(seller_id).await?;
        Ok(summarize(&installments, today))
    }

    pub async fn installments_of_sale(&self, sale_id: &str) -> PipelineResult<Vec<CommissionInstallment>> {
        self.store.list_by_sale(sale_id).await
    }

    pub async fn mark_installment_paid(&self, id: &str, paid_on: NaiveDate) -> PipelineResult<()> {
        self.store.mark_paid(id, paid_on).await?;
        info!(installment_id = %id, paid_on = %paid_on, "Commission installment paid");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ebd_core::{CommissionState, CommissionStatus};

    use crate::error::PipelineError;
    use crate::store::InMemoryCommissionStore;

    fn service() -> CommissionService {
        CommissionService::new(Arc::new(InMemoryCommissionStore::new()), CommissionSettings::default())
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn sale(context: CommissionContext) -> SaleRecord {
        SaleRecord {
            sale_id: "sale-1".to_string(),
            seller_id: "seller-1".to_string(),
            context,
            sale_total: Money::from_cents(100_000),
            shipping_cost: Money::from_cents(1_000),
        }
    }

    #[test]
    fn test_compute_uses_context_percent() {
        let service = service();
        // (1000,00 - 10,00) x 1.5% = 14,85
        assert_eq!(
            service
                .compute(CommissionContext::GenericSale, Money::from_cents(100_000), Money::from_cents(1_000))
                .unwrap(),
            Money::from_cents(1_485)
        );
        // 99000 x 5% = 4950
        assert_eq!(
            service
                .compute(CommissionContext::ReadingChallenge, Money::from_cents(100_000), Money::from_cents(1_000))
                .unwrap(),
            Money::from_cents(4_950)
        );
    }

    #[test]
    fn test_configured_percent_wins() {
        let service = CommissionService::new(
            Arc::new(InMemoryCommissionStore::new()),
            CommissionSettings {
                generic_sale_bps: 200,
                ..Default::default()
            },
        );
        assert_eq!(
            service
                .compute(CommissionContext::GenericSale, Money::from_cents(10_000), Money::zero())
                .unwrap(),
            Money::from_cents(200)
        );
    }

    #[tokio::test]
    async fn test_record_sale_splits_and_stores() {
        let service = service();
        let parts = service
            .record_sale(&sale(CommissionContext::GenericSale), 3, date(2026, 1, 10))
            .await
            .unwrap();

        assert_eq!(parts.len(), 3);
        let gross: Money = parts.iter().map(|p| p.gross_amount).sum();
        assert_eq!(gross, Money::from_cents(100_000));
        assert_eq!(service.installments_of_sale("sale-1").await.unwrap(), parts);
    }

    #[tokio::test]
    async fn test_invalid_split_stores_nothing() {
        let service = service();
        let err = service
            .record_sale(&sale(CommissionContext::GenericSale), 4, date(2026, 1, 10))
            .await
            .unwrap_err();

        assert!(matches!(err, PipelineError::Core(_)));
        assert!(service.installments_of_sale("sale-1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_statement_derives_overdue() {
        let service = service();
        let parts = service
            .record_sale(&sale(CommissionContext::GenericSale), 2, date(2026, 1, 10))
            .await
            .unwrap();
        service
            .mark_installment_paid(&parts[0].id, date(2026, 2, 9))
            .await
            .unwrap();

        // second installment due 2026-03-11
        let statement = service.statement("seller-1", date(2026, 3, 20)).await.unwrap();
        assert_eq!(statement[0].state, CommissionState::Paid);
        assert_eq!(statement[1].state, CommissionState::Overdue);

        // reading a statement never rewrites what is stored
        let stored = service.installments_of_sale("sale-1").await.unwrap();
        assert_eq!(stored[1].status, CommissionStatus::Awaiting);

        let summary = service.summary("seller-1", date(2026, 3, 20)).await.unwrap();
        assert_eq!(summary.paid, parts[0].commission_amount);
        assert_eq!(summary.overdue, parts[1].commission_amount);
        assert!(summary.awaiting.is_zero());
    }
}
