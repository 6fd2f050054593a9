//! # Persistence Collaborators
//!
//! Storage seams of the services. The SQLite repositories of `ebd-db` are
//! the production implementations; the in-memory stores back unit tests and
//! short-lived tools.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::RwLock;

use ebd_core::{CommissionInstallment, CommissionStatus, Proposal};
use ebd_db::{CommissionRepository, DbError, ProposalRepository};

use crate::error::PipelineResult;

#[async_trait]
pub trait ProposalStore: Send + Sync {
    async fn insert(&self, proposal: &Proposal) -> PipelineResult<()>;

    /// Replaces a stored proposal. Last write wins.
    async fn update(&self, proposal: &Proposal) -> PipelineResult<()>;

    async fn get(&self, id: &str) -> PipelineResult<Option<Proposal>>;
}

#[async_trait]
pub trait CommissionStore: Send + Sync {
    /// Stores every installment of one split, or none of them.
    async fn insert_batch(&self, installments: &[CommissionInstallment]) -> PipelineResult<()>;

    async fn list_by_sale(&self, sale_id: &str) -> PipelineResult<Vec<CommissionInstallment>>;

    async fn list_by_seller(&self, seller_id: &str) -> PipelineResult<Vec<CommissionInstallment>>;

    async fn mark_paid(&self, id: &str, paid_on: NaiveDate) -> PipelineResult<()>;
}

// =============================================================================
// SQLite Repositories
// =============================================================================

#[async_trait]
impl ProposalStore for ProposalRepository {
    async fn insert(&self, proposal: &Proposal) -> PipelineResult<()> {
        Ok(ProposalRepository::insert(self, proposal).await?)
    }

    async fn update(&self, proposal: &Proposal) -> PipelineResult<()> {
        Ok(ProposalRepository::update(self, proposal).await?)
    }

    async fn get(&self, id: &str) -> PipelineResult<Option<Proposal>> {
        Ok(ProposalRepository::get(self, id).await?)
    }
}

#[async_trait]
impl CommissionStore for CommissionRepository {
    async fn insert_batch(&self, installments: &[CommissionInstallment]) -> PipelineResult<()> {
        Ok(CommissionRepository::insert_batch(self, installments).await?)
    }

    async fn list_by_sale(&self, sale_id: &str) -> PipelineResult<Vec<CommissionInstallment>> {
        Ok(CommissionRepository::list_by_sale(self, sale_id).await?)
    }

    async fn list_by_seller(&self, seller_id: &str) -> PipelineResult<Vec<CommissionInstallment>> {
        Ok(CommissionRepository::list_by_seller(self, seller_id).await?)
    }

    async fn mark_paid(&self, id: &str, paid_on: NaiveDate) -> PipelineResult<()> {
        Ok(CommissionRepository::mark_paid(self, id, paid_on).await?)
    }
}

// =============================================================================
// In-Memory Stores
// =============================================================================

/// Proposals kept in a map. Mirrors the repository's not-found and
/// duplicate errors.
#[derive(Debug, Default)]
pub struct InMemoryProposalStore {
    proposals: RwLock<HashMap<String, Proposal>>,
}

impl InMemoryProposalStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.proposals.read().await.len()
    }
}

#[async_trait]
impl ProposalStore for InMemoryProposalStore {
    async fn insert(&self, proposal: &Proposal) -> PipelineResult<()> {
        let mut proposals = self.proposals.write().await;
        if proposals.contains_key(&proposal.id) {
            return Err(DbError::duplicate("id", &proposal.id).into());
        }
        proposals.insert(proposal.id.clone(), proposal.clone());
        Ok(())
    }

    async fn update(&self, proposal: &Proposal) -> PipelineResult<()> {
        let mut proposals = self.proposals.write().await;
        match proposals.get_mut(&proposal.id) {
            Some(stored) => {
                *stored = proposal.clone();
                Ok(())
            }
            None => Err(DbError::not_found("Proposal", &proposal.id).into()),
        }
    }

    async fn get(&self, id: &str) -> PipelineResult<Option<Proposal>> {
        Ok(self.proposals.read().await.get(id).cloned())
    }
}

/// Commission installments kept in a vector, in insertion order.
#[derive(Debug, Default)]
pub struct InMemoryCommissionStore {
    installments: RwLock<Vec<CommissionInstallment>>,
}

impl InMemoryCommissionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CommissionStore for InMemoryCommissionStore {
    async fn insert_batch(&self, installments: &[CommissionInstallment]) -> PipelineResult<()> {
        let mut stored = self.installments.write().await;
        for installment in installments {
            let clash = stored
                .iter()
                .any(|s| s.sale_id == installment.sale_id && s.sequence_number == installment.sequence_number);
            if clash {
                return Err(DbError::duplicate(
                    "sale_id, sequence_number",
                    format!("{}/{}", installment.sale_id, installment.sequence_number),
                )
                .into());
            }
        }
        stored.extend_from_slice(installments);
        Ok(())
    }

    async fn list_by_sale(&self, sale_id: &str) -> PipelineResult<Vec<CommissionInstallment>> {
        let mut found: Vec<_> = self
            .installments
            .read()
            .await
            .iter()
            .filter(|i| i.sale_id == sale_id)
            .cloned()
            .collect();
        found.sort_by_key(|i| i.sequence_number);
        Ok(found)
    }

    async fn list_by_seller(&self, seller_id: &str) -> PipelineResult<Vec<CommissionInstallment>> {
        let mut found: Vec<_> = self
            .installments
            .read()
            .await
            .iter()
            .filter(|i| i.seller_id == seller_id)
            .cloned()
            .collect();
        found.sort_by_key(|i| (i.due_date, i.sequence_number));
        Ok(found)
    }

    async fn mark_paid(&self, id: &str, paid_on: NaiveDate) -> PipelineResult<()> {
        let mut stored = self.installments.write().await;
        let installment = stored
            .iter_mut()
            .find(|i| i.id == id && i.status == CommissionStatus::Awaiting)
            .ok_or_else(|| DbError::not_found("Awaiting commission installment", id))?;
        installment.mark_paid(paid_on)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ebd_core::commission::{split_commission, CommissionableSale};
    use ebd_core::{Money, Percent};

    use crate::error::PipelineError;

    fn split(sale_id: &str, parts: u32) -> Vec<CommissionInstallment> {
        let sale = CommissionableSale {
            sale_id: sale_id.to_string(),
            seller_id: "seller-1".to_string(),
            sale_total: Money::from_cents(30000),
            shipping_cost: Money::zero(),
            percent: Percent::from_bps(150),
        };
        split_commission(&sale, parts, NaiveDate::from_ymd_opt(2026, 1, 10).unwrap()).unwrap()
    }

    #[tokio::test]
    async fn test_memory_commission_store_rejects_duplicate_split() {
        let store = InMemoryCommissionStore::new();
        store.insert_batch(&split("sale-1", 2)).await.unwrap();

        let err = store.insert_batch(&split("sale-1", 2)).await.unwrap_err();
        assert!(matches!(err, PipelineError::Db(DbError::UniqueViolation { .. })));
        assert_eq!(store.list_by_sale("sale-1").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_memory_commission_store_mark_paid_once() {
        let store = InMemoryCommissionStore::new();
        let parts = split("sale-1", 1);
        store.insert_batch(&parts).await.unwrap();

        let paid_on = NaiveDate::from_ymd_opt(2026, 2, 9).unwrap();
        store.mark_paid(&parts[0].id, paid_on).await.unwrap();
        assert!(store.mark_paid(&parts[0].id, paid_on).await.is_err());
        assert_eq!(
            store.list_by_seller("seller-1").await.unwrap()[0].status,
            CommissionStatus::Paid
        );
    }

    #[tokio::test]
    async fn test_memory_proposal_store_update_requires_insert() {
        use ebd_core::{ClientClassification, CheckoutStrategy, LineItem, NewProposal};

        let store = InMemoryProposalStore::new();
        let proposal = Proposal::new(
            NewProposal {
                seller_id: "seller-1".to_string(),
                client_name: "Comunidade Betel".to_string(),
                postal_code: "01310100".to_string(),
                classification: ClientClassification::unclassified(),
                items: vec![LineItem::new("v-1", "Revista", Money::from_cents(1290), 3).unwrap()],
                checkout: CheckoutStrategy::Standard,
            },
            chrono::Utc::now(),
        )
        .unwrap();

        assert!(store.update(&proposal).await.is_err());
        store.insert(&proposal).await.unwrap();
        assert!(store.insert(&proposal).await.is_err());
        assert_eq!(store.get(&proposal.id).await.unwrap(), Some(proposal));
        assert_eq!(store.len().await, 1);
    }
}
