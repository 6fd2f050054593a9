//! # Pipeline Assembly
//!
//! Builds the services from a [`PipelineConfig`].
//!
//! ```text
//! PipelineConfig
//!     │
//!     ├── database ──► Database (SQLite) ──► ProposalRepository
//!     │                                  └─► CommissionRepository
//!     ├── shipping ──► HttpRateClient ──► ShippingService
//!     ├── payments ──► CheckoutRouter (live + sandbox HttpPaymentClient)
//!     ├── commission ─► CommissionService
//!     └── checkout ──► ProposalService
//! ```

use std::sync::Arc;

use tracing::info;

use ebd_db::Database;

use crate::commissions::CommissionService;
use crate::config::PipelineConfig;
use crate::error::PipelineResult;
use crate::payments::{CheckoutRouter, PaymentCollaborator};
use crate::proposals::ProposalService;
use crate::rates::{HttpRateClient, RateCollaborator};
use crate::shipping::ShippingService;

/// Handles to every service, sharing one database pool.
#[derive(Clone)]
pub struct Pipeline {
    pub database: Database,
    pub proposals: ProposalService,
    pub commissions: CommissionService,
}

impl Pipeline {
    /// Validates the config, opens the database and builds the HTTP clients.
    pub async fn connect(config: &PipelineConfig) -> PipelineResult<Self> {
        config.validate()?;
        let database = Database::new(config.database.db_config()).await?;

        let rates = HttpRateClient::new(
            &config.shipping.rate_api_url,
            config.shipping.origin_postal_code.clone(),
            config.shipping.rate_timeout(),
        )?;
        let payments = CheckoutRouter::from_settings(&config.payments)?;

        let pipeline = Self::with_collaborators(config, database, Arc::new(rates), Arc::new(payments));
        info!(
            database = %config.database.path.display(),
            rate_api = %config.shipping.rate_api_url,
            sandbox_sellers = config.checkout.sandbox_seller_emails.len(),
            "Pipeline ready"
        );
        Ok(pipeline)
    }

    /// Builds the services on an open database with the given collaborators.
    pub fn with_collaborators(
        config: &PipelineConfig,
        database: Database,
        rates: Arc<dyn RateCollaborator>,
        payments: Arc<dyn PaymentCollaborator>,
    ) -> Self {
        let commissions = CommissionService::new(Arc::new(database.commissions()), config.commission.clone());
        let proposals = ProposalService::new(
            Arc::new(database.proposals()),
            ShippingService::new(rates, &config.shipping),
            payments,
            commissions.clone(),
            config.checkout.clone(),
            config.payments.timeout(),
        );

        Pipeline {
            database,
            proposals,
            commissions,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use ebd_core::shipping::destination_today;
    use ebd_core::{
        CheckoutStrategy, ClientClassification, ClientType, InstallmentPlan, LineItem, Money, NewProposal, Percent,
        Proposal, ProposalStatus, ShippingKind,
    };
    use ebd_db::DbConfig;

    use crate::error::{CollaboratorStep, PipelineError};
    use crate::payments::{InvoicedOrder, PaymentLink};
    use crate::shipping::tests::{quote, FakeRates};

    struct AlwaysPays;

    #[async_trait]
    impl PaymentCollaborator for AlwaysPays {
        async fn create_payment_link(&self, proposal: &Proposal) -> PipelineResult<PaymentLink> {
            Ok(PaymentLink {
                url: format!("https://pay.example/{}", proposal.id),
            })
        }

        async fn create_invoiced_order(&self, _proposal: &Proposal, _plan: InstallmentPlan) -> PipelineResult<InvoicedOrder> {
            Err(PipelineError::Collaborator {
                step: CollaboratorStep::InvoicedOrder,
                message: "invoicing offline".to_string(),
                retryable: true,
            })
        }
    }

    async fn pipeline() -> Pipeline {
        let database = Database::new(DbConfig::in_memory()).await.unwrap();
        Pipeline::with_collaborators(
            &PipelineConfig::default(),
            database,
            Arc::new(FakeRates::answering(quote(1870, Some(3240)))),
            Arc::new(AlwaysPays),
        )
    }

    fn input(classification: ClientClassification) -> NewProposal {
        NewProposal {
            seller_id: "seller-ana".to_string(),
            client_name: "Assembleia de Deus Vila Nova".to_string(),
            postal_code: "30140-071".to_string(),
            classification,
            items: vec![
                LineItem::new("rev-jov-alu", "Revista Jovens - Aluno", Money::from_cents(1290), 30)
                    .unwrap()
                    .with_category("revistas")
                    .with_weight_grams(110),
                LineItem::new("liv-apoio", "Livro de Apoio do Trimestre", Money::from_cents(4590), 2)
                    .unwrap()
                    .with_category("livros"),
            ],
            checkout: CheckoutStrategy::Standard,
        }
    }

    #[tokio::test]
    async fn test_sqlite_backed_sale_records_commission() {
        let pipeline = pipeline().await;
        let proposals = &pipeline.proposals;

        let created = proposals
            .create(input(ClientClassification::unclassified()), "ana@ebd.example")
            .await
            .unwrap();
        let options = proposals.shipping_options(&created.id).await.unwrap();
        // 30 x 12,90 + 2 x 45,90 = 478,80 unlocks free shipping
        let free = options
            .into_iter()
            .find(|o| o.kind == ShippingKind::FreeThreshold)
            .unwrap();
        proposals.select_shipping(&created.id, free).await.unwrap();
        proposals.accept(&created.id).await.unwrap();
        proposals.request_payment_link(&created.id).await.unwrap();
        let (paid, installments) = proposals.mark_paid(&created.id).await.unwrap();

        assert_eq!(paid.status, ProposalStatus::Paid);
        let stored = pipeline.database.proposals().get(&created.id).await.unwrap().unwrap();
        assert_eq!(stored.status, ProposalStatus::Paid);
        assert_eq!(stored.frozen_totals, paid.frozen_totals);

        // 478,80 x 1.5% = 7,182 -> 7,18
        assert_eq!(installments[0].commission_amount, Money::from_cents(718));

        let summary = pipeline
            .commissions
            .summary("seller-ana", destination_today(Utc::now()))
            .await
            .unwrap();
        assert_eq!(summary.awaiting, Money::from_cents(718));
    }

    #[tokio::test]
    async fn test_invoicing_failure_leaves_stored_proposal_accepted() {
        let pipeline = pipeline().await;
        let proposals = &pipeline.proposals;

        let created = proposals
            .create(
                input(ClientClassification::invoiced(
                    ClientType::ChurchWithRegistration,
                    Percent::from_bps(2500),
                )),
                "ana@ebd.example",
            )
            .await
            .unwrap();
        proposals
            .set_manual_shipping(&created.id, Money::from_cents(2000))
            .await
            .unwrap();
        proposals.set_invoicing(&created.id, true).await.unwrap();
        proposals
            .select_installment_plan(&created.id, InstallmentPlan::TwoInstallments30_60)
            .await
            .unwrap();
        proposals.accept(&created.id).await.unwrap();

        let err = proposals.create_invoiced_order(&created.id).await.unwrap_err();
        assert!(err.user_message().contains("invoicing offline"));

        let stored = proposals.get(&created.id).await.unwrap();
        assert_eq!(stored.status, ProposalStatus::Accepted);
        assert!(stored.external_order_id.is_none());
    }

    #[tokio::test]
    async fn test_connect_rejects_invalid_config() {
        let mut config = PipelineConfig::default();
        config.payments.api_url = "mailto:pagamentos@ebd.example".to_string();

        assert!(matches!(
            Pipeline::connect(&config).await,
            Err(PipelineError::InvalidUrl(_))
        ));
    }
}
