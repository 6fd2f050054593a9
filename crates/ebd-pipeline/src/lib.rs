//! # ebd-pipeline: Collaborator-Facing Services for EBD Vendas
//!
//! Runs the pure pricing core of `ebd-core` against the carrier, payment
//! and invoicing services, and persists the results through `ebd-db`.
//!
//! ## Architecture Overview
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Pipeline Architecture                           │
//! │                                                                         │
//! │  ┌──────────────────────────────────────────────────────────────────┐  │
//! │  │                 Pipeline (assembled from PipelineConfig)          │  │
//! │  └────────────────────────────┬─────────────────────────────────────┘  │
//! │                               │                                         │
//! │         ┌─────────────────────┼─────────────────────┐                  │
//! │         ▼                     ▼                     ▼                   │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────┐    │
//! │  │ShippingService │  │ProposalService │  │  CommissionService     │    │
//! │  │                │  │                │  │                        │    │
//! │  │ Carrier quote  │  │ Item edits,    │  │ Installment split,     │    │
//! │  │ free threshold │  │ transitions,   │  │ overdue derived on     │    │
//! │  │ pickup points  │  │ payment links  │  │ read                   │    │
//! │  └───────┬────────┘  └───────┬────────┘  └───────────┬────────────┘    │
//! │          ▼                   ▼                       ▼                  │
//! │   RateCollaborator   PaymentCollaborator     ProposalStore /           │
//! │   (HttpRateClient)   (CheckoutRouter)        CommissionStore           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//! - [`config`] - Layered configuration (defaults, `ebd.toml`, `EBD_*` env)
//! - [`error`] - Pipeline error types with user-facing messages
//! - [`telemetry`] - Tracing subscriber setup
//! - [`rates`] - Rate collaborator trait and HTTP client
//! - [`payments`] - Payment collaborator trait, HTTP client, sandbox routing
//! - [`store`] - Persistence seams and in-memory stores
//! - [`shipping`] - Shipping option resolver
//! - [`proposals`] - Proposal lifecycle service
//! - [`commissions`] - Commission service
//! - [`pipeline`] - Assembly from configuration
//!
//! ## Usage Example
//! ```rust,ignore
//! use ebd_pipeline::{Pipeline, PipelineConfig};
//!
//! ebd_pipeline::telemetry::init_tracing();
//! let config = PipelineConfig::load(None)?;
//! let pipeline = Pipeline::connect(&config).await?;
//!
//! let proposal = pipeline.proposals.create(new_proposal, "ana@ebd.example").await?;
//! let options = pipeline.proposals.shipping_options(&proposal.id).await?;
//! ```

pub mod commissions;
pub mod config;
pub mod error;
mod http;
pub mod payments;
pub mod pipeline;
pub mod proposals;
pub mod rates;
pub mod shipping;
pub mod store;
pub mod telemetry;

pub use commissions::{CommissionService, SaleRecord};
pub use config::PipelineConfig;
pub use error::{CollaboratorStep, PipelineError, PipelineResult};
pub use payments::{CheckoutRouter, HttpPaymentClient, InvoicedOrder, PaymentCollaborator, PaymentLink};
pub use pipeline::Pipeline;
pub use proposals::{ProposalService, RepricedProposal};
pub use rates::{HttpRateClient, RateCollaborator};
pub use shipping::ShippingService;
pub use store::{CommissionStore, InMemoryCommissionStore, InMemoryProposalStore, ProposalStore};
