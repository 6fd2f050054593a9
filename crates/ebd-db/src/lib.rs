//! # ebd-db: Database Layer for EBD Vendas
//!
//! Persistence for proposals and commission installments, on SQLite through
//! sqlx.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                                                                         │
//! │  ebd-pipeline (ProposalService, CommissionService)                     │
//! │       │  ProposalStore / CommissionStore traits                         │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     ebd-db (THIS CRATE)                         │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────────┐  ┌─────────────┐ │   │
//! │  │   │   Database    │    │    Repositories    │  │ Migrations  │ │   │
//! │  │   │   (pool.rs)   │◄───│ ProposalRepository │  │ (embedded)  │ │   │
//! │  │   │  SqlitePool   │    │ CommissionRepo...  │  │ 001_init    │ │   │
//! │  │   └───────────────┘    └────────────────────┘  └─────────────┘ │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite file (path from PipelineConfig.database)                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use ebd_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("ebd.db")).await?;
//! db.proposals().insert(&proposal).await?;
//! let due = db.commissions().list_due_between(from, to).await?;
//! ```

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::commission::CommissionRepository;
pub use repository::proposal::ProposalRepository;
