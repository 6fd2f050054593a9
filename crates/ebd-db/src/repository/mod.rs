//! # Repository Module
//!
//! Repository implementations for the proposal pipeline.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  ebd-pipeline service                                                   │
//! │       │                                                                 │
//! │       │  db.proposals().get(id)                                        │
//! │       ▼                                                                 │
//! │  ProposalRepository                 CommissionRepository                │
//! │  ├── insert(&proposal)              ├── insert_batch(&installments)     │
//! │  ├── update(&proposal)              ├── list_by_sale / list_by_seller   │
//! │  ├── get(id)                        ├── list_due_between(from, to)      │
//! │  └── list_by_seller(id, status)     ├── mark_paid(id, date)             │
//! │       │                             └── delete_by_sale(sale_id)         │
//! │       ▼                                                                 │
//! │  SQLite Database                                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Repositories hand out `ebd-core` domain values; row structs stay private.

pub mod commission;
pub mod proposal;
