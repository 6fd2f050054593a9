//! # Seed Data Generator
//!
//! Populates a database with demo proposals and commissions for development.
//!
//! ## Usage
//! ```bash
//! # 30 proposals (default)
//! cargo run -p ebd-db --bin seed
//!
//! # Custom amount and path
//! cargo run -p ebd-db --bin seed -- --count 200 --db ./data/ebd.db
//! ```
//!
//! ## Generated Data
//! Proposals cycle through the client types and end in different states:
//! - pending, with the carrier fallback shipping selected
//! - accepted with an invoiced installment plan
//! - paid, with commission installments split by the plan
//! - cancelled

use std::collections::BTreeMap;
use std::env;

use chrono::{Duration, Utc};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use ebd_core::commission::{split_commission, CommissionableSale};
use ebd_core::shipping::{assemble_shipping_options, destination_today, ShippingRules};
use ebd_core::{
    CheckoutStrategy, ClientClassification, ClientType, CommissionContext, InstallmentPlan, LineItem, Money,
    NewProposal, Percent, Proposal, ProposalStatus,
};
use ebd_db::{Database, DbConfig};

/// Curriculum catalog: (variant, title, price in centavos, category, grams)
const CATALOG: &[(&str, &str, i64, &str, u32)] = &[
    ("rev-adu-alu", "Revista Adultos - Aluno", 1290, "revistas", 110),
    ("rev-adu-pro", "Revista Adultos - Professor", 1990, "revistas", 160),
    ("rev-jov-alu", "Revista Jovens - Aluno", 1290, "revistas", 110),
    ("rev-jov-pro", "Revista Jovens - Professor", 1990, "revistas", 160),
    ("rev-inf-alu", "Revista Infantil - Aluno", 1090, "revistas", 90),
    ("rev-inf-pro", "Revista Infantil - Professor", 1790, "revistas", 150),
    ("liv-apoio", "Livro de Apoio do Trimestre", 4590, "livros", 420),
    ("kit-visual", "Kit Recursos Visuais", 8990, "kits", 900),
];

const CHURCHES: &[&str] = &[
    "Assembleia de Deus Vila Nova",
    "Igreja Batista Central",
    "Igreja Presbiteriana do Calvário",
    "Comunidade Evangélica Betel",
    "Igreja do Evangelho Quadrangular Jardim",
    "Livraria Cristã Maranata",
];

const POSTAL_CODES: &[&str] = &["01310-100", "20040-002", "30140-071", "40020-000", "50030-230", "80010-000"];

const SELLERS: &[&str] = &["seller-ana", "seller-joao", "seller-marcos"];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info,ebd=debug,sqlx=warn"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args: Vec<String> = env::args().collect();

    let mut count: usize = 30;
    let mut db_path = String::from("./ebd_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(30);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("EBD Vendas Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Number of proposals to generate (default: 30)");
                println!("  -d, --db <PATH>    Database file path (default: ./ebd_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    info!(db = %db_path, count, "Seeding database");

    let db = Database::new(DbConfig::new(&db_path)).await?;

    let existing: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM proposals")
        .fetch_one(db.pool())
        .await?;
    if existing > 0 {
        warn!(existing, "Database already has proposals, skipping seed");
        return Ok(());
    }

    let rules = ShippingRules::default();
    let mut generated = 0;
    let mut commissioned = 0;

    for seed in 0..count {
        let mut proposal = match generate_proposal(seed) {
            Ok(p) => p,
            Err(e) => {
                warn!(seed, error = %e, "Skipping invalid demo proposal");
                continue;
            }
        };

        let now = Utc::now() - Duration::days((count - seed) as i64);
        let subtotal = proposal.totals()?.subtotal_discounted;
        let options = assemble_shipping_options(None, subtotal, &rules, destination_today(now));

        if let Some(option) = options.into_iter().next() {
            proposal.select_shipping(option, &rules, now)?;
        }

        match seed % 4 {
            0 => {}
            1 => accept_invoiced(&mut proposal, &rules, now)?,
            2 => {
                accept_invoiced(&mut proposal, &rules, now)?;
                if proposal.invoicing_enabled {
                    proposal.record_invoiced_order(format!("BL-{:06}", seed), now)?;
                }
                proposal.mark_paid(now)?;
            }
            _ => proposal.cancel(now)?,
        }

        db.proposals().insert(&proposal).await?;
        generated += 1;

        let paid_totals = match proposal.status {
            ProposalStatus::Paid => proposal.frozen_totals.as_ref(),
            _ => None,
        };
        if let Some(totals) = paid_totals {
            let installments = proposal
                .selected_installment_plan
                .map(|plan| plan.installment_count())
                .unwrap_or(1);
            let sale = CommissionableSale {
                sale_id: proposal.id.clone(),
                seller_id: proposal.seller_id.clone(),
                sale_total: totals.grand_total,
                shipping_cost: totals.shipping,
                percent: CommissionContext::GenericSale.default_percent(),
            };
            db.commissions()
                .insert_batch(&split_commission(&sale, installments, destination_today(now))?)
                .await?;
            commissioned += 1;
        }
    }

    info!(generated, commissioned, "Seed complete");
    Ok(())
}

/// Builds one demo proposal. Client type rotates with the seed.
fn generate_proposal(seed: usize) -> Result<Proposal, ebd_core::CoreError> {
    let classification = match seed % 5 {
        0 => ClientClassification::invoiced(ClientType::ChurchWithRegistration, Percent::from_bps(3000)),
        1 => ClientClassification::invoiced(ClientType::Reseller, Percent::from_bps(3500)),
        2 => ClientClassification::representative(BTreeMap::from([
            ("revistas".to_string(), Percent::from_bps(4000)),
            ("livros".to_string(), Percent::from_bps(2500)),
        ])),
        3 => ClientClassification {
            client_type: ClientType::Individual,
            onboarding_completed: true,
            ..Default::default()
        },
        _ => ClientClassification::unclassified(),
    };

    let mut items = Vec::new();
    for offset in 0..(2 + seed % 4) {
        let (variant, title, price, category, grams) = CATALOG[(seed + offset * 3) % CATALOG.len()];
        if items.iter().any(|i: &LineItem| i.variant_id == variant) {
            continue;
        }
        let quantity = 5 + ((seed * 7 + offset * 11) % 60) as i64;
        items.push(
            LineItem::new(variant, title, Money::from_cents(price), quantity)?
                .with_category(category)
                .with_weight_grams(grams),
        );
    }

    Proposal::new(
        NewProposal {
            seller_id: SELLERS[seed % SELLERS.len()].to_string(),
            client_name: CHURCHES[seed % CHURCHES.len()].to_string(),
            postal_code: POSTAL_CODES[seed % POSTAL_CODES.len()].to_string(),
            classification,
            items,
            checkout: CheckoutStrategy::Standard,
        },
        Utc::now(),
    )
}

/// Accepts on invoiced terms when the client has them, on standard terms
/// otherwise.
fn accept_invoiced(
    proposal: &mut Proposal,
    rules: &ShippingRules,
    now: chrono::DateTime<Utc>,
) -> Result<(), ebd_core::CoreError> {
    if proposal.classification.grants_invoicing() {
        proposal.set_invoicing(true, now)?;
        proposal.select_installment_plan(InstallmentPlan::TwoInstallments30_60, now)?;
        proposal.accept(rules, now)?;
    } else {
        proposal.accept(rules, now)?;
        proposal.mark_awaiting_payment(format!("https://pagamento.ebd.local/p/{}", proposal.id), now)?;
    }
    Ok(())
}
