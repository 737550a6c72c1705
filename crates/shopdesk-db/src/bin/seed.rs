//! # Seed Data Generator
//!
//! Populates the local cache with sample shop records for development.
//!
//! ## Usage
//! ```bash
//! # Seed 25 records per collection (default)
//! cargo run -p shopdesk-db --bin seed
//!
//! # Custom amount
//! cargo run -p shopdesk-db --bin seed -- --count 200
//!
//! # Specify database path
//! cargo run -p shopdesk-db --bin seed -- --db ./data/shopdesk.db
//! ```
//!
//! ## Generated Records
//! - inventory: parts and accessories with stock and price
//! - customers: name, phone, email
//! - repairs: device, issue, status, linked customer
//! - invoices: linked customer, total, paid flag
//! - categories: the fixed inventory categories
//!
//! Remaining collections are written as empty arrays so every collection has
//! a row.

use chrono::{Duration, Utc};
use serde_json::{json, Value};
use shopdesk_core::CollectionName;
use shopdesk_db::{Database, DbConfig};
use std::env;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

/// Inventory categories and sample items.
const CATEGORIES: &[(&str, &[&str])] = &[
    (
        "Screens",
        &["iPhone 13 Screen", "iPhone 14 Screen", "Galaxy S22 Screen", "Pixel 7 Screen"],
    ),
    (
        "Batteries",
        &["iPhone 12 Battery", "iPhone 13 Battery", "Galaxy S21 Battery", "iPad Air Battery"],
    ),
    (
        "Ports",
        &["Lightning Port Flex", "USB-C Port Board", "Headphone Jack Flex"],
    ),
    (
        "Accessories",
        &["Tempered Glass", "Silicone Case", "20W Charger", "USB-C Cable"],
    ),
];

const FIRST_NAMES: &[&str] = &["Ana", "Ben", "Chloe", "Dev", "Elif", "Femi", "Gus", "Hana"];
const LAST_NAMES: &[&str] = &["Okafor", "Silva", "Nguyen", "Meyer", "Haddad", "Kowalski"];
const REPAIR_STATUSES: &[&str] = &["received", "diagnosing", "waiting_parts", "ready", "collected"];

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,shopdesk=debug,sqlx=warn")),
        )
        .init();

    let args: Vec<String> = env::args().collect();

    let mut count: usize = 25;
    let mut db_path = String::from("./shopdesk_dev.db");
    let mut force = false;

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(25);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    db_path = args[i + 1].clone();
                    i += 1;
                }
            }
            "--force" | "-f" => force = true,
            "--help" | "-h" => {
                println!("Shopdesk Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Records per collection (default: 25)");
                println!("  -d, --db <PATH>    Database file path (default: ./shopdesk_dev.db)");
                println!("  -f, --force        Overwrite collections that already have data");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            other => warn!(arg = %other, "Ignoring unknown argument"),
        }
        i += 1;
    }

    info!(db = %db_path, count, "Seeding local cache");

    let db = Database::new(DbConfig::new(&db_path)).await?;
    let repo = db.collections();

    let existing = repo.count().await?;
    if existing > 0 && !force {
        warn!(
            existing,
            "Cache already has collections; pass --force to overwrite"
        );
        return Ok(());
    }

    let customers = generate_customers(count);
    let customer_ids: Vec<String> = customers
        .iter()
        .filter_map(|c| c["id"].as_str().map(str::to_string))
        .collect();

    for name in CollectionName::iter() {
        let items = match name {
            CollectionName::Inventory => generate_inventory(count),
            CollectionName::Customers => customers.clone(),
            CollectionName::Repairs => generate_repairs(count, &customer_ids),
            CollectionName::Invoices => generate_invoices(count, &customer_ids),
            CollectionName::Categories => generate_categories(),
            _ => Vec::new(),
        };

        repo.write(name, &items).await?;
        info!(collection = %name, items = items.len(), "Seeded collection");
    }

    for summary in repo.summaries().await? {
        println!("  {:<16} {:>5} items", summary.name, summary.item_count);
    }

    db.close().await;
    info!("Seed complete");

    Ok(())
}

fn generate_inventory(count: usize) -> Vec<Value> {
    let now = Utc::now();

    CATEGORIES
        .iter()
        .flat_map(|(category, items)| items.iter().map(move |item| (*category, *item)))
        .cycle()
        .take(count)
        .enumerate()
        .map(|(seed, (category, item))| {
            let price_cents = 999 + ((seed * 37) % 15000) as i64;
            json!({
                "id": Uuid::new_v4().to_string(),
                "sku": format!("{}-{:04}", &category[..3].to_uppercase(), seed),
                "name": item,
                "category": category,
                "priceCents": price_cents,
                "costCents": price_cents * 55 / 100,
                "stock": (seed % 30) as i64,
                "updatedAt": now.to_rfc3339(),
            })
        })
        .collect()
}

fn generate_customers(count: usize) -> Vec<Value> {
    (0..count)
        .map(|seed| {
            let first = FIRST_NAMES[seed % FIRST_NAMES.len()];
            let last = LAST_NAMES[(seed / FIRST_NAMES.len()) % LAST_NAMES.len()];
            json!({
                "id": Uuid::new_v4().to_string(),
                "name": format!("{} {}", first, last),
                "phone": format!("+1555{:07}", seed),
                "email": format!("{}.{}{}@example.test", first.to_lowercase(), last.to_lowercase(), seed),
            })
        })
        .collect()
}

fn generate_repairs(count: usize, customer_ids: &[String]) -> Vec<Value> {
    let now = Utc::now();

    (0..count)
        .filter_map(|seed| {
            let customer_id = customer_ids.get(seed % customer_ids.len().max(1))?;
            Some(json!({
                "id": Uuid::new_v4().to_string(),
                "customerId": customer_id,
                "device": CATEGORIES[0].1[seed % CATEGORIES[0].1.len()].replace(" Screen", ""),
                "issue": "Cracked display",
                "status": REPAIR_STATUSES[seed % REPAIR_STATUSES.len()],
                "receivedAt": (now - Duration::days((seed % 14) as i64)).to_rfc3339(),
            }))
        })
        .collect()
}

fn generate_invoices(count: usize, customer_ids: &[String]) -> Vec<Value> {
    (0..count)
        .filter_map(|seed| {
            let customer_id = customer_ids.get(seed % customer_ids.len().max(1))?;
            Some(json!({
                "id": Uuid::new_v4().to_string(),
                "number": format!("INV-{:05}", seed + 1),
                "customerId": customer_id,
                "totalCents": 2500 + ((seed * 113) % 40000) as i64,
                "paid": seed % 3 != 0,
            }))
        })
        .collect()
}

fn generate_categories() -> Vec<Value> {
    CATEGORIES
        .iter()
        .map(|(category, _)| json!({ "id": category.to_lowercase(), "name": category }))
        .collect()
}
