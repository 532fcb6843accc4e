//! # Seed Data Generator
//!
//! Populates a database with sample categories and products for
//! development, going through the generic repository like any caller.
//!
//! ## Usage
//! ```bash
//! # Generate 100 products (default) into VENTAS_DB_PATH or ./ventas.db
//! cargo run -p ventas-db --bin seed
//!
//! # Generate custom amount
//! cargo run -p ventas-db --bin seed -- --count 150
//!
//! # Specify database path
//! cargo run -p ventas-db --bin seed -- --db ./data/ventas.db
//!
//! # Verbose store logging
//! RUST_LOG=ventas_db=debug cargo run -p ventas-db --bin seed
//! ```
//!
//! Each product gets a unique SKU `{CATEGORY}-{NAME}-{INDEX}`, a price
//! derived from its size, and a stock level between 0 and 100. The catalogue
//! holds one product per name and size; larger counts are capped to it.

use std::env;
use std::time::Instant;

use tracing_subscriber::EnvFilter;
use ventas_core::{Category, Field, Product};
use ventas_db::{Database, DbConfig, GenericRepository, Repository};

/// Categories with their SKU prefix and product names.
const CATEGORIES: &[(&str, &str, &[&str])] = &[
    (
        "Beverages",
        "BEV",
        &[
            "Coca-Cola",
            "Pepsi",
            "Sprite",
            "Fanta",
            "Red Bull",
            "Gatorade",
            "Mineral Water",
            "Orange Juice",
            "Iced Tea",
            "Coffee",
        ],
    ),
    (
        "Snacks",
        "SNK",
        &[
            "Potato Chips",
            "Tortilla Chips",
            "Pretzels",
            "Popcorn",
            "Peanuts",
            "Chocolate Bar",
            "Gummy Bears",
            "Cookies",
        ],
    ),
    (
        "Dairy",
        "DRY",
        &[
            "Whole Milk",
            "Skim Milk",
            "Cheddar",
            "Mozzarella",
            "Greek Yogurt",
            "Butter",
            "Cream Cheese",
        ],
    ),
    (
        "Grocery",
        "GRO",
        &[
            "White Bread",
            "Pasta Penne",
            "White Rice",
            "Canned Beans",
            "Canned Tomatoes",
            "Oatmeal",
            "Peanut Butter",
            "Honey",
            "Flour",
            "Sugar",
        ],
    ),
];

/// Size variants and what they add to the base price, in cents.
const SIZES: &[(&str, i64)] = &[
    ("Small", 0),
    ("Medium", 100),
    ("Large", 200),
    ("6-Pack", 300),
    ("12-Pack", 500),
];

const DEFAULT_COUNT: usize = 100;

/// How many distinct products the catalogue can produce.
fn catalogue_capacity() -> usize {
    CATEGORIES.iter().map(|(_, _, names)| names.len()).sum::<usize>() * SIZES.len()
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let mut config = DbConfig::from_env()?;
    let mut count = DEFAULT_COUNT;

    let args: Vec<String> = env::args().collect();
    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(count);
                    i += 1;
                }
            }
            "--db" | "-d" => {
                if i + 1 < args.len() {
                    config.database_path = args[i + 1].clone().into();
                    i += 1;
                }
            }
            "--help" | "-h" => {
                println!("Ventas Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!(
                    "  -c, --count <N>    Number of products to generate (default: {}, max: {})",
                    DEFAULT_COUNT,
                    catalogue_capacity()
                );
                println!("  -d, --db <PATH>    Database file path (default: $VENTAS_DB_PATH or ./ventas.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    let capacity = catalogue_capacity();
    if count > capacity {
        println!("⚠ Catalogue has {} products; capping --count {}", capacity, count);
        count = capacity;
    }

    println!("🌱 Ventas Seed Data Generator");
    println!("============================");
    println!("Database: {}", config.database_path.display());
    println!("Products: {}", count);
    println!();

    let db = Database::new(config.clone()).await?;
    let status = db.migration_status().await?;
    println!("✓ Connected to database");
    println!("✓ Migrations applied ({}/{})", status.applied, status.total);

    // One context so both repositories share a unit of work
    let context = db.context();
    let categories = GenericRepository::<Category>::new(context.clone());
    let products = GenericRepository::<Product>::new(context);

    let existing = products.query(None)?.count().await?;
    if existing > 0 {
        println!("⚠ Database already has {} products", existing);
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    println!();
    println!("Generating products...");

    let start = Instant::now();
    let mut generated = 0usize;
    let mut failed = 0usize;

    'outer: for (category_name, code, names) in CATEGORIES {
        let category = match categories
            .get(&Field::new("name").eq(*category_name))
            .await?
        {
            Some(existing) => existing,
            None => {
                categories
                    .create(Category::new(*category_name).with_description(format!("{code} products")))
                    .await?
            }
        };

        for (name_idx, name) in names.iter().enumerate() {
            for (size_idx, (size, price_addon)) in SIZES.iter().enumerate() {
                if generated >= count {
                    break 'outer;
                }

                let index = name_idx * SIZES.len() + size_idx;
                let product = generate_product(category.id, code, name, size, *price_addon, index);

                match products.create(product).await {
                    Ok(_) => generated += 1,
                    Err(e) => {
                        eprintln!("Failed to insert {} {}: {}", name, size, e);
                        failed += 1;
                    }
                }

                if generated > 0 && generated % 100 == 0 {
                    println!("  Generated {} products...", generated);
                }
            }
        }
    }

    let elapsed = start.elapsed();
    println!();
    println!("✓ Generated {} products in {:?}", generated, elapsed);

    // Spot-check the query surface
    let in_stock = products
        .query(Some(Field::new("stock").gt(0)))?
        .count()
        .await?;
    let cheapest = products
        .query(None)?
        .order_by("price_cents")
        .first()
        .await?;

    let summary = serde_json::json!({
        "database": config.database_path.display().to_string(),
        "categories": categories.query(None)?.count().await?,
        "products": generated,
        "failed": failed,
        "in_stock": in_stock,
        "cheapest": cheapest.map(|p| p.sku),
        "elapsed_ms": elapsed.as_millis() as u64,
    });

    println!();
    println!("{}", serde_json::to_string_pretty(&summary)?);
    println!();
    println!("✓ Seed complete!");

    db.close().await;
    Ok(())
}

/// Builds one product with deterministic pseudo-random data.
fn generate_product(
    category_id: i64,
    code: &str,
    name: &str,
    size: &str,
    price_addon: i64,
    index: usize,
) -> Product {
    let short: String = name
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .take(4)
        .collect::<String>()
        .to_uppercase();
    let sku = format!("{}-{}-{:03}", code, short, index);

    // $1.99 - $9.99 plus the size addon
    let price_cents = 199 + ((index * 17) % 800) as i64 + price_addon;
    let stock = ((index * 31) % 101) as i64;

    Product::new(category_id, sku, format!("{} {}", name, size), price_cents).with_stock(stock)
}
