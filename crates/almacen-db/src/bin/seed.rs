//! # Seed Data Generator
//!
//! Populates the database with demo branches, products, and opening stock
//! for development.
//!
//! ## Usage
//! ```bash
//! # Seed with defaults
//! cargo run -p almacen-db --bin seed
//!
//! # Custom product count and database path
//! cargo run -p almacen-db --bin seed -- --count 200 --db ./data/almacen.db
//! ```
//!
//! ## Generated Data
//! - Three branches (Centro, Norte, Mall)
//! - Products across minimarket categories (bebidas, abarrotes, lácteos,
//!   snacks, aseo) with CLP prices
//! - Opening stock per branch, recorded through the inventory table plus a
//!   matching IN ledger entry so the ledger-sum invariant holds from day one

use chrono::Utc;
use std::env;
use uuid::Uuid;

use almacen_core::{Branch, Money, MovementType, Product, DEFAULT_TAX_RATE_BPS};
use almacen_db::repository::movement::NewMovement;
use almacen_db::{Database, DbConfig};

/// Product names per category with a base price in whole pesos.
const CATEGORIES: &[(&str, &[(&str, i64)])] = &[
    (
        "Bebidas",
        &[
            ("Coca-Cola 1.5L", 2_190),
            ("Coca-Cola Zero 1.5L", 2_190),
            ("Sprite 1.5L", 1_990),
            ("Fanta 1.5L", 1_990),
            ("Agua Mineral 1.6L", 1_090),
            ("Jugo de Naranja 1L", 1_590),
            ("Néctar Durazno 1L", 1_390),
            ("Bebida Energética 500ml", 1_890),
            ("Té Helado 1.5L", 1_790),
            ("Agua con Gas 1.6L", 1_190),
        ],
    ),
    (
        "Abarrotes",
        &[
            ("Arroz Grado 1 1kg", 1_690),
            ("Fideos Espirales 400g", 990),
            ("Aceite Vegetal 1L", 2_890),
            ("Azúcar 1kg", 1_390),
            ("Harina 1kg", 1_290),
            ("Sal de Mesa 1kg", 690),
            ("Atún Lomitos 160g", 1_590),
            ("Salsa de Tomate 200g", 590),
            ("Legumbres Lentejas 1kg", 2_190),
            ("Café Molido 250g", 4_990),
        ],
    ),
    (
        "Lácteos",
        &[
            ("Leche Entera 1L", 1_190),
            ("Leche Descremada 1L", 1_190),
            ("Yogurt Natural 125g", 390),
            ("Queso Gauda 250g", 3_490),
            ("Mantequilla 250g", 2_990),
            ("Huevos Docena", 3_290),
            ("Crema 200ml", 1_290),
            ("Queso Crema 220g", 2_190),
            ("Leche Cultivada 1L", 1_490),
            ("Manjar 400g", 2_390),
        ],
    ),
    (
        "Snacks",
        &[
            ("Papas Fritas 180g", 2_290),
            ("Ramitas Queso 250g", 1_890),
            ("Galletas de Soda 190g", 890),
            ("Galletas Chocolate 160g", 1_290),
            ("Chocolate de Leche 100g", 1_990),
            ("Maní Salado 150g", 1_390),
            ("Suflitos 140g", 1_190),
            ("Cereal Barra 25g", 490),
            ("Queque Mármol 350g", 2_490),
            ("Alfajor Triple 60g", 790),
        ],
    ),
    (
        "Aseo",
        &[
            ("Detergente Líquido 1L", 3_990),
            ("Lavalozas 750ml", 1_790),
            ("Papel Higiénico 4un", 2_990),
            ("Toalla de Papel 2un", 2_490),
            ("Cloro 1L", 1_290),
            ("Jabón de Tocador 3un", 1_990),
            ("Shampoo 400ml", 3_490),
            ("Pasta Dental 90g", 1_890),
            ("Bolsas de Basura 10un", 1_590),
            ("Esponja Multiuso 2un", 990),
        ],
    ),
];

const BRANCHES: &[(&str, &str)] = &[
    ("Sucursal Centro", "Av. Libertador 1200, Santiago"),
    ("Sucursal Norte", "Av. Independencia 3450, Santiago"),
    ("Sucursal Mall", "Local 23, Mall Plaza Oeste"),
];

const SEED_USER: &str = "seed";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Parse command line arguments
    let args: Vec<String> = env::args().collect();

    let mut count: usize = usize::MAX; // default: full catalog
    let mut db_path = String::from("./almacen_dev.db");

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "--count" | "-c" => {
                if i + 1 < args.len() {
                    count = args[i + 1].parse().unwrap_or(usize::MAX);
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
                println!("Almacén POS Seed Data Generator");
                println!();
                println!("Usage: seed [OPTIONS]");
                println!();
                println!("Options:");
                println!("  -c, --count <N>    Max number of products to generate (default: all)");
                println!("  -d, --db <PATH>    Database file path (default: ./almacen_dev.db)");
                println!("  -h, --help         Show this help message");
                return Ok(());
            }
            _ => {}
        }
        i += 1;
    }

    println!("🌱 Almacén POS Seed Data Generator");
    println!("==================================");
    println!("Database: {}", db_path);
    println!();

    let db = Database::new(DbConfig::new(&db_path)).await?;

    println!("✓ Connected to database");
    println!("✓ Migrations applied");

    // Skip if already seeded
    if !db.catalog().list_branches().await?.is_empty() {
        println!("⚠ Database already has branches");
        println!("  Skipping seed to avoid duplicates.");
        println!("  Delete the database file to regenerate.");
        return Ok(());
    }

    // Branches
    let mut branch_ids = Vec::new();
    for (name, address) in BRANCHES {
        let branch = Branch {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            address: address.to_string(),
            phone: None,
            is_active: true,
            created_at: Utc::now(),
        };
        db.catalog().insert_branch(&branch).await?;
        branch_ids.push(branch.id);
    }
    println!("✓ Created {} branches", branch_ids.len());

    // Products + opening stock
    println!();
    println!("Generating products...");

    let mut generated = 0usize;
    let start = std::time::Instant::now();

    'outer: for (category, products) in CATEGORIES {
        for (idx, (name, price)) in products.iter().enumerate() {
            if generated >= count {
                break 'outer;
            }

            let product = generate_product(category, name, *price, generated * 37 + idx);
            db.catalog().insert_product(&product).await?;

            // Opening stock at every branch: inventory row + matching IN
            // ledger entry, so quantity equals the ledger sum from the start
            for (branch_idx, branch_id) in branch_ids.iter().enumerate() {
                let opening = ((generated * 7 + branch_idx * 11) % 41) as i64;
                db.inventory().get_or_create(&product.id, branch_id).await?;
                if opening == 0 {
                    continue;
                }

                db.inventory()
                    .adjust_quantity(&product.id, branch_id, opening, None)
                    .await?;
                db.movements()
                    .record(NewMovement {
                        product_id: product.id.clone(),
                        branch_id: branch_id.clone(),
                        quantity: opening,
                        movement_type: MovementType::In,
                        reason: "Stock inicial".to_string(),
                        user_id: SEED_USER.to_string(),
                        batch_lot: None,
                        batch_expiry: None,
                        document_id: None,
                    })
                    .await?;
            }

            generated += 1;
            if generated % 20 == 0 {
                println!("  Generated {} products...", generated);
            }
        }
    }

    let elapsed = start.elapsed();
    println!();
    println!("✓ Generated {} products in {:?}", generated, elapsed);
    println!("✓ Seed complete!");

    Ok(())
}

/// Generates a single product with a deterministic barcode.
fn generate_product(category: &str, name: &str, price: i64, seed: usize) -> Product {
    // EAN-13 shaped barcode under the Chilean 780 prefix (checksum not valid)
    let barcode = format!("780{:010}", seed);

    // Cost between 55% and 75% of price, rounded to tens of pesos
    let cost_pct = 55 + (seed % 20) as i64;
    let cost = (price * cost_pct / 100) / 10 * 10;

    Product {
        id: Uuid::new_v4().to_string(),
        name: name.to_string(),
        barcode,
        sku: None,
        category: Some(category.to_string()),
        price: Money::from_clp(price),
        cost: Money::from_clp(cost),
        tax_rate_bps: DEFAULT_TAX_RATE_BPS,
        is_active: true,
        created_at: Utc::now(),
    }
}
