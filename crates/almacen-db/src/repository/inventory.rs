//! # Inventory Repository
//!
//! Database operations for per-branch stock records and received batches.
//!
//! ## The Conditional Adjust
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                 Why adjust_quantity Is One UPDATE                       │
//! │                                                                         │
//! │  ❌ WRONG: read, check, write (racy)                                   │
//! │     let rec = find(...);                 ← A and B both read qty=3     │
//! │     if rec.quantity >= 3 { update(...) } ← both pass, stock goes -3    │
//! │                                                                         │
//! │  ✅ CORRECT: guarded delta (atomic)                                    │
//! │     UPDATE inventory                                                    │
//! │     SET quantity = quantity + ?delta                                    │
//! │     WHERE product_id = ? AND branch_id = ?                              │
//! │       AND quantity + ?delta >= 0                                        │
//! │                                                                         │
//! │  Zero rows affected + record exists = insufficient stock.               │
//! │  The CHECK(quantity >= 0) constraint is the backstop.                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use crate::repository::Page;
use almacen_core::{Batch, BatchInfo, InventoryRecord, StockStatus, DEFAULT_LOW_STOCK_THRESHOLD};

// =============================================================================
// Query Types
// =============================================================================

/// Sort order for inventory listings. Enumerated on purpose: callers never
/// hand raw column names to the query builder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum InventorySort {
    /// Most recently touched records first.
    #[default]
    LastUpdated,
    /// Lowest quantity first (restocking view).
    Quantity,
    /// Alphabetic by product name.
    ProductName,
}

impl InventorySort {
    fn order_clause(self) -> &'static str {
        match self {
            InventorySort::LastUpdated => "i.last_updated DESC",
            InventorySort::Quantity => "i.quantity ASC",
            InventorySort::ProductName => "p.name ASC",
        }
    }
}

/// Filter for inventory listings.
#[derive(Debug, Clone, Default)]
pub struct InventoryFilter {
    /// Restrict to one branch.
    pub branch_id: Option<String>,
    /// Case-insensitive substring over product name and barcode.
    pub search: Option<String>,
    /// Restrict to records in one derived stock state.
    pub status: Option<StockStatus>,
    pub sort: InventorySort,
}

/// One row of the inventory listing, joined with product and branch names.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct InventoryRow {
    pub id: String,
    pub product_id: String,
    pub product_name: String,
    pub barcode: String,
    pub branch_id: String,
    pub branch_name: String,
    pub quantity: i64,
    pub low_stock_threshold: i64,
    pub last_updated: DateTime<Utc>,
}

impl InventoryRow {
    pub fn status(&self) -> StockStatus {
        StockStatus::of(self.quantity, self.low_stock_threshold)
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for inventory records and their received batches.
///
/// ## Usage
/// ```rust,ignore
/// let repo = InventoryRepository::new(pool);
///
/// repo.get_or_create(product_id, branch_id).await?;
/// let after = repo.adjust_quantity(product_id, branch_id, -3, None).await?;
/// ```
#[derive(Debug, Clone)]
pub struct InventoryRepository {
    pool: SqlitePool,
}

impl InventoryRepository {
    /// Creates a new InventoryRepository.
    pub fn new(pool: SqlitePool) -> Self {
        InventoryRepository { pool }
    }

    /// Finds the inventory record for a (product, branch) pair.
    pub async fn find(
        &self,
        product_id: &str,
        branch_id: &str,
    ) -> DbResult<Option<InventoryRecord>> {
        let record = sqlx::query_as::<_, InventoryRecord>(
            r#"
            SELECT id, product_id, branch_id, quantity, low_stock_threshold, last_updated
            FROM inventory
            WHERE product_id = ?1 AND branch_id = ?2
            "#,
        )
        .bind(product_id)
        .bind(branch_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(record)
    }

    /// Gets the inventory record for a pair, creating an empty one if absent.
    ///
    /// ## Idempotency
    /// `INSERT .. ON CONFLICT DO NOTHING` then select, so two concurrent
    /// callers both end up with the same single row.
    pub async fn get_or_create(
        &self,
        product_id: &str,
        branch_id: &str,
    ) -> DbResult<InventoryRecord> {
        let now = Utc::now();
        let id = Uuid::new_v4().to_string();

        sqlx::query(
            r#"
            INSERT INTO inventory (id, product_id, branch_id, quantity, low_stock_threshold, last_updated)
            VALUES (?1, ?2, ?3, 0, ?4, ?5)
            ON CONFLICT (product_id, branch_id) DO NOTHING
            "#,
        )
        .bind(&id)
        .bind(product_id)
        .bind(branch_id)
        .bind(DEFAULT_LOW_STOCK_THRESHOLD)
        .bind(now)
        .execute(&self.pool)
        .await?;

        let record = sqlx::query_as::<_, InventoryRecord>(
            r#"
            SELECT id, product_id, branch_id, quantity, low_stock_threshold, last_updated
            FROM inventory
            WHERE product_id = ?1 AND branch_id = ?2
            "#,
        )
        .bind(product_id)
        .bind(branch_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(record)
    }

    /// Applies a signed quantity delta, guarded so the result can't go
    /// negative.
    ///
    /// ## Returns
    /// * `Ok(Some(record))` - delta applied, updated record returned
    /// * `Ok(None)` - record exists but the guard rejected the delta
    ///   (insufficient stock); nothing was written
    /// * `Err(DbError::NotFound)` - no record for the pair
    ///
    /// When `delta > 0` and `batch` is supplied, a batch row is appended to
    /// the record's received history.
    pub async fn adjust_quantity(
        &self,
        product_id: &str,
        branch_id: &str,
        delta: i64,
        batch: Option<&BatchInfo>,
    ) -> DbResult<Option<InventoryRecord>> {
        debug!(product_id = %product_id, branch_id = %branch_id, delta = %delta, "Adjusting inventory");

        let now = Utc::now();

        let result = sqlx::query(
            r#"
            UPDATE inventory
            SET quantity = quantity + ?3,
                last_updated = ?4
            WHERE product_id = ?1 AND branch_id = ?2
              AND quantity + ?3 >= 0
            "#,
        )
        .bind(product_id)
        .bind(branch_id)
        .bind(delta)
        .bind(now)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            // Distinguish "no record" from "guard rejected"
            return match self.find(product_id, branch_id).await? {
                Some(_) => Ok(None),
                None => Err(crate::error::DbError::not_found(
                    "Inventory",
                    format!("{product_id}@{branch_id}"),
                )),
            };
        }

        let record = sqlx::query_as::<_, InventoryRecord>(
            r#"
            SELECT id, product_id, branch_id, quantity, low_stock_threshold, last_updated
            FROM inventory
            WHERE product_id = ?1 AND branch_id = ?2
            "#,
        )
        .bind(product_id)
        .bind(branch_id)
        .fetch_one(&self.pool)
        .await?;

        if delta > 0 {
            if let Some(info) = batch {
                self.append_batch(&record.id, delta, info, now).await?;
            }
        }

        Ok(Some(record))
    }

    /// Appends a received batch row. Batches are history, never consumed.
    async fn append_batch(
        &self,
        inventory_id: &str,
        quantity: i64,
        info: &BatchInfo,
        received_at: DateTime<Utc>,
    ) -> DbResult<()> {
        sqlx::query(
            r#"
            INSERT INTO inventory_batches (id, inventory_id, lot, expiry, quantity, received_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(Uuid::new_v4().to_string())
        .bind(inventory_id)
        .bind(&info.lot)
        .bind(info.expiry)
        .bind(quantity)
        .bind(received_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Lists the received batches for an inventory record, newest first.
    pub async fn batches(&self, inventory_id: &str) -> DbResult<Vec<Batch>> {
        let batches = sqlx::query_as::<_, Batch>(
            r#"
            SELECT id, inventory_id, lot, expiry, quantity, received_at
            FROM inventory_batches
            WHERE inventory_id = ?1
            ORDER BY received_at DESC
            "#,
        )
        .bind(inventory_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(batches)
    }

    /// Updates the low-stock threshold for a pair.
    pub async fn set_low_stock_threshold(
        &self,
        product_id: &str,
        branch_id: &str,
        threshold: i64,
    ) -> DbResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE inventory
            SET low_stock_threshold = ?3
            WHERE product_id = ?1 AND branch_id = ?2
            "#,
        )
        .bind(product_id)
        .bind(branch_id)
        .bind(threshold)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(crate::error::DbError::not_found(
                "Inventory",
                format!("{product_id}@{branch_id}"),
            ));
        }

        Ok(())
    }

    /// Queries the inventory listing with filters, sort, and pagination.
    ///
    /// ## Returns
    /// `(rows, total)` where `total` counts all matches ignoring pagination.
    pub async fn query(
        &self,
        filter: &InventoryFilter,
        page: Page,
    ) -> DbResult<(Vec<InventoryRow>, i64)> {
        let total: i64 = {
            let mut qb = QueryBuilder::<Sqlite>::new(
                "SELECT COUNT(*) FROM inventory i \
                 JOIN products p ON p.id = i.product_id \
                 JOIN branches b ON b.id = i.branch_id WHERE 1=1",
            );
            Self::push_filters(&mut qb, filter);
            qb.build_query_scalar().fetch_one(&self.pool).await?
        };

        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT i.id, i.product_id, p.name AS product_name, p.barcode, \
             i.branch_id, b.name AS branch_name, \
             i.quantity, i.low_stock_threshold, i.last_updated \
             FROM inventory i \
             JOIN products p ON p.id = i.product_id \
             JOIN branches b ON b.id = i.branch_id WHERE 1=1",
        );
        Self::push_filters(&mut qb, filter);
        qb.push(" ORDER BY ")
            .push(filter.sort.order_clause())
            .push(" LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let rows = qb
            .build_query_as::<InventoryRow>()
            .fetch_all(&self.pool)
            .await?;

        Ok((rows, total))
    }

    fn push_filters<'a>(qb: &mut QueryBuilder<'a, Sqlite>, filter: &'a InventoryFilter) {
        if let Some(branch_id) = &filter.branch_id {
            qb.push(" AND i.branch_id = ").push_bind(branch_id);
        }
        if let Some(search) = &filter.search {
            // SQLite LIKE is case-insensitive for ASCII
            let pattern = format!("%{}%", search.trim());
            qb.push(" AND (p.name LIKE ")
                .push_bind(pattern.clone())
                .push(" OR p.barcode LIKE ")
                .push_bind(pattern)
                .push(")");
        }
        // The filter predicates overlap on purpose: `low` has no lower
        // bound (a drained record is still low) and `ok` means anything
        // on hand, unlike the disjoint derived display status.
        match filter.status {
            Some(StockStatus::Out) => {
                qb.push(" AND i.quantity = 0");
            }
            Some(StockStatus::Low) => {
                qb.push(" AND i.quantity <= i.low_stock_threshold");
            }
            Some(StockStatus::Ok) => {
                qb.push(" AND i.quantity > 0");
            }
            None => {}
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
