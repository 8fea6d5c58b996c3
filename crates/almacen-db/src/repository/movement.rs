//! # Movement Repository
//!
//! The append-only stock ledger. Entries are inserted and queried, never
//! updated or deleted.
//!
//! ## Ledger-Sum Invariant
//! For every (product, branch) pair, the signed sum of its ledger entries
//! equals the inventory record's current quantity. The engine maintains this
//! by pairing every `adjust_quantity` with exactly one `record` call;
//! [`MovementRepository::sum_for`] exists so tests and reports can check it.

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use crate::repository::Page;
use almacen_core::{MovementType, StockMovement};

// =============================================================================
// Query Types
// =============================================================================

/// A ledger entry about to be written. The repository assigns id and
/// timestamp.
#[derive(Debug, Clone)]
pub struct NewMovement {
    pub product_id: String,
    pub branch_id: String,
    /// Signed delta this entry explains.
    pub quantity: i64,
    pub movement_type: MovementType,
    pub reason: String,
    pub user_id: String,
    pub batch_lot: Option<String>,
    pub batch_expiry: Option<DateTime<Utc>>,
    pub document_id: Option<String>,
}

/// Filter for ledger queries. All fields combine with AND.
#[derive(Debug, Clone, Default)]
pub struct MovementFilter {
    pub product_id: Option<String>,
    pub branch_id: Option<String>,
    pub user_id: Option<String>,
    pub movement_type: Option<MovementType>,
    pub document_id: Option<String>,
    /// Inclusive lower bound on created_at.
    pub from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on created_at.
    pub to: Option<DateTime<Utc>>,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for the stock-movement ledger.
///
/// ## Usage
/// ```rust,ignore
/// let repo = MovementRepository::new(pool);
///
/// repo.record(NewMovement { .. }).await?;
/// let (entries, total) = repo.query(&filter, Page::default()).await?;
/// ```
#[derive(Debug, Clone)]
pub struct MovementRepository {
    pool: SqlitePool,
}

impl MovementRepository {
    /// Creates a new MovementRepository.
    pub fn new(pool: SqlitePool) -> Self {
        MovementRepository { pool }
    }

    /// Appends one ledger entry.
    pub async fn record(&self, movement: NewMovement) -> DbResult<StockMovement> {
        let entry = StockMovement {
            id: Uuid::new_v4().to_string(),
            product_id: movement.product_id,
            branch_id: movement.branch_id,
            quantity: movement.quantity,
            movement_type: movement.movement_type,
            reason: movement.reason,
            user_id: movement.user_id,
            batch_lot: movement.batch_lot,
            batch_expiry: movement.batch_expiry,
            document_id: movement.document_id,
            created_at: Utc::now(),
        };

        debug!(
            product_id = %entry.product_id,
            branch_id = %entry.branch_id,
            quantity = %entry.quantity,
            movement_type = ?entry.movement_type,
            "Recording stock movement"
        );

        sqlx::query(
            r#"
            INSERT INTO stock_movements (
                id, product_id, branch_id, quantity, movement_type,
                reason, user_id, batch_lot, batch_expiry, document_id, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)
            "#,
        )
        .bind(&entry.id)
        .bind(&entry.product_id)
        .bind(&entry.branch_id)
        .bind(entry.quantity)
        .bind(entry.movement_type)
        .bind(&entry.reason)
        .bind(&entry.user_id)
        .bind(&entry.batch_lot)
        .bind(entry.batch_expiry)
        .bind(&entry.document_id)
        .bind(entry.created_at)
        .execute(&self.pool)
        .await?;

        Ok(entry)
    }

    /// Queries the ledger newest-first with pagination.
    ///
    /// ## Returns
    /// `(entries, total)` where `total` counts all matches ignoring
    /// pagination.
    pub async fn query(
        &self,
        filter: &MovementFilter,
        page: Page,
    ) -> DbResult<(Vec<StockMovement>, i64)> {
        let total: i64 = {
            let mut qb =
                QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM stock_movements WHERE 1=1");
            Self::push_filters(&mut qb, filter);
            qb.build_query_scalar().fetch_one(&self.pool).await?
        };

        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT id, product_id, branch_id, quantity, movement_type, \
             reason, user_id, batch_lot, batch_expiry, document_id, created_at \
             FROM stock_movements WHERE 1=1",
        );
        Self::push_filters(&mut qb, filter);
        qb.push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let entries = qb
            .build_query_as::<StockMovement>()
            .fetch_all(&self.pool)
            .await?;

        Ok((entries, total))
    }

    /// All entries sharing one document id, oldest first (the legs of a
    /// transfer, the rows of an import batch).
    pub async fn by_document(&self, document_id: &str) -> DbResult<Vec<StockMovement>> {
        let entries = sqlx::query_as::<_, StockMovement>(
            r#"
            SELECT id, product_id, branch_id, quantity, movement_type,
                   reason, user_id, batch_lot, batch_expiry, document_id, created_at
            FROM stock_movements
            WHERE document_id = ?1
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(document_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(entries)
    }

    /// Signed sum of all entries for a (product, branch) pair.
    ///
    /// Equals the inventory record's quantity whenever the ledger-sum
    /// invariant holds.
    pub async fn sum_for(&self, product_id: &str, branch_id: &str) -> DbResult<i64> {
        let sum: i64 = sqlx::query_scalar(
            r#"
            SELECT COALESCE(SUM(quantity), 0)
            FROM stock_movements
            WHERE product_id = ?1 AND branch_id = ?2
            "#,
        )
        .bind(product_id)
        .bind(branch_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(sum)
    }

    fn push_filters<'a>(qb: &mut QueryBuilder<'a, Sqlite>, filter: &'a MovementFilter) {
        if let Some(product_id) = &filter.product_id {
            qb.push(" AND product_id = ").push_bind(product_id);
        }
        if let Some(branch_id) = &filter.branch_id {
            qb.push(" AND branch_id = ").push_bind(branch_id);
        }
        if let Some(user_id) = &filter.user_id {
            qb.push(" AND user_id = ").push_bind(user_id);
        }
        if let Some(movement_type) = filter.movement_type {
            qb.push(" AND movement_type = ").push_bind(movement_type);
        }
        if let Some(document_id) = &filter.document_id {
            qb.push(" AND document_id = ").push_bind(document_id);
        }
        if let Some(from) = filter.from {
            qb.push(" AND created_at >= ").push_bind(from);
        }
        if let Some(to) = filter.to {
            qb.push(" AND created_at < ").push_bind(to);
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use almacen_core::{Branch, Money, Product, DEFAULT_TAX_RATE_BPS};

    async fn setup() -> (Database, String, String) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let product = Product {
            id: Uuid::new_v4().to_string(),
            name: "Pan de Molde".to_string(),
            barcode: "7801111111111".to_string(),
            sku: None,
            category: None,
            price: Money::from_clp(2_190),
            cost: Money::from_clp(1_400),
            tax_rate_bps: DEFAULT_TAX_RATE_BPS,
            is_active: true,
            created_at: Utc::now(),
        };
        let branch = Branch {
            id: Uuid::new_v4().to_string(),
            name: "Sucursal Norte".to_string(),
            address: String::new(),
            phone: None,
            is_active: true,
            created_at: Utc::now(),
        };
        db.catalog().insert_product(&product).await.unwrap();
        db.catalog().insert_branch(&branch).await.unwrap();

        (db, product.id, branch.id)
    }

    fn movement(product_id: &str, branch_id: &str, quantity: i64) -> NewMovement {
        NewMovement {
            product_id: product_id.to_string(),
            branch_id: branch_id.to_string(),
            quantity,
            movement_type: if quantity >= 0 {
                MovementType::In
            } else {
                MovementType::Out
            },
            reason: "Manual Entry".to_string(),
            user_id: "user-1".to_string(),
            batch_lot: None,
            batch_expiry: None,
            document_id: None,
        }
    }

    #[tokio::test]
    async fn test_record_and_signed_sum() {
        let (db, product_id, branch_id) = setup().await;
        let repo = db.movements();

        repo.record(movement(&product_id, &branch_id, 10))
            .await
            .unwrap();
        repo.record(movement(&product_id, &branch_id, -3))
            .await
            .unwrap();
        repo.record(movement(&product_id, &branch_id, -2))
            .await
            .unwrap();

        assert_eq!(repo.sum_for(&product_id, &branch_id).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn test_query_filters_and_pagination() {
        let (db, product_id, branch_id) = setup().await;
        let repo = db.movements();

        for i in 0..5 {
            repo.record(movement(&product_id, &branch_id, i + 1))
                .await
                .unwrap();
        }

        let filter = MovementFilter {
            branch_id: Some(branch_id.clone()),
            movement_type: Some(MovementType::In),
            ..Default::default()
        };
        let (entries, total) = repo.query(&filter, Page::new(1, 2)).await.unwrap();
        assert_eq!(total, 5);
        assert_eq!(entries.len(), 2);

        let filter = MovementFilter {
            movement_type: Some(MovementType::Sale),
            ..Default::default()
        };
        let (entries, total) = repo.query(&filter, Page::default()).await.unwrap();
        assert!(entries.is_empty());
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn test_by_document_groups_legs() {
        let (db, product_id, branch_id) = setup().await;
        let repo = db.movements();

        let doc = "TRANS-1756500000000".to_string();
        let mut out_leg = movement(&product_id, &branch_id, -4);
        out_leg.movement_type = MovementType::Transfer;
        out_leg.document_id = Some(doc.clone());
        let mut in_leg = movement(&product_id, &branch_id, 4);
        in_leg.movement_type = MovementType::Transfer;
        in_leg.document_id = Some(doc.clone());

        repo.record(out_leg).await.unwrap();
        repo.record(in_leg).await.unwrap();

        let legs = repo.by_document(&doc).await.unwrap();
        assert_eq!(legs.len(), 2);
        assert_eq!(legs.iter().map(|m| m.quantity).sum::<i64>(), 0);
    }
}
