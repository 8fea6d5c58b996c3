//! # Sale Repository
//!
//! Database operations for sales, their line items, and attached card
//! payment data.
//!
//! ## Storage Shape
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  sales            1 ──── n   sale_items                                 │
//! │  ┌─────────────────────┐     ┌─────────────────────────────┐           │
//! │  │ id                  │     │ sale_id                     │           │
//! │  │ total_amount        │     │ name_snapshot               │           │
//! │  │ payment_method      │     │ price_snapshot  ← frozen at │           │
//! │  │ card_* (nullable)   │     │ line_total        sale time │           │
//! │  └─────────────────────┘     └─────────────────────────────┘           │
//! │                                                                         │
//! │  Card payment data is flattened into nullable card_* columns rather    │
//! │  than a separate table: it is 1:0..1 and read only alongside the sale. │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Sale + items are written in one transaction; a sale with half its lines
//! can never be observed.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;
use uuid::Uuid;

use crate::error::DbResult;
use crate::repository::Page;
use almacen_core::{CardPaymentData, Money, PaymentMethod, Sale, SaleItem, SaleStatus};

// =============================================================================
// Query Types
// =============================================================================

/// Filter for sale listings.
#[derive(Debug, Clone, Default)]
pub struct SaleFilter {
    pub branch_id: Option<String>,
    pub user_id: Option<String>,
    /// Restrict to one UTC calendar day.
    pub date: Option<NaiveDate>,
}

/// Cash/card/total sums over a window of completed sales.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SaleTotals {
    pub sales_total: Money,
    pub cash_total: Money,
    pub card_total: Money,
}

/// Flat row shape of the sales table.
#[derive(Debug, sqlx::FromRow)]
struct SaleRow {
    id: String,
    branch_id: String,
    user_id: String,
    total_amount: Money,
    payment_method: PaymentMethod,
    status: SaleStatus,
    card_order_id: Option<String>,
    card_authorization_code: Option<String>,
    card_amount: Option<Money>,
    card_response_code: Option<i64>,
    card_transaction_date: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl SaleRow {
    fn into_sale(self, items: Vec<SaleItem>) -> Sale {
        let card_payment = match (
            self.card_order_id,
            self.card_authorization_code,
            self.card_amount,
            self.card_response_code,
            self.card_transaction_date,
        ) {
            (Some(order_id), Some(authorization_code), Some(amount), Some(response_code), Some(transaction_date)) => {
                Some(CardPaymentData {
                    order_id,
                    authorization_code,
                    amount,
                    response_code,
                    transaction_date,
                })
            }
            _ => None,
        };

        Sale {
            id: self.id,
            branch_id: self.branch_id,
            user_id: self.user_id,
            items,
            total_amount: self.total_amount,
            payment_method: self.payment_method,
            status: self.status,
            card_payment,
            created_at: self.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SaleItemRow {
    product_id: String,
    name_snapshot: String,
    price_snapshot: Money,
    quantity: i64,
    line_total: Money,
}

impl SaleItemRow {
    fn into_item(self) -> SaleItem {
        SaleItem {
            product_id: self.product_id,
            name: self.name_snapshot,
            price: self.price_snapshot,
            quantity: self.quantity,
            total: self.line_total,
        }
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for sale persistence and reporting sums.
///
/// ## Usage
/// ```rust,ignore
/// let repo = SaleRepository::new(pool);
///
/// repo.insert(&sale).await?;
/// let totals = repo.totals_since(&user_id, &branch_id, shift.start_time).await?;
/// ```
#[derive(Debug, Clone)]
pub struct SaleRepository {
    pool: SqlitePool,
}

impl SaleRepository {
    /// Creates a new SaleRepository.
    pub fn new(pool: SqlitePool) -> Self {
        SaleRepository { pool }
    }

    /// Inserts a sale and all its line items in one transaction.
    pub async fn insert(&self, sale: &Sale) -> DbResult<()> {
        debug!(
            id = %sale.id,
            branch_id = %sale.branch_id,
            total = %sale.total_amount,
            items = sale.items.len(),
            "Inserting sale"
        );

        let mut tx = self.pool.begin().await?;

        let card = sale.card_payment.as_ref();
        sqlx::query(
            r#"
            INSERT INTO sales (
                id, branch_id, user_id, total_amount, payment_method, status,
                card_order_id, card_authorization_code, card_amount,
                card_response_code, card_transaction_date, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
            "#,
        )
        .bind(&sale.id)
        .bind(&sale.branch_id)
        .bind(&sale.user_id)
        .bind(sale.total_amount)
        .bind(sale.payment_method)
        .bind(sale.status)
        .bind(card.map(|c| c.order_id.clone()))
        .bind(card.map(|c| c.authorization_code.clone()))
        .bind(card.map(|c| c.amount))
        .bind(card.map(|c| c.response_code))
        .bind(card.map(|c| c.transaction_date))
        .bind(sale.created_at)
        .execute(&mut *tx)
        .await?;

        for (position, item) in sale.items.iter().enumerate() {
            sqlx::query(
                r#"
                INSERT INTO sale_items (
                    id, sale_id, product_id, name_snapshot,
                    price_snapshot, quantity, line_total, position
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                "#,
            )
            .bind(Uuid::new_v4().to_string())
            .bind(&sale.id)
            .bind(&item.product_id)
            .bind(&item.name)
            .bind(item.price)
            .bind(item.quantity)
            .bind(item.total)
            .bind(position as i64)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }

    /// Gets a sale by ID, with its items assembled.
    pub async fn get(&self, id: &str) -> DbResult<Option<Sale>> {
        let row = sqlx::query_as::<_, SaleRow>(
            r#"
            SELECT id, branch_id, user_id, total_amount, payment_method, status,
                   card_order_id, card_authorization_code, card_amount,
                   card_response_code, card_transaction_date, created_at
            FROM sales
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let items = self.items_for(id).await?;
        Ok(Some(row.into_sale(items)))
    }

    /// Lists sales newest-first with filters and pagination.
    ///
    /// ## Returns
    /// `(sales, total)` where `total` counts all matches ignoring pagination.
    pub async fn list(&self, filter: &SaleFilter, page: Page) -> DbResult<(Vec<Sale>, i64)> {
        let total: i64 = {
            let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM sales WHERE 1=1");
            Self::push_filters(&mut qb, filter);
            qb.build_query_scalar().fetch_one(&self.pool).await?
        };

        let mut qb = QueryBuilder::<Sqlite>::new(
            "SELECT id, branch_id, user_id, total_amount, payment_method, status, \
             card_order_id, card_authorization_code, card_amount, \
             card_response_code, card_transaction_date, created_at \
             FROM sales WHERE 1=1",
        );
        Self::push_filters(&mut qb, filter);
        qb.push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let rows = qb.build_query_as::<SaleRow>().fetch_all(&self.pool).await?;

        let mut sales = Vec::with_capacity(rows.len());
        for row in rows {
            let items = self.items_for(&row.id).await?;
            sales.push(row.into_sale(items));
        }

        Ok((sales, total))
    }

    /// Sums completed sales for a cashier at a branch since a point in time.
    ///
    /// The window is open-ended on purpose: shift close wants everything
    /// from shift start until the moment of closing.
    pub async fn totals_since(
        &self,
        user_id: &str,
        branch_id: &str,
        since: DateTime<Utc>,
    ) -> DbResult<SaleTotals> {
        let row: (i64, i64, i64) = sqlx::query_as(
            r#"
            SELECT
                COALESCE(SUM(total_amount), 0),
                COALESCE(SUM(CASE WHEN payment_method = 'cash' THEN total_amount ELSE 0 END), 0),
                COALESCE(SUM(CASE WHEN payment_method = 'card' THEN total_amount ELSE 0 END), 0)
            FROM sales
            WHERE user_id = ?1
              AND branch_id = ?2
              AND status = 'completed'
              AND created_at >= ?3
            "#,
        )
        .bind(user_id)
        .bind(branch_id)
        .bind(since)
        .fetch_one(&self.pool)
        .await?;

        Ok(SaleTotals {
            sales_total: Money::from_clp(row.0),
            cash_total: Money::from_clp(row.1),
            card_total: Money::from_clp(row.2),
        })
    }

    async fn items_for(&self, sale_id: &str) -> DbResult<Vec<SaleItem>> {
        let rows = sqlx::query_as::<_, SaleItemRow>(
            r#"
            SELECT product_id, name_snapshot, price_snapshot, quantity, line_total
            FROM sale_items
            WHERE sale_id = ?1
            ORDER BY position ASC
            "#,
        )
        .bind(sale_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(SaleItemRow::into_item).collect())
    }

    fn push_filters<'a>(qb: &mut QueryBuilder<'a, Sqlite>, filter: &'a SaleFilter) {
        if let Some(branch_id) = &filter.branch_id {
            qb.push(" AND branch_id = ").push_bind(branch_id);
        }
        if let Some(user_id) = &filter.user_id {
            qb.push(" AND user_id = ").push_bind(user_id);
        }
        if let Some(date) = filter.date {
            let day_start = date.and_time(NaiveTime::MIN).and_utc();
            let day_end = day_start + Duration::days(1);
            qb.push(" AND created_at >= ")
                .push_bind(day_start)
                .push(" AND created_at < ")
                .push_bind(day_end);
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
    use almacen_core::{Branch, Product, DEFAULT_TAX_RATE_BPS};

    async fn setup() -> (Database, String, String) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let product = Product {
            id: Uuid::new_v4().to_string(),
            name: "Café Molido 250g".to_string(),
            barcode: "7803333333333".to_string(),
            sku: None,
            category: None,
            price: Money::from_clp(4_990),
            cost: Money::from_clp(3_200),
            tax_rate_bps: DEFAULT_TAX_RATE_BPS,
            is_active: true,
            created_at: Utc::now(),
        };
        let branch = Branch {
            id: Uuid::new_v4().to_string(),
            name: "Sucursal Centro".to_string(),
            address: String::new(),
            phone: None,
            is_active: true,
            created_at: Utc::now(),
        };
        db.catalog().insert_product(&product).await.unwrap();
        db.catalog().insert_branch(&branch).await.unwrap();

        (db, product.id, branch.id)
    }

    fn sample_sale(
        product_id: &str,
        branch_id: &str,
        method: PaymentMethod,
        card: Option<CardPaymentData>,
    ) -> Sale {
        let item = SaleItem {
            product_id: product_id.to_string(),
            name: "Café Molido 250g".to_string(),
            price: Money::from_clp(4_990),
            quantity: 2,
            total: Money::from_clp(9_980),
        };
        Sale {
            id: Uuid::new_v4().to_string(),
            branch_id: branch_id.to_string(),
            user_id: "cashier-1".to_string(),
            items: vec![item],
            total_amount: Money::from_clp(9_980),
            payment_method: method,
            status: SaleStatus::Completed,
            card_payment: card,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_get_cash_sale() {
        let (db, product_id, branch_id) = setup().await;
        let repo = db.sales();

        let sale = sample_sale(&product_id, &branch_id, PaymentMethod::Cash, None);
        repo.insert(&sale).await.unwrap();

        let loaded = repo.get(&sale.id).await.unwrap().unwrap();
        assert_eq!(loaded.total_amount, Money::from_clp(9_980));
        assert_eq!(loaded.items.len(), 1);
        assert_eq!(loaded.items[0].name, "Café Molido 250g");
        assert_eq!(loaded.items[0].price, Money::from_clp(4_990));
        assert!(loaded.card_payment.is_none());
    }

    #[tokio::test]
    async fn test_card_sale_roundtrips_payment_data() {
        let (db, product_id, branch_id) = setup().await;
        let repo = db.sales();

        let card = CardPaymentData {
            order_id: "INV-1756500000000".to_string(),
            authorization_code: "AUTH-12345".to_string(),
            amount: Money::from_clp(9_980),
            response_code: 0,
            transaction_date: Utc::now(),
        };
        let sale = sample_sale(
            &product_id,
            &branch_id,
            PaymentMethod::Card,
            Some(card.clone()),
        );
        repo.insert(&sale).await.unwrap();

        let loaded = repo.get(&sale.id).await.unwrap().unwrap();
        let loaded_card = loaded.card_payment.unwrap();
        assert_eq!(loaded_card.order_id, card.order_id);
        assert_eq!(loaded_card.authorization_code, "AUTH-12345");
        assert_eq!(loaded_card.response_code, 0);
    }

    #[tokio::test]
    async fn test_totals_since_splits_by_method() {
        let (db, product_id, branch_id) = setup().await;
        let repo = db.sales();

        let since = Utc::now() - Duration::minutes(1);

        repo.insert(&sample_sale(&product_id, &branch_id, PaymentMethod::Cash, None))
            .await
            .unwrap();
        repo.insert(&sample_sale(&product_id, &branch_id, PaymentMethod::Card, None))
            .await
            .unwrap();

        let totals = repo.totals_since("cashier-1", &branch_id, since).await.unwrap();
        assert_eq!(totals.sales_total, Money::from_clp(19_960));
        assert_eq!(totals.cash_total, Money::from_clp(9_980));
        assert_eq!(totals.card_total, Money::from_clp(9_980));

        // Sales before the window are excluded
        let totals = repo
            .totals_since("cashier-1", &branch_id, Utc::now() + Duration::minutes(5))
            .await
            .unwrap();
        assert_eq!(totals, SaleTotals::default());
    }

    #[tokio::test]
    async fn test_list_filters_by_day() {
        let (db, product_id, branch_id) = setup().await;
        let repo = db.sales();

        repo.insert(&sample_sale(&product_id, &branch_id, PaymentMethod::Cash, None))
            .await
            .unwrap();

        let filter = SaleFilter {
            branch_id: Some(branch_id.clone()),
            date: Some(Utc::now().date_naive()),
            ..Default::default()
        };
        let (sales, total) = repo.list(&filter, Page::default()).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(sales.len(), 1);

        let filter = SaleFilter {
            date: Some(Utc::now().date_naive() - Duration::days(1)),
            ..Default::default()
        };
        let (sales, total) = repo.list(&filter, Page::default()).await.unwrap();
        assert!(sales.is_empty());
        assert_eq!(total, 0);
    }
}
