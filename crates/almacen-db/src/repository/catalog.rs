//! # Catalog Repository
//!
//! Database operations for products and branches.
//!
//! ## Key Operations
//! - Product CRUD with barcode lookup (the business identifier)
//! - Branch CRUD with name lookup (imports reference branches by name)
//! - Soft deletes on both

use sqlx::SqlitePool;
use tracing::debug;

use crate::error::{DbError, DbResult};
use almacen_core::{Branch, Product};

/// Repository for products and branches.
///
/// ## Usage
/// ```rust,ignore
/// let repo = CatalogRepository::new(pool);
///
/// let product = repo.product_by_barcode("7801234567890").await?;
/// let branch = repo.branch_by_name("Sucursal Centro").await?;
/// ```
#[derive(Debug, Clone)]
pub struct CatalogRepository {
    pool: SqlitePool,
}

impl CatalogRepository {
    /// Creates a new CatalogRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CatalogRepository { pool }
    }

    // =========================================================================
    // Products
    // =========================================================================

    /// Inserts a new product.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - barcode already exists
    pub async fn insert_product(&self, product: &Product) -> DbResult<()> {
        debug!(barcode = %product.barcode, "Inserting product");

        sqlx::query(
            r#"
            INSERT INTO products (
                id, name, barcode, sku, category,
                price, cost, tax_rate_bps, is_active, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.barcode)
        .bind(&product.sku)
        .bind(&product.category)
        .bind(product.price)
        .bind(product.cost)
        .bind(product.tax_rate_bps)
        .bind(product.is_active)
        .bind(product.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets a product by its ID.
    pub async fn product(&self, id: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, barcode, sku, category,
                   price, cost, tax_rate_bps, is_active, created_at
            FROM products
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Gets a product by its barcode (business identifier).
    pub async fn product_by_barcode(&self, barcode: &str) -> DbResult<Option<Product>> {
        let product = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, barcode, sku, category,
                   price, cost, tax_rate_bps, is_active, created_at
            FROM products
            WHERE barcode = ?1
            "#,
        )
        .bind(barcode)
        .fetch_optional(&self.pool)
        .await?;

        Ok(product)
    }

    /// Lists active products ordered by name.
    pub async fn list_products(&self, limit: u32) -> DbResult<Vec<Product>> {
        let products = sqlx::query_as::<_, Product>(
            r#"
            SELECT id, name, barcode, sku, category,
                   price, cost, tax_rate_bps, is_active, created_at
            FROM products
            WHERE is_active = 1
            ORDER BY name
            LIMIT ?1
            "#,
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(products)
    }

    /// Updates an existing product's mutable fields.
    ///
    /// Identity fields (id, created_at) never change.
    pub async fn update_product(&self, product: &Product) -> DbResult<()> {
        debug!(id = %product.id, "Updating product");

        let result = sqlx::query(
            r#"
            UPDATE products SET
                name = ?2,
                barcode = ?3,
                sku = ?4,
                category = ?5,
                price = ?6,
                cost = ?7,
                tax_rate_bps = ?8,
                is_active = ?9
            WHERE id = ?1
            "#,
        )
        .bind(&product.id)
        .bind(&product.name)
        .bind(&product.barcode)
        .bind(&product.sku)
        .bind(&product.category)
        .bind(product.price)
        .bind(product.cost)
        .bind(product.tax_rate_bps)
        .bind(product.is_active)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", &product.id));
        }

        Ok(())
    }

    /// Soft-deletes a product.
    ///
    /// Historical sales and movements still reference it, so the row stays.
    pub async fn deactivate_product(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deactivating product");

        let result = sqlx::query("UPDATE products SET is_active = 0 WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("Product", id));
        }

        Ok(())
    }

    // =========================================================================
    // Branches
    // =========================================================================

    /// Inserts a new branch.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - name already exists
    pub async fn insert_branch(&self, branch: &Branch) -> DbResult<()> {
        debug!(name = %branch.name, "Inserting branch");

        sqlx::query(
            r#"
            INSERT INTO branches (id, name, address, phone, is_active, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&branch.id)
        .bind(&branch.name)
        .bind(&branch.address)
        .bind(&branch.phone)
        .bind(branch.is_active)
        .bind(branch.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets a branch by its ID.
    pub async fn branch(&self, id: &str) -> DbResult<Option<Branch>> {
        let branch = sqlx::query_as::<_, Branch>(
            r#"
            SELECT id, name, address, phone, is_active, created_at
            FROM branches
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(branch)
    }

    /// Gets a branch by its unique name.
    ///
    /// Import rows reference branches by name, so this is the resolution
    /// path during import confirmation.
    pub async fn branch_by_name(&self, name: &str) -> DbResult<Option<Branch>> {
        let branch = sqlx::query_as::<_, Branch>(
            r#"
            SELECT id, name, address, phone, is_active, created_at
            FROM branches
            WHERE name = ?1
            "#,
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(branch)
    }

    /// Lists active branches ordered by name.
    pub async fn list_branches(&self) -> DbResult<Vec<Branch>> {
        let branches = sqlx::query_as::<_, Branch>(
            r#"
            SELECT id, name, address, phone, is_active, created_at
            FROM branches
            WHERE is_active = 1
            ORDER BY name
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(branches)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use crate::pool::{Database, DbConfig};
    use almacen_core::{Branch, Money, Product, DEFAULT_TAX_RATE_BPS};
    use chrono::Utc;
    use uuid::Uuid;

    fn sample_product(barcode: &str) -> Product {
        Product {
            id: Uuid::new_v4().to_string(),
            name: format!("Producto {barcode}"),
            barcode: barcode.to_string(),
            sku: None,
            category: Some("Abarrotes".to_string()),
            price: Money::from_clp(1_290),
            cost: Money::from_clp(800),
            tax_rate_bps: DEFAULT_TAX_RATE_BPS,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    fn sample_branch(name: &str) -> Branch {
        Branch {
            id: Uuid::new_v4().to_string(),
            name: name.to_string(),
            address: "Av. Principal 123".to_string(),
            phone: None,
            is_active: true,
            created_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_product_roundtrip_by_barcode() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.catalog();

        let product = sample_product("7801234567890");
        repo.insert_product(&product).await.unwrap();

        let found = repo
            .product_by_barcode("7801234567890")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, product.id);
        assert_eq!(found.price, Money::from_clp(1_290));
        assert_eq!(found.tax_rate_bps, DEFAULT_TAX_RATE_BPS);
    }

    #[tokio::test]
    async fn test_duplicate_barcode_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.catalog();

        repo.insert_product(&sample_product("111")).await.unwrap();
        let err = repo.insert_product(&sample_product("111")).await;
        assert!(matches!(
            err,
            Err(crate::error::DbError::UniqueViolation { .. })
        ));
    }

    #[tokio::test]
    async fn test_branch_by_name() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.catalog();

        let branch = sample_branch("Sucursal Centro");
        repo.insert_branch(&branch).await.unwrap();

        let found = repo.branch_by_name("Sucursal Centro").await.unwrap();
        assert_eq!(found.unwrap().id, branch.id);

        let missing = repo.branch_by_name("Sucursal Fantasma").await.unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_deactivate_hides_from_listing() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.catalog();

        let product = sample_product("222");
        repo.insert_product(&product).await.unwrap();
        repo.deactivate_product(&product.id).await.unwrap();

        let listed = repo.list_products(50).await.unwrap();
        assert!(listed.is_empty());

        // Still reachable by id for history
        assert!(repo.product(&product.id).await.unwrap().is_some());
    }
}
