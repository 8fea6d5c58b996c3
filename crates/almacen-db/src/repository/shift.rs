//! # Shift Repository
//!
//! Database operations for cash shifts.
//!
//! The one-open-shift rule (at most one `open` shift per (user, branch))
//! is enforced by CashShiftAccounting at start time; the close here is
//! guarded by `status = 'open'` so a shift can never be closed twice.

use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;

use crate::error::{DbError, DbResult};
use crate::repository::Page;
use almacen_core::{CashShift, Money};

// =============================================================================
// Query Types
// =============================================================================

/// Filter for shift listings.
#[derive(Debug, Clone, Default)]
pub struct ShiftFilter {
    pub branch_id: Option<String>,
    pub user_id: Option<String>,
    /// Restrict to shifts started on one UTC calendar day.
    pub date: Option<NaiveDate>,
}

/// The values written when a shift closes. Computed by the engine from the
/// open shift and the sale totals of its window.
#[derive(Debug, Clone)]
pub struct ShiftClose {
    pub end_time: DateTime<Utc>,
    pub sales_total: Money,
    pub cash_sales_total: Money,
    pub card_sales_total: Money,
    pub expected_cash: Money,
    pub actual_cash: Money,
    pub difference: Money,
    pub observations: Option<String>,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for cash shift lifecycle.
///
/// ## Usage
/// ```rust,ignore
/// let repo = ShiftRepository::new(pool);
///
/// if repo.find_open(&user_id, &branch_id).await?.is_some() {
///     // refuse to open a second shift
/// }
/// ```
#[derive(Debug, Clone)]
pub struct ShiftRepository {
    pool: SqlitePool,
}

const SHIFT_COLUMNS: &str = "id, user_id, branch_id, start_time, end_time, start_amount, \
     sales_total, cash_sales_total, card_sales_total, expected_cash, \
     actual_cash, difference, status, observations";

impl ShiftRepository {
    /// Creates a new ShiftRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ShiftRepository { pool }
    }

    /// Inserts a freshly opened shift.
    pub async fn insert(&self, shift: &CashShift) -> DbResult<()> {
        debug!(id = %shift.id, user_id = %shift.user_id, "Inserting shift");

        sqlx::query(
            r#"
            INSERT INTO cash_shifts (
                id, user_id, branch_id, start_time, end_time, start_amount,
                sales_total, cash_sales_total, card_sales_total, expected_cash,
                actual_cash, difference, status, observations
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
            "#,
        )
        .bind(&shift.id)
        .bind(&shift.user_id)
        .bind(&shift.branch_id)
        .bind(shift.start_time)
        .bind(shift.end_time)
        .bind(shift.start_amount)
        .bind(shift.sales_total)
        .bind(shift.cash_sales_total)
        .bind(shift.card_sales_total)
        .bind(shift.expected_cash)
        .bind(shift.actual_cash)
        .bind(shift.difference)
        .bind(shift.status)
        .bind(&shift.observations)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Gets a shift by ID.
    pub async fn get(&self, id: &str) -> DbResult<Option<CashShift>> {
        let shift = sqlx::query_as::<_, CashShift>(&format!(
            "SELECT {SHIFT_COLUMNS} FROM cash_shifts WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(shift)
    }

    /// Finds the open shift for a (user, branch) pair, if any.
    pub async fn find_open(&self, user_id: &str, branch_id: &str) -> DbResult<Option<CashShift>> {
        let shift = sqlx::query_as::<_, CashShift>(&format!(
            "SELECT {SHIFT_COLUMNS} FROM cash_shifts \
             WHERE user_id = ?1 AND branch_id = ?2 AND status = 'open' \
             ORDER BY start_time DESC LIMIT 1"
        ))
        .bind(user_id)
        .bind(branch_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(shift)
    }

    /// Closes an open shift, writing its reconciliation values.
    ///
    /// ## Returns
    /// * `Ok(Some(shift))` - closed, updated row returned
    /// * `Ok(None)` - shift exists but is not open (already closed)
    /// * `Err(DbError::NotFound)` - no shift with this id
    pub async fn close(&self, id: &str, close: &ShiftClose) -> DbResult<Option<CashShift>> {
        debug!(id = %id, "Closing shift");

        let result = sqlx::query(
            r#"
            UPDATE cash_shifts SET
                end_time = ?2,
                sales_total = ?3,
                cash_sales_total = ?4,
                card_sales_total = ?5,
                expected_cash = ?6,
                actual_cash = ?7,
                difference = ?8,
                observations = ?9,
                status = 'closed'
            WHERE id = ?1 AND status = 'open'
            "#,
        )
        .bind(id)
        .bind(close.end_time)
        .bind(close.sales_total)
        .bind(close.cash_sales_total)
        .bind(close.card_sales_total)
        .bind(close.expected_cash)
        .bind(close.actual_cash)
        .bind(close.difference)
        .bind(&close.observations)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return match self.get(id).await? {
                Some(_) => Ok(None),
                None => Err(DbError::not_found("Shift", id)),
            };
        }

        let shift = self
            .get(id)
            .await?
            .ok_or_else(|| DbError::not_found("Shift", id))?;
        Ok(Some(shift))
    }

    /// Lists shifts newest-first (by start time) with pagination.
    pub async fn list(&self, filter: &ShiftFilter, page: Page) -> DbResult<(Vec<CashShift>, i64)> {
        let total: i64 = {
            let mut qb = QueryBuilder::<Sqlite>::new("SELECT COUNT(*) FROM cash_shifts WHERE 1=1");
            Self::push_filters(&mut qb, filter);
            qb.build_query_scalar().fetch_one(&self.pool).await?
        };

        let mut qb = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {SHIFT_COLUMNS} FROM cash_shifts WHERE 1=1"
        ));
        Self::push_filters(&mut qb, filter);
        qb.push(" ORDER BY start_time DESC LIMIT ")
            .push_bind(page.limit())
            .push(" OFFSET ")
            .push_bind(page.offset());

        let shifts = qb
            .build_query_as::<CashShift>()
            .fetch_all(&self.pool)
            .await?;

        Ok((shifts, total))
    }

    fn push_filters<'a>(qb: &mut QueryBuilder<'a, Sqlite>, filter: &'a ShiftFilter) {
        if let Some(branch_id) = &filter.branch_id {
            qb.push(" AND branch_id = ").push_bind(branch_id);
        }
        if let Some(user_id) = &filter.user_id {
            qb.push(" AND user_id = ").push_bind(user_id);
        }
        if let Some(date) = filter.date {
            let day_start = date.and_time(NaiveTime::MIN).and_utc();
            let day_end = day_start + Duration::days(1);
            qb.push(" AND start_time >= ")
                .push_bind(day_start)
                .push(" AND start_time < ")
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
    use almacen_core::{Branch, ShiftStatus};
    use uuid::Uuid;

    async fn setup() -> (Database, String) {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let branch = Branch {
            id: Uuid::new_v4().to_string(),
            name: "Sucursal Centro".to_string(),
            address: String::new(),
            phone: None,
            is_active: true,
            created_at: Utc::now(),
        };
        db.catalog().insert_branch(&branch).await.unwrap();
        (db, branch.id)
    }

    fn open_shift(branch_id: &str) -> CashShift {
        CashShift {
            id: Uuid::new_v4().to_string(),
            user_id: "cashier-1".to_string(),
            branch_id: branch_id.to_string(),
            start_time: Utc::now(),
            end_time: None,
            start_amount: Money::from_clp(10_000),
            sales_total: Money::zero(),
            cash_sales_total: Money::zero(),
            card_sales_total: Money::zero(),
            expected_cash: Money::zero(),
            actual_cash: None,
            difference: None,
            status: ShiftStatus::Open,
            observations: None,
        }
    }

    fn sample_close() -> ShiftClose {
        ShiftClose {
            end_time: Utc::now(),
            sales_total: Money::from_clp(13_000),
            cash_sales_total: Money::from_clp(5_000),
            card_sales_total: Money::from_clp(8_000),
            expected_cash: Money::from_clp(15_000),
            actual_cash: Money::from_clp(15_200),
            difference: Money::from_clp(200),
            observations: None,
        }
    }

    #[tokio::test]
    async fn test_find_open_shift() {
        let (db, branch_id) = setup().await;
        let repo = db.shifts();

        assert!(repo
            .find_open("cashier-1", &branch_id)
            .await
            .unwrap()
            .is_none());

        let shift = open_shift(&branch_id);
        repo.insert(&shift).await.unwrap();

        let found = repo
            .find_open("cashier-1", &branch_id)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(found.id, shift.id);
        assert_eq!(found.status, ShiftStatus::Open);
        assert_eq!(found.start_amount, Money::from_clp(10_000));
    }

    #[tokio::test]
    async fn test_close_writes_reconciliation() {
        let (db, branch_id) = setup().await;
        let repo = db.shifts();

        let shift = open_shift(&branch_id);
        repo.insert(&shift).await.unwrap();

        let closed = repo.close(&shift.id, &sample_close()).await.unwrap().unwrap();
        assert_eq!(closed.status, ShiftStatus::Closed);
        assert_eq!(closed.expected_cash, Money::from_clp(15_000));
        assert_eq!(closed.difference, Some(Money::from_clp(200)));
        assert!(closed.end_time.is_some());

        // Shift no longer shows as open
        assert!(repo
            .find_open("cashier-1", &branch_id)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_double_close_is_rejected() {
        let (db, branch_id) = setup().await;
        let repo = db.shifts();

        let shift = open_shift(&branch_id);
        repo.insert(&shift).await.unwrap();
        repo.close(&shift.id, &sample_close()).await.unwrap();

        let second = repo.close(&shift.id, &sample_close()).await.unwrap();
        assert!(second.is_none());

        let missing = repo.close("no-such-shift", &sample_close()).await;
        assert!(matches!(missing, Err(DbError::NotFound { .. })));
    }

    #[tokio::test]
    async fn test_list_filters_by_day() {
        let (db, branch_id) = setup().await;
        let repo = db.shifts();

        repo.insert(&open_shift(&branch_id)).await.unwrap();

        let filter = ShiftFilter {
            branch_id: Some(branch_id.clone()),
            date: Some(Utc::now().date_naive()),
            ..Default::default()
        };
        let (shifts, total) = repo.list(&filter, Page::default()).await.unwrap();
        assert_eq!(total, 1);
        assert_eq!(shifts.len(), 1);

        let filter = ShiftFilter {
            date: Some(Utc::now().date_naive() - Duration::days(2)),
            ..Default::default()
        };
        let (shifts, total) = repo.list(&filter, Page::default()).await.unwrap();
        assert!(shifts.is_empty());
        assert_eq!(total, 0);
    }
}
