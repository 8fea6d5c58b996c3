//! # Cash Shift Accounting
//!
//! Open-to-close cashier sessions and their reconciliation arithmetic.
//!
//! ## Close Arithmetic
//! ```text
//! sales_total      = Σ completed sales in window (any method)
//! cash_sales_total = Σ cash sales in window
//! card_sales_total = Σ card sales in window
//! expected_cash    = start_amount + cash_sales_total
//! difference       = actual_cash - expected_cash   (negative = missing)
//! ```
//!
//! The window is every sale by this cashier at this branch with
//! `created_at >= start_time`, with no upper bound at compute time. A sale
//! created concurrently with the close may land on either side; that window
//! is deliberately open-ended rather than cut at a close timestamp.

use chrono::Utc;
use tracing::info;
use uuid::Uuid;

use almacen_core::validation::validate_amount;
use almacen_core::{Actor, CashShift, CoreError, Money, ShiftStatus};
use almacen_db::repository::shift::{ShiftClose, ShiftFilter};
use almacen_db::repository::Page;
use almacen_db::Database;

use crate::error::EngineResult;
use crate::scope::scoped_shift_filter;

// =============================================================================
// Cash Shift Accounting
// =============================================================================

/// Shift lifecycle service. Cheap to clone.
///
/// ## Usage
/// ```rust,ignore
/// let shifts = CashShiftAccounting::new(db.clone());
///
/// shifts.start_shift(&actor, &branch_id, Money::from_clp(10_000)).await?;
/// let closed = shifts.close_shift(&actor, &branch_id, counted, None).await?;
/// ```
#[derive(Debug, Clone)]
pub struct CashShiftAccounting {
    db: Database,
}

impl CashShiftAccounting {
    pub fn new(db: Database) -> Self {
        CashShiftAccounting { db }
    }

    /// Opens a shift for the actor at a branch.
    ///
    /// ## Errors
    /// `Conflict` when the (user, branch) pair already has an open shift.
    pub async fn start_shift(
        &self,
        actor: &Actor,
        branch_id: &str,
        start_amount: Money,
    ) -> EngineResult<CashShift> {
        validate_amount("start_amount", start_amount)?;

        if let Some(open) = self
            .db
            .shifts()
            .find_open(&actor.user_id, branch_id)
            .await?
        {
            return Err(CoreError::Conflict(format!(
                "shift {} already open for this user at this branch",
                open.id
            ))
            .into());
        }

        let shift = CashShift {
            id: Uuid::new_v4().to_string(),
            user_id: actor.user_id.clone(),
            branch_id: branch_id.to_string(),
            start_time: Utc::now(),
            end_time: None,
            start_amount,
            sales_total: Money::zero(),
            cash_sales_total: Money::zero(),
            card_sales_total: Money::zero(),
            expected_cash: Money::zero(),
            actual_cash: None,
            difference: None,
            status: ShiftStatus::Open,
            observations: None,
        };
        self.db.shifts().insert(&shift).await?;

        info!(shift_id = %shift.id, user_id = %actor.user_id, branch_id = %branch_id, "Shift opened");
        Ok(shift)
    }

    /// Closes the actor's open shift at a branch, computing reconciliation
    /// totals from the sales of its window.
    ///
    /// ## Errors
    /// `NotFound` when there is no open shift for the pair.
    pub async fn close_shift(
        &self,
        actor: &Actor,
        branch_id: &str,
        actual_cash: Money,
        observations: Option<String>,
    ) -> EngineResult<CashShift> {
        validate_amount("actual_cash", actual_cash)?;

        let shift = self
            .db
            .shifts()
            .find_open(&actor.user_id, branch_id)
            .await?
            .ok_or_else(|| {
                CoreError::not_found(
                    "Open shift",
                    format!("{} at branch {}", actor.user_id, branch_id),
                )
            })?;

        let totals = self
            .db
            .sales()
            .totals_since(&actor.user_id, branch_id, shift.start_time)
            .await?;

        let expected_cash = shift.start_amount + totals.cash_total;
        let difference = actual_cash - expected_cash;

        let closed = self
            .db
            .shifts()
            .close(
                &shift.id,
                &ShiftClose {
                    end_time: Utc::now(),
                    sales_total: totals.sales_total,
                    cash_sales_total: totals.cash_total,
                    card_sales_total: totals.card_total,
                    expected_cash,
                    actual_cash,
                    difference,
                    observations,
                },
            )
            .await?
            .ok_or_else(|| CoreError::Conflict("shift is already closed".to_string()))?;

        info!(
            shift_id = %closed.id,
            expected = %expected_cash,
            actual = %actual_cash,
            difference = %difference,
            "Shift closed"
        );

        Ok(closed)
    }

    /// The actor's open shift at a branch, if any.
    pub async fn current_shift(
        &self,
        actor: &Actor,
        branch_id: &str,
    ) -> EngineResult<Option<CashShift>> {
        Ok(self
            .db
            .shifts()
            .find_open(&actor.user_id, branch_id)
            .await?)
    }

    /// Lists shifts with the caller's role scope applied.
    pub async fn list_shifts(
        &self,
        actor: &Actor,
        filter: ShiftFilter,
        page: Page,
    ) -> EngineResult<(Vec<CashShift>, i64)> {
        let scoped = scoped_shift_filter(actor, filter);
        Ok(self.db.shifts().list(&scoped, page).await?)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use chrono::Duration;

    use almacen_core::{
        Branch, PaymentMethod, Product, Role, Sale, SaleItem, SaleStatus, DEFAULT_TAX_RATE_BPS,
    };
    use almacen_db::{Database, DbConfig};

    struct Fixture {
        shifts: CashShiftAccounting,
        branch_a: String,
        branch_b: String,
        product_id: String,
    }

    /// In-memory database with two branches and one product (sales rows
    /// carry foreign keys to both).
    async fn fixture() -> Fixture {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();

        let mut branch_ids = Vec::new();
        for name in ["Sucursal Centro", "Sucursal Norte"] {
            let branch = Branch {
                id: Uuid::new_v4().to_string(),
                name: name.to_string(),
                address: String::new(),
                phone: None,
                is_active: true,
                created_at: Utc::now(),
            };
            db.catalog().insert_branch(&branch).await.unwrap();
            branch_ids.push(branch.id);
        }

        let product = Product {
            id: Uuid::new_v4().to_string(),
            name: "Bebida 1.5L".to_string(),
            barcode: "7801111111111".to_string(),
            sku: None,
            category: None,
            price: Money::from_clp(1_890),
            cost: Money::from_clp(1_200),
            tax_rate_bps: DEFAULT_TAX_RATE_BPS,
            is_active: true,
            created_at: Utc::now(),
        };
        db.catalog().insert_product(&product).await.unwrap();

        let branch_b = branch_ids.pop().unwrap();
        let branch_a = branch_ids.pop().unwrap();
        Fixture {
            shifts: CashShiftAccounting::new(db),
            branch_a,
            branch_b,
            product_id: product.id,
        }
    }

    fn cashier(branch_id: &str) -> Actor {
        Actor::new("cashier-1", Role::Cashier, Some(branch_id.to_string()))
    }

    fn sale(
        fx: &Fixture,
        user_id: &str,
        amount: i64,
        method: PaymentMethod,
        created_at: chrono::DateTime<Utc>,
    ) -> Sale {
        Sale {
            id: Uuid::new_v4().to_string(),
            branch_id: fx.branch_a.clone(),
            user_id: user_id.to_string(),
            items: vec![SaleItem {
                product_id: fx.product_id.clone(),
                name: "Bebida 1.5L".to_string(),
                price: Money::from_clp(amount),
                quantity: 1,
                total: Money::from_clp(amount),
            }],
            total_amount: Money::from_clp(amount),
            payment_method: method,
            status: SaleStatus::Completed,
            card_payment: None,
            created_at,
        }
    }

    #[tokio::test]
    async fn test_close_computes_reconciliation_totals() {
        let fx = fixture().await;
        let actor = cashier(&fx.branch_a);

        let opened = fx
            .shifts
            .start_shift(&actor, &fx.branch_a, Money::from_clp(10_000))
            .await
            .unwrap();
        assert_eq!(opened.status, ShiftStatus::Open);

        let db = fx.shifts.db.clone();
        let now = Utc::now();
        db.sales()
            .insert(&sale(&fx, "cashier-1", 5_000, PaymentMethod::Cash, now))
            .await
            .unwrap();
        db.sales()
            .insert(&sale(&fx, "cashier-1", 8_000, PaymentMethod::Card, now))
            .await
            .unwrap();

        let closed = fx
            .shifts
            .close_shift(&actor, &fx.branch_a, Money::from_clp(15_200), None)
            .await
            .unwrap();

        assert_eq!(closed.status, ShiftStatus::Closed);
        assert!(closed.end_time.is_some());
        assert_eq!(closed.sales_total, Money::from_clp(13_000));
        assert_eq!(closed.cash_sales_total, Money::from_clp(5_000));
        assert_eq!(closed.card_sales_total, Money::from_clp(8_000));
        // 10_000 start + 5_000 cash; card money never enters the till
        assert_eq!(closed.expected_cash, Money::from_clp(15_000));
        assert_eq!(closed.actual_cash, Some(Money::from_clp(15_200)));
        assert_eq!(closed.difference, Some(Money::from_clp(200)));
    }

    #[tokio::test]
    async fn test_close_window_excludes_sales_before_start() {
        let fx = fixture().await;
        let actor = cashier(&fx.branch_a);

        let opened = fx
            .shifts
            .start_shift(&actor, &fx.branch_a, Money::zero())
            .await
            .unwrap();

        let db = fx.shifts.db.clone();
        let before = opened.start_time - Duration::hours(1);
        db.sales()
            .insert(&sale(&fx, "cashier-1", 9_999, PaymentMethod::Cash, before))
            .await
            .unwrap();

        let closed = fx
            .shifts
            .close_shift(&actor, &fx.branch_a, Money::zero(), None)
            .await
            .unwrap();
        assert_eq!(closed.sales_total, Money::zero());
        assert_eq!(closed.difference, Some(Money::zero()));
    }

    #[tokio::test]
    async fn test_second_open_for_same_pair_conflicts() {
        let fx = fixture().await;
        let actor = cashier(&fx.branch_a);

        fx.shifts
            .start_shift(&actor, &fx.branch_a, Money::from_clp(5_000))
            .await
            .unwrap();
        let err = fx
            .shifts
            .start_shift(&actor, &fx.branch_a, Money::from_clp(5_000))
            .await
            .unwrap_err();
        assert_eq!(err.http_status(), 409);

        // The same user may still open at a different branch
        fx.shifts
            .start_shift(&actor, &fx.branch_b, Money::from_clp(5_000))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_close_without_open_shift_is_not_found() {
        let fx = fixture().await;
        let actor = cashier(&fx.branch_a);

        let err = fx
            .shifts
            .close_shift(&actor, &fx.branch_a, Money::zero(), None)
            .await
            .unwrap_err();
        assert_eq!(err.http_status(), 404);
    }

    #[tokio::test]
    async fn test_current_shift_tracks_lifecycle() {
        let fx = fixture().await;
        let actor = cashier(&fx.branch_a);

        assert!(fx
            .shifts
            .current_shift(&actor, &fx.branch_a)
            .await
            .unwrap()
            .is_none());

        let opened = fx
            .shifts
            .start_shift(&actor, &fx.branch_a, Money::from_clp(1_000))
            .await
            .unwrap();
        let current = fx.shifts.current_shift(&actor, &fx.branch_a).await.unwrap();
        assert_eq!(current.map(|s| s.id), Some(opened.id));

        fx.shifts
            .close_shift(&actor, &fx.branch_a, Money::from_clp(1_000), None)
            .await
            .unwrap();
        assert!(fx
            .shifts
            .current_shift(&actor, &fx.branch_a)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_negative_start_amount_is_rejected() {
        let fx = fixture().await;
        let err = fx
            .shifts
            .start_shift(&cashier(&fx.branch_a), &fx.branch_a, Money::from_clp(-100))
            .await
            .unwrap_err();
        assert_eq!(err.http_status(), 400);
    }

    #[tokio::test]
    async fn test_list_shifts_is_scoped_to_cashier() {
        let fx = fixture().await;
        let actor = cashier(&fx.branch_a);
        let other = Actor::new("cashier-2", Role::Cashier, Some(fx.branch_a.clone()));

        fx.shifts
            .start_shift(&actor, &fx.branch_a, Money::zero())
            .await
            .unwrap();
        fx.shifts
            .start_shift(&other, &fx.branch_a, Money::zero())
            .await
            .unwrap();

        let (mine, total) = fx
            .shifts
            .list_shifts(&actor, ShiftFilter::default(), Page::default())
            .await
            .unwrap();
        assert_eq!(total, 1);
        assert_eq!(mine[0].user_id, "cashier-1");
    }
}
