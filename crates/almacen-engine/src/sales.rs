//! # Sale Processor
//!
//! Turns a cart into a persisted, paid, stock-deducted sale.
//!
//! ## The Six Steps
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. Reject empty carts                                                  │
//! │  2. Validate every line against live inventory; snapshot name/price     │
//! │  3. Sum line totals → total_amount (whole pesos, exact)                 │
//! │  4. Card? collect payment FIRST - decline/timeout aborts everything     │
//! │     while zero state has been written                                   │
//! │  5. Deduct each line (SALE ledger entries), then persist the sale       │
//! │  6. Publish sale-created                                                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Step 2 validates against a snapshot and step 5 re-checks atomically at
//! deduction time, so a concurrent sale racing between the two steps is
//! rejected at step 5 rather than driving stock negative.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::timeout;
use tracing::{info, warn};
use uuid::Uuid;

use almacen_core::{
    Actor, CardPaymentData, CoreError, Money, PaymentMethod, Sale, SaleItem, SaleStatus,
    ValidationError,
};
use almacen_db::repository::sale::SaleFilter;
use almacen_db::repository::Page;
use almacen_db::Database;

use crate::error::EngineResult;
use crate::events::{DomainEvent, EventBus};
use crate::payment::{PaymentError, PaymentTerminal, DEFAULT_PAYMENT_TIMEOUT};
use crate::scope::scoped_sale_filter;
use crate::stock::StockOperations;

// =============================================================================
// Requests
// =============================================================================

/// One cart line: what the cashier scanned and how many.
#[derive(Debug, Clone)]
pub struct NewSaleLine {
    pub product_id: String,
    pub quantity: i64,
}

/// A cart ready for checkout.
#[derive(Debug, Clone)]
pub struct NewSale {
    pub branch_id: String,
    pub items: Vec<NewSaleLine>,
    pub payment_method: PaymentMethod,
}

// =============================================================================
// Sale Processor
// =============================================================================

/// Checkout orchestration. Cheap to clone.
#[derive(Clone)]
pub struct SaleProcessor {
    db: Database,
    stock: StockOperations,
    terminal: Arc<dyn PaymentTerminal>,
    events: EventBus,
    payment_timeout: Duration,
}

impl SaleProcessor {
    pub fn new(
        db: Database,
        stock: StockOperations,
        terminal: Arc<dyn PaymentTerminal>,
        events: EventBus,
    ) -> Self {
        SaleProcessor {
            db,
            stock,
            terminal,
            events,
            payment_timeout: DEFAULT_PAYMENT_TIMEOUT,
        }
    }

    /// Overrides the payment timeout (tests use a short one).
    pub fn with_payment_timeout(mut self, timeout: Duration) -> Self {
        self.payment_timeout = timeout;
        self
    }

    /// Creates a sale. See the module docs for the step sequence.
    pub async fn create_sale(&self, actor: &Actor, req: NewSale) -> EngineResult<Sale> {
        // Step 1: empty cart
        if req.items.is_empty() {
            return Err(ValidationError::Required {
                field: "items".to_string(),
            }
            .into());
        }

        // Step 2: validate availability, snapshot name and price
        let mut items = Vec::with_capacity(req.items.len());
        for line in &req.items {
            if line.quantity <= 0 {
                return Err(ValidationError::MustBePositive {
                    field: "quantity".to_string(),
                }
                .into());
            }

            let product = self
                .db
                .catalog()
                .product(&line.product_id)
                .await?
                .ok_or_else(|| CoreError::not_found("Product", &line.product_id))?;

            let record = self
                .db
                .inventory()
                .find(&line.product_id, &req.branch_id)
                .await?
                .ok_or_else(|| {
                    CoreError::not_found(
                        "Inventory",
                        format!("{} at branch {}", product.name, req.branch_id),
                    )
                })?;

            if record.quantity < line.quantity {
                return Err(CoreError::InsufficientStock {
                    product: product.name,
                    available: record.quantity,
                    requested: line.quantity,
                }
                .into());
            }

            items.push(SaleItem {
                product_id: product.id,
                name: product.name,
                price: product.price,
                quantity: line.quantity,
                total: product.price.line_total(line.quantity),
            });
        }

        // Step 3: total
        let total_amount: Money = items.iter().map(|i| i.total).sum();

        // Step 4: card payment before any stock mutation
        let card_payment = match req.payment_method {
            PaymentMethod::Cash => None,
            PaymentMethod::Card => Some(self.collect_card_payment(total_amount).await?),
        };

        // Step 5: deduct every line, then persist
        let sale_id = Uuid::new_v4().to_string();
        for item in &items {
            self.stock
                .deduct_sale_line(
                    actor,
                    &item.product_id,
                    &req.branch_id,
                    item.quantity,
                    &sale_id,
                )
                .await?;
        }

        let sale = Sale {
            id: sale_id,
            branch_id: req.branch_id,
            user_id: actor.user_id.clone(),
            items,
            total_amount,
            payment_method: req.payment_method,
            status: SaleStatus::Completed,
            card_payment,
            created_at: Utc::now(),
        };
        self.db.sales().insert(&sale).await?;

        info!(
            sale_id = %sale.id,
            branch_id = %sale.branch_id,
            total = %sale.total_amount,
            payment_method = ?sale.payment_method,
            "Sale created"
        );

        // Step 6: notify observers
        self.events.publish(DomainEvent::SaleCreated { sale: sale.clone() });

        Ok(sale)
    }

    /// Runs the terminal call under the timeout and maps its failures.
    async fn collect_card_payment(&self, amount: Money) -> EngineResult<CardPaymentData> {
        let order_id = format!("INV-{}", Utc::now().timestamp_millis());

        let receipt = match timeout(
            self.payment_timeout,
            self.terminal.sale(amount, &order_id),
        )
        .await
        {
            Err(_) => {
                warn!(order_id = %order_id, "Payment terminal timed out");
                return Err(CoreError::PaymentGatewayUnavailable(format!(
                    "terminal did not answer within {:?}",
                    self.payment_timeout
                ))
                .into());
            }
            Ok(Err(PaymentError::Declined { response_code })) => {
                warn!(order_id = %order_id, response_code, "Card payment declined");
                return Err(CoreError::PaymentFailed { response_code }.into());
            }
            Ok(Err(PaymentError::Unavailable(reason))) => {
                warn!(order_id = %order_id, reason = %reason, "Payment terminal unavailable");
                return Err(CoreError::PaymentGatewayUnavailable(reason).into());
            }
            Ok(Ok(receipt)) => receipt,
        };

        Ok(CardPaymentData {
            order_id,
            authorization_code: receipt.authorization_code,
            amount: receipt.amount,
            response_code: receipt.response_code,
            transaction_date: receipt.transaction_date,
        })
    }

    /// Gets a sale by id.
    pub async fn get_sale(&self, id: &str) -> EngineResult<Sale> {
        self.db
            .sales()
            .get(id)
            .await?
            .ok_or_else(|| CoreError::not_found("Sale", id).into())
    }

    /// Lists sales with the caller's role scope applied.
    pub async fn list_sales(
        &self,
        actor: &Actor,
        filter: SaleFilter,
        page: Page,
    ) -> EngineResult<(Vec<Sale>, i64)> {
        let scoped = scoped_sale_filter(actor, filter);
        Ok(self.db.sales().list(&scoped, page).await?)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use almacen_core::{Branch, Product, Role, DEFAULT_TAX_RATE_BPS};
    use almacen_db::repository::movement::MovementFilter;
    use almacen_db::{Database, DbConfig};

    use crate::error::EngineError;
    use crate::payment::{MockBehavior, MockTerminal};
    use crate::Engine;

    struct Fixture {
        engine: Engine,
        terminal: Arc<MockTerminal>,
        product_id: String,
        branch_id: String,
    }

    /// In-memory engine with one product stocked at one branch.
    async fn fixture(opening_stock: i64) -> Fixture {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let terminal = Arc::new(MockTerminal::approving());
        let engine = Engine::new(db, terminal.clone());

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
        engine.db.catalog().insert_product(&product).await.unwrap();
        engine.db.catalog().insert_branch(&branch).await.unwrap();

        if opening_stock > 0 {
            engine
                .stock
                .receive(
                    &cashier(&branch.id),
                    crate::stock::ReceiveStock {
                        product_id: product.id.clone(),
                        branch_id: branch.id.clone(),
                        quantity: opening_stock,
                        lot: None,
                        expiry: None,
                        reason: "Stock inicial".to_string(),
                    },
                )
                .await
                .unwrap();
        }

        Fixture {
            engine,
            terminal,
            product_id: product.id,
            branch_id: branch.id,
        }
    }

    fn cashier(branch_id: &str) -> Actor {
        Actor::new("cashier-1", Role::Cashier, Some(branch_id.to_string()))
    }

    fn cart(fx: &Fixture, quantity: i64, method: PaymentMethod) -> NewSale {
        NewSale {
            branch_id: fx.branch_id.clone(),
            items: vec![NewSaleLine {
                product_id: fx.product_id.clone(),
                quantity,
            }],
            payment_method: method,
        }
    }

    async fn stock_level(fx: &Fixture) -> i64 {
        fx.engine
            .db
            .inventory()
            .find(&fx.product_id, &fx.branch_id)
            .await
            .unwrap()
            .map(|r| r.quantity)
            .unwrap_or(0)
    }

    async fn sale_ledger_count(fx: &Fixture) -> i64 {
        let filter = MovementFilter {
            movement_type: Some(almacen_core::MovementType::Sale),
            ..Default::default()
        };
        let (_, total) = fx
            .engine
            .db
            .movements()
            .query(&filter, almacen_db::repository::Page::default())
            .await
            .unwrap();
        total
    }

    #[tokio::test]
    async fn test_empty_cart_is_rejected() {
        let fx = fixture(10).await;
        let actor = cashier(&fx.branch_id);

        let err = fx
            .engine
            .sales
            .create_sale(
                &actor,
                NewSale {
                    branch_id: fx.branch_id.clone(),
                    items: vec![],
                    payment_method: PaymentMethod::Cash,
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.http_status(), 400);
    }

    #[tokio::test]
    async fn test_cash_sale_deducts_and_persists() {
        let fx = fixture(10).await;
        let actor = cashier(&fx.branch_id);
        let mut rx = fx.engine.events.subscribe();

        let sale = fx
            .engine
            .sales
            .create_sale(&actor, cart(&fx, 2, PaymentMethod::Cash))
            .await
            .unwrap();

        assert_eq!(sale.total_amount, Money::from_clp(9_980));
        assert_eq!(sale.items[0].price, Money::from_clp(4_990));
        assert_eq!(sale.status, SaleStatus::Completed);
        assert!(sale.card_payment.is_none());

        assert_eq!(stock_level(&fx).await, 8);
        assert_eq!(sale_ledger_count(&fx).await, 1);

        // Persisted and readable back
        let loaded = fx.engine.sales.get_sale(&sale.id).await.unwrap();
        assert_eq!(loaded.items.len(), 1);

        // sale-created went out (stock-updated came first from the deduction)
        let mut saw_sale_created = false;
        while let Ok(event) = rx.try_recv() {
            if let DomainEvent::SaleCreated { sale: payload } = event {
                assert_eq!(payload.id, sale.id);
                saw_sale_created = true;
            }
        }
        assert!(saw_sale_created);
    }

    #[tokio::test]
    async fn test_card_sale_records_payment_data() {
        let fx = fixture(10).await;
        let actor = cashier(&fx.branch_id);

        let sale = fx
            .engine
            .sales
            .create_sale(&actor, cart(&fx, 1, PaymentMethod::Card))
            .await
            .unwrap();

        let card = sale.card_payment.unwrap();
        assert!(card.order_id.starts_with("INV-"));
        assert_eq!(card.amount, Money::from_clp(4_990));
        assert_eq!(card.response_code, 0);
    }

    #[tokio::test]
    async fn test_declined_card_leaves_zero_state() {
        let fx = fixture(10).await;
        let actor = cashier(&fx.branch_id);
        fx.terminal.script(MockBehavior::Decline(-1));

        let err = fx
            .engine
            .sales
            .create_sale(&actor, cart(&fx, 2, PaymentMethod::Card))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Core(CoreError::PaymentFailed { response_code: -1 })
        ));

        // No deduction, no ledger entry, no sale row
        assert_eq!(stock_level(&fx).await, 10);
        assert_eq!(sale_ledger_count(&fx).await, 0);
        let (sales, total) = fx
            .engine
            .sales
            .list_sales(
                &actor,
                SaleFilter::default(),
                almacen_db::repository::Page::default(),
            )
            .await
            .unwrap();
        assert!(sales.is_empty());
        assert_eq!(total, 0);
    }

    #[tokio::test]
    async fn test_hanging_terminal_maps_to_gateway_unavailable() {
        let fx = fixture(10).await;
        let actor = cashier(&fx.branch_id);
        fx.terminal.script(MockBehavior::Hang);

        let sales = fx
            .engine
            .sales
            .clone()
            .with_payment_timeout(Duration::from_millis(50));

        let err = sales
            .create_sale(&actor, cart(&fx, 1, PaymentMethod::Card))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Core(CoreError::PaymentGatewayUnavailable(_))
        ));
        assert_eq!(err.http_status(), 504);
        assert_eq!(stock_level(&fx).await, 10);
    }

    #[tokio::test]
    async fn test_insufficient_stock_rejects_before_payment() {
        let fx = fixture(1).await;
        let actor = cashier(&fx.branch_id);
        // A hanging terminal would stall the test if payment were attempted
        fx.terminal.script(MockBehavior::Hang);

        let err = fx
            .engine
            .sales
            .create_sale(&actor, cart(&fx, 2, PaymentMethod::Card))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            EngineError::Core(CoreError::InsufficientStock { available: 1, requested: 2, .. })
        ));
    }

    #[tokio::test]
    async fn test_product_without_branch_record_is_not_found() {
        let fx = fixture(0).await;
        let actor = cashier(&fx.branch_id);

        let err = fx
            .engine
            .sales
            .create_sale(&actor, cart(&fx, 1, PaymentMethod::Cash))
            .await
            .unwrap_err();
        assert_eq!(err.http_status(), 404);
    }

    #[tokio::test]
    async fn test_list_sales_is_scoped_for_cashier() {
        let fx = fixture(10).await;
        let actor = cashier(&fx.branch_id);

        fx.engine
            .sales
            .create_sale(&actor, cart(&fx, 1, PaymentMethod::Cash))
            .await
            .unwrap();

        // Another cashier sees nothing even with a wide-open filter
        let other = Actor::new("cashier-2", Role::Cashier, Some(fx.branch_id.clone()));
        let (sales, total) = fx
            .engine
            .sales
            .list_sales(
                &other,
                SaleFilter::default(),
                almacen_db::repository::Page::default(),
            )
            .await
            .unwrap();
        assert!(sales.is_empty());
        assert_eq!(total, 0);
    }
}
