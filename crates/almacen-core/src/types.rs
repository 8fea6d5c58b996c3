//! # Domain Types
//!
//! Core domain types used throughout the Almacén POS back end.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌──────────────────┐   ┌──────────────────┐     │
//! │  │    Product      │   │ InventoryRecord  │   │  StockMovement   │     │
//! │  │  ─────────────  │   │  ──────────────  │   │  ──────────────  │     │
//! │  │  id (UUID)      │   │  (product,branch)│   │  signed quantity │     │
//! │  │  barcode (biz)  │   │  quantity >= 0   │   │  type IN/OUT/... │     │
//! │  │  price (CLP)    │   │  batches (recv'd)│   │  document_id     │     │
//! │  └─────────────────┘   └──────────────────┘   └──────────────────┘     │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌──────────────────┐   ┌──────────────────┐     │
//! │  │      Sale       │   │    CashShift     │   │      Actor       │     │
//! │  │  ─────────────  │   │  ──────────────  │   │  ──────────────  │     │
//! │  │  item snapshots │   │  open → closed   │   │  user + role +   │     │
//! │  │  card_* data    │   │  expected/actual │   │  home branch     │     │
//! │  └─────────────────┘   └──────────────────┘   └──────────────────┘     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for database relations
//! - Business ID where one exists: barcode (products), name (branches)

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::money::Money;

// =============================================================================
// Users & Roles
// =============================================================================

/// Role-scoped access levels.
///
/// Determines query scoping (see the engine's `scope` module): a cashier only
/// sees their own sales, a supervisor is pinned to their branch, admin and
/// warehouse staff see everything they ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Admin,
    Supervisor,
    Cashier,
    Warehouse,
}

/// The acting user of an operation, as resolved by the (external) auth layer.
///
/// The engine never inspects credentials; it receives an already
/// authenticated actor and uses it for audit attribution and scoping.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    pub user_id: String,
    pub role: Role,
    /// Home branch. Admins may have none.
    pub branch_id: Option<String>,
}

impl Actor {
    pub fn new(user_id: impl Into<String>, role: Role, branch_id: Option<String>) -> Self {
        Actor {
            user_id: user_id.into(),
            role,
            branch_id,
        }
    }
}

// =============================================================================
// Product
// =============================================================================

/// A catalog product. Identity is immutable; price/cost mutate via catalog
/// edits, which is why sale lines snapshot them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Product {
    /// Unique identifier (UUID v4).
    pub id: String,

    /// Display name.
    pub name: String,

    /// Barcode (EAN-13 etc.) - unique business identifier.
    pub barcode: String,

    /// Optional internal SKU.
    pub sku: Option<String>,

    /// Optional category name.
    pub category: Option<String>,

    /// Sale price in whole pesos (tax-inclusive, Chilean convention).
    pub price: Money,

    /// Acquisition cost in whole pesos.
    pub cost: Money,

    /// IVA rate in basis points (1900 = 19%).
    pub tax_rate_bps: u32,

    /// Whether product is active (soft delete).
    pub is_active: bool,

    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Branch
// =============================================================================

/// A physical retail location; the unit of inventory scoping.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Branch {
    pub id: String,

    /// Unique display name; import rows reference branches by this name.
    pub name: String,

    pub address: String,
    pub phone: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Inventory
// =============================================================================

/// Derived stock status for an inventory record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockStatus {
    /// Quantity is exactly zero.
    Out,
    /// Quantity at or below the low-stock threshold (but not zero).
    Low,
    /// Healthy stock.
    Ok,
}

impl StockStatus {
    /// Classifies a quantity against a low-stock threshold.
    pub fn of(quantity: i64, low_stock_threshold: i64) -> StockStatus {
        if quantity == 0 {
            StockStatus::Out
        } else if quantity <= low_stock_threshold {
            StockStatus::Low
        } else {
            StockStatus::Ok
        }
    }
}

/// Per (product, branch) stock state. One row per pair, created lazily on the
/// first stock-affecting operation.
///
/// ## Invariant
/// `quantity >= 0` at all times, and `quantity` always equals the signed sum
/// of this pair's [`StockMovement`] ledger entries - by construction, never
/// by recomputation.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct InventoryRecord {
    pub id: String,
    pub product_id: String,
    pub branch_id: String,

    /// Aggregate on-hand quantity. Never negative.
    pub quantity: i64,

    /// Records at or below this are reported as `Low`.
    pub low_stock_threshold: i64,

    pub last_updated: DateTime<Utc>,
}

impl InventoryRecord {
    /// Derived stock status.
    pub fn status(&self) -> StockStatus {
        StockStatus::of(self.quantity, self.low_stock_threshold)
    }
}

/// A received lot of stock, appended to an inventory record's history.
///
/// Batches model what was *received*, not FIFO consumption: deductions reduce
/// the aggregate quantity and never remove batch rows.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct Batch {
    pub id: String,
    pub inventory_id: String,
    pub lot: Option<String>,
    pub expiry: Option<DateTime<Utc>>,
    pub quantity: i64,
    pub received_at: DateTime<Utc>,
}

/// Lot/expiry info attached to an incoming stock adjustment.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchInfo {
    pub lot: Option<String>,
    pub expiry: Option<DateTime<Utc>>,
}

// =============================================================================
// Stock Movements (the audit ledger)
// =============================================================================

/// Kind of ledger entry. Stored as the uppercase wire strings
/// (`IN`, `OUT`, `TRANSFER`, `ADJUST`, `SALE`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "UPPERCASE"))]
#[serde(rename_all = "UPPERCASE")]
pub enum MovementType {
    In,
    Out,
    Transfer,
    Adjust,
    Sale,
}

/// An immutable audit record of one quantity change.
///
/// Append-only; never updated or deleted. `quantity` is signed: positive for
/// the receiving leg, negative for the deducting leg.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct StockMovement {
    pub id: String,
    pub product_id: String,
    pub branch_id: String,

    /// Signed quantity delta this entry explains.
    pub quantity: i64,

    pub movement_type: MovementType,

    /// Free-text reason ("Manual Entry", "Sale <id>", "Transfer to <branch>").
    pub reason: String,

    /// Acting user (audit attribution).
    pub user_id: String,

    /// Lot of the received batch, when the entry carries one.
    pub batch_lot: Option<String>,
    pub batch_expiry: Option<DateTime<Utc>>,

    /// Opaque grouping key linking entries produced by one logical operation:
    /// a transfer's two legs, an import batch's rows, a bulk transfer's pairs.
    pub document_id: Option<String>,

    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Sales
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    /// Physical cash payment.
    Cash,
    /// Card payment collected on the external terminal.
    Card,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum SaleStatus {
    Completed,
    Void,
}

/// Terminal response data persisted with a card sale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardPaymentData {
    /// Merchant-side order id sent to the terminal (`INV-<millis>`).
    pub order_id: String,
    pub authorization_code: String,
    pub amount: Money,
    pub response_code: i64,
    pub transaction_date: DateTime<Utc>,
}

/// A line item in a sale.
/// Uses the snapshot pattern to freeze product data at time of sale.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaleItem {
    pub product_id: String,
    /// Product name at time of sale (frozen).
    pub name: String,
    /// Unit price at time of sale (frozen).
    pub price: Money,
    pub quantity: i64,
    /// price × quantity, whole pesos.
    pub total: Money,
}

/// A completed sale transaction.
///
/// Immutable once created; the `Void` status exists in the model but no
/// void transition is implemented yet.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Sale {
    pub id: String,
    pub branch_id: String,
    /// Cashier.
    pub user_id: String,
    pub items: Vec<SaleItem>,
    /// Sum of line totals.
    pub total_amount: Money,
    pub payment_method: PaymentMethod,
    pub status: SaleStatus,
    /// Present only for card sales.
    pub card_payment: Option<CardPaymentData>,
    pub created_at: DateTime<Utc>,
}

// =============================================================================
// Cash Shifts
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
pub enum ShiftStatus {
    Open,
    Closed,
}

/// A cashier's open-to-close working session, used to reconcile expected vs
/// actual till cash.
///
/// At most one open shift per (user, branch) pair - enforced at creation.
/// Closing totals are computed from Sales with `created_at >= start_time`
/// (no upper bound; see CashShiftAccounting).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct CashShift {
    pub id: String,
    pub user_id: String,
    pub branch_id: String,
    pub start_time: DateTime<Utc>,
    pub end_time: Option<DateTime<Utc>>,

    /// Till cash counted at open.
    pub start_amount: Money,

    /// Set at close: every completed sale in the window.
    pub sales_total: Money,
    pub cash_sales_total: Money,
    pub card_sales_total: Money,

    /// start_amount + cash_sales_total.
    pub expected_cash: Money,

    /// Counted by the cashier at close.
    pub actual_cash: Option<Money>,

    /// actual_cash - expected_cash (negative means missing cash).
    pub difference: Option<Money>,

    pub status: ShiftStatus,
    pub observations: Option<String>,
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stock_status_classification() {
        assert_eq!(StockStatus::of(0, 5), StockStatus::Out);
        assert_eq!(StockStatus::of(3, 5), StockStatus::Low);
        assert_eq!(StockStatus::of(5, 5), StockStatus::Low);
        assert_eq!(StockStatus::of(6, 5), StockStatus::Ok);
    }

    #[test]
    fn test_inventory_record_status() {
        let record = InventoryRecord {
            id: "inv-1".to_string(),
            product_id: "p-1".to_string(),
            branch_id: "b-1".to_string(),
            quantity: 0,
            low_stock_threshold: 5,
            last_updated: Utc::now(),
        };
        assert_eq!(record.status(), StockStatus::Out);
    }

    #[test]
    fn test_movement_type_serde_uppercase() {
        let json = serde_json::to_string(&MovementType::Transfer).unwrap();
        assert_eq!(json, "\"TRANSFER\"");
    }

    #[test]
    fn test_payment_method_serde_lowercase() {
        let json = serde_json::to_string(&PaymentMethod::Card).unwrap();
        assert_eq!(json, "\"card\"");
    }
}
