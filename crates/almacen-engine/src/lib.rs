//! # almacen-engine: Business Services for Almacén POS
//!
//! Orchestrates the multi-branch inventory core on top of almacen-db.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Almacén POS Service Layer                           │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                almacen-engine (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │  ┌────────────────┐  ┌───────────────┐  ┌────────────────────┐ │   │
//! │  │  │ StockOperations│  │ SaleProcessor │  │ CashShiftAccounting│ │   │
//! │  │  │ receive        │◀─│ validate      │  │ start / close      │ │   │
//! │  │  │ transfer       │  │ pay (card)    │  │ reconcile          │ │   │
//! │  │  │ bulk / import  │  │ deduct+persist│  │                    │ │   │
//! │  │  └───────┬────────┘  └───────┬───────┘  └─────────┬──────────┘ │   │
//! │  │          │                   │                    │            │   │
//! │  │          └───────── EventBus (sale-created, stock-updated)     │   │
//! │  └──────────┼───────────────────┼────────────────────┼────────────┘   │
//! │             ▼                   ▼                    ▼                 │
//! │                      almacen-db (repositories)                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`stock`] - Receive, transfer (single + bulk), import confirmation,
//!   sale deductions; the only writer of inventory quantities
//! - [`sales`] - Checkout: validation, card payment, deduction, persistence
//! - [`shifts`] - Cash shift lifecycle and reconciliation arithmetic
//! - [`import`] - Spreadsheet import preview (pure validation pass)
//! - [`scope`] - Role-based query scoping
//! - [`payment`] - The card-terminal port and its mock
//! - [`events`] - Fire-and-forget domain events
//! - [`error`] - The engine's error surface

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod events;
pub mod import;
pub mod payment;
pub mod sales;
pub mod scope;
pub mod shifts;
pub mod stock;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{EngineError, EngineResult};
pub use events::{DomainEvent, EventBus};
pub use import::{preview_rows, ImportRowPreview, RawRow, RowStatus};
pub use payment::{CardReceipt, MockBehavior, MockTerminal, PaymentError, PaymentTerminal};
pub use sales::{NewSale, NewSaleLine, SaleProcessor};
pub use shifts::CashShiftAccounting;
pub use stock::{
    BulkTransferItem, BulkTransferOutcome, ImportItem, ImportOutcome, ReceiveStock,
    StockOperations, TransferStock,
};

use std::sync::Arc;

use almacen_db::Database;

/// Bundles every service over one database handle and a shared event bus.
///
/// ## Usage
/// ```rust,ignore
/// let db = Database::new(DbConfig::new("./almacen.db")).await?;
/// let engine = Engine::new(db, Arc::new(MockTerminal::approving()));
///
/// engine.stock.receive(&actor, req).await?;
/// let sale = engine.sales.create_sale(&actor, cart).await?;
/// ```
#[derive(Clone)]
pub struct Engine {
    pub stock: StockOperations,
    pub sales: SaleProcessor,
    pub shifts: CashShiftAccounting,
    pub events: EventBus,
    pub db: Database,
}

impl Engine {
    /// Wires the services together with a fresh event bus.
    pub fn new(db: Database, terminal: Arc<dyn PaymentTerminal>) -> Self {
        let events = EventBus::default();
        let stock = StockOperations::new(db.clone(), events.clone());
        let sales = SaleProcessor::new(db.clone(), stock.clone(), terminal, events.clone());
        let shifts = CashShiftAccounting::new(db.clone());

        Engine {
            stock,
            sales,
            shifts,
            events,
            db,
        }
    }
}
