//! # Stock Operations
//!
//! The core inventory engine: receive, transfer (single + bulk), import
//! confirmation, and sale-driven deductions. This is the **only** writer of
//! inventory quantities, and every change it makes is mirrored by exactly
//! one ledger entry, which is what keeps the ledger-sum invariant true by
//! construction.
//!
//! ## Operation Anatomy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Every Stock Operation                             │
//! │                                                                         │
//! │  validate input                                                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  InventoryRepository.adjust_quantity(±N)   ← atomic conditional UPDATE  │
//! │       │                                      (never read-modify-write)  │
//! │       ▼                                                                 │
//! │  MovementRepository.record(signed N)       ← the audit ledger           │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  EventBus.publish(StockUpdated)            ← fire-and-forget            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Failure Policy
//! Single operations (receive, transfer) fail fast and mutate nothing on a
//! validation failure. Batch operations (bulk transfer, import) skip bad
//! items and report how many succeeded; a count smaller than the input is
//! observable behavior, not an error.

use chrono::{DateTime, Utc};
use tracing::{info, warn};
use uuid::Uuid;

use almacen_core::validation::validate_quantity;
use almacen_core::{Actor, BatchInfo, CoreError, InventoryRecord, MovementType};
use almacen_db::repository::movement::NewMovement;
use almacen_db::Database;

use crate::error::EngineResult;
use crate::events::{DomainEvent, EventBus};

/// Lot tag stamped on the receiving leg of a transfer.
const TRANSFER_LOT: &str = "TRANSFER";

// =============================================================================
// Requests & Outcomes
// =============================================================================

/// A stock receipt (goods arriving at a branch).
#[derive(Debug, Clone)]
pub struct ReceiveStock {
    pub product_id: String,
    pub branch_id: String,
    pub quantity: i64,
    pub lot: Option<String>,
    pub expiry: Option<DateTime<Utc>>,
    pub reason: String,
}

/// A single-pair transfer between branches.
#[derive(Debug, Clone)]
pub struct TransferStock {
    pub product_id: String,
    pub from_branch_id: String,
    pub to_branch_id: String,
    pub quantity: i64,
    pub reason: String,
}

/// One item of a bulk transfer.
#[derive(Debug, Clone)]
pub struct BulkTransferItem {
    pub product_id: String,
    pub from_branch_id: String,
    pub quantity: i64,
}

/// Result of a bulk transfer: how many of the requested items actually
/// moved, and the shared document id grouping their ledger entries.
#[derive(Debug, Clone)]
pub struct BulkTransferOutcome {
    pub transferred: usize,
    pub requested: usize,
    pub document_id: String,
}

/// One already-resolved item of an import confirmation.
#[derive(Debug, Clone)]
pub struct ImportItem {
    pub product_id: String,
    pub branch_id: String,
    pub quantity: i64,
    pub lot: Option<String>,
    pub expiry: Option<DateTime<Utc>>,
}

/// Result of an import confirmation.
#[derive(Debug, Clone)]
pub struct ImportOutcome {
    pub imported: usize,
    pub requested: usize,
    /// Grouping key for the import's ledger entries (the "receipt").
    pub document_id: String,
}

// =============================================================================
// Document IDs
// =============================================================================

/// Grouping key for a transfer's two legs (or a bulk transfer's many).
pub fn transfer_document_id() -> String {
    format!("TRANS-{}", Utc::now().timestamp_millis())
}

/// Grouping key for an import batch. Carries a random suffix so two imports
/// confirmed in the same millisecond stay distinct.
pub fn import_document_id() -> String {
    let suffix = Uuid::new_v4().simple().to_string();
    format!(
        "IMPORT-{}-{}",
        Utc::now().timestamp_millis(),
        &suffix[..6]
    )
}

// =============================================================================
// Stock Operations
// =============================================================================

/// The inventory engine. Cheap to clone.
///
/// ## Usage
/// ```rust,ignore
/// let stock = StockOperations::new(db.clone(), events.clone());
///
/// stock.receive(&actor, ReceiveStock { .. }).await?;
/// let doc = stock.transfer(&actor, TransferStock { .. }).await?;
/// ```
#[derive(Debug, Clone)]
pub struct StockOperations {
    db: Database,
    events: EventBus,
}

impl StockOperations {
    /// Creates the engine over a database handle and event bus.
    pub fn new(db: Database, events: EventBus) -> Self {
        StockOperations { db, events }
    }

    /// Receives stock at a branch: +quantity, batch appended, IN ledger
    /// entry.
    pub async fn receive(
        &self,
        actor: &Actor,
        req: ReceiveStock,
    ) -> EngineResult<InventoryRecord> {
        validate_quantity(req.quantity)?;

        self.db
            .inventory()
            .get_or_create(&req.product_id, &req.branch_id)
            .await?;

        let batch = BatchInfo {
            lot: req.lot.clone(),
            expiry: req.expiry,
        };
        let record = self
            .apply_adjustment(
                &req.product_id,
                &req.branch_id,
                req.quantity,
                Some(&batch),
            )
            .await?;

        self.db
            .movements()
            .record(NewMovement {
                product_id: req.product_id.clone(),
                branch_id: req.branch_id.clone(),
                quantity: req.quantity,
                movement_type: MovementType::In,
                reason: req.reason,
                user_id: actor.user_id.clone(),
                batch_lot: req.lot,
                batch_expiry: req.expiry,
                document_id: None,
            })
            .await?;

        info!(
            product_id = %req.product_id,
            branch_id = %req.branch_id,
            quantity = req.quantity,
            "Stock received"
        );

        self.publish_stock_updated(&record, MovementType::In);
        Ok(record)
    }

    /// Transfers stock between two branches.
    ///
    /// Rejects with `InsufficientStock` before any write when the source
    /// can't cover the quantity; on success produces exactly two TRANSFER
    /// ledger entries sharing one document id.
    pub async fn transfer(&self, actor: &Actor, req: TransferStock) -> EngineResult<String> {
        validate_quantity(req.quantity)?;

        // Fail fast against the source before touching anything
        let source = self
            .db
            .inventory()
            .find(&req.product_id, &req.from_branch_id)
            .await?
            .ok_or_else(|| {
                CoreError::not_found(
                    "Inventory",
                    format!("{} at branch {}", req.product_id, req.from_branch_id),
                )
            })?;

        if source.quantity < req.quantity {
            return Err(CoreError::InsufficientStock {
                product: req.product_id.clone(),
                available: source.quantity,
                requested: req.quantity,
            }
            .into());
        }

        let document_id = transfer_document_id();

        self.transfer_pair(actor, &req, &document_id).await?;

        info!(
            product_id = %req.product_id,
            from = %req.from_branch_id,
            to = %req.to_branch_id,
            quantity = req.quantity,
            document_id = %document_id,
            "Stock transferred"
        );

        Ok(document_id)
    }

    /// Moves the OUT and IN legs of one transfer pair, recording both
    /// ledger entries under `document_id`.
    async fn transfer_pair(
        &self,
        actor: &Actor,
        req: &TransferStock,
        document_id: &str,
    ) -> EngineResult<()> {
        // OUT leg at the source
        let source_after = self
            .apply_adjustment(&req.product_id, &req.from_branch_id, -req.quantity, None)
            .await?;

        self.db
            .movements()
            .record(NewMovement {
                product_id: req.product_id.clone(),
                branch_id: req.from_branch_id.clone(),
                quantity: -req.quantity,
                movement_type: MovementType::Transfer,
                reason: req.reason.clone(),
                user_id: actor.user_id.clone(),
                batch_lot: None,
                batch_expiry: None,
                document_id: Some(document_id.to_string()),
            })
            .await?;
        self.publish_stock_updated(&source_after, MovementType::Transfer);

        // IN leg at the destination, tagged with a synthetic lot
        self.db
            .inventory()
            .get_or_create(&req.product_id, &req.to_branch_id)
            .await?;

        let batch = BatchInfo {
            lot: Some(TRANSFER_LOT.to_string()),
            expiry: None,
        };
        let dest_after = self
            .apply_adjustment(
                &req.product_id,
                &req.to_branch_id,
                req.quantity,
                Some(&batch),
            )
            .await?;

        self.db
            .movements()
            .record(NewMovement {
                product_id: req.product_id.clone(),
                branch_id: req.to_branch_id.clone(),
                quantity: req.quantity,
                movement_type: MovementType::Transfer,
                reason: req.reason.clone(),
                user_id: actor.user_id.clone(),
                batch_lot: Some(TRANSFER_LOT.to_string()),
                batch_expiry: None,
                document_id: Some(document_id.to_string()),
            })
            .await?;
        self.publish_stock_updated(&dest_after, MovementType::Transfer);

        Ok(())
    }

    /// Transfers many (product, source-branch) pairs to one destination.
    ///
    /// Best-effort by design: items with a missing source record or
    /// insufficient stock are skipped, and the outcome reports how many
    /// actually moved. All moved legs share one document id.
    pub async fn bulk_transfer(
        &self,
        actor: &Actor,
        items: Vec<BulkTransferItem>,
        to_branch_id: &str,
        reason: &str,
    ) -> EngineResult<BulkTransferOutcome> {
        let document_id = transfer_document_id();
        let requested = items.len();
        let mut transferred = 0usize;

        for item in items {
            if item.quantity <= 0 {
                warn!(product_id = %item.product_id, quantity = item.quantity, "Skipping bulk item: non-positive quantity");
                continue;
            }

            let source = self
                .db
                .inventory()
                .find(&item.product_id, &item.from_branch_id)
                .await?;

            let available = match source {
                Some(record) => record.quantity,
                None => {
                    warn!(
                        product_id = %item.product_id,
                        branch_id = %item.from_branch_id,
                        "Skipping bulk item: no inventory record at source"
                    );
                    continue;
                }
            };

            if available < item.quantity {
                warn!(
                    product_id = %item.product_id,
                    available,
                    requested = item.quantity,
                    "Skipping bulk item: insufficient stock"
                );
                continue;
            }

            let pair = TransferStock {
                product_id: item.product_id,
                from_branch_id: item.from_branch_id,
                to_branch_id: to_branch_id.to_string(),
                quantity: item.quantity,
                reason: reason.to_string(),
            };
            self.transfer_pair(actor, &pair, &document_id).await?;
            transferred += 1;
        }

        info!(
            transferred,
            requested,
            document_id = %document_id,
            "Bulk transfer complete"
        );

        Ok(BulkTransferOutcome {
            transferred,
            requested,
            document_id,
        })
    }

    /// Confirms a previewed import: receives every resolvable item under
    /// one IMPORT document id.
    ///
    /// Items whose product or branch no longer resolves are skipped, same
    /// skip-and-report policy as bulk transfer.
    pub async fn confirm_import(
        &self,
        actor: &Actor,
        items: Vec<ImportItem>,
    ) -> EngineResult<ImportOutcome> {
        let document_id = import_document_id();
        let requested = items.len();
        let mut imported = 0usize;

        for item in items {
            if item.quantity <= 0 {
                warn!(product_id = %item.product_id, quantity = item.quantity, "Skipping import item: non-positive quantity");
                continue;
            }

            // The preview resolved these once, but the catalog may have
            // changed between preview and confirm
            let product_ok = self.db.catalog().product(&item.product_id).await?.is_some();
            let branch_ok = self.db.catalog().branch(&item.branch_id).await?.is_some();
            if !product_ok || !branch_ok {
                warn!(
                    product_id = %item.product_id,
                    branch_id = %item.branch_id,
                    "Skipping import item: unresolved reference"
                );
                continue;
            }

            self.db
                .inventory()
                .get_or_create(&item.product_id, &item.branch_id)
                .await?;

            let batch = BatchInfo {
                lot: item.lot.clone(),
                expiry: item.expiry,
            };
            let record = self
                .apply_adjustment(&item.product_id, &item.branch_id, item.quantity, Some(&batch))
                .await?;

            self.db
                .movements()
                .record(NewMovement {
                    product_id: item.product_id.clone(),
                    branch_id: item.branch_id.clone(),
                    quantity: item.quantity,
                    movement_type: MovementType::In,
                    reason: "Importación de inventario".to_string(),
                    user_id: actor.user_id.clone(),
                    batch_lot: item.lot,
                    batch_expiry: item.expiry,
                    document_id: Some(document_id.clone()),
                })
                .await?;

            self.publish_stock_updated(&record, MovementType::In);
            imported += 1;
        }

        info!(imported, requested, document_id = %document_id, "Import confirmed");

        Ok(ImportOutcome {
            imported,
            requested,
            document_id,
        })
    }

    /// Deducts one sale line: -quantity plus a SALE ledger entry.
    ///
    /// Called by the SaleProcessor after payment has cleared.
    pub(crate) async fn deduct_sale_line(
        &self,
        actor: &Actor,
        product_id: &str,
        branch_id: &str,
        quantity: i64,
        sale_id: &str,
    ) -> EngineResult<InventoryRecord> {
        validate_quantity(quantity)?;

        let record = self
            .apply_adjustment(product_id, branch_id, -quantity, None)
            .await?;

        self.db
            .movements()
            .record(NewMovement {
                product_id: product_id.to_string(),
                branch_id: branch_id.to_string(),
                quantity: -quantity,
                movement_type: MovementType::Sale,
                reason: format!("Venta {sale_id}"),
                user_id: actor.user_id.clone(),
                batch_lot: None,
                batch_expiry: None,
                document_id: Some(sale_id.to_string()),
            })
            .await?;

        self.publish_stock_updated(&record, MovementType::Sale);
        Ok(record)
    }

    /// The one path every quantity change takes. Maps the repository's
    /// guard rejection to `InsufficientStock` with the current availability.
    async fn apply_adjustment(
        &self,
        product_id: &str,
        branch_id: &str,
        delta: i64,
        batch: Option<&BatchInfo>,
    ) -> EngineResult<InventoryRecord> {
        match self
            .db
            .inventory()
            .adjust_quantity(product_id, branch_id, delta, batch)
            .await?
        {
            Some(record) => Ok(record),
            None => {
                let available = self
                    .db
                    .inventory()
                    .find(product_id, branch_id)
                    .await?
                    .map(|r| r.quantity)
                    .unwrap_or(0);
                Err(CoreError::InsufficientStock {
                    product: product_id.to_string(),
                    available,
                    requested: -delta,
                }
                .into())
            }
        }
    }

    fn publish_stock_updated(&self, record: &InventoryRecord, movement_type: MovementType) {
        self.events.publish(DomainEvent::StockUpdated {
            product_id: record.product_id.clone(),
            branch_id: record.branch_id.clone(),
            quantity: record.quantity,
            movement_type,
        });
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
