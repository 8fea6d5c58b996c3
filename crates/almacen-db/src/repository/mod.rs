//! # Repository Module
//!
//! Database repository implementations for Almacén POS.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Pattern Explained                         │
//! │                                                                         │
//! │  The Repository pattern abstracts database access behind a clean API.  │
//! │                                                                         │
//! │  Engine service (StockOperations, SaleProcessor, ...)                   │
//! │       │                                                                 │
//! │       │  db.inventory().adjust_quantity(product, branch, -3)            │
//! │       │  ↓                                                              │
//! │       ▼                                                                 │
//! │  InventoryRepository                                                   │
//! │  ├── get_or_create(&self, product_id, branch_id)                       │
//! │  ├── adjust_quantity(&self, product_id, branch_id, delta, batch)       │
//! │  ├── append_batch(&self, inventory_id, quantity, info)                 │
//! │  └── query(&self, filter, page)                                        │
//! │       │                                                                 │
//! │       │  SQL Query                                                      │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! │  Benefits:                                                              │
//! │  • Clean separation of concerns                                        │
//! │  • Easy to test (in-memory SQLite per test)                            │
//! │  • SQL is isolated in one place                                        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`catalog::CatalogRepository`] - Products and branches
//! - [`inventory::InventoryRepository`] - Per-branch stock and batches
//! - [`movement::MovementRepository`] - Append-only stock ledger
//! - [`sale::SaleRepository`] - Sales with line items and card data
//! - [`shift::ShiftRepository`] - Cash shift lifecycle

pub mod catalog;
pub mod inventory;
pub mod movement;
pub mod sale;
pub mod shift;

// =============================================================================
// Pagination
// =============================================================================

/// Page request for list queries.
///
/// Pages are 1-based; `page_size` is clamped to sane bounds so a caller
/// can't ask the database for a million rows at once.
#[derive(Debug, Clone, Copy)]
pub struct Page {
    pub page: u32,
    pub page_size: u32,
}

impl Page {
    pub const MAX_PAGE_SIZE: u32 = 200;

    pub fn new(page: u32, page_size: u32) -> Self {
        Page {
            page: page.max(1),
            page_size: page_size.clamp(1, Self::MAX_PAGE_SIZE),
        }
    }

    /// SQL LIMIT value.
    pub fn limit(&self) -> i64 {
        self.page_size as i64
    }

    /// SQL OFFSET value.
    pub fn offset(&self) -> i64 {
        ((self.page - 1) as i64) * (self.page_size as i64)
    }
}

impl Default for Page {
    fn default() -> Self {
        Page {
            page: 1,
            page_size: 50,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_clamping() {
        let p = Page::new(0, 10_000);
        assert_eq!(p.page, 1);
        assert_eq!(p.page_size, Page::MAX_PAGE_SIZE);
        assert_eq!(p.offset(), 0);

        let p = Page::new(3, 20);
        assert_eq!(p.limit(), 20);
        assert_eq!(p.offset(), 40);
    }
}
