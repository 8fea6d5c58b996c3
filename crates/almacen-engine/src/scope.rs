//! # Role-Based Query Scoping
//!
//! Turns "who is asking" into "what they may see" before any query runs.
//! This is a pre-query authorization step that rewrites a filter, kept
//! separate from filter construction so the rules are testable on their
//! own.
//!
//! ## Rules
//! ```text
//! cashier     → pinned to own user AND own home branch
//! supervisor  → pinned to own home branch (any user)
//! admin       → untouched
//! warehouse   → untouched
//! ```
//!
//! A pinned field overrides whatever the caller asked for: a cashier
//! requesting another user's sales silently gets their own.

use almacen_core::{Actor, Role};
use almacen_db::repository::sale::SaleFilter;
use almacen_db::repository::shift::ShiftFilter;

/// Applies the actor's scope to a sale filter.
pub fn scoped_sale_filter(actor: &Actor, mut filter: SaleFilter) -> SaleFilter {
    match actor.role {
        Role::Cashier => {
            filter.user_id = Some(actor.user_id.clone());
            if actor.branch_id.is_some() {
                filter.branch_id = actor.branch_id.clone();
            }
        }
        Role::Supervisor => {
            if actor.branch_id.is_some() {
                filter.branch_id = actor.branch_id.clone();
            }
        }
        Role::Admin | Role::Warehouse => {}
    }
    filter
}

/// Applies the actor's scope to a shift filter.
pub fn scoped_shift_filter(actor: &Actor, mut filter: ShiftFilter) -> ShiftFilter {
    match actor.role {
        Role::Cashier => {
            filter.user_id = Some(actor.user_id.clone());
            if actor.branch_id.is_some() {
                filter.branch_id = actor.branch_id.clone();
            }
        }
        Role::Supervisor => {
            if actor.branch_id.is_some() {
                filter.branch_id = actor.branch_id.clone();
            }
        }
        Role::Admin | Role::Warehouse => {}
    }
    filter
}

// =============================================================================
// Unit Tests
// =============================================================================
