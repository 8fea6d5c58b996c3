//! # Spreadsheet Import Preview
//!
//! Validation pass over already-extracted spreadsheet rows. The actual
//! file decoding is an external collaborator; the engine receives each row
//! as a fixed-position tuple of optional cells:
//!
//! ```text
//! column 0: barcode        (required)
//! column 1: branch name    (required)
//! column 2: quantity       (required, positive integer)
//! column 3: lot            (optional)
//! column 4: expiry         (optional, YYYY-MM-DD)
//! ```
//!
//! The preview mutates nothing: it resolves each barcode and branch name
//! against the catalog and annotates every row as `Valid` or `Error` with
//! a reason. Rows whose required cells are all blank are skipped entirely
//! (trailing blank spreadsheet rows). Only a structurally unreadable input
//! (no rows at all) is an error.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use tracing::debug;

use almacen_core::CoreError;
use almacen_db::CatalogRepository;

use crate::error::EngineResult;
use crate::stock::ImportItem;

/// A raw spreadsheet row: cells in fixed positions, `None` for blanks.
pub type RawRow = Vec<Option<String>>;

// =============================================================================
// Preview Types
// =============================================================================

/// Validation verdict for one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RowStatus {
    Valid,
    Error,
}

/// One annotated preview row.
#[derive(Debug, Clone, Serialize)]
pub struct ImportRowPreview {
    /// Spreadsheet row number (header is row 1, data starts at row 2).
    pub row_number: usize,
    pub barcode: String,
    pub branch_name: String,
    pub quantity: Option<i64>,
    pub lot: Option<String>,
    pub expiry: Option<DateTime<Utc>>,
    /// Resolved product, when the barcode matched.
    pub product_id: Option<String>,
    pub product_name: Option<String>,
    /// Resolved branch, when the name matched.
    pub branch_id: Option<String>,
    pub status: RowStatus,
    pub error: Option<String>,
}

impl ImportRowPreview {
    /// Converts a `Valid` preview row into the item the confirm step
    /// consumes. `None` for error rows.
    pub fn into_import_item(self) -> Option<ImportItem> {
        match (self.status, self.product_id, self.branch_id, self.quantity) {
            (RowStatus::Valid, Some(product_id), Some(branch_id), Some(quantity)) => {
                Some(ImportItem {
                    product_id,
                    branch_id,
                    quantity,
                    lot: self.lot,
                    expiry: self.expiry,
                })
            }
            _ => None,
        }
    }
}

// =============================================================================
// Preview
// =============================================================================

struct ParsedRow {
    row_number: usize,
    barcode: String,
    branch_name: String,
    quantity_cell: String,
    lot: Option<String>,
    expiry_cell: Option<String>,
}

/// Validates extracted spreadsheet rows against the catalog.
///
/// ## Returns
/// One preview per non-blank row.
/// `Err(InvalidFileFormat)` only when the input has no rows at all.
pub async fn preview_rows(
    catalog: &CatalogRepository,
    rows: &[RawRow],
) -> EngineResult<Vec<ImportRowPreview>> {
    if rows.is_empty() {
        return Err(CoreError::InvalidFileFormat("no data rows found".to_string()).into());
    }

    let mut previews = Vec::new();

    for (idx, row) in rows.iter().enumerate() {
        // Header is spreadsheet row 1 and was discarded by the extractor
        let row_number = idx + 2;

        let Some(parsed) = parse_row(row_number, row) else {
            continue; // fully blank row
        };

        previews.push(validate_row(catalog, parsed).await?);
    }

    debug!(
        rows = previews.len(),
        valid = previews.iter().filter(|p| p.status == RowStatus::Valid).count(),
        "Import preview built"
    );

    Ok(previews)
}

/// Extracts a row's cells. Returns `None` when all required cells are
/// blank (a trailing empty spreadsheet row, not a user mistake).
fn parse_row(row_number: usize, row: &RawRow) -> Option<ParsedRow> {
    let cell = |i: usize| -> Option<String> {
        row.get(i)
            .and_then(|c| c.as_deref())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    let barcode = cell(0);
    let branch_name = cell(1);
    let quantity_cell = cell(2);

    if barcode.is_none() && branch_name.is_none() && quantity_cell.is_none() {
        return None;
    }

    Some(ParsedRow {
        row_number,
        barcode: barcode.unwrap_or_default(),
        branch_name: branch_name.unwrap_or_default(),
        quantity_cell: quantity_cell.unwrap_or_default(),
        lot: cell(3),
        expiry_cell: cell(4),
    })
}

async fn validate_row(
    catalog: &CatalogRepository,
    parsed: ParsedRow,
) -> EngineResult<ImportRowPreview> {
    let mut preview = ImportRowPreview {
        row_number: parsed.row_number,
        barcode: parsed.barcode.clone(),
        branch_name: parsed.branch_name.clone(),
        quantity: None,
        lot: parsed.lot,
        expiry: None,
        product_id: None,
        product_name: None,
        branch_id: None,
        status: RowStatus::Valid,
        error: None,
    };

    let fail = |preview: &mut ImportRowPreview, reason: String| {
        preview.status = RowStatus::Error;
        preview.error = Some(reason);
    };

    if parsed.barcode.is_empty() {
        fail(&mut preview, "missing barcode".to_string());
        return Ok(preview);
    }
    if parsed.branch_name.is_empty() {
        fail(&mut preview, "missing branch name".to_string());
        return Ok(preview);
    }

    // Quantity must be a positive integer
    match parsed.quantity_cell.parse::<i64>() {
        Ok(q) if q > 0 => preview.quantity = Some(q),
        Ok(q) => {
            fail(&mut preview, format!("quantity must be positive, got {q}"));
            return Ok(preview);
        }
        Err(_) => {
            fail(
                &mut preview,
                format!("quantity is not a number: '{}'", parsed.quantity_cell),
            );
            return Ok(preview);
        }
    }

    // Optional expiry, fixed YYYY-MM-DD format
    if let Some(cell) = &parsed.expiry_cell {
        match NaiveDate::parse_from_str(cell, "%Y-%m-%d") {
            Ok(date) => preview.expiry = Some(date.and_time(NaiveTime::MIN).and_utc()),
            Err(_) => {
                fail(&mut preview, format!("invalid expiry date: '{cell}'"));
                return Ok(preview);
            }
        }
    }

    // Resolve product by barcode
    match catalog.product_by_barcode(&parsed.barcode).await? {
        Some(product) => {
            preview.product_id = Some(product.id);
            preview.product_name = Some(product.name);
        }
        None => {
            fail(
                &mut preview,
                format!("no product with barcode '{}'", parsed.barcode),
            );
            return Ok(preview);
        }
    }

    // Resolve branch by name
    match catalog.branch_by_name(&parsed.branch_name).await? {
        Some(branch) => preview.branch_id = Some(branch.id),
        None => {
            fail(
                &mut preview,
                format!("no branch named '{}'", parsed.branch_name),
            );
            return Ok(preview);
        }
    }

    Ok(preview)
}

// =============================================================================
// Unit Tests
// =============================================================================
