//! # Spreadsheet Module
//!
//! Reads an OpenDocument spreadsheet into a plain-text [`Sheet`] snapshot per
//! tab and writes individual cells back without disturbing the rest of the
//! document. The document is reached through the [`Spreadsheet`] and
//! [`SpreadsheetMut`] traits so callers never depend on the file format.

pub(crate) mod cell;
#[cfg(test)]
pub(crate) mod fixtures;
pub mod ods;
pub mod reference;
pub mod sheet;

use crate::error::RosterSyncError;
use crate::spreadsheet::ods::OdsSpreadsheet;
pub use crate::spreadsheet::sheet::Sheet;
use std::path::Path;
use thiserror::Error;

/// Errors raised while addressing or editing a sheet.
#[derive(Error, Debug)]
pub enum SpreadsheetError {
    /// Unsupported or unrecognized file format
    #[error("Cannot detect file format for '{name}'")]
    InvalidFileFormat { name: String },

    #[error("Spreadsheet '{0}' is password protected")]
    SpreadsheetPasswordProtectedError(String),

    #[error("Sheet index {0} out of range")]
    SheetIndexError(usize),

    /// Row or column past the end of the stored cells
    #[error("Cell {0}!{1} does not exist")]
    CellOutOfRangeError(String, String),

    /// Cell hidden under a merged area
    #[error("Cell {0}!{1} is covered by a merged cell")]
    CoveredCellError(String, String),

    /// Row stored once for several identical rows
    #[error("Row {1} of sheet {0} stands for {2} repeated rows and cannot be edited")]
    RepeatedRowError(String, usize, usize),
}

/// Read access to a loaded spreadsheet.
pub trait Spreadsheet {
    /// File name the document was loaded from
    fn name(&self) -> &str;

    /// Every sheet, in tab order
    fn sheets(&self) -> &[Sheet];

    fn sheet_index(&self, name: &str) -> Option<usize> {
        self.sheets().iter().position(|sheet| sheet.name == name)
    }

    /// Looks a sheet up by its exact tab name.
    fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheet_index(name).map(|index| &self.sheets()[index])
    }
}

/// Cell-level editing of a loaded spreadsheet.
pub trait SpreadsheetMut: Spreadsheet {
    /// Replaces the text of one cell and marks it as a string cell.
    /// Rows and columns are 0-based logical positions as seen in [`Sheet::rows`].
    fn set_cell_text(&mut self, sheet: usize, row: usize, col: usize, text: &str) -> Result<(), SpreadsheetError>;

    /// Writes the document, with every edit applied, to `path`.
    fn save(&mut self, path: &Path) -> Result<(), RosterSyncError>;
}

/// Opens a spreadsheet file, choosing the reader by extension.
pub fn open(path: &Path) -> Result<OdsSpreadsheet, RosterSyncError> {
    let extension = path
        .extension()
        .map(|extension| extension.to_string_lossy().to_ascii_lowercase());
    match extension.as_deref() {
        Some("ods") => OdsSpreadsheet::open(path),
        _ => Err(SpreadsheetError::InvalidFileFormat {
            name: path.to_string_lossy().into_owned(),
        }
        .into()),
    }
}
