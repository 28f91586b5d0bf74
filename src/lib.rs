//! # Roster Sync
//!
//! Distributes the guest reservations entered on the intake sheet of an
//! OpenDocument workbook into its floor roster sheets.
//!
//! ## Features
//!
//! - **In-place patching**: only the mapped cells of roster rows whose room
//!   matches an intake record are rewritten; every other byte of the workbook
//!   content is written back as it was read
//! - **Deduplication**: one record per room, the first intake row wins
//! - **Validated layout**: floor intervals and column mappings are checked
//!   before the workbook is touched
//! - **Safe saves**: a timestamped backup is taken before each run and the
//!   workbook is replaced atomically
//! - **Audit**: a read-only report of recent intake rows and roster contents
//!
//! ## Usage
//!
//! ```no_run
//! use roster_sync::distribute::layout::Layout;
//! use roster_sync::distribute::Distributor;
//! use std::path::Path;
//!
//! let distributor = Distributor::new(Layout::default())?;
//! let summary = distributor.run(Path::new("GRILLA_DE_PAX_2026.ods"))?;
//! println!("{}", summary);
//! # Ok::<(), roster_sync::distribute::DistributeError>(())
//! ```

pub mod audit;
pub mod distribute;
pub mod error;
mod helpers;
pub mod spreadsheet;
