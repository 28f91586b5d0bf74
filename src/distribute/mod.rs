//! # Distribution
//!
//! Copies the reservations entered on the intake sheet into the floor roster
//! sheets of the same workbook. A run backs the workbook up, loads it,
//! deduplicates the intake rows, patches the roster rows that hold the same
//! room and saves the workbook in place.

pub mod classify;
pub mod intake;
pub mod layout;
pub mod patch;

use crate::distribute::intake::deduplicate;
use crate::distribute::layout::Layout;
use crate::distribute::layout::LayoutError;
use crate::distribute::patch::PatchReport;
use crate::distribute::patch::RosterPatcher;
use crate::error::RosterSyncError;
use crate::helpers::fs::create_backup;
use crate::spreadsheet;
use crate::spreadsheet::SpreadsheetMut;
use chrono::Local;
use chrono::NaiveDateTime;
use std::fmt;
use std::io;
use std::path::Path;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a run. The workbook on disk is unchanged whenever one is returned.
#[derive(Error, Debug)]
pub enum DistributeError {
    #[error("Invalid layout: {0}")]
    Configuration(#[from] LayoutError),

    #[error("Cannot back up '{}': {source}", .path.display())]
    Backup { path: PathBuf, source: io::Error },

    #[error("Cannot load workbook: {0}")]
    DocumentLoad(#[source] RosterSyncError),

    #[error("Intake sheet '{0}' not found")]
    SourceNotFound(String),

    #[error("Cannot save workbook: {source}")]
    Save { backup: PathBuf, source: RosterSyncError },
}

impl DistributeError {
    /// Backup left behind by a run that failed while saving.
    pub fn backup(&self) -> Option<&Path> {
        match self {
            DistributeError::Save { backup, .. } => Some(backup.as_path()),
            _ => None,
        }
    }
}

/// Number of records distributed to one floor.
#[derive(Clone, Debug, PartialEq)]
pub struct FloorCount {
    pub partition: String,
    pub records: usize,
}

/// In-memory result of distributing one workbook.
#[derive(Clone, Debug, PartialEq)]
pub struct Outcome {
    /// Rows on the intake sheet, header included
    pub intake_rows: usize,
    pub floors: Vec<FloorCount>,
    pub duplicates: usize,
    pub unclassified: usize,
    pub report: PatchReport,
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Intake: {} rows, {} duplicates skipped, {} unclassified",
            self.intake_rows, self.duplicates, self.unclassified
        )?;
        for floor in &self.floors {
            writeln!(f, "  {}: {} records", floor.partition, floor.records)?;
        }
        write!(f, "{}", self.report)
    }
}

/// Result of a successful run.
#[derive(Clone, Debug, PartialEq)]
pub struct RunSummary {
    pub backup: PathBuf,
    pub outcome: Outcome,
}

impl fmt::Display for RunSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Backup: {}", self.backup.display())?;
        write!(f, "{}", self.outcome)
    }
}

/// Run controller holding a validated layout.
pub struct Distributor {
    layout: Layout,
}

impl Distributor {
    pub fn new(layout: Layout) -> Result<Self, DistributeError> {
        layout.validate()?;
        Ok(Self { layout })
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    /// Distributes the workbook at `path` in place, backing it up first.
    pub fn run(&self, path: &Path) -> Result<RunSummary, DistributeError> {
        self.run_at(path, Local::now().naive_local())
    }

    /// Like [`Distributor::run`], with the timestamp used for the backup name.
    pub fn run_at(&self, path: &Path, timestamp: NaiveDateTime) -> Result<RunSummary, DistributeError> {
        let backup = create_backup(path, timestamp).map_err(|source| DistributeError::Backup {
            path: path.to_owned(),
            source,
        })?;
        log::info!("Backup created: {}", backup.display());

        let mut document = spreadsheet::open(path).map_err(DistributeError::DocumentLoad)?;
        log::info!("Loaded {}", path.display());
        let outcome = self.distribute(&mut document)?;

        document
            .save(path)
            .map_err(|source| DistributeError::Save { backup: backup.to_owned(), source })?;
        log::info!("Saved {}", path.display());
        Ok(RunSummary { backup, outcome })
    }

    /// Deduplicates the intake sheet of `document` and patches its roster sheets.
    pub fn distribute<S: SpreadsheetMut + ?Sized>(&self, document: &mut S) -> Result<Outcome, DistributeError> {
        let intake = document
            .sheet(&self.layout.intake_sheet)
            .ok_or_else(|| DistributeError::SourceNotFound(self.layout.intake_sheet.to_owned()))?;
        let intake_rows = intake.rows.len();
        let distribution = deduplicate(&self.layout, &intake.rows);
        log::info!(
            "{}: {} rows, {} records to distribute",
            self.layout.intake_sheet,
            intake_rows,
            distribution.records()
        );

        let floors = distribution
            .batches
            .iter()
            .map(|batch| FloorCount {
                partition: batch.partition.id.to_owned(),
                records: batch.records.len(),
            })
            .collect();
        let report = RosterPatcher::new(&self.layout).patch(document, &distribution);
        Ok(Outcome {
            intake_rows,
            floors,
            duplicates: distribution.duplicates,
            unclassified: distribution.unclassified,
            report,
        })
    }
}
