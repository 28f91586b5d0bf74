//! Static description of the workbook: which sheet holds the intake rows,
//! which floor sheets receive them and how intake columns land in roster
//! columns.

use crate::distribute::classify;
use std::collections::HashSet;
use thiserror::Error;

/// Configuration errors, detected before any document is touched.
#[derive(Error, Debug, PartialEq)]
pub enum LayoutError {
    #[error("No floor partitions configured")]
    NoPartitions,

    #[error("Partition '{id}' has low bound {low} above high bound {high}")]
    EmptyInterval { id: String, low: i64, high: i64 },

    #[error("Partitions '{first}' and '{second}' overlap")]
    OverlappingPartitions { first: String, second: String },

    #[error("Partition id '{0}' is used more than once")]
    DuplicatePartitionId(String),

    #[error("Sheet '{0}' is used by more than one partition")]
    DuplicateSheetName(String),

    #[error("Intake sheet '{0}' is also a roster sheet")]
    IntakeIsRoster(String),

    #[error("Room column {column} is outside the intake schema ({width} columns)")]
    RoomColumnOutOfRange { column: usize, width: usize },

    #[error("Lookup column {column} is outside the roster schema ({width} columns)")]
    LookupColumnOutOfRange { column: usize, width: usize },

    #[error("Column mapping is empty")]
    EmptyMapping,

    #[error("Mapping source column {column} is outside the intake schema ({width} columns)")]
    SourceOutOfRange { column: usize, width: usize },

    #[error("Mapping destination column {column} is outside the roster schema ({width} columns)")]
    DestinationOutOfRange { column: usize, width: usize },

    #[error("Mapping writes into the lookup column {0}")]
    DestinationIsLookup(usize),

    #[error("Mapping writes destination column {0} more than once")]
    DuplicateDestination(usize),
}

/// A closed interval of room numbers served by one roster sheet.
#[derive(Clone, Debug, PartialEq)]
pub struct FloorPartition {
    /// Internal identifier, e.g. `PISO_1`
    pub id: String,
    pub low: i64,
    pub high: i64,
    /// Tab name of the roster sheet, e.g. `PISO 1`
    pub sheet: String,
}

impl FloorPartition {
    pub fn new(id: &str, low: i64, high: i64, sheet: &str) -> Self {
        Self {
            id: id.to_owned(),
            low,
            high,
            sheet: sheet.to_owned(),
        }
    }

    pub fn contains(&self, room: i64) -> bool {
        self.low <= room && room <= self.high
    }

    fn overlaps(&self, other: &FloorPartition) -> bool {
        self.low <= other.high && other.low <= self.high
    }
}

/// Copies intake column `src` into roster column `dest`.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColumnPair {
    pub dest: usize,
    pub src: usize,
}

impl ColumnPair {
    pub const fn new(dest: usize, src: usize) -> Self {
        Self { dest, src }
    }
}

/// Workbook layout used by a run.
#[derive(Clone, Debug, PartialEq)]
pub struct Layout {
    /// Tab name of the intake sheet
    pub intake_sheet: String,
    /// Column names of an intake row
    pub intake_schema: Vec<String>,
    /// Intake column holding the room number
    pub room_column: usize,
    /// Column names of a roster row
    pub roster_schema: Vec<String>,
    /// Roster column holding the room number
    pub lookup_column: usize,
    /// Floor partitions, in classification order
    pub partitions: Vec<FloorPartition>,
    /// Columns copied from intake rows into roster rows
    pub mapping: Vec<ColumnPair>,
}

const INTAKE_SHEET: &str = "Ingresos 23 D MAYO";

const INTAKE_SCHEMA: [&str; 14] = [
    "HAB", "IN", "OUT", "PAX", "ID", "N.º", "NOMBRE", "EDAD", "VOUCHER", "MAP", "ESTADO", "BENEFICIO", "SEDE",
    "OBSERVACIONES",
];

const ROSTER_SCHEMA: [&str; 12] = [
    "TIPO", "HAB", "IN", "OUT", "PAX", "DNI", "NUMERO", "NOMBRE", "EDAD", "VOUCHER", "COMIDA", "ESTADO",
];

const MAPPING: [ColumnPair; 10] = [
    ColumnPair::new(2, 1),
    ColumnPair::new(3, 2),
    ColumnPair::new(4, 3),
    ColumnPair::new(5, 4),
    ColumnPair::new(6, 5),
    ColumnPair::new(7, 6),
    ColumnPair::new(8, 7),
    ColumnPair::new(9, 8),
    ColumnPair::new(10, 9),
    ColumnPair::new(11, 10),
];

impl Default for Layout {
    /// Layout of the hotel guest grid.
    fn default() -> Self {
        Self {
            intake_sheet: INTAKE_SHEET.to_owned(),
            intake_schema: INTAKE_SCHEMA.iter().map(|name| name.to_string()).collect(),
            room_column: 0,
            roster_schema: ROSTER_SCHEMA.iter().map(|name| name.to_string()).collect(),
            lookup_column: 1,
            partitions: vec![
                FloorPartition::new("PISO_1", 101, 121, "PISO 1"),
                FloorPartition::new("PISO_2", 222, 242, "PISO 2"),
                FloorPartition::new("PISO_3", 343, 353, "PISO 3"),
            ],
            mapping: MAPPING.to_vec(),
        }
    }
}

impl Layout {
    /// Text that marks the first intake row as a header: the name of the room column.
    pub fn header_token(&self) -> &str {
        self.intake_schema
            .get(self.room_column)
            .map(String::as_str)
            .unwrap_or_default()
    }

    /// Partition whose interval contains the room parsed from `token`.
    pub fn classify(&self, token: &str) -> Option<&FloorPartition> {
        classify::classify(&self.partitions, token)
    }

    pub fn validate(&self) -> Result<(), LayoutError> {
        self.validate_partitions()?;
        self.validate_columns()?;
        self.validate_mapping()
    }

    fn validate_partitions(&self) -> Result<(), LayoutError> {
        if self.partitions.is_empty() {
            return Err(LayoutError::NoPartitions);
        }
        let mut ids = HashSet::new();
        let mut sheets = HashSet::new();
        for (index, partition) in self.partitions.iter().enumerate() {
            if partition.low > partition.high {
                return Err(LayoutError::EmptyInterval {
                    id: partition.id.to_owned(),
                    low: partition.low,
                    high: partition.high,
                });
            }
            if !ids.insert(partition.id.as_str()) {
                return Err(LayoutError::DuplicatePartitionId(partition.id.to_owned()));
            }
            if !sheets.insert(partition.sheet.as_str()) {
                return Err(LayoutError::DuplicateSheetName(partition.sheet.to_owned()));
            }
            if partition.sheet == self.intake_sheet {
                return Err(LayoutError::IntakeIsRoster(partition.sheet.to_owned()));
            }
            if let Some(other) = self.partitions[..index].iter().find(|other| other.overlaps(partition)) {
                return Err(LayoutError::OverlappingPartitions {
                    first: other.id.to_owned(),
                    second: partition.id.to_owned(),
                });
            }
        }
        Ok(())
    }

    fn validate_columns(&self) -> Result<(), LayoutError> {
        if self.room_column >= self.intake_schema.len() {
            return Err(LayoutError::RoomColumnOutOfRange {
                column: self.room_column,
                width: self.intake_schema.len(),
            });
        }
        if self.lookup_column >= self.roster_schema.len() {
            return Err(LayoutError::LookupColumnOutOfRange {
                column: self.lookup_column,
                width: self.roster_schema.len(),
            });
        }
        Ok(())
    }

    fn validate_mapping(&self) -> Result<(), LayoutError> {
        if self.mapping.is_empty() {
            return Err(LayoutError::EmptyMapping);
        }
        let mut destinations = HashSet::new();
        for pair in &self.mapping {
            if pair.src >= self.intake_schema.len() {
                return Err(LayoutError::SourceOutOfRange {
                    column: pair.src,
                    width: self.intake_schema.len(),
                });
            }
            if pair.dest >= self.roster_schema.len() {
                return Err(LayoutError::DestinationOutOfRange {
                    column: pair.dest,
                    width: self.roster_schema.len(),
                });
            }
            if pair.dest == self.lookup_column {
                return Err(LayoutError::DestinationIsLookup(pair.dest));
            }
            if !destinations.insert(pair.dest) {
                return Err(LayoutError::DuplicateDestination(pair.dest));
            }
        }
        Ok(())
    }
}
