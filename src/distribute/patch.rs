//! Roster patching: copies mapped intake fields into the matching roster rows.

use crate::distribute::intake::Distribution;
use crate::distribute::intake::FloorBatch;
use crate::distribute::intake::IntakeRecord;
use crate::distribute::layout::Layout;
use crate::spreadsheet::reference::index_to_reference;
use crate::spreadsheet::SpreadsheetMut;
use std::fmt;

/// Why a record could not be applied.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MissReason {
    /// The floor's roster sheet is not in the document
    SheetMissing,
    /// No roster row holds the room
    RoomMissing,
}

#[derive(Clone, Debug, PartialEq)]
pub struct Miss {
    pub room: i64,
    pub reason: MissReason,
}

/// A mapped cell that could not be written.
#[derive(Clone, Debug, PartialEq)]
pub struct CellFailure {
    pub room: i64,
    /// A1 reference of the target cell
    pub cell: String,
    pub message: String,
}

/// Outcome for one floor partition.
#[derive(Clone, Debug, PartialEq)]
pub struct FloorReport {
    pub partition: String,
    pub sheet: String,
    pub sheet_found: bool,
    /// Rooms whose roster row was found, in intake order
    pub patched: Vec<i64>,
    pub misses: Vec<Miss>,
    pub failures: Vec<CellFailure>,
    /// Cells whose text changed
    pub cells_written: usize,
}

impl FloorReport {
    fn new(batch: &FloorBatch, sheet_found: bool) -> Self {
        Self {
            partition: batch.partition.id.to_owned(),
            sheet: batch.partition.sheet.to_owned(),
            sheet_found,
            patched: Vec::new(),
            misses: Vec::new(),
            failures: Vec::new(),
            cells_written: 0,
        }
    }
}

/// Per-floor outcome of a patch pass.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct PatchReport {
    pub floors: Vec<FloorReport>,
}

impl PatchReport {
    pub fn patched(&self) -> usize {
        self.floors.iter().map(|floor| floor.patched.len()).sum()
    }

    pub fn misses(&self) -> usize {
        self.floors.iter().map(|floor| floor.misses.len()).sum()
    }

    pub fn failures(&self) -> usize {
        self.floors.iter().map(|floor| floor.failures.len()).sum()
    }

    pub fn cells_written(&self) -> usize {
        self.floors.iter().map(|floor| floor.cells_written).sum()
    }
}

impl fmt::Display for PatchReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for floor in &self.floors {
            if floor.sheet_found {
                writeln!(
                    f,
                    "{} ({}): {} updated, {} not found, {} cells changed",
                    floor.sheet,
                    floor.partition,
                    floor.patched.len(),
                    floor.misses.len(),
                    floor.cells_written
                )?;
            } else {
                writeln!(f, "{} ({}): sheet missing, {} rooms skipped", floor.sheet, floor.partition, floor.misses.len())?;
            }
            let rooms: Vec<String> = floor
                .misses
                .iter()
                .filter(|miss| miss.reason == MissReason::RoomMissing)
                .map(|miss| miss.room.to_string())
                .collect();
            if !rooms.is_empty() {
                writeln!(f, "  rooms not found: {}", rooms.join(", "))?;
            }
            for failure in &floor.failures {
                writeln!(f, "  room {}: cell {} not written: {}", failure.room, failure.cell, failure.message)?;
            }
        }
        write!(
            f,
            "Total: {} rooms updated, {} misses, {} cell errors",
            self.patched(),
            self.misses(),
            self.failures()
        )
    }
}

/// Applies the column mapping of a layout to roster sheets.
pub struct RosterPatcher<'a> {
    layout: &'a Layout,
}

impl<'a> RosterPatcher<'a> {
    pub fn new(layout: &'a Layout) -> Self {
        Self { layout }
    }

    /// Patches every batch of `distribution` into `document`.
    /// Misses and cell write errors are recorded, never returned.
    pub fn patch<S: SpreadsheetMut + ?Sized>(&self, document: &mut S, distribution: &Distribution) -> PatchReport {
        let floors = distribution
            .batches
            .iter()
            .map(|batch| self.patch_floor(document, batch))
            .collect();
        PatchReport { floors }
    }

    fn patch_floor<S: SpreadsheetMut + ?Sized>(&self, document: &mut S, batch: &FloorBatch) -> FloorReport {
        let Some(sheet) = document.sheet_index(&batch.partition.sheet) else {
            log::warn!(
                "Sheet '{}' not found, {} records of {} skipped",
                batch.partition.sheet,
                batch.records.len(),
                batch.partition.id
            );
            let mut report = FloorReport::new(batch, false);
            report.misses = batch
                .records
                .iter()
                .map(|record| Miss { room: record.room, reason: MissReason::SheetMissing })
                .collect();
            return report;
        };

        log::info!("Updating {} with {} records", batch.partition.sheet, batch.records.len());
        let mut report = FloorReport::new(batch, true);
        for record in &batch.records {
            let key = record.room.to_string();
            match document.sheets()[sheet].find_row(self.layout.lookup_column, &key) {
                Some(row) => {
                    log::debug!("Room {} found at row {} of {}", record.room, row + 1, batch.partition.sheet);
                    self.patch_row(document, sheet, row, record, &mut report);
                    report.patched.push(record.room);
                }
                None => {
                    log::warn!("Room {} not found in {}", record.room, batch.partition.sheet);
                    report.misses.push(Miss { room: record.room, reason: MissReason::RoomMissing });
                }
            }
        }
        report
    }

    /// Writes every mapped column present in the intake row whose text differs
    /// from the roster text. Blank roster columns past the end of the snapshot
    /// row are left to the document, which refuses them if they do not exist.
    fn patch_row<S: SpreadsheetMut + ?Sized>(
        &self,
        document: &mut S,
        sheet: usize,
        row: usize,
        record: &IntakeRecord,
        report: &mut FloorReport,
    ) {
        for pair in &self.layout.mapping {
            let Some(text) = record.field(pair.src) else {
                continue;
            };
            if document.sheets()[sheet].text(row, pair.dest) == text {
                continue;
            }
            match document.set_cell_text(sheet, row, pair.dest, text) {
                Ok(()) => report.cells_written += 1,
                Err(error) => {
                    log::warn!("Room {}: {}", record.room, error);
                    report.failures.push(CellFailure {
                        room: record.room,
                        cell: index_to_reference(row, pair.dest),
                        message: error.to_string(),
                    });
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distribute::intake::deduplicate;
    use crate::distribute::layout::ColumnPair;
    use crate::distribute::layout::FloorPartition;
    use crate::spreadsheet::fixtures::MemorySpreadsheet;
    use crate::spreadsheet::Sheet;
    use crate::spreadsheet::Spreadsheet;

    fn rows(rows: &[&[&str]]) -> Vec<Vec<String>> {
        rows.iter()
            .map(|row| row.iter().map(|text| text.to_string()).collect())
            .collect()
    }

    fn small_layout() -> Layout {
        Layout {
            partitions: vec![FloorPartition::new("PISO_1", 101, 121, "PISO 1")],
            mapping: vec![ColumnPair::new(2, 1), ColumnPair::new(3, 2), ColumnPair::new(4, 3)],
            ..Layout::default()
        }
    }

    fn run(layout: &Layout, document: &mut MemorySpreadsheet, intake: &[&[&str]]) -> PatchReport {
        let intake = rows(intake);
        let distribution = deduplicate(layout, &intake);
        RosterPatcher::new(layout).patch(document, &distribution)
    }

    #[test]
    fn patches_mapped_columns_of_matching_row() {
        let layout = small_layout();
        let mut document = MemorySpreadsheet::new(vec![Sheet::new("PISO 1", rows(&[
            &["TIPO", "HAB", "IN", "OUT", "PAX", "DNI"],
            &["DBL", "101", "", "", "", "old"],
            &["SGL", "102", "x", "y", "z", "keep"],
        ]))]);
        let report = run(&layout, &mut document, &[&[
            "101", "2026-01-01", "2026-01-05", "2", "DNI1", "5", "Alice", "30", "V1", "MAP", "OK",
        ]]);

        let sheet = &document.sheets()[0];
        assert_eq!(sheet.rows[1], vec!["DBL", "101", "2026-01-01", "2026-01-05", "2", "old"]);
        assert_eq!(sheet.rows[2], vec!["SGL", "102", "x", "y", "z", "keep"]);
        assert_eq!(report.patched(), 1);
        assert_eq!(report.misses(), 0);
        assert_eq!(report.cells_written(), 3);
    }

    #[test]
    fn matches_trimmed_room_text() {
        let layout = small_layout();
        let mut document = MemorySpreadsheet::new(vec![Sheet::new("PISO 1", rows(&[
            &["DBL", "110 ", "", "", ""],
        ]))]);
        run(&layout, &mut document, &[&["110", "a", "b", "c"]]);

        assert_eq!(document.sheets()[0].rows[0], vec!["DBL", "110 ", "a", "b", "c"]);
    }

    #[test]
    fn first_matching_row_wins() {
        let layout = small_layout();
        let mut document = MemorySpreadsheet::new(vec![Sheet::new("PISO 1", rows(&[
            &["DBL", "105", "", "", ""],
            &["DBL", "105", "", "", ""],
        ]))]);
        run(&layout, &mut document, &[&["105", "a", "b", "c"]]);

        assert_eq!(document.sheets()[0].rows[0][2], "a");
        assert_eq!(document.sheets()[0].rows[1][2], "");
    }

    #[test]
    fn skips_columns_missing_from_intake_row() {
        let layout = small_layout();
        let mut document = MemorySpreadsheet::new(vec![Sheet::new("PISO 1", rows(&[
            &["DBL", "101", "", ""],
        ]))]);
        let report = run(&layout, &mut document, &[&["101", "in"]]);

        assert_eq!(document.sheets()[0].rows[0], vec!["DBL", "101", "in", ""]);
        assert_eq!(report.cells_written(), 1);
        assert_eq!(report.failures(), 0);
    }

    #[test]
    fn short_roster_row_reports_unwritable_columns() {
        let layout = small_layout();
        let mut document = MemorySpreadsheet::new(vec![Sheet::new("PISO 1", rows(&[
            &["DBL", "101", "", ""],
        ]))]);
        let report = run(&layout, &mut document, &[&["101", "in", "out", ""], &["101", "x", "y", "z"]]);

        assert_eq!(document.sheets()[0].rows[0], vec!["DBL", "101", "in", "out"]);
        assert_eq!(report.cells_written(), 2);
        assert_eq!(report.failures(), 0);

        let report = run(&layout, &mut document, &[&["101", "in", "out", "2"]]);
        assert_eq!(report.failures(), 1);
        assert_eq!(report.floors[0].failures[0].cell, "E1");
    }

    #[test]
    fn empty_source_clears_destination() {
        let layout = small_layout();
        let mut document = MemorySpreadsheet::new(vec![Sheet::new("PISO 1", rows(&[
            &["DBL", "101", "old", "old", "old"],
        ]))]);
        run(&layout, &mut document, &[&["101", "", "new", ""]]);

        assert_eq!(document.sheets()[0].rows[0], vec!["DBL", "101", "", "new", ""]);
    }

    #[test]
    fn reports_missing_rooms_and_sheets() {
        let mut layout = Layout::default();
        layout.mapping = vec![ColumnPair::new(2, 1)];
        let mut document = MemorySpreadsheet::new(vec![
            Sheet::new("PISO 1", rows(&[&["DBL", "101", ""]])),
            Sheet::new("PISO 3", rows(&[&["DBL", "343", ""]])),
        ]);
        let report = run(&layout, &mut document, &[
            &["101", "a"],
            &["102", "b"],
            &["230", "c"],
            &["343", "d"],
            &["999", "e"],
        ]);

        assert_eq!(report.floors.len(), 3);
        assert_eq!(report.floors[0].patched, vec![101]);
        assert_eq!(report.floors[0].misses, vec![Miss { room: 102, reason: MissReason::RoomMissing }]);
        assert!(!report.floors[1].sheet_found);
        assert_eq!(report.floors[1].misses, vec![Miss { room: 230, reason: MissReason::SheetMissing }]);
        assert_eq!(report.floors[2].patched, vec![343]);
        assert_eq!(document.sheets()[1].rows[0][2], "d");
        assert_eq!((report.patched(), report.misses()), (2, 2));

        let text = report.to_string();
        assert!(text.contains("PISO 1 (PISO_1): 1 updated, 1 not found"));
        assert!(text.contains("rooms not found: 102"));
        assert!(text.contains("PISO 2 (PISO_2): sheet missing, 1 rooms skipped"));
        assert!(text.ends_with("Total: 2 rooms updated, 2 misses, 0 cell errors"));
    }

    #[test]
    fn cell_write_errors_do_not_stop_the_row() {
        let layout = small_layout();
        let mut document = MemorySpreadsheet::new(vec![Sheet::new("PISO 1", rows(&[
            &["DBL", "101", "", "", ""],
            &["DBL", "102", "", "", ""],
        ]))]);
        document.fail_on(0, 0, 3);
        let report = run(&layout, &mut document, &[&["101", "a", "b", "c"], &["102", "d", "e", "f"]]);

        assert_eq!(document.sheets()[0].rows[0], vec!["DBL", "101", "a", "", "c"]);
        assert_eq!(document.sheets()[0].rows[1], vec!["DBL", "102", "d", "e", "f"]);
        assert_eq!(report.patched(), 2);
        assert_eq!(report.failures(), 1);
        assert_eq!(report.floors[0].failures[0].cell, "D1");
        assert!(report.to_string().contains("room 101: cell D1 not written"));
    }

    #[test]
    fn second_pass_changes_nothing() {
        let layout = Layout::default();
        let mut document = MemorySpreadsheet::new(vec![Sheet::new("PISO 2", rows(&[
            &["TIPO", "HAB", "IN", "OUT", "PAX", "DNI", "NUMERO", "NOMBRE", "EDAD", "VOUCHER", "COMIDA", "ESTADO"],
            &["DBL", "222", "", "", "", "", "", "", "", "", "", ""],
            &["DBL", "223", "q", "", "", "", "", "", "", "", "", "w"],
        ]))]);
        let intake: &[&[&str]] = &[
            &["HAB", "IN", "OUT", "PAX", "ID", "N.º", "NOMBRE", "EDAD", "VOUCHER", "MAP", "ESTADO"],
            &["222", "2026-02-01", "2026-02-03", "2", "D1", "1", "Bob", "40", "V1", "MAP", "OK"],
            &["222", "2026-03-01", "2026-03-03", "3", "D2", "2", "Eve", "41", "V2", "PC", "OK"],
        ];

        let first = run(&layout, &mut document, intake);
        let after_first = document.sheets().to_vec();
        let second = run(&layout, &mut document, intake);

        assert_eq!(document.sheets(), after_first.as_slice());
        assert_eq!(after_first[0].rows[1][9], "V1");
        assert_eq!(after_first[0].rows[2], rows(&[&["DBL", "223", "q", "", "", "", "", "", "", "", "", "w"]])[0]);
        assert_eq!(first.cells_written(), 10);
        assert_eq!(second.cells_written(), 0);
        assert_eq!(second.patched(), 1);
    }
}
