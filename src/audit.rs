//! Read-only audit of a distributed workbook: lists the latest intake rows for
//! a set of rooms and shows what the floor rosters hold for those rooms.

use crate::distribute::layout::Layout;
use crate::spreadsheet::Sheet;
use crate::spreadsheet::Spreadsheet;
use std::fmt;

/// Rooms checked when none are given.
pub const DEFAULT_ROOMS: [&str; 7] = ["101", "120", "225", "237", "240", "344", "350"];
/// Intake rows scanned from the bottom of the sheet.
pub const DEFAULT_RECENT: usize = 30;

/// Rows with this many cells or fewer are not reservations.
const MIN_CELLS: usize = 6;

const INTAKE_CHECK_IN: usize = 1;
const INTAKE_CHECK_OUT: usize = 2;
const INTAKE_PAX: usize = 3;
const INTAKE_NAME: usize = 6;
const INTAKE_VOUCHER: usize = 8;

const ROSTER_KIND: usize = 0;
const ROSTER_CHECK_IN: usize = 2;
const ROSTER_CHECK_OUT: usize = 3;
const ROSTER_PAX: usize = 4;
const ROSTER_NAME: usize = 7;
const ROSTER_VOUCHER: usize = 9;

#[derive(Clone, Debug, PartialEq)]
pub struct AuditOptions {
    pub rooms: Vec<String>,
    pub recent: usize,
}

impl Default for AuditOptions {
    fn default() -> Self {
        Self {
            rooms: DEFAULT_ROOMS.iter().map(|room| room.to_string()).collect(),
            recent: DEFAULT_RECENT,
        }
    }
}

/// Reservation fields of one row, as shown by the audit.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Entry {
    /// 0-based row in its sheet
    pub row: usize,
    pub room: String,
    /// Room type, roster rows only
    pub kind: String,
    pub check_in: String,
    pub check_out: String,
    pub pax: String,
    pub name: String,
    pub voucher: String,
}

fn truncate(text: &str, width: usize) -> String {
    text.chars().take(width).collect()
}

#[derive(Clone, Debug, PartialEq)]
pub enum RoomStatus {
    /// Room is not a number inside any partition
    Unclassified,
    SheetMissing,
    /// No roster row for the room carries reservation data
    NoData,
    Found(Entry),
}

#[derive(Clone, Debug, PartialEq)]
pub struct RoomAudit {
    pub room: String,
    /// Roster sheet the room belongs to
    pub sheet: Option<String>,
    pub status: RoomStatus,
}

#[derive(Clone, Debug, PartialEq)]
pub struct AuditReport {
    pub intake_sheet: String,
    /// Row count of the intake sheet, None when it is missing
    pub intake_rows: Option<usize>,
    /// Matching intake rows, newest first
    pub recent: Vec<Entry>,
    /// Roster findings, grouped by sheet in document order
    pub rooms: Vec<RoomAudit>,
}

/// Audits `document` without modifying it.
pub fn audit<S: Spreadsheet + ?Sized>(document: &S, layout: &Layout, options: &AuditOptions) -> AuditReport {
    let rooms: Vec<&str> = options.rooms.iter().map(|room| room.trim()).collect();
    let intake = document.sheet(&layout.intake_sheet);
    let recent = intake
        .map(|sheet| recent_intake(sheet, layout.room_column, &rooms, options.recent))
        .unwrap_or_default();

    let mut audits: Vec<(usize, RoomAudit)> = rooms
        .iter()
        .map(|room| {
            let Some(partition) = layout.classify(room) else {
                let audit = RoomAudit { room: room.to_string(), sheet: None, status: RoomStatus::Unclassified };
                return (usize::MAX, audit);
            };
            let sheet = Some(partition.sheet.to_owned());
            match document.sheet_index(&partition.sheet) {
                Some(index) => {
                    let status = find_roster_entry(&document.sheets()[index], layout.lookup_column, room)
                        .map(RoomStatus::Found)
                        .unwrap_or(RoomStatus::NoData);
                    (index, RoomAudit { room: room.to_string(), sheet, status })
                }
                None => (usize::MAX, RoomAudit { room: room.to_string(), sheet, status: RoomStatus::SheetMissing }),
            }
        })
        .collect();
    // Sheets in document order, then missing sheets by name, then unclassified rooms.
    audits.sort_by(|(left_index, left), (right_index, right)| {
        left_index
            .cmp(right_index)
            .then_with(|| left.sheet.is_none().cmp(&right.sheet.is_none()))
            .then_with(|| left.sheet.cmp(&right.sheet))
    });

    AuditReport {
        intake_sheet: layout.intake_sheet.to_owned(),
        intake_rows: intake.map(|sheet| sheet.rows.len()),
        recent,
        rooms: audits.into_iter().map(|(_, audit)| audit).collect(),
    }
}

/// Rows among the last `recent` whose room is listed, newest first.
fn recent_intake(sheet: &Sheet, room_column: usize, rooms: &[&str], recent: usize) -> Vec<Entry> {
    let start = sheet.rows.len().saturating_sub(recent);
    (start..sheet.rows.len())
        .rev()
        .filter(|row| sheet.rows[*row].len() > MIN_CELLS)
        .filter(|row| rooms.iter().any(|room| *room == sheet.text(*row, room_column)))
        .map(|row| Entry {
            row,
            room: sheet.text(row, room_column).to_owned(),
            kind: String::new(),
            check_in: sheet.text(row, INTAKE_CHECK_IN).to_owned(),
            check_out: sheet.text(row, INTAKE_CHECK_OUT).to_owned(),
            pax: sheet.text(row, INTAKE_PAX).to_owned(),
            name: truncate(sheet.text(row, INTAKE_NAME), 30),
            voucher: sheet.text(row, INTAKE_VOUCHER).to_owned(),
        })
        .collect()
}

/// First roster row for `room` that carries a check-in, a name or a voucher.
fn find_roster_entry(sheet: &Sheet, lookup_column: usize, room: &str) -> Option<Entry> {
    (0..sheet.rows.len())
        .filter(|row| sheet.rows[*row].len() > MIN_CELLS)
        .filter(|row| sheet.text(*row, lookup_column).trim() == room)
        .map(|row| Entry {
            row,
            room: room.to_owned(),
            kind: sheet.text(row, ROSTER_KIND).to_owned(),
            check_in: sheet.text(row, ROSTER_CHECK_IN).to_owned(),
            check_out: sheet.text(row, ROSTER_CHECK_OUT).to_owned(),
            pax: sheet.text(row, ROSTER_PAX).to_owned(),
            name: truncate(sheet.text(row, ROSTER_NAME), 25),
            voucher: sheet.text(row, ROSTER_VOUCHER).to_owned(),
        })
        .find(|entry| !entry.check_in.is_empty() || !entry.name.is_empty() || !entry.voucher.is_empty())
}

impl fmt::Display for AuditReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.intake_rows {
            Some(rows) => writeln!(f, "Intake sheet '{}': {} rows", self.intake_sheet, rows)?,
            None => writeln!(f, "Intake sheet '{}': not found", self.intake_sheet)?,
        }
        for entry in &self.recent {
            writeln!(
                f,
                "  HAB {} | IN: {} | OUT: {} | PAX: {} | {:30} | Voucher: {}",
                entry.room, entry.check_in, entry.check_out, entry.pax, entry.name, entry.voucher
            )?;
        }
        writeln!(f, "Recent records found: {}", self.recent.len())?;

        let mut current: Option<&Option<String>> = None;
        for audit in &self.rooms {
            if current != Some(&audit.sheet) {
                match &audit.sheet {
                    Some(sheet) => writeln!(f, "{}:", sheet)?,
                    None => writeln!(f, "Unassigned:")?,
                }
                current = Some(&audit.sheet);
            }
            match &audit.status {
                RoomStatus::Found(entry) => writeln!(
                    f,
                    "  HAB {} ({:4}) | IN: {:12} | OUT: {:12} | PAX: {:1} | {:25} | V: {}",
                    entry.room, entry.kind, entry.check_in, entry.check_out, entry.pax, entry.name, entry.voucher
                )?,
                RoomStatus::NoData => writeln!(f, "  HAB {} - no recent data", audit.room)?,
                RoomStatus::SheetMissing => writeln!(f, "  HAB {} - sheet missing", audit.room)?,
                RoomStatus::Unclassified => writeln!(f, "  HAB {} - no floor for this room", audit.room)?,
            }
        }
        Ok(())
    }
}
