//! Intake deduplication: one record per room, grouped by floor.

use crate::distribute::classify::parse_room;
use crate::distribute::classify::partition_index;
use crate::distribute::layout::FloorPartition;
use crate::distribute::layout::Layout;
use std::collections::HashSet;

/// One reservation kept from the intake sheet.
#[derive(Clone, Debug, PartialEq)]
pub struct IntakeRecord {
    pub room: i64,
    /// 0-based row of the intake sheet the record was taken from
    pub row: usize,
    pub fields: Vec<String>,
}

impl IntakeRecord {
    pub fn field(&self, col: usize) -> Option<&str> {
        self.fields.get(col).map(String::as_str)
    }
}

/// Records of one floor, in intake order.
#[derive(Debug, PartialEq)]
pub struct FloorBatch<'a> {
    pub partition: &'a FloorPartition,
    pub records: Vec<IntakeRecord>,
}

/// Result of deduplicating the intake sheet.
#[derive(Debug, Default, PartialEq)]
pub struct Distribution<'a> {
    /// Non-empty batches, in partition order
    pub batches: Vec<FloorBatch<'a>>,
    /// Rows dropped because an earlier row had the same room
    pub duplicates: usize,
    /// Non-blank rows whose room is not a number or falls outside every partition
    pub unclassified: usize,
}

impl Distribution<'_> {
    pub fn records(&self) -> usize {
        self.batches.iter().map(|batch| batch.records.len()).sum()
    }
}

/// Groups intake rows by room, keeping the first row seen for each room.
///
/// The first row is skipped when its room column holds the header token.
/// Rows without cells, or with nothing but empty cells, are ignored.
pub fn deduplicate<'a>(layout: &'a Layout, rows: &[Vec<String>]) -> Distribution<'a> {
    let skip = rows
        .first()
        .and_then(|row| row.get(layout.room_column))
        .map(|text| text == layout.header_token())
        .unwrap_or(false) as usize;

    let mut seen = HashSet::new();
    let mut grouped: Vec<Vec<IntakeRecord>> = vec![Vec::new(); layout.partitions.len()];
    let mut distribution = Distribution::default();

    for (index, row) in rows.iter().enumerate().skip(skip) {
        if row.iter().all(|text| text.is_empty()) {
            continue;
        }
        let token = row.get(layout.room_column).map(String::as_str).unwrap_or_default();
        let classified = parse_room(token)
            .and_then(|room| partition_index(&layout.partitions, room).map(|partition| (room, partition)));
        let Some((room, partition)) = classified else {
            log::debug!("Intake row {}: room '{}' unclassified", index + 1, token);
            distribution.unclassified += 1;
            continue;
        };
        if !seen.insert(room) {
            log::debug!("Intake row {}: room {} already taken, skipped", index + 1, room);
            distribution.duplicates += 1;
            continue;
        }
        grouped[partition].push(IntakeRecord {
            room,
            row: index,
            fields: row.to_owned(),
        });
    }

    distribution.batches = layout
        .partitions
        .iter()
        .zip(grouped)
        .filter(|(_, records)| !records.is_empty())
        .map(|(partition, records)| FloorBatch { partition, records })
        .collect();
    distribution
}
