//! Room classification: which floor partition, if any, serves a room token.

use crate::distribute::layout::FloorPartition;

/// Parses a room token as an integer, ignoring surrounding whitespace.
pub fn parse_room(token: &str) -> Option<i64> {
    token.trim().parse().ok()
}

/// Position of the first partition whose interval contains `room`.
pub fn partition_index(partitions: &[FloorPartition], room: i64) -> Option<usize> {
    partitions.iter().position(|partition| partition.contains(room))
}

/// First partition whose interval contains `room`.
pub fn classify_room(partitions: &[FloorPartition], room: i64) -> Option<&FloorPartition> {
    partition_index(partitions, room).map(|index| &partitions[index])
}

/// Classifies a raw room token. Tokens that are not integers, and rooms outside
/// every interval, are unclassified.
pub fn classify<'a>(partitions: &'a [FloorPartition], token: &str) -> Option<&'a FloorPartition> {
    parse_room(token).and_then(|room| classify_room(partitions, room))
}
