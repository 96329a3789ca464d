//! Display-only merge of database-derived progress and the local mirror.

use crate::model::LocalMirrorEntry;

/// Merges the database-derived percentage with the local mirror.
///
/// The mirror can only raise the value, never lower it. Either completion
/// flag, or a merged value at or above 100, yields exactly 100.
#[must_use]
pub fn merge_progress(
    database_percentage: u8,
    database_complete: bool,
    mirror: LocalMirrorEntry,
) -> u8 {
    let merged = database_percentage.max(mirror.percentage.unwrap_or(0));
    if database_complete || mirror.complete || merged >= 100 {
        100
    } else {
        merged
    }
}
