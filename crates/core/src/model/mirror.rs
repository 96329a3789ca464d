//! Per-section progress cached in the client-local key/value store.
//!
//! Two keys per section:
//! - `bizzy_section_{id}_complete` holding the string `"true"`
//! - `bizzy_section_{id}_progress` holding an integer 0–100

use crate::model::ids::SectionId;

const KEY_PREFIX: &str = "bizzy_section_";
const COMPLETE_FLAG: &str = "true";

#[must_use]
pub fn complete_key(section_id: SectionId) -> String {
    format!("{KEY_PREFIX}{section_id}_complete")
}

#[must_use]
pub fn progress_key(section_id: SectionId) -> String {
    format!("{KEY_PREFIX}{section_id}_progress")
}

/// Local mirror values for one section.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LocalMirrorEntry {
    pub percentage: Option<u8>,
    pub complete: bool,
}

impl LocalMirrorEntry {
    #[must_use]
    pub fn new(percentage: u8, complete: bool) -> Self {
        Self {
            percentage: Some(percentage.min(100)),
            complete,
        }
    }

    /// Parses the raw stored strings.
    ///
    /// Anything but `"true"` is an unset flag. Non-numeric or negative
    /// percentages are dropped; values above 100 clamp to 100.
    #[must_use]
    pub fn from_raw(progress: Option<&str>, complete: Option<&str>) -> Self {
        let percentage = progress
            .and_then(|raw| raw.trim().parse::<i64>().ok())
            .filter(|v| *v >= 0)
            .map(|v| u8::try_from(v.min(100)).unwrap_or(100));

        Self {
            percentage,
            complete: complete.is_some_and(|raw| raw.trim() == COMPLETE_FLAG),
        }
    }

    /// Raw `(progress, complete)` values to store. The complete value is `None`
    /// when the flag is unset and the key should be removed.
    #[must_use]
    pub fn to_raw(&self) -> (Option<String>, Option<String>) {
        (
            self.percentage.map(|p| p.to_string()),
            self.complete.then(|| COMPLETE_FLAG.to_owned()),
        )
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.percentage.is_none() && !self.complete
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn keys_use_section_id() {
        assert_eq!(complete_key(SectionId::new(3)), "bizzy_section_3_complete");
        assert_eq!(progress_key(SectionId::new(3)), "bizzy_section_3_progress");
    }

    #[test]
    fn from_raw_reads_flag_and_percentage() {
        let entry = LocalMirrorEntry::from_raw(Some("40"), Some("true"));
        assert_eq!(entry.percentage, Some(40));
        assert!(entry.complete);
    }

    #[test]
    fn from_raw_ignores_garbage() {
        let entry = LocalMirrorEntry::from_raw(Some("forty"), Some("yes"));
        assert!(entry.is_empty());

        let entry = LocalMirrorEntry::from_raw(Some("-5"), None);
        assert_eq!(entry.percentage, None);
    }

    #[test]
    fn from_raw_clamps_large_values() {
        let entry = LocalMirrorEntry::from_raw(Some("250"), None);
        assert_eq!(entry.percentage, Some(100));
    }

    #[test]
    fn to_raw_omits_unset_flag() {
        let (progress, complete) = LocalMirrorEntry::new(66, false).to_raw();
        assert_eq!(progress.as_deref(), Some("66"));
        assert_eq!(complete, None);
    }
}
