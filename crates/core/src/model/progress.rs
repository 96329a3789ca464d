use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::model::ids::{SectionId, StepId, UserId};

//
// ─── PROGRESS RECORD ──────────────────────────────────────────────────────────
//

/// A user's visitation/completion state for one step.
///
/// There is one logical record per `(user_id, section_id, step_id)`. Older
/// stores may hold several physical rows for the same key; see
/// [`latest_per_step`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressRecord {
    pub user_id: UserId,
    pub section_id: SectionId,
    pub step_id: StepId,
    pub completed: bool,
    pub section_completed: bool,
    pub last_visited_at: DateTime<Utc>,
}

impl ProgressRecord {
    /// Record written when a step is visited for the first time.
    #[must_use]
    pub fn visited(
        user_id: UserId,
        section_id: SectionId,
        step_id: StepId,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id,
            section_id,
            step_id,
            completed: true,
            section_completed: false,
            last_visited_at: at,
        }
    }

    #[must_use]
    pub fn with_section_completed(mut self, section_completed: bool) -> Self {
        self.section_completed = section_completed;
        self
    }
}

/// Collapses duplicate rows so each `(section_id, step_id)` keeps only the row
/// with the latest `last_visited_at`.
///
/// Output is ordered by `(section_id, step_id)`.
#[must_use]
pub fn latest_per_step(records: Vec<ProgressRecord>) -> Vec<ProgressRecord> {
    let mut latest: HashMap<(SectionId, StepId), ProgressRecord> = HashMap::new();
    for record in records {
        let key = (record.section_id, record.step_id);
        match latest.get(&key) {
            Some(existing) if existing.last_visited_at >= record.last_visited_at => {}
            _ => {
                latest.insert(key, record);
            }
        }
    }

    let mut out: Vec<ProgressRecord> = latest.into_values().collect();
    out.sort_by_key(|r| (r.section_id, r.step_id));
    out
}

//
// ─── SECTION PROGRESS ─────────────────────────────────────────────────────────
//

/// Visited-step percentage for a section, truncated toward zero.
///
/// A section without steps reports 0.
#[must_use]
pub fn section_percentage(visited: usize, total: usize) -> u8 {
    if total == 0 {
        return 0;
    }
    let visited = visited.min(total);
    // visited <= total, so the quotient is within 0..=100.
    u8::try_from(visited * 100 / total).unwrap_or(100)
}

/// Aggregated progress for one section, as shown on section cards.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SectionProgress {
    pub section_id: SectionId,
    pub visited: usize,
    pub total: usize,
    /// Display percentage after reconciliation with the local mirror.
    pub percentage: u8,
    pub completed: bool,
}
