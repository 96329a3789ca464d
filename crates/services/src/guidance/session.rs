use std::collections::{HashMap, HashSet};

use guide_core::model::{Section, SectionId, Step, StepId, UserId};
use guide_core::navigation::GuideCursor;

/// In-memory state of one user's walk through the guide.
///
/// Holds the ordered sections, a cache of step lists fetched so far, the
/// cursor, and the visited/completed sets. `GuidanceService` owns every
/// transition; this type only answers questions about the current state.
#[derive(Debug, Clone)]
pub struct GuideSession {
    pub(super) user: Option<UserId>,
    pub(super) sections: Vec<Section>,
    pub(super) steps: HashMap<SectionId, Vec<Step>>,
    pub(super) cursor: GuideCursor,
    pub(super) visited: HashSet<StepId>,
    pub(super) completed: HashSet<SectionId>,
}

impl GuideSession {
    pub(super) fn new(user: Option<UserId>, sections: Vec<Section>) -> Self {
        Self {
            user,
            sections,
            steps: HashMap::new(),
            cursor: GuideCursor::start(),
            visited: HashSet::new(),
            completed: HashSet::new(),
        }
    }

    /// `None` for anonymous sessions, which are never persisted.
    #[must_use]
    pub fn user(&self) -> Option<UserId> {
        self.user
    }

    #[must_use]
    pub fn cursor(&self) -> GuideCursor {
        self.cursor
    }

    #[must_use]
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    #[must_use]
    pub fn section_count(&self) -> u32 {
        u32::try_from(self.sections.len()).unwrap_or(u32::MAX)
    }

    /// Section at a 1-based position.
    #[must_use]
    pub fn section_at(&self, position: u32) -> Option<&Section> {
        let index = usize::try_from(position.checked_sub(1)?).ok()?;
        self.sections.get(index)
    }

    #[must_use]
    pub fn section(&self, section_id: SectionId) -> Option<&Section> {
        self.sections.iter().find(|s| s.id() == section_id)
    }

    #[must_use]
    pub fn current_section(&self) -> Option<&Section> {
        self.sections.get(self.cursor.section_index())
    }

    /// The step under the cursor, if its section's steps are loaded and non-empty.
    #[must_use]
    pub fn current_step(&self) -> Option<&Step> {
        let section = self.current_section()?;
        self.steps
            .get(&section.id())?
            .get(self.cursor.step_index())
    }

    /// Cached steps of a section, or `None` if they were never fetched.
    #[must_use]
    pub fn loaded_steps(&self, section_id: SectionId) -> Option<&[Step]> {
        self.steps.get(&section_id).map(Vec::as_slice)
    }

    #[must_use]
    pub fn is_visited(&self, step_id: StepId) -> bool {
        self.visited.contains(&step_id)
    }

    #[must_use]
    pub fn visited_count(&self) -> usize {
        self.visited.len()
    }

    #[must_use]
    pub fn is_section_completed(&self, section_id: SectionId) -> bool {
        self.completed.contains(&section_id)
    }

    /// Whether "next" should be disabled. Requires the current section's steps
    /// to be loaded, which is always the case after a visit.
    #[must_use]
    pub fn is_at_end(&self) -> bool {
        let len = self
            .current_section()
            .and_then(|s| self.loaded_steps(s.id()))
            .map_or(0, <[Step]>::len);
        self.cursor
            .is_last(u32::try_from(len).unwrap_or(u32::MAX), self.section_count())
    }

    #[must_use]
    pub fn is_at_start(&self) -> bool {
        self.cursor.is_first()
    }

    pub(super) fn visited_in(&self, section_id: SectionId) -> Option<(usize, usize)> {
        let steps = self.steps.get(&section_id)?;
        let visited = steps.iter().filter(|s| self.visited.contains(&s.id())).count();
        Some((visited, steps.len()))
    }
}
