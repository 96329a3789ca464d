use std::sync::Arc;

use guide_core::model::{
    ProgressRecord, SectionId, SectionProgress, Step, StepId, UserId, latest_per_step,
    section_percentage,
};
use guide_core::navigation::{GuideCursor, Move};
use guide_core::reconcile::merge_progress;
use storage::repository::{GuidanceRepository, LocalStore, ProgressRepository, Storage};
use tracing::{debug, warn};

use super::mirror::LocalMirror;
use super::session::GuideSession;
use crate::Clock;
use crate::error::GuidanceError;

/// What happened when the step under the cursor was visited.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisitOutcome {
    pub step_id: StepId,
    /// False on revisits.
    pub newly_visited: bool,
    /// True only if a progress row was written successfully.
    pub persisted: bool,
    /// True if this visit completed the section.
    pub completed_section: bool,
}

/// Drives a `GuideSession`: navigation, visit tracking, section completion and
/// progress display.
///
/// Reads propagate errors. Writes (progress rows and the local mirror) are
/// best-effort: a failure is logged and the in-memory state still advances.
#[derive(Clone)]
pub struct GuidanceService {
    clock: Clock,
    guidance: Arc<dyn GuidanceRepository>,
    progress: Arc<dyn ProgressRepository>,
    mirror: LocalMirror,
}

fn to_u32(len: usize) -> u32 {
    u32::try_from(len).unwrap_or(u32::MAX)
}

impl GuidanceService {
    #[must_use]
    pub fn new(
        clock: Clock,
        guidance: Arc<dyn GuidanceRepository>,
        progress: Arc<dyn ProgressRepository>,
        local: Arc<dyn LocalStore>,
    ) -> Self {
        Self {
            clock,
            guidance,
            progress,
            mirror: LocalMirror::new(local),
        }
    }

    #[must_use]
    pub fn from_storage(clock: Clock, storage: &Storage) -> Self {
        Self::new(
            clock,
            Arc::clone(&storage.guidance),
            Arc::clone(&storage.progress),
            Arc::clone(&storage.local),
        )
    }

    //
    // ─── SESSION START ────────────────────────────────────────────────────────
    //

    /// Load the guide for a user (or anonymously) and visit the first step.
    ///
    /// # Errors
    ///
    /// Returns `GuidanceError::NoSections` if the catalog is empty, or
    /// `GuidanceError::Storage` if the catalog cannot be read.
    pub async fn start(&self, user: Option<UserId>) -> Result<GuideSession, GuidanceError> {
        let mut session = self.load(user).await?;
        self.visit_current(&mut session).await?;
        Ok(session)
    }

    /// Build a session at `(1, 1)` with stored progress restored, without
    /// visiting any step. Nothing is written.
    ///
    /// Stored progress is deduplicated per step (latest row wins). A failure to
    /// read stored progress is logged and the session starts empty.
    ///
    /// # Errors
    ///
    /// Returns `GuidanceError::NoSections` if the catalog is empty, or
    /// `GuidanceError::Storage` if the catalog cannot be read.
    pub async fn load(&self, user: Option<UserId>) -> Result<GuideSession, GuidanceError> {
        let sections = self.guidance.list_sections().await?;
        if sections.is_empty() {
            return Err(GuidanceError::NoSections);
        }

        let mut session = GuideSession::new(user, sections);
        if let Some(user_id) = user {
            match self.progress.progress_for_user(user_id).await {
                Ok(rows) => {
                    for row in latest_per_step(rows) {
                        if row.completed {
                            session.visited.insert(row.step_id);
                        }
                        if row.section_completed {
                            session.completed.insert(row.section_id);
                        }
                    }
                }
                Err(err) => {
                    warn!(user = %user_id, error = %err, "failed to load stored progress");
                }
            }
        }

        Ok(session)
    }

    //
    // ─── VISITS AND COMPLETION ────────────────────────────────────────────────
    //

    /// Record a visit to the step under the cursor.
    ///
    /// A first visit adds the step to the visited set; for authenticated users it
    /// also upserts a progress row (`completed = true`). Revisits only bump the
    /// row's timestamp. Afterwards the local mirror is refreshed and the section
    /// is checked for auto-completion.
    ///
    /// Returns `None` when the current section has no steps.
    ///
    /// # Errors
    ///
    /// Returns `GuidanceError` if the section's steps cannot be read.
    pub async fn visit_current(
        &self,
        session: &mut GuideSession,
    ) -> Result<Option<VisitOutcome>, GuidanceError> {
        let section_id = self.current_section_id(session)?;
        self.load_steps(session, section_id).await?;
        let Some(step_id) = session.current_step().map(Step::id) else {
            return Ok(None);
        };

        let newly_visited = session.visited.insert(step_id);
        let persisted = match session.user {
            Some(user_id) => {
                let record = ProgressRecord::visited(user_id, section_id, step_id, self.clock.now())
                    .with_section_completed(session.completed.contains(&section_id));
                self.write_progress(&record).await
            }
            None => false,
        };
        debug!(step = %step_id, cursor = %session.cursor, newly_visited, persisted, "visited step");

        let mut completed_section = false;
        if newly_visited {
            self.refresh_mirror(session, section_id).await;
            completed_section = self.check_section_completion(session, section_id).await?;
        }

        Ok(Some(VisitOutcome {
            step_id,
            newly_visited,
            persisted,
            completed_section,
        }))
    }

    /// Mark the section completed if every one of its steps has been visited.
    ///
    /// Sets `section_completed` on the user's existing rows for the section (no
    /// rows are created). A section already in the completed set is left alone,
    /// and a section without steps is never completed here.
    ///
    /// Returns `true` if this call completed the section.
    ///
    /// # Errors
    ///
    /// Returns `GuidanceError` if the section's steps cannot be read.
    pub async fn check_section_completion(
        &self,
        session: &mut GuideSession,
        section_id: SectionId,
    ) -> Result<bool, GuidanceError> {
        if session.completed.contains(&section_id) {
            return Ok(false);
        }
        self.load_steps(session, section_id).await?;
        let Some((visited, total)) = session.visited_in(section_id) else {
            return Ok(false);
        };
        if total == 0 || visited < total {
            return Ok(false);
        }

        if let Some(user_id) = session.user {
            match self
                .progress
                .set_section_completed(user_id, section_id, true)
                .await
            {
                Ok(rows) => debug!(section = %section_id, rows, "section auto-completed"),
                Err(err) => {
                    warn!(section = %section_id, error = %err, "failed to persist section completion");
                }
            }
        }
        session.completed.insert(section_id);
        self.mirror.record(section_id, 100, Some(true)).await;
        Ok(true)
    }

    /// Manually mark a section complete or incomplete.
    ///
    /// Marking complete writes `completed = true, section_completed = true` for
    /// every step, inserting rows for steps never visited, and treats those steps
    /// as visited. Marking incomplete only clears `section_completed` on existing
    /// rows: step rows stay `completed = true` and the visited set is unchanged.
    ///
    /// # Errors
    ///
    /// Returns `GuidanceError::UnknownSection` for a section outside the guide,
    /// or `GuidanceError::Storage` if its steps cannot be read.
    pub async fn toggle_section(
        &self,
        session: &mut GuideSession,
        section_id: SectionId,
        completed: bool,
    ) -> Result<(), GuidanceError> {
        if session.section(section_id).is_none() {
            return Err(GuidanceError::UnknownSection(section_id));
        }
        self.load_steps(session, section_id).await?;
        let step_ids: Vec<StepId> = session
            .loaded_steps(section_id)
            .unwrap_or_default()
            .iter()
            .map(Step::id)
            .collect();

        if completed {
            let now = self.clock.now();
            for step_id in &step_ids {
                if let Some(user_id) = session.user {
                    let record = ProgressRecord::visited(user_id, section_id, *step_id, now)
                        .with_section_completed(true);
                    self.write_progress(&record).await;
                }
                session.visited.insert(*step_id);
            }
            session.completed.insert(section_id);
            self.mirror.record(section_id, 100, Some(true)).await;
        } else {
            if let Some(user_id) = session.user {
                if let Err(err) = self
                    .progress
                    .set_section_completed(user_id, section_id, false)
                    .await
                {
                    warn!(section = %section_id, error = %err, "failed to persist section reset");
                }
            }
            session.completed.remove(&section_id);
            let percentage = self.derived_percentage(session, section_id);
            self.mirror.record(section_id, percentage, Some(false)).await;
        }

        debug!(section = %section_id, completed, steps = step_ids.len(), "section toggled");
        Ok(())
    }

    //
    // ─── NAVIGATION ───────────────────────────────────────────────────────────
    //

    /// Move to the next step, crossing into the next section after the last step.
    ///
    /// Leaving a section runs the completion check on it. No-op at the end of
    /// the guide.
    ///
    /// # Errors
    ///
    /// Returns `GuidanceError` if steps cannot be read.
    pub async fn next(&self, session: &mut GuideSession) -> Result<Move, GuidanceError> {
        let section_id = self.current_section_id(session)?;
        self.load_steps(session, section_id).await?;
        let section_len = to_u32(session.loaded_steps(section_id).map_or(0, <[Step]>::len));

        let moved = session.cursor.next(section_len, session.section_count());
        if let Move::CrossSection { left, .. } = moved {
            if let Some(left_id) = session.section_at(left).map(|s| s.id()) {
                self.check_section_completion(session, left_id).await?;
            }
        }
        self.apply(session, moved).await?;
        Ok(moved)
    }

    /// Move to the previous step. From a section's first step this lands on the
    /// last step of the previous section, whose steps are fetched first if needed.
    /// No-op at `(1, 1)`.
    ///
    /// # Errors
    ///
    /// Returns `GuidanceError` if steps cannot be read.
    pub async fn prev(&self, session: &mut GuideSession) -> Result<Move, GuidanceError> {
        let cursor = session.cursor;
        let mut previous_len = 0;
        if cursor.step() == 1 && cursor.section() > 1 {
            if let Some(previous_id) = session.section_at(cursor.section() - 1).map(|s| s.id()) {
                self.load_steps(session, previous_id).await?;
                previous_len = to_u32(session.loaded_steps(previous_id).map_or(0, <[Step]>::len));
            }
        }

        let moved = cursor.prev(previous_len);
        self.apply(session, moved).await?;
        Ok(moved)
    }

    /// Jump to the first step of the next section without completing the current one.
    ///
    /// # Errors
    ///
    /// Returns `GuidanceError` if steps cannot be read.
    pub async fn skip_section(&self, session: &mut GuideSession) -> Result<Move, GuidanceError> {
        let moved = session.cursor.skip_section(session.section_count());
        self.apply(session, moved).await?;
        Ok(moved)
    }

    /// Jump to a 1-based `(section, step)` position and visit it.
    ///
    /// Step 1 is accepted for a section without steps.
    ///
    /// # Errors
    ///
    /// Returns `GuidanceError::InvalidPosition` for a position outside the guide.
    pub async fn go_to(
        &self,
        session: &mut GuideSession,
        section: u32,
        step: u32,
    ) -> Result<(), GuidanceError> {
        let invalid = GuidanceError::InvalidPosition { section, step };
        let Some(section_id) = session.section_at(section).map(|s| s.id()) else {
            return Err(invalid);
        };
        self.load_steps(session, section_id).await?;
        let len = to_u32(session.loaded_steps(section_id).map_or(0, <[Step]>::len));
        if step == 0 || step > len.max(1) {
            return Err(invalid);
        }

        session.cursor = GuideCursor::at(section, step);
        self.visit_current(session).await?;
        Ok(())
    }

    //
    // ─── PROGRESS ─────────────────────────────────────────────────────────────
    //

    /// Display progress for a section: the visited-step percentage merged with
    /// the local mirror.
    ///
    /// # Errors
    ///
    /// Returns `GuidanceError::UnknownSection` for a section outside the guide,
    /// or `GuidanceError::Storage` if its steps cannot be read.
    pub async fn section_progress(
        &self,
        session: &mut GuideSession,
        section_id: SectionId,
    ) -> Result<SectionProgress, GuidanceError> {
        if session.section(section_id).is_none() {
            return Err(GuidanceError::UnknownSection(section_id));
        }
        self.load_steps(session, section_id).await?;
        let (visited, total) = session.visited_in(section_id).unwrap_or((0, 0));
        let completed = session.completed.contains(&section_id);
        let mirror = self.mirror.read(section_id).await;

        Ok(SectionProgress {
            section_id,
            visited,
            total,
            percentage: merge_progress(section_percentage(visited, total), completed, mirror),
            completed,
        })
    }

    /// Progress for every section, in guide order.
    ///
    /// # Errors
    ///
    /// Returns `GuidanceError` if steps cannot be read.
    pub async fn overview(
        &self,
        session: &mut GuideSession,
    ) -> Result<Vec<SectionProgress>, GuidanceError> {
        let ids: Vec<SectionId> = session.sections.iter().map(|s| s.id()).collect();
        let mut out = Vec::with_capacity(ids.len());
        for section_id in ids {
            out.push(self.section_progress(session, section_id).await?);
        }
        Ok(out)
    }

    /// Visited steps across the whole guide as a percentage of all steps.
    ///
    /// # Errors
    ///
    /// Returns `GuidanceError` if steps cannot be read.
    pub async fn overall_percentage(&self, session: &mut GuideSession) -> Result<u8, GuidanceError> {
        let ids: Vec<SectionId> = session.sections.iter().map(|s| s.id()).collect();
        let (mut visited, mut total) = (0, 0);
        for section_id in ids {
            self.load_steps(session, section_id).await?;
            let (v, t) = session.visited_in(section_id).unwrap_or((0, 0));
            visited += v;
            total += t;
        }
        Ok(section_percentage(visited, total))
    }

    /// Unvisited quick-win steps in guide order, at most `limit`.
    ///
    /// # Errors
    ///
    /// Returns `GuidanceError` if steps cannot be read.
    pub async fn quick_wins(
        &self,
        session: &mut GuideSession,
        limit: usize,
    ) -> Result<Vec<Step>, GuidanceError> {
        let ids: Vec<SectionId> = session.sections.iter().map(|s| s.id()).collect();
        let mut out = Vec::new();
        for section_id in ids {
            if out.len() >= limit {
                break;
            }
            self.load_steps(session, section_id).await?;
            let candidates = session
                .loaded_steps(section_id)
                .unwrap_or_default()
                .iter()
                .filter(|s| s.is_quick_win() && !session.is_visited(s.id()))
                .take(limit - out.len())
                .cloned()
                .collect::<Vec<_>>();
            out.extend(candidates);
        }
        Ok(out)
    }

    //
    // ─── HELPERS ──────────────────────────────────────────────────────────────
    //

    async fn apply(&self, session: &mut GuideSession, moved: Move) -> Result<(), GuidanceError> {
        if let Some(to) = moved.target() {
            debug!(from = %session.cursor, to = %to, "cursor moved");
            session.cursor = to;
            self.visit_current(session).await?;
        }
        Ok(())
    }

    fn current_section_id(&self, session: &GuideSession) -> Result<SectionId, GuidanceError> {
        session
            .current_section()
            .map(|s| s.id())
            .ok_or(GuidanceError::InvalidPosition {
                section: session.cursor.section(),
                step: session.cursor.step(),
            })
    }

    async fn load_steps(
        &self,
        session: &mut GuideSession,
        section_id: SectionId,
    ) -> Result<(), GuidanceError> {
        if !session.steps.contains_key(&section_id) {
            let steps = self.guidance.steps_for_section(section_id).await?;
            session.steps.insert(section_id, steps);
        }
        Ok(())
    }

    async fn write_progress(&self, record: &ProgressRecord) -> bool {
        match self.progress.upsert_progress(record).await {
            Ok(()) => true,
            Err(err) => {
                warn!(
                    section = %record.section_id,
                    step = %record.step_id,
                    error = %err,
                    "failed to persist step progress"
                );
                false
            }
        }
    }

    async fn refresh_mirror(&self, session: &GuideSession, section_id: SectionId) {
        let percentage = self.derived_percentage(session, section_id);
        self.mirror.record(section_id, percentage, None).await;
    }

    fn derived_percentage(&self, session: &GuideSession, section_id: SectionId) -> u8 {
        let (visited, total) = session.visited_in(section_id).unwrap_or((0, 0));
        section_percentage(visited, total)
    }
}
