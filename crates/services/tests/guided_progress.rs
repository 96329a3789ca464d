use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::Duration;
use guide_core::model::{ProgressRecord, Section, SectionId, Step, StepId, UserId};
use guide_core::navigation::{GuideCursor, Move};
use guide_core::time::fixed_now;
use services::{Clock, GuidanceError, GuidanceService};
use storage::catalog::seed_default_catalog;
use storage::repository::{
    GuidanceRepository, InMemoryRepository, LocalStore, ProgressRepository, StorageError,
};

/// Progress repository that counts writes and can be told to fail them.
#[derive(Default)]
struct CountingProgress {
    inner: InMemoryRepository,
    upserts: AtomicUsize,
    section_updates: AtomicUsize,
    fail_writes: AtomicBool,
}

impl CountingProgress {
    fn new(inner: InMemoryRepository) -> Self {
        Self {
            inner,
            ..Self::default()
        }
    }

    fn upserts(&self) -> usize {
        self.upserts.load(Ordering::SeqCst)
    }

    fn section_updates(&self) -> usize {
        self.section_updates.load(Ordering::SeqCst)
    }

    fn check_writable(&self) -> Result<(), StorageError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Connection("database unavailable".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl ProgressRepository for CountingProgress {
    async fn upsert_progress(&self, record: &ProgressRecord) -> Result<(), StorageError> {
        self.upserts.fetch_add(1, Ordering::SeqCst);
        self.check_writable()?;
        self.inner.upsert_progress(record).await
    }

    async fn progress_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<ProgressRecord>, StorageError> {
        self.inner.progress_for_user(user_id).await
    }

    async fn progress_for_section(
        &self,
        user_id: UserId,
        section_id: SectionId,
    ) -> Result<Vec<ProgressRecord>, StorageError> {
        self.inner.progress_for_section(user_id, section_id).await
    }

    async fn set_section_completed(
        &self,
        user_id: UserId,
        section_id: SectionId,
        completed: bool,
    ) -> Result<u64, StorageError> {
        self.section_updates.fetch_add(1, Ordering::SeqCst);
        self.check_writable()?;
        self.inner
            .set_section_completed(user_id, section_id, completed)
            .await
    }
}

/// Seeds sections `1..` with the given step counts. Step ids are
/// `section * 100 + order`.
async fn guide(repo: &InMemoryRepository, step_counts: &[u32]) {
    for (id, count) in (1_u64..).zip(step_counts) {
        let order = u32::try_from(id).unwrap();
        let section = Section::new(
            SectionId::new(id),
            order,
            format!("Section {id}"),
            None,
            30,
            None,
        )
        .unwrap();
        repo.upsert_section(&section).await.unwrap();
        for step in 1..=*count {
            let step = Step::new(
                StepId::new(id * 100 + u64::from(step)),
                SectionId::new(id),
                step,
                format!("Step {id}.{step}"),
                "",
            )
            .unwrap();
            repo.upsert_step(&step).await.unwrap();
        }
    }
}

fn service_with(
    repo: &InMemoryRepository,
    progress: Arc<CountingProgress>,
    clock: Clock,
) -> GuidanceService {
    GuidanceService::new(
        clock,
        Arc::new(repo.clone()),
        progress,
        Arc::new(repo.clone()),
    )
}

fn service(repo: &InMemoryRepository) -> (GuidanceService, Arc<CountingProgress>) {
    let progress = Arc::new(CountingProgress::new(repo.clone()));
    let service = service_with(repo, Arc::clone(&progress), Clock::fixed(fixed_now()));
    (service, progress)
}

#[tokio::test]
async fn visiting_every_step_completes_the_section() {
    let repo = InMemoryRepository::new();
    guide(&repo, &[3, 2]).await;
    let (service, _) = service(&repo);
    let user = UserId::random();
    let section = SectionId::new(1);

    let mut session = service.start(Some(user)).await.unwrap();
    service.next(&mut session).await.unwrap();

    let progress = service.section_progress(&mut session, section).await.unwrap();
    assert_eq!(progress.percentage, 66);
    assert!(!progress.completed);
    assert!(!session.is_section_completed(section));

    service.next(&mut session).await.unwrap();

    let progress = service.section_progress(&mut session, section).await.unwrap();
    assert_eq!(progress.percentage, 100);
    assert!(progress.completed);

    let rows = repo.progress_for_section(user, section).await.unwrap();
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|r| r.completed && r.section_completed));
}

#[tokio::test]
async fn completion_check_on_completed_section_writes_nothing() {
    let repo = InMemoryRepository::new();
    guide(&repo, &[2, 2]).await;
    let (service, progress) = service(&repo);
    let section = SectionId::new(1);

    let mut session = service.start(Some(UserId::random())).await.unwrap();
    service.next(&mut session).await.unwrap();
    assert!(session.is_section_completed(section));
    assert_eq!(progress.section_updates(), 1);
    let upserts = progress.upserts();

    let completed = service
        .check_section_completion(&mut session, section)
        .await
        .unwrap();
    assert!(!completed);
    assert_eq!(progress.section_updates(), 1);
    assert_eq!(progress.upserts(), upserts);

    // Leaving the section runs the check again; only the visit to 2.1 is written.
    service.next(&mut session).await.unwrap();
    assert_eq!(progress.section_updates(), 1);
    assert_eq!(progress.upserts(), upserts + 1);
}

#[tokio::test]
async fn display_percentage_never_decreases_while_visiting() {
    let repo = InMemoryRepository::new();
    guide(&repo, &[4]).await;
    repo.set_item("bizzy_section_1_progress", "50").await.unwrap();
    let (service, _) = service(&repo);
    let section = SectionId::new(1);

    let mut session = service.start(Some(UserId::random())).await.unwrap();
    let mut seen = vec![
        service
            .section_progress(&mut session, section)
            .await
            .unwrap()
            .percentage,
    ];
    while !session.is_at_end() {
        service.next(&mut session).await.unwrap();
        seen.push(
            service
                .section_progress(&mut session, section)
                .await
                .unwrap()
                .percentage,
        );
    }

    assert_eq!(seen, vec![50, 50, 75, 100]);
    assert!(seen.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(
        repo.get_item("bizzy_section_1_complete").await.unwrap().as_deref(),
        Some("true")
    );
}

#[tokio::test]
async fn mirror_completion_flag_shows_full_progress() {
    let repo = InMemoryRepository::new();
    guide(&repo, &[1, 1, 4]).await;
    repo.set_item("bizzy_section_3_complete", "true").await.unwrap();
    let (service, _) = service(&repo);
    let section = SectionId::new(3);

    let mut session = service.start(Some(UserId::random())).await.unwrap();
    service.go_to(&mut session, 3, 1).await.unwrap();

    let progress = service.section_progress(&mut session, section).await.unwrap();
    assert_eq!((progress.visited, progress.total), (1, 4));
    assert!(!progress.completed);
    assert_eq!(progress.percentage, 100);
}

#[tokio::test]
async fn navigation_is_a_no_op_at_both_ends() {
    let repo = InMemoryRepository::new();
    guide(&repo, &[2, 1]).await;
    let (service, progress) = service(&repo);

    let mut session = service.start(Some(UserId::random())).await.unwrap();
    assert!(session.is_at_start());
    assert_eq!(service.prev(&mut session).await.unwrap(), Move::Stay);
    assert_eq!(session.cursor(), GuideCursor::start());

    service.go_to(&mut session, 2, 1).await.unwrap();
    assert!(session.is_at_end());
    let upserts = progress.upserts();
    assert_eq!(service.next(&mut session).await.unwrap(), Move::Stay);
    assert_eq!(session.cursor(), GuideCursor::at(2, 1));
    assert_eq!(progress.upserts(), upserts);
}

#[tokio::test]
async fn toggle_off_keeps_rows_written_by_toggle_on() {
    let repo = InMemoryRepository::new();
    guide(&repo, &[3]).await;
    let (service, _) = service(&repo);
    let user = UserId::random();
    let section = SectionId::new(1);

    let mut session = service.start(Some(user)).await.unwrap();
    service
        .toggle_section(&mut session, section, true)
        .await
        .unwrap();

    let rows = repo.progress_for_section(user, section).await.unwrap();
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|r| r.completed && r.section_completed));

    service
        .toggle_section(&mut session, section, false)
        .await
        .unwrap();

    // Toggling off does not undo the step rows created by toggling on.
    let rows = repo.progress_for_section(user, section).await.unwrap();
    assert_eq!(rows.len(), 3);
    assert!(rows.iter().all(|r| r.completed && !r.section_completed));
    assert!(!session.is_section_completed(section));
    assert!(session.is_visited(StepId::new(103)));
    assert_eq!(
        repo.get_item("bizzy_section_1_complete").await.unwrap(),
        None
    );
}

#[tokio::test]
async fn toggle_rejects_unknown_section() {
    let repo = InMemoryRepository::new();
    guide(&repo, &[1]).await;
    let (service, _) = service(&repo);

    let mut session = service.start(None).await.unwrap();
    let err = service
        .toggle_section(&mut session, SectionId::new(9), true)
        .await
        .unwrap_err();
    assert!(matches!(err, GuidanceError::UnknownSection(id) if id == SectionId::new(9)));
}

#[tokio::test]
async fn anonymous_session_tracks_progress_in_memory_only() {
    let repo = InMemoryRepository::new();
    guide(&repo, &[2]).await;
    let (service, progress) = service(&repo);

    let mut session = service.start(None).await.unwrap();
    service.next(&mut session).await.unwrap();

    assert!(session.is_section_completed(SectionId::new(1)));
    assert_eq!(session.visited_count(), 2);
    assert_eq!(progress.upserts(), 0);
    assert_eq!(progress.section_updates(), 0);
}

#[tokio::test]
async fn failed_writes_do_not_stop_the_walk() {
    let repo = InMemoryRepository::new();
    guide(&repo, &[2, 1]).await;
    let (service, progress) = service(&repo);
    progress.fail_writes.store(true, Ordering::SeqCst);
    let user = UserId::random();

    let mut session = service.start(Some(user)).await.unwrap();
    service.next(&mut session).await.unwrap();
    service.next(&mut session).await.unwrap();

    assert_eq!(session.cursor(), GuideCursor::at(2, 1));
    assert!(session.is_section_completed(SectionId::new(1)));
    assert!(repo.progress_for_user(user).await.unwrap().is_empty());

    let outcome = service.visit_current(&mut session).await.unwrap().unwrap();
    assert_eq!(outcome.step_id, StepId::new(201));
    assert!(!outcome.newly_visited);
    assert!(!outcome.persisted);
}

#[tokio::test]
async fn prev_into_unloaded_section_lands_on_its_last_step() {
    let repo = InMemoryRepository::new();
    guide(&repo, &[2, 3, 1]).await;
    let (service, _) = service(&repo);

    let mut session = service.start(None).await.unwrap();
    service.go_to(&mut session, 3, 1).await.unwrap();
    assert!(session.loaded_steps(SectionId::new(2)).is_none());

    let moved = service.prev(&mut session).await.unwrap();
    assert_eq!(
        moved,
        Move::CrossSection {
            left: 3,
            to: GuideCursor::at(2, 3),
        }
    );
    assert_eq!(session.current_step().map(Step::id), Some(StepId::new(203)));
    assert!(session.is_visited(StepId::new(203)));
}

#[tokio::test]
async fn skip_section_leaves_section_incomplete() {
    let repo = InMemoryRepository::new();
    guide(&repo, &[2, 2]).await;
    let (service, progress) = service(&repo);

    let mut session = service.start(Some(UserId::random())).await.unwrap();
    let moved = service.skip_section(&mut session).await.unwrap();

    assert_eq!(moved.target(), Some(GuideCursor::at(2, 1)));
    assert!(!session.is_section_completed(SectionId::new(1)));
    assert!(!session.is_visited(StepId::new(102)));
    assert!(session.is_visited(StepId::new(201)));
    assert_eq!(progress.section_updates(), 0);
}

#[tokio::test]
async fn start_restores_stored_progress() {
    let repo = InMemoryRepository::new();
    guide(&repo, &[3, 1]).await;
    let user = UserId::random();
    let earlier = fixed_now() - Duration::days(2);
    repo.upsert_progress(&ProgressRecord::visited(
        user,
        SectionId::new(1),
        StepId::new(102),
        earlier,
    ))
    .await
    .unwrap();
    repo.upsert_progress(
        &ProgressRecord::visited(user, SectionId::new(2), StepId::new(201), earlier)
            .with_section_completed(true),
    )
    .await
    .unwrap();
    let (service, _) = service(&repo);

    let session = service.start(Some(user)).await.unwrap();

    assert!(session.is_visited(StepId::new(101)));
    assert!(session.is_visited(StepId::new(102)));
    assert!(!session.is_visited(StepId::new(103)));
    assert!(session.is_section_completed(SectionId::new(2)));
    assert!(!session.is_section_completed(SectionId::new(1)));
}

#[tokio::test]
async fn load_restores_progress_without_visiting() {
    let repo = InMemoryRepository::new();
    guide(&repo, &[3, 1]).await;
    let (service, progress) = service(&repo);
    let user = UserId::random();

    let mut session = service.load(Some(user)).await.unwrap();
    assert_eq!(session.cursor(), GuideCursor::start());
    assert_eq!(session.visited_count(), 0);

    let overview = service.overview(&mut session).await.unwrap();
    assert!(overview.iter().all(|p| p.visited == 0 && p.percentage == 0));
    assert_eq!(progress.upserts(), 0);
    assert_eq!(progress.section_updates(), 0);
    assert!(repo.progress_for_user(user).await.unwrap().is_empty());
    assert_eq!(repo.get_item("bizzy_section_1_progress").await.unwrap(), None);
}

#[tokio::test]
async fn revisit_bumps_timestamp() {
    let repo = InMemoryRepository::new();
    guide(&repo, &[2]).await;
    let user = UserId::random();
    let later = fixed_now() + Duration::hours(3);

    let (first, _) = service(&repo);
    first.start(Some(user)).await.unwrap();

    let second = service_with(
        &repo,
        Arc::new(CountingProgress::new(repo.clone())),
        Clock::fixed(later),
    );
    let mut session = second.start(Some(user)).await.unwrap();
    let outcome = second.visit_current(&mut session).await.unwrap().unwrap();
    assert!(!outcome.newly_visited);
    assert!(outcome.persisted);

    let rows = repo.progress_for_user(user).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].last_visited_at, later);
}

#[tokio::test]
async fn go_to_rejects_positions_outside_the_guide() {
    let repo = InMemoryRepository::new();
    guide(&repo, &[2, 0]).await;
    let (service, _) = service(&repo);

    let mut session = service.start(None).await.unwrap();
    for (section, step) in [(0, 1), (3, 1), (1, 0), (1, 3), (2, 2)] {
        let err = service.go_to(&mut session, section, step).await.unwrap_err();
        assert!(matches!(err, GuidanceError::InvalidPosition { .. }));
    }

    // A section without steps can still be entered, but never auto-completes.
    service.go_to(&mut session, 2, 1).await.unwrap();
    assert!(session.current_step().is_none());
    assert!(
        !service
            .check_section_completion(&mut session, SectionId::new(2))
            .await
            .unwrap()
    );
}

#[tokio::test]
async fn start_without_sections_fails() {
    let repo = InMemoryRepository::new();
    let (service, _) = service(&repo);

    let err = service.start(None).await.unwrap_err();
    assert!(matches!(err, GuidanceError::NoSections));
}

#[tokio::test]
async fn default_catalog_reports_quick_wins_and_overall_progress() {
    let repo = InMemoryRepository::new();
    seed_default_catalog(&repo).await.unwrap();
    let (service, _) = service(&repo);

    let mut session = service.start(None).await.unwrap();
    assert_eq!(service.overall_percentage(&mut session).await.unwrap(), 8);

    let wins: Vec<StepId> = service
        .quick_wins(&mut session, 3)
        .await
        .unwrap()
        .iter()
        .map(Step::id)
        .collect();
    assert_eq!(
        wins,
        vec![StepId::new(102), StepId::new(202), StepId::new(301)]
    );

    service.go_to(&mut session, 1, 2).await.unwrap();
    let wins = service.quick_wins(&mut session, 10).await.unwrap();
    assert_eq!(wins.len(), 3);
    assert!(wins.iter().all(|s| s.id() != StepId::new(102)));

    let overview = service.overview(&mut session).await.unwrap();
    assert_eq!(overview.len(), 4);
    assert_eq!(overview[0].visited, 2);
}
