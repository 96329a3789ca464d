use async_trait::async_trait;
use guide_core::model::{ProgressRecord, Section, SectionId, Step, StepId, UserId};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

/// Read/write access to the seeded section and step catalog.
#[async_trait]
pub trait GuidanceRepository: Send + Sync {
    /// Persist or update a section.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the section cannot be stored.
    async fn upsert_section(&self, section: &Section) -> Result<(), StorageError>;

    /// Persist or update a step. The owning section must already exist.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the section is missing, or other storage errors.
    async fn upsert_step(&self, step: &Step) -> Result<(), StorageError>;

    /// All sections ordered by `order_number`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn list_sections(&self) -> Result<Vec<Section>, StorageError>;

    /// Steps of a section ordered by `order_number`. Unknown sections yield an empty list.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn steps_for_section(&self, section_id: SectionId) -> Result<Vec<Step>, StorageError>;

    /// Number of steps in a section.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn count_steps(&self, section_id: SectionId) -> Result<usize, StorageError> {
        Ok(self.steps_for_section(section_id).await?.len())
    }
}

/// Per-user step progress (`user_guidance_progress`).
#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Insert the record, or overwrite the row with the same
    /// `(user_id, section_id, step_id)` key in one atomic statement.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the record cannot be stored.
    async fn upsert_progress(&self, record: &ProgressRecord) -> Result<(), StorageError>;

    /// Every progress row of a user.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn progress_for_user(&self, user_id: UserId)
    -> Result<Vec<ProgressRecord>, StorageError>;

    /// Progress rows of a user restricted to one section.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn progress_for_section(
        &self,
        user_id: UserId,
        section_id: SectionId,
    ) -> Result<Vec<ProgressRecord>, StorageError>;

    /// Sets `section_completed` on the user's existing rows for the section.
    ///
    /// Never creates rows. Returns the number of rows updated.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn set_section_completed(
        &self,
        user_id: UserId,
        section_id: SectionId,
        completed: bool,
    ) -> Result<u64, StorageError>;
}

/// String key/value store kept next to the client (the browser `localStorage` analogue).
#[async_trait]
pub trait LocalStore: Send + Sync {
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;

    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// Removing a missing key is not an error.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on repository failures.
    async fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

type ProgressKey = (UserId, SectionId, StepId);

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    sections: Arc<Mutex<HashMap<SectionId, Section>>>,
    steps: Arc<Mutex<HashMap<StepId, Step>>>,
    progress: Arc<Mutex<HashMap<ProgressKey, ProgressRecord>>>,
    local: Arc<Mutex<HashMap<String, String>>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

fn poisoned<E: ToString>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

#[async_trait]
impl GuidanceRepository for InMemoryRepository {
    async fn upsert_section(&self, section: &Section) -> Result<(), StorageError> {
        let mut guard = self.sections.lock().map_err(poisoned)?;
        guard.insert(section.id(), section.clone());
        Ok(())
    }

    async fn upsert_step(&self, step: &Step) -> Result<(), StorageError> {
        let known = self
            .sections
            .lock()
            .map_err(poisoned)?
            .contains_key(&step.section_id());
        if !known {
            return Err(StorageError::NotFound);
        }
        let mut guard = self.steps.lock().map_err(poisoned)?;
        guard.insert(step.id(), step.clone());
        Ok(())
    }

    async fn list_sections(&self) -> Result<Vec<Section>, StorageError> {
        let guard = self.sections.lock().map_err(poisoned)?;
        let mut sections: Vec<Section> = guard.values().cloned().collect();
        sections.sort_by_key(|s| (s.order_number(), s.id()));
        Ok(sections)
    }

    async fn steps_for_section(&self, section_id: SectionId) -> Result<Vec<Step>, StorageError> {
        let guard = self.steps.lock().map_err(poisoned)?;
        let mut steps: Vec<Step> = guard
            .values()
            .filter(|s| s.section_id() == section_id)
            .cloned()
            .collect();
        steps.sort_by_key(|s| (s.order_number(), s.id()));
        Ok(steps)
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn upsert_progress(&self, record: &ProgressRecord) -> Result<(), StorageError> {
        let mut guard = self.progress.lock().map_err(poisoned)?;
        guard.insert(
            (record.user_id, record.section_id, record.step_id),
            record.clone(),
        );
        Ok(())
    }

    async fn progress_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<ProgressRecord>, StorageError> {
        let guard = self.progress.lock().map_err(poisoned)?;
        let mut rows: Vec<ProgressRecord> = guard
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        rows.sort_by_key(|r| (r.section_id, r.step_id));
        Ok(rows)
    }

    async fn progress_for_section(
        &self,
        user_id: UserId,
        section_id: SectionId,
    ) -> Result<Vec<ProgressRecord>, StorageError> {
        let mut rows = self.progress_for_user(user_id).await?;
        rows.retain(|r| r.section_id == section_id);
        Ok(rows)
    }

    async fn set_section_completed(
        &self,
        user_id: UserId,
        section_id: SectionId,
        completed: bool,
    ) -> Result<u64, StorageError> {
        let mut guard = self.progress.lock().map_err(poisoned)?;
        let mut updated = 0_u64;
        for record in guard
            .values_mut()
            .filter(|r| r.user_id == user_id && r.section_id == section_id)
        {
            record.section_completed = completed;
            updated += 1;
        }
        Ok(updated)
    }
}

#[async_trait]
impl LocalStore for InMemoryRepository {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let guard = self.local.lock().map_err(poisoned)?;
        Ok(guard.get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        let mut guard = self.local.lock().map_err(poisoned)?;
        guard.insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        let mut guard = self.local.lock().map_err(poisoned)?;
        guard.remove(key);
        Ok(())
    }
}

/// Aggregates repositories behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Storage {
    pub guidance: Arc<dyn GuidanceRepository>,
    pub progress: Arc<dyn ProgressRepository>,
    pub local: Arc<dyn LocalStore>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        let guidance: Arc<dyn GuidanceRepository> = Arc::new(repo.clone());
        let progress: Arc<dyn ProgressRepository> = Arc::new(repo.clone());
        let local: Arc<dyn LocalStore> = Arc::new(repo);
        Self {
            guidance,
            progress,
            local,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use guide_core::time::fixed_now;

    fn section(id: u64, order: u32) -> Section {
        Section::new(SectionId::new(id), order, format!("Section {id}"), None, 15, None).unwrap()
    }

    fn step(id: u64, section_id: u64, order: u32) -> Step {
        Step::new(
            StepId::new(id),
            SectionId::new(section_id),
            order,
            format!("Step {id}"),
            "",
        )
        .unwrap()
    }

    #[tokio::test]
    async fn sections_and_steps_are_ordered() {
        let repo = InMemoryRepository::new();
        repo.upsert_section(&section(2, 2)).await.unwrap();
        repo.upsert_section(&section(1, 1)).await.unwrap();
        repo.upsert_step(&step(11, 1, 2)).await.unwrap();
        repo.upsert_step(&step(10, 1, 1)).await.unwrap();

        let ids: Vec<_> = repo
            .list_sections()
            .await
            .unwrap()
            .iter()
            .map(Section::id)
            .collect();
        assert_eq!(ids, vec![SectionId::new(1), SectionId::new(2)]);

        let steps = repo.steps_for_section(SectionId::new(1)).await.unwrap();
        assert_eq!(steps[0].id(), StepId::new(10));
        assert_eq!(repo.count_steps(SectionId::new(2)).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn step_requires_known_section() {
        let repo = InMemoryRepository::new();
        let err = repo.upsert_step(&step(1, 9, 1)).await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound));
    }

    #[tokio::test]
    async fn upsert_progress_keeps_one_row_per_key() {
        let repo = InMemoryRepository::new();
        let user = UserId::random();
        let first = ProgressRecord::visited(user, SectionId::new(1), StepId::new(1), fixed_now());
        let later = ProgressRecord::visited(
            user,
            SectionId::new(1),
            StepId::new(1),
            fixed_now() + Duration::hours(1),
        );
        repo.upsert_progress(&first).await.unwrap();
        repo.upsert_progress(&later).await.unwrap();

        let rows = repo.progress_for_user(user).await.unwrap();
        assert_eq!(rows, vec![later]);
    }

    #[tokio::test]
    async fn set_section_completed_only_touches_existing_rows() {
        let repo = InMemoryRepository::new();
        let user = UserId::random();
        let other = UserId::random();
        for (owner, step_id) in [(user, 1), (user, 2), (other, 1)] {
            repo.upsert_progress(&ProgressRecord::visited(
                owner,
                SectionId::new(1),
                StepId::new(step_id),
                fixed_now(),
            ))
            .await
            .unwrap();
        }

        let updated = repo
            .set_section_completed(user, SectionId::new(1), true)
            .await
            .unwrap();
        assert_eq!(updated, 2);

        let rows = repo
            .progress_for_section(user, SectionId::new(1))
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
        assert!(rows.iter().all(|r| r.section_completed));

        let theirs = repo.progress_for_user(other).await.unwrap();
        assert!(!theirs[0].section_completed);
    }

    #[tokio::test]
    async fn local_store_round_trips_and_removes() {
        let repo = InMemoryRepository::new();
        repo.set_item("bizzy_section_1_progress", "40").await.unwrap();
        assert_eq!(
            repo.get_item("bizzy_section_1_progress").await.unwrap().as_deref(),
            Some("40")
        );
        repo.remove_item("bizzy_section_1_progress").await.unwrap();
        repo.remove_item("bizzy_section_1_progress").await.unwrap();
        assert_eq!(repo.get_item("bizzy_section_1_progress").await.unwrap(), None);
    }
}
