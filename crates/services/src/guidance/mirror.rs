use std::sync::Arc;

use guide_core::model::{LocalMirrorEntry, SectionId, mirror};
use storage::repository::LocalStore;
use tracing::warn;

/// Best-effort access to the per-section local mirror.
///
/// Reads fall back to an empty entry and writes are dropped on failure; both
/// are logged.
#[derive(Clone)]
pub(crate) struct LocalMirror {
    local: Arc<dyn LocalStore>,
}

impl LocalMirror {
    pub(crate) fn new(local: Arc<dyn LocalStore>) -> Self {
        Self { local }
    }

    pub(crate) async fn read(&self, section_id: SectionId) -> LocalMirrorEntry {
        let progress = self.get(&mirror::progress_key(section_id)).await;
        let complete = self.get(&mirror::complete_key(section_id)).await;
        LocalMirrorEntry::from_raw(progress.as_deref(), complete.as_deref())
    }

    /// Stores `percentage` unless the mirror already holds a higher value.
    ///
    /// `Some(flag)` sets or clears the completion flag; `None` leaves it as is.
    /// Unchanged values are not rewritten.
    pub(crate) async fn record(
        &self,
        section_id: SectionId,
        percentage: u8,
        complete: Option<bool>,
    ) {
        let existing = self.read(section_id).await;
        let entry = LocalMirrorEntry::new(
            percentage.max(existing.percentage.unwrap_or(0)),
            complete.unwrap_or(existing.complete),
        );
        let (progress, flag) = entry.to_raw();

        if entry.percentage != existing.percentage {
            if let Some(progress) = progress {
                self.set(&mirror::progress_key(section_id), &progress).await;
            }
        }
        if entry.complete != existing.complete {
            match flag {
                Some(flag) => self.set(&mirror::complete_key(section_id), &flag).await,
                None => self.remove(&mirror::complete_key(section_id)).await,
            }
        }
    }

    async fn get(&self, key: &str) -> Option<String> {
        match self.local.get_item(key).await {
            Ok(value) => value,
            Err(err) => {
                warn!(key, error = %err, "failed to read local mirror");
                None
            }
        }
    }

    async fn set(&self, key: &str, value: &str) {
        if let Err(err) = self.local.set_item(key, value).await {
            warn!(key, error = %err, "failed to write local mirror");
        }
    }

    async fn remove(&self, key: &str) {
        if let Err(err) = self.local.remove_item(key).await {
            warn!(key, error = %err, "failed to clear local mirror");
        }
    }
}
