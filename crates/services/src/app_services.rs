use std::sync::Arc;

use storage::repository::Storage;

use crate::Clock;
use crate::error::AppServicesError;
use crate::guidance::GuidanceService;
use crate::recently_viewed::RecentlyViewedService;

/// Assembles app-facing services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    guidance: Arc<GuidanceService>,
    recently_viewed: Arc<RecentlyViewedService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage. Migrations run on connect.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(db_url: &str, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(clock, &storage))
    }

    /// Build services over the in-memory repository.
    #[must_use]
    pub fn in_memory(clock: Clock) -> Self {
        Self::from_storage(clock, &Storage::in_memory())
    }

    #[must_use]
    pub fn from_storage(clock: Clock, storage: &Storage) -> Self {
        Self {
            guidance: Arc::new(GuidanceService::from_storage(clock, storage)),
            recently_viewed: Arc::new(RecentlyViewedService::new(Arc::clone(&storage.local))),
        }
    }

    #[must_use]
    pub fn guidance(&self) -> Arc<GuidanceService> {
        Arc::clone(&self.guidance)
    }

    #[must_use]
    pub fn recently_viewed(&self) -> Arc<RecentlyViewedService> {
        Arc::clone(&self.recently_viewed)
    }
}
