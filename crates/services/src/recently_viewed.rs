use std::sync::Arc;

use guide_core::model::{RECENTLY_VIEWED_KEY, RecentlyViewed, RecentlyViewedItem};
use storage::repository::LocalStore;
use tracing::warn;

use crate::error::RecentlyViewedError;

/// Keeps the recently-viewed list in the local store as a JSON array.
#[derive(Clone)]
pub struct RecentlyViewedService {
    local: Arc<dyn LocalStore>,
}

impl RecentlyViewedService {
    #[must_use]
    pub fn new(local: Arc<dyn LocalStore>) -> Self {
        Self { local }
    }

    /// Put an item at the front of the list.
    ///
    /// # Errors
    ///
    /// Returns `RecentlyViewedError` if the list cannot be read or written.
    pub async fn record(&self, item: RecentlyViewedItem) -> Result<(), RecentlyViewedError> {
        let mut list = self.load().await?;
        list.push(item);
        let raw = serde_json::to_string(&list)?;
        self.local.set_item(RECENTLY_VIEWED_KEY, &raw).await?;
        Ok(())
    }

    /// Items most recent first. A corrupt stored value reads as an empty list.
    ///
    /// # Errors
    ///
    /// Returns `RecentlyViewedError::Storage` if the local store fails.
    pub async fn list(&self) -> Result<Vec<RecentlyViewedItem>, RecentlyViewedError> {
        Ok(self.load().await?.into_vec())
    }

    /// # Errors
    ///
    /// Returns `RecentlyViewedError::Storage` if the local store fails.
    pub async fn clear(&self) -> Result<(), RecentlyViewedError> {
        self.local.remove_item(RECENTLY_VIEWED_KEY).await?;
        Ok(())
    }

    async fn load(&self) -> Result<RecentlyViewed, RecentlyViewedError> {
        let Some(raw) = self.local.get_item(RECENTLY_VIEWED_KEY).await? else {
            return Ok(RecentlyViewed::new());
        };
        match serde_json::from_str(&raw) {
            Ok(list) => Ok(list),
            Err(err) => {
                warn!(error = %err, "discarding corrupt recently-viewed list");
                Ok(RecentlyViewed::new())
            }
        }
    }
}
