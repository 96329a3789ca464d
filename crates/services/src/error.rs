//! Shared error types for the services crate.

use thiserror::Error;

use guide_core::model::SectionId;
use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;

/// Errors emitted by `GuidanceService`.
///
/// Only reads surface here. Progress and mirror writes are best-effort and
/// are logged instead of returned.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GuidanceError {
    #[error("no guidance sections available")]
    NoSections,
    #[error("unknown section: {0}")]
    UnknownSection(SectionId),
    #[error("position {section}.{step} is outside the guide")]
    InvalidPosition { section: u32, step: u32 },
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `RecentlyViewedService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum RecentlyViewedError {
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
