#![forbid(unsafe_code)]

pub mod app_services;
pub mod error;
pub mod guidance;
pub mod recently_viewed;

pub use guide_core::Clock;

pub use app_services::AppServices;
pub use error::{AppServicesError, GuidanceError, RecentlyViewedError};
pub use guidance::{GuideSession, GuidanceService, VisitOutcome};
pub use recently_viewed::RecentlyViewedService;
