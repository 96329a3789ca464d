mod mirror;
mod service;
mod session;

pub use service::{GuidanceService, VisitOutcome};
pub use session::GuideSession;
