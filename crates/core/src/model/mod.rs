mod ids;
pub mod mirror;
mod progress;
mod recent;
mod section;
mod step;

pub use ids::{ParseIdError, SectionId, StepId, UserId};
pub use mirror::LocalMirrorEntry;
pub use progress::{ProgressRecord, SectionProgress, latest_per_step, section_percentage};
pub use recent::{
    RECENTLY_VIEWED_CAP, RECENTLY_VIEWED_KEY, RecentlyViewed, RecentlyViewedItem, ViewedKind,
};
pub use section::{Section, SectionError};
pub use step::{DifficultyLevel, Step, StepError};
