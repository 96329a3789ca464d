use thiserror::Error;

use crate::model::{SectionError, StepError};

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Section(#[from] SectionError),
    #[error(transparent)]
    Step(#[from] StepError),
}
