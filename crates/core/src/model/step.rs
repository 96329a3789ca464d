use std::fmt;
use std::str::FromStr;

use thiserror::Error;

use crate::model::ids::{SectionId, StepId};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum StepError {
    #[error("step title cannot be empty")]
    EmptyTitle,

    #[error("step order number must be > 0")]
    InvalidOrderNumber,

    #[error("invalid difficulty level: {0}")]
    InvalidDifficulty(String),
}

/// How demanding a step is for a first-time business owner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DifficultyLevel {
    Beginner,
    Intermediate,
    Advanced,
}

impl DifficultyLevel {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            DifficultyLevel::Beginner => "beginner",
            DifficultyLevel::Intermediate => "intermediate",
            DifficultyLevel::Advanced => "advanced",
        }
    }
}

impl fmt::Display for DifficultyLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DifficultyLevel {
    type Err = StepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "beginner" => Ok(Self::Beginner),
            "intermediate" => Ok(Self::Intermediate),
            "advanced" => Ok(Self::Advanced),
            other => Err(StepError::InvalidDifficulty(other.to_owned())),
        }
    }
}

/// A single onboarding task within a section.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    id: StepId,
    section_id: SectionId,
    order_number: u32,
    title: String,
    content: String,
    difficulty_level: Option<DifficultyLevel>,
    quick_win: bool,
}

impl Step {
    /// Creates a new Step.
    ///
    /// # Errors
    ///
    /// Returns `StepError::EmptyTitle` for a blank title and
    /// `StepError::InvalidOrderNumber` for a zero order number.
    pub fn new(
        id: StepId,
        section_id: SectionId,
        order_number: u32,
        title: impl Into<String>,
        content: impl Into<String>,
    ) -> Result<Self, StepError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(StepError::EmptyTitle);
        }
        if order_number == 0 {
            return Err(StepError::InvalidOrderNumber);
        }

        Ok(Self {
            id,
            section_id,
            order_number,
            title: title.trim().to_owned(),
            content: content.into(),
            difficulty_level: None,
            quick_win: false,
        })
    }

    #[must_use]
    pub fn with_difficulty(mut self, level: DifficultyLevel) -> Self {
        self.difficulty_level = Some(level);
        self
    }

    /// Flags the step as fast and low-effort ("quick win").
    #[must_use]
    pub fn with_quick_win(mut self, quick_win: bool) -> Self {
        self.quick_win = quick_win;
        self
    }

    #[must_use]
    pub fn id(&self) -> StepId {
        self.id
    }

    #[must_use]
    pub fn section_id(&self) -> SectionId {
        self.section_id
    }

    #[must_use]
    pub fn order_number(&self) -> u32 {
        self.order_number
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn content(&self) -> &str {
        &self.content
    }

    #[must_use]
    pub fn difficulty_level(&self) -> Option<DifficultyLevel> {
        self.difficulty_level
    }

    #[must_use]
    pub fn is_quick_win(&self) -> bool {
        self.quick_win
    }
}
