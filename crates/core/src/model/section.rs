use thiserror::Error;

use crate::model::ids::SectionId;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SectionError {
    #[error("section title cannot be empty")]
    EmptyTitle,

    #[error("section order number must be > 0")]
    InvalidOrderNumber,

    #[error("deadline must be at least 1 day when set")]
    InvalidDeadline,
}

//
// ─── SECTION ───────────────────────────────────────────────────────────────────
//

/// A top-level onboarding category (e.g. "Tax and VAT").
///
/// Sections are seeded reference data and never change during a session.
/// Ordering across the guide follows `order_number`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    id: SectionId,
    order_number: u32,
    title: String,
    description: Option<String>,
    estimated_time_minutes: u32,
    deadline_days: Option<u32>,
}

impl Section {
    /// Creates a new Section.
    ///
    /// # Errors
    ///
    /// Returns `SectionError::EmptyTitle` if the title is blank,
    /// `SectionError::InvalidOrderNumber` for a zero order number and
    /// `SectionError::InvalidDeadline` for a zero-day deadline.
    pub fn new(
        id: SectionId,
        order_number: u32,
        title: impl Into<String>,
        description: Option<String>,
        estimated_time_minutes: u32,
        deadline_days: Option<u32>,
    ) -> Result<Self, SectionError> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(SectionError::EmptyTitle);
        }
        if order_number == 0 {
            return Err(SectionError::InvalidOrderNumber);
        }
        if deadline_days == Some(0) {
            return Err(SectionError::InvalidDeadline);
        }

        let description = description
            .map(|d| d.trim().to_owned())
            .filter(|d| !d.is_empty());

        Ok(Self {
            id,
            order_number,
            title: title.trim().to_owned(),
            description,
            estimated_time_minutes,
            deadline_days,
        })
    }

    #[must_use]
    pub fn id(&self) -> SectionId {
        self.id
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
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    #[must_use]
    pub fn estimated_time_minutes(&self) -> u32 {
        self.estimated_time_minutes
    }

    /// Days after signup by which the section should be finished, if any.
    #[must_use]
    pub fn deadline_days(&self) -> Option<u32> {
        self.deadline_days
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
