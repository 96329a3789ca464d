//! Default guidance catalog for a new UK small business.

use guide_core::model::DifficultyLevel::{Advanced, Beginner, Intermediate};
use guide_core::model::{DifficultyLevel, Section, SectionId, Step, StepId};

use crate::repository::{GuidanceRepository, StorageError};

struct StepSeed {
    title: &'static str,
    content: &'static str,
    difficulty: DifficultyLevel,
    quick_win: bool,
}

struct SectionSeed {
    title: &'static str,
    description: &'static str,
    minutes: u32,
    deadline_days: Option<u32>,
    steps: &'static [StepSeed],
}

const fn step(
    title: &'static str,
    content: &'static str,
    difficulty: DifficultyLevel,
    quick_win: bool,
) -> StepSeed {
    StepSeed {
        title,
        content,
        difficulty,
        quick_win,
    }
}

const SECTIONS: &[SectionSeed] = &[
    SectionSeed {
        title: "Business Structure",
        description: "Choose a legal structure and register the business.",
        minutes: 45,
        deadline_days: Some(14),
        steps: &[
            step(
                "Sole trader or limited company",
                "Compare liability, tax and admin for each structure.",
                Beginner,
                false,
            ),
            step(
                "Pick a business name",
                "Check Companies House and trade mark registers for conflicts.",
                Beginner,
                true,
            ),
            step(
                "Register with Companies House or HMRC",
                "Incorporate a company or register as self-employed.",
                Intermediate,
                false,
            ),
        ],
    },
    SectionSeed {
        title: "Tax and VAT",
        description: "Set up HMRC obligations and record keeping.",
        minutes: 60,
        deadline_days: Some(30),
        steps: &[
            step(
                "Understand your tax obligations",
                "Income tax, corporation tax and National Insurance basics.",
                Beginner,
                false,
            ),
            step(
                "Check the VAT threshold",
                "Register for VAT once taxable turnover passes the threshold.",
                Intermediate,
                true,
            ),
            step(
                "Making Tax Digital",
                "Pick compatible software and keep digital records.",
                Intermediate,
                false,
            ),
            step(
                "Payroll and PAYE",
                "Register as an employer before the first payday.",
                Advanced,
                false,
            ),
        ],
    },
    SectionSeed {
        title: "Banking and Finance",
        description: "Separate business money and plan cash flow.",
        minutes: 30,
        deadline_days: None,
        steps: &[
            step(
                "Open a business bank account",
                "Keep business and personal transactions apart.",
                Beginner,
                true,
            ),
            step(
                "Build a cash flow forecast",
                "Project income and outgoings for the next twelve months.",
                Intermediate,
                false,
            ),
        ],
    },
    SectionSeed {
        title: "Legal and Compliance",
        description: "Insurance, data protection and contracts.",
        minutes: 50,
        deadline_days: Some(60),
        steps: &[
            step(
                "Business insurance",
                "Employers' liability is a legal requirement once you hire.",
                Beginner,
                false,
            ),
            step(
                "Register with the ICO",
                "Most businesses processing personal data must pay the data protection fee.",
                Beginner,
                true,
            ),
            step(
                "Terms and conditions",
                "Prepare customer terms and a privacy notice.",
                Intermediate,
                false,
            ),
        ],
    },
];

fn invalid(e: impl Into<guide_core::Error>) -> StorageError {
    StorageError::Serialization(e.into().to_string())
}

/// Builds the default sections and their steps.
///
/// Section ids follow their order (1-based); step ids are
/// `section_id * 100 + order`.
///
/// # Errors
///
/// Returns `StorageError::Serialization` if a built-in entry fails validation.
pub fn default_catalog() -> Result<Vec<(Section, Vec<Step>)>, StorageError> {
    let mut out = Vec::with_capacity(SECTIONS.len());

    for (section_order, seed) in (1_u32..).zip(SECTIONS) {
        let section_id = SectionId::new(u64::from(section_order));
        let section = Section::new(
            section_id,
            section_order,
            seed.title,
            Some(seed.description.to_owned()),
            seed.minutes,
            seed.deadline_days,
        )
        .map_err(invalid)?;

        let mut steps = Vec::with_capacity(seed.steps.len());
        for (step_order, s) in (1_u32..).zip(seed.steps) {
            let id = StepId::new(u64::from(section_order) * 100 + u64::from(step_order));
            let step = Step::new(id, section_id, step_order, s.title, s.content)
                .map_err(invalid)?
                .with_difficulty(s.difficulty)
                .with_quick_win(s.quick_win);
            steps.push(step);
        }
        out.push((section, steps));
    }

    Ok(out)
}

/// Writes the default catalog. Safe to run repeatedly.
///
/// Returns the number of `(sections, steps)` written.
///
/// # Errors
///
/// Returns `StorageError` if any write fails.
pub async fn seed_default_catalog(
    repo: &dyn GuidanceRepository,
) -> Result<(usize, usize), StorageError> {
    let catalog = default_catalog()?;
    let mut step_count = 0;
    for (section, steps) in &catalog {
        repo.upsert_section(section).await?;
        for step in steps {
            repo.upsert_step(step).await?;
            step_count += 1;
        }
    }
    tracing::info!(sections = catalog.len(), steps = step_count, "seeded guidance catalog");
    Ok((catalog.len(), step_count))
}
