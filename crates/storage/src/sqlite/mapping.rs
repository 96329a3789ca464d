use guide_core::model::{
    DifficultyLevel, ProgressRecord, Section, SectionId, Step, StepId, UserId,
};
use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn conn<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Connection(e.to_string())
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

pub(crate) fn id_to_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

pub(crate) fn section_id_from_i64(v: i64) -> Result<SectionId, StorageError> {
    Ok(SectionId::new(i64_to_u64("section_id", v)?))
}

pub(crate) fn step_id_from_i64(v: i64) -> Result<StepId, StorageError> {
    Ok(StepId::new(i64_to_u64("step_id", v)?))
}

/// User ids are stored as hyphenated UUID text.
pub(crate) fn user_id_to_text(user_id: UserId) -> String {
    user_id.to_string()
}

pub(crate) fn user_id_from_text(raw: &str) -> Result<UserId, StorageError> {
    raw.parse::<UserId>().map_err(ser)
}

pub(crate) fn map_section_row(row: &SqliteRow) -> Result<Section, StorageError> {
    Section::new(
        section_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        u32_from_i64(
            "order_number",
            row.try_get::<i64, _>("order_number").map_err(ser)?,
        )?,
        row.try_get::<String, _>("title").map_err(ser)?,
        row.try_get::<Option<String>, _>("description")
            .map_err(ser)?,
        u32_from_i64(
            "estimated_time_minutes",
            row.try_get::<i64, _>("estimated_time_minutes")
                .map_err(ser)?,
        )?,
        row.try_get::<Option<i64>, _>("deadline_days")
            .map_err(ser)?
            .map(|v| u32_from_i64("deadline_days", v))
            .transpose()?,
    )
    .map_err(ser)
}

pub(crate) fn map_step_row(row: &SqliteRow) -> Result<Step, StorageError> {
    let difficulty = row
        .try_get::<Option<String>, _>("difficulty_level")
        .map_err(ser)?
        .map(|raw| raw.parse::<DifficultyLevel>())
        .transpose()
        .map_err(ser)?;

    let step = Step::new(
        step_id_from_i64(row.try_get::<i64, _>("id").map_err(ser)?)?,
        section_id_from_i64(row.try_get::<i64, _>("section_id").map_err(ser)?)?,
        u32_from_i64(
            "order_number",
            row.try_get::<i64, _>("order_number").map_err(ser)?,
        )?,
        row.try_get::<String, _>("title").map_err(ser)?,
        row.try_get::<String, _>("content").map_err(ser)?,
    )
    .map_err(ser)?
    .with_quick_win(row.try_get::<i64, _>("quick_win").map_err(ser)? != 0);

    Ok(match difficulty {
        Some(level) => step.with_difficulty(level),
        None => step,
    })
}

pub(crate) fn map_progress_row(row: &SqliteRow) -> Result<ProgressRecord, StorageError> {
    let user_id: String = row.try_get("user_id").map_err(ser)?;
    Ok(ProgressRecord {
        user_id: user_id_from_text(&user_id)?,
        section_id: section_id_from_i64(row.try_get::<i64, _>("section_id").map_err(ser)?)?,
        step_id: step_id_from_i64(row.try_get::<i64, _>("step_id").map_err(ser)?)?,
        completed: row.try_get::<i64, _>("completed").map_err(ser)? != 0,
        section_completed: row.try_get::<i64, _>("section_completed").map_err(ser)? != 0,
        last_visited_at: row.try_get("last_visited_at").map_err(ser)?,
    })
}
