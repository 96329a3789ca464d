use guide_core::model::{Section, SectionId, Step};

use super::SqliteRepository;
use super::mapping::{conn, id_to_i64, map_section_row, map_step_row};
use crate::repository::{GuidanceRepository, StorageError};

#[async_trait::async_trait]
impl GuidanceRepository for SqliteRepository {
    async fn upsert_section(&self, section: &Section) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO guidance_sections (id, order_number, title, description, estimated_time_minutes, deadline_days)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(id) DO UPDATE SET
                order_number = excluded.order_number,
                title = excluded.title,
                description = excluded.description,
                estimated_time_minutes = excluded.estimated_time_minutes,
                deadline_days = excluded.deadline_days
            ",
        )
        .bind(id_to_i64("section_id", section.id().value())?)
        .bind(i64::from(section.order_number()))
        .bind(section.title())
        .bind(section.description())
        .bind(i64::from(section.estimated_time_minutes()))
        .bind(section.deadline_days().map(i64::from))
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn upsert_step(&self, step: &Step) -> Result<(), StorageError> {
        let section_id = id_to_i64("section_id", step.section_id().value())?;
        let known = sqlx::query("SELECT 1 FROM guidance_sections WHERE id = ?1")
            .bind(section_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(conn)?;
        if known.is_none() {
            return Err(StorageError::NotFound);
        }

        sqlx::query(
            r"
            INSERT INTO guidance_steps (id, section_id, order_number, title, content, difficulty_level, quick_win)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
            ON CONFLICT(id) DO UPDATE SET
                section_id = excluded.section_id,
                order_number = excluded.order_number,
                title = excluded.title,
                content = excluded.content,
                difficulty_level = excluded.difficulty_level,
                quick_win = excluded.quick_win
            ",
        )
        .bind(id_to_i64("step_id", step.id().value())?)
        .bind(section_id)
        .bind(i64::from(step.order_number()))
        .bind(step.title())
        .bind(step.content())
        .bind(step.difficulty_level().map(|d| d.as_str()))
        .bind(i64::from(step.is_quick_win()))
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn list_sections(&self) -> Result<Vec<Section>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, order_number, title, description, estimated_time_minutes, deadline_days
            FROM guidance_sections
            ORDER BY order_number ASC, id ASC
            ",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut sections = Vec::with_capacity(rows.len());
        for row in rows {
            sections.push(map_section_row(&row)?);
        }
        Ok(sections)
    }

    async fn steps_for_section(&self, section_id: SectionId) -> Result<Vec<Step>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, section_id, order_number, title, content, difficulty_level, quick_win
            FROM guidance_steps
            WHERE section_id = ?1
            ORDER BY order_number ASC, id ASC
            ",
        )
        .bind(id_to_i64("section_id", section_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut steps = Vec::with_capacity(rows.len());
        for row in rows {
            steps.push(map_step_row(&row)?);
        }
        Ok(steps)
    }

    async fn count_steps(&self, section_id: SectionId) -> Result<usize, StorageError> {
        let count =
            sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM guidance_steps WHERE section_id = ?1")
                .bind(id_to_i64("section_id", section_id.value())?)
                .fetch_one(&self.pool)
                .await
                .map_err(conn)?;

        usize::try_from(count)
            .map_err(|_| StorageError::Serialization(format!("invalid step count: {count}")))
    }
}
