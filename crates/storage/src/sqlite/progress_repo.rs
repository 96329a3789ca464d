use guide_core::model::{ProgressRecord, SectionId, UserId};

use super::SqliteRepository;
use super::mapping::{conn, id_to_i64, map_progress_row, user_id_to_text};
use crate::repository::{ProgressRepository, StorageError};

#[async_trait::async_trait]
impl ProgressRepository for SqliteRepository {
    async fn upsert_progress(&self, record: &ProgressRecord) -> Result<(), StorageError> {
        // Keyed upsert against the UNIQUE (user_id, section_id, step_id) constraint,
        // so concurrent writers cannot create duplicate rows.
        sqlx::query(
            r"
            INSERT INTO user_guidance_progress (
                user_id, section_id, step_id, completed, section_completed, last_visited_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT(user_id, section_id, step_id) DO UPDATE SET
                completed = excluded.completed,
                section_completed = excluded.section_completed,
                last_visited_at = excluded.last_visited_at
            ",
        )
        .bind(user_id_to_text(record.user_id))
        .bind(id_to_i64("section_id", record.section_id.value())?)
        .bind(id_to_i64("step_id", record.step_id.value())?)
        .bind(i64::from(record.completed))
        .bind(i64::from(record.section_completed))
        .bind(record.last_visited_at)
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(())
    }

    async fn progress_for_user(
        &self,
        user_id: UserId,
    ) -> Result<Vec<ProgressRecord>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT user_id, section_id, step_id, completed, section_completed, last_visited_at
            FROM user_guidance_progress
            WHERE user_id = ?1
            ORDER BY section_id ASC, step_id ASC
            ",
        )
        .bind(user_id_to_text(user_id))
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_progress_row(&row)?);
        }
        Ok(out)
    }

    async fn progress_for_section(
        &self,
        user_id: UserId,
        section_id: SectionId,
    ) -> Result<Vec<ProgressRecord>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT user_id, section_id, step_id, completed, section_completed, last_visited_at
            FROM user_guidance_progress
            WHERE user_id = ?1 AND section_id = ?2
            ORDER BY step_id ASC
            ",
        )
        .bind(user_id_to_text(user_id))
        .bind(id_to_i64("section_id", section_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(conn)?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_progress_row(&row)?);
        }
        Ok(out)
    }

    async fn set_section_completed(
        &self,
        user_id: UserId,
        section_id: SectionId,
        completed: bool,
    ) -> Result<u64, StorageError> {
        let res = sqlx::query(
            r"
            UPDATE user_guidance_progress
            SET section_completed = ?3
            WHERE user_id = ?1 AND section_id = ?2
            ",
        )
        .bind(user_id_to_text(user_id))
        .bind(id_to_i64("section_id", section_id.value())?)
        .bind(i64::from(completed))
        .execute(&self.pool)
        .await
        .map_err(conn)?;

        Ok(res.rows_affected())
    }
}
