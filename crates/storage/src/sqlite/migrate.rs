use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Runs the versioned schema migrations.
///
/// Version 1 creates the guidance catalog, per-user progress (one row per
/// user/section/step) and the local key/value mirror.
#[allow(clippy::too_many_lines)]
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), SqliteInitError> {
    async fn is_applied(pool: &SqlitePool, version: i64) -> Result<bool, sqlx::Error> {
        let row = sqlx::query("SELECT 1 FROM schema_migrations WHERE version = ?1")
            .bind(version)
            .fetch_optional(pool)
            .await?;
        Ok(row.is_some())
    }

    sqlx::query(
        r"
            CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL
            );
            ",
    )
    .execute(pool)
    .await?;

    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS guidance_sections (
                    id INTEGER PRIMARY KEY,
                    order_number INTEGER NOT NULL CHECK (order_number > 0),
                    title TEXT NOT NULL,
                    description TEXT,
                    estimated_time_minutes INTEGER NOT NULL CHECK (estimated_time_minutes >= 0),
                    deadline_days INTEGER CHECK (deadline_days IS NULL OR deadline_days > 0)
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS guidance_steps (
                    id INTEGER PRIMARY KEY,
                    section_id INTEGER NOT NULL,
                    order_number INTEGER NOT NULL CHECK (order_number > 0),
                    title TEXT NOT NULL,
                    content TEXT NOT NULL,
                    difficulty_level TEXT,
                    quick_win INTEGER NOT NULL DEFAULT 0 CHECK (quick_win IN (0, 1)),
                    FOREIGN KEY (section_id) REFERENCES guidance_sections(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS user_guidance_progress (
                    id INTEGER PRIMARY KEY,
                    user_id TEXT NOT NULL,
                    section_id INTEGER NOT NULL,
                    step_id INTEGER NOT NULL,
                    completed INTEGER NOT NULL CHECK (completed IN (0, 1)),
                    section_completed INTEGER NOT NULL CHECK (section_completed IN (0, 1)),
                    last_visited_at TEXT NOT NULL,
                    UNIQUE (user_id, section_id, step_id),
                    FOREIGN KEY (section_id) REFERENCES guidance_sections(id) ON DELETE CASCADE,
                    FOREIGN KEY (step_id) REFERENCES guidance_steps(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS local_store (
                    key TEXT PRIMARY KEY,
                    value TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_guidance_steps_section_order
                    ON guidance_steps(section_id, order_number);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_user_guidance_progress_user_section
                    ON user_guidance_progress(user_id, section_id);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                INSERT INTO schema_migrations (version, applied_at)
                VALUES (?1, ?2)
                ON CONFLICT(version) DO NOTHING
            ",
        )
        .bind(1_i64)
        .bind(Utc::now())
        .execute(&mut *tx)
        .await?;

        tx.commit().await?;
        tracing::info!(version = 1, "applied schema migration");
    }

    Ok(())
}
