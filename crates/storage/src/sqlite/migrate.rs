use chrono::Utc;
use sqlx::SqlitePool;

use super::SqliteInitError;

/// Runs a single, consolidated migration for the current schema.
///
/// Creates the full schema: users, wordlists, words, assignments
/// (`student_wordlists`), per-word progress, frozen session snapshots
/// (`completed_wordlists`), online tests, and indexes.
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

    // Version 1: full schema.
    if !is_applied(pool, 1).await? {
        let mut tx = pool.begin().await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS users (
                    id INTEGER PRIMARY KEY,
                    name TEXT NOT NULL,
                    daily_goal INTEGER NOT NULL CHECK (daily_goal BETWEEN 5 AND 100),
                    access_token TEXT NOT NULL UNIQUE,
                    token_issued_at TEXT NOT NULL,
                    created_at TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS wordlists (
                    id INTEGER PRIMARY KEY,
                    name TEXT NOT NULL,
                    kind TEXT NOT NULL CHECK (kind IN ('original', 'review')),
                    created_at TEXT NOT NULL
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS words (
                    id INTEGER PRIMARY KEY,
                    wordlist_id INTEGER NOT NULL,
                    position INTEGER NOT NULL CHECK (position >= 0),
                    text TEXT NOT NULL,
                    meaning TEXT NOT NULL,
                    example TEXT,
                    mnemonic TEXT,
                    audio_url TEXT,
                    UNIQUE (wordlist_id, position),
                    FOREIGN KEY (wordlist_id) REFERENCES wordlists(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS student_wordlists (
                    id INTEGER PRIMARY KEY,
                    student_id INTEGER NOT NULL,
                    wordlist_id INTEGER NOT NULL,
                    generation INTEGER NOT NULL CHECK (generation >= 1),
                    filtered_word_ids TEXT,
                    parent_assignment_id INTEGER,
                    is_auto_generated INTEGER NOT NULL CHECK (is_auto_generated IN (0, 1)),
                    daily_goal INTEGER CHECK (daily_goal BETWEEN 5 AND 100),
                    current_pass INTEGER NOT NULL CHECK (current_pass >= 1),
                    created_at TEXT NOT NULL,
                    FOREIGN KEY (student_id) REFERENCES users(id) ON DELETE CASCADE,
                    FOREIGN KEY (wordlist_id) REFERENCES wordlists(id) ON DELETE CASCADE,
                    FOREIGN KEY (parent_assignment_id)
                        REFERENCES student_wordlists(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS student_word_progress (
                    student_id INTEGER NOT NULL,
                    word_id INTEGER NOT NULL,
                    status TEXT NOT NULL
                        CHECK (status IN ('not_started', 'completed', 'skipped')),
                    skip_count INTEGER NOT NULL CHECK (skip_count >= 0),
                    completed_at TEXT,
                    last_skipped_at TEXT,
                    skipped_in_pass INTEGER,
                    updated_at TEXT NOT NULL,
                    PRIMARY KEY (student_id, word_id),
                    FOREIGN KEY (student_id) REFERENCES users(id) ON DELETE CASCADE,
                    FOREIGN KEY (word_id) REFERENCES words(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS completed_wordlists (
                    id INTEGER PRIMARY KEY,
                    assignment_id INTEGER NOT NULL,
                    session_number INTEGER NOT NULL CHECK (session_number >= 1),
                    word_ids TEXT NOT NULL,
                    unknown_word_ids TEXT NOT NULL,
                    completed_date TEXT NOT NULL,
                    UNIQUE (assignment_id, session_number),
                    FOREIGN KEY (assignment_id)
                        REFERENCES student_wordlists(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE TABLE IF NOT EXISTS online_tests (
                    id INTEGER PRIMARY KEY,
                    session_id INTEGER NOT NULL,
                    kind TEXT NOT NULL CHECK (kind IN ('known', 'unknown')),
                    total INTEGER NOT NULL CHECK (total >= 1),
                    correct INTEGER NOT NULL CHECK (correct >= 0),
                    wrong_word_ids TEXT NOT NULL,
                    taken_at TEXT NOT NULL,
                    FOREIGN KEY (session_id)
                        REFERENCES completed_wordlists(id) ON DELETE CASCADE
                );
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_words_wordlist_position
                    ON words (wordlist_id, position);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_assignments_student_created
                    ON student_wordlists (student_id, created_at, id);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_assignments_parent
                    ON student_wordlists (parent_assignment_id);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_sessions_assignment_number
                    ON completed_wordlists (assignment_id, session_number);
            ",
        )
        .execute(&mut *tx)
        .await?;

        sqlx::query(
            r"
                CREATE INDEX IF NOT EXISTS idx_tests_session
                    ON online_tests (session_id, taken_at);
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
    }

    Ok(())
}
