use voca_core::model::{Progress, StudentId, WordId};

use super::SqliteRepository;
use super::mapping::{id_to_i64, map_progress_row};
use crate::repository::{ProgressRepository, StorageError};

const PROGRESS_COLUMNS: &str = "student_id, word_id, status, skip_count, completed_at, \
    last_skipped_at, skipped_in_pass, updated_at";

#[async_trait::async_trait]
impl ProgressRepository for SqliteRepository {
    async fn get_progress(
        &self,
        student_id: StudentId,
        word_id: WordId,
    ) -> Result<Option<Progress>, StorageError> {
        let row = sqlx::query(&format!(
            "SELECT {PROGRESS_COLUMNS} FROM student_word_progress \
             WHERE student_id = ?1 AND word_id = ?2"
        ))
        .bind(id_to_i64("student_id", student_id.value())?)
        .bind(id_to_i64("word_id", word_id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        match row {
            Some(row) => map_progress_row(&row).map(Some),
            None => Ok(None),
        }
    }

    async fn list_progress(
        &self,
        student_id: StudentId,
        word_ids: &[WordId],
    ) -> Result<Vec<Progress>, StorageError> {
        if word_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut sql = format!(
            "SELECT {PROGRESS_COLUMNS} FROM student_word_progress \
             WHERE student_id = ?1 AND word_id IN ("
        );
        for i in 0..word_ids.len() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push('?');
            sql.push_str(&(i + 2).to_string());
        }
        sql.push(')');

        let mut q = sqlx::query(&sql).bind(id_to_i64("student_id", student_id.value())?);
        for id in word_ids {
            q = q.bind(id_to_i64("word_id", id.value())?);
        }

        let rows = q
            .fetch_all(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut out = Vec::with_capacity(rows.len());
        for row in rows {
            out.push(map_progress_row(&row)?);
        }
        Ok(out)
    }

    async fn upsert_progress(&self, progress: &Progress) -> Result<(), StorageError> {
        sqlx::query(
            r"
            INSERT INTO student_word_progress (
                student_id, word_id, status, skip_count, completed_at,
                last_skipped_at, skipped_in_pass, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
            ON CONFLICT(student_id, word_id) DO UPDATE SET
                status = excluded.status,
                skip_count = excluded.skip_count,
                completed_at = excluded.completed_at,
                last_skipped_at = excluded.last_skipped_at,
                skipped_in_pass = excluded.skipped_in_pass,
                updated_at = excluded.updated_at
            ",
        )
        .bind(id_to_i64("student_id", progress.student_id().value())?)
        .bind(id_to_i64("word_id", progress.word_id().value())?)
        .bind(progress.status().as_str())
        .bind(i64::from(progress.skip_count()))
        .bind(progress.completed_at())
        .bind(progress.last_skipped_at())
        .bind(progress.skipped_in_pass().map(i64::from))
        .bind(progress.updated_at())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        Ok(())
    }

    async fn delete_progress_for_student(
        &self,
        student_id: StudentId,
    ) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM student_word_progress WHERE student_id = ?1")
            .bind(id_to_i64("student_id", student_id.value())?)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(())
    }

    async fn delete_progress_for_words(&self, word_ids: &[WordId]) -> Result<(), StorageError> {
        if word_ids.is_empty() {
            return Ok(());
        }

        let mut sql = String::from("DELETE FROM student_word_progress WHERE word_id IN (");
        for i in 0..word_ids.len() {
            if i > 0 {
                sql.push_str(", ");
            }
            sql.push('?');
            sql.push_str(&(i + 1).to_string());
        }
        sql.push(')');

        let mut q = sqlx::query(&sql);
        for id in word_ids {
            q = q.bind(id_to_i64("word_id", id.value())?);
        }

        q.execute(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(())
    }
}
