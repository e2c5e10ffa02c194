use voca_core::model::{Assignment, AssignmentId, StudentId, WordlistId};

use super::SqliteRepository;
use super::mapping::{id_to_i64, map_assignment_row, word_ids_to_json};
use crate::repository::{AssignmentRepository, NewAssignmentRecord, StorageError};

const ASSIGNMENT_COLUMNS: &str = "id, student_id, wordlist_id, generation, filtered_word_ids, \
    parent_assignment_id, is_auto_generated, daily_goal, current_pass, created_at";

#[async_trait::async_trait]
impl AssignmentRepository for SqliteRepository {
    async fn insert_assignment(
        &self,
        record: &NewAssignmentRecord,
    ) -> Result<AssignmentId, StorageError> {
        let filtered = record
            .filtered_word_ids
            .as_deref()
            .map(word_ids_to_json)
            .transpose()?;
        let parent = record
            .parent_assignment_id
            .map(|p| id_to_i64("parent_assignment_id", p.value()))
            .transpose()?;

        let res = sqlx::query(
            r"
            INSERT INTO student_wordlists (
                student_id, wordlist_id, generation, filtered_word_ids,
                parent_assignment_id, is_auto_generated, daily_goal, current_pass, created_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
            ",
        )
        .bind(id_to_i64("student_id", record.student_id.value())?)
        .bind(id_to_i64("wordlist_id", record.wordlist_id.value())?)
        .bind(i64::from(record.generation))
        .bind(filtered)
        .bind(parent)
        .bind(i64::from(record.is_auto_generated))
        .bind(record.daily_goal.map(i64::from))
        .bind(i64::from(record.current_pass))
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let id = u64::try_from(res.last_insert_rowid())
            .map_err(|_| StorageError::Serialization("id sign overflow".into()))?;
        Ok(AssignmentId::new(id))
    }

    async fn get_assignment(&self, id: AssignmentId) -> Result<Option<Assignment>, StorageError> {
        let row = sqlx::query(&format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM student_wordlists WHERE id = ?1"
        ))
        .bind(id_to_i64("assignment_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        match row {
            Some(row) => map_assignment_row(&row).map(Some),
            None => Ok(None),
        }
    }

    async fn list_for_student(
        &self,
        student_id: StudentId,
    ) -> Result<Vec<Assignment>, StorageError> {
        let rows = sqlx::query(&format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM student_wordlists \
             WHERE student_id = ?1 ORDER BY created_at ASC, id ASC"
        ))
        .bind(id_to_i64("student_id", student_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut assignments = Vec::with_capacity(rows.len());
        for row in rows {
            assignments.push(map_assignment_row(&row)?);
        }
        Ok(assignments)
    }

    async fn list_for_wordlist(
        &self,
        wordlist_id: WordlistId,
    ) -> Result<Vec<Assignment>, StorageError> {
        let rows = sqlx::query(&format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM student_wordlists \
             WHERE wordlist_id = ?1 ORDER BY created_at ASC, id ASC"
        ))
        .bind(id_to_i64("wordlist_id", wordlist_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut assignments = Vec::with_capacity(rows.len());
        for row in rows {
            assignments.push(map_assignment_row(&row)?);
        }
        Ok(assignments)
    }

    async fn list_children(&self, parent: AssignmentId) -> Result<Vec<Assignment>, StorageError> {
        let rows = sqlx::query(&format!(
            "SELECT {ASSIGNMENT_COLUMNS} FROM student_wordlists \
             WHERE parent_assignment_id = ?1 ORDER BY created_at ASC, id ASC"
        ))
        .bind(id_to_i64("assignment_id", parent.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut assignments = Vec::with_capacity(rows.len());
        for row in rows {
            assignments.push(map_assignment_row(&row)?);
        }
        Ok(assignments)
    }

    async fn update_assignment(&self, assignment: &Assignment) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
            UPDATE student_wordlists
            SET daily_goal = ?2,
                current_pass = ?3
            WHERE id = ?1
            ",
        )
        .bind(id_to_i64("assignment_id", assignment.id().value())?)
        .bind(assignment.daily_goal().map(i64::from))
        .bind(i64::from(assignment.current_pass()))
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn delete_assignment(&self, id: AssignmentId) -> Result<(), StorageError> {
        let res = sqlx::query("DELETE FROM student_wordlists WHERE id = ?1")
            .bind(id_to_i64("assignment_id", id.value())?)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}
