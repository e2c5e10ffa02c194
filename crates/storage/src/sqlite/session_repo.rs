use voca_core::model::{AssignmentId, CompletedSession, SessionId};

use super::SqliteRepository;
use super::mapping::{id_to_i64, map_session_row, word_ids_to_json};
use crate::repository::{CompletedSessionRepository, NewSessionRecord, StorageError};

const SESSION_COLUMNS: &str =
    "id, assignment_id, session_number, word_ids, unknown_word_ids, completed_date";

#[async_trait::async_trait]
impl CompletedSessionRepository for SqliteRepository {
    async fn append_session(&self, record: &NewSessionRecord) -> Result<SessionId, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO completed_wordlists (
                assignment_id, session_number, word_ids, unknown_word_ids, completed_date
            )
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(id_to_i64("assignment_id", record.assignment_id.value())?)
        .bind(i64::from(record.session_number))
        .bind(word_ids_to_json(&record.word_ids)?)
        .bind(word_ids_to_json(&record.unknown_word_ids)?)
        .bind(record.completed_date)
        .execute(&self.pool)
        .await
        .map_err(|e| match e.as_database_error() {
            // UNIQUE (assignment_id, session_number): a snapshot for this
            // session already exists.
            Some(db) if db.is_unique_violation() => StorageError::Conflict,
            _ => StorageError::Connection(e.to_string()),
        })?;

        let id = u64::try_from(res.last_insert_rowid())
            .map_err(|_| StorageError::Serialization("id sign overflow".into()))?;
        Ok(SessionId::new(id))
    }

    async fn get_session(&self, id: SessionId) -> Result<Option<CompletedSession>, StorageError> {
        let row = sqlx::query(&format!(
            "SELECT {SESSION_COLUMNS} FROM completed_wordlists WHERE id = ?1"
        ))
        .bind(id_to_i64("session_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        match row {
            Some(row) => map_session_row(&row).map(Some),
            None => Ok(None),
        }
    }

    async fn list_sessions(
        &self,
        assignment_id: AssignmentId,
    ) -> Result<Vec<CompletedSession>, StorageError> {
        let rows = sqlx::query(&format!(
            "SELECT {SESSION_COLUMNS} FROM completed_wordlists \
             WHERE assignment_id = ?1 ORDER BY session_number ASC"
        ))
        .bind(id_to_i64("assignment_id", assignment_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut sessions = Vec::with_capacity(rows.len());
        for row in rows {
            sessions.push(map_session_row(&row)?);
        }
        Ok(sessions)
    }

    async fn delete_sessions_for_assignment(
        &self,
        assignment_id: AssignmentId,
    ) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM completed_wordlists WHERE assignment_id = ?1")
            .bind(id_to_i64("assignment_id", assignment_id.value())?)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(())
    }
}
