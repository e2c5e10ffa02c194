use voca_core::model::{OnlineTest, SessionId, TestId};

use super::SqliteRepository;
use super::mapping::{id_to_i64, map_test_row, word_ids_to_json};
use crate::repository::{NewTestRecord, OnlineTestRepository, StorageError};

const TEST_COLUMNS: &str = "id, session_id, kind, total, correct, wrong_word_ids, taken_at";

#[async_trait::async_trait]
impl OnlineTestRepository for SqliteRepository {
    async fn append_test(&self, record: &NewTestRecord) -> Result<TestId, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO online_tests (session_id, kind, total, correct, wrong_word_ids, taken_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ",
        )
        .bind(id_to_i64("session_id", record.session_id.value())?)
        .bind(record.kind.as_str())
        .bind(i64::from(record.total))
        .bind(i64::from(record.correct))
        .bind(word_ids_to_json(&record.wrong_word_ids)?)
        .bind(record.taken_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let id = u64::try_from(res.last_insert_rowid())
            .map_err(|_| StorageError::Serialization("id sign overflow".into()))?;
        Ok(TestId::new(id))
    }

    async fn list_tests(&self, session_id: SessionId) -> Result<Vec<OnlineTest>, StorageError> {
        let rows = sqlx::query(&format!(
            "SELECT {TEST_COLUMNS} FROM online_tests \
             WHERE session_id = ?1 ORDER BY taken_at ASC, id ASC"
        ))
        .bind(id_to_i64("session_id", session_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut tests = Vec::with_capacity(rows.len());
        for row in rows {
            tests.push(map_test_row(&row)?);
        }
        Ok(tests)
    }

    async fn delete_tests_for_session(&self, session_id: SessionId) -> Result<(), StorageError> {
        sqlx::query("DELETE FROM online_tests WHERE session_id = ?1")
            .bind(id_to_i64("session_id", session_id.value())?)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        Ok(())
    }
}
