use voca_core::model::{AccessToken, Student, StudentId};

use super::SqliteRepository;
use super::mapping::{id_to_i64, map_student_row};
use crate::repository::{NewStudentRecord, StorageError, StudentRepository};

const STUDENT_COLUMNS: &str =
    "id, name, daily_goal, access_token, token_issued_at, created_at";

#[async_trait::async_trait]
impl StudentRepository for SqliteRepository {
    async fn insert_student(&self, record: &NewStudentRecord) -> Result<StudentId, StorageError> {
        let res = sqlx::query(
            r"
            INSERT INTO users (name, daily_goal, access_token, token_issued_at, created_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ",
        )
        .bind(record.name.clone())
        .bind(i64::from(record.daily_goal))
        .bind(record.token.as_str().to_owned())
        .bind(record.token_issued_at)
        .bind(record.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let id = u64::try_from(res.last_insert_rowid())
            .map_err(|_| StorageError::Serialization("id sign overflow".into()))?;
        Ok(StudentId::new(id))
    }

    async fn get_student(&self, id: StudentId) -> Result<Option<Student>, StorageError> {
        let row = sqlx::query(&format!(
            "SELECT {STUDENT_COLUMNS} FROM users WHERE id = ?1"
        ))
        .bind(id_to_i64("student_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        match row {
            Some(row) => map_student_row(&row).map(Some),
            None => Ok(None),
        }
    }

    async fn find_student_by_token(
        &self,
        token: &AccessToken,
    ) -> Result<Option<Student>, StorageError> {
        let row = sqlx::query(&format!(
            "SELECT {STUDENT_COLUMNS} FROM users WHERE access_token = ?1"
        ))
        .bind(token.as_str().to_owned())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        match row {
            Some(row) => map_student_row(&row).map(Some),
            None => Ok(None),
        }
    }

    async fn list_students(&self, limit: u32) -> Result<Vec<Student>, StorageError> {
        let rows = sqlx::query(&format!(
            "SELECT {STUDENT_COLUMNS} FROM users ORDER BY created_at ASC, id ASC LIMIT ?1"
        ))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut students = Vec::with_capacity(rows.len());
        for row in rows {
            students.push(map_student_row(&row)?);
        }
        Ok(students)
    }

    async fn update_student(&self, student: &Student) -> Result<(), StorageError> {
        let res = sqlx::query(
            r"
            UPDATE users
            SET name = ?2,
                daily_goal = ?3,
                access_token = ?4,
                token_issued_at = ?5
            WHERE id = ?1
            ",
        )
        .bind(id_to_i64("student_id", student.id().value())?)
        .bind(student.name().to_owned())
        .bind(i64::from(student.daily_goal()))
        .bind(student.token().as_str().to_owned())
        .bind(student.token_issued_at())
        .execute(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }

    async fn delete_student(&self, id: StudentId) -> Result<(), StorageError> {
        let res = sqlx::query("DELETE FROM users WHERE id = ?1")
            .bind(id_to_i64("student_id", id.value())?)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}
