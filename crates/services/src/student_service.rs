use std::sync::Arc;

use storage::repository::{
    AssignmentRepository, CompletedSessionRepository, NewStudentRecord, OnlineTestRepository,
    ProgressRepository, Storage, StudentRepository,
};
use voca_core::Clock;
use voca_core::model::{AccessToken, Student, StudentId, TokenPolicy};

use crate::assignment_service::delete_assignment_tree;
use crate::error::StudentServiceError;

const LIST_LIMIT: u32 = 256;

/// Manages learner accounts and their access tokens.
#[derive(Clone)]
pub struct StudentService {
    clock: Clock,
    token_policy: TokenPolicy,
    students: Arc<dyn StudentRepository>,
    assignments: Arc<dyn AssignmentRepository>,
    progress: Arc<dyn ProgressRepository>,
    sessions: Arc<dyn CompletedSessionRepository>,
    tests: Arc<dyn OnlineTestRepository>,
}

impl StudentService {
    #[must_use]
    pub fn new(clock: Clock, storage: &Storage) -> Self {
        Self {
            clock,
            token_policy: TokenPolicy::unlimited(),
            students: Arc::clone(&storage.students),
            assignments: Arc::clone(&storage.assignments),
            progress: Arc::clone(&storage.progress),
            sessions: Arc::clone(&storage.sessions),
            tests: Arc::clone(&storage.tests),
        }
    }

    #[must_use]
    pub fn with_token_policy(mut self, policy: TokenPolicy) -> Self {
        self.token_policy = policy;
        self
    }

    /// Create a student; a fresh access token is minted with the account.
    ///
    /// # Errors
    ///
    /// Returns `StudentServiceError` for an empty name, a goal outside
    /// `[5, 100]`, or storage failure.
    pub async fn create(
        &self,
        name: &str,
        daily_goal: u32,
    ) -> Result<Student, StudentServiceError> {
        let now = self.clock.now();
        // Validate through the domain type before anything is stored.
        let draft = Student::new(StudentId::new(0), name, daily_goal, now)?;

        let record = NewStudentRecord {
            name: draft.name().to_owned(),
            daily_goal: draft.daily_goal(),
            token: draft.token().clone(),
            token_issued_at: draft.token_issued_at(),
            created_at: draft.created_at(),
        };
        let id = self.students.insert_student(&record).await?;
        self.get(id).await
    }

    /// Fetch one student.
    ///
    /// # Errors
    ///
    /// Returns `StudentServiceError::NotFound` when missing.
    pub async fn get(&self, id: StudentId) -> Result<Student, StudentServiceError> {
        self.students
            .get_student(id)
            .await?
            .ok_or(StudentServiceError::NotFound)
    }

    /// All students, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StudentServiceError` on storage failure.
    pub async fn list(&self) -> Result<Vec<Student>, StudentServiceError> {
        Ok(self.students.list_students(LIST_LIMIT).await?)
    }

    /// Resolve an access token to its student, enforcing the token policy.
    ///
    /// # Errors
    ///
    /// Returns `StudentServiceError::UnknownToken` for an unmatched token and
    /// `StudentServiceError::Auth` for an expired one.
    pub async fn authenticate(&self, token: &AccessToken) -> Result<Student, StudentServiceError> {
        let student = self
            .students
            .find_student_by_token(token)
            .await?
            .ok_or(StudentServiceError::UnknownToken)?;
        self.token_policy
            .validate(student.token_issued_at(), self.clock.now())?;
        Ok(student)
    }

    /// Change the student's default daily goal.
    ///
    /// # Errors
    ///
    /// Returns `StudentServiceError` when the student is missing or the goal
    /// is outside `[5, 100]`.
    pub async fn set_daily_goal(
        &self,
        id: StudentId,
        goal: u32,
    ) -> Result<Student, StudentServiceError> {
        let mut student = self.get(id).await?;
        student.set_daily_goal(goal)?;
        self.students.update_student(&student).await?;
        Ok(student)
    }

    /// Mint a replacement token, invalidating the previous one.
    ///
    /// # Errors
    ///
    /// Returns `StudentServiceError` when the student is missing or storage
    /// fails.
    pub async fn rotate_token(&self, id: StudentId) -> Result<AccessToken, StudentServiceError> {
        let mut student = self.get(id).await?;
        let fresh = student.rotate_token(self.clock.now());
        self.students.update_student(&student).await?;
        tracing::info!(student_id = %id, "access token rotated");
        Ok(fresh)
    }

    /// Delete a student and everything hanging off the account: assignment
    /// chains (sessions and tests included) and every progress row.
    ///
    /// # Errors
    ///
    /// Returns `StudentServiceError::NotFound` when missing.
    pub async fn delete(&self, id: StudentId) -> Result<(), StudentServiceError> {
        if self.students.get_student(id).await?.is_none() {
            return Err(StudentServiceError::NotFound);
        }

        let assignments = self.assignments.list_for_student(id).await?;
        for assignment in assignments
            .iter()
            .filter(|a| a.parent_assignment_id().is_none())
        {
            delete_assignment_tree(
                self.assignments.as_ref(),
                self.sessions.as_ref(),
                self.tests.as_ref(),
                assignment.id(),
            )
            .await?;
        }

        self.progress.delete_progress_for_student(id).await?;
        self.students.delete_student(id).await?;
        tracing::info!(student_id = %id, "student deleted");
        Ok(())
    }
}
