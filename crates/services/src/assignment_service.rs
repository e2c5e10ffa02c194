use std::sync::Arc;

use storage::repository::{
    AssignmentRepository, CompletedSessionRepository, NewAssignmentRecord, OnlineTestRepository,
    Storage, StorageError, StudentRepository, WordlistRepository,
};
use voca_core::Clock;
use voca_core::model::{Assignment, AssignmentId, StudentId, WordlistId};

use crate::error::AssignmentServiceError;

/// Creates and manages assignments (student ↔ wordlist bindings).
#[derive(Clone)]
pub struct AssignmentService {
    clock: Clock,
    students: Arc<dyn StudentRepository>,
    wordlists: Arc<dyn WordlistRepository>,
    assignments: Arc<dyn AssignmentRepository>,
    sessions: Arc<dyn CompletedSessionRepository>,
    tests: Arc<dyn OnlineTestRepository>,
}

impl AssignmentService {
    #[must_use]
    pub fn new(clock: Clock, storage: &Storage) -> Self {
        Self {
            clock,
            students: Arc::clone(&storage.students),
            wordlists: Arc::clone(&storage.wordlists),
            assignments: Arc::clone(&storage.assignments),
            sessions: Arc::clone(&storage.sessions),
            tests: Arc::clone(&storage.tests),
        }
    }

    /// Assign a wordlist to a student as a fresh first-generation assignment.
    ///
    /// # Errors
    ///
    /// Returns `AssignmentServiceError` when student or wordlist is missing,
    /// the goal override is invalid, or storage fails.
    pub async fn assign(
        &self,
        student_id: StudentId,
        wordlist_id: WordlistId,
        daily_goal: Option<u32>,
    ) -> Result<Assignment, AssignmentServiceError> {
        if self.students.get_student(student_id).await?.is_none() {
            return Err(AssignmentServiceError::StudentNotFound);
        }
        if self.wordlists.get_wordlist(wordlist_id).await?.is_none() {
            return Err(AssignmentServiceError::WordlistNotFound);
        }
        if let Some(goal) = daily_goal {
            voca_core::model::validate_daily_goal(goal)
                .map_err(voca_core::model::AssignmentError::Goal)?;
        }

        let record = NewAssignmentRecord {
            student_id,
            wordlist_id,
            generation: 1,
            filtered_word_ids: None,
            parent_assignment_id: None,
            is_auto_generated: false,
            daily_goal,
            current_pass: 1,
            created_at: self.clock.now(),
        };
        let id = self.assignments.insert_assignment(&record).await?;
        self.assignments
            .get_assignment(id)
            .await?
            .ok_or(AssignmentServiceError::NotFound)
    }

    /// Fetch one assignment.
    ///
    /// # Errors
    ///
    /// Returns `AssignmentServiceError::NotFound` when missing.
    pub async fn get(&self, id: AssignmentId) -> Result<Assignment, AssignmentServiceError> {
        self.assignments
            .get_assignment(id)
            .await?
            .ok_or(AssignmentServiceError::NotFound)
    }

    /// A student's assignments, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `AssignmentServiceError` on storage failure.
    pub async fn list_for_student(
        &self,
        student_id: StudentId,
    ) -> Result<Vec<Assignment>, AssignmentServiceError> {
        Ok(self.assignments.list_for_student(student_id).await?)
    }

    /// Override the per-assignment daily goal (`None` falls back to the
    /// student default).
    ///
    /// # Errors
    ///
    /// Returns `AssignmentServiceError` when the assignment is missing or the
    /// goal is outside the allowed range.
    pub async fn set_daily_goal(
        &self,
        id: AssignmentId,
        goal: Option<u32>,
    ) -> Result<Assignment, AssignmentServiceError> {
        let mut assignment = self.get(id).await?;
        assignment.set_daily_goal(goal)?;
        self.assignments.update_assignment(&assignment).await?;
        Ok(assignment)
    }

    /// Delete an assignment together with every derived review assignment,
    /// their frozen sessions and attached test results.
    ///
    /// # Errors
    ///
    /// Returns `AssignmentServiceError::NotFound` when the root is missing.
    pub async fn delete(&self, id: AssignmentId) -> Result<(), AssignmentServiceError> {
        if self.assignments.get_assignment(id).await?.is_none() {
            return Err(AssignmentServiceError::NotFound);
        }
        delete_assignment_tree(
            self.assignments.as_ref(),
            self.sessions.as_ref(),
            self.tests.as_ref(),
            id,
        )
        .await?;
        Ok(())
    }
}

/// Remove an assignment chain, children before parents.
///
/// The whole subtree is collected into an in-memory order first; no delete is
/// issued until traversal is complete, so a failure mid-walk leaves the chain
/// intact rather than half-orphaned.
pub(crate) async fn delete_assignment_tree(
    assignments: &dyn AssignmentRepository,
    sessions: &dyn CompletedSessionRepository,
    tests: &dyn OnlineTestRepository,
    root: AssignmentId,
) -> Result<(), StorageError> {
    // Post-order: push parents, pop children first.
    let mut stack = vec![root];
    let mut order = Vec::new();
    while let Some(id) = stack.pop() {
        order.push(id);
        for child in assignments.list_children(id).await? {
            stack.push(child.id());
        }
    }

    for id in order.into_iter().rev() {
        for session in sessions.list_sessions(id).await? {
            tests.delete_tests_for_session(session.id()).await?;
        }
        sessions.delete_sessions_for_assignment(id).await?;
        assignments.delete_assignment(id).await?;
    }

    tracing::debug!(root = %root, "assignment chain deleted");
    Ok(())
}
