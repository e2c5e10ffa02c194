use std::sync::Arc;

use storage::repository::{
    AssignmentRepository, CompletedSessionRepository, OnlineTestRepository, ProgressRepository,
    Storage, StudentRepository, WordlistRepository,
};
use voca_core::model::{
    Assignment, CompletedSession, OnlineTest, Student, StudentId, WordId, WordStatus,
};

use crate::error::OverviewError;

/// Progress of one assignment, as shown on the teacher dashboard.
#[derive(Debug, Clone, PartialEq)]
pub struct AssignmentOverview {
    pub assignment: Assignment,
    pub wordlist_name: String,
    pub total_words: u32,
    pub completed_words: u32,
    pub unknown_words: u32,
    pub sessions: Vec<CompletedSession>,
    pub tests: Vec<OnlineTest>,
}

impl AssignmentOverview {
    /// Every snapshot frozen means the generation is done.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.total_words > 0 && self.completed_words == self.total_words
    }
}

/// One student's full dashboard row.
#[derive(Debug, Clone, PartialEq)]
pub struct StudentOverview {
    pub student: Student,
    pub assignments: Vec<AssignmentOverview>,
}

/// Aggregates per-student progress for the teacher dashboard.
#[derive(Clone)]
pub struct OverviewService {
    students: Arc<dyn StudentRepository>,
    wordlists: Arc<dyn WordlistRepository>,
    assignments: Arc<dyn AssignmentRepository>,
    progress: Arc<dyn ProgressRepository>,
    sessions: Arc<dyn CompletedSessionRepository>,
    tests: Arc<dyn OnlineTestRepository>,
}

impl OverviewService {
    #[must_use]
    pub fn new(storage: &Storage) -> Self {
        Self {
            students: Arc::clone(&storage.students),
            wordlists: Arc::clone(&storage.wordlists),
            assignments: Arc::clone(&storage.assignments),
            progress: Arc::clone(&storage.progress),
            sessions: Arc::clone(&storage.sessions),
            tests: Arc::clone(&storage.tests),
        }
    }

    /// Assemble the dashboard view for one student.
    ///
    /// # Errors
    ///
    /// Returns `OverviewError::StudentNotFound` when the student is missing
    /// and propagates storage failures.
    pub async fn student_overview(
        &self,
        student_id: StudentId,
    ) -> Result<StudentOverview, OverviewError> {
        let student = self
            .students
            .get_student(student_id)
            .await?
            .ok_or(OverviewError::StudentNotFound)?;

        let mut overviews = Vec::new();
        for assignment in self.assignments.list_for_student(student_id).await? {
            overviews.push(self.assignment_overview(&student, assignment).await?);
        }

        Ok(StudentOverview {
            student,
            assignments: overviews,
        })
    }

    async fn assignment_overview(
        &self,
        student: &Student,
        assignment: Assignment,
    ) -> Result<AssignmentOverview, OverviewError> {
        let wordlist = self
            .wordlists
            .get_wordlist(assignment.wordlist_id())
            .await?
            .ok_or(OverviewError::WordlistNotFound)?;

        let all_words = self.wordlists.list_words(assignment.wordlist_id()).await?;
        let word_ids: Vec<WordId> = match assignment.filtered_word_ids() {
            Some(filter) => all_words
                .iter()
                .map(voca_core::model::Word::id)
                .filter(|id| filter.contains(id))
                .collect(),
            None => all_words.iter().map(voca_core::model::Word::id).collect(),
        };

        let rows = self.progress.list_progress(student.id(), &word_ids).await?;
        let completed_words = rows
            .iter()
            .filter(|p| p.status() == WordStatus::Completed)
            .count();
        let unknown_words = rows
            .iter()
            .filter(|p| p.last_skipped_at().is_some())
            .count();

        let sessions = self.sessions.list_sessions(assignment.id()).await?;
        let mut tests = Vec::new();
        for session in &sessions {
            tests.extend(self.tests.list_tests(session.id()).await?);
        }

        Ok(AssignmentOverview {
            assignment,
            wordlist_name: wordlist.name().to_owned(),
            total_words: u32::try_from(word_ids.len()).unwrap_or(u32::MAX),
            completed_words: u32::try_from(completed_words).unwrap_or(u32::MAX),
            unknown_words: u32::try_from(unknown_words).unwrap_or(u32::MAX),
            sessions,
            tests,
        })
    }
}
