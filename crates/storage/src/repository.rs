use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use voca_core::model::{
    AccessToken, Assignment, AssignmentId, CompletedSession, OnlineTest, Progress, SessionId,
    Student, StudentId, TestId, TestKind, Word, WordId, Wordlist, WordlistId, WordlistKind,
};

/// Errors surfaced by storage adapters.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StorageError {
    #[error("not found")]
    NotFound,

    #[error("conflict")]
    Conflict,

    #[error("connection error: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(String),
}

//
// ─── INSERT RECORDS ────────────────────────────────────────────────────────────
//

/// Insert shape for a student; the repository allocates the id.
#[derive(Debug, Clone)]
pub struct NewStudentRecord {
    pub name: String,
    pub daily_goal: u32,
    pub token: AccessToken,
    pub token_issued_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Insert shape for one word inside a new wordlist. Positions are assigned
/// by list order at insert time.
#[derive(Debug, Clone)]
pub struct NewWordRecord {
    pub text: String,
    pub meaning: String,
    pub example: Option<String>,
    pub mnemonic: Option<String>,
    pub audio_url: Option<String>,
}

/// Insert shape for a wordlist together with its ordered words.
#[derive(Debug, Clone)]
pub struct NewWordlistRecord {
    pub name: String,
    pub kind: WordlistKind,
    pub created_at: DateTime<Utc>,
    pub words: Vec<NewWordRecord>,
}

/// Insert shape for an assignment; the repository allocates the id.
#[derive(Debug, Clone)]
pub struct NewAssignmentRecord {
    pub student_id: StudentId,
    pub wordlist_id: WordlistId,
    pub generation: u32,
    pub filtered_word_ids: Option<Vec<WordId>>,
    pub parent_assignment_id: Option<AssignmentId>,
    pub is_auto_generated: bool,
    pub daily_goal: Option<u32>,
    pub current_pass: u32,
    pub created_at: DateTime<Utc>,
}

impl NewAssignmentRecord {
    #[must_use]
    pub fn from_assignment(assignment: &Assignment) -> Self {
        Self {
            student_id: assignment.student_id(),
            wordlist_id: assignment.wordlist_id(),
            generation: assignment.generation(),
            filtered_word_ids: assignment.filtered_word_ids().map(<[WordId]>::to_vec),
            parent_assignment_id: assignment.parent_assignment_id(),
            is_auto_generated: assignment.is_auto_generated(),
            daily_goal: assignment.daily_goal(),
            current_pass: assignment.current_pass(),
            created_at: assignment.created_at(),
        }
    }
}

/// Insert shape for a frozen session snapshot.
#[derive(Debug, Clone)]
pub struct NewSessionRecord {
    pub assignment_id: AssignmentId,
    pub session_number: u32,
    pub word_ids: Vec<WordId>,
    pub unknown_word_ids: Vec<WordId>,
    pub completed_date: DateTime<Utc>,
}

/// Insert shape for an online-test result.
#[derive(Debug, Clone)]
pub struct NewTestRecord {
    pub session_id: SessionId,
    pub kind: TestKind,
    pub total: u32,
    pub correct: u32,
    pub wrong_word_ids: Vec<WordId>,
    pub taken_at: DateTime<Utc>,
}

//
// ─── REPOSITORY CONTRACTS ──────────────────────────────────────────────────────
//

#[async_trait]
pub trait StudentRepository: Send + Sync {
    /// Insert a new student and return the allocated id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the student cannot be stored.
    async fn insert_student(&self, record: &NewStudentRecord) -> Result<StudentId, StorageError>;

    /// Fetch a student by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failure; `Ok(None)` when missing.
    async fn get_student(&self, id: StudentId) -> Result<Option<Student>, StorageError>;

    /// Look up the student holding a given access token.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failure; `Ok(None)` when no student
    /// holds the token.
    async fn find_student_by_token(
        &self,
        token: &AccessToken,
    ) -> Result<Option<Student>, StorageError>;

    /// List students ordered by creation time.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failure.
    async fn list_students(&self, limit: u32) -> Result<Vec<Student>, StorageError>;

    /// Persist mutable student fields (goal, token rotation).
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the row is missing.
    async fn update_student(&self, student: &Student) -> Result<(), StorageError>;

    /// Delete the student row. Dependent rows are removed by the caller
    /// beforehand (explicit cascade) or by foreign keys, backend depending.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the row is missing.
    async fn delete_student(&self, id: StudentId) -> Result<(), StorageError>;
}

#[async_trait]
pub trait WordlistRepository: Send + Sync {
    /// Insert a wordlist with its words; word positions follow list order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the list cannot be stored.
    async fn insert_wordlist(&self, record: &NewWordlistRecord)
    -> Result<WordlistId, StorageError>;

    /// Fetch a wordlist by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failure; `Ok(None)` when missing.
    async fn get_wordlist(&self, id: WordlistId) -> Result<Option<Wordlist>, StorageError>;

    /// List wordlists ordered by creation time.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failure.
    async fn list_wordlists(&self, limit: u32) -> Result<Vec<Wordlist>, StorageError>;

    /// All words of a list in sequence order.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failure.
    async fn list_words(&self, wordlist_id: WordlistId) -> Result<Vec<Word>, StorageError>;

    /// Delete a wordlist and its words.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the row is missing.
    async fn delete_wordlist(&self, id: WordlistId) -> Result<(), StorageError>;
}

#[async_trait]
pub trait AssignmentRepository: Send + Sync {
    /// Insert a new assignment and return the allocated id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the assignment cannot be stored.
    async fn insert_assignment(
        &self,
        record: &NewAssignmentRecord,
    ) -> Result<AssignmentId, StorageError>;

    /// Fetch an assignment by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failure; `Ok(None)` when missing.
    async fn get_assignment(&self, id: AssignmentId) -> Result<Option<Assignment>, StorageError>;

    /// A student's assignments, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failure.
    async fn list_for_student(&self, student_id: StudentId)
    -> Result<Vec<Assignment>, StorageError>;

    /// Every assignment targeting a wordlist, across students.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failure.
    async fn list_for_wordlist(
        &self,
        wordlist_id: WordlistId,
    ) -> Result<Vec<Assignment>, StorageError>;

    /// Direct children (derived review assignments) of an assignment.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failure.
    async fn list_children(&self, parent: AssignmentId) -> Result<Vec<Assignment>, StorageError>;

    /// Persist mutable assignment fields (pass counter, goal override).
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the row is missing.
    async fn update_assignment(&self, assignment: &Assignment) -> Result<(), StorageError>;

    /// Delete one assignment row. Callers order deletes children-first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::NotFound` if the row is missing.
    async fn delete_assignment(&self, id: AssignmentId) -> Result<(), StorageError>;
}

#[async_trait]
pub trait ProgressRepository: Send + Sync {
    /// Fetch the progress row for one (student, word) pair.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failure; `Ok(None)` for words never
    /// acted on (rows are created lazily).
    async fn get_progress(
        &self,
        student_id: StudentId,
        word_id: WordId,
    ) -> Result<Option<Progress>, StorageError>;

    /// Existing progress rows for a set of words. Missing rows are simply
    /// absent from the result.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failure.
    async fn list_progress(
        &self,
        student_id: StudentId,
        word_ids: &[WordId],
    ) -> Result<Vec<Progress>, StorageError>;

    /// Insert or update one progress row.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the row cannot be stored.
    async fn upsert_progress(&self, progress: &Progress) -> Result<(), StorageError>;

    /// Remove every progress row belonging to a student.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failure.
    async fn delete_progress_for_student(&self, student_id: StudentId)
    -> Result<(), StorageError>;

    /// Remove progress rows for the given words, across all students.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failure.
    async fn delete_progress_for_words(&self, word_ids: &[WordId]) -> Result<(), StorageError>;
}

#[async_trait]
pub trait CompletedSessionRepository: Send + Sync {
    /// Freeze a session snapshot; rejects a duplicate (assignment,
    /// session_number) pair with `StorageError::Conflict`.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the snapshot cannot be stored.
    async fn append_session(&self, record: &NewSessionRecord) -> Result<SessionId, StorageError>;

    /// Fetch a snapshot by id.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failure; `Ok(None)` when missing.
    async fn get_session(&self, id: SessionId) -> Result<Option<CompletedSession>, StorageError>;

    /// All snapshots of an assignment, by ascending session number.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failure.
    async fn list_sessions(
        &self,
        assignment_id: AssignmentId,
    ) -> Result<Vec<CompletedSession>, StorageError>;

    /// Remove every snapshot of an assignment (cascade path).
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failure.
    async fn delete_sessions_for_assignment(
        &self,
        assignment_id: AssignmentId,
    ) -> Result<(), StorageError>;
}

#[async_trait]
pub trait OnlineTestRepository: Send + Sync {
    /// Record a test result. Results are append-only.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` if the result cannot be stored.
    async fn append_test(&self, record: &NewTestRecord) -> Result<TestId, StorageError>;

    /// All test results attached to one session, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failure.
    async fn list_tests(&self, session_id: SessionId) -> Result<Vec<OnlineTest>, StorageError>;

    /// Remove every test attached to one session (cascade path).
    ///
    /// # Errors
    ///
    /// Returns `StorageError` on storage failure.
    async fn delete_tests_for_session(&self, session_id: SessionId) -> Result<(), StorageError>;
}

/// Aggregates the per-entity repositories behind trait objects so backends
/// can be swapped wholesale.
#[derive(Clone)]
pub struct Storage {
    pub students: Arc<dyn StudentRepository>,
    pub wordlists: Arc<dyn WordlistRepository>,
    pub assignments: Arc<dyn AssignmentRepository>,
    pub progress: Arc<dyn ProgressRepository>,
    pub sessions: Arc<dyn CompletedSessionRepository>,
    pub tests: Arc<dyn OnlineTestRepository>,
}

impl Storage {
    #[must_use]
    pub fn in_memory() -> Self {
        let repo = InMemoryRepository::new();
        Self {
            students: Arc::new(repo.clone()),
            wordlists: Arc::new(repo.clone()),
            assignments: Arc::new(repo.clone()),
            progress: Arc::new(repo.clone()),
            sessions: Arc::new(repo.clone()),
            tests: Arc::new(repo),
        }
    }
}

//
// ─── IN-MEMORY IMPLEMENTATION ──────────────────────────────────────────────────
//

#[derive(Default)]
struct InMemoryState {
    students: HashMap<StudentId, Student>,
    wordlists: HashMap<WordlistId, Wordlist>,
    words: HashMap<WordlistId, Vec<Word>>,
    assignments: HashMap<AssignmentId, Assignment>,
    progress: HashMap<(StudentId, WordId), Progress>,
    sessions: HashMap<SessionId, CompletedSession>,
    tests: HashMap<TestId, OnlineTest>,
    next_id: u64,
}

impl InMemoryState {
    fn allocate(&mut self) -> u64 {
        self.next_id += 1;
        self.next_id
    }
}

/// Simple in-memory repository implementation for testing and prototyping.
#[derive(Clone, Default)]
pub struct InMemoryRepository {
    state: Arc<Mutex<InMemoryState>>,
}

impl InMemoryRepository {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, InMemoryState>, StorageError> {
        self.state
            .lock()
            .map_err(|e| StorageError::Connection(e.to_string()))
    }
}

fn domain<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

#[async_trait]
impl StudentRepository for InMemoryRepository {
    async fn insert_student(&self, record: &NewStudentRecord) -> Result<StudentId, StorageError> {
        let mut state = self.lock()?;
        let id = StudentId::new(state.allocate());
        let student = Student::from_persisted(
            id,
            record.name.clone(),
            record.daily_goal,
            record.token.clone(),
            record.token_issued_at,
            record.created_at,
        )
        .map_err(domain)?;
        state.students.insert(id, student);
        Ok(id)
    }

    async fn get_student(&self, id: StudentId) -> Result<Option<Student>, StorageError> {
        Ok(self.lock()?.students.get(&id).cloned())
    }

    async fn find_student_by_token(
        &self,
        token: &AccessToken,
    ) -> Result<Option<Student>, StorageError> {
        Ok(self
            .lock()?
            .students
            .values()
            .find(|s| s.token() == token)
            .cloned())
    }

    async fn list_students(&self, limit: u32) -> Result<Vec<Student>, StorageError> {
        let state = self.lock()?;
        let mut all: Vec<_> = state.students.values().cloned().collect();
        all.sort_by_key(|s| (s.created_at(), s.id()));
        all.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(all)
    }

    async fn update_student(&self, student: &Student) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        if !state.students.contains_key(&student.id()) {
            return Err(StorageError::NotFound);
        }
        state.students.insert(student.id(), student.clone());
        Ok(())
    }

    async fn delete_student(&self, id: StudentId) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        state.students.remove(&id).ok_or(StorageError::NotFound)?;
        Ok(())
    }
}

#[async_trait]
impl WordlistRepository for InMemoryRepository {
    async fn insert_wordlist(
        &self,
        record: &NewWordlistRecord,
    ) -> Result<WordlistId, StorageError> {
        let mut state = self.lock()?;
        let id = WordlistId::new(state.allocate());
        let count = u32::try_from(record.words.len())
            .map_err(|_| StorageError::Serialization("too many words".into()))?;
        let wordlist = Wordlist::new(id, record.name.clone(), record.kind, count, record.created_at)
            .map_err(domain)?;

        let mut words = Vec::with_capacity(record.words.len());
        for (position, draft) in record.words.iter().enumerate() {
            let word_id = WordId::new(state.allocate());
            let position = u32::try_from(position)
                .map_err(|_| StorageError::Serialization("position overflow".into()))?;
            words.push(
                Word::new(
                    word_id,
                    id,
                    position,
                    draft.text.clone(),
                    draft.meaning.clone(),
                    draft.example.clone(),
                    draft.mnemonic.clone(),
                    draft.audio_url.clone(),
                )
                .map_err(domain)?,
            );
        }

        state.wordlists.insert(id, wordlist);
        state.words.insert(id, words);
        Ok(id)
    }

    async fn get_wordlist(&self, id: WordlistId) -> Result<Option<Wordlist>, StorageError> {
        Ok(self.lock()?.wordlists.get(&id).cloned())
    }

    async fn list_wordlists(&self, limit: u32) -> Result<Vec<Wordlist>, StorageError> {
        let state = self.lock()?;
        let mut all: Vec<_> = state.wordlists.values().cloned().collect();
        all.sort_by_key(|w| (w.created_at(), w.id()));
        all.truncate(usize::try_from(limit).unwrap_or(usize::MAX));
        Ok(all)
    }

    async fn list_words(&self, wordlist_id: WordlistId) -> Result<Vec<Word>, StorageError> {
        let state = self.lock()?;
        let mut words = state.words.get(&wordlist_id).cloned().unwrap_or_default();
        words.sort_by_key(Word::position);
        Ok(words)
    }

    async fn delete_wordlist(&self, id: WordlistId) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        state.wordlists.remove(&id).ok_or(StorageError::NotFound)?;
        state.words.remove(&id);
        Ok(())
    }
}

#[async_trait]
impl AssignmentRepository for InMemoryRepository {
    async fn insert_assignment(
        &self,
        record: &NewAssignmentRecord,
    ) -> Result<AssignmentId, StorageError> {
        let mut state = self.lock()?;
        let id = AssignmentId::new(state.allocate());
        let assignment = Assignment::from_persisted(
            id,
            record.student_id,
            record.wordlist_id,
            record.generation,
            record.filtered_word_ids.clone(),
            record.parent_assignment_id,
            record.is_auto_generated,
            record.daily_goal,
            record.current_pass,
            record.created_at,
        )
        .map_err(domain)?;
        state.assignments.insert(id, assignment);
        Ok(id)
    }

    async fn get_assignment(&self, id: AssignmentId) -> Result<Option<Assignment>, StorageError> {
        Ok(self.lock()?.assignments.get(&id).cloned())
    }

    async fn list_for_student(
        &self,
        student_id: StudentId,
    ) -> Result<Vec<Assignment>, StorageError> {
        let state = self.lock()?;
        let mut all: Vec<_> = state
            .assignments
            .values()
            .filter(|a| a.student_id() == student_id)
            .cloned()
            .collect();
        all.sort_by_key(|a| (a.created_at(), a.id()));
        Ok(all)
    }

    async fn list_for_wordlist(
        &self,
        wordlist_id: WordlistId,
    ) -> Result<Vec<Assignment>, StorageError> {
        let state = self.lock()?;
        let mut all: Vec<_> = state
            .assignments
            .values()
            .filter(|a| a.wordlist_id() == wordlist_id)
            .cloned()
            .collect();
        all.sort_by_key(|a| (a.created_at(), a.id()));
        Ok(all)
    }

    async fn list_children(&self, parent: AssignmentId) -> Result<Vec<Assignment>, StorageError> {
        let state = self.lock()?;
        let mut all: Vec<_> = state
            .assignments
            .values()
            .filter(|a| a.parent_assignment_id() == Some(parent))
            .cloned()
            .collect();
        all.sort_by_key(|a| (a.created_at(), a.id()));
        Ok(all)
    }

    async fn update_assignment(&self, assignment: &Assignment) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        if !state.assignments.contains_key(&assignment.id()) {
            return Err(StorageError::NotFound);
        }
        state.assignments.insert(assignment.id(), assignment.clone());
        Ok(())
    }

    async fn delete_assignment(&self, id: AssignmentId) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        state.assignments.remove(&id).ok_or(StorageError::NotFound)?;
        Ok(())
    }
}

#[async_trait]
impl ProgressRepository for InMemoryRepository {
    async fn get_progress(
        &self,
        student_id: StudentId,
        word_id: WordId,
    ) -> Result<Option<Progress>, StorageError> {
        Ok(self.lock()?.progress.get(&(student_id, word_id)).cloned())
    }

    async fn list_progress(
        &self,
        student_id: StudentId,
        word_ids: &[WordId],
    ) -> Result<Vec<Progress>, StorageError> {
        let state = self.lock()?;
        Ok(word_ids
            .iter()
            .filter_map(|w| state.progress.get(&(student_id, *w)).cloned())
            .collect())
    }

    async fn upsert_progress(&self, progress: &Progress) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        state
            .progress
            .insert((progress.student_id(), progress.word_id()), progress.clone());
        Ok(())
    }

    async fn delete_progress_for_student(
        &self,
        student_id: StudentId,
    ) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        state.progress.retain(|(s, _), _| *s != student_id);
        Ok(())
    }

    async fn delete_progress_for_words(&self, word_ids: &[WordId]) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        state.progress.retain(|(_, w), _| !word_ids.contains(w));
        Ok(())
    }
}

#[async_trait]
impl CompletedSessionRepository for InMemoryRepository {
    async fn append_session(&self, record: &NewSessionRecord) -> Result<SessionId, StorageError> {
        let mut state = self.lock()?;
        let duplicate = state.sessions.values().any(|s| {
            s.assignment_id() == record.assignment_id
                && s.session_number() == record.session_number
        });
        if duplicate {
            return Err(StorageError::Conflict);
        }

        let id = SessionId::new(state.allocate());
        let session = CompletedSession::from_persisted(
            id,
            record.assignment_id,
            record.session_number,
            record.word_ids.clone(),
            record.unknown_word_ids.clone(),
            record.completed_date,
        )
        .map_err(domain)?;
        state.sessions.insert(id, session);
        Ok(id)
    }

    async fn get_session(&self, id: SessionId) -> Result<Option<CompletedSession>, StorageError> {
        Ok(self.lock()?.sessions.get(&id).cloned())
    }

    async fn list_sessions(
        &self,
        assignment_id: AssignmentId,
    ) -> Result<Vec<CompletedSession>, StorageError> {
        let state = self.lock()?;
        let mut all: Vec<_> = state
            .sessions
            .values()
            .filter(|s| s.assignment_id() == assignment_id)
            .cloned()
            .collect();
        all.sort_by_key(CompletedSession::session_number);
        Ok(all)
    }

    async fn delete_sessions_for_assignment(
        &self,
        assignment_id: AssignmentId,
    ) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        state.sessions.retain(|_, s| s.assignment_id() != assignment_id);
        Ok(())
    }
}

#[async_trait]
impl OnlineTestRepository for InMemoryRepository {
    async fn append_test(&self, record: &NewTestRecord) -> Result<TestId, StorageError> {
        let mut state = self.lock()?;
        let id = TestId::new(state.allocate());
        let test = OnlineTest::from_persisted(
            id,
            record.session_id,
            record.kind,
            record.total,
            record.correct,
            record.wrong_word_ids.clone(),
            record.taken_at,
        )
        .map_err(domain)?;
        state.tests.insert(id, test);
        Ok(id)
    }

    async fn list_tests(&self, session_id: SessionId) -> Result<Vec<OnlineTest>, StorageError> {
        let state = self.lock()?;
        let mut all: Vec<_> = state
            .tests
            .values()
            .filter(|t| t.session_id() == session_id)
            .cloned()
            .collect();
        all.sort_by_key(|t| (t.taken_at(), t.id()));
        Ok(all)
    }

    async fn delete_tests_for_session(&self, session_id: SessionId) -> Result<(), StorageError> {
        let mut state = self.lock()?;
        state.tests.retain(|_, t| t.session_id() != session_id);
        Ok(())
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
