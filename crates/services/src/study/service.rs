use std::sync::Arc;

use storage::repository::{
    AssignmentRepository, CompletedSessionRepository, NewAssignmentRecord, ProgressRepository,
    Storage, StudentRepository, WordlistRepository,
};
use voca_core::Clock;
use voca_core::model::{AccessToken, Assignment, AssignmentId, SessionId, TokenPolicy, WordId};

use crate::error::StudyError;
use super::completion;
use super::recorder;
use super::resolver::{NextStep, Resolution};
use super::session::StudySession;

/// Side effects of one recorded response, in occurrence order.
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum StudyEvent {
    /// The skip landed on a pass boundary; skipped words are due again.
    PassAdvanced { pass: u32 },
    /// The finished day was frozen into an immutable snapshot.
    SessionFrozen {
        session_id: SessionId,
        session_number: u32,
    },
    /// Every word of the generation is completed.
    GenerationCompleted { perfect: bool },
    /// A review assignment over the unknown pool was derived.
    ReviewAssignmentCreated {
        assignment_id: AssignmentId,
        pool_size: u32,
    },
}

/// Result of recording a single response.
#[derive(Debug, Clone, PartialEq)]
pub struct StudyOutcome {
    pub resolution: Resolution,
    pub events: Vec<StudyEvent>,
}

/// Orchestrates the resolver, recorder and completion detector over the
/// repositories.
#[derive(Clone)]
pub struct StudyService {
    clock: Clock,
    token_policy: TokenPolicy,
    students: Arc<dyn StudentRepository>,
    wordlists: Arc<dyn WordlistRepository>,
    assignments: Arc<dyn AssignmentRepository>,
    progress: Arc<dyn ProgressRepository>,
    sessions: Arc<dyn CompletedSessionRepository>,
}

impl StudyService {
    #[must_use]
    pub fn new(clock: Clock, storage: &Storage) -> Self {
        Self {
            clock,
            token_policy: TokenPolicy::unlimited(),
            students: Arc::clone(&storage.students),
            wordlists: Arc::clone(&storage.wordlists),
            assignments: Arc::clone(&storage.assignments),
            progress: Arc::clone(&storage.progress),
            sessions: Arc::clone(&storage.sessions),
        }
    }

    #[must_use]
    pub fn with_token_policy(mut self, policy: TokenPolicy) -> Self {
        self.token_policy = policy;
        self
    }

    /// Open (or resume) the study session for one of the student's
    /// assignments. The token identifies the student; the session state is
    /// rebuilt from progress rows and frozen snapshots.
    ///
    /// A day that finished without its snapshot (the append failed
    /// mid-action) is frozen here, so reopening always yields a session that
    /// can progress.
    ///
    /// # Errors
    ///
    /// Returns `StudyError` when the token is unknown or expired, the
    /// assignment is missing or belongs to another student, or loading fails.
    pub async fn open_session(
        &self,
        token: &AccessToken,
        assignment_id: AssignmentId,
    ) -> Result<StudySession, StudyError> {
        let now = self.clock.now();
        let student = self
            .students
            .find_student_by_token(token)
            .await?
            .ok_or(StudyError::StudentNotFound)?;
        self.token_policy.validate(student.token_issued_at(), now)?;

        let assignment = self
            .assignments
            .get_assignment(assignment_id)
            .await?
            .ok_or(StudyError::AssignmentNotFound)?;
        if assignment.student_id() != student.id() {
            return Err(StudyError::WrongStudent);
        }

        if self
            .wordlists
            .get_wordlist(assignment.wordlist_id())
            .await?
            .is_none()
        {
            return Err(StudyError::WordlistNotFound);
        }
        let all_words = self.wordlists.list_words(assignment.wordlist_id()).await?;
        let words: Vec<_> = match assignment.filtered_word_ids() {
            Some(filter) => all_words
                .into_iter()
                .filter(|w| filter.contains(&w.id()))
                .collect(),
            None => all_words,
        };

        let word_ids: Vec<WordId> = words.iter().map(voca_core::model::Word::id).collect();
        let progress_rows = self.progress.list_progress(student.id(), &word_ids).await?;
        let snapshots = self.sessions.list_sessions(assignment_id).await?;

        tracing::debug!(
            student_id = %student.id(),
            assignment_id = %assignment_id,
            words = words.len(),
            snapshots = snapshots.len(),
            "study session opened"
        );

        let mut session =
            StudySession::assemble(student, assignment, words, progress_rows, &snapshots);
        self.recover_pending_day(&mut session).await?;
        Ok(session)
    }

    /// The progress upsert and the snapshot append are separate writes, so a
    /// transient failure can leave the final word durably completed with no
    /// snapshot covering it. Such a session resolves to a terminal step while
    /// its known draft is still non-empty; freeze the pending day now instead
    /// of leaving the assignment stuck behind a goal that can never
    /// re-trigger.
    async fn recover_pending_day(&self, session: &mut StudySession) -> Result<(), StudyError> {
        let mut events = Vec::new();
        match session.resolve().next {
            NextStep::Word(_) => {}
            NextStep::GoalReached => {
                if !session.known_draft().is_empty() {
                    self.freeze_day(session, &mut events).await?;
                    tracing::warn!(
                        assignment_id = %session.assignment().id(),
                        "froze a finished day left unfrozen by an earlier failure"
                    );
                }
            }
            NextStep::Exhausted => {
                if !session.known_draft().is_empty() {
                    self.freeze_day(session, &mut events).await?;
                    tracing::warn!(
                        assignment_id = %session.assignment().id(),
                        "froze a finished day left unfrozen by an earlier failure"
                    );
                }
                // Derivation is idempotent; this also picks up a generation
                // whose snapshot froze but whose review never got created.
                self.complete_generation(session, &mut events).await?;
            }
        }
        Ok(())
    }

    /// Record "I know this word".
    ///
    /// Completing the word may finish the day (snapshot frozen) and, when it
    /// was the assignment's last open word, the whole generation; both effects
    /// are reported as events on the outcome.
    ///
    /// # Errors
    ///
    /// Returns `StudyError` when the word is outside the session, the
    /// transition is invalid, or persistence fails.
    pub async fn mark_known(
        &self,
        session: &mut StudySession,
        word_id: WordId,
    ) -> Result<StudyOutcome, StudyError> {
        let now = self.clock.now();
        let row = recorder::record_known(session, word_id, now)?;
        self.progress.upsert_progress(&row).await?;

        let resolution = session.resolve();
        let mut events = Vec::new();
        match resolution.next {
            NextStep::Word(_) => {}
            NextStep::GoalReached => {
                self.freeze_day(session, &mut events).await?;
            }
            NextStep::Exhausted => {
                // Exhaustion below the goal still freezes the partial final
                // session so snapshots cover every advanced word.
                self.freeze_day(session, &mut events).await?;
                self.complete_generation(session, &mut events).await?;
            }
        }

        Ok(StudyOutcome { resolution, events })
    }

    /// Record "I don't know this word".
    ///
    /// # Errors
    ///
    /// Returns `StudyError` when the word is outside the session, already
    /// completed, or persistence fails.
    pub async fn mark_unknown(
        &self,
        session: &mut StudySession,
        word_id: WordId,
    ) -> Result<StudyOutcome, StudyError> {
        let now = self.clock.now();
        let (row, rolled) = recorder::record_unknown(session, word_id, now)?;
        self.progress.upsert_progress(&row).await?;

        let mut events = Vec::new();
        if let Some(pass) = rolled {
            self.assignments
                .update_assignment(session.assignment())
                .await?;
            tracing::debug!(
                assignment_id = %session.assignment().id(),
                pass,
                "pass boundary rolled"
            );
            events.push(StudyEvent::PassAdvanced { pass });
        }

        Ok(StudyOutcome {
            resolution: session.resolve(),
            events,
        })
    }

    /// Undo a completion recorded earlier in the open session. The word
    /// becomes immediately eligible again; its skip statistics are untouched.
    ///
    /// # Errors
    ///
    /// Returns `StudyError::NotRevertible` when the word is not part of the
    /// open day's known draft.
    pub async fn revert_to_skipped(
        &self,
        session: &mut StudySession,
        word_id: WordId,
    ) -> Result<StudyOutcome, StudyError> {
        let now = self.clock.now();
        let row = recorder::record_revert(session, word_id, now)?;
        self.progress.upsert_progress(&row).await?;

        Ok(StudyOutcome {
            resolution: session.resolve(),
            events: Vec::new(),
        })
    }

    async fn freeze_day(
        &self,
        session: &mut StudySession,
        events: &mut Vec<StudyEvent>,
    ) -> Result<(), StudyError> {
        let record = completion::snapshot_record(session, self.clock.now());
        let session_number = record.session_number;
        let session_id = self.sessions.append_session(&record).await?;
        session.absorb_snapshot();

        tracing::info!(
            assignment_id = %session.assignment().id(),
            session_number,
            known = record.word_ids.len(),
            unknown = record.unknown_word_ids.len(),
            "daily session frozen"
        );
        events.push(StudyEvent::SessionFrozen {
            session_id,
            session_number,
        });
        Ok(())
    }

    async fn complete_generation(
        &self,
        session: &mut StudySession,
        events: &mut Vec<StudyEvent>,
    ) -> Result<(), StudyError> {
        let parent_id = session.assignment().id();

        // A child already derived from this assignment suppresses creation;
        // generation completion is idempotent.
        if !self.assignments.list_children(parent_id).await?.is_empty() {
            return Ok(());
        }

        let pool = completion::unknown_pool(session);
        if pool.is_empty() {
            events.push(StudyEvent::GenerationCompleted { perfect: true });
            return Ok(());
        }

        let now = self.clock.now();
        // Validate through the domain type before anything is stored.
        let draft =
            Assignment::derive_review(AssignmentId::new(0), session.assignment(), pool.clone(), now)?;
        let child_id = self
            .assignments
            .insert_assignment(&NewAssignmentRecord::from_assignment(&draft))
            .await?;

        // Pool rows start the review generation from a clean slate; the
        // lifetime skip count survives for statistics.
        for word_id in &pool {
            let row = session.progress_entry(*word_id, now);
            row.reset_for_review(now);
            let updated = row.clone();
            self.progress.upsert_progress(&updated).await?;
        }

        tracing::info!(
            parent_id = %parent_id,
            child_id = %child_id,
            pool = pool.len(),
            "review assignment derived"
        );
        events.push(StudyEvent::GenerationCompleted { perfect: false });
        events.push(StudyEvent::ReviewAssignmentCreated {
            assignment_id: child_id,
            pool_size: u32::try_from(pool.len()).unwrap_or(u32::MAX),
        });
        Ok(())
    }
}
