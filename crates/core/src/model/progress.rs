use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::ids::{StudentId, WordId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ProgressError {
    #[error("invalid status transition: {from:?} -> {to:?}")]
    InvalidTransition { from: WordStatus, to: WordStatus },

    #[error("completed progress row is missing its completion timestamp")]
    MissingCompletedAt,
}

//
// ─── WORD STATUS ───────────────────────────────────────────────────────────────
//

/// Per-word study state within an assignment pass.
///
/// Reachable transitions through the public operations are exactly:
/// `NotStarted -> Completed`, `NotStarted -> Skipped`, `Skipped -> Completed`,
/// and `Completed -> Skipped` via explicit revert only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordStatus {
    NotStarted,
    Completed,
    Skipped,
}

impl WordStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            WordStatus::NotStarted => "not_started",
            WordStatus::Completed => "completed",
            WordStatus::Skipped => "skipped",
        }
    }
}

//
// ─── PROGRESS ──────────────────────────────────────────────────────────────────
//

/// Persistent per-(student, word) study record.
///
/// Exactly one row exists per pair; rows are created lazily on the first
/// response and updated in place afterwards. The session resolver depends on
/// that uniqueness.
#[derive(Debug, Clone, PartialEq)]
pub struct Progress {
    student_id: StudentId,
    word_id: WordId,
    status: WordStatus,
    skip_count: u32,
    completed_at: Option<DateTime<Utc>>,
    last_skipped_at: Option<DateTime<Utc>>,
    skipped_in_pass: Option<u32>,
    updated_at: DateTime<Utc>,
}

impl Progress {
    /// Fresh not-started row, created the first time a word is acted on.
    #[must_use]
    pub fn new(student_id: StudentId, word_id: WordId, now: DateTime<Utc>) -> Self {
        Self {
            student_id,
            word_id,
            status: WordStatus::NotStarted,
            skip_count: 0,
            completed_at: None,
            last_skipped_at: None,
            skipped_in_pass: None,
            updated_at: now,
        }
    }

    /// Rehydrate a progress row from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::MissingCompletedAt` if a completed row has no
    /// completion timestamp.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        student_id: StudentId,
        word_id: WordId,
        status: WordStatus,
        skip_count: u32,
        completed_at: Option<DateTime<Utc>>,
        last_skipped_at: Option<DateTime<Utc>>,
        skipped_in_pass: Option<u32>,
        updated_at: DateTime<Utc>,
    ) -> Result<Self, ProgressError> {
        if status == WordStatus::Completed && completed_at.is_none() {
            return Err(ProgressError::MissingCompletedAt);
        }

        Ok(Self {
            student_id,
            word_id,
            status,
            skip_count,
            completed_at,
            last_skipped_at,
            skipped_in_pass,
            updated_at,
        })
    }

    /// The student marked this word as known.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::InvalidTransition` if the word is already
    /// completed.
    pub fn mark_completed(&mut self, now: DateTime<Utc>) -> Result<(), ProgressError> {
        match self.status {
            WordStatus::NotStarted | WordStatus::Skipped => {
                self.status = WordStatus::Completed;
                self.completed_at = Some(now);
                self.updated_at = now;
                Ok(())
            }
            WordStatus::Completed => Err(ProgressError::InvalidTransition {
                from: self.status,
                to: WordStatus::Completed,
            }),
        }
    }

    /// The student marked this word as unknown during `pass`.
    ///
    /// Re-skipping an already-skipped word on a later pass is allowed and
    /// bumps the skip count without a status transition.
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::InvalidTransition` if the word is completed;
    /// completed words only become skipped again through an explicit revert.
    pub fn mark_skipped(&mut self, now: DateTime<Utc>, pass: u32) -> Result<(), ProgressError> {
        match self.status {
            WordStatus::NotStarted | WordStatus::Skipped => {
                self.status = WordStatus::Skipped;
                self.skip_count = self.skip_count.saturating_add(1);
                self.last_skipped_at = Some(now);
                self.skipped_in_pass = Some(pass);
                self.updated_at = now;
                Ok(())
            }
            WordStatus::Completed => Err(ProgressError::InvalidTransition {
                from: self.status,
                to: WordStatus::Skipped,
            }),
        }
    }

    /// Undo a completion within the still-open session.
    ///
    /// The word returns to the queue immediately (no pass tag); the skip
    /// count is untouched since the student never answered "don't know".
    ///
    /// # Errors
    ///
    /// Returns `ProgressError::InvalidTransition` unless the word is
    /// currently completed.
    pub fn revert_to_skipped(&mut self, now: DateTime<Utc>) -> Result<(), ProgressError> {
        if self.status != WordStatus::Completed {
            return Err(ProgressError::InvalidTransition {
                from: self.status,
                to: WordStatus::Skipped,
            });
        }
        self.status = WordStatus::Skipped;
        self.completed_at = None;
        self.skipped_in_pass = None;
        self.updated_at = now;
        Ok(())
    }

    /// Re-initialize the row when its word rolls into a derived review
    /// assignment, so the new generation starts from a clean slate. The
    /// lifetime skip count is preserved for statistics.
    pub fn reset_for_review(&mut self, now: DateTime<Utc>) {
        self.status = WordStatus::NotStarted;
        self.completed_at = None;
        self.last_skipped_at = None;
        self.skipped_in_pass = None;
        self.updated_at = now;
    }

    #[must_use]
    pub fn student_id(&self) -> StudentId {
        self.student_id
    }

    #[must_use]
    pub fn word_id(&self) -> WordId {
        self.word_id
    }

    #[must_use]
    pub fn status(&self) -> WordStatus {
        self.status
    }

    #[must_use]
    pub fn skip_count(&self) -> u32 {
        self.skip_count
    }

    #[must_use]
    pub fn completed_at(&self) -> Option<DateTime<Utc>> {
        self.completed_at
    }

    #[must_use]
    pub fn last_skipped_at(&self) -> Option<DateTime<Utc>> {
        self.last_skipped_at
    }

    /// The pass during which the word was last skipped; `None` for rows that
    /// were never skipped or were reverted (immediately eligible again).
    #[must_use]
    pub fn skipped_in_pass(&self) -> Option<u32> {
        self.skipped_in_pass
    }

    #[must_use]
    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
