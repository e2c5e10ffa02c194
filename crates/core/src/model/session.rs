use chrono::{DateTime, Utc};
use std::collections::HashSet;
use thiserror::Error;

use crate::model::ids::{AssignmentId, SessionId, WordId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum CompletedSessionError {
    #[error("session number must be >= 1")]
    InvalidSessionNumber,

    #[error("a completed session must contain at least one known word")]
    NoKnownWords,

    #[error("duplicate word id in session snapshot: {0}")]
    DuplicateWord(WordId),
}

//
// ─── COMPLETED SESSION ─────────────────────────────────────────────────────────
//

/// Immutable snapshot of one finished study day for an assignment.
///
/// `word_ids` holds the words marked known, in completion order;
/// `unknown_word_ids` holds every word skipped during the day, in skip order.
/// A word skipped and later recovered within the same day appears in both
/// lists. Both lists are frozen at creation and never modified.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedSession {
    id: SessionId,
    assignment_id: AssignmentId,
    session_number: u32,
    word_ids: Vec<WordId>,
    unknown_word_ids: Vec<WordId>,
    completed_date: DateTime<Utc>,
}

impl CompletedSession {
    /// Rehydrate (or freeze) a session snapshot.
    ///
    /// # Errors
    ///
    /// Returns `CompletedSessionError` if the snapshot is structurally
    /// invalid.
    pub fn from_persisted(
        id: SessionId,
        assignment_id: AssignmentId,
        session_number: u32,
        word_ids: Vec<WordId>,
        unknown_word_ids: Vec<WordId>,
        completed_date: DateTime<Utc>,
    ) -> Result<Self, CompletedSessionError> {
        if session_number == 0 {
            return Err(CompletedSessionError::InvalidSessionNumber);
        }
        if word_ids.is_empty() {
            return Err(CompletedSessionError::NoKnownWords);
        }
        for list in [&word_ids, &unknown_word_ids] {
            let mut seen = HashSet::with_capacity(list.len());
            for id in list {
                if !seen.insert(*id) {
                    return Err(CompletedSessionError::DuplicateWord(*id));
                }
            }
        }

        Ok(Self {
            id,
            assignment_id,
            session_number,
            word_ids,
            unknown_word_ids,
            completed_date,
        })
    }

    #[must_use]
    pub fn id(&self) -> SessionId {
        self.id
    }

    #[must_use]
    pub fn assignment_id(&self) -> AssignmentId {
        self.assignment_id
    }

    #[must_use]
    pub fn session_number(&self) -> u32 {
        self.session_number
    }

    /// Words marked known, in completion order.
    #[must_use]
    pub fn word_ids(&self) -> &[WordId] {
        &self.word_ids
    }

    /// Words skipped during the day, in skip order.
    #[must_use]
    pub fn unknown_word_ids(&self) -> &[WordId] {
        &self.unknown_word_ids
    }

    #[must_use]
    pub fn completed_date(&self) -> DateTime<Utc> {
        self.completed_date
    }

    /// Every word this day advanced (known ∪ unknown).
    #[must_use]
    pub fn advanced_word_ids(&self) -> HashSet<WordId> {
        self.word_ids
            .iter()
            .chain(self.unknown_word_ids.iter())
            .copied()
            .collect()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
