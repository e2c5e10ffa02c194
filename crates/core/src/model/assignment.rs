use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::ids::{AssignmentId, StudentId, WordId, WordlistId};
use crate::model::student::{StudentError, validate_daily_goal};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AssignmentError {
    #[error("generation must be >= 1")]
    InvalidGeneration,

    #[error("filtered word set cannot be empty")]
    EmptyFilter,

    #[error("review assignment (generation > 1) requires a parent assignment")]
    MissingParent,

    #[error("pass counter must be >= 1")]
    InvalidPass,

    #[error(transparent)]
    Goal(#[from] StudentError),
}

//
// ─── ASSIGNMENT ────────────────────────────────────────────────────────────────
//

/// Binds one student to one wordlist, with its own progress configuration.
///
/// Generation 1 is the teacher-created original; generations above 1 are
/// auto-derived review assignments that replay only the words the student
/// previously marked unknown (the `filtered_word_ids` subset, frozen at
/// creation time and never recalculated).
#[derive(Debug, Clone, PartialEq)]
pub struct Assignment {
    id: AssignmentId,
    student_id: StudentId,
    wordlist_id: WordlistId,
    generation: u32,
    filtered_word_ids: Option<Vec<WordId>>,
    parent_assignment_id: Option<AssignmentId>,
    is_auto_generated: bool,
    daily_goal: Option<u32>,
    current_pass: u32,
    created_at: DateTime<Utc>,
}

impl Assignment {
    /// Creates a first-generation assignment covering the whole wordlist.
    ///
    /// # Errors
    ///
    /// Returns `AssignmentError::Goal` if the daily-goal override is outside
    /// the allowed range.
    pub fn new(
        id: AssignmentId,
        student_id: StudentId,
        wordlist_id: WordlistId,
        daily_goal: Option<u32>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, AssignmentError> {
        Self::from_persisted(
            id, student_id, wordlist_id, 1, None, None, false, daily_goal, 1, created_at,
        )
    }

    /// Creates the derived review assignment spawned when a generation
    /// completes with leftover unknown words.
    ///
    /// # Errors
    ///
    /// Returns `AssignmentError::EmptyFilter` if the unknown pool is empty.
    pub fn derive_review(
        id: AssignmentId,
        parent: &Assignment,
        unknown_pool: Vec<WordId>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, AssignmentError> {
        Self::from_persisted(
            id,
            parent.student_id,
            parent.wordlist_id,
            parent.generation + 1,
            Some(unknown_pool),
            Some(parent.id),
            true,
            parent.daily_goal,
            1,
            created_at,
        )
    }

    /// Rehydrate an assignment from persisted storage.
    ///
    /// # Errors
    ///
    /// Returns `AssignmentError` if any structural invariant is violated.
    #[allow(clippy::too_many_arguments)]
    pub fn from_persisted(
        id: AssignmentId,
        student_id: StudentId,
        wordlist_id: WordlistId,
        generation: u32,
        filtered_word_ids: Option<Vec<WordId>>,
        parent_assignment_id: Option<AssignmentId>,
        is_auto_generated: bool,
        daily_goal: Option<u32>,
        current_pass: u32,
        created_at: DateTime<Utc>,
    ) -> Result<Self, AssignmentError> {
        if generation == 0 {
            return Err(AssignmentError::InvalidGeneration);
        }
        if generation > 1 && parent_assignment_id.is_none() {
            return Err(AssignmentError::MissingParent);
        }
        if let Some(filter) = &filtered_word_ids {
            if filter.is_empty() {
                return Err(AssignmentError::EmptyFilter);
            }
        }
        if current_pass == 0 {
            return Err(AssignmentError::InvalidPass);
        }
        if let Some(goal) = daily_goal {
            validate_daily_goal(goal)?;
        }

        Ok(Self {
            id,
            student_id,
            wordlist_id,
            generation,
            filtered_word_ids,
            parent_assignment_id,
            is_auto_generated,
            daily_goal,
            current_pass,
            created_at,
        })
    }

    /// The daily goal in effect: the override if set, else the student's.
    #[must_use]
    pub fn effective_daily_goal(&self, student_default: u32) -> u32 {
        self.daily_goal.unwrap_or(student_default)
    }

    /// Override the per-assignment daily goal.
    ///
    /// # Errors
    ///
    /// Returns `AssignmentError::Goal` when outside `[5, 100]`.
    pub fn set_daily_goal(&mut self, goal: Option<u32>) -> Result<(), AssignmentError> {
        if let Some(goal) = goal {
            validate_daily_goal(goal)?;
        }
        self.daily_goal = goal;
        Ok(())
    }

    /// Advance to the given pass. Passes only move forward.
    pub fn advance_pass(&mut self, pass: u32) {
        if pass > self.current_pass {
            self.current_pass = pass;
        }
    }

    #[must_use]
    pub fn id(&self) -> AssignmentId {
        self.id
    }

    #[must_use]
    pub fn student_id(&self) -> StudentId {
        self.student_id
    }

    #[must_use]
    pub fn wordlist_id(&self) -> WordlistId {
        self.wordlist_id
    }

    #[must_use]
    pub fn generation(&self) -> u32 {
        self.generation
    }

    #[must_use]
    pub fn filtered_word_ids(&self) -> Option<&[WordId]> {
        self.filtered_word_ids.as_deref()
    }

    #[must_use]
    pub fn parent_assignment_id(&self) -> Option<AssignmentId> {
        self.parent_assignment_id
    }

    #[must_use]
    pub fn is_auto_generated(&self) -> bool {
        self.is_auto_generated
    }

    #[must_use]
    pub fn daily_goal(&self) -> Option<u32> {
        self.daily_goal
    }

    #[must_use]
    pub fn current_pass(&self) -> u32 {
        self.current_pass
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    fn original() -> Assignment {
        Assignment::new(
            AssignmentId::new(1),
            StudentId::new(1),
            WordlistId::new(1),
            None,
            fixed_now(),
        )
        .unwrap()
    }

    #[test]
    fn original_assignment_is_generation_one() {
        let assignment = original();
        assert_eq!(assignment.generation(), 1);
        assert!(assignment.filtered_word_ids().is_none());
        assert!(!assignment.is_auto_generated());
        assert_eq!(assignment.current_pass(), 1);
    }

    #[test]
    fn review_assignment_inherits_from_parent() {
        let parent = original();
        let review = Assignment::derive_review(
            AssignmentId::new(2),
            &parent,
            vec![WordId::new(7), WordId::new(9)],
            fixed_now(),
        )
        .unwrap();

        assert_eq!(review.generation(), 2);
        assert_eq!(review.parent_assignment_id(), Some(parent.id()));
        assert!(review.is_auto_generated());
        assert_eq!(
            review.filtered_word_ids(),
            Some(&[WordId::new(7), WordId::new(9)][..])
        );
    }

    #[test]
    fn review_with_empty_pool_is_rejected() {
        let parent = original();
        let err = Assignment::derive_review(AssignmentId::new(2), &parent, Vec::new(), fixed_now())
            .unwrap_err();
        assert_eq!(err, AssignmentError::EmptyFilter);
    }

    #[test]
    fn generation_above_one_needs_a_parent() {
        let err = Assignment::from_persisted(
            AssignmentId::new(2),
            StudentId::new(1),
            WordlistId::new(1),
            2,
            Some(vec![WordId::new(1)]),
            None,
            true,
            None,
            1,
            fixed_now(),
        )
        .unwrap_err();
        assert_eq!(err, AssignmentError::MissingParent);
    }

    #[test]
    fn effective_goal_prefers_override() {
        let mut assignment = original();
        assert_eq!(assignment.effective_daily_goal(20), 20);
        assignment.set_daily_goal(Some(10)).unwrap();
        assert_eq!(assignment.effective_daily_goal(20), 10);
    }

    #[test]
    fn goal_override_is_validated() {
        let mut assignment = original();
        let err = assignment.set_daily_goal(Some(3)).unwrap_err();
        assert!(matches!(err, AssignmentError::Goal(_)));
    }

    #[test]
    fn passes_never_move_backwards() {
        let mut assignment = original();
        assignment.advance_pass(3);
        assignment.advance_pass(2);
        assert_eq!(assignment.current_pass(), 3);
    }
}
