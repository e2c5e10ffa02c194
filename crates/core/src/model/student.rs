use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::auth::AccessToken;
use crate::model::ids::StudentId;

/// Smallest daily goal a teacher may set.
pub const DAILY_GOAL_MIN: u32 = 5;
/// Largest daily goal a teacher may set.
pub const DAILY_GOAL_MAX: u32 = 100;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum StudentError {
    #[error("student name cannot be empty")]
    EmptyName,

    #[error("daily goal {0} outside allowed range {DAILY_GOAL_MIN}..={DAILY_GOAL_MAX}")]
    InvalidDailyGoal(u32),
}

/// Validate a daily word goal against the allowed range.
///
/// # Errors
///
/// Returns `StudentError::InvalidDailyGoal` when outside `[5, 100]`.
pub fn validate_daily_goal(goal: u32) -> Result<(), StudentError> {
    if !(DAILY_GOAL_MIN..=DAILY_GOAL_MAX).contains(&goal) {
        return Err(StudentError::InvalidDailyGoal(goal));
    }
    Ok(())
}

//
// ─── STUDENT ───────────────────────────────────────────────────────────────────
//

/// A learner account created by a teacher.
///
/// Students authenticate with an opaque access token rather than a password;
/// the daily goal is the default number of words per study day, which an
/// assignment may override.
#[derive(Debug, Clone, PartialEq)]
pub struct Student {
    id: StudentId,
    name: String,
    daily_goal: u32,
    token: AccessToken,
    token_issued_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl Student {
    /// Creates a new student with a freshly minted token.
    ///
    /// # Errors
    ///
    /// Returns `StudentError::EmptyName` if the name is empty or whitespace,
    /// or `StudentError::InvalidDailyGoal` if the goal is outside `[5, 100]`.
    pub fn new(
        id: StudentId,
        name: impl Into<String>,
        daily_goal: u32,
        created_at: DateTime<Utc>,
    ) -> Result<Self, StudentError> {
        Self::from_persisted(
            id,
            name,
            daily_goal,
            AccessToken::generate(),
            created_at,
            created_at,
        )
    }

    /// Rehydrate a student from persisted storage.
    ///
    /// # Errors
    ///
    /// Same validation as [`Student::new`].
    pub fn from_persisted(
        id: StudentId,
        name: impl Into<String>,
        daily_goal: u32,
        token: AccessToken,
        token_issued_at: DateTime<Utc>,
        created_at: DateTime<Utc>,
    ) -> Result<Self, StudentError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(StudentError::EmptyName);
        }
        validate_daily_goal(daily_goal)?;

        Ok(Self {
            id,
            name: name.trim().to_owned(),
            daily_goal,
            token,
            token_issued_at,
            created_at,
        })
    }

    /// Change the default daily goal.
    ///
    /// # Errors
    ///
    /// Returns `StudentError::InvalidDailyGoal` when outside `[5, 100]`.
    pub fn set_daily_goal(&mut self, goal: u32) -> Result<(), StudentError> {
        validate_daily_goal(goal)?;
        self.daily_goal = goal;
        Ok(())
    }

    /// Replace the access token, invalidating the previous one.
    pub fn rotate_token(&mut self, now: DateTime<Utc>) -> AccessToken {
        self.token = AccessToken::generate();
        self.token_issued_at = now;
        self.token.clone()
    }

    #[must_use]
    pub fn id(&self) -> StudentId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn daily_goal(&self) -> u32 {
        self.daily_goal
    }

    #[must_use]
    pub fn token(&self) -> &AccessToken {
        &self.token
    }

    #[must_use]
    pub fn token_issued_at(&self) -> DateTime<Utc> {
        self.token_issued_at
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
