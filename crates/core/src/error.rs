use thiserror::Error;

use crate::model::{
    AssignmentError, AuthError, CompletedSessionError, OnlineTestError, ProgressError,
    StudentError, WordError, WordlistError,
};

/// Umbrella error for domain-level validation failures.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Student(#[from] StudentError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Wordlist(#[from] WordlistError),
    #[error(transparent)]
    Word(#[from] WordError),
    #[error(transparent)]
    Assignment(#[from] AssignmentError),
    #[error(transparent)]
    Progress(#[from] ProgressError),
    #[error(transparent)]
    Session(#[from] CompletedSessionError),
    #[error(transparent)]
    Test(#[from] OnlineTestError),
}
