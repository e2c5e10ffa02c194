//! Shared error types for the services crate.

use thiserror::Error;

use storage::repository::StorageError;
use storage::sqlite::SqliteInitError;
use voca_core::model::{
    AssignmentError, AuthError, CompletedSessionError, OnlineTestError, ProgressError,
    StudentError, WordError, WordId, WordlistError,
};

/// Errors emitted by `StudyService` and the study-session engine.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StudyError {
    #[error("student not found")]
    StudentNotFound,
    #[error("assignment not found")]
    AssignmentNotFound,
    #[error("wordlist not found")]
    WordlistNotFound,
    #[error("assignment does not belong to this student")]
    WrongStudent,
    #[error("word {0} is not part of this assignment")]
    WordNotInSession(WordId),
    #[error("word {0} was not marked known in the open session")]
    NotRevertible(WordId),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Progress(#[from] ProgressError),
    #[error(transparent)]
    Assignment(#[from] AssignmentError),
    #[error(transparent)]
    Session(#[from] CompletedSessionError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `StudentService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum StudentServiceError {
    #[error("student not found")]
    NotFound,
    #[error("access token does not match any student")]
    UnknownToken,
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Student(#[from] StudentError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `WordlistService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum WordlistServiceError {
    #[error("wordlist not found")]
    NotFound,
    #[error(transparent)]
    Wordlist(#[from] WordlistError),
    #[error(transparent)]
    Word(#[from] WordError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `AssignmentService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AssignmentServiceError {
    #[error("assignment not found")]
    NotFound,
    #[error("student not found")]
    StudentNotFound,
    #[error("wordlist not found")]
    WordlistNotFound,
    #[error(transparent)]
    Assignment(#[from] AssignmentError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `OnlineTestService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum OnlineTestServiceError {
    #[error("session not found")]
    SessionNotFound,
    #[error("assignment not found")]
    AssignmentNotFound,
    #[error("wordlist not found")]
    WordlistNotFound,
    #[error("the session has no words for this test kind")]
    EmptyCandidates,
    #[error("word {0} was not part of the tested session")]
    UnknownWord(WordId),
    #[error(transparent)]
    Test(#[from] OnlineTestError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `OverviewService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum OverviewError {
    #[error("student not found")]
    StudentNotFound,
    #[error("wordlist not found")]
    WordlistNotFound,
    #[error(transparent)]
    Storage(#[from] StorageError),
}

/// Errors emitted by `SpeechService`.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SpeechError {
    #[error("speech synthesis is not configured")]
    Disabled,
    #[error("speech synthesis returned an empty response")]
    EmptyResponse,
    #[error("speech synthesis request failed with status {0}")]
    HttpStatus(reqwest::StatusCode),
    #[error(transparent)]
    Http(#[from] reqwest::Error),
}

/// Errors emitted while bootstrapping app services.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum AppServicesError {
    #[error(transparent)]
    Sqlite(#[from] SqliteInitError),
    #[error(transparent)]
    Storage(#[from] StorageError),
}
