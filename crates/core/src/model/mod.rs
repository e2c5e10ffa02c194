mod assignment;
mod auth;
mod ids;
mod online_test;
mod progress;
mod session;
mod student;
mod wordlist;

pub use ids::{AssignmentId, ParseIdError, SessionId, StudentId, TestId, WordId, WordlistId};

pub use assignment::{Assignment, AssignmentError};
pub use auth::{AccessToken, AuthError, TokenPolicy};
pub use online_test::{OnlineTest, OnlineTestError, TestKind};
pub use progress::{Progress, ProgressError, WordStatus};
pub use session::{CompletedSession, CompletedSessionError};
pub use student::{DAILY_GOAL_MAX, DAILY_GOAL_MIN, Student, StudentError, validate_daily_goal};
pub use wordlist::{Word, WordError, Wordlist, WordlistError, WordlistKind};
