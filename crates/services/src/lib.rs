#![forbid(unsafe_code)]

pub mod app_services;
pub mod assignment_service;
pub mod error;
pub mod online_test_service;
pub mod overview_service;
pub mod speech_service;
pub mod student_service;
pub mod study;
pub mod wordlist_service;

pub use voca_core::Clock;

pub use app_services::AppServices;
pub use assignment_service::AssignmentService;
pub use error::{
    AppServicesError, AssignmentServiceError, OnlineTestServiceError, OverviewError, SpeechError,
    StudentServiceError, StudyError, WordlistServiceError,
};
pub use online_test_service::{OnlineTestService, Quiz, QuizQuestion};
pub use overview_service::{AssignmentOverview, OverviewService, StudentOverview};
pub use speech_service::{SpeechConfig, SpeechService};
pub use student_service::StudentService;
pub use study::{
    NextStep, Resolution, SessionCounts, StudyEvent, StudyOutcome, StudyService, StudySession,
};
pub use wordlist_service::{WordDraft, WordlistService};
