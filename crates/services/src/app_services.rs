use std::sync::Arc;

use storage::repository::Storage;

use crate::Clock;
use crate::assignment_service::AssignmentService;
use crate::error::AppServicesError;
use crate::online_test_service::OnlineTestService;
use crate::overview_service::OverviewService;
use crate::speech_service::SpeechService;
use crate::student_service::StudentService;
use crate::study::StudyService;
use crate::wordlist_service::WordlistService;

/// Assembles the app-facing services over one storage backend.
#[derive(Clone)]
pub struct AppServices {
    study: Arc<StudyService>,
    students: Arc<StudentService>,
    wordlists: Arc<WordlistService>,
    assignments: Arc<AssignmentService>,
    online_tests: Arc<OnlineTestService>,
    overview: Arc<OverviewService>,
    speech: Arc<SpeechService>,
}

impl AppServices {
    /// Build services backed by `SQLite` storage.
    ///
    /// # Errors
    ///
    /// Returns `AppServicesError` if storage initialization fails.
    pub async fn new_sqlite(db_url: &str, clock: Clock) -> Result<Self, AppServicesError> {
        let storage = Storage::sqlite(db_url).await?;
        Ok(Self::from_storage(&storage, clock))
    }

    /// Build services over an already-connected storage aggregate; tests use
    /// this with the in-memory backend.
    #[must_use]
    pub fn from_storage(storage: &Storage, clock: Clock) -> Self {
        Self {
            study: Arc::new(StudyService::new(clock, storage)),
            students: Arc::new(StudentService::new(clock, storage)),
            wordlists: Arc::new(WordlistService::new(clock, storage)),
            assignments: Arc::new(AssignmentService::new(clock, storage)),
            online_tests: Arc::new(OnlineTestService::new(clock, storage)),
            overview: Arc::new(OverviewService::new(storage)),
            speech: Arc::new(SpeechService::from_env()),
        }
    }

    #[must_use]
    pub fn study(&self) -> Arc<StudyService> {
        Arc::clone(&self.study)
    }

    #[must_use]
    pub fn students(&self) -> Arc<StudentService> {
        Arc::clone(&self.students)
    }

    #[must_use]
    pub fn wordlists(&self) -> Arc<WordlistService> {
        Arc::clone(&self.wordlists)
    }

    #[must_use]
    pub fn assignments(&self) -> Arc<AssignmentService> {
        Arc::clone(&self.assignments)
    }

    #[must_use]
    pub fn online_tests(&self) -> Arc<OnlineTestService> {
        Arc::clone(&self.online_tests)
    }

    #[must_use]
    pub fn overview(&self) -> Arc<OverviewService> {
        Arc::clone(&self.overview)
    }

    #[must_use]
    pub fn speech(&self) -> Arc<SpeechService> {
        Arc::clone(&self.speech)
    }
}
