use std::collections::HashSet;
use std::sync::Arc;

use rand::rng;
use rand::seq::SliceRandom;
use storage::repository::{
    AssignmentRepository, CompletedSessionRepository, NewTestRecord, OnlineTestRepository,
    Storage, WordlistRepository,
};
use voca_core::Clock;
use voca_core::model::{OnlineTest, SessionId, TestKind, Word, WordId};

use crate::error::OnlineTestServiceError;

const OPTIONS_PER_QUESTION: usize = 4;

/// One multiple-choice question: pick the meaning for a word.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuizQuestion {
    pub word_id: WordId,
    pub prompt: String,
    pub options: Vec<String>,
    pub answer_index: usize,
}

/// A shuffled quiz over one frozen session's words.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Quiz {
    pub session_id: SessionId,
    pub kind: TestKind,
    pub questions: Vec<QuizQuestion>,
}

/// Builds quizzes from frozen sessions and records the scored results.
#[derive(Clone)]
pub struct OnlineTestService {
    clock: Clock,
    wordlists: Arc<dyn WordlistRepository>,
    assignments: Arc<dyn AssignmentRepository>,
    sessions: Arc<dyn CompletedSessionRepository>,
    tests: Arc<dyn OnlineTestRepository>,
}

impl OnlineTestService {
    #[must_use]
    pub fn new(clock: Clock, storage: &Storage) -> Self {
        Self {
            clock,
            wordlists: Arc::clone(&storage.wordlists),
            assignments: Arc::clone(&storage.assignments),
            sessions: Arc::clone(&storage.sessions),
            tests: Arc::clone(&storage.tests),
        }
    }

    /// Build a shuffled meaning-choice quiz over the session's known or
    /// unknown words.
    ///
    /// # Errors
    ///
    /// Returns `OnlineTestServiceError::EmptyCandidates` when the chosen side
    /// of the snapshot has no words.
    pub async fn build_quiz(
        &self,
        session_id: SessionId,
        kind: TestKind,
    ) -> Result<Quiz, OnlineTestServiceError> {
        let (candidates, words) = self.load_candidates(session_id, kind).await?;

        let mut questions = Vec::with_capacity(candidates.len());
        for word_id in &candidates {
            let Some(word) = words.iter().find(|w| w.id() == *word_id) else {
                // Word removed since the snapshot froze; skip the question.
                continue;
            };

            let mut distractors: Vec<&str> = words
                .iter()
                .filter(|w| w.id() != *word_id)
                .map(Word::meaning)
                .collect();
            distractors.shuffle(&mut rng());
            distractors.truncate(OPTIONS_PER_QUESTION - 1);

            let mut options: Vec<String> =
                distractors.into_iter().map(str::to_owned).collect();
            options.push(word.meaning().to_owned());
            options.shuffle(&mut rng());
            let answer_index = options
                .iter()
                .position(|o| o == word.meaning())
                .unwrap_or(0);

            questions.push(QuizQuestion {
                word_id: *word_id,
                prompt: word.text().to_owned(),
                options,
                answer_index,
            });
        }
        questions.shuffle(&mut rng());

        if questions.is_empty() {
            return Err(OnlineTestServiceError::EmptyCandidates);
        }

        Ok(Quiz {
            session_id,
            kind,
            questions,
        })
    }

    /// Record a finished quiz: the wrong answers, scored against the
    /// session's candidate set. Results are append-only.
    ///
    /// # Errors
    ///
    /// Returns `OnlineTestServiceError::UnknownWord` when a reported wrong
    /// word was not part of the tested session.
    pub async fn submit(
        &self,
        session_id: SessionId,
        kind: TestKind,
        wrong_word_ids: Vec<WordId>,
    ) -> Result<OnlineTest, OnlineTestServiceError> {
        let (candidates, _) = self.load_candidates(session_id, kind).await?;
        let candidate_set: HashSet<WordId> = candidates.iter().copied().collect();

        let mut wrong = Vec::with_capacity(wrong_word_ids.len());
        for word_id in wrong_word_ids {
            if !candidate_set.contains(&word_id) {
                return Err(OnlineTestServiceError::UnknownWord(word_id));
            }
            if !wrong.contains(&word_id) {
                wrong.push(word_id);
            }
        }

        let total = u32::try_from(candidates.len()).unwrap_or(u32::MAX);
        let correct = total - u32::try_from(wrong.len()).unwrap_or(0);
        let record = NewTestRecord {
            session_id,
            kind,
            total,
            correct,
            wrong_word_ids: wrong.clone(),
            taken_at: self.clock.now(),
        };
        let id = self.tests.append_test(&record).await?;

        tracing::info!(
            session_id = %session_id,
            kind = kind.as_str(),
            total,
            correct,
            "online test recorded"
        );
        Ok(OnlineTest::from_persisted(
            id,
            session_id,
            kind,
            total,
            correct,
            wrong,
            record.taken_at,
        )?)
    }

    /// Results recorded for one session, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `OnlineTestServiceError` on storage failure.
    pub async fn results(
        &self,
        session_id: SessionId,
    ) -> Result<Vec<OnlineTest>, OnlineTestServiceError> {
        Ok(self.tests.list_tests(session_id).await?)
    }

    async fn load_candidates(
        &self,
        session_id: SessionId,
        kind: TestKind,
    ) -> Result<(Vec<WordId>, Vec<Word>), OnlineTestServiceError> {
        let session = self
            .sessions
            .get_session(session_id)
            .await?
            .ok_or(OnlineTestServiceError::SessionNotFound)?;
        let assignment = self
            .assignments
            .get_assignment(session.assignment_id())
            .await?
            .ok_or(OnlineTestServiceError::AssignmentNotFound)?;
        if self
            .wordlists
            .get_wordlist(assignment.wordlist_id())
            .await?
            .is_none()
        {
            return Err(OnlineTestServiceError::WordlistNotFound);
        }

        let candidates = match kind {
            TestKind::Known => session.word_ids().to_vec(),
            TestKind::Unknown => session.unknown_word_ids().to_vec(),
        };
        if candidates.is_empty() {
            return Err(OnlineTestServiceError::EmptyCandidates);
        }

        let words = self.wordlists.list_words(assignment.wordlist_id()).await?;
        Ok((candidates, words))
    }
}
