use std::sync::Arc;

use storage::repository::{
    AssignmentRepository, CompletedSessionRepository, NewWordRecord, NewWordlistRecord,
    OnlineTestRepository, ProgressRepository, Storage, WordlistRepository,
};
use voca_core::Clock;
use voca_core::model::{Word, WordError, Wordlist, WordlistId, WordlistKind};

use crate::assignment_service::delete_assignment_tree;
use crate::error::WordlistServiceError;

const LIST_LIMIT: u32 = 256;

/// Draft of one word in a new wordlist; blank optional fields are dropped.
#[derive(Debug, Clone)]
pub struct WordDraft {
    pub text: String,
    pub meaning: String,
    pub example: Option<String>,
    pub mnemonic: Option<String>,
    pub audio_url: Option<String>,
}

impl WordDraft {
    fn validate(&self) -> Result<(), WordError> {
        if self.text.trim().is_empty() {
            return Err(WordError::EmptyText);
        }
        if self.meaning.trim().is_empty() {
            return Err(WordError::EmptyMeaning);
        }
        Ok(())
    }
}

/// Creates and manages shared wordlists.
#[derive(Clone)]
pub struct WordlistService {
    clock: Clock,
    wordlists: Arc<dyn WordlistRepository>,
    assignments: Arc<dyn AssignmentRepository>,
    progress: Arc<dyn ProgressRepository>,
    sessions: Arc<dyn CompletedSessionRepository>,
    tests: Arc<dyn OnlineTestRepository>,
}

impl WordlistService {
    #[must_use]
    pub fn new(clock: Clock, storage: &Storage) -> Self {
        Self {
            clock,
            wordlists: Arc::clone(&storage.wordlists),
            assignments: Arc::clone(&storage.assignments),
            progress: Arc::clone(&storage.progress),
            sessions: Arc::clone(&storage.sessions),
            tests: Arc::clone(&storage.tests),
        }
    }

    /// Create an original wordlist; word positions follow draft order.
    ///
    /// # Errors
    ///
    /// Returns `WordlistServiceError` for an empty name, a word with blank
    /// text or meaning, or storage failure.
    pub async fn create(
        &self,
        name: &str,
        words: Vec<WordDraft>,
    ) -> Result<Wordlist, WordlistServiceError> {
        if name.trim().is_empty() {
            return Err(voca_core::model::WordlistError::EmptyName.into());
        }
        for draft in &words {
            draft.validate()?;
        }

        let record = NewWordlistRecord {
            name: name.trim().to_owned(),
            kind: WordlistKind::Original,
            created_at: self.clock.now(),
            words: words
                .into_iter()
                .map(|d| NewWordRecord {
                    text: d.text,
                    meaning: d.meaning,
                    example: d.example.filter(|s| !s.trim().is_empty()),
                    mnemonic: d.mnemonic.filter(|s| !s.trim().is_empty()),
                    audio_url: d.audio_url.filter(|s| !s.trim().is_empty()),
                })
                .collect(),
        };
        let id = self.wordlists.insert_wordlist(&record).await?;
        self.get(id).await
    }

    /// Fetch one wordlist.
    ///
    /// # Errors
    ///
    /// Returns `WordlistServiceError::NotFound` when missing.
    pub async fn get(&self, id: WordlistId) -> Result<Wordlist, WordlistServiceError> {
        self.wordlists
            .get_wordlist(id)
            .await?
            .ok_or(WordlistServiceError::NotFound)
    }

    /// All wordlists, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `WordlistServiceError` on storage failure.
    pub async fn list(&self) -> Result<Vec<Wordlist>, WordlistServiceError> {
        Ok(self.wordlists.list_wordlists(LIST_LIMIT).await?)
    }

    /// All words of a list, in sequence order.
    ///
    /// # Errors
    ///
    /// Returns `WordlistServiceError` on storage failure.
    pub async fn words(&self, id: WordlistId) -> Result<Vec<Word>, WordlistServiceError> {
        Ok(self.wordlists.list_words(id).await?)
    }

    /// Delete a wordlist and every dependent row: assignment chains targeting
    /// it (sessions and tests included), progress for its words, the words
    /// themselves.
    ///
    /// # Errors
    ///
    /// Returns `WordlistServiceError::NotFound` when missing.
    pub async fn delete(&self, id: WordlistId) -> Result<(), WordlistServiceError> {
        if self.wordlists.get_wordlist(id).await?.is_none() {
            return Err(WordlistServiceError::NotFound);
        }

        let assignments = self.assignments.list_for_wordlist(id).await?;
        // Review children share the wordlist id, so roots are enough.
        for assignment in assignments
            .iter()
            .filter(|a| a.parent_assignment_id().is_none())
        {
            delete_assignment_tree(
                self.assignments.as_ref(),
                self.sessions.as_ref(),
                self.tests.as_ref(),
                assignment.id(),
            )
            .await?;
        }

        let word_ids: Vec<_> = self
            .wordlists
            .list_words(id)
            .await?
            .iter()
            .map(Word::id)
            .collect();
        self.progress.delete_progress_for_words(&word_ids).await?;
        self.wordlists.delete_wordlist(id).await?;
        tracing::info!(wordlist_id = %id, "wordlist deleted");
        Ok(())
    }
}
