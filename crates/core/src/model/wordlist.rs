use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::ids::{WordId, WordlistId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum WordlistError {
    #[error("wordlist name cannot be empty")]
    EmptyName,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum WordError {
    #[error("word text cannot be empty")]
    EmptyText,

    #[error("word meaning cannot be empty")]
    EmptyMeaning,
}

//
// ─── WORDLIST KIND ─────────────────────────────────────────────────────────────
//

/// Distinguishes teacher-authored lists from auto-derived review lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WordlistKind {
    Original,
    Review,
}

impl WordlistKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            WordlistKind::Original => "original",
            WordlistKind::Review => "review",
        }
    }
}

//
// ─── WORDLIST ──────────────────────────────────────────────────────────────────
//

/// An ordered collection of words assigned to students as a unit.
#[derive(Debug, Clone, PartialEq)]
pub struct Wordlist {
    id: WordlistId,
    name: String,
    kind: WordlistKind,
    word_count: u32,
    created_at: DateTime<Utc>,
}

impl Wordlist {
    /// Creates a new wordlist.
    ///
    /// # Errors
    ///
    /// Returns `WordlistError::EmptyName` if the name is empty or whitespace.
    pub fn new(
        id: WordlistId,
        name: impl Into<String>,
        kind: WordlistKind,
        word_count: u32,
        created_at: DateTime<Utc>,
    ) -> Result<Self, WordlistError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(WordlistError::EmptyName);
        }

        Ok(Self {
            id,
            name: name.trim().to_owned(),
            kind,
            word_count,
            created_at,
        })
    }

    #[must_use]
    pub fn id(&self) -> WordlistId {
        self.id
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn kind(&self) -> WordlistKind {
        self.kind
    }

    #[must_use]
    pub fn word_count(&self) -> u32 {
        self.word_count
    }

    #[must_use]
    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }
}

//
// ─── WORD ──────────────────────────────────────────────────────────────────────
//

/// A single vocabulary entry with its fixed position inside a wordlist.
#[derive(Debug, Clone, PartialEq)]
pub struct Word {
    id: WordId,
    wordlist_id: WordlistId,
    position: u32,
    text: String,
    meaning: String,
    example: Option<String>,
    mnemonic: Option<String>,
    audio_url: Option<String>,
}

impl Word {
    /// Creates a new word.
    ///
    /// # Errors
    ///
    /// Returns `WordError` if text or meaning are empty.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: WordId,
        wordlist_id: WordlistId,
        position: u32,
        text: impl Into<String>,
        meaning: impl Into<String>,
        example: Option<String>,
        mnemonic: Option<String>,
        audio_url: Option<String>,
    ) -> Result<Self, WordError> {
        let text = text.into();
        if text.trim().is_empty() {
            return Err(WordError::EmptyText);
        }
        let meaning = meaning.into();
        if meaning.trim().is_empty() {
            return Err(WordError::EmptyMeaning);
        }

        let non_blank = |s: Option<String>| {
            s.map(|v| v.trim().to_owned()).filter(|v| !v.is_empty())
        };

        Ok(Self {
            id,
            wordlist_id,
            position,
            text: text.trim().to_owned(),
            meaning: meaning.trim().to_owned(),
            example: non_blank(example),
            mnemonic: non_blank(mnemonic),
            audio_url: non_blank(audio_url),
        })
    }

    #[must_use]
    pub fn id(&self) -> WordId {
        self.id
    }

    #[must_use]
    pub fn wordlist_id(&self) -> WordlistId {
        self.wordlist_id
    }

    /// Fixed sequence position within the wordlist.
    #[must_use]
    pub fn position(&self) -> u32 {
        self.position
    }

    #[must_use]
    pub fn text(&self) -> &str {
        &self.text
    }

    #[must_use]
    pub fn meaning(&self) -> &str {
        &self.meaning
    }

    #[must_use]
    pub fn example(&self) -> Option<&str> {
        self.example.as_deref()
    }

    #[must_use]
    pub fn mnemonic(&self) -> Option<&str> {
        self.mnemonic.as_deref()
    }

    #[must_use]
    pub fn audio_url(&self) -> Option<&str> {
        self.audio_url.as_deref()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::fixed_now;

    #[test]
    fn wordlist_rejects_empty_name() {
        let err = Wordlist::new(
            WordlistId::new(1),
            " ",
            WordlistKind::Original,
            0,
            fixed_now(),
        )
        .unwrap_err();
        assert_eq!(err, WordlistError::EmptyName);
    }

    #[test]
    fn wordlist_happy_path() {
        let list = Wordlist::new(
            WordlistId::new(10),
            "  TOEIC Day 1  ",
            WordlistKind::Original,
            30,
            fixed_now(),
        )
        .unwrap();
        assert_eq!(list.name(), "TOEIC Day 1");
        assert_eq!(list.kind(), WordlistKind::Original);
        assert_eq!(list.word_count(), 30);
    }

    #[test]
    fn word_rejects_empty_text_and_meaning() {
        let err = Word::new(
            WordId::new(1),
            WordlistId::new(1),
            0,
            "  ",
            "meaning",
            None,
            None,
            None,
        )
        .unwrap_err();
        assert_eq!(err, WordError::EmptyText);

        let err = Word::new(
            WordId::new(1),
            WordlistId::new(1),
            0,
            "apple",
            " ",
            None,
            None,
            None,
        )
        .unwrap_err();
        assert_eq!(err, WordError::EmptyMeaning);
    }

    #[test]
    fn word_filters_blank_optional_fields() {
        let word = Word::new(
            WordId::new(1),
            WordlistId::new(1),
            3,
            "apple",
            "사과",
            Some("  ".into()),
            Some(" a fruit that keeps doctors away ".into()),
            None,
        )
        .unwrap();
        assert_eq!(word.example(), None);
        assert_eq!(word.mnemonic(), Some("a fruit that keeps doctors away"));
        assert_eq!(word.position(), 3);
    }
}
