use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::ids::{SessionId, TestId, WordId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum OnlineTestError {
    #[error("test total ({total}) does not match correct ({correct}) + wrong ({wrong})")]
    CountMismatch { total: u32, correct: u32, wrong: u32 },

    #[error("test cannot cover zero words")]
    EmptyTest,
}

//
// ─── TEST KIND ─────────────────────────────────────────────────────────────────
//

/// Which half of a completed session a quiz draws from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestKind {
    /// Quiz over the words marked known that day.
    Known,
    /// Quiz over the words marked unknown that day.
    Unknown,
}

impl TestKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TestKind::Known => "known",
            TestKind::Unknown => "unknown",
        }
    }
}

//
// ─── ONLINE TEST ───────────────────────────────────────────────────────────────
//

/// Scored quiz result attached to one completed session. Append-only.
#[derive(Debug, Clone, PartialEq)]
pub struct OnlineTest {
    id: TestId,
    session_id: SessionId,
    kind: TestKind,
    total: u32,
    correct: u32,
    wrong_word_ids: Vec<WordId>,
    taken_at: DateTime<Utc>,
}

impl OnlineTest {
    /// Rehydrate (or record) a test result.
    ///
    /// # Errors
    ///
    /// Returns `OnlineTestError::CountMismatch` if the tallies do not align,
    /// or `OnlineTestError::EmptyTest` for a zero-word test.
    pub fn from_persisted(
        id: TestId,
        session_id: SessionId,
        kind: TestKind,
        total: u32,
        correct: u32,
        wrong_word_ids: Vec<WordId>,
        taken_at: DateTime<Utc>,
    ) -> Result<Self, OnlineTestError> {
        if total == 0 {
            return Err(OnlineTestError::EmptyTest);
        }
        let wrong = u32::try_from(wrong_word_ids.len()).unwrap_or(u32::MAX);
        if correct.saturating_add(wrong) != total {
            return Err(OnlineTestError::CountMismatch {
                total,
                correct,
                wrong,
            });
        }

        Ok(Self {
            id,
            session_id,
            kind,
            total,
            correct,
            wrong_word_ids,
            taken_at,
        })
    }

    #[must_use]
    pub fn id(&self) -> TestId {
        self.id
    }

    #[must_use]
    pub fn session_id(&self) -> SessionId {
        self.session_id
    }

    #[must_use]
    pub fn kind(&self) -> TestKind {
        self.kind
    }

    #[must_use]
    pub fn total(&self) -> u32 {
        self.total
    }

    #[must_use]
    pub fn correct(&self) -> u32 {
        self.correct
    }

    #[must_use]
    pub fn wrong_word_ids(&self) -> &[WordId] {
        &self.wrong_word_ids
    }

    #[must_use]
    pub fn taken_at(&self) -> DateTime<Utc> {
        self.taken_at
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
    fn counts_must_align() {
        let err = OnlineTest::from_persisted(
            TestId::new(1),
            SessionId::new(1),
            TestKind::Known,
            5,
            4,
            vec![WordId::new(9), WordId::new(11)],
            fixed_now(),
        )
        .unwrap_err();
        assert_eq!(
            err,
            OnlineTestError::CountMismatch {
                total: 5,
                correct: 4,
                wrong: 2
            }
        );
    }

    #[test]
    fn zero_word_test_is_rejected() {
        let err = OnlineTest::from_persisted(
            TestId::new(1),
            SessionId::new(1),
            TestKind::Unknown,
            0,
            0,
            vec![],
            fixed_now(),
        )
        .unwrap_err();
        assert_eq!(err, OnlineTestError::EmptyTest);
    }

    #[test]
    fn happy_path() {
        let test = OnlineTest::from_persisted(
            TestId::new(1),
            SessionId::new(3),
            TestKind::Known,
            10,
            8,
            vec![WordId::new(4), WordId::new(7)],
            fixed_now(),
        )
        .unwrap();
        assert_eq!(test.total(), 10);
        assert_eq!(test.correct(), 8);
        assert_eq!(test.wrong_word_ids().len(), 2);
        assert_eq!(test.kind(), TestKind::Known);
    }
}
