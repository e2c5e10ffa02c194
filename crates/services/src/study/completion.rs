//! Completion detection: daily snapshots and generation rollover.

use chrono::{DateTime, Utc};
use storage::repository::NewSessionRecord;
use voca_core::model::WordId;

use super::session::StudySession;

/// Build the frozen snapshot for the day that just finished.
///
/// `word_ids` carries today's known words in completion order and
/// `unknown_word_ids` every word skipped since the last snapshot, in skip
/// order; the session number continues the assignment's sequence.
pub(crate) fn snapshot_record(session: &StudySession, now: DateTime<Utc>) -> NewSessionRecord {
    NewSessionRecord {
        assignment_id: session.assignment().id(),
        session_number: session.session_count() + 1,
        word_ids: session.known_draft().to_vec(),
        unknown_word_ids: session.unknown_draft().to_vec(),
        completed_date: now,
    }
}

/// The unknown pool of a finished generation: every word skipped at some
/// point during this assignment's lifetime, in sequence order.
///
/// Review resets clear `last_skipped_at`, so skips inherited from a parent
/// generation never leak into the pool of a derived assignment.
pub(crate) fn unknown_pool(session: &StudySession) -> Vec<WordId> {
    session
        .ordered_ids()
        .iter()
        .copied()
        .filter(|id| {
            session
                .progress_map()
                .get(id)
                .is_some_and(|p| p.last_skipped_at().is_some())
        })
        .collect()
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
