//! Applies student responses to the in-memory session state.
//!
//! The recorder mutates progress rows and drafts; persisting the touched rows
//! is the caller's job (`StudyService`), which keeps these transitions
//! synchronously testable.

use chrono::{DateTime, Utc};
use voca_core::model::{Progress, WordId};

use crate::error::StudyError;
use super::resolver;
use super::session::StudySession;

/// Mark a word known. Returns the updated row for persistence.
pub(crate) fn record_known(
    session: &mut StudySession,
    word_id: WordId,
    now: DateTime<Utc>,
) -> Result<Progress, StudyError> {
    if !session.contains(word_id) {
        return Err(StudyError::WordNotInSession(word_id));
    }

    let row = session.progress_entry(word_id, now);
    row.mark_completed(now)?;
    let updated = row.clone();
    session.push_known(word_id);
    Ok(updated)
}

/// Mark a word unknown. Returns the updated row and the new pass number when
/// the skip landed on a pass boundary.
pub(crate) fn record_unknown(
    session: &mut StudySession,
    word_id: WordId,
    now: DateTime<Utc>,
) -> Result<(Progress, Option<u32>), StudyError> {
    if !session.contains(word_id) {
        return Err(StudyError::WordNotInSession(word_id));
    }

    let pass = session.assignment().current_pass();
    let row = session.progress_entry(word_id, now);
    row.mark_skipped(now, pass)?;
    let updated = row.clone();
    session.push_unknown(word_id);

    // When nothing is left to serve on this pass, the skipped set becomes the
    // next pass's queue.
    let rolled = if resolver::at_pass_boundary(session.ordered_ids(), session.progress_map(), pass)
    {
        let next_pass = pass.saturating_add(1);
        session.assignment_mut().advance_pass(next_pass);
        Some(next_pass)
    } else {
        None
    };

    Ok((updated, rolled))
}

/// Undo a completion recorded earlier in the open session.
pub(crate) fn record_revert(
    session: &mut StudySession,
    word_id: WordId,
    now: DateTime<Utc>,
) -> Result<Progress, StudyError> {
    if !session.contains(word_id) {
        return Err(StudyError::WordNotInSession(word_id));
    }
    if !session.known_draft().contains(&word_id) {
        return Err(StudyError::NotRevertible(word_id));
    }

    let row = session.progress_entry(word_id, now);
    row.revert_to_skipped(now)?;
    let updated = row.clone();
    session.retract_known(word_id);
    Ok(updated)
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
