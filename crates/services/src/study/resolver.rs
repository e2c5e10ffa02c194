//! Read-only next-word resolution over the effective word set.

use std::collections::HashMap;

use voca_core::model::{Progress, WordId, WordStatus};

/// What the student should see next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NextStep {
    /// Serve this word.
    Word(WordId),
    /// Today's goal is met; the day is over even though words remain.
    GoalReached,
    /// Every word of the assignment is completed.
    Exhausted,
}

/// Counters shown alongside every resolution. Recomputed from progress rows
/// each time, never cached.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionCounts {
    pub today_completed: u32,
    pub today_goal: u32,
    pub total_completed: u32,
    pub total_words: u32,
}

/// One resolved step of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub next: NextStep,
    pub counts: SessionCounts,
}

fn status_of(progress: &HashMap<WordId, Progress>, word_id: WordId) -> WordStatus {
    progress
        .get(&word_id)
        .map_or(WordStatus::NotStarted, Progress::status)
}

/// Is this skipped word eligible before the pass boundary rolls?
///
/// Words skipped during an earlier pass are due again; a reverted completion
/// carries no pass tag and is due immediately.
fn skipped_and_due(progress: &Progress, current_pass: u32) -> bool {
    progress.status() == WordStatus::Skipped
        && progress.skipped_in_pass().is_none_or(|pass| pass < current_pass)
}

/// The next word to serve, or `None` when everything is completed.
///
/// Precedence: skipped words due from an earlier pass, then not-started words,
/// both in sequence order. When only words skipped during the current pass
/// remain, the boundary has been reached and they become eligible in sequence
/// order.
pub(crate) fn next_word(
    ordered: &[WordId],
    progress: &HashMap<WordId, Progress>,
    current_pass: u32,
) -> Option<WordId> {
    let due_skip = ordered.iter().copied().find(|id| {
        progress
            .get(id)
            .is_some_and(|p| skipped_and_due(p, current_pass))
    });
    if due_skip.is_some() {
        return due_skip;
    }

    let not_started = ordered
        .iter()
        .copied()
        .find(|id| status_of(progress, *id) == WordStatus::NotStarted);
    if not_started.is_some() {
        return not_started;
    }

    // Pass boundary: only current-pass skips are left (if anything is).
    ordered
        .iter()
        .copied()
        .find(|id| status_of(progress, *id) == WordStatus::Skipped)
}

/// True when no word of the set is left to serve on the current pass and at
/// least one skipped word exists, i.e. the next skip recording should roll
/// the pass counter forward.
pub(crate) fn at_pass_boundary(
    ordered: &[WordId],
    progress: &HashMap<WordId, Progress>,
    current_pass: u32,
) -> bool {
    let mut any_skipped = false;
    for id in ordered {
        match progress.get(id) {
            None => return false,
            Some(p) => match p.status() {
                WordStatus::NotStarted => return false,
                WordStatus::Skipped => {
                    if skipped_and_due(p, current_pass) {
                        return false;
                    }
                    any_skipped = true;
                }
                WordStatus::Completed => {}
            },
        }
    }
    any_skipped
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//
