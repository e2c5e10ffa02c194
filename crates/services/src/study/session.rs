use std::collections::{HashMap, HashSet};
use std::fmt;

use chrono::{DateTime, Utc};
use voca_core::model::{
    Assignment, CompletedSession, Progress, Student, Word, WordId, WordStatus,
};

use super::resolver::{self, NextStep, Resolution, SessionCounts};

/// In-memory state for one (student, assignment) study session.
///
/// Loaded from storage when the session opens; the known/unknown drafts are
/// re-derived from progress rows and frozen snapshots so an interrupted day
/// resumes exactly where it stopped.
pub struct StudySession {
    student: Student,
    assignment: Assignment,
    words: Vec<Word>,
    ordered_ids: Vec<WordId>,
    progress: HashMap<WordId, Progress>,
    frozen: HashSet<WordId>,
    session_count: u32,
    known_draft: Vec<WordId>,
    unknown_draft: Vec<WordId>,
}

impl StudySession {
    /// Assemble session state from loaded rows.
    ///
    /// `words` must already be the effective set (filter applied) in sequence
    /// order; `snapshots` are this assignment's frozen sessions.
    pub(crate) fn assemble(
        student: Student,
        assignment: Assignment,
        words: Vec<Word>,
        progress_rows: Vec<Progress>,
        snapshots: &[CompletedSession],
    ) -> Self {
        let ordered_ids: Vec<WordId> = words.iter().map(Word::id).collect();
        let progress: HashMap<WordId, Progress> = progress_rows
            .into_iter()
            .map(|p| (p.word_id(), p))
            .collect();

        let mut frozen = HashSet::new();
        for snapshot in snapshots {
            frozen.extend(snapshot.word_ids().iter().copied());
        }
        let last_snapshot_at = snapshots.iter().map(CompletedSession::completed_date).max();

        // Completed but not yet frozen: today's known words, in completion
        // order. Skipped since the last snapshot: today's unknown words, in
        // skip order.
        let mut known_draft: Vec<(DateTime<Utc>, WordId)> = Vec::new();
        let mut unknown_draft: Vec<(DateTime<Utc>, WordId)> = Vec::new();
        for id in &ordered_ids {
            let Some(row) = progress.get(id) else {
                continue;
            };
            if row.status() == WordStatus::Completed && !frozen.contains(id) {
                if let Some(at) = row.completed_at() {
                    known_draft.push((at, *id));
                }
            }
            if let Some(at) = row.last_skipped_at() {
                if last_snapshot_at.is_none_or(|cutoff| at > cutoff) {
                    unknown_draft.push((at, *id));
                }
            }
        }
        known_draft.sort_by_key(|(at, id)| (*at, *id));
        unknown_draft.sort_by_key(|(at, id)| (*at, *id));

        Self {
            student,
            assignment,
            words,
            ordered_ids,
            progress,
            frozen,
            session_count: u32::try_from(snapshots.len()).unwrap_or(u32::MAX),
            known_draft: known_draft.into_iter().map(|(_, id)| id).collect(),
            unknown_draft: unknown_draft.into_iter().map(|(_, id)| id).collect(),
        }
    }

    /// Resolve the next step and current counters.
    #[must_use]
    pub fn resolve(&self) -> Resolution {
        let counts = self.counts();
        let next = if counts.total_completed == counts.total_words {
            NextStep::Exhausted
        } else if counts.today_completed >= counts.today_goal {
            NextStep::GoalReached
        } else {
            match resolver::next_word(
                &self.ordered_ids,
                &self.progress,
                self.assignment.current_pass(),
            ) {
                Some(word_id) => NextStep::Word(word_id),
                None => NextStep::Exhausted,
            }
        };

        Resolution { next, counts }
    }

    fn counts(&self) -> SessionCounts {
        let total_words = u32::try_from(self.ordered_ids.len()).unwrap_or(u32::MAX);
        let mut total_completed = 0u32;
        let mut today_completed = 0u32;
        for id in &self.ordered_ids {
            if let Some(row) = self.progress.get(id) {
                if row.status() == WordStatus::Completed {
                    total_completed += 1;
                    if !self.frozen.contains(id) {
                        today_completed += 1;
                    }
                }
            }
        }

        SessionCounts {
            today_completed,
            today_goal: self
                .assignment
                .effective_daily_goal(self.student.daily_goal()),
            total_completed,
            total_words,
        }
    }

    #[must_use]
    pub fn student(&self) -> &Student {
        &self.student
    }

    #[must_use]
    pub fn assignment(&self) -> &Assignment {
        &self.assignment
    }

    #[must_use]
    pub fn words(&self) -> &[Word] {
        &self.words
    }

    #[must_use]
    pub fn word(&self, word_id: WordId) -> Option<&Word> {
        self.words.iter().find(|w| w.id() == word_id)
    }

    /// Words marked known today, in completion order.
    #[must_use]
    pub fn known_draft(&self) -> &[WordId] {
        &self.known_draft
    }

    /// Words skipped since the last snapshot, in skip order.
    #[must_use]
    pub fn unknown_draft(&self) -> &[WordId] {
        &self.unknown_draft
    }

    /// Snapshots frozen so far for this assignment.
    #[must_use]
    pub fn session_count(&self) -> u32 {
        self.session_count
    }

    pub(crate) fn contains(&self, word_id: WordId) -> bool {
        self.ordered_ids.contains(&word_id)
    }

    pub(crate) fn ordered_ids(&self) -> &[WordId] {
        &self.ordered_ids
    }

    pub(crate) fn progress_map(&self) -> &HashMap<WordId, Progress> {
        &self.progress
    }

    pub(crate) fn progress_entry(&mut self, word_id: WordId, now: DateTime<Utc>) -> &mut Progress {
        let student_id = self.student.id();
        self.progress
            .entry(word_id)
            .or_insert_with(|| Progress::new(student_id, word_id, now))
    }

    pub(crate) fn assignment_mut(&mut self) -> &mut Assignment {
        &mut self.assignment
    }

    pub(crate) fn push_known(&mut self, word_id: WordId) {
        if !self.known_draft.contains(&word_id) {
            self.known_draft.push(word_id);
        }
    }

    pub(crate) fn push_unknown(&mut self, word_id: WordId) {
        if !self.unknown_draft.contains(&word_id) {
            self.unknown_draft.push(word_id);
        }
    }

    pub(crate) fn retract_known(&mut self, word_id: WordId) {
        self.known_draft.retain(|id| *id != word_id);
    }

    /// Fold the finished day into the frozen set and reset the drafts.
    pub(crate) fn absorb_snapshot(&mut self) {
        self.frozen.extend(self.known_draft.iter().copied());
        self.session_count = self.session_count.saturating_add(1);
        self.known_draft.clear();
        self.unknown_draft.clear();
    }
}

impl fmt::Debug for StudySession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StudySession")
            .field("student_id", &self.student.id())
            .field("assignment_id", &self.assignment.id())
            .field("words_len", &self.words.len())
            .field("session_count", &self.session_count)
            .field("known_draft_len", &self.known_draft.len())
            .field("unknown_draft_len", &self.unknown_draft.len())
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use voca_core::model::{AssignmentId, SessionId, StudentId, WordlistId};
    use voca_core::time::fixed_now;

    fn build_word(n: u64) -> Word {
        Word::new(
            WordId::new(n),
            WordlistId::new(1),
            u32::try_from(n).unwrap() - 1,
            format!("w{n}"),
            format!("m{n}"),
            None,
            None,
            None,
        )
        .unwrap()
    }

    fn build_session(progress_rows: Vec<Progress>, snapshots: &[CompletedSession]) -> StudySession {
        let student = Student::new(StudentId::new(1), "Mina", 5, fixed_now()).unwrap();
        let assignment = Assignment::new(
            AssignmentId::new(1),
            student.id(),
            WordlistId::new(1),
            None,
            fixed_now(),
        )
        .unwrap();
        let words = (1..=6).map(build_word).collect();
        StudySession::assemble(student, assignment, words, progress_rows, snapshots)
    }

    #[test]
    fn fresh_session_counts_from_zero() {
        let session = build_session(Vec::new(), &[]);
        let resolution = session.resolve();
        assert_eq!(resolution.next, NextStep::Word(WordId::new(1)));
        assert_eq!(resolution.counts.today_completed, 0);
        assert_eq!(resolution.counts.today_goal, 5);
        assert_eq!(resolution.counts.total_words, 6);
    }

    #[test]
    fn frozen_words_do_not_count_toward_today() {
        let now = fixed_now();
        let mut rows = Vec::new();
        for n in 1..=3 {
            let mut p = Progress::new(StudentId::new(1), WordId::new(n), now);
            p.mark_completed(now).unwrap();
            rows.push(p);
        }
        let snapshot = CompletedSession::from_persisted(
            SessionId::new(1),
            AssignmentId::new(1),
            1,
            vec![WordId::new(1), WordId::new(2)],
            vec![],
            now,
        )
        .unwrap();

        let session = build_session(rows, &[snapshot]);
        let counts = session.resolve().counts;
        assert_eq!(counts.total_completed, 3);
        assert_eq!(counts.today_completed, 1);
        assert_eq!(session.known_draft(), &[WordId::new(3)]);
        assert_eq!(session.session_count(), 1);
    }

    #[test]
    fn drafts_resume_in_action_order() {
        let now = fixed_now();
        let mut rows = Vec::new();

        // w2 completed first, then w1; w3 skipped in between.
        let mut p2 = Progress::new(StudentId::new(1), WordId::new(2), now);
        p2.mark_completed(now).unwrap();
        rows.push(p2);

        let mut p3 = Progress::new(StudentId::new(1), WordId::new(3), now);
        p3.mark_skipped(now + Duration::seconds(1), 1).unwrap();
        rows.push(p3);

        let mut p1 = Progress::new(StudentId::new(1), WordId::new(1), now);
        p1.mark_completed(now + Duration::seconds(2)).unwrap();
        rows.push(p1);

        let session = build_session(rows, &[]);
        assert_eq!(session.known_draft(), &[WordId::new(2), WordId::new(1)]);
        assert_eq!(session.unknown_draft(), &[WordId::new(3)]);
    }

    #[test]
    fn goal_reached_once_today_meets_goal() {
        let now = fixed_now();
        let mut rows = Vec::new();
        for n in 1..=5 {
            let mut p = Progress::new(StudentId::new(1), WordId::new(n), now);
            p.mark_completed(now).unwrap();
            rows.push(p);
        }

        let session = build_session(rows, &[]);
        assert_eq!(session.resolve().next, NextStep::GoalReached);
    }

    #[test]
    fn exhausted_wins_over_goal_reached() {
        let now = fixed_now();
        let mut rows = Vec::new();
        for n in 1..=6 {
            let mut p = Progress::new(StudentId::new(1), WordId::new(n), now);
            p.mark_completed(now).unwrap();
            rows.push(p);
        }

        let session = build_session(rows, &[]);
        assert_eq!(session.resolve().next, NextStep::Exhausted);
    }
}
