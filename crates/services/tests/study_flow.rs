use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::Duration;
use services::{NextStep, StudyError, StudyEvent, StudyService};
use storage::repository::{
    CompletedSessionRepository, NewAssignmentRecord, NewSessionRecord, NewStudentRecord,
    NewWordRecord, NewWordlistRecord, Storage, StorageError,
};
use voca_core::Clock;
use voca_core::model::{
    AccessToken, AssignmentId, CompletedSession, SessionId, StudentId, WordId, WordStatus,
    WordlistId, WordlistKind,
};
use voca_core::time::fixed_now;

struct Fixture {
    storage: Storage,
    service: StudyService,
    token: AccessToken,
    student_id: StudentId,
    wordlist_id: WordlistId,
    assignment_id: AssignmentId,
    word_ids: Vec<WordId>,
}

async fn fixture(daily_goal: u32, word_count: usize) -> Fixture {
    let storage = Storage::in_memory();
    let token = AccessToken::generate();

    let student_id = storage
        .students
        .insert_student(&NewStudentRecord {
            name: "Mina".into(),
            daily_goal,
            token: token.clone(),
            token_issued_at: fixed_now(),
            created_at: fixed_now(),
        })
        .await
        .unwrap();

    let words = (1..=word_count)
        .map(|n| NewWordRecord {
            text: format!("word-{n}"),
            meaning: format!("meaning-{n}"),
            example: None,
            mnemonic: None,
            audio_url: None,
        })
        .collect();
    let wordlist_id = storage
        .wordlists
        .insert_wordlist(&NewWordlistRecord {
            name: "Basics".into(),
            kind: WordlistKind::Original,
            created_at: fixed_now(),
            words,
        })
        .await
        .unwrap();

    let assignment_id = storage
        .assignments
        .insert_assignment(&NewAssignmentRecord {
            student_id,
            wordlist_id,
            generation: 1,
            filtered_word_ids: None,
            parent_assignment_id: None,
            is_auto_generated: false,
            daily_goal: None,
            current_pass: 1,
            created_at: fixed_now(),
        })
        .await
        .unwrap();

    let word_ids = storage
        .wordlists
        .list_words(wordlist_id)
        .await
        .unwrap()
        .iter()
        .map(voca_core::model::Word::id)
        .collect();

    let service = StudyService::new(Clock::fixed(fixed_now()), &storage);
    Fixture {
        storage,
        service,
        token,
        student_id,
        wordlist_id,
        assignment_id,
        word_ids,
    }
}

/// Session repository that fails the next `append_session` once, then
/// delegates. Stands in for a transient storage outage at freeze time.
struct UnreliableSessions {
    inner: Arc<dyn CompletedSessionRepository>,
    fail_next_append: AtomicBool,
}

impl UnreliableSessions {
    fn wrap(storage: &Storage) -> (Arc<Self>, Storage) {
        let sessions = Arc::new(Self {
            inner: Arc::clone(&storage.sessions),
            fail_next_append: AtomicBool::new(false),
        });
        let wrapped = Storage {
            sessions: Arc::clone(&sessions) as Arc<dyn CompletedSessionRepository>,
            ..storage.clone()
        };
        (sessions, wrapped)
    }

    fn fail_next_append(&self) {
        self.fail_next_append.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl CompletedSessionRepository for UnreliableSessions {
    async fn append_session(&self, record: &NewSessionRecord) -> Result<SessionId, StorageError> {
        if self.fail_next_append.swap(false, Ordering::SeqCst) {
            return Err(StorageError::Connection("connection reset".into()));
        }
        self.inner.append_session(record).await
    }

    async fn get_session(&self, id: SessionId) -> Result<Option<CompletedSession>, StorageError> {
        self.inner.get_session(id).await
    }

    async fn list_sessions(
        &self,
        assignment_id: AssignmentId,
    ) -> Result<Vec<CompletedSession>, StorageError> {
        self.inner.list_sessions(assignment_id).await
    }

    async fn delete_sessions_for_assignment(
        &self,
        assignment_id: AssignmentId,
    ) -> Result<(), StorageError> {
        self.inner.delete_sessions_for_assignment(assignment_id).await
    }
}

fn frozen_session_id(events: &[StudyEvent]) -> Option<SessionId> {
    events.iter().find_map(|e| match e {
        StudyEvent::SessionFrozen { session_id, .. } => Some(*session_id),
        _ => None,
    })
}

#[tokio::test]
async fn straight_run_reaches_goal_and_freezes_the_day() {
    let fx = fixture(5, 6).await;
    let mut session = fx
        .service
        .open_session(&fx.token, fx.assignment_id)
        .await
        .unwrap();

    assert_eq!(session.resolve().next, NextStep::Word(fx.word_ids[0]));

    for (i, word_id) in fx.word_ids.iter().take(4).enumerate() {
        let outcome = fx.service.mark_known(&mut session, *word_id).await.unwrap();
        assert!(outcome.events.is_empty());
        assert_eq!(outcome.resolution.counts.today_completed, u32::try_from(i).unwrap() + 1);
        assert_eq!(outcome.resolution.next, NextStep::Word(fx.word_ids[i + 1]));
    }

    let outcome = fx
        .service
        .mark_known(&mut session, fx.word_ids[4])
        .await
        .unwrap();
    assert_eq!(outcome.resolution.next, NextStep::GoalReached);
    assert_eq!(outcome.resolution.counts.today_completed, 5);
    assert_eq!(outcome.resolution.counts.today_goal, 5);

    let session_id = frozen_session_id(&outcome.events).expect("day frozen");
    let snapshot = fx
        .storage
        .sessions
        .get_session(session_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(snapshot.session_number(), 1);
    assert_eq!(snapshot.word_ids(), &fx.word_ids[..5]);
    assert!(snapshot.unknown_word_ids().is_empty());
}

#[tokio::test]
async fn skipped_word_defers_behind_remaining_not_started() {
    let fx = fixture(5, 6).await;
    let mut session = fx
        .service
        .open_session(&fx.token, fx.assignment_id)
        .await
        .unwrap();

    fx.service
        .mark_known(&mut session, fx.word_ids[0])
        .await
        .unwrap();
    let outcome = fx
        .service
        .mark_unknown(&mut session, fx.word_ids[1])
        .await
        .unwrap();

    // w2 was skipped this pass; w3 is served, not w2 again.
    assert!(outcome.events.is_empty());
    assert_eq!(outcome.resolution.next, NextStep::Word(fx.word_ids[2]));
    assert_eq!(outcome.resolution.counts.today_completed, 1);

    // Finishing the day counts only known words; w2 lands in the unknown list.
    for word_id in &fx.word_ids[2..6] {
        fx.service.mark_known(&mut session, *word_id).await.unwrap();
    }
    let snapshots = fx
        .storage
        .sessions
        .list_sessions(fx.assignment_id)
        .await
        .unwrap();
    assert_eq!(snapshots.len(), 1);
    assert_eq!(
        snapshots[0].word_ids(),
        &[
            fx.word_ids[0],
            fx.word_ids[2],
            fx.word_ids[3],
            fx.word_ids[4],
            fx.word_ids[5]
        ]
    );
    assert_eq!(snapshots[0].unknown_word_ids(), &[fx.word_ids[1]]);
}

#[tokio::test]
async fn skipping_everything_rolls_the_pass_and_reshows_in_order() {
    let fx = fixture(5, 3).await;
    let mut session = fx
        .service
        .open_session(&fx.token, fx.assignment_id)
        .await
        .unwrap();

    fx.service
        .mark_unknown(&mut session, fx.word_ids[0])
        .await
        .unwrap();
    fx.service
        .mark_unknown(&mut session, fx.word_ids[1])
        .await
        .unwrap();
    let outcome = fx
        .service
        .mark_unknown(&mut session, fx.word_ids[2])
        .await
        .unwrap();

    assert!(outcome
        .events
        .contains(&StudyEvent::PassAdvanced { pass: 2 }));
    assert_eq!(outcome.resolution.next, NextStep::Word(fx.word_ids[0]));

    // The roll is persisted, not just in-memory.
    let stored = fx
        .storage
        .assignments
        .get_assignment(fx.assignment_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.current_pass(), 2);
}

#[tokio::test]
async fn exhaustion_below_goal_freezes_partial_day_and_derives_review() {
    let fx = fixture(5, 3).await;
    let mut session = fx
        .service
        .open_session(&fx.token, fx.assignment_id)
        .await
        .unwrap();

    fx.service
        .mark_known(&mut session, fx.word_ids[0])
        .await
        .unwrap();
    fx.service
        .mark_unknown(&mut session, fx.word_ids[1])
        .await
        .unwrap();
    fx.service
        .mark_known(&mut session, fx.word_ids[2])
        .await
        .unwrap();

    // Only the current-pass skip remains; the resolver serves it again.
    assert_eq!(session.resolve().next, NextStep::Word(fx.word_ids[1]));

    let outcome = fx
        .service
        .mark_known(&mut session, fx.word_ids[1])
        .await
        .unwrap();
    assert_eq!(outcome.resolution.next, NextStep::Exhausted);
    assert!(outcome
        .events
        .contains(&StudyEvent::GenerationCompleted { perfect: false }));

    // Partial final day: three knowns against a goal of five, still frozen.
    let snapshots = fx
        .storage
        .sessions
        .list_sessions(fx.assignment_id)
        .await
        .unwrap();
    assert_eq!(snapshots.len(), 1);
    assert_eq!(
        snapshots[0].word_ids(),
        &[fx.word_ids[0], fx.word_ids[2], fx.word_ids[1]]
    );
    assert_eq!(snapshots[0].unknown_word_ids(), &[fx.word_ids[1]]);

    // The review assignment replays exactly the unknown pool.
    let children = fx
        .storage
        .assignments
        .list_children(fx.assignment_id)
        .await
        .unwrap();
    assert_eq!(children.len(), 1);
    let child = &children[0];
    assert_eq!(child.generation(), 2);
    assert!(child.is_auto_generated());
    assert_eq!(child.filtered_word_ids(), Some(&fx.word_ids[1..2]));
    assert!(outcome.events.contains(&StudyEvent::ReviewAssignmentCreated {
        assignment_id: child.id(),
        pool_size: 1,
    }));

    // Pool rows restart clean; the lifetime skip count survives.
    let row = fx
        .storage
        .progress
        .get_progress(fx.student_id, fx.word_ids[1])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.status(), WordStatus::NotStarted);
    assert_eq!(row.skip_count(), 1);
    assert!(row.last_skipped_at().is_none());
}

#[tokio::test]
async fn existing_child_suppresses_review_derivation() {
    let fx = fixture(5, 2).await;

    // Somebody already derived a child for this assignment.
    let premade = fx
        .storage
        .assignments
        .insert_assignment(&NewAssignmentRecord {
            student_id: fx.student_id,
            wordlist_id: fx.wordlist_id,
            generation: 2,
            filtered_word_ids: Some(vec![fx.word_ids[0]]),
            parent_assignment_id: Some(fx.assignment_id),
            is_auto_generated: true,
            daily_goal: None,
            current_pass: 1,
            created_at: fixed_now(),
        })
        .await
        .unwrap();

    let mut session = fx
        .service
        .open_session(&fx.token, fx.assignment_id)
        .await
        .unwrap();
    fx.service
        .mark_unknown(&mut session, fx.word_ids[0])
        .await
        .unwrap();
    fx.service
        .mark_known(&mut session, fx.word_ids[0])
        .await
        .unwrap();
    let outcome = fx
        .service
        .mark_known(&mut session, fx.word_ids[1])
        .await
        .unwrap();

    assert_eq!(outcome.resolution.next, NextStep::Exhausted);
    assert!(!outcome
        .events
        .iter()
        .any(|e| matches!(e, StudyEvent::ReviewAssignmentCreated { .. })));

    let children = fx
        .storage
        .assignments
        .list_children(fx.assignment_id)
        .await
        .unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].id(), premade);
}

#[tokio::test]
async fn perfect_run_completes_generation_without_a_child() {
    let fx = fixture(5, 5).await;
    let mut session = fx
        .service
        .open_session(&fx.token, fx.assignment_id)
        .await
        .unwrap();

    for word_id in &fx.word_ids[..4] {
        fx.service.mark_known(&mut session, *word_id).await.unwrap();
    }
    let outcome = fx
        .service
        .mark_known(&mut session, fx.word_ids[4])
        .await
        .unwrap();

    // Goal met and generation finished by the same action.
    assert_eq!(outcome.resolution.next, NextStep::Exhausted);
    assert_eq!(outcome.resolution.counts.today_completed, 5);
    assert!(frozen_session_id(&outcome.events).is_some());
    assert!(outcome
        .events
        .contains(&StudyEvent::GenerationCompleted { perfect: true }));
    assert!(fx
        .storage
        .assignments
        .list_children(fx.assignment_id)
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn revert_reopens_the_word_without_counting_a_skip() {
    let fx = fixture(5, 6).await;
    let mut session = fx
        .service
        .open_session(&fx.token, fx.assignment_id)
        .await
        .unwrap();

    fx.service
        .mark_known(&mut session, fx.word_ids[0])
        .await
        .unwrap();
    let outcome = fx
        .service
        .revert_to_skipped(&mut session, fx.word_ids[0])
        .await
        .unwrap();

    assert_eq!(outcome.resolution.counts.today_completed, 0);
    assert_eq!(outcome.resolution.next, NextStep::Word(fx.word_ids[0]));

    let row = fx
        .storage
        .progress
        .get_progress(fx.student_id, fx.word_ids[0])
        .await
        .unwrap()
        .unwrap();
    assert_eq!(row.status(), WordStatus::Skipped);
    assert_eq!(row.skip_count(), 0);

    // Only today's known words can be reverted.
    let err = fx
        .service
        .revert_to_skipped(&mut session, fx.word_ids[1])
        .await
        .unwrap_err();
    assert!(matches!(err, StudyError::NotRevertible(_)));
}

#[tokio::test]
async fn next_day_counts_restart_from_the_frozen_snapshot() {
    let fx = fixture(5, 6).await;
    let mut session = fx
        .service
        .open_session(&fx.token, fx.assignment_id)
        .await
        .unwrap();
    for word_id in &fx.word_ids[..5] {
        fx.service.mark_known(&mut session, *word_id).await.unwrap();
    }

    // A new day: same storage, later clock.
    let tomorrow = StudyService::new(
        Clock::fixed(fixed_now() + Duration::days(1)),
        &fx.storage,
    );
    let mut session = tomorrow
        .open_session(&fx.token, fx.assignment_id)
        .await
        .unwrap();

    let resolution = session.resolve();
    assert_eq!(resolution.counts.today_completed, 0);
    assert_eq!(resolution.counts.total_completed, 5);
    assert_eq!(resolution.next, NextStep::Word(fx.word_ids[5]));

    let outcome = tomorrow
        .mark_known(&mut session, fx.word_ids[5])
        .await
        .unwrap();
    assert_eq!(outcome.resolution.next, NextStep::Exhausted);

    let snapshots = fx
        .storage
        .sessions
        .list_sessions(fx.assignment_id)
        .await
        .unwrap();
    assert_eq!(snapshots.len(), 2);
    assert_eq!(snapshots[1].session_number(), 2);
    assert_eq!(snapshots[1].word_ids(), &fx.word_ids[5..6]);
}

#[tokio::test]
async fn review_session_replays_only_the_pool() {
    let fx = fixture(5, 3).await;
    let mut session = fx
        .service
        .open_session(&fx.token, fx.assignment_id)
        .await
        .unwrap();
    fx.service
        .mark_known(&mut session, fx.word_ids[0])
        .await
        .unwrap();
    fx.service
        .mark_unknown(&mut session, fx.word_ids[1])
        .await
        .unwrap();
    fx.service
        .mark_known(&mut session, fx.word_ids[2])
        .await
        .unwrap();
    fx.service
        .mark_known(&mut session, fx.word_ids[1])
        .await
        .unwrap();

    let child_id = fx
        .storage
        .assignments
        .list_children(fx.assignment_id)
        .await
        .unwrap()[0]
        .id();

    let mut review = fx.service.open_session(&fx.token, child_id).await.unwrap();
    assert_eq!(review.words().len(), 1);
    assert_eq!(review.resolve().next, NextStep::Word(fx.word_ids[1]));

    let outcome = fx
        .service
        .mark_known(&mut review, fx.word_ids[1])
        .await
        .unwrap();
    assert_eq!(outcome.resolution.next, NextStep::Exhausted);
    assert!(outcome
        .events
        .contains(&StudyEvent::GenerationCompleted { perfect: true }));
}

#[tokio::test]
async fn words_outside_the_assignment_are_rejected_without_rows() {
    let fx = fixture(5, 2).await;
    let mut session = fx
        .service
        .open_session(&fx.token, fx.assignment_id)
        .await
        .unwrap();

    let stray = WordId::new(999);
    let err = fx.service.mark_known(&mut session, stray).await.unwrap_err();
    assert!(matches!(err, StudyError::WordNotInSession(_)));
    assert!(fx
        .storage
        .progress
        .get_progress(fx.student_id, stray)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn unknown_token_cannot_open_a_session() {
    let fx = fixture(5, 2).await;
    let err = fx
        .service
        .open_session(&AccessToken::generate(), fx.assignment_id)
        .await
        .unwrap_err();
    assert!(matches!(err, StudyError::StudentNotFound));
}

#[tokio::test]
async fn failed_freeze_is_recovered_when_the_session_reopens() {
    let fx = fixture(5, 6).await;
    let (sessions, storage) = UnreliableSessions::wrap(&fx.storage);
    let service = StudyService::new(Clock::fixed(fixed_now()), &storage);

    let mut session = service
        .open_session(&fx.token, fx.assignment_id)
        .await
        .unwrap();
    for word_id in &fx.word_ids[..4] {
        service.mark_known(&mut session, *word_id).await.unwrap();
    }

    // The goal-reaching mark completes the word but the snapshot append dies.
    sessions.fail_next_append();
    let err = service
        .mark_known(&mut session, fx.word_ids[4])
        .await
        .unwrap_err();
    assert!(matches!(err, StudyError::Storage(StorageError::Connection(_))));

    // The word is durably completed, so repeating the mark is rejected.
    let err = service
        .mark_known(&mut session, fx.word_ids[4])
        .await
        .unwrap_err();
    assert!(matches!(err, StudyError::Progress(_)));

    // Reopening detects the finished-but-unfrozen day and freezes it.
    let reopened = service
        .open_session(&fx.token, fx.assignment_id)
        .await
        .unwrap();
    let snapshots = fx
        .storage
        .sessions
        .list_sessions(fx.assignment_id)
        .await
        .unwrap();
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].session_number(), 1);
    assert_eq!(snapshots[0].word_ids(), &fx.word_ids[..5]);

    // The recovered day is over; the session continues like any new day.
    let resolution = reopened.resolve();
    assert_eq!(resolution.counts.today_completed, 0);
    assert_eq!(resolution.counts.total_completed, 5);
    assert_eq!(resolution.next, NextStep::Word(fx.word_ids[5]));
}

#[tokio::test]
async fn failed_freeze_at_exhaustion_still_derives_the_review() {
    let fx = fixture(5, 3).await;
    let (sessions, storage) = UnreliableSessions::wrap(&fx.storage);
    let service = StudyService::new(Clock::fixed(fixed_now()), &storage);

    let mut session = service
        .open_session(&fx.token, fx.assignment_id)
        .await
        .unwrap();
    service
        .mark_known(&mut session, fx.word_ids[0])
        .await
        .unwrap();
    service
        .mark_unknown(&mut session, fx.word_ids[1])
        .await
        .unwrap();
    service
        .mark_known(&mut session, fx.word_ids[2])
        .await
        .unwrap();

    // The exhausting mark lands but neither snapshot nor review exist yet.
    sessions.fail_next_append();
    let err = service
        .mark_known(&mut session, fx.word_ids[1])
        .await
        .unwrap_err();
    assert!(matches!(err, StudyError::Storage(StorageError::Connection(_))));
    assert!(fx
        .storage
        .assignments
        .list_children(fx.assignment_id)
        .await
        .unwrap()
        .is_empty());

    // Reopening freezes the partial day and finishes the generation.
    service
        .open_session(&fx.token, fx.assignment_id)
        .await
        .unwrap();
    let snapshots = fx
        .storage
        .sessions
        .list_sessions(fx.assignment_id)
        .await
        .unwrap();
    assert_eq!(snapshots.len(), 1);
    assert_eq!(snapshots[0].word_ids(), &fx.word_ids[..]);
    assert_eq!(snapshots[0].unknown_word_ids(), &[fx.word_ids[1]]);

    let children = fx
        .storage
        .assignments
        .list_children(fx.assignment_id)
        .await
        .unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].filtered_word_ids(), Some(&fx.word_ids[1..2]));
}
