use storage::repository::{
    AssignmentRepository, CompletedSessionRepository, NewAssignmentRecord, NewSessionRecord,
    NewStudentRecord, NewTestRecord, NewWordRecord, NewWordlistRecord, OnlineTestRepository,
    ProgressRepository, StorageError, StudentRepository, WordlistRepository,
};
use storage::sqlite::SqliteRepository;
use voca_core::model::{
    AccessToken, AssignmentId, Progress, StudentId, TestKind, WordId, WordlistKind,
};
use voca_core::time::fixed_now;

async fn connect(name: &str) -> SqliteRepository {
    let url = format!("sqlite:file:{name}?mode=memory&cache=shared");
    let repo = SqliteRepository::connect(&url).await.expect("connect");
    repo.migrate().await.expect("migrate");
    repo
}

fn student_record(name: &str) -> NewStudentRecord {
    NewStudentRecord {
        name: name.to_owned(),
        daily_goal: 10,
        token: AccessToken::generate(),
        token_issued_at: fixed_now(),
        created_at: fixed_now(),
    }
}

fn wordlist_record(name: &str, words: &[(&str, &str)]) -> NewWordlistRecord {
    NewWordlistRecord {
        name: name.to_owned(),
        kind: WordlistKind::Original,
        created_at: fixed_now(),
        words: words
            .iter()
            .map(|(text, meaning)| NewWordRecord {
                text: (*text).to_owned(),
                meaning: (*meaning).to_owned(),
                example: None,
                mnemonic: None,
                audio_url: None,
            })
            .collect(),
    }
}

async fn seed_assignment(repo: &SqliteRepository) -> (StudentId, AssignmentId, Vec<WordId>) {
    let student_id = repo.insert_student(&student_record("Mina")).await.unwrap();
    let wordlist_id = repo
        .insert_wordlist(&wordlist_record("Basics", &[("a", "1"), ("b", "2"), ("c", "3")]))
        .await
        .unwrap();
    let assignment_id = repo
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
    let word_ids = repo
        .list_words(wordlist_id)
        .await
        .unwrap()
        .iter()
        .map(voca_core::model::Word::id)
        .collect();
    (student_id, assignment_id, word_ids)
}

#[tokio::test]
async fn student_roundtrip_update_and_token_lookup() {
    let repo = connect("memdb_students").await;

    let record = student_record("Mina");
    let id = repo.insert_student(&record).await.unwrap();

    let mut student = repo.get_student(id).await.unwrap().unwrap();
    assert_eq!(student.name(), "Mina");
    assert_eq!(student.daily_goal(), 10);

    let by_token = repo
        .find_student_by_token(&record.token)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_token.id(), id);

    let old_token = student.token().clone();
    student.rotate_token(fixed_now());
    student.set_daily_goal(25).unwrap();
    repo.update_student(&student).await.unwrap();

    assert!(repo.find_student_by_token(&old_token).await.unwrap().is_none());
    let reloaded = repo.get_student(id).await.unwrap().unwrap();
    assert_eq!(reloaded.daily_goal(), 25);
    assert_eq!(reloaded.token(), student.token());
}

#[tokio::test]
async fn wordlist_words_keep_sequence_order_and_count() {
    let repo = connect("memdb_wordlists").await;

    let id = repo
        .insert_wordlist(&wordlist_record("Basics", &[("a", "1"), ("b", "2"), ("c", "3")]))
        .await
        .unwrap();

    let list = repo.get_wordlist(id).await.unwrap().unwrap();
    assert_eq!(list.word_count(), 3);
    assert_eq!(list.kind(), WordlistKind::Original);

    let words = repo.list_words(id).await.unwrap();
    assert_eq!(words.len(), 3);
    assert_eq!(words[0].text(), "a");
    assert_eq!(words[2].position(), 2);

    repo.delete_wordlist(id).await.unwrap();
    assert!(repo.get_wordlist(id).await.unwrap().is_none());
    assert!(repo.list_words(id).await.unwrap().is_empty());
}

#[tokio::test]
async fn assignment_children_and_pass_update_roundtrip() {
    let repo = connect("memdb_assignments").await;
    let (student_id, parent_id, word_ids) = seed_assignment(&repo).await;

    let child_id = repo
        .insert_assignment(&NewAssignmentRecord {
            student_id,
            wordlist_id: repo
                .get_assignment(parent_id)
                .await
                .unwrap()
                .unwrap()
                .wordlist_id(),
            generation: 2,
            filtered_word_ids: Some(vec![word_ids[1]]),
            parent_assignment_id: Some(parent_id),
            is_auto_generated: true,
            daily_goal: None,
            current_pass: 1,
            created_at: fixed_now(),
        })
        .await
        .unwrap();

    let children = repo.list_children(parent_id).await.unwrap();
    assert_eq!(children.len(), 1);
    assert_eq!(children[0].id(), child_id);
    assert_eq!(children[0].generation(), 2);
    assert_eq!(children[0].filtered_word_ids(), Some(&word_ids[1..2]));

    let mut child = repo.get_assignment(child_id).await.unwrap().unwrap();
    child.advance_pass(2);
    child.set_daily_goal(Some(15)).unwrap();
    repo.update_assignment(&child).await.unwrap();

    let reloaded = repo.get_assignment(child_id).await.unwrap().unwrap();
    assert_eq!(reloaded.current_pass(), 2);
    assert_eq!(reloaded.daily_goal(), Some(15));
}

#[tokio::test]
async fn progress_upsert_is_idempotent_per_word() {
    let repo = connect("memdb_progress").await;
    let (student_id, _, word_ids) = seed_assignment(&repo).await;

    let mut p = Progress::new(student_id, word_ids[0], fixed_now());
    p.mark_skipped(fixed_now(), 1).unwrap();
    repo.upsert_progress(&p).await.unwrap();

    p.mark_completed(fixed_now()).unwrap();
    repo.upsert_progress(&p).await.unwrap();

    let rows = repo.list_progress(student_id, &word_ids).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].skip_count(), 1);
    assert!(rows[0].completed_at().is_some());
}

#[tokio::test]
async fn duplicate_session_number_is_a_conflict() {
    let repo = connect("memdb_sessions").await;
    let (_, assignment_id, word_ids) = seed_assignment(&repo).await;

    let record = NewSessionRecord {
        assignment_id,
        session_number: 1,
        word_ids: vec![word_ids[0], word_ids[1]],
        unknown_word_ids: vec![word_ids[2]],
        completed_date: fixed_now(),
    };
    let session_id = repo.append_session(&record).await.unwrap();

    let err = repo.append_session(&record).await.unwrap_err();
    assert!(matches!(err, StorageError::Conflict));

    let sessions = repo.list_sessions(assignment_id).await.unwrap();
    assert_eq!(sessions.len(), 1);
    assert_eq!(sessions[0].id(), session_id);
    assert_eq!(sessions[0].word_ids(), &word_ids[..2]);
    assert_eq!(sessions[0].unknown_word_ids(), &word_ids[2..]);
}

#[tokio::test]
async fn online_tests_attach_to_sessions() {
    let repo = connect("memdb_tests").await;
    let (_, assignment_id, word_ids) = seed_assignment(&repo).await;

    let session_id = repo
        .append_session(&NewSessionRecord {
            assignment_id,
            session_number: 1,
            word_ids: word_ids.clone(),
            unknown_word_ids: vec![],
            completed_date: fixed_now(),
        })
        .await
        .unwrap();

    repo.append_test(&NewTestRecord {
        session_id,
        kind: TestKind::Known,
        total: 3,
        correct: 2,
        wrong_word_ids: vec![word_ids[1]],
        taken_at: fixed_now(),
    })
    .await
    .unwrap();

    let tests = repo.list_tests(session_id).await.unwrap();
    assert_eq!(tests.len(), 1);
    assert_eq!(tests[0].kind(), TestKind::Known);
    assert_eq!(tests[0].correct(), 2);
    assert_eq!(tests[0].wrong_word_ids(), &word_ids[1..2]);

    repo.delete_tests_for_session(session_id).await.unwrap();
    assert!(repo.list_tests(session_id).await.unwrap().is_empty());
}
