use sqlx::Row;
use sqlx::sqlite::SqliteRow;

use voca_core::model::{
    AccessToken, Assignment, AssignmentId, CompletedSession, OnlineTest, Progress, SessionId,
    Student, StudentId, TestId, TestKind, Word, WordId, WordStatus, Wordlist, WordlistId,
    WordlistKind,
};

use crate::repository::StorageError;

pub(crate) fn ser<E: core::fmt::Display>(e: E) -> StorageError {
    StorageError::Serialization(e.to_string())
}

pub(crate) fn id_to_i64(field: &'static str, v: u64) -> Result<i64, StorageError> {
    i64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} overflow")))
}

fn i64_to_u64(field: &'static str, v: i64) -> Result<u64, StorageError> {
    u64::try_from(v).map_err(|_| StorageError::Serialization(format!("{field} sign overflow")))
}

pub(crate) fn u32_from_i64(field: &'static str, v: i64) -> Result<u32, StorageError> {
    u32::try_from(v).map_err(|_| StorageError::Serialization(format!("invalid {field}: {v}")))
}

//
// ─── ENUM ENCODINGS ────────────────────────────────────────────────────────────
//

pub(crate) fn parse_wordlist_kind(s: &str) -> Result<WordlistKind, StorageError> {
    match s {
        "original" => Ok(WordlistKind::Original),
        "review" => Ok(WordlistKind::Review),
        _ => Err(StorageError::Serialization(format!(
            "invalid wordlist kind: {s}"
        ))),
    }
}

pub(crate) fn parse_word_status(s: &str) -> Result<WordStatus, StorageError> {
    match s {
        "not_started" => Ok(WordStatus::NotStarted),
        "completed" => Ok(WordStatus::Completed),
        "skipped" => Ok(WordStatus::Skipped),
        _ => Err(StorageError::Serialization(format!("invalid status: {s}"))),
    }
}

pub(crate) fn parse_test_kind(s: &str) -> Result<TestKind, StorageError> {
    match s {
        "known" => Ok(TestKind::Known),
        "unknown" => Ok(TestKind::Unknown),
        _ => Err(StorageError::Serialization(format!(
            "invalid test kind: {s}"
        ))),
    }
}

//
// ─── WORD-ID LISTS ─────────────────────────────────────────────────────────────
//

/// Word-id lists are stored as JSON arrays of integers; order is meaningful
/// (completion/skip order) so a set type is deliberately not used.
pub(crate) fn word_ids_to_json(ids: &[WordId]) -> Result<String, StorageError> {
    let raw: Vec<u64> = ids.iter().map(WordId::value).collect();
    serde_json::to_string(&raw).map_err(ser)
}

pub(crate) fn word_ids_from_json(raw: &str) -> Result<Vec<WordId>, StorageError> {
    let parsed: Vec<u64> = serde_json::from_str(raw).map_err(ser)?;
    Ok(parsed.into_iter().map(WordId::new).collect())
}

//
// ─── ROW MAPPERS ───────────────────────────────────────────────────────────────
//

pub(crate) fn map_student_row(row: &SqliteRow) -> Result<Student, StorageError> {
    let token: AccessToken = row
        .try_get::<String, _>("access_token")
        .map_err(ser)?
        .parse()
        .map_err(ser)?;

    Student::from_persisted(
        StudentId::new(i64_to_u64("id", row.try_get::<i64, _>("id").map_err(ser)?)?),
        row.try_get::<String, _>("name").map_err(ser)?,
        u32_from_i64("daily_goal", row.try_get::<i64, _>("daily_goal").map_err(ser)?)?,
        token,
        row.try_get("token_issued_at").map_err(ser)?,
        row.try_get("created_at").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_wordlist_row(row: &SqliteRow) -> Result<Wordlist, StorageError> {
    let kind_str: String = row.try_get("kind").map_err(ser)?;

    Wordlist::new(
        WordlistId::new(i64_to_u64("id", row.try_get::<i64, _>("id").map_err(ser)?)?),
        row.try_get::<String, _>("name").map_err(ser)?,
        parse_wordlist_kind(&kind_str)?,
        u32_from_i64("word_count", row.try_get::<i64, _>("word_count").map_err(ser)?)?,
        row.try_get("created_at").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_word_row(row: &SqliteRow) -> Result<Word, StorageError> {
    Word::new(
        WordId::new(i64_to_u64("id", row.try_get::<i64, _>("id").map_err(ser)?)?),
        WordlistId::new(i64_to_u64(
            "wordlist_id",
            row.try_get::<i64, _>("wordlist_id").map_err(ser)?,
        )?),
        u32_from_i64("position", row.try_get::<i64, _>("position").map_err(ser)?)?,
        row.try_get::<String, _>("text").map_err(ser)?,
        row.try_get::<String, _>("meaning").map_err(ser)?,
        row.try_get("example").map_err(ser)?,
        row.try_get("mnemonic").map_err(ser)?,
        row.try_get("audio_url").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_assignment_row(row: &SqliteRow) -> Result<Assignment, StorageError> {
    let filtered = row
        .try_get::<Option<String>, _>("filtered_word_ids")
        .map_err(ser)?
        .map(|raw| word_ids_from_json(&raw))
        .transpose()?;

    let parent = row
        .try_get::<Option<i64>, _>("parent_assignment_id")
        .map_err(ser)?
        .map(|v| i64_to_u64("parent_assignment_id", v).map(AssignmentId::new))
        .transpose()?;

    let daily_goal = row
        .try_get::<Option<i64>, _>("daily_goal")
        .map_err(ser)?
        .map(|v| u32_from_i64("daily_goal", v))
        .transpose()?;

    Assignment::from_persisted(
        AssignmentId::new(i64_to_u64("id", row.try_get::<i64, _>("id").map_err(ser)?)?),
        StudentId::new(i64_to_u64(
            "student_id",
            row.try_get::<i64, _>("student_id").map_err(ser)?,
        )?),
        WordlistId::new(i64_to_u64(
            "wordlist_id",
            row.try_get::<i64, _>("wordlist_id").map_err(ser)?,
        )?),
        u32_from_i64("generation", row.try_get::<i64, _>("generation").map_err(ser)?)?,
        filtered,
        parent,
        row.try_get::<i64, _>("is_auto_generated").map_err(ser)? != 0,
        daily_goal,
        u32_from_i64(
            "current_pass",
            row.try_get::<i64, _>("current_pass").map_err(ser)?,
        )?,
        row.try_get("created_at").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_progress_row(row: &SqliteRow) -> Result<Progress, StorageError> {
    let status_str: String = row.try_get("status").map_err(ser)?;

    let skipped_in_pass = row
        .try_get::<Option<i64>, _>("skipped_in_pass")
        .map_err(ser)?
        .map(|v| u32_from_i64("skipped_in_pass", v))
        .transpose()?;

    Progress::from_persisted(
        StudentId::new(i64_to_u64(
            "student_id",
            row.try_get::<i64, _>("student_id").map_err(ser)?,
        )?),
        WordId::new(i64_to_u64(
            "word_id",
            row.try_get::<i64, _>("word_id").map_err(ser)?,
        )?),
        parse_word_status(&status_str)?,
        u32_from_i64("skip_count", row.try_get::<i64, _>("skip_count").map_err(ser)?)?,
        row.try_get("completed_at").map_err(ser)?,
        row.try_get("last_skipped_at").map_err(ser)?,
        skipped_in_pass,
        row.try_get("updated_at").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_session_row(row: &SqliteRow) -> Result<CompletedSession, StorageError> {
    let word_ids: String = row.try_get("word_ids").map_err(ser)?;
    let unknown_word_ids: String = row.try_get("unknown_word_ids").map_err(ser)?;

    CompletedSession::from_persisted(
        SessionId::new(i64_to_u64("id", row.try_get::<i64, _>("id").map_err(ser)?)?),
        AssignmentId::new(i64_to_u64(
            "assignment_id",
            row.try_get::<i64, _>("assignment_id").map_err(ser)?,
        )?),
        u32_from_i64(
            "session_number",
            row.try_get::<i64, _>("session_number").map_err(ser)?,
        )?,
        word_ids_from_json(&word_ids)?,
        word_ids_from_json(&unknown_word_ids)?,
        row.try_get("completed_date").map_err(ser)?,
    )
    .map_err(ser)
}

pub(crate) fn map_test_row(row: &SqliteRow) -> Result<OnlineTest, StorageError> {
    let kind_str: String = row.try_get("kind").map_err(ser)?;
    let wrong: String = row.try_get("wrong_word_ids").map_err(ser)?;

    OnlineTest::from_persisted(
        TestId::new(i64_to_u64("id", row.try_get::<i64, _>("id").map_err(ser)?)?),
        SessionId::new(i64_to_u64(
            "session_id",
            row.try_get::<i64, _>("session_id").map_err(ser)?,
        )?),
        parse_test_kind(&kind_str)?,
        u32_from_i64("total", row.try_get::<i64, _>("total").map_err(ser)?)?,
        u32_from_i64("correct", row.try_get::<i64, _>("correct").map_err(ser)?)?,
        word_ids_from_json(&wrong)?,
        row.try_get("taken_at").map_err(ser)?,
    )
    .map_err(ser)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn word_id_json_roundtrip_preserves_order() {
        let ids = vec![WordId::new(3), WordId::new(1), WordId::new(2)];
        let json = word_ids_to_json(&ids).unwrap();
        assert_eq!(word_ids_from_json(&json).unwrap(), ids);
    }

    #[test]
    fn invalid_status_is_a_serialization_error() {
        let err = parse_word_status("unknowable").unwrap_err();
        assert!(matches!(err, StorageError::Serialization(_)));
    }

    #[test]
    fn kind_encodings_match_schema_checks() {
        assert_eq!(parse_wordlist_kind("original").unwrap(), WordlistKind::Original);
        assert_eq!(parse_test_kind("unknown").unwrap(), TestKind::Unknown);
        assert_eq!(WordStatus::NotStarted.as_str(), "not_started");
    }
}
