use voca_core::model::{Word, Wordlist, WordlistId};

use super::SqliteRepository;
use super::mapping::{id_to_i64, map_word_row, map_wordlist_row};
use crate::repository::{NewWordlistRecord, StorageError, WordlistRepository};

// `word_count` is derived, not stored; every wordlist SELECT computes it.
const WORDLIST_COLUMNS: &str = "id, name, kind, created_at, \
    (SELECT COUNT(*) FROM words w WHERE w.wordlist_id = wordlists.id) AS word_count";

#[async_trait::async_trait]
impl WordlistRepository for SqliteRepository {
    async fn insert_wordlist(
        &self,
        record: &NewWordlistRecord,
    ) -> Result<WordlistId, StorageError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let res = sqlx::query(
            r"
            INSERT INTO wordlists (name, kind, created_at)
            VALUES (?1, ?2, ?3)
            ",
        )
        .bind(record.name.clone())
        .bind(record.kind.as_str())
        .bind(record.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let wordlist_id = res.last_insert_rowid();

        for (position, word) in record.words.iter().enumerate() {
            let position = i64::try_from(position)
                .map_err(|_| StorageError::Serialization("position overflow".into()))?;
            sqlx::query(
                r"
                INSERT INTO words (wordlist_id, position, text, meaning, example, mnemonic, audio_url)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
                ",
            )
            .bind(wordlist_id)
            .bind(position)
            .bind(word.text.clone())
            .bind(word.meaning.clone())
            .bind(word.example.clone())
            .bind(word.mnemonic.clone())
            .bind(word.audio_url.clone())
            .execute(&mut *tx)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        let id = u64::try_from(wordlist_id)
            .map_err(|_| StorageError::Serialization("id sign overflow".into()))?;
        Ok(WordlistId::new(id))
    }

    async fn get_wordlist(&self, id: WordlistId) -> Result<Option<Wordlist>, StorageError> {
        let row = sqlx::query(&format!(
            "SELECT {WORDLIST_COLUMNS} FROM wordlists WHERE id = ?1"
        ))
        .bind(id_to_i64("wordlist_id", id.value())?)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        match row {
            Some(row) => map_wordlist_row(&row).map(Some),
            None => Ok(None),
        }
    }

    async fn list_wordlists(&self, limit: u32) -> Result<Vec<Wordlist>, StorageError> {
        let rows = sqlx::query(&format!(
            "SELECT {WORDLIST_COLUMNS} FROM wordlists ORDER BY created_at ASC, id ASC LIMIT ?1"
        ))
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut lists = Vec::with_capacity(rows.len());
        for row in rows {
            lists.push(map_wordlist_row(&row)?);
        }
        Ok(lists)
    }

    async fn list_words(&self, wordlist_id: WordlistId) -> Result<Vec<Word>, StorageError> {
        let rows = sqlx::query(
            r"
            SELECT id, wordlist_id, position, text, meaning, example, mnemonic, audio_url
            FROM words
            WHERE wordlist_id = ?1
            ORDER BY position ASC
            ",
        )
        .bind(id_to_i64("wordlist_id", wordlist_id.value())?)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StorageError::Connection(e.to_string()))?;

        let mut words = Vec::with_capacity(rows.len());
        for row in rows {
            words.push(map_word_row(&row)?);
        }
        Ok(words)
    }

    async fn delete_wordlist(&self, id: WordlistId) -> Result<(), StorageError> {
        let res = sqlx::query("DELETE FROM wordlists WHERE id = ?1")
            .bind(id_to_i64("wordlist_id", id.value())?)
            .execute(&self.pool)
            .await
            .map_err(|e| StorageError::Connection(e.to_string()))?;

        if res.rows_affected() == 0 {
            return Err(StorageError::NotFound);
        }
        Ok(())
    }
}
