#![forbid(unsafe_code)]

//! Idempotent persistence for ingestion results.
//!
//! Two tables: `videos` keyed by video ID, `transcripts` keyed by the
//! composite (video_id, language_code, is_generated) so a manual and an
//! auto-generated track in the same language are distinct rows. Re-running
//! an ingestion updates rows in place; once-fetched transcript text is
//! never clobbered by a later textless listing pass. The `study_guide` and
//! `quiz` columns are written only through [`IngestStore::update_generated_content`],
//! on behalf of the content-generation service that shares this database.

use std::path::Path;

use chrono::Utc;
use libsql::{Builder, Connection, Row, Value, params};
use thiserror::Error;

use crate::ingest::IngestResult;
use crate::transcripts::TranscriptEntry;

/// Persistence failures, kept separate from retrieval errors so callers can
/// report a half-ingested video precisely.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] libsql::Error),
    #[error("creating database directory {path}: {source}")]
    CreateDir {
        path: String,
        source: std::io::Error,
    },
    #[error("unexpected value in column {column}: expected text")]
    ColumnType { column: i32 },
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A stored video row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VideoRow {
    pub video_id: String,
    pub url: Option<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub author: Option<String>,
    pub view_count: Option<String>,
    pub duration: Option<String>,
    /// RFC 3339 timestamp of the last ingestion touch.
    pub fetched_at: String,
}

/// A stored transcript row, including the externally generated columns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranscriptRow {
    pub video_id: String,
    pub language: Option<String>,
    pub language_code: String,
    pub is_generated: bool,
    pub is_translatable: bool,
    pub transcript: Option<String>,
    pub study_guide: Option<String>,
    pub quiz: Option<String>,
}

async fn configure_connection(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        r#"
        PRAGMA journal_mode=WAL;
        PRAGMA synchronous=NORMAL;
        PRAGMA foreign_keys=ON;
        "#,
    )
    .await?;
    Ok(())
}

async fn ensure_schema(conn: &Connection) -> StoreResult<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS videos (
            video_id TEXT PRIMARY KEY,
            url TEXT,
            title TEXT,
            description TEXT,
            author TEXT,
            view_count TEXT,
            duration TEXT,
            fetched_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS transcripts (
            video_id TEXT NOT NULL REFERENCES videos(video_id) ON DELETE CASCADE,
            language TEXT,
            language_code TEXT NOT NULL,
            is_generated INTEGER NOT NULL DEFAULT 0,
            is_translatable INTEGER NOT NULL DEFAULT 0,
            transcript TEXT,
            study_guide TEXT,
            quiz TEXT,
            PRIMARY KEY (video_id, language_code, is_generated)
        );

        CREATE INDEX IF NOT EXISTS idx_transcripts_videoid
            ON transcripts(video_id);
        "#,
    )
    .await?;
    Ok(())
}

pub struct IngestStore {
    conn: Connection,
}

impl IngestStore {
    /// Opens (and if necessary creates) the SQLite DB and ensures the
    /// expected schema exists.
    pub async fn open(path: &Path) -> StoreResult<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
                    path: parent.display().to_string(),
                    source,
                })?;
            }
        }

        let db = Builder::new_local(path).build().await?;
        let conn = db.connect()?;
        configure_connection(&conn).await?;
        ensure_schema(&conn).await?;
        Ok(Self { conn })
    }

    /// Inserts or fully refreshes the video row for an ingestion result,
    /// stamping `fetched_at` with the current time. Fields the resolver
    /// could not determine overwrite with NULL.
    pub async fn upsert_video(&self, result: &IngestResult) -> StoreResult<()> {
        let fetched_at = Utc::now().to_rfc3339();
        self.conn
            .execute(
                r#"
                INSERT INTO videos (
                    video_id, url, title, description, author,
                    view_count, duration, fetched_at
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                ON CONFLICT(video_id) DO UPDATE SET
                    url = excluded.url,
                    title = excluded.title,
                    description = excluded.description,
                    author = excluded.author,
                    view_count = excluded.view_count,
                    duration = excluded.duration,
                    fetched_at = excluded.fetched_at
                "#,
                params![
                    result.video_id.as_str(),
                    result.url.as_str(),
                    result.metadata.title.as_deref(),
                    result.metadata.description.as_deref(),
                    result.metadata.author.as_deref(),
                    result.metadata.view_count.as_deref(),
                    result.metadata.duration.as_deref(),
                    fetched_at,
                ],
            )
            .await?;
        Ok(())
    }

    /// Upserts every entry in one transaction. Listing fields always take
    /// the new values; transcript text is only overwritten when the new
    /// entry actually carries non-empty text, so a later metadata-only pass
    /// cannot erase text fetched earlier.
    pub async fn upsert_transcripts(
        &self,
        video_id: &str,
        entries: &[TranscriptEntry],
    ) -> StoreResult<()> {
        let tx = self.conn.transaction().await?;
        for entry in entries {
            tx.execute(
                r#"
                INSERT INTO transcripts (
                    video_id, language, language_code,
                    is_generated, is_translatable, transcript
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                ON CONFLICT(video_id, language_code, is_generated) DO UPDATE SET
                    language = excluded.language,
                    is_translatable = excluded.is_translatable,
                    transcript = CASE
                        WHEN excluded.transcript IS NOT NULL AND excluded.transcript <> ''
                            THEN excluded.transcript
                        ELSE transcripts.transcript
                    END
                "#,
                params![
                    video_id,
                    entry.language.as_str(),
                    entry.language_code.as_str(),
                    entry.is_generated as i64,
                    entry.is_translatable as i64,
                    entry.transcript.as_deref(),
                ],
            )
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    /// Sets the transcript text of one track, creating a stub row when the
    /// track was never listed. Used by backfill passes that fetch text for
    /// tracks already discovered.
    pub async fn update_transcript_text(
        &self,
        video_id: &str,
        language_code: &str,
        is_generated: bool,
        text: &str,
    ) -> StoreResult<()> {
        let affected = self
            .conn
            .execute(
                r#"
                UPDATE transcripts SET transcript = ?4
                WHERE video_id = ?1 AND language_code = ?2 AND is_generated = ?3
                "#,
                params![video_id, language_code, is_generated as i64, text],
            )
            .await?;
        if affected == 0 {
            self.conn
                .execute(
                    r#"
                    INSERT INTO transcripts (
                        video_id, language_code, is_generated,
                        is_translatable, transcript
                    ) VALUES (?1, ?2, ?3, 0, ?4)
                    "#,
                    params![video_id, language_code, is_generated as i64, text],
                )
                .await?;
        }
        Ok(())
    }

    /// Writes the externally generated study guide and/or quiz for one
    /// track. Passing `None` leaves that column untouched. Returns whether
    /// the track row existed.
    pub async fn update_generated_content(
        &self,
        video_id: &str,
        language_code: &str,
        is_generated: bool,
        study_guide: Option<&str>,
        quiz: Option<&str>,
    ) -> StoreResult<bool> {
        let affected = self
            .conn
            .execute(
                r#"
                UPDATE transcripts SET
                    study_guide = COALESCE(?4, study_guide),
                    quiz = COALESCE(?5, quiz)
                WHERE video_id = ?1 AND language_code = ?2 AND is_generated = ?3
                "#,
                params![
                    video_id,
                    language_code,
                    is_generated as i64,
                    study_guide,
                    quiz,
                ],
            )
            .await?;
        Ok(affected > 0)
    }

    pub async fn get_video(&self, video_id: &str) -> StoreResult<Option<VideoRow>> {
        let mut rows = self
            .conn
            .query(
                r#"
                SELECT video_id, url, title, description, author,
                       view_count, duration, fetched_at
                FROM videos WHERE video_id = ?1
                "#,
                params![video_id],
            )
            .await?;
        rows.next().await?.map(video_from_row).transpose()
    }

    pub async fn list_videos(&self) -> StoreResult<Vec<VideoRow>> {
        let mut rows = self
            .conn
            .query(
                r#"
                SELECT video_id, url, title, description, author,
                       view_count, duration, fetched_at
                FROM videos ORDER BY video_id
                "#,
                params![],
            )
            .await?;
        let mut videos = Vec::new();
        while let Some(row) = rows.next().await? {
            videos.push(video_from_row(row)?);
        }
        Ok(videos)
    }

    pub async fn list_transcript_rows(&self, video_id: &str) -> StoreResult<Vec<TranscriptRow>> {
        let mut rows = self
            .conn
            .query(
                r#"
                SELECT video_id, language, language_code, is_generated,
                       is_translatable, transcript, study_guide, quiz
                FROM transcripts
                WHERE video_id = ?1
                ORDER BY language_code, is_generated
                "#,
                params![video_id],
            )
            .await?;
        let mut transcripts = Vec::new();
        while let Some(row) = rows.next().await? {
            transcripts.push(transcript_from_row(row)?);
        }
        Ok(transcripts)
    }
}

/// NULL-tolerant text column read; nullable columns come back as `Value`
/// so missing data maps to `None` instead of a conversion error.
fn opt_text(row: &Row, idx: i32) -> StoreResult<Option<String>> {
    match row.get_value(idx)? {
        Value::Null => Ok(None),
        Value::Text(text) => Ok(Some(text)),
        _ => Err(StoreError::ColumnType { column: idx }),
    }
}

fn video_from_row(row: Row) -> StoreResult<VideoRow> {
    Ok(VideoRow {
        video_id: row.get(0)?,
        url: opt_text(&row, 1)?,
        title: opt_text(&row, 2)?,
        description: opt_text(&row, 3)?,
        author: opt_text(&row, 4)?,
        view_count: opt_text(&row, 5)?,
        duration: opt_text(&row, 6)?,
        fetched_at: row.get(7)?,
    })
}

fn transcript_from_row(row: Row) -> StoreResult<TranscriptRow> {
    Ok(TranscriptRow {
        video_id: row.get(0)?,
        language: opt_text(&row, 1)?,
        language_code: row.get(2)?,
        is_generated: row.get::<i64>(3)? != 0,
        is_translatable: row.get::<i64>(4)? != 0,
        transcript: opt_text(&row, 5)?,
        study_guide: opt_text(&row, 6)?,
        quiz: opt_text(&row, 7)?,
    })
}
