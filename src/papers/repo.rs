use std::sync::Mutex;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

use crate::papers::key::PaperKey;

/// One tracked paper for one user. `timezone` is NULL for papers without
/// a timezone variant.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CompletionRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub subject_id: String,
    pub year: i32,
    pub session: String,
    pub paper: String,
    pub timezone: Option<String>,
    pub is_completed: bool,
    pub score: Option<i32>,
    pub updated_at: OffsetDateTime,
}

impl CompletionRecord {
    pub fn key(&self) -> PaperKey {
        PaperKey::new(
            self.subject_id.clone(),
            self.year,
            self.session.clone(),
            self.paper.clone(),
            self.timezone.clone(),
        )
    }
}

/// Store the upsert matcher runs against. `find` applies the timezone
/// predicate: a concrete timezone matches only rows storing exactly that
/// value, an absent one matches only rows storing none (NULL or empty).
/// The two branches never overlap for the same base key.
#[async_trait]
pub trait CompletionStore: Send + Sync {
    async fn find(
        &self,
        user_id: Uuid,
        key: &PaperKey,
    ) -> anyhow::Result<Option<CompletionRecord>>;

    async fn update(&self, id: Uuid, is_completed: bool, score: Option<i32>)
        -> anyhow::Result<()>;

    async fn insert(
        &self,
        user_id: Uuid,
        key: &PaperKey,
        is_completed: bool,
        score: Option<i32>,
    ) -> anyhow::Result<CompletionRecord>;

    async fn list_by_user(&self, user_id: Uuid) -> anyhow::Result<Vec<CompletionRecord>>;
}

pub struct PgCompletionStore {
    db: PgPool,
}

impl PgCompletionStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl CompletionStore for PgCompletionStore {
    async fn find(
        &self,
        user_id: Uuid,
        key: &PaperKey,
    ) -> anyhow::Result<Option<CompletionRecord>> {
        let record = match &key.timezone {
            Some(tz) => {
                sqlx::query_as::<_, CompletionRecord>(
                    r#"
                    SELECT id, user_id, subject_id, year, session, paper,
                           timezone, is_completed, score, updated_at
                    FROM completion_status
                    WHERE user_id = $1 AND subject_id = $2 AND year = $3
                      AND session = $4 AND paper = $5 AND timezone = $6
                    "#,
                )
                .bind(user_id)
                .bind(&key.subject_id)
                .bind(key.year)
                .bind(&key.session)
                .bind(&key.paper)
                .bind(tz)
                .fetch_optional(&self.db)
                .await?
            }
            None => {
                sqlx::query_as::<_, CompletionRecord>(
                    r#"
                    SELECT id, user_id, subject_id, year, session, paper,
                           timezone, is_completed, score, updated_at
                    FROM completion_status
                    WHERE user_id = $1 AND subject_id = $2 AND year = $3
                      AND session = $4 AND paper = $5
                      AND (timezone IS NULL OR timezone = '')
                    "#,
                )
                .bind(user_id)
                .bind(&key.subject_id)
                .bind(key.year)
                .bind(&key.session)
                .bind(&key.paper)
                .fetch_optional(&self.db)
                .await?
            }
        };
        Ok(record)
    }

    async fn update(
        &self,
        id: Uuid,
        is_completed: bool,
        score: Option<i32>,
    ) -> anyhow::Result<()> {
        sqlx::query(
            r#"
            UPDATE completion_status
            SET is_completed = $2, score = $3, updated_at = now()
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(is_completed)
        .bind(score)
        .execute(&self.db)
        .await?;
        Ok(())
    }

    async fn insert(
        &self,
        user_id: Uuid,
        key: &PaperKey,
        is_completed: bool,
        score: Option<i32>,
    ) -> anyhow::Result<CompletionRecord> {
        let record = sqlx::query_as::<_, CompletionRecord>(
            r#"
            INSERT INTO completion_status
                (user_id, subject_id, year, session, paper, timezone, is_completed, score)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING id, user_id, subject_id, year, session, paper,
                      timezone, is_completed, score, updated_at
            "#,
        )
        .bind(user_id)
        .bind(&key.subject_id)
        .bind(key.year)
        .bind(&key.session)
        .bind(&key.paper)
        .bind(&key.timezone)
        .bind(is_completed)
        .bind(score)
        .fetch_one(&self.db)
        .await?;
        Ok(record)
    }

    async fn list_by_user(&self, user_id: Uuid) -> anyhow::Result<Vec<CompletionRecord>> {
        let rows = sqlx::query_as::<_, CompletionRecord>(
            r#"
            SELECT id, user_id, subject_id, year, session, paper,
                   timezone, is_completed, score, updated_at
            FROM completion_status
            WHERE user_id = $1
            ORDER BY subject_id, year, session, paper
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows)
    }
}

/// In-memory store used by `AppState::fake()` and unit tests.
#[derive(Default)]
pub struct MemoryCompletionStore {
    records: Mutex<Vec<CompletionRecord>>,
}

fn matches(record: &CompletionRecord, user_id: Uuid, key: &PaperKey) -> bool {
    if record.user_id != user_id
        || record.subject_id != key.subject_id
        || record.year != key.year
        || record.session != key.session
        || record.paper != key.paper
    {
        return false;
    }
    match &key.timezone {
        Some(tz) => record.timezone.as_deref() == Some(tz.as_str()),
        None => record.timezone.as_deref().map_or(true, str::is_empty),
    }
}

#[async_trait]
impl CompletionStore for MemoryCompletionStore {
    async fn find(
        &self,
        user_id: Uuid,
        key: &PaperKey,
    ) -> anyhow::Result<Option<CompletionRecord>> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .find(|r| matches(r, user_id, key))
            .cloned())
    }

    async fn update(
        &self,
        id: Uuid,
        is_completed: bool,
        score: Option<i32>,
    ) -> anyhow::Result<()> {
        let mut records = self.records.lock().unwrap();
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| anyhow::anyhow!("no record with id {id}"))?;
        record.is_completed = is_completed;
        record.score = score;
        record.updated_at = OffsetDateTime::now_utc();
        Ok(())
    }

    async fn insert(
        &self,
        user_id: Uuid,
        key: &PaperKey,
        is_completed: bool,
        score: Option<i32>,
    ) -> anyhow::Result<CompletionRecord> {
        let record = CompletionRecord {
            id: Uuid::new_v4(),
            user_id,
            subject_id: key.subject_id.clone(),
            year: key.year,
            session: key.session.clone(),
            paper: key.paper.clone(),
            timezone: key.timezone.clone(),
            is_completed,
            score,
            updated_at: OffsetDateTime::now_utc(),
        };
        self.records.lock().unwrap().push(record.clone());
        Ok(record)
    }

    async fn list_by_user(&self, user_id: Uuid) -> anyhow::Result<Vec<CompletionRecord>> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .iter()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect())
    }
}
