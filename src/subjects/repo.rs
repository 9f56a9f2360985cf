use sqlx::{FromRow, PgPool};
use uuid::Uuid;

/// Snapshot of the subjects a user tracks; at most one row per user.
#[derive(Debug, Clone, FromRow)]
pub struct SubjectSnapshot {
    pub id: Uuid,
    pub user_id: Uuid,
    pub subjects: serde_json::Value,
}

impl SubjectSnapshot {
    pub async fn find_by_user(db: &PgPool, user_id: Uuid) -> anyhow::Result<Option<Self>> {
        let snapshot = sqlx::query_as::<_, SubjectSnapshot>(
            r#"
            SELECT id, user_id, subjects
            FROM user_subjects
            WHERE user_id = $1
            "#,
        )
        .bind(user_id)
        .fetch_optional(db)
        .await?;
        Ok(snapshot)
    }

    /// Lookup-then-write, same shape as the completion matcher.
    pub async fn save(db: &PgPool, user_id: Uuid, subjects: &[String]) -> anyhow::Result<()> {
        let payload = serde_json::to_value(subjects)?;

        match Self::find_by_user(db, user_id).await? {
            Some(existing) => {
                sqlx::query(
                    r#"
                    UPDATE user_subjects
                    SET subjects = $2
                    WHERE id = $1
                    "#,
                )
                .bind(existing.id)
                .bind(&payload)
                .execute(db)
                .await?;
            }
            None => {
                sqlx::query(
                    r#"
                    INSERT INTO user_subjects (user_id, subjects)
                    VALUES ($1, $2)
                    "#,
                )
                .bind(user_id)
                .bind(&payload)
                .execute(db)
                .await?;
            }
        }
        Ok(())
    }
}
