use crate::db::models::UserSession;
use crate::error::AppError;
use chrono::Utc;
use sqlx::PgPool;
use sqlx::{Postgres, Transaction};
use std::sync::Arc;

/// Data access layer shared by every route module.
///
/// Queries are split by resource across the sibling modules (`users`,
/// `properties`, `messages`, ...); this file holds the pool plumbing and
/// session storage.
#[derive(Clone)]
pub struct DbOperations {
    pub(crate) pool: Arc<PgPool>,
}

impl DbOperations {
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        self.pool.as_ref()
    }

    pub async fn run_migrations(&self) -> Result<(), AppError> {
        sqlx::migrate!("./migrations").run(self.pool()).await?;
        Ok(())
    }

    pub async fn begin_transaction(&self) -> Result<Transaction<'_, Postgres>, AppError> {
        Ok(self.pool.as_ref().begin().await?)
    }

    pub async fn create_session(&self, session: &UserSession) -> Result<UserSession, AppError> {
        let session = sqlx::query_as::<_, UserSession>(
            r#"
            INSERT INTO user_sessions (id, user_id, token, expires_at, created_at, last_activity)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(session.id)
        .bind(session.user_id)
        .bind(&session.token)
        .bind(session.expires_at)
        .bind(session.created_at)
        .bind(session.last_activity)
        .fetch_one(self.pool())
        .await?;

        Ok(session)
    }

    pub async fn get_session_by_token(&self, token: &str) -> Result<Option<UserSession>, AppError> {
        let session =
            sqlx::query_as::<_, UserSession>("SELECT * FROM user_sessions WHERE token = $1")
                .bind(token)
                .fetch_optional(self.pool())
                .await?;

        Ok(session)
    }

    pub async fn update_session_activity(&self, token: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE user_sessions SET last_activity = $1 WHERE token = $2")
            .bind(Utc::now())
            .bind(token)
            .execute(self.pool())
            .await?;

        Ok(())
    }

    pub async fn delete_session(&self, token: &str) -> Result<(), AppError> {
        sqlx::query("DELETE FROM user_sessions WHERE token = $1")
            .bind(token)
            .execute(self.pool())
            .await?;

        Ok(())
    }

    pub async fn delete_sessions_for_user(&self, user_id: i32) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM user_sessions WHERE user_id = $1")
            .bind(user_id)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected())
    }

    pub async fn cleanup_expired_sessions(&self) -> Result<u64, AppError> {
        let mut transaction = self.begin_transaction().await?;

        let result = sqlx::query("DELETE FROM user_sessions WHERE expires_at < $1")
            .bind(Utc::now())
            .execute(&mut *transaction)
            .await;

        match result {
            Ok(result) => {
                transaction.commit().await?;
                Ok(result.rows_affected())
            }
            Err(e) => {
                transaction.rollback().await?;
                Err(e.into())
            }
        }
    }
}

/// Highest page number honoured; larger requests land on this page.
pub const MAX_PAGE: i64 = 1_000_000;

/// Clamp user-supplied pagination to sane bounds, returning `(page, limit, offset)`.
pub fn paginate(page: Option<i64>, limit: Option<i64>, default_limit: i64) -> (i64, i64, i64) {
    let page = page.unwrap_or(1).clamp(1, MAX_PAGE);
    let limit = limit.unwrap_or(default_limit).clamp(1, 100);
    (page, limit, (page - 1).saturating_mul(limit))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paginate_clamps_values() {
        assert_eq!(paginate(None, None, 12), (1, 12, 0));
        assert_eq!(paginate(Some(3), Some(10), 12), (3, 10, 20));
        assert_eq!(paginate(Some(0), Some(1000), 12), (1, 100, 0));
        assert_eq!(paginate(Some(-4), Some(0), 12), (1, 1, 0));
        assert_eq!(
            paginate(Some(i64::MAX), Some(100), 12),
            (MAX_PAGE, 100, (MAX_PAGE - 1) * 100)
        );
        assert_eq!(paginate(Some(i64::MIN), None, 12), (1, 12, 0));
    }
}
