use crate::db::models::{LogEntry, LogLevel, Page};
use crate::db::operations::{paginate, DbOperations};
use crate::error::AppError;
use chrono::{DateTime, Utc};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct NewLogEntry {
    pub level: LogLevel,
    pub source: String,
    pub message: String,
    pub context: Option<serde_json::Value>,
    #[serde(skip)]
    pub user_id: Option<i32>,
}

impl NewLogEntry {
    pub fn new(level: LogLevel, source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            level,
            source: source.into(),
            message: message.into(),
            context: None,
            user_id: None,
        }
    }

    pub fn with_context(mut self, context: serde_json::Value) -> Self {
        self.context = Some(context);
        self
    }

    pub fn validate(&self) -> Result<(), AppError> {
        if self.source.trim().is_empty() || self.message.trim().is_empty() {
            return Err(AppError::validation("source and message are required"));
        }
        if self.message.len() > 10_000 {
            return Err(AppError::validation("message is too long"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogQuery {
    pub level: Option<LogLevel>,
    pub source: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl DbOperations {
    pub async fn insert_log(&self, entry: &NewLogEntry) -> Result<LogEntry, AppError> {
        let row = sqlx::query_as::<_, LogEntry>(
            r#"
            INSERT INTO logs (level, source, message, context, user_id)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(entry.level.as_str())
        .bind(entry.source.trim())
        .bind(&entry.message)
        .bind(&entry.context)
        .bind(entry.user_id)
        .fetch_one(self.pool())
        .await?;

        Ok(row)
    }

    pub async fn list_logs(&self, query: &LogQuery) -> Result<Page<LogEntry>, AppError> {
        let (page, limit, offset) = paginate(query.page, query.limit, 50);
        let level = query.level.map(|l| l.as_str());

        let rows = sqlx::query_as::<_, LogEntry>(
            r#"
            SELECT * FROM logs
            WHERE ($1::TEXT IS NULL OR level = $1)
              AND ($2::TEXT IS NULL OR source = $2)
            ORDER BY created_at DESC, id DESC
            LIMIT $3 OFFSET $4
            "#,
        )
        .bind(level)
        .bind(&query.source)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool());

        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM logs
            WHERE ($1::TEXT IS NULL OR level = $1)
              AND ($2::TEXT IS NULL OR source = $2)
            "#,
        )
        .bind(level)
        .bind(&query.source)
        .fetch_one(self.pool());

        let (entries, total) = futures::try_join!(rows, count)?;
        Ok(Page::new(entries, total, page, limit))
    }

    /// Deletes entries older than `before`, or everything when it is `None`.
    pub async fn clear_logs(&self, before: Option<DateTime<Utc>>) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM logs WHERE ($1::TIMESTAMPTZ IS NULL OR created_at < $1)")
            .bind(before)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn client_log_payload() {
        let entry: NewLogEntry = serde_json::from_value(serde_json::json!({
            "level": "error",
            "source": "frontend",
            "message": "map tiles failed to load",
            "context": { "url": "/kartta" },
            "user_id": 1
        }))
        .unwrap();

        assert_eq!(entry.level, LogLevel::Error);
        assert!(entry.user_id.is_none());
        assert!(entry.validate().is_ok());

        let blank = NewLogEntry::new(LogLevel::Info, " ", "x");
        assert!(blank.validate().is_err());
    }
}
