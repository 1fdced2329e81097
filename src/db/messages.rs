use crate::db::models::{Message, MessageWithProperty, Page};
use crate::db::operations::{paginate, DbOperations};
use crate::error::AppError;
use serde::Deserialize;

/// A message ready to be stored; the recipient is already resolved.
#[derive(Debug, Clone)]
pub struct NewMessage {
    pub recipient_id: i32,
    pub sender_user_id: Option<i32>,
    pub property_id: Option<i32>,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub subject: Option<String>,
    pub content: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InboxQuery {
    #[serde(default)]
    pub unread_only: bool,
    pub property_id: Option<i32>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

const SELECT_WITH_PROPERTY: &str = r#"
    SELECT m.*, p.title AS property_title
    FROM messages m
    LEFT JOIN properties p ON p.id = m.property_id
"#;

impl DbOperations {
    pub async fn create_message(&self, message: &NewMessage) -> Result<Message, AppError> {
        let message = sqlx::query_as::<_, Message>(
            r#"
            INSERT INTO messages (user_id, sender_user_id, property_id, name, email, phone, subject, content)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(message.recipient_id)
        .bind(message.sender_user_id)
        .bind(message.property_id)
        .bind(&message.name)
        .bind(&message.email)
        .bind(&message.phone)
        .bind(&message.subject)
        .bind(&message.content)
        .fetch_one(self.pool())
        .await?;

        Ok(message)
    }

    pub async fn inbox(&self, user_id: i32, query: &InboxQuery) -> Result<Page<MessageWithProperty>, AppError> {
        let (page, limit, offset) = paginate(query.page, query.limit, 20);

        let rows_sql = format!(
            r#"{SELECT_WITH_PROPERTY}
            WHERE m.user_id = $1
              AND (NOT $2 OR m.is_read = FALSE)
              AND ($3::INTEGER IS NULL OR m.property_id = $3)
            ORDER BY m.created_at DESC, m.id DESC
            LIMIT $4 OFFSET $5"#
        );
        let rows = sqlx::query_as::<_, MessageWithProperty>(&rows_sql)
            .bind(user_id)
            .bind(query.unread_only)
            .bind(query.property_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(self.pool());

        let count = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT COUNT(*) FROM messages m
            WHERE m.user_id = $1
              AND (NOT $2 OR m.is_read = FALSE)
              AND ($3::INTEGER IS NULL OR m.property_id = $3)
            "#,
        )
        .bind(user_id)
        .bind(query.unread_only)
        .bind(query.property_id)
        .fetch_one(self.pool());

        let (messages, total) = futures::try_join!(rows, count)?;
        Ok(Page::new(messages, total, page, limit))
    }

    pub async fn sent_messages(
        &self,
        user_id: i32,
        page: Option<i64>,
        limit: Option<i64>,
    ) -> Result<Page<MessageWithProperty>, AppError> {
        let (page, limit, offset) = paginate(page, limit, 20);

        let rows_sql = format!(
            r#"{SELECT_WITH_PROPERTY}
            WHERE m.sender_user_id = $1
            ORDER BY m.created_at DESC, m.id DESC
            LIMIT $2 OFFSET $3"#
        );
        let rows = sqlx::query_as::<_, MessageWithProperty>(&rows_sql)
            .bind(user_id)
            .bind(limit)
            .bind(offset)
            .fetch_all(self.pool());
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM messages WHERE sender_user_id = $1",
        )
        .bind(user_id)
        .fetch_one(self.pool());

        let (messages, total) = futures::try_join!(rows, count)?;
        Ok(Page::new(messages, total, page, limit))
    }

    pub async fn unread_count(&self, user_id: i32) -> Result<i64, AppError> {
        let count = sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM messages WHERE user_id = $1 AND is_read = FALSE",
        )
        .bind(user_id)
        .fetch_one(self.pool())
        .await?;

        Ok(count)
    }

    /// Marks a message read if `user_id` is its recipient.
    pub async fn mark_message_read(&self, id: i32, user_id: i32) -> Result<Option<Message>, AppError> {
        let message = sqlx::query_as::<_, Message>(
            "UPDATE messages SET is_read = TRUE WHERE id = $1 AND user_id = $2 RETURNING *",
        )
        .bind(id)
        .bind(user_id)
        .fetch_optional(self.pool())
        .await?;

        Ok(message)
    }

    pub async fn delete_message(&self, id: i32, user_id: i32) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM messages WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }
}
