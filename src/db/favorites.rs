use crate::db::models::{Favorite, Property};
use crate::db::operations::DbOperations;
use crate::error::AppError;

impl DbOperations {
    /// Returns the favorite and whether it was newly created.
    pub async fn add_favorite(&self, user_id: i32, property_id: i32) -> Result<(Favorite, bool), AppError> {
        let inserted = sqlx::query_as::<_, Favorite>(
            r#"
            INSERT INTO favorites (user_id, property_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id, property_id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(property_id)
        .fetch_optional(self.pool())
        .await?;

        if let Some(favorite) = inserted {
            return Ok((favorite, true));
        }

        let existing = sqlx::query_as::<_, Favorite>(
            "SELECT * FROM favorites WHERE user_id = $1 AND property_id = $2",
        )
        .bind(user_id)
        .bind(property_id)
        .fetch_one(self.pool())
        .await?;

        Ok((existing, false))
    }

    pub async fn remove_favorite(&self, user_id: i32, property_id: i32) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM favorites WHERE user_id = $1 AND property_id = $2")
            .bind(user_id)
            .bind(property_id)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn is_favorite(&self, user_id: i32, property_id: i32) -> Result<bool, AppError> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM favorites WHERE user_id = $1 AND property_id = $2)",
        )
        .bind(user_id)
        .bind(property_id)
        .fetch_one(self.pool())
        .await?;

        Ok(exists)
    }

    /// The user's favorited listings, most recently saved first.
    pub async fn favorite_properties(&self, user_id: i32) -> Result<Vec<Property>, AppError> {
        let properties = sqlx::query_as::<_, Property>(
            r#"
            SELECT p.* FROM favorites f
            JOIN properties p ON p.id = f.property_id
            WHERE f.user_id = $1
            ORDER BY f.created_at DESC
            "#,
        )
        .bind(user_id)
        .fetch_all(self.pool())
        .await?;

        Ok(properties)
    }
}
