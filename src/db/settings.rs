use crate::db::models::Setting;
use crate::db::operations::DbOperations;
use crate::error::AppError;
use chrono::Utc;
use serde_json::Value;

/// Keys whose values the storefront reads as structured objects.
const OBJECT_KEYS: &[&str] = &["currency", "site", "contact", "social"];

/// Setting keys are short identifiers: `[a-z0-9_.-]`, at most 64 characters.
pub fn validate_setting(key: &str, value: &Value) -> Result<(), AppError> {
    let well_formed = !key.is_empty()
        && key.len() <= 64
        && key
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '_' | '.' | '-'));
    if !well_formed {
        return Err(AppError::validation(format!("invalid setting key '{}'", key)));
    }
    if OBJECT_KEYS.contains(&key) && !value.is_object() {
        return Err(AppError::validation(format!("setting '{}' must be a JSON object", key)));
    }
    if key == "currency" {
        let has_code = value
            .get("code")
            .and_then(Value::as_str)
            .map(|code| code.len() == 3)
            .unwrap_or(false);
        if !has_code {
            return Err(AppError::validation("currency.code must be a three-letter code"));
        }
    }
    Ok(())
}

impl DbOperations {
    pub async fn list_settings(&self) -> Result<Vec<Setting>, AppError> {
        let settings = sqlx::query_as::<_, Setting>("SELECT * FROM settings ORDER BY key")
            .fetch_all(self.pool())
            .await?;

        Ok(settings)
    }

    pub async fn get_setting(&self, key: &str) -> Result<Option<Setting>, AppError> {
        let setting = sqlx::query_as::<_, Setting>("SELECT * FROM settings WHERE key = $1")
            .bind(key)
            .fetch_optional(self.pool())
            .await?;

        Ok(setting)
    }

    pub async fn upsert_setting(&self, key: &str, value: &Value) -> Result<Setting, AppError> {
        validate_setting(key, value)?;

        let setting = sqlx::query_as::<_, Setting>(
            r#"
            INSERT INTO settings (key, value, updated_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (key) DO UPDATE SET
                value = EXCLUDED.value,
                updated_at = EXCLUDED.updated_at
            RETURNING *
            "#,
        )
        .bind(key)
        .bind(value)
        .bind(Utc::now())
        .fetch_one(self.pool())
        .await?;

        Ok(setting)
    }
}
