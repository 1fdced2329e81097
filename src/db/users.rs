use crate::db::models::{NewUser, Page, Role, User};
use crate::db::operations::{paginate, DbOperations};
use crate::error::AppError;
use chrono::Utc;
use sqlx::{Postgres, QueryBuilder};

/// Profile fields a user may change about themselves.
#[derive(Debug, Default, Clone)]
pub struct ProfileUpdate {
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct UserQuery {
    pub role: Option<Role>,
    pub search: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl DbOperations {
    pub async fn create_user(&self, user: &NewUser) -> Result<User, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (username, email, password, full_name, phone, avatar_url, role, firebase_uid)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING *
            "#,
        )
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.full_name)
        .bind(&user.phone)
        .bind(&user.avatar_url)
        .bind(user.role.as_str())
        .bind(&user.firebase_uid)
        .fetch_one(self.pool())
        .await?;

        Ok(user)
    }

    pub async fn get_user_by_id(&self, id: i32) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;

        Ok(user)
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE LOWER(username) = LOWER($1)")
            .bind(username)
            .fetch_optional(self.pool())
            .await?;

        Ok(user)
    }

    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE LOWER(email) = LOWER($1)")
            .bind(email)
            .fetch_optional(self.pool())
            .await?;

        Ok(user)
    }

    pub async fn get_user_by_firebase_uid(&self, uid: &str) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE firebase_uid = $1")
            .bind(uid)
            .fetch_optional(self.pool())
            .await?;

        Ok(user)
    }

    /// Usernames equal to `base` or starting with it, for suffix de-duplication.
    pub async fn usernames_with_prefix(&self, base: &str) -> Result<Vec<String>, AppError> {
        let pattern = format!("{}%", escape_like(&base.to_lowercase()));
        let names = sqlx::query_scalar::<_, String>(
            "SELECT LOWER(username) FROM users WHERE LOWER(username) LIKE $1 ESCAPE '\\'",
        )
        .bind(pattern)
        .fetch_all(self.pool())
        .await?;

        Ok(names)
    }

    pub async fn link_firebase_uid(&self, user_id: i32, uid: &str) -> Result<User, AppError> {
        let user = sqlx::query_as::<_, User>(
            "UPDATE users SET firebase_uid = $1, updated_at = $2 WHERE id = $3 RETURNING *",
        )
        .bind(uid)
        .bind(Utc::now())
        .bind(user_id)
        .fetch_one(self.pool())
        .await?;

        Ok(user)
    }

    pub async fn update_profile(&self, user_id: i32, update: &ProfileUpdate) -> Result<User, AppError> {
        let user = sqlx::query_as::<_, User>(
            r#"
            UPDATE users SET
                email = COALESCE($1, email),
                full_name = COALESCE($2, full_name),
                phone = COALESCE($3, phone),
                avatar_url = COALESCE($4, avatar_url),
                updated_at = $5
            WHERE id = $6
            RETURNING *
            "#,
        )
        .bind(&update.email)
        .bind(&update.full_name)
        .bind(&update.phone)
        .bind(&update.avatar_url)
        .bind(Utc::now())
        .bind(user_id)
        .fetch_one(self.pool())
        .await?;

        Ok(user)
    }

    pub async fn update_password(&self, user_id: i32, password_hash: &str) -> Result<(), AppError> {
        sqlx::query("UPDATE users SET password = $1, updated_at = $2 WHERE id = $3")
            .bind(password_hash)
            .bind(Utc::now())
            .bind(user_id)
            .execute(self.pool())
            .await?;

        Ok(())
    }

    pub async fn update_user_role(&self, user_id: i32, role: Role) -> Result<User, AppError> {
        let user = sqlx::query_as::<_, User>(
            "UPDATE users SET role = $1, updated_at = $2 WHERE id = $3 RETURNING *",
        )
        .bind(role.as_str())
        .bind(Utc::now())
        .bind(user_id)
        .fetch_one(self.pool())
        .await?;

        Ok(user)
    }

    pub async fn delete_user(&self, user_id: i32) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(user_id)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    pub async fn list_users(&self, query: &UserQuery) -> Result<Page<User>, AppError> {
        let (page, limit, offset) = paginate(query.page, query.limit, 20);

        let mut rows = QueryBuilder::<Postgres>::new("SELECT * FROM users");
        push_user_filters(&mut rows, query);
        rows.push(" ORDER BY created_at DESC LIMIT ")
            .push_bind(limit)
            .push(" OFFSET ")
            .push_bind(offset);

        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM users");
        push_user_filters(&mut count, query);

        let (users, total) = futures::try_join!(
            rows.build_query_as::<User>().fetch_all(self.pool()),
            count.build_query_scalar::<i64>().fetch_one(self.pool()),
        )?;

        Ok(Page::new(users, total, page, limit))
    }
}

fn push_user_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &UserQuery) {
    let mut first = true;
    let mut next = |b: &mut QueryBuilder<'_, Postgres>| {
        b.push(if first { " WHERE " } else { " AND " });
        first = false;
    };

    if let Some(role) = query.role {
        next(builder);
        builder.push("role = ").push_bind(role.as_str());
    }
    if let Some(search) = query.search.as_deref().filter(|s| !s.trim().is_empty()) {
        let pattern = format!("%{}%", escape_like(search.trim()));
        next(builder);
        builder
            .push("(username ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR email ILIKE ")
            .push_bind(pattern.clone())
            .push(" OR full_name ILIKE ")
            .push_bind(pattern)
            .push(")");
    }
}

/// Escape `%`, `_` and `\` so user input matches literally inside LIKE patterns.
pub fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}
