use crate::auth::{AdminUser, MaybeUser};
use crate::db::filters::PropertyFilter;
use crate::db::models::{ListingStatus, Role};
use crate::db::users::UserQuery;
use crate::error::AppError;
use crate::AppState;
use actix_web::{web, HttpResponse};
use serde::{Deserialize, Serialize};
use tracing::info;

#[derive(Debug, Deserialize)]
pub struct UserListQuery {
    pub role: Option<Role>,
    pub search: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct ListingQuery {
    pub status: Option<ListingStatus>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct RoleUpdate {
    pub role: Role,
}

/// What anyone may see about another user.
#[derive(Debug, Serialize)]
pub struct PublicProfile {
    pub id: i32,
    pub username: String,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub role: String,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/users")
            .route("", web::get().to(list_users))
            .route("/{id}", web::get().to(get_user))
            .route("/{id}", web::delete().to(delete_user))
            .route("/{id}/role", web::patch().to(update_role))
            .route("/{id}/properties", web::get().to(user_properties)),
    );
}

pub async fn list_users(
    _admin: AdminUser,
    query: web::Query<UserListQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let query = query.into_inner();
    let page = state
        .db
        .list_users(&UserQuery {
            role: query.role,
            search: query.search,
            page: query.page,
            limit: query.limit,
        })
        .await?;
    Ok(HttpResponse::Ok().json(page))
}

pub async fn get_user(
    path: web::Path<i32>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let user = state
        .db
        .get_user_by_id(path.into_inner())
        .await?
        .ok_or_else(|| AppError::not_found("User"))?;

    Ok(HttpResponse::Ok().json(PublicProfile {
        id: user.id,
        username: user.username,
        full_name: user.full_name,
        avatar_url: user.avatar_url,
        role: user.role,
    }))
}

pub async fn update_role(
    admin: AdminUser,
    path: web::Path<i32>,
    body: web::Json<RoleUpdate>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    if id == admin.0.id() && body.role != Role::Admin {
        return Err(AppError::validation("admins cannot demote themselves"));
    }

    let user = state.db.update_user_role(id, body.role).await?;
    info!("Admin {} set role of user {} to {}", admin.0.id(), id, user.role);
    Ok(HttpResponse::Ok().json(user))
}

pub async fn delete_user(
    admin: AdminUser,
    path: web::Path<i32>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    if id == admin.0.id() {
        return Err(AppError::validation("admins cannot delete their own account"));
    }
    if !state.db.delete_user(id).await? {
        return Err(AppError::not_found("User"));
    }
    info!("Admin {} deleted user {}", admin.0.id(), id);
    Ok(HttpResponse::NoContent().finish())
}

/// A user's listings. Only the owner and admins may look past active ones.
pub async fn user_properties(
    caller: MaybeUser,
    path: web::Path<i32>,
    query: web::Query<ListingQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let user_id = path.into_inner();
    let privileged = caller
        .0
        .as_ref()
        .map(|c| c.id() == user_id || c.is_admin())
        .unwrap_or(false);

    let query = query.into_inner();
    let filter = PropertyFilter {
        user_id: Some(user_id),
        status: if privileged { query.status } else { None },
        page: query.page,
        limit: query.limit,
        ..Default::default()
    };

    Ok(HttpResponse::Ok().json(state.db.search_properties(&filter).await?))
}
