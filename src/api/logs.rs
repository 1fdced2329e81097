use crate::auth::{AdminUser, MaybeUser};
use crate::db::logs::{LogQuery, NewLogEntry};
use crate::error::AppError;
use crate::AppState;
use actix_web::{web, HttpResponse};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
pub struct ClearQuery {
    pub before: Option<DateTime<Utc>>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/logs")
            .route("", web::get().to(list_logs))
            .route("", web::post().to(report_log))
            .route("", web::delete().to(clear_logs)),
    );
}

pub async fn list_logs(
    _admin: AdminUser,
    query: web::Query<LogQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(state.db.list_logs(&query).await?))
}

/// Client-side error reporting. Anyone may post; a signed-in caller is
/// recorded as the entry's user.
pub async fn report_log(
    caller: MaybeUser,
    body: web::Json<NewLogEntry>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let mut entry = body.into_inner();
    entry.validate()?;
    entry.user_id = caller.0.as_ref().map(|c| c.id());

    warn!("Client report from {}: {}", entry.source, entry.message);
    let stored = state.db.insert_log(&entry).await?;
    Ok(HttpResponse::Created().json(stored))
}

pub async fn clear_logs(
    admin: AdminUser,
    query: web::Query<ClearQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let deleted = state.db.clear_logs(query.before).await?;
    info!("Admin {} cleared {} log entries", admin.0.id(), deleted);
    Ok(HttpResponse::Ok().json(json!({ "deleted": deleted })))
}
