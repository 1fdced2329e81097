use crate::auth::AdminUser;
use crate::error::AppError;
use crate::AppState;
use actix_web::{web, HttpResponse};
use tracing::info;

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/settings")
            .route("", web::get().to(list_settings))
            .route("/{key}", web::get().to(get_setting))
            .route("/{key}", web::put().to(put_setting)),
    );
}

pub async fn list_settings(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(state.db.list_settings().await?))
}

pub async fn get_setting(
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let setting = state
        .db
        .get_setting(&path)
        .await?
        .ok_or_else(|| AppError::not_found("Setting"))?;
    Ok(HttpResponse::Ok().json(setting))
}

/// Upsert; the body is the raw JSON value.
pub async fn put_setting(
    admin: AdminUser,
    path: web::Path<String>,
    body: web::Json<serde_json::Value>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let setting = state.db.upsert_setting(&path, &body).await?;
    info!("Admin {} updated setting {}", admin.0.id(), setting.key);
    Ok(HttpResponse::Ok().json(setting))
}
