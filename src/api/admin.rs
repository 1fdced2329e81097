use crate::auth::AdminUser;
use crate::error::AppError;
use crate::AppState;
use actix_web::{web, HttpResponse};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/admin/stats", web::get().to(stats));
}

pub async fn stats(_admin: AdminUser, state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(state.db.admin_stats().await?))
}
