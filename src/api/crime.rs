use crate::auth::AdminUser;
use crate::db::crime::CrimeQuery;
use crate::error::AppError;
use crate::proxy::SyncTrigger;
use crate::AppState;
use actix_web::{web, HttpResponse};

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/crime-data")
            .route("", web::get().to(list_crime_data))
            .route("/summary", web::get().to(crime_summary))
            .route("/municipalities", web::get().to(municipalities))
            .route("/status", web::get().to(sync_status))
            .route("/sync", web::post().to(trigger_sync)),
    );
}

pub async fn list_crime_data(
    query: web::Query<CrimeQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    query.validate()?;
    Ok(HttpResponse::Ok().json(state.db.list_crime_data(&query).await?))
}

pub async fn crime_summary(
    query: web::Query<CrimeQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    query.validate()?;
    Ok(HttpResponse::Ok().json(state.db.crime_summary(&query).await?))
}

pub async fn municipalities(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(state.db.crime_municipalities().await?))
}

pub async fn sync_status(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(state.crime.status().await))
}

/// Runs a full sync in the request and answers with its report; 409 while
/// another run holds the lock.
pub async fn trigger_sync(
    _admin: AdminUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let report = state.crime.run(&state.db, SyncTrigger::Manual).await?;
    Ok(HttpResponse::Ok().json(report))
}
