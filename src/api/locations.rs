use crate::auth::AdminUser;
use crate::db::locations::LocationInput;
use crate::error::AppError;
use crate::AppState;
use actix_web::{web, HttpResponse};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct CityQuery {
    pub city: Option<String>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/locations")
            .route("", web::get().to(list_locations))
            .route("", web::post().to(create_location))
            .route("/{id}", web::get().to(get_location))
            .route("/{id}", web::patch().to(update_location))
            .route("/{id}", web::delete().to(delete_location)),
    );
}

pub async fn list_locations(
    query: web::Query<CityQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let city = query.city.as_deref().map(str::trim).filter(|c| !c.is_empty());
    Ok(HttpResponse::Ok().json(state.db.list_locations(city).await?))
}

pub async fn get_location(
    path: web::Path<i32>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let location = state
        .db
        .get_location(path.into_inner())
        .await?
        .ok_or_else(|| AppError::not_found("Location"))?;
    Ok(HttpResponse::Ok().json(location))
}

pub async fn create_location(
    _admin: AdminUser,
    body: web::Json<LocationInput>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    body.validate()?;
    let location = state.db.create_location(&body).await?;
    Ok(HttpResponse::Created().json(location))
}

pub async fn update_location(
    _admin: AdminUser,
    path: web::Path<i32>,
    body: web::Json<LocationInput>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    body.validate()?;
    let location = state.db.update_location(path.into_inner(), &body).await?;
    Ok(HttpResponse::Ok().json(location))
}

pub async fn delete_location(
    _admin: AdminUser,
    path: web::Path<i32>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    if !state.db.delete_location(path.into_inner()).await? {
        return Err(AppError::not_found("Location"));
    }
    Ok(HttpResponse::NoContent().finish())
}
