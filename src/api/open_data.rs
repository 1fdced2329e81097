//! Read-only proxies for Oulu open data and Google Places.

use crate::error::AppError;
use crate::proxy::oulu::DatasetSearch;
use crate::AppState;
use actix_web::{web, HttpResponse};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct AutocompleteQuery {
    #[serde(default)]
    pub input: String,
}

#[derive(Debug, Deserialize)]
pub struct DetailsQuery {
    #[serde(default)]
    pub place_id: String,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/oulu")
            .route("/datasets", web::get().to(search_datasets))
            .route("/datasets/{id}", web::get().to(get_dataset))
            .route("/attractions", web::get().to(attractions)),
    )
    .service(
        web::scope("/places")
            .route("/autocomplete", web::get().to(autocomplete))
            .route("/details", web::get().to(place_details)),
    );
}

pub async fn search_datasets(
    query: web::Query<DatasetSearch>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(state.oulu.search_datasets(&query).await?))
}

pub async fn get_dataset(
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(state.oulu.dataset(&path).await?))
}

pub async fn attractions(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(state.oulu.attractions().await?))
}

pub async fn autocomplete(
    query: web::Query<AutocompleteQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(state.places.autocomplete(&query.input).await?))
}

pub async fn place_details(
    query: web::Query<DetailsQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(state.places.details(&query.place_id).await?))
}
