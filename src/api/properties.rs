use crate::auth::AuthUser;
use crate::db::filters::PropertyFilter;
use crate::db::properties::{NewProperty, PropertyUpdate};
use crate::error::AppError;
use crate::recommend::{recommend, DEFAULT_RECOMMENDATIONS, MAX_RECOMMENDATIONS};
use crate::AppState;
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use tracing::info;

const DEFAULT_FEATURED: i64 = 6;

#[derive(Debug, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<i64>,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/properties")
            .route("", web::get().to(list_properties))
            .route("", web::post().to(create_property))
            .route("/featured", web::get().to(featured_properties))
            .route("/cities", web::get().to(property_cities))
            .route("/{id}", web::get().to(get_property))
            .route("/{id}", web::patch().to(update_property))
            .route("/{id}", web::delete().to(delete_property))
            .route("/{id}/recommended", web::get().to(recommended_properties)),
    );
}

pub async fn list_properties(
    filter: web::Query<PropertyFilter>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let result = state.db.search_properties(&filter).await?;
    Ok(HttpResponse::Ok().json(result))
}

pub async fn featured_properties(
    query: web::Query<LimitQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let properties = state
        .db
        .featured_properties(query.limit.unwrap_or(DEFAULT_FEATURED))
        .await?;
    Ok(HttpResponse::Ok().json(properties))
}

pub async fn property_cities(state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(state.db.property_cities().await?))
}

pub async fn get_property(
    path: web::Path<i32>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let property = state
        .db
        .view_property(path.into_inner())
        .await?
        .ok_or_else(|| AppError::not_found("Property"))?;
    Ok(HttpResponse::Ok().json(property))
}

pub async fn recommended_properties(
    path: web::Path<i32>,
    query: web::Query<LimitQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let limit = query
        .limit
        .map(|l| l.clamp(1, MAX_RECOMMENDATIONS as i64) as usize)
        .unwrap_or(DEFAULT_RECOMMENDATIONS);

    let source = state
        .db
        .get_property(id)
        .await?
        .ok_or_else(|| AppError::not_found("Property"))?;
    let candidates = state.db.recommendation_candidates(id).await?;

    Ok(HttpResponse::Ok().json(recommend(&source, candidates, limit)))
}

pub async fn create_property(
    auth: AuthUser,
    body: web::Json<NewProperty>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let mut new = body.into_inner();
    new.validate()?;
    if !auth.is_admin() {
        new.is_featured = false;
    }

    let property = state.db.create_property(auth.id(), &new).await?;
    info!("User {} listed property {}", auth.id(), property.id);
    Ok(HttpResponse::Created().json(property))
}

pub async fn update_property(
    auth: AuthUser,
    path: web::Path<i32>,
    body: web::Json<PropertyUpdate>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let existing = state
        .db
        .get_property(id)
        .await?
        .ok_or_else(|| AppError::not_found("Property"))?;
    auth.require_owner_or_admin(existing.user_id)?;

    let mut update = body.into_inner();
    if !auth.is_admin() {
        update.is_featured = None;
    }
    update.validate()?;

    let property = state.db.update_property(id, &update).await?;
    Ok(HttpResponse::Ok().json(property))
}

pub async fn delete_property(
    auth: AuthUser,
    path: web::Path<i32>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let id = path.into_inner();
    let existing = state
        .db
        .get_property(id)
        .await?
        .ok_or_else(|| AppError::not_found("Property"))?;
    auth.require_owner_or_admin(existing.user_id)?;

    state.db.delete_property(id).await?;
    info!("User {} deleted property {}", auth.id(), id);
    Ok(HttpResponse::NoContent().finish())
}
