use crate::auth::AuthUser;
use crate::error::AppError;
use crate::AppState;
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
pub struct FavoriteRequest {
    pub property_id: i32,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/favorites")
            .route("", web::get().to(list_favorites))
            .route("", web::post().to(add_favorite))
            .route("/{property_id}", web::delete().to(remove_favorite))
            .route("/{property_id}/status", web::get().to(favorite_status)),
    );
}

pub async fn list_favorites(
    auth: AuthUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(state.db.favorite_properties(auth.id()).await?))
}

/// Idempotent: saving an already saved property answers 200 with the
/// existing row.
pub async fn add_favorite(
    auth: AuthUser,
    body: web::Json<FavoriteRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    if state.db.get_property(body.property_id).await?.is_none() {
        return Err(AppError::not_found("Property"));
    }

    let (favorite, created) = state.db.add_favorite(auth.id(), body.property_id).await?;
    if created {
        Ok(HttpResponse::Created().json(favorite))
    } else {
        Ok(HttpResponse::Ok().json(favorite))
    }
}

pub async fn remove_favorite(
    auth: AuthUser,
    path: web::Path<i32>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    if !state.db.remove_favorite(auth.id(), path.into_inner()).await? {
        return Err(AppError::not_found("Favorite"));
    }
    Ok(HttpResponse::NoContent().finish())
}

pub async fn favorite_status(
    auth: AuthUser,
    path: web::Path<i32>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let property_id = path.into_inner();
    let is_favorite = state.db.is_favorite(auth.id(), property_id).await?;
    Ok(HttpResponse::Ok().json(json!({
        "property_id": property_id,
        "is_favorite": is_favorite,
    })))
}
