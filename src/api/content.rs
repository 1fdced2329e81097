//! Editorial content: neighborhoods, blog posts, footer blocks, page
//! sections and static pages. Reads are public; writes need an admin.
//!
//! Routes that are read by slug and written by id share one path pattern
//! so the method decides which handler runs.

use crate::auth::{AdminUser, MaybeUser};
use crate::db::content::{FooterInput, NeighborhoodInput, PostInput, PostQuery, StaticPageInput};
use crate::error::AppError;
use crate::AppState;
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use tracing::info;

const MAX_KEY_LEN: usize = 64;

#[derive(Debug, Deserialize)]
pub struct CityQuery {
    pub city: Option<String>,
}

/// Section and page keys are short lowercase identifiers.
fn validate_key(kind: &str, key: &str) -> Result<(), AppError> {
    let valid = !key.is_empty()
        && key.len() <= MAX_KEY_LEN
        && key
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(AppError::validation(format!(
            "{} must be 1-{} characters of a-z, 0-9, '_' or '-'",
            kind, MAX_KEY_LEN
        )))
    }
}

fn is_admin(caller: &MaybeUser) -> bool {
    caller.0.as_ref().map(|c| c.is_admin()).unwrap_or(false)
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/neighborhoods")
            .route("", web::get().to(list_neighborhoods))
            .route("", web::post().to(create_neighborhood))
            .route("/{id}", web::get().to(get_neighborhood))
            .route("/{id}", web::patch().to(update_neighborhood))
            .route("/{id}", web::delete().to(delete_neighborhood)),
    )
    .service(
        web::scope("/posts")
            .route("", web::get().to(list_posts))
            .route("", web::post().to(create_post))
            .route("/{key}", web::get().to(get_post))
            .route("/{key}", web::patch().to(update_post))
            .route("/{key}", web::delete().to(delete_post)),
    )
    .service(
        web::scope("/footer")
            .route("", web::get().to(list_footer))
            .route("/{section}", web::put().to(upsert_footer))
            .route("/{section}", web::delete().to(delete_footer)),
    )
    .service(
        web::scope("/pages/{page_key}/content")
            .route("", web::get().to(page_content))
            .route("/{section}", web::put().to(upsert_page_content)),
    )
    .service(
        web::scope("/static-pages")
            .route("", web::get().to(list_static_pages))
            .route("", web::post().to(create_static_page))
            .route("/{key}", web::get().to(get_static_page))
            .route("/{key}", web::patch().to(update_static_page))
            .route("/{key}", web::delete().to(delete_static_page)),
    );
}

// Neighborhoods

pub async fn list_neighborhoods(
    query: web::Query<CityQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let city = query.city.as_deref().map(str::trim).filter(|c| !c.is_empty());
    Ok(HttpResponse::Ok().json(state.db.list_neighborhoods(city).await?))
}

pub async fn get_neighborhood(
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let neighborhood = state
        .db
        .find_neighborhood(&path)
        .await?
        .ok_or_else(|| AppError::not_found("Neighborhood"))?;
    Ok(HttpResponse::Ok().json(neighborhood))
}

pub async fn create_neighborhood(
    _admin: AdminUser,
    body: web::Json<NeighborhoodInput>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let slug = body.validate()?;
    let neighborhood = state.db.create_neighborhood(&body, &slug).await?;
    Ok(HttpResponse::Created().json(neighborhood))
}

pub async fn update_neighborhood(
    _admin: AdminUser,
    path: web::Path<i32>,
    body: web::Json<NeighborhoodInput>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let slug = body.validate()?;
    let neighborhood = state
        .db
        .update_neighborhood(path.into_inner(), &body, &slug)
        .await?;
    Ok(HttpResponse::Ok().json(neighborhood))
}

pub async fn delete_neighborhood(
    _admin: AdminUser,
    path: web::Path<i32>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    if !state.db.delete_neighborhood(path.into_inner()).await? {
        return Err(AppError::not_found("Neighborhood"));
    }
    Ok(HttpResponse::NoContent().finish())
}

// Posts

/// Published posts, newest first. `include_drafts` is honoured for admins
/// only and silently ignored for everyone else.
pub async fn list_posts(
    caller: MaybeUser,
    query: web::Query<PostQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let include_drafts = query.include_drafts && is_admin(&caller);
    Ok(HttpResponse::Ok().json(state.db.list_posts(&query, include_drafts).await?))
}

pub async fn get_post(
    caller: MaybeUser,
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let post = state
        .db
        .get_post_by_slug(&path)
        .await?
        .filter(|p| p.published || is_admin(&caller))
        .ok_or_else(|| AppError::not_found("Post"))?;
    Ok(HttpResponse::Ok().json(post))
}

pub async fn create_post(
    admin: AdminUser,
    body: web::Json<PostInput>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let slug = body.validate()?;
    let post = state.db.create_post(&body, &slug, admin.0.id()).await?;
    info!("Admin {} created post {}", admin.0.id(), post.slug);
    Ok(HttpResponse::Created().json(post))
}

pub async fn update_post(
    _admin: AdminUser,
    path: web::Path<i32>,
    body: web::Json<PostInput>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let slug = body.validate()?;
    let post = state.db.update_post(path.into_inner(), &body, &slug).await?;
    Ok(HttpResponse::Ok().json(post))
}

pub async fn delete_post(
    _admin: AdminUser,
    path: web::Path<i32>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    if !state.db.delete_post(path.into_inner()).await? {
        return Err(AppError::not_found("Post"));
    }
    Ok(HttpResponse::NoContent().finish())
}

// Footer

/// Active footer blocks in display order; admins also get inactive ones.
pub async fn list_footer(
    caller: MaybeUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(state.db.list_footer(is_admin(&caller)).await?))
}

pub async fn upsert_footer(
    _admin: AdminUser,
    path: web::Path<String>,
    body: web::Json<FooterInput>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    validate_key("footer section", &path)?;
    Ok(HttpResponse::Ok().json(state.db.upsert_footer(&path, &body).await?))
}

pub async fn delete_footer(
    _admin: AdminUser,
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    if !state.db.delete_footer(&path).await? {
        return Err(AppError::not_found("Footer section"));
    }
    Ok(HttpResponse::NoContent().finish())
}

// Page sections

pub async fn page_content(
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(state.db.page_content(&path).await?))
}

pub async fn upsert_page_content(
    _admin: AdminUser,
    path: web::Path<(String, String)>,
    body: web::Json<serde_json::Value>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let (page_key, section) = path.into_inner();
    validate_key("page key", &page_key)?;
    validate_key("page section", &section)?;

    let content = state
        .db
        .upsert_page_content(&page_key, &section, &body)
        .await?;
    Ok(HttpResponse::Ok().json(content))
}

// Static pages

pub async fn list_static_pages(
    caller: MaybeUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(state.db.list_static_pages(is_admin(&caller)).await?))
}

pub async fn get_static_page(
    caller: MaybeUser,
    path: web::Path<String>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let page = state
        .db
        .get_static_page(&path)
        .await?
        .filter(|p| p.published || is_admin(&caller))
        .ok_or_else(|| AppError::not_found("Page"))?;
    Ok(HttpResponse::Ok().json(page))
}

pub async fn create_static_page(
    _admin: AdminUser,
    body: web::Json<StaticPageInput>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let slug = body.validate()?;
    let page = state.db.create_static_page(&body, &slug).await?;
    Ok(HttpResponse::Created().json(page))
}

pub async fn update_static_page(
    _admin: AdminUser,
    path: web::Path<i32>,
    body: web::Json<StaticPageInput>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let slug = body.validate()?;
    let page = state
        .db
        .update_static_page(path.into_inner(), &body, &slug)
        .await?;
    Ok(HttpResponse::Ok().json(page))
}

pub async fn delete_static_page(
    _admin: AdminUser,
    path: web::Path<i32>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    if !state.db.delete_static_page(path.into_inner()).await? {
        return Err(AppError::not_found("Page"));
    }
    Ok(HttpResponse::NoContent().finish())
}
