use crate::auth::extractor::AuthUser;
use crate::auth::service::{validate_email, RegisterRequest};
use crate::db::users::ProfileUpdate;
use crate::error::{AppError, AuthError, ProxyError};
use crate::AppState;
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct FirebaseLoginRequest {
    pub id_token: String,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProfileRequest {
    pub email: Option<String>,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ChangePasswordRequest {
    pub current_password: String,
    pub new_password: String,
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.route("/register", web::post().to(register))
        .route("/login", web::post().to(login))
        .route("/auth/firebase", web::post().to(firebase_login))
        .route("/logout", web::post().to(logout))
        .route("/user", web::get().to(current_user))
        .route("/user", web::patch().to(update_profile))
        .route("/user/password", web::post().to(change_password));
}

pub async fn register(
    req: web::Json<RegisterRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    info!("Received registration request for username: {}", req.username);
    let response = state.auth_service.register(&req).await.map_err(|e| {
        warn!("Registration failed for {}: {}", req.username, e);
        e
    })?;
    Ok(HttpResponse::Created().json(response))
}

pub async fn login(
    req: web::Json<LoginRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    if req.username.trim().is_empty() || req.password.is_empty() {
        return Err(AppError::validation("username and password are required"));
    }
    if !state.rate_limiter.check_rate_limit(req.username.trim()).await {
        warn!("Login rate limit hit for {}", req.username);
        return Err(AuthError::RateLimited.into());
    }

    match state.auth_service.authenticate(&req.username, &req.password).await {
        Ok(response) => {
            state.rate_limiter.reset(req.username.trim()).await;
            info!("Login successful for {}", response.user.username);
            Ok(HttpResponse::Ok().json(response))
        }
        Err(e) => {
            warn!("Login failed for {}: {}", req.username, e);
            Err(e)
        }
    }
}

pub async fn firebase_login(
    req: web::Json<FirebaseLoginRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    if !state.auth_service.firebase_enabled() {
        return Err(ProxyError::NotConfigured("Firebase sign-in".into()).into());
    }
    if req.id_token.trim().is_empty() {
        return Err(AppError::validation("id_token is required"));
    }

    let (response, created) = state.auth_service.authenticate_firebase(req.id_token.trim()).await?;
    if created {
        Ok(HttpResponse::Created().json(response))
    } else {
        Ok(HttpResponse::Ok().json(response))
    }
}

pub async fn logout(auth: AuthUser, state: web::Data<AppState>) -> Result<HttpResponse, AppError> {
    state.auth_service.invalidate_token(&auth.token).await?;
    info!("User {} logged out", auth.id());

    Ok(HttpResponse::Ok().json(json!({
        "message": "Successfully logged out"
    })))
}

pub async fn current_user(auth: AuthUser) -> HttpResponse {
    HttpResponse::Ok().json(auth.user)
}

pub async fn update_profile(
    auth: AuthUser,
    req: web::Json<UpdateProfileRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let req = req.into_inner();
    if let Some(email) = &req.email {
        validate_email(email)?;
        if let Some(owner) = state.db.get_user_by_email(email.trim()).await? {
            if owner.id != auth.id() {
                return Err(AppError::Conflict("email is already registered".into()));
            }
        }
    }

    let update = ProfileUpdate {
        email: req.email.map(|e| e.trim().to_string()),
        full_name: req.full_name,
        phone: req.phone,
        avatar_url: req.avatar_url,
    };
    let user = state.db.update_profile(auth.id(), &update).await?;
    Ok(HttpResponse::Ok().json(user))
}

pub async fn change_password(
    auth: AuthUser,
    req: web::Json<ChangePasswordRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let token = state
        .auth_service
        .change_password(&auth.user, &req.current_password, &req.new_password)
        .await?;

    Ok(HttpResponse::Ok().json(json!({ "token": token })))
}
