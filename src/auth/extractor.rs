use crate::db::models::User;
use crate::error::{AppError, AuthError};
use crate::AppState;
use actix_web::dev::Payload;
use actix_web::http::header::AUTHORIZATION;
use actix_web::{web, FromRequest, HttpRequest};
use futures::future::LocalBoxFuture;

/// Bearer token from the `Authorization` header, if present.
pub fn bearer_token(req: &HttpRequest) -> Option<String> {
    req.headers()
        .get(AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
}

fn app_state(req: &HttpRequest) -> Result<web::Data<AppState>, AppError> {
    req.app_data::<web::Data<AppState>>()
        .cloned()
        .ok_or_else(|| AppError::InternalError("application state is not registered".into()))
}

/// The authenticated caller. Rejects the request with 401 when the token
/// is missing, invalid or its session has ended.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub user: User,
    pub token: String,
}

impl AuthUser {
    pub fn id(&self) -> i32 {
        self.user.id
    }

    pub fn is_admin(&self) -> bool {
        self.user.is_admin()
    }

    pub fn require_admin(&self) -> Result<(), AppError> {
        if self.is_admin() {
            Ok(())
        } else {
            Err(AppError::forbidden())
        }
    }

    /// Owners and admins may modify a resource.
    pub fn require_owner_or_admin(&self, owner_id: i32) -> Result<(), AppError> {
        if self.user.id == owner_id || self.is_admin() {
            Ok(())
        } else {
            Err(AppError::forbidden())
        }
    }
}

impl FromRequest for AuthUser {
    type Error = AppError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _: &mut Payload) -> Self::Future {
        let token = bearer_token(req);
        let state = app_state(req);

        Box::pin(async move {
            let token = token.ok_or(AuthError::MissingToken)?;
            let state = state?;
            let user = state.auth_service.validate_token(&token).await?;
            Ok(AuthUser { user, token })
        })
    }
}

/// An admin caller; 403 for everyone else.
#[derive(Debug, Clone)]
pub struct AdminUser(pub AuthUser);

impl FromRequest for AdminUser {
    type Error = AppError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
        let auth = AuthUser::from_request(req, payload);
        Box::pin(async move {
            let auth = auth.await?;
            auth.require_admin()?;
            Ok(AdminUser(auth))
        })
    }
}

/// Caller identity when authentication is optional. A present but invalid
/// token is still rejected.
#[derive(Debug, Clone)]
pub struct MaybeUser(pub Option<AuthUser>);

impl FromRequest for MaybeUser {
    type Error = AppError;
    type Future = LocalBoxFuture<'static, Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, payload: &mut Payload) -> Self::Future {
        if bearer_token(req).is_none() {
            return Box::pin(async { Ok(MaybeUser(None)) });
        }
        let auth = AuthUser::from_request(req, payload);
        Box::pin(async move { Ok(MaybeUser(Some(auth.await?))) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::test::TestRequest;

    #[test]
    fn bearer_token_parsing() {
        let req = TestRequest::default()
            .insert_header((AUTHORIZATION, "Bearer abc.def.ghi"))
            .to_http_request();
        assert_eq!(bearer_token(&req).as_deref(), Some("abc.def.ghi"));

        let req = TestRequest::default()
            .insert_header((AUTHORIZATION, "Basic dXNlcjpwYXNz"))
            .to_http_request();
        assert!(bearer_token(&req).is_none());

        let req = TestRequest::default()
            .insert_header((AUTHORIZATION, "Bearer   "))
            .to_http_request();
        assert!(bearer_token(&req).is_none());
    }

    #[actix_web::test]
    async fn missing_token_is_unauthorized() {
        let (req, mut payload) = TestRequest::default().to_http_parts();
        let result = AuthUser::from_request(&req, &mut payload).await;
        assert!(matches!(
            result,
            Err(AppError::AuthError(AuthError::MissingToken))
        ));

        let anonymous = MaybeUser::from_request(&req, &mut payload).await.unwrap();
        assert!(anonymous.0.is_none());
    }
}
