use crate::auth::firebase::FirebaseVerifier;
use crate::auth::password::{hash_password, random_password, validate_password, verify_password};
use crate::db::models::{NewUser, Role, User, UserSession};
use crate::db::operations::DbOperations;
use crate::error::{AppError, AuthError};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::{info, warn};
use uuid::Uuid;

pub const USERNAME_MIN: usize = 3;
pub const USERNAME_MAX: usize = 50;

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // User ID
    pub jti: String, // Session nonce, keeps tokens unique
    pub exp: i64,
    pub iat: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub role: Option<String>,
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<Role, AppError> {
        validate_username(&self.username)?;
        validate_email(&self.email)?;
        validate_password(&self.password)?;

        let role = match self.role.as_deref() {
            None | Some("") => Role::User,
            Some(raw) => raw
                .parse::<Role>()
                .ok()
                .filter(Role::is_self_assignable)
                .ok_or_else(|| AppError::validation("role must be 'user' or 'agent'"))?,
        };
        Ok(role)
    }
}

/// A signed-in user plus the bearer token for the new session.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: User,
    pub token: String,
}

pub fn validate_username(username: &str) -> Result<(), AppError> {
    let len = username.chars().count();
    if !(USERNAME_MIN..=USERNAME_MAX).contains(&len) {
        return Err(AppError::validation(format!(
            "username must be {}-{} characters",
            USERNAME_MIN, USERNAME_MAX
        )));
    }
    if !username
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
    {
        return Err(AppError::validation(
            "username may only contain letters, digits, '_', '.' and '-'",
        ));
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), AppError> {
    let email = email.trim();
    let valid = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && domain.contains('.')
                && !domain.starts_with('.')
                && !domain.ends_with('.')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if !valid || email.len() > 255 {
        return Err(AppError::validation("invalid email address"));
    }
    Ok(())
}

/// Username seed for an external account, from a display name or the
/// email local part.
pub fn username_base(display_name: Option<&str>, email: &str) -> String {
    let source = display_name
        .filter(|n| !n.trim().is_empty())
        .unwrap_or_else(|| {
            let local = email.split('@').next().unwrap_or(email);
            // Drop plus-addressing tags
            local.split('+').next().unwrap_or(local)
        });

    let mut base: String = source
        .trim()
        .chars()
        .flat_map(char::to_lowercase)
        .filter_map(|c| match c {
            'ä' | 'å' => Some('a'),
            'ö' => Some('o'),
            ' ' => Some('.'),
            c if c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-') => Some(c),
            _ => None,
        })
        .collect();
    base.truncate(USERNAME_MAX - 6);
    if base.chars().count() < USERNAME_MIN {
        base = format!("user{}", base);
    }
    base
}

/// First of `base`, `base1`, `base2`, ... not present in `taken`
/// (case-insensitive).
pub fn dedupe_username(base: &str, taken: &[String]) -> String {
    let taken: HashSet<String> = taken.iter().map(|t| t.to_lowercase()).collect();
    if !taken.contains(&base.to_lowercase()) {
        return base.to_string();
    }
    (1u32..)
        .map(|n| format!("{}{}", base, n))
        .find(|candidate| !taken.contains(&candidate.to_lowercase()))
        .unwrap_or_else(|| format!("{}{}", base, Uuid::new_v4().simple()))
}

pub struct AuthService {
    db: DbOperations,
    jwt_secret: String,
    token_expiry_hours: i64,
    firebase: FirebaseVerifier,
}

impl AuthService {
    pub fn new(
        db: DbOperations,
        jwt_secret: String,
        token_expiry_hours: i64,
        firebase: FirebaseVerifier,
    ) -> Self {
        Self {
            db,
            jwt_secret,
            token_expiry_hours,
            firebase,
        }
    }

    pub fn firebase_enabled(&self) -> bool {
        self.firebase.is_configured()
    }

    pub async fn register(&self, req: &RegisterRequest) -> Result<AuthResponse, AppError> {
        let role = req.validate()?;

        if self.db.get_user_by_username(&req.username).await?.is_some() {
            return Err(AppError::Conflict("username is already taken".into()));
        }
        if self.db.get_user_by_email(req.email.trim()).await?.is_some() {
            return Err(AppError::Conflict("email is already registered".into()));
        }

        let new_user = NewUser {
            username: req.username.clone(),
            email: req.email.trim().to_string(),
            password_hash: hash_password(req.password.clone()).await?,
            full_name: req.full_name.clone(),
            phone: req.phone.clone(),
            avatar_url: None,
            role,
            firebase_uid: None,
        };
        let user = self.db.create_user(&new_user).await?;
        info!("Registered user {} ({})", user.username, user.role);

        let token = self.start_session(user.id).await?;
        Ok(AuthResponse { user, token })
    }

    pub async fn authenticate(&self, username: &str, password: &str) -> Result<AuthResponse, AppError> {
        let user = match self.db.get_user_by_username(username.trim()).await? {
            Some(user) => user,
            None => {
                // Burn the same hashing time as a real check
                let _ = hash_password(password.to_string()).await;
                return Err(AuthError::InvalidCredentials.into());
            }
        };

        let matched = verify_password(password.to_string(), user.password.clone()).await?;
        if matched.needs_rehash() {
            let hash = hash_password(password.to_string()).await?;
            self.db.update_password(user.id, &hash).await?;
            info!("Upgraded legacy password hash for user {}", user.id);
        }

        let token = self.start_session(user.id).await?;
        Ok(AuthResponse { user, token })
    }

    /// Sign in with a verified Firebase ID token, linking or creating the
    /// local account. Returns whether a new account was created.
    pub async fn authenticate_firebase(&self, id_token: &str) -> Result<(AuthResponse, bool), AppError> {
        let claims = self.firebase.verify(id_token).await?;

        let (user, created) = match self.db.get_user_by_firebase_uid(&claims.sub).await? {
            Some(user) => (user, false),
            None => {
                let email = claims
                    .email
                    .as_deref()
                    .ok_or_else(|| AppError::validation("Firebase account has no email address"))?;

                match self.db.get_user_by_email(email).await? {
                    Some(existing) if claims.email_verified => {
                        info!("Linking Firebase account to user {}", existing.id);
                        (self.db.link_firebase_uid(existing.id, &claims.sub).await?, false)
                    }
                    Some(_) => {
                        warn!("Refusing to link unverified Firebase email to an existing account");
                        return Err(AppError::Conflict(
                            "email is registered to another account".into(),
                        ));
                    }
                    None => {
                        let base = username_base(claims.name.as_deref(), email);
                        let taken = self.db.usernames_with_prefix(&base).await?;
                        let new_user = NewUser {
                            username: dedupe_username(&base, &taken),
                            email: email.to_string(),
                            password_hash: hash_password(random_password()).await?,
                            full_name: claims.name.clone(),
                            phone: None,
                            avatar_url: claims.picture.clone(),
                            role: Role::User,
                            firebase_uid: Some(claims.sub.clone()),
                        };
                        let user = self.db.create_user(&new_user).await?;
                        info!("Created user {} from Firebase sign-in", user.username);
                        (user, true)
                    }
                }
            }
        };

        let token = self.start_session(user.id).await?;
        Ok((AuthResponse { user, token }, created))
    }

    /// Resolve a bearer token to its user. Requires a valid signature and a
    /// live session row.
    pub async fn validate_token(&self, token: &str) -> Result<User, AppError> {
        let claims = self.decode_token(token)?;

        let session = self
            .db
            .get_session_by_token(token)
            .await?
            .ok_or(AuthError::InvalidToken)?;
        if session.is_expired() {
            return Err(AuthError::TokenExpired.into());
        }

        let user_id: i32 = claims.sub.parse().map_err(|_| AuthError::InvalidToken)?;
        let user = self
            .db
            .get_user_by_id(user_id)
            .await?
            .ok_or(AuthError::InvalidToken)?;

        self.db.update_session_activity(token).await?;
        Ok(user)
    }

    pub async fn invalidate_token(&self, token: &str) -> Result<(), AppError> {
        self.db.delete_session(token).await
    }

    /// Change a password after checking the current one. Every existing
    /// session is revoked and a fresh token returned.
    pub async fn change_password(&self, user: &User, current: &str, new: &str) -> Result<String, AppError> {
        validate_password(new)?;
        verify_password(current.to_string(), user.password.clone()).await?;

        let hash = hash_password(new.to_string()).await?;
        self.db.update_password(user.id, &hash).await?;
        let revoked = self.db.delete_sessions_for_user(user.id).await?;
        info!("Password changed for user {}, revoked {} sessions", user.id, revoked);

        self.start_session(user.id).await
    }

    async fn start_session(&self, user_id: i32) -> Result<String, AppError> {
        let token = self.generate_token(user_id)?;
        let session = UserSession::new(user_id, token.clone(), self.token_expiry_hours);
        self.db.create_session(&session).await?;
        Ok(token)
    }

    pub fn generate_token(&self, user_id: i32) -> Result<String, AppError> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            jti: Uuid::new_v4().to_string(),
            exp: (now + Duration::hours(self.token_expiry_hours)).timestamp(),
            iat: now.timestamp(),
        };

        let token = encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(self.jwt_secret.as_bytes()),
        )?;

        Ok(token)
    }

    pub fn decode_token(&self, token: &str) -> Result<Claims, AppError> {
        let claims = decode::<Claims>(
            token,
            &DecodingKey::from_secret(self.jwt_secret.as_bytes()),
            &Validation::new(Algorithm::HS256),
        )?;

        Ok(claims.claims)
    }
}
