//! Authentication: local accounts, Firebase sign-in, bearer sessions and
//! login throttling.

pub mod extractor;
pub mod firebase;
pub mod handlers;
pub mod password;
mod rate_limit;
mod service;

pub use extractor::{AdminUser, AuthUser, MaybeUser};
pub use firebase::FirebaseVerifier;
pub use rate_limit::{RateLimitConfig, RateLimiter};
pub use service::{
    dedupe_username, username_base, validate_email, validate_username, AuthResponse, AuthService,
    Claims, RegisterRequest,
};
