//! REST routes under `/api`.

pub mod admin;
pub mod content;
pub mod crime;
pub mod favorites;
pub mod locations;
pub mod logs;
pub mod messages;
pub mod open_data;
pub mod properties;
pub mod settings;
pub mod users;

use crate::auth;
use crate::error::AppError;
use actix_web::{error::JsonPayloadError, error::QueryPayloadError, web, HttpRequest};
use serde::Deserialize;

const JSON_LIMIT_BYTES: usize = 1 << 20;

#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Pagination {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

fn json_error(err: JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
    AppError::validation(format!("invalid JSON body: {}", err)).into()
}

fn query_error(err: QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
    AppError::validation(format!("invalid query string: {}", err)).into()
}

fn path_error(err: actix_web::error::PathError, _req: &HttpRequest) -> actix_web::Error {
    AppError::validation(format!("invalid path parameter: {}", err)).into()
}

/// Body and query extractor settings that turn malformed input into our
/// JSON error shape.
pub fn extractor_config(cfg: &mut web::ServiceConfig) {
    cfg.app_data(
        web::JsonConfig::default()
            .limit(JSON_LIMIT_BYTES)
            .error_handler(json_error),
    )
    .app_data(web::QueryConfig::default().error_handler(query_error))
    .app_data(web::PathConfig::default().error_handler(path_error));
}

/// Every route of the service. `/health` sits outside `/api`.
pub fn configure(cfg: &mut web::ServiceConfig) {
    extractor_config(cfg);
    cfg.route("/health", web::get().to(crate::health_check)).service(
        web::scope("/api")
            .configure(auth::handlers::configure)
            .configure(users::configure)
            .configure(properties::configure)
            .configure(locations::configure)
            .configure(favorites::configure)
            .configure(messages::configure)
            .configure(content::configure)
            .configure(settings::configure)
            .configure(logs::configure)
            .configure(crime::configure)
            .configure(open_data::configure)
            .configure(admin::configure),
    );
}
