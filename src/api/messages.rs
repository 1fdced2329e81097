use crate::auth::{validate_email, AuthUser, MaybeUser};
use crate::db::messages::{InboxQuery, NewMessage};
use crate::error::AppError;
use crate::AppState;
use actix_web::{web, HttpResponse};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

const MAX_CONTENT_LEN: usize = 5000;

#[derive(Debug, Default, Deserialize)]
pub struct SendMessageRequest {
    pub recipient_id: Option<i32>,
    pub property_id: Option<i32>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub subject: Option<String>,
    pub content: String,
}

fn non_empty(value: Option<&str>) -> Option<String> {
    value.map(str::trim).filter(|v| !v.is_empty()).map(String::from)
}

impl SendMessageRequest {
    /// Contact details and body, with a signed-in sender's profile filling
    /// in whatever the form left out. Anonymous senders must give both a
    /// name and an email.
    fn sender_details(&self, sender: Option<&AuthUser>) -> Result<(String, String), AppError> {
        let content = self.content.trim();
        if content.is_empty() {
            return Err(AppError::validation("message content is required"));
        }
        if content.chars().count() > MAX_CONTENT_LEN {
            return Err(AppError::validation(format!(
                "message content must be at most {} characters",
                MAX_CONTENT_LEN
            )));
        }

        let name = non_empty(self.name.as_deref()).or_else(|| {
            sender.map(|s| s.user.full_name.clone().unwrap_or_else(|| s.user.username.clone()))
        });
        let email = non_empty(self.email.as_deref()).or_else(|| sender.map(|s| s.user.email.clone()));

        match (name, email) {
            (Some(name), Some(email)) => {
                validate_email(&email)?;
                Ok((name, email))
            }
            _ => Err(AppError::validation("name and email are required")),
        }
    }
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/messages")
            .route("", web::post().to(send_message))
            .route("", web::get().to(inbox))
            .route("/sent", web::get().to(sent_messages))
            .route("/unread-count", web::get().to(unread_count))
            .route("/{id}/read", web::patch().to(mark_read))
            .route("/{id}", web::delete().to(delete_message)),
    );
}

pub async fn send_message(
    caller: MaybeUser,
    body: web::Json<SendMessageRequest>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let request = body.into_inner();
    let sender = caller.0.as_ref();
    let (name, email) = request.sender_details(sender)?;

    let property = match request.property_id {
        Some(id) => Some(
            state
                .db
                .get_property(id)
                .await?
                .ok_or_else(|| AppError::not_found("Property"))?,
        ),
        None => None,
    };

    let recipient_id = match (request.recipient_id, &property) {
        (Some(id), _) => {
            state
                .db
                .get_user_by_id(id)
                .await?
                .ok_or_else(|| AppError::not_found("Recipient"))?
                .id
        }
        (None, Some(property)) => property.user_id,
        (None, None) => {
            return Err(AppError::validation("either recipient_id or property_id is required"))
        }
    };

    if sender.map(|s| s.id()) == Some(recipient_id) {
        return Err(AppError::validation("cannot send a message to yourself"));
    }

    let message = state
        .db
        .create_message(&NewMessage {
            recipient_id,
            sender_user_id: sender.map(|s| s.id()),
            property_id: request.property_id,
            name,
            email,
            phone: non_empty(request.phone.as_deref()),
            subject: non_empty(request.subject.as_deref()),
            content: request.content.trim().to_string(),
        })
        .await?;

    info!("Message {} delivered to user {}", message.id, recipient_id);
    Ok(HttpResponse::Created().json(message))
}

pub async fn inbox(
    auth: AuthUser,
    query: web::Query<InboxQuery>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    Ok(HttpResponse::Ok().json(state.db.inbox(auth.id(), &query).await?))
}

pub async fn sent_messages(
    auth: AuthUser,
    query: web::Query<super::Pagination>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let page = state
        .db
        .sent_messages(auth.id(), query.page, query.limit)
        .await?;
    Ok(HttpResponse::Ok().json(page))
}

pub async fn unread_count(
    auth: AuthUser,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let count = state.db.unread_count(auth.id()).await?;
    Ok(HttpResponse::Ok().json(json!({ "count": count })))
}

pub async fn mark_read(
    auth: AuthUser,
    path: web::Path<i32>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    let message = state
        .db
        .mark_message_read(path.into_inner(), auth.id())
        .await?
        .ok_or_else(|| AppError::not_found("Message"))?;
    Ok(HttpResponse::Ok().json(message))
}

pub async fn delete_message(
    auth: AuthUser,
    path: web::Path<i32>,
    state: web::Data<AppState>,
) -> Result<HttpResponse, AppError> {
    if !state.db.delete_message(path.into_inner(), auth.id()).await? {
        return Err(AppError::not_found("Message"));
    }
    Ok(HttpResponse::NoContent().finish())
}
