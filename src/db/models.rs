use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password: String,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
    pub role: String,
    #[serde(skip_serializing)]
    pub firebase_uid: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn role(&self) -> Role {
        self.role.parse().unwrap_or(Role::User)
    }

    pub fn is_admin(&self) -> bool {
        self.role() == Role::Admin
    }
}

/// Fields needed to insert a user row.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub avatar_url: Option<String>,
    pub role: Role,
    pub firebase_uid: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Agent,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Agent => "agent",
            Role::Admin => "admin",
        }
    }

    /// Roles a visitor may pick for themselves at registration.
    pub fn is_self_assignable(&self) -> bool {
        matches!(self, Role::User | Role::Agent)
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "agent" => Ok(Role::Agent),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role '{}'", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct UserSession {
    pub id: Uuid,
    pub user_id: i32,
    pub token: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
}

impl UserSession {
    pub fn new(user_id: i32, token: String, expires_in_hours: i64) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            user_id,
            token,
            expires_at: now + chrono::Duration::hours(expires_in_hours),
            created_at: now,
            last_activity: now,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.expires_at
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Property {
    pub id: i32,
    pub title: String,
    pub description: String,
    pub price: f64,
    pub property_type: String,
    pub listing_type: String,
    pub status: String,
    pub address: String,
    pub city: String,
    pub postal_code: Option<String>,
    pub location_id: Option<i32>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub area: f64,
    pub lot_area: Option<f64>,
    pub bedrooms: i32,
    pub bathrooms: i32,
    pub year_built: Option<i32>,
    pub ownership_type: Option<String>,
    pub features: Vec<String>,
    pub images: Vec<String>,
    pub is_featured: bool,
    pub views: i64,
    pub user_id: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Property {
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        self.latitude.zip(self.longitude)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertyType {
    Apartment,
    House,
    Townhouse,
    Cottage,
    Land,
    Commercial,
}

impl PropertyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyType::Apartment => "apartment",
            PropertyType::House => "house",
            PropertyType::Townhouse => "townhouse",
            PropertyType::Cottage => "cottage",
            PropertyType::Land => "land",
            PropertyType::Commercial => "commercial",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingType {
    Sale,
    Rent,
}

impl ListingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingType::Sale => "sale",
            ListingType::Rent => "rent",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    Active,
    Pending,
    Sold,
    Rented,
    Inactive,
}

impl ListingStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ListingStatus::Active => "active",
            ListingStatus::Pending => "pending",
            ListingStatus::Sold => "sold",
            ListingStatus::Rented => "rented",
            ListingStatus::Inactive => "inactive",
        }
    }
}

/// Finnish housing tenure forms.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OwnershipType {
    Freehold,
    Leasehold,
    RightOfOccupancy,
    SharedOwnership,
}

impl OwnershipType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OwnershipType::Freehold => "freehold",
            OwnershipType::Leasehold => "leasehold",
            OwnershipType::RightOfOccupancy => "right_of_occupancy",
            OwnershipType::SharedOwnership => "shared_ownership",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Location {
    pub id: i32,
    pub name: String,
    pub city: String,
    pub region: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Favorite {
    pub id: i32,
    pub user_id: i32,
    pub property_id: i32,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Message {
    pub id: i32,
    pub user_id: i32,
    pub sender_user_id: Option<i32>,
    pub property_id: Option<i32>,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub subject: Option<String>,
    pub content: String,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

/// Inbox row: a message plus the title of the property it concerns.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct MessageWithProperty {
    #[sqlx(flatten)]
    #[serde(flatten)]
    pub message: Message,
    pub property_title: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Neighborhood {
    pub id: i32,
    pub name: String,
    pub slug: String,
    pub city: String,
    pub description: String,
    pub image_url: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub highlights: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Post {
    pub id: i32,
    pub title: String,
    pub slug: String,
    pub excerpt: Option<String>,
    pub content: String,
    pub cover_image: Option<String>,
    pub category: Option<String>,
    pub tags: Vec<String>,
    pub author_id: Option<i32>,
    pub published: bool,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct FooterContent {
    pub id: i32,
    pub section: String,
    pub title: Option<String>,
    pub content: serde_json::Value,
    pub position: i32,
    pub is_active: bool,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct PageContent {
    pub id: i32,
    pub page_key: String,
    pub section: String,
    pub content: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct StaticPage {
    pub id: i32,
    pub slug: String,
    pub title: String,
    pub content: String,
    pub meta_description: Option<String>,
    pub published: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Setting {
    pub key: String,
    pub value: serde_json::Value,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct LogEntry {
    pub id: i64,
    pub level: String,
    pub source: String,
    pub message: String,
    pub context: Option<serde_json::Value>,
    pub user_id: Option<i32>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    Info,
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CrimeData {
    pub id: i32,
    pub month: String,
    pub municipality_code: String,
    pub municipality_name: String,
    pub crime_group_code: String,
    pub crime_group_name: String,
    pub count: i32,
    pub updated_at: DateTime<Utc>,
}

/// One flattened statistic, before it is persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrimeRecord {
    pub month: String,
    pub municipality_code: String,
    pub municipality_name: String,
    pub crime_group_code: String,
    pub crime_group_name: String,
    pub count: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct CrimeGroupTotal {
    pub crime_group_code: String,
    pub crime_group_name: String,
    pub total: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Municipality {
    pub municipality_code: String,
    pub municipality_name: String,
}

/// A page of rows plus the total number of matching rows.
#[derive(Debug, Clone, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
}

impl<T> Page<T> {
    pub fn new(items: Vec<T>, total: i64, page: i64, limit: i64) -> Self {
        let total_pages = if limit > 0 { (total + limit - 1) / limit } else { 0 };
        Self {
            items,
            total,
            page,
            limit,
            total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn role_parsing_and_self_assignment() {
        assert_eq!("agent".parse::<Role>(), Ok(Role::Agent));
        assert!("superuser".parse::<Role>().is_err());
        assert!(Role::User.is_self_assignable());
        assert!(Role::Agent.is_self_assignable());
        assert!(!Role::Admin.is_self_assignable());
    }

    #[test]
    fn page_counts_partial_last_page() {
        let page = Page::new(vec![1, 2], 25, 3, 12);
        assert_eq!(page.total_pages, 3);
        let empty: Page<i32> = Page::new(vec![], 0, 1, 12);
        assert_eq!(empty.total_pages, 0);
    }

    #[test]
    fn session_expiry() {
        let session = UserSession::new(1, "token".into(), 1);
        assert!(!session.is_expired());
        let expired = UserSession::new(1, "token".into(), -1);
        assert!(expired.is_expired());
    }

    #[test]
    fn user_serialization_hides_secrets() {
        let now = Utc::now();
        let user = User {
            id: 7,
            username: "maija".into(),
            email: "maija@example.fi".into(),
            password: "$argon2id$secret".into(),
            full_name: None,
            phone: None,
            avatar_url: None,
            role: "agent".into(),
            firebase_uid: Some("uid-1".into()),
            created_at: now,
            updated_at: now,
        };
        let json = serde_json::to_value(&user).unwrap();
        assert!(json.get("password").is_none());
        assert!(json.get("firebase_uid").is_none());
        assert_eq!(json["role"], "agent");
        assert_eq!(user.role(), Role::Agent);
    }
}
