use crate::db::operations::DbOperations;
use crate::error::AppError;
use serde::Serialize;
use sqlx::FromRow;
use std::collections::BTreeMap;

#[derive(Debug, Clone, FromRow)]
struct GroupCount {
    key: String,
    count: i64,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct AdminStats {
    pub users: i64,
    pub users_by_role: BTreeMap<String, i64>,
    pub properties: i64,
    pub properties_by_type: BTreeMap<String, i64>,
    pub properties_by_listing_type: BTreeMap<String, i64>,
    pub messages: i64,
    pub unread_messages: i64,
    pub favorites: i64,
    pub crime_rows: i64,
}

fn into_map(rows: Vec<GroupCount>) -> (BTreeMap<String, i64>, i64) {
    let total = rows.iter().map(|r| r.count).sum();
    (rows.into_iter().map(|r| (r.key, r.count)).collect(), total)
}

impl DbOperations {
    pub async fn admin_stats(&self) -> Result<AdminStats, AppError> {
        let pool = self.pool();

        let roles = sqlx::query_as::<_, GroupCount>(
            "SELECT role AS key, COUNT(*) AS count FROM users GROUP BY role",
        )
        .fetch_all(pool);
        let types = sqlx::query_as::<_, GroupCount>(
            "SELECT property_type AS key, COUNT(*) AS count FROM properties GROUP BY property_type",
        )
        .fetch_all(pool);
        let listing_types = sqlx::query_as::<_, GroupCount>(
            "SELECT listing_type AS key, COUNT(*) AS count FROM properties GROUP BY listing_type",
        )
        .fetch_all(pool);
        let messages = sqlx::query_as::<_, (i64, i64)>(
            "SELECT COUNT(*), COUNT(*) FILTER (WHERE NOT is_read) FROM messages",
        )
        .fetch_one(pool);
        let favorites = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM favorites").fetch_one(pool);
        let crime_rows = sqlx::query_scalar::<_, i64>("SELECT COUNT(*) FROM crime_data").fetch_one(pool);

        let (roles, types, listing_types, (messages, unread_messages), favorites, crime_rows) =
            futures::try_join!(roles, types, listing_types, messages, favorites, crime_rows)?;

        let (users_by_role, users) = into_map(roles);
        let (properties_by_type, properties) = into_map(types);
        let (properties_by_listing_type, _) = into_map(listing_types);

        Ok(AdminStats {
            users,
            users_by_role,
            properties,
            properties_by_type,
            properties_by_listing_type,
            messages,
            unread_messages,
            favorites,
            crime_rows,
        })
    }
}
