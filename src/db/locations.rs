use crate::db::models::Location;
use crate::db::operations::DbOperations;
use crate::error::AppError;
use crate::geo::GeoPoint;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct LocationInput {
    pub name: String,
    pub city: String,
    pub region: Option<String>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
}

impl LocationInput {
    pub fn validate(&self) -> Result<(), AppError> {
        if self.name.trim().is_empty() || self.city.trim().is_empty() {
            return Err(AppError::validation("name and city are required"));
        }
        match (self.latitude, self.longitude) {
            (None, None) => Ok(()),
            (Some(lat), Some(lng)) if GeoPoint::new(lat, lng).is_valid() => Ok(()),
            _ => Err(AppError::validation("latitude and longitude must both be valid")),
        }
    }
}

impl DbOperations {
    pub async fn list_locations(&self, city: Option<&str>) -> Result<Vec<Location>, AppError> {
        let locations = sqlx::query_as::<_, Location>(
            r#"
            SELECT * FROM locations
            WHERE ($1::TEXT IS NULL OR LOWER(city) = LOWER($1))
            ORDER BY city, name
            "#,
        )
        .bind(city)
        .fetch_all(self.pool())
        .await?;

        Ok(locations)
    }

    pub async fn get_location(&self, id: i32) -> Result<Option<Location>, AppError> {
        let location = sqlx::query_as::<_, Location>("SELECT * FROM locations WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;

        Ok(location)
    }

    pub async fn create_location(&self, input: &LocationInput) -> Result<Location, AppError> {
        let location = sqlx::query_as::<_, Location>(
            r#"
            INSERT INTO locations (name, city, region, latitude, longitude)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(input.name.trim())
        .bind(input.city.trim())
        .bind(&input.region)
        .bind(input.latitude)
        .bind(input.longitude)
        .fetch_one(self.pool())
        .await?;

        Ok(location)
    }

    pub async fn update_location(&self, id: i32, input: &LocationInput) -> Result<Location, AppError> {
        let location = sqlx::query_as::<_, Location>(
            r#"
            UPDATE locations
            SET name = $1, city = $2, region = $3, latitude = $4, longitude = $5
            WHERE id = $6
            RETURNING *
            "#,
        )
        .bind(input.name.trim())
        .bind(input.city.trim())
        .bind(&input.region)
        .bind(input.latitude)
        .bind(input.longitude)
        .bind(id)
        .fetch_one(self.pool())
        .await?;

        Ok(location)
    }

    pub async fn delete_location(&self, id: i32) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM locations WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn location_validation() {
        let mut input = LocationInput {
            name: "Tuira".into(),
            city: "Oulu".into(),
            region: Some("Pohjois-Pohjanmaa".into()),
            latitude: Some(65.03),
            longitude: Some(25.46),
        };
        assert!(input.validate().is_ok());

        input.longitude = None;
        assert!(input.validate().is_err());

        input.latitude = None;
        input.name = " ".into();
        assert!(input.validate().is_err());
    }
}
