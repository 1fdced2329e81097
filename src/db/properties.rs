use crate::db::filters::{count_query, rows_query, PropertyFilter, DEFAULT_PAGE_SIZE};
use crate::db::models::{ListingStatus, ListingType, OwnershipType, Page, Property, PropertyType};
use crate::db::operations::{paginate, DbOperations};
use crate::error::AppError;
use crate::geo::{haversine_km, GeoPoint};
use chrono::{Datelike, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Deserialize)]
pub struct NewProperty {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub price: f64,
    pub property_type: PropertyType,
    pub listing_type: ListingType,
    pub status: Option<ListingStatus>,
    pub address: String,
    pub city: String,
    pub postal_code: Option<String>,
    pub location_id: Option<i32>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub area: f64,
    pub lot_area: Option<f64>,
    #[serde(default)]
    pub bedrooms: i32,
    #[serde(default)]
    pub bathrooms: i32,
    pub year_built: Option<i32>,
    pub ownership_type: Option<OwnershipType>,
    #[serde(default)]
    pub features: Vec<String>,
    #[serde(default)]
    pub images: Vec<String>,
    #[serde(default)]
    pub is_featured: bool,
}

/// Partial update; absent fields keep their stored value.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PropertyUpdate {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<f64>,
    pub property_type: Option<PropertyType>,
    pub listing_type: Option<ListingType>,
    pub status: Option<ListingStatus>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub location_id: Option<i32>,
    pub latitude: Option<f64>,
    pub longitude: Option<f64>,
    pub area: Option<f64>,
    pub lot_area: Option<f64>,
    pub bedrooms: Option<i32>,
    pub bathrooms: Option<i32>,
    pub year_built: Option<i32>,
    pub ownership_type: Option<OwnershipType>,
    pub features: Option<Vec<String>>,
    pub images: Option<Vec<String>>,
    pub is_featured: Option<bool>,
}

fn check_text(name: &str, value: &str, max: usize) -> Result<(), AppError> {
    let len = value.trim().chars().count();
    if len == 0 {
        return Err(AppError::validation(format!("{} is required", name)));
    }
    if len > max {
        return Err(AppError::validation(format!("{} must be at most {} characters", name, max)));
    }
    Ok(())
}

fn check_non_negative(name: &str, value: f64) -> Result<(), AppError> {
    if !value.is_finite() || value < 0.0 {
        return Err(AppError::validation(format!("{} must be a non-negative number", name)));
    }
    Ok(())
}

fn check_rooms(name: &str, value: i32) -> Result<(), AppError> {
    if !(0..=100).contains(&value) {
        return Err(AppError::validation(format!("{} must be between 0 and 100", name)));
    }
    Ok(())
}

fn check_year(year: i32) -> Result<(), AppError> {
    let max = Utc::now().year() + 5;
    if !(1600..=max).contains(&year) {
        return Err(AppError::validation(format!("year_built must be between 1600 and {}", max)));
    }
    Ok(())
}

fn check_coordinates(lat: Option<f64>, lng: Option<f64>) -> Result<(), AppError> {
    match (lat, lng) {
        (None, None) => Ok(()),
        (Some(lat), Some(lng)) if GeoPoint::new(lat, lng).is_valid() => Ok(()),
        (Some(_), Some(_)) => Err(AppError::validation("latitude/longitude out of range")),
        _ => Err(AppError::validation("latitude and longitude must be given together")),
    }
}

fn clean_list(values: &[String]) -> Vec<String> {
    let mut cleaned: Vec<String> = Vec::with_capacity(values.len());
    for value in values.iter().map(|v| v.trim()).filter(|v| !v.is_empty()) {
        if !cleaned.iter().any(|c| c == value) {
            cleaned.push(value.to_string());
        }
    }
    cleaned
}

impl NewProperty {
    pub fn validate(&mut self) -> Result<(), AppError> {
        check_text("title", &self.title, 200)?;
        check_text("address", &self.address, 300)?;
        check_text("city", &self.city, 100)?;
        check_non_negative("price", self.price)?;
        check_non_negative("area", self.area)?;
        if self.area == 0.0 {
            return Err(AppError::validation("area must be greater than zero"));
        }
        if let Some(lot_area) = self.lot_area {
            check_non_negative("lot_area", lot_area)?;
        }
        check_rooms("bedrooms", self.bedrooms)?;
        check_rooms("bathrooms", self.bathrooms)?;
        if let Some(year) = self.year_built {
            check_year(year)?;
        }
        check_coordinates(self.latitude, self.longitude)?;

        self.title = self.title.trim().to_string();
        self.city = self.city.trim().to_string();
        self.features = clean_list(&self.features);
        self.images = clean_list(&self.images);
        Ok(())
    }
}

impl PropertyUpdate {
    pub fn validate(&mut self) -> Result<(), AppError> {
        if let Some(title) = &self.title {
            check_text("title", title, 200)?;
        }
        if let Some(address) = &self.address {
            check_text("address", address, 300)?;
        }
        if let Some(city) = &self.city {
            check_text("city", city, 100)?;
        }
        if let Some(price) = self.price {
            check_non_negative("price", price)?;
        }
        if let Some(area) = self.area {
            check_non_negative("area", area)?;
            if area == 0.0 {
                return Err(AppError::validation("area must be greater than zero"));
            }
        }
        if let Some(bedrooms) = self.bedrooms {
            check_rooms("bedrooms", bedrooms)?;
        }
        if let Some(bathrooms) = self.bathrooms {
            check_rooms("bathrooms", bathrooms)?;
        }
        if let Some(year) = self.year_built {
            check_year(year)?;
        }
        check_coordinates(self.latitude, self.longitude)?;

        if let Some(features) = &self.features {
            self.features = Some(clean_list(features));
        }
        if let Some(images) = &self.images {
            self.images = Some(clean_list(images));
        }
        Ok(())
    }
}

/// A search hit; `distance_km` is set for radius searches.
#[derive(Debug, Clone, Serialize)]
pub struct PropertyHit {
    #[serde(flatten)]
    pub property: Property,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_km: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PropertySearchResult {
    pub properties: Vec<PropertyHit>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
}

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct CityCount {
    pub city: String,
    pub count: i64,
}

impl DbOperations {
    pub async fn create_property(&self, user_id: i32, new: &NewProperty) -> Result<Property, AppError> {
        let property = sqlx::query_as::<_, Property>(
            r#"
            INSERT INTO properties (
                title, description, price, property_type, listing_type, status, address, city,
                postal_code, location_id, latitude, longitude, area, lot_area, bedrooms, bathrooms,
                year_built, ownership_type, features, images, is_featured, user_id
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22)
            RETURNING *
            "#,
        )
        .bind(&new.title)
        .bind(&new.description)
        .bind(new.price)
        .bind(new.property_type.as_str())
        .bind(new.listing_type.as_str())
        .bind(new.status.unwrap_or(ListingStatus::Active).as_str())
        .bind(&new.address)
        .bind(&new.city)
        .bind(&new.postal_code)
        .bind(new.location_id)
        .bind(new.latitude)
        .bind(new.longitude)
        .bind(new.area)
        .bind(new.lot_area)
        .bind(new.bedrooms)
        .bind(new.bathrooms)
        .bind(new.year_built)
        .bind(new.ownership_type.map(|o| o.as_str()))
        .bind(&new.features)
        .bind(&new.images)
        .bind(new.is_featured)
        .bind(user_id)
        .fetch_one(self.pool())
        .await?;

        Ok(property)
    }

    pub async fn get_property(&self, id: i32) -> Result<Option<Property>, AppError> {
        let property = sqlx::query_as::<_, Property>("SELECT * FROM properties WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool())
            .await?;

        Ok(property)
    }

    /// Fetch a listing for its detail page, counting the view.
    pub async fn view_property(&self, id: i32) -> Result<Option<Property>, AppError> {
        let property = sqlx::query_as::<_, Property>(
            "UPDATE properties SET views = views + 1 WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .fetch_optional(self.pool())
        .await?;

        Ok(property)
    }

    pub async fn update_property(&self, id: i32, update: &PropertyUpdate) -> Result<Property, AppError> {
        let property = sqlx::query_as::<_, Property>(
            r#"
            UPDATE properties SET
                title = COALESCE($1, title),
                description = COALESCE($2, description),
                price = COALESCE($3, price),
                property_type = COALESCE($4, property_type),
                listing_type = COALESCE($5, listing_type),
                status = COALESCE($6, status),
                address = COALESCE($7, address),
                city = COALESCE($8, city),
                postal_code = COALESCE($9, postal_code),
                location_id = COALESCE($10, location_id),
                latitude = COALESCE($11, latitude),
                longitude = COALESCE($12, longitude),
                area = COALESCE($13, area),
                lot_area = COALESCE($14, lot_area),
                bedrooms = COALESCE($15, bedrooms),
                bathrooms = COALESCE($16, bathrooms),
                year_built = COALESCE($17, year_built),
                ownership_type = COALESCE($18, ownership_type),
                features = COALESCE($19, features),
                images = COALESCE($20, images),
                is_featured = COALESCE($21, is_featured),
                updated_at = $22
            WHERE id = $23
            RETURNING *
            "#,
        )
        .bind(update.title.as_deref().map(str::trim))
        .bind(&update.description)
        .bind(update.price)
        .bind(update.property_type.map(|t| t.as_str()))
        .bind(update.listing_type.map(|t| t.as_str()))
        .bind(update.status.map(|s| s.as_str()))
        .bind(&update.address)
        .bind(update.city.as_deref().map(str::trim))
        .bind(&update.postal_code)
        .bind(update.location_id)
        .bind(update.latitude)
        .bind(update.longitude)
        .bind(update.area)
        .bind(update.lot_area)
        .bind(update.bedrooms)
        .bind(update.bathrooms)
        .bind(update.year_built)
        .bind(update.ownership_type.map(|o| o.as_str()))
        .bind(&update.features)
        .bind(&update.images)
        .bind(update.is_featured)
        .bind(Utc::now())
        .bind(id)
        .fetch_one(self.pool())
        .await?;

        Ok(property)
    }

    pub async fn delete_property(&self, id: i32) -> Result<bool, AppError> {
        let result = sqlx::query("DELETE FROM properties WHERE id = $1")
            .bind(id)
            .execute(self.pool())
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Filtered, paginated search. Rows and total come from the same predicates.
    pub async fn search_properties(&self, filter: &PropertyFilter) -> Result<PropertySearchResult, AppError> {
        let geo = filter.validate()?;
        let (page, limit, offset) = paginate(filter.page, filter.limit, DEFAULT_PAGE_SIZE);

        let mut rows = rows_query(filter, geo, limit, offset);
        let mut count = count_query(filter, geo);

        let (properties, total) = futures::try_join!(
            rows.build_query_as::<Property>().fetch_all(self.pool()),
            count.build_query_scalar::<i64>().fetch_one(self.pool()),
        )?;

        let properties = properties
            .into_iter()
            .map(|property| {
                let distance_km = geo.and_then(|g| {
                    property
                        .coordinates()
                        .map(|(lat, lng)| haversine_km(g.center, GeoPoint::new(lat, lng)))
                });
                PropertyHit { property, distance_km }
            })
            .collect();

        let page = Page::new(properties, total, page, limit);
        Ok(PropertySearchResult {
            properties: page.items,
            total: page.total,
            page: page.page,
            limit: page.limit,
            total_pages: page.total_pages,
        })
    }

    pub async fn featured_properties(&self, limit: i64) -> Result<Vec<Property>, AppError> {
        let properties = sqlx::query_as::<_, Property>(
            r#"
            SELECT * FROM properties
            WHERE is_featured = TRUE AND status = 'active'
            ORDER BY created_at DESC
            LIMIT $1
            "#,
        )
        .bind(limit.clamp(1, 50))
        .fetch_all(self.pool())
        .await?;

        Ok(properties)
    }

    pub async fn property_cities(&self) -> Result<Vec<CityCount>, AppError> {
        let cities = sqlx::query_as::<_, CityCount>(
            r#"
            SELECT city, COUNT(*) AS count FROM properties
            WHERE status = 'active'
            GROUP BY city
            ORDER BY count DESC, city ASC
            "#,
        )
        .fetch_all(self.pool())
        .await?;

        Ok(cities)
    }

    /// Every active listing other than `exclude_id`, as recommender input.
    pub async fn recommendation_candidates(&self, exclude_id: i32) -> Result<Vec<Property>, AppError> {
        let properties = sqlx::query_as::<_, Property>(
            "SELECT * FROM properties WHERE status = 'active' AND id <> $1",
        )
        .bind(exclude_id)
        .fetch_all(self.pool())
        .await?;

        Ok(properties)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_property() -> NewProperty {
        NewProperty {
            title: "  Valoisa kaksio  ".into(),
            description: String::new(),
            price: 189_000.0,
            property_type: PropertyType::Apartment,
            listing_type: ListingType::Sale,
            status: None,
            address: "Isokatu 10".into(),
            city: "Oulu ".into(),
            postal_code: Some("90100".into()),
            location_id: None,
            latitude: Some(65.01),
            longitude: Some(25.47),
            area: 54.5,
            lot_area: None,
            bedrooms: 1,
            bathrooms: 1,
            year_built: Some(1968),
            ownership_type: Some(OwnershipType::Freehold),
            features: vec!["sauna".into(), " sauna ".into(), "".into(), "balcony".into()],
            images: vec![],
            is_featured: false,
        }
    }

    #[test]
    fn valid_property_is_normalised() {
        let mut property = new_property();
        property.validate().unwrap();
        assert_eq!(property.title, "Valoisa kaksio");
        assert_eq!(property.city, "Oulu");
        assert_eq!(property.features, vec!["sauna".to_string(), "balcony".to_string()]);
    }

    #[test]
    fn invalid_properties_are_rejected() {
        let mut p = new_property();
        p.title = "   ".into();
        assert!(p.validate().is_err());

        let mut p = new_property();
        p.price = -1.0;
        assert!(p.validate().is_err());

        let mut p = new_property();
        p.area = 0.0;
        assert!(p.validate().is_err());

        let mut p = new_property();
        p.longitude = None;
        assert!(p.validate().is_err());

        let mut p = new_property();
        p.year_built = Some(1200);
        assert!(p.validate().is_err());

        let mut p = new_property();
        p.bedrooms = 500;
        assert!(p.validate().is_err());
    }

    #[test]
    fn partial_update_validates_present_fields_only() {
        let mut update = PropertyUpdate {
            price: Some(150_000.0),
            ..Default::default()
        };
        assert!(update.validate().is_ok());

        let mut update = PropertyUpdate {
            area: Some(0.0),
            ..Default::default()
        };
        assert!(update.validate().is_err());

        let mut update = PropertyUpdate {
            latitude: Some(65.0),
            ..Default::default()
        };
        assert!(update.validate().is_err());
    }

    #[test]
    fn new_property_deserializes_with_defaults() {
        let p: NewProperty = serde_json::from_value(serde_json::json!({
            "title": "Omakotitalo",
            "price": 320000,
            "property_type": "house",
            "listing_type": "sale",
            "address": "Koivukuja 3",
            "city": "Kempele",
            "area": 142
        }))
        .unwrap();
        assert_eq!(p.property_type, PropertyType::House);
        assert_eq!(p.bedrooms, 0);
        assert!(p.features.is_empty());
        assert!(!p.is_featured);

        let bad = serde_json::from_value::<NewProperty>(serde_json::json!({
            "title": "x", "price": 1, "property_type": "castle", "listing_type": "sale",
            "address": "a", "city": "b", "area": 1
        }));
        assert!(bad.is_err());
    }
}
