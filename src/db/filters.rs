//! Dynamic SQL assembly for property searches.
//!
//! Every predicate is pushed through [`QueryBuilder::push_bind`]; the row
//! query and the count query share [`push_conditions`] so `total` always
//! describes the same set of rows the page was cut from, radius filter
//! included.

use crate::db::models::{ListingStatus, ListingType, OwnershipType, PropertyType, Role};
use crate::db::users::escape_like;
use crate::error::AppError;
use crate::geo::{bounding_box, GeoPoint, EARTH_RADIUS_KM};
use serde::Deserialize;
use sqlx::{Postgres, QueryBuilder};

pub const DEFAULT_PAGE_SIZE: i64 = 12;
pub const MAX_RADIUS_KM: f64 = 500.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PropertySort {
    #[default]
    Newest,
    Oldest,
    PriceAsc,
    PriceDesc,
    AreaAsc,
    AreaDesc,
    /// Nearest first; only meaningful with a geolocation query.
    Distance,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct PropertyFilter {
    pub search: Option<String>,
    pub property_type: Option<PropertyType>,
    pub listing_type: Option<ListingType>,
    pub status: Option<ListingStatus>,
    pub city: Option<String>,
    pub location_id: Option<i32>,
    pub user_id: Option<i32>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub min_area: Option<f64>,
    pub max_area: Option<f64>,
    pub min_bedrooms: Option<i32>,
    pub min_bathrooms: Option<i32>,
    pub min_year_built: Option<i32>,
    /// Comma-separated amenities; all must be present.
    pub features: Option<String>,
    pub ownership_type: Option<OwnershipType>,
    pub posted_by: Option<Role>,
    pub featured: Option<bool>,
    pub lat: Option<f64>,
    pub lng: Option<f64>,
    /// Kilometres.
    pub radius: Option<f64>,
    pub sort: Option<PropertySort>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoQuery {
    pub center: GeoPoint,
    pub radius_km: f64,
}

fn check_range(name: &str, min: Option<f64>, max: Option<f64>) -> Result<(), AppError> {
    if min.map_or(false, |v| v < 0.0) || max.map_or(false, |v| v < 0.0) {
        return Err(AppError::validation(format!("{} must not be negative", name)));
    }
    if let (Some(min), Some(max)) = (min, max) {
        if min > max {
            return Err(AppError::validation(format!(
                "min_{name} must not exceed max_{name}"
            )));
        }
    }
    Ok(())
}

impl PropertyFilter {
    /// Validate ranges and resolve the geolocation triple.
    pub fn validate(&self) -> Result<Option<GeoQuery>, AppError> {
        check_range("price", self.min_price, self.max_price)?;
        check_range("area", self.min_area, self.max_area)?;

        let geo = match (self.lat, self.lng, self.radius) {
            (None, None, None) => None,
            (Some(lat), Some(lng), Some(radius)) => {
                let center = GeoPoint::new(lat, lng);
                if !center.is_valid() {
                    return Err(AppError::validation("lat/lng out of range"));
                }
                if !(radius > 0.0 && radius <= MAX_RADIUS_KM) {
                    return Err(AppError::validation(format!(
                        "radius must be between 0 and {} km",
                        MAX_RADIUS_KM
                    )));
                }
                Some(GeoQuery { center, radius_km: radius })
            }
            _ => {
                return Err(AppError::validation(
                    "lat, lng and radius must be given together",
                ))
            }
        };

        if self.sort == Some(PropertySort::Distance) && geo.is_none() {
            return Err(AppError::validation("sort=distance requires lat, lng and radius"));
        }

        Ok(geo)
    }

    pub fn feature_list(&self) -> Vec<String> {
        self.features
            .as_deref()
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|f| !f.is_empty())
            .map(str::to_string)
            .collect()
    }

    fn status_or_default(&self) -> ListingStatus {
        self.status.unwrap_or(ListingStatus::Active)
    }
}

/// Appends `<haversine distance in km from center>` referencing `p.latitude`/`p.longitude`.
fn push_distance_expr(builder: &mut QueryBuilder<'_, Postgres>, center: GeoPoint) {
    builder
        .push("(2 * ")
        .push(EARTH_RADIUS_KM)
        .push(" * ASIN(LEAST(1, SQRT(POWER(SIN(RADIANS(p.latitude - ")
        .push_bind(center.lat)
        .push(") / 2), 2) + COS(RADIANS(")
        .push_bind(center.lat)
        .push(")) * COS(RADIANS(p.latitude)) * POWER(SIN(RADIANS(p.longitude - ")
        .push_bind(center.lng)
        .push(") / 2), 2)))))");
}

fn push_from(builder: &mut QueryBuilder<'_, Postgres>, filter: &PropertyFilter) {
    builder.push(" FROM properties p");
    if filter.posted_by.is_some() {
        builder.push(" JOIN users u ON u.id = p.user_id");
    }
}

/// Push the WHERE clause. Always emits at least the status predicate.
pub fn push_conditions(
    builder: &mut QueryBuilder<'_, Postgres>,
    filter: &PropertyFilter,
    geo: Option<GeoQuery>,
) {
    builder
        .push(" WHERE p.status = ")
        .push_bind(filter.status_or_default().as_str());

    if let Some(search) = filter.search.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", escape_like(search));
        builder.push(" AND (");
        for (i, column) in ["p.title", "p.description", "p.address", "p.city"].iter().enumerate() {
            if i > 0 {
                builder.push(" OR ");
            }
            builder.push(*column).push(" ILIKE ").push_bind(pattern.clone());
        }
        builder.push(")");
    }
    if let Some(property_type) = filter.property_type {
        builder.push(" AND p.property_type = ").push_bind(property_type.as_str());
    }
    if let Some(listing_type) = filter.listing_type {
        builder.push(" AND p.listing_type = ").push_bind(listing_type.as_str());
    }
    if let Some(city) = filter.city.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
        builder.push(" AND LOWER(p.city) = LOWER(").push_bind(city.to_string()).push(")");
    }
    if let Some(location_id) = filter.location_id {
        builder.push(" AND p.location_id = ").push_bind(location_id);
    }
    if let Some(user_id) = filter.user_id {
        builder.push(" AND p.user_id = ").push_bind(user_id);
    }
    if let Some(min_price) = filter.min_price {
        builder.push(" AND p.price >= ").push_bind(min_price);
    }
    if let Some(max_price) = filter.max_price {
        builder.push(" AND p.price <= ").push_bind(max_price);
    }
    if let Some(min_area) = filter.min_area {
        builder.push(" AND p.area >= ").push_bind(min_area);
    }
    if let Some(max_area) = filter.max_area {
        builder.push(" AND p.area <= ").push_bind(max_area);
    }
    if let Some(min_bedrooms) = filter.min_bedrooms {
        builder.push(" AND p.bedrooms >= ").push_bind(min_bedrooms);
    }
    if let Some(min_bathrooms) = filter.min_bathrooms {
        builder.push(" AND p.bathrooms >= ").push_bind(min_bathrooms);
    }
    if let Some(min_year_built) = filter.min_year_built {
        builder.push(" AND p.year_built >= ").push_bind(min_year_built);
    }
    let features = filter.feature_list();
    if !features.is_empty() {
        builder.push(" AND p.features @> ").push_bind(features);
    }
    if let Some(ownership_type) = filter.ownership_type {
        builder.push(" AND p.ownership_type = ").push_bind(ownership_type.as_str());
    }
    if let Some(role) = filter.posted_by {
        builder.push(" AND u.role = ").push_bind(role.as_str());
    }
    if let Some(featured) = filter.featured {
        builder.push(" AND p.is_featured = ").push_bind(featured);
    }
    if let Some(geo) = geo {
        let bbox = bounding_box(geo.center, geo.radius_km);
        builder
            .push(" AND p.latitude IS NOT NULL AND p.longitude IS NOT NULL")
            .push(" AND p.latitude BETWEEN ")
            .push_bind(bbox.min_lat)
            .push(" AND ")
            .push_bind(bbox.max_lat)
            .push(" AND ");
        if bbox.crosses_antimeridian() {
            builder
                .push("(p.longitude >= ")
                .push_bind(bbox.min_lng)
                .push(" OR p.longitude <= ")
                .push_bind(bbox.max_lng)
                .push(")");
        } else {
            builder
                .push("p.longitude BETWEEN ")
                .push_bind(bbox.min_lng)
                .push(" AND ")
                .push_bind(bbox.max_lng);
        }
        builder.push(" AND ");
        push_distance_expr(builder, geo.center);
        builder.push(" <= ").push_bind(geo.radius_km);
    }
}

fn push_order(builder: &mut QueryBuilder<'_, Postgres>, sort: PropertySort, geo: Option<GeoQuery>) {
    builder.push(" ORDER BY ");
    match (sort, geo) {
        (PropertySort::Distance, Some(geo)) => {
            push_distance_expr(builder, geo.center);
            builder.push(" ASC, p.id ASC");
        }
        (PropertySort::Oldest, _) => {
            builder.push("p.created_at ASC, p.id ASC");
        }
        (PropertySort::PriceAsc, _) => {
            builder.push("p.price ASC, p.id ASC");
        }
        (PropertySort::PriceDesc, _) => {
            builder.push("p.price DESC, p.id DESC");
        }
        (PropertySort::AreaAsc, _) => {
            builder.push("p.area ASC, p.id ASC");
        }
        (PropertySort::AreaDesc, _) => {
            builder.push("p.area DESC, p.id DESC");
        }
        _ => {
            builder.push("p.is_featured DESC, p.created_at DESC, p.id DESC");
        }
    }
}

/// `SELECT p.* ... ORDER BY ... LIMIT ... OFFSET ...`
pub fn rows_query<'a>(
    filter: &PropertyFilter,
    geo: Option<GeoQuery>,
    limit: i64,
    offset: i64,
) -> QueryBuilder<'a, Postgres> {
    let mut builder = QueryBuilder::new("SELECT p.*");
    push_from(&mut builder, filter);
    push_conditions(&mut builder, filter, geo);
    push_order(&mut builder, filter.sort.unwrap_or_default(), geo);
    builder
        .push(" LIMIT ")
        .push_bind(limit)
        .push(" OFFSET ")
        .push_bind(offset);
    builder
}

/// `SELECT COUNT(*) ...` over exactly the same predicates as [`rows_query`].
pub fn count_query<'a>(filter: &PropertyFilter, geo: Option<GeoQuery>) -> QueryBuilder<'a, Postgres> {
    let mut builder = QueryBuilder::new("SELECT COUNT(*)");
    push_from(&mut builder, filter);
    push_conditions(&mut builder, filter, geo);
    builder
}

#[cfg(test)]
mod tests {
    use super::*;

    fn where_clause(sql: &str) -> &str {
        let start = sql.find(" WHERE ").expect("where clause");
        let end = sql.find(" ORDER BY ").unwrap_or(sql.len());
        &sql[start..end]
    }

    #[test]
    fn empty_filter_only_restricts_status() {
        let filter = PropertyFilter::default();
        let builder = count_query(&filter, None);
        assert_eq!(builder.sql(), "SELECT COUNT(*) FROM properties p WHERE p.status = $1");
    }

    #[test]
    fn rows_and_count_share_predicates() {
        let filter = PropertyFilter {
            search: Some("sauna".into()),
            property_type: Some(PropertyType::Apartment),
            min_price: Some(100_000.0),
            max_price: Some(250_000.0),
            features: Some("sauna, balcony,".into()),
            lat: Some(65.0121),
            lng: Some(25.4651),
            radius: Some(5.0),
            ..Default::default()
        };
        let geo = filter.validate().unwrap();
        let rows = rows_query(&filter, geo, 12, 24);
        let count = count_query(&filter, geo);

        assert_eq!(where_clause(rows.sql()), where_clause(count.sql()));
        assert!(rows.sql().contains("p.features @> "));
        assert!(rows.sql().contains("ASIN(LEAST(1, SQRT("));
        assert!(rows.sql().ends_with("LIMIT $18 OFFSET $19"), "{}", rows.sql());
    }

    #[test]
    fn radius_across_the_antimeridian_uses_either_side() {
        let filter = PropertyFilter {
            lat: Some(-17.8),
            lng: Some(179.9),
            radius: Some(50.0),
            ..Default::default()
        };
        let geo = filter.validate().unwrap();
        let sql = count_query(&filter, geo).sql().to_string();
        assert!(sql.contains("(p.longitude >= $4 OR p.longitude <= $5)"), "{}", sql);

        let local = PropertyFilter {
            lng: Some(25.4651),
            lat: Some(65.0121),
            ..filter
        };
        let sql = count_query(&local, local.validate().unwrap()).sql().to_string();
        assert!(sql.contains("p.longitude BETWEEN $4 AND $5"), "{}", sql);
    }

    #[test]
    fn search_covers_text_columns() {
        let filter = PropertyFilter {
            search: Some("  Tuira ".into()),
            ..Default::default()
        };
        let builder = count_query(&filter, None);
        assert!(builder.sql().contains(
            "(p.title ILIKE $2 OR p.description ILIKE $3 OR p.address ILIKE $4 OR p.city ILIKE $5)"
        ));
    }

    #[test]
    fn poster_role_joins_users() {
        let filter = PropertyFilter {
            posted_by: Some(Role::Agent),
            ..Default::default()
        };
        let sql = count_query(&filter, None).sql().to_string();
        assert!(sql.contains("JOIN users u ON u.id = p.user_id"));
        assert!(sql.contains("AND u.role = $2"));

        let plain = count_query(&PropertyFilter::default(), None).sql().to_string();
        assert!(!plain.contains("JOIN users"));
    }

    #[test]
    fn sort_orders() {
        let mut filter = PropertyFilter {
            sort: Some(PropertySort::PriceAsc),
            ..Default::default()
        };
        assert!(rows_query(&filter, None, 12, 0).sql().contains("ORDER BY p.price ASC"));

        filter.sort = None;
        assert!(rows_query(&filter, None, 12, 0)
            .sql()
            .contains("ORDER BY p.is_featured DESC, p.created_at DESC"));
    }

    #[test]
    fn geo_requires_all_three_values() {
        let filter = PropertyFilter {
            lat: Some(65.0),
            lng: Some(25.0),
            ..Default::default()
        };
        assert!(filter.validate().is_err());

        let filter = PropertyFilter {
            lat: Some(65.0),
            lng: Some(25.0),
            radius: Some(0.0),
            ..Default::default()
        };
        assert!(filter.validate().is_err());

        let filter = PropertyFilter {
            lat: Some(95.0),
            lng: Some(25.0),
            radius: Some(3.0),
            ..Default::default()
        };
        assert!(filter.validate().is_err());
    }

    #[test]
    fn distance_sort_requires_geo() {
        let filter = PropertyFilter {
            sort: Some(PropertySort::Distance),
            ..Default::default()
        };
        assert!(filter.validate().is_err());
    }

    #[test]
    fn inverted_ranges_are_rejected() {
        let filter = PropertyFilter {
            min_price: Some(300_000.0),
            max_price: Some(100_000.0),
            ..Default::default()
        };
        assert!(filter.validate().is_err());

        let filter = PropertyFilter {
            min_area: Some(-1.0),
            ..Default::default()
        };
        assert!(filter.validate().is_err());
    }

    #[test]
    fn feature_list_trims_and_skips_empty() {
        let filter = PropertyFilter {
            features: Some(" sauna ,,balcony ".into()),
            ..Default::default()
        };
        assert_eq!(filter.feature_list(), vec!["sauna".to_string(), "balcony".to_string()]);
        assert!(PropertyFilter::default().feature_list().is_empty());
    }

    #[test]
    fn filter_deserializes_from_query_string() {
        let filter = actix_web::web::Query::<PropertyFilter>::from_query(
            "property_type=townhouse&listing_type=rent&min_bedrooms=2&featured=true&sort=price_desc&page=2",
        )
        .unwrap()
        .into_inner();
        assert_eq!(filter.property_type, Some(PropertyType::Townhouse));
        assert_eq!(filter.listing_type, Some(ListingType::Rent));
        assert_eq!(filter.min_bedrooms, Some(2));
        assert_eq!(filter.featured, Some(true));
        assert_eq!(filter.sort, Some(PropertySort::PriceDesc));
        assert_eq!(filter.page, Some(2));
    }
}
