//! Great-circle helpers used by the radius filter and the recommender.

/// Mean Earth radius in kilometres.
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Kilometres per degree of latitude.
const KM_PER_DEGREE: f64 = 111.045;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_valid(&self) -> bool {
        (-90.0..=90.0).contains(&self.lat) && (-180.0..=180.0).contains(&self.lng)
    }
}

/// Haversine distance between two points in kilometres.
pub fn haversine_km(a: GeoPoint, b: GeoPoint) -> f64 {
    let d_lat = (b.lat - a.lat).to_radians();
    let d_lng = (b.lng - a.lng).to_radians();
    let h = (d_lat / 2.0).sin().powi(2)
        + a.lat.to_radians().cos() * b.lat.to_radians().cos() * (d_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().min(1.0).asin()
}

/// Latitude/longitude box. When it crosses the antimeridian `min_lng` is
/// greater than `max_lng` and the longitude range is the union
/// `[min_lng, 180] ∪ [-180, max_lng]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lng: f64,
    pub max_lng: f64,
}

impl BoundingBox {
    pub fn crosses_antimeridian(&self) -> bool {
        self.min_lng > self.max_lng
    }
}

fn wrap_lng(lng: f64) -> f64 {
    if lng < -180.0 {
        lng + 360.0
    } else if lng > 180.0 {
        lng - 360.0
    } else {
        lng
    }
}

/// Box that contains every point within `radius_km` of `center`.
///
/// Used as an index-friendly prefilter before the exact haversine check.
pub fn bounding_box(center: GeoPoint, radius_km: f64) -> BoundingBox {
    let d_lat = radius_km / KM_PER_DEGREE;
    let cos_lat = center.lat.to_radians().cos().abs();
    let d_lng = if cos_lat < 1e-6 {
        180.0
    } else {
        (radius_km / (KM_PER_DEGREE * cos_lat)).min(180.0)
    };
    let (min_lng, max_lng) = if d_lng >= 180.0 {
        (-180.0, 180.0)
    } else {
        (wrap_lng(center.lng - d_lng), wrap_lng(center.lng + d_lng))
    };

    BoundingBox {
        min_lat: (center.lat - d_lat).max(-90.0),
        max_lat: (center.lat + d_lat).min(90.0),
        min_lng,
        max_lng,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OULU: GeoPoint = GeoPoint { lat: 65.0121, lng: 25.4651 };
    const HELSINKI: GeoPoint = GeoPoint { lat: 60.1699, lng: 24.9384 };

    #[test]
    fn distance_to_self_is_zero() {
        assert!(haversine_km(OULU, OULU).abs() < 1e-9);
    }

    #[test]
    fn oulu_to_helsinki() {
        let d = haversine_km(OULU, HELSINKI);
        // ~540 km as the crow flies
        assert!((535.0..545.0).contains(&d), "got {d}");
        assert!((d - haversine_km(HELSINKI, OULU)).abs() < 1e-9);
    }

    #[test]
    fn bounding_box_contains_radius() {
        let bbox = bounding_box(OULU, 10.0);
        assert!(bbox.min_lat < OULU.lat && OULU.lat < bbox.max_lat);
        assert!(bbox.min_lng < OULU.lng && OULU.lng < bbox.max_lng);

        let north = GeoPoint::new(bbox.max_lat, OULU.lng);
        assert!((haversine_km(OULU, north) - 10.0).abs() < 0.1);
        let east = GeoPoint::new(OULU.lat, bbox.max_lng);
        assert!(haversine_km(OULU, east) >= 9.9);
    }

    #[test]
    fn bounding_box_near_pole_spans_all_longitudes() {
        let bbox = bounding_box(GeoPoint::new(90.0, 0.0), 5.0);
        assert_eq!(bbox.min_lng, -180.0);
        assert_eq!(bbox.max_lng, 180.0);
        assert_eq!(bbox.max_lat, 90.0);
    }

    #[test]
    fn bounding_box_wraps_at_antimeridian() {
        let fiji = GeoPoint::new(-17.8, 179.9);
        let bbox = bounding_box(fiji, 50.0);
        assert!(bbox.crosses_antimeridian());
        assert!(bbox.min_lng > 179.0 && bbox.min_lng < 179.9);
        assert!(bbox.max_lng > -180.0 && bbox.max_lng < -179.0);

        // A point just across the line is within the radius
        let across = GeoPoint::new(-17.8, -179.9);
        assert!(haversine_km(fiji, across) < 50.0);
        assert!(across.lng <= bbox.max_lng);

        assert!(!bounding_box(GeoPoint::new(65.0, 25.0), 50.0).crosses_antimeridian());
    }

    #[test]
    fn validity() {
        assert!(OULU.is_valid());
        assert!(!GeoPoint::new(91.0, 0.0).is_valid());
        assert!(!GeoPoint::new(0.0, -181.0).is_valid());
    }
}
