//! Similar-listing scoring for the "recommended properties" panel.

use crate::db::models::Property;
use crate::geo::{haversine_km, GeoPoint};
use serde::Serialize;
use std::collections::HashSet;

pub const DEFAULT_RECOMMENDATIONS: usize = 4;
pub const MAX_RECOMMENDATIONS: usize = 20;

const FEATURE_POINTS: u32 = 2;
const FEATURE_CAP: u32 = 10;

#[derive(Debug, Clone, Serialize)]
pub struct Recommendation {
    #[serde(flatten)]
    pub property: Property,
    pub score: u32,
    pub distance_km: Option<f64>,
}

fn distance_points(km: f64) -> u32 {
    match km {
        d if d < 1.0 => 30,
        d if d < 3.0 => 20,
        d if d < 5.0 => 10,
        d if d < 10.0 => 5,
        _ => 0,
    }
}

/// Relative difference of `candidate` against `reference`, or `None` when the
/// reference is not positive.
fn relative_diff(reference: f64, candidate: f64) -> Option<f64> {
    (reference > 0.0).then(|| (candidate - reference).abs() / reference)
}

/// Similarity of `candidate` to `source`. Higher is more similar.
pub fn score(source: &Property, candidate: &Property) -> (u32, Option<f64>) {
    let mut points = 0;

    let distance = match (source.coordinates(), candidate.coordinates()) {
        (Some((lat_a, lng_a)), Some((lat_b, lng_b))) => {
            let km = haversine_km(GeoPoint::new(lat_a, lng_a), GeoPoint::new(lat_b, lng_b));
            points += distance_points(km);
            Some(km)
        }
        _ => {
            if source.city.eq_ignore_ascii_case(&candidate.city) {
                points += 15;
            }
            None
        }
    };

    if source.property_type == candidate.property_type {
        points += 20;
    }
    if source.listing_type == candidate.listing_type {
        points += 15;
    }

    match relative_diff(source.price, candidate.price) {
        Some(d) if d <= 0.10 => points += 15,
        Some(d) if d <= 0.25 => points += 8,
        _ => {}
    }
    match relative_diff(source.area, candidate.area) {
        Some(d) if d <= 0.15 => points += 10,
        Some(d) if d <= 0.30 => points += 5,
        _ => {}
    }

    match (source.bedrooms - candidate.bedrooms).abs() {
        0 => points += 10,
        1 => points += 5,
        _ => {}
    }
    if source.bathrooms == candidate.bathrooms {
        points += 5;
    }

    let source_features: HashSet<&str> = source.features.iter().map(String::as_str).collect();
    let shared = candidate
        .features
        .iter()
        .filter(|f| source_features.contains(f.as_str()))
        .count() as u32;
    points += (shared * FEATURE_POINTS).min(FEATURE_CAP);

    (points, distance)
}

/// Rank `candidates` against `source` and keep the best `limit`.
///
/// The source itself and zero-score candidates are dropped. Ties go to the
/// newer listing, then the lower id.
pub fn recommend(source: &Property, candidates: Vec<Property>, limit: usize) -> Vec<Recommendation> {
    let mut scored: Vec<Recommendation> = candidates
        .into_iter()
        .filter(|p| p.id != source.id)
        .filter_map(|property| {
            let (score, distance_km) = score(source, &property);
            (score > 0).then_some(Recommendation {
                property,
                score,
                distance_km,
            })
        })
        .collect();

    scored.sort_by(|a, b| {
        b.score
            .cmp(&a.score)
            .then_with(|| b.property.created_at.cmp(&a.property.created_at))
            .then_with(|| a.property.id.cmp(&b.property.id))
    });
    scored.truncate(limit);
    scored
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};

    fn property(id: i32) -> Property {
        let now = Utc::now();
        Property {
            id,
            title: format!("Listing {id}"),
            description: String::new(),
            price: 200_000.0,
            property_type: "apartment".into(),
            listing_type: "sale".into(),
            status: "active".into(),
            address: "Kirkkokatu 1".into(),
            city: "Oulu".into(),
            postal_code: None,
            location_id: None,
            latitude: Some(65.0121),
            longitude: Some(25.4651),
            area: 60.0,
            lot_area: None,
            bedrooms: 2,
            bathrooms: 1,
            year_built: None,
            ownership_type: None,
            features: vec!["sauna".into(), "balcony".into()],
            images: vec![],
            is_featured: false,
            views: 0,
            user_id: 1,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn identical_twin_scores_maximum() {
        let source = property(1);
        let twin = property(2);
        let (points, distance) = score(&source, &twin);
        // 30 distance + 20 type + 15 listing + 15 price + 10 area + 10 beds + 5 baths + 4 features
        assert_eq!(points, 109);
        assert_eq!(distance, Some(0.0));
    }

    #[test]
    fn price_and_area_bands() {
        let source = property(1);
        let mut candidate = property(2);
        candidate.price = 240_000.0; // +20 %
        candidate.area = 75.0; // +25 %
        candidate.features.clear();
        let (points, _) = score(&source, &candidate);
        assert_eq!(points, 30 + 20 + 15 + 8 + 5 + 10 + 5);
    }

    #[test]
    fn city_fallback_without_coordinates() {
        let source = property(1);
        let mut candidate = property(2);
        candidate.latitude = None;
        candidate.city = "OULU".into();
        let (points, distance) = score(&source, &candidate);
        assert_eq!(distance, None);
        assert_eq!(points, 15 + 20 + 15 + 15 + 10 + 10 + 5 + 4);
    }

    #[test]
    fn feature_points_are_capped() {
        let mut source = property(1);
        source.features = (0..10).map(|i| format!("f{i}")).collect();
        let mut candidate = property(2);
        candidate.features = source.features.clone();
        let (with_all, _) = score(&source, &candidate);
        candidate.features.truncate(5);
        let (with_five, _) = score(&source, &candidate);
        assert_eq!(with_all, with_five);
    }

    #[test]
    fn recommend_ranks_excludes_source_and_truncates() {
        let source = property(1);
        let mut far = property(3);
        far.latitude = Some(60.1699);
        far.longitude = Some(24.9384);
        let mut different = property(4);
        different.property_type = "house".into();
        different.listing_type = "rent".into();
        different.price = 1_500.0;
        different.area = 140.0;
        different.bedrooms = 5;
        different.bathrooms = 2;
        different.features.clear();
        different.latitude = Some(61.5);
        let close = property(2);

        let ranked = recommend(
            &source,
            vec![source.clone(), far, different, close],
            2,
        );
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].property.id, 2);
        assert_eq!(ranked[1].property.id, 3);
        assert!(ranked.iter().all(|r| r.property.id != 1));
    }

    #[test]
    fn zero_scores_are_dropped() {
        let source = property(1);
        let mut unrelated = property(2);
        unrelated.property_type = "land".into();
        unrelated.listing_type = "rent".into();
        unrelated.price = 5_000_000.0;
        unrelated.area = 10_000.0;
        unrelated.bedrooms = 0;
        unrelated.bathrooms = 0;
        unrelated.features.clear();
        unrelated.latitude = Some(60.0);
        assert!(recommend(&source, vec![unrelated], 4).is_empty());
    }

    #[test]
    fn ties_prefer_newer_listing() {
        let source = property(1);
        let mut older = property(2);
        older.created_at = Utc::now() - Duration::days(3);
        let newer = property(3);
        let ranked = recommend(&source, vec![older, newer], 4);
        assert_eq!(ranked[0].property.id, 3);
    }
}
