//! Haversine distance and candidate ranking.

use serde::Serialize;
use std::cmp::Ordering;

use super::{DomainError, DomainResult, Hairdresser};

pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GeoPoint {
    pub latitude: f64,
    pub longitude: f64,
}

impl GeoPoint {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    pub fn validated(latitude: f64, longitude: f64) -> DomainResult<Self> {
        if !(-90.0..=90.0).contains(&latitude) {
            return Err(DomainError::Validation(
                "latitude: must be between -90 and 90".to_string(),
            ));
        }
        if !(-180.0..=180.0).contains(&longitude) {
            return Err(DomainError::Validation(
                "longitude: must be between -180 and 180".to_string(),
            ));
        }
        Ok(Self::new(latitude, longitude))
    }
}

/// Great-circle distance in meters.
pub fn haversine_meters(a: GeoPoint, b: GeoPoint) -> f64 {
    let lat1 = a.latitude.to_radians();
    let lat2 = b.latitude.to_radians();
    let d_lat = (b.latitude - a.latitude).to_radians();
    let d_lon = (b.longitude - a.longitude).to_radians();

    let h = (d_lat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (d_lon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_METERS * h.sqrt().asin()
}

#[derive(Debug, Clone, Serialize)]
pub struct Candidate {
    pub hairdresser: Hairdresser,
    pub distance_meters: f64,
}

fn within_radius(hairdressers: Vec<Hairdresser>, origin: GeoPoint, radius_meters: f64) -> Vec<Candidate> {
    hairdressers
        .into_iter()
        .filter_map(|hairdresser| {
            let location = hairdresser.location()?;
            let distance_meters = haversine_meters(origin, location);
            (distance_meters <= radius_meters).then_some(Candidate {
                hairdresser,
                distance_meters,
            })
        })
        .collect()
}

/// Nearest first, ties by id.
pub fn rank_by_distance(hairdressers: Vec<Hairdresser>, origin: GeoPoint, radius_meters: f64) -> Vec<Candidate> {
    let mut candidates = within_radius(hairdressers, origin, radius_meters);
    candidates.sort_by(|a, b| {
        a.distance_meters
            .partial_cmp(&b.distance_meters)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.hairdresser.id.cmp(&b.hairdresser.id))
    });
    candidates
}

/// Best rated first; distance only breaks rating ties.
pub fn rank_for_assignment(hairdressers: Vec<Hairdresser>, origin: GeoPoint, radius_meters: f64) -> Vec<Candidate> {
    let mut candidates = within_radius(hairdressers, origin, radius_meters);
    candidates.sort_by(|a, b| {
        b.hairdresser
            .average_rating
            .cmp(&a.hairdresser.average_rating)
            .then_with(|| {
                a.distance_meters
                    .partial_cmp(&b.distance_meters)
                    .unwrap_or(Ordering::Equal)
            })
            .then_with(|| a.hairdresser.id.cmp(&b.hairdresser.id))
    });
    candidates
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::hairdresser::tests::approved_hairdresser;
    use bigdecimal::BigDecimal;

    #[test]
    fn test_haversine_same_point_is_zero() {
        let p = GeoPoint::new(5.36, -4.01);
        assert_eq!(haversine_meters(p, p), 0.0);
    }

    #[test]
    fn test_haversine_one_degree_longitude_at_equator() {
        let d = haversine_meters(GeoPoint::new(0.0, 0.0), GeoPoint::new(0.0, 1.0));
        assert!((d - 111_320.0).abs() / 111_320.0 < 0.01, "got {}", d);
    }

    #[test]
    fn test_radius_excludes_far_candidates() {
        let origin = GeoPoint::new(5.361, -4.011);
        let near = approved_hairdresser(0, 5.36, -4.01);
        let far = approved_hairdresser(0, 5.50, -4.01);
        let ranked = rank_by_distance(vec![far, near.clone()], origin, 5_000.0);
        assert_eq!(ranked.len(), 1);
        assert_eq!(ranked[0].hairdresser.id, near.id);
    }

    #[test]
    fn test_plain_search_orders_by_distance() {
        let origin = GeoPoint::new(5.361, -4.011);
        let a = approved_hairdresser(0, 5.37, -4.011);
        let b = approved_hairdresser(0, 5.362, -4.011);
        let ranked = rank_by_distance(vec![a.clone(), b.clone()], origin, 10_000.0);
        assert_eq!(ranked[0].hairdresser.id, b.id);
        assert_eq!(ranked[1].hairdresser.id, a.id);
        assert!(ranked[0].distance_meters < ranked[1].distance_meters);
    }

    #[test]
    fn test_assignment_prefers_rating_over_proximity() {
        let origin = GeoPoint::new(5.361, -4.011);
        let mut close = approved_hairdresser(0, 5.362, -4.011);
        close.average_rating = BigDecimal::from(3);
        let mut far = approved_hairdresser(0, 5.38, -4.011);
        far.average_rating = "4.8".parse().unwrap();
        let mut far_same_rating = approved_hairdresser(0, 5.39, -4.011);
        far_same_rating.average_rating = "4.8".parse().unwrap();

        let ranked = rank_for_assignment(
            vec![close.clone(), far_same_rating.clone(), far.clone()],
            origin,
            10_000.0,
        );
        let ids: Vec<_> = ranked.iter().map(|c| c.hairdresser.id).collect();
        assert_eq!(ids, vec![far.id, far_same_rating.id, close.id]);
    }

    #[test]
    fn test_missing_coordinates_are_skipped() {
        let mut h = approved_hairdresser(0, 5.36, -4.01);
        h.latitude = None;
        assert!(rank_by_distance(vec![h], GeoPoint::new(5.36, -4.01), 1_000.0).is_empty());
    }

    #[test]
    fn test_validated_rejects_out_of_range() {
        assert!(GeoPoint::validated(91.0, 0.0).is_err());
        assert!(GeoPoint::validated(0.0, -181.0).is_err());
        assert!(GeoPoint::validated(5.36, -4.01).is_ok());
    }
}
