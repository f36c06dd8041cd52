/// Earth's radius in kilometers
const EARTH_RADIUS_KM: f64 = 6371.0;

/// Calculate the Haversine distance between two points in kilometers
///
/// # Arguments
/// * `lat1` - Latitude of first point in degrees
/// * `lon1` - Longitude of first point in degrees
/// * `lat2` - Latitude of second point in degrees
/// * `lon2` - Longitude of second point in degrees
///
/// # Returns
/// Distance in kilometers
#[inline]
pub fn haversine_distance(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());

    EARTH_RADIUS_KM * c
}

/// Straight-line distance between two (lat, lng) pairs in degree space
///
/// Only meaningful as a relative closeness signal, not as a physical distance.
#[inline]
pub fn euclidean_distance(a: (f64, f64), b: (f64, f64)) -> f64 {
    (a.0 - b.0).hypot(a.1 - b.1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_haversine_distance() {
        // Distance from London to Paris (approximately 344 km)
        let london_lat = 51.5074;
        let london_lon = -0.1278;
        let paris_lat = 48.8566;
        let paris_lon = 2.3522;

        let distance = haversine_distance(london_lat, london_lon, paris_lat, paris_lon);
        assert!((distance - 344.0).abs() < 10.0, "Distance should be ~344km, got {}", distance);
    }

    #[test]
    fn test_haversine_symmetric() {
        let there = haversine_distance(33.5731, -7.5898, 34.0209, -6.8416);
        let back = haversine_distance(34.0209, -6.8416, 33.5731, -7.5898);
        assert!((there - back).abs() < 1e-9);
    }

    #[test]
    fn test_one_degree_of_latitude() {
        // 2 * pi * 6371 / 360
        let distance = haversine_distance(0.0, 0.0, 1.0, 0.0);
        assert!((distance - 111.195).abs() < 0.01, "got {}", distance);
    }

    #[test]
    fn test_euclidean_distance() {
        assert_eq!(euclidean_distance((0.0, 0.0), (3.0, 4.0)), 5.0);
        assert_eq!(euclidean_distance((40.0, -75.0), (40.0, -75.0)), 0.0);
    }
}
