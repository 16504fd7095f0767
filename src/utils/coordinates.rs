use crate::error::{PipelineError, Result};
use crate::utils::constants::{
    COORDINATE_SCALE, PANAMA_MAX_LAT, PANAMA_MAX_LON, PANAMA_MIN_LAT, PANAMA_MIN_LON,
};

/// Convert degrees to the fixed-point join representation (degrees * 10^7)
///
/// # Examples
/// ```
/// use solar_pipeline::utils::coordinates::to_fixed;
///
/// assert_eq!(to_fixed(-79.5), Some(-795_000_000));
/// assert_eq!(to_fixed(8.983_333_333), Some(89_833_333));
/// assert_eq!(to_fixed(f64::NAN), None);
/// ```
pub fn to_fixed(degrees: f64) -> Option<i64> {
    if !degrees.is_finite() {
        return None;
    }
    let scaled = (degrees * COORDINATE_SCALE).round_ties_even();
    if scaled.abs() > i64::MAX as f64 {
        return None;
    }
    Some(scaled as i64)
}

/// Convert a fixed-point coordinate back to degrees
pub fn from_fixed(fixed: i64) -> f64 {
    fixed as f64 / COORDINATE_SCALE
}

/// Round a coordinate to 7 decimal places, halves to even
pub fn round_coordinate(degrees: f64) -> Option<f64> {
    to_fixed(degrees).map(from_fixed)
}

/// Parse a coordinate cell that may carry surrounding whitespace
pub fn parse_coordinate(coord_str: &str) -> Result<f64> {
    let trimmed = coord_str.trim();
    trimmed.parse::<f64>().map_err(|_| {
        PipelineError::InvalidFormat(format!("Invalid coordinate value: '{}'", coord_str))
    })
}

/// Validate Panama coordinate bounds
pub fn validate_panama_coordinates(longitude: f64, latitude: f64) -> Result<()> {
    if !(PANAMA_MIN_LAT..=PANAMA_MAX_LAT).contains(&latitude) {
        return Err(PipelineError::InvalidFormat(format!(
            "Latitude {} is outside Panama bounds [{}, {}]",
            latitude, PANAMA_MIN_LAT, PANAMA_MAX_LAT
        )));
    }

    if !(PANAMA_MIN_LON..=PANAMA_MAX_LON).contains(&longitude) {
        return Err(PipelineError::InvalidFormat(format!(
            "Longitude {} is outside Panama bounds [{}, {}]",
            longitude, PANAMA_MIN_LON, PANAMA_MAX_LON
        )));
    }

    Ok(())
}

/// Calculate the distance between two points in metres using the Haversine formula
pub fn haversine_distance_m(lon1: f64, lat1: f64, lon2: f64, lat2: f64) -> f64 {
    const EARTH_RADIUS_M: f64 = 6_371_000.0;

    let lat1_rad = lat1.to_radians();
    let lat2_rad = lat2.to_radians();
    let delta_lat = (lat2 - lat1).to_radians();
    let delta_lon = (lon2 - lon1).to_radians();

    let a = (delta_lat / 2.0).sin().powi(2)
        + lat1_rad.cos() * lat2_rad.cos() * (delta_lon / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().asin();

    EARTH_RADIUS_M * c
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_coordinate() {
        assert_eq!(round_coordinate(-79.123_456_789), Some(-79.123_456_8));
        assert_eq!(round_coordinate(8.98), Some(8.98));
        assert_eq!(round_coordinate(f64::INFINITY), None);
    }

    #[test]
    fn test_halves_round_to_even() {
        assert_eq!(to_fixed(8.98333325), Some(89_833_332));
        assert_eq!(to_fixed(79.50000005), Some(795_000_000));
        assert_eq!(to_fixed(-79.50000005), Some(-795_000_000));
        assert_eq!(to_fixed(1.5e-7), Some(2));
        assert_eq!(to_fixed(2.5e-7), Some(2));
        assert_eq!(to_fixed(-1.5e-7), Some(-2));
    }

    #[test]
    fn test_fixed_round_trip_is_exact_for_rounded_values() {
        let fixed = to_fixed(-79.5).unwrap();
        assert_eq!(from_fixed(fixed), -79.5);
        assert_eq!(to_fixed(from_fixed(fixed)), Some(fixed));
    }

    #[test]
    fn test_parse_coordinate() {
        assert!((parse_coordinate(" -79.5 ").unwrap() + 79.5).abs() < 1e-12);
        assert!(parse_coordinate("west").is_err());
    }

    #[test]
    fn test_panama_coordinate_validation() {
        assert!(validate_panama_coordinates(-79.5, 8.98).is_ok()); // Panama City
        assert!(validate_panama_coordinates(-82.43, 8.43).is_ok()); // David
        assert!(validate_panama_coordinates(-79.5, 6.5).is_err()); // Too far south
        assert!(validate_panama_coordinates(-75.0, 8.0).is_err()); // Colombia
    }

    #[test]
    fn test_haversine_distance() {
        // Panama City to Colon
        let distance = haversine_distance_m(-79.5199, 8.9824, -79.9006, 9.3590);
        assert!((distance - 58_500.0).abs() < 3_000.0);
    }
}
