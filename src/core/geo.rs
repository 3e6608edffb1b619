//! Position samples and great-circle distance.

use serde::{Deserialize, Serialize};

use super::types::{TelemetryError, TelemetryResult};

/// Mean earth radius used by the haversine formula, in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// One reading from the geolocation source.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationSample {
    pub latitude: f64,
    pub longitude: f64,
    /// Meters per second.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed: Option<f64>,
    /// Meters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accuracy: Option<f64>,
    /// Unix epoch milliseconds as reported by the device.
    pub timestamp: u64,
}

impl LocationSample {
    pub fn new(latitude: f64, longitude: f64, timestamp: u64) -> Self {
        Self {
            latitude,
            longitude,
            speed: None,
            accuracy: None,
            timestamp,
        }
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = Some(speed);
        self
    }

    pub fn with_accuracy(mut self, accuracy: f64) -> Self {
        self.accuracy = Some(accuracy);
        self
    }

    /// Reject samples that must never be stored or transmitted.
    ///
    /// `(0, 0)` is what most geolocation stacks report before a fix, so it is treated as
    /// missing data rather than a point in the Gulf of Guinea.
    pub fn validate(&self) -> TelemetryResult<()> {
        let (lat, lon) = (self.latitude, self.longitude);
        if !lat.is_finite() || !lon.is_finite() {
            return Err(TelemetryError::InvalidSample(format!(
                "non-finite coordinates ({lat}, {lon})"
            )));
        }
        if lat == 0.0 && lon == 0.0 {
            return Err(TelemetryError::InvalidSample(
                "null island (0, 0)".to_string(),
            ));
        }
        if !(-90.0..=90.0).contains(&lat) {
            return Err(TelemetryError::InvalidSample(format!(
                "latitude {lat} out of range"
            )));
        }
        if !(-180.0..=180.0).contains(&lon) {
            return Err(TelemetryError::InvalidSample(format!(
                "longitude {lon} out of range"
            )));
        }
        for (name, value) in [("speed", self.speed), ("accuracy", self.accuracy)] {
            if let Some(v) = value
                && (!v.is_finite() || v < 0.0)
            {
                return Err(TelemetryError::InvalidSample(format!("{name} {v} invalid")));
            }
        }
        Ok(())
    }

    /// Non-zero reported speed.
    pub fn is_moving(&self) -> bool {
        self.speed.is_some_and(|s| s > 0.0)
    }

    pub fn distance_to(&self, other: &LocationSample) -> f64 {
        haversine_meters(self.latitude, self.longitude, other.latitude, other.longitude)
    }
}

/// Great-circle distance between two points given in decimal degrees.
pub fn haversine_meters(lat1: f64, lon1: f64, lat2: f64, lon2: f64) -> f64 {
    let phi1 = lat1.to_radians();
    let phi2 = lat2.to_radians();
    let d_phi = (lat2 - lat1).to_radians();
    let d_lambda = (lon2 - lon1).to_radians();

    let a = (d_phi / 2.0).sin().powi(2) + phi1.cos() * phi2.cos() * (d_lambda / 2.0).sin().powi(2);
    let c = 2.0 * a.sqrt().atan2((1.0 - a).sqrt());
    EARTH_RADIUS_METERS * c
}

/// Latitude delta (degrees) that corresponds to `meters` along a meridian.
pub fn meters_to_latitude_degrees(meters: f64) -> f64 {
    (meters / EARTH_RADIUS_METERS).to_degrees()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_null_island_and_out_of_range() {
        assert!(LocationSample::new(0.0, 0.0, 1).validate().is_err());
        assert!(LocationSample::new(91.0, 10.0, 1).validate().is_err());
        assert!(LocationSample::new(-90.5, 10.0, 1).validate().is_err());
        assert!(LocationSample::new(10.0, 180.5, 1).validate().is_err());
        assert!(LocationSample::new(f64::NAN, 10.0, 1).validate().is_err());
        assert!(
            LocationSample::new(10.0, 10.0, 1)
                .with_speed(-1.0)
                .validate()
                .is_err()
        );
    }

    #[test]
    fn accepts_boundaries_and_single_zero_axis() {
        assert!(LocationSample::new(90.0, 180.0, 1).validate().is_ok());
        assert!(LocationSample::new(-90.0, -180.0, 1).validate().is_ok());
        assert!(LocationSample::new(0.0, 32.5, 1).validate().is_ok());
        assert!(LocationSample::new(0.3, 0.0, 1).validate().is_ok());
    }

    #[test]
    fn haversine_matches_known_distances() {
        // One degree of latitude is ~111.19 km on a 6371 km sphere.
        let d = haversine_meters(0.0, 10.0, 1.0, 10.0);
        assert!((d - 111_194.9).abs() < 1.0, "got {d}");

        // Kampala -> Entebbe, roughly 35 km.
        let d = haversine_meters(0.3476, 32.5825, 0.0512, 32.4637);
        assert!((34_000.0..36_000.0).contains(&d), "got {d}");

        assert_eq!(haversine_meters(12.0, 34.0, 12.0, 34.0), 0.0);
    }

    #[test]
    fn meters_to_degrees_round_trips_through_haversine() {
        let delta = meters_to_latitude_degrees(1.0);
        let d = haversine_meters(45.0, 7.0, 45.0 + delta, 7.0);
        assert!((d - 1.0).abs() < 1e-6, "got {d}");
    }

    #[test]
    fn motion_requires_positive_speed() {
        let sample = LocationSample::new(1.0, 1.0, 0);
        assert!(!sample.is_moving());
        assert!(!sample.with_speed(0.0).is_moving());
        assert!(sample.with_speed(4.2).is_moving());
    }
}
