use serde::{Deserialize, Serialize};

/// A reading exactly as the fused location provider reports it.
///
/// Optional measurements come with a validity flag; the value is meaningless
/// when the flag is unset.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RawReading {
    /// Latitude in degrees.
    pub latitude: f64,
    /// Longitude in degrees.
    pub longitude: f64,
    /// Horizontal accuracy radius in meters.
    pub accuracy: f64,
    /// Whether `accuracy` is set.
    pub has_accuracy: bool,
    /// Ground speed in meters per second.
    pub speed: f64,
    /// Whether `speed` is set.
    pub has_speed: bool,
    /// Bearing in degrees, not necessarily normalized.
    pub bearing: f64,
    /// Whether `bearing` is set.
    pub has_bearing: bool,
    /// Fix time as Unix epoch milliseconds.
    pub time: u64,
}

/// A resolved location fix.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationFix {
    /// Latitude in degrees (-90 to 90).
    pub latitude: f64,
    /// Longitude in degrees (-180 to 180).
    pub longitude: f64,
    /// Horizontal accuracy in meters, if reported.
    pub horizontal_accuracy: Option<f64>,
    /// Speed in meters per second, if reported.
    pub speed: Option<f64>,
    /// Bearing in degrees within `[0, 360)`, if reported.
    pub bearing: Option<f64>,
    /// Timestamp as Unix epoch milliseconds.
    pub timestamp: u64,
}

impl RawReading {
    /// Resolve into a [`LocationFix`].
    ///
    /// Returns `None` when the coordinates are not finite. Optional fields
    /// are kept only when flagged valid and finite.
    #[must_use]
    pub fn to_fix(&self) -> Option<LocationFix> {
        if !self.latitude.is_finite() || !self.longitude.is_finite() {
            return None;
        }

        Some(LocationFix {
            latitude: self.latitude,
            longitude: self.longitude,
            horizontal_accuracy: valid(self.has_accuracy, self.accuracy),
            speed: valid(self.has_speed, self.speed),
            bearing: valid(self.has_bearing, self.bearing).map(normalize_bearing),
            timestamp: self.time,
        })
    }
}

fn valid(flag: bool, value: f64) -> Option<f64> {
    (flag && value.is_finite()).then_some(value)
}

/// Wrap a bearing into `[0, 360)`.
#[must_use]
pub fn normalize_bearing(degrees: f64) -> f64 {
    let wrapped = degrees.rem_euclid(360.0);
    // rem_euclid rounds tiny negatives up to exactly 360.
    if wrapped >= 360.0 { 0.0 } else { wrapped }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading() -> RawReading {
        RawReading {
            latitude: 52.37,
            longitude: 4.89,
            time: 1_700_000_000_000,
            ..RawReading::default()
        }
    }

    #[test]
    fn bearing_wraps_into_range() {
        assert!((normalize_bearing(-10.0) - 350.0).abs() < 1e-9);
        assert!((normalize_bearing(370.0) - 10.0).abs() < 1e-9);
        assert!((normalize_bearing(720.0)).abs() < 1e-9);
        assert!((normalize_bearing(-1e-20)).abs() < 1e-9);
        for degrees in [0.0, 45.5, 180.0, 359.9] {
            assert!((normalize_bearing(degrees) - degrees).abs() < 1e-9);
        }
    }

    #[test]
    fn unflagged_fields_are_absent() {
        let fix = RawReading {
            accuracy: 12.0,
            speed: 3.0,
            bearing: 90.0,
            ..reading()
        }
        .to_fix()
        .unwrap();

        assert_eq!(fix.horizontal_accuracy, None);
        assert_eq!(fix.speed, None);
        assert_eq!(fix.bearing, None);
    }

    #[test]
    fn flagged_fields_are_kept_and_bearing_normalized() {
        let fix = RawReading {
            accuracy: 12.0,
            has_accuracy: true,
            speed: 3.0,
            has_speed: true,
            bearing: -10.0,
            has_bearing: true,
            ..reading()
        }
        .to_fix()
        .unwrap();

        assert_eq!(fix.horizontal_accuracy, Some(12.0));
        assert_eq!(fix.speed, Some(3.0));
        assert_eq!(fix.bearing, Some(350.0));
        assert_eq!(fix.timestamp, 1_700_000_000_000);
    }

    #[test]
    fn non_finite_coordinates_do_not_resolve() {
        let nan = RawReading {
            latitude: f64::NAN,
            ..reading()
        };
        let inf = RawReading {
            longitude: f64::INFINITY,
            ..reading()
        };
        assert_eq!(nan.to_fix(), None);
        assert_eq!(inf.to_fix(), None);
    }

    #[test]
    fn reading_parses_from_bridge_json() {
        let json = r#"{"latitude":1.5,"longitude":2.5,"bearing":370.0,"hasBearing":true,"time":42}"#;
        let fix = serde_json::from_str::<RawReading>(json)
            .unwrap()
            .to_fix()
            .unwrap();
        assert_eq!(fix.bearing, Some(10.0));
        assert_eq!(fix.horizontal_accuracy, None);
        assert_eq!(fix.timestamp, 42);
    }
}
