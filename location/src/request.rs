use std::fmt;

use serde::{Deserialize, Serialize};

/// Accuracy/power trade-off of a location request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    /// Most accurate fixes available, highest power use.
    HighAccuracy,
    /// Roughly block-level accuracy at lower power.
    BalancedPowerAccuracy,
}

impl Priority {
    /// Value of the matching `com.google.android.gms.location.Priority` constant.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::HighAccuracy => 100,
            Self::BalancedPowerAccuracy => 102,
        }
    }
}

/// Parameters of a continuous location subscription.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationRequest {
    /// Desired time between fixes, in milliseconds.
    pub interval_ms: u64,
    /// Fixes are never delivered more often than this, in milliseconds.
    pub min_update_interval_ms: u64,
    /// Minimum movement before a new fix is delivered, in meters.
    pub min_displacement_m: f32,
    /// Accuracy mode.
    pub priority: Priority,
}

impl LocationRequest {
    /// Low-frequency profile used by default.
    pub const PASSIVE: Self = Self {
        interval_ms: 60_000,
        min_update_interval_ms: 30_000,
        min_displacement_m: 100.0,
        priority: Priority::BalancedPowerAccuracy,
    };

    /// High-frequency profile used while live tracking.
    pub const LIVE: Self = Self {
        interval_ms: 5_000,
        min_update_interval_ms: 3_000,
        min_displacement_m: 20.0,
        priority: Priority::HighAccuracy,
    };

    /// Profile for the given live tracking flag.
    #[must_use]
    pub const fn for_tracking(live: bool) -> Self {
        if live { Self::LIVE } else { Self::PASSIVE }
    }

    /// Whether this is the live tracking profile.
    #[must_use]
    pub fn is_live(&self) -> bool {
        *self == Self::LIVE
    }
}

impl Default for LocationRequest {
    fn default() -> Self {
        Self::PASSIVE
    }
}

impl fmt::Display for LocationRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "every {}ms (min {}ms, {}m, {:?})",
            self.interval_ms, self.min_update_interval_ms, self.min_displacement_m, self.priority
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracking_flag_selects_profile() {
        let passive = LocationRequest::for_tracking(false);
        assert_eq!(passive.interval_ms, 60_000);
        assert_eq!(passive.min_update_interval_ms, 30_000);
        assert!((passive.min_displacement_m - 100.0).abs() < f32::EPSILON);
        assert_eq!(passive.priority, Priority::BalancedPowerAccuracy);

        let live = LocationRequest::for_tracking(true);
        assert_eq!(live.interval_ms, 5_000);
        assert_eq!(live.min_update_interval_ms, 3_000);
        assert!((live.min_displacement_m - 20.0).abs() < f32::EPSILON);
        assert_eq!(live.priority, Priority::HighAccuracy);
        assert!(live.is_live());
        assert!(!passive.is_live());
    }

    #[test]
    fn request_serializes_for_the_bridge() {
        let json = serde_json::to_value(LocationRequest::LIVE).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "intervalMs": 5000,
                "minUpdateIntervalMs": 3000,
                "minDisplacementM": 20.0,
                "priority": "HIGH_ACCURACY",
            })
        );
    }
}
