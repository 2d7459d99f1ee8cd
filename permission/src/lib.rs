//! Runtime permission handling for Android hosts.
//!
//! This crate turns abstract [`PermissionKind`]s into Android permission
//! dialogs and settings-screen round trips, and implements the location
//! access flow that walks a user from foreground to background location.
//!
//! The operating system is reached through the [`PermissionPlatform`] trait.
//! On Android the [`sys::android`] module implements it on top of a
//! host-supplied bridge object; tests use in-memory fakes.
//!
//! ```ignore
//! use devicekit_permission::{PermissionController, PermissionKind, acquire_location_access};
//!
//! let controller = PermissionController::new(platform);
//! let state = acquire_location_access(&controller).await?;
//! if state.is_granted() {
//!     // start location updates
//! }
//! ```

#![warn(missing_docs)]

mod acquire;
mod controller;
mod kind;
mod pending;
mod platform;

/// Platform-specific implementations.
pub mod sys;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use acquire::{AcquisitionOutcome, acquire_location_access, acquire_location_access_traced};
pub use controller::{Completions, PermissionController, RetryPolicy};
pub use kind::{
    ACCESS_BACKGROUND_LOCATION, ACCESS_COARSE_LOCATION, ACCESS_FINE_LOCATION, ApiLevel,
    POST_NOTIFICATIONS, PermissionKind, os_permissions_for,
};
pub use pending::{Pending, PendingRequests, RequestId};
pub use platform::PermissionPlatform;

use serde::{Deserialize, Serialize};

/// Outcome of asking for a permission.
///
/// Computed from the current grant status every time; never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum PermissionState {
    /// The permission is granted.
    Granted,
    /// The permission is not granted.
    Denied {
        /// Whether the user can still be asked again.
        can_ask_again: bool,
    },
}

impl PermissionState {
    /// Returns `true` for [`PermissionState::Granted`].
    #[must_use]
    pub const fn is_granted(self) -> bool {
        matches!(self, Self::Granted)
    }
}

/// Errors reported by the permission platform.
#[derive(Debug, Clone, thiserror::Error)]
pub enum PermissionError {
    /// The platform bridge failed (JNI error, Java exception, missing host).
    #[error("platform error: {message}")]
    Platform {
        /// Human readable description.
        message: String,
    },
    /// A payload from the platform could not be decoded.
    #[error("serialization error: {message}")]
    Serialization {
        /// Human readable description.
        message: String,
    },
}

/// Result alias for permission operations.
pub type PermissionResult<T> = Result<T, PermissionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_uses_bridge_field_names() {
        let denied = PermissionState::Denied {
            can_ask_again: false,
        };
        assert_eq!(
            serde_json::to_string(&denied).unwrap(),
            r#"{"state":"denied","canAskAgain":false}"#
        );
        assert_eq!(
            serde_json::from_str::<PermissionState>(r#"{"state":"granted"}"#).unwrap(),
            PermissionState::Granted
        );
    }
}
