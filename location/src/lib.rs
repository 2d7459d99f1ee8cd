//! Continuous device location tracking.
//!
//! [`LocationMonitor`] keeps a single "latest fix" cell fed by the platform
//! location client while foreground location permission is granted. Two fixed
//! request profiles exist: passive (the default) and live tracking.
//!
//! ```ignore
//! use devicekit_location::LocationMonitor;
//!
//! let monitor = LocationMonitor::new(provider, controller.clone())?;
//! if monitor.request_permission(&controller).await?.is_granted() {
//!     monitor.start()?;
//! }
//! let mut location = monitor.current_location();
//! while location.changed().await.is_ok() {
//!     if let Some(fix) = *location.borrow() {
//!         println!("{}, {}", fix.latitude, fix.longitude);
//!     }
//! }
//! ```

#![warn(missing_docs)]

mod fix;
mod monitor;
mod provider;
mod request;
mod scope;

/// Platform-specific implementations.
pub mod sys;

pub use devicekit_permission::{PermissionKind, PermissionState};
pub use fix::{LocationFix, RawReading, normalize_bearing};
pub use monitor::LocationMonitor;
pub use provider::{LocationProvider, ReadingSink};
pub use request::{LocationRequest, Priority};

use devicekit_permission::PermissionError;

/// Errors that can occur while tracking location.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LocationError {
    /// Reading the permission status failed.
    #[error(transparent)]
    Permission(#[from] PermissionError),
    /// The monitor was created outside of a tokio runtime.
    #[error("no tokio runtime available for location updates")]
    NoRuntime,
    /// The platform location client failed.
    #[error("platform error: {message}")]
    Platform {
        /// Human readable description.
        message: String,
    },
    /// A payload for or from the platform could not be converted.
    #[error("serialization error: {message}")]
    Serialization {
        /// Human readable description.
        message: String,
    },
}

/// Result alias for location operations.
pub type LocationResult<T> = Result<T, LocationError>;
