//! # Devicekit
//!
//! Location tracking and runtime permission handling for an Android device
//! manager.
//!
//! ## Features
//!
//! - `permission`: permission dialogs, settings redirection and the
//!   foreground/background location permission flow.
//! - `location`: the location monitor and its request profiles. Implies
//!   `permission`.
//!
//! Both are enabled by the default `full` feature.
//!
//! ## Example
//!
//! ```ignore
//! use devicekit::location::LocationMonitor;
//! use devicekit::permission::PermissionController;
//!
//! async fn track(monitor: &LocationMonitor, controller: &PermissionController) {
//!     if monitor.request_permission(controller).await.is_ok_and(|s| s.is_granted()) {
//!         let _ = monitor.start();
//!     }
//! }
//! ```

#[cfg(feature = "location")]
pub use devicekit_location as location;

#[cfg(feature = "permission")]
pub use devicekit_permission as permission;
