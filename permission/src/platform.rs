use std::fmt::Debug;

use crate::{ApiLevel, PermissionResult, RequestId};

/// Operations the host platform must provide to the permission controller.
///
/// Dialogs and settings navigation are fire-and-forget here: the platform
/// reports the outcome later through the [`Completions`](crate::Completions)
/// handle of the controller, quoting the [`RequestId`] it was given.
pub trait PermissionPlatform: Debug + Send + Sync {
    /// Platform SDK version. Fixed for the lifetime of the platform.
    fn api_level(&self) -> ApiLevel;

    /// Whether a UI surface that can host a permission dialog is attached.
    fn is_host_attached(&self) -> bool;

    /// Current grant status of a single OS permission identifier.
    ///
    /// # Errors
    /// Returns an error if the platform cannot be queried.
    fn is_granted(&self, permission: &str) -> PermissionResult<bool>;

    /// Whether the OS recommends explaining the permission before asking again.
    ///
    /// # Errors
    /// Returns an error if the platform cannot be queried.
    fn should_show_rationale(&self, permission: &str) -> PermissionResult<bool>;

    /// Show one system dialog covering all `permissions`.
    ///
    /// # Errors
    /// Returns an error if the dialog could not be launched.
    fn launch_permissions(&self, request: RequestId, permissions: &[&str]) -> PermissionResult<()>;

    /// Open the application's system settings screen.
    ///
    /// # Errors
    /// Returns an error if the settings screen could not be opened.
    fn open_app_settings(&self, request: RequestId) -> PermissionResult<()>;

    /// The caller stopped waiting for `request`; drop any platform-side state for it.
    fn cancel_request(&self, request: RequestId) {
        let _ = request;
    }
}
