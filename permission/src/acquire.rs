//! Foreground-then-background location permission flow.

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::{PermissionController, PermissionKind, PermissionResult, PermissionState};

/// Terminal state reached by [`acquire_location_access_traced`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AcquisitionOutcome {
    /// Foreground location was refused; background was never asked for.
    ForegroundDenied,
    /// The platform has no separate background permission; foreground suffices.
    ForegroundSufficient,
    /// Background location was already granted, nothing was shown.
    BackgroundAlreadyGranted,
    /// Background location was granted from the dialog.
    BackgroundGrantedViaDialog,
    /// Background location was granted on the settings screen.
    BackgroundGrantedViaSettings,
    /// Background location is still refused after the settings screen.
    BackgroundStillDenied,
}

impl AcquisitionOutcome {
    /// Permission state reported to callers for this outcome.
    #[must_use]
    pub const fn state(self) -> PermissionState {
        match self {
            Self::ForegroundDenied | Self::BackgroundStillDenied => PermissionState::Denied {
                can_ask_again: true,
            },
            Self::ForegroundSufficient
            | Self::BackgroundAlreadyGranted
            | Self::BackgroundGrantedViaDialog
            | Self::BackgroundGrantedViaSettings => PermissionState::Granted,
        }
    }
}

/// Obtain location access, including background access where the platform
/// treats it as a separate permission.
///
/// # Errors
/// Returns an error if a dialog or the settings screen cannot be launched.
pub async fn acquire_location_access(
    controller: &PermissionController,
) -> PermissionResult<PermissionState> {
    Ok(acquire_location_access_traced(controller).await?.state())
}

/// Like [`acquire_location_access`], but reports which terminal state was reached.
///
/// 1. Foreground location (fine or coarse) through
///    [`PermissionController::request_with_settings_fallback`].
/// 2. Below API 29 that is enough.
/// 3. An existing background grant is accepted as is.
/// 4. Otherwise one background dialog, then
/// 5. the settings screen and a final check.
///
/// # Errors
/// Returns an error if a dialog or the settings screen cannot be launched.
pub async fn acquire_location_access_traced(
    controller: &PermissionController,
) -> PermissionResult<AcquisitionOutcome> {
    debug!("requesting foreground location");
    let foreground = controller
        .request_with_settings_fallback(&[PermissionKind::ForegroundLocation])
        .await?;
    if !foreground {
        info!("foreground location denied");
        return Ok(AcquisitionOutcome::ForegroundDenied);
    }

    let api = controller.api_level();
    if !api.requires_background_request() {
        debug!("{api} has no separate background location permission");
        return Ok(AcquisitionOutcome::ForegroundSufficient);
    }

    if controller.check_permission_granted(PermissionKind::BackgroundLocation)? {
        debug!("background location already granted");
        return Ok(AcquisitionOutcome::BackgroundAlreadyGranted);
    }

    debug!("requesting background location");
    if controller
        .launch_permission(PermissionKind::BackgroundLocation)
        .await?
    {
        return Ok(AcquisitionOutcome::BackgroundGrantedViaDialog);
    }

    info!("background location denied from dialog, opening app settings");
    controller.open_app_settings().await?;

    if controller.check_permission_granted(PermissionKind::BackgroundLocation)? {
        Ok(AcquisitionOutcome::BackgroundGrantedViaSettings)
    } else {
        info!("background location still denied after settings");
        Ok(AcquisitionOutcome::BackgroundStillDenied)
    }
}
