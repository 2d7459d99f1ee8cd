//! Permission kinds and their mapping onto Android permission identifiers.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::PermissionResult;

/// `android.permission.ACCESS_FINE_LOCATION`.
pub const ACCESS_FINE_LOCATION: &str = "android.permission.ACCESS_FINE_LOCATION";
/// `android.permission.ACCESS_COARSE_LOCATION`.
pub const ACCESS_COARSE_LOCATION: &str = "android.permission.ACCESS_COARSE_LOCATION";
/// `android.permission.ACCESS_BACKGROUND_LOCATION`, runtime-granted from API 29.
pub const ACCESS_BACKGROUND_LOCATION: &str = "android.permission.ACCESS_BACKGROUND_LOCATION";
/// `android.permission.POST_NOTIFICATIONS`, runtime-granted from API 33.
pub const POST_NOTIFICATIONS: &str = "android.permission.POST_NOTIFICATIONS";

const FOREGROUND_LOCATION: &[&str] = &[ACCESS_FINE_LOCATION, ACCESS_COARSE_LOCATION];
const BACKGROUND_LOCATION: &[&str] = &[ACCESS_BACKGROUND_LOCATION];
const NOTIFICATIONS: &[&str] = &[POST_NOTIFICATIONS];

/// Android SDK version (`Build.VERSION.SDK_INT`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ApiLevel(pub u32);

impl ApiLevel {
    /// Android 10 (Q): background location becomes a separate runtime permission.
    pub const BACKGROUND_LOCATION: Self = Self(29);
    /// Android 13 (Tiramisu): notifications become a runtime permission.
    pub const POST_NOTIFICATIONS: Self = Self(33);

    /// Convert a reported `SDK_INT`. Returns `None` for values no Android
    /// release ever reported.
    #[must_use]
    pub fn from_sdk_int(sdk_int: i32) -> Option<Self> {
        u32::try_from(sdk_int).ok().filter(|&level| level > 0).map(Self)
    }

    /// Whether background location has to be requested on its own.
    #[must_use]
    pub const fn requires_background_request(self) -> bool {
        self.0 >= Self::BACKGROUND_LOCATION.0
    }

    /// Whether posting notifications needs a runtime grant.
    #[must_use]
    pub const fn requires_notification_request(self) -> bool {
        self.0 >= Self::POST_NOTIFICATIONS.0
    }
}

impl fmt::Display for ApiLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "API {}", self.0)
    }
}

/// Permissions this crate knows how to request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PermissionKind {
    /// Location while the app is visible. Fine or coarse both count.
    ForegroundLocation,
    /// Location while the app is in the background.
    BackgroundLocation,
    /// Posting notifications.
    Notifications,
}

impl PermissionKind {
    /// Every kind, in declaration order.
    pub const ALL: [Self; 3] = [
        Self::ForegroundLocation,
        Self::BackgroundLocation,
        Self::Notifications,
    ];

    /// Runtime permission identifiers to put in a dialog for this kind.
    ///
    /// Empty when the platform version has no runtime permission for it; in
    /// that case the grant is implied (see [`PermissionKind::evaluate`]).
    #[must_use]
    pub const fn os_permissions(self, api: ApiLevel) -> &'static [&'static str] {
        match self {
            Self::ForegroundLocation => FOREGROUND_LOCATION,
            Self::BackgroundLocation if api.requires_background_request() => BACKGROUND_LOCATION,
            Self::Notifications if api.requires_notification_request() => NOTIFICATIONS,
            Self::BackgroundLocation | Self::Notifications => &[],
        }
    }

    /// Decide whether this kind is granted, given a lookup for individual
    /// identifiers.
    ///
    /// Foreground location is granted when any of its identifiers is. Below
    /// API 29 background location follows foreground location, and below
    /// API 33 notifications are always granted.
    ///
    /// # Errors
    /// Propagates the first error returned by `lookup`.
    pub fn evaluate<F>(self, api: ApiLevel, lookup: &mut F) -> PermissionResult<bool>
    where
        F: FnMut(&'static str) -> PermissionResult<bool>,
    {
        match self {
            Self::BackgroundLocation if !api.requires_background_request() => {
                Self::ForegroundLocation.evaluate(api, lookup)
            }
            Self::Notifications if !api.requires_notification_request() => Ok(true),
            _ => {
                for permission in self.os_permissions(api) {
                    if lookup(permission)? {
                        return Ok(true);
                    }
                }
                Ok(false)
            }
        }
    }

    /// Kebab-case name used in logs and serialized payloads.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::ForegroundLocation => "foreground-location",
            Self::BackgroundLocation => "background-location",
            Self::Notifications => "notifications",
        }
    }
}

impl fmt::Display for PermissionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Collect the identifiers for a set of kinds, without duplicates, in request order.
#[must_use]
pub fn os_permissions_for(kinds: &[PermissionKind], api: ApiLevel) -> Vec<&'static str> {
    let mut identifiers: Vec<&'static str> = Vec::new();
    for permission in kinds.iter().flat_map(|kind| kind.os_permissions(api)) {
        if !identifiers.contains(permission) {
            identifiers.push(permission);
        }
    }
    identifiers
}
