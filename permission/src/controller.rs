use std::collections::HashMap;
use std::sync::Arc;

use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::pending::{Pending, PendingRequests};
use crate::{
    ApiLevel, PermissionKind, PermissionPlatform, PermissionResult, RequestId, os_permissions_for,
};

/// Raw dialog answer: OS permission identifier to granted flag.
type DialogResult = HashMap<String, bool>;

/// How hard [`PermissionController::request_with_settings_fallback`] tries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RetryPolicy {
    /// Maximum number of dialogs shown before giving up on the dialog route.
    pub dialog_attempts: u8,
    /// Send the user to the settings screen once dialogs are exhausted.
    pub settings_fallback: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            dialog_attempts: 2,
            settings_fallback: true,
        }
    }
}

/// Entry points the platform uses to answer outstanding requests.
///
/// Cheap to clone; hand one to the platform bridge so that it can deliver
/// results without holding on to the controller itself.
#[derive(Debug, Clone, Default)]
pub struct Completions {
    dialogs: Arc<PendingRequests<DialogResult>>,
    settings: Arc<PendingRequests<()>>,
}

impl Completions {
    /// Deliver the answer to a permission dialog.
    ///
    /// Returns `false` when the request is unknown or its caller stopped waiting.
    pub fn complete_permission_request(&self, id: RequestId, results: DialogResult) -> bool {
        let delivered = self.dialogs.complete(id, results);
        if !delivered {
            debug!("ignoring permission result for stale request {id}");
        }
        delivered
    }

    /// The user came back from the settings screen opened for `id`.
    pub fn complete_settings_return(&self, id: RequestId) -> bool {
        let delivered = self.settings.complete(id, ());
        if !delivered {
            debug!("ignoring settings return for stale request {id}");
        }
        delivered
    }

    /// The dialog for `id` went away without an answer.
    pub fn dismiss_permission_request(&self, id: RequestId) -> bool {
        self.dialogs.dismiss(id)
    }

    /// Number of dialogs and settings round trips still awaiting an answer.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.dialogs.len() + self.settings.len()
    }
}

/// Requests permissions and opens the settings screen through a [`PermissionPlatform`].
#[derive(Debug, Clone)]
pub struct PermissionController {
    platform: Arc<dyn PermissionPlatform>,
    completions: Completions,
    policy: RetryPolicy,
}

impl PermissionController {
    /// Create a controller with the default [`RetryPolicy`].
    pub fn new(platform: Arc<dyn PermissionPlatform>) -> Self {
        Self::with_policy(platform, RetryPolicy::default())
    }

    /// Create a controller with an explicit retry policy.
    pub fn with_policy(platform: Arc<dyn PermissionPlatform>, policy: RetryPolicy) -> Self {
        Self {
            platform,
            completions: Completions::default(),
            policy,
        }
    }

    /// Completion handle for the platform bridge.
    #[must_use]
    pub fn completions(&self) -> Completions {
        self.completions.clone()
    }

    /// The retry policy in use.
    #[must_use]
    pub const fn policy(&self) -> RetryPolicy {
        self.policy
    }

    /// Platform SDK version.
    #[must_use]
    pub fn api_level(&self) -> ApiLevel {
        self.platform.api_level()
    }

    /// See [`Completions::complete_permission_request`].
    pub fn complete_permission_request(&self, id: RequestId, results: DialogResult) -> bool {
        self.completions.complete_permission_request(id, results)
    }

    /// See [`Completions::complete_settings_return`].
    pub fn complete_settings_return(&self, id: RequestId) -> bool {
        self.completions.complete_settings_return(id)
    }

    /// Current grant status of one kind, without prompting.
    ///
    /// # Errors
    /// Returns an error if the platform cannot be queried.
    pub fn check_permission_granted(&self, kind: PermissionKind) -> PermissionResult<bool> {
        let api = self.platform.api_level();
        kind.evaluate(api, &mut |permission| self.platform.is_granted(permission))
    }

    /// Current grant status of each kind, without prompting.
    ///
    /// # Errors
    /// Returns an error if the platform cannot be queried.
    pub fn check_permissions_granted(
        &self,
        kinds: &[PermissionKind],
    ) -> PermissionResult<HashMap<PermissionKind, bool>> {
        kinds
            .iter()
            .map(|&kind| Ok((kind, self.check_permission_granted(kind)?)))
            .collect()
    }

    /// Whether the OS suggests explaining `kind` before asking again.
    ///
    /// Always `false` for background location, which has no rationale signal of its own.
    ///
    /// # Errors
    /// Returns an error if the platform cannot be queried.
    pub fn should_show_rationale(&self, kind: PermissionKind) -> PermissionResult<bool> {
        if kind == PermissionKind::BackgroundLocation {
            return Ok(false);
        }

        for permission in kind.os_permissions(self.platform.api_level()) {
            if self.platform.should_show_rationale(permission)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Ask for several kinds in a single system dialog.
    ///
    /// Without an attached host surface no dialog is shown and the current
    /// status is returned instead. A dialog that is dismissed without an
    /// answer also resolves to the current status. Dropping the returned
    /// future deregisters the request.
    ///
    /// # Errors
    /// Returns an error if the dialog cannot be launched or the platform
    /// cannot be queried.
    pub async fn launch_permissions(
        &self,
        kinds: &[PermissionKind],
    ) -> PermissionResult<HashMap<PermissionKind, bool>> {
        if !self.platform.is_host_attached() {
            debug!("no host attached, reporting current status for {kinds:?}");
            return self.check_permissions_granted(kinds);
        }

        let api = self.platform.api_level();
        let permissions = os_permissions_for(kinds, api);
        if permissions.is_empty() {
            return self.check_permissions_granted(kinds);
        }

        let pending = self.completions.dialogs.register();
        debug!("requesting {permissions:?} as {}", pending.id());
        self.platform.launch_permissions(pending.id(), &permissions)?;
        let pending = self.cancel_on_drop(pending);

        let Some(results) = pending.await else {
            debug!("permission dialog dismissed, reporting current status");
            return self.check_permissions_granted(kinds);
        };

        kinds
            .iter()
            .map(|&kind| {
                let granted = kind.evaluate(api, &mut |permission| {
                    results
                        .get(permission)
                        .copied()
                        .map_or_else(|| self.platform.is_granted(permission), Ok)
                })?;
                Ok((kind, granted))
            })
            .collect()
    }

    /// Single-kind form of [`PermissionController::launch_permissions`].
    ///
    /// # Errors
    /// See [`PermissionController::launch_permissions`].
    pub async fn launch_permission(&self, kind: PermissionKind) -> PermissionResult<bool> {
        let results = self.launch_permissions(&[kind]).await?;
        Ok(results.get(&kind).copied().unwrap_or(false))
    }

    /// Open the application's settings screen and wait for the user to come back.
    ///
    /// Resolves at once when no host surface is attached, since nothing could
    /// show the screen or report the return.
    ///
    /// # Errors
    /// Returns an error if the settings screen cannot be opened.
    pub async fn open_app_settings(&self) -> PermissionResult<()> {
        if !self.platform.is_host_attached() {
            debug!("no host attached, not opening app settings");
            return Ok(());
        }

        let pending = self.completions.settings.register();
        debug!("opening app settings as {}", pending.id());
        self.platform.open_app_settings(pending.id())?;
        let pending = self.cancel_on_drop(pending);

        if pending.await.is_none() {
            debug!("settings round trip ended without a return signal");
        }
        Ok(())
    }

    /// Ask for `kinds` until granted, re-prompting while the OS still allows
    /// it and falling back to the settings screen afterwards.
    ///
    /// Returns whether every kind ended up granted.
    ///
    /// # Errors
    /// Returns an error if a dialog or the settings screen cannot be launched.
    pub async fn request_with_settings_fallback(
        &self,
        kinds: &[PermissionKind],
    ) -> PermissionResult<bool> {
        let attempts = self.policy.dialog_attempts.max(1);

        for attempt in 1..=attempts {
            let results = self.launch_permissions(kinds).await?;
            if all_granted(&results) {
                return Ok(true);
            }
            if !self.platform.is_host_attached() {
                return Ok(false);
            }

            let mut can_ask_again = false;
            for &kind in kinds {
                can_ask_again |= self.should_show_rationale(kind)?;
            }
            if !can_ask_again {
                break;
            }
            debug!("{kinds:?} denied on attempt {attempt}/{attempts}, asking again");
        }

        if !self.policy.settings_fallback {
            return Ok(false);
        }

        warn!("{kinds:?} still denied, redirecting to app settings");
        self.open_app_settings().await?;
        Ok(all_granted(&self.check_permissions_granted(kinds)?))
    }

    /// Tell the platform when a launched request is abandoned. Only attached
    /// after the platform accepted the request.
    fn cancel_on_drop<T>(&self, pending: Pending<T>) -> Pending<T> {
        let platform = Arc::clone(&self.platform);
        pending.on_cancel(move |id| platform.cancel_request(id))
    }
}

fn all_granted(results: &HashMap<PermissionKind, bool>) -> bool {
    results.values().all(|granted| *granted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{DialogResponse, FakePlatform, SettingsResponse};
    use crate::{
        ACCESS_BACKGROUND_LOCATION, ACCESS_COARSE_LOCATION, ACCESS_FINE_LOCATION,
        POST_NOTIFICATIONS,
    };
    use futures::FutureExt;

    #[tokio::test]
    async fn detached_host_reports_status_without_prompting() {
        let fake = FakePlatform::new(ApiLevel(34));
        fake.set_attached(false);
        fake.grant(ACCESS_COARSE_LOCATION);
        let controller = fake.controller();

        for kinds in [
            &[PermissionKind::ForegroundLocation][..],
            &[PermissionKind::BackgroundLocation, PermissionKind::Notifications][..],
            &PermissionKind::ALL[..],
        ] {
            let launched = controller.launch_permissions(kinds).await.unwrap();
            let current = controller.check_permissions_granted(kinds).unwrap();
            assert_eq!(launched, current);
        }
        assert!(fake.launched().is_empty());
    }

    #[tokio::test]
    async fn one_dialog_covers_all_kinds() {
        let fake = FakePlatform::new(ApiLevel(34));
        fake.script_dialog(DialogResponse::Grant(vec![ACCESS_FINE_LOCATION, POST_NOTIFICATIONS]));
        let controller = fake.controller();

        let results = controller
            .launch_permissions(&[PermissionKind::ForegroundLocation, PermissionKind::Notifications])
            .await
            .unwrap();

        assert!(results[&PermissionKind::ForegroundLocation]);
        assert!(results[&PermissionKind::Notifications]);
        let launched = fake.launched();
        assert_eq!(launched.len(), 1);
        assert_eq!(
            launched[0],
            vec![ACCESS_FINE_LOCATION, ACCESS_COARSE_LOCATION, POST_NOTIFICATIONS]
        );
    }

    #[tokio::test]
    async fn dismissed_dialog_reports_current_status() {
        let fake = FakePlatform::new(ApiLevel(30));
        fake.grant(ACCESS_FINE_LOCATION);
        fake.script_dialog(DialogResponse::Dismiss);
        let controller = fake.controller();

        assert!(
            controller
                .launch_permission(PermissionKind::ForegroundLocation)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn cancelled_request_ignores_late_result() {
        let fake = FakePlatform::new(ApiLevel(34));
        fake.script_dialog(DialogResponse::Ignore);
        let controller = fake.controller();

        {
            let request = controller.launch_permission(PermissionKind::Notifications);
            futures::pin_mut!(request);
            assert!(request.as_mut().now_or_never().is_none());
        }

        let ids = fake.launched_ids();
        assert_eq!(ids.len(), 1);
        assert_eq!(fake.cancelled(), ids);
        assert_eq!(controller.completions().outstanding(), 0);
        let late = HashMap::from([(POST_NOTIFICATIONS.to_owned(), true)]);
        assert!(!controller.complete_permission_request(ids[0], late));
    }

    #[tokio::test]
    async fn concurrent_requests_use_distinct_registrations() {
        let fake = FakePlatform::new(ApiLevel(34));
        fake.script_dialog(DialogResponse::Ignore);
        fake.script_dialog(DialogResponse::Ignore);
        let controller = fake.controller();

        let first = controller.launch_permission(PermissionKind::ForegroundLocation);
        let second = controller.launch_permission(PermissionKind::Notifications);
        futures::pin_mut!(first, second);
        assert!(first.as_mut().now_or_never().is_none());
        assert!(second.as_mut().now_or_never().is_none());

        let ids = fake.launched_ids();
        assert_eq!(ids.len(), 2);
        assert_ne!(ids[0], ids[1]);

        fake.grant(POST_NOTIFICATIONS);
        let answer = HashMap::from([(POST_NOTIFICATIONS.to_owned(), true)]);
        assert!(controller.complete_permission_request(ids[1], answer));
        assert!(second.await.unwrap());
        assert_eq!(controller.completions().outstanding(), 1);
    }

    #[test]
    fn background_rationale_is_always_false() {
        let fake = FakePlatform::new(ApiLevel(34));
        fake.set_rationale(ACCESS_BACKGROUND_LOCATION, true);
        fake.set_rationale(ACCESS_FINE_LOCATION, true);
        let controller = fake.controller();

        assert!(!controller.should_show_rationale(PermissionKind::BackgroundLocation).unwrap());
        assert!(controller.should_show_rationale(PermissionKind::ForegroundLocation).unwrap());
    }

    #[tokio::test]
    async fn open_app_settings_waits_for_return() {
        let fake = FakePlatform::new(ApiLevel(34));
        fake.script_settings(SettingsResponse::Ignore);
        let controller = fake.controller();

        let open = controller.open_app_settings();
        futures::pin_mut!(open);
        assert!(open.as_mut().now_or_never().is_none());

        let ids = fake.settings_ids();
        assert_eq!(ids.len(), 1);
        assert!(controller.complete_settings_return(ids[0]));
        open.await.unwrap();
    }

    #[tokio::test]
    async fn detached_host_skips_app_settings() {
        let fake = FakePlatform::new(ApiLevel(34));
        fake.set_attached(false);
        fake.script_settings(SettingsResponse::Ignore);
        let controller = fake.controller();

        let open = controller.open_app_settings();
        futures::pin_mut!(open);
        assert!(matches!(open.as_mut().now_or_never(), Some(Ok(()))));
        assert!(fake.settings_ids().is_empty());
    }

    #[tokio::test]
    async fn failed_launch_is_not_reported_as_cancelled() {
        let fake = FakePlatform::new(ApiLevel(34));
        fake.script_dialog(DialogResponse::Fail);
        fake.script_settings(SettingsResponse::Fail);
        let controller = fake.controller();

        assert!(
            controller
                .launch_permission(PermissionKind::Notifications)
                .await
                .is_err()
        );
        assert!(controller.open_app_settings().await.is_err());

        assert_eq!(fake.launched_ids().len(), 1);
        assert_eq!(fake.settings_ids().len(), 1);
        assert!(fake.cancelled().is_empty());
        assert_eq!(controller.completions().outstanding(), 0);
    }

    #[tokio::test]
    async fn fallback_retries_while_rationale_then_uses_settings() {
        let fake = FakePlatform::new(ApiLevel(34));
        fake.set_rationale(ACCESS_FINE_LOCATION, true);
        fake.script_settings(SettingsResponse::Return(vec![ACCESS_FINE_LOCATION]));
        let controller = fake.controller();

        let granted = controller
            .request_with_settings_fallback(&[PermissionKind::ForegroundLocation])
            .await
            .unwrap();

        assert!(granted);
        assert_eq!(fake.launched().len(), 2);
        assert_eq!(fake.settings_ids().len(), 1);
    }

    #[tokio::test]
    async fn fallback_skips_retry_when_permanently_denied() {
        let fake = FakePlatform::new(ApiLevel(34));
        let controller = fake.controller();

        let granted = controller
            .request_with_settings_fallback(&[PermissionKind::ForegroundLocation])
            .await
            .unwrap();

        assert!(!granted);
        assert_eq!(fake.launched().len(), 1);
        assert_eq!(fake.settings_ids().len(), 1);
    }

    #[tokio::test]
    async fn fallback_honours_disabled_settings_redirect() {
        let fake = FakePlatform::new(ApiLevel(34));
        let controller = fake.controller_with_policy(RetryPolicy {
            dialog_attempts: 1,
            settings_fallback: false,
        });

        assert!(
            !controller
                .request_with_settings_fallback(&[PermissionKind::Notifications])
                .await
                .unwrap()
        );
        assert!(fake.settings_ids().is_empty());
    }

    #[test]
    fn retry_policy_fills_missing_fields() {
        let policy: RetryPolicy = serde_json::from_str(r#"{"dialogAttempts":3}"#).unwrap();
        assert_eq!(policy.dialog_attempts, 3);
        assert!(policy.settings_fallback);
    }
}
