use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use devicekit_permission::{
    PermissionController, PermissionKind, PermissionResult, PermissionState,
    acquire_location_access,
};
use log::{debug, info};
use tokio::runtime::Handle;
use tokio::sync::watch;

use crate::provider::ReadingSink;
use crate::scope::UpdateScope;
use crate::{LocationError, LocationFix, LocationProvider, LocationRequest, LocationResult};

#[derive(Debug, Default)]
struct MonitorState {
    live: bool,
    session: Option<Session>,
}

#[derive(Debug)]
struct Session {
    request: LocationRequest,
    scope: UpdateScope,
}

/// Keeps the latest device location up to date while permission allows it.
///
/// Location updates are only subscribed while foreground location permission
/// is granted. Asking for that permission is a separate step
/// ([`LocationMonitor::request_permission`]); after a grant, call
/// [`LocationMonitor::start`] again.
pub struct LocationMonitor {
    provider: Arc<dyn LocationProvider>,
    permissions: PermissionController,
    runtime: Handle,
    latest: Arc<watch::Sender<Option<LocationFix>>>,
    state: Mutex<MonitorState>,
}

impl fmt::Debug for LocationMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocationMonitor")
            .field("provider", &self.provider)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl LocationMonitor {
    /// Create a monitor that runs its update pump on the current tokio runtime.
    ///
    /// # Errors
    /// Returns [`LocationError::NoRuntime`] outside of a tokio runtime.
    pub fn new(
        provider: Arc<dyn LocationProvider>,
        permissions: PermissionController,
    ) -> LocationResult<Self> {
        let runtime = Handle::try_current().map_err(|_| LocationError::NoRuntime)?;
        Ok(Self::with_runtime(provider, permissions, runtime))
    }

    /// Create a monitor that runs its update pump on `runtime`.
    pub fn with_runtime(
        provider: Arc<dyn LocationProvider>,
        permissions: PermissionController,
        runtime: Handle,
    ) -> Self {
        let (latest, _) = watch::channel(None);
        Self {
            provider,
            permissions,
            runtime,
            latest: Arc::new(latest),
            state: Mutex::new(MonitorState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, MonitorState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Begin updates if foreground location is granted; otherwise do nothing.
    ///
    /// Uses the live profile if live tracking was enabled earlier, the
    /// passive profile otherwise. Restarts an already running subscription.
    ///
    /// # Errors
    /// Returns an error if the permission status cannot be read or the
    /// provider rejects the subscription.
    pub fn start(&self) -> LocationResult<()> {
        let mut state = self.state();
        if !self.foreground_granted()? {
            debug!("foreground location not granted, not starting updates");
            return Ok(());
        }
        self.begin_updates(&mut state)
    }

    /// Cancel the active subscription, if any. Safe to call repeatedly.
    pub fn stop(&self) {
        let mut state = self.state();
        self.end_updates(&mut state);
    }

    /// Switch between the live and passive profiles.
    ///
    /// With permission granted the subscription is restarted right away with
    /// the new profile. Without it only the choice is recorded.
    ///
    /// # Errors
    /// Returns an error if the permission status cannot be read or the
    /// provider rejects the new subscription.
    pub fn enable_live_tracking(&self, enable: bool) -> LocationResult<()> {
        let mut state = self.state();
        state.live = enable;
        if !self.foreground_granted()? {
            debug!("live tracking set to {enable}, applied once permission is granted");
            return Ok(());
        }
        self.begin_updates(&mut state)
    }

    /// Run the location permission flow with `controller`.
    ///
    /// Does not start or stop updates.
    ///
    /// # Errors
    /// Returns an error if a dialog or the settings screen cannot be launched.
    pub async fn request_permission(
        &self,
        controller: &PermissionController,
    ) -> PermissionResult<PermissionState> {
        acquire_location_access(controller).await
    }

    /// Observe the latest fix. New observers see the current value at once.
    #[must_use]
    pub fn current_location(&self) -> watch::Receiver<Option<LocationFix>> {
        self.latest.subscribe()
    }

    /// The latest fix, if one arrived yet.
    #[must_use]
    pub fn latest(&self) -> Option<LocationFix> {
        *self.latest.borrow()
    }

    /// Whether live tracking is selected.
    #[must_use]
    pub fn is_live_tracking(&self) -> bool {
        self.state().live
    }

    /// Whether a subscription is active.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state().session.is_some()
    }

    /// Parameters of the active subscription.
    #[must_use]
    pub fn active_request(&self) -> Option<LocationRequest> {
        self.state().session.as_ref().map(|session| session.request)
    }

    fn foreground_granted(&self) -> LocationResult<bool> {
        Ok(self
            .permissions
            .check_permission_granted(PermissionKind::ForegroundLocation)?)
    }

    fn begin_updates(&self, state: &mut MonitorState) -> LocationResult<()> {
        self.end_updates(state);

        let request = LocationRequest::for_tracking(state.live);
        let (sender, readings) = async_channel::unbounded();
        self.provider
            .request_location_updates(&request, ReadingSink::new(sender))?;

        let scope = UpdateScope::spawn(&self.runtime, readings, Arc::clone(&self.latest));
        info!("location updates started: {request}");
        state.session = Some(Session { request, scope });
        Ok(())
    }

    fn end_updates(&self, state: &mut MonitorState) {
        if let Some(session) = state.session.take() {
            self.provider.remove_location_updates();
            session.scope.close();
            info!("location updates stopped");
        }
    }
}

impl Drop for LocationMonitor {
    fn drop(&mut self) {
        let mut state = self.state();
        self.end_updates(&mut state);
    }
}
