//! In-memory [`PermissionPlatform`] for tests.
//!
//! Enabled for this crate's own tests and, through the `testing` feature, for
//! dependants that want to drive a [`PermissionController`] without a device.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::{
    ApiLevel, Completions, PermissionController, PermissionError, PermissionPlatform,
    PermissionResult, RequestId, RetryPolicy,
};

/// What the fake user does with the next permission dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogResponse {
    /// Grant the listed identifiers, deny every other requested one.
    Grant(Vec<&'static str>),
    /// Deny everything requested.
    DenyAll,
    /// Close the dialog without answering.
    Dismiss,
    /// Never answer; the request stays pending.
    Ignore,
    /// The bridge fails to show the dialog.
    Fail,
}

/// What the fake user does on the settings screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SettingsResponse {
    /// Grant the listed identifiers, then return to the app.
    Return(Vec<&'static str>),
    /// Never return.
    Ignore,
    /// The bridge fails to open the settings screen.
    Fail,
}

#[derive(Debug, Default)]
struct State {
    attached: bool,
    granted: HashSet<String>,
    rationale: HashSet<String>,
    dialogs: VecDeque<DialogResponse>,
    settings: VecDeque<SettingsResponse>,
    launched: Vec<(RequestId, Vec<String>)>,
    settings_opened: Vec<RequestId>,
    cancelled: Vec<RequestId>,
    completions: Option<Completions>,
}

/// Scriptable stand-in for the Android permission bridge.
///
/// Unscripted dialogs deny everything; unscripted settings visits return
/// without changing anything.
#[derive(Debug)]
pub struct FakePlatform {
    api: ApiLevel,
    state: Mutex<State>,
}

impl FakePlatform {
    /// A fake at the given API level with an attached host and nothing granted.
    #[must_use]
    pub fn new(api: ApiLevel) -> Arc<Self> {
        Arc::new(Self {
            api,
            state: Mutex::new(State {
                attached: true,
                ..State::default()
            }),
        })
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Build a controller wired to this fake.
    #[must_use]
    pub fn controller(self: &Arc<Self>) -> PermissionController {
        self.controller_with_policy(RetryPolicy::default())
    }

    /// Build a controller with `policy` wired to this fake.
    #[must_use]
    pub fn controller_with_policy(self: &Arc<Self>, policy: RetryPolicy) -> PermissionController {
        let platform: Arc<dyn PermissionPlatform> = self.clone();
        let controller = PermissionController::with_policy(platform, policy);
        self.state().completions = Some(controller.completions());
        controller
    }

    /// Attach or detach the host surface.
    pub fn set_attached(&self, attached: bool) {
        self.state().attached = attached;
    }

    /// Mark an identifier as granted.
    pub fn grant(&self, permission: &str) {
        self.state().granted.insert(permission.to_owned());
    }

    /// Mark an identifier as not granted.
    pub fn revoke(&self, permission: &str) {
        self.state().granted.remove(permission);
    }

    /// Set the rationale recommendation for an identifier.
    pub fn set_rationale(&self, permission: &str, show: bool) {
        let mut state = self.state();
        if show {
            state.rationale.insert(permission.to_owned());
        } else {
            state.rationale.remove(permission);
        }
    }

    /// Queue the response to the next dialog.
    pub fn script_dialog(&self, response: DialogResponse) {
        self.state().dialogs.push_back(response);
    }

    /// Queue the response to the next settings visit.
    pub fn script_settings(&self, response: SettingsResponse) {
        self.state().settings.push_back(response);
    }

    /// Identifier lists of every dialog shown so far.
    #[must_use]
    pub fn launched(&self) -> Vec<Vec<String>> {
        self.state()
            .launched
            .iter()
            .map(|(_, permissions)| permissions.clone())
            .collect()
    }

    /// Request ids of every dialog shown so far.
    #[must_use]
    pub fn launched_ids(&self) -> Vec<RequestId> {
        self.state().launched.iter().map(|(id, _)| *id).collect()
    }

    /// Request ids of every settings visit so far.
    #[must_use]
    pub fn settings_ids(&self) -> Vec<RequestId> {
        self.state().settings_opened.clone()
    }

    /// Request ids the controller cancelled.
    #[must_use]
    pub fn cancelled(&self) -> Vec<RequestId> {
        self.state().cancelled.clone()
    }
}

impl PermissionPlatform for FakePlatform {
    fn api_level(&self) -> ApiLevel {
        self.api
    }

    fn is_host_attached(&self) -> bool {
        self.state().attached
    }

    fn is_granted(&self, permission: &str) -> PermissionResult<bool> {
        Ok(self.state().granted.contains(permission))
    }

    fn should_show_rationale(&self, permission: &str) -> PermissionResult<bool> {
        Ok(self.state().rationale.contains(permission))
    }

    fn launch_permissions(&self, request: RequestId, permissions: &[&str]) -> PermissionResult<()> {
        let (response, completions) = {
            let mut state = self.state();
            state.launched.push((
                request,
                permissions.iter().map(|p| (*p).to_owned()).collect(),
            ));
            let response = state.dialogs.pop_front().unwrap_or(DialogResponse::DenyAll);
            if let DialogResponse::Grant(granted) = &response {
                for permission in granted {
                    state.granted.insert((*permission).to_owned());
                }
            }
            (response, state.completions.clone())
        };

        if response == DialogResponse::Fail {
            return Err(bridge_failure("permission dialog"));
        }
        let Some(completions) = completions else {
            return Ok(());
        };
        match response {
            DialogResponse::Grant(granted) => {
                let results: HashMap<String, bool> = permissions
                    .iter()
                    .map(|p| ((*p).to_owned(), granted.iter().any(|g| *g == *p)))
                    .collect();
                completions.complete_permission_request(request, results);
            }
            DialogResponse::DenyAll => {
                let results = permissions.iter().map(|p| ((*p).to_owned(), false)).collect();
                completions.complete_permission_request(request, results);
            }
            DialogResponse::Dismiss => {
                completions.dismiss_permission_request(request);
            }
            DialogResponse::Ignore | DialogResponse::Fail => {}
        }
        Ok(())
    }

    fn open_app_settings(&self, request: RequestId) -> PermissionResult<()> {
        let (response, completions) = {
            let mut state = self.state();
            state.settings_opened.push(request);
            let response = state
                .settings
                .pop_front()
                .unwrap_or_else(|| SettingsResponse::Return(Vec::new()));
            if let SettingsResponse::Return(granted) = &response {
                for permission in granted {
                    state.granted.insert((*permission).to_owned());
                }
            }
            (response, state.completions.clone())
        };

        match (response, completions) {
            (SettingsResponse::Fail, _) => Err(bridge_failure("app settings")),
            (SettingsResponse::Return(_), Some(completions)) => {
                completions.complete_settings_return(request);
                Ok(())
            }
            _ => Ok(()),
        }
    }

    fn cancel_request(&self, request: RequestId) {
        self.state().cancelled.push(request);
    }
}

fn bridge_failure(surface: &str) -> PermissionError {
    PermissionError::Platform {
        message: format!("fake bridge could not show {surface}"),
    }
}
