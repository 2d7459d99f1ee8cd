//! Android permission platform backed by a host bridge object via JNI.
//!
//! The host activity owns the activity-result launchers. It passes a bridge
//! object implementing
//!
//! - `int sdkInt()`
//! - `boolean isHostAttached()`
//! - `boolean isGranted(String permission)`
//! - `boolean shouldShowRationale(String permission)`
//! - `void launchPermissions(long requestId, String[] permissions)`
//! - `void openAppSettings(long requestId)`
//! - `void cancelRequest(long requestId)`
//! - `void registerNativeHandle(long handle)`
//!
//! and reports results through the native methods of
//! `com.devicekit.permission.PermissionBridge`.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};

use jni::objects::{GlobalRef, JClass, JObject, JString, JValue};
use jni::sys::{jint, jlong};
use jni::{JNIEnv, JavaVM};
use log::error;

use crate::{
    ApiLevel, Completions, PermissionController, PermissionError, PermissionPlatform,
    PermissionResult, RequestId, RetryPolicy,
};

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);
static COMPLETIONS: OnceLock<Mutex<HashMap<u64, Completions>>> = OnceLock::new();

fn completions() -> MutexGuard<'static, HashMap<u64, Completions>> {
    COMPLETIONS
        .get_or_init(|| Mutex::new(HashMap::new()))
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

/// [`PermissionPlatform`] that forwards to the host's permission bridge.
pub struct AndroidPermissionPlatform {
    vm: JavaVM,
    bridge: GlobalRef,
    handle: u64,
    api: ApiLevel,
}

impl fmt::Debug for AndroidPermissionPlatform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AndroidPermissionPlatform")
            .field("handle", &self.handle)
            .field("api", &self.api)
            .finish_non_exhaustive()
    }
}

impl AndroidPermissionPlatform {
    /// Wrap a host bridge object and read the device SDK level from it.
    ///
    /// # Errors
    /// Returns an error if the JVM or a global reference cannot be obtained,
    /// or the bridge does not report a valid SDK level.
    pub fn new(env: &JNIEnv<'_>, bridge: &JObject<'_>) -> PermissionResult<Self> {
        let vm = env.get_java_vm().map_err(map_jni_error)?;
        let bridge = env.new_global_ref(bridge).map_err(map_jni_error)?;

        let sdk_int = {
            let mut env = vm.attach_current_thread().map_err(map_jni_error)?;
            env.call_method(bridge.as_obj(), "sdkInt", "()I", &[])
                .and_then(|value| value.i())
                .map_err(map_jni_error)?
        };
        let api = ApiLevel::from_sdk_int(sdk_int).ok_or_else(|| PermissionError::Platform {
            message: format!("bridge reported invalid SDK level {sdk_int}"),
        })?;

        let handle = NEXT_HANDLE.fetch_add(1, Ordering::Relaxed);
        Ok(Self {
            vm,
            bridge,
            handle,
            api,
        })
    }

    /// Native handle the bridge quotes when dispatching results.
    #[must_use]
    pub const fn handle(&self) -> u64 {
        self.handle
    }

    fn with_bridge<T, F>(&self, action: F) -> PermissionResult<T>
    where
        F: FnOnce(&mut JNIEnv<'_>, &JObject<'_>) -> jni::errors::Result<T>,
    {
        let mut env = self.vm.attach_current_thread().map_err(map_jni_error)?;
        let bridge = self.bridge.as_obj();
        action(&mut env, bridge).map_err(map_jni_error)
    }

    fn call_bool(&self, method: &str, permission: &str) -> PermissionResult<bool> {
        self.with_bridge(|env, bridge| {
            let j_permission = JObject::from(env.new_string(permission)?);
            env.call_method(
                bridge,
                method,
                "(Ljava/lang/String;)Z",
                &[JValue::Object(&j_permission)],
            )?
            .z()
        })
    }

    fn register_handle(&self) -> PermissionResult<()> {
        #[allow(clippy::cast_possible_wrap)]
        let handle = self.handle as jlong;
        self.with_bridge(|env, bridge| {
            env.call_method(bridge, "registerNativeHandle", "(J)V", &[JValue::Long(handle)])?;
            Ok(())
        })
    }
}

impl PermissionPlatform for AndroidPermissionPlatform {
    fn api_level(&self) -> ApiLevel {
        self.api
    }

    fn is_host_attached(&self) -> bool {
        self.with_bridge(|env, bridge| env.call_method(bridge, "isHostAttached", "()Z", &[])?.z())
            .unwrap_or_else(|err| {
                error!("failed to query Android host surface: {err}");
                false
            })
    }

    fn is_granted(&self, permission: &str) -> PermissionResult<bool> {
        self.call_bool("isGranted", permission)
    }

    fn should_show_rationale(&self, permission: &str) -> PermissionResult<bool> {
        self.call_bool("shouldShowRationale", permission)
    }

    fn launch_permissions(&self, request: RequestId, permissions: &[&str]) -> PermissionResult<()> {
        let request = request_to_jlong(request);
        self.with_bridge(|env, bridge| {
            #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
            let len = permissions.len() as jint;
            let array = env.new_object_array(len, "java/lang/String", JObject::null())?;
            for (index, permission) in (0..len).zip(permissions) {
                let j_permission = env.new_string(*permission)?;
                env.set_object_array_element(&array, index, j_permission)?;
            }
            let array = JObject::from(array);
            env.call_method(
                bridge,
                "launchPermissions",
                "(J[Ljava/lang/String;)V",
                &[JValue::Long(request), JValue::Object(&array)],
            )?;
            Ok(())
        })
    }

    fn open_app_settings(&self, request: RequestId) -> PermissionResult<()> {
        let request = request_to_jlong(request);
        self.with_bridge(|env, bridge| {
            env.call_method(bridge, "openAppSettings", "(J)V", &[JValue::Long(request)])?;
            Ok(())
        })
    }

    fn cancel_request(&self, request: RequestId) {
        let request = request_to_jlong(request);
        if let Err(err) = self.with_bridge(|env, bridge| {
            env.call_method(bridge, "cancelRequest", "(J)V", &[JValue::Long(request)])?;
            Ok(())
        }) {
            error!("failed to cancel Android permission request: {err}");
        }
    }
}

impl Drop for AndroidPermissionPlatform {
    fn drop(&mut self) {
        completions().remove(&self.handle);
    }
}

/// Build a [`PermissionController`] for a host bridge object and register it
/// for result dispatch.
///
/// # Errors
/// Returns an error if the bridge cannot be wrapped or refuses the native handle.
pub fn controller(
    env: &JNIEnv<'_>,
    bridge: &JObject<'_>,
    policy: RetryPolicy,
) -> PermissionResult<PermissionController> {
    let platform = AndroidPermissionPlatform::new(env, bridge)?;
    let handle = platform.handle();
    platform.register_handle()?;

    let controller = PermissionController::with_policy(Arc::new(platform), policy);
    completions().insert(handle, controller.completions());
    Ok(controller)
}

/// Entry point for `PermissionBridge.dispatchPermissionResult(long, long, String json)`.
///
/// `json` maps each requested permission identifier to whether it was granted.
#[allow(non_snake_case)]
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_devicekit_permission_PermissionBridge_dispatchPermissionResult(
    mut env: JNIEnv<'_>,
    _class: JClass<'_>,
    handle: jlong,
    request: jlong,
    json_results: JString<'_>,
) {
    let json = match env.get_string(&json_results) {
        Ok(value) => value.to_string_lossy().into_owned(),
        Err(err) => {
            error!("failed to read Android permission payload: {err}");
            return;
        }
    };

    let Some(target) = lookup(handle) else {
        return;
    };
    let request = request_from_jlong(request);
    match serde_json::from_str::<HashMap<String, bool>>(&json) {
        Ok(results) => {
            target.complete_permission_request(request, results);
        }
        Err(err) => {
            error!("malformed permission result for {request}: {err}");
            target.dismiss_permission_request(request);
        }
    }
}

/// Entry point for `PermissionBridge.dispatchSettingsReturned(long, long)`.
#[allow(non_snake_case)]
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_devicekit_permission_PermissionBridge_dispatchSettingsReturned(
    _env: JNIEnv<'_>,
    _class: JClass<'_>,
    handle: jlong,
    request: jlong,
) {
    if let Some(target) = lookup(handle) {
        target.complete_settings_return(request_from_jlong(request));
    }
}

fn lookup(handle: jlong) -> Option<Completions> {
    #[allow(clippy::cast_sign_loss)]
    let handle = handle as u64;
    let target = completions().get(&handle).cloned();
    if target.is_none() {
        error!("received Android permission result for unknown handle {handle}");
    }
    target
}

#[allow(clippy::cast_possible_wrap)]
const fn request_to_jlong(request: RequestId) -> jlong {
    request.0 as jlong
}

#[allow(clippy::cast_sign_loss)]
const fn request_from_jlong(request: jlong) -> RequestId {
    RequestId(request as u64)
}

#[allow(clippy::needless_pass_by_value)]
fn map_jni_error(err: jni::errors::Error) -> PermissionError {
    PermissionError::Platform {
        message: err.to_string(),
    }
}
