//! Android location client backed by a host bridge object via JNI.
//!
//! The host wraps `FusedLocationProviderClient` in a bridge object with
//! `registerNativeHandle(long)`, `requestLocationUpdates(String json)` and
//! `removeLocationUpdates()`. Its `LocationCallback` forwards each
//! `Location` as JSON (see [`RawReading`]) to
//! `com.devicekit.location.LocationBridge.dispatchReading`.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};

use jni::objects::{GlobalRef, JClass, JObject, JString, JValue};
use jni::sys::jlong;
use jni::{JNIEnv, JavaVM};
use log::{debug, error};

use crate::{
    LocationError, LocationProvider, LocationRequest, LocationResult, RawReading, ReadingSink,
};

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(1);
static SINKS: OnceLock<Mutex<HashMap<u64, ReadingSink>>> = OnceLock::new();

fn sinks() -> MutexGuard<'static, HashMap<u64, ReadingSink>> {
    SINKS
        .get_or_init(|| Mutex::new(HashMap::new()))
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
}

/// [`LocationProvider`] that forwards to the host's fused location bridge.
pub struct AndroidLocationProvider {
    vm: JavaVM,
    bridge: GlobalRef,
    handle: u64,
}

impl fmt::Debug for AndroidLocationProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AndroidLocationProvider")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

impl AndroidLocationProvider {
    /// Wrap a host bridge object and register this provider's native handle with it.
    ///
    /// # Errors
    /// Returns an error if the bridge cannot be referenced or refuses the handle.
    pub fn new(env: &JNIEnv<'_>, bridge: &JObject<'_>) -> LocationResult<Self> {
        let vm = env.get_java_vm().map_err(map_jni_error)?;
        let bridge = env.new_global_ref(bridge).map_err(map_jni_error)?;
        let handle = NEXT_HANDLE.fetch_add(1, Ordering::Relaxed);
        let provider = Self { vm, bridge, handle };

        #[allow(clippy::cast_possible_wrap)]
        let j_handle = handle as jlong;
        provider.with_bridge(|env, bridge| {
            env.call_method(bridge, "registerNativeHandle", "(J)V", &[JValue::Long(j_handle)])?;
            Ok(())
        })?;
        Ok(provider)
    }

    /// Native handle the bridge quotes when dispatching readings.
    #[must_use]
    pub const fn handle(&self) -> u64 {
        self.handle
    }

    fn with_bridge<F>(&self, action: F) -> LocationResult<()>
    where
        F: FnOnce(&mut JNIEnv<'_>, &JObject<'_>) -> jni::errors::Result<()>,
    {
        let mut env = self.vm.attach_current_thread().map_err(map_jni_error)?;
        let bridge = self.bridge.as_obj();
        action(&mut env, bridge).map_err(map_jni_error)
    }
}

impl LocationProvider for AndroidLocationProvider {
    fn request_location_updates(
        &self,
        request: &LocationRequest,
        sink: ReadingSink,
    ) -> LocationResult<()> {
        let json = serde_json::to_string(request).map_err(|err| LocationError::Serialization {
            message: err.to_string(),
        })?;

        sinks().insert(self.handle, sink);
        let result = self.with_bridge(|env, bridge| {
            let j_json = JObject::from(env.new_string(json.as_str())?);
            env.call_method(
                bridge,
                "requestLocationUpdates",
                "(Ljava/lang/String;)V",
                &[JValue::Object(&j_json)],
            )?;
            Ok(())
        });
        if result.is_err() {
            sinks().remove(&self.handle);
        }
        result
    }

    fn remove_location_updates(&self) {
        sinks().remove(&self.handle);
        if let Err(err) = self.with_bridge(|env, bridge| {
            env.call_method(bridge, "removeLocationUpdates", "()V", &[])?;
            Ok(())
        }) {
            error!("failed to remove Android location updates: {err}");
        }
    }
}

impl Drop for AndroidLocationProvider {
    fn drop(&mut self) {
        sinks().remove(&self.handle);
    }
}

/// Entry point for `LocationBridge.dispatchReading(long handle, String json)`.
#[allow(non_snake_case)]
#[unsafe(no_mangle)]
pub extern "system" fn Java_com_devicekit_location_LocationBridge_dispatchReading(
    mut env: JNIEnv<'_>,
    _class: JClass<'_>,
    handle: jlong,
    json_reading: JString<'_>,
) {
    #[allow(clippy::cast_sign_loss)]
    let handle = handle as u64;
    let json = match env.get_string(&json_reading) {
        Ok(value) => value.to_string_lossy().into_owned(),
        Err(err) => {
            error!("failed to read Android location payload: {err}");
            return;
        }
    };

    let reading = match serde_json::from_str::<RawReading>(&json) {
        Ok(reading) => reading,
        Err(err) => {
            debug!("dropping malformed location reading: {err}");
            return;
        }
    };

    let sink = sinks().get(&handle).cloned();
    match sink {
        Some(sink) => {
            sink.deliver(reading);
        }
        None => debug!("location reading for inactive handle {handle}"),
    }
}

#[allow(clippy::needless_pass_by_value)]
fn map_jni_error(err: jni::errors::Error) -> LocationError {
    LocationError::Platform {
        message: err.to_string(),
    }
}
