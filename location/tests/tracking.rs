//! Monitor and permission flow driven together, the way a host screen uses them.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use devicekit_location::{
    LocationMonitor, LocationProvider, LocationRequest, LocationResult, PermissionState,
    RawReading, ReadingSink,
};
use devicekit_permission::testing::{DialogResponse, FakePlatform, SettingsResponse};
use devicekit_permission::{ACCESS_BACKGROUND_LOCATION, ACCESS_FINE_LOCATION, ApiLevel};

#[derive(Debug, Default)]
struct RecordingProvider {
    requests: Mutex<Vec<LocationRequest>>,
    sink: Mutex<Option<ReadingSink>>,
}

impl RecordingProvider {
    fn emit(&self, reading: RawReading) {
        if let Some(sink) = self.sink.lock().unwrap().as_ref() {
            sink.deliver(reading);
        }
    }
}

impl LocationProvider for RecordingProvider {
    fn request_location_updates(
        &self,
        request: &LocationRequest,
        sink: ReadingSink,
    ) -> LocationResult<()> {
        self.requests.lock().unwrap().push(*request);
        *self.sink.lock().unwrap() = Some(sink);
        Ok(())
    }

    fn remove_location_updates(&self) {
        self.sink.lock().unwrap().take();
    }
}

fn fix_at(latitude: f64, longitude: f64) -> RawReading {
    RawReading {
        latitude,
        longitude,
        accuracy: 8.0,
        has_accuracy: true,
        speed: 1.2,
        has_speed: true,
        time: 1_000,
        ..RawReading::default()
    }
}

#[tokio::test]
async fn grant_via_settings_then_track() {
    let platform = FakePlatform::new(ApiLevel(33));
    platform.script_dialog(DialogResponse::Grant(vec![ACCESS_FINE_LOCATION]));
    platform.script_dialog(DialogResponse::DenyAll);
    platform.script_settings(SettingsResponse::Return(vec![ACCESS_BACKGROUND_LOCATION]));
    let controller = platform.controller();
    let provider = Arc::new(RecordingProvider::default());
    let monitor = LocationMonitor::new(provider.clone(), controller.clone()).unwrap();

    monitor.start().unwrap();
    assert!(!monitor.is_running());

    let state = monitor.request_permission(&controller).await.unwrap();
    assert_eq!(state, PermissionState::Granted);
    assert_eq!(platform.settings_ids().len(), 1);

    monitor.start().unwrap();
    let mut location = monitor.current_location();
    provider.emit(fix_at(48.85, 2.35));
    tokio::time::timeout(Duration::from_secs(1), location.wait_for(Option::is_some))
        .await
        .unwrap()
        .unwrap();

    let fix = monitor.latest().unwrap();
    assert_eq!(fix.horizontal_accuracy, Some(8.0));
    assert_eq!(fix.speed, Some(1.2));
    assert_eq!(fix.bearing, None);

    monitor.enable_live_tracking(true).unwrap();
    provider.emit(fix_at(48.86, 2.36));
    tokio::time::timeout(
        Duration::from_secs(1),
        location.wait_for(|fix| fix.is_some_and(|fix| fix.latitude > 48.855)),
    )
    .await
    .unwrap()
    .unwrap();

    assert_eq!(
        *provider.requests.lock().unwrap(),
        vec![LocationRequest::PASSIVE, LocationRequest::LIVE]
    );

    monitor.stop();
    monitor.stop();
    assert!(!monitor.is_running());
    assert!(monitor.latest().is_some());
}

#[tokio::test]
async fn denied_permission_keeps_monitor_idle() {
    let platform = FakePlatform::new(ApiLevel(34));
    let controller = platform.controller();
    let provider = Arc::new(RecordingProvider::default());
    let monitor = LocationMonitor::new(provider.clone(), controller.clone()).unwrap();

    let state = monitor.request_permission(&controller).await.unwrap();
    assert_eq!(
        state,
        PermissionState::Denied {
            can_ask_again: true
        }
    );

    monitor.enable_live_tracking(true).unwrap();
    monitor.start().unwrap();
    assert!(provider.requests.lock().unwrap().is_empty());
    assert_eq!(*monitor.current_location().borrow(), None);
}
