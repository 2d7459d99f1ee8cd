use std::fmt::Debug;

use async_channel::Sender;
use log::debug;

use crate::{LocationRequest, LocationResult, RawReading};

/// Where a provider delivers readings for one subscription.
///
/// Cheap to clone. Delivery after the subscription ended is a silent no-op.
#[derive(Debug, Clone)]
pub struct ReadingSink {
    sender: Sender<RawReading>,
}

impl ReadingSink {
    pub(crate) const fn new(sender: Sender<RawReading>) -> Self {
        Self { sender }
    }

    /// Hand a reading to the monitor. Returns `false` if the subscription is gone.
    pub fn deliver(&self, reading: RawReading) -> bool {
        match self.sender.try_send(reading) {
            Ok(()) => true,
            Err(err) => {
                debug!("dropping location reading: {err}");
                false
            }
        }
    }

    /// Whether the subscription this sink belongs to has ended.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

/// The platform location client (on Android, the fused location provider).
pub trait LocationProvider: Debug + Send + Sync {
    /// Begin continuous updates with `request`, delivering into `sink`.
    ///
    /// Replaces any previous subscription.
    ///
    /// # Errors
    /// Returns an error if the platform rejects the subscription.
    fn request_location_updates(
        &self,
        request: &LocationRequest,
        sink: ReadingSink,
    ) -> LocationResult<()>;

    /// Stop the current subscription, if any.
    fn remove_location_updates(&self);
}
