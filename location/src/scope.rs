//! Cancellation boundary for one location subscription.
//!
//! Each subscription gets a pump task that moves readings from the provider
//! into the latest-fix cell. Closing the scope ends the pump, signalled by
//! closing a channel rather than polling a flag.

use std::sync::Arc;

use async_channel::{Receiver, Sender};
use log::debug;
use tokio::runtime::Handle;
use tokio::sync::watch;

use crate::{LocationFix, RawReading};

/// Owns the pump task of an active subscription. Closing is idempotent and
/// also happens on drop.
#[derive(Debug)]
pub(crate) struct UpdateScope {
    closer: Sender<()>,
}

impl UpdateScope {
    /// Start pumping `readings` into `latest` on `runtime`.
    pub(crate) fn spawn(
        runtime: &Handle,
        readings: Receiver<RawReading>,
        latest: Arc<watch::Sender<Option<LocationFix>>>,
    ) -> Self {
        let (closer, closed) = async_channel::bounded(1);
        // The pump ends on its own once it sees the close; no need to join it.
        drop(runtime.spawn(pump(readings, closed, latest)));
        Self { closer }
    }

    /// Stop the pump. Readings still queued are discarded.
    pub(crate) fn close(&self) {
        self.closer.close();
    }

    #[cfg(test)]
    pub(crate) fn is_closed(&self) -> bool {
        self.closer.is_closed()
    }
}

impl Drop for UpdateScope {
    fn drop(&mut self) {
        self.closer.close();
    }
}

async fn pump(
    readings: Receiver<RawReading>,
    closed: Receiver<()>,
    latest: Arc<watch::Sender<Option<LocationFix>>>,
) {
    loop {
        tokio::select! {
            biased;
            _ = closed.recv() => break,
            reading = readings.recv() => match reading {
                Ok(reading) => {
                    if closed.is_closed() {
                        break;
                    }
                    publish(&latest, &reading);
                }
                Err(_) => break,
            },
        }
    }
    readings.close();
    debug!("location pump stopped");
}

/// Store the fix resolved from `reading`, waking observers only on change.
///
/// Returns whether observers were notified. Unresolvable readings leave the
/// stored value untouched.
pub(crate) fn publish(latest: &watch::Sender<Option<LocationFix>>, reading: &RawReading) -> bool {
    let Some(fix) = reading.to_fix() else {
        debug!("dropping unresolvable location reading");
        return false;
    };

    latest.send_if_modified(|slot| {
        if slot.as_ref() == Some(&fix) {
            false
        } else {
            *slot = Some(fix);
            true
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reading(latitude: f64) -> RawReading {
        RawReading {
            latitude,
            longitude: 4.0,
            ..RawReading::default()
        }
    }

    #[test]
    fn unresolvable_reading_keeps_previous_fix() {
        let (latest, observer) = watch::channel(None);
        assert!(publish(&latest, &reading(1.0)));
        let before = *observer.borrow();

        assert!(!publish(&latest, &reading(f64::NAN)));
        assert_eq!(*observer.borrow(), before);
    }

    #[test]
    fn identical_fix_does_not_notify() {
        let (latest, mut observer) = watch::channel(None);
        assert!(publish(&latest, &reading(1.0)));
        observer.borrow_and_update();

        assert!(!publish(&latest, &reading(1.0)));
        assert!(!observer.has_changed().unwrap());
    }

    #[tokio::test]
    async fn pump_publishes_in_delivery_order_until_closed() {
        let (latest, mut observer) = watch::channel(None);
        let (sender, readings) = async_channel::unbounded();
        let scope = UpdateScope::spawn(&Handle::current(), readings, Arc::new(latest));

        for latitude in [1.0, 2.0, 3.0] {
            sender.try_send(reading(latitude)).unwrap();
        }
        observer
            .wait_for(|fix| fix.is_some_and(|fix| fix.latitude == 3.0))
            .await
            .unwrap();

        scope.close();
        assert!(scope.is_closed());
        tokio::time::timeout(std::time::Duration::from_secs(1), async {
            while !sender.is_closed() {
                tokio::task::yield_now().await;
            }
        })
        .await
        .unwrap();
        assert!(sender.try_send(reading(4.0)).is_err());
        assert_eq!(observer.borrow().map(|fix| fix.latitude), Some(3.0));
    }
}
