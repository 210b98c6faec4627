//! Ringer silencing and restoration.
//!
//! The ringer mode is captured once when a call starts ringing, the device is
//! silenced while the screen is harvested, and the captured mode decides what
//! the ringer goes back to when the call turns out to be legitimate.

use crate::types::{DeviceError, RingerMode};
use std::sync::Mutex;
use tracing::{debug, info, warn};

/// Platform ringer control
pub trait RingerDevice: Send + Sync {
    fn ringer_mode(&self) -> Result<RingerMode, DeviceError>;

    fn set_ringer_mode(&self, mode: RingerMode) -> Result<(), DeviceError>;

    /// Whether the app may change the ringer (do-not-disturb policy access)
    fn has_policy_access(&self) -> bool;
}

/// Mode to return to after screening a call that rang in `previous`
pub fn restore_target(previous: RingerMode) -> RingerMode {
    match previous {
        RingerMode::Silent => RingerMode::Silent,
        RingerMode::Vibrate => RingerMode::Vibrate,
        RingerMode::Normal => RingerMode::Normal,
    }
}

/// Owns the per-call ringer snapshot
pub struct RingerController<D: RingerDevice + ?Sized> {
    device: std::sync::Arc<D>,
    snapshot: Mutex<Option<RingerMode>>,
}

impl<D: RingerDevice + ?Sized> RingerController<D> {
    pub fn new(device: std::sync::Arc<D>) -> Self {
        Self {
            device,
            snapshot: Mutex::new(None),
        }
    }

    fn snapshot_slot(&self) -> std::sync::MutexGuard<'_, Option<RingerMode>> {
        self.snapshot
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Remember the current mode and silence the ringer.
    ///
    /// Failures are logged; the call is still screened.
    pub fn silence(&self) {
        if !self.device.has_policy_access() {
            warn!("No ringer policy access, cannot silence ringer");
            return;
        }

        let previous = match self.device.ringer_mode() {
            Ok(mode) => mode,
            Err(e) => {
                warn!("Failed to read ringer mode: {}", e);
                return;
            }
        };
        *self.snapshot_slot() = Some(previous);
        debug!("Saved ringer mode: {}", previous.as_str());

        match self.device.set_ringer_mode(RingerMode::Silent) {
            Ok(()) => info!("Ringer silenced"),
            Err(e) => warn!("Failed to silence ringer: {}", e),
        }
    }

    /// Put the ringer back according to the captured snapshot.
    ///
    /// Does nothing if no snapshot was taken for this call.
    pub fn restore(&self) {
        let previous = match *self.snapshot_slot() {
            Some(mode) => mode,
            None => {
                debug!("No saved ringer mode, leaving ringer untouched");
                return;
            }
        };

        let target = restore_target(previous);
        match self.device.set_ringer_mode(target) {
            Ok(()) => info!("Ringer restored to {}", target.as_str()),
            Err(e) => warn!("Failed to restore ringer: {}", e),
        }
    }

    /// Forget the snapshot at the end of a call
    pub fn discard(&self) {
        self.snapshot_slot().take();
    }

    pub fn saved_mode(&self) -> Option<RingerMode> {
        *self.snapshot_slot()
    }

    pub fn has_policy_access(&self) -> bool {
        self.device.has_policy_access()
    }
}
