//! Ending the active call.
//!
//! Newer platforms expose a graceful telecom call to end a call; older ones
//! only offer a privileged telephony entry point. The strategy is picked once
//! at startup from the platform's API level.

use crate::types::DeviceError;
use std::sync::Arc;
use tracing::{info, warn};

/// First API level with a supported telecom end-call method
pub const TELECOM_END_CALL_MIN_API: u32 = 28;

/// Platform call-control surface
pub trait CallControl: Send + Sync {
    fn api_level(&self) -> u32;

    /// Graceful end-call. Returns whether the platform accepted the request.
    fn telecom_end_call(&self) -> Result<bool, DeviceError>;

    /// Privileged end-call used where the telecom one is unavailable
    fn telephony_end_call(&self) -> Result<(), DeviceError>;
}

/// Ends the active call
pub trait CallTerminator: Send + Sync {
    fn name(&self) -> &'static str;

    fn end_active_call(&self) -> Result<(), DeviceError>;
}

/// Graceful termination through the telecom service
pub struct TelecomTerminator {
    control: Arc<dyn CallControl>,
}

impl TelecomTerminator {
    pub fn new(control: Arc<dyn CallControl>) -> Self {
        Self { control }
    }
}

impl CallTerminator for TelecomTerminator {
    fn name(&self) -> &'static str {
        "telecom"
    }

    fn end_active_call(&self) -> Result<(), DeviceError> {
        if self.control.telecom_end_call()? {
            info!("Call ended via telecom service");
            Ok(())
        } else {
            Err(DeviceError::Failed(
                "telecom service rejected end-call request".to_string(),
            ))
        }
    }
}

/// Fallback through the privileged telephony entry point
pub struct LegacyTelephonyTerminator {
    control: Arc<dyn CallControl>,
}

impl LegacyTelephonyTerminator {
    pub fn new(control: Arc<dyn CallControl>) -> Self {
        Self { control }
    }
}

impl CallTerminator for LegacyTelephonyTerminator {
    fn name(&self) -> &'static str {
        "legacy-telephony"
    }

    fn end_active_call(&self) -> Result<(), DeviceError> {
        self.control.telephony_end_call()?;
        info!("Call ended via telephony fallback");
        Ok(())
    }
}

/// Pick the termination strategy for this platform
pub fn select_terminator(control: Arc<dyn CallControl>) -> Box<dyn CallTerminator> {
    let api_level = control.api_level();
    if api_level >= TELECOM_END_CALL_MIN_API {
        Box::new(TelecomTerminator::new(control))
    } else {
        warn!(
            "API level {} has no telecom end-call, using telephony fallback",
            api_level
        );
        Box::new(LegacyTelephonyTerminator::new(control))
    }
}
