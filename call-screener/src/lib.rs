//! Call Screener - Real-time incoming call screening
//!
//! This crate screens incoming calls from the caller information other apps
//! put on screen:
//!
//! - **Telephony**: Ringing silences the device and starts a screening session
//! - **Harvesters**: A generic screen scan and a caller-ID app scanner race to
//!   find caller text within a short time budget
//! - **Decision**: Harvested text is matched against the user's keywords
//!
//! # Architecture
//!
//! All producers share one call lifecycle. Its verdict gate lets exactly one
//! of them act per call: end the call and record it, or restore the ringer.
//! If nobody decides before the ceiling, a watchdog allows the call.

pub mod call_control;
pub mod config;
pub mod coordinator;
pub mod decision;
pub mod diagnostics;
pub mod harvest;
pub mod lifecycle;
pub mod noise;
pub mod replay;
pub mod ringer;
pub mod service;
pub mod telephony;
pub mod timer;
pub mod types;

// Re-export commonly used types
pub use call_control::{select_terminator, CallControl, CallTerminator};
pub use config::Config;
pub use coordinator::{BlockSink, ScreeningCoordinator, ScreeningStatus};
pub use decision::{decide, decide_in_order};
pub use diagnostics::DiagnosticsReport;
pub use harvest::{collect_text, HarvestedText, ScreenReader, ScreenTextHarvester};
pub use lifecycle::{CallLifecycle, CallPhase, CallSession};
pub use noise::is_noise_text;
pub use replay::{ReplayDevice, ReplayStep};
pub use ringer::{RingerController, RingerDevice};
pub use service::{DeviceEvent, Platform, ScreeningService};
pub use telephony::TelephonyAdapter;
pub use types::{
    BlockContext, DeviceError, RingerMode, ScreenerError, SurfaceChanged, TelephonyEvent,
    UiNode, UiWindow, Verdict,
};
