//! Scripted device for the screening daemon.
//!
//! The daemon reads device events as JSON lines, one per line:
//!
//! ```text
//! {"event":"ringer","mode":"vibrate"}
//! {"event":"ringing","number":"+1234567890"}
//! {"event":"phone_state","state":"IDLE"}
//! {"event":"screen","package":"com.truecaller","windows":[...],"source":{...}}
//! {"event":"wait","ms":6000}
//! {"event":"ended"}
//! ```
//!
//! Blank lines and lines starting with `#` are skipped.

use crate::call_control::CallControl;
use crate::harvest::ScreenReader;
use crate::ringer::RingerDevice;
use crate::service::{DeviceEvent, ScreeningService};
use crate::telephony::TelephonyAdapter;
use crate::types::{DeviceError, RingerMode, ScreenerError, SurfaceChanged, TelephonyEvent, UiNode, UiWindow};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::{debug, info, warn};

/// One scripted step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ReplayStep {
    /// Set the device ringer mode, e.g. before a call
    Ringer { mode: RingerMode },
    Ringing {
        #[serde(default)]
        number: Option<String>,
    },
    /// Replace the visible windows and emit a surface change
    Screen {
        package: String,
        #[serde(default)]
        windows: Vec<UiWindow>,
        #[serde(default)]
        source: Option<UiNode>,
    },
    Ended,
    /// A raw platform phone state such as `RINGING`, `OFFHOOK` or `IDLE`
    PhoneState {
        state: String,
        #[serde(default)]
        number: Option<String>,
    },
    Wait { ms: u64 },
}

/// Parse one script line; `None` for blank lines and comments
pub fn parse_step(line: &str) -> Result<Option<ReplayStep>, ScreenerError> {
    let line = line.trim();
    if line.is_empty() || line.starts_with('#') {
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(line)?))
}

/// In-memory device driven by a script
#[derive(Debug)]
pub struct ReplayDevice {
    ringer_mode: Mutex<RingerMode>,
    policy_access: bool,
    api_level: u32,
    windows: Mutex<Vec<UiWindow>>,
    ended_calls: AtomicUsize,
}

impl ReplayDevice {
    pub fn new(api_level: u32) -> Self {
        Self {
            ringer_mode: Mutex::new(RingerMode::Normal),
            policy_access: true,
            api_level,
            windows: Mutex::new(Vec::new()),
            ended_calls: AtomicUsize::new(0),
        }
    }

    pub fn without_policy_access(mut self) -> Self {
        self.policy_access = false;
        self
    }

    pub fn set_windows(&self, windows: Vec<UiWindow>) {
        *self.windows.lock().unwrap_or_else(|p| p.into_inner()) = windows;
    }

    /// Number of calls the engine has ended
    pub fn ended_calls(&self) -> usize {
        self.ended_calls.load(Ordering::SeqCst)
    }

    pub fn current_ringer_mode(&self) -> RingerMode {
        *self.ringer_mode.lock().unwrap_or_else(|p| p.into_inner())
    }

    fn write_ringer_mode(&self, mode: RingerMode) {
        *self.ringer_mode.lock().unwrap_or_else(|p| p.into_inner()) = mode;
    }
}

impl RingerDevice for ReplayDevice {
    fn ringer_mode(&self) -> Result<RingerMode, DeviceError> {
        Ok(self.current_ringer_mode())
    }

    fn set_ringer_mode(&self, mode: RingerMode) -> Result<(), DeviceError> {
        if !self.policy_access {
            return Err(DeviceError::PermissionDenied(
                "notification policy access".to_string(),
            ));
        }
        self.write_ringer_mode(mode);
        Ok(())
    }

    fn has_policy_access(&self) -> bool {
        self.policy_access
    }
}

impl CallControl for ReplayDevice {
    fn api_level(&self) -> u32 {
        self.api_level
    }

    fn telecom_end_call(&self) -> Result<bool, DeviceError> {
        if self.api_level < crate::call_control::TELECOM_END_CALL_MIN_API {
            return Err(DeviceError::Unsupported(format!(
                "telecom end-call on API level {}",
                self.api_level
            )));
        }
        self.ended_calls.fetch_add(1, Ordering::SeqCst);
        Ok(true)
    }

    fn telephony_end_call(&self) -> Result<(), DeviceError> {
        self.ended_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

impl ScreenReader for ReplayDevice {
    fn windows(&self) -> Vec<UiWindow> {
        self.windows.lock().unwrap_or_else(|p| p.into_inner()).clone()
    }

    fn active_root(&self) -> Option<UiNode> {
        self.windows().into_iter().rev().find_map(|window| window.root)
    }
}

/// Counts from one replay run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReplaySummary {
    pub steps: usize,
    pub skipped_lines: usize,
    pub calls: usize,
}

/// Apply one step to the device and the service
pub async fn apply_step(service: &ScreeningService, device: &ReplayDevice, step: ReplayStep) {
    match step {
        ReplayStep::Ringer { mode } => {
            debug!("Device ringer set to {}", mode.as_str());
            device.write_ringer_mode(mode);
        }
        ReplayStep::Ringing { number } => {
            service
                .handle(DeviceEvent::Telephony(TelephonyEvent::RingingStarted { number }))
                .await;
        }
        ReplayStep::Screen {
            package,
            windows,
            source,
        } => {
            device.set_windows(windows);
            service
                .handle(DeviceEvent::Surface(SurfaceChanged {
                    source_package: package,
                    source,
                }))
                .await;
        }
        ReplayStep::Ended => {
            service
                .handle(DeviceEvent::Telephony(TelephonyEvent::CallEnded))
                .await;
        }
        ReplayStep::PhoneState { state, number } => {
            if let Some(event) = TelephonyAdapter::parse_phone_state(&state, number.as_deref()) {
                service.handle(DeviceEvent::Telephony(event)).await;
            }
        }
        ReplayStep::Wait { ms } => tokio::time::sleep(Duration::from_millis(ms)).await,
    }
}

/// Drive `service` from a JSON-lines script until the input ends
pub async fn replay<R>(
    service: &ScreeningService,
    device: &ReplayDevice,
    input: R,
) -> Result<ReplaySummary, ScreenerError>
where
    R: AsyncBufRead + Unpin,
{
    let mut summary = ReplaySummary::default();
    let mut lines = input.lines();
    let mut line_no = 0usize;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        let step = match parse_step(&line) {
            Ok(Some(step)) => step,
            Ok(None) => continue,
            Err(e) => {
                warn!("Skipping malformed line {}: {}", line_no, e);
                summary.skipped_lines += 1;
                continue;
            }
        };

        let rings = match &step {
            ReplayStep::Ringing { .. } => true,
            ReplayStep::PhoneState { state, .. } => state.trim().eq_ignore_ascii_case("RINGING"),
            _ => false,
        };
        if rings {
            summary.calls += 1;
        }
        summary.steps += 1;
        apply_step(service, device, step).await;
    }

    info!(
        "Replay finished: {} steps, {} calls, {} ended",
        summary.steps,
        summary.calls,
        device.ended_calls()
    );
    Ok(summary)
}
