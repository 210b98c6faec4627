//! Screening coordinator.
//!
//! Every verdict producer (both harvesters and the fail-open watchdog) goes
//! through [`ScreeningCoordinator::apply`]. Only the producer that wins the
//! lifecycle's verdict gate gets to act, so each call sees exactly one
//! terminal action: restore the ringer, or record the call and end it.

use crate::call_control::CallTerminator;
use crate::lifecycle::CallLifecycle;
use crate::ringer::{RingerController, RingerDevice};
use crate::timer::TaskSlot;
use crate::types::{BlockContext, RingerMode, Verdict};
use screening_store::{BlockLog, StorageError};
use serde::Serialize;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Source name used when the ceiling expires without any verdict
pub const WATCHDOG_SOURCE: &str = "watchdog";

/// Destination for blocked-call records
pub trait BlockSink: Send + Sync {
    /// Returns whether a new record was stored
    fn record(&self, phone_number: &str, reason: &str, caller_info: &str) -> Result<bool, StorageError>;
}

impl BlockSink for Mutex<BlockLog> {
    fn record(&self, phone_number: &str, reason: &str, caller_info: &str) -> Result<bool, StorageError> {
        let mut log = self.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        Ok(log.append(phone_number, reason, caller_info)?.is_some())
    }
}

/// Diagnostics snapshot
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScreeningStatus {
    pub screening: bool,
    pub verdict_reached: bool,
    pub elapsed_ms: u64,
    pub calling_number: Option<String>,
    pub saved_ringer_mode: Option<RingerMode>,
    pub policy_access: bool,
    pub terminator: String,
}

pub struct ScreeningCoordinator {
    lifecycle: Arc<CallLifecycle>,
    ringer: RingerController<dyn RingerDevice>,
    terminator: Box<dyn CallTerminator>,
    block_sink: Arc<dyn BlockSink>,
    watchdog: TaskSlot,
    ceiling: Duration,
}

impl ScreeningCoordinator {
    pub fn new(
        lifecycle: Arc<CallLifecycle>,
        ringer: Arc<dyn RingerDevice>,
        terminator: Box<dyn CallTerminator>,
        block_sink: Arc<dyn BlockSink>,
        ceiling: Duration,
    ) -> Self {
        Self {
            lifecycle,
            ringer: RingerController::new(ringer),
            terminator,
            block_sink,
            watchdog: TaskSlot::new(),
            ceiling,
        }
    }

    pub fn lifecycle(&self) -> &Arc<CallLifecycle> {
        &self.lifecycle
    }

    pub fn ringer(&self) -> &RingerController<dyn RingerDevice> {
        &self.ringer
    }

    /// Silence the ringer and arm the fail-open watchdog for a new call
    pub fn call_started(self: &Arc<Self>) {
        self.ringer.silence();

        let coordinator = Arc::clone(self);
        self.watchdog.replace(self.ceiling, async move {
            if coordinator.lifecycle.is_screening() {
                warn!("No verdict within {:?}, allowing call", coordinator.ceiling);
            }
            coordinator.fail_open(WATCHDOG_SOURCE);
        });
        debug!("Watchdog armed for {:?}", self.ceiling);
    }

    /// Put the ringer back once the call is over, whatever the verdict was
    pub fn call_ended(&self) {
        self.watchdog.cancel();
        self.ringer.restore();
        self.ringer.discard();
    }

    /// Apply `verdict` if no other producer has decided this call yet.
    ///
    /// Returns whether this call performed the terminal action.
    pub fn apply(&self, source: &str, verdict: Verdict, context: BlockContext) -> bool {
        let claim = match self.lifecycle.mark_verdict_reached() {
            Some(claim) => claim,
            None => {
                debug!("[{}] Verdict already reached, ignoring {:?}", source, verdict);
                return false;
            }
        };
        self.watchdog.cancel();

        match verdict {
            Verdict::Spam {
                matched_keyword,
                matched_text,
            } => {
                info!(
                    "[{}] SPAM DETECTED in '{}' (keyword: '{}') after {:?}",
                    source, matched_text, matched_keyword, claim.elapsed
                );
                self.record_block(claim.calling_number.as_deref(), &context);
                // The ringer stays silenced whether or not the call is ended
                if let Err(e) = self.terminator.end_active_call() {
                    error!("[{}] Failed to end call via {}: {}", source, self.terminator.name(), e);
                }
            }
            Verdict::Clean => {
                info!("[{}] Caller allowed after {:?}", source, claim.elapsed);
                self.ringer.restore();
            }
        }
        true
    }

    /// Allow the call, if nobody has decided it yet
    pub fn fail_open(&self, source: &str) -> bool {
        self.apply(source, Verdict::Clean, BlockContext::default())
    }

    fn record_block(&self, calling_number: Option<&str>, context: &BlockContext) {
        let number = match calling_number.map(str::trim).filter(|n| !n.is_empty()) {
            Some(number) => number,
            None => {
                warn!("Calling number unknown, blocked call not recorded");
                return;
            }
        };

        let reason = context.reason.as_deref().unwrap_or_default();
        let caller_info = context.caller_info.as_deref().unwrap_or_default();
        match self.block_sink.record(number, reason, caller_info) {
            Ok(_) => info!("Recorded blocked call from {}", number),
            Err(e) => error!("Failed to record blocked call from {}: {}", number, e),
        }
    }

    pub fn status(&self) -> ScreeningStatus {
        let session = self.lifecycle.snapshot();
        ScreeningStatus {
            screening: session.incoming && !session.verdict_reached,
            verdict_reached: session.verdict_reached,
            elapsed_ms: self.lifecycle.elapsed().as_millis() as u64,
            calling_number: session.calling_number,
            saved_ringer_mode: self.ringer.saved_mode(),
            policy_access: self.ringer.has_policy_access(),
            terminator: self.terminator.name().to_string(),
        }
    }

    pub fn terminator_name(&self) -> &'static str {
        self.terminator.name()
    }
}
