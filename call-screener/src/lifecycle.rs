//! Shared call lifecycle state.
//!
//! One `CallLifecycle` is shared (behind an `Arc`) by the telephony adapter,
//! both screen harvesters and the coordinator. Every read and every
//! read-modify-write goes through the same mutex, so the verdict gate in
//! [`CallLifecycle::mark_verdict_reached`] is the single point that decides
//! which racing producer gets to act on a call.

use std::sync::{Mutex, MutexGuard};
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info};

/// Where the current call is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallPhase {
    Idle,
    /// Ringing, no verdict yet
    Ringing,
    /// Ringing, verdict applied
    Resolved,
}

/// The one live call session
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallSession {
    pub incoming: bool,
    pub verdict_reached: bool,
    pub started_at: Option<Instant>,
    pub calling_number: Option<String>,
}

impl CallSession {
    pub fn phase(&self) -> CallPhase {
        match (self.incoming, self.verdict_reached) {
            (false, _) => CallPhase::Idle,
            (true, false) => CallPhase::Ringing,
            (true, true) => CallPhase::Resolved,
        }
    }

    fn elapsed(&self) -> Duration {
        self.started_at
            .map(|started| started.elapsed())
            .unwrap_or(Duration::ZERO)
    }
}

/// Handed to the single winner of the verdict gate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerdictClaim {
    pub calling_number: Option<String>,
    pub elapsed: Duration,
}

/// Monitor around the current [`CallSession`]
#[derive(Debug, Default)]
pub struct CallLifecycle {
    session: Mutex<CallSession>,
}

impl CallLifecycle {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, CallSession> {
        // Every critical section leaves the session consistent, so a panic
        // elsewhere never leaves it half-written.
        self.session
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Start screening a new ringing call.
    ///
    /// Returns false when a call is already in progress: the timer is kept,
    /// and a number is only filled in if none was known yet.
    pub fn begin(&self, number: Option<String>) -> bool {
        let mut session = self.lock();
        if session.incoming {
            if session.calling_number.is_none() && number.is_some() {
                session.calling_number = number;
            }
            debug!("Ringing signal for a call already being screened, ignoring");
            return false;
        }

        *session = CallSession {
            incoming: true,
            verdict_reached: false,
            started_at: Some(Instant::now()),
            calling_number: number,
        };
        info!("Call incoming, timer started");
        true
    }

    /// Claim the right to apply the verdict for the current call.
    ///
    /// Returns `Some` to exactly one caller per session; everyone else
    /// (late scanners, timeouts, idle phone) gets `None`.
    pub fn mark_verdict_reached(&self) -> Option<VerdictClaim> {
        let mut session = self.lock();
        if !session.incoming || session.verdict_reached {
            return None;
        }
        session.verdict_reached = true;
        debug!("Verdict reached after {:?}", session.elapsed());
        Some(VerdictClaim {
            calling_number: session.calling_number.clone(),
            elapsed: session.elapsed(),
        })
    }

    /// A call is ringing and nobody has decided on it yet
    pub fn is_screening(&self) -> bool {
        self.lock().phase() == CallPhase::Ringing
    }

    pub fn is_incoming(&self) -> bool {
        self.lock().incoming
    }

    pub fn verdict_reached(&self) -> bool {
        self.lock().verdict_reached
    }

    /// Time since ringing started, zero when idle
    pub fn elapsed(&self) -> Duration {
        self.lock().elapsed()
    }

    pub fn calling_number(&self) -> Option<String> {
        self.lock().calling_number.clone()
    }

    pub fn phase(&self) -> CallPhase {
        self.lock().phase()
    }

    /// Copy of the current session
    pub fn snapshot(&self) -> CallSession {
        self.lock().clone()
    }

    /// Return to idle. Returns whether a call was in progress.
    pub fn reset(&self) -> bool {
        let mut session = self.lock();
        let was_active = session.incoming;
        *session = CallSession::default();
        if was_active {
            info!("Call state reset");
        }
        was_active
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_idle_by_default() {
        let lifecycle = CallLifecycle::new();
        assert_eq!(lifecycle.phase(), CallPhase::Idle);
        assert_eq!(lifecycle.elapsed(), Duration::ZERO);
        assert!(!lifecycle.is_screening());
        assert!(lifecycle.mark_verdict_reached().is_none());
    }

    #[test]
    fn test_begin_then_verdict_then_reset() {
        let lifecycle = CallLifecycle::new();
        assert!(lifecycle.begin(Some("+1234567890".to_string())));
        assert_eq!(lifecycle.phase(), CallPhase::Ringing);
        assert!(lifecycle.is_screening());

        let claim = lifecycle.mark_verdict_reached().unwrap();
        assert_eq!(claim.calling_number.as_deref(), Some("+1234567890"));
        assert_eq!(lifecycle.phase(), CallPhase::Resolved);
        assert!(!lifecycle.is_screening());
        assert!(lifecycle.mark_verdict_reached().is_none());

        assert!(lifecycle.reset());
        assert_eq!(lifecycle.snapshot(), CallSession::default());
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_begin_keeps_timer() {
        let lifecycle = CallLifecycle::new();
        assert!(lifecycle.begin(None));
        tokio::time::advance(Duration::from_secs(3)).await;

        assert!(!lifecycle.begin(Some("+1555".to_string())));
        assert!(lifecycle.elapsed() >= Duration::from_secs(3));
        assert_eq!(lifecycle.calling_number().as_deref(), Some("+1555"));

        assert!(!lifecycle.begin(Some("+1999".to_string())));
        assert_eq!(lifecycle.calling_number().as_deref(), Some("+1555"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_elapsed_tracks_ring_start() {
        let lifecycle = CallLifecycle::new();
        lifecycle.begin(None);
        tokio::time::advance(Duration::from_millis(7500)).await;
        assert_eq!(lifecycle.elapsed(), Duration::from_millis(7500));

        lifecycle.reset();
        assert_eq!(lifecycle.elapsed(), Duration::ZERO);
    }

    #[test]
    fn test_reset_is_idempotent() {
        let lifecycle = CallLifecycle::new();
        lifecycle.begin(Some("+1".to_string()));
        lifecycle.mark_verdict_reached();

        assert!(lifecycle.reset());
        let once = lifecycle.snapshot();
        assert!(!lifecycle.reset());
        assert_eq!(lifecycle.snapshot(), once);

        let fresh = CallLifecycle::new();
        assert!(!fresh.reset());
        assert_eq!(fresh.snapshot(), once);
    }

    #[test]
    fn test_verdict_gate_has_single_winner_under_contention() {
        let lifecycle = Arc::new(CallLifecycle::new());
        lifecycle.begin(Some("+1234567890".to_string()));
        let winners = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let lifecycle = Arc::clone(&lifecycle);
                let winners = Arc::clone(&winners);
                std::thread::spawn(move || {
                    if lifecycle.mark_verdict_reached().is_some() {
                        winners.fetch_add(1, Ordering::SeqCst);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(winners.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_new_call_after_reset_reopens_gate() {
        let lifecycle = CallLifecycle::new();
        lifecycle.begin(None);
        assert!(lifecycle.mark_verdict_reached().is_some());
        lifecycle.reset();

        assert!(lifecycle.begin(None));
        assert!(!lifecycle.verdict_reached());
        assert!(lifecycle.mark_verdict_reached().is_some());
    }
}
