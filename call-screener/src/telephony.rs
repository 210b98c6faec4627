//! Telephony event handling.
//!
//! Turns ringing and idle signals into lifecycle transitions: a new ringing
//! call silences the ringer, arms the watchdog and hands the current keyword
//! list to the harvesters; the phone going idle always ends the session.

use crate::coordinator::ScreeningCoordinator;
use crate::harvest::ScreenTextHarvester;
use crate::types::TelephonyEvent;
use screening_store::{KeywordSet, KeywordStore};
use std::sync::{Arc, Mutex};
use tracing::{debug, info, warn};

pub struct TelephonyAdapter {
    coordinator: Arc<ScreeningCoordinator>,
    harvesters: Vec<Arc<dyn ScreenTextHarvester>>,
    keywords: Arc<Mutex<KeywordStore>>,
}

impl TelephonyAdapter {
    pub fn new(
        coordinator: Arc<ScreeningCoordinator>,
        harvesters: Vec<Arc<dyn ScreenTextHarvester>>,
        keywords: Arc<Mutex<KeywordStore>>,
    ) -> Self {
        Self {
            coordinator,
            harvesters,
            keywords,
        }
    }

    /// Map a raw platform phone state to an event.
    ///
    /// Only ringing and idle matter; off-hook and unknown states map to `None`.
    pub fn parse_phone_state(state: &str, number: Option<&str>) -> Option<TelephonyEvent> {
        match state.trim().to_ascii_uppercase().as_str() {
            "RINGING" => Some(TelephonyEvent::RingingStarted {
                number: number.map(str::to_string),
            }),
            "IDLE" => Some(TelephonyEvent::CallEnded),
            other => {
                debug!("Ignoring phone state {}", other);
                None
            }
        }
    }

    pub async fn handle(&self, event: TelephonyEvent) {
        match event {
            TelephonyEvent::RingingStarted { number } => self.on_ringing(number).await,
            TelephonyEvent::CallEnded => self.on_idle(),
        }
    }

    async fn on_ringing(&self, number: Option<String>) {
        let number = number
            .map(|n| n.trim().to_string())
            .filter(|n| !n.is_empty());

        if !self.coordinator.lifecycle().begin(number.clone()) {
            return;
        }
        info!(
            "Incoming call from {}, muting ringer",
            number.as_deref().unwrap_or("unknown number")
        );

        self.coordinator.call_started();

        let keywords = self.load_keywords();
        for harvester in &self.harvesters {
            harvester.on_call_started(&keywords).await;
        }
    }

    fn on_idle(&self) {
        // The gate must be shut before cleanup; a scan already running loses it
        if !self.coordinator.lifecycle().reset() {
            return;
        }

        info!("Call ended, restoring ringer");
        for harvester in &self.harvesters {
            harvester.cancel_pending();
        }
        self.coordinator.call_ended();
    }

    /// Re-read the keyword list so edits made since the last call apply
    fn load_keywords(&self) -> KeywordSet {
        let mut store = self
            .keywords
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Err(e) = store.reload() {
            warn!("Failed to reload keywords, using cached list: {}", e);
        }
        store.keyword_set()
    }
}
