//! Generic screen-scan harvester.
//!
//! Waits until the call has been ringing for the scan delay so that dialers
//! and caller-ID overlays have drawn their caller information, then harvests
//! text from every visible window and runs the keyword decision on it.

use super::{ScreenReader, ScreenTextHarvester, TextCollector};
use crate::config::Config;
use crate::coordinator::ScreeningCoordinator;
use crate::decision::decide_in_order;
use crate::timer::TaskSlot;
use crate::types::{BlockContext, SurfaceChanged, Verdict};
use screening_store::KeywordSet;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, info};

pub const SOURCE: &str = "screen_scan";

pub struct ScreenScanHarvester {
    inner: Arc<ScanState>,
}

struct ScanState {
    coordinator: Arc<ScreeningCoordinator>,
    reader: Arc<dyn ScreenReader>,
    collector: TextCollector,
    keywords: RwLock<KeywordSet>,
    scan_delay: Duration,
    ceiling: Duration,
    pending: TaskSlot,
}

impl ScreenScanHarvester {
    pub fn new(
        coordinator: Arc<ScreeningCoordinator>,
        reader: Arc<dyn ScreenReader>,
        config: &Config,
    ) -> Self {
        Self {
            inner: Arc::new(ScanState {
                coordinator,
                reader,
                collector: TextCollector::new(config.general.own_package.clone(), &config.harvest),
                keywords: RwLock::new(KeywordSet::new()),
                scan_delay: config.timing.scan_delay(),
                ceiling: config.timing.ceiling(),
                pending: TaskSlot::new(),
            }),
        }
    }

    /// Whether a deferred scan is waiting to run
    pub fn has_pending_scan(&self) -> bool {
        self.inner.pending.is_pending()
    }
}

impl ScanState {
    fn scan(&self) {
        if !self.coordinator.lifecycle().is_screening() {
            debug!("Screen scan cancelled, call state changed");
            return;
        }

        info!("Starting screen scan for caller information");
        let harvested = self.collector.harvest(self.reader.as_ref());
        if harvested.is_empty() {
            // Not a verdict; the watchdog allows the call at the ceiling
            debug!("No screen text harvested yet");
            return;
        }

        let verdict = {
            let keywords = self
                .keywords
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            decide_in_order(harvested.groups(), &keywords)
        };

        let context = match &verdict {
            Verdict::Spam {
                matched_keyword,
                matched_text,
            } => BlockContext::keyword_match(matched_keyword, matched_text),
            Verdict::Clean => {
                debug!("No spam keywords found in screen text");
                BlockContext::default()
            }
        };
        self.coordinator.apply(SOURCE, verdict, context);
    }
}

#[async_trait::async_trait]
impl ScreenTextHarvester for ScreenScanHarvester {
    fn name(&self) -> &'static str {
        SOURCE
    }

    async fn on_call_started(&self, keywords: &KeywordSet) {
        self.inner.pending.cancel();
        *self
            .inner
            .keywords
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = keywords.clone();
    }

    async fn on_surface_changed(&self, event: &SurfaceChanged) {
        let lifecycle = self.inner.coordinator.lifecycle();
        if !lifecycle.is_screening() {
            return;
        }

        let elapsed = lifecycle.elapsed();
        if elapsed > self.inner.ceiling {
            info!("Maximum wait reached, allowing call");
            self.inner.coordinator.fail_open(SOURCE);
            return;
        }

        debug!(
            "Window event from {}, call duration {:?}",
            event.source_package, elapsed
        );

        if elapsed < self.inner.scan_delay {
            let delay = self.inner.scan_delay - elapsed;
            let state = Arc::clone(&self.inner);
            self.inner.pending.replace(delay, async move {
                state.scan();
            });
            debug!("Scheduled screen scan in {:?}", delay);
        } else {
            self.inner.pending.cancel();
            self.inner.scan();
        }
    }

    fn cancel_pending(&self) {
        self.inner.pending.cancel();
    }
}
