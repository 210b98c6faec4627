//! Caller-ID app harvester.
//!
//! Watches a single caller-ID app and takes the first plausible caller name it
//! shows. A found name and the ceiling are its only two exits, each producing
//! one decision.

use super::{ScreenReader, ScreenTextHarvester, MAX_RECURSION_DEPTH};
use crate::config::Config;
use crate::coordinator::ScreeningCoordinator;
use crate::decision::decide;
use crate::noise::{is_call_control_label, is_phone_shaped};
use crate::timer::TaskSlot;
use crate::types::{BlockContext, SurfaceChanged, UiNode, Verdict};
use screening_store::KeywordSet;
use std::collections::HashSet;
use std::sync::{Arc, RwLock};
use std::time::Duration;
use tracing::{debug, info};

pub const SOURCE: &str = "caller_id";

/// Whether `text` could be the caller's name rather than app chrome
fn is_plausible_name(text: &str, vendor_name: &str, vendor_package: &str) -> bool {
    text.chars().count() > 2
        && !text.eq_ignore_ascii_case(vendor_name)
        && !text.eq_ignore_ascii_case(vendor_package)
        && !is_phone_shaped(text)
        && !is_call_control_label(text)
}

/// First plausible caller name under `node`, depth-first, text before label
pub fn find_caller_name(
    node: &UiNode,
    vendor_name: &str,
    vendor_package: &str,
    max_depth: usize,
) -> Option<String> {
    find_recursive(node, vendor_name, vendor_package, max_depth, 0)
}

fn find_recursive(
    node: &UiNode,
    vendor_name: &str,
    vendor_package: &str,
    max_depth: usize,
    depth: usize,
) -> Option<String> {
    if depth > max_depth {
        return None;
    }

    for value in [&node.text, &node.content_description].into_iter().flatten() {
        let trimmed = value.trim();
        if is_plausible_name(trimmed, vendor_name, vendor_package) {
            debug!("Found potential caller name: {}", trimmed);
            return Some(trimmed.to_string());
        }
    }

    node.children
        .iter()
        .find_map(|child| find_recursive(child, vendor_name, vendor_package, max_depth, depth + 1))
}

pub struct CallerIdHarvester {
    inner: Arc<CallerIdState>,
}

struct CallerIdState {
    coordinator: Arc<ScreeningCoordinator>,
    reader: Arc<dyn ScreenReader>,
    vendor_package: String,
    vendor_name: String,
    ceiling: Duration,
    max_depth: usize,
    keywords: RwLock<KeywordSet>,
    timeout: TaskSlot,
}

impl CallerIdHarvester {
    pub fn new(
        coordinator: Arc<ScreeningCoordinator>,
        reader: Arc<dyn ScreenReader>,
        config: &Config,
    ) -> Self {
        Self {
            inner: Arc::new(CallerIdState {
                coordinator,
                reader,
                vendor_package: config.harvest.vendor_package.clone(),
                vendor_name: config.harvest.vendor_name.clone(),
                ceiling: config.timing.vendor_ceiling(),
                max_depth: config.harvest.max_depth.min(MAX_RECURSION_DEPTH),
                keywords: RwLock::new(KeywordSet::new()),
                timeout: TaskSlot::new(),
            }),
        }
    }

    /// Whether a timeout check is waiting to run
    pub fn has_pending_timeout(&self) -> bool {
        self.inner.timeout.is_pending()
    }
}

impl CallerIdState {
    fn extract_caller_name(&self, event: &SurfaceChanged) -> Option<String> {
        let find = |root: &UiNode| {
            find_caller_name(root, &self.vendor_name, &self.vendor_package, self.max_depth)
        };

        match &event.source {
            Some(source) => find(source),
            None => self
                .reader
                .windows()
                .iter()
                .filter(|window| window.package == self.vendor_package)
                .filter_map(|window| window.root.as_ref())
                .find_map(find),
        }
    }

    fn process_caller_name(&self, caller_name: &str) {
        info!("Processing caller name: {}", caller_name);
        self.timeout.cancel();

        let verdict = {
            let keywords = self
                .keywords
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            let candidates: HashSet<String> = [caller_name.to_string()].into_iter().collect();
            decide(&candidates, &keywords)
        };

        // No reason is synthesized for caller-ID matches
        let context = match verdict {
            Verdict::Spam { .. } => BlockContext::caller_only(caller_name),
            Verdict::Clean => BlockContext::default(),
        };
        self.coordinator.apply(SOURCE, verdict, context);
    }
}

#[async_trait::async_trait]
impl ScreenTextHarvester for CallerIdHarvester {
    fn name(&self) -> &'static str {
        SOURCE
    }

    async fn on_call_started(&self, keywords: &KeywordSet) {
        self.inner.timeout.cancel();
        *self
            .inner
            .keywords
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = keywords.clone();
    }

    async fn on_surface_changed(&self, event: &SurfaceChanged) {
        if event.source_package != self.inner.vendor_package {
            return;
        }

        let lifecycle = self.inner.coordinator.lifecycle();
        if !lifecycle.is_screening() {
            return;
        }

        let elapsed = lifecycle.elapsed();
        if elapsed > self.inner.ceiling {
            info!("Timeout reached without finding caller name, allowing call");
            self.inner.coordinator.fail_open(SOURCE);
            return;
        }

        debug!("{} window event detected", self.inner.vendor_name);
        if let Some(caller_name) = self.inner.extract_caller_name(event) {
            self.inner.process_caller_name(&caller_name);
            return;
        }

        let remaining = match self.inner.ceiling.checked_sub(elapsed) {
            Some(remaining) if !remaining.is_zero() => remaining,
            _ => return,
        };
        let state = Arc::clone(&self.inner);
        self.inner.timeout.replace(remaining, async move {
            if state.coordinator.lifecycle().is_screening() {
                info!("Timeout reached, no caller name found, allowing call");
                state.coordinator.fail_open(SOURCE);
            }
        });
        debug!("Scheduled timeout check in {:?}", remaining);
    }

    fn cancel_pending(&self) {
        self.inner.timeout.cancel();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::fake::{FakeTerminator, RecordingSink};
    use crate::harvest::fake::FakeScreen;
    use crate::lifecycle::CallLifecycle;
    use crate::ringer::fake::FakeRinger;
    use crate::types::{RingerMode, UiWindow};

    const VENDOR: &str = "com.truecaller";

    fn overlay(caller: &str) -> UiNode {
        UiNode::new(VENDOR)
            .with_description("Truecaller")
            .with_child(UiNode::new(VENDOR).with_text("Incoming call"))
            .with_child(UiNode::new(VENDOR).with_text("+1 (234) 567-890"))
            .with_child(UiNode::new(VENDOR).with_text(caller))
            .with_child(UiNode::new(VENDOR).with_text("Decline"))
    }

    fn event_with(source: UiNode) -> SurfaceChanged {
        SurfaceChanged {
            source_package: VENDOR.to_string(),
            source: Some(source),
        }
    }

    #[test]
    fn test_find_caller_name_skips_chrome() {
        let name = find_caller_name(&overlay("SPAM LIKELY"), "truecaller", VENDOR, 100);
        assert_eq!(name.as_deref(), Some("SPAM LIKELY"));
    }

    #[test]
    fn test_find_caller_name_requires_three_chars() {
        let node = UiNode::new(VENDOR)
            .with_text("Al")
            .with_child(UiNode::new(VENDOR).with_description("Bob Jones"));
        let name = find_caller_name(&node, "truecaller", VENDOR, 100);
        assert_eq!(name.as_deref(), Some("Bob Jones"));
    }

    #[test]
    fn test_find_caller_name_none_when_only_chrome() {
        let node = UiNode::new(VENDOR)
            .with_text("TRUECALLER")
            .with_child(UiNode::new(VENDOR).with_text("12345678"))
            .with_child(UiNode::new(VENDOR).with_text("Answer"));
        assert_eq!(find_caller_name(&node, "truecaller", VENDOR, 100), None);
    }

    struct Harness {
        lifecycle: Arc<CallLifecycle>,
        ringer: Arc<FakeRinger>,
        terminator: Arc<FakeTerminator>,
        sink: Arc<RecordingSink>,
        screen: Arc<FakeScreen>,
        harvester: CallerIdHarvester,
    }

    async fn ringing_call() -> Harness {
        let config = Config::default();
        let lifecycle = Arc::new(CallLifecycle::new());
        let ringer = Arc::new(FakeRinger::new(RingerMode::Normal));
        let terminator = Arc::new(FakeTerminator::default());
        let sink = Arc::new(RecordingSink::default());
        let coordinator = Arc::new(ScreeningCoordinator::new(
            Arc::clone(&lifecycle),
            ringer.clone(),
            Box::new(Arc::clone(&terminator)),
            sink.clone(),
            config.timing.ceiling(),
        ));
        let screen = Arc::new(FakeScreen::default());
        let harvester = CallerIdHarvester::new(Arc::clone(&coordinator), screen.clone(), &config);

        lifecycle.begin(Some("+1234567890".to_string()));
        coordinator.ringer().silence();
        let keywords: KeywordSet = ["spam", "telemarketer"].into_iter().collect();
        harvester.on_call_started(&keywords).await;

        Harness {
            lifecycle,
            ringer,
            terminator,
            sink,
            screen,
            harvester,
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_other_packages_are_ignored() {
        let h = ringing_call().await;
        let mut event = event_with(overlay("SPAM LIKELY"));
        event.source_package = "com.google.android.dialer".to_string();

        h.harvester.on_surface_changed(&event).await;
        assert!(h.lifecycle.is_screening());
        assert!(!h.harvester.has_pending_timeout());
    }

    #[tokio::test(start_paused = true)]
    async fn test_spam_name_ends_call_without_reason() {
        let h = ringing_call().await;
        h.harvester.on_surface_changed(&event_with(overlay("SPAM LIKELY"))).await;

        assert_eq!(h.terminator.ended(), 1);
        assert_eq!(
            h.sink.records(),
            vec![("+1234567890".to_string(), String::new(), "SPAM LIKELY".to_string())]
        );
        assert_eq!(h.ringer.current(), RingerMode::Silent);
    }

    #[tokio::test(start_paused = true)]
    async fn test_legitimate_name_restores_ringer() {
        let h = ringing_call().await;
        h.harvester.on_surface_changed(&event_with(overlay("Jane Doe"))).await;

        assert!(h.lifecycle.verdict_reached());
        assert_eq!(h.terminator.ended(), 0);
        assert_eq!(h.ringer.current(), RingerMode::Normal);
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_name_fails_open_at_vendor_ceiling() {
        let h = ringing_call().await;
        tokio::time::advance(Duration::from_secs(2)).await;
        h.harvester
            .on_surface_changed(&event_with(UiNode::new(VENDOR).with_text("Truecaller")))
            .await;
        assert!(h.harvester.has_pending_timeout());

        tokio::time::sleep(Duration::from_millis(3999)).await;
        assert!(h.lifecycle.is_screening());

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert!(h.lifecycle.verdict_reached());
        assert_eq!(h.ringer.current(), RingerMode::Normal);
        assert_eq!(h.terminator.ended(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_name_found_cancels_timeout() {
        let h = ringing_call().await;
        h.harvester
            .on_surface_changed(&event_with(UiNode::new(VENDOR).with_text("Truecaller")))
            .await;
        h.harvester.on_surface_changed(&event_with(overlay("ACME Telemarketer"))).await;
        assert!(!h.harvester.has_pending_timeout());
        assert_eq!(h.terminator.ended(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reads_vendor_windows_without_source() {
        let h = ringing_call().await;
        *h.screen.windows.lock().unwrap() = vec![
            UiWindow::new("com.whatsapp", UiNode::new("com.whatsapp").with_text("Spam group chat")),
            UiWindow::new(VENDOR, overlay("Jane Doe")),
        ];

        h.harvester.on_surface_changed(&SurfaceChanged::new(VENDOR)).await;
        assert!(h.lifecycle.verdict_reached());
        assert_eq!(h.terminator.ended(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_event_past_ceiling_fails_open() {
        let h = ringing_call().await;
        tokio::time::advance(Duration::from_millis(6001)).await;

        h.harvester.on_surface_changed(&event_with(overlay("SPAM LIKELY"))).await;
        assert_eq!(h.terminator.ended(), 0);
        assert_eq!(h.ringer.current(), RingerMode::Normal);
    }
}
