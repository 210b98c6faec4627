//! Screen text harvesting.
//!
//! Harvesters watch accessibility notifications while a call is ringing and
//! pull caller information out of other applications' node trees:
//! - Screen scan: generic text from every visible window after a short delay
//! - Caller ID: the caller name shown by one specific caller-ID app

pub mod caller_id;
pub mod screen_scan;

use crate::config::HarvestConfig;
use crate::types::{SurfaceChanged, UiNode, UiWindow};
use screening_store::KeywordSet;
use std::collections::HashSet;
use tracing::{debug, warn};

/// Maximum node tree depth walked per window
pub const MAX_RECURSION_DEPTH: usize = 100;

/// Read access to the platform's accessibility trees
pub trait ScreenReader: Send + Sync {
    /// Every visible window surface
    fn windows(&self) -> Vec<UiWindow>;

    /// Root of the active window, used when no window list is available
    fn active_root(&self) -> Option<UiNode>;
}

/// A producer of screening verdicts driven by screen changes
#[async_trait::async_trait]
pub trait ScreenTextHarvester: Send + Sync {
    fn name(&self) -> &'static str;

    /// A new call started ringing; `keywords` is the list in force for it
    async fn on_call_started(&self, keywords: &KeywordSet);

    /// A window-state or window-content change was observed
    async fn on_surface_changed(&self, event: &SurfaceChanged);

    /// Drop any deferred work for the current call
    fn cancel_pending(&self);
}

/// Collect trimmed text and labels longer than one character from `root`.
///
/// Subtrees owned by `own_package` are skipped, and the walk stops below
/// `max_depth`.
pub fn collect_text(root: &UiNode, own_package: &str, max_depth: usize) -> HashSet<String> {
    let mut collected = HashSet::new();
    collect_recursive(root, own_package, max_depth, 0, &mut collected);
    collected
}

fn collect_recursive(
    node: &UiNode,
    own_package: &str,
    max_depth: usize,
    depth: usize,
    collected: &mut HashSet<String>,
) {
    if depth > max_depth {
        warn!("Maximum recursion depth reached at depth {}", depth);
        return;
    }

    if node.package == own_package {
        return;
    }

    for value in [&node.text, &node.content_description].into_iter().flatten() {
        let trimmed = value.trim();
        if trimmed.chars().count() > 1 {
            collected.insert(trimmed.to_string());
        }
    }

    for child in &node.children {
        collect_recursive(child, own_package, max_depth, depth + 1, collected);
    }
}

/// Text from one harvest pass, grouped by how likely it is to name the caller
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HarvestedText {
    /// Text from dialer, in-call and caller-ID windows
    pub call_apps: HashSet<String>,
    /// Text from every other window
    pub other: HashSet<String>,
}

impl HarvestedText {
    pub fn is_empty(&self) -> bool {
        self.call_apps.is_empty() && self.other.is_empty()
    }

    pub fn len(&self) -> usize {
        self.call_apps.len() + self.other.len()
    }

    /// Groups in the order they are matched against keywords
    pub fn groups(&self) -> [&HashSet<String>; 2] {
        [&self.call_apps, &self.other]
    }
}

/// Walks window trees, keeping call-app text apart from the rest
pub struct TextCollector {
    own_package: String,
    max_depth: usize,
    call_app_patterns: Vec<glob::Pattern>,
}

impl TextCollector {
    pub fn new(own_package: impl Into<String>, config: &HarvestConfig) -> Self {
        let call_app_patterns = config
            .call_app_packages
            .iter()
            .filter_map(|pattern| {
                glob::Pattern::new(pattern)
                    .map_err(|e| {
                        warn!("Invalid call app pattern '{}': {}", pattern, e);
                        e
                    })
                    .ok()
            })
            .collect();

        Self {
            own_package: own_package.into(),
            max_depth: config.max_depth.min(MAX_RECURSION_DEPTH),
            call_app_patterns,
        }
    }

    pub fn own_package(&self) -> &str {
        &self.own_package
    }

    /// Whether windows of `package` are likely to carry caller information
    pub fn is_call_app(&self, package: &str) -> bool {
        self.call_app_patterns
            .iter()
            .any(|pattern| pattern.matches(package))
    }

    /// Harvest text from every visible window, grouped call apps first.
    ///
    /// Falls back to the active window's root when the windows yield nothing.
    pub fn harvest(&self, reader: &dyn ScreenReader) -> HarvestedText {
        let windows = reader.windows();
        let mut harvested = HarvestedText::default();
        let mut call_app_windows = 0;

        for window in &windows {
            let root = match &window.root {
                Some(root) => root,
                None => continue,
            };
            if self.is_call_app(&window.package) {
                call_app_windows += 1;
                harvested.call_apps.extend(self.collect(root));
            } else {
                harvested.other.extend(self.collect(root));
            }
        }

        if harvested.is_empty() {
            if let Some(root) = reader.active_root() {
                debug!("No text in window list, falling back to active window");
                if self.is_call_app(&root.package) {
                    harvested.call_apps = self.collect(&root);
                } else {
                    harvested.other = self.collect(&root);
                }
            }
        }

        debug!(
            "Harvested {} text elements from {} windows ({} call apps)",
            harvested.len(),
            windows.len(),
            call_app_windows
        );
        harvested
    }

    pub fn collect(&self, root: &UiNode) -> HashSet<String> {
        collect_text(root, &self.own_package, self.max_depth)
    }
}
