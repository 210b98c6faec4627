//! Core types used throughout the call screener.
//!
//! This module defines the signals the engine consumes (telephony and
//! accessibility notifications), the accessibility node tree, the verdict the
//! decision engine produces and the error types of the platform boundary.

use screening_store::StorageError;
use serde::{Deserialize, Serialize};

/// Device ringer mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RingerMode {
    Silent,
    Vibrate,
    Normal,
}

impl RingerMode {
    pub const ALL: [RingerMode; 3] = [RingerMode::Silent, RingerMode::Vibrate, RingerMode::Normal];

    pub fn as_str(&self) -> &'static str {
        match self {
            RingerMode::Silent => "silent",
            RingerMode::Vibrate => "vibrate",
            RingerMode::Normal => "normal",
        }
    }
}

/// Phone-state signals meaningful to the screening core
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TelephonyEvent {
    /// The phone started ringing; the number may be withheld
    RingingStarted { number: Option<String> },
    /// The phone returned to idle
    CallEnded,
}

/// One node of another application's accessibility tree
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiNode {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_description: Option<String>,
    /// Package owning this node
    #[serde(default)]
    pub package: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<UiNode>,
}

impl UiNode {
    pub fn new(package: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            ..Default::default()
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.content_description = Some(description.into());
        self
    }

    pub fn with_child(mut self, child: UiNode) -> Self {
        self.children.push(child);
        self
    }
}

/// A visible window surface and its node tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UiWindow {
    /// Package owning the window
    pub package: String,
    #[serde(default)]
    pub root: Option<UiNode>,
}

impl UiWindow {
    pub fn new(package: impl Into<String>, root: UiNode) -> Self {
        Self {
            package: package.into(),
            root: Some(root),
        }
    }
}

/// A window-state or window-content change notification
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SurfaceChanged {
    pub source_package: String,
    /// The node the change originated from, when the platform provides it
    #[serde(default)]
    pub source: Option<UiNode>,
}

impl SurfaceChanged {
    pub fn new(source_package: impl Into<String>) -> Self {
        Self {
            source_package: source_package.into(),
            source: None,
        }
    }
}

/// Terminal decision for one ringing call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    Spam {
        matched_keyword: String,
        matched_text: String,
    },
    Clean,
}

impl Verdict {
    pub fn is_spam(&self) -> bool {
        matches!(self, Verdict::Spam { .. })
    }
}

/// What a harvester knows about a match, for the block history
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BlockContext {
    pub reason: Option<String>,
    pub caller_info: Option<String>,
}

impl BlockContext {
    /// Context for a keyword hit found in generic screen text
    pub fn keyword_match(keyword: &str, matched_text: &str) -> Self {
        Self {
            reason: Some(format!("Keyword match: {}", keyword)),
            caller_info: Some(matched_text.to_string()),
        }
    }

    /// Context carrying only the caller name, without a synthesized reason
    pub fn caller_only(caller_info: &str) -> Self {
        Self {
            reason: None,
            caller_info: Some(caller_info.to_string()),
        }
    }
}

/// Errors surfaced by device/platform calls
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeviceError {
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    #[error("Unsupported on this platform: {0}")]
    Unsupported(String),

    #[error("Device call failed: {0}")]
    Failed(String),
}

/// Errors of the screener outside the platform boundary
#[derive(Debug, thiserror::Error)]
pub enum ScreenerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Invalid event: {0}")]
    Event(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
