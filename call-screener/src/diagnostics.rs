//! Self-check report for the `status` command.

use crate::call_control::{select_terminator, CallControl};
use crate::ringer::RingerDevice;
use screening_store::{BlockLog, KeywordStore, StorageError};
use serde::Serialize;
use std::fmt::Write;
use std::sync::Arc;

/// Numbers checked against the block history in every report
pub const SAMPLE_NUMBERS: &[&str] = &["+1234567890", "+9876543210", "+5555555555"];

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DiagnosticsReport {
    pub policy_access: bool,
    pub api_level: u32,
    pub terminator: String,
    pub keywords: Vec<String>,
    pub blocked_count: usize,
    pub sample_numbers: Vec<(String, bool)>,
}

impl DiagnosticsReport {
    pub fn collect(
        ringer: &dyn RingerDevice,
        call_control: Arc<dyn CallControl>,
        keywords: &KeywordStore,
        block_log: &BlockLog,
    ) -> Result<Self, StorageError> {
        let sample_numbers = SAMPLE_NUMBERS
            .iter()
            .map(|number| Ok((number.to_string(), block_log.is_blocked(number)?)))
            .collect::<Result<Vec<_>, StorageError>>()?;

        Ok(Self {
            policy_access: ringer.has_policy_access(),
            api_level: call_control.api_level(),
            terminator: select_terminator(call_control).name().to_string(),
            keywords: keywords.list(),
            blocked_count: block_log.count()?,
            sample_numbers,
        })
    }

    pub fn render(&self) -> String {
        let mark = |ok: bool, yes: &str, no: &str| {
            if ok {
                format!("✓ {}", yes)
            } else {
                format!("✗ {}", no)
            }
        };

        let mut out = String::new();
        let _ = writeln!(out, "=== Call Screener Self-Check ===\n");
        let _ = writeln!(out, "Device:");
        let _ = writeln!(
            out,
            "- Ringer policy access: {}",
            mark(self.policy_access, "Granted", "Missing")
        );
        let _ = writeln!(
            out,
            "- Call termination: {} (API level {})\n",
            self.terminator, self.api_level
        );

        let _ = writeln!(out, "Keywords ({}):", self.keywords.len());
        for keyword in &self.keywords {
            let _ = writeln!(out, "- {}", keyword);
        }

        let _ = writeln!(out, "\nBlocked Numbers History ({}):", self.blocked_count);
        for (number, blocked) in &self.sample_numbers {
            let state = if *blocked { "✓ Blocked" } else { "○ Not blocked" };
            let _ = writeln!(out, "- {}: {}", number, state);
        }
        out
    }
}
