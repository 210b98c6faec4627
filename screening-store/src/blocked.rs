//! Blocked call history.
//!
//! Each blocked call is stored as one pipe-delimited member of a string set:
//! `phoneNumber|timestamp|reason|callerInfo`.

use crate::storage::{SetStore, StorageError};
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Namespace the history is stored under
pub const BLOCKED_NAMESPACE: &str = "BlockedNumbersPrefs";

/// Set key holding the encoded records
pub const KEY_BLOCKED_NUMBERS: &str = "blocked_numbers";

/// One blocked call
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedNumber {
    pub phone_number: String,
    /// Milliseconds since the Unix epoch
    pub timestamp: i64,
    pub reason: String,
    pub caller_info: String,
}

impl BlockedNumber {
    pub fn new(
        phone_number: impl Into<String>,
        timestamp: i64,
        reason: impl Into<String>,
        caller_info: impl Into<String>,
    ) -> Self {
        Self {
            phone_number: phone_number.into(),
            timestamp,
            reason: reason.into(),
            caller_info: caller_info.into(),
        }
    }

    /// Encode as `phoneNumber|timestamp|reason|callerInfo`
    pub fn to_storage_string(&self) -> String {
        format!(
            "{}|{}|{}|{}",
            self.phone_number, self.timestamp, self.reason, self.caller_info
        )
    }

    /// Decode a stored record. A corrupted timestamp decodes to "now".
    pub fn from_storage_string(encoded: &str) -> Option<Self> {
        Self::decode(encoded, || Utc::now().timestamp_millis())
    }

    fn decode(encoded: &str, now_ms: impl FnOnce() -> i64) -> Option<Self> {
        if encoded.is_empty() {
            return None;
        }

        let parts: Vec<&str> = encoded.splitn(4, '|').collect();
        if parts.len() < 3 {
            return None;
        }

        let timestamp = match parts[1].parse::<i64>() {
            Ok(ts) => ts,
            Err(_) => {
                warn!("Malformed timestamp '{}' in blocked record, using now", parts[1]);
                now_ms()
            }
        };

        Some(Self {
            phone_number: parts[0].to_string(),
            timestamp,
            reason: parts[2].to_string(),
            caller_info: parts.get(3).map(|s| s.to_string()).unwrap_or_default(),
        })
    }

    /// Timestamp as a UTC date, if it is in range
    pub fn blocked_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_millis_opt(self.timestamp).single()
    }
}

/// Append-only history of blocked calls
pub struct BlockLog {
    store: Box<dyn SetStore>,
}

impl BlockLog {
    pub fn new(store: Box<dyn SetStore>) -> Self {
        Self { store }
    }

    /// Record a blocked call at the current time.
    ///
    /// Returns `None` without writing when the phone number is blank.
    pub fn append(
        &mut self,
        phone_number: &str,
        reason: &str,
        caller_info: &str,
    ) -> Result<Option<BlockedNumber>, StorageError> {
        let phone_number = phone_number.trim();
        if phone_number.is_empty() {
            warn!("Cannot add blocked number: phone number is empty");
            return Ok(None);
        }

        let record = BlockedNumber::new(
            phone_number,
            Utc::now().timestamp_millis(),
            reason,
            caller_info,
        );
        self.append_record(&record)?;
        debug!("Added blocked number: {} (reason: {})", phone_number, reason);
        Ok(Some(record))
    }

    /// Store a fully-formed record; returns false if an identical one exists
    pub fn append_record(&mut self, record: &BlockedNumber) -> Result<bool, StorageError> {
        self.store
            .insert(KEY_BLOCKED_NUMBERS, &record.to_storage_string())
    }

    /// All records, most recent first
    pub fn list(&self) -> Result<Vec<BlockedNumber>, StorageError> {
        let mut records: Vec<BlockedNumber> = self
            .store
            .members(KEY_BLOCKED_NUMBERS)?
            .iter()
            .filter_map(|encoded| BlockedNumber::from_storage_string(encoded))
            .collect();

        records.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        Ok(records)
    }

    /// Number of stored entries
    pub fn count(&self) -> Result<usize, StorageError> {
        self.store.count(KEY_BLOCKED_NUMBERS)
    }

    /// Whether this exact number has been blocked before
    pub fn is_blocked(&self, phone_number: &str) -> Result<bool, StorageError> {
        Ok(!self.for_number(phone_number)?.is_empty())
    }

    /// All records for one number, most recent first
    pub fn for_number(&self, phone_number: &str) -> Result<Vec<BlockedNumber>, StorageError> {
        if phone_number.trim().is_empty() {
            return Ok(Vec::new());
        }
        Ok(self
            .list()?
            .into_iter()
            .filter(|record| record.phone_number == phone_number)
            .collect())
    }

    pub fn remove(&mut self, record: &BlockedNumber) -> Result<bool, StorageError> {
        let removed = self
            .store
            .remove(KEY_BLOCKED_NUMBERS, &record.to_storage_string())?;
        debug!("Removed blocked number: {}", record.phone_number);
        Ok(removed)
    }

    pub fn clear(&mut self) -> Result<(), StorageError> {
        self.store.clear(KEY_BLOCKED_NUMBERS)?;
        debug!("Cleared all blocked numbers history");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{MemorySetStore, SqliteSetStore};
    use pretty_assertions::assert_eq;
    use proptest::prelude::*;

    fn memory_log() -> BlockLog {
        BlockLog::new(Box::new(MemorySetStore::new()))
    }

    #[test]
    fn test_storage_string_round_trip() {
        let record = BlockedNumber::new("+1234567890", 1_700_000_000_000, "Keyword match: spam", "SPAM LIKELY");
        let encoded = record.to_storage_string();
        assert_eq!(encoded, "+1234567890|1700000000000|Keyword match: spam|SPAM LIKELY");
        assert_eq!(BlockedNumber::from_storage_string(&encoded), Some(record));
    }

    #[test]
    fn test_corrupted_timestamp_decodes_to_now() {
        let decoded = BlockedNumber::decode("+1234567890|not-a-number|Keyword match: spam|SPAM LIKELY", || 42)
            .unwrap();
        assert_eq!(
            decoded,
            BlockedNumber::new("+1234567890", 42, "Keyword match: spam", "SPAM LIKELY")
        );

        let before = Utc::now().timestamp_millis();
        let decoded = BlockedNumber::from_storage_string("+1|garbage|r|c").unwrap();
        assert!(decoded.timestamp >= before);
    }

    #[test]
    fn test_missing_fields_default_to_empty() {
        let decoded = BlockedNumber::from_storage_string("+1|5|").unwrap();
        assert_eq!(decoded.reason, "");
        assert_eq!(decoded.caller_info, "");

        let decoded = BlockedNumber::from_storage_string("+1|5|reason").unwrap();
        assert_eq!(decoded.reason, "reason");
        assert_eq!(decoded.caller_info, "");
    }

    #[test]
    fn test_caller_info_keeps_extra_pipes() {
        let decoded = BlockedNumber::from_storage_string("+1|5|r|Acme | Sales").unwrap();
        assert_eq!(decoded.caller_info, "Acme | Sales");
    }

    #[test]
    fn test_rejects_short_records() {
        assert_eq!(BlockedNumber::from_storage_string(""), None);
        assert_eq!(BlockedNumber::from_storage_string("+1"), None);
        assert_eq!(BlockedNumber::from_storage_string("+1|5"), None);
    }

    #[test]
    fn test_append_skips_blank_number() {
        let mut log = memory_log();
        assert_eq!(log.append("   ", "Keyword match: spam", "SPAM").unwrap(), None);
        assert_eq!(log.count().unwrap(), 0);
    }

    #[test]
    fn test_list_sorted_most_recent_first() {
        let mut log = memory_log();
        log.append_record(&BlockedNumber::new("+5555555555", 100, "Keyword match: promo", "Promo"))
            .unwrap();
        log.append_record(&BlockedNumber::new("+1234567890", 300, "Keyword match: spam", "SPAM LIKELY"))
            .unwrap();
        log.append_record(&BlockedNumber::new("+9876543210", 200, "Keyword match: telemarketer", "Telemarketer"))
            .unwrap();

        let numbers: Vec<String> = log.list().unwrap().into_iter().map(|r| r.phone_number).collect();
        assert_eq!(numbers, vec!["+1234567890", "+9876543210", "+5555555555"]);
        assert_eq!(log.count().unwrap(), 3);
    }

    #[test]
    fn test_is_blocked_and_for_number() {
        let mut log = memory_log();
        log.append(" +1234567890 ", "Keyword match: spam", "SPAM LIKELY").unwrap();
        log.append_record(&BlockedNumber::new("+1234567890", 1, "", "")).unwrap();

        assert!(log.is_blocked("+1234567890").unwrap());
        assert!(!log.is_blocked("+1999").unwrap());
        assert!(!log.is_blocked("").unwrap());
        assert_eq!(log.for_number("+1234567890").unwrap().len(), 2);
    }

    #[test]
    fn test_remove_and_clear() {
        let mut log = BlockLog::new(Box::new(SqliteSetStore::open_in_memory(BLOCKED_NAMESPACE).unwrap()));
        let first = BlockedNumber::new("+1", 1, "r", "c");
        let second = BlockedNumber::new("+2", 2, "r", "c");
        log.append_record(&first).unwrap();
        log.append_record(&second).unwrap();

        assert!(log.remove(&first).unwrap());
        assert!(!log.remove(&first).unwrap());
        assert_eq!(log.list().unwrap(), vec![second]);

        log.clear().unwrap();
        assert_eq!(log.count().unwrap(), 0);
        log.clear().unwrap();
        assert_eq!(log.count().unwrap(), 0);
    }

    #[test]
    fn test_blocked_at() {
        let record = BlockedNumber::new("+1", 1_700_000_000_000, "", "");
        assert_eq!(record.blocked_at().unwrap().timestamp(), 1_700_000_000);
    }

    proptest! {
        #[test]
        fn prop_pipe_free_records_survive_encoding(
            number in "\\+?[0-9]{3,15}",
            timestamp in 0i64..4_000_000_000_000,
            reason in "[^|]{0,24}",
            caller_info in ".{0,24}",
        ) {
            let record = BlockedNumber::new(number, timestamp, reason, caller_info);
            let decoded = BlockedNumber::from_storage_string(&record.to_storage_string());
            prop_assert_eq!(decoded, Some(record));
        }
    }
}
