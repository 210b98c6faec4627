//! Blocked keyword list.
//!
//! Keywords are normalized on write (trimmed, lower-cased) and matched as
//! case-insensitive substrings on read.

use crate::storage::{SetStore, StorageError};
use std::collections::BTreeSet;
use tracing::debug;

/// Namespace the keyword list is stored under
pub const KEYWORDS_NAMESPACE: &str = "SpamBlockerPrefs";

/// Set key holding the keywords
pub const KEY_KEYWORDS: &str = "blocked_keywords";

/// A normalized set of keywords.
///
/// Enumeration is sorted for display; matching does not depend on order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeywordSet {
    keywords: BTreeSet<String>,
}

impl KeywordSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Normalize a raw keyword, rejecting blank input
    pub fn normalize(raw: &str) -> Option<String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_lowercase())
        }
    }

    /// Insert a keyword; returns false for blank or duplicate input
    pub fn insert(&mut self, raw: &str) -> bool {
        match Self::normalize(raw) {
            Some(keyword) => self.keywords.insert(keyword),
            None => false,
        }
    }

    pub fn remove(&mut self, raw: &str) -> bool {
        match Self::normalize(raw) {
            Some(keyword) => self.keywords.remove(&keyword),
            None => false,
        }
    }

    pub fn contains(&self, raw: &str) -> bool {
        Self::normalize(raw)
            .map(|keyword| self.keywords.contains(&keyword))
            .unwrap_or(false)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.keywords.iter().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.keywords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keywords.is_empty()
    }

    /// First keyword contained in `text`, ignoring case
    pub fn first_match(&self, text: &str) -> Option<&str> {
        if text.is_empty() {
            return None;
        }
        let lower = text.to_lowercase();
        self.iter().find(|keyword| lower.contains(keyword))
    }

    /// Whether any keyword is contained in `text`, ignoring case
    pub fn matches(&self, text: &str) -> bool {
        self.first_match(text).is_some()
    }
}

impl<S: AsRef<str>> FromIterator<S> for KeywordSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = KeywordSet::new();
        for raw in iter {
            set.insert(raw.as_ref());
        }
        set
    }
}

/// Persistent keyword list
pub struct KeywordStore {
    store: Box<dyn SetStore>,
    keywords: KeywordSet,
}

impl KeywordStore {
    /// Load the keyword list from the given store
    pub fn open(store: Box<dyn SetStore>) -> Result<Self, StorageError> {
        let mut keyword_store = Self {
            store,
            keywords: KeywordSet::new(),
        };
        keyword_store.reload()?;
        Ok(keyword_store)
    }

    /// Re-read the keyword list from storage
    pub fn reload(&mut self) -> Result<(), StorageError> {
        let members = self.store.members(KEY_KEYWORDS)?;
        self.keywords = members.iter().collect();
        debug!("Loaded {} keywords", self.keywords.len());
        Ok(())
    }

    /// Add a keyword; blank input is ignored
    pub fn add(&mut self, raw: &str) -> Result<bool, StorageError> {
        let keyword = match KeywordSet::normalize(raw) {
            Some(k) => k,
            None => return Ok(false),
        };
        self.store.insert(KEY_KEYWORDS, &keyword)?;
        let added = self.keywords.insert(&keyword);
        debug!("Added keyword '{}'", keyword);
        Ok(added)
    }

    pub fn remove(&mut self, raw: &str) -> Result<bool, StorageError> {
        let keyword = match KeywordSet::normalize(raw) {
            Some(k) => k,
            None => return Ok(false),
        };
        self.store.remove(KEY_KEYWORDS, &keyword)?;
        let removed = self.keywords.remove(&keyword);
        debug!("Removed keyword '{}'", keyword);
        Ok(removed)
    }

    /// Keywords in display order
    pub fn list(&self) -> Vec<String> {
        self.keywords.iter().map(str::to_string).collect()
    }

    pub fn matches(&self, text: &str) -> bool {
        self.keywords.matches(text)
    }

    /// Snapshot of the current keywords
    pub fn keyword_set(&self) -> KeywordSet {
        self.keywords.clone()
    }
}
