//! Keyword decision engine.

use crate::noise::is_noise_text;
use crate::types::Verdict;
use screening_store::KeywordSet;
use std::collections::HashSet;
use tracing::debug;

/// Decide whether harvested text identifies a spam caller.
///
/// First match wins. Which text/keyword pair is reported when several match
/// depends on iteration order; whether the result is `Spam` does not.
pub fn decide(candidates: &HashSet<String>, keywords: &KeywordSet) -> Verdict {
    if keywords.is_empty() {
        debug!("No keywords configured, call is clean");
        return Verdict::Clean;
    }

    for text in candidates {
        if is_noise_text(text) {
            continue;
        }

        debug!("Checking text: '{}'", text);
        if let Some(keyword) = keywords.first_match(text) {
            return Verdict::Spam {
                matched_keyword: keyword.to_string(),
                matched_text: text.clone(),
            };
        }
    }

    Verdict::Clean
}

/// Decide over candidate groups in priority order.
///
/// A match in an earlier group is reported before any match in a later one.
pub fn decide_in_order<'a, I>(groups: I, keywords: &KeywordSet) -> Verdict
where
    I: IntoIterator<Item = &'a HashSet<String>>,
{
    for group in groups {
        let verdict = decide(group, keywords);
        if verdict.is_spam() {
            return verdict;
        }
    }
    Verdict::Clean
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn texts(items: &[&str]) -> HashSet<String> {
        items.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_spam_match() {
        let keywords: KeywordSet = ["spam", "telemarketer"].into_iter().collect();
        let verdict = decide(&texts(&["Incoming call", "SPAM LIKELY", "+1 234-567-890"]), &keywords);
        assert_eq!(
            verdict,
            Verdict::Spam {
                matched_keyword: "spam".to_string(),
                matched_text: "SPAM LIKELY".to_string(),
            }
        );
    }

    #[test]
    fn test_clean_when_nothing_matches() {
        let keywords: KeywordSet = ["spam", "telemarketer"].into_iter().collect();
        assert_eq!(decide(&texts(&["John Smith", "Mobile"]), &keywords), Verdict::Clean);
    }

    #[test]
    fn test_empty_inputs_are_clean() {
        let keywords: KeywordSet = ["spam"].into_iter().collect();
        assert_eq!(decide(&HashSet::new(), &keywords), Verdict::Clean);
        assert_eq!(decide(&texts(&["SPAM LIKELY"]), &KeywordSet::new()), Verdict::Clean);
    }

    #[test]
    fn test_noise_never_matches() {
        // "call" is a keyword but every candidate is chrome
        let keywords: KeywordSet = ["call", "55", "spam blocker"].into_iter().collect();
        let verdict = decide(&texts(&["Call", "End call", "555-0100", "Spam Blocker"]), &keywords);
        assert_eq!(verdict, Verdict::Clean);
    }

    #[test]
    fn test_keyword_inside_longer_text() {
        let keywords: KeywordSet = ["warranty"].into_iter().collect();
        let verdict = decide(&texts(&["Auto Warranty Dept."]), &keywords);
        assert!(verdict.is_spam());
    }

    #[test]
    fn test_earlier_group_wins() {
        let keywords: KeywordSet = ["spam", "promo"].into_iter().collect();
        let dialer = texts(&["SPAM LIKELY"]);
        let notification = texts(&["Weekend promo inside"]);

        assert_eq!(
            decide_in_order([&dialer, &notification], &keywords),
            Verdict::Spam {
                matched_keyword: "spam".to_string(),
                matched_text: "SPAM LIKELY".to_string(),
            }
        );
        assert_eq!(
            decide_in_order([&texts(&["John Smith"]), &notification], &keywords),
            Verdict::Spam {
                matched_keyword: "promo".to_string(),
                matched_text: "Weekend promo inside".to_string(),
            }
        );
        assert_eq!(decide_in_order([&texts(&["John Smith"])], &keywords), Verdict::Clean);
    }

    proptest! {
        #[test]
        fn prop_spam_iff_some_clean_text_contains_a_keyword(
            keywords in proptest::collection::vec("[a-zA-Z]{1,6}", 0..4),
            candidates in proptest::collection::hash_set("[a-zA-Z0-9 ]{0,12}", 0..6),
        ) {
            let keyword_set: KeywordSet = keywords.iter().collect();
            let expected = candidates.iter().any(|text| {
                !is_noise_text(text)
                    && keyword_set.iter().any(|kw| text.to_lowercase().contains(kw))
            });

            let verdict = decide(&candidates, &keyword_set);
            prop_assert_eq!(verdict.is_spam(), expected);

            if let Verdict::Spam { matched_keyword, matched_text } = verdict {
                prop_assert!(candidates.contains(&matched_text));
                prop_assert!(matched_text.to_lowercase().contains(&matched_keyword));
            }
        }
    }
}
