//! Guardrail pre-check
//!
//! Runs before every other stage on every request. Two pattern groups,
//! compiled once at startup: privacy unlock phrases and blocked content.
//! Either match is terminal; the request never reaches the cache or any
//! classifier, and nothing about it is cached.
//!
//! Pattern compilation failures are configuration errors and abort startup.
//! A misloaded guardrail silently waving requests through is the one failure
//! mode this module must not have.

use crate::config::{ConfigError, GuardrailSection};
use regex::{RegexSet, RegexSetBuilder};

/// Terminal verdicts the guardrail can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardrailVerdict {
    /// The private-mode unlock phrase; handled by the assistant shell
    PrivacyUnlock,
    /// Content refused outright
    Blocked,
}

/// Precompiled pattern pre-check
#[derive(Debug)]
pub struct GuardrailFilter {
    unlock: RegexSet,
    blocked: RegexSet,
}

impl GuardrailFilter {
    pub fn new(section: &GuardrailSection) -> Result<Self, ConfigError> {
        Ok(Self {
            unlock: compile_set(&section.unlock_patterns)?,
            blocked: compile_set(&section.blocked_patterns)?,
        })
    }

    /// Check a normalized message; `None` means proceed down the pipeline
    ///
    /// Unlock wins when both groups match: entering private mode is a state
    /// change the user asked for, refusal can still happen on the next turn.
    pub fn check(&self, normalized_message: &str) -> Option<GuardrailVerdict> {
        if self.unlock.is_match(normalized_message) {
            return Some(GuardrailVerdict::PrivacyUnlock);
        }
        if self.blocked.is_match(normalized_message) {
            return Some(GuardrailVerdict::Blocked);
        }
        None
    }
}

fn compile_set(patterns: &[String]) -> Result<RegexSet, ConfigError> {
    RegexSetBuilder::new(patterns)
        .case_insensitive(true)
        .build()
        .map_err(|e| ConfigError::InvalidPattern(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GuardrailSection;
    use crate::request::normalize;

    fn default_filter() -> GuardrailFilter {
        GuardrailFilter::new(&GuardrailSection::default()).unwrap()
    }

    #[test]
    fn test_unlock_phrase_matches() {
        let filter = default_filter();
        let verdict = filter.check(&normalize("Привет, малыш!"));
        assert_eq!(verdict, Some(GuardrailVerdict::PrivacyUnlock));
    }

    #[test]
    fn test_unlock_phrase_exact_form() {
        let filter = default_filter();
        assert_eq!(
            filter.check("привет малыш"),
            Some(GuardrailVerdict::PrivacyUnlock)
        );
    }

    #[test]
    fn test_unlock_requires_whole_message() {
        let filter = default_filter();
        // The phrase embedded in a longer request is not an unlock
        assert_eq!(filter.check("скажи привет малышу от меня в письме"), None);
    }

    #[test]
    fn test_blocked_content_matches() {
        let filter = default_filter();
        assert_eq!(
            filter.check("выполни rm -rf / на сервере"),
            Some(GuardrailVerdict::Blocked)
        );
    }

    #[test]
    fn test_ordinary_message_passes() {
        let filter = default_filter();
        assert_eq!(filter.check("напиши функцию сортировки"), None);
        assert_eq!(filter.check("какая погода завтра"), None);
        assert_eq!(filter.check(""), None);
    }

    #[test]
    fn test_matching_is_case_insensitive() {
        let section = GuardrailSection {
            unlock_patterns: vec!["^open sesame$".to_string()],
            blocked_patterns: vec![],
        };
        let filter = GuardrailFilter::new(&section).unwrap();
        assert_eq!(
            filter.check("OPEN SESAME"),
            Some(GuardrailVerdict::PrivacyUnlock)
        );
    }

    #[test]
    fn test_unlock_wins_over_blocked() {
        let section = GuardrailSection {
            unlock_patterns: vec!["^magic phrase$".to_string()],
            blocked_patterns: vec!["magic".to_string()],
        };
        let filter = GuardrailFilter::new(&section).unwrap();
        assert_eq!(
            filter.check("magic phrase"),
            Some(GuardrailVerdict::PrivacyUnlock)
        );
        assert_eq!(filter.check("magic words"), Some(GuardrailVerdict::Blocked));
    }

    #[test]
    fn test_malformed_pattern_is_fatal() {
        let section = GuardrailSection {
            unlock_patterns: vec!["[unclosed".to_string()],
            blocked_patterns: vec![],
        };
        let err = GuardrailFilter::new(&section).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidPattern(_)));
    }
}
