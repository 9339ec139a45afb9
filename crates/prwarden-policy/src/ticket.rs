//! Ticket-reference detection.
//!
//! A pull request references its tracking ticket when the title and the body
//! each carry both a ticket number and the tracking-system keyword, and at
//! least one commit message carries either of them. All five signals are
//! required.

use prwarden_core::{PolicyConfig, PolicyVerdict, PullRequest, WardenError};
use regex::Regex;
use serde::Serialize;

/// Named text predicates for ticket numbers and the tracking-system keyword.
///
/// # Examples
///
/// ```
/// use prwarden_policy::ticket::TicketMatcher;
///
/// let matcher = TicketMatcher::new("pivotal", 8).unwrap();
/// assert!(matcher.has_ticket_number("Fix login #12345678"));
/// assert!(!matcher.has_ticket_number("Fix login #1234567"));
/// assert!(matcher.has_keyword("See the PIVOTAL story"));
/// ```
#[derive(Debug, Clone)]
pub struct TicketMatcher {
    number: Regex,
    keyword: Regex,
}

impl TicketMatcher {
    /// Build a matcher for `keyword` and ticket numbers of at least `min_digits` digits.
    ///
    /// # Errors
    ///
    /// Returns [`WardenError::Config`] if `keyword` is empty or `min_digits` is zero.
    pub fn new(keyword: &str, min_digits: usize) -> Result<Self, WardenError> {
        if keyword.trim().is_empty() {
            return Err(WardenError::Config("ticket keyword must not be empty".into()));
        }
        if min_digits == 0 {
            return Err(WardenError::Config(
                "ticket number needs at least one digit".into(),
            ));
        }

        let number = Regex::new(&format!(r"\b[0-9]{{{min_digits},}}\b"))
            .map_err(|e| WardenError::Config(format!("invalid ticket number pattern: {e}")))?;
        let keyword = Regex::new(&format!("(?i){}", regex::escape(keyword.trim())))
            .map_err(|e| WardenError::Config(format!("invalid ticket keyword: {e}")))?;

        Ok(Self { number, keyword })
    }

    pub fn from_config(config: &PolicyConfig) -> Result<Self, WardenError> {
        Self::new(&config.ticket_keyword, config.ticket_digits)
    }

    /// `text` contains a standalone run of enough digits.
    pub fn has_ticket_number(&self, text: &str) -> bool {
        self.number.is_match(text)
    }

    /// `text` mentions the tracking system, ignoring case.
    pub fn has_keyword(&self, text: &str) -> bool {
        self.keyword.is_match(text)
    }

    /// `text` carries either a ticket number or the keyword.
    pub fn mentions_ticket(&self, text: &str) -> bool {
        self.has_ticket_number(text) || self.has_keyword(text)
    }

    /// Collect every ticket signal present on `pr`.
    pub fn signals(&self, pr: &PullRequest) -> TicketSignals {
        TicketSignals {
            title_number: self.has_ticket_number(&pr.title),
            body_number: self.has_ticket_number(&pr.body),
            title_keyword: self.has_keyword(&pr.title),
            body_keyword: self.has_keyword(&pr.body),
            commit_reference: pr.commits.iter().any(|c| self.mentions_ticket(&c.message)),
        }
    }
}

/// Which ticket signals a pull request carries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketSignals {
    pub title_number: bool,
    pub body_number: bool,
    pub title_keyword: bool,
    pub body_keyword: bool,
    /// Some commit message has a ticket number or the keyword.
    pub commit_reference: bool,
}

impl TicketSignals {
    pub fn all_present(&self) -> bool {
        self.title_number
            && self.body_number
            && self.title_keyword
            && self.body_keyword
            && self.commit_reference
    }
}

/// `Violated` unless every ticket signal is present.
pub fn check_ticket_reference(pr: &PullRequest, matcher: &TicketMatcher) -> PolicyVerdict {
    PolicyVerdict::from_violation(!matcher.signals(pr).all_present())
}
