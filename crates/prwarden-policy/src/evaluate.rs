use chrono::{DateTime, Utc};
use prwarden_core::{Policy, PolicyConfig, PolicyVerdict, PullRequest, WardenError};
use serde::Serialize;

use crate::filter::RelevantFiles;
use crate::ticket::{check_ticket_reference, TicketMatcher};

/// `Violated` unless some relevant file lives under one of `test_dirs`.
///
/// A file counts when its first path component is a test directory, so
/// `test/user_test.rb` counts but `app/test/helper.rb` does not.
///
/// # Examples
///
/// ```
/// use prwarden_core::{FileChange, PolicyVerdict};
/// use prwarden_policy::evaluate::check_test_coverage;
/// use prwarden_policy::filter::{filter_relevant, SourceMatcher};
///
/// let files = vec![FileChange::new("spec/user_spec.rb", 8, 0)];
/// let relevant = filter_relevant(&files, &SourceMatcher::match_all());
/// let dirs = vec!["spec".to_string()];
/// assert_eq!(check_test_coverage(&relevant, &dirs), PolicyVerdict::Satisfied);
/// ```
pub fn check_test_coverage(relevant: &RelevantFiles<'_>, test_dirs: &[String]) -> PolicyVerdict {
    let touches_tests = relevant
        .iter()
        .any(|f| test_dirs.iter().any(|dir| is_under_dir(&f.path, dir)));
    PolicyVerdict::from_violation(!touches_tests)
}

fn is_under_dir(path: &str, dir: &str) -> bool {
    let dir = dir.trim_matches('/');
    match path.strip_prefix(dir) {
        Some(rest) => rest.len() > 1 && rest.starts_with('/'),
        None => false,
    }
}

/// `Violated` once at least `threshold_days` whole days have passed since `created_at`.
///
/// Takes `now` from the caller and never reads the clock. A creation time in
/// the future is never stale.
///
/// # Examples
///
/// ```
/// use chrono::{Duration, Utc};
/// use prwarden_core::PolicyVerdict;
/// use prwarden_policy::evaluate::check_staleness;
///
/// let now = Utc::now();
/// assert_eq!(check_staleness(now - Duration::days(6), now, 6), PolicyVerdict::Violated);
/// assert_eq!(check_staleness(now - Duration::days(5), now, 6), PolicyVerdict::Satisfied);
/// ```
pub fn check_staleness(
    created_at: DateTime<Utc>,
    now: DateTime<Utc>,
    threshold_days: i64,
) -> PolicyVerdict {
    let age_days = (now - created_at).num_days();
    PolicyVerdict::from_violation(age_days >= threshold_days)
}

/// One verdict per policy for a single pull request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Verdicts {
    pub ticket: PolicyVerdict,
    pub tests: PolicyVerdict,
    pub staleness: PolicyVerdict,
}

impl Verdicts {
    pub fn get(&self, policy: Policy) -> PolicyVerdict {
        match policy {
            Policy::TicketReference => self.ticket,
            Policy::TestCoverage => self.tests,
            Policy::Staleness => self.staleness,
        }
    }
}

/// The configured set of policy checks.
///
/// Disabled checks report [`PolicyVerdict::NotApplicable`].
///
/// # Examples
///
/// ```
/// use prwarden_core::PolicyConfig;
/// use prwarden_policy::evaluate::Evaluator;
///
/// let config = PolicyConfig {
///     ticket_check: false,
///     ..PolicyConfig::default()
/// };
/// let evaluator = Evaluator::from_config(&config).unwrap();
/// assert!(!evaluator.checks_tickets());
/// ```
#[derive(Debug, Clone)]
pub struct Evaluator {
    ticket: Option<TicketMatcher>,
    test_dirs: Vec<String>,
    stale_after_days: Option<i64>,
}

impl Evaluator {
    /// # Errors
    ///
    /// Returns [`WardenError::Config`] if the ticket check is enabled with an
    /// unusable keyword or digit count.
    pub fn from_config(config: &PolicyConfig) -> Result<Self, WardenError> {
        let ticket = if config.ticket_check {
            Some(TicketMatcher::from_config(config)?)
        } else {
            None
        };
        Ok(Self {
            ticket,
            test_dirs: config.test_dirs.clone(),
            stale_after_days: config.staleness_check.then_some(config.stale_after_days),
        })
    }

    pub fn checks_tickets(&self) -> bool {
        self.ticket.is_some()
    }

    /// Run every check. The checks are independent of one another.
    pub fn evaluate(
        &self,
        pr: &PullRequest,
        relevant: &RelevantFiles<'_>,
        now: DateTime<Utc>,
    ) -> Verdicts {
        let ticket = match &self.ticket {
            Some(matcher) => check_ticket_reference(pr, matcher),
            None => PolicyVerdict::NotApplicable,
        };
        let staleness = match self.stale_after_days {
            Some(days) => check_staleness(pr.created_at, now, days),
            None => PolicyVerdict::NotApplicable,
        };
        Verdicts {
            ticket,
            tests: check_test_coverage(relevant, &self.test_dirs),
            staleness,
        }
    }
}
