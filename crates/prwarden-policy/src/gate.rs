use std::fmt;

use prwarden_core::{PolicyConfig, PullRequest};
use serde::Serialize;

use crate::filter::RelevantFiles;

/// Minimum size a pull request needs before it is examined.
///
/// Both bounds are inclusive.
///
/// # Examples
///
/// ```
/// use prwarden_policy::gate::GateThresholds;
///
/// let t = GateThresholds::default();
/// assert_eq!((t.min_files, t.min_lines), (3, 10));
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GateThresholds {
    pub min_files: usize,
    pub min_lines: u64,
    /// Count removed lines toward `min_lines`.
    pub count_deletions: bool,
}

impl Default for GateThresholds {
    fn default() -> Self {
        Self::from_config(&PolicyConfig::default())
    }
}

impl GateThresholds {
    pub fn from_config(config: &PolicyConfig) -> Self {
        Self {
            min_files: config.min_files,
            min_lines: config.min_lines,
            count_deletions: config.count_deletions,
        }
    }
}

/// Whether a pull request gets examined, and if not, the first rule it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum Candidacy {
    Candidate,
    TooFewFiles { found: usize, required: usize },
    TooFewLines { found: u64, required: u64 },
    /// The bot has commented before and stays silent from now on.
    AlreadyCommented,
}

impl Candidacy {
    pub fn is_candidate(self) -> bool {
        self == Candidacy::Candidate
    }
}

impl fmt::Display for Candidacy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Candidacy::Candidate => write!(f, "candidate"),
            Candidacy::TooFewFiles { found, required } => {
                write!(f, "too few files ({found} < {required})")
            }
            Candidacy::TooFewLines { found, required } => {
                write!(f, "too few lines ({found} < {required})")
            }
            Candidacy::AlreadyCommented => write!(f, "already commented"),
        }
    }
}

/// Run the gate rules in order and report the first failure.
///
/// `relevant` must be the filtered files of `pr`.
pub fn assess(
    pr: &PullRequest,
    relevant: &RelevantFiles<'_>,
    bot_identity: &str,
    thresholds: &GateThresholds,
) -> Candidacy {
    if relevant.len() < thresholds.min_files {
        return Candidacy::TooFewFiles {
            found: relevant.len(),
            required: thresholds.min_files,
        };
    }

    let lines = relevant.changed_lines(thresholds.count_deletions);
    if lines < thresholds.min_lines {
        return Candidacy::TooFewLines {
            found: lines,
            required: thresholds.min_lines,
        };
    }

    if pr.has_comment_from(bot_identity) {
        return Candidacy::AlreadyCommented;
    }

    Candidacy::Candidate
}

/// Returns `true` if `pr` is large enough and the bot has not commented yet.
///
/// # Examples
///
/// ```
/// use chrono::Utc;
/// use prwarden_core::{FileChange, PullRequest};
/// use prwarden_policy::filter::{filter_relevant, SourceMatcher};
/// use prwarden_policy::gate::{is_candidate, GateThresholds};
///
/// let pr = PullRequest {
///     number: 1,
///     title: "Add parser".into(),
///     body: String::new(),
///     created_at: Utc::now(),
///     commits: vec![],
///     files: vec![
///         FileChange::new("a.rb", 4, 0),
///         FileChange::new("b.rb", 3, 0),
///         FileChange::new("c.rb", 3, 0),
///     ],
///     comments: vec![],
/// };
/// let relevant = filter_relevant(&pr.files, &SourceMatcher::match_all());
/// assert!(is_candidate(&pr, &relevant, "meyerbot", &GateThresholds::default()));
/// ```
pub fn is_candidate(
    pr: &PullRequest,
    relevant: &RelevantFiles<'_>,
    bot_identity: &str,
    thresholds: &GateThresholds,
) -> bool {
    assess(pr, relevant, bot_identity, thresholds).is_candidate()
}
