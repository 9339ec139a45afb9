use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A snapshot of one pull request, fetched once per evaluation pass.
///
/// # Examples
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use prwarden_core::{FileChange, PullRequest};
///
/// let pr = PullRequest {
///     number: 7,
///     title: "Add billing export".into(),
///     body: String::new(),
///     created_at: Utc.with_ymd_and_hms(2024, 3, 1, 9, 0, 0).unwrap(),
///     commits: vec![],
///     files: vec![FileChange::new("app/export.rb", 40, 2)],
///     comments: vec![],
/// };
/// assert!(!pr.has_comment_from("meyerbot"));
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequest {
    /// Pull request number within its repository.
    pub number: u64,
    /// Title text.
    pub title: String,
    /// Description text (empty when the author left it blank).
    #[serde(default)]
    pub body: String,
    /// When the pull request was opened.
    pub created_at: DateTime<Utc>,
    /// Commits in branch order.
    #[serde(default)]
    pub commits: Vec<Commit>,
    /// Changed files as reported by the host, unfiltered.
    #[serde(default)]
    pub files: Vec<FileChange>,
    /// Conversation comments in posting order.
    #[serde(default)]
    pub comments: Vec<ExistingComment>,
}

impl PullRequest {
    /// Returns `true` if `login` authored any existing comment.
    pub fn has_comment_from(&self, login: &str) -> bool {
        self.comments.iter().any(|c| c.author == login)
    }
}

/// One changed file of a pull request.
///
/// # Examples
///
/// ```
/// use prwarden_core::FileChange;
///
/// let change = FileChange::new("test/export_test.rb", 12, 0);
/// assert_eq!(change.additions, 12);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileChange {
    /// Path relative to the repository root, `/`-separated.
    pub path: String,
    /// Lines added.
    #[serde(default)]
    pub additions: u64,
    /// Lines removed.
    #[serde(default)]
    pub deletions: u64,
}

impl FileChange {
    pub fn new(path: impl Into<String>, additions: u64, deletions: u64) -> Self {
        Self {
            path: path.into(),
            additions,
            deletions,
        }
    }
}

/// A commit on the pull request branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Commit {
    pub message: String,
}

/// A conversation comment already present on a pull request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExistingComment {
    /// Login of the comment author.
    pub author: String,
    #[serde(default)]
    pub body: String,
}

/// The policies a pull request is checked against.
///
/// # Examples
///
/// ```
/// use prwarden_core::Policy;
///
/// assert_eq!(Policy::TestCoverage.to_string(), "test-coverage");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Policy {
    /// The pull request links to a tracking ticket.
    TicketReference,
    /// The pull request touches at least one test file.
    TestCoverage,
    /// The pull request has not been open too long.
    Staleness,
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Policy::TicketReference => write!(f, "ticket-reference"),
            Policy::TestCoverage => write!(f, "test-coverage"),
            Policy::Staleness => write!(f, "staleness"),
        }
    }
}

/// Outcome of one policy check on one pull request.
///
/// # Examples
///
/// ```
/// use prwarden_core::PolicyVerdict;
///
/// assert!(PolicyVerdict::Violated.is_violated());
/// assert!(!PolicyVerdict::NotApplicable.is_violated());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PolicyVerdict {
    /// The check is disabled by configuration.
    NotApplicable,
    Satisfied,
    Violated,
}

impl PolicyVerdict {
    pub fn is_violated(self) -> bool {
        self == PolicyVerdict::Violated
    }

    /// `Violated` when `violated` holds, `Satisfied` otherwise.
    pub fn from_violation(violated: bool) -> Self {
        if violated {
            PolicyVerdict::Violated
        } else {
            PolicyVerdict::Satisfied
        }
    }
}

impl fmt::Display for PolicyVerdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PolicyVerdict::NotApplicable => write!(f, "n/a"),
            PolicyVerdict::Satisfied => write!(f, "satisfied"),
            PolicyVerdict::Violated => write!(f, "violated"),
        }
    }
}

/// A comment the bot intends to post.
///
/// # Examples
///
/// ```
/// use prwarden_core::{CommentAction, Policy};
///
/// let action = CommentAction {
///     policy: Policy::TestCoverage,
///     text: "Tests?".into(),
/// };
/// assert_eq!(action.text, "Tests?");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CommentAction {
    /// The violated policy this comment addresses.
    pub policy: Policy,
    /// Literal comment body.
    pub text: String,
}

/// Output format for command results.
///
/// # Examples
///
/// ```
/// use prwarden_core::OutputFormat;
///
/// let fmt: OutputFormat = "json".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Json);
///
/// let fmt: OutputFormat = "md".parse().unwrap();
/// assert_eq!(fmt, OutputFormat::Markdown);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable summary.
    #[default]
    Text,
    /// Machine-readable JSON.
    Json,
    /// GitHub-flavored Markdown.
    Markdown,
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
            OutputFormat::Markdown => write!(f, "markdown"),
        }
    }
}

impl FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(OutputFormat::Text),
            "json" => Ok(OutputFormat::Json),
            "markdown" | "md" => Ok(OutputFormat::Markdown),
            other => Err(format!("unknown output format: {other}")),
        }
    }
}
