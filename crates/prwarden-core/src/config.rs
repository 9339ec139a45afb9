use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::WardenError;

/// Top-level configuration loaded from `.prwarden.toml`.
///
/// Supports layered resolution: CLI flags > env vars > local config > defaults.
///
/// # Examples
///
/// ```
/// use prwarden_core::WardenConfig;
///
/// let config = WardenConfig::default();
/// assert_eq!(config.policy.min_files, 3);
/// assert_eq!(config.github.window, 10);
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WardenConfig {
    /// Account and repository settings.
    #[serde(default)]
    pub github: GithubConfig,
    /// Thresholds and policy toggles.
    #[serde(default)]
    pub policy: PolicyConfig,
    /// Literal comment bodies posted for each policy.
    #[serde(default)]
    pub comments: CommentTemplates,
}

impl WardenConfig {
    /// Load configuration from a TOML file at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`WardenError::Io`] if the file cannot be read, or
    /// [`WardenError::Toml`] if the content is not valid TOML.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use prwarden_core::WardenConfig;
    /// use std::path::Path;
    ///
    /// let config = WardenConfig::from_file(Path::new(".prwarden.toml")).unwrap();
    /// ```
    pub fn from_file(path: &Path) -> Result<Self, WardenError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }

    /// Parse configuration from a TOML string.
    ///
    /// # Errors
    ///
    /// Returns [`WardenError::Toml`] if parsing fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use prwarden_core::WardenConfig;
    ///
    /// let toml = r#"
    /// [policy]
    /// stale_after_days = 14
    /// "#;
    /// let config = WardenConfig::from_toml(toml).unwrap();
    /// assert_eq!(config.policy.stale_after_days, 14);
    /// ```
    pub fn from_toml(content: &str) -> Result<Self, WardenError> {
        let config: Self = toml::from_str(content)?;
        Ok(config)
    }

    /// Fill unset credentials from `GITHUB_TOKEN` / `PRWARDEN_USERNAME`.
    ///
    /// Values already present in the file win over the environment.
    pub fn apply_env(&mut self) {
        if self.github.token.is_none() {
            self.github.token = std::env::var("GITHUB_TOKEN")
                .or_else(|_| std::env::var("GH_TOKEN"))
                .ok();
        }
        if self.github.username.is_empty() {
            if let Ok(username) = std::env::var("PRWARDEN_USERNAME") {
                self.github.username = username;
            }
        }
    }

    /// Check that everything needed for a run is present and well-formed.
    ///
    /// # Errors
    ///
    /// Returns [`WardenError::Config`] describing the first problem found.
    ///
    /// # Examples
    ///
    /// ```
    /// use prwarden_core::WardenConfig;
    ///
    /// let mut config = WardenConfig::default();
    /// assert!(config.validate().is_err());
    ///
    /// config.github.username = "meyerbot".into();
    /// config.github.repository = "avantbasic".into();
    /// assert!(config.validate().is_ok());
    /// ```
    pub fn validate(&self) -> Result<(), WardenError> {
        if self.github.username.trim().is_empty() {
            return Err(WardenError::Config(
                "github.username is required (or set PRWARDEN_USERNAME)".into(),
            ));
        }
        if self.github.repository.trim().is_empty() {
            return Err(WardenError::Config("github.repository is required".into()));
        }
        if self.github.window == 0 {
            return Err(WardenError::Config("github.window must be at least 1".into()));
        }
        self.policy.validate()
    }
}

/// Acting account and target repository.
///
/// # Examples
///
/// ```
/// use prwarden_core::GithubConfig;
///
/// let config = GithubConfig::default();
/// assert!(config.organization.is_none());
/// assert_eq!(config.window, 10);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GithubConfig {
    /// Login of the bot account. Also the identity used for dedup.
    #[serde(default)]
    pub username: String,
    /// Personal access token; falls back to `GITHUB_TOKEN`.
    pub token: Option<String>,
    /// Repository name under the resolved owner.
    #[serde(default)]
    pub repository: String,
    /// Organization owning the repository, if not the bot's own account.
    pub organization: Option<String>,
    /// Number of most recent pull requests examined per run (default: 10).
    #[serde(default = "default_window")]
    pub window: usize,
}

fn default_window() -> usize {
    10
}

impl Default for GithubConfig {
    fn default() -> Self {
        Self {
            username: String::new(),
            token: None,
            repository: String::new(),
            organization: None,
            window: default_window(),
        }
    }
}

/// Thresholds and toggles for the candidacy gate and the policy checks.
///
/// # Examples
///
/// ```
/// use prwarden_core::PolicyConfig;
///
/// let config = PolicyConfig::default();
/// assert_eq!(config.min_lines, 10);
/// assert_eq!(config.ticket_digits, 8);
/// assert_eq!(config.stale_after_days, 6);
/// assert!(!config.count_deletions);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyConfig {
    /// Minimum relevant files changed for a pull request to be examined.
    #[serde(default = "default_min_files")]
    pub min_files: usize,
    /// Minimum changed lines over relevant files.
    #[serde(default = "default_min_lines")]
    pub min_lines: u64,
    /// Count removed lines toward `min_lines` as well as added ones.
    #[serde(default)]
    pub count_deletions: bool,
    /// File extensions (without the dot) that make a file relevant.
    #[serde(default)]
    pub source_extensions: Vec<String>,
    /// Glob patterns that make a file relevant.
    #[serde(default)]
    pub source_patterns: Vec<String>,
    /// First path components that mark a file as a test.
    #[serde(default = "default_test_dirs")]
    pub test_dirs: Vec<String>,
    /// Ask for a tracking ticket reference.
    #[serde(default = "default_true")]
    pub ticket_check: bool,
    /// Name of the tracking system, matched case-insensitively.
    #[serde(default = "default_ticket_keyword")]
    pub ticket_keyword: String,
    /// Minimum digits in a ticket number.
    #[serde(default = "default_ticket_digits")]
    pub ticket_digits: usize,
    /// Nudge pull requests that stay open too long.
    #[serde(default = "default_true")]
    pub staleness_check: bool,
    /// Whole days after creation at which a pull request is stale.
    #[serde(default = "default_stale_after_days")]
    pub stale_after_days: i64,
}

fn default_min_files() -> usize {
    3
}

fn default_min_lines() -> u64 {
    10
}

fn default_test_dirs() -> Vec<String> {
    vec!["test".into(), "tests".into(), "spec".into()]
}

fn default_true() -> bool {
    true
}

fn default_ticket_keyword() -> String {
    "pivotal".into()
}

fn default_ticket_digits() -> usize {
    8
}

fn default_stale_after_days() -> i64 {
    6
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            min_files: default_min_files(),
            min_lines: default_min_lines(),
            count_deletions: false,
            source_extensions: Vec::new(),
            source_patterns: Vec::new(),
            test_dirs: default_test_dirs(),
            ticket_check: true,
            ticket_keyword: default_ticket_keyword(),
            ticket_digits: default_ticket_digits(),
            staleness_check: true,
            stale_after_days: default_stale_after_days(),
        }
    }
}

impl PolicyConfig {
    fn validate(&self) -> Result<(), WardenError> {
        if self.ticket_check && self.ticket_keyword.trim().is_empty() {
            return Err(WardenError::Config(
                "policy.ticket_keyword must not be empty while the ticket check is enabled".into(),
            ));
        }
        if self.ticket_digits == 0 {
            return Err(WardenError::Config(
                "policy.ticket_digits must be at least 1".into(),
            ));
        }
        if self.stale_after_days < 0 {
            return Err(WardenError::Config(
                "policy.stale_after_days must not be negative".into(),
            ));
        }
        for pat in &self.source_patterns {
            glob::Pattern::new(pat).map_err(|e| {
                WardenError::Config(format!("invalid source pattern '{pat}': {e}"))
            })?;
        }
        Ok(())
    }
}

/// Comment bodies posted for each violated policy.
///
/// # Examples
///
/// ```
/// use prwarden_core::CommentTemplates;
///
/// assert_eq!(CommentTemplates::default().tests, "Tests?");
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommentTemplates {
    /// Posted when no tracking ticket is referenced.
    #[serde(default = "default_ticket_comment")]
    pub ticket: String,
    /// Posted when no test file was touched.
    #[serde(default = "default_tests_comment")]
    pub tests: String,
    /// Posted when the pull request has been open too long.
    #[serde(default = "default_stale_comment")]
    pub stale: String,
}

fn default_ticket_comment() -> String {
    "Could you link this pull request to its Pivotal story? Please mention the story \
     number (e.g. #12345678) and the word \"Pivotal\" in the title, the description \
     and at least one commit message."
        .into()
}

fn default_tests_comment() -> String {
    "Tests?".into()
}

fn default_stale_comment() -> String {
    "This pull request has been open for a while. Can we decide whether to merge or close it?"
        .into()
}

impl Default for CommentTemplates {
    fn default() -> Self {
        Self {
            ticket: default_ticket_comment(),
            tests: default_tests_comment(),
            stale: default_stale_comment(),
        }
    }
}
