//! Reduces a pull request's changed files to the ones policies care about.
//!
//! Relevance is decided by file extension or glob pattern. With neither
//! configured every file is relevant. Aggregates are only available on the
//! filtered set, so an unfiltered line count can never reach a policy.

use std::path::Path;

use prwarden_core::{FileChange, PolicyConfig, WardenError};

/// Decides which changed files are relevant to policy checks.
///
/// # Examples
///
/// ```
/// use prwarden_policy::filter::SourceMatcher;
///
/// let matcher = SourceMatcher::with_extensions(["rb"]);
/// assert!(matcher.is_relevant("app/models/user.rb"));
/// assert!(!matcher.is_relevant("README.md"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct SourceMatcher {
    extensions: Vec<String>,
    patterns: Vec<glob::Pattern>,
}

impl SourceMatcher {
    /// A matcher that treats every file as relevant.
    ///
    /// # Examples
    ///
    /// ```
    /// use prwarden_policy::filter::SourceMatcher;
    ///
    /// assert!(SourceMatcher::match_all().is_relevant("Gemfile"));
    /// ```
    pub fn match_all() -> Self {
        Self::default()
    }

    /// A matcher keeping files whose extension is one of `extensions`.
    ///
    /// A leading dot is accepted and ignored (`".rb"` and `"rb"` are the same).
    pub fn with_extensions<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|e| e.as_ref().trim_start_matches('.').to_string())
                .collect(),
            patterns: Vec::new(),
        }
    }

    /// Build a matcher from policy configuration.
    ///
    /// # Errors
    ///
    /// Returns [`WardenError::Config`] if a source pattern is not a valid glob.
    ///
    /// # Examples
    ///
    /// ```
    /// use prwarden_core::PolicyConfig;
    /// use prwarden_policy::filter::SourceMatcher;
    ///
    /// let config = PolicyConfig {
    ///     source_patterns: vec!["lib/**/*.ex".into()],
    ///     ..PolicyConfig::default()
    /// };
    /// let matcher = SourceMatcher::from_config(&config).unwrap();
    /// assert!(matcher.is_relevant("lib/app/router.ex"));
    /// assert!(!matcher.is_relevant("mix.exs"));
    /// ```
    pub fn from_config(config: &PolicyConfig) -> Result<Self, WardenError> {
        let mut matcher = Self::with_extensions(&config.source_extensions);
        for pat in &config.source_patterns {
            let pattern = glob::Pattern::new(pat).map_err(|e| {
                WardenError::Config(format!("invalid source pattern '{pat}': {e}"))
            })?;
            matcher.patterns.push(pattern);
        }
        Ok(matcher)
    }

    /// Check whether a single path is relevant.
    pub fn is_relevant(&self, path: &str) -> bool {
        if self.extensions.is_empty() && self.patterns.is_empty() {
            return true;
        }

        if let Some(ext) = Path::new(path).extension().and_then(|e| e.to_str()) {
            if self
                .extensions
                .iter()
                .any(|wanted| wanted.eq_ignore_ascii_case(ext))
            {
                return true;
            }
        }

        self.patterns.iter().any(|pat| pat.matches(path))
    }
}

/// The changed files of a pull request that passed a [`SourceMatcher`].
///
/// Only [`filter_relevant`] produces this type.
///
/// # Examples
///
/// ```
/// use prwarden_core::FileChange;
/// use prwarden_policy::filter::{filter_relevant, SourceMatcher};
///
/// let files = vec![
///     FileChange::new("app/a.rb", 5, 1),
///     FileChange::new("docs/a.md", 50, 0),
/// ];
/// let relevant = filter_relevant(&files, &SourceMatcher::with_extensions(["rb"]));
/// assert_eq!(relevant.len(), 1);
/// assert_eq!(relevant.added_lines(), 5);
/// ```
#[derive(Debug, Clone)]
pub struct RelevantFiles<'a> {
    files: Vec<&'a FileChange>,
}

impl<'a> RelevantFiles<'a> {
    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Relevant files in their original order.
    pub fn iter(&self) -> impl Iterator<Item = &'a FileChange> + '_ {
        self.files.iter().copied()
    }

    /// Sum of added lines, saturating at `u64::MAX`. Deletions are not counted.
    pub fn added_lines(&self) -> u64 {
        self.files
            .iter()
            .fold(0u64, |acc, f| acc.saturating_add(f.additions))
    }

    /// Added lines, plus removed lines when `count_deletions` is set.
    pub fn changed_lines(&self, count_deletions: bool) -> u64 {
        if count_deletions {
            self.files.iter().fold(0u64, |acc, f| {
                acc.saturating_add(f.additions).saturating_add(f.deletions)
            })
        } else {
            self.added_lines()
        }
    }
}

/// Keep only relevant files, preserving input order.
///
/// An empty input yields an empty result.
pub fn filter_relevant<'a>(files: &'a [FileChange], matcher: &SourceMatcher) -> RelevantFiles<'a> {
    RelevantFiles {
        files: files.iter().filter(|f| matcher.is_relevant(&f.path)).collect(),
    }
}

/// Sum of added lines over relevant files.
pub fn aggregate_added_lines(files: &RelevantFiles<'_>) -> u64 {
    files.added_lines()
}
