use std::fmt;

/// What kind of hosting entity could not be resolved.
///
/// # Examples
///
/// ```
/// use prwarden_core::NotFoundKind;
///
/// assert_eq!(NotFoundKind::Organization.to_string(), "organization");
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotFoundKind {
    /// The acting user account.
    User,
    /// An organization the acting user belongs to.
    Organization,
    /// A repository under the resolved owner.
    Repository,
}

impl fmt::Display for NotFoundKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotFoundKind::User => write!(f, "user"),
            NotFoundKind::Organization => write!(f, "organization"),
            NotFoundKind::Repository => write!(f, "repository"),
        }
    }
}

/// Errors that can occur across prwarden.
///
/// Library crates use this type directly; the binary renders it through
/// `miette` at the boundary. `Transient` and `Post` are recovered per pull
/// request by the orchestrator; every other variant aborts a run.
///
/// # Examples
///
/// ```
/// use prwarden_core::WardenError;
///
/// let err = WardenError::Config("missing repository".into());
/// assert!(err.to_string().contains("missing repository"));
/// ```
#[derive(Debug, thiserror::Error, miette::Diagnostic)]
pub enum WardenError {
    /// Filesystem I/O failure.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Invalid or missing configuration.
    #[error("configuration error: {0}")]
    #[diagnostic(help("see `prwarden init` for a commented configuration template"))]
    Config(String),

    /// An organization or repository could not be resolved.
    #[error("could not find {kind} '{name}' because: {cause}")]
    NotFound {
        kind: NotFoundKind,
        name: String,
        cause: String,
    },

    /// Fetching the details of a single pull request failed.
    #[error("failed to fetch pull request details: {0}")]
    Transient(String),

    /// A comment could not be posted.
    #[error("failed to post comment: {0}")]
    Post(String),

    /// Any other hosting service failure.
    #[error("hosting API error: {0}")]
    Host(String),

    /// JSON serialization / deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML deserialization failure.
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
}

impl WardenError {
    /// Returns `true` for failures the orchestrator recovers from locally.
    ///
    /// # Examples
    ///
    /// ```
    /// use prwarden_core::WardenError;
    ///
    /// assert!(WardenError::Post("502".into()).is_recoverable());
    /// assert!(!WardenError::Host("401".into()).is_recoverable());
    /// ```
    pub fn is_recoverable(&self) -> bool {
        matches!(self, WardenError::Transient(_) | WardenError::Post(_))
    }
}
