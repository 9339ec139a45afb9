use async_trait::async_trait;
use chrono::{DateTime, Utc};
use prwarden_core::{ExistingComment, PullRequest, WardenError};
use serde::Serialize;

/// Whether an owner is a personal account or an organization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OwnerKind {
    User,
    Organization,
}

/// The account that owns the target repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Owner {
    pub login: String,
    pub kind: OwnerKind,
}

/// A resolved repository.
///
/// # Examples
///
/// ```
/// use prwarden_review::host::Repository;
///
/// let repo = Repository { owner: "avant".into(), name: "basic".into() };
/// assert_eq!(repo.full_name(), "avant/basic");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Repository {
    pub owner: String,
    pub name: String,
}

impl Repository {
    pub fn full_name(&self) -> String {
        format!("{}/{}", self.owner, self.name)
    }
}

/// A pull request as it appears in a listing, before its details are loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestSummary {
    pub number: u64,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

/// Everything the orchestrator needs from a repository hosting service.
///
/// Implementations own authentication, transport, pagination and rate
/// limiting. None of the methods retry.
#[async_trait]
pub trait RepositoryHost: Send + Sync {
    /// Login of the account the client is authenticated as. Comments the
    /// bot posts carry this login.
    ///
    /// # Errors
    ///
    /// [`WardenError::NotFound`] if the credentials are rejected.
    async fn current_user(&self) -> Result<String, WardenError>;

    /// The acting user when `organization` is `None`, else the organization
    /// whose login matches case-insensitively.
    ///
    /// # Errors
    ///
    /// [`WardenError::NotFound`] if no such organization exists.
    async fn resolve_owner(
        &self,
        username: &str,
        organization: Option<&str>,
    ) -> Result<Owner, WardenError>;

    /// The repository named exactly `name` under `owner`.
    ///
    /// # Errors
    ///
    /// [`WardenError::NotFound`] if it does not exist.
    async fn resolve_repository(&self, owner: &Owner, name: &str)
        -> Result<Repository, WardenError>;

    /// Open pull requests, most recent first, at most `limit` of them.
    /// Implementations follow pagination until `limit` is reached.
    async fn list_pull_requests(
        &self,
        repo: &Repository,
        limit: usize,
    ) -> Result<Vec<PullRequestSummary>, WardenError>;

    /// Load files, commits and comments for one listed pull request.
    ///
    /// # Errors
    ///
    /// [`WardenError::Transient`] when any part of the detail cannot be fetched.
    async fn fetch_pull_request(
        &self,
        repo: &Repository,
        summary: &PullRequestSummary,
    ) -> Result<PullRequest, WardenError>;

    /// Current conversation comments of pull request `number`, all pages.
    ///
    /// # Errors
    ///
    /// [`WardenError::Transient`] when the comments cannot be fetched.
    async fn list_comments(
        &self,
        repo: &Repository,
        number: u64,
    ) -> Result<Vec<ExistingComment>, WardenError>;

    /// Post `text` as a conversation comment.
    ///
    /// # Errors
    ///
    /// [`WardenError::Post`] when the comment is rejected.
    async fn post_comment(
        &self,
        repo: &Repository,
        pr: &PullRequest,
        text: &str,
    ) -> Result<(), WardenError>;
}
