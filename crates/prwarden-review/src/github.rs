use async_trait::async_trait;
use chrono::{DateTime, Utc};
use octocrab::Page;
use prwarden_core::{
    Commit, ExistingComment, FileChange, NotFoundKind, PullRequest, WardenError,
};
use serde::{Deserialize, Serialize};

use crate::host::{Owner, OwnerKind, PullRequestSummary, Repository, RepositoryHost};

/// GitHub caps `per_page` at 100.
const MAX_PER_PAGE: usize = 100;

/// GitHub REST client implementing [`RepositoryHost`].
///
/// # Examples
///
/// ```
/// use prwarden_review::github::parse_pr_reference;
///
/// let (owner, repo, number) = parse_pr_reference("rust-lang/rust#12345").unwrap();
/// assert_eq!(owner, "rust-lang");
/// assert_eq!(repo, "rust");
/// assert_eq!(number, 12345);
/// ```
pub struct GitHubHost {
    octocrab: octocrab::Octocrab,
}

impl GitHubHost {
    /// Create a client from an explicit token or the `GITHUB_TOKEN` environment variable.
    ///
    /// # Errors
    ///
    /// Returns [`WardenError::Config`] if no token is available, or
    /// [`WardenError::Host`] if the client cannot be built.
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use prwarden_review::github::GitHubHost;
    ///
    /// let host = GitHubHost::new(Some("ghp_xxxx")).unwrap();
    /// ```
    pub fn new(token: Option<&str>) -> Result<Self, WardenError> {
        let token = match token {
            Some(t) => t.to_string(),
            None => std::env::var("GITHUB_TOKEN").map_err(|_| {
                WardenError::Config(
                    "GITHUB_TOKEN not set. Set github.token in .prwarden.toml or export GITHUB_TOKEN"
                        .into(),
                )
            })?,
        };

        let octocrab = octocrab::Octocrab::builder()
            .personal_token(token)
            .build()
            .map_err(|e| WardenError::Host(format!("failed to create GitHub client: {e}")))?;

        Ok(Self { octocrab })
    }

    /// Fetch the listing entry of a single pull request by number.
    ///
    /// # Errors
    ///
    /// Returns [`WardenError::NotFound`] if the pull request does not exist,
    /// or [`WardenError::Host`] for any other API failure.
    pub async fn get_pull_request(
        &self,
        repo: &Repository,
        number: u64,
    ) -> Result<PullRequestSummary, WardenError> {
        let route = format!("/repos/{}/{}/pulls/{number}", repo.owner, repo.name);
        let entry: PullEntry = self
            .octocrab
            .get(route, None::<&()>)
            .await
            .map_err(|e| {
                lookup_error(
                    status_of(&e),
                    NotFoundKind::Repository,
                    &format!("{}#{number}", repo.full_name()),
                    e.to_string(),
                )
            })?;
        Ok(entry.into())
    }

    /// Fetch every page of a detail listing.
    async fn fetch_all<T>(&self, route: String, what: &str) -> Result<Vec<T>, WardenError>
    where
        T: serde::de::DeserializeOwned,
    {
        let transient = |e: octocrab::Error| WardenError::Transient(format!("{what}: {e}"));
        let first: Page<T> = self
            .octocrab
            .get(route, Some(&PageParams::default()))
            .await
            .map_err(transient)?;
        self.octocrab.all_pages(first).await.map_err(transient)
    }
}

/// HTTP status of a GitHub API error, if the request reached GitHub.
fn status_of(err: &octocrab::Error) -> Option<u16> {
    match err {
        octocrab::Error::GitHub { source, .. } => Some(source.status_code.as_u16()),
        _ => None,
    }
}

/// `NotFound` for a 404, `Host` for everything else.
fn lookup_error(status: Option<u16>, kind: NotFoundKind, name: &str, cause: String) -> WardenError {
    match status {
        Some(404) => WardenError::NotFound {
            kind,
            name: name.to_string(),
            cause,
        },
        _ => WardenError::Host(format!("looking up {kind} '{name}': {cause}")),
    }
}

/// Append `items` to `acc` without exceeding `limit`.
/// Returns `true` while more entries are wanted.
fn fill_window<T>(acc: &mut Vec<T>, items: Vec<T>, limit: usize) -> bool {
    let room = limit.saturating_sub(acc.len());
    acc.extend(items.into_iter().take(room));
    acc.len() < limit
}

#[derive(Debug, Deserialize)]
struct UserEntry {
    login: String,
}

#[derive(Debug, Deserialize)]
struct RepoEntry {
    name: String,
    owner: UserEntry,
}

#[derive(Debug, Deserialize)]
struct PullEntry {
    number: u64,
    title: String,
    body: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<PullEntry> for PullRequestSummary {
    fn from(entry: PullEntry) -> Self {
        Self {
            number: entry.number,
            title: entry.title,
            body: entry.body.unwrap_or_default(),
            created_at: entry.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
struct FileEntry {
    filename: String,
    additions: u64,
    deletions: u64,
}

#[derive(Debug, Deserialize)]
struct CommitEntry {
    commit: CommitDetail,
}

#[derive(Debug, Deserialize)]
struct CommitDetail {
    message: String,
}

#[derive(Debug, Deserialize)]
struct CommentEntry {
    user: Option<UserEntry>,
    body: Option<String>,
}

impl From<CommentEntry> for ExistingComment {
    fn from(entry: CommentEntry) -> Self {
        Self {
            author: entry.user.map(|u| u.login).unwrap_or_default(),
            body: entry.body.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize)]
struct PageParams {
    per_page: usize,
}

impl Default for PageParams {
    fn default() -> Self {
        Self {
            per_page: MAX_PER_PAGE,
        }
    }
}

#[derive(Debug, Serialize)]
struct ListPullsParams {
    state: &'static str,
    sort: &'static str,
    direction: &'static str,
    per_page: usize,
}

#[async_trait]
impl RepositoryHost for GitHubHost {
    async fn current_user(&self) -> Result<String, WardenError> {
        let me: UserEntry = self
            .octocrab
            .get("/user", None::<&()>)
            .await
            .map_err(|e| WardenError::NotFound {
                kind: NotFoundKind::User,
                name: "authenticated user".into(),
                cause: e.to_string(),
            })?;
        Ok(me.login)
    }

    async fn resolve_owner(
        &self,
        username: &str,
        organization: Option<&str>,
    ) -> Result<Owner, WardenError> {
        let Some(org) = organization else {
            return Ok(Owner {
                login: username.to_string(),
                kind: OwnerKind::User,
            });
        };

        let first: Page<UserEntry> = self
            .octocrab
            .get("/user/orgs", Some(&PageParams::default()))
            .await
            .map_err(|e| lookup_error(status_of(&e), NotFoundKind::Organization, org, e.to_string()))?;
        let orgs = self
            .octocrab
            .all_pages(first)
            .await
            .map_err(|e| lookup_error(status_of(&e), NotFoundKind::Organization, org, e.to_string()))?;

        orgs.into_iter()
            .find(|o| o.login.eq_ignore_ascii_case(org))
            .map(|o| Owner {
                login: o.login,
                kind: OwnerKind::Organization,
            })
            .ok_or_else(|| WardenError::NotFound {
                kind: NotFoundKind::Organization,
                name: org.to_string(),
                cause: format!("{username} is not a member of an organization with that name"),
            })
    }

    async fn resolve_repository(
        &self,
        owner: &Owner,
        name: &str,
    ) -> Result<Repository, WardenError> {
        let route = format!("/repos/{}/{name}", owner.login);
        let entry: RepoEntry = self
            .octocrab
            .get(route, None::<&()>)
            .await
            .map_err(|e| lookup_error(status_of(&e), NotFoundKind::Repository, name, e.to_string()))?;

        // The API resolves names case-insensitively and follows renames.
        if entry.name != name {
            return Err(WardenError::NotFound {
                kind: NotFoundKind::Repository,
                name: name.to_string(),
                cause: format!("closest match under {} is '{}'", owner.login, entry.name),
            });
        }

        Ok(Repository {
            owner: entry.owner.login,
            name: entry.name,
        })
    }

    async fn list_pull_requests(
        &self,
        repo: &Repository,
        limit: usize,
    ) -> Result<Vec<PullRequestSummary>, WardenError> {
        let failed = |e: octocrab::Error| WardenError::Host(format!("failed to list pull requests: {e}"));
        let route = format!("/repos/{}/{}/pulls", repo.owner, repo.name);
        let params = ListPullsParams {
            state: "open",
            sort: "created",
            direction: "desc",
            per_page: limit.clamp(1, MAX_PER_PAGE),
        };

        let mut page: Page<PullEntry> = self
            .octocrab
            .get(route, Some(&params))
            .await
            .map_err(failed)?;
        let mut entries = Vec::new();
        loop {
            let items = std::mem::take(&mut page.items);
            if !fill_window(&mut entries, items, limit) || page.next.is_none() {
                break;
            }
            match self.octocrab.get_page(&page.next).await.map_err(failed)? {
                Some(next) => page = next,
                None => break,
            }
        }

        Ok(entries.into_iter().map(Into::into).collect())
    }

    async fn fetch_pull_request(
        &self,
        repo: &Repository,
        summary: &PullRequestSummary,
    ) -> Result<PullRequest, WardenError> {
        let base = format!("/repos/{}/{}", repo.owner, repo.name);
        let number = summary.number;

        let files: Vec<FileEntry> = self
            .fetch_all(format!("{base}/pulls/{number}/files"), "files")
            .await?;
        let commits: Vec<CommitEntry> = self
            .fetch_all(format!("{base}/pulls/{number}/commits"), "commits")
            .await?;
        let comments = self.list_comments(repo, number).await?;

        Ok(PullRequest {
            number,
            title: summary.title.clone(),
            body: summary.body.clone(),
            created_at: summary.created_at,
            commits: commits
                .into_iter()
                .map(|c| Commit {
                    message: c.commit.message,
                })
                .collect(),
            files: files
                .into_iter()
                .map(|f| FileChange::new(f.filename, f.additions, f.deletions))
                .collect(),
            comments,
        })
    }

    async fn list_comments(
        &self,
        repo: &Repository,
        number: u64,
    ) -> Result<Vec<ExistingComment>, WardenError> {
        let route = format!("/repos/{}/{}/issues/{number}/comments", repo.owner, repo.name);
        let entries: Vec<CommentEntry> = self.fetch_all(route, "comments").await?;
        Ok(entries.into_iter().map(Into::into).collect())
    }

    async fn post_comment(
        &self,
        repo: &Repository,
        pr: &PullRequest,
        text: &str,
    ) -> Result<(), WardenError> {
        let route = format!("/repos/{}/{}/issues/{}/comments", repo.owner, repo.name, pr.number);
        let body = serde_json::json!({ "body": text });

        let _response: serde_json::Value = self
            .octocrab
            .post(route, Some(&body))
            .await
            .map_err(|e| WardenError::Post(format!("#{}: {e}", pr.number)))?;

        Ok(())
    }
}

/// Parse a PR reference string (`owner/repo#number`) into its components.
///
/// # Errors
///
/// Returns [`WardenError::Config`] if the format is invalid.
///
/// # Examples
///
/// ```
/// use prwarden_review::github::parse_pr_reference;
///
/// let (owner, repo, num) = parse_pr_reference("octocat/hello-world#42").unwrap();
/// assert_eq!(owner, "octocat");
/// assert_eq!(repo, "hello-world");
/// assert_eq!(num, 42);
/// ```
pub fn parse_pr_reference(pr_ref: &str) -> Result<(String, String, u64), WardenError> {
    let Some((owner_repo, number_str)) = pr_ref.split_once('#') else {
        return Err(WardenError::Config(format!(
            "invalid PR reference '{pr_ref}', expected owner/repo#number"
        )));
    };
    let Some((owner, repo)) = owner_repo.split_once('/') else {
        return Err(WardenError::Config(format!(
            "invalid PR reference '{pr_ref}', expected owner/repo#number"
        )));
    };
    let number: u64 = number_str
        .parse()
        .map_err(|_| WardenError::Config(format!("invalid PR number: {number_str}")))?;
    Ok((owner.to_string(), repo.to_string(), number))
}
