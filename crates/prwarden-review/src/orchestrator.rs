use std::fmt;

use chrono::{DateTime, Utc};
use prwarden_core::{Policy, WardenConfig, WardenError};
use prwarden_policy::engine::{Evaluation, PolicyEngine};
use serde::Serialize;

use crate::host::{Owner, Repository, RepositoryHost};

/// Identity, owner and repository resolved once at the start of a run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunContext {
    /// Login the host reports for the credentials; used by the dedup check.
    pub bot_login: String,
    pub owner: Owner,
    pub repository: Repository,
}

/// What one pass did to one pull request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PullRequestOutcome {
    pub number: u64,
    pub title: String,
    /// `None` when the details could not be fetched.
    pub evaluation: Option<Evaluation>,
    /// Why the pull request was skipped.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// A bot comment appeared between fetching and posting, so nothing was posted.
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub preempted: bool,
    /// Policies whose comment was posted.
    pub posted: Vec<Policy>,
    /// Comments that failed to post.
    pub failed: Vec<FailedPost>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FailedPost {
    pub policy: Policy,
    pub error: String,
}

/// Result of a completed pass over a repository.
///
/// # Examples
///
/// ```
/// use prwarden_review::orchestrator::RunReport;
///
/// let report = RunReport {
///     repository: "avant/basic".into(),
///     dry_run: false,
///     pull_requests: vec![],
/// };
/// assert_eq!(report.actions_taken(), 0);
/// ```
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    /// `owner/name` of the examined repository.
    pub repository: String,
    /// Comments were planned but not posted.
    pub dry_run: bool,
    /// Outcomes in listing order.
    pub pull_requests: Vec<PullRequestOutcome>,
}

impl RunReport {
    /// Comments actually posted during the run.
    pub fn actions_taken(&self) -> usize {
        self.pull_requests.iter().map(|p| p.posted.len()).sum()
    }

    /// Comments planned, whether or not they were posted.
    pub fn actions_planned(&self) -> usize {
        self.pull_requests
            .iter()
            .filter_map(|p| p.evaluation.as_ref())
            .map(|e| e.actions.len())
            .sum()
    }

    /// Pull requests that passed the candidacy gate.
    pub fn candidates(&self) -> usize {
        self.pull_requests
            .iter()
            .filter_map(|p| p.evaluation.as_ref())
            .filter(|e| e.candidacy.is_candidate())
            .count()
    }

    /// Pull requests skipped because their details or comments could not be fetched.
    pub fn skipped(&self) -> usize {
        self.pull_requests.iter().filter(|p| p.error.is_some()).count()
    }

    /// Comments that failed to post.
    pub fn failed_posts(&self) -> usize {
        self.pull_requests.iter().map(|p| p.failed.len()).sum()
    }
}

/// Per-run settings taken from [`WardenConfig`].
#[derive(Debug, Clone)]
pub struct RunOptions {
    /// Configured bot login. Must match the authenticated login up to case.
    pub username: String,
    pub organization: Option<String>,
    pub repository: String,
    /// Most recent pull requests to examine.
    pub window: usize,
    /// Plan comments without posting them.
    pub dry_run: bool,
}

/// Drives fetch, evaluation and posting for one repository.
///
/// Pull requests are processed one at a time in listing order, and comments
/// for a pull request are posted sequentially.
///
/// One run per repository at a time is assumed. Comments are re-read right
/// before the first post, which narrows the window for two overlapping runs
/// but does not close it.
pub struct Orchestrator {
    engine: PolicyEngine,
    options: RunOptions,
}

impl Orchestrator {
    pub fn new(engine: PolicyEngine, options: RunOptions) -> Self {
        Self { engine, options }
    }

    /// Build an orchestrator from validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`WardenError::Config`] if the configuration is incomplete.
    pub fn from_config(config: &WardenConfig, dry_run: bool) -> Result<Self, WardenError> {
        config.validate()?;
        let engine = PolicyEngine::from_config(&config.policy, &config.comments)?;
        Ok(Self::new(
            engine,
            RunOptions {
                username: config.github.username.clone(),
                organization: config.github.organization.clone(),
                repository: config.github.repository.clone(),
                window: config.github.window,
                dry_run,
            },
        ))
    }

    /// Resolve the bot identity, owner and repository for this run.
    ///
    /// # Errors
    ///
    /// Returns [`WardenError::Config`] if the credentials belong to another
    /// account than `github.username`, and [`WardenError::NotFound`] if the
    /// owner or repository cannot be resolved.
    pub async fn prepare<H>(&self, host: &H) -> Result<RunContext, WardenError>
    where
        H: RepositoryHost + ?Sized,
    {
        let bot_login = host.current_user().await?;
        if !bot_login.eq_ignore_ascii_case(&self.options.username) {
            return Err(WardenError::Config(format!(
                "token belongs to '{bot_login}', but github.username is '{}'",
                self.options.username
            )));
        }
        let owner = host
            .resolve_owner(&bot_login, self.options.organization.as_deref())
            .await?;
        let repository = host
            .resolve_repository(&owner, &self.options.repository)
            .await?;
        Ok(RunContext {
            bot_login,
            owner,
            repository,
        })
    }

    /// Run one pass: resolve, list, evaluate and post.
    ///
    /// `now` is the reference time for the staleness check.
    ///
    /// # Errors
    ///
    /// Fails when the owner, the repository or the pull request listing
    /// cannot be fetched. Per-pull-request fetch failures and failed posts
    /// are recorded in the report instead.
    pub async fn run<H>(&self, host: &H, now: DateTime<Utc>) -> Result<RunReport, WardenError>
    where
        H: RepositoryHost + ?Sized,
    {
        let ctx = self.prepare(host).await?;
        self.run_with(host, &ctx, now).await
    }

    /// Run one pass against an already resolved [`RunContext`].
    pub async fn run_with<H>(
        &self,
        host: &H,
        ctx: &RunContext,
        now: DateTime<Utc>,
    ) -> Result<RunReport, WardenError>
    where
        H: RepositoryHost + ?Sized,
    {
        let repo = &ctx.repository;
        let listed = host.list_pull_requests(repo, self.options.window).await?;
        tracing::info!(
            repository = %repo.full_name(),
            count = listed.len(),
            "examining pull requests"
        );

        let mut outcomes = Vec::with_capacity(listed.len());
        for summary in &listed {
            let pr = match host.fetch_pull_request(repo, summary).await {
                Ok(pr) => pr,
                Err(e) => {
                    tracing::warn!(pr = summary.number, error = %e, "skipping pull request");
                    outcomes.push(PullRequestOutcome {
                        number: summary.number,
                        title: summary.title.clone(),
                        evaluation: None,
                        error: Some(e.to_string()),
                        preempted: false,
                        posted: Vec::new(),
                        failed: Vec::new(),
                    });
                    continue;
                }
            };

            let evaluation = self.engine.evaluate(&pr, &ctx.bot_login, now);
            let mut posted = Vec::new();
            let mut failed = Vec::new();
            let mut error = None;
            let mut preempted = false;

            if !self.options.dry_run && !evaluation.actions.is_empty() {
                match host.list_comments(repo, pr.number).await {
                    Ok(comments) => {
                        preempted = comments.iter().any(|c| c.author == ctx.bot_login);
                        if preempted {
                            tracing::info!(pr = pr.number, "bot comment appeared since fetch, not posting");
                        }
                    }
                    Err(e) => {
                        tracing::warn!(pr = pr.number, error = %e, "skipping pull request");
                        error = Some(e.to_string());
                    }
                }
            }

            if !self.options.dry_run && !preempted && error.is_none() {
                for action in &evaluation.actions {
                    match host.post_comment(repo, &pr, &action.text).await {
                        Ok(()) => {
                            tracing::info!(pr = pr.number, policy = %action.policy, "posted comment");
                            posted.push(action.policy);
                        }
                        Err(e) => {
                            tracing::warn!(
                                pr = pr.number,
                                policy = %action.policy,
                                error = %e,
                                "failed to post comment"
                            );
                            failed.push(FailedPost {
                                policy: action.policy,
                                error: e.to_string(),
                            });
                        }
                    }
                }
            }

            outcomes.push(PullRequestOutcome {
                number: pr.number,
                title: pr.title.clone(),
                evaluation: Some(evaluation),
                error,
                preempted,
                posted,
                failed,
            });
        }

        let report = RunReport {
            repository: repo.full_name(),
            dry_run: self.options.dry_run,
            pull_requests: outcomes,
        };
        tracing::info!(
            examined = report.pull_requests.len(),
            candidates = report.candidates(),
            posted = report.actions_taken(),
            skipped = report.skipped(),
            failed = report.failed_posts(),
            "run complete"
        );
        Ok(report)
    }
}

impl fmt::Display for RunReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Policy Run: {}", self.repository)?;
        writeln!(f, "==============")?;
        writeln!(
            f,
            "Examined: {} | Candidates: {} | Posted: {} | Planned: {} | Skipped: {} | Failed: {}{}\n",
            self.pull_requests.len(),
            self.candidates(),
            self.actions_taken(),
            self.actions_planned(),
            self.skipped(),
            self.failed_posts(),
            if self.dry_run { " (dry run)" } else { "" },
        )?;

        if self.pull_requests.is_empty() {
            writeln!(f, "No open pull requests.")?;
        }
        for outcome in &self.pull_requests {
            match &outcome.evaluation {
                Some(eval) => {
                    write!(f, "{eval}")?;
                    if let Some(err) = &outcome.error {
                        writeln!(f, "  Not posted: {err}")?;
                    }
                    if outcome.preempted {
                        writeln!(f, "  Not posted: already commented")?;
                    }
                }
                None => writeln!(
                    f,
                    "#{} {}\n  Skipped: {}",
                    outcome.number,
                    outcome.title,
                    outcome.error.as_deref().unwrap_or("unknown error")
                )?,
            }
            for fp in &outcome.failed {
                writeln!(f, "  Failed to post {}: {}", fp.policy, fp.error)?;
            }
        }
        Ok(())
    }
}

impl RunReport {
    /// Render the report as markdown.
    ///
    /// # Examples
    ///
    /// ```
    /// use prwarden_review::orchestrator::RunReport;
    ///
    /// let report = RunReport {
    ///     repository: "avant/basic".into(),
    ///     dry_run: true,
    ///     pull_requests: vec![],
    /// };
    /// assert!(report.to_markdown().contains("# Policy Run"));
    /// ```
    pub fn to_markdown(&self) -> String {
        let mut out = format!("# Policy Run — `{}`\n\n", self.repository);
        out.push_str(&format!(
            "**Examined:** {} | **Candidates:** {} | **Posted:** {} | **Planned:** {} | **Skipped:** {} | **Failed:** {}\n\n",
            self.pull_requests.len(),
            self.candidates(),
            self.actions_taken(),
            self.actions_planned(),
            self.skipped(),
            self.failed_posts(),
        ));
        if self.dry_run {
            out.push_str("_Dry run: nothing was posted._\n\n");
        }
        for outcome in &self.pull_requests {
            match &outcome.evaluation {
                Some(eval) => {
                    out.push_str(&eval.to_markdown());
                    if let Some(err) = &outcome.error {
                        out.push_str(&format!("Not posted: {err}\n\n"));
                    }
                    if outcome.preempted {
                        out.push_str("Not posted: already commented\n\n");
                    }
                }
                None => out.push_str(&format!(
                    "## #{} {}\n\nSkipped: {}\n\n",
                    outcome.number,
                    outcome.title,
                    outcome.error.as_deref().unwrap_or("unknown error")
                )),
            }
        }
        out
    }
}
