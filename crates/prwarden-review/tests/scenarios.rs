use std::collections::HashSet;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use prwarden_core::{
    Commit, ExistingComment, FileChange, NotFoundKind, Policy, PullRequest, WardenConfig,
    WardenError,
};
use prwarden_review::host::{Owner, OwnerKind, PullRequestSummary, Repository, RepositoryHost};
use prwarden_review::orchestrator::Orchestrator;

const BOT: &str = "meyerbot";

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 9, 16, 10, 0, 0).unwrap()
}

/// In-memory host. Posting a comment records it on the pull request, the
/// same way the real service would show it on the next pass.
struct FakeHost {
    user: String,
    orgs: Vec<String>,
    repos: Vec<(String, String)>,
    pulls: Mutex<Vec<PullRequest>>,
    broken_fetch: HashSet<u64>,
    broken_post: HashSet<u64>,
    /// Another run comments on these right after their details are fetched.
    raced: HashSet<u64>,
    posted: Mutex<Vec<(u64, String)>>,
}

impl FakeHost {
    fn new(pulls: Vec<PullRequest>) -> Self {
        Self {
            user: BOT.into(),
            orgs: vec!["Avant".into()],
            repos: vec![
                (BOT.into(), "sandbox".into()),
                ("Avant".into(), "basic".into()),
            ],
            pulls: Mutex::new(pulls),
            broken_fetch: HashSet::new(),
            broken_post: HashSet::new(),
            raced: HashSet::new(),
            posted: Mutex::new(Vec::new()),
        }
    }

    fn posted(&self) -> Vec<(u64, String)> {
        self.posted.lock().unwrap().clone()
    }

    fn add_bot_comment(&self, number: u64, text: &str) {
        if let Some(stored) = self
            .pulls
            .lock()
            .unwrap()
            .iter_mut()
            .find(|p| p.number == number)
        {
            stored.comments.push(ExistingComment {
                author: self.user.clone(),
                body: text.into(),
            });
        }
    }
}

#[async_trait]
impl RepositoryHost for FakeHost {
    async fn current_user(&self) -> Result<String, WardenError> {
        Ok(self.user.clone())
    }

    async fn resolve_owner(
        &self,
        username: &str,
        organization: Option<&str>,
    ) -> Result<Owner, WardenError> {
        match organization {
            None => Ok(Owner {
                login: username.into(),
                kind: OwnerKind::User,
            }),
            Some(org) => self
                .orgs
                .iter()
                .find(|o| o.eq_ignore_ascii_case(org))
                .map(|o| Owner {
                    login: o.clone(),
                    kind: OwnerKind::Organization,
                })
                .ok_or_else(|| WardenError::NotFound {
                    kind: NotFoundKind::Organization,
                    name: org.into(),
                    cause: format!("{username} has no such organization"),
                }),
        }
    }

    async fn resolve_repository(
        &self,
        owner: &Owner,
        name: &str,
    ) -> Result<Repository, WardenError> {
        self.repos
            .iter()
            .find(|(o, n)| *o == owner.login && n == name)
            .map(|(o, n)| Repository {
                owner: o.clone(),
                name: n.clone(),
            })
            .ok_or_else(|| WardenError::NotFound {
                kind: NotFoundKind::Repository,
                name: name.into(),
                cause: "no repository with that name".into(),
            })
    }

    async fn list_pull_requests(
        &self,
        _repo: &Repository,
        limit: usize,
    ) -> Result<Vec<PullRequestSummary>, WardenError> {
        Ok(self
            .pulls
            .lock()
            .unwrap()
            .iter()
            .take(limit)
            .map(|pr| PullRequestSummary {
                number: pr.number,
                title: pr.title.clone(),
                body: pr.body.clone(),
                created_at: pr.created_at,
            })
            .collect())
    }

    async fn fetch_pull_request(
        &self,
        _repo: &Repository,
        summary: &PullRequestSummary,
    ) -> Result<PullRequest, WardenError> {
        if self.broken_fetch.contains(&summary.number) {
            return Err(WardenError::Transient("connection reset".into()));
        }
        let snapshot = self
            .pulls
            .lock()
            .unwrap()
            .iter()
            .find(|pr| pr.number == summary.number)
            .cloned()
            .ok_or_else(|| WardenError::Transient("gone".into()))?;
        if self.raced.contains(&summary.number) {
            self.add_bot_comment(summary.number, "Tests?");
        }
        Ok(snapshot)
    }

    async fn list_comments(
        &self,
        _repo: &Repository,
        number: u64,
    ) -> Result<Vec<ExistingComment>, WardenError> {
        Ok(self
            .pulls
            .lock()
            .unwrap()
            .iter()
            .find(|pr| pr.number == number)
            .map(|pr| pr.comments.clone())
            .unwrap_or_default())
    }

    async fn post_comment(
        &self,
        _repo: &Repository,
        pr: &PullRequest,
        text: &str,
    ) -> Result<(), WardenError> {
        if self.broken_post.contains(&pr.number) {
            return Err(WardenError::Post("locked conversation".into()));
        }
        self.posted.lock().unwrap().push((pr.number, text.into()));
        self.add_bot_comment(pr.number, text);
        Ok(())
    }
}

fn config() -> WardenConfig {
    let mut config = WardenConfig::default();
    config.github.username = BOT.into();
    config.github.repository = "sandbox".into();
    config.policy.source_extensions = vec!["rb".into()];
    config
}

fn orchestrator(config: &WardenConfig) -> Orchestrator {
    Orchestrator::from_config(config, false).unwrap()
}

fn untidy_pr(number: u64) -> PullRequest {
    PullRequest {
        number,
        title: "Add invoice export".into(),
        body: "Exports invoices as CSV.".into(),
        created_at: now() - Duration::days(10),
        commits: vec![Commit {
            message: "add export".into(),
        }],
        files: vec![
            FileChange::new("app/export.rb", 5, 0),
            FileChange::new("app/csv.rb", 5, 2),
            FileChange::new("lib/format.rb", 5, 0),
            FileChange::new("README.md", 30, 0),
        ],
        comments: vec![],
    }
}

fn tidy_pr(number: u64, age_days: i64) -> PullRequest {
    PullRequest {
        number,
        title: "Pivotal #12345678 invoice export".into(),
        body: "Delivers pivotal story #12345678.".into(),
        created_at: now() - Duration::days(age_days),
        commits: vec![
            Commit {
                message: "spike".into(),
            },
            Commit {
                message: "[#12345678] add export".into(),
            },
        ],
        files: vec![
            FileChange::new("app/export.rb", 5, 0),
            FileChange::new("app/csv.rb", 5, 2),
            FileChange::new("test/export_test.rb", 5, 0),
            FileChange::new("README.md", 30, 0),
        ],
        comments: vec![],
    }
}

fn templates() -> prwarden_core::CommentTemplates {
    prwarden_core::CommentTemplates::default()
}

#[tokio::test]
async fn scenario_a_two_files_is_not_a_candidate() {
    let pr = PullRequest {
        files: vec![
            FileChange::new("app/a.rb", 25, 0),
            FileChange::new("app/b.rb", 25, 0),
        ],
        ..untidy_pr(1)
    };
    let host = FakeHost::new(vec![pr]);
    let report = orchestrator(&config()).run(&host, now()).await.unwrap();

    assert_eq!(report.actions_taken(), 0);
    assert_eq!(report.candidates(), 0);
    assert!(host.posted().is_empty());
}

#[tokio::test]
async fn scenario_b_missing_ticket_and_tests() {
    let host = FakeHost::new(vec![untidy_pr(2)]);
    let report = orchestrator(&config()).run(&host, now()).await.unwrap();

    assert_eq!(
        host.posted(),
        vec![(2, templates().ticket), (2, templates().tests)]
    );
    assert_eq!(report.actions_taken(), 2);
    assert_eq!(
        report.pull_requests[0].posted,
        vec![Policy::TicketReference, Policy::TestCoverage]
    );
}

#[tokio::test]
async fn scenario_c_fully_compliant() {
    let host = FakeHost::new(vec![tidy_pr(3, 1)]);
    let report = orchestrator(&config()).run(&host, now()).await.unwrap();

    assert_eq!(report.candidates(), 1);
    assert_eq!(report.actions_taken(), 0);
    assert!(host.posted().is_empty());
}

#[tokio::test]
async fn scenario_d_stale_but_compliant() {
    let host = FakeHost::new(vec![tidy_pr(4, 7)]);
    let report = orchestrator(&config()).run(&host, now()).await.unwrap();

    assert_eq!(host.posted(), vec![(4, templates().stale)]);
    assert_eq!(report.pull_requests[0].posted, vec![Policy::Staleness]);
}

#[tokio::test]
async fn second_pass_stays_silent() {
    let host = FakeHost::new(vec![untidy_pr(5), tidy_pr(6, 8)]);
    let orch = orchestrator(&config());

    let first = orch.run(&host, now()).await.unwrap();
    assert_eq!(first.actions_taken(), 3);

    let second = orch.run(&host, now() + Duration::days(3)).await.unwrap();
    assert_eq!(second.actions_taken(), 0);
    assert_eq!(host.posted().len(), 3);
}

#[tokio::test]
async fn window_limits_and_keeps_listing_order() {
    let host = FakeHost::new(vec![untidy_pr(30), untidy_pr(20), untidy_pr(10)]);
    let mut config = config();
    config.github.window = 2;
    config.policy.ticket_check = false;

    let report = orchestrator(&config).run(&host, now()).await.unwrap();
    let numbers: Vec<u64> = report.pull_requests.iter().map(|p| p.number).collect();
    assert_eq!(numbers, vec![30, 20]);
    assert_eq!(host.posted(), vec![(30, "Tests?".to_string()), (20, "Tests?".to_string())]);
}

#[tokio::test]
async fn fetch_failure_skips_only_that_pull_request() {
    let mut host = FakeHost::new(vec![untidy_pr(7), untidy_pr(8)]);
    host.broken_fetch.insert(7);

    let report = orchestrator(&config()).run(&host, now()).await.unwrap();
    assert_eq!(report.skipped(), 1);
    assert!(report.pull_requests[0].evaluation.is_none());
    assert!(report.pull_requests[0]
        .error
        .as_deref()
        .unwrap()
        .contains("connection reset"));
    assert_eq!(report.pull_requests[1].posted.len(), 2);
}

#[tokio::test]
async fn post_failure_is_isolated() {
    let mut host = FakeHost::new(vec![untidy_pr(9), untidy_pr(11)]);
    host.broken_post.insert(9);

    let report = orchestrator(&config()).run(&host, now()).await.unwrap();
    assert_eq!(report.failed_posts(), 2);
    assert_eq!(report.actions_taken(), 2);
    assert!(host.posted().iter().all(|(n, _)| *n == 11));
}

#[tokio::test]
async fn dry_run_plans_without_posting() {
    let host = FakeHost::new(vec![untidy_pr(12)]);
    let orch = Orchestrator::from_config(&config(), true).unwrap();

    let report = orch.run(&host, now()).await.unwrap();
    assert!(report.dry_run);
    assert_eq!(report.actions_taken(), 0);
    assert_eq!(report.actions_planned(), 2);
    assert!(host.posted().is_empty());
}

#[tokio::test]
async fn organization_matches_case_insensitively() {
    let host = FakeHost::new(vec![untidy_pr(13)]);
    let mut config = config();
    config.github.organization = Some("avant".into());
    config.github.repository = "basic".into();

    let report = orchestrator(&config).run(&host, now()).await.unwrap();
    assert_eq!(report.repository, "Avant/basic");
}

#[tokio::test]
async fn unknown_organization_is_fatal() {
    let host = FakeHost::new(vec![untidy_pr(14)]);
    let mut config = config();
    config.github.organization = Some("initech".into());

    let err = orchestrator(&config).run(&host, now()).await.unwrap_err();
    assert!(matches!(
        err,
        WardenError::NotFound {
            kind: NotFoundKind::Organization,
            ..
        }
    ));
    assert!(err.to_string().contains("initech"));
    assert!(host.posted().is_empty());
}

#[tokio::test]
async fn repository_name_must_match_exactly() {
    let host = FakeHost::new(vec![]);
    let mut config = config();
    config.github.repository = "Sandbox".into();

    let err = orchestrator(&config).run(&host, now()).await.unwrap_err();
    assert!(matches!(
        err,
        WardenError::NotFound {
            kind: NotFoundKind::Repository,
            ..
        }
    ));
}

#[test]
fn incomplete_config_is_rejected_before_any_fetch() {
    let mut config = config();
    config.github.repository.clear();
    let err = Orchestrator::from_config(&config, false).err().unwrap();
    assert!(matches!(err, WardenError::Config(_)));
}

#[tokio::test]
async fn comment_from_an_overlapping_run_suppresses_posting() {
    let mut host = FakeHost::new(vec![untidy_pr(15), untidy_pr(16)]);
    host.raced.insert(15);

    let report = orchestrator(&config()).run(&host, now()).await.unwrap();
    assert!(report.pull_requests[0].preempted);
    assert!(report.pull_requests[0].posted.is_empty());
    assert_eq!(report.actions_planned(), 4);
    assert!(host.posted().iter().all(|(n, _)| *n == 16));
}

#[tokio::test]
async fn username_case_differs_from_login_still_dedups() {
    let host = FakeHost::new(vec![untidy_pr(17)]);
    let mut config = config();
    config.github.username = "MeyerBot".into();
    let orch = orchestrator(&config);

    assert_eq!(orch.run(&host, now()).await.unwrap().actions_taken(), 2);
    assert_eq!(orch.run(&host, now()).await.unwrap().actions_taken(), 0);
    assert_eq!(host.posted().len(), 2);
}

#[tokio::test]
async fn token_for_another_account_is_rejected() {
    let host = FakeHost::new(vec![untidy_pr(18)]);
    let mut config = config();
    config.github.username = "otherbot".into();

    let err = orchestrator(&config).run(&host, now()).await.unwrap_err();
    assert!(matches!(err, WardenError::Config(_)));
    assert!(err.to_string().contains("otherbot"));
    assert!(host.posted().is_empty());
}
