use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{CommandFactory, Parser, Subcommand};
use miette::{Context, IntoDiagnostic, Result};
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use prwarden_core::{OutputFormat, PullRequest, WardenConfig};
use prwarden_policy::engine::PolicyEngine;
use prwarden_review::github::GitHubHost;
use prwarden_review::host::{Repository, RepositoryHost};
use prwarden_review::orchestrator::Orchestrator;

#[derive(Parser)]
#[command(
    name = "prwarden",
    version,
    about = "Pull request policy bot",
    long_about = "prwarden looks at the most recent open pull requests of a repository and\n\
                   leaves a short comment when one is missing tests, a tracking ticket, or a\n\
                   merge decision. It comments at most once per pull request.\n\n\
                   Examples:\n  \
                     prwarden run                     Evaluate and comment\n  \
                     prwarden run --dry-run           Show what would be posted\n  \
                     prwarden check --pr acme/app#42  Evaluate one pull request\n  \
                     prwarden init                    Write a starter .prwarden.toml"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file (default: .prwarden.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format: text, json or markdown
    #[arg(long, global = true, default_value = "text")]
    format: OutputFormat,

    /// Enable debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    log_json: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Evaluate recent pull requests and post comments
    #[command(long_about = "Evaluate recent pull requests and post comments.\n\n\
        Resolves the configured owner and repository, lists the most recent open pull\n\
        requests, and posts one comment per violated policy. Pull requests the bot has\n\
        already commented on are left alone.\n\n\
        Examples:\n  prwarden run\n  prwarden run --dry-run --window 30\n  prwarden run --org acme --repo billing")]
    Run {
        /// Plan comments without posting them
        #[arg(long)]
        dry_run: bool,
        /// Number of most recent pull requests to examine
        #[arg(long)]
        window: Option<usize>,
        /// Repository name (overrides github.repository)
        #[arg(long)]
        repo: Option<String>,
        /// Organization owning the repository (overrides github.organization)
        #[arg(long)]
        org: Option<String>,
        /// Bot account login (overrides github.username)
        #[arg(long)]
        username: Option<String>,
    },
    /// Evaluate a single pull request without posting
    #[command(long_about = "Evaluate a single pull request without posting.\n\n\
        Reads a pull request snapshot from a JSON file, or fetches one from GitHub,\n\
        and prints the gate result, the policy verdicts and the planned comments.\n\n\
        Examples:\n  prwarden check --file pr.json\n  prwarden check --pr acme/app#42 --now 2024-06-01T00:00:00Z")]
    Check {
        /// JSON snapshot of a pull request
        #[arg(long, conflicts_with = "pr")]
        file: Option<PathBuf>,
        /// GitHub pull request (format: owner/repo#123)
        #[arg(long)]
        pr: Option<String>,
        /// Reference time for the staleness check (RFC 3339, default: now)
        #[arg(long)]
        now: Option<DateTime<Utc>>,
        /// Bot account login (overrides github.username)
        #[arg(long)]
        username: Option<String>,
    },
    /// Create a default .prwarden.toml configuration file
    #[command(long_about = "Create a default .prwarden.toml configuration file.\n\n\
        Generates a template with every option and its default.\n\
        Fails if .prwarden.toml already exists.")]
    Init,
    /// Generate shell completion scripts
    #[command(hide = true)]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

const DEFAULT_CONFIG: &str = r#"# prwarden configuration

[github]
# Bot account. Also used to recognise the bot's own comments.
username = ""
# token = "ghp_..."            # or export GITHUB_TOKEN
repository = ""
# organization = "acme"
window = 10

[policy]
min_files = 3
min_lines = 10
count_deletions = false
# source_extensions = ["rb", "py"]
# source_patterns = ["app/**/*.rb"]
test_dirs = ["test", "tests", "spec"]
ticket_check = true
ticket_keyword = "pivotal"
ticket_digits = 8
staleness_check = true
stale_after_days = 6

[comments]
tests = "Tests?"
# ticket = "Please link the Pivotal story."
# stale = "Merge or close?"
"#;

fn init_tracing(json: bool, level: Level) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));

    if json {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr).json())
            .try_init()
            .ok();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().with_target(false).with_writer(std::io::stderr))
            .try_init()
            .ok();
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<WardenConfig> {
    let mut config = match path {
        Some(path) => WardenConfig::from_file(path)
            .into_diagnostic()
            .wrap_err(format!("reading {}", path.display()))?,
        None => {
            let default_path = std::path::Path::new(".prwarden.toml");
            if default_path.exists() {
                WardenConfig::from_file(default_path)?
            } else {
                WardenConfig::default()
            }
        }
    };
    config.apply_env();
    Ok(config)
}

fn print_output<T>(format: OutputFormat, value: &T, markdown: impl FnOnce(&T) -> String) -> Result<()>
where
    T: serde::Serialize + std::fmt::Display,
{
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(value).into_diagnostic()?);
        }
        OutputFormat::Markdown => print!("{}", markdown(value)),
        OutputFormat::Text => print!("{value}"),
    }
    Ok(())
}

async fn load_pull_request(
    file: Option<&PathBuf>,
    pr_ref: Option<&str>,
    token: Option<&str>,
) -> Result<PullRequest> {
    match (file, pr_ref) {
        (Some(path), _) => {
            let content = std::fs::read_to_string(path)
                .into_diagnostic()
                .wrap_err(format!("reading {}", path.display()))?;
            let pr: PullRequest = serde_json::from_str(&content)
                .into_diagnostic()
                .wrap_err(format!("parsing {}", path.display()))?;
            Ok(pr)
        }
        (None, Some(pr_ref)) => {
            let (owner, name, number) = prwarden_review::github::parse_pr_reference(pr_ref)?;
            let host = GitHubHost::new(token)?;
            let repo = Repository { owner, name };
            let summary = host.get_pull_request(&repo, number).await?;
            Ok(host.fetch_pull_request(&repo, &summary).await?)
        }
        (None, None) => Err(miette::miette!(
            help = "Use --file pr.json or --pr owner/repo#123",
            "no pull request given"
        )),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .expect("miette handler");
    human_panic::setup_panic!();

    let cli = Cli::parse();
    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    init_tracing(cli.log_json, level);

    match cli.command {
        None => {
            Cli::command().print_help().into_diagnostic()?;
        }
        Some(Command::Run {
            dry_run,
            window,
            repo,
            org,
            username,
        }) => {
            let mut config = load_config(cli.config.as_ref())?;
            if let Some(window) = window {
                config.github.window = window;
            }
            if let Some(repo) = repo {
                config.github.repository = repo;
            }
            if org.is_some() {
                config.github.organization = org;
            }
            if let Some(username) = username {
                config.github.username = username;
            }

            let orchestrator = Orchestrator::from_config(&config, dry_run)?;
            let host = GitHubHost::new(config.github.token.as_deref())?;
            let report = orchestrator.run(&host, Utc::now()).await?;

            print_output(cli.format, &report, |r| r.to_markdown())?;

            if report.failed_posts() > 0 || report.skipped() > 0 {
                tracing::warn!(
                    skipped = report.skipped(),
                    failed = report.failed_posts(),
                    "run finished with errors"
                );
            }
        }
        Some(Command::Check {
            file,
            pr,
            now,
            username,
        }) => {
            let mut config = load_config(cli.config.as_ref())?;
            if let Some(username) = username {
                config.github.username = username;
            }
            let engine = PolicyEngine::from_config(&config.policy, &config.comments)?;
            let pull_request =
                load_pull_request(file.as_ref(), pr.as_deref(), config.github.token.as_deref())
                    .await?;

            let evaluation = engine.evaluate(
                &pull_request,
                &config.github.username,
                now.unwrap_or_else(Utc::now),
            );
            print_output(cli.format, &evaluation, |e| e.to_markdown())?;
        }
        Some(Command::Init) => {
            let path = std::path::Path::new(".prwarden.toml");
            if path.exists() {
                miette::bail!(".prwarden.toml already exists");
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            println!("Created .prwarden.toml with default configuration");
        }
        Some(Command::Completions { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "prwarden", &mut std::io::stdout());
        }
    }

    Ok(())
}
