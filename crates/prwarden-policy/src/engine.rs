use std::fmt;

use chrono::{DateTime, Utc};
use prwarden_core::{CommentAction, CommentTemplates, PolicyConfig, PullRequest, WardenError};
use serde::Serialize;

use crate::evaluate::{Evaluator, Verdicts};
use crate::filter::{filter_relevant, SourceMatcher};
use crate::gate::{assess, Candidacy, GateThresholds};
use crate::planner::plan;

/// Outcome of running every policy over one pull request.
///
/// # Examples
///
/// ```
/// use prwarden_policy::engine::Evaluation;
/// use prwarden_policy::gate::Candidacy;
///
/// let eval = Evaluation {
///     number: 4,
///     title: "Docs".into(),
///     relevant_files: 1,
///     changed_lines: 2,
///     candidacy: Candidacy::TooFewFiles { found: 1, required: 3 },
///     verdicts: None,
///     actions: vec![],
/// };
/// assert!(eval.actions.is_empty());
/// ```
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Evaluation {
    /// Pull request number.
    pub number: u64,
    /// Pull request title.
    pub title: String,
    /// Files that passed the source filter.
    pub relevant_files: usize,
    /// Lines counted toward the gate threshold.
    pub changed_lines: u64,
    /// Gate result.
    pub candidacy: Candidacy,
    /// Policy verdicts; `None` when the gate rejected the pull request.
    pub verdicts: Option<Verdicts>,
    /// Comments to post, in order.
    pub actions: Vec<CommentAction>,
}

/// Filter, gate, evaluate and plan for one pull request at a time.
///
/// Built once per run from configuration; holds no per-pull-request state.
#[derive(Debug, Clone)]
pub struct PolicyEngine {
    matcher: SourceMatcher,
    thresholds: GateThresholds,
    evaluator: Evaluator,
    templates: CommentTemplates,
}

impl PolicyEngine {
    /// # Errors
    ///
    /// Returns [`WardenError::Config`] for invalid source patterns or ticket settings.
    ///
    /// # Examples
    ///
    /// ```
    /// use prwarden_core::{CommentTemplates, PolicyConfig};
    /// use prwarden_policy::engine::PolicyEngine;
    ///
    /// let engine = PolicyEngine::from_config(&PolicyConfig::default(), &CommentTemplates::default());
    /// assert!(engine.is_ok());
    /// ```
    pub fn from_config(
        config: &PolicyConfig,
        templates: &CommentTemplates,
    ) -> Result<Self, WardenError> {
        Ok(Self {
            matcher: SourceMatcher::from_config(config)?,
            thresholds: GateThresholds::from_config(config),
            evaluator: Evaluator::from_config(config)?,
            templates: templates.clone(),
        })
    }

    /// Evaluate `pr` as seen by `bot_identity` at time `now`.
    ///
    /// Policy checks only run when the gate accepts the pull request.
    pub fn evaluate(&self, pr: &PullRequest, bot_identity: &str, now: DateTime<Utc>) -> Evaluation {
        let relevant = filter_relevant(&pr.files, &self.matcher);
        let changed_lines = relevant.changed_lines(self.thresholds.count_deletions);
        let candidacy = assess(pr, &relevant, bot_identity, &self.thresholds);

        let (verdicts, actions) = if candidacy.is_candidate() {
            let verdicts = self.evaluator.evaluate(pr, &relevant, now);
            tracing::debug!(
                pr = pr.number,
                ticket = %verdicts.ticket,
                tests = %verdicts.tests,
                staleness = %verdicts.staleness,
                "evaluated pull request"
            );
            let actions = plan(&verdicts, &self.templates);
            (Some(verdicts), actions)
        } else {
            tracing::debug!(pr = pr.number, reason = %candidacy, "skipping pull request");
            (None, Vec::new())
        };

        Evaluation {
            number: pr.number,
            title: pr.title.clone(),
            relevant_files: relevant.len(),
            changed_lines,
            candidacy,
            verdicts,
            actions,
        }
    }
}

impl fmt::Display for Evaluation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "#{} {}", self.number, self.title)?;
        writeln!(
            f,
            "  Relevant files: {} | Changed lines: {} | Gate: {}",
            self.relevant_files, self.changed_lines, self.candidacy
        )?;
        if let Some(v) = &self.verdicts {
            writeln!(
                f,
                "  Ticket: {} | Tests: {} | Staleness: {}",
                v.ticket, v.tests, v.staleness
            )?;
        }
        if self.actions.is_empty() {
            writeln!(f, "  No comments planned.")?;
        } else {
            for action in &self.actions {
                writeln!(f, "  [{}] {}", action.policy, action.text)?;
            }
        }
        Ok(())
    }
}

impl Evaluation {
    /// Render the evaluation as markdown.
    pub fn to_markdown(&self) -> String {
        let mut out = format!("## #{} {}\n\n", self.number, self.title);
        out.push_str(&format!(
            "**Relevant files:** {} | **Changed lines:** {} | **Gate:** {}\n\n",
            self.relevant_files, self.changed_lines, self.candidacy
        ));
        if let Some(v) = &self.verdicts {
            out.push_str("| Policy | Verdict |\n|---|---|\n");
            out.push_str(&format!("| ticket-reference | {} |\n", v.ticket));
            out.push_str(&format!("| test-coverage | {} |\n", v.tests));
            out.push_str(&format!("| staleness | {} |\n\n", v.staleness));
        }
        for action in &self.actions {
            out.push_str(&format!("> **{}:** {}\n\n", action.policy, action.text));
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};
    use prwarden_core::{Commit, ExistingComment, FileChange, Policy, PolicyVerdict};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 10, 9, 0, 0).unwrap()
    }

    fn engine() -> PolicyEngine {
        let config = PolicyConfig {
            source_extensions: vec!["rb".into()],
            ..PolicyConfig::default()
        };
        PolicyEngine::from_config(&config, &CommentTemplates::default()).unwrap()
    }

    fn big_pr() -> PullRequest {
        PullRequest {
            number: 12,
            title: "Pivotal #87654321 invoices".into(),
            body: "pivotal 87654321".into(),
            created_at: now() - Duration::days(1),
            commits: vec![Commit {
                message: "[#87654321] invoices".into(),
            }],
            files: vec![
                FileChange::new("app/invoice.rb", 10, 0),
                FileChange::new("app/pdf.rb", 10, 0),
                FileChange::new("test/invoice_test.rb", 10, 0),
            ],
            comments: vec![],
        }
    }

    #[test]
    fn enormous_additions_still_pass_the_gate() {
        let mut pr = big_pr();
        pr.files[0].additions = u64::MAX;
        let eval = engine().evaluate(&pr, "meyerbot", now());
        assert_eq!(eval.changed_lines, u64::MAX);
        assert!(eval.candidacy.is_candidate());
    }

    #[test]
    fn rejected_pull_requests_get_no_verdicts() {
        let mut pr = big_pr();
        pr.files.truncate(2);
        let eval = engine().evaluate(&pr, "meyerbot", now());
        assert!(matches!(eval.candidacy, Candidacy::TooFewFiles { .. }));
        assert!(eval.verdicts.is_none());
        assert!(eval.actions.is_empty());
    }

    #[test]
    fn already_commented_short_circuits_everything() {
        let mut pr = big_pr();
        pr.files.retain(|f| !f.path.starts_with("test/"));
        pr.files.push(FileChange::new("lib/x.rb", 5, 0));
        pr.comments.push(ExistingComment {
            author: "meyerbot".into(),
            body: "Tests?".into(),
        });
        let eval = engine().evaluate(&pr, "meyerbot", now());
        assert_eq!(eval.candidacy, Candidacy::AlreadyCommented);
        assert!(eval.actions.is_empty());
    }

    #[test]
    fn compliant_candidate_has_satisfied_verdicts() {
        let eval = engine().evaluate(&big_pr(), "meyerbot", now());
        assert!(eval.candidacy.is_candidate());
        let verdicts = eval.verdicts.unwrap();
        assert_eq!(verdicts.ticket, PolicyVerdict::Satisfied);
        assert_eq!(verdicts.tests, PolicyVerdict::Satisfied);
        assert_eq!(verdicts.staleness, PolicyVerdict::Satisfied);
        assert!(eval.actions.is_empty());
    }

    #[test]
    fn rendering_lists_actions() {
        let mut pr = big_pr();
        pr.files[2] = FileChange::new("lib/other.rb", 10, 0);
        let eval = engine().evaluate(&pr, "meyerbot", now());
        assert_eq!(eval.actions[0].policy, Policy::TestCoverage);

        let text = eval.to_string();
        assert!(text.contains("#12"));
        assert!(text.contains("[test-coverage] Tests?"));

        let md = eval.to_markdown();
        assert!(md.contains("| test-coverage | violated |"));

        let json = serde_json::to_value(&eval).unwrap();
        assert_eq!(json["candidacy"]["status"], "candidate");
        assert_eq!(json["relevantFiles"], 3);
    }
}
