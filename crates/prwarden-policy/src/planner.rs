use prwarden_core::{CommentAction, CommentTemplates, Policy};

use crate::evaluate::Verdicts;

/// Turn verdicts into the comments to post, in posting order.
///
/// Ticket first, then tests. The staleness nudge is only planned when tests
/// are not the open issue, so a pull request never gets both.
///
/// # Examples
///
/// ```
/// use prwarden_core::{CommentTemplates, Policy, PolicyVerdict};
/// use prwarden_policy::evaluate::Verdicts;
/// use prwarden_policy::planner::plan;
///
/// let verdicts = Verdicts {
///     ticket: PolicyVerdict::Satisfied,
///     tests: PolicyVerdict::Violated,
///     staleness: PolicyVerdict::Violated,
/// };
/// let actions = plan(&verdicts, &CommentTemplates::default());
/// assert_eq!(actions.len(), 1);
/// assert_eq!(actions[0].policy, Policy::TestCoverage);
/// ```
pub fn plan(verdicts: &Verdicts, templates: &CommentTemplates) -> Vec<CommentAction> {
    let mut actions = Vec::new();

    if verdicts.ticket.is_violated() {
        actions.push(CommentAction {
            policy: Policy::TicketReference,
            text: templates.ticket.clone(),
        });
    }

    if verdicts.tests.is_violated() {
        actions.push(CommentAction {
            policy: Policy::TestCoverage,
            text: templates.tests.clone(),
        });
    } else if verdicts.staleness.is_violated() {
        actions.push(CommentAction {
            policy: Policy::Staleness,
            text: templates.stale.clone(),
        });
    }

    actions
}

#[cfg(test)]
mod tests {
    use super::*;
    use prwarden_core::PolicyVerdict::{self, NotApplicable, Satisfied, Violated};

    fn policies(ticket: PolicyVerdict, tests: PolicyVerdict, staleness: PolicyVerdict) -> Vec<Policy> {
        let verdicts = Verdicts {
            ticket,
            tests,
            staleness,
        };
        plan(&verdicts, &CommentTemplates::default())
            .into_iter()
            .map(|a| a.policy)
            .collect()
    }

    #[test]
    fn compliant_gets_nothing() {
        assert!(policies(Satisfied, Satisfied, Satisfied).is_empty());
    }

    #[test]
    fn ticket_and_tests_in_order() {
        assert_eq!(
            policies(Violated, Violated, Satisfied),
            vec![Policy::TicketReference, Policy::TestCoverage]
        );
    }

    #[test]
    fn ticket_and_staleness() {
        assert_eq!(
            policies(Violated, Satisfied, Violated),
            vec![Policy::TicketReference, Policy::Staleness]
        );
    }

    #[test]
    fn never_tests_and_staleness_together() {
        for ticket in [NotApplicable, Satisfied, Violated] {
            let planned = policies(ticket, Violated, Violated);
            assert!(planned.contains(&Policy::TestCoverage));
            assert!(!planned.contains(&Policy::Staleness));
        }
    }

    #[test]
    fn not_applicable_plans_nothing() {
        assert_eq!(
            policies(NotApplicable, Satisfied, NotApplicable),
            Vec::<Policy>::new()
        );
    }

    #[test]
    fn uses_template_text() {
        let templates = CommentTemplates {
            stale: "Merge or close?".into(),
            ..CommentTemplates::default()
        };
        let verdicts = Verdicts {
            ticket: Satisfied,
            tests: Satisfied,
            staleness: Violated,
        };
        let actions = plan(&verdicts, &templates);
        assert_eq!(actions[0].text, "Merge or close?");
    }
}
