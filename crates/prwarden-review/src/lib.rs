//! Runs the pull request policies against a hosting service.
//!
//! Provides the [`host::RepositoryHost`] abstraction, its GitHub
//! implementation, and the [`orchestrator::Orchestrator`] that fetches pull
//! requests, evaluates them and posts the planned comments.

pub mod github;
pub mod host;
pub mod orchestrator;
