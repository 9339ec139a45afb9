//! Core types, configuration, and error handling for prwarden.
//!
//! This crate provides the shared foundation used by the other prwarden crates:
//! - [`WardenError`] — unified error type using `thiserror`
//! - [`WardenConfig`] — configuration loaded from `.prwarden.toml`
//! - Pull request snapshot types: [`PullRequest`], [`FileChange`], [`Commit`],
//!   [`ExistingComment`]
//! - Policy outcome types: [`Policy`], [`PolicyVerdict`], [`CommentAction`],
//!   [`OutputFormat`]

mod config;
mod error;
mod types;

pub use config::{CommentTemplates, GithubConfig, PolicyConfig, WardenConfig};
pub use error::{NotFoundKind, WardenError};
pub use types::{
    CommentAction, Commit, ExistingComment, FileChange, OutputFormat, Policy, PolicyVerdict,
    PullRequest,
};

/// A convenience `Result` type for prwarden operations.
pub type Result<T> = std::result::Result<T, WardenError>;
