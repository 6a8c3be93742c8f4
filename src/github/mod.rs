//! GitHub issue tracking for audit findings.
//!
//! Provides a preflight check of the token and repository, and one issue per
//! finding. When the preflight fails, every issue is logged as a dry run instead.

pub mod client;
pub mod notifier;

pub use client::{GitHubClient, Preflight};
pub use notifier::{issues_for, TicketNotifier};
