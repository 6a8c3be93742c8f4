//! Entra ID Privileged Identity Management (PIM) audit.
//!
//! This module provides functionality for:
//! - Fetching role assignments, eligibility schedules and activation instances
//! - Resolving role definition and principal names
//! - Classifying standing, stale and long-running privileged access

pub mod audit;
pub mod cache;
pub mod client;
pub mod models;
pub mod policy;
pub mod resolver;

pub use audit::{classify, AuditInput};
pub use client::DirectoryClient;
pub use models::{AuditReport, LongActivation, Metrics, PermanentAssignment, StaleEligibility};
pub use policy::Policy;
pub use resolver::{GraphNameLookup, NameLookup};
