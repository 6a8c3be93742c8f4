//! PIM audit - Entra ID privileged access review
//!
//! Pulls role assignments, eligibilities and activations from Microsoft Graph,
//! flags standing, stale and over-long privileged access, writes evidence files
//! and optionally files GitHub issues.

#![deny(clippy::all)]

mod auth;
mod config;
mod error;
mod evidence;
mod github;
mod pim;

use anyhow::{Context, Result};
use chrono::Utc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use auth::OAuth2Client;
use config::Config;
use error::{AppError, AuthError};
use evidence::EvidenceWriter;
use github::{issues_for, GitHubClient, Preflight, TicketNotifier};
use pim::{classify, AuditInput, DirectoryClient, GraphNameLookup};

fn main() {
    // Load .env file (if present) before anything else
    if let Err(e) = dotenvy::dotenv() {
        // .env file is optional - only log if it's not a "file not found" error
        if !e.to_string().contains("not found") {
            eprintln!("Warning: Failed to load .env file: {}", e);
        }
    }

    let config = match Config::load() {
        Ok(c) => c,
        Err(e) => {
            let err = AppError::from(e);
            eprintln!("{}", err);
            eprintln!("{}", err.user_message());
            std::process::exit(1);
        }
    };

    init_logging(&config.logging.level);

    info!("Starting {} v{}", config.app.name, env!("CARGO_PKG_VERSION"));

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(rt) => rt,
        Err(e) => {
            eprintln!("Failed to create Tokio runtime: {}", e);
            std::process::exit(1);
        }
    };

    if let Err(e) = runtime.block_on(run(config)) {
        report_failure(&e);
        std::process::exit(1);
    }
}

/// Initialize the tracing subscriber. `RUST_LOG` wins over the configured level.
fn init_logging(level: &str) {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .or_else(|_| EnvFilter::try_new(level))
                .unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_thread_ids(false)
        .init();
}

/// One full audit: authenticate, fetch, classify, write evidence, notify.
async fn run(config: Config) -> Result<()> {
    let oauth_client = OAuth2Client::new(&config)?;
    let token = oauth_client
        .acquire_token()
        .await
        .map_err(AppError::from)?;
    info!("Directory token acquired");

    let notifier = match &config.github {
        Some(target) => {
            let client = GitHubClient::new(
                &config.api.github_api_url,
                target.clone(),
                &config.app.user_agent,
                &config.http,
            )
            .map_err(AppError::from)?;

            let preflight = client.preflight().await;
            match &preflight {
                Preflight::Ready { login } => {
                    info!("Filing issues in {} as {}", target.slug(), login)
                }
                Preflight::DryRun { reason } => {
                    info!("GitHub issues in DRY RUN mode: {}", reason)
                }
            }
            TicketNotifier::new(Some(client), preflight.is_ready())
        }
        None => {
            info!("GitHub repository not configured, issues run in DRY RUN mode");
            TicketNotifier::new(None, false)
        }
    };

    let directory = DirectoryClient::new(&config.api.graph_base_url, token, &config.http)
        .map_err(AppError::from)?;

    let input = fetch_input(&directory).await.map_err(AppError::from)?;
    info!(
        "Fetched {} assignments, {} eligibilities, {} activation instances",
        input.assignments.len(),
        input.eligibilities.len(),
        input.instances.len()
    );

    let mut names = GraphNameLookup::new(&directory);
    names.preload().await;

    let report = classify(&input, &config.policy, Utc::now(), &mut names).await;
    match names.cache().bulk_loaded_at() {
        Some(at) => info!(
            "Role name cache holds {} definitions (bulk load at {})",
            names.cache().len(),
            at.to_rfc3339()
        ),
        None => warn!(
            "Role names resolved per id, cache holds {}",
            names.cache().len()
        ),
    }

    let writer = EvidenceWriter::new(&config.output.evidence_dir);
    if let Some(previous) = writer.previous_report() {
        info!(
            "Previous run {}: {} permanent, {} stale, {} long (now {}, {}, {})",
            previous.metrics.timestamp,
            previous.metrics.permanent_privileged_assignments,
            previous.metrics.stale_eligibilities,
            previous.metrics.long_activations,
            report.metrics.permanent_privileged_assignments,
            report.metrics.stale_eligibilities,
            report.metrics.long_activations
        );
    }
    let files = writer.write(&report).map_err(AppError::from)?;
    info!(
        "Evidence under {}: {} and {} tables",
        writer.root().display(),
        files.snapshot.display(),
        files.tables.len()
    );

    let issues = issues_for(&report, &config.policy).map_err(AppError::from)?;
    notifier.notify(&issues).await.map_err(AppError::from)?;
    if !notifier.is_enabled() && !issues.is_empty() {
        info!("{} issue(s) logged as dry run", issues.len());
    }

    let summary =
        serde_json::to_string_pretty(&report.metrics).context("Failed to render summary")?;
    println!("Summary:");
    println!("{}", summary);

    Ok(())
}

async fn fetch_input(directory: &DirectoryClient) -> Result<AuditInput, error::ApiError> {
    Ok(AuditInput {
        assignments: directory.role_assignments().await?,
        eligibilities: directory.role_eligibility_schedules().await?,
        instances: directory.role_assignment_schedule_instances().await?,
    })
}

fn report_failure(err: &anyhow::Error) {
    let Some(app_err) = err.downcast_ref::<AppError>() else {
        error!("{:#}", err);
        eprintln!("Error: {:#}", err);
        return;
    };

    error!("{}", app_err);
    if app_err.is_fatal_startup() {
        error!("Stopped before any directory data was fetched");
    }
    if let AppError::Auth(AuthError::Rejected {
        error,
        description,
        correlation_id,
    }) = app_err
    {
        eprintln!("[AUTH ERROR] Token request failed");
        eprintln!("  error: {}", error);
        eprintln!("  error_description: {}", description);
        if let Some(id) = correlation_id {
            eprintln!("  correlation_id: {}", id);
        }
    } else {
        eprintln!("Error: {}", app_err);
    }
    eprintln!("{}", app_err.user_message());
}
