//! finhealth - financial-health dashboard command-line client
//!
//! Thin view over [`finhealth_client::Dashboard`]: each subcommand runs one
//! coordination flow against the configured backend and prints the result.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use finhealth_client::report::failure_notice;
use finhealth_client::{ClientError, Dashboard, SignupForm};
use finhealth_common::config::{ConfigOverrides, ConfigResolver, SessionPolicy};
use finhealth_common::events::{DashboardEvent, DocumentCategory, LinkStatus};
use tokio::signal;
use tracing::{debug, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Command-line arguments for finhealth
///
/// Global options override `FINHEALTH_*` environment variables and the
/// TOML config file.
#[derive(Parser, Debug)]
#[command(name = "finhealth")]
#[command(about = "Financial-health dashboard client")]
#[command(version)]
struct Args {
    /// Backend API base URL
    #[arg(long, global = true)]
    api_url: Option<String>,

    /// Consent status poll interval in milliseconds
    #[arg(long, global = true)]
    poll_interval_ms: Option<u64>,

    /// Session persistence: persistent, process-scoped, always-login
    #[arg(long, global = true)]
    session_policy: Option<SessionPolicy>,

    /// Session file location
    #[arg(long, global = true)]
    session_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Log in and store the session
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "FINHEALTH_PASSWORD")]
        password: String,
    },
    /// Create an account
    Signup {
        #[arg(long)]
        email: String,
        #[arg(long, env = "FINHEALTH_PASSWORD")]
        password: String,
        #[arg(long)]
        full_name: String,
        #[arg(long)]
        company_name: String,
    },
    /// Discard the stored session
    Logout,
    /// Show the logged-in profile
    Whoami,
    /// Upload one document (bank, accounting, gst)
    Upload {
        category: DocumentCategory,
        file: PathBuf,
    },
    /// Upload all three documents, then compute metrics
    Onboard {
        #[arg(long)]
        bank: PathBuf,
        #[arg(long)]
        accounting: PathBuf,
        #[arg(long)]
        gst: PathBuf,
    },
    /// Load metrics and notifications and summarize readiness
    Status,
    /// Recompute metrics now
    Compute,
    /// Link a bank account and wait for approval (Ctrl+C to stop waiting)
    Link { identifier: String },
    /// Check the bank consent status once
    ConsentStatus,
    /// Reset the bank consent
    Unlink,
    /// List notifications
    Notifications,
    /// Download the PDF report
    Export {
        /// Output directory (defaults to the configured report dir)
        #[arg(long)]
        out: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let overrides = ConfigOverrides {
        api_base_url: args.api_url.clone(),
        poll_interval_ms: args.poll_interval_ms,
        session_policy: args.session_policy,
        session_file: args.session_file.clone(),
        report_dir: match &args.command {
            Command::Export { out } => out.clone(),
            _ => None,
        },
    };
    let config = ConfigResolver::new(overrides)
        .resolve()
        .context("Invalid configuration")?;

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!(
                    "finhealth_client={level},finhealth_common={level}",
                    level = config.log_level
                )
                .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    debug!(api = %config.api_base_url, "Configuration resolved");

    let dashboard = Dashboard::connect(config)
        .await
        .context("Failed to initialize dashboard client")?;

    let result = run(&dashboard, args.command).await;
    dashboard.shutdown().await;
    result
}

async fn run(dashboard: &Dashboard, command: Command) -> Result<()> {
    match command {
        Command::Login { email, password } => {
            let profile = dashboard.login(&email, &password).await.map_err(notice)?;
            println!("Logged in as {} ({})", profile.display_name, profile.organization_name);
        }
        Command::Signup {
            email,
            password,
            full_name,
            company_name,
        } => {
            let form = SignupForm {
                email,
                password,
                full_name,
                company_name,
            };
            let ack = dashboard.signup(form).await.map_err(notice)?;
            println!("{}", ack.message.as_deref().unwrap_or("Account created. You can now log in."));
        }
        Command::Logout => {
            dashboard.logout().await.map_err(notice)?;
            println!("Logged out");
        }
        Command::Whoami => match dashboard.profile().await {
            Some(profile) => println!(
                "{} <{}>\n{}",
                profile.display_name, profile.email, profile.organization_name
            ),
            None => println!("Not logged in"),
        },
        Command::Upload { category, file } => {
            require_session(dashboard).await?;
            dashboard.upload_file(category, &file).await.map_err(notice)?;
            println!("{} uploaded: {}", category, file.display());
        }
        Command::Onboard { bank, accounting, gst } => {
            require_session(dashboard).await?;
            for (category, file) in [
                (DocumentCategory::Bank, bank),
                (DocumentCategory::Accounting, accounting),
                (DocumentCategory::TaxFiling, gst),
            ] {
                dashboard.upload_file(category, &file).await.map_err(notice)?;
                println!("{} uploaded: {}", category, file.display());
            }
            let snapshot = dashboard.compute_metrics().await.map_err(notice)?;
            print_metrics_summary(snapshot.has_any_data(), snapshot.metrics.health_score());
        }
        Command::Status => {
            require_session(dashboard).await?;
            let outcome = dashboard.load_dashboard().await;
            if let Some(e) = &outcome.metrics_error {
                println!("Metrics unavailable: {}", e.user_message());
            }
            if let Some(e) = &outcome.notifications_error {
                println!("Notifications unavailable: {}", e.user_message());
            }
            if let Some(snapshot) = dashboard.cache().snapshot().await {
                print_metrics_summary(snapshot.has_any_data(), snapshot.metrics.health_score());
            }
            println!(
                "Dashboard: {}",
                if outcome.ready_for_dashboard { "ready" } else { "onboarding required" }
            );
            println!("Notifications: {}", dashboard.cache().notifications().await.len());
        }
        Command::Compute => {
            require_session(dashboard).await?;
            let snapshot = dashboard.refresh_metrics().await.map_err(notice)?;
            print_metrics_summary(snapshot.has_any_data(), snapshot.metrics.health_score());
        }
        Command::Link { identifier } => {
            require_session(dashboard).await?;
            link_and_wait(dashboard, &identifier).await?;
        }
        Command::ConsentStatus => {
            require_session(dashboard).await?;
            dashboard.check_consent().await.map_err(notice)?;
            print_consent(dashboard).await;
        }
        Command::Unlink => {
            require_session(dashboard).await?;
            dashboard.reset_consent().await.map_err(notice)?;
            println!("Bank consent reset");
        }
        Command::Notifications => {
            require_session(dashboard).await?;
            let list = dashboard.refresh_notifications().await.map_err(notice)?;
            if list.is_empty() {
                println!("No notifications");
            }
            for n in list {
                let priority = n.priority.as_deref().unwrap_or("normal");
                println!("[{}] {} ({}): {}", n.id, n.title, priority, n.message);
            }
        }
        Command::Export { .. } => {
            require_session(dashboard).await?;
            match dashboard.export_report().await {
                Ok(report) => println!("Report saved to {} ({} bytes)", report.location, report.size_bytes),
                Err(e) => bail!(failure_notice(&e)),
            }
        }
    }
    Ok(())
}

/// Reuse an existing consent or initiate one, then follow status events until active or Ctrl+C
async fn link_and_wait(dashboard: &Dashboard, identifier: &str) -> Result<()> {
    let mut rx = dashboard.events().subscribe();
    if let Err(e) = dashboard.check_consent().await {
        warn!("Could not check existing consent: {}", e);
    }
    let link = dashboard.consent_link().await;
    let url = match link.status {
        LinkStatus::Active => {
            println!("Bank account already linked");
            return Ok(());
        }
        LinkStatus::PendingApproval => {
            dashboard.consent().start_polling().await;
            link.approval_url.unwrap_or_default()
        }
        LinkStatus::Unlinked => dashboard.initiate_consent(identifier).await.map_err(notice)?,
    };
    println!("Approve the consent request at:\n  {}", url);
    println!("Waiting for approval (Ctrl+C to stop waiting)...");

    loop {
        tokio::select! {
            _ = signal::ctrl_c() => {
                info!("Stopped waiting for consent approval");
                println!("Stopped waiting; consent is still pending");
                return Ok(());
            }
            event = rx.recv() => match event {
                Ok(DashboardEvent::ConsentStatusChanged { new_status, approval_url, .. }) => {
                    match new_status {
                        LinkStatus::Active => {
                            println!("Bank account linked");
                            return Ok(());
                        }
                        LinkStatus::PendingApproval => {
                            if let Some(url) = approval_url {
                                println!("Approval link updated:\n  {}", url);
                            }
                        }
                        LinkStatus::Unlinked => bail!("Consent was withdrawn"),
                    }
                }
                Ok(_) => {}
                Err(tokio::sync::broadcast::error::RecvError::Lagged(_)) => {}
                Err(tokio::sync::broadcast::error::RecvError::Closed) => return Ok(()),
            },
            // Poller may already have finished between initiation and subscribe
            _ = tokio::time::sleep(Duration::from_secs(1)) => {
                if dashboard.consent_link().await.status == LinkStatus::Active {
                    println!("Bank account linked");
                    return Ok(());
                }
            }
        }
    }
}

async fn print_consent(dashboard: &Dashboard) {
    let link = dashboard.consent_link().await;
    println!("Consent: {}", link.status);
    if let Some(url) = link.approval_url.filter(|_| link.status == LinkStatus::PendingApproval) {
        println!("Approve at: {}", url);
    }
}

fn print_metrics_summary(has_any_data: bool, health_score: Option<f64>) {
    if !has_any_data {
        println!("No financial data yet");
        return;
    }
    match health_score {
        Some(score) => println!("Health score: {:.1}", score),
        None => println!("Metrics computed"),
    }
}

async fn require_session(dashboard: &Dashboard) -> Result<()> {
    if !dashboard.session().is_authenticated().await {
        bail!("Not logged in. Run `finhealth login` first.");
    }
    Ok(())
}

fn notice(err: ClientError) -> anyhow::Error {
    debug!("Operation failed: {:?}", err);
    anyhow::anyhow!(err.user_message())
}
