//! Connecta Admin - reporting CLI
//!
//! The `connecta-admin` command runs the admin console's reports against the
//! live API (or a fixture directory) and prints them as JSON.
//!
//! ## Commands
//!
//! - `dashboard`: headline totals, trends and source health
//! - `analytics`: monthly growth series, daily revenue, proposal success rate
//! - `users`: user directory stats, optionally filtered by a search term
//! - `subscriptions`: subscription counts and revenue
//! - `user`: one user's detail view
//! - `export`: write a report as `<kind>-<date>.csv`

use anyhow::{bail, Context, Result};
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use connecta_core::metrics::METRICS;
use connecta_core::reports::{analytics, dashboard, subscriptions, user_detail, users};
use connecta_core::{write_csv_in, ExportDocument, ReportContext, ReportKind, ReportingConfig};
use connecta_sources::{ApiConfig, DataSource, HttpDataSource, MemoryDataSource};
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, Level};

#[derive(Parser)]
#[command(name = "connecta-admin")]
#[command(author = "Connecta Engineering")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Connecta admin reporting", long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json_logs: bool,

    /// Read collections from `<collection>.json` files in this directory
    /// instead of the API
    #[arg(long, global = true)]
    fixtures: Option<PathBuf>,

    /// Admin API base URL
    #[arg(long, global = true, env = "CONNECTA_API_URL")]
    api_url: Option<String>,

    /// Admin bearer token
    #[arg(long, global = true, env = "CONNECTA_ADMIN_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// Reference instant for calendar windows (RFC 3339, default: now)
    #[arg(long, global = true)]
    now: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Platform overview
    Dashboard,

    /// Growth, gig performance and revenue series
    Analytics,

    /// User directory statistics
    Users {
        /// Case-insensitive match on first name, last name or email
        #[arg(short, long)]
        search: Option<String>,
    },

    /// Subscription statistics
    Subscriptions,

    /// One user with their projects, payments, proposals and profile
    User {
        /// User id
        id: String,
    },

    /// Write a report as CSV
    Export {
        /// dashboard, analytics, revenue, users, subscriptions or user-detail
        kind: ReportKind,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        out_dir: PathBuf,

        /// User id, required for user-detail
        #[arg(long)]
        user_id: Option<String>,

        /// Search term for the users export
        #[arg(short, long)]
        search: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    connecta_core::telemetry::init_tracing(cli.json_logs, level);

    let source = build_source(&cli)?;
    let config = ReportingConfig::from_env().context("Invalid reporting configuration")?;
    let now = parse_now(cli.now.as_deref())?;
    let ctx = ReportContext::new(source, config).at(now);

    let result = match cli.command {
        Commands::Dashboard => cmd_dashboard(&ctx).await,
        Commands::Analytics => cmd_analytics(&ctx).await,
        Commands::Users { search } => cmd_users(&ctx, search.as_deref()).await,
        Commands::Subscriptions => cmd_subscriptions(&ctx).await,
        Commands::User { id } => cmd_user(&ctx, &id).await,
        Commands::Export {
            kind,
            out_dir,
            user_id,
            search,
        } => cmd_export(&ctx, kind, &out_dir, user_id.as_deref(), search.as_deref())
            .await
            .map(|path| println!("{}", path.display())),
    };

    METRICS.flush();
    result
}

/// Fixture directory when given, otherwise the HTTP API.
fn build_source(cli: &Cli) -> Result<Arc<dyn DataSource>> {
    if let Some(dir) = &cli.fixtures {
        let source = MemoryDataSource::from_dir(dir)
            .with_context(|| format!("Failed to load fixtures from {:?}", dir))?;
        info!(dir = %dir.display(), "using fixture data");
        return Ok(Arc::new(source));
    }

    let mut config = match &cli.api_url {
        Some(url) => ApiConfig::new(url),
        None => ApiConfig::from_env(),
    };
    if let Some(token) = &cli.token {
        config = config.with_token(token);
    }
    info!(base_url = %config.base_url, "using admin API");
    let client = HttpDataSource::new(config).context("Failed to build API client")?;
    Ok(Arc::new(client))
}

fn parse_now(raw: Option<&str>) -> Result<DateTime<Utc>> {
    match raw {
        None => Ok(Utc::now()),
        Some(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .with_context(|| format!("--now must be RFC 3339, got {:?}", raw)),
    }
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let out = serde_json::to_string_pretty(value).context("Failed to serialize report")?;
    println!("{}", out);
    Ok(())
}

async fn cmd_dashboard(ctx: &ReportContext) -> Result<()> {
    print_json(&dashboard::fetch_dashboard(ctx).await)
}

async fn cmd_analytics(ctx: &ReportContext) -> Result<()> {
    print_json(&analytics::fetch_analytics(ctx).await)
}

async fn cmd_users(ctx: &ReportContext, search: Option<&str>) -> Result<()> {
    print_json(&users::fetch_user_directory(ctx, search).await)
}

async fn cmd_subscriptions(ctx: &ReportContext) -> Result<()> {
    print_json(&subscriptions::fetch_subscriptions(ctx).await)
}

async fn cmd_user(ctx: &ReportContext, id: &str) -> Result<()> {
    let view = user_detail::fetch_user_detail(ctx, id)
        .await
        .with_context(|| format!("Failed to load user {}", id))?;
    print_json(&view)
}

/// Build the CSV document for `kind`.
async fn export_document(
    ctx: &ReportContext,
    kind: ReportKind,
    user_id: Option<&str>,
    search: Option<&str>,
) -> Result<ExportDocument> {
    let doc = match kind {
        ReportKind::Dashboard => dashboard::fetch_dashboard(ctx).await.to_export(),
        ReportKind::Analytics => analytics::fetch_analytics(ctx).await.to_export(),
        ReportKind::Revenue => analytics::fetch_analytics(ctx).await.revenue_export(),
        ReportKind::Users => users::fetch_user_directory(ctx, search).await.to_export(),
        ReportKind::Subscriptions => subscriptions::fetch_subscriptions(ctx).await.to_export(),
        ReportKind::UserDetail => {
            let Some(id) = user_id else {
                bail!("export user-detail requires --user-id");
            };
            let view = user_detail::fetch_user_detail(ctx, id)
                .await
                .with_context(|| format!("Failed to load user {}", id))?;
            user_detail::to_export(&view)
        }
    };
    Ok(doc)
}

async fn cmd_export(
    ctx: &ReportContext,
    kind: ReportKind,
    out_dir: &Path,
    user_id: Option<&str>,
    search: Option<&str>,
) -> Result<PathBuf> {
    let doc = export_document(ctx, kind, user_id, search).await?;
    let path = write_csv_in(out_dir, kind.name(), ctx.now.date_naive(), &doc)
        .with_context(|| format!("Failed to write {} export to {:?}", kind, out_dir))?;
    info!(path = %path.display(), rows = doc.body().len(), "export written");
    Ok(path)
}
