//! CLI administration tool for link-resolver.
//!
//! Manages short links, the click staging list and the maintenance switch
//! without going through HTTP.
//!
//! # Usage
//!
//! ```bash
//! # Create a link with a random code, valid for 48 hours
//! cargo run --bin admin -- link create --url https://example.org
//!
//! # Create a link with a custom code
//! cargo run --bin admin -- link create --url example.org --code spring-sale
//!
//! # Flush staged click events now
//! cargo run --bin admin -- buffer flush
//!
//! # Click statistics of link 42 over the last week
//! cargo run --bin admin -- stats 42 --hours 168
//!
//! # Turn maintenance on for one hour
//! cargo run --bin admin -- maintenance on --ttl-secs 3600
//! ```
//!
//! # Environment Variables
//!
//! - `DATABASE_URL` (required): PostgreSQL connection string
//! - `ANALYTICS_DATABASE_URL` (optional): click store, defaults to `DATABASE_URL`
//! - `REDIS_URL` (optional): shared fast store; without it the staging list
//!   and maintenance commands only see an empty in-process store

use link_resolver::application::services::{
    CreateLink, LinkService, QuotaLimiter, StatsRange, StatsService,
};
use link_resolver::config::mask_connection_string;
use link_resolver::domain::click_buffer::{ClickBuffer, FlushSettings, STAGING_LIST_KEY};
use link_resolver::domain::entities::{
    ClickStats, DimensionCounts, LimitPolicy, Link, LinkPatch, TOTAL_KEY,
};
use link_resolver::infrastructure::cache::{FastStore, LinkCache, MemoryStore, RedisStore};
use link_resolver::infrastructure::maintenance::MaintenanceMode;
use link_resolver::infrastructure::persistence::{PgClickRepository, PgLinkRepository};

use anyhow::{Context, Result};
use chrono::{Duration as ChronoDuration, Utc};
use clap::{Parser, Subcommand};
use colored::*;
use dialoguer::{Confirm, Input};
use sqlx::PgPool;
use std::sync::Arc;
use std::time::Duration;

/// CLI tool for managing link-resolver.
#[derive(Parser)]
#[command(name = "admin")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Top-level command groups.
#[derive(Subcommand)]
enum Commands {
    /// Manage short links
    Link {
        #[command(subcommand)]
        action: LinkAction,
    },

    /// Inspect or flush the click staging list
    Buffer {
        #[command(subcommand)]
        action: BufferAction,
    },

    /// Click statistics of one link
    Stats {
        /// Link id
        id: i64,

        /// How many hours back to look
        #[arg(long, default_value_t = 24)]
        hours: i64,
    },

    /// Toggle the runtime maintenance switch
    Maintenance {
        #[command(subcommand)]
        action: MaintenanceAction,
    },
}

#[derive(Subcommand)]
enum LinkAction {
    /// Create a short link
    Create {
        /// Destination URL; `https://` is added to bare hosts
        #[arg(short, long)]
        url: Option<String>,

        /// Custom short code (random when omitted)
        #[arg(short, long)]
        code: Option<String>,

        /// Owner id, also the quota identity
        #[arg(long)]
        owner: Option<i64>,

        /// Lifetime in hours (default: 48)
        #[arg(long)]
        expires_in_hours: Option<i64>,

        /// Skip confirmation prompt
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Show one link
    Show { id: i64 },

    /// Change code, destination or expiry of a link
    Update {
        id: i64,

        #[arg(short, long)]
        url: Option<String>,

        #[arg(short, long)]
        code: Option<String>,

        /// New lifetime in hours, counted from now
        #[arg(long)]
        expires_in_hours: Option<i64>,
    },

    /// Delete a link
    Delete {
        id: i64,

        #[arg(short = 'y', long)]
        yes: bool,
    },
}

#[derive(Subcommand)]
enum BufferAction {
    /// Show how many events are staged
    Status,

    /// Write staged events to the click store now
    Flush,
}

#[derive(Subcommand)]
enum MaintenanceAction {
    /// Turn maintenance on
    On {
        /// Switch lifetime in seconds
        #[arg(long, default_value_t = 3600)]
        ttl_secs: u64,
    },

    /// Turn maintenance off
    Off,

    /// Show the current state
    Status,
}

/// Stores the commands operate on.
struct Backends {
    links: Arc<PgLinkRepository>,
    clicks: Arc<PgClickRepository>,
    store: Arc<dyn FastStore>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let backends = connect().await?;

    match cli.command {
        Commands::Link { action } => handle_link_action(action, &backends).await?,
        Commands::Buffer { action } => handle_buffer_action(action, &backends).await?,
        Commands::Stats { id, hours } => handle_stats(id, hours, &backends).await?,
        Commands::Maintenance { action } => handle_maintenance(action, &backends).await?,
    }

    Ok(())
}

async fn connect() -> Result<Backends> {
    let database_url = std::env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
    let pool = PgPool::connect(&database_url)
        .await
        .with_context(|| {
            format!(
                "Failed to connect to {}",
                mask_connection_string(&database_url)
            )
        })?;

    let analytics_pool = match std::env::var("ANALYTICS_DATABASE_URL") {
        Ok(url) if url != database_url => PgPool::connect(&url)
            .await
            .context("Failed to connect to analytics database")?,
        _ => pool.clone(),
    };

    let store: Arc<dyn FastStore> = match std::env::var("REDIS_URL") {
        Ok(url) => Arc::new(
            RedisStore::connect(&url)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to connect to Redis: {}", e))?,
        ),
        Err(_) => {
            println!(
                "{}",
                "REDIS_URL not set, using an empty in-process store".yellow()
            );
            Arc::new(MemoryStore::new())
        }
    };

    Ok(Backends {
        links: Arc::new(PgLinkRepository::new(Arc::new(pool))),
        clicks: Arc::new(PgClickRepository::new(Arc::new(analytics_pool))),
        store,
    })
}

fn link_service(backends: &Backends) -> LinkService {
    // Operators are not subject to the shorten quota.
    let limiter = QuotaLimiter::new(Arc::clone(&backends.store), true);
    LinkService::new(
        backends.links.clone(),
        LinkCache::new(Arc::clone(&backends.store)),
        limiter,
        LimitPolicy::new(u64::MAX, Duration::from_secs(1)),
    )
}

async fn handle_link_action(action: LinkAction, backends: &Backends) -> Result<()> {
    let service = link_service(backends);

    match action {
        LinkAction::Create {
            url,
            code,
            owner,
            expires_in_hours,
            yes,
        } => create_link(&service, url, code, owner, expires_in_hours, yes).await?,
        LinkAction::Show { id } => {
            let link = service.get_link(id).await?;
            print_link(&link);
        }
        LinkAction::Update {
            id,
            url,
            code,
            expires_in_hours,
        } => {
            let patch = LinkPatch {
                code,
                destination: url,
                expires_at: expires_in_hours.map(|h| Utc::now() + ChronoDuration::hours(h)),
            };
            let link = service.update_link(id, patch).await?;

            println!("{}", "Link updated".green().bold());
            print_link(&link);
        }
        LinkAction::Delete { id, yes } => {
            let link = service.get_link(id).await?;
            print_link(&link);

            if !yes
                && !Confirm::new()
                    .with_prompt("Delete this link?")
                    .default(false)
                    .interact()?
            {
                println!("{}", "Cancelled".red());
                return Ok(());
            }

            service.delete_link(id).await?;
            println!("{}", "Link deleted".green().bold());
        }
    }

    Ok(())
}

/// Creates a link, prompting for the destination when it was not given.
async fn create_link(
    service: &LinkService,
    url: Option<String>,
    code: Option<String>,
    owner: Option<i64>,
    expires_in_hours: Option<i64>,
    skip_confirm: bool,
) -> Result<()> {
    println!("{}", "Create short link".bright_blue().bold());
    println!();

    let destination = match url {
        Some(u) => u,
        None => Input::new().with_prompt("Destination URL").interact_text()?,
    };

    println!("  Destination: {}", destination.cyan());
    println!(
        "  Code:        {}",
        code.as_deref().unwrap_or("(random)").cyan()
    );
    println!(
        "  Expires in:  {}h",
        expires_in_hours.unwrap_or(48).to_string().cyan()
    );
    println!();

    if !skip_confirm
        && !Confirm::new()
            .with_prompt("Create this link?")
            .default(true)
            .interact()?
    {
        println!("{}", "Cancelled".red());
        return Ok(());
    }

    let link = service
        .create_link(CreateLink {
            destination,
            code,
            owner_id: owner,
            expires_at: expires_in_hours.map(|h| Utc::now() + ChronoDuration::hours(h)),
        })
        .await?;

    println!("{}", "Link created".green().bold());
    print_link(&link);

    Ok(())
}

fn print_link(link: &Link) {
    let state = if link.is_expired() {
        "EXPIRED".red()
    } else {
        "LIVE".green()
    };

    println!();
    println!("  ID:          {}", link.id.to_string().bright_black());
    println!("  Code:        {}", link.code.bright_yellow().bold());
    println!("  Destination: {}", link.destination.cyan());
    println!(
        "  Expires:     {} ({})",
        link.expires_at.format("%Y-%m-%d %H:%M UTC"),
        state
    );
    println!("  Clicks:      {}", link.total_clicks.to_string().bold());
    println!();
}

async fn handle_buffer_action(action: BufferAction, backends: &Backends) -> Result<()> {
    match action {
        BufferAction::Status => {
            let staged = backends
                .store
                .list_len(STAGING_LIST_KEY)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to read staging list: {}", e))?;

            println!(
                "  Staged events: {}",
                staged.to_string().bright_green().bold()
            );
        }
        BufferAction::Flush => {
            let buffer = ClickBuffer::new(
                Arc::clone(&backends.store),
                backends.clicks.clone(),
                backends.links.clone(),
                FlushSettings::default(),
            );

            let staged = buffer.recover().await?;
            if staged == 0 {
                println!("{}", "Nothing to flush".yellow());
                return Ok(());
            }

            let report = buffer.flush().await?;
            println!("{}", "Flush finished".green().bold());
            println!("  Drained:   {}", report.drained);
            println!("  Written:   {}", report.written.to_string().bright_green());
            println!("  Dropped:   {}", report.dropped.to_string().yellow());
            println!("  Re-queued: {}", report.requeued.to_string().red());
        }
    }

    Ok(())
}

async fn handle_stats(id: i64, hours: i64, backends: &Backends) -> Result<()> {
    let service = StatsService::new(backends.links.clone(), backends.clicks.clone());

    let now = Utc::now();
    let range = StatsRange::resolve(Some(now - ChronoDuration::hours(hours)), Some(now), now)?;
    let stats = service.link_stats(id, range).await?;

    println!(
        "{} {} .. {}",
        "Clicks".bright_blue().bold(),
        range.start.format("%Y-%m-%d %H:%M"),
        range.end.format("%Y-%m-%d %H:%M")
    );
    println!();
    println!("  Total: {}", stats.total().to_string().bright_green().bold());

    print_dimension("Device", &stats, |s| &s.device_counts);
    print_dimension("OS", &stats, |s| &s.os_counts);
    print_dimension("Country", &stats, |s| &s.geo_counts);
    print_dimension("Referrer", &stats, |s| &s.referrer_counts);

    Ok(())
}

fn print_dimension(
    title: &str,
    stats: &ClickStats,
    counts: impl Fn(&ClickStats) -> &DimensionCounts,
) {
    println!();
    println!("  {}", title.bright_white().bold());
    for (value, count) in counts(stats) {
        if value == TOTAL_KEY {
            continue;
        }
        println!("    {:<40} {}", value, count);
    }
}

async fn handle_maintenance(action: MaintenanceAction, backends: &Backends) -> Result<()> {
    let mode = MaintenanceMode::new(Arc::clone(&backends.store), false);

    match action {
        MaintenanceAction::On { ttl_secs } => {
            mode.set(true, Duration::from_secs(ttl_secs))
                .await
                .map_err(|e| anyhow::anyhow!("Failed to set maintenance flag: {}", e))?;
            println!(
                "{} for {}s",
                "Maintenance ON".yellow().bold(),
                ttl_secs
            );
        }
        MaintenanceAction::Off => {
            mode.set(false, Duration::ZERO)
                .await
                .map_err(|e| anyhow::anyhow!("Failed to clear maintenance flag: {}", e))?;
            println!("{}", "Maintenance OFF".green().bold());
        }
        MaintenanceAction::Status => {
            if mode.is_active().await {
                println!("{}", "Maintenance ON".yellow().bold());
            } else {
                println!("{}", "Maintenance OFF".green().bold());
            }
        }
    }

    Ok(())
}
