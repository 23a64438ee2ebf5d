//! badgesync - command-line host for the badge sync core.
//!
//! Wires the core to the file store, the HTTP client and a console OAuth
//! handshake, then runs one command against it.

use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use badgesync::{
    ApiClient, BadgeSync, Config, FileStore, IconFile, NoticeLevel, Notices, OAuthHandshake,
    RefreshOutcome,
};

const USAGE: &str = "\
Usage: badgesync [COMMAND]

Commands:
  status                 Show cache, session and submission state (default)
  refresh                Revalidate the badge catalog
  lookup <owner-id>      List the badges an owner displays
  login                  Sign in through the OAuth provider
  logout                 Sign out and forget the session
  mine                   Fetch and list your submissions
  submit <name> <icon>   Submit a badge for review
  watch                  Keep refreshing and print changes until Ctrl+C";

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

/// Prints notices to stderr, next to the log.
struct ConsoleNotices;

impl Notices for ConsoleNotices {
    fn show(&self, level: NoticeLevel, message: &str) {
        match level {
            NoticeLevel::Info => eprintln!("{}", message),
            NoticeLevel::Success => eprintln!("✓ {}", message),
            NoticeLevel::Error => eprintln!("✗ {}", message),
        }
    }
}

/// Asks the user to open the authorize URL in a browser and paste back the
/// address the provider redirected to. An empty line cancels.
struct ConsoleHandshake;

#[async_trait]
impl OAuthHandshake for ConsoleHandshake {
    async fn authorize(&self, authorize_url: &str) -> Result<Option<String>> {
        eprintln!(
            "Open this URL in your browser and authorize badgesync:\n\n  {}\n",
            authorize_url
        );
        eprint!("Paste the URL you were redirected to (empty to cancel): ");
        io::stderr().flush()?;

        let line = tokio::task::spawn_blocking(|| {
            let mut line = String::new();
            io::stdin().lock().read_line(&mut line).map(|_| line)
        })
        .await??;

        let callback = line.trim();
        Ok((!callback.is_empty()).then(|| callback.to_string()))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();
    init_tracing();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let command = args.first().map(String::as_str).unwrap_or("status");
    if matches!(command, "-h" | "--help" | "help") {
        println!("{}", USAGE);
        return Ok(());
    }

    let config = Config::load()?;
    let store = FileStore::new(config.data_dir()?)?;
    let api = ApiClient::new()?;
    let sync = BadgeSync::builder(config, Arc::new(store), Arc::new(api))
        .notices(Arc::new(ConsoleNotices))
        .build();

    info!(command, "badgesync starting");
    let result = run(&sync, command, &args[args.len().min(1)..]).await;
    sync.dispose();
    result
}

async fn run(sync: &BadgeSync, command: &str, rest: &[String]) -> Result<()> {
    match command {
        "status" => {
            sync.init().await;
            print_status(sync);
        }
        "refresh" => {
            sync.init().await;
            // init already forced one refresh; this one is conditional.
            report_refresh(&sync.refresh(false).await);
        }
        "lookup" => {
            let Some(owner) = rest.first() else {
                bail!("lookup needs an owner id\n\n{}", USAGE);
            };
            sync.init().await;
            let badges = sync.lookup(owner);
            if badges.is_empty() {
                println!("No badges for {}", owner);
            }
            for badge in badges {
                println!("{}  {}  {}", badge.id, badge.name, badge.icon_url);
            }
        }
        "login" => {
            sync.init().await;
            if let Some(user) = sync.login(&ConsoleHandshake).await? {
                println!("Signed in as {} ({})", user.display_name(), user.id);
            }
        }
        "logout" => {
            sync.init().await;
            if !sync.is_authenticated() {
                println!("Not logged in");
                return Ok(());
            }
            sync.logout().await;
        }
        "mine" => {
            sync.init().await;
            sync.fetch_mine().await?;
            print_submissions(sync);
        }
        "submit" => {
            let [name, icon_path, ..] = rest else {
                bail!("submit needs a name and an icon path\n\n{}", USAGE);
            };
            sync.init().await;
            let icon = IconFile::from_path(Path::new(icon_path)).await?;
            sync.submit(name, Some(&icon)).await?;
            print_submissions(sync);
        }
        "watch" => watch(sync).await?,
        other => bail!("Unknown command: {}\n\n{}", other, USAGE),
    }
    Ok(())
}

async fn watch(sync: &BadgeSync) -> Result<()> {
    let observer = sync.clone();
    let subscription = sync.subscribe_fn(move || {
        let badges = observer.cache().map(|c| c.badges.len()).unwrap_or(0);
        println!(
            "changed: {} badges, {} owners, {} submissions",
            badges,
            observer.owner_count(),
            observer.submissions().len()
        );
    });

    sync.init().await;
    if let Some(interval) = sync.refresh_interval() {
        eprintln!("Refreshing every {} minutes. Press Ctrl+C to stop.", interval.as_secs() / 60);
    }

    tokio::signal::ctrl_c().await?;
    subscription.unsubscribe();
    Ok(())
}

fn report_refresh(outcome: &RefreshOutcome) {
    match outcome {
        RefreshOutcome::Updated { badges } => println!("Catalog updated: {} badges", badges),
        RefreshOutcome::NotModified => println!("Catalog is up to date"),
        RefreshOutcome::Skipped => println!("Refresh skipped"),
        RefreshOutcome::Failed { message } => println!("Refresh failed: {}", message),
    }
}

fn print_status(sync: &BadgeSync) {
    let config = sync.config();
    println!("Backend:     {}", config.backend().unwrap_or("(not set)"));
    println!("Local user:  {}", sync.local_user().as_deref().unwrap_or("(none)"));

    match sync.cache() {
        Some(cache) => println!(
            "Catalog:     {} badges from {} owners, updated {}",
            cache.badges.len(),
            sync.owner_count(),
            cache.age_display()
        ),
        None => println!("Catalog:     (empty)"),
    }

    match sync.user() {
        Some(user) => println!("Signed in:   {} ({})", user.display_name(), user.id),
        None => println!("Signed in:   no"),
    }

    let counts = sync.submission_counts();
    println!(
        "Submissions: {} pending, {} approved, {} rejected, {} banned",
        counts.pending, counts.approved, counts.rejected, counts.banned
    );
}

fn print_submissions(sync: &BadgeSync) {
    let submissions = sync.submissions();
    if submissions.is_empty() {
        println!("No submissions");
        return;
    }
    for submission in submissions {
        print!(
            "{:<10} {}  {}",
            submission.status.display_name(),
            submission.badge.id,
            submission.badge.name
        );
        match submission.review_reason.as_deref() {
            Some(reason) => println!("  ({})", reason),
            None => println!(),
        }
    }
}
