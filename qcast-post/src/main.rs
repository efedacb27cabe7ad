//! qcast-post - Publish the next queued post to Bluesky and Mastodon

use clap::Parser;
use libqueuecast::logging::{LogFormat, LoggingConfig};
use libqueuecast::config::QueueConfig;
use libqueuecast::{Config, Coordinator, QueueUpdate, Result, RunReport};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "qcast-post")]
#[command(version, about = "Publish the next queued post to Bluesky and Mastodon")]
#[command(long_about = r#"Publish the next entry of the pending queue to Bluesky and Mastodon.

Each run takes exactly one line from the top of the pending file:

    https://example.com/article|Comment shown above the link card
    cat.jpg|Caption for an image from the images directory
    Any other line is posted as plain text

The entry moves to the completed log once at least one platform accepts it.
Run it from cron or a systemd timer to drain the queue over time.

ENVIRONMENT:
    BLUESKY_HANDLE, BLUESKY_PASSWORD       Bluesky handle and app password
    BLUESKY_SERVICE_URL                    PDS URL (default https://bsky.social)
    MASTODON_INSTANCE_URL                  Instance URL (default https://mastodon.social)
    MASTODON_ACCESS_TOKEN                  Access token with write scope
    QUEUECAST_CONFIG                       Path to config.toml

EXIT CODES:
    0 - Success (including an empty queue or a post every platform rejected)
    1 - Configuration, queue, or image error
    2 - Authentication failed
"#)]
struct Cli {
    /// Pending queue file (overrides config)
    #[arg(long, value_name = "PATH")]
    pending: Option<PathBuf>,

    /// Completed log file (overrides config)
    #[arg(long, value_name = "PATH")]
    completed: Option<PathBuf>,

    /// Directory holding images referenced by queue entries (overrides config)
    #[arg(long, value_name = "PATH")]
    images_dir: Option<PathBuf>,

    /// Configuration file to use instead of the default location
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log output format (text, json, pretty)
    #[arg(long, value_name = "FORMAT", env = "QUEUECAST_LOG_FORMAT")]
    log_format: Option<LogFormat>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    let mut logging = LoggingConfig::from_env(cli.verbose);
    if let Some(format) = cli.log_format {
        logging.format = format;
    }
    logging.init();

    // Run the main logic and handle errors
    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => Config::load_from_path(path)?,
        None => Config::load()?,
    };

    if let Some(path) = cli.pending {
        config.queue.pending_file = path.display().to_string();
    }
    if let Some(path) = cli.completed {
        config.queue.completed_file = path.display().to_string();
    }
    if let Some(path) = cli.images_dir {
        config.queue.images_dir = path.display().to_string();
    }

    tracing::debug!(
        "Using pending queue {}",
        config.queue.pending_path().display()
    );

    let mut coordinator = Coordinator::from_config(&config)?;
    let report = coordinator.run_once().await?;

    print_report(&report, &config.queue);
    Ok(())
}

fn print_report(report: &RunReport, queue: &QueueConfig) {
    match report {
        RunReport::Empty => println!("Nothing to post"),
        RunReport::Published {
            entry,
            outcomes,
            queue_update,
        } => {
            println!("Posted: {}", entry);
            for outcome in outcomes {
                match (&outcome.reference, &outcome.error) {
                    (Some(reference), _) => println!("  ✓ {}: {}", outcome.platform, reference),
                    (None, error) => println!(
                        "  ✗ {}: {}",
                        outcome.platform,
                        error.as_deref().unwrap_or("unknown error")
                    ),
                }
            }
            match queue_update {
                QueueUpdate::Moved => {}
                QueueUpdate::PendingUnchanged => println!(
                    "Warning: could not rewrite {}; the entry is still queued and will be posted again",
                    queue.pending_path().display()
                ),
                QueueUpdate::NotLogged => println!(
                    "Warning: the entry was removed from {} but is missing from {}",
                    queue.pending_path().display(),
                    queue.completed_path().display()
                ),
            }
        }
        RunReport::Failed { entry, outcomes } => {
            println!("Not posted: {}", entry);
            for outcome in outcomes {
                println!(
                    "  ✗ {}: {}",
                    outcome.platform,
                    outcome.error.as_deref().unwrap_or("unknown error")
                );
            }
        }
    }
}
