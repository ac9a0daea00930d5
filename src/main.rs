use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use tieba_thread_archiver::archiver::ThreadArchiver;
use tieba_thread_archiver::config::{Config, OutputTarget};
use tieba_thread_archiver::media::{LogProgress, MediaStrategy, NoProgress, ProgressSink};
use tieba_thread_archiver::output::write_document;
use tieba_thread_archiver::tieba::TiebaClient;
use tieba_thread_archiver::transport::Transport;

/// Archive Baidu Tieba threads as standalone HTML documents.
#[derive(Parser, Debug)]
#[command(name = "tieba-thread-archiver", version, about)]
struct Cli {
    /// Numeric thread ids to archive.
    #[arg(required = true, value_parser = parse_thread_id)]
    threads: Vec<String>,

    /// Base URL of the HibiAPI tieba daemon.
    #[arg(short, long)]
    remote: Option<String>,

    /// Keep media as remote references.
    #[arg(short = 'a', long)]
    no_media: bool,

    /// Inline media as base64 data URIs.
    #[arg(short, long, conflicts_with = "no_media")]
    embed_media: bool,

    /// Do not fetch replies.
    #[arg(short = 'p', long)]
    no_subposts: bool,

    /// Output directory for documents and downloaded media.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Print documents to stdout instead of writing files.
    #[arg(short, long)]
    stdout: bool,

    /// Attempts per request (0 retries forever).
    #[arg(long)]
    retries: Option<u32>,

    /// Delay before every request, in milliseconds.
    #[arg(long, value_name = "MS")]
    interval: Option<u64>,

    /// Download media again even if the file already exists.
    #[arg(long)]
    overwrite_media: bool,

    /// Only report warnings and errors.
    #[arg(short, long)]
    quiet: bool,

    /// Report every request and media download.
    #[arg(short, long, conflicts_with = "quiet")]
    verbose: bool,
}

impl Cli {
    /// Apply command-line overrides on top of the environment configuration.
    fn apply(&self, config: &mut Config) {
        if let Some(remote) = &self.remote {
            config.remote.clone_from(remote);
        }
        if self.no_media {
            config.media = MediaStrategy::Skip;
        } else if self.embed_media {
            config.media = MediaStrategy::Embed;
        }
        if self.no_subposts {
            config.fetch_subposts = false;
        }
        if let Some(output) = &self.output {
            config.output_dir.clone_from(output);
        }
        if self.stdout {
            config.output = OutputTarget::Stdout;
        }
        if let Some(retries) = self.retries {
            config.max_attempts = retries;
        }
        if let Some(interval) = self.interval {
            config.retry_interval = Duration::from_millis(interval);
        }
        if self.overwrite_media {
            config.overwrite_media = true;
        }
        config.quiet = self.quiet;
        config.verbose = self.verbose;
    }
}

fn parse_thread_id(value: &str) -> Result<String, String> {
    if !value.is_empty() && value.bytes().all(|b| b.is_ascii_digit()) {
        Ok(value.to_string())
    } else {
        Err(format!("'{value}' is not a numeric thread id"))
    }
}

#[tokio::main]
async fn main() {
    match run().await {
        Ok(true) => {}
        Ok(false) => std::process::exit(1),
        Err(e) => {
            error!("Fatal error: {e:#}");
            std::process::exit(1);
        }
    }
}

/// Returns whether every thread was archived.
async fn run() -> Result<bool> {
    // Load .env file if present
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();
    let mut config = Config::from_env().context("Failed to load configuration")?;
    cli.apply(&mut config);

    init_tracing(&config)?;

    config.validate().context("Invalid configuration")?;
    info!(remote = %config.remote, media = ?config.media, "Configuration loaded");

    let transport = Transport::new(&config).context("Failed to build HTTP client")?;
    let client = TiebaClient::new(transport, &config.remote);
    client
        .preflight()
        .await
        .context("Remote daemon preflight failed")?;

    let progress: Arc<dyn ProgressSink> = if config.quiet {
        Arc::new(NoProgress)
    } else {
        Arc::new(LogProgress)
    };
    let archiver = ThreadArchiver::new(client, &config, progress);

    let total = cli.threads.len();
    info!("Fetching {total} thread{}", if total == 1 { "" } else { "s" });

    let mut failed = 0usize;
    for (i, thread_id) in cli.threads.iter().enumerate() {
        info!(thread_id = %thread_id, "Processing thread {}/{total}", i + 1);
        if let Err(e) = archive_one(&archiver, &config, thread_id).await {
            error!(thread_id = %thread_id, "Failed to archive thread: {e:#}");
            failed += 1;
        }
    }

    info!(archived = total - failed, failed, "Complete");
    Ok(failed == 0)
}

async fn archive_one(archiver: &ThreadArchiver, config: &Config, thread_id: &str) -> Result<()> {
    let archived = archiver
        .archive(thread_id)
        .await
        .with_context(|| format!("Failed to fetch thread {thread_id}"))?;
    write_document(
        config.output,
        &config.output_dir,
        &archived.file_stem,
        &archived.document,
    )
    .await?;
    Ok(())
}

fn init_tracing(config: &Config) -> Result<()> {
    let default_level = if config.verbose {
        "debug"
    } else if config.quiet {
        "warn"
    } else {
        "info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    // Check if JSON logging is requested
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| matches!(v.to_lowercase().as_str(), "json" | "structured"))
        .unwrap_or(false);

    // Documents may go to stdout, so logs always go to stderr
    if use_json {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(std::io::stderr),
            )
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
            .try_init()
            .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_thread_ids_must_be_numeric() {
        assert!(Cli::try_parse_from(["tieba-thread-archiver", "123", "456"]).is_ok());
        assert!(Cli::try_parse_from(["tieba-thread-archiver", "12a"]).is_err());
        assert!(Cli::try_parse_from(["tieba-thread-archiver"]).is_err());
    }

    #[test]
    fn test_media_flags_conflict() {
        assert!(Cli::try_parse_from(["tieba-thread-archiver", "-a", "-e", "1"]).is_err());
    }

    #[test]
    fn test_overrides_apply() {
        let cli = Cli::try_parse_from([
            "tieba-thread-archiver",
            "-e",
            "-p",
            "-s",
            "--retries",
            "0",
            "--interval",
            "250",
            "-r",
            "http://localhost:8080/api/tieba",
            "1",
        ])
        .unwrap();
        let mut config = Config::for_testing("http://unused");
        cli.apply(&mut config);

        assert_eq!(config.media, MediaStrategy::Embed);
        assert!(!config.fetch_subposts);
        assert_eq!(config.output, OutputTarget::Stdout);
        assert_eq!(config.max_attempts, 0);
        assert_eq!(config.retry_interval, Duration::from_millis(250));
        assert_eq!(config.remote, "http://localhost:8080/api/tieba");
        assert!(!config.quiet);
    }
}
