// Entrypoint for the CLI application.
// - Parses flags, fills in missing credentials interactively and hands a
//   validated request to the reconciliation driver.
// - Returns `anyhow::Result` so any fatal error exits non-zero; "nothing to
//   do" and "cancelled" are successful runs.

use anyhow::Context;
use clap::{Parser, Subcommand};
use list_pusher::api::XrpcClient;
use list_pusher::clock::SystemClock;
use list_pusher::config::{Settings, APP_PASSWORD_ENV, DEFAULT_PDS_URL};
use list_pusher::input::{
    read_desired_subjects, read_manual_changes, DEFAULT_DESIRED_FILE, DEFAULT_MANUAL_FILE,
};
use list_pusher::listing::PageOptions;
use list_pusher::reconcile::{self, Request, RunOptions};
use list_pusher::retry::RetryPolicy;
use list_pusher::ui::{self, TerminalConsole};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

/// Add or remove accounts on a Bluesky moderation list.
#[derive(Parser)]
#[command(name = "list-pusher")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// PDS hosting your account
    #[arg(global = true, long, env = "BLUESKY_PDS_URL", default_value = DEFAULT_PDS_URL)]
    pds_url: String,

    /// Your handle or DID (prompted if missing)
    #[arg(global = true, long, env = "BLUESKY_HANDLE")]
    handle: Option<String>,

    /// AT-URI of the list to manage (prompted if missing)
    #[arg(global = true, long, env = "BLUESKY_LIST_URI")]
    list: Option<String>,

    /// Attempts per list write before giving up
    #[arg(global = true, long, default_value_t = 5)]
    max_retries: u32,

    /// Base of the exponential backoff, in seconds
    #[arg(global = true, long, default_value_t = 60)]
    base_wait_secs: u64,

    /// Entries requested per getList page (1-100)
    #[arg(
        global = true,
        long,
        default_value_t = 100,
        value_parser = clap::value_parser!(u32).range(1..=100)
    )]
    page_size: u32,

    /// Enable debug logging
    #[arg(global = true, short, long)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add every account keyed in a JSON file that is not yet on the list
    Add {
        #[arg(short, long, default_value = DEFAULT_DESIRED_FILE)]
        file: PathBuf,
    },

    /// Remove the accounts in the [Removes] section of a TOML file
    Remove {
        #[arg(short, long, default_value = DEFAULT_MANUAL_FILE)]
        file: PathBuf,
    },

    /// Apply both the [Adds] and [Removes] sections of a TOML file
    Sync {
        #[arg(short, long, default_value = DEFAULT_MANUAL_FILE)]
        file: PathBuf,
    },
}

fn read_request(command: &Commands) -> anyhow::Result<Request> {
    let request = match command {
        Commands::Add { file } => Request::add(
            read_desired_subjects(file).context("failed to get account DIDs")?,
        ),
        Commands::Remove { file } => Request::remove(
            read_manual_changes(file)
                .context("failed to read TOML file")?
                .removes,
        ),
        Commands::Sync { file } => {
            let changes = read_manual_changes(file).context("failed to read TOML file")?;
            Request::sync(changes.adds, changes.removes)
        }
    };
    Ok(request)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if cli.verbose { "debug" } else { "info" })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    println!("Bluesky List Pusher");
    println!("{}", "=".repeat(19));

    let settings = Settings {
        pds_url: cli.pds_url.clone(),
        handle: cli.handle.clone(),
        password: std::env::var(APP_PASSWORD_ENV).ok(),
        list: cli.list.clone(),
    };
    let config = ui::complete_config(settings).context("failed to load configuration")?;
    println!("Using list: {}", config.list);

    let request = read_request(&cli.command)?;

    let service = XrpcClient::new(config.pds_url.as_str())?;
    let mut options = RunOptions::new(config.list);
    options.retry = RetryPolicy::new(cli.max_retries, Duration::from_secs(cli.base_wait_secs));
    options.paging = PageOptions {
        page_size: cli.page_size,
        ..PageOptions::default()
    };

    let mut console = TerminalConsole::new();
    let outcome = reconcile::run(
        &service,
        config.credentials,
        &request,
        &options,
        &mut SystemClock,
        &mut console,
    )?;
    ui::print_outcome(&outcome);
    Ok(())
}
