//! Shelf CLI
//!
//! Search IRC ebook channels and download offers over DCC.

mod config;
mod output;
mod progress;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use console::style;
use shelf_core::{SearchResult, Session, default_nick};
use shelf_relay::Endpoint;
use shelf_relay::irc::IrcConnector;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

use config::Config;
use progress::{Spinner, format_bytes, format_elapsed};

/// Shelf - find and fetch ebooks from IRC file bots
#[derive(Parser)]
#[command(name = "shelf")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Configuration file path
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Search for a book and pick a result to download
    Search(SearchArgs),

    /// Show the effective configuration
    Config {
        /// Write the default configuration file
        #[arg(long)]
        init: bool,
    },
}

#[derive(Args)]
struct SearchArgs {
    /// Search terms
    #[arg(required = true, num_args = 1..)]
    query: Vec<String>,

    /// IRC server
    #[arg(short, long)]
    server: Option<String>,

    /// IRC port
    #[arg(short, long)]
    port: Option<u16>,

    /// Channel to search in
    #[arg(short, long)]
    channel: Option<String>,

    /// Use Undernet #bookz
    #[arg(short, long, conflicts_with_all = ["server", "channel"])]
    undernet: bool,

    /// Only show results with these extensions (repeatable or comma-separated)
    #[arg(short, long = "ext", value_delimiter = ',')]
    ext: Vec<String>,

    /// Output file or directory
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Nickname to use
    #[arg(short, long)]
    nick: Option<String>,
}

impl SearchArgs {
    fn endpoint(&self, config: &Config) -> Endpoint {
        if self.undernet {
            let preset = Endpoint::undernet();
            return Endpoint::new(preset.address(), self.port, preset.channel());
        }
        Endpoint::new(
            self.server.as_deref().unwrap_or(&config.relay.server),
            Some(self.port.unwrap_or(config.relay.port)),
            self.channel.as_deref().unwrap_or(&config.relay.channel),
        )
    }

    fn extensions(&self, config: &Config) -> Vec<String> {
        if self.ext.is_empty() {
            config.search.extensions.clone()
        } else {
            self.ext.clone()
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{} {}", style("Error:").red().bold(), style(report(&e)).red());
            ExitCode::FAILURE
        }
    }
}

/// Render the error chain, skipping causes already spelled out by the
/// message that wraps them
fn report(err: &anyhow::Error) -> String {
    let mut out = String::new();
    for cause in err.chain() {
        let msg = cause.to_string();
        if out.contains(&msg) {
            continue;
        }
        if !out.is_empty() {
            out.push_str(": ");
        }
        out.push_str(&msg);
    }
    out
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = match &cli.config {
        Some(path) => Config::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => Config::load_or_default()?,
    };

    init_logging(cli.verbose, &config.logging.level);
    config.validate()?;

    match cli.command {
        Commands::Search(args) => search(args, &config).await,
        Commands::Config { init } => show_config(cli.config.as_deref(), &config, init),
    }
}

fn init_logging(verbose: bool, level: &str) {
    let default = if verbose { "debug" } else { level };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Connect, search, prompt and download
async fn search(args: SearchArgs, config: &Config) -> anyhow::Result<()> {
    let endpoint = args.endpoint(config);
    endpoint.validate()?;
    let nick = args
        .nick
        .clone()
        .or_else(|| config.relay.nick.clone())
        .unwrap_or_else(default_nick);
    let query = args.query.join(" ");
    let extensions = args.extensions(config);
    let output = args.output.clone().or_else(|| config.download.output.clone());

    tracing::info!("Searching {} for {:?} as {}", endpoint, query, nick);

    let session = Session::new(endpoint.clone(), nick, IrcConnector::default())
        .with_timeouts(config.timeouts());

    let spinner = Spinner::new(format!("Connecting to {endpoint}..."));
    let connected = session.connect().await;
    spinner.finish_and_clear();
    connected.with_context(|| format!("failed to join {endpoint}"))?;
    println!(
        "Connected to {} as {}",
        style(&endpoint).green(),
        style(session.nick().await).green()
    );

    let result = search_and_download(&session, &query, &extensions, output.as_deref()).await;
    session.close().await;
    result
}

async fn search_and_download(
    session: &Session<IrcConnector>,
    query: &str,
    extensions: &[String],
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let spinner = Spinner::new(format!("Searching for {query:?}..."));
    let outcome = session
        .search_with_progress(query, extensions, |count| {
            spinner.set_message(format!("Searching for {query:?}... {count} results"));
        })
        .await;
    spinner.finish_and_clear();
    let outcome = outcome.context("search failed")?;

    if outcome.is_empty() {
        println!("No results found for {query:?}");
        return Ok(());
    }

    println!(
        "Found {} results in {}:",
        style(outcome.results.len()).green(),
        format_elapsed(outcome.elapsed)
    );
    for (i, result) in outcome.results.iter().enumerate() {
        println!("{:>4}. {}", i + 1, result.filename);
    }

    let Some(index) = prompt_selection(outcome.results.len()).await? else {
        return Ok(());
    };
    download(session, &outcome.results[index], output).await
}

async fn prompt_selection(count: usize) -> anyhow::Result<Option<usize>> {
    print!("\nEnter number to download (or 'q' to quit): ");
    std::io::stdout().flush()?;

    let mut input = String::new();
    BufReader::new(tokio::io::stdin())
        .read_line(&mut input)
        .await?;
    output::parse_selection(&input, count)
}

async fn download(
    session: &Session<IrcConnector>,
    result: &SearchResult,
    output: Option<&Path>,
) -> anyhow::Result<()> {
    let path = output::resolve_output_path(output, &result.filename)?;

    let spinner = Spinner::new(format!("Downloading {}...", result.filename));
    let data = session.download(result).await;
    spinner.finish_and_clear();
    let data = data.with_context(|| format!("failed to download {}", result.filename))?;

    output::save(&path, &data)?;
    println!(
        "Saved {} to {}",
        format_bytes(data.len() as u64),
        style(path.display()).green()
    );
    Ok(())
}

/// Print (and optionally write) the effective configuration
fn show_config(path: Option<&Path>, config: &Config, init: bool) -> anyhow::Result<()> {
    let path = path.map_or_else(Config::default_path, Path::to_path_buf);

    if init {
        if path.exists() {
            anyhow::bail!("{} already exists", path.display());
        }
        Config::default().save(&path)?;
        println!("Wrote default configuration to {}", style(path.display()).green());
        return Ok(());
    }

    println!("# {}", path.display());
    print!("{}", toml::to_string_pretty(config)?);
    Ok(())
}
