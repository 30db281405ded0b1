//! Build automation tasks for Shelf
//!
//! Run with: cargo xtask <command>

use clap::{Parser, Subcommand};
use std::process::Command;

/// Fuzz targets declared in `fuzz/Cargo.toml`
const FUZZ_TARGETS: &[&str] = &["fuzz_handshake_parse", "fuzz_listing_parse", "fuzz_irc_line"];

/// Crates carrying criterion benches
const BENCH_CRATES: &[&str] = &["shelf-dcc", "shelf-core"];

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Shelf build automation")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Format check, clippy and the workspace tests
    Ci,

    /// Run the parser benchmarks
    Bench,

    /// Fuzz the text parsers (requires cargo-fuzz and nightly)
    Fuzz {
        /// Single target to run; all targets when omitted
        target: Option<String>,

        /// Fuzzing time per target in seconds
        #[arg(long, default_value_t = 60)]
        seconds: u64,
    },
}

fn main() -> anyhow::Result<()> {
    match Cli::parse().command {
        Commands::Ci => {
            cargo(&["fmt", "--all", "--check"])?;
            cargo(&["clippy", "--workspace", "--all-targets", "--", "-D", "warnings"])?;
            cargo(&["test", "--workspace"])?;
            println!("CI checks passed");
        }
        Commands::Bench => {
            let mut args = vec!["bench"];
            for name in BENCH_CRATES {
                args.extend(["-p", name]);
            }
            cargo(&args)?;
        }
        Commands::Fuzz { target, seconds } => {
            let targets: Vec<&str> = match target.as_deref() {
                Some(t) if FUZZ_TARGETS.contains(&t) => vec![t],
                Some(t) => anyhow::bail!("unknown fuzz target {t:?}, expected one of {FUZZ_TARGETS:?}"),
                None => FUZZ_TARGETS.to_vec(),
            };
            let max_time = format!("-max_total_time={seconds}");
            for t in targets {
                println!("Fuzzing {t} for {seconds}s");
                cargo(&["+nightly", "fuzz", "run", t, "--", &max_time])?;
            }
        }
    }

    Ok(())
}

fn cargo(args: &[&str]) -> anyhow::Result<()> {
    let status = Command::new("cargo").args(args).status()?;
    if !status.success() {
        anyhow::bail!("cargo {} failed", args.join(" "));
    }
    Ok(())
}
