// Copyright 2026 Tweetline Contributors
// SPDX-License-Identifier: MIT

use anyhow::Result;
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use tweetline_runtime::cli;

#[derive(Parser)]
#[command(
    name = "tweetline",
    about = "Tweetline: capture and normalize a profile timeline",
    version,
    after_help = "Run 'tweetline <command> --help' for details on each command."
)]
struct Cli {
    /// Output results as JSON (machine-readable)
    #[arg(long, global = true)]
    json: bool,

    /// Suppress non-essential output
    #[arg(long, short, global = true)]
    quiet: bool,

    /// Enable verbose/debug logging
    #[arg(long, short, global = true)]
    verbose: bool,

    /// Log filter used when RUST_LOG is unset (e.g. "info", "tweetline_runtime=debug")
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Log line format on stderr
    #[arg(long, global = true, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum LogFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Scroll a profile in Chromium, replay its timeline calls and write the views
    Scrape(cli::scrape_cmd::ScrapeArgs),
    /// Normalize a saved raw payload file without a browser
    Process(cli::process_cmd::ProcessArgs),
    /// Check environment and diagnose issues
    Doctor,
    /// Generate shell completion scripts
    Completions {
        /// Shell type (bash, zsh, fish, powershell)
        shell: Shell,
    },
}

fn init_tracing(cli: &Cli) {
    let level = if cli.verbose { "debug" } else { cli.log_level.as_str() };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match cli.log_format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set global flags via environment variables so all modules can check them
    if cli.json {
        std::env::set_var("TWEETLINE_JSON", "1");
    }
    if cli.quiet {
        std::env::set_var("TWEETLINE_QUIET", "1");
    }

    init_tracing(&cli);

    let result = match cli.command {
        Commands::Scrape(args) => cli::scrape_cmd::run(args).await,
        Commands::Process(args) => cli::process_cmd::run(args).await,
        Commands::Doctor => cli::doctor::run().await,
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "tweetline", &mut std::io::stdout());
            Ok(())
        }
    };

    // Consistent exit codes: 0=success (including "no data"), 1=error
    if let Err(e) = &result {
        if !cli::output::is_quiet() && !cli::output::is_json() {
            eprintln!("  Error: {e:#}");
        }
        if cli::output::is_json() {
            cli::output::print_json(&serde_json::json!({
                "error": true,
                "message": format!("{e:#}"),
            }));
        }
        std::process::exit(1);
    }

    result
}
