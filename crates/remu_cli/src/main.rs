//! Remu CLI: scan-chain instrumentation for FPGA checkpoint/restore.
//!
//! Provides `remu scan` to instrument an elaborated netlist and emit its
//! scan map, and `remu map` to inspect an existing scan map.

#![warn(missing_docs)]

mod map;
mod pipeline;
mod scan;

use std::process;

use clap::{Parser, Subcommand, ValueEnum};

/// Remu: scan chains for FPGA-based RTL emulation.
#[derive(Parser, Debug)]
#[command(name = "remu", version, about = "Remu scan-chain instrumentation")]
pub struct Cli {
    /// Only report errors.
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Log every rewritten device (debug level).
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// When to colorize diagnostics.
    #[arg(long, global = true, value_enum, default_value_t = ColorChoice::Auto)]
    pub color: ColorChoice,

    /// Path to a custom `remu.toml` configuration file.
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// The subcommand to run.
    #[command(subcommand)]
    pub command: Command,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Instrument the project netlist with scan chains.
    Scan(ScanArgs),
    /// Summarize a scan map.
    Map(MapArgs),
}

/// Arguments for the `remu scan` subcommand.
#[derive(Parser, Debug)]
pub struct ScanArgs {
    /// Root module name, overriding `project.top`.
    #[arg(long)]
    pub top: Option<String>,

    /// Flip-flop chain width, overriding `scan.ff_width`.
    #[arg(long)]
    pub ff_width: Option<u32>,

    /// Memory chain width, overriding `scan.ram_width`.
    #[arg(long)]
    pub ram_width: Option<u32>,

    /// Output netlist path, overriding `output.netlist`.
    #[arg(short, long)]
    pub output: Option<String>,

    /// Scan map path, overriding `output.scanmap`.
    #[arg(long)]
    pub scanmap: Option<String>,

    /// Output format for diagnostics.
    #[arg(short, long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

/// Arguments for the `remu map` subcommand.
#[derive(Parser, Debug)]
pub struct MapArgs {
    /// Scan map file, text or JSON.
    pub path: String,

    /// List every chain entry, not just totals.
    #[arg(short, long)]
    pub entries: bool,

    /// Re-emit the map in another format on stdout.
    #[arg(long, value_enum)]
    pub convert: Option<MapFormat>,
}

/// Scan map encodings.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum MapFormat {
    /// Line-oriented text.
    Text,
    /// JSON document.
    Json,
}

/// Colorization policy for rendered diagnostics.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ColorChoice {
    /// Color when stderr looks like a terminal.
    Auto,
    /// Always color.
    Always,
    /// Plain text.
    Never,
}

/// Diagnostic output format.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human-readable terminal output.
    Text,
    /// Machine-readable JSON output.
    Json,
}

/// Flags shared by every subcommand.
pub struct GlobalArgs {
    /// Errors only.
    pub quiet: bool,
    /// Debug logging.
    pub verbose: bool,
    /// Resolved color choice.
    pub color: bool,
    /// Explicit `remu.toml` path or project directory.
    pub config: Option<String>,
}

fn main() {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        "debug"
    } else if cli.quiet {
        "error"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .with_writer(std::io::stderr)
        .init();

    let color = match cli.color {
        ColorChoice::Auto => std::env::var_os("NO_COLOR").is_none() && std::env::var("TERM").is_ok(),
        ColorChoice::Always => true,
        ColorChoice::Never => false,
    };

    let global = GlobalArgs {
        quiet: cli.quiet,
        verbose: cli.verbose,
        color,
        config: cli.config,
    };

    let result = match cli.command {
        Command::Scan(ref args) => scan::run(args, &global),
        Command::Map(ref args) => map::run(args, &global),
    };

    match result {
        Ok(code) => process::exit(code),
        Err(e) => {
            eprintln!("error: {e}");
            process::exit(1);
        }
    }
}
