use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, ValueEnum};
use log::{debug, LevelFilter};

use crate::config::EngineConfig;
use crate::logging::LogFormat;

/// Which demonstration to run
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Scenario {
    /// Synchronous and asynchronous observers of an order event
    Orders,
    /// An interceptor chain around a service method and its lifecycle callbacks
    Interception,
    /// Every scenario in turn
    All,
}

/// Event notification and interception engine demo
#[derive(Parser, Debug)]
#[command(name = "eventwire")]
#[command(about = "Typed event notification and method interception engine")]
#[command(version)]
pub struct Args {
    /// Scenario to run
    #[arg(value_enum, default_value = "all")]
    pub scenario: Scenario,

    /// Verbose output (debug level logging)
    #[arg(short, long)]
    pub verbose: bool,

    /// Quiet output (error level logging only)
    #[arg(short, long)]
    pub quiet: bool,

    /// Debug output (trace level logging)
    #[arg(long)]
    pub debug: bool,

    /// Log format: text or json
    #[arg(long, value_name = "FORMAT")]
    pub log_format: Option<String>,

    /// Log file path for file output
    #[arg(long, value_name = "FILE")]
    pub log_file: Option<PathBuf>,

    /// Configuration file path
    #[arg(long, value_name = "FILE")]
    pub config_file: Option<PathBuf>,

    /// Skip event type checks
    #[arg(long)]
    pub lenient: bool,

    /// Size of a dedicated async delivery pool
    #[arg(long, value_name = "N")]
    pub threads: Option<usize>,
}

/// Parse command line arguments
pub fn parse_args() -> Args {
    let args = Args::parse();
    debug!("Parsed CLI arguments: {:?}", args);
    args
}

/// Validate CLI argument combinations
pub fn validate_args(args: &Args) -> Result<()> {
    let log_flags_count = [args.verbose, args.quiet, args.debug]
        .iter()
        .filter(|&&flag| flag)
        .count();
    if log_flags_count > 1 {
        return Err(anyhow::anyhow!(
            "Conflicting log level flags: only one of --verbose, --quiet, or --debug may be specified"
        ));
    }

    if let Some(format) = &args.log_format {
        format.parse::<LogFormat>().map_err(anyhow::Error::msg)?;
    }

    if args.threads == Some(0) {
        return Err(anyhow::anyhow!("--threads must be greater than zero"));
    }
    Ok(())
}

impl Args {
    fn log_level_override(&self) -> Option<LevelFilter> {
        if self.debug {
            Some(LevelFilter::Trace)
        } else if self.verbose {
            Some(LevelFilter::Debug)
        } else if self.quiet {
            Some(LevelFilter::Error)
        } else {
            None
        }
    }

    /// Layer command line settings over file configuration
    pub fn apply_to(&self, mut config: EngineConfig) -> Result<EngineConfig> {
        if let Some(level) = self.log_level_override() {
            config.log_level = Some(level);
        }
        if let Some(format) = &self.log_format {
            config.log_format = Some(format.parse::<LogFormat>().map_err(anyhow::Error::msg)?);
        }
        if let Some(path) = &self.log_file {
            config.log_file = Some(path.clone());
        }
        if self.lenient {
            config.notifier.strict = false;
        }
        if let Some(threads) = self.threads {
            config.notifier.executor.threads = Some(threads);
        }
        Ok(config)
    }
}
