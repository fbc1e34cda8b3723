//! CLI command definitions and subcommands

use std::path::PathBuf;

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::debug;

use crate::domain::{Interest, LanguagePreference, Pace, PhysicalConstraint, TripPurpose};

/// tp - trip planning with live span pricing
#[derive(Parser)]
#[command(
    name = "tp",
    about = "Generate trip plans and keep their booking prices fresh",
    version = env!("CARGO_PKG_VERSION"),
)]
pub struct Cli {
    /// Path to config file
    #[arg(short, long, global = true, help = "Path to config file")]
    pub config: Option<PathBuf>,

    /// Log level (TRACE, DEBUG, INFO, WARN, ERROR)
    #[arg(
        short = 'l',
        long = "log-level",
        global = true,
        help = "Log level (TRACE, DEBUG, INFO, WARN, ERROR)"
    )]
    pub log_level: Option<String>,

    /// Shorthand for `--log-level DEBUG`
    #[arg(short, long, global = true, conflicts_with = "log_level", help = "Log at DEBUG level")]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

impl Cli {
    /// Level requested on the command line, if any
    pub fn log_level(&self) -> Option<&str> {
        if self.verbose {
            Some("DEBUG")
        } else {
            self.log_level.as_deref()
        }
    }
}

/// CLI subcommands
#[derive(Debug, Subcommand)]
pub enum Command {
    /// Generate a new trip plan and fetch its prices
    Plan {
        #[command(flatten)]
        request: PlanArgs,

        /// Output format
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Show a stored trip with its last known prices
    Show {
        /// Trip id, id prefix or title fragment
        trip: String,

        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// List stored trips
    List {
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Refresh a trip's prices
    Refresh {
        /// Trip id, id prefix or title fragment
        trip: String,

        /// Dispatch lookups for stale spans (otherwise report the cache)
        #[arg(long)]
        live: bool,

        /// Treat prices older than this many seconds as stale
        #[arg(long = "interval-secs", value_name = "SECS")]
        interval_secs: Option<u64>,

        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// Delete a stored trip
    Delete {
        /// Trip id, id prefix or title fragment
        trip: String,
    },

    /// Fetch destination context for a location
    Enrich {
        location: String,

        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// List destinations in the enrichment catalog
    Catalog {
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },

    /// List preference values accepted in plan requests
    Preferences {
        #[arg(short, long, default_value = "text")]
        format: OutputFormat,
    },
}

/// Plan request, from a file or from flags
#[derive(Debug, clap::Args)]
pub struct PlanArgs {
    /// YAML or JSON request file (flags below are ignored when given)
    #[arg(short, long, value_name = "FILE", conflicts_with_all = ["location", "start", "end"])]
    pub request: Option<PathBuf>,

    /// Destination city or country
    #[arg(long, required_unless_present = "request")]
    pub location: Option<String>,

    /// First day (YYYY-MM-DD)
    #[arg(long, required_unless_present = "request")]
    pub start: Option<NaiveDate>,

    /// Last day (YYYY-MM-DD)
    #[arg(long, required_unless_present = "request")]
    pub end: Option<NaiveDate>,

    #[arg(long, default_value_t = 0.0)]
    pub budget: f64,

    #[arg(long)]
    pub style: Option<String>,

    /// Departure city
    #[arg(long = "from")]
    pub from_location: Option<String>,

    #[arg(long = "constraint", value_name = "CONSTRAINT")]
    pub physical_constraints: Vec<PhysicalConstraint>,

    #[arg(long)]
    pub language: Option<LanguagePreference>,

    #[arg(long)]
    pub purpose: Option<TripPurpose>,

    #[arg(long = "interest", value_name = "INTEREST")]
    pub interests: Vec<Interest>,

    #[arg(long)]
    pub pace: Option<Pace>,

    #[arg(long)]
    pub notes: Option<String>,
}

/// Output format for commands that print data
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        debug!(%s, "OutputFormat::from_str: called");
        match s.to_lowercase().as_str() {
            "text" | "plain" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            _ => Err(format!("Unknown format: {}. Use text or json", s)),
        }
    }
}

/// Path of the log file written by `tp`
pub fn get_log_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("tripplanner")
        .join("logs")
        .join("tp.log")
}
