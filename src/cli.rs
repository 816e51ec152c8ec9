//! CLI interface for usagemeter
//!
//! The command line doubles as the configuration layer: every tunable is a
//! global flag that can also be set through a `USAGEMETER_*` environment
//! variable.
//!
//! # Example
//!
//! ```bash
//! # Record events piped in as JSON lines
//! cat calls.jsonl | usagemeter record
//!
//! # One principal's usage
//! usagemeter self --principal user-1
//!
//! # Company view, detailed, bucketed by week
//! usagemeter --directory directory.json scope --scope acme --detailed -g week
//!
//! # Detailed view limited to what a viewer may see
//! usagemeter --directory directory.json detailed --as user-1 --since 2024-01-01 --json
//! ```

use crate::config::MeterConfig;
use crate::error::Result;
use crate::params::UsageQueryParams;
use crate::pricing::PricingSource;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

/// Usage metering and cost attribution for metered AI-model calls
#[derive(Parser, Debug, Clone)]
#[command(name = "usagemeter")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Show informational output (default is quiet mode with only warnings and errors)
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Output as JSON
    #[arg(long, global = true)]
    pub json: bool,

    /// JSON-lines file holding stored usage events
    #[arg(
        long,
        global = true,
        env = "USAGEMETER_EVENTS",
        default_value = "usage-events.jsonl"
    )]
    pub events: PathBuf,

    /// Directory file with admins, scope memberships, and display names
    #[arg(long, global = true, env = "USAGEMETER_DIRECTORY")]
    pub directory: Option<PathBuf>,

    /// Pricing table JSON file (defaults to the embedded table)
    #[arg(long, global = true, env = "USAGEMETER_PRICING", conflicts_with = "pricing_url")]
    pub pricing: Option<PathBuf>,

    /// URL to fetch the pricing table from once at startup
    #[arg(long, global = true, env = "USAGEMETER_PRICING_URL")]
    pub pricing_url: Option<String>,

    #[command(flatten)]
    pub tuning: TuningArgs,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Command,
}

/// Limits and queue sizes
#[derive(Args, Debug, Clone)]
pub struct TuningArgs {
    /// Recorder queue capacity; events beyond it are dropped
    #[arg(long, global = true, env = "USAGEMETER_RECORDER_CAPACITY", default_value_t = 10_000)]
    pub recorder_capacity: usize,

    /// Number of recent events in summary views
    #[arg(long, global = true, env = "USAGEMETER_RECENT_LOGS", default_value_t = 20)]
    pub recent_logs: usize,

    /// Number of principals in the global summary
    #[arg(long, global = true, env = "USAGEMETER_TOP_PRINCIPALS", default_value_t = 10)]
    pub top_principals: usize,

    /// Page size when --limit is not given
    #[arg(long, global = true, env = "USAGEMETER_PAGE_LIMIT", default_value_t = 50)]
    pub page_limit: usize,

    /// Largest page size a caller may request
    #[arg(long, global = true, env = "USAGEMETER_MAX_PAGE_LIMIT", default_value_t = 500)]
    pub max_page_limit: usize,

    /// Query deadline in seconds (0 disables it)
    #[arg(long, global = true, env = "USAGEMETER_QUERY_TIMEOUT", default_value_t = 30)]
    pub query_timeout: u64,
}

impl TuningArgs {
    pub fn to_config(&self) -> MeterConfig {
        MeterConfig {
            recorder_capacity: self.recorder_capacity,
            recent_log_limit: self.recent_logs,
            top_principals: self.top_principals,
            default_page_limit: self.page_limit,
            max_page_limit: self.max_page_limit,
            query_timeout: (self.query_timeout > 0)
                .then(|| Duration::from_secs(self.query_timeout)),
        }
    }
}

/// Filters and paging shared by the detailed views
#[derive(Args, Debug, Clone, Default)]
pub struct FilterArgs {
    /// Start date (YYYY-MM-DD or RFC 3339)
    #[arg(long)]
    pub since: Option<String>,

    /// End date, inclusive (YYYY-MM-DD or RFC 3339)
    #[arg(long)]
    pub until: Option<String>,

    /// Only events for this project
    #[arg(long, short = 'p')]
    pub project: Option<String>,

    /// Only events for this exact model
    #[arg(long, short = 'm')]
    pub model: Option<String>,

    /// Page size for the event listing
    #[arg(long)]
    pub limit: Option<usize>,

    /// Rows to skip in the event listing
    #[arg(long)]
    pub offset: Option<usize>,

    /// Time bucket: day, week, month, or year
    #[arg(long, short = 'g')]
    pub granularity: Option<String>,

    /// Restrict to these principals (comma separated or repeated)
    #[arg(long = "principal", value_delimiter = ',')]
    pub principals: Vec<String>,
}

impl FilterArgs {
    pub fn to_params(&self) -> UsageQueryParams {
        UsageQueryParams {
            start_date: self.since.clone(),
            end_date: self.until.clone(),
            project_id: self.project.clone(),
            model: self.model.clone(),
            limit: self.limit,
            offset: self.offset,
            granularity: self.granularity.clone(),
            principal_ids: (!self.principals.is_empty()).then(|| self.principals.clone()),
        }
    }
}

/// Available commands
#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Usage of a single principal
    #[command(name = "self")]
    SelfUsage {
        /// Principal to report on
        #[arg(long)]
        principal: String,
    },
    /// Usage of every member of a company
    Scope {
        /// Company scope identifier
        #[arg(long)]
        scope: String,

        /// Show the detailed project/time/event view
        #[arg(long, short = 'd')]
        detailed: bool,

        #[command(flatten)]
        filters: FilterArgs,
    },
    /// Usage of everyone, with the heaviest principals
    Global,
    /// Detailed project/time/event view
    Detailed {
        /// Limit the view to what this principal may see
        #[arg(long = "as")]
        viewer: Option<String>,

        #[command(flatten)]
        filters: FilterArgs,
    },
    /// Record usage events read as JSON lines from stdin
    Record,
}

impl Cli {
    pub fn pricing_source(&self) -> PricingSource {
        match (&self.pricing, &self.pricing_url) {
            (Some(path), _) => PricingSource::File(path.clone()),
            (None, Some(url)) => PricingSource::Url(url.clone()),
            (None, None) => PricingSource::Embedded,
        }
    }

    /// Validated runtime configuration
    pub fn meter_config(&self) -> Result<MeterConfig> {
        let config = self.tuning.to_config();
        config.validate()?;
        Ok(config)
    }
}
