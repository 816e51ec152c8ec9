//! usagemeter - Usage metering and cost attribution for metered AI-model calls

use clap::Parser;
use std::sync::Arc;
use tokio::io::BufReader;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use usagemeter::{
    aggregation::Aggregator,
    cli::{Cli, Command},
    config::MeterConfig,
    data_loader::{EventLog, read_inputs},
    error::{MeterError, Result},
    pricing::{PricingResolver, PricingTable},
    queries::UsageQueries,
    recorder::EventRecorder,
    scope::{ScopeResolver, StaticDirectory},
    store::InMemoryUsageStore,
    types::{PrincipalId, ScopeId},
};
use usagemeter_terminal::{OutputFormatter, get_formatter};

/// Pipe stdin through the recorder, then persist what the writer stored
async fn record_from_stdin(
    log: &EventLog,
    config: &MeterConfig,
    formatter: &dyn OutputFormatter,
) -> Result<String> {
    use futures::StreamExt;

    let store = Arc::new(InMemoryUsageStore::new());
    let (recorder, writer) = EventRecorder::spawn(store.clone(), config.recorder_capacity);

    let inputs = read_inputs(BufReader::new(tokio::io::stdin()));
    tokio::pin!(inputs);
    while let Some(input) = inputs.next().await {
        recorder.record(input?);
        // Let the writer drain between lines so a large pipe is not dropped
        tokio::task::yield_now().await;
    }

    let stats = recorder.stats();
    drop(recorder);
    writer
        .await
        .map_err(|e| MeterError::Storage(format!("recorder writer failed: {e}")))?;

    log.append_events(&store.snapshot().await).await?;
    info!(
        "Recorded {} events into {}",
        stats.written(),
        log.path().display()
    );
    Ok(formatter.format_recorded(stats.written(), stats.rejected(), stats.dropped()))
}

async fn build_queries(cli: &Cli, config: &MeterConfig, log: &EventLog) -> Result<UsageQueries> {
    let pricing = PricingResolver::new(Arc::new(PricingTable::load(&cli.pricing_source()).await?));
    let directory = Arc::new(match &cli.directory {
        Some(path) => StaticDirectory::from_file(path).await?,
        None => {
            warn!("No --directory given: scopes are empty and nobody is a global admin");
            StaticDirectory::new()
        }
    });
    let store = Arc::new(InMemoryUsageStore::from_stream(log.load_events()).await?);
    info!("Loaded {} events from {}", store.len().await, log.path().display());

    Ok(UsageQueries::new(
        Aggregator::new(store, pricing),
        ScopeResolver::new(directory.clone()),
        directory,
        config.clone(),
    ))
}

async fn run_query(
    queries: &UsageQueries,
    command: Command,
    formatter: &dyn OutputFormatter,
) -> Result<String> {
    let config = queries.config();
    let output = match command {
        Command::SelfUsage { principal } => {
            let response = queries.self_usage(&PrincipalId::new(&principal)).await?;
            formatter.format_summary(&format!("Usage for {principal}"), &response)
        }
        Command::Scope {
            scope,
            detailed,
            filters,
        } => {
            let scope_id = ScopeId::new(&scope);
            if detailed {
                let query = filters.to_params().into_query(config)?;
                let granularity = query.granularity;
                let response = queries.scope_detailed_usage(&scope_id, query).await?;
                formatter.format_detailed(&response, granularity)
            } else {
                let response = queries.scope_usage(&scope_id).await?;
                formatter.format_summary(&format!("Usage for {scope}"), &response)
            }
        }
        Command::Global => {
            let response = queries.global_summary().await?;
            formatter.format_summary("Usage for everyone", &response)
        }
        Command::Detailed { viewer, filters } => {
            let query = filters.to_params().into_query(config)?;
            let granularity = query.granularity;
            let response = match viewer {
                Some(viewer) => {
                    queries
                        .detailed_usage_for(&PrincipalId::new(viewer), query)
                        .await?
                }
                None => queries.detailed_usage(query, None).await?,
            };
            formatter.format_detailed(&response, granularity)
        }
        Command::Record => {
            return Err(MeterError::InvalidArgument(
                "record is not a query".to_string(),
            ));
        }
    };
    Ok(output)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // --verbose overrides RUST_LOG
    let filter = if cli.verbose {
        tracing_subscriber::EnvFilter::new("usagemeter=info")
    } else {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("usagemeter=warn"))
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = cli.meter_config()?;
    let color = is_terminal::is_terminal(std::io::stdout());
    let formatter = get_formatter(cli.json, color);
    let log = EventLog::new(&cli.events);

    let output = match cli.command.clone() {
        Command::Record => record_from_stdin(&log, &config, formatter.as_ref()).await?,
        command => {
            let queries = build_queries(&cli, &config, &log).await?;
            run_query(&queries, command, formatter.as_ref()).await?
        }
    };

    print!("{output}");
    Ok(())
}
