//! tp - trip planner CLI
//!
//! Builds the service from configuration and dispatches subcommands.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use eyre::{Context, Result};
use serde::Serialize;
use tracing::{debug, info};

use tripplanner::booking::{BookingDispatcher, BookingProvider, BreakerConfig, HttpBookingProvider};
use tripplanner::cache::PriceCache;
use tripplanner::cli::{Cli, Command, OutputFormat, PlanArgs, get_log_path};
use tripplanner::config::Config;
use tripplanner::domain::{PreferenceCatalog, TripPlanRequest};
use tripplanner::enrich::{DestinationCatalog, Enrichment, EnrichmentFetcher, HttpContentSource};
use tripplanner::llm::create_client;
use tripplanner::planner::PlanGenerator;
use tripplanner::prompts::PromptLoader;
use tripplanner::refresh::RefreshController;
use tripplanner::repository::FileTripRepository;
use tripplanner::service::{PlanView, TripService};
use tripplanner::spans::{ApiTemplates, SpanAllocator};

fn setup_logging(level: Option<&str>) -> Result<()> {
    let log_path = get_log_path();
    if let Some(dir) = log_path.parent() {
        fs::create_dir_all(dir).context("Failed to create log directory")?;
    }

    let level = match level.map(|s| s.to_uppercase()) {
        None => tracing::Level::INFO,
        Some(s) => match s.as_str() {
            "TRACE" => tracing::Level::TRACE,
            "DEBUG" => tracing::Level::DEBUG,
            "INFO" => tracing::Level::INFO,
            "WARN" | "WARNING" => tracing::Level::WARN,
            "ERROR" => tracing::Level::ERROR,
            _ => {
                eprintln!("Warning: Unknown log-level '{}', defaulting to INFO", s);
                tracing::Level::INFO
            }
        },
    };

    let log_file = fs::File::create(&log_path).context("Failed to create log file")?;
    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_ansi(false)
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into()))
        .init();

    info!("Logging initialized (level: {:?})", level);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::load(cli.config.as_ref()).context("Failed to load configuration")?;
    setup_logging(cli.log_level().or(config.log_level.as_deref())).context("Failed to setup logging")?;

    debug!(command = ?cli.command, "main: dispatching command");
    match cli.command {
        Command::Plan { request, format } => cmd_plan(&config, request, format).await,
        Command::Show { trip, format } => {
            let view = build_service(&config, false)?.get_plan(&trip).await?;
            print_view(&view, format)
        }
        Command::List { format } => cmd_list(&config, format).await,
        Command::Refresh {
            trip,
            live,
            interval_secs,
            format,
        } => {
            let max_age = interval_secs.map(Duration::from_secs);
            let view = build_service(&config, false)?.refresh_prices(&trip, live, max_age).await?;
            print_view(&view, format)
        }
        Command::Delete { trip } => {
            let trip_id = build_service(&config, false)?.delete_plan(&trip).await?;
            println!("Deleted {}", trip_id);
            Ok(())
        }
        Command::Enrich { location, format } => cmd_enrich(&config, &location, format).await,
        Command::Catalog { format } => cmd_catalog(&config, format),
        Command::Preferences { format } => cmd_preferences(format),
    }
}

fn build_enrichment(config: &Config) -> Result<Arc<EnrichmentFetcher>> {
    let catalog = DestinationCatalog::load(config.enrichment.catalog_path.as_deref())
        .context("Failed to load destination catalog")?;
    let source = HttpContentSource::new(Duration::from_millis(config.enrichment.source_timeout_ms));
    Ok(Arc::new(EnrichmentFetcher::new(
        Arc::new(catalog),
        Arc::new(source),
        &config.enrichment,
    )))
}

/// Wire the service; the planning provider is only required for `plan`
fn build_service(config: &Config, with_planner: bool) -> Result<TripService> {
    debug!(with_planner, "build_service: called");
    let cache = Arc::new(PriceCache::new(config.cache.ttl()));
    let provider = HttpBookingProvider::from_config(&config.booking)
        .context("Failed to create booking provider")?
        .map(|p| Arc::new(p) as Arc<dyn BookingProvider>);
    if provider.is_none() {
        info!("No booking base-url configured, live prices disabled");
    }

    let dispatcher = BookingDispatcher::new(
        provider,
        cache,
        BreakerConfig::from(&config.dispatch),
        config.dispatch.retry_policy(),
    );
    let enrichment = build_enrichment(config)?;
    let controller = RefreshController::new(Arc::new(dispatcher), &config.refresh).with_enrichment(enrichment.clone());
    let repository =
        FileTripRepository::open(&config.storage.store_dir).context("Failed to open trip store")?;
    let allocator = SpanAllocator::new(ApiTemplates::new());

    let service = TripService::new(Arc::new(repository), controller, allocator).with_enrichment(enrichment);
    if !with_planner {
        return Ok(service);
    }

    config.validate()?;
    let llm = create_client(&config.llm).context("Failed to create LLM client")?;
    let prompts = match &config.planner.prompts_dir {
        Some(dir) => PromptLoader::new(dir),
        None => PromptLoader::embedded_only(),
    };
    let generator = PlanGenerator::new(llm, prompts, config.planner.retry_policy(), config.planner.max_tokens);
    Ok(service.with_generator(generator))
}

fn load_request(args: PlanArgs) -> Result<TripPlanRequest> {
    if let Some(path) = args.request {
        let content = fs::read_to_string(&path).context(format!("Failed to read {}", path.display()))?;
        // YAML is a superset of JSON, one parser covers both
        let request: TripPlanRequest =
            serde_yaml::from_str(&content).context(format!("Invalid request file {}", path.display()))?;
        return Ok(request);
    }

    let (Some(location), Some(start), Some(end)) = (args.location, args.start, args.end) else {
        eyre::bail!("--location, --start and --end are required without --request");
    };
    let mut request = TripPlanRequest::new(location, start, end, args.budget);
    request.style = args.style.unwrap_or_default();
    request.from_location = args.from_location;
    request.physical_constraints = args.physical_constraints;
    request.language_preference = args.language;
    request.trip_purpose = args.purpose;
    request.interests = args.interests;
    request.pace = args.pace;
    request.additional_notes = args.notes;
    Ok(request)
}

async fn cmd_plan(config: &Config, args: PlanArgs, format: OutputFormat) -> Result<()> {
    let request = load_request(args)?;
    let service = build_service(config, true)?;
    let view = service.create_plan(request).await?;
    print_view(&view, format)
}

async fn cmd_list(config: &Config, format: OutputFormat) -> Result<()> {
    let plans = build_service(config, false)?.list_plans().await?;
    if format == OutputFormat::Json {
        return print_json(&plans);
    }
    if plans.is_empty() {
        println!("No trips yet. Create one with `tp plan`.");
        return Ok(());
    }
    for plan in plans {
        println!(
            "{:<40} {:<8} {} → {}  {}",
            plan.trip_id, plan.status, plan.metadata.start_date, plan.metadata.end_date, plan.title
        );
    }
    Ok(())
}

async fn cmd_enrich(config: &Config, location: &str, format: OutputFormat) -> Result<()> {
    let fetcher = build_enrichment(config)?;
    let enrichment = fetcher.fetch(location).await;
    if format == OutputFormat::Json {
        return print_json(&enrichment);
    }
    match &enrichment {
        Enrichment::Empty => println!("No content available for '{}'", location),
        Enrichment::Content { destination, sources } => {
            match destination {
                Some(name) => println!("Destination: {}", name),
                None => println!("Destination: (not in catalog, searched)"),
            }
            for source in sources {
                let marker = if source.truncated { " (truncated)" } else { "" };
                println!("\n## {}{}\n\n{}", source.url, marker, source.text.trim());
            }
        }
    }
    Ok(())
}

fn cmd_catalog(config: &Config, format: OutputFormat) -> Result<()> {
    let catalog = DestinationCatalog::load(config.enrichment.catalog_path.as_deref())
        .context("Failed to load destination catalog")?;
    if format == OutputFormat::Json {
        return print_json(&catalog.destinations());
    }
    for dest in catalog.destinations() {
        let country = dest.country.as_deref().unwrap_or("-");
        println!("{:<16} {:<16} {}", dest.name, country, dest.aliases.join(", "));
    }
    Ok(())
}

fn cmd_preferences(format: OutputFormat) -> Result<()> {
    let catalog = PreferenceCatalog::build();
    if format == OutputFormat::Json {
        return print_json(&catalog);
    }
    for (section, options) in catalog.sections() {
        println!("{}:", section);
        for option in options {
            println!("  {:<26} {}", option.label, option.details);
        }
        println!();
    }
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).context("Failed to serialize output")?);
    Ok(())
}

fn print_view(view: &PlanView, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        return print_json(view);
    }

    let plan = &view.plan;
    println!("{}  [{}]", plan.title, plan.trip_id);
    println!(
        "{} → {}  {}  status: {}  v{}",
        plan.metadata.start_date, plan.metadata.end_date, plan.metadata.location, plan.status, plan.version
    );
    if let Some(summary) = &plan.summary {
        println!("\n{}", summary);
    }

    for day in &plan.days {
        println!("\n{}", day.date);
        for activity in &day.activities {
            let time = activity.start_time.as_deref().unwrap_or("");
            println!("  {:<6} {}", time, activity.name);
        }
    }

    println!("\nBookings:");
    for price in &view.prices.spans {
        let amount = match (price.price, price.currency.as_deref()) {
            (Some(p), Some(c)) => format!("{:.2} {}", p, c),
            _ => "-".to_string(),
        };
        let error = price.error.as_deref().map(|e| format!("  ({})", e)).unwrap_or_default();
        println!(
            "  {:<28} {:<7} {:>14}  {}{}",
            price.span_id, price.kind, amount, price.status, error
        );
    }

    let totals = plan.totals();
    if !totals.is_empty() {
        let line: Vec<String> = totals.iter().map(|(c, t)| format!("{:.2} {}", t, c)).collect();
        println!("\nTotal: {}", line.join(" + "));
    }
    if let Some(Enrichment::Content { destination, sources }) = &view.prices.enrichment {
        println!(
            "\nNo live prices; gathered context for {} from {} source(s).",
            destination.as_deref().unwrap_or(&plan.metadata.location),
            sources.len()
        );
    }
    Ok(())
}
