use agent::store;
use anyhow::Context;
use clap::Parser;
use tracing_subscriber::{filter::LevelFilter, EnvFilter};
use upstream::{HttpRoutingDaemon, HttpRuleEngine};

/// Agent owns the local store of alerting configuration (templates,
/// rules, and team credentials) and keeps the rule engine and routing
/// daemon caught up with it.
#[derive(Debug, Parser)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// URL of the SQLite database.
    #[clap(
        long = "database",
        env = "DATABASE_URL",
        default_value = "sqlite://klaxon.db"
    )]
    database_url: String,
    /// Base URL of the rule engine's ruler API.
    #[clap(
        long = "ruler-address",
        env = "RULER_ADDRESS",
        default_value = "http://localhost:9009"
    )]
    ruler_address: String,
    /// Base URL of the routing daemon's configuration API.
    #[clap(
        long = "alertmanager-address",
        env = "ALERTMANAGER_ADDRESS",
        default_value = "http://localhost:9009"
    )]
    alertmanager_address: String,
    /// Deadline of each remote call.
    #[clap(
        long = "remote-timeout",
        env = "REMOTE_TIMEOUT",
        default_value = "30s",
        value_parser = humantime::parse_duration
    )]
    remote_timeout: std::time::Duration,
    #[clap(subcommand)]
    command: Command,
}

#[derive(Debug, clap::Subcommand)]
enum Command {
    /// Create or update the database schema, then exit.
    Migrate,
    /// Apply one declarative YAML file (a template, rules, or a team
    /// credential), replacing the affected remote state.
    Apply { file: std::path::PathBuf },
    /// Re-derive and re-push every rule group and every tenant's
    /// routing document from the store.
    Resync,
}

fn main() -> Result<(), anyhow::Error> {
    // Use reasonable defaults for printing structured logs to stderr.
    let subscriber = tracing_subscriber::FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::INFO.into())
                .from_env_lossy(),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("setting tracing default failed");

    let args = Args::parse();
    tracing::info!(?args, "started!");

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let task = runtime.spawn(async move { async_main(args).await });
    let result = runtime.block_on(task);

    tracing::info!(?result, "main function completed, shutting down runtime");
    runtime.shutdown_timeout(std::time::Duration::from_secs(5));
    result?
}

async fn async_main(args: Args) -> Result<(), anyhow::Error> {
    let pool = store::open(&args.database_url)
        .await
        .context("opening the database")?;
    store::migrate(&pool).await.context("applying the schema")?;

    match args.command {
        Command::Migrate => {
            tracing::info!(database = %args.database_url, "schema is current");
        }
        Command::Apply { file } => {
            let engine = HttpRuleEngine::new(&args.ruler_address, args.remote_timeout)
                .context("building the rule-engine client")?;
            let daemon = HttpRoutingDaemon::new(&args.alertmanager_address, args.remote_timeout)
                .context("building the routing-daemon client")?;
            let rules = agent::RuleSync::new(pool.clone(), engine);
            let routing = agent::RoutingSync::new(pool.clone(), daemon);

            let outcome = agent::apply(&pool, &rules, &routing, &file)
                .await
                .with_context(|| format!("applying {}", file.display()))?;
            tracing::info!(
                templates = outcome.templates.len(),
                rules = outcome.rules.len(),
                credentials = outcome.credentials.len(),
                "apply complete"
            );
        }
        Command::Resync => {
            let engine = HttpRuleEngine::new(&args.ruler_address, args.remote_timeout)
                .context("building the rule-engine client")?;
            let daemon = HttpRoutingDaemon::new(&args.alertmanager_address, args.remote_timeout)
                .context("building the routing-daemon client")?;

            let outcome = agent::resync(&pool, &engine, &daemon)
                .await
                .context("resynchronizing remote state")?;
            tracing::info!(
                groups_replaced = outcome.groups_replaced,
                groups_removed = outcome.groups_removed,
                tenants_replaced = outcome.tenants_replaced,
                "resync complete"
            );
        }
    }

    Ok(())
}
