use std::io::{self, Write};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use cmsstore::{CmsClient, ContentStore};
use dlpfetcher::{DlpFetcher, GatewayFetcher};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use crate::check::{env_report, ConnectionCheck};
use crate::config::{load_env_file, store_config_from_lookup, Environment, SyncConfig};
use crate::dry_run::DryRunStore;
use crate::remove_field::{confirm, preview_lines, FieldRemoval};
use crate::sync::Synchronizer;

const LOG_LEVEL_VAR: &str = "LOG_LEVEL";

#[derive(Debug, Parser)]
#[command(
    name = "dlpsync",
    author,
    version,
    about = "Keeps CMS DataDAO records in step with the DLP subgraph"
)]
pub struct Cli {
    /// Environment whose env file is loaded
    #[arg(long, value_enum, global = true, default_value = "mainnet")]
    pub env: Environment,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Reconciles every DLP in the feed into the CMS
    Sync(SyncArgs),
    /// Checks configuration, store access and the subgraph
    Check,
    /// Removes one field from every document of a type
    RemoveField(RemoveFieldArgs),
}

#[derive(Debug, Args)]
pub struct SyncArgs {
    /// Run the whole pipeline without writing to the CMS
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
    /// Do not run the connection check first
    #[arg(long, default_value_t = false)]
    pub skip_check: bool,
    /// Print the run summary as JSON
    #[arg(long, default_value_t = false)]
    pub json: bool,
}

#[derive(Debug, Args)]
pub struct RemoveFieldArgs {
    /// Document type, e.g. `dataDAO`
    pub document_type: String,
    /// Field to remove, e.g. `isEligibleForRewards`
    pub field_name: String,
    /// Preview the affected documents without changing them
    #[arg(long, default_value_t = false)]
    pub dry_run: bool,
    /// Skip the confirmation prompt
    #[arg(long, short = 'y', default_value_t = false)]
    pub yes: bool,
}

/// Parses the process arguments and runs the chosen command.
///
/// Help and version requests exit with 0, every other argument error with 1.
pub async fn run_cli() -> anyhow::Result<ExitCode> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            let code = if err.use_stderr() {
                ExitCode::FAILURE
            } else {
                ExitCode::SUCCESS
            };
            let _ = err.print();
            return Ok(code);
        }
    };
    run(cli).await?;
    Ok(ExitCode::SUCCESS)
}

pub async fn run(cli: Cli) -> anyhow::Result<()> {
    let env_file = load_env_file(cli.env).context("failed to load env file")?;
    init_tracing();
    match &env_file {
        Some(path) => info!(environment = cli.env.as_str(), path = %path.display(), "loaded env file"),
        None => info!(environment = cli.env.as_str(), "no env file, using process environment"),
    }

    match cli.command {
        Command::Sync(args) => run_sync(cli.env, args).await,
        Command::Check => run_check(cli.env).await,
        Command::RemoveField(args) => run_remove_field(cli.env, args).await,
    }
}

/// `RUST_LOG` first, then `LOG_LEVEL`, then `info`.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| match std::env::var(LOG_LEVEL_VAR) {
            Ok(level) if !level.trim().is_empty() => EnvFilter::try_new(level.trim()),
            _ => Ok(EnvFilter::new("info")),
        })
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).with_writer(io::stderr).try_init();
}

fn connect(config: &SyncConfig) -> anyhow::Result<(Arc<dyn ContentStore>, DlpFetcher)> {
    let store: Arc<dyn ContentStore> =
        Arc::new(CmsClient::new(config.store.clone()).context("failed to create CMS client")?);
    let fetcher =
        DlpFetcher::from_config(&config.fetcher).context("failed to create DLP fetcher")?;
    Ok((store, fetcher))
}

async fn run_sync(environment: Environment, args: SyncArgs) -> anyhow::Result<()> {
    let config = SyncConfig::from_env(environment).context("invalid configuration")?;
    info!(
        environment = environment.as_str(),
        dataset = %config.store.dataset,
        dry_run = args.dry_run,
        "starting DataDAO sync"
    );

    let (store, fetcher) = connect(&config)?;
    let store: Arc<dyn ContentStore> = if args.dry_run {
        Arc::new(DryRunStore::new(store))
    } else {
        store
    };

    if !args.skip_check {
        ConnectionCheck::new(store.clone(), fetcher.clone())
            .run(&mut io::stdout())
            .await
            .context("connection check failed")?;
    }

    let assets = GatewayFetcher::new()
        .with_gateways(config.fetcher.ipfs_gateways.clone())
        .with_timeout(config.fetcher.gateway_timeout());
    let mut synchronizer =
        Synchronizer::new(fetcher, store, Arc::new(assets)).with_item_delay(config.item_delay);
    let stats = synchronizer.run().await.context("sync failed")?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    } else {
        println!("{}{stats}", if args.dry_run { "[dry-run] " } else { "" });
    }
    Ok(())
}

async fn run_check(environment: Environment) -> anyhow::Result<()> {
    let mut out = io::stdout();
    writeln!(out, "Environment: {}", environment.as_str())?;
    for (name, value) in env_report(|key: &str| std::env::var(key).ok()) {
        writeln!(out, "  {name:<24} {value}")?;
    }

    let config = SyncConfig::from_env(environment).context("invalid configuration")?;
    let (store, fetcher) = connect(&config)?;
    ConnectionCheck::new(store, fetcher)
        .run(&mut out)
        .await
        .context("connection check failed")?;
    Ok(())
}

async fn run_remove_field(environment: Environment, args: RemoveFieldArgs) -> anyhow::Result<()> {
    let store_config = store_config_from_lookup(|key: &str| std::env::var(key).ok())
        .context("invalid configuration")?;
    let mode = if args.dry_run { "dry run (preview only)" } else { "live" };
    info!(
        environment = environment.as_str(),
        dataset = %store_config.dataset,
        doc_type = %args.document_type,
        field = %args.field_name,
        mode,
        "field removal"
    );

    let store = Arc::new(CmsClient::new(store_config).context("failed to create CMS client")?);
    let removal = FieldRemoval::new(store, args.document_type, args.field_name)?;
    let documents = removal.find().await.context("failed to fetch documents")?;
    if documents.is_empty() {
        println!("No documents found with the specified field. Nothing to do.");
        return Ok(());
    }

    println!("Documents that will be affected:");
    for line in preview_lines(&documents, removal.field()) {
        println!("  {line}");
    }

    if !args.dry_run && !args.yes {
        warn!("this permanently removes the field from every listed document");
        let question = format!(
            "Are you sure you want to remove \"{}\" from {} {} documents?",
            removal.field(),
            documents.len(),
            removal.doc_type()
        );
        let confirmed = confirm(&question, &mut io::stdin().lock(), &mut io::stdout())?;
        if !confirmed {
            println!("Operation cancelled by user");
            return Ok(());
        }
    }

    let stats = removal.remove(&documents, args.dry_run).await;
    let prefix = if args.dry_run { "[dry-run] " } else { "" };
    println!(
        "{prefix}Processed {} documents: {} removed, {} errors",
        stats.matched, stats.removed, stats.errors
    );
    if args.dry_run {
        println!("Dry run completed. No changes were made.");
    }
    Ok(())
}
