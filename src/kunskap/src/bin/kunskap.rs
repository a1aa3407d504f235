use std::{net::SocketAddr, path::PathBuf, sync::Arc};

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use kunskap::{
    config::{Config, keys},
    handler::{EventContext, TriggerEvent, handle_trigger},
    logging::{self, LogFormat},
    schedule,
    server::{self, AppState},
    template::SqlTemplate,
};
use query_engine::{
    QueryEngine,
    bigquery::BigQueryClient,
    memory::InMemoryEngine,
    models::DatasetReference,
};
use tracing::info;

#[derive(Parser)]
#[command(version, about = "Refresh the billing audit-log view and rebuild the cost table")]
struct Cli {
    /// Path to the settings file (kunskap.toml)
    #[arg(short, long, env = "KUNSKAP_CONFIG", default_value = "kunskap.toml")]
    config: PathBuf,

    /// Log line format
    #[arg(long, value_enum, default_value_t = LogFormat::Text)]
    log_format: LogFormat,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// Run one invocation now
    Run {
        /// Use an in-memory engine seeded with the configured datasets
        #[arg(long)]
        dry_run: bool,
    },

    /// Serve the Pub/Sub push endpoint
    Serve {
        /// Port to listen on (Cloud Run sets PORT)
        #[arg(long, env = "PORT", default_value = "8080")]
        port: u16,
    },

    /// Invoke on a cron schedule (six fields, seconds first)
    Schedule {
        #[arg(long, default_value = "0 0 * * * *")]
        cron: String,
    },

    /// Validate settings and render both SQL templates without running them
    Check,
}

async fn bigquery_engine(config: &Config) -> Result<Arc<dyn QueryEngine>> {
    let project = config.require(keys::BILLING_PROJECT_ID)?;
    let client = BigQueryClient::from_env(project, config.location().map(str::to_string))
        .await
        .context("failed to create BigQuery client")?;
    Ok(Arc::new(client))
}

fn dry_run_engine(config: &Config) -> Result<Arc<dyn QueryEngine>> {
    let project = config.require(keys::BILLING_PROJECT_ID)?;
    let engine = InMemoryEngine::new()
        .with_dataset(DatasetReference::new(
            project,
            config.require(keys::AUDIT_LOGS_DATASET_ID)?,
        ))
        .with_dataset(DatasetReference::new(
            project,
            config.require(keys::OUTPUT_DATASET_ID)?,
        ));
    Ok(Arc::new(engine))
}

fn check(config: &Config) -> Result<()> {
    config.validate()?;
    for key in [keys::CREATE_VIEW_SQL_PATH, keys::CREATE_OUTPUT_TABLE_SQL_FILE_PATH] {
        let path = config.resolve_path(key)?;
        let template = SqlTemplate::load(&path)?;
        let names = template.placeholders()?;
        template
            .render(config)
            .with_context(|| format!("rendering {}", path.display()))?;
        println!("{}: ok ({})", path.display(), names.join(", "));
    }
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(cli.log_format);

    let config = Config::load(&cli.config)
        .with_context(|| format!("loading {}", cli.config.display()))?
        .with_env_overrides();
    let config = Arc::new(config);

    match cli.cmd {
        Cmd::Run { dry_run } => {
            let engine = if dry_run {
                dry_run_engine(&config)?
            } else {
                bigquery_engine(&config).await?
            };
            handle_trigger(
                engine.as_ref(),
                &config,
                &TriggerEvent::default(),
                &EventContext::manual(),
            )
            .await;
        }
        Cmd::Serve { port } => {
            let engine = bigquery_engine(&config).await?;
            let addr = SocketAddr::from(([0, 0, 0, 0], port));
            server::serve(addr, AppState { engine, config }).await?;
        }
        Cmd::Schedule { cron } => {
            let engine = bigquery_engine(&config).await?;
            schedule::run(&cron, engine, config).await?;
        }
        Cmd::Check => {
            if let Err(err) = check(&config) {
                bail!("configuration check failed: {err:#}");
            }
            info!("configuration ok");
        }
    }

    Ok(())
}
