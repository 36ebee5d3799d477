//! Operator CLI: run pipeline stages, ask questions, clear tables.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dialoguer::Confirm;
use integraldb_core::domains::catalog::activities::extract_staged_records;
use integraldb_core::domains::documents::activities::embed_documents;
use integraldb_core::domains::ingestion::{google, ingest};
use integraldb_core::domains::pipeline::{clear_tables, resolve_tables, run_once};
use integraldb_core::domains::query::{QueryEngine, QueryOutcome, Source};
use integraldb_core::kernel::{
    scheduled_tasks::run_scheduled, start_scheduler, BaseDrive, BaseMailbox, PipelineDeps,
    PipelineSources,
};
use integraldb_core::{Config, GoogleConfig};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "integraldb")]
#[command(about = "Supplier email ETL and hybrid question answering")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Download new mail and drive PDFs and stage email records
    Ingest {
        /// Newest inbox messages to look at (defaults to MAX_EMAILS)
        #[arg(long)]
        max_emails: Option<u32>,
        #[arg(long)]
        skip_drive: bool,
    },

    /// Extract suppliers and products from staged records
    Extract,

    /// Chunk and embed every PDF in the attachments directory
    Embed {
        /// Re-embed documents whose content has not changed
        #[arg(long)]
        reindex: bool,
    },

    /// Answer one question and print the sources used
    Ask { question: String },

    /// Ingest, extract and embed once
    Run {
        /// Skip ingestion and process what is already staged
        #[arg(long)]
        offline: bool,
    },

    /// Run now, then every UPDATE_INTERVAL_SECS until interrupted
    Schedule,

    /// Delete every row from the given tables
    Clear {
        #[arg(long, value_delimiter = ',', default_value = "document_chunks")]
        tables: Vec<String>,
        /// Skip the confirmation prompt
        #[arg(long)]
        yes: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,integraldb_core=debug,sqlx=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env().context("Failed to load configuration")?;
    let pool = connect(&config).await?;
    let deps = PipelineDeps::from_config(config, pool);

    match cli.command {
        Commands::Ingest {
            max_emails,
            skip_drive,
        } => {
            let sources = google_sources(&deps.config, !skip_drive).await?;
            let mailbox = sources
                .mailbox
                .as_deref()
                .context("mail credentials are required for ingest")?;
            let max = max_emails.unwrap_or(deps.config.max_emails);
            let report = ingest(&deps, mailbox, sources.drive.as_deref(), max).await?;
            println!("{:#?}", report);
        }
        Commands::Extract => {
            let report = extract_staged_records(&deps).await?;
            println!("{:#?}", report);
        }
        Commands::Embed { reindex } => {
            let report = embed_documents(&deps, reindex).await?;
            println!("{:#?}", report);
        }
        Commands::Ask { question } => {
            let outcome = QueryEngine::from_deps(&deps).ask(&question).await?;
            print_outcome(&outcome);
        }
        Commands::Run { offline } => {
            let sources = if offline {
                PipelineSources::default()
            } else {
                google_sources(&deps.config, true).await?
            };
            let report =
                run_once(&deps, sources.mailbox.as_deref(), sources.drive.as_deref()).await?;
            println!("{:#?}", report);
        }
        Commands::Schedule => {
            let sources = google_sources(&deps.config, true).await?;
            let interval = Duration::from_secs(deps.config.update_interval_secs.max(60));

            run_scheduled(&deps, &sources).await;
            let mut scheduler = start_scheduler(deps, sources, interval).await?;

            tokio::signal::ctrl_c()
                .await
                .context("Failed to listen for ctrl-c")?;
            tracing::info!("Shutting down scheduler");
            scheduler.shutdown().await?;
        }
        Commands::Clear { tables, yes } => clear(&deps.db_pool, &tables, yes).await?,
    }
    Ok(())
}

async fn connect(config: &Config) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&config.database_url)
        .await
        .context("Failed to connect to database")?;
    sqlx::migrate!("./migrations")
        .run(&pool)
        .await
        .context("Failed to run migrations")?;
    Ok(pool)
}

async fn google_sources(config: &Config, with_drive: bool) -> Result<PipelineSources> {
    let google_config = GoogleConfig::from_env(&config.data_dir);
    let (gmail, drive) = google::connect(&google_config, config.retry_policy())
        .await
        .context("Failed to set up mail and drive clients")?;

    let mailbox: Arc<dyn BaseMailbox> = Arc::new(gmail);
    let drive: Option<Arc<dyn BaseDrive>> = if with_drive {
        Some(Arc::new(drive))
    } else {
        None
    };
    Ok(PipelineSources {
        mailbox: Some(mailbox),
        drive,
    })
}

fn print_outcome(outcome: &QueryOutcome) {
    println!("{}\n", outcome.answer_text());
    if let QueryOutcome::Answered { sources, .. } = outcome {
        println!("Sources:");
        for source in sources {
            match source {
                Source::Catalog {
                    supplier,
                    product,
                    source_document,
                } => println!("  - catalog: {} / {} ({})", supplier, product, source_document),
                Source::Document {
                    source_document,
                    chunk_index,
                    similarity,
                    supplier,
                } => println!(
                    "  - document: {} #{}{} (similarity {:.2})",
                    source_document,
                    chunk_index,
                    supplier.as_ref().map(|s| format!(" [{}]", s)).unwrap_or_default(),
                    similarity
                ),
            }
        }
    }
}

async fn clear(pool: &PgPool, tables: &[String], yes: bool) -> Result<()> {
    let selected = resolve_tables(tables)?;

    if !yes {
        let confirmed = Confirm::new()
            .with_prompt(format!("Delete ALL rows from {}?", selected.join(", ")))
            .default(false)
            .interact()?;
        if !confirmed {
            println!("Aborted");
            return Ok(());
        }
    }

    for cleared in clear_tables(&selected, pool).await? {
        println!("{}: {} rows deleted", cleared.table, cleared.rows);
    }
    Ok(())
}
