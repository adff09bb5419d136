//! `ferrumyx` CLI: job queue inspection, standalone reranking over a JSON
//! candidate dump, and ontology ingestion. Dependency stack follows
//! `ferrumyx-setup`, the only other `clap` binary in this workspace's
//! lineage.

mod lexical;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};
use ferrumyx_common::config::AppConfig;
use ferrumyx_common::error::RagError;
use ferrumyx_db::repo::jobs;
use ferrumyx_embed::registry::ModelRegistry;
use ferrumyx_embed::{BiomedBertEmbedder, EmbeddingConfig};
use ferrumyx_retrieval::reranker::{rerank, RerankRequest};
use ferrumyx_retrieval::types::RankedCandidate;
use serde::Deserialize;
use serde_json::Value;

use lexical::LexicalOverlapEncoder;

#[derive(Parser)]
#[command(name = "ferrumyx", about = "ferrumyx RAG engine operator tooling")]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to a ferrumyx.toml config file; falls back to built-in
    /// defaults plus environment overrides if absent.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Command {
    /// Inspect the embedding_jobs queue.
    Jobs {
        #[command(subcommand)]
        action: JobsAction,
    },
    /// Score a standalone candidate set with the cross-encoder + MMR pass.
    Rerank {
        #[command(subcommand)]
        action: RerankAction,
    },
    /// Parse and index an OBO ontology file outside the HTTP API.
    IngestOntology(IngestOntologyArgs),
}

#[derive(Subcommand)]
enum JobsAction {
    Summary(FormatArgs),
    List(JobsListArgs),
}

#[derive(Subcommand)]
enum RerankAction {
    Rerank(RerankArgs),
}

#[derive(Args)]
struct FormatArgs {
    #[arg(long, value_enum, default_value = "table")]
    format: OutputFormat,
}

#[derive(Args)]
struct JobsListArgs {
    #[arg(long)]
    status: Option<String>,
    #[arg(long, default_value_t = 20)]
    limit: i64,
    /// Include each job's `error_log` column; omitted by default to keep
    /// the table readable.
    #[arg(long)]
    include_error: bool,
    #[arg(long, value_enum, default_value = "table")]
    format: OutputFormat,
}

#[derive(Clone, Copy, clap::ValueEnum)]
enum OutputFormat {
    Table,
    Json,
}

#[derive(Args)]
struct RerankArgs {
    #[arg(long)]
    candidates: PathBuf,
    /// Overrides the query embedded in the candidates file, if any.
    #[arg(long)]
    query: Option<String>,
    #[arg(long, default_value_t = 10)]
    top_k: i64,
    #[arg(long)]
    mmr: bool,
    #[arg(long, default_value_t = 0.5)]
    lambda: f64,
}

#[derive(Args)]
struct IngestOntologyArgs {
    #[arg(long = "type")]
    ontology_type: String,
    #[arg(long)]
    source_id: String,
    #[arg(long)]
    obo_path: PathBuf,
    #[arg(long)]
    auto_embed: bool,
    /// Defaults to the config's `default_embedding_model`.
    #[arg(long)]
    model: Option<String>,
}

#[derive(Deserialize)]
struct CandidatesFile {
    query: Option<String>,
    candidates: Vec<CliCandidate>,
}

#[derive(Deserialize)]
struct CliCandidate {
    chunk_id: String,
    text: String,
    retriever_score: f32,
    embedding: Option<Vec<f32>>,
    metadata: Option<Value>,
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::from(0),
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::from(1)
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = AppConfig::load(cli.config.as_deref())?;

    match cli.command {
        Command::Jobs { action } => run_jobs(&config, action).await,
        Command::Rerank { action } => match action {
            RerankAction::Rerank(args) => run_rerank(args).await,
        },
        Command::IngestOntology(args) => run_ingest_ontology(&config, args).await,
    }
}

async fn run_jobs(config: &AppConfig, action: JobsAction) -> anyhow::Result<()> {
    let pool = ferrumyx_db::connect(&config.database_url).await?;
    match action {
        JobsAction::Summary(args) => {
            let rows = jobs::summary(&pool).await.map_err(RagError::from)?;
            match args.format {
                OutputFormat::Json => {
                    let obj: serde_json::Map<String, Value> =
                        rows.into_iter().map(|(status, count)| (status, Value::from(count))).collect();
                    println!("{}", serde_json::to_string_pretty(&obj)?);
                }
                OutputFormat::Table => {
                    println!("{:<12} {:>8}", "STATUS", "COUNT");
                    for (status, count) in rows {
                        println!("{status:<12} {count:>8}");
                    }
                }
            }
        }
        JobsAction::List(args) => {
            let rows = jobs::list(&pool, args.status.as_deref(), args.limit).await.map_err(RagError::from)?;
            match args.format {
                OutputFormat::Json => {
                    let mut values: Vec<Value> = Vec::with_capacity(rows.len());
                    for job in rows {
                        let mut value = serde_json::to_value(&job)?;
                        if !args.include_error {
                            if let Some(obj) = value.as_object_mut() {
                                obj.remove("error_log");
                            }
                        }
                        values.push(value);
                    }
                    println!("{}", serde_json::to_string_pretty(&values)?);
                }
                OutputFormat::Table => {
                    println!("{:<36} {:<10} {:<10} {:>6} {:>6}  WORKER", "ID", "TYPE", "STATUS", "PRIO", "RETRY");
                    for job in &rows {
                        println!(
                            "{:<36} {:<10} {:<10} {:>6} {:>6}  {}",
                            job.id,
                            job.job_type,
                            job.status,
                            job.priority,
                            job.retry_count,
                            job.worker_id.as_deref().unwrap_or("-"),
                        );
                        if args.include_error {
                            if let Some(err) = &job.error_log {
                                println!("    error: {err}");
                            }
                        }
                    }
                }
            }
        }
    }
    Ok(())
}

async fn run_rerank(args: RerankArgs) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(&args.candidates)
        .map_err(|e| RagError::InvalidArgument(format!("cannot read {}: {e}", args.candidates.display())))?;
    let file: CandidatesFile = serde_json::from_str(&raw).map_err(RagError::from)?;

    let query = args
        .query
        .or(file.query)
        .ok_or_else(|| RagError::InvalidArgument("no --query given and candidates file has no \"query\" field".into()))?;

    let candidates: Vec<RankedCandidate> = file
        .candidates
        .into_iter()
        .map(|c| RankedCandidate {
            chunk_id: c.chunk_id,
            text: c.text,
            score: c.retriever_score,
            retriever_score: c.retriever_score,
            embedding: c.embedding,
            metadata: c.metadata.unwrap_or_else(|| serde_json::json!({})),
        })
        .collect();

    let encoder = LexicalOverlapEncoder;
    let results = rerank(
        Some(&encoder),
        RerankRequest { query_text: &query, candidates, top_k: args.top_k, apply_mmr: args.mmr, mmr_lambda: args.lambda },
    )
    .await?;

    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}

async fn run_ingest_ontology(config: &AppConfig, args: IngestOntologyArgs) -> anyhow::Result<()> {
    let pool = ferrumyx_db::connect(&config.database_url).await?;

    let model_name = args.model.unwrap_or_else(|| config.default_embedding_model.clone());
    let model_registry = ModelRegistry::from_config(&config.embedding_models)?;
    let embed_client: Box<dyn ferrumyx_embed::EmbeddingClient> =
        Box::new(BiomedBertEmbedder::new(EmbeddingConfig::default().with_model(model_name.clone())).await?);

    let summary = ferrumyx_ingestion::workers::ontology::ingest_ontology(
        &pool,
        embed_client.as_ref(),
        &model_registry,
        &args.ontology_type,
        &args.source_id,
        &args.obo_path,
        &model_name,
        args.auto_embed,
    )
    .await?;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
