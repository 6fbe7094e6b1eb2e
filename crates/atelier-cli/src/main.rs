//! Atelier command-line host
//!
//! Loads a workflow file, wires the HTTP generation backend and the
//! persisted result cache into the engine, and streams engine events to
//! stdout as JSON lines. Logs go to stderr.

mod error;
mod http_backend;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use atelier_engine::{
    all_definitions, validate_workflow, AbortSignal, ChannelEventSink, EngineConfig,
    ResultCache, WorkflowGraph, WorkflowRunner,
};

use crate::error::CliError;
use crate::http_backend::HttpBackend;

/// Run and inspect image generation workflows
#[derive(Parser, Debug)]
#[command(name = "atelier", version, about, long_about = None)]
struct Cli {
    /// Path to the engine configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run a workflow, printing every engine event as a JSON line
    Run {
        /// Workflow graph (JSON)
        workflow: PathBuf,

        /// Only run this node and what it depends on
        #[arg(long)]
        node: Option<String>,

        /// Ignore the result cache for this run
        #[arg(long)]
        no_cache: bool,

        /// Write the graph with updated node statuses here afterwards
        #[arg(long)]
        save: Option<PathBuf>,
    },

    /// Validate a workflow without running it
    Validate {
        /// Workflow graph (JSON)
        workflow: PathBuf,
    },

    /// Inspect or clear the persisted result cache
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Print the definition of every node kind
    Nodes,
}

#[derive(Subcommand, Debug)]
enum CacheAction {
    /// Show entry count and location
    Stats,
    /// Remove every cached result
    Clear,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let cli = Cli::parse();

    match dispatch(cli).await {
        Ok(code) => code,
        Err(e) => {
            log::error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

async fn dispatch(cli: Cli) -> Result<ExitCode, CliError> {
    let config_path = cli.config.unwrap_or_else(default_config_path);
    let config = EngineConfig::load(&config_path).await?;

    match cli.command {
        Command::Run {
            workflow,
            node,
            no_cache,
            save,
        } => {
            run_workflow(
                &config_path,
                &config,
                &workflow,
                node.as_deref(),
                no_cache,
                save.as_deref(),
            )
            .await
        }
        Command::Validate { workflow } => validate(&workflow).await,
        Command::Cache { action } => cache_command(&config, action),
        Command::Nodes => {
            println!("{}", serde_json::to_string_pretty(&all_definitions())?);
            Ok(ExitCode::SUCCESS)
        }
    }
}

async fn run_workflow(
    config_path: &Path,
    config: &EngineConfig,
    workflow: &Path,
    target: Option<&str>,
    no_cache: bool,
    save: Option<&Path>,
) -> Result<ExitCode, CliError> {
    let mut graph = read_workflow(workflow).await?;

    let base_url = config
        .backend
        .base_url
        .clone()
        .ok_or_else(|| CliError::NoBackend(config_path.to_path_buf()))?;
    let backend = Arc::new(HttpBackend::new(base_url, config.backend.api_key.clone()));

    let mut runner = WorkflowRunner::from_config(backend, config);
    if !no_cache && config.cache.enabled {
        let cache = open_cache(config);
        if let Err(e) = cache.init() {
            log::warn!("Starting with an empty cache: {}", e);
        }
        runner = runner.with_cache(Arc::new(cache));
    }

    let abort = AbortSignal::new();
    let on_interrupt = abort.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            log::warn!("Interrupted, stopping after the current node");
            on_interrupt.abort();
        }
    });

    let (sink, mut events) = ChannelEventSink::new();
    let printer = tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match serde_json::to_string(&event) {
                Ok(line) => println!("{}", line),
                Err(e) => log::warn!("Failed to encode event: {}", e),
            }
        }
    });

    let outcome = match target {
        Some(node_id) => runner.run_node(&mut graph, node_id, &sink, &abort).await,
        None => runner.run(&mut graph, &sink, &abort).await,
    };

    // Closing the sink ends the printer once it has drained the channel
    drop(sink);
    if let Err(e) = printer.await {
        log::warn!("Event printer stopped early: {}", e);
    }

    if let Some(path) = save {
        write_json(path, &graph).await?;
        log::info!("Saved workflow state to {:?}", path);
    }

    let summary = outcome?;
    log::info!(
        "Executed {} node(s), {} from cache",
        summary.executed.len(),
        summary.cache_hits
    );
    Ok(ExitCode::SUCCESS)
}

async fn validate(workflow: &Path) -> Result<ExitCode, CliError> {
    let graph = read_workflow(workflow).await?;
    let report = validate_workflow(&graph);

    if report.valid {
        println!("{}: valid ({} nodes)", workflow.display(), graph.nodes.len());
        return Ok(ExitCode::SUCCESS);
    }

    for error in &report.errors {
        println!("{}: {}", workflow.display(), error);
    }
    Ok(ExitCode::FAILURE)
}

fn cache_command(config: &EngineConfig, action: CacheAction) -> Result<ExitCode, CliError> {
    let cache = open_cache(config);
    cache.init()?;

    match action {
        CacheAction::Stats => {
            let stats = cache.stats();
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "entries": stats.entries,
                    "store": cache.store_path().map(|p| p.display().to_string()),
                }))?
            );
        }
        CacheAction::Clear => {
            let cleared = cache.stats().entries;
            cache.clear()?;
            println!("Cleared {} cached result(s)", cleared);
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// Cache rooted at the configured directory, or the platform cache dir
fn open_cache(config: &EngineConfig) -> ResultCache {
    let mut cache_config = config.cache.clone();
    if cache_config.dir.is_none() {
        cache_config.dir = dirs::cache_dir().map(|dir| dir.join("atelier"));
    }
    ResultCache::new(cache_config)
}

fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("atelier")
        .join("config.json")
}

async fn read_workflow(path: &Path) -> Result<WorkflowGraph, CliError> {
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| CliError::Read {
            path: path.to_path_buf(),
            source,
        })?;

    serde_json::from_str(&contents).map_err(|source| CliError::Workflow {
        path: path.to_path_buf(),
        source,
    })
}

async fn write_json<T: serde::Serialize>(path: &Path, value: &T) -> Result<(), CliError> {
    let contents = serde_json::to_string_pretty(value)?;
    tokio::fs::write(path, contents)
        .await
        .map_err(|source| CliError::Write {
            path: path.to_path_buf(),
            source,
        })
}
