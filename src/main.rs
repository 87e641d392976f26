//! taxolink CLI: concept disambiguation against a SKOS taxonomy.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand};
use miette::{IntoDiagnostic, Result};
use serde::Deserialize;

use taxolink::backend::{ConceptGraph, GraphBackend, MemoryBackend, Neo4jBackend, Neo4jConfig};
use taxolink::cancel::CancelToken;
use taxolink::engine::{AnalyzeOptions, Engine, EngineConfig};
use taxolink::error::ConfigError;
use taxolink::llm::{OllamaClient, OllamaConfig};
use taxolink::model::Mention;

#[derive(Parser)]
#[command(name = "taxolink", version, about = "Concept disambiguation for SKOS taxonomies")]
struct Cli {
    /// Optional TOML config file ([ollama], [neo4j], [engine] sections).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// TSV concept graph for the in-memory fallback backend.
    #[arg(long, global = true)]
    graph: Option<PathBuf>,

    /// Abort the request after this many seconds.
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report collaborator reachability.
    Health,

    /// Look up candidate concepts for a surface string.
    Search {
        surface: String,

        #[arg(long, default_value = "5")]
        top_k: usize,
    },

    /// Recognize mentions in text, then disambiguate them.
    Analyze {
        text: String,

        #[arg(long, default_value = "5")]
        top_k: usize,

        #[arg(long, default_value = "2")]
        max_hops: usize,

        #[arg(long)]
        hub_threshold: Option<usize>,
    },

    /// Disambiguate an existing mention set (JSON array of mentions).
    Disambiguate {
        text: String,

        /// Path to a JSON file with the recognized mentions.
        #[arg(long)]
        mentions: PathBuf,

        #[arg(long, default_value = "5")]
        top_k: usize,

        #[arg(long, default_value = "2")]
        max_hops: usize,

        #[arg(long)]
        hub_threshold: Option<usize>,
    },
}

/// Optional file-based configuration; unset fields fall back to the
/// environment and then to defaults.
#[derive(Debug, Default, Deserialize)]
struct FileConfig {
    #[serde(default)]
    ollama: OllamaSection,
    #[serde(default)]
    neo4j: Option<Neo4jSection>,
    #[serde(default)]
    engine: EngineSection,
}

#[derive(Debug, Default, Deserialize)]
struct OllamaSection {
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct Neo4jSection {
    uri: String,
    user: String,
    password: String,
    database: Option<String>,
    fulltext_index: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct EngineSection {
    parallelism: Option<usize>,
}

fn load_file_config(path: Option<&PathBuf>) -> Result<FileConfig> {
    let Some(path) = path else {
        return Ok(FileConfig::default());
    };
    let contents = std::fs::read_to_string(path).into_diagnostic()?;
    toml::from_str(&contents).into_diagnostic()
}

fn build_backend(cli: &Cli, file: &FileConfig) -> Result<Arc<dyn GraphBackend>> {
    if let Some(section) = &file.neo4j {
        let config = Neo4jConfig {
            uri: section.uri.clone(),
            user: section.user.clone(),
            password: section.password.clone(),
            database: section.database.clone(),
            fulltext_index: section
                .fulltext_index
                .clone()
                .unwrap_or_else(|| "skos_fulltext".into()),
            timeout_secs: section.timeout_secs.unwrap_or(30),
        };
        return Ok(Arc::new(Neo4jBackend::new(config)));
    }
    if let Some(config) = Neo4jConfig::from_env() {
        return Ok(Arc::new(Neo4jBackend::new(config)));
    }
    if let Some(path) = &cli.graph {
        let graph = ConceptGraph::from_tsv(path)?;
        tracing::info!(
            nodes = graph.node_count(),
            relations = graph.relation_count(),
            "loaded fallback concept graph"
        );
        return Ok(Arc::new(MemoryBackend::new(graph)));
    }
    Err(ConfigError::MissingCollaborator {
        name: "graph backend (set NEO4J_* or pass --graph)".into(),
    }
    .into())
}

fn build_engine(cli: &Cli, file: &FileConfig) -> Result<Engine> {
    let env = OllamaConfig::from_env();
    let ollama = OllamaConfig {
        base_url: file.ollama.base_url.clone().unwrap_or(env.base_url),
        model: file.ollama.model.clone().unwrap_or(env.model),
        timeout_secs: file.ollama.timeout_secs.unwrap_or(env.timeout_secs),
    };
    let config = EngineConfig {
        parallelism: file
            .engine
            .parallelism
            .unwrap_or_else(|| EngineConfig::default().parallelism),
    };

    Ok(Engine::builder()
        .generator(Arc::new(OllamaClient::new(ollama)))
        .backend(build_backend(cli, file)?)
        .config(config)
        .build()?)
}

fn cancel_token(timeout_secs: Option<u64>) -> CancelToken {
    match timeout_secs {
        Some(secs) => CancelToken::with_deadline(Instant::now() + Duration::from_secs(secs)),
        None => CancelToken::new(),
    }
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value).into_diagnostic()?);
    Ok(())
}

fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .unicode(true)
                .build(),
        )
    }))?;

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("taxolink=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let file = load_file_config(cli.config.as_ref())?;
    let engine = build_engine(&cli, &file)?;
    let cancel = cancel_token(cli.timeout_secs);

    match &cli.command {
        Commands::Health => {
            let health = engine.health();
            print_json(&health)?;
            if !health.is_ok() {
                std::process::exit(1);
            }
        }
        Commands::Search { surface, top_k } => {
            // Candidate search only; no generation calls involved.
            let candidates = engine
                .backend()
                .search_candidates(surface, *top_k)
                .map_err(taxolink::error::TaxoError::from)?;
            print_json(&candidates)?;
        }
        Commands::Analyze {
            text,
            top_k,
            max_hops,
            hub_threshold,
        } => {
            let opts = AnalyzeOptions {
                top_k: *top_k,
                max_hops: *max_hops,
                hub_threshold: *hub_threshold,
            };
            let analysis = engine.analyze(text, &opts, &cancel)?;
            print_json(&analysis)?;
        }
        Commands::Disambiguate {
            text,
            mentions,
            top_k,
            max_hops,
            hub_threshold,
        } => {
            let raw = std::fs::read_to_string(mentions).into_diagnostic()?;
            let mentions: Vec<Mention> = serde_json::from_str(&raw).into_diagnostic()?;
            let opts = AnalyzeOptions {
                top_k: *top_k,
                max_hops: *max_hops,
                hub_threshold: *hub_threshold,
            };
            let results = engine.disambiguate(text, &mentions, &opts, &cancel)?;
            print_json(&results)?;
        }
    }

    Ok(())
}
