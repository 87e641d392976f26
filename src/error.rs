//! Diagnostic error types for the taxolink engine.
//!
//! Each subsystem defines its own error type with miette `#[diagnostic]`
//! derives. Fatal errors name the pipeline stage that failed; non-fatal
//! conditions (no path found, decision fallback) are never represented as
//! errors, only as smaller evidence sets or default choices.

use miette::Diagnostic;
use thiserror::Error;

use crate::llm::LlmError;

/// Top-level error type for the taxolink engine.
#[derive(Debug, Error, Diagnostic)]
pub enum TaxoError {
    #[error(transparent)]
    #[diagnostic(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Backend(#[from] BackendError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Pipeline(#[from] PipelineError),
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    #[error("required collaborator not configured: {name}")]
    #[diagnostic(
        code(taxolink::config::missing_collaborator),
        help(
            "The engine needs both a text generator and a graph backend. \
             Configure the Ollama client and either Neo4j credentials or an \
             in-memory fallback graph before constructing the engine."
        )
    )]
    MissingCollaborator { name: String },

    #[error("invalid option: {message}")]
    #[diagnostic(
        code(taxolink::config::invalid_option),
        help("Check the engine options. {message}")
    )]
    InvalidOption { message: String },

    #[error("failed to load concept graph from {path}: {message}")]
    #[diagnostic(
        code(taxolink::config::graph_load),
        help(
            "The fallback graph file could not be read or parsed. Expected \
             tab-separated lines: subject_iri, predicate, object_iri, object_label."
        )
    )]
    GraphLoad { path: String, message: String },
}

// ---------------------------------------------------------------------------
// Graph backend errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error, Diagnostic)]
pub enum BackendError {
    #[error("graph backend unavailable at {url}: {message}")]
    #[diagnostic(
        code(taxolink::backend::unavailable),
        help(
            "The remote graph database could not be reached. Check that it is \
             running and that the configured URI and credentials are correct. \
             Backend selection is fixed at construction time; the engine never \
             falls back to the in-memory graph mid-request."
        )
    )]
    Unavailable { url: String, message: String },

    #[error("graph query failed: {message}")]
    #[diagnostic(
        code(taxolink::backend::query_failed),
        help(
            "The backend rejected the query. Check the full-text index name \
             and the database schema."
        )
    )]
    QueryFailed { message: String },

    #[error("malformed backend response: {message}")]
    #[diagnostic(
        code(taxolink::backend::malformed_response),
        help(
            "The backend returned a payload this client could not parse. \
             This may indicate a server version mismatch."
        )
    )]
    MalformedResponse { message: String },
}

// ---------------------------------------------------------------------------
// Pipeline errors
// ---------------------------------------------------------------------------

/// Stage-tagged fatal failures of one analysis request.
#[derive(Debug, Error, Diagnostic)]
pub enum PipelineError {
    #[error("NER stage returned an invalid mention payload: {message}")]
    #[diagnostic(
        code(taxolink::pipeline::ner_translation),
        help(
            "The text-generation model did not return parseable mention JSON. \
             This is not retried; check the NER prompt template and model."
        )
    )]
    NerTranslation { message: String },

    #[error("path translation stage returned invalid output: {message}")]
    #[diagnostic(
        code(taxolink::pipeline::path_translation),
        help(
            "The model's path narration must parse as a JSON array of strings. \
             This is not retried; check the path-to-text prompt template."
        )
    )]
    PathTranslation { message: String },

    #[error("request cancelled{}", deadline_note(.deadline_exceeded))]
    #[diagnostic(
        code(taxolink::pipeline::cancelled),
        help(
            "The request-scoped cancellation signal fired. In-flight work was \
             abandoned; no partial result is returned."
        )
    )]
    Cancelled { deadline_exceeded: bool },

    #[error(transparent)]
    #[diagnostic(transparent)]
    Llm(#[from] LlmError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    Backend(#[from] BackendError),
}

fn deadline_note(deadline_exceeded: &bool) -> &'static str {
    if *deadline_exceeded {
        " (deadline exceeded)"
    } else {
        ""
    }
}

/// Convenience alias for functions returning taxolink results.
pub type TaxoResult<T> = std::result::Result<T, TaxoError>;
