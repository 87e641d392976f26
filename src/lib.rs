//! # taxolink
//!
//! A concept disambiguation engine for SKOS taxonomies. Free-text mentions
//! are linked to concept-scheme nodes by fusing three signals:
//!
//! - **Lexical**: full-text candidate search per mention (`backend`)
//! - **Structural**: bounded, hub-suppressed shortest paths between every
//!   relevant candidate pair (`evidence`)
//! - **Judgment**: a language model narrates the evidence and picks one
//!   concept per mention, with a deterministic fallback (`narrate`, `decide`)
//!
//! ## Library usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use taxolink::backend::{ConceptGraph, MemoryBackend};
//! use taxolink::cancel::CancelToken;
//! use taxolink::engine::{AnalyzeOptions, Engine};
//! use taxolink::llm::{OllamaClient, OllamaConfig};
//!
//! let mut graph = ConceptGraph::new();
//! graph.insert("ex:gt", "related", "ex:net", "Networks");
//!
//! let engine = Engine::builder()
//!     .generator(Arc::new(OllamaClient::new(OllamaConfig::default())))
//!     .backend(Arc::new(MemoryBackend::new(graph)))
//!     .build()
//!     .unwrap();
//! let analysis = engine
//!     .analyze("graph theory and networks", &AnalyzeOptions::default(), &CancelToken::new())
//!     .unwrap();
//! ```

pub mod backend;
pub mod cancel;
pub mod decide;
pub mod engine;
pub mod error;
pub mod evidence;
pub mod extract;
pub mod llm;
pub mod model;
pub mod narrate;
pub mod prompts;
pub mod retrieve;
