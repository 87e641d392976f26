//! Graph backend capability.
//!
//! One trait, two conforming implementations selected once at construction
//! time by configuration presence: [`Neo4jBackend`] against a remote store,
//! or [`MemoryBackend`] over an in-memory concept graph. Call sites never
//! branch on which backend is active.

pub mod memory;
pub mod neo4j;

pub use memory::{ConceptGraph, MemoryBackend};
pub use neo4j::{Neo4jBackend, Neo4jConfig};

use crate::error::BackendError;
use crate::model::{Candidate, Health, Path};

/// SKOS-aware concept lookup and path queries.
///
/// Backends are read-only during disambiguation and safe for concurrent use
/// by multiple in-flight requests.
pub trait GraphBackend: Send + Sync {
    /// Full-text candidate lookup for a surface string.
    ///
    /// Returns up to `limit` candidates in relevance-descending order, or an
    /// empty list (never an error) when nothing matches. Ordering is
    /// deterministic for a fixed backend state.
    fn search_candidates(&self, surface: &str, limit: usize)
    -> Result<Vec<Candidate>, BackendError>;

    /// Shortest path between two concepts, bounded by `max_hops` edges.
    ///
    /// Returns `None` when no path within the bound exists, or when every
    /// such path fails the hub filter. `hub_threshold`, when present, rejects
    /// paths routed through nodes whose total incident-edge count exceeds the
    /// threshold; generic hub concepts would otherwise make any two concepts
    /// trivially "close". The in-memory backend does not enforce the filter
    /// (see [`MemoryBackend`]).
    fn shortest_path(
        &self,
        source_iri: &str,
        target_iri: &str,
        max_hops: usize,
        hub_threshold: Option<usize>,
    ) -> Result<Option<Path>, BackendError>;

    /// Reachability of the backing store. Reports, never raises, for
    /// expected unreachability.
    fn health(&self) -> Health;
}
