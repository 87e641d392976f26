//! In-memory fallback backend.
//!
//! A petgraph-backed concept graph populated once before requests arrive and
//! treated as read-only during disambiguation. This is a reduced-guarantee
//! mode: candidate search is a case-insensitive substring match with no
//! ranking signal, and `hub_threshold` is accepted but **not enforced** —
//! path search here is strict-adjacency BFS only.

use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path as FsPath;

use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;

use crate::error::{BackendError, ConfigError};
use crate::model::{Candidate, Health, Path, PathStep};

use super::GraphBackend;

#[derive(Debug, Clone)]
struct ConceptNode {
    iri: String,
    label: Option<String>,
}

/// Directed concept graph: nodes are IRIs with optional labels, edge weights
/// are predicate names (`broader`, `narrower`, `related`).
///
/// Node iteration order is insertion order, which makes candidate search
/// deterministic for a fixed load sequence.
#[derive(Debug, Default)]
pub struct ConceptGraph {
    graph: DiGraph<ConceptNode, String>,
    index: HashMap<String, NodeIndex>,
}

impl ConceptGraph {
    pub fn new() -> Self {
        Self::default()
    }

    fn ensure_node(&mut self, iri: &str) -> NodeIndex {
        if let Some(&idx) = self.index.get(iri) {
            return idx;
        }
        let idx = self.graph.add_node(ConceptNode {
            iri: iri.to_string(),
            label: None,
        });
        self.index.insert(iri.to_string(), idx);
        idx
    }

    /// Insert one relation. `object_label` becomes the object node's display
    /// label; an existing label is kept.
    pub fn insert(&mut self, subject_iri: &str, predicate: &str, object_iri: &str, object_label: &str) {
        let subj = self.ensure_node(subject_iri);
        let obj = self.ensure_node(object_iri);
        if self.graph[obj].label.is_none() && !object_label.is_empty() {
            self.graph[obj].label = Some(object_label.to_string());
        }
        self.graph.add_edge(subj, obj, predicate.to_string());
    }

    /// Set or replace a concept's display label, creating the node if needed.
    pub fn set_label(&mut self, iri: &str, label: &str) {
        let idx = self.ensure_node(iri);
        self.graph[idx].label = Some(label.to_string());
    }

    /// Load a graph from a tab-separated file.
    ///
    /// One relation per line: `subject_iri \t predicate \t object_iri \t
    /// object_label`. Blank lines and lines starting with `#` are skipped.
    pub fn from_tsv(path: &FsPath) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::GraphLoad {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;

        let mut graph = Self::new();
        for (lineno, line) in contents.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let fields: Vec<&str> = line.split('\t').collect();
            if fields.len() < 4 {
                return Err(ConfigError::GraphLoad {
                    path: path.display().to_string(),
                    message: format!("line {}: expected 4 tab-separated fields, got {}", lineno + 1, fields.len()),
                });
            }
            graph.insert(fields[0], fields[1], fields[2], fields[3]);
        }
        Ok(graph)
    }

    /// Number of distinct concepts.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of relations.
    pub fn relation_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Total incident-edge count for a concept, or `None` for unknown IRIs.
    pub fn degree(&self, iri: &str) -> Option<usize> {
        let &idx = self.index.get(iri)?;
        let out = self.graph.edges_directed(idx, Direction::Outgoing).count();
        let inc = self.graph.edges_directed(idx, Direction::Incoming).count();
        Some(out + inc)
    }
}

/// [`GraphBackend`] over a [`ConceptGraph`].
///
/// Reduced-guarantee mode: `hub_threshold` is ignored here. The remote
/// backend is the only one that suppresses hub-routed paths; under the
/// fallback a path through a high-degree node is still returned.
#[derive(Debug)]
pub struct MemoryBackend {
    graph: ConceptGraph,
}

impl MemoryBackend {
    pub fn new(graph: ConceptGraph) -> Self {
        Self { graph }
    }

    pub fn graph(&self) -> &ConceptGraph {
        &self.graph
    }
}

impl GraphBackend for MemoryBackend {
    fn search_candidates(&self, surface: &str, limit: usize) -> Result<Vec<Candidate>, BackendError> {
        let needle = surface.to_lowercase();
        let mut matches = Vec::new();
        for idx in self.graph.graph.node_indices() {
            let node = &self.graph.graph[idx];
            let Some(label) = &node.label else { continue };
            if label.to_lowercase().contains(&needle) {
                // Substring match carries no ranking signal; flat score.
                matches.push(Candidate {
                    iri: node.iri.clone(),
                    label: label.clone(),
                    score: Some(1.0),
                });
                if matches.len() == limit {
                    break;
                }
            }
        }
        Ok(matches)
    }

    fn shortest_path(
        &self,
        source_iri: &str,
        target_iri: &str,
        max_hops: usize,
        hub_threshold: Option<usize>,
    ) -> Result<Option<Path>, BackendError> {
        if hub_threshold.is_some() {
            tracing::debug!("hub_threshold is not enforced by the in-memory backend");
        }
        if source_iri == target_iri {
            return Ok(None);
        }
        let (Some(&source), Some(&target)) = (
            self.graph.index.get(source_iri),
            self.graph.index.get(target_iri),
        ) else {
            return Ok(None);
        };

        // BFS over outgoing edges; first discovered path is minimal.
        let mut visited: HashSet<NodeIndex> = HashSet::new();
        let mut queue: VecDeque<(NodeIndex, Path)> = VecDeque::new();
        queue.push_back((source, Vec::new()));

        while let Some((current, path)) = queue.pop_front() {
            if current == target {
                return Ok(Some(path));
            }
            if path.len() >= max_hops || !visited.insert(current) {
                continue;
            }
            for edge in self.graph.graph.edges_directed(current, Direction::Outgoing) {
                let subject = &self.graph.graph[current];
                let object = &self.graph.graph[edge.target()];
                let mut next_path = path.clone();
                next_path.push(PathStep {
                    subject_iri: subject.iri.clone(),
                    subject_label: subject.label.clone(),
                    predicate: edge.weight().clone(),
                    object_iri: object.iri.clone(),
                    object_label: object.label.clone(),
                });
                queue.push_back((edge.target(), next_path));
            }
        }
        Ok(None)
    }

    fn health(&self) -> Health {
        Health::Ok
    }
}
