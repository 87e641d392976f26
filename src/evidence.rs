//! Path evidence collection.
//!
//! For every structurally relevant pair of candidates the collector asks the
//! backend for a bounded shortest path: each candidate is paired with every
//! candidate of every *other* mention (cross-mention evidence), and with
//! every other candidate of its *own* mention (intra-mention evidence for
//! competing senses of one surface string).
//!
//! The search is quadratic in total candidate count on purpose — exhaustive
//! pairwise evidence is the structural-grounding strategy. Pair queries are
//! independent, so they run on a bounded worker pool; results are collected
//! back in enumeration order, which keeps the evidence list reproducible.

use rayon::prelude::*;
use serde::Serialize;

use crate::backend::GraphBackend;
use crate::cancel::CancelToken;
use crate::error::{BackendError, PipelineError};
use crate::model::{MentionCandidates, Path};

/// Counters for one collection run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EvidenceStats {
    /// Pair queries issued.
    pub queried: usize,
    /// Queries that returned a path.
    pub found: usize,
    /// Queries that failed with a backend error. Failures never abort the
    /// request; they only shrink the evidence set.
    pub failed: usize,
}

/// Enumerate all pair queries in deterministic order: for each mention in
/// input order and each of its candidates in order, first the candidates of
/// every other mention (in order), then the remaining candidates of the same
/// mention.
fn enumerate_pairs(selections: &[MentionCandidates]) -> Vec<(String, String)> {
    let mut pairs = Vec::new();
    for (idx, selection) in selections.iter().enumerate() {
        for candidate in &selection.candidates {
            for (other_idx, other) in selections.iter().enumerate() {
                if idx == other_idx {
                    continue;
                }
                for other_candidate in &other.candidates {
                    pairs.push((candidate.iri.clone(), other_candidate.iri.clone()));
                }
            }
            for other_candidate in &selection.candidates {
                if other_candidate.iri == candidate.iri {
                    continue;
                }
                pairs.push((candidate.iri.clone(), other_candidate.iri.clone()));
            }
        }
    }
    pairs
}

/// Query shortest paths for every relevant candidate pair.
///
/// Returns the flat evidence list in enumeration order plus run counters.
/// Individual query failures are logged and counted, never fatal; a fired
/// cancellation token is fatal and yields no partial result.
pub fn collect_evidence(
    backend: &dyn GraphBackend,
    selections: &[MentionCandidates],
    max_hops: usize,
    hub_threshold: Option<usize>,
    pool: &rayon::ThreadPool,
    cancel: &CancelToken,
) -> Result<(Vec<Path>, EvidenceStats), PipelineError> {
    cancel.check()?;
    let pairs = enumerate_pairs(selections);
    tracing::debug!(pairs = pairs.len(), max_hops, ?hub_threshold, "collecting path evidence");

    let outcomes: Vec<Result<Option<Path>, BackendError>> = pool.install(|| {
        pairs
            .par_iter()
            .map(|(source, target)| {
                if cancel.is_cancelled() {
                    return Ok(None);
                }
                backend.shortest_path(source, target, max_hops, hub_threshold)
            })
            .collect()
    });
    cancel.check()?;

    let mut stats = EvidenceStats {
        queried: pairs.len(),
        ..Default::default()
    };
    let mut paths = Vec::new();
    for ((source, target), outcome) in pairs.iter().zip(outcomes) {
        match outcome {
            Ok(Some(path)) => {
                stats.found += 1;
                paths.push(path);
            }
            Ok(None) => {}
            Err(e) => {
                stats.failed += 1;
                tracing::warn!(%source, %target, error = %e, "path query failed; continuing without this pair");
            }
        }
    }

    tracing::info!(
        queried = stats.queried,
        found = stats.found,
        failed = stats.failed,
        "path evidence collected"
    );
    Ok((paths, stats))
}
