//! Candidate retrieval.
//!
//! Thin delegation to the graph backend with one policy decision: a mention
//! with zero candidates proceeds through the pipeline with an empty list.
//! "No viable concept for this mention" is a valid outcome, not an error.

use crate::backend::GraphBackend;
use crate::cancel::CancelToken;
use crate::error::PipelineError;
use crate::model::{Mention, MentionCandidates};

/// Retrieve up to `top_k` ranked candidates for every mention, in input
/// order.
pub fn retrieve_candidates(
    backend: &dyn GraphBackend,
    mentions: &[Mention],
    top_k: usize,
    cancel: &CancelToken,
) -> Result<Vec<MentionCandidates>, PipelineError> {
    let mut selections = Vec::with_capacity(mentions.len());
    for mention in mentions {
        cancel.check()?;
        let candidates = backend.search_candidates(&mention.surface, top_k)?;
        tracing::debug!(
            surface = %mention.surface,
            count = candidates.len(),
            "candidate retrieval"
        );
        selections.push(MentionCandidates {
            surface: mention.surface.clone(),
            candidates,
        });
    }
    Ok(selections)
}
