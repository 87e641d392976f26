//! Per-mention decision fusion.
//!
//! Each mention's surface form, a bounded context window, the global evidence
//! summary, and the full candidate list go to the generation collaborator,
//! which is expected to answer with `{iri, label, score}`. A missing,
//! unparseable, or IRI-less answer degrades to the first retrieved candidate
//! (or no choice at all when the list is empty) — the engine always prefers a
//! structurally plausible default over a hard error for an ambiguous
//! judgment.
//!
//! Decisions are independent of each other once the summary exists, so they
//! run on the worker pool in parallel, collected back in input order.

use rayon::prelude::*;

use crate::cancel::CancelToken;
use crate::error::PipelineError;
use crate::llm::{TextGenerator, strip_code_fences};
use crate::model::{Candidate, DisambiguatedMention, Mention, MentionCandidates, PathEvidence};
use crate::prompts::{self, PromptSet};

/// Characters of context kept on each side of the mention span.
const CONTEXT_WINDOW: usize = 80;

/// Decide a concept for every mention, attaching the request-wide evidence
/// to each result.
pub fn decide_mentions(
    generator: &dyn TextGenerator,
    prompts: &PromptSet,
    text: &str,
    mentions: &[Mention],
    selections: &[MentionCandidates],
    summary: &str,
    evidence: &PathEvidence,
    pool: &rayon::ThreadPool,
    cancel: &CancelToken,
) -> Result<Vec<DisambiguatedMention>, PipelineError> {
    cancel.check()?;

    let decisions: Result<Vec<DisambiguatedMention>, PipelineError> = pool.install(|| {
        mentions
            .par_iter()
            .zip(selections.par_iter())
            .map(|(mention, selection)| {
                cancel.check()?;
                let chosen = decide_one(generator, prompts, text, mention, selection, summary)?;
                Ok(DisambiguatedMention {
                    surface: mention.surface.clone(),
                    label: mention.label.clone(),
                    start: mention.start,
                    end: mention.end,
                    confidence: mention.confidence,
                    chosen,
                    evidence: evidence.clone(),
                })
            })
            .collect()
    });
    cancel.check()?;
    decisions
}

fn decide_one(
    generator: &dyn TextGenerator,
    prompts: &PromptSet,
    text: &str,
    mention: &Mention,
    selection: &MentionCandidates,
    summary: &str,
) -> Result<Option<Candidate>, PipelineError> {
    let context = context_window(text, mention.start, mention.end);
    let candidates_json =
        serde_json::to_string(&selection.candidates).expect("candidates serialize to JSON");
    let message = prompts::render(
        &prompts.decision,
        &[
            (prompts::VAR_SURFACE, mention.surface.as_str()),
            (prompts::VAR_CONTEXT, context),
            (prompts::VAR_SUMMARY, summary),
            (prompts::VAR_CANDIDATES_JSON, &candidates_json),
        ],
    );

    let generation = generator.generate(&prompts.system, &message)?;
    let chosen = parse_decision(&generation.text, selection);
    tracing::debug!(
        surface = %mention.surface,
        chosen = chosen.as_ref().map(|c| c.iri.as_str()).unwrap_or("<none>"),
        "decision"
    );
    Ok(chosen)
}

/// Parse the model's `{iri, label, score}` answer, falling back to the first
/// retrieved candidate when the answer is unusable.
fn parse_decision(response: &str, selection: &MentionCandidates) -> Option<Candidate> {
    let fallback = || {
        if !selection.candidates.is_empty() {
            tracing::debug!(surface = %selection.surface, "decision fallback to first candidate");
        }
        selection.candidates.first().cloned()
    };

    let Ok(value) = serde_json::from_str::<serde_json::Value>(strip_code_fences(response)) else {
        return fallback();
    };
    let Some(iri) = value["iri"].as_str().filter(|s| !s.is_empty()) else {
        return fallback();
    };
    Some(Candidate {
        iri: iri.to_string(),
        label: value["label"].as_str().unwrap_or_default().to_string(),
        score: value["score"].as_f64(),
    })
}

/// Bounded text window around the mention span.
///
/// Offsets are byte positions; the window is clamped to char boundaries.
/// Without offsets the window is the first `2 * CONTEXT_WINDOW` bytes of the
/// text.
fn context_window(text: &str, start: Option<usize>, end: Option<usize>) -> &str {
    let (left, right) = match (start, end) {
        (Some(start), Some(end)) if start <= end && end <= text.len() => (
            floor_boundary(text, start.saturating_sub(CONTEXT_WINDOW)),
            ceil_boundary(text, (end + CONTEXT_WINDOW).min(text.len())),
        ),
        _ => (0, floor_boundary(text, (2 * CONTEXT_WINDOW).min(text.len()))),
    };
    &text[left..right]
}

fn floor_boundary(text: &str, mut pos: usize) -> usize {
    while pos > 0 && !text.is_char_boundary(pos) {
        pos -= 1;
    }
    pos
}

fn ceil_boundary(text: &str, mut pos: usize) -> usize {
    while pos < text.len() && !text.is_char_boundary(pos) {
        pos += 1;
    }
    pos
}
