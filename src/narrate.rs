//! Evidence narration.
//!
//! Two chained generation calls turn raw path evidence into text: the full
//! path list is serialized for a path-to-text call whose response must parse
//! as a JSON array of strings (fatal otherwise), then the sentence list is
//! summarized into free text. With no evidence at all both calls are skipped
//! and empty results flow downstream — a mention set with no structural
//! connections still gets a decision.

use crate::cancel::CancelToken;
use crate::error::PipelineError;
use crate::llm::{TextGenerator, strip_code_fences};
use crate::model::Path;
use crate::prompts::{self, PromptSet};

/// Natural-language rendering of the evidence set.
#[derive(Debug, Clone, Default)]
pub struct Narration {
    /// One sentence per path (the mapping is not validated 1:1).
    pub sentences: Vec<String>,
    /// Whitespace-trimmed summary; empty when there was nothing to
    /// summarize.
    pub summary: String,
}

/// Narrate the evidence list: paths to sentences, sentences to a summary.
pub fn narrate_evidence(
    generator: &dyn TextGenerator,
    prompts: &PromptSet,
    paths: &[Path],
    cancel: &CancelToken,
) -> Result<Narration, PipelineError> {
    if paths.is_empty() {
        tracing::debug!("no path evidence; skipping narration");
        return Ok(Narration::default());
    }
    cancel.check()?;

    let paths_json = serde_json::to_string(paths).expect("paths serialize to JSON");
    let message = prompts::render(&prompts.path_to_text, &[(prompts::VAR_PATHS_JSON, &paths_json)]);
    let generation = generator.generate(&prompts.system, &message)?;

    // A blank response means no sentences, same as an explicit empty array.
    let cleaned = match strip_code_fences(&generation.text) {
        "" => "[]",
        other => other,
    };
    let sentences: Vec<String> = serde_json::from_str(cleaned)
        .map_err(|e| PipelineError::PathTranslation {
            message: e.to_string(),
        })?;
    tracing::debug!(paths = paths.len(), sentences = sentences.len(), "paths translated");

    if sentences.is_empty() {
        return Ok(Narration::default());
    }
    cancel.check()?;

    let sentences_json = serde_json::to_string(&sentences).expect("sentences serialize to JSON");
    let message = prompts::render(
        &prompts.path_summary,
        &[(prompts::VAR_PATH_SENTENCES_JSON, &sentences_json)],
    );
    let generation = generator.generate(&prompts.system, &message)?;
    let summary = generation.text.trim().to_string();

    Ok(Narration { sentences, summary })
}
