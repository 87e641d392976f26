//! Mention translation.
//!
//! Recognition itself is delegated to the external text-generation model;
//! this stage owns only the translation of its JSON payload into
//! [`Mention`]s. A payload that does not parse is the stage-tagged fatal
//! [`PipelineError::NerTranslation`] — never retried, never degraded.

use serde::Deserialize;

use crate::cancel::CancelToken;
use crate::error::PipelineError;
use crate::llm::{Generation, TextGenerator, strip_code_fences};
use crate::model::Mention;
use crate::prompts::{self, PromptSet};

#[derive(Debug, Default, Deserialize)]
struct NerPayload {
    #[serde(default)]
    mentions: Vec<NerMention>,
}

#[derive(Debug, Deserialize)]
struct NerMention {
    #[serde(default)]
    surface: String,
    #[serde(default)]
    label: Option<String>,
    #[serde(default)]
    start: Option<usize>,
    #[serde(default)]
    end: Option<usize>,
    #[serde(default)]
    confidence: Option<f32>,
}

/// Run the NER generation call and translate its payload.
///
/// Returns the mentions plus the raw generation for audit. A payload without
/// a `mentions` key translates to an empty list; a payload that is not a
/// JSON object is fatal.
pub fn extract_mentions(
    generator: &dyn TextGenerator,
    prompts: &PromptSet,
    text: &str,
    cancel: &CancelToken,
) -> Result<(Vec<Mention>, Generation), PipelineError> {
    cancel.check()?;
    let message = prompts::render(&prompts.ner, &[(prompts::VAR_USER_TEXT, text)]);
    let generation = generator.generate(&prompts.system, &message)?;

    let payload: NerPayload = serde_json::from_str(strip_code_fences(&generation.text))
        .map_err(|e| PipelineError::NerTranslation {
            message: e.to_string(),
        })?;

    let mentions = payload
        .mentions
        .into_iter()
        .map(|m| Mention {
            surface: m.surface,
            label: m.label,
            start: m.start,
            end: m.end,
            confidence: m.confidence,
        })
        .collect::<Vec<_>>();

    tracing::info!(count = mentions.len(), "mentions extracted");
    Ok((mentions, generation))
}
