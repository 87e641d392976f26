//! Prompt templates for the generation stages.
//!
//! Templates use `${NAME}` placeholders filled by plain substitution. The
//! defaults are embedded; callers that manage templates externally override
//! individual entries on the [`PromptSet`].

/// Placeholder for the analyzed text in the NER template.
pub const VAR_USER_TEXT: &str = "${USER_TEXT}";
/// Placeholder for the JSON-serialized path list.
pub const VAR_PATHS_JSON: &str = "${PATHS_JSON}";
/// Placeholder for the JSON-serialized sentence list.
pub const VAR_PATH_SENTENCES_JSON: &str = "${PATH_SENTENCES_JSON}";
/// Placeholder for the mention surface form.
pub const VAR_SURFACE: &str = "${SURFACE}";
/// Placeholder for the context window around the mention.
pub const VAR_CONTEXT: &str = "${CONTEXT}";
/// Placeholder for the evidence summary.
pub const VAR_SUMMARY: &str = "${SUMMARY}";
/// Placeholder for the JSON-serialized candidate list.
pub const VAR_CANDIDATES_JSON: &str = "${CANDIDATES_JSON}";

const DEFAULT_SYSTEM: &str = "\
You are a precise assistant for linking text to a SKOS concept scheme. \
Answer with exactly the requested format and nothing else.";

const DEFAULT_NER: &str = "\
Identify every mention of a taxonomy concept in the text below. Respond with \
a JSON object of the form {\"mentions\": [{\"surface\": string, \"label\": \
string|null, \"start\": int|null, \"end\": int|null, \"confidence\": \
number|null}]}. Offsets are byte positions into the text. Respond with JSON \
only.\n\nText:\n${USER_TEXT}";

const DEFAULT_PATH_TO_TEXT: &str = "\
Each entry in the JSON array below is a path of subject-predicate-object \
steps between two taxonomy concepts. Express each path as one plain-English \
sentence. Respond with a JSON array of strings, one per path, and nothing \
else.\n\nPaths:\n${PATHS_JSON}";

const DEFAULT_PATH_SUMMARY: &str = "\
Summarize the following statements about how taxonomy concepts relate to each \
other in one short paragraph. Respond with the paragraph only.\n\n\
Statements:\n${PATH_SENTENCES_JSON}";

const DEFAULT_DECISION: &str = "\
Choose the taxonomy concept the mention refers to.\n\n\
Mention: ${SURFACE}\n\
Context: ${CONTEXT}\n\
Background: ${SUMMARY}\n\
Candidates (JSON): ${CANDIDATES_JSON}\n\n\
Respond with a JSON object {\"iri\": string, \"label\": string, \"score\": \
number} naming the best candidate, and nothing else.";

/// The five templates the pipeline renders.
#[derive(Debug, Clone)]
pub struct PromptSet {
    pub system: String,
    pub ner: String,
    pub path_to_text: String,
    pub path_summary: String,
    pub decision: String,
}

impl Default for PromptSet {
    fn default() -> Self {
        Self {
            system: DEFAULT_SYSTEM.into(),
            ner: DEFAULT_NER.into(),
            path_to_text: DEFAULT_PATH_TO_TEXT.into(),
            path_summary: DEFAULT_PATH_SUMMARY.into(),
            decision: DEFAULT_DECISION.into(),
        }
    }
}

/// Fill `${NAME}` placeholders in a template.
///
/// Unknown placeholders are left in place; substitution values are inserted
/// verbatim.
pub fn render(template: &str, vars: &[(&str, &str)]) -> String {
    let mut out = template.to_string();
    for (name, value) in vars {
        out = out.replace(name, value);
    }
    out
}
