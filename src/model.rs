//! Domain model for the disambiguation pipeline.
//!
//! Every type here is immutable once constructed: mentions come from the NER
//! collaborator, candidates and path steps from the graph backend, and the
//! final `DisambiguatedMention` list is assembled exactly once per request.

use serde::{Deserialize, Serialize};

/// A span of text believed to refer to a taxonomy concept.
///
/// Produced by the external NER model. `start`/`end` are byte offsets into the
/// analyzed text (`[start, end)`); both are optional because not every NER
/// response carries offsets.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mention {
    /// Surface form as it appears in the text.
    pub surface: String,
    /// Optional semantic label assigned by the NER model (e.g. "Field").
    #[serde(default)]
    pub label: Option<String>,
    /// Byte offset of the first character, if known.
    #[serde(default)]
    pub start: Option<usize>,
    /// Byte offset one past the last character, if known.
    #[serde(default)]
    pub end: Option<usize>,
    /// NER confidence in `[0, 1]`, if reported.
    #[serde(default)]
    pub confidence: Option<f32>,
}

/// A taxonomy concept proposed as a possible referent for a mention.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    /// Concept IRI. Never empty when returned from a successful retrieval.
    pub iri: String,
    /// Display label.
    pub label: String,
    /// Relevance score from the backend, if it provides one. The in-memory
    /// fallback reports a flat score since substring match carries no signal.
    #[serde(default)]
    pub score: Option<f64>,
}

/// A mention's surface form paired with its ordered candidate list.
///
/// An empty candidate list is a valid outcome ("no candidates found") and
/// flows through the pipeline without error. Duplicate IRIs are tolerated and
/// never deduplicated; callers may rely on the ranking order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MentionCandidates {
    pub surface: String,
    pub candidates: Vec<Candidate>,
}

/// One edge of structural evidence between two concepts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathStep {
    pub subject_iri: String,
    #[serde(default)]
    pub subject_label: Option<String>,
    /// Relation name: `broader`, `narrower`, `related`, or a backend-specific
    /// relation type.
    pub predicate: String,
    pub object_iri: String,
    #[serde(default)]
    pub object_label: Option<String>,
}

/// An ordered, non-empty adjacency chain of [`PathStep`]s: step *i*'s object
/// IRI equals step *i+1*'s subject IRI. A path is directionless evidence; it
/// may represent either traversal direction.
pub type Path = Vec<PathStep>;

/// The full set of paths collected for one request, plus the optional
/// natural-language summary derived from them.
///
/// Attached whole to every [`DisambiguatedMention`]: each final mention
/// carries the request-wide context for audit, not just its own evidence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PathEvidence {
    pub paths: Vec<Path>,
    #[serde(default)]
    pub summary: Option<String>,
}

/// A mention with its final concept decision and supporting evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisambiguatedMention {
    pub surface: String,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub start: Option<usize>,
    #[serde(default)]
    pub end: Option<usize>,
    #[serde(default)]
    pub confidence: Option<f32>,
    /// The chosen concept, or `None` when no decision was possible (empty
    /// candidate list).
    pub chosen: Option<Candidate>,
    /// Request-wide structural evidence.
    pub evidence: PathEvidence,
}

/// Reachability status of an external collaborator.
///
/// Expected unreachability is reported, never raised.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "detail", rename_all = "lowercase")]
pub enum Health {
    Ok,
    Degraded(String),
    Unavailable(String),
}

impl Health {
    pub fn is_ok(&self) -> bool {
        matches!(self, Health::Ok)
    }
}
