//! End-to-end tests for the disambiguation pipeline.
//!
//! These exercise the full engine against the in-memory backend and a
//! deterministic scripted generator: candidate retrieval, pairwise evidence,
//! narration, and decision fusion, including the degraded outcomes (no
//! candidates, unparseable decisions, cancelled requests).

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use taxolink::backend::{ConceptGraph, GraphBackend, MemoryBackend};
use taxolink::cancel::CancelToken;
use taxolink::engine::{AnalyzeOptions, Engine};
use taxolink::error::{BackendError, PipelineError, TaxoError};
use taxolink::llm::{Generation, LlmError, TextGenerator};
use taxolink::model::{Candidate, Health, Mention, Path};

/// Routes each generation call on the distinctive phrasing of the default
/// prompt templates, the same way the service's real prompts are told apart.
struct ScriptedGenerator {
    ner: String,
    paths: String,
    summary: String,
    decision: String,
}

impl Default for ScriptedGenerator {
    fn default() -> Self {
        Self {
            ner: r#"{"mentions": []}"#.into(),
            paths: r#"["concepts relate"]"#.into(),
            summary: "The concepts are connected in the taxonomy.".into(),
            decision: "{}".into(),
        }
    }
}

impl TextGenerator for ScriptedGenerator {
    fn generate(&self, _system: &str, prompt: &str) -> Result<Generation, LlmError> {
        let response = if prompt.contains("Identify every mention") {
            &self.ner
        } else if prompt.contains("Express each path") {
            &self.paths
        } else if prompt.contains("Summarize the following statements") {
            &self.summary
        } else {
            &self.decision
        };
        Ok(Generation::new(response.clone()))
    }
}

/// Counts backend calls while delegating to a [`MemoryBackend`].
struct CountingBackend {
    inner: MemoryBackend,
    search_calls: AtomicUsize,
    path_calls: AtomicUsize,
}

impl CountingBackend {
    fn new(graph: ConceptGraph) -> Self {
        Self {
            inner: MemoryBackend::new(graph),
            search_calls: AtomicUsize::new(0),
            path_calls: AtomicUsize::new(0),
        }
    }
}

impl GraphBackend for CountingBackend {
    fn search_candidates(&self, surface: &str, limit: usize) -> Result<Vec<Candidate>, BackendError> {
        self.search_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.search_candidates(surface, limit)
    }

    fn shortest_path(
        &self,
        source_iri: &str,
        target_iri: &str,
        max_hops: usize,
        hub_threshold: Option<usize>,
    ) -> Result<Option<Path>, BackendError> {
        self.path_calls.fetch_add(1, Ordering::SeqCst);
        self.inner.shortest_path(source_iri, target_iri, max_hops, hub_threshold)
    }

    fn health(&self) -> Health {
        self.inner.health()
    }
}

fn mention(surface: &str) -> Mention {
    Mention {
        surface: surface.into(),
        label: None,
        start: None,
        end: None,
        confidence: None,
    }
}

fn engine_with(generator: ScriptedGenerator, graph: ConceptGraph) -> Engine {
    Engine::builder()
        .generator(Arc::new(generator))
        .backend(Arc::new(MemoryBackend::new(graph)))
        .build()
        .unwrap()
}

/// Two singly-linked concepts.
fn related_pair_graph() -> ConceptGraph {
    let mut g = ConceptGraph::new();
    g.set_label("ex:gt", "Graph Theory");
    g.insert("ex:gt", "related", "ex:net", "Networks");
    g
}

#[test]
fn related_mentions_yield_one_path_and_their_sole_candidates() {
    let engine = engine_with(ScriptedGenerator::default(), related_pair_graph());
    let mentions = vec![mention("graph theory"), mention("networks")];

    let results = engine
        .disambiguate(
            "graph theory underpins networks",
            &mentions,
            &AnalyzeOptions::default(),
            &CancelToken::new(),
        )
        .unwrap();

    assert_eq!(results.len(), 2);
    for result in &results {
        assert_eq!(result.evidence.paths.len(), 1);
        assert_eq!(result.evidence.paths[0].len(), 1);
        assert_eq!(result.evidence.paths[0][0].predicate, "related");
        assert_eq!(
            result.evidence.summary.as_deref(),
            Some("The concepts are connected in the taxonomy.")
        );
    }
    assert_eq!(results[0].chosen.as_ref().unwrap().iri, "ex:gt");
    assert_eq!(results[1].chosen.as_ref().unwrap().iri, "ex:net");
}

#[test]
fn zero_candidate_mention_gets_no_choice_without_error() {
    let engine = engine_with(ScriptedGenerator::default(), related_pair_graph());
    let mentions = vec![mention("quantum chromodynamics")];

    let results = engine
        .disambiguate(
            "quantum chromodynamics is unrelated",
            &mentions,
            &AnalyzeOptions::default(),
            &CancelToken::new(),
        )
        .unwrap();

    assert_eq!(results.len(), 1);
    assert!(results[0].chosen.is_none());
    assert!(results[0].evidence.paths.is_empty());
    assert!(results[0].evidence.summary.is_none());
}

#[test]
fn unparseable_decision_falls_back_to_first_candidate() {
    let mut graph = ConceptGraph::new();
    graph.set_label("ex:gt", "Graph Theory");
    graph.set_label("ex:gc", "Graph Coloring");
    let generator = ScriptedGenerator {
        decision: "I am quite sure it is the first one.".into(),
        ..Default::default()
    };
    let engine = engine_with(generator, graph);

    let results = engine
        .disambiguate(
            "graph algorithms",
            &[mention("graph")],
            &AnalyzeOptions::default(),
            &CancelToken::new(),
        )
        .unwrap();

    // Retrieval order is graph insertion order, so ex:gt ranks first.
    assert_eq!(results[0].chosen.as_ref().unwrap().iri, "ex:gt");
    assert_eq!(results[0].chosen.as_ref().unwrap().label, "Graph Theory");
}

#[test]
fn max_hops_one_excludes_two_hop_connections() {
    let mut graph = ConceptGraph::new();
    graph.set_label("ex:a", "Alpha Topic");
    graph.insert("ex:a", "broader", "ex:mid", "Middle");
    graph.insert("ex:mid", "narrower", "ex:c", "Charlie Topic");
    let engine = engine_with(ScriptedGenerator::default(), graph);

    let results = engine
        .disambiguate(
            "alpha and charlie",
            &[mention("alpha topic"), mention("charlie topic")],
            &AnalyzeOptions {
                max_hops: 1,
                ..Default::default()
            },
            &CancelToken::new(),
        )
        .unwrap();

    assert!(results.iter().all(|r| r.evidence.paths.is_empty()));
    assert!(results.iter().all(|r| r.evidence.summary.is_none()));
}

#[test]
fn cross_and_intra_mention_query_counts_match_the_formula() {
    // Two mentions, two candidates each: 2*1*2*2 = 8 cross-mention queries
    // plus 2*(2-1) = 2 intra-mention queries per mention.
    let mut graph = ConceptGraph::new();
    graph.set_label("ex:gt", "Graph Theory");
    graph.set_label("ex:gc", "Graph Coloring");
    graph.set_label("ex:ns", "Network Science");
    graph.set_label("ex:nf", "Network Flow");
    let backend = Arc::new(CountingBackend::new(graph));

    let engine = Engine::builder()
        .generator(Arc::new(ScriptedGenerator::default()))
        .backend(backend.clone())
        .build()
        .unwrap();

    engine
        .disambiguate(
            "graphs and networks",
            &[mention("graph"), mention("network")],
            &AnalyzeOptions {
                top_k: 2,
                ..Default::default()
            },
            &CancelToken::new(),
        )
        .unwrap();

    assert_eq!(backend.search_calls.load(Ordering::SeqCst), 2);
    assert_eq!(backend.path_calls.load(Ordering::SeqCst), 12);
}

#[test]
fn pipeline_is_idempotent_with_a_deterministic_generator() {
    let mentions = vec![mention("graph theory"), mention("networks")];
    let run = || {
        let engine = engine_with(ScriptedGenerator::default(), related_pair_graph());
        engine
            .disambiguate(
                "graph theory underpins networks",
                &mentions,
                &AnalyzeOptions::default(),
                &CancelToken::new(),
            )
            .unwrap()
    };
    let first = run();
    let second = run();
    assert_eq!(first, second);
}

#[test]
fn path_translation_failure_is_fatal_and_stage_tagged() {
    let generator = ScriptedGenerator {
        paths: "these concepts are all quite related".into(),
        ..Default::default()
    };
    let engine = engine_with(generator, related_pair_graph());

    let result = engine.disambiguate(
        "graph theory underpins networks",
        &[mention("graph theory"), mention("networks")],
        &AnalyzeOptions::default(),
        &CancelToken::new(),
    );

    assert!(matches!(
        result,
        Err(TaxoError::Pipeline(PipelineError::PathTranslation { .. }))
    ));
}

#[test]
fn ner_translation_failure_is_fatal_and_stage_tagged() {
    let generator = ScriptedGenerator {
        ner: "I found two mentions in your text!".into(),
        ..Default::default()
    };
    let engine = engine_with(generator, related_pair_graph());

    let result = engine.analyze(
        "graph theory underpins networks",
        &AnalyzeOptions::default(),
        &CancelToken::new(),
    );

    assert!(matches!(
        result,
        Err(TaxoError::Pipeline(PipelineError::NerTranslation { .. }))
    ));
}

#[test]
fn analyze_runs_ner_then_disambiguation() {
    let generator = ScriptedGenerator {
        ner: r#"{"mentions": [
            {"surface": "graph theory", "label": "Field", "start": 0, "end": 12, "confidence": 0.9},
            {"surface": "networks", "start": 24, "end": 32}
        ]}"#
        .into(),
        ..Default::default()
    };
    let engine = engine_with(generator, related_pair_graph());

    let analysis = engine
        .analyze(
            "graph theory underpins networks",
            &AnalyzeOptions::default(),
            &CancelToken::new(),
        )
        .unwrap();

    assert_eq!(analysis.mentions.len(), 2);
    assert_eq!(analysis.selections.len(), 2);
    assert_eq!(analysis.results.len(), 2);
    assert_eq!(analysis.stats.queried, 2);
    assert_eq!(analysis.stats.found, 1);
    assert_eq!(analysis.results[0].label.as_deref(), Some("Field"));
    assert_eq!(analysis.results[0].chosen.as_ref().unwrap().iri, "ex:gt");
}

#[test]
fn cancelled_request_reports_timeout_and_touches_no_backend() {
    let backend = Arc::new(CountingBackend::new(related_pair_graph()));
    let engine = Engine::builder()
        .generator(Arc::new(ScriptedGenerator::default()))
        .backend(backend.clone())
        .build()
        .unwrap();

    let token = CancelToken::new();
    token.cancel();
    let result = engine.disambiguate(
        "graph theory underpins networks",
        &[mention("graph theory")],
        &AnalyzeOptions::default(),
        &token,
    );

    assert!(matches!(
        result,
        Err(TaxoError::Pipeline(PipelineError::Cancelled { .. }))
    ));
    assert_eq!(backend.search_calls.load(Ordering::SeqCst), 0);
    assert_eq!(backend.path_calls.load(Ordering::SeqCst), 0);
}

#[test]
fn duplicate_candidates_are_preserved_in_ranking_order() {
    // The same label twice yields two candidates; the engine must not
    // deduplicate them.
    let mut graph = ConceptGraph::new();
    graph.set_label("ex:gt", "Graph Theory");
    graph.set_label("ex:gt2", "Graph Theory");
    let engine = engine_with(ScriptedGenerator::default(), graph);

    let results = engine
        .analyze("graph theory", &AnalyzeOptions::default(), &CancelToken::new())
        .unwrap();
    assert!(results.mentions.is_empty());

    let backend_results = engine.backend().search_candidates("graph theory", 5).unwrap();
    assert_eq!(backend_results.len(), 2);
    assert_eq!(backend_results[0].iri, "ex:gt");
    assert_eq!(backend_results[1].iri, "ex:gt2");
}
