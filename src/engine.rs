//! Engine facade: the disambiguation pipeline's single entry point.
//!
//! The `Engine` owns its collaborators (text generator, graph backend,
//! prompt set, worker pool) and sequences the stages: candidate retrieval →
//! path evidence collection → narration → per-mention decisions. Stages are
//! strictly sequential relative to each other; parallelism lives inside the
//! evidence and decision stages only.

use std::sync::Arc;

use serde::Serialize;

use crate::backend::GraphBackend;
use crate::cancel::CancelToken;
use crate::decide::decide_mentions;
use crate::error::{ConfigError, TaxoResult};
use crate::evidence::{EvidenceStats, collect_evidence};
use crate::extract::extract_mentions;
use crate::llm::TextGenerator;
use crate::model::{DisambiguatedMention, Health, Mention, MentionCandidates, PathEvidence};
use crate::narrate::narrate_evidence;
use crate::prompts::PromptSet;
use crate::retrieve::retrieve_candidates;

/// Engine-level configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Worker threads for independent path queries and decisions. Sized to
    /// the backend's safe concurrent-connection budget.
    pub parallelism: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { parallelism: 4 }
    }
}

/// Per-request knobs.
#[derive(Debug, Clone)]
pub struct AnalyzeOptions {
    /// Candidates retrieved per mention.
    pub top_k: usize,
    /// Maximum path length in edges.
    pub max_hops: usize,
    /// Degree cap for intermediate path nodes; enforced by the remote
    /// backend only.
    pub hub_threshold: Option<usize>,
}

impl Default for AnalyzeOptions {
    fn default() -> Self {
        Self {
            top_k: 5,
            max_hops: 2,
            hub_threshold: None,
        }
    }
}

/// Full analysis result: recognized mentions, their candidate rankings, and
/// the final decisions with shared evidence.
#[derive(Debug, Clone, Serialize)]
pub struct Analysis {
    pub mentions: Vec<Mention>,
    pub selections: Vec<MentionCandidates>,
    pub results: Vec<DisambiguatedMention>,
    pub stats: EvidenceStats,
}

/// Collaborator reachability, one entry per external dependency.
#[derive(Debug, Clone, Serialize)]
pub struct EngineHealth {
    pub backend: Health,
    pub generator: Health,
}

impl EngineHealth {
    pub fn is_ok(&self) -> bool {
        self.backend.is_ok() && self.generator.is_ok()
    }
}

/// The concept disambiguation engine.
///
/// Request-scoped: one pipeline execution serves one analysis request. The
/// engine itself holds no mutable state, so one instance serves concurrent
/// requests.
pub struct Engine {
    generator: Arc<dyn TextGenerator>,
    backend: Arc<dyn GraphBackend>,
    prompts: PromptSet,
    pool: rayon::ThreadPool,
}

impl Engine {
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// The active graph backend.
    pub fn backend(&self) -> &dyn GraphBackend {
        self.backend.as_ref()
    }

    /// Collaborator health, aggregated. Reports, never errors.
    pub fn health(&self) -> EngineHealth {
        EngineHealth {
            backend: self.backend.health(),
            generator: self.generator.health(),
        }
    }

    /// Run NER translation and then the disambiguation pipeline on `text`.
    pub fn analyze(
        &self,
        text: &str,
        opts: &AnalyzeOptions,
        cancel: &CancelToken,
    ) -> TaxoResult<Analysis> {
        validate(opts)?;
        let (mentions, _generation) =
            extract_mentions(self.generator.as_ref(), &self.prompts, text, cancel)?;
        let (selections, stats, results) = self.pipeline(text, &mentions, opts, cancel)?;
        Ok(Analysis {
            mentions,
            selections,
            results,
            stats,
        })
    }

    /// Disambiguate an already-recognized mention set against the taxonomy.
    ///
    /// This is the core entry point: mentions come from whatever recognition
    /// produced them; the engine retrieves candidates, gathers pairwise path
    /// evidence, narrates it, and decides one concept per mention.
    pub fn disambiguate(
        &self,
        text: &str,
        mentions: &[Mention],
        opts: &AnalyzeOptions,
        cancel: &CancelToken,
    ) -> TaxoResult<Vec<DisambiguatedMention>> {
        validate(opts)?;
        let (_, _, results) = self.pipeline(text, mentions, opts, cancel)?;
        Ok(results)
    }

    fn pipeline(
        &self,
        text: &str,
        mentions: &[Mention],
        opts: &AnalyzeOptions,
        cancel: &CancelToken,
    ) -> TaxoResult<(Vec<MentionCandidates>, EvidenceStats, Vec<DisambiguatedMention>)> {
        let selections =
            retrieve_candidates(self.backend.as_ref(), mentions, opts.top_k, cancel)?;

        let (paths, stats) = collect_evidence(
            self.backend.as_ref(),
            &selections,
            opts.max_hops,
            opts.hub_threshold,
            &self.pool,
            cancel,
        )?;

        let narration =
            narrate_evidence(self.generator.as_ref(), &self.prompts, &paths, cancel)?;

        let evidence = PathEvidence {
            paths,
            summary: (!narration.summary.is_empty()).then(|| narration.summary.clone()),
        };

        let results = decide_mentions(
            self.generator.as_ref(),
            &self.prompts,
            text,
            mentions,
            &selections,
            &narration.summary,
            &evidence,
            &self.pool,
            cancel,
        )?;

        Ok((selections, stats, results))
    }
}

impl std::fmt::Debug for Engine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engine")
            .field("parallelism", &self.pool.current_num_threads())
            .finish()
    }
}

fn validate(opts: &AnalyzeOptions) -> Result<(), ConfigError> {
    if opts.top_k == 0 {
        return Err(ConfigError::InvalidOption {
            message: "top_k must be a positive integer".into(),
        });
    }
    if opts.max_hops == 0 {
        return Err(ConfigError::InvalidOption {
            message: "max_hops must be a positive integer".into(),
        });
    }
    if opts.hub_threshold == Some(0) {
        return Err(ConfigError::InvalidOption {
            message: "hub_threshold must be a positive integer when set".into(),
        });
    }
    Ok(())
}

/// Builder for [`Engine`]. Both collaborators are required; a missing one is
/// a configuration error surfaced at build time, not on the first request.
#[derive(Default)]
pub struct EngineBuilder {
    generator: Option<Arc<dyn TextGenerator>>,
    backend: Option<Arc<dyn GraphBackend>>,
    prompts: Option<PromptSet>,
    config: EngineConfig,
}

impl EngineBuilder {
    pub fn generator(mut self, generator: Arc<dyn TextGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn backend(mut self, backend: Arc<dyn GraphBackend>) -> Self {
        self.backend = Some(backend);
        self
    }

    pub fn prompts(mut self, prompts: PromptSet) -> Self {
        self.prompts = Some(prompts);
        self
    }

    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> TaxoResult<Engine> {
        let generator = self.generator.ok_or_else(|| ConfigError::MissingCollaborator {
            name: "text generator".into(),
        })?;
        let backend = self.backend.ok_or_else(|| ConfigError::MissingCollaborator {
            name: "graph backend".into(),
        })?;
        if self.config.parallelism == 0 {
            return Err(ConfigError::InvalidOption {
                message: "parallelism must be > 0".into(),
            }
            .into());
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.config.parallelism)
            .build()
            .map_err(|e| ConfigError::InvalidOption {
                message: format!("failed to build worker pool: {e}"),
            })?;

        tracing::info!(parallelism = self.config.parallelism, "engine initialized");
        Ok(Engine {
            generator,
            backend,
            prompts: self.prompts.unwrap_or_default(),
            pool,
        })
    }
}
