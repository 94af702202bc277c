//! Composition root for the decision-support core.

use crate::config::CdsConfig;
use crate::controller::{search_options, SearchController, SelectOption};
use crate::registry::TriggerRegistry;
use crate::search::SearchIndex;
use crate::session::Session;
use crate::vocabulary::{CodeVocabulary, VocabularyKind};
use crate::CdsResult;
use std::sync::Arc;

/// Vocabularies, their indexes and the trigger registry, built once at startup.
///
/// Everything held here is immutable, so a service can be shared behind an `Arc` by any number
/// of concurrent requests.
#[derive(Clone, Debug)]
pub struct CdsService {
    config: CdsConfig,
    procedures: Arc<SearchIndex>,
    reasons: Arc<SearchIndex>,
    registry: TriggerRegistry,
}

impl CdsService {
    /// Load both vocabularies, build their indexes and the standard trigger registry.
    ///
    /// # Errors
    ///
    /// Fails if a vocabulary cannot be read or contains blank or duplicate codes.
    pub fn new(config: CdsConfig) -> CdsResult<Self> {
        let registry = TriggerRegistry::standard(config.draft_request_id())?;
        Self::with_registry(config, registry)
    }

    /// As [`CdsService::new`], with a caller-built registry.
    pub fn with_registry(config: CdsConfig, registry: TriggerRegistry) -> CdsResult<Self> {
        let procedures = Self::build_index(&config, VocabularyKind::Procedures)?;
        let reasons = Self::build_index(&config, VocabularyKind::Reasons)?;

        tracing::info!(
            procedures = procedures.vocabulary().len(),
            reasons = reasons.vocabulary().len(),
            triggers = ?registry.triggers().collect::<Vec<_>>(),
            "decision-support core ready"
        );

        Ok(Self {
            config,
            procedures,
            reasons,
            registry,
        })
    }

    fn build_index(config: &CdsConfig, kind: VocabularyKind) -> CdsResult<Arc<SearchIndex>> {
        let vocabulary = CodeVocabulary::load(kind, config.value_set_override(kind))?;
        Ok(Arc::new(SearchIndex::build(Arc::new(vocabulary))))
    }

    pub fn config(&self) -> &CdsConfig {
        &self.config
    }

    pub fn registry(&self) -> &TriggerRegistry {
        &self.registry
    }

    pub fn index(&self, kind: VocabularyKind) -> &Arc<SearchIndex> {
        match kind {
            VocabularyKind::Procedures => &self.procedures,
            VocabularyKind::Reasons => &self.reasons,
        }
    }

    /// Ranked options for `query`, capped at the configured search limit. Not debounced.
    pub fn search(&self, kind: VocabularyKind, query: &str) -> Vec<SelectOption> {
        search_options(self.index(kind), query, self.config.search().search_limit)
    }

    /// The options shown before any typing.
    pub fn default_options(&self, kind: VocabularyKind) -> Vec<SelectOption> {
        self.index(kind)
            .vocabulary()
            .first(self.config.search().default_options_limit)
            .iter()
            .map(SelectOption::from)
            .collect()
    }

    /// A debounced controller over the `kind` index. Must be called inside a Tokio runtime.
    pub fn search_controller(&self, kind: VocabularyKind) -> SearchController {
        SearchController::spawn(self.index(kind).clone(), *self.config.search())
    }

    /// Open a new idle session for `trigger`.
    pub fn open_session(&self, trigger: &str) -> CdsResult<Session> {
        self.registry.open_session(trigger)
    }
}
