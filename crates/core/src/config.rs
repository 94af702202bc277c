//! Core runtime configuration.
//!
//! This module defines configuration that should be resolved once at process startup and then
//! passed into core services. The intent is to avoid reading process-wide environment variables
//! during request handling, which can lead to inconsistent behaviour in multi-threaded runtimes
//! and test harnesses.
//!
//! The parsing helpers take `Option<String>` values rather than reading the environment
//! themselves, so they can be tested directly.

use crate::constants::{
    DEFAULT_DEBOUNCE, DEFAULT_DRAFT_REQUEST_ID, DEFAULT_OPTIONS_LIMIT, DEFAULT_SEARCH_LIMIT,
};
use crate::controller::SearchSettings;
use crate::vocabulary::VocabularyKind;
use crate::{CdsError, CdsResult};
use pama_types::NonEmptyText;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const ENV_DEBOUNCE_MS: &str = "PAMA_DEBOUNCE_MS";
pub const ENV_SEARCH_LIMIT: &str = "PAMA_SEARCH_LIMIT";
pub const ENV_DEFAULT_OPTIONS_LIMIT: &str = "PAMA_DEFAULT_OPTIONS_LIMIT";
pub const ENV_PROCEDURES_VALUESET: &str = "PAMA_PROCEDURES_VALUESET";
pub const ENV_REASONS_VALUESET: &str = "PAMA_REASONS_VALUESET";
pub const ENV_DRAFT_REQUEST_ID: &str = "PAMA_DRAFT_REQUEST_ID";

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CdsConfig {
    search: SearchSettings,
    procedures_value_set: Option<PathBuf>,
    reasons_value_set: Option<PathBuf>,
    draft_request_id: String,
}

impl CdsConfig {
    /// Create a new `CdsConfig`.
    pub fn new(
        search: SearchSettings,
        procedures_value_set: Option<PathBuf>,
        reasons_value_set: Option<PathBuf>,
        draft_request_id: &str,
    ) -> CdsResult<Self> {
        if search.search_limit == 0 {
            return Err(CdsError::InvalidConfig(
                "search limit must be at least 1".into(),
            ));
        }

        let draft_request_id = NonEmptyText::new(draft_request_id)
            .map_err(|_| CdsError::InvalidConfig("draft request id cannot be empty".into()))?
            .into_inner();

        Ok(Self {
            search,
            procedures_value_set,
            reasons_value_set,
            draft_request_id,
        })
    }

    /// Resolve configuration from a variable lookup such as `|name| std::env::var(name).ok()`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> CdsResult<Self> {
        let search = SearchSettings {
            debounce: debounce_from_env_value(lookup(ENV_DEBOUNCE_MS))?,
            search_limit: limit_from_env_value(
                ENV_SEARCH_LIMIT,
                lookup(ENV_SEARCH_LIMIT),
                DEFAULT_SEARCH_LIMIT,
            )?,
            default_options_limit: limit_from_env_value(
                ENV_DEFAULT_OPTIONS_LIMIT,
                lookup(ENV_DEFAULT_OPTIONS_LIMIT),
                DEFAULT_OPTIONS_LIMIT,
            )?,
        };

        Self::new(
            search,
            path_from_env_value(lookup(ENV_PROCEDURES_VALUESET)),
            path_from_env_value(lookup(ENV_REASONS_VALUESET)),
            &draft_request_id_from_env_value(lookup(ENV_DRAFT_REQUEST_ID)),
        )
    }

    pub fn search(&self) -> &SearchSettings {
        &self.search
    }

    /// ValueSet file replacing the bundled vocabulary of `kind`, if configured.
    pub fn value_set_override(&self, kind: VocabularyKind) -> Option<&Path> {
        match kind {
            VocabularyKind::Procedures => self.procedures_value_set.as_deref(),
            VocabularyKind::Reasons => self.reasons_value_set.as_deref(),
        }
    }

    pub fn draft_request_id(&self) -> &str {
        &self.draft_request_id
    }
}

impl Default for CdsConfig {
    fn default() -> Self {
        Self {
            search: SearchSettings::default(),
            procedures_value_set: None,
            reasons_value_set: None,
            draft_request_id: DEFAULT_DRAFT_REQUEST_ID.to_string(),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Parse the debounce window in milliseconds.
///
/// If `value` is `None` or empty/whitespace, returns the default window.
pub fn debounce_from_env_value(value: Option<String>) -> CdsResult<Duration> {
    let parsed = non_blank(value)
        .map(|v| {
            v.parse::<u64>().map_err(|e| {
                CdsError::InvalidConfig(format!("{ENV_DEBOUNCE_MS} must be milliseconds: {e}"))
            })
        })
        .transpose()?;

    Ok(parsed.map_or(DEFAULT_DEBOUNCE, Duration::from_millis))
}

/// Parse a result cap named `name`, falling back to `default` when unset.
pub fn limit_from_env_value(name: &str, value: Option<String>, default: usize) -> CdsResult<usize> {
    let parsed = non_blank(value)
        .map(|v| {
            v.parse::<usize>().map_err(|e| {
                CdsError::InvalidConfig(format!("{name} must be a non-negative integer: {e}"))
            })
        })
        .transpose()?;

    Ok(parsed.unwrap_or(default))
}

/// Parse an optional file path. Blank values count as unset.
pub fn path_from_env_value(value: Option<String>) -> Option<PathBuf> {
    non_blank(value).map(PathBuf::from)
}

/// Parse the draft ServiceRequest id, defaulting to `example-request-id`.
pub fn draft_request_id_from_env_value(value: Option<String>) -> String {
    non_blank(value).unwrap_or_else(|| DEFAULT_DRAFT_REQUEST_ID.to_string())
}
