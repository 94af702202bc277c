//! Fixed code vocabularies (imaging procedures and reasons).
//!
//! A vocabulary is loaded once at startup from a ValueSet expansion, either the asset bundled
//! with this crate or a configured override file, and is read-only afterwards. Codes must be
//! unique and non-empty; a vocabulary violating this is a startup error, never a runtime one.

use crate::constants::{BUNDLED_PROCEDURES, BUNDLED_REASONS};
use crate::{CdsError, CdsResult};
use fhir::{Coding, ValueSetExpansion};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

/// Which vocabulary a list of codings belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VocabularyKind {
    /// Imaging procedures (studies).
    Procedures,
    /// Reasons supporting an imaging order.
    Reasons,
}

impl VocabularyKind {
    /// Returns the string representation of this kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Procedures => "procedures",
            Self::Reasons => "reasons",
        }
    }

    fn bundled_value_set(&self) -> &'static str {
        match self {
            Self::Procedures => BUNDLED_PROCEDURES,
            Self::Reasons => BUNDLED_REASONS,
        }
    }
}

impl std::fmt::Display for VocabularyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VocabularyKind {
    type Err = CdsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "procedures" | "procedure" | "studies" => Ok(Self::Procedures),
            "reasons" | "reason" => Ok(Self::Reasons),
            other => Err(CdsError::InvalidConfig(format!(
                "unknown vocabulary: {other} (expected procedures or reasons)"
            ))),
        }
    }
}

/// An ordered, immutable list of codings with unique codes.
#[derive(Clone, Debug)]
pub struct CodeVocabulary {
    kind: VocabularyKind,
    codings: Vec<Coding>,
    positions: HashMap<String, usize>,
}

impl CodeVocabulary {
    /// Build a vocabulary, validating that every code is non-empty and unique.
    ///
    /// # Errors
    ///
    /// Returns [`CdsError::InvalidVocabulary`] for a blank code and
    /// [`CdsError::DuplicateCode`] for a repeated one.
    pub fn new(kind: VocabularyKind, codings: Vec<Coding>) -> CdsResult<Self> {
        let mut positions = HashMap::with_capacity(codings.len());

        for (idx, coding) in codings.iter().enumerate() {
            if coding.code.trim().is_empty() {
                return Err(CdsError::InvalidVocabulary {
                    kind,
                    reason: format!("entry {idx} has an empty code"),
                });
            }
            if positions.insert(coding.code.clone(), idx).is_some() {
                return Err(CdsError::DuplicateCode {
                    kind,
                    code: coding.code.clone(),
                });
            }
        }

        Ok(Self {
            kind,
            codings,
            positions,
        })
    }

    /// Load the vocabulary bundled with this crate.
    pub fn bundled(kind: VocabularyKind) -> CdsResult<Self> {
        let codings = ValueSetExpansion::parse(kind.bundled_value_set())?;
        Self::new(kind, codings)
    }

    /// Load a vocabulary from a ValueSet expansion file.
    pub fn from_value_set_file(kind: VocabularyKind, path: &Path) -> CdsResult<Self> {
        let codings = ValueSetExpansion::read(path)?;
        Self::new(kind, codings)
    }

    /// Load from `override_path` when given, otherwise the bundled asset.
    pub fn load(kind: VocabularyKind, override_path: Option<&Path>) -> CdsResult<Self> {
        let vocabulary = match override_path {
            Some(path) => Self::from_value_set_file(kind, path)?,
            None => Self::bundled(kind)?,
        };

        tracing::info!(
            vocabulary = %kind,
            entries = vocabulary.len(),
            source = override_path.map_or("bundled".to_string(), |p| p.display().to_string()),
            "loaded code vocabulary"
        );

        Ok(vocabulary)
    }

    pub fn kind(&self) -> VocabularyKind {
        self.kind
    }

    pub fn codings(&self) -> &[Coding] {
        &self.codings
    }

    pub fn len(&self) -> usize {
        self.codings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codings.is_empty()
    }

    /// Coding at insertion position `idx`.
    pub fn get(&self, idx: usize) -> Option<&Coding> {
        self.codings.get(idx)
    }

    /// Look a coding up by its code.
    pub fn by_code(&self, code: &str) -> Option<&Coding> {
        self.positions.get(code).map(|&idx| &self.codings[idx])
    }

    /// The first `n` codings in vocabulary order.
    pub fn first(&self, n: usize) -> &[Coding] {
        &self.codings[..n.min(self.codings.len())]
    }
}
