use crate::vocabulary::VocabularyKind;

/// The part of an update resource that was required but missing.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MissingPart {
    #[error("no PAMA rating extension")]
    Rating,
    #[error("no code.coding[0] study coding")]
    StudyCoding,
    #[error("no reasonCode entries")]
    ReasonCodes,
    #[error("reasonCode[{0}] has no coding")]
    ReasonCoding(usize),
    #[error("message payload carries no resource")]
    PayloadResource,
}

#[derive(Debug, thiserror::Error)]
pub enum CdsError {
    #[error("malformed update payload{}: {}", resource_label(.resource_id), .part)]
    MalformedUpdate {
        resource_id: Option<String>,
        part: MissingPart,
    },
    #[error("duplicate code {code} in {kind} vocabulary")]
    DuplicateCode { kind: VocabularyKind, code: String },
    #[error("invalid {kind} vocabulary: {reason}")]
    InvalidVocabulary { kind: VocabularyKind, reason: String },
    #[error("duplicate order reason code {0}")]
    DuplicateReason(String),
    #[error("trigger handler already registered for {0}")]
    DuplicateTrigger(String),
    #[error("no trigger handler registered for {0}")]
    UnknownTrigger(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
    #[error("search controller is no longer running")]
    SearchUnavailable,

    #[error("FHIR error: {0}")]
    Fhir(#[from] fhir::FhirError),
    #[error("invalid text: {0}")]
    Text(#[from] pama_types::TextError),
}

impl CdsError {
    pub(crate) fn malformed(resource_id: Option<&str>, part: MissingPart) -> Self {
        Self::MalformedUpdate {
            resource_id: resource_id.map(str::to_owned),
            part,
        }
    }

    /// Whether this error rejects a single inbound update rather than the service as a whole.
    pub fn is_malformed_update(&self) -> bool {
        matches!(self, Self::MalformedUpdate { .. })
    }
}

fn resource_label(resource_id: &Option<String>) -> String {
    resource_id
        .as_deref()
        .map(|id| format!(" ({id})"))
        .unwrap_or_default()
}

pub type CdsResult<T> = std::result::Result<T, CdsError>;
