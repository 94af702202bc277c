//! FHIR wire/boundary support for the PAMA imaging decision-support widget.
//!
//! This crate provides **wire models** and **parse/render helpers** for the JSON documents that
//! cross the widget's boundaries:
//! - bundled ValueSet expansions (procedure and reason vocabularies)
//! - inbound resources carried by system actions, suggestions and session messages
//! - the outbound CDS Hooks context (selections plus a draft-orders Bundle)
//!
//! This crate focuses on:
//! - FHIR semantic alignment (only the fields the widget reads or writes are modelled)
//! - serialisation/deserialisation with field-path reporting on schema mismatch
//!
//! Inbound models tolerate unknown keys: decision-support services attach arbitrary extra
//! resource content and the widget must keep working when they do.

pub mod datatypes;
pub mod hooks;
pub mod resource;
pub mod value_set;

// Re-export facades
pub use hooks::CdsHooks;
pub use resource::Resources;
pub use value_set::ValueSetExpansion;

// Re-export public wire-level types
pub use datatypes::{CodeableConcept, Coding, Reference};
pub use hooks::{
    Action, Bundle, BundleEntry, Link, MessageData, ServiceRequest, SessionContext, Suggestion,
};
pub use resource::{Extension, ExternalResource};

/// Errors returned by the `fhir` boundary crate.
#[derive(Debug, thiserror::Error)]
pub enum FhirError {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("translation error: {0}")]
    Translation(String),
}

/// Type alias for Results that can fail with a [`FhirError`].
pub type FhirResult<T> = Result<T, FhirError>;

/// Deserialize `json_text` into `T`, reporting the failing field path on mismatch.
///
/// `what` names the document in the error message (for example `"ValueSet"`).
pub(crate) fn parse_json<T>(json_text: &str, what: &str) -> FhirResult<T>
where
    T: serde::de::DeserializeOwned,
{
    let mut deserializer = serde_json::Deserializer::from_str(json_text);

    match serde_path_to_error::deserialize::<_, T>(&mut deserializer) {
        Ok(parsed) => {
            deserializer.end()?;
            Ok(parsed)
        }
        Err(err) => {
            let path = err.path().to_string();
            let source = err.into_inner();
            let path = if path.is_empty() || path == "." {
                "<root>"
            } else {
                path.as_str()
            };
            Err(FhirError::Translation(format!(
                "{what} schema mismatch at {path}: {source}"
            )))
        }
    }
}

/// Serialize `value` to pretty JSON.
pub(crate) fn render_json<T>(value: &T, what: &str) -> FhirResult<String>
where
    T: serde::Serialize,
{
    serde_json::to_string_pretty(value)
        .map_err(|e| FhirError::Translation(format!("Failed to serialize {what}: {e}")))
}
