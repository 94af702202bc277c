//! FHIR general-purpose datatypes used by the widget.

use serde::{Deserialize, Serialize};

/// A code from a controlled vocabulary plus its human-readable display.
///
/// Absent optional fields are omitted on the wire, so an inbound `{"code":"72133"}` renders back
/// as exactly that.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Coding {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    pub code: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

impl Coding {
    /// Create a coding with a display and no system.
    pub fn new(code: impl Into<String>, display: impl Into<String>) -> Self {
        Self {
            system: None,
            code: code.into(),
            display: Some(display.into()),
        }
    }

    /// Create a coding carrying only a code.
    pub fn code_only(code: impl Into<String>) -> Self {
        Self {
            system: None,
            code: code.into(),
            display: None,
        }
    }

    /// Display text, or the empty string when the coding has none.
    pub fn display_text(&self) -> &str {
        self.display.as_deref().unwrap_or_default()
    }
}

/// A concept expressed as zero or more codings plus optional plain text.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodeableConcept {
    #[serde(default)]
    pub coding: Vec<Coding>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl CodeableConcept {
    /// Wrap a single coding, using its display as the concept text.
    pub fn from_coding(coding: Coding) -> Self {
        let text = coding.display.clone();
        Self {
            coding: vec![coding],
            text,
        }
    }

    /// First coding, if any.
    pub fn first_coding(&self) -> Option<&Coding> {
        self.coding.first()
    }
}

/// A literal reference to another resource (for example `Patient/123`).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub reference: String,
}

impl Reference {
    /// Build a `<resource_type>/<id>` reference.
    pub fn to(resource_type: &str, id: &str) -> Self {
        Self {
            reference: format!("{resource_type}/{id}"),
        }
    }
}
