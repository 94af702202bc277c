//! Inbound resource wire models.
//!
//! Decision-support services push back ServiceRequest-shaped resources inside system actions,
//! suggestion actions and `scratchpad.update` messages. Only the fields the widget consumes are
//! modelled; everything else is accepted and ignored.
//!
//! Presence matters here: `reasonCode` missing and `reasonCode: []` are different inputs, so
//! optional collections stay `Option` instead of defaulting.

use crate::{parse_json, CodeableConcept, FhirResult};
use serde::{Deserialize, Serialize};

/// An extension attached to a resource.
///
/// Only the `valueCodeableConcept` value type is modelled; other `value[x]` variants are
/// tolerated and dropped.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Extension {
    pub url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_codeable_concept: Option<CodeableConcept>,
}

/// A clinical-resource-shaped value received from a decision-support session.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalResource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<CodeableConcept>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason_code: Option<Vec<CodeableConcept>>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extension: Vec<Extension>,
}

impl ExternalResource {
    /// Extensions whose `url` equals `url`, in document order.
    pub fn extensions_with_url<'a>(&'a self, url: &'a str) -> impl Iterator<Item = &'a Extension> {
        self.extension.iter().filter(move |ext| ext.url == url)
    }
}

/// Resource parse operations.
///
/// This is a zero-sized type used for namespacing resource-related operations.
pub struct Resources;

impl Resources {
    /// Parse an inbound resource from JSON text.
    ///
    /// # Errors
    ///
    /// Returns [`crate::FhirError::Translation`] naming the failing field path when the JSON
    /// does not match the resource shape, or [`crate::FhirError::InvalidJson`] on trailing input.
    pub fn parse(json_text: &str) -> FhirResult<ExternalResource> {
        parse_json(json_text, "Resource")
    }
}
