//! ValueSet expansion wire model.
//!
//! Vocabularies ship as FHIR ValueSet resources whose `expansion.contains` lists every coding.
//! Only the expansion is read; definitions (`compose`) are ignored.

use crate::{parse_json, Coding, FhirError, FhirResult};
use serde::Deserialize;

/// ValueSet expansion operations.
///
/// This is a zero-sized type used for namespacing ValueSet-related operations.
pub struct ValueSetExpansion;

impl ValueSetExpansion {
    /// Parse the codings of a ValueSet expansion from JSON text, preserving document order.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError`] if:
    /// - the JSON does not match the ValueSet shape (with the failing field path),
    /// - `resourceType` is present and is not `ValueSet`,
    /// - the resource carries no `expansion`.
    pub fn parse(json_text: &str) -> FhirResult<Vec<Coding>> {
        let wire: ValueSetWire = parse_json(json_text, "ValueSet")?;

        if let Some(resource_type) = wire.resource_type.as_deref() {
            if resource_type != "ValueSet" {
                return Err(FhirError::InvalidInput(format!(
                    "expected resourceType ValueSet, found {resource_type}"
                )));
            }
        }

        let expansion = wire
            .expansion
            .ok_or_else(|| FhirError::InvalidInput("ValueSet has no expansion".into()))?;

        Ok(expansion.contains)
    }

    /// Read and parse a ValueSet expansion from a file on disk.
    pub fn read(path: &std::path::Path) -> FhirResult<Vec<Coding>> {
        let text = std::fs::read_to_string(path)?;
        Self::parse(&text)
    }
}

// ============================================================================
// Wire types (internal)
// ============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ValueSetWire {
    #[serde(default)]
    resource_type: Option<String>,
    #[serde(default)]
    expansion: Option<ExpansionWire>,
}

#[derive(Debug, Deserialize)]
struct ExpansionWire {
    #[serde(default)]
    contains: Vec<Coding>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_expansion_in_order() {
        let input = r#"{
  "resourceType": "ValueSet",
  "url": "http://example.org/ValueSet/pama-imaging",
  "expansion": {
    "timestamp": "2019-01-01T00:00:00Z",
    "contains": [
      { "system": "http://www.ama-assn.org/go/cpt", "code": "71250", "display": "CT chest (without contrast)" },
      { "system": "http://www.ama-assn.org/go/cpt", "code": "72133", "display": "CT lumbar spine (with and without contrast)" }
    ]
  }
}"#;

        let codings = ValueSetExpansion::parse(input).expect("parse value set");
        let codes: Vec<_> = codings.iter().map(|c| c.code.as_str()).collect();
        assert_eq!(codes, vec!["71250", "72133"]);
        assert_eq!(
            codings[0].system.as_deref(),
            Some("http://www.ama-assn.org/go/cpt")
        );
    }

    #[test]
    fn rejects_other_resource_types() {
        let err = ValueSetExpansion::parse(r#"{"resourceType":"CodeSystem","expansion":{}}"#)
            .expect_err("wrong resource type");
        assert!(matches!(err, FhirError::InvalidInput(msg) if msg.contains("CodeSystem")));
    }

    #[test]
    fn rejects_missing_expansion() {
        let err = ValueSetExpansion::parse(r#"{"resourceType":"ValueSet"}"#)
            .expect_err("no expansion");
        assert!(matches!(err, FhirError::InvalidInput(_)));
    }

    #[test]
    fn schema_mismatch_names_the_entry() {
        let err = ValueSetExpansion::parse(r#"{"expansion":{"contains":[{"code":1}]}}"#)
            .expect_err("numeric code");
        match err {
            FhirError::Translation(msg) => assert!(msg.contains("expansion.contains[0]"), "{msg}"),
            other => panic!("expected Translation error, got {other:?}"),
        }
    }
}
