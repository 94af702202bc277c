//! PAMA appropriateness ratings carried on inbound resources.
//!
//! Ratings travel as codes inside an extension with a well-known URL. A resource may carry
//! several rating extensions, each with several codings; only the first code counts, and the
//! same first-wins reduction picks the single rating applied from a system-action batch.

use crate::constants::PAMA_RATING_EXTENSION_URL;
use fhir::ExternalResource;
use serde::{Deserialize, Serialize};

/// An appropriateness rating.
///
/// Unknown codes pass through unchanged as [`Rating::Other`].
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum Rating {
    Appropriate,
    NotAppropriate,
    NoCriteriaApply,
    Other(String),
}

impl Rating {
    /// The wire code of this rating.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Appropriate => "appropriate",
            Self::NotAppropriate => "not-appropriate",
            Self::NoCriteriaApply => "no-criteria-apply",
            Self::Other(code) => code,
        }
    }

    /// Symbol shown next to the order for this rating, if it has one.
    pub fn symbol(&self) -> Option<&'static str> {
        match self {
            Self::Appropriate => Some("✓"),
            Self::NotAppropriate => Some("⚠"),
            Self::NoCriteriaApply | Self::Other(_) => None,
        }
    }
}

impl From<String> for Rating {
    fn from(code: String) -> Self {
        match code.as_str() {
            "appropriate" => Self::Appropriate,
            "not-appropriate" => Self::NotAppropriate,
            "no-criteria-apply" => Self::NoCriteriaApply,
            _ => Self::Other(code),
        }
    }
}

impl From<&str> for Rating {
    fn from(code: &str) -> Self {
        Self::from(code.to_owned())
    }
}

impl From<Rating> for String {
    fn from(rating: Rating) -> Self {
        match rating {
            Rating::Other(code) => code,
            known => known.as_str().to_owned(),
        }
    }
}

impl std::fmt::Display for Rating {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A rating together with the id of the resource it was read from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingPair {
    pub rating: Rating,
    pub resource_id: Option<String>,
}

/// Keep the first item and discard the rest.
///
/// Every "first rating wins" policy goes through this one reduction.
pub fn first_wins<T>(items: impl IntoIterator<Item = T>) -> Option<T> {
    items.into_iter().next()
}

/// All rating pairs on `resource`, in extension then coding order.
///
/// A rating extension without a `valueCodeableConcept` contributes nothing.
pub fn rating_pairs(resource: &ExternalResource) -> Vec<RatingPair> {
    resource
        .extensions_with_url(PAMA_RATING_EXTENSION_URL)
        .filter_map(|ext| ext.value_codeable_concept.as_ref())
        .flat_map(|concept| concept.coding.iter())
        .map(|coding| RatingPair {
            rating: Rating::from(coding.code.as_str()),
            resource_id: resource.id.clone(),
        })
        .collect()
}

/// The rating of `resource`, if it carries one.
pub fn extract(resource: &ExternalResource) -> Option<Rating> {
    first_wins(rating_pairs(resource)).map(|pair| pair.rating)
}

/// Rating pairs across `resources`, preserving resource order.
pub fn extract_batch<'a>(
    resources: impl IntoIterator<Item = &'a ExternalResource>,
) -> Vec<RatingPair> {
    resources.into_iter().flat_map(rating_pairs).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use fhir::{CodeableConcept, Coding, Extension};

    fn rating_extension(codes: &[&str]) -> Extension {
        Extension {
            url: PAMA_RATING_EXTENSION_URL.into(),
            value_codeable_concept: Some(CodeableConcept {
                coding: codes.iter().map(|c| Coding::code_only(*c)).collect(),
                text: None,
            }),
        }
    }

    fn resource(id: &str, extension: Vec<Extension>) -> ExternalResource {
        ExternalResource {
            id: Some(id.into()),
            extension,
            ..Default::default()
        }
    }

    #[test]
    fn first_extension_wins() {
        let r = resource(
            "r1",
            vec![rating_extension(&["a"]), rating_extension(&["b"])],
        );
        assert_eq!(extract(&r), Some(Rating::Other("a".into())));
    }

    #[test]
    fn first_coding_wins_within_extension() {
        let r = resource("r1", vec![rating_extension(&["appropriate", "not-appropriate"])]);
        assert_eq!(extract(&r), Some(Rating::Appropriate));
    }

    #[test]
    fn ignores_other_extensions() {
        let other = Extension {
            url: "http://example.org/other".into(),
            value_codeable_concept: Some(CodeableConcept::from_coding(Coding::code_only("x"))),
        };
        let r = resource("r1", vec![other, rating_extension(&["no-criteria-apply"])]);
        assert_eq!(extract(&r), Some(Rating::NoCriteriaApply));
    }

    #[test]
    fn absent_rating_is_none() {
        assert_eq!(extract(&resource("r1", vec![])), None);

        let bare = Extension {
            url: PAMA_RATING_EXTENSION_URL.into(),
            value_codeable_concept: None,
        };
        assert!(rating_pairs(&resource("r1", vec![bare])).is_empty());
    }

    #[test]
    fn batch_preserves_resource_order() {
        let resources = [
            resource("r1", vec![]),
            resource("r2", vec![rating_extension(&["not-appropriate"])]),
            resource("r3", vec![rating_extension(&["appropriate"])]),
        ];
        let pairs = extract_batch(&resources);

        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[0].resource_id.as_deref(), Some("r2"));
        assert_eq!(pairs[0].rating, Rating::NotAppropriate);
        assert_eq!(first_wins(pairs).map(|p| p.rating), Some(Rating::NotAppropriate));
    }

    #[test]
    fn first_wins_on_empty_is_none() {
        assert_eq!(first_wins(Vec::<u8>::new()), None);
        assert_eq!(first_wins(["a", "b"]), Some("a"));
    }

    #[test]
    fn ratings_serialise_as_codes() {
        assert_eq!(
            serde_json::to_value(Rating::NoCriteriaApply).expect("serialize"),
            serde_json::json!("no-criteria-apply")
        );
        let other: Rating = serde_json::from_str("\"custom\"").expect("deserialize");
        assert_eq!(other, Rating::Other("custom".into()));
        assert_eq!(Rating::Appropriate.symbol(), Some("✓"));
        assert_eq!(Rating::NotAppropriate.symbol(), Some("⚠"));
        assert_eq!(other.symbol(), None);
    }
}
