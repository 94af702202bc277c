//! Translating inbound resources into full order updates.
//!
//! A full update replaces the study, the reasons and the rating together, so it only proceeds
//! on a complete resource. Any missing part rejects that one update and leaves the draft as it
//! was.

use crate::error::MissingPart;
use crate::order::{Dispatch, OrderCommand};
use crate::rating;
use crate::{CdsError, CdsResult};
use fhir::{Coding, ExternalResource, Suggestion};

/// Translate `resource` into an [`OrderCommand::UpdateImagingOrder`].
///
/// The study is `code.coding[0]` and each `reasonCode[i].coding[0]` becomes one reason, in
/// order. An empty `reasonCode` array yields an update with no reasons.
///
/// # Errors
///
/// Returns [`CdsError::MalformedUpdate`] naming the first missing part: the rating, the study
/// coding, the `reasonCode` array, or the coding of a reason entry.
pub fn translate(resource: &ExternalResource) -> CdsResult<OrderCommand> {
    let resource_id = resource.id.as_deref();
    let malformed = |part| CdsError::malformed(resource_id, part);

    let pama_rating = rating::extract(resource).ok_or_else(|| malformed(MissingPart::Rating))?;

    let study_coding = resource
        .code
        .as_ref()
        .and_then(|code| code.first_coding())
        .cloned()
        .ok_or_else(|| malformed(MissingPart::StudyCoding))?;

    let reason_codings = resource
        .reason_code
        .as_ref()
        .ok_or_else(|| malformed(MissingPart::ReasonCodes))?
        .iter()
        .enumerate()
        .map(|(idx, reason)| {
            reason
                .first_coding()
                .cloned()
                .ok_or_else(|| malformed(MissingPart::ReasonCoding(idx)))
        })
        .collect::<CdsResult<Vec<Coding>>>()?;

    Ok(OrderCommand::UpdateImagingOrder {
        pama_rating,
        study_coding,
        reason_codings,
    })
}

/// Apply an accepted card suggestion.
///
/// Every `update` action carrying a resource is translated first. Commands are dispatched only
/// when all of them translate; otherwise nothing is dispatched and the first error is returned.
/// Returns the number of commands dispatched.
pub fn apply_suggestion(suggestion: &Suggestion, dispatch: &mut dyn Dispatch) -> CdsResult<usize> {
    let commands = suggestion
        .actions
        .iter()
        .filter(|action| action.is_update())
        .filter_map(|action| action.resource.as_ref())
        .map(translate)
        .collect::<CdsResult<Vec<_>>>()
        .inspect_err(|e| {
            tracing::warn!(
                suggestion = suggestion.uuid.as_deref().unwrap_or("<none>"),
                error = %e,
                "rejected suggestion"
            );
        })?;

    let count = commands.len();
    for command in commands {
        dispatch.dispatch(command);
    }

    tracing::debug!(
        suggestion = suggestion.uuid.as_deref().unwrap_or("<none>"),
        commands = count,
        "applied suggestion"
    );
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::PAMA_RATING_EXTENSION_URL;
    use crate::rating::Rating;
    use fhir::{Action, Resources};

    fn scratchpad_resource() -> ExternalResource {
        Resources::parse(&format!(
            r#"{{
                "id": "r1",
                "code": {{ "coding": [{{ "code": "72133" }}] }},
                "reasonCode": [{{ "coding": [{{ "code": "123" }}] }}],
                "extension": [{{
                    "url": "{PAMA_RATING_EXTENSION_URL}",
                    "valueCodeableConcept": {{ "coding": [{{ "code": "no-criteria-apply" }}] }}
                }}]
            }}"#
        ))
        .expect("parse resource")
    }

    fn expected_update() -> serde_json::Value {
        serde_json::json!({
            "type": "UPDATE_IMAGING_ORDER",
            "pamaRating": "no-criteria-apply",
            "studyCoding": { "code": "72133" },
            "reasonCodings": [{ "code": "123" }]
        })
    }

    fn missing_part(err: CdsError) -> MissingPart {
        match err {
            CdsError::MalformedUpdate { part, .. } => part,
            other => panic!("expected MalformedUpdate, got {other:?}"),
        }
    }

    #[test]
    fn maps_well_formed_resource() {
        let command = translate(&scratchpad_resource()).expect("translate");
        assert_eq!(
            serde_json::to_value(&command).expect("serialize"),
            expected_update()
        );
    }

    #[test]
    fn rejects_missing_rating() {
        let mut resource = scratchpad_resource();
        resource.extension.clear();
        let err = translate(&resource).expect_err("no rating");
        assert_eq!(missing_part(err), MissingPart::Rating);
    }

    #[test]
    fn rejects_empty_study_coding() {
        let mut resource = scratchpad_resource();
        resource.code.as_mut().expect("code").coding.clear();
        let err = translate(&resource).expect_err("no study");
        assert!(err.to_string().contains("(r1)"));
        assert_eq!(missing_part(err), MissingPart::StudyCoding);
    }

    #[test]
    fn rejects_missing_reasons_but_accepts_empty() {
        let mut resource = scratchpad_resource();
        resource.reason_code = None;
        assert_eq!(
            missing_part(translate(&resource).expect_err("no reasons")),
            MissingPart::ReasonCodes
        );

        resource.reason_code = Some(vec![]);
        match translate(&resource).expect("empty reasons") {
            OrderCommand::UpdateImagingOrder { reason_codings, .. } => {
                assert!(reason_codings.is_empty())
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn rejects_reason_without_coding() {
        let mut resource = scratchpad_resource();
        resource
            .reason_code
            .as_mut()
            .expect("reasons")
            .push(Default::default());
        assert_eq!(
            missing_part(translate(&resource).expect_err("bare reason")),
            MissingPart::ReasonCoding(1)
        );
    }

    #[test]
    fn suggestion_dispatches_update() {
        let suggestion = Suggestion {
            label: Some("Use lumbar MRI".into()),
            uuid: Some("s1".into()),
            actions: vec![Action::update(scratchpad_resource())],
        };
        let mut dispatched: Vec<OrderCommand> = Vec::new();

        let count = apply_suggestion(&suggestion, &mut dispatched).expect("apply");

        assert_eq!(count, 1);
        assert_eq!(
            serde_json::to_value(&dispatched).expect("serialize"),
            serde_json::json!([expected_update()])
        );
    }

    #[test]
    fn suggestion_skips_non_updates_and_bare_actions() {
        let suggestion = Suggestion {
            actions: vec![
                Action {
                    action_type: "create".into(),
                    description: None,
                    resource: Some(ExternalResource::default()),
                },
                Action {
                    action_type: "update".into(),
                    description: None,
                    resource: None,
                },
            ],
            ..Default::default()
        };
        let mut dispatched: Vec<OrderCommand> = Vec::new();
        assert_eq!(apply_suggestion(&suggestion, &mut dispatched).expect("apply"), 0);
        assert!(dispatched.is_empty());
    }

    #[test]
    fn suggestion_is_all_or_nothing() {
        let mut broken = scratchpad_resource();
        broken.extension.clear();
        let suggestion = Suggestion {
            actions: vec![Action::update(scratchpad_resource()), Action::update(broken)],
            ..Default::default()
        };
        let mut dispatched: Vec<OrderCommand> = Vec::new();

        let err = apply_suggestion(&suggestion, &mut dispatched).expect_err("second is broken");

        assert!(err.is_malformed_update());
        assert!(dispatched.is_empty());
        assert!(matches!(
            translate(&scratchpad_resource()),
            Ok(OrderCommand::UpdateImagingOrder { pama_rating: Rating::NoCriteriaApply, .. })
        ));
    }
}
