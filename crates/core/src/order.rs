//! Order draft snapshots and the commands that mutate them.
//!
//! The order draft itself lives in an external state container. This crate only reads
//! snapshots of it ([`WidgetState`]) and emits [`OrderCommand`]s describing the mutation the
//! container should apply.

use crate::constants::ORDER_SELECT_TRIGGER;
use crate::rating::Rating;
use crate::{CdsError, CdsResult};
use fhir::{Coding, Link};
use pama_types::NonEmptyText;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// ============================================================================
// Order draft
// ============================================================================

/// A pending imaging order: at most one study and an ordered list of distinct reasons.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "OrderDraftWire")]
pub struct OrderDraft {
    #[serde(skip_serializing_if = "Option::is_none")]
    study_coding: Option<Coding>,
    reason_codings: Vec<Coding>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct OrderDraftWire {
    #[serde(default)]
    study_coding: Option<Coding>,
    #[serde(default)]
    reason_codings: Vec<Coding>,
}

impl TryFrom<OrderDraftWire> for OrderDraft {
    type Error = CdsError;

    fn try_from(wire: OrderDraftWire) -> Result<Self, Self::Error> {
        Self::new(wire.study_coding, wire.reason_codings)
    }
}

impl OrderDraft {
    /// Create a draft.
    ///
    /// # Errors
    ///
    /// Returns [`CdsError::DuplicateReason`] if two reasons share a code.
    pub fn new(study_coding: Option<Coding>, reason_codings: Vec<Coding>) -> CdsResult<Self> {
        let mut seen = HashSet::with_capacity(reason_codings.len());
        for reason in &reason_codings {
            if !seen.insert(reason.code.as_str()) {
                return Err(CdsError::DuplicateReason(reason.code.clone()));
            }
        }

        Ok(Self {
            study_coding,
            reason_codings,
        })
    }

    pub fn study_coding(&self) -> Option<&Coding> {
        self.study_coding.as_ref()
    }

    pub fn reason_codings(&self) -> &[Coding] {
        &self.reason_codings
    }
}

/// Snapshot of the widget state used to build hook context.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WidgetState {
    pub patient_id: NonEmptyText,

    #[serde(default)]
    pub draft: OrderDraft,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<Rating>,
}

impl WidgetState {
    pub fn new(patient_id: NonEmptyText, draft: OrderDraft) -> Self {
        Self {
            patient_id,
            draft,
            rating: None,
        }
    }
}

// ============================================================================
// Commands
// ============================================================================

/// A state mutation for the external state container.
///
/// Serialised with a `type` tag, for example
/// `{"type":"UPDATE_IMAGING_ORDER","pamaRating":"appropriate","studyCoding":{..},"reasonCodings":[..]}`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    rename_all = "SCREAMING_SNAKE_CASE",
    rename_all_fields = "camelCase"
)]
pub enum OrderCommand {
    /// Attach a rating without touching study or reasons.
    ApplyPamaRating {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        resource_id: Option<String>,
        rating: Rating,
    },
    /// Replace the whole draft with a resource-derived one.
    UpdateImagingOrder {
        pama_rating: Rating,
        study_coding: Coding,
        reason_codings: Vec<Coding>,
    },
    AddReason {
        coding: Coding,
    },
    RemoveReason {
        coding: Coding,
    },
    UpdateStudy {
        coding: Coding,
    },
    RemoveStudy {
        coding: Coding,
    },
    /// Fire the explicit order-sign trigger.
    TriggerOrderSign,
    /// Launch a SMART app from a card link.
    LaunchSmartApp {
        trigger_point: String,
        link: Link,
        source_window: String,
    },
}

impl OrderCommand {
    pub fn add_reason(coding: Coding) -> Self {
        Self::AddReason { coding }
    }

    pub fn remove_reason(coding: Coding) -> Self {
        Self::RemoveReason { coding }
    }

    pub fn update_study(coding: Coding) -> Self {
        Self::UpdateStudy { coding }
    }

    pub fn remove_study(coding: Coding) -> Self {
        Self::RemoveStudy { coding }
    }

    pub fn trigger_order_sign() -> Self {
        Self::TriggerOrderSign
    }

    /// Launch the app behind `link`; apps are always launched from the order-select hook.
    pub fn launch_smart_app(link: Link, source_window: impl Into<String>) -> Self {
        Self::LaunchSmartApp {
            trigger_point: ORDER_SELECT_TRIGGER.into(),
            link,
            source_window: source_window.into(),
        }
    }

    /// The rating this command applies, if any.
    pub fn rating(&self) -> Option<&Rating> {
        match self {
            Self::ApplyPamaRating { rating, .. } => Some(rating),
            Self::UpdateImagingOrder { pama_rating, .. } => Some(pama_rating),
            _ => None,
        }
    }

    /// The `type` tag this command serialises with.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ApplyPamaRating { .. } => "APPLY_PAMA_RATING",
            Self::UpdateImagingOrder { .. } => "UPDATE_IMAGING_ORDER",
            Self::AddReason { .. } => "ADD_REASON",
            Self::RemoveReason { .. } => "REMOVE_REASON",
            Self::UpdateStudy { .. } => "UPDATE_STUDY",
            Self::RemoveStudy { .. } => "REMOVE_STUDY",
            Self::TriggerOrderSign => "TRIGGER_ORDER_SIGN",
            Self::LaunchSmartApp { .. } => "LAUNCH_SMART_APP",
        }
    }
}

/// Sink accepting order commands.
pub trait Dispatch {
    fn dispatch(&mut self, command: OrderCommand);
}

impl Dispatch for Vec<OrderCommand> {
    fn dispatch(&mut self, command: OrderCommand) {
        self.push(command);
    }
}

impl<D: Dispatch + ?Sized> Dispatch for &mut D {
    fn dispatch(&mut self, command: OrderCommand) {
        (**self).dispatch(command);
    }
}
