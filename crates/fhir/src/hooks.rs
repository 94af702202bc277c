//! CDS Hooks exchange wire models.
//!
//! Outbound: the hook context (`selections` plus a `draftOrders` Bundle holding one draft
//! ServiceRequest). Inbound: system actions, card suggestions and postMessage-style session
//! messages.
//!
//! Message payloads are kept as raw JSON. A `ui.done` message must be honoured whatever its
//! payload looks like, so the payload is only decoded by callers that need a resource out of it.

use crate::{
    parse_json, render_json, CodeableConcept, ExternalResource, FhirError, FhirResult, Reference,
};
use serde::{Deserialize, Serialize};

/// Action type that carries a replacement resource.
pub const ACTION_TYPE_UPDATE: &str = "update";

// ============================================================================
// Outbound context
// ============================================================================

/// Context handed to the decision-support session when a hook fires.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionContext {
    /// Resource references (`ServiceRequest/<id>`) the clinician is acting on.
    pub selections: Vec<String>,

    /// Draft orders bundle.
    pub draft_orders: Bundle,
}

/// A FHIR Bundle of draft resources.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Bundle {
    pub resource_type: String,
    pub entry: Vec<BundleEntry>,
}

impl Bundle {
    /// Create a bundle from its entries.
    pub fn new(entry: Vec<BundleEntry>) -> Self {
        Self {
            resource_type: "Bundle".into(),
            entry,
        }
    }
}

/// One bundle entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BundleEntry {
    pub resource: ServiceRequest,
}

/// A pending imaging order.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceRequest {
    pub resource_type: String,
    pub id: String,
    pub status: String,
    pub intent: String,
    pub code: CodeableConcept,
    pub subject: Reference,
    pub reason_code: Vec<CodeableConcept>,
}

impl ServiceRequest {
    /// Create a `draft` / `plan` ServiceRequest.
    pub fn draft(
        id: impl Into<String>,
        code: CodeableConcept,
        subject: Reference,
        reason_code: Vec<CodeableConcept>,
    ) -> Self {
        Self {
            resource_type: "ServiceRequest".into(),
            id: id.into(),
            status: "draft".into(),
            intent: "plan".into(),
            code,
            subject,
            reason_code,
        }
    }

    /// Reference string pointing at this request.
    pub fn reference(&self) -> String {
        format!("{}/{}", self.resource_type, self.id)
    }
}

// ============================================================================
// Inbound exchange
// ============================================================================

/// An action proposed by a system-action sweep or a card suggestion.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    #[serde(rename = "type")]
    pub action_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resource: Option<ExternalResource>,
}

impl Action {
    /// An `update` action wrapping `resource`.
    pub fn update(resource: ExternalResource) -> Self {
        Self {
            action_type: ACTION_TYPE_UPDATE.into(),
            description: None,
            resource: Some(resource),
        }
    }

    /// Whether this is an `update` action.
    pub fn is_update(&self) -> bool {
        self.action_type == ACTION_TYPE_UPDATE
    }
}

/// A card suggestion: a batch of proposed actions the clinician may accept.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Suggestion {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uuid: Option<String>,

    #[serde(default)]
    pub actions: Vec<Action>,
}

/// Data of a message posted by the decision-support session.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageData {
    pub message_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<serde_json::Value>,
}

impl MessageData {
    /// Create a message with no payload.
    pub fn new(message_type: impl Into<String>) -> Self {
        Self {
            message_type: message_type.into(),
            payload: None,
        }
    }

    /// Create a message whose payload wraps `resource`.
    pub fn with_resource(
        message_type: impl Into<String>,
        resource: &ExternalResource,
    ) -> FhirResult<Self> {
        Ok(Self {
            message_type: message_type.into(),
            payload: Some(serde_json::json!({ "resource": serde_json::to_value(resource)? })),
        })
    }

    /// Decode `payload.resource`.
    ///
    /// Returns `Ok(None)` when there is no payload or the payload has no `resource` key.
    ///
    /// # Errors
    ///
    /// Returns [`FhirError::Translation`] if `payload.resource` is present but is not
    /// resource-shaped.
    pub fn payload_resource(&self) -> FhirResult<Option<ExternalResource>> {
        let Some(resource) = self.payload.as_ref().and_then(|p| p.get("resource")) else {
            return Ok(None);
        };

        match serde_path_to_error::deserialize::<_, ExternalResource>(resource) {
            Ok(parsed) => Ok(Some(parsed)),
            Err(err) => {
                let path = err.path().to_string();
                Err(FhirError::Translation(format!(
                    "Message payload resource schema mismatch at {path}: {}",
                    err.into_inner()
                )))
            }
        }
    }
}

/// A link on a decision-support card (used to launch SMART apps).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Link {
    pub label: String,
    pub url: String,

    #[serde(rename = "type")]
    pub link_type: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app_context: Option<String>,
}

// ============================================================================
// Public CdsHooks operations
// ============================================================================

/// CDS Hooks exchange operations.
///
/// This is a zero-sized type used for namespacing hook-related operations.
/// All methods are associated functions.
pub struct CdsHooks;

impl CdsHooks {
    /// Parse a session message from JSON text.
    pub fn message_parse(json_text: &str) -> FhirResult<MessageData> {
        parse_json(json_text, "Session message")
    }

    /// Parse a system-action batch (a JSON array of actions).
    pub fn actions_parse(json_text: &str) -> FhirResult<Vec<Action>> {
        parse_json(json_text, "System action batch")
    }

    /// Parse a card suggestion.
    pub fn suggestion_parse(json_text: &str) -> FhirResult<Suggestion> {
        parse_json(json_text, "Suggestion")
    }

    /// Parse a hook context.
    pub fn context_parse(json_text: &str) -> FhirResult<SessionContext> {
        parse_json(json_text, "Hook context")
    }

    /// Render a hook context as pretty JSON.
    pub fn context_render(context: &SessionContext) -> FhirResult<String> {
        render_json(context, "hook context")
    }
}
