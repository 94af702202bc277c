//! Decision-support session protocol.
//!
//! A [`TriggerHandler`] describes how one trigger point talks to an external decision-support
//! session: when context may be sent, what the context looks like, and how inbound system
//! actions and messages become order commands. A [`Session`] drives one exchange through
//!
//! ```text
//! Idle -> AwaitingExplicitTrigger -> Active -> Closed
//!   \__________________________________^
//! ```
//!
//! The explicit-trigger state is only entered by handlers gated on a trigger tag. Events that
//! reach a session outside `Active` are ignored.

use crate::constants::{MESSAGE_SCRATCHPAD_UPDATE, MESSAGE_UI_DONE};
use crate::error::MissingPart;
use crate::order::{Dispatch, OrderCommand, WidgetState};
use crate::rating::{extract_batch, first_wins};
use crate::translate::translate;
use crate::{CdsError, CdsResult};
use fhir::{
    Action, Bundle, BundleEntry, CodeableConcept, MessageData, Reference, ServiceRequest,
    SessionContext,
};
use pama_types::NonEmptyText;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

/// The closable origin of a session message.
pub trait SourceHandle {
    fn close(&mut self);
}

/// When a handler may hand context to its session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TriggerGate {
    /// Context is sent on the first request.
    Immediate,
    /// Context is held back until an explicit trigger with this tag fires.
    Explicit(NonEmptyText),
}

impl TriggerGate {
    pub fn needs_explicit_trigger(&self) -> bool {
        matches!(self, Self::Explicit(_))
    }
}

/// Lifecycle state of a [`Session`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionState {
    Idle,
    AwaitingExplicitTrigger,
    Active,
    Closed,
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::Idle => "idle",
            Self::AwaitingExplicitTrigger => "awaiting-explicit-trigger",
            Self::Active => "active",
            Self::Closed => "closed",
        })
    }
}

/// What handling a message did to the session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum MessageOutcome {
    /// The session was not active; nothing happened.
    Ignored,
    /// The message was handled and the session stays open.
    Handled,
    /// The session finished and its source was closed.
    Closed,
}

/// Trigger-point behaviour registered with a [`crate::TriggerRegistry`].
pub trait TriggerHandler: Send + Sync {
    fn gate(&self) -> &TriggerGate;

    /// Project the widget state into hook context. Must be pure.
    fn generate_context(&self, state: &WidgetState) -> SessionContext;

    /// Handle a system-action batch.
    fn on_system_actions(&self, actions: &[Action], dispatch: &mut dyn Dispatch);

    /// Handle a session message. Returns `true` when the message ends the session.
    fn on_message(&self, message: &MessageData, dispatch: &mut dyn Dispatch) -> CdsResult<bool>;
}

// ============================================================================
// PAMA trigger handler
// ============================================================================

/// The PAMA imaging order handler.
#[derive(Clone, Debug)]
pub struct PamaTriggerHandler {
    gate: TriggerGate,
    draft_request_id: String,
}

impl PamaTriggerHandler {
    pub fn new(gate: TriggerGate, draft_request_id: impl Into<String>) -> Self {
        Self {
            gate,
            draft_request_id: draft_request_id.into(),
        }
    }
}

impl TriggerHandler for PamaTriggerHandler {
    fn gate(&self) -> &TriggerGate {
        &self.gate
    }

    /// One draft ServiceRequest holding the selected study and reasons.
    ///
    /// With no study selected `code.coding` is empty.
    fn generate_context(&self, state: &WidgetState) -> SessionContext {
        let code = state
            .draft
            .study_coding()
            .cloned()
            .map(CodeableConcept::from_coding)
            .unwrap_or_default();
        let reasons = state
            .draft
            .reason_codings()
            .iter()
            .cloned()
            .map(CodeableConcept::from_coding)
            .collect();

        let request = ServiceRequest::draft(
            self.draft_request_id.as_str(),
            code,
            Reference::to("Patient", state.patient_id.as_str()),
            reasons,
        );

        SessionContext {
            selections: vec![request.reference()],
            draft_orders: Bundle::new(vec![BundleEntry { resource: request }]),
        }
    }

    /// Apply the first rating found across the batch's `update` actions, if any.
    fn on_system_actions(&self, actions: &[Action], dispatch: &mut dyn Dispatch) {
        let updates = actions
            .iter()
            .filter(|action| action.is_update())
            .filter_map(|action| action.resource.as_ref());

        if let Some(pair) = first_wins(extract_batch(updates)) {
            dispatch.dispatch(OrderCommand::ApplyPamaRating {
                resource_id: pair.resource_id,
                rating: pair.rating,
            });
        }
    }

    fn on_message(&self, message: &MessageData, dispatch: &mut dyn Dispatch) -> CdsResult<bool> {
        match message.message_type.as_str() {
            MESSAGE_SCRATCHPAD_UPDATE => {
                let resource = message
                    .payload_resource()?
                    .ok_or_else(|| CdsError::malformed(None, MissingPart::PayloadResource))?;
                dispatch.dispatch(translate(&resource)?);
                Ok(false)
            }
            MESSAGE_UI_DONE => Ok(true),
            other => {
                tracing::debug!(message_type = other, "ignoring session message");
                Ok(false)
            }
        }
    }
}

// ============================================================================
// Session
// ============================================================================

/// One exchange between the widget and a decision-support session.
///
/// The host delivers events one at a time; a session is not shared between threads without an
/// outer lock.
#[derive(Clone)]
pub struct Session {
    id: Uuid,
    trigger: String,
    handler: Arc<dyn TriggerHandler>,
    state: SessionState,
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("trigger", &self.trigger)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Session {
    /// Create an idle session for `handler`.
    pub fn new(trigger: impl Into<String>, handler: Arc<dyn TriggerHandler>) -> Self {
        Self {
            id: Uuid::new_v4(),
            trigger: trigger.into(),
            handler,
            state: SessionState::Idle,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn trigger(&self) -> &str {
        &self.trigger
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Ask for context to hand to the external session.
    ///
    /// An idle session with an immediate gate becomes active and returns context; with an
    /// explicit gate it starts waiting for the trigger and returns `None`. An active session
    /// returns fresh context. Waiting and closed sessions return `None`.
    pub fn request_context(&mut self, state: &WidgetState) -> Option<SessionContext> {
        match self.state {
            SessionState::Idle => {
                if self.handler.gate().needs_explicit_trigger() {
                    self.transition(SessionState::AwaitingExplicitTrigger);
                    None
                } else {
                    self.transition(SessionState::Active);
                    Some(self.handler.generate_context(state))
                }
            }
            SessionState::Active => Some(self.handler.generate_context(state)),
            SessionState::AwaitingExplicitTrigger | SessionState::Closed => {
                self.ignore("context request");
                None
            }
        }
    }

    /// Fire an explicit trigger.
    ///
    /// Activates a waiting session whose gate tag equals `tag`; anything else is a no-op.
    pub fn explicit_trigger(&mut self, tag: &str, state: &WidgetState) -> Option<SessionContext> {
        let matches = match self.handler.gate() {
            TriggerGate::Explicit(expected) => expected == tag,
            TriggerGate::Immediate => false,
        };

        if self.state == SessionState::AwaitingExplicitTrigger && matches {
            self.transition(SessionState::Active);
            return Some(self.handler.generate_context(state));
        }

        self.ignore("explicit trigger");
        None
    }

    /// Deliver a system-action batch. Returns `false` if the session was not active.
    pub fn on_system_actions(&mut self, actions: &[Action], dispatch: &mut dyn Dispatch) -> bool {
        if self.state != SessionState::Active {
            self.ignore("system actions");
            return false;
        }
        self.handler.on_system_actions(actions, dispatch);
        true
    }

    /// Deliver a session message from `source`.
    ///
    /// A message that ends the session closes `source` and moves the session to `Closed`.
    ///
    /// # Errors
    ///
    /// Fails when a scratchpad update cannot be translated. Nothing is dispatched and the
    /// session stays active.
    pub fn on_message(
        &mut self,
        message: &MessageData,
        source: &mut dyn SourceHandle,
        dispatch: &mut dyn Dispatch,
    ) -> CdsResult<MessageOutcome> {
        if self.state != SessionState::Active {
            self.ignore("session message");
            return Ok(MessageOutcome::Ignored);
        }

        let done = self
            .handler
            .on_message(message, dispatch)
            .inspect_err(|e| {
                tracing::warn!(
                    session = %self.id,
                    trigger = %self.trigger,
                    message_type = %message.message_type,
                    error = %e,
                    "dropped scratchpad update"
                );
            })?;

        if done {
            source.close();
            self.transition(SessionState::Closed);
            return Ok(MessageOutcome::Closed);
        }
        Ok(MessageOutcome::Handled)
    }

    /// Close the session locally. Idempotent; the message source is left alone.
    pub fn close(&mut self) {
        if self.state != SessionState::Closed {
            self.transition(SessionState::Closed);
        }
    }

    fn transition(&mut self, next: SessionState) {
        tracing::info!(
            session = %self.id,
            trigger = %self.trigger,
            from = %self.state,
            to = %next,
            "session transition"
        );
        self.state = next;
    }

    fn ignore(&self, event: &str) {
        tracing::debug!(
            session = %self.id,
            trigger = %self.trigger,
            state = %self.state,
            event,
            "ignoring event outside active session"
        );
    }
}
