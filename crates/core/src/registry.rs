//! Trigger-point registry.
//!
//! Built once at startup: every handler is registered before the first trigger fires, and the
//! registry is read-only afterwards.

use crate::constants::{ORDER_SELECT_TRIGGER, ORDER_SIGN_EXPLICIT_TRIGGER, ORDER_SIGN_TRIGGER};
use crate::session::{PamaTriggerHandler, Session, TriggerGate, TriggerHandler};
use crate::{CdsError, CdsResult};
use pama_types::NonEmptyText;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Handlers keyed by trigger point.
#[derive(Clone, Default)]
pub struct TriggerRegistry {
    handlers: BTreeMap<String, Arc<dyn TriggerHandler>>,
}

impl std::fmt::Debug for TriggerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TriggerRegistry")
            .field("triggers", &self.handlers.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl TriggerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// The PAMA registry: `pama/order-select` fires immediately, `pama/order-sign` waits for the
    /// `TRIGGER_ORDER_SIGN` explicit trigger. Both use `draft_request_id` in their context.
    pub fn standard(draft_request_id: &str) -> CdsResult<Self> {
        let mut registry = Self::new();
        registry.register(
            ORDER_SELECT_TRIGGER,
            Arc::new(PamaTriggerHandler::new(
                TriggerGate::Immediate,
                draft_request_id,
            )),
        )?;
        registry.register(
            ORDER_SIGN_TRIGGER,
            Arc::new(PamaTriggerHandler::new(
                TriggerGate::Explicit(NonEmptyText::new(ORDER_SIGN_EXPLICIT_TRIGGER)?),
                draft_request_id,
            )),
        )?;
        Ok(registry)
    }

    /// Register `handler` under `trigger`.
    ///
    /// # Errors
    ///
    /// Returns [`CdsError::DuplicateTrigger`] if the key is taken.
    pub fn register(
        &mut self,
        trigger: impl Into<String>,
        handler: Arc<dyn TriggerHandler>,
    ) -> CdsResult<()> {
        let trigger = trigger.into();
        if self.handlers.contains_key(&trigger) {
            return Err(CdsError::DuplicateTrigger(trigger));
        }

        tracing::debug!(
            trigger = %trigger,
            explicit = handler.gate().needs_explicit_trigger(),
            "registered trigger handler"
        );
        self.handlers.insert(trigger, handler);
        Ok(())
    }

    /// Handler registered under `trigger`.
    pub fn get(&self, trigger: &str) -> CdsResult<Arc<dyn TriggerHandler>> {
        self.handlers
            .get(trigger)
            .cloned()
            .ok_or_else(|| CdsError::UnknownTrigger(trigger.to_owned()))
    }

    /// Start a new idle session for `trigger`.
    pub fn open_session(&self, trigger: &str) -> CdsResult<Session> {
        let handler = self.get(trigger)?;
        let session = Session::new(trigger, handler);
        tracing::info!(session = %session.id(), trigger, "opened session");
        Ok(session)
    }

    /// Registered trigger points, sorted.
    pub fn triggers(&self) -> impl Iterator<Item = &str> {
        self.handlers.keys().map(String::as_str)
    }
}
