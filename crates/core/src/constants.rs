//! Constants used throughout the PAMA core crate.
//!
//! Wire identifiers shared with decision-support services and the defaults applied when no
//! configuration override is present.

use std::time::Duration;

/// Extension URL carrying a PAMA appropriateness rating.
pub const PAMA_RATING_EXTENSION_URL: &str = "http://fhir.org/argonaut/Extension/pama-rating";

/// Trigger point fired while the clinician selects an order.
pub const ORDER_SELECT_TRIGGER: &str = "pama/order-select";

/// Trigger point fired when the clinician signs the order.
pub const ORDER_SIGN_TRIGGER: &str = "pama/order-sign";

/// Explicit trigger tag gating the order-sign hook.
pub const ORDER_SIGN_EXPLICIT_TRIGGER: &str = "TRIGGER_ORDER_SIGN";

/// Session message replacing the order draft with a resource-derived state.
pub const MESSAGE_SCRATCHPAD_UPDATE: &str = "scratchpad.update";

/// Session message signalling the external session is finished.
pub const MESSAGE_UI_DONE: &str = "ui.done";

/// Default id of the draft ServiceRequest exposed in hook context.
pub const DEFAULT_DRAFT_REQUEST_ID: &str = "example-request-id";

/// Default debounce window for interactive search.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(200);

/// Default cap on interactive search results.
pub const DEFAULT_SEARCH_LIMIT: usize = 50;

/// Default number of options listed before any typing.
pub const DEFAULT_OPTIONS_LIMIT: usize = 10;

/// Bundled procedure vocabulary (ValueSet expansion).
pub(crate) const BUNDLED_PROCEDURES: &str = include_str!("../assets/pama-procedure-codes.json");

/// Bundled reason vocabulary (ValueSet expansion).
pub(crate) const BUNDLED_REASONS: &str = include_str!("../assets/pama-reason-codes.json");
