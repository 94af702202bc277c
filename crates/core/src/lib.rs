//! # PAMA Core
//!
//! Core logic for the PAMA imaging decision-support widget.
//!
//! This crate contains:
//! - the procedure and reason vocabularies and their ranked full-text search indexes
//! - debounced interactive search adapted to select-box options
//! - rating extraction and order-update translation for inbound resources
//! - the trigger-handler session protocol and the trigger registry
//!
//! The order draft is owned by an external state container. This crate never mutates it; it
//! emits [`OrderCommand`]s through a [`Dispatch`] sink instead.
//!
//! **No API concerns**: HTTP servers and command-line handling belong in `api-rest` and
//! `pama-cli`.

pub mod config;
pub mod constants;
pub mod controller;
pub mod error;
pub mod order;
pub mod rating;
pub mod registry;
pub mod search;
pub mod service;
pub mod session;
pub mod translate;
pub mod vocabulary;

pub use config::CdsConfig;
pub use controller::{SearchController, SearchSettings, SelectOption};
pub use error::{CdsError, CdsResult, MissingPart};
pub use order::{Dispatch, OrderCommand, OrderDraft, WidgetState};
pub use rating::{Rating, RatingPair};
pub use registry::TriggerRegistry;
pub use search::{SearchHit, SearchIndex};
pub use service::CdsService;
pub use session::{
    MessageOutcome, PamaTriggerHandler, Session, SessionState, SourceHandle, TriggerGate,
    TriggerHandler,
};
pub use translate::{apply_suggestion, translate};
pub use vocabulary::{CodeVocabulary, VocabularyKind};
