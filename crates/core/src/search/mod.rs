//! Full-text search over a code vocabulary.
//!
//! Each vocabulary entry is indexed under two fields: the normalised display text and the raw
//! code. Queries are ranked with BM25 summed across fields.

mod index;
mod query;
mod text;

pub use index::{SearchHit, SearchIndex};
pub use query::{parse as parse_query, Clause, Presence, MAX_EDIT_DISTANCE};
pub use text::{normalise_display, tokens};

/// An indexed field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Field {
    /// Normalised display text.
    Search,
    /// Raw code.
    Code,
}

impl Field {
    pub const ALL: [Field; 2] = [Field::Search, Field::Code];

    /// Field named in `name:term` query syntax.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "search" => Some(Self::Search),
            "code" => Some(Self::Code),
            _ => None,
        }
    }

    fn slot(self) -> usize {
        match self {
            Self::Search => 0,
            Self::Code => 1,
        }
    }
}
