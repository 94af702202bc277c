//! Query syntax.
//!
//! A query is a whitespace-separated list of clauses. Each clause may carry:
//! - a presence marker: `+term` (required) or `-term` (prohibited)
//! - a field scope: `search:term` or `code:term`
//! - a trailing `*` for prefix expansion
//! - `~N` for edit-distance expansion (capped at [`MAX_EDIT_DISTANCE`])
//! - `^N` to boost the clause
//!
//! Parsing never fails. Anything that does not read as syntax is treated as plain text and runs
//! through the same token pipeline as the indexed documents.

use super::text;
use super::Field;

/// Largest edit distance a `~N` clause may request.
pub const MAX_EDIT_DISTANCE: u8 = 2;

/// Weight of the implicit prefix clause added for a partially typed final word.
pub(crate) const TYPEAHEAD_BOOST: f32 = 0.5;

/// How a clause constrains the result set.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Presence {
    /// Contributes to the score; a document needs at least one optional match when no clause is
    /// required.
    #[default]
    Optional,
    /// Every result must match.
    Required,
    /// No result may match.
    Prohibited,
}

/// One parsed term with its modifiers.
#[derive(Clone, Debug, PartialEq)]
pub struct Clause {
    pub term: String,
    /// `None` searches every field.
    pub field: Option<Field>,
    pub presence: Presence,
    pub wildcard: bool,
    pub edit_distance: u8,
    pub boost: f32,
}

impl Clause {
    fn is_plain(&self) -> bool {
        self.presence == Presence::Optional && !self.wildcard && self.edit_distance == 0
    }

    fn into_typeahead(self) -> Self {
        Self {
            wildcard: true,
            boost: self.boost * TYPEAHEAD_BOOST,
            ..self
        }
    }
}

#[derive(Clone, Copy, Debug)]
struct Modifiers {
    edit_distance: u8,
    boost: f32,
}

impl Default for Modifiers {
    fn default() -> Self {
        Self {
            edit_distance: 0,
            boost: 1.0,
        }
    }
}

/// Parse `query` into clauses.
///
/// When the query does not end in whitespace and its final clause is plain, that clause is
/// repeated as a down-weighted prefix clause so a word still being typed already matches.
/// Wildcard clauses keep the typed text; every other clause is stemmed like indexed terms.
pub fn parse(query: &str) -> Vec<Clause> {
    let mut clauses = Vec::new();
    let mut trailing = None;

    for chunk in query.split_whitespace() {
        let parsed = parse_chunk(chunk);
        trailing = parsed.last().cloned();
        clauses.extend(parsed);
    }

    if !query.ends_with(char::is_whitespace) {
        if let Some(clause) = trailing.filter(Clause::is_plain) {
            clauses.push(clause.into_typeahead());
        }
    }

    for clause in clauses.iter_mut().filter(|c| !c.wildcard) {
        clause.term = text::stem(&clause.term);
    }
    clauses
}

/// A single whitespace-free chunk can still hold several terms (`ct-chest`), which share the
/// chunk's presence, field and modifiers. A trailing `*` applies to the last term only.
fn parse_chunk(chunk: &str) -> Vec<Clause> {
    let (presence, rest) = if let Some(rest) = chunk.strip_prefix('+') {
        (Presence::Required, rest)
    } else if let Some(rest) = chunk.strip_prefix('-') {
        (Presence::Prohibited, rest)
    } else {
        (Presence::Optional, chunk)
    };

    let (field, rest) = match rest.split_once(':') {
        Some((name, scoped)) => match Field::from_name(name) {
            Some(field) => (Some(field), scoped),
            None => (None, rest),
        },
        None => (None, rest),
    };

    let (rest, modifiers) = split_modifiers(rest);
    let stem = rest.trim_end_matches('*');
    let wildcard = stem.len() != rest.len();

    let raw: Vec<String> = text::terms(stem).collect();
    let last = raw.len().saturating_sub(1);

    raw.into_iter()
        .enumerate()
        .filter(|(idx, term)| (wildcard && *idx == last) || !text::is_stop_word(term))
        .map(|(idx, term)| Clause {
            term,
            field,
            presence,
            wildcard: wildcard && idx == last,
            edit_distance: modifiers.edit_distance,
            boost: modifiers.boost,
        })
        .collect()
}

/// Peel `~N` / `^N` suffixes off the end of `rest`, in any order.
fn split_modifiers(mut rest: &str) -> (&str, Modifiers) {
    let mut modifiers = Modifiers::default();

    while let Some(idx) = rest.rfind(['~', '^']) {
        let digits = &rest[idx + 1..];
        if !digits.chars().all(|c| c.is_ascii_digit()) {
            break;
        }
        let value = (!digits.is_empty()).then(|| digits.parse::<u32>().unwrap_or(u32::MAX));

        if rest[idx..].starts_with('~') {
            let distance = value.unwrap_or(1).min(u32::from(MAX_EDIT_DISTANCE));
            modifiers.edit_distance = u8::try_from(distance).unwrap_or(MAX_EDIT_DISTANCE);
        } else if let Some(boost) = value {
            modifiers.boost = boost as f32;
        }
        rest = &rest[..idx];
    }

    (rest, modifiers)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn terms(clauses: &[Clause]) -> Vec<&str> {
        clauses.iter().map(|c| c.term.as_str()).collect()
    }

    #[test]
    fn plain_words_become_optional_clauses() {
        let clauses = parse("CT chest ");
        assert_eq!(terms(&clauses), vec!["ct", "chest"]);
        assert!(clauses.iter().all(|c| c.presence == Presence::Optional));
        assert!(clauses.iter().all(|c| !c.wildcard));
    }

    #[test]
    fn open_final_word_gains_typeahead_clause() {
        let clauses = parse("ct thor");
        assert_eq!(terms(&clauses), vec!["ct", "thor", "thor"]);
        let typeahead = &clauses[2];
        assert!(typeahead.wildcard);
        assert_eq!(typeahead.boost, TYPEAHEAD_BOOST);
    }

    #[test]
    fn reads_presence_and_field() {
        let clauses = parse("+search:chest -code:71250 ");
        assert_eq!(clauses[0].presence, Presence::Required);
        assert_eq!(clauses[0].field, Some(Field::Search));
        assert_eq!(clauses[1].presence, Presence::Prohibited);
        assert_eq!(clauses[1].field, Some(Field::Code));
        assert_eq!(clauses.len(), 2);
    }

    #[test]
    fn unknown_field_is_plain_text() {
        let clauses = parse("lung:chest ");
        assert_eq!(terms(&clauses), vec!["lung", "chest"]);
        assert!(clauses.iter().all(|c| c.field.is_none()));
    }

    #[test]
    fn reads_modifiers_in_any_order() {
        let clauses = parse("thorx~1^3 lumbr^2~9 ");
        assert_eq!(clauses[0].edit_distance, 1);
        assert_eq!(clauses[0].boost, 3.0);
        assert_eq!(clauses[1].edit_distance, MAX_EDIT_DISTANCE);
        assert_eq!(clauses[1].boost, 2.0);
    }

    #[test]
    fn plain_clauses_are_stemmed_and_typeahead_keeps_typed_text() {
        let clauses = parse("chest headaches");
        assert_eq!(terms(&clauses), vec!["chest", "headach", "headaches"]);
        assert!(!clauses[1].wildcard);
        assert!(clauses[2].wildcard);

        assert_eq!(terms(&parse("lesions* ")), vec!["lesions"]);
    }

    #[test]
    fn wildcard_applies_to_last_term_and_keeps_stop_words() {
        let clauses = parse("ct-with* ");
        assert_eq!(terms(&clauses), vec!["ct", "with"]);
        assert!(!clauses[0].wildcard);
        assert!(clauses[1].wildcard);
    }

    #[test]
    fn stop_words_and_punctuation_vanish() {
        assert!(parse("").is_empty());
        assert!(parse("the of and").is_empty());
        assert!(parse("+ - ~ ^ * : ;;").is_empty());
    }

    #[test]
    fn dangling_syntax_does_not_fail() {
        assert_eq!(terms(&parse("chest~x ")), vec!["chest", "x"]);
        assert_eq!(parse("chest^ ")[0].boost, 1.0);
        assert_eq!(parse("chest~ ")[0].edit_distance, 1);
        assert_eq!(parse("chest~99999999999999999999 ")[0].edit_distance, MAX_EDIT_DISTANCE);
    }
}
