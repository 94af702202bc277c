//! Display normalisation and the token pipeline.
//!
//! The same pipeline runs at index time and at query time, so a query term and an indexed term
//! compare equal exactly when their pipeline outputs do: lower-case, split on any
//! non-alphanumeric character, drop stop words, then reduce each word to its English stem.

use rust_stemmers::{Algorithm, Stemmer};

/// Acronyms appended after their long-form modality names.
const SYNONYMS: &[(&str, &str)] = &[
    ("Computed tomography", "CT"),
    ("Magnetic resonance", "MRI"),
];

/// English stop words dropped from both documents and queries.
const STOP_WORDS: &[&str] = &[
    "a", "able", "about", "across", "after", "all", "almost", "also", "am", "among", "an", "and",
    "any", "are", "as", "at", "be", "because", "been", "but", "by", "can", "cannot", "could",
    "dear", "did", "do", "does", "either", "else", "ever", "every", "for", "from", "get", "got",
    "had", "has", "have", "he", "her", "hers", "him", "his", "how", "however", "i", "if", "in",
    "into", "is", "it", "its", "just", "least", "let", "like", "likely", "may", "me", "might",
    "most", "must", "my", "neither", "no", "nor", "not", "of", "off", "often", "on", "only", "or",
    "other", "our", "own", "rather", "said", "say", "says", "she", "should", "since", "so",
    "some", "than", "that", "the", "their", "them", "then", "there", "these", "they", "this",
    "tis", "to", "too", "twas", "us", "wants", "was", "we", "were", "what", "when", "where",
    "which", "while", "who", "whom", "why", "will", "with", "would", "yet", "you", "your",
];

/// Derive the search text of a display string.
///
/// Parenthesised remarks are removed (`"CT chest (without contrast)"` becomes `"CT chest"`),
/// modality names gain their acronym (`"Computed tomography"` becomes
/// `"Computed tomography CT"`), and whitespace is collapsed. Applying this to its own output
/// returns the output unchanged.
pub fn normalise_display(display: &str) -> String {
    let mut text = collapse_whitespace(&strip_remarks(display));
    for (long_form, acronym) in SYNONYMS {
        text = append_acronym(&text, long_form, acronym);
    }
    collapse_whitespace(&text)
}

/// Split `text` into index terms: stemmed, lower-cased alphanumeric runs, minus stop words.
pub fn tokens(text: &str) -> Vec<String> {
    let stemmer = Stemmer::create(Algorithm::English);
    terms(text)
        .filter(|term| !is_stop_word(term))
        .map(|term| stemmer.stem(&term).into_owned())
        .collect()
}

/// English stem of a single lower-cased term.
pub fn stem(term: &str) -> String {
    Stemmer::create(Algorithm::English).stem(term).into_owned()
}

/// Lower-cased alphanumeric runs of `text`, stop words included.
pub fn terms(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|raw| !raw.is_empty())
        .map(str::to_lowercase)
}

pub fn is_stop_word(term: &str) -> bool {
    STOP_WORDS.binary_search(&term).is_ok()
}

/// Remove every balanced `( ... )` group, including nested ones.
///
/// An opening parenthesis with no matching close is kept as literal text.
fn strip_remarks(text: &str) -> String {
    let chars: Vec<char> = text.chars().collect();
    let mut out = String::with_capacity(text.len());
    let mut i = 0;

    while i < chars.len() {
        if chars[i] == '(' {
            if let Some(close) = matching_close(&chars, i) {
                out.push(' ');
                i = close + 1;
                continue;
            }
        }
        out.push(chars[i]);
        i += 1;
    }

    out
}

fn matching_close(chars: &[char], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (offset, &c) in chars[open..].iter().enumerate() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth == 0 {
                    return Some(open + offset);
                }
            }
            _ => {}
        }
    }
    None
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Insert ` {acronym}` after the first whole-word `long_form`, unless the acronym already
/// follows it.
fn append_acronym(text: &str, long_form: &str, acronym: &str) -> String {
    let Some(end) = text
        .match_indices(long_form)
        .filter(|&(start, _)| !text[..start].ends_with(char::is_alphanumeric))
        .map(|(start, _)| start + long_form.len())
        .find(|&end| !text[end..].starts_with(char::is_alphanumeric))
    else {
        return text.to_owned();
    };
    let rest = &text[end..];

    let already_expanded = rest
        .trim_start()
        .strip_prefix(acronym)
        .is_some_and(|after| !after.starts_with(char::is_alphanumeric));
    if already_expanded {
        return text.to_owned();
    }

    format!("{} {acronym}{rest}", &text[..end])
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn stop_word_table_is_sorted() {
        assert!(STOP_WORDS.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn strips_parenthesised_remark() {
        assert_eq!(normalise_display("CT chest (without contrast)"), "CT chest");
        assert_eq!(normalise_display("Low back pain (finding)"), "Low back pain");
    }

    #[test]
    fn expands_modality_acronyms() {
        assert_eq!(
            normalise_display("Computed tomography, lumbar spine; without contrast material"),
            "Computed tomography CT, lumbar spine; without contrast material"
        );
        assert_eq!(
            normalise_display("Magnetic resonance (eg, proton) imaging, brain"),
            "Magnetic resonance MRI imaging, brain"
        );
    }

    #[test]
    fn expansion_is_not_repeated() {
        let once = normalise_display("Computed tomography, thorax");
        assert_eq!(normalise_display(&once), once);
        assert_eq!(
            normalise_display("Magnetic resonance MRIs"),
            "Magnetic resonance MRI MRIs"
        );
        assert_eq!(
            normalise_display("Computed tomographyX"),
            "Computed tomographyX"
        );
        assert_eq!(
            normalise_display("XComputed tomography"),
            "XComputed tomography"
        );
        assert_eq!(
            normalise_display("head, Computed tomography"),
            "head, Computed tomography CT"
        );
    }

    #[test]
    fn keeps_unbalanced_parenthesis() {
        assert_eq!(normalise_display("pain (left"), "pain (left");
        assert_eq!(normalise_display("a ((b) c"), "a ( c");
    }

    #[test]
    fn tokens_lowercase_and_drop_stop_words() {
        assert_eq!(
            tokens("CT, head or brain; with contrast"),
            vec!["ct", "head", "brain", "contrast"]
        );
        assert_eq!(tokens("CT-chest"), vec!["ct", "chest"]);
        assert!(tokens("  ;; ").is_empty());
    }

    #[test]
    fn tokens_split_dotted_codes() {
        assert_eq!(tokens("M54.5"), vec!["m54", "5"]);
    }

    #[test]
    fn inflected_forms_share_a_stem() {
        assert_eq!(tokens("Headaches"), tokens("headache"));
        assert_eq!(tokens("lesions"), tokens("lesion"));
        assert_eq!(tokens("imaging"), tokens("images"));
        assert_eq!(stem("headaches"), tokens("headache")[0]);
    }

    proptest! {
        #[test]
        fn normalisation_is_idempotent(display in "\\PC{0,60}") {
            let once = normalise_display(&display);
            prop_assert_eq!(normalise_display(&once), once);
        }

        #[test]
        fn normalisation_is_idempotent_on_clinical_shapes(
            head in "(Computed tomography|Magnetic resonance|CT|MRI)?",
            body in "[a-z ,;()]{0,40}",
        ) {
            let display = format!("{head}{body}");
            let once = normalise_display(&display);
            prop_assert_eq!(normalise_display(&once), once);
        }
    }
}
