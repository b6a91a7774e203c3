use super::{remove_tokens, strip_suffix};

const WORDS_TO_REMOVE: &[&str] = &[
    "ειμαι", "εισαι", "ειναι", "ειμαστε", "ειστε", "σε", "για", "στην", "στον", "απο", "εως",
];

// Ordered, first match wins.
const SUFFIXES: &[&str] = &[
    "ωντας", "οντας", "ιωντας", "ουσας", "ουσα", "ουμε", "ουνε", "ουνται", "εσαι", "εστε",
    "εται", "ουν", "ετε", "εις", "ει", "ειτε", "ιες", "ιων", "ος", "ου", "ων", "ους", "ες",
    "α", "η", "ης", "ον", "ι", "του",
];

const ACCENTS: &[(char, char)] = &[
    ('ά', 'α'),
    ('έ', 'ε'),
    ('ί', 'ι'),
    ('ό', 'ο'),
    ('ύ', 'υ'),
    ('ώ', 'ω'),
    ('ή', 'η'),
    ('ϊ', 'ι'),
    ('ϋ', 'υ'),
    ('ΐ', 'ι'),
    ('ΰ', 'υ'),
];

pub(crate) fn remove_accents(text: &str) -> String {
    text.chars()
        .map(|c| {
            ACCENTS
                .iter()
                .find(|(accented, _)| *accented == c)
                .map(|(_, plain)| *plain)
                .unwrap_or(c)
        })
        .collect()
}

/// Greek normalizer: lowercase, strip accents, punctuation and stopwords,
/// suffix-strip each word.
pub fn greek_stem(phrase: &str) -> String {
    let phrase = remove_accents(&phrase.to_lowercase());
    let phrase = remove_tokens(&phrase);

    phrase
        .split_whitespace()
        .filter(|word| !WORDS_TO_REMOVE.contains(word))
        .map(|word| strip_suffix(word, SUFFIXES))
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_accent_removal() {
        assert_eq!(remove_accents("καλαμαριά"), "καλαμαρια");
        assert_eq!(remove_accents("διαμέρισμα"), "διαμερισμα");
    }

    #[test]
    fn test_suffix_stripping() {
        assert_eq!(greek_stem("καλαμαριά"), "καλαμαρι");
        assert_eq!(greek_stem("αμοχωστος"), "αμοχωστ");
        assert_eq!(greek_stem("ενοικίαση"), "ενοικιασ");
    }

    #[test]
    fn test_stopwords() {
        assert_eq!(greek_stem("για ενοικίαση στον δήμο"), "ενοικιασ δημο");
    }
}
