use super::{remove_tokens, strip_suffix};

const SUFFIXES: &[&str] = &["ing", "ly", "ious", "ies", "ive", "es", "s", "ment"];

const WORDS_TO_REMOVE: &[&str] = &[
    "is", "are", "was", "were", "be", "been", "being", "have", "has", "had", "do", "does", "did",
    "shall", "will", "should", "would", "may", "might", "must", "can", "could", "to", "a",
];

/// English normalizer: lowercase, strip punctuation and auxiliaries,
/// suffix-strip each word.
pub fn english_stem(phrase: &str) -> String {
    let phrase = remove_tokens(&phrase.to_lowercase());

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
    fn test_stopwords_and_suffixes() {
        assert_eq!(english_stem("this is a great day"), "thi great day");
    }

    #[test]
    fn test_punctuation_removed() {
        assert_eq!(english_stem("great, day!"), "great day");
    }

    #[test]
    fn test_suffix_priority() {
        // "ing" is checked before "s"
        assert_eq!(english_stem("renting"), "rent");
        assert_eq!(english_stem("apartments"), "apartment");
    }
}
