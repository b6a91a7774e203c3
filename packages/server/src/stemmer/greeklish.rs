//! Greeklish normalizer.
//!
//! Latin-spelled Greek and native Greek spellings of the same phrase must
//! index identically, so the stemmer round-trips: transliterate
//! Greeklish → Greek, reduce phonetically equivalent characters, stem the
//! Greek, transliterate back Greek → Greeklish.

use super::greek::{greek_stem, remove_accents};

// Bigram transliterations, applied before single letters so partial
// matches cannot shadow them. ΕΥ/ΑΥ absorb both the F- and V-flavoured
// Latin spellings; the vowel reduction below collapses them anyway.
const GREEKLISH_TO_GREEK_DOUBLES: &[(&str, &str)] = &[
    ("TH", "Θ"),
    ("KH", "Χ"),
    ("CH", "Χ"),
    ("PS", "Ψ"),
    ("PH", "Φ"),
    ("TZ", "ΤΖ"),
    ("TS", "ΤΣ"),
    ("KS", "Ξ"),
    ("EU", "ΕΥ"),
    ("EV", "ΕΥ"),
    ("AF", "ΑΥ"),
    ("AV", "ΑΥ"),
    ("OU", "ΟΥ"),
    ("AI", "ΑΙ"),
    ("EI", "ΕΙ"),
    ("OI", "ΟΙ"),
    ("MP", "ΜΠ"),
    ("NT", "ΝΤ"),
    ("GK", "ΓΚ"),
];

const GREEKLISH_TO_GREEK_SINGLES: &[(&str, &str)] = &[
    ("A", "Α"),
    ("B", "Β"),
    ("C", "Κ"),
    ("D", "Δ"),
    ("E", "Ε"),
    ("F", "Φ"),
    ("G", "Γ"),
    ("H", "Η"),
    ("I", "Ι"),
    ("J", "ΤΖ"),
    ("K", "Κ"),
    ("L", "Λ"),
    ("M", "Μ"),
    ("N", "Ν"),
    ("O", "Ο"),
    ("P", "Π"),
    ("Q", "Κ"),
    ("R", "Ρ"),
    ("S", "Σ"),
    ("T", "Τ"),
    ("U", "Υ"),
    ("V", "Β"),
    ("W", "Ω"),
    ("X", "Χ"),
    ("Y", "Υ"),
    ("Z", "Ζ"),
];

const GREEK_TO_GREEKLISH_DOUBLES: &[(&str, &str)] = &[
    ("Θ", "TH"),
    ("Χ", "CH"),
    ("Ψ", "PS"),
    ("Φ", "F"),
    ("ΤΖ", "J"),
    ("ΤΣ", "TS"),
    ("Ξ", "KS"),
    ("ΜΠ", "MP"),
    ("ΝΤ", "NT"),
    ("ΓΚ", "GK"),
    ("ΟΥ", "OU"),
    ("ΕΥ", "EV"),
    ("ΑΥ", "AV"),
    ("ΑΙ", "AI"),
    ("ΕΙ", "EI"),
    ("ΟΙ", "OI"),
];

const GREEK_TO_GREEKLISH_SINGLES: &[(&str, &str)] = &[
    ("Α", "A"),
    ("Β", "V"),
    ("Γ", "G"),
    ("Δ", "D"),
    ("Ε", "E"),
    ("Ζ", "Z"),
    ("Η", "I"),
    ("Ι", "I"),
    ("Κ", "K"),
    ("Λ", "L"),
    ("Μ", "M"),
    ("Ν", "N"),
    ("Ο", "O"),
    ("Π", "P"),
    ("Ρ", "R"),
    ("Σ", "S"),
    ("Τ", "T"),
    ("Υ", "Y"),
    ("Φ", "F"),
    ("Χ", "X"),
    ("Ψ", "PS"),
    ("Ω", "W"),
];

const SPECIAL_CHARACTERS: &[(&str, &str)] = &[("-", " "), ("/", " ")];

const UPPERCASE_ACCENTS: &[(char, char)] = &[
    ('Ά', 'Α'),
    ('Έ', 'Ε'),
    ('Ί', 'Ι'),
    ('Ό', 'Ο'),
    ('Ύ', 'Υ'),
    ('Ώ', 'Ω'),
    ('Ή', 'Η'),
    ('Ϊ', 'Ι'),
    ('Ϋ', 'Υ'),
];

// Phonetically equivalent characters collapse so spelling variants index
// identically. Lowercase only; the Greeklish → Greek direction runs on an
// uppercased string and must keep its letters intact for the bigram pass.
fn reduce_characters(text: &str) -> String {
    let mut text = text.to_string();
    for (from, to) in [
        ("η", "ι"),
        ("υ", "ι"),
        ("ω", "ο"),
        ("ψ", "σ"),
        ("ξ", "σ"),
        ("θ", "σ"),
        ("χ", "κ"),
        ("φ", "π"),
        ("β", "μπ"),
        ("γ", "γκ"),
        ("δ", "ντ"),
    ] {
        text = text.replace(from, to);
    }
    text
}

fn remove_all_accents(text: &str) -> String {
    let text: String = text
        .chars()
        .map(|c| {
            UPPERCASE_ACCENTS
                .iter()
                .find(|(accented, _)| *accented == c)
                .map(|(_, plain)| *plain)
                .unwrap_or(c)
        })
        .collect();
    remove_accents(&text)
}

fn remove_special_characters(text: &str) -> String {
    let mut text = text.to_string();
    for (from, to) in SPECIAL_CHARACTERS {
        text = text.replace(from, to);
    }
    text
}

fn normalize_greek(text: &str) -> String {
    let text = remove_all_accents(text);
    let text = reduce_characters(&text);
    let text = remove_special_characters(&text);
    let text = text.replace('ς', "σ");
    text.to_lowercase()
}

/// Transliterate a Greeklish phrase to normalized lowercase Greek.
/// Native Greek input passes through the same normalization untouched.
pub fn greeklish_to_greek(phrase: &str) -> String {
    let mut text = phrase.to_uppercase();

    for (latin, greek) in GREEKLISH_TO_GREEK_DOUBLES {
        text = text.replace(latin, greek);
    }
    for (latin, greek) in GREEKLISH_TO_GREEK_SINGLES {
        text = text.replace(latin, greek);
    }

    normalize_greek(&text)
}

/// Transliterate normalized Greek back to lowercase Greeklish.
pub fn greek_to_greeklish(phrase: &str) -> String {
    let mut text = normalize_greek(phrase).to_uppercase();

    for (greek, latin) in GREEK_TO_GREEKLISH_DOUBLES {
        text = text.replace(greek, latin);
    }
    for (greek, latin) in GREEK_TO_GREEKLISH_SINGLES {
        text = text.replace(greek, latin);
    }

    text.to_lowercase()
}

/// The full Greeklish pipeline. Single-letter words are noise after
/// transliteration and are dropped.
pub fn greeklish_stem(phrase: &str) -> String {
    let greek = greeklish_to_greek(phrase);
    let stemmed = greek_stem(&greek);
    let greeklish = greek_to_greeklish(&stemmed);

    greeklish
        .split_whitespace()
        .filter(|word| word.chars().count() > 1)
        .collect::<Vec<_>>()
        .join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transliteration_to_greek() {
        assert_eq!(greeklish_to_greek("oikopedo"), "οικοπεδο");
        assert_eq!(greeklish_to_greek("kalamaria"), "καλαμαρια");
    }

    #[test]
    fn test_native_greek_passes_through() {
        assert_eq!(greeklish_to_greek("καλαμαριά"), "καλαμαρια");
    }

    #[test]
    fn test_round_trip_converges() {
        // The Greek and Latin spellings of the same word meet in one form.
        assert_eq!(greeklish_stem("kalamaria"), greeklish_stem("καλαμαριά"));
        assert_eq!(greeklish_stem("oikopedo"), greeklish_stem("οικόπεδο"));
        assert_eq!(greeklish_stem("enoikiasi"), greeklish_stem("ενοικιαση"));
    }

    #[test]
    fn test_single_letter_words_dropped() {
        assert_eq!(greeklish_stem("a diamerisma"), "ntiamerism");
    }
}
