// src/utils/text.rs

//! Text normalization helpers.

/// Words kept lowercase by [`title_case`] unless they open the name.
///
/// Mixes English and French articles/particles because vendor names do.
const SMALL_WORDS: &[&str] = &[
    "a", "an", "and", "as", "at", "but", "by", "en", "for", "if", "in", "of", "on", "or", "the",
    "to", "via", "vs", "un", "une", "de", "des", "du", "d", "le", "la", "les", "l", "au", "aux",
    "à", "s", "et",
];

/// Collapse runs of whitespace into single spaces and trim.
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Title-case a display name, keeping small words lowercase.
///
/// Elided articles keep French typography: `l'opéra` becomes `l'Opéra`,
/// not `L'opéra`, except at the start of the name.
pub fn title_case(input: &str) -> String {
    let words: Vec<String> = normalize_whitespace(input)
        .split(' ')
        .enumerate()
        .map(|(i, word)| title_case_word(word, i == 0))
        .collect();
    words.join(" ")
}

fn title_case_word(word: &str, first: bool) -> String {
    let lower = word.to_lowercase();

    // Elided article: "d'été", "l'opéra"
    if let Some((article, rest)) = lower.split_once('\'') {
        if SMALL_WORDS.contains(&article) && !rest.is_empty() {
            let rest = capitalize(rest);
            return if first {
                format!("{}'{rest}", capitalize(article))
            } else {
                format!("{article}'{rest}")
            };
        }
    }

    if !first && SMALL_WORDS.contains(&lower.as_str()) {
        return lower;
    }

    // Hyphenated names capitalize every part: "pu-erh" -> "Pu-Erh"
    lower
        .split('-')
        .map(capitalize)
        .collect::<Vec<_>>()
        .join("-")
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
