//! Text normalization for extracted transcripts.
//!
//! `clean(clean(x)) == clean(x)` for every input.

use regex::Regex;
use std::sync::LazyLock;

/// Site chrome that leaks into extracted text. Matched case-insensitively.
const BOILERPLATE: &[&str] = &[
    r"JavaScript.*?włącz\w*",
    r"Cookie.*?polityk\w*",
    r"Mapa strony",
    r"Menu główne",
    r"Nawigacja",
    r"Przejdź do",
    r"Skip to",
    r"Strona\s+\d+\s+z\s+\d+",
    r"www\.sejm\.gov\.pl",
    r"©\s*Kancelaria\s+Sejmu",
];

static BOILERPLATE_RE: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    BOILERPLATE.iter().map(|p| Regex::new(&format!("(?i){p}")).expect("invalid boilerplate pattern")).collect()
});

static INLINE_SPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^\S\n]+").expect("invalid regex"));
static SPACE_AROUND_NEWLINE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r" ?\n ?").expect("invalid regex"));
static BLANK_LINES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\n{3,}").expect("invalid regex"));

fn normalize_chars(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '\u{00a0}' => out.push(' '),
            '\u{2013}' => out.push('-'),
            '\u{2014}' => out.push_str("--"),
            '\u{201c}' | '\u{201d}' | '\u{201e}' => out.push('"'),
            '\u{2018}' | '\u{2019}' => out.push('\''),
            other => out.push(other),
        }
    }
    out
}

/// Runs of spaces and tabs become one space, line breaks are kept, and more than
/// one blank line in a row collapses to a single blank line.
fn collapse_whitespace(text: &str) -> String {
    let text = INLINE_SPACE.replace_all(text, " ");
    let text = SPACE_AROUND_NEWLINE.replace_all(&text, "\n");
    BLANK_LINES.replace_all(&text, "\n\n").into_owned()
}

fn remove_boilerplate(text: &str) -> String {
    BOILERPLATE_RE.iter().fold(text.to_string(), |acc, re| re.replace_all(&acc, "").into_owned())
}

/// Normalize extracted text.
///
/// Removing one pattern can join text into another match, so removal and
/// whitespace collapsing repeat until nothing changes.
pub fn clean(text: &str) -> String {
    let mut current = normalize_chars(text);
    loop {
        let next = collapse_whitespace(&remove_boilerplate(&current));
        if next == current {
            break;
        }
        current = next;
    }
    current.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_boilerplate_pattern_compiles() {
        assert_eq!(BOILERPLATE_RE.len(), BOILERPLATE.len());
    }

    #[test]
    fn test_collapses_whitespace() {
        assert_eq!(clean("  Pan   Marszałek\t\tpowiedział  "), "Pan Marszałek powiedział");
    }

    #[test]
    fn test_keeps_paragraphs() {
        assert_eq!(clean("Akapit pierwszy.\n\n\n\n  Akapit drugi."), "Akapit pierwszy.\n\nAkapit drugi.");
        assert_eq!(clean("linia 1 \n linia 2"), "linia 1\nlinia 2");
    }

    #[test]
    fn test_removes_boilerplate() {
        let raw = "Mapa strony Menu główne Posiedzenie Sejmu Strona 3 z 120 www.sejm.gov.pl © Kancelaria Sejmu";
        assert_eq!(clean(raw), "Posiedzenie Sejmu");
    }

    #[test]
    fn test_boilerplate_case_insensitive() {
        assert_eq!(clean("SKIP TO content Obrady"), "content Obrady");
        assert_eq!(clean("Przejdź do treści"), "treści");
    }

    #[test]
    fn test_javascript_and_cookie_notices() {
        let raw = "Aby korzystać, JavaScript musi być włączony. Cookie: zapoznaj się z polityką prywatności. Obrady.";
        assert_eq!(clean(raw), "Aby korzystać, . prywatności. Obrady.");
    }

    #[test]
    fn test_normalizes_characters() {
        assert_eq!(clean("a\u{00a0}b \u{2013} c \u{2014} \u{201e}d\u{201d} \u{2019}e\u{2018}"), "a b - c -- \"d\" 'e'");
    }

    #[test]
    fn test_idempotent() {
        let samples = [
            "Mapa  strony tekst",
            "Nawi Nawigacjagacja posiedzenie",
            "  \n\n\n a \u{00a0}\u{00a0} b \n\n\n\n c  ",
            "Strona 1 z 2Strona 3 z 4 koniec",
            "",
        ];
        for sample in samples {
            let once = clean(sample);
            assert_eq!(clean(&once), once, "not idempotent for {sample:?}");
        }
    }

    #[test]
    fn test_removal_exposes_new_match() {
        assert_eq!(clean("NawiNawigacjagacja posiedzenie"), "posiedzenie");
        assert_eq!(clean("Mapa Nawigacja strony sejm"), "sejm");
    }
}
