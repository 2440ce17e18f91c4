//! Script helpers for Arabic headwords.

/// Seed used whenever a caller supplies no query; the upstream rejects empty ones.
pub const DEFAULT_QUERY: &str = "ا";

/// Single letters and common affixes used as randomized search seeds.
pub const SEED_TOKENS: &[&str] = &[
    "ا", "ب", "ت", "ث", "ج", "ح", "خ", "د", "ذ", "ر", "ز", "س", "ش", "ص", "ض", "ط", "ظ", "ع",
    "غ", "ف", "ق", "ك", "ل", "م", "ن", "ه", "و", "ي", "ال", "الم", "است", "مت", "ات", "ون", "ية",
    "تي", "ين", "تر", "سي", "عن", "مع", "قد", "لا", "من", "في",
];

/// Tashkeel (fathatan through sukun) and the superscript (dagger) alif.
fn is_diacritic(ch: char) -> bool {
    matches!(ch, '\u{064B}'..='\u{0652}' | '\u{0670}')
}

fn is_base_letter(ch: char) -> bool {
    matches!(ch, '\u{0621}'..='\u{064A}')
}

pub fn strip_diacritics(input: &str) -> String {
    input.chars().filter(|ch| !is_diacritic(*ch)).collect()
}

/// True when the stripped form is non-empty and made only of base Arabic letters.
pub fn is_pure_arabic_letters(input: &str) -> bool {
    let mut seen = false;
    for ch in input.chars().filter(|ch| !is_diacritic(*ch)) {
        if !is_base_letter(ch) {
            return false;
        }
        seen = true;
    }
    seen
}

/// Letter count after diacritics are removed.
pub fn bare_length(input: &str) -> usize {
    input.chars().filter(|ch| !is_diacritic(*ch)).count()
}

/// Substitutes [`DEFAULT_QUERY`] for blank queries.
pub fn query_or_default(query: Option<&str>) -> &str {
    match query.map(str::trim) {
        Some(q) if !q.is_empty() => q,
        _ => DEFAULT_QUERY,
    }
}
