//! A best-effort parser that turns one speech transcript into a candidate
//! transaction.
//!
//! The transcript may mix Telugu and English and may use spoken number words
//! instead of digits ("ఐదు వందలు", "five hundred"). Parsing is a layered
//! heuristic over fixed, hand-maintained substitution tables: spoken numbers
//! are rewritten to digit strings, Telugu vocabulary is rewritten to English,
//! and the customer name, amount, type and description are then extracted
//! with simple token and keyword rules. There is no tokenizer or grammar.
//!
//! Substitution is literal and longest-match-first, so a table key that
//! appears inside an unrelated word (or inside a customer's name) will still
//! be rewritten. That is a known limitation of this approach; the ordering is
//! the only guard.
//!
//! The parser is pure and deterministic. An utterance it cannot use yields
//! `None`, which is a normal negative outcome rather than an error.

use std::sync::OnceLock;

use serde::Serialize;
use unicode_segmentation::UnicodeSegmentation;

use crate::transaction::TransactionType;

/// A candidate transaction extracted from one utterance.
///
/// Produced by [parse_utterance] only when the validity gate passes: a
/// non-empty customer name and a positive amount.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParsedTransaction {
    /// The customer name guessed from the leading tokens of the utterance.
    pub customer_name: String,
    /// The first numeral found after number-word normalization.
    pub amount: f64,
    /// Debt unless a payment keyword was spotted.
    pub transaction_type: TransactionType,
    /// A short description inferred from item keywords.
    pub description: String,
    /// The utterance after number normalization and keyword translation.
    ///
    /// Purely informational; the UI shows it so the speaker can check what
    /// the parser worked with.
    pub translated_text: String,
}

// ============================================================================
// SUBSTITUTION TABLES
// ============================================================================

/// Spoken number words and their digit-string replacements, both languages.
///
/// Compounds must rewrite as a whole ("five hundred" is 500, not "5 100"),
/// which the longest-match-first ordering guarantees.
static NUMBER_WORDS: &[(&str, &str)] = &[
    // Hundred and thousand compounds.
    ("one hundred", "100"),
    ("two hundred", "200"),
    ("three hundred", "300"),
    ("four hundred", "400"),
    ("five hundred", "500"),
    ("six hundred", "600"),
    ("seven hundred", "700"),
    ("eight hundred", "800"),
    ("nine hundred", "900"),
    ("one thousand", "1000"),
    ("two thousand", "2000"),
    ("five thousand", "5000"),
    ("రెండు వందలు", "200"),
    ("మూడు వందలు", "300"),
    ("నాలుగు వందలు", "400"),
    ("ఐదు వందలు", "500"),
    ("ఆరు వందలు", "600"),
    ("ఏడు వందలు", "700"),
    ("ఎనిమిది వందలు", "800"),
    ("తొమ్మిది వందలు", "900"),
    ("రెండు వేలు", "2000"),
    ("మూడు వేలు", "3000"),
    ("ఐదు వేలు", "5000"),
    // Teens.
    ("eleven", "11"),
    ("twelve", "12"),
    ("thirteen", "13"),
    ("fourteen", "14"),
    ("fifteen", "15"),
    ("sixteen", "16"),
    ("seventeen", "17"),
    ("eighteen", "18"),
    ("nineteen", "19"),
    ("పదకొండు", "11"),
    ("పన్నెండు", "12"),
    ("పదమూడు", "13"),
    ("పద్నాలుగు", "14"),
    ("పదిహేను", "15"),
    ("పదహారు", "16"),
    ("పదిహేడు", "17"),
    ("పద్దెనిమిది", "18"),
    ("పంతొమ్మిది", "19"),
    // Tens.
    ("twenty", "20"),
    ("thirty", "30"),
    ("forty", "40"),
    ("fifty", "50"),
    ("sixty", "60"),
    ("seventy", "70"),
    ("eighty", "80"),
    ("ninety", "90"),
    ("ఇరవై", "20"),
    ("ముప్పై", "30"),
    ("నలభై", "40"),
    ("యాభై", "50"),
    ("అరవై", "60"),
    ("డెబ్బై", "70"),
    ("ఎనభై", "80"),
    ("తొంభై", "90"),
    // Hundreds and thousands on their own.
    ("hundred", "100"),
    ("thousand", "1000"),
    ("వందలు", "100"),
    ("వంద", "100"),
    ("వెయ్యి", "1000"),
    ("వేలు", "1000"),
    // Units and ten.
    ("one", "1"),
    ("two", "2"),
    ("three", "3"),
    ("four", "4"),
    ("five", "5"),
    ("six", "6"),
    ("seven", "7"),
    ("eight", "8"),
    ("nine", "9"),
    ("ten", "10"),
    ("ఒకటి", "1"),
    ("రెండు", "2"),
    ("మూడు", "3"),
    ("నాలుగు", "4"),
    ("ఐదు", "5"),
    ("ఆరు", "6"),
    ("ఏడు", "7"),
    ("ఎనిమిది", "8"),
    ("తొమ్మిది", "9"),
    ("పది", "10"),
];

/// The Telugu vocabulary the shop domain uses, with English replacements.
///
/// This pass only feeds the translated transcript shown back to the speaker;
/// type and amount are decided on the original and number-normalized text.
static KEYWORD_TRANSLATIONS: &[(&str, &str)] = &[
    // Names (common Telugu names).
    ("రాము", "Ram"),
    ("సీత", "Sita"),
    ("కృష్ణ", "Krishna"),
    ("ప్రియ", "Priya"),
    ("రాజు", "Raju"),
    ("లక్ష్మి", "Lakshmi"),
    ("వెంకట్", "Venkat"),
    ("అనిల్", "Anil"),
    // Currency.
    ("రూపాయలు", "rupees"),
    ("రూపాయల", "rupees"),
    ("టకా", "rupees"),
    // Debt verbs.
    ("అప్పు", "owes"),
    ("కొన్నాడు", "bought"),
    ("కొన్నది", "bought"),
    ("తీసుకున్నాడు", "took"),
    ("తీసుకున్నది", "took"),
    ("బాకీ", "debt"),
    ("రావాల్సింది", "owes"),
    // Payment verbs.
    ("చెల్లించాడు", "paid"),
    ("చెల్లించింది", "paid"),
    ("డబ్బు ఇచ్చాడు", "gave money"),
    ("డబ్బు ఇచ్చింది", "gave money"),
    ("చెల్లింపు", "payment"),
    ("వచ్చింది", "received"),
    ("తిరిగి ఇచ్చాడు", "returned money"),
    // Items and particles.
    ("కిరాణా", "groceries"),
    ("వస్తువులు", "items"),
    ("కోసం", "for"),
    ("నుండి", "from"),
    ("కి", "to"),
];

/// Keywords that mark an utterance as a payment. Payment wins when keywords
/// of both directions appear; an utterance matching neither records a debt,
/// so debt keywords only matter for name extraction (see
/// [TRANSACTION_VERBS]).
static PAYMENT_KEYWORDS: &[&str] = &[
    "చెల్లించాడు",
    "చెల్లించింది",
    "వచ్చింది",
    "paid",
    "payment",
    "received",
];

/// Tokens that read as currency words rather than part of a name.
static CURRENCY_WORDS: &[&str] = &["rupees", "rupee", "రూపాయలు", "రూపాయల", "టకా"];

/// Particle tokens that never belong to a name.
static PARTICLES: &[&str] = &["కి", "కోసం", "నుండి", "to", "for", "from"];

/// Verb-like tokens that end the name portion of an utterance.
static TRANSACTION_VERBS: &[&str] = &[
    "bought",
    "paid",
    "owes",
    "took",
    "gave",
    "received",
    "returned",
    "payment",
    "debt",
    "కొన్నాడు",
    "కొన్నది",
    "తీసుకున్నాడు",
    "తీసుకున్నది",
    "చెల్లించాడు",
    "చెల్లించింది",
    "చెల్లింపు",
    "వచ్చింది",
    "అప్పు",
    "బాకీ",
    "రావాల్సింది",
];

// ============================================================================
// PARSING
// ============================================================================

/// Parse one finalized transcript into a candidate transaction.
///
/// Returns `None` when no customer name or no positive amount could be
/// extracted; callers must not record a transaction in that case.
pub fn parse_utterance(text: &str) -> Option<ParsedTransaction> {
    let normalized = normalize_number_words(text);
    let translated_text = translate_keywords(&normalized);

    let customer_name = extract_name(text);
    let amount = extract_amount(&normalized);
    let transaction_type = classify_type(text);
    let description = infer_description(text, transaction_type);

    if customer_name.is_empty() || !(amount > 0.0) {
        return None;
    }

    Some(ParsedTransaction {
        customer_name,
        amount,
        transaction_type,
        description,
        translated_text,
    })
}

/// Replace spoken number words with digit strings.
///
/// Longest-match-first literal substitution; unrecognized words pass through
/// unchanged. Latin-script words match regardless of ASCII case.
pub fn normalize_number_words(text: &str) -> String {
    static SORTED: OnceLock<Vec<(&str, &str)>> = OnceLock::new();
    let table = SORTED.get_or_init(|| sorted_longest_first(NUMBER_WORDS));
    substitute(text, table)
}

/// Replace the fixed Telugu vocabulary with its English equivalents.
///
/// Uses the same substitution mechanism as the number pass.
pub fn translate_keywords(text: &str) -> String {
    static SORTED: OnceLock<Vec<(&str, &str)>> = OnceLock::new();
    let table = SORTED.get_or_init(|| sorted_longest_first(KEYWORD_TRANSLATIONS));
    substitute(text, table)
}

fn sorted_longest_first(
    table: &'static [(&'static str, &'static str)],
) -> Vec<(&'static str, &'static str)> {
    let mut sorted = table.to_vec();
    sorted.sort_by(|left, right| right.0.len().cmp(&left.0.len()));
    sorted
}

fn substitute(text: &str, table: &[(&str, &str)]) -> String {
    let mut result = text.to_string();
    for (needle, replacement) in table {
        result = replace_ignore_ascii_case(&result, needle, replacement);
    }
    result
}

/// Replace every occurrence of `needle`, ignoring ASCII letter case.
///
/// Case folding is restricted to ASCII so that byte offsets into the lowered
/// copy remain valid for the original string.
fn replace_ignore_ascii_case(haystack: &str, needle: &str, replacement: &str) -> String {
    let lowered_haystack: String = haystack
        .chars()
        .map(|character| character.to_ascii_lowercase())
        .collect();
    let lowered_needle: String = needle
        .chars()
        .map(|character| character.to_ascii_lowercase())
        .collect();

    let mut result = String::with_capacity(haystack.len());
    let mut position = 0;

    while let Some(found) = lowered_haystack[position..].find(&lowered_needle) {
        let start = position + found;
        result.push_str(&haystack[position..start]);
        result.push_str(replacement);
        position = start + needle.len();
    }

    result.push_str(&haystack[position..]);
    result
}

/// Guess the customer name from the leading tokens of the original text.
///
/// Looks at the first three whitespace tokens: stops early at a transaction
/// verb, skips numerals, currency words and particles, and keeps at most two
/// tokens. The first grapheme of the result is uppercased.
fn extract_name(text: &str) -> String {
    let mut kept: Vec<&str> = Vec::new();

    for token in text.split_whitespace().take(3) {
        if is_transaction_verb(token) {
            break;
        }
        if is_numeric_token(token) || is_currency_word(token) || is_particle(token) {
            continue;
        }

        kept.push(token);
        if kept.len() == 2 {
            break;
        }
    }

    capitalize_first(&kept.join(" "))
}

/// Extract the first integer-or-decimal numeral (up to two fraction digits).
///
/// Returns 0 when the text contains no numeral.
fn extract_amount(text: &str) -> f64 {
    let bytes = text.as_bytes();
    let mut index = 0;

    while index < bytes.len() {
        if bytes[index].is_ascii_digit() {
            let start = index;
            while index < bytes.len() && bytes[index].is_ascii_digit() {
                index += 1;
            }

            let mut end = index;
            if index < bytes.len() && bytes[index] == b'.' {
                let mut fraction_end = index + 1;
                while fraction_end < bytes.len()
                    && bytes[fraction_end].is_ascii_digit()
                    && fraction_end - index <= 2
                {
                    fraction_end += 1;
                }
                if fraction_end > index + 1 {
                    end = fraction_end;
                }
            }

            return text[start..end].parse().unwrap_or(0.0);
        }
        index += 1;
    }

    0.0
}

/// Decide the transaction type from the original text.
///
/// Payment keywords take precedence; anything else, including an utterance
/// with no direction keyword at all, records a debt.
fn classify_type(text: &str) -> TransactionType {
    if contains_any_keyword(text, PAYMENT_KEYWORDS) {
        TransactionType::Payment
    } else {
        TransactionType::Debt
    }
}

/// Infer a short description from item keywords, falling back to a generic
/// label for the classified type.
fn infer_description(text: &str, transaction_type: TransactionType) -> String {
    let description = if contains_any_keyword(text, &["కిరాణా", "groceries"]) {
        "Groceries"
    } else if contains_any_keyword(text, &["వస్తువులు", "items"]) {
        "Items purchased"
    } else if transaction_type == TransactionType::Payment {
        "Payment received"
    } else {
        "Purchase"
    };

    description.to_string()
}

/// Match any of `keywords` as a substring; ASCII keywords match
/// case-insensitively, non-Latin keywords exactly.
fn contains_any_keyword(text: &str, keywords: &[&str]) -> bool {
    let lowered: String = text
        .chars()
        .map(|character| character.to_ascii_lowercase())
        .collect();

    keywords.iter().any(|keyword| {
        if keyword.is_ascii() {
            lowered.contains(keyword)
        } else {
            text.contains(keyword)
        }
    })
}

fn is_transaction_verb(token: &str) -> bool {
    TRANSACTION_VERBS
        .iter()
        .any(|verb| token_matches(token, verb))
}

fn is_currency_word(token: &str) -> bool {
    CURRENCY_WORDS
        .iter()
        .any(|word| token_matches(token, word))
}

fn is_particle(token: &str) -> bool {
    PARTICLES.iter().any(|word| token_matches(token, word))
}

fn token_matches(token: &str, word: &str) -> bool {
    if word.is_ascii() {
        token.eq_ignore_ascii_case(word)
    } else {
        token == word
    }
}

fn is_numeric_token(token: &str) -> bool {
    token.chars().any(|character| character.is_ascii_digit())
        && token
            .chars()
            .all(|character| character.is_ascii_digit() || character == '.')
}

fn capitalize_first(name: &str) -> String {
    let mut graphemes = name.graphemes(true);

    match graphemes.next() {
        Some(first) => first.to_uppercase() + graphemes.as_str(),
        None => String::new(),
    }
}

// ============================================================================
// TESTS
// ============================================================================


#[cfg(test)]
mod keyword_translation_tests {
    use super::translate_keywords;

    #[test]
    fn telugu_vocabulary_is_translated() {
        let translated = translate_keywords("రాము 500 రూపాయలు కిరాణా కొన్నాడు");

        assert_eq!(translated, "Ram 500 rupees groceries bought");
    }

    #[test]
    fn longer_currency_form_wins_over_its_prefix() {
        // రూపాయలు contains రూపాయల; the longer key must match first.
        assert_eq!(translate_keywords("రూపాయలు"), "rupees");
    }

    #[test]
    fn english_text_is_unchanged() {
        assert_eq!(
            translate_keywords("Sita 200 rupees paid"),
            "Sita 200 rupees paid"
        );
    }
}
