//! Resilient extraction of an article array from free-text LLM output.
//!
//! Search models are asked for strict JSON but routinely return it wrapped
//! in markdown fences, decorated with typographic quotes, or with small
//! structural defects. The pipeline here is staged so each repair can be
//! exercised on its own: fence stripping, typography normalization,
//! structural repair, a strict parse, and finally a regex fallback that
//! pulls the first bracketed span out of the original text.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, warn};

use crate::error::GenerationError;
use crate::types::CandidateArticle;
use crate::TARGET_LLM_REQUEST;

static FENCE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"```(?:json)?").expect("fence regex"));

static TRAILING_COMMA_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r",\s*([}\]])").expect("trailing comma regex"));

// Quotes a bare property name only when the colon is followed by something
// that can start a JSON value, so prose like "note: yes" inside a string
// is left alone.
static BARE_KEY_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"([{,]\s*)([A-Za-z_][A-Za-z0-9_]*)\s*:\s*(["'\[{0-9tfn-])"#)
        .expect("bare key regex")
});

static SINGLE_QUOTED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"'([^']*)'").expect("single quote regex"));

static CONCAT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#""\s*\+\s*""#).expect("concat regex"));

static ARRAY_SPAN_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)\[.*\]").expect("array span regex"));

/// Remove markdown code-fence wrappers, if present.
pub fn strip_code_fences(raw: &str) -> String {
    if raw.contains("```") {
        FENCE_RE.replace_all(raw, "").trim().to_string()
    } else {
        raw.trim().to_string()
    }
}

/// Normalize typographic artifacts to their ASCII equivalents.
pub fn normalize_typography(raw: &str) -> String {
    raw.replace(['\u{201C}', '\u{201D}', '\u{201E}'], "\"")
        .replace(['\u{2018}', '\u{2019}'], "'")
        .replace(['\u{2013}', '\u{2014}'], "-")
        .replace('\u{00A0}', " ")
        .replace('\t', " ")
        .replace("\n\n", "\n")
}

/// Structural repair: trailing commas, bare property names, single-quoted
/// values, invalid quote escapes, and string-concatenation artifacts.
pub fn repair_structure(raw: &str) -> String {
    let quoted_keys = BARE_KEY_RE.replace_all(raw, "${1}\"${2}\": ${3}");
    let double_quoted = SINGLE_QUOTED_RE.replace_all(&quoted_keys, "\"${1}\"");
    let unescaped = double_quoted.replace("\\'", "'");
    let joined = CONCAT_RE.replace_all(&unescaped, "");
    TRAILING_COMMA_RE.replace_all(&joined, "$1").to_string()
}

/// Lighter repair used on the regex-extracted fallback span, where the
/// heavier rewrites risk mangling content that parsed poorly to begin with.
fn repair_lightly(raw: &str) -> String {
    TRAILING_COMMA_RE.replace_all(raw, "$1").to_string()
}

/// Recover the article list from free-text LLM output.
///
/// Returns `Parse` when no array can be recovered from either the cleaned
/// text or the bracketed fallback span; an empty article list is only ever
/// reported through an explicit error, never disguised as success.
pub fn extract_articles(raw: &str) -> Result<Vec<CandidateArticle>, GenerationError> {
    let unfenced = strip_code_fences(raw);
    let cleaned = repair_structure(&normalize_typography(&unfenced));

    let first_err = match serde_json::from_str::<Vec<CandidateArticle>>(&cleaned) {
        Ok(articles) => {
            debug!(target: TARGET_LLM_REQUEST, "Parsed {} articles from cleaned response", articles.len());
            return Ok(articles);
        }
        Err(err) => err,
    };

    // Fallback: pull the first [...] span out of the original text and
    // retry once with the lighter repair.
    if let Some(span) = ARRAY_SPAN_RE.find(&normalize_typography(raw)) {
        let candidate = repair_lightly(span.as_str());
        match serde_json::from_str::<Vec<CandidateArticle>>(&candidate) {
            Ok(articles) => {
                warn!(
                    target: TARGET_LLM_REQUEST,
                    "Strict parse failed ({}); recovered {} articles from embedded array",
                    first_err,
                    articles.len()
                );
                return Ok(articles);
            }
            Err(second_err) => {
                return Err(GenerationError::Parse(format!(
                    "no article array recovered; strict parse: {}; fallback parse: {}",
                    first_err, second_err
                )));
            }
        }
    }

    Err(GenerationError::Parse(format!(
        "no article array found in response: {}",
        first_err
    )))
}
