//! Turns raw cells into [`ValueToken`]s.
//!
//! Text cells may carry currency symbols, percent signs, thousands separators and
//! accounting-style parentheses for negatives. A cell may also carry a restatement
//! chain: `100{105,110}` means 100 was reported first, then restated to 105 and later
//! to 110. Anything that does not parse is simply "not numeric"; nothing here fails.

use crate::schema::{format_number, Cell, ValueToken};
use regex::Regex;
use std::sync::LazyLock;

static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^-?(?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d+)?$").expect("valid number regex")
});

static RESTATEMENT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([^{}]*)((?:\{[^{}]*\})+)$").expect("valid restatement regex")
});

static BRACE_GROUP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\{([^{}]*)\}").expect("valid brace group regex"));

const CURRENCY_SYMBOLS: [char; 4] = ['$', '€', '£', '¥'];

/// Normalizes a cell into a token, or `None` when the cell is not numeric.
pub fn normalize_cell(cell: &Cell) -> Option<ValueToken> {
    match cell {
        Cell::Empty => None,
        Cell::Numeric(v) if v.is_finite() => Some(ValueToken::new(*v)),
        Cell::Numeric(_) => None,
        Cell::Text(text) => normalize_text(text),
    }
}

pub fn is_numeric(cell: &Cell) -> bool {
    normalize_cell(cell).is_some()
}

/// A cell that can start a metric block: it contains a letter and is not a number.
pub fn is_label_cell(cell: &Cell) -> bool {
    cell.has_alphabetic() && !is_numeric(cell)
}

pub fn normalize_text(text: &str) -> Option<ValueToken> {
    let cleaned = clean_whitespace(text);
    if cleaned.is_empty() {
        return None;
    }

    if !cleaned.contains('{') && !cleaned.contains('}') {
        return parse_plain_number(&cleaned).map(ValueToken::new);
    }

    let caps = RESTATEMENT_RE.captures(&cleaned)?;
    let base = parse_plain_number(caps.get(1)?.as_str())?;
    let groups = caps.get(2)?.as_str();

    // Only the last brace group carries the chain; earlier groups are superseded.
    let last_group = BRACE_GROUP_RE
        .captures_iter(groups)
        .last()
        .and_then(|c| c.get(1))?
        .as_str();

    let mut chain = vec![base];
    for member in last_group.split(',') {
        chain.push(parse_plain_number(member)?);
    }

    ValueToken::from_chain(chain)
}

/// Parses one formatted figure such as `$1,234.50`, `(1,234)`, `12.5%` or `-7`.
pub fn parse_plain_number(text: &str) -> Option<f64> {
    let stripped: String = clean_whitespace(text)
        .chars()
        .filter(|c| !CURRENCY_SYMBOLS.contains(c) && *c != '%' && !c.is_whitespace())
        .map(|c| if c == '\u{2212}' { '-' } else { c })
        .collect();

    let (negative, body) = match stripped
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
    {
        Some(inner) if !inner.starts_with('-') => (true, inner),
        Some(_) => return None,
        None => (false, stripped.as_str()),
    };

    if !NUMBER_RE.is_match(body) {
        return None;
    }

    let value: f64 = body.replace(',', "").parse().ok()?;
    if !value.is_finite() {
        return None;
    }
    Some(if negative { -value } else { value })
}

/// Prints a token back in the cell syntax the normalizer accepts.
pub fn render_token(token: &ValueToken) -> String {
    if token.restatements.is_empty() {
        return format_number(token.base);
    }
    let revisions: Vec<String> = token
        .restatements
        .iter()
        .map(|v| format_number(*v))
        .collect();
    format!("{}{{{}}}", format_number(token.base), revisions.join(","))
}

fn clean_whitespace(text: &str) -> String {
    text.replace('\u{a0}', " ").trim().to_string()
}
