use std::borrow::Cow;

use crate::value::CellValue;

/// Canonical form of a raw cell: its string representation, trimmed and
/// lowercased. Never fails; values with no textual form become `""`.
pub fn normalize(raw: &CellValue) -> String {
    match raw {
        CellValue::Text(text) => normalize_str(text).into_owned(),
        other => normalize_str(&other.to_text()).into_owned(),
    }
}

/// String flavour of [`normalize`], borrowing the input when it is already canonical.
pub fn normalize_str(input: &str) -> Cow<'_, str> {
    lowercase(trim(input))
}

/// Returns a lowercase representation, reusing the original string if already lowercase.
pub fn lowercase(input: &str) -> Cow<'_, str> {
    if input.chars().all(|ch| ch.to_lowercase().eq([ch])) {
        Cow::Borrowed(input)
    } else {
        Cow::Owned(input.to_lowercase())
    }
}

/// Trims leading/trailing whitespace and line terminators. A byte-order mark
/// counts as whitespace; NEL (U+0085) does not.
pub fn trim(input: &str) -> &str {
    input.trim_matches(is_trimmed)
}

/// Space separators (`Zs`), the ASCII control whitespace, the line and
/// paragraph separators and the byte-order mark.
fn is_trimmed(ch: char) -> bool {
    matches!(
        ch,
        '\t' | '\n'
            | '\u{b}'
            | '\u{c}'
            | '\r'
            | ' '
            | '\u{a0}'
            | '\u{1680}'
            | '\u{2000}'..='\u{200a}'
            | '\u{2028}'
            | '\u{2029}'
            | '\u{202f}'
            | '\u{205f}'
            | '\u{3000}'
            | '\u{feff}'
    )
}
