//! HTML escaping for author input.
//!
//! Every byte an author typed reaches the rendered fragment through exactly one
//! of these functions. Markup the emitter produces itself never passes through
//! them, so nothing is escaped twice.

use percent_encoding::{AsciiSet, CONTROLS, utf8_percent_encode};

/// Bytes that could split or reinterpret a quoted URL attribute.
const URL_ATTR: &AsciiSet = &CONTROLS.add(b' ').add(b'\\');

/// Escapes the five HTML-significant characters.
pub fn escape(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len() + raw.len() / 8);
    push_escaped(&mut out, raw);
    out
}

/// Appends `raw` to `out` with `&`, `<`, `>`, `"` and `'` replaced by entities.
pub fn push_escaped(out: &mut String, raw: &str) {
    let mut last = 0;
    for (idx, byte) in raw.bytes().enumerate() {
        let entity = match byte {
            b'&' => "&amp;",
            b'<' => "&lt;",
            b'>' => "&gt;",
            b'"' => "&quot;",
            b'\'' => "&#39;",
            _ => continue,
        };
        out.push_str(&raw[last..idx]);
        out.push_str(entity);
        last = idx + 1;
    }
    out.push_str(&raw[last..]);
}

/// Escapes a URL for use inside a double-quoted attribute.
///
/// Whitespace, backslashes, control and non-ASCII bytes are percent-encoded
/// first so the attribute value cannot be split or reinterpreted.
pub fn escape_url_attr(url: &str) -> String {
    escape(&utf8_percent_encode(url, URL_ATTR).to_string())
}
