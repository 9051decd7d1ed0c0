//! Character set handling for fetched HTML
//!
//! Order of precedence: byte-order mark, `Content-Type` charset, an
//! in-document `<meta charset>` / `http-equiv` declaration, then content
//! sniffing. Undecodable sequences become U+FFFD instead of failing.

use chardetng::EncodingDetector;
use encoding_rs::Encoding;

/// How far into the document a `<meta>` declaration is looked for
const META_SCAN_LIMIT: usize = 4096;

/// Decodes an HTML body into UTF-8
pub fn decode_html(bytes: &[u8], content_type: Option<&str>) -> String {
    let encoding = detect_encoding(bytes, content_type);
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        tracing::debug!(encoding = encoding.name(), "Malformed sequences replaced while decoding");
    }
    text.into_owned()
}

/// Picks the encoding a body should be decoded with
pub fn detect_encoding(bytes: &[u8], content_type: Option<&str>) -> &'static Encoding {
    if let Some((encoding, _)) = Encoding::for_bom(bytes) {
        return encoding;
    }

    let declared = content_type
        .and_then(charset_param)
        .or_else(|| meta_charset(bytes));
    if let Some(encoding) = declared.and_then(|label| Encoding::for_label(label.as_bytes())) {
        return encoding;
    }

    let mut detector = EncodingDetector::new();
    detector.feed(bytes, true);
    detector.guess(None, true)
}

/// Extracts `charset=` from a `Content-Type` value
fn charset_param(content_type: &str) -> Option<String> {
    content_type.split(';').find_map(|part| {
        let (key, value) = part.split_once('=')?;
        key.trim()
            .eq_ignore_ascii_case("charset")
            .then(|| value.trim().trim_matches(&['"', '\''][..]).to_string())
            .filter(|v| !v.is_empty())
    })
}

/// Finds a charset declared in the document head
///
/// Covers `<meta charset="...">`, the `http-equiv` content form and an
/// XML declaration's `encoding="..."`.
fn meta_charset(bytes: &[u8]) -> Option<String> {
    let head = &bytes[..bytes.len().min(META_SCAN_LIMIT)];
    let head = String::from_utf8_lossy(head).to_ascii_lowercase();

    ["charset=", "encoding="].iter().find_map(|key| {
        let start = head.find(key)? + key.len();
        let value: String = head[start..]
            .trim_start_matches(&['"', '\'', ' '][..])
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | ':' | '.'))
            .collect();
        (!value.is_empty()).then_some(value)
    })
}
