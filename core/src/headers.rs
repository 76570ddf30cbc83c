//! Header maps and the string-header normalizer.
//!
//! Header names keep the casing they arrived with. Lookups that the
//! pipeline itself performs (`Content-Type`, `Link`) go through
//! `get_header`, which ignores case, so both header models behave the same.

use std::collections::BTreeMap;

/// Header name → value. Later inserts of the same name overwrite.
pub type Headers = BTreeMap<String, String>;

const LINE_SEPARATOR: &str = "\r\n";
const KEY_VALUE_SEPARATOR: &str = ": ";

/// Convert a CRLF-joined `Key: Value` blob into a header map.
///
/// Empty or absent input gives an empty map. Each line is split on the
/// first `": "`; lines without that delimiter are skipped. Casing is kept
/// and a repeated key keeps its last value.
pub fn normalize_headers(raw: Option<&str>) -> Headers {
    let mut headers = Headers::new();
    let Some(raw) = raw else {
        return headers;
    };

    for line in raw.split(LINE_SEPARATOR) {
        if let Some((key, value)) = line.split_once(KEY_VALUE_SEPARATOR) {
            headers.insert(key.to_string(), value.to_string());
        }
    }
    headers
}

/// Case-insensitive header lookup.
pub fn get_header<'a>(headers: &'a Headers, name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

pub fn has_header(headers: &Headers, name: &str) -> bool {
    get_header(headers, name).is_some()
}
