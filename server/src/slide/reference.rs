//! Derived slide fields: grouping checksums and viewer URL fragments

use md5::{Digest, Md5};
use percent_encoding::{AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode};
use tracing::warn;
use url::Url;

/// Characters left unescaped inside a single path segment
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'$')
    .remove(b'&')
    .remove(b'+')
    .remove(b':')
    .remove(b'=')
    .remove(b'@');

/// Base against which scheme-less links such as `/a/b/c` are resolved
const RELATIVE_LINK_BASE: &str = "http://localhost/";

fn md5_hex(input: &str) -> String {
    format!("{:x}", Md5::digest(input.as_bytes()))
}

/// Grouping key for a slide: checksum of the raw grouping value, or of the
/// parent id when the value is blank.
pub fn compute_group_key(raw_value: Option<&str>, fallback_id: i64) -> String {
    match raw_value {
        Some(value) if !value.is_empty() => md5_hex(value),
        _ => md5_hex(&fallback_id.to_string()),
    }
}

/// Viewer URL fragment for a raw slide link.
///
/// Keeps every path segment except the first and the last, escapes spaces
/// and ampersands, then escapes the joined fragment as one path segment.
/// Links without a scheme are read as paths. Returns an empty string when
/// the link cannot be used.
pub fn derive_viewer_url(raw_link: &str) -> String {
    let parsed = Url::parse(RELATIVE_LINK_BASE)
        .and_then(|base| Url::options().base_url(Some(&base)).parse(raw_link));
    let parsed = match parsed {
        Ok(url) => url,
        Err(e) => {
            warn!("Cannot derive viewer URL from {:?}: {}", raw_link, e);
            return String::new();
        }
    };

    let segments: Vec<String> = match parsed.path_segments() {
        Some(segments) => segments
            .map(|s| percent_decode_str(s).decode_utf8_lossy().into_owned())
            .collect(),
        None => Vec::new(),
    };

    if segments.len() < 2 {
        warn!("Unexpected viewer link format: {:?}", raw_link);
        return String::new();
    }

    let inner = segments[1..segments.len() - 1].join("/");
    let pre_encoded = inner.replace(' ', "%20").replace('&', "%26");
    utf8_percent_encode(&pre_encoded, PATH_SEGMENT).to_string()
}

/// Viewer URL for an optional link; `None` when there is no link to derive from
pub fn viewer_url_for(link: Option<&str>) -> Option<String> {
    link.filter(|l| !l.is_empty()).map(derive_viewer_url)
}
