//! URI ↔ filesystem path conversion and normalization.
//!
//! The transport hands the server `file://` URIs; everything behind the
//! façade works on absolute paths. This crate owns the conversion in both
//! directions plus the normalization quirks IDE clients expect:
//!
//! - `%XX` percent-decoding on the way in, uppercase-hex encoding on the
//!   way out, with `:` kept reserved so `file:///C:/x` survives round trips
//! - Windows drive letters: the leading `/C:` of a URI path is trimmed to
//!   `C:` and lowercased in lookup keys
//! - non-`file` schemes are passed through untouched

#![deny(unsafe_code)]
#![warn(missing_docs)]

use url::Url;

/// Convert a `file://` URI to a filesystem path.
///
/// Percent-encoding is decoded; on Windows a leading `/X:` is trimmed to
/// `X:`. Returns `None` for other schemes or malformed URIs.
pub fn uri_to_fs_path(uri: &str) -> Option<std::path::PathBuf> {
    let url = Url::parse(uri).ok()?;
    if url.scheme() != "file" {
        return None;
    }
    if let Ok(path) = url.to_file_path() {
        return Some(path);
    }
    // `to_file_path` refuses drive-letter paths on non-Windows hosts; fall
    // back to manual decoding so tests behave the same everywhere.
    let decoded = percent_decode(url.path());
    let trimmed = trim_drive_prefix(&decoded);
    Some(std::path::PathBuf::from(trimmed))
}

/// Convert an absolute filesystem path to a `file://` URI.
///
/// Encoding uses uppercase hex and treats `:` as reserved, matching what
/// IDE clients send back.
///
/// # Errors
///
/// Returns an error when the path is relative and the current directory
/// cannot be resolved.
pub fn fs_path_to_uri<P: AsRef<std::path::Path>>(path: P) -> Result<String, String> {
    let path = path.as_ref();
    let abs = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| format!("failed to get current directory: {e}"))?
            .join(path)
    };
    let raw = abs.to_string_lossy().replace('\\', "/");
    let mut out = String::from("file://");
    if !raw.starts_with('/') {
        // Windows drive-letter path: re-introduce the leading slash.
        out.push('/');
    }
    for b in raw.bytes() {
        match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' => out.push(b as char),
            b'/' | b':' | b'-' | b'_' | b'.' | b'~' => out.push(b as char),
            _ => out.push_str(&format!("%{b:02X}")),
        }
    }
    Ok(out)
}

/// Normalize a URI string to a consistent form.
///
/// Valid URIs are re-serialized; bare paths are converted to `file://`
/// URIs; anything else is returned as-is.
pub fn normalize_uri(uri: &str) -> String {
    if Url::parse(uri).is_ok() {
        if let Some(path) = uri_to_fs_path(uri) {
            if let Ok(u) = fs_path_to_uri(&path) {
                return u;
            }
        }
        return uri.to_string();
    }
    fs_path_to_uri(std::path::Path::new(uri)).unwrap_or_else(|_| uri.to_string())
}

/// Normalize a URI to a consistent lookup key.
///
/// Windows drive letters are lowercased so `file:///C:/x` and
/// `file:///c:/x` address the same document.
pub fn uri_key(uri: &str) -> String {
    let s = normalize_uri(uri);
    if let Some(rest) = s.strip_prefix("file:///") {
        let bytes = rest.as_bytes();
        if bytes.len() > 1 && bytes[1] == b':' && bytes[0].is_ascii_alphabetic() {
            return format!("file:///{}{}", rest[0..1].to_ascii_lowercase(), &rest[1..]);
        }
    }
    s
}

/// True for `file://` URIs.
pub fn is_file_uri(uri: &str) -> bool {
    uri.starts_with("file://")
}

/// The file extension of a URI's last path segment, if any.
pub fn uri_extension(uri: &str) -> Option<&str> {
    let last = uri.rsplit('/').next()?;
    let last = last.split(['?', '#']).next()?;
    let dot = last.rfind('.')?;
    let ext = &last[dot + 1..];
    if ext.is_empty() { None } else { Some(ext) }
}

fn percent_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = &s[i + 1..i + 3];
            if let Ok(b) = u8::from_str_radix(hex, 16) {
                out.push(b);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

fn trim_drive_prefix(path: &str) -> String {
    let bytes = path.as_bytes();
    if bytes.len() > 2 && bytes[0] == b'/' && bytes[2] == b':' && bytes[1].is_ascii_alphabetic() {
        return path[1..].to_string();
    }
    path.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use cangjie_testkit::{must, must_some};

    #[test]
    fn uri_to_path_basic() {
        let path = must_some(uri_to_fs_path("file:///tmp/pkg/main.cj"));
        assert!(path.ends_with("main.cj"));
    }

    #[test]
    fn uri_to_path_decodes_spaces() {
        let path = must_some(uri_to_fs_path("file:///tmp/with%20space/a.cj"));
        assert!(path.to_string_lossy().contains("with space"));
    }

    #[test]
    fn non_file_scheme_is_rejected() {
        assert!(uri_to_fs_path("https://example.com/a.cj").is_none());
        assert!(uri_to_fs_path("untitled:Untitled-1").is_none());
    }

    #[test]
    fn path_to_uri_uses_uppercase_hex() {
        let uri = must(fs_path_to_uri("/tmp/with space/a.cj"));
        assert_eq!(uri, "file:///tmp/with%20space/a.cj");
    }

    #[test]
    fn colon_stays_reserved() {
        let uri = must(fs_path_to_uri("/C:/proj/a.cj"));
        assert!(uri.contains("C:"), "colon must not be escaped: {uri}");
    }

    #[test]
    fn drive_letter_key_is_case_insensitive() {
        assert_eq!(uri_key("file:///C:/proj/a.cj"), uri_key("file:///c:/proj/a.cj"));
    }

    #[test]
    fn drive_prefix_is_trimmed() {
        let path = must_some(uri_to_fs_path("file:///D:/work/pkg/a.cj"));
        let s = path.to_string_lossy().replace('\\', "/");
        assert!(!s.starts_with("/D:/"), "leading slash must be trimmed: {s}");
    }

    #[test]
    fn round_trip_is_idempotent() {
        let original = "/tmp/round-trip/pkg/main.cj";
        let uri = must(fs_path_to_uri(original));
        let back = must_some(uri_to_fs_path(&uri));
        assert_eq!(back.to_string_lossy(), original);
    }

    #[test]
    fn extension_extraction() {
        assert_eq!(uri_extension("file:///a/b/main.cj"), Some("cj"));
        assert_eq!(uri_extension("file:///a/b/noext"), None);
    }
}
