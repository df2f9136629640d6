//! Minimal byte-prefix media-type sniffing, used when the declared type is
//! generic (`application/octet-stream` or absent).

pub fn sniff_media_type(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(b"%PDF-") {
        return Some("application/pdf");
    }
    if bytes.starts_with(b"PK\x03\x04") {
        return Some("application/zip");
    }
    let trimmed = trim_leading_ws(bytes);
    if trimmed.starts_with(b"<?xml") {
        return Some("text/xml");
    }
    if starts_with_ci(trimmed, b"<html") || starts_with_ci(trimmed, b"<!doctype") {
        return Some("text/html");
    }
    if trimmed.starts_with(b"{") || trimmed.starts_with(b"[") {
        return Some("application/json");
    }
    None
}

fn trim_leading_ws(bytes: &[u8]) -> &[u8] {
    let mut i = 0;
    while i < bytes.len() && bytes[i].is_ascii_whitespace() {
        i += 1;
    }
    &bytes[i..]
}

fn starts_with_ci(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.len() >= needle.len()
        && haystack[..needle.len()]
            .iter()
            .zip(needle)
            .all(|(a, b)| a.to_ascii_lowercase() == b.to_ascii_lowercase())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniffs_common_formats() {
        assert_eq!(sniff_media_type(b"%PDF-1.4 ..."), Some("application/pdf"));
        assert_eq!(sniff_media_type(b"PK\x03\x04 stuff"), Some("application/zip"));
        assert_eq!(sniff_media_type(b"  <html><body>"), Some("text/html"));
        assert_eq!(sniff_media_type(b"<!DOCTYPE html>"), Some("text/html"));
        assert_eq!(sniff_media_type(b"{\"a\": 1}"), Some("application/json"));
        assert_eq!(sniff_media_type(b"<?xml version=\"1.0\"?>"), Some("text/xml"));
        assert_eq!(sniff_media_type(b"plain text content"), None);
    }
}
