//! Pure uuencode/uudecode codec, ported from `kl3m_data/utils/uu_utils.py`.
//!
//! Standard POSIX uuencode: 45-byte chunks, `begin {mode:03o} {name}\n`
//! header, one encoded line per chunk, `end\n` terminator. Hand-rolled
//! rather than pulled from a crate: this is a niche, fully-specified legacy
//! format the dispatch layer must detect and decode, not ambient plumbing.

const CHUNK_SIZE: usize = 45;

pub fn uuencode(input: &[u8], name: &str, mode: u32) -> Vec<u8> {
    let mut out = format!("begin {mode:03o} {name}\n").into_bytes();
    for chunk in input.chunks(CHUNK_SIZE) {
        out.extend_from_slice(&encode_line(chunk));
    }
    out.extend_from_slice(b"end\n");
    out
}

fn encode_line(chunk: &[u8]) -> Vec<u8> {
    let mut line = Vec::with_capacity(2 + chunk.len().div_ceil(3) * 4);
    line.push(encode_char(chunk.len() as u8));
    for group in chunk.chunks(3) {
        let mut buf = [0u8; 3];
        buf[..group.len()].copy_from_slice(group);
        let n = ((buf[0] as u32) << 16) | ((buf[1] as u32) << 8) | buf[2] as u32;
        line.push(encode_char(((n >> 18) & 0x3f) as u8));
        line.push(encode_char(((n >> 12) & 0x3f) as u8));
        line.push(encode_char(((n >> 6) & 0x3f) as u8));
        line.push(encode_char((n & 0x3f) as u8));
    }
    line.push(b'\n');
    line
}

fn encode_char(v: u8) -> u8 {
    if v == 0 {
        b'`'
    } else {
        (v & 0x3f) + b' '
    }
}

fn decode_char(c: u8) -> u8 {
    (c.wrapping_sub(b' ')) & 0x3f
}

#[derive(Debug, thiserror::Error)]
pub enum UuError {
    #[error("invalid uuencoded input: {0}")]
    Invalid(String),
}

/// Decode a uuencoded buffer, returning the declared file name and the
/// decoded bytes. Fails with `UuError::Invalid` if the header or any data
/// line is malformed, matching the original's behavior of raising
/// `ValueError("Invalid uuencoded input")`.
pub fn uudecode(input: &[u8]) -> Result<(String, Vec<u8>), UuError> {
    let mut lines = input.split(|&b| b == b'\n');
    let header = lines
        .next()
        .ok_or_else(|| UuError::Invalid("missing header".into()))?;
    let header = std::str::from_utf8(header).map_err(|_| UuError::Invalid("non-utf8 header".into()))?;
    if !header.starts_with("begin ") {
        return Err(UuError::Invalid("missing 'begin' header".into()));
    }
    let mut parts = header.split_whitespace();
    let _begin = parts.next();
    let _mode = parts.next();
    let name = parts
        .next()
        .ok_or_else(|| UuError::Invalid("missing file name in header".into()))?
        .to_string();

    let mut data = Vec::new();
    for line in lines {
        if line == b"end" || line.is_empty() {
            if line == b"end" {
                break;
            }
            continue;
        }
        data.extend_from_slice(&decode_line(line)?);
    }
    Ok((name, data))
}

fn decode_line(line: &[u8]) -> Result<Vec<u8>, UuError> {
    if line.is_empty() {
        return Ok(Vec::new());
    }
    let length = decode_char(line[0]) as usize;
    let body = &line[1..];
    let mut out = Vec::with_capacity(length);
    let mut chars = body.iter();
    while out.len() < length {
        let c0 = *chars.next().ok_or_else(|| UuError::Invalid("truncated line".into()))?;
        let c1 = *chars.next().ok_or_else(|| UuError::Invalid("truncated line".into()))?;
        let c2 = *chars.next().ok_or_else(|| UuError::Invalid("truncated line".into()))?;
        let c3 = *chars.next().ok_or_else(|| UuError::Invalid("truncated line".into()))?;
        let n = ((decode_char(c0) as u32) << 18)
            | ((decode_char(c1) as u32) << 12)
            | ((decode_char(c2) as u32) << 6)
            | decode_char(c3) as u32;
        let bytes = [(n >> 16) as u8, (n >> 8) as u8, n as u8];
        for b in bytes.iter().take(length - out.len()) {
            out.push(*b);
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_arbitrary_bytes() {
        let original = b"The quick brown fox jumps over the lazy dog, 0123456789!";
        let encoded = uuencode(original, "file.txt", 0o644);
        let (name, decoded) = uudecode(&encoded).unwrap();
        assert_eq!(name, "file.txt");
        assert_eq!(decoded, original);
    }

    #[test]
    fn round_trips_across_chunk_boundary() {
        let original: Vec<u8> = (0u8..=255).cycle().take(130).collect();
        let encoded = uuencode(&original, "blob.bin", 0o666);
        let (_, decoded) = uudecode(&encoded).unwrap();
        assert_eq!(decoded, original);
    }

    #[test]
    fn rejects_missing_begin_header() {
        assert!(uudecode(b"not a uuencoded file\n").is_err());
    }
}
