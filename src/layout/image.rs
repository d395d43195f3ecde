//! # Image Payloads
//!
//! Images reach the engine as text or bytes, either inline in the
//! definition or from a query column. Text payloads are uuencoded (they
//! start with a `begin` line) or base64. Byte payloads are raw image files
//! unless they too start with `begin`.
//!
//! The decoded bytes are sniffed with the `image` crate so every image
//! primitive carries its pixel size. Malformed payloads are logged and the
//! element is skipped.

use base64::Engine as _;

use crate::document::ImageData;
use crate::query::Datum;

/// Decode a text payload: uuencoded or base64.
pub fn decode_text_payload(text: &str) -> Option<Vec<u8>> {
    let trimmed = text.trim_start();
    if trimmed.starts_with("begin") {
        return uudecode(trimmed);
    }
    let compact: String = trimmed.chars().filter(|c| !c.is_whitespace()).collect();
    match base64::engine::general_purpose::STANDARD.decode(compact) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            log::warn!("image payload is neither uuencoded nor base64: {e}");
            None
        }
    }
}

/// Decode a column value.
pub fn decode_datum(datum: &Datum) -> Option<Vec<u8>> {
    match datum {
        Datum::Null => None,
        Datum::Bytes(bytes) if bytes.starts_with(b"begin") => {
            uudecode(&String::from_utf8_lossy(bytes))
        }
        Datum::Bytes(bytes) => Some(bytes.clone()),
        other => decode_text_payload(&other.as_text()),
    }
}

/// Sniff the format and pixel size of encoded image bytes.
pub fn load(bytes: Vec<u8>) -> Option<ImageData> {
    match image::load_from_memory(&bytes) {
        Ok(img) => Some(ImageData {
            pixel_width: img.width(),
            pixel_height: img.height(),
            bytes,
        }),
        Err(e) => {
            log::warn!("skipping undecodable image ({} bytes): {e}", bytes.len());
            None
        }
    }
}

/// Decode a uuencoded block: a `begin <mode> <name>` header, body lines
/// each prefixed by a length character, and an `end` trailer.
pub fn uudecode(text: &str) -> Option<Vec<u8>> {
    let mut lines = text.lines();
    let header = lines.next()?;
    if !header.trim_start().starts_with("begin") {
        return None;
    }

    let sixbit = |c: u8| c.wrapping_sub(b' ') & 0x3f;
    let mut out = Vec::new();
    for line in lines {
        let line = line.trim_end_matches('\r').as_bytes();
        if line.starts_with(b"end") {
            return Some(out);
        }
        let Some((&len_char, body)) = line.split_first() else {
            continue;
        };
        let len = sixbit(len_char) as usize;
        if len == 0 {
            continue;
        }
        let mut decoded = Vec::with_capacity(len + 2);
        for group in body.chunks(4) {
            let mut c = [0u8; 4];
            for (slot, &b) in c.iter_mut().zip(group) {
                *slot = sixbit(b);
            }
            decoded.push((c[0] << 2) | (c[1] >> 4));
            decoded.push((c[1] << 4) | (c[2] >> 2));
            decoded.push((c[2] << 6) | c[3]);
        }
        if decoded.len() < len {
            log::warn!("truncated uuencoded line");
            return None;
        }
        decoded.truncate(len);
        out.extend_from_slice(&decoded);
    }
    log::warn!("uuencoded image has no end line");
    None
}
