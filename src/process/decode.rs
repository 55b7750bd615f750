use encoding_rs::WINDOWS_1252;
use std::borrow::Cow;
use tracing::warn;

/// Decode file bytes as UTF-8, falling back to Windows-1252 when they are
/// not valid UTF-8. A leading UTF-8 BOM is dropped.
pub fn decode_text<'a>(bytes: &'a [u8], file_name: &str) -> Cow<'a, str> {
    let bytes = bytes.strip_prefix(b"\xEF\xBB\xBF").unwrap_or(bytes);
    match std::str::from_utf8(bytes) {
        Ok(s) => Cow::Borrowed(s),
        Err(e) => {
            warn!(file = file_name, error = %e, "not UTF-8, decoding as cp1252");
            let (text, _, _) = WINDOWS_1252.decode(bytes);
            text
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn utf8_is_borrowed() {
        let out = decode_text("Café".as_bytes(), "a.csv");
        assert!(matches!(out, Cow::Borrowed("Café")));
    }

    #[test]
    fn cp1252_fallback() {
        // "Café Ñ" in Windows-1252
        let out = decode_text(&[0x43, 0x61, 0x66, 0xE9, 0x20, 0xD1], "b.csv");
        assert_eq!(out, "Café Ñ");
    }

    #[test]
    fn strips_bom() {
        let out = decode_text(b"\xEF\xBB\xBFid,name", "c.csv");
        assert_eq!(out, "id,name");
    }
}
