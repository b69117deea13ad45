//! Diagram source embedded in PNG artifacts.
//!
//! The expanded block is stored in an `iTXt` chunk with keyword `plantuml`,
//! placed right after `IHDR`.

use flate2::Crc;

const PNG_SIGNATURE: &[u8; 8] = b"\x89PNG\r\n\x1a\n";
const METADATA_KEYWORD: &[u8] = b"plantuml";

/// Signature, then IHDR: length, type, 13 bytes of data, CRC.
const IHDR_END: usize = 8 + 4 + 4 + 13 + 4;

/// Check the PNG signature and that the first chunk is `IHDR`.
pub(crate) fn is_png(data: &[u8]) -> bool {
    data.len() >= IHDR_END && &data[0..8] == PNG_SIGNATURE && &data[12..16] == b"IHDR"
}

/// Return a copy of `data` carrying `source` as text metadata.
///
/// Returns `None` if `data` is not a PNG.
pub(crate) fn embed_source(data: &[u8], source: &str) -> Option<Vec<u8>> {
    if !is_png(data) {
        return None;
    }

    // keyword NUL, compression flag, compression method, language NUL, translated keyword NUL
    let mut chunk_data = Vec::with_capacity(METADATA_KEYWORD.len() + 5 + source.len());
    chunk_data.extend_from_slice(METADATA_KEYWORD);
    chunk_data.extend_from_slice(&[0, 0, 0, 0, 0]);
    chunk_data.extend_from_slice(source.as_bytes());
    let length = u32::try_from(chunk_data.len()).ok()?;

    let mut crc = Crc::new();
    crc.update(b"iTXt");
    crc.update(&chunk_data);

    let mut out = Vec::with_capacity(data.len() + chunk_data.len() + 12);
    out.extend_from_slice(&data[..IHDR_END]);
    out.extend_from_slice(&length.to_be_bytes());
    out.extend_from_slice(b"iTXt");
    out.extend_from_slice(&chunk_data);
    out.extend_from_slice(&crc.sum().to_be_bytes());
    out.extend_from_slice(&data[IHDR_END..]);
    Some(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn minimal_png() -> Vec<u8> {
        let mut png = PNG_SIGNATURE.to_vec();
        png.extend_from_slice(&[0x00, 0x00, 0x00, 0x0D]);
        png.extend_from_slice(b"IHDR");
        png.extend_from_slice(&[0x00, 0x00, 0x00, 0x64, 0x00, 0x00, 0x00, 0x32]);
        png.extend_from_slice(&[8, 6, 0, 0, 0]);
        png.extend_from_slice(&[0xDE, 0xAD, 0xBE, 0xEF]);
        png.extend_from_slice(&[0, 0, 0, 0]);
        png.extend_from_slice(b"IEND");
        png.extend_from_slice(&[0xAE, 0x42, 0x60, 0x82]);
        png
    }

    #[test]
    fn test_is_png() {
        assert!(is_png(&minimal_png()));
        assert!(!is_png(b"not a png"));
        assert!(!is_png(b"<svg xmlns=\"http://www.w3.org/2000/svg\"></svg>"));
    }

    #[test]
    fn test_embed_source_inserts_chunk_after_ihdr() {
        let png = minimal_png();
        let out = embed_source(&png, "@startuml\nA -> B\n@enduml").unwrap();

        assert_eq!(&out[..IHDR_END], &png[..IHDR_END]);
        let length = u32::from_be_bytes([
            out[IHDR_END],
            out[IHDR_END + 1],
            out[IHDR_END + 2],
            out[IHDR_END + 3],
        ]) as usize;
        assert_eq!(&out[IHDR_END + 4..IHDR_END + 8], b"iTXt");
        let data = &out[IHDR_END + 8..IHDR_END + 8 + length];
        assert!(data.starts_with(b"plantuml\0"));
        assert!(data.ends_with(b"@startuml\nA -> B\n@enduml"));
        assert_eq!(&out[out.len() - 12..], &png[png.len() - 12..]);
        assert_eq!(out.len(), png.len() + 12 + length);
    }

    #[test]
    fn test_embed_source_crc() {
        let out = embed_source(&minimal_png(), "x").unwrap();
        let start = IHDR_END + 4;
        let end = start + 4 + METADATA_KEYWORD.len() + 5 + 1;

        let mut crc = Crc::new();
        crc.update(&out[start..end]);
        assert_eq!(&out[end..end + 4], &crc.sum().to_be_bytes());
    }

    #[test]
    fn test_embed_source_rejects_non_png() {
        assert_eq!(embed_source(b"GIF89a", "x"), None);
    }
}
