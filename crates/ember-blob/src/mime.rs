//! Content-type sniffing from leading bytes. The declared `Content-Type`
//! header is never trusted for storage; it is only a fallback when sniffing
//! fails to recognize the signature.

const SNIFF_WINDOW: usize = 1024;
const FALLBACK_MIME: &str = "application/octet-stream";

/// Detect the MIME type from at most the first 1024 bytes of `content`,
/// falling back to `declared` and finally to `application/octet-stream`.
#[must_use]
pub fn detect(content: &[u8], declared: Option<&str>) -> String {
    let window = &content[..content.len().min(SNIFF_WINDOW)];

    infer::get(window)
        .map(|kind| kind.mime_type().to_string())
        .unwrap_or_else(|| declared.map(ToString::to_string).unwrap_or_else(|| FALLBACK_MIME.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniffs_png_signature() {
        let mut bytes = vec![0x89, b'P', b'N', b'G', 0x0D, 0x0A, 0x1A, 0x0A];
        bytes.extend(std::iter::repeat(0u8).take(16));
        assert_eq!(detect(&bytes, Some("application/octet-stream")), "image/png");
    }

    #[test]
    fn falls_back_to_declared() {
        let bytes = b"hello world, plain text";
        assert_eq!(detect(bytes, Some("text/plain")), "text/plain");
    }

    #[test]
    fn falls_back_to_octet_stream_when_nothing_declared() {
        let bytes = [0u8, 1, 2, 3];
        assert_eq!(detect(&bytes, None), FALLBACK_MIME);
    }
}
