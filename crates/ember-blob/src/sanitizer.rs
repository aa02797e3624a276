//! Filename sanitizing: strips path traversal, shell metacharacters, and
//! non-printable code points, then bounds the result to 255 bytes while
//! preserving the extension.

const DANGEROUS_CHARS: [char; 8] = [';', '|', '&', '$', '`', '<', '>', '\0'];
const MAX_LEN: usize = 255;

/// Sanitize `name` into a filename safe to place on disk and in a
/// `Content-Disposition` header. Idempotent: `sanitize(sanitize(x)) == sanitize(x)`.
#[must_use]
pub fn sanitize(name: &str) -> String {
    let mut s = name.replace("..", "");
    s = s.replace('/', "_").replace('\\', "_");

    s.retain(|c| !DANGEROUS_CHARS.contains(&c));
    s.retain(|c| !c.is_control());

    truncate_preserving_extension(&s, MAX_LEN)
}

fn truncate_preserving_extension(name: &str, max_len: usize) -> String {
    if name.len() <= max_len {
        return name.to_string();
    }

    if let Some(dot) = name.rfind('.') {
        let (stem, ext_with_dot) = name.split_at(dot);
        let ext = &ext_with_dot[1..];
        if max_len > ext.len() + 1 {
            let available = max_len - ext.len() - 1;
            let truncated_stem = take_bytes_at_char_boundary(stem, available);
            return format!("{truncated_stem}.{ext}");
        }
    }

    take_bytes_at_char_boundary(name, max_len)
}

fn take_bytes_at_char_boundary(s: &str, max_bytes: usize) -> String {
    let mut end = max_bytes.min(s.len());
    while end > 0 && !s.is_char_boundary(end) {
        end -= 1;
    }
    s[..end].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_path_traversal() {
        assert_eq!(sanitize("../../etc/passwd"), "_etc_passwd");
    }

    #[test]
    fn replaces_path_separators() {
        assert_eq!(sanitize("a/b\\c"), "a_b_c");
    }

    #[test]
    fn strips_shell_metacharacters() {
        assert_eq!(sanitize("evil;rm -rf $HOME`x`|cat<in>out"), "evilrm -rf HOMExx catinout");
    }

    #[test]
    fn drops_non_printable() {
        let name = format!("a{}b", '\u{0007}');
        assert_eq!(sanitize(&name), "ab");
    }

    #[test]
    fn truncates_preserving_extension() {
        let long_stem = "a".repeat(300);
        let name = format!("{long_stem}.pdf");
        let sanitized = sanitize(&name);
        assert!(sanitized.len() <= 255);
        assert!(sanitized.ends_with(".pdf"));
    }

    #[test]
    fn is_idempotent() {
        let name = "../weird name$with`stuff.txt";
        let once = sanitize(name);
        let twice = sanitize(&once);
        assert_eq!(once, twice);
    }
}
