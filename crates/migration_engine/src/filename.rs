use sha2::{Digest, Sha256};

const MAX_NAME_CHARS: usize = 120;

/// Filesystem-safe file name: forbidden characters and whitespace become `-`,
/// runs of `-` collapse, and the result is never empty.
pub fn sanitize_filename(input: &str) -> String {
    let mapped: String = input
        .chars()
        .map(|c| if is_forbidden(c) || c.is_whitespace() { '-' } else { c })
        .collect();

    let mut compacted = String::with_capacity(mapped.len());
    let mut prev_dash = false;
    for c in mapped.chars() {
        if c == '-' {
            if !prev_dash {
                compacted.push(c);
            }
            prev_dash = true;
        } else {
            compacted.push(c);
            prev_dash = false;
        }
    }

    let mut cleaned = compacted.trim_matches(&['-', ' ', '.'][..]).to_string();
    if cleaned.chars().count() > MAX_NAME_CHARS {
        cleaned = truncate_keeping_extension(&cleaned, MAX_NAME_CHARS);
    }
    if cleaned.is_empty() {
        cleaned = "arquivo".to_string();
    }
    if is_reserved_windows_name(stem(&cleaned)) {
        cleaned.insert(0, '_');
    }
    cleaned
}

fn truncate_keeping_extension(name: &str, max_chars: usize) -> String {
    let ext = extension(name).map(|e| format!(".{e}")).unwrap_or_default();
    let keep = max_chars.saturating_sub(ext.chars().count());
    let stem: String = stem(name).chars().take(keep).collect();
    format!("{}{ext}", stem.trim_end_matches('-'))
}

fn is_forbidden(c: char) -> bool {
    matches!(c,
        '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0'..='\u{1F}'
    )
}

fn is_reserved_windows_name(name: &str) -> bool {
    const RESERVED: &[&str] = &[
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
        "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];
    RESERVED.iter().any(|r| r.eq_ignore_ascii_case(name))
}

/// Lowercase extension without the dot, if the name has one.
pub fn extension(name: &str) -> Option<String> {
    match name.rfind('.') {
        Some(dot) if dot > 0 && dot + 1 < name.len() => Some(name[dot + 1..].to_ascii_lowercase()),
        _ => None,
    }
}

fn stem(name: &str) -> &str {
    match name.rfind('.') {
        Some(dot) if dot > 0 => &name[..dot],
        _ => name,
    }
}

/// `photo.jpg` + 2 → `photo-2.jpg`
pub fn with_numeric_suffix(name: &str, n: usize) -> String {
    match extension(name) {
        Some(ext) => format!("{}-{n}.{ext}", stem(name)),
        None => format!("{name}-{n}"),
    }
}

/// Name for an image whose URL carries no usable file name.
pub fn fallback_image_name(url: &str, timestamp: i64, content_type: Option<&str>) -> String {
    format!(
        "imagem-{timestamp}-{}.{}",
        short_hash(url),
        extension_for_content_type(content_type)
    )
}

pub fn extension_for_content_type(content_type: Option<&str>) -> &'static str {
    let mime = content_type
        .and_then(|ct| ct.split(';').next())
        .map(|ct| ct.trim().to_ascii_lowercase())
        .unwrap_or_default();
    match mime.as_str() {
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "image/svg+xml" => "svg",
        "image/avif" => "avif",
        _ => "jpg",
    }
}

pub fn short_hash(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    let digest = hasher.finalize();
    let mut hex = String::with_capacity(8);
    for byte in digest.iter().take(4) {
        use std::fmt::Write;
        let _ = write!(&mut hex, "{byte:02x}");
    }
    hex
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forbidden_characters_collapse_to_single_dashes() {
        assert_eq!(sanitize_filename("my photo: <final>?.jpg"), "my-photo-final-.jpg");
        assert_eq!(sanitize_filename("  ..  "), "arquivo");
        assert_eq!(sanitize_filename("con.png"), "_con.png");
    }

    #[test]
    fn long_names_keep_their_extension() {
        let name = format!("{}.webp", "a".repeat(200));
        let cleaned = sanitize_filename(&name);
        assert_eq!(cleaned.chars().count(), MAX_NAME_CHARS);
        assert!(cleaned.ends_with(".webp"));
    }

    #[test]
    fn numeric_suffix_goes_before_extension() {
        assert_eq!(with_numeric_suffix("photo.jpg", 2), "photo-2.jpg");
        assert_eq!(with_numeric_suffix("photo", 1), "photo-1");
    }

    #[test]
    fn fallback_names_are_deterministic_for_a_timestamp() {
        let a = fallback_image_name("https://x/img?id=1", 1_700_000_000, Some("image/png"));
        let b = fallback_image_name("https://x/img?id=1", 1_700_000_000, Some("image/png"));
        assert_eq!(a, b);
        assert!(a.starts_with("imagem-1700000000-"));
        assert!(a.ends_with(".png"));
    }
}
