use std::sync::LazyLock;

use regex::Regex;
use url::Url;

static SIZE_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-\d+x\d+$").expect("valid size suffix regex"));

static EDIT_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-(?:scaled|rotated)$").expect("valid edit suffix regex"));

static HASH_SUFFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-([a-z0-9]{12,})$").expect("valid hash suffix regex"));

/// Reduces an image reference to the key used for duplicate detection.
///
/// Host, query and fragment are dropped, relative prefixes and the site
/// prefix are stripped, dot segments are resolved and generated filename
/// suffixes (`-1200x800`, `-scaled`, `-rotated`, long hashes) are removed.
/// `data:` URIs yield an empty key.
pub fn normalize_asset_key(reference: &str, strip_prefix: Option<&str>) -> String {
    let reference = reference.trim();
    if reference.is_empty() || reference.to_ascii_lowercase().starts_with("data:") {
        return String::new();
    }

    let raw_path = if reference.starts_with("//") {
        Url::parse(&format!("https:{reference}"))
            .map(|url| url.path().to_string())
            .unwrap_or_else(|_| reference.to_string())
    } else {
        match Url::parse(reference) {
            Ok(url) if url.has_host() => url.path().to_string(),
            _ => reference
                .split(['?', '#'])
                .next()
                .unwrap_or_default()
                .to_string(),
        }
    };

    let decoded = urlencoding::decode(&raw_path)
        .map(|cow| cow.into_owned())
        .unwrap_or(raw_path);
    let mut path = decoded.replace('\\', "/").to_lowercase();

    loop {
        if let Some(rest) = path.strip_prefix("./") {
            path = rest.to_string();
        } else if let Some(rest) = path.strip_prefix("../") {
            path = rest.to_string();
        } else if let Some(rest) = path.strip_prefix('/') {
            path = rest.to_string();
        } else {
            break;
        }
    }

    if let Some(prefix) = strip_prefix {
        let prefix = prefix.trim_matches('/').to_lowercase();
        if !prefix.is_empty() {
            if let Some(rest) = path.strip_prefix(&format!("{prefix}/")) {
                path = rest.to_string();
            }
        }
    }

    let mut segments: Vec<&str> = Vec::new();
    for segment in path.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }

    let Some(file) = segments.pop() else {
        return String::new();
    };
    let file = strip_generated_suffixes(file);
    segments.push(&file);
    segments.join("/")
}

/// Strips generator suffixes from a lowercase file name, keeping the extension.
pub fn strip_generated_suffixes(file: &str) -> String {
    let (stem, ext) = match file.rfind('.') {
        Some(dot) if dot > 0 => (&file[..dot], &file[dot..]),
        _ => (file, ""),
    };

    let mut stem = stem.to_string();
    loop {
        if let Some(found) = SIZE_SUFFIX.find(&stem) {
            stem.truncate(found.start());
            continue;
        }
        if let Some(found) = EDIT_SUFFIX.find(&stem) {
            stem.truncate(found.start());
            continue;
        }
        // Only digit-bearing runs count as hashes; long plain words stay.
        if let Some(caps) = HASH_SUFFIX.captures(&stem) {
            let hash = caps.get(1).map(|m| m.as_str()).unwrap_or_default();
            if hash.chars().any(|c| c.is_ascii_digit()) {
                let start = caps.get(0).map(|m| m.start()).unwrap_or(stem.len());
                stem.truncate(start);
                continue;
            }
        }
        break;
    }

    format!("{stem}{ext}")
}
