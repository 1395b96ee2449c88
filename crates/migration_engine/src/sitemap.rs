//! `sitemap.xml` and `robots.txt` output.

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

static LOC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<loc>\s*([^<]+?)\s*</loc>").expect("valid loc regex"));
static URL_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)[ \t]*<url>.*?</url>[ \t]*\r?\n?").expect("valid url regex"));

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SitemapEntry {
    pub loc: String,
    pub lastmod: String,
}

fn escape_xml(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            other => out.push(other),
        }
    }
    out
}

fn unescape_xml(text: &str) -> String {
    text.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

fn url_element(entry: &SitemapEntry, indent: &str) -> String {
    format!(
        "{indent}<url>\n{indent}  <loc>{}</loc>\n{indent}  <lastmod>{}</lastmod>\n{indent}</url>",
        escape_xml(&entry.loc),
        escape_xml(&entry.lastmod)
    )
}

/// A complete sitemap with one `<url>` per entry, in the given order.
pub fn render_sitemap(entries: &[SitemapEntry]) -> String {
    let mut lines = vec![
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>".to_string(),
        "<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">".to_string(),
    ];
    lines.extend(entries.iter().map(|entry| url_element(entry, "  ")));
    lines.push("</urlset>".to_string());
    lines.join("\n") + "\n"
}

/// Locations already listed in a sitemap.
pub fn sitemap_locations(xml: &str) -> HashSet<String> {
    LOC.captures_iter(xml)
        .map(|caps| unescape_xml(&caps[1]))
        .collect()
}

/// Adds entries whose `<loc>` is not listed yet, just before `</urlset>`.
///
/// Returns `None` when `xml` has no closing `</urlset>`, otherwise the new
/// text and how many entries were added.
pub fn merge_sitemap(xml: &str, entries: &[SitemapEntry]) -> Option<(String, usize)> {
    let close = xml.rfind("</urlset>")?;
    let mut known = sitemap_locations(xml);
    let additions: Vec<String> = entries
        .iter()
        .filter(|entry| known.insert(entry.loc.clone()))
        .map(|entry| url_element(entry, "  "))
        .collect();
    if additions.is_empty() {
        return Some((xml.to_string(), 0));
    }

    let (before, after) = xml.split_at(close);
    let mut merged = before.trim_end().to_string();
    merged.push('\n');
    merged.push_str(&additions.join("\n"));
    merged.push('\n');
    merged.push_str(after);
    Some((merged, additions.len()))
}

/// Drops every `<url>` whose location contains `needle`. Returns the new
/// text and how many entries were removed.
pub fn prune_sitemap(xml: &str, needle: &str) -> (String, usize) {
    let mut removed = 0;
    let pruned = URL_BLOCK.replace_all(xml, |caps: &regex::Captures<'_>| {
        let block = &caps[0];
        let drop = LOC
            .captures(block)
            .is_some_and(|loc| unescape_xml(&loc[1]).contains(needle));
        if drop {
            removed += 1;
            String::new()
        } else {
            block.to_string()
        }
    });
    (pruned.into_owned(), removed)
}

pub fn robots_txt(site_url: &str) -> String {
    format!(
        "User-agent: *\nAllow: /\nSitemap: {}/sitemap.xml\n",
        site_url.trim_end_matches('/')
    )
}
