//! Search-engine metadata for finished pages: one `<h1>`, image attributes,
//! a normalized `<head>` and a relative broken-link check.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use migration_core::{fold_accents, truncate_excerpt, LinkTable, PostRecord, DEFAULT_EXCERPT_LIMIT};
use scraper::{ElementRef, Html};
use serde::Serialize;
use serde_json::{json, Value};

use crate::compose::{depth_prefix, ensure_doctype};
use crate::dom::{
    closest, document_all, document_first, escape_html, render_attrs, render_document, select_all,
    text_of, DomEdits,
};
use crate::image_size::image_size_of_file;
use crate::links::LinkRewriter;
use crate::template::is_relative_reference;

const VIEWPORT: &str = "width=device-width, initial-scale=1";
const TITLE_SEPARATORS: &[char] = &['|', '-', '–', '—', '\\'];

/// Site-wide values written into every page head.
#[derive(Debug, Clone)]
pub struct SeoSettings {
    pub site_root: PathBuf,
    /// Absolute site URL without trailing slash.
    pub site_url: String,
    pub site_name: String,
    pub default_description: String,
    /// Root-relative logo used for `og:image` and the organization logo when
    /// the file exists.
    pub logo_path: String,
    pub icon_href: String,
    pub apple_touch_icon_href: String,
    pub manifest_href: String,
    pub description_limit: usize,
}

impl SeoSettings {
    pub fn new(site_root: PathBuf, site_url: &str, site_name: &str) -> Self {
        Self {
            site_root,
            site_url: site_url.trim_end_matches('/').to_string(),
            site_name: site_name.to_string(),
            default_description: format!(
                "{site_name}: consultoria em licenciamento ambiental e gestão de projetos."
            ),
            logo_path: "imagens/logo/logo12-1.png".to_string(),
            icon_href: "assets/icons/favicon.svg".to_string(),
            apple_touch_icon_href: "imagens/logo/logo12-1.png".to_string(),
            manifest_href: "site.webmanifest".to_string(),
            description_limit: DEFAULT_EXCERPT_LIMIT,
        }
    }

    /// `site_url` joined with a root-relative path; absolute values pass through.
    pub fn absolute_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }
        format!("{}/{}", self.site_url, path.trim_start_matches('/'))
    }

    /// Canonical URL of a page given its path relative to the site root.
    pub fn canonical_for(&self, relative: &str) -> String {
        if relative == "index.html" {
            format!("{}/", self.site_url)
        } else {
            self.absolute_url(relative)
        }
    }

    fn logo_url(&self) -> Option<String> {
        self.site_root
            .join(&self.logo_path)
            .is_file()
            .then(|| self.absolute_url(&self.logo_path))
    }
}

/// Aggregate counters written to `seo-report.json`.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeoReport {
    pub total_pages: usize,
    pub total_posts: usize,
    pub pages_with_title: usize,
    pub pages_with_description: usize,
    pub pages_with_canonical: usize,
    #[serde(rename = "pagesWithOG")]
    pub pages_with_og: usize,
    pub pages_with_structured_data: usize,
    pub broken_links_count: usize,
    pub images_missing_alt_count: usize,
    pub links_rewritten: usize,
    pub broken_links: BTreeMap<String, Vec<String>>,
}

impl SeoReport {
    pub fn record(&mut self, relative: &str, outcome: &SeoOutcome) {
        self.total_pages += 1;
        if outcome.is_article {
            self.total_posts += 1;
        }
        if !outcome.title.is_empty() {
            self.pages_with_title += 1;
        }
        if !outcome.description.is_empty() {
            self.pages_with_description += 1;
        }
        if !outcome.canonical.is_empty() {
            self.pages_with_canonical += 1;
        }
        if outcome.og_image.is_some() {
            self.pages_with_og += 1;
        }
        self.pages_with_structured_data += 1;
        self.images_missing_alt_count += outcome.images_missing_alt;
        self.links_rewritten += outcome.links_rewritten;
        if !outcome.broken_links.is_empty() {
            self.broken_links_count += outcome.broken_links.len();
            self.broken_links
                .insert(relative.to_string(), outcome.broken_links.clone());
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SeoOutcome {
    pub html: String,
    pub title: String,
    pub description: String,
    pub canonical: String,
    pub og_image: Option<String>,
    pub is_article: bool,
    pub images_missing_alt: usize,
    pub links_rewritten: usize,
    pub broken_links: Vec<String>,
}

/// Slug of an `artigo-<slug>.html` file name.
pub fn article_slug(relative: &str) -> Option<&str> {
    let name = relative.rsplit('/').next().unwrap_or(relative);
    name.strip_prefix("artigo-")?.strip_suffix(".html")
}

pub struct SeoNormalizer<'a> {
    settings: &'a SeoSettings,
    links: &'a LinkTable,
}

impl<'a> SeoNormalizer<'a> {
    pub fn new(settings: &'a SeoSettings, links: &'a LinkTable) -> Self {
        Self { settings, links }
    }

    /// Normalizes one page. `relative` is its POSIX path below the site root
    /// and `post` the posts.json row when the page is an article.
    pub fn apply(&self, html: &str, relative: &str, post: Option<&PostRecord>) -> SeoOutcome {
        let doc = Html::parse_document(html);
        let mut edits = DomEdits::new();
        let root = doc.root_element();
        let depth = relative.matches('/').count();
        let page_dir = match relative.rsplit_once('/') {
            Some((dir, _)) => self.settings.site_root.join(dir),
            None => self.settings.site_root.clone(),
        };

        let h1s = document_all(&doc, "h1");
        for extra in h1s.iter().skip(1) {
            edits.rename(extra.id(), "h2");
        }
        let links_rewritten = LinkRewriter::new(self.links).collect(root, &mut edits);
        let images_missing_alt = self.process_images(&doc, &page_dir, &mut edits);

        let head = self.normalize_head(&doc, relative, depth, post, &mut edits);
        let broken_links = self.broken_links(&doc, &page_dir, &edits);

        let html = ensure_doctype(html, render_document(&doc, &edits));
        SeoOutcome {
            html,
            title: head.title,
            description: head.description,
            canonical: head.canonical,
            og_image: head.og_image,
            is_article: head.is_article,
            images_missing_alt,
            links_rewritten,
            broken_links,
        }
    }

    /// Alt text, `decoding`, `loading` and intrinsic size for every image.
    /// Returns how many images are left with an empty alt.
    fn process_images(&self, doc: &Html, page_dir: &Path, edits: &mut DomEdits) -> usize {
        let mut missing_alt = 0;
        let mut first_content_image = true;
        for img in document_all(doc, "img") {
            let value = img.value();
            let src = value.attr("src").unwrap_or_default();

            let mut alt = value.attr("alt").unwrap_or_default().trim().to_string();
            if alt.is_empty() {
                alt = guess_alt_text(src, &self.settings.site_name);
                edits.set_attr(img.id(), "alt", alt.clone());
            }
            if alt.is_empty() {
                missing_alt += 1;
            }
            if value.attr("decoding").is_none() {
                edits.set_attr(img.id(), "decoding", "async");
            }

            let classes = value.attr("class").unwrap_or_default().to_lowercase();
            let is_logo = alt.to_lowercase().contains("logo")
                || classes.contains("logo")
                || closest(img, &["header", "nav"]).is_some();
            let in_main = closest(img, &["main"]).is_some();
            if !is_logo && first_content_image && in_main {
                edits.set_attr(img.id(), "loading", "eager");
                first_content_image = false;
            } else if value.attr("loading").is_none() {
                edits.set_attr(img.id(), "loading", if is_logo { "eager" } else { "lazy" });
            }

            if is_relative_reference(src) {
                let clean = src.split(['?', '#']).next().unwrap_or_default();
                let decoded = urlencoding::decode(clean)
                    .map(|cow| cow.into_owned())
                    .unwrap_or_else(|_| clean.to_string());
                if let Some((width, height)) = image_size_of_file(&page_dir.join(decoded)) {
                    if value.attr("width").is_none() {
                        edits.set_attr(img.id(), "width", width.to_string());
                    }
                    if value.attr("height").is_none() {
                        edits.set_attr(img.id(), "height", height.to_string());
                    }
                }
            }
        }
        missing_alt
    }

    fn normalize_head(
        &self,
        doc: &Html,
        relative: &str,
        depth: usize,
        post: Option<&PostRecord>,
        edits: &mut DomEdits,
    ) -> HeadSummary {
        let settings = self.settings;
        let html_element = doc.root_element();
        edits.set_attr(html_element.id(), "lang", "pt-BR");

        let Some(head) = document_first(doc, "head") else {
            return HeadSummary::default();
        };
        let mut managed = HeadEdits { head, edits };

        let charsets = select_all(head, "meta[charset]");
        let viewports = select_all(head, "meta[name=\"viewport\"]");
        let viewport_tag = format!("<meta name=\"viewport\" content=\"{VIEWPORT}\">");
        match charsets.split_first() {
            Some((first, extras)) => {
                managed.edits.set_attr(first.id(), "charset", "utf-8");
                for extra in extras {
                    managed.edits.remove(extra.id());
                }
                if viewports.is_empty() {
                    managed.edits.insert_after(first.id(), viewport_tag);
                }
            }
            None if viewports.is_empty() => managed
                .edits
                .prepend_html(head.id(), format!("<meta charset=\"utf-8\">{viewport_tag}")),
            None => managed.edits.prepend_html(head.id(), "<meta charset=\"utf-8\">"),
        }
        if let Some((first, extras)) = viewports.split_first() {
            managed.edits.set_attr(first.id(), "content", VIEWPORT);
            for extra in extras {
                managed.edits.remove(extra.id());
            }
        }

        let h1_text = document_first(doc, "h1").map(text_of).unwrap_or_default();
        let title_tag = document_first(doc, "head title");
        let mut title = title_tag.map(text_of).unwrap_or_default();
        if title.is_empty() {
            title = if h1_text.is_empty() {
                settings.site_name.clone()
            } else {
                h1_text.clone()
            };
        }
        let title = branded_title(&title, &settings.site_name);
        match title_tag {
            Some(tag) => managed.edits.set_inner_html(tag.id(), escape_html(&title)),
            None => managed
                .edits
                .append_html(head.id(), format!("<title>{}</title>", escape_html(&title))),
        }

        let slug = article_slug(relative);
        let existing = select_all(head, "meta[name=\"description\"]")
            .into_iter()
            .find_map(|meta| meta.value().attr("content").map(str::trim))
            .filter(|content| !content.is_empty())
            .map(str::to_string);
        let description = match existing {
            Some(text) => fit_description(&text, settings.description_limit),
            None => {
                let candidate = post
                    .map(|p| p.excerpt.trim().to_string())
                    .filter(|excerpt| !excerpt.is_empty())
                    .or_else(|| find_description(doc, settings.description_limit))
                    .unwrap_or_else(|| settings.default_description.clone());
                fit_description(&candidate, settings.description_limit)
            }
        };
        managed.meta_name("description", Some(&description));

        let canonical = settings.canonical_for(relative);
        managed.link("canonical", &canonical);

        let logo = settings.logo_url();
        let og_image = post
            .and_then(PostRecord::cover)
            .map(|cover| settings.absolute_url(cover))
            .or_else(|| logo.clone());

        let og_type = if slug.is_some() { "article" } else { "website" };
        managed.meta_property("og:title", Some(&title));
        managed.meta_property("og:description", Some(&description));
        managed.meta_property("og:url", Some(&canonical));
        managed.meta_property("og:type", Some(og_type));
        managed.meta_property("og:image", og_image.as_deref());
        managed.meta_property("og:site_name", Some(&settings.site_name));

        let card = if og_image.is_some() { "summary_large_image" } else { "summary" };
        managed.meta_name("twitter:card", Some(card));
        managed.meta_name("twitter:title", Some(&title));
        managed.meta_name("twitter:description", Some(&description));
        managed.meta_name("twitter:image", og_image.as_deref());

        let prefix = depth_prefix(depth);
        managed.link("icon", &format!("{prefix}{}", settings.icon_href));
        managed.link(
            "apple-touch-icon",
            &format!("{prefix}{}", settings.apple_touch_icon_href),
        );
        managed.link("manifest", &format!("{prefix}{}", settings.manifest_href));

        let published = slug.and(post).map(|p| p.date_iso.as_str());
        if slug.is_some() {
            managed.meta_property("article:published_time", published);
            managed.meta_property("article:modified_time", published);
        }

        for script in select_all(head, "script#structured-data") {
            managed.edits.remove(script.id());
        }
        let graph = structured_data(
            settings,
            slug.map(|_| BlogPostingFields {
                headline: if h1_text.is_empty() { &title } else { &h1_text },
                description: &description,
                image: og_image.as_deref(),
                published,
                canonical: &canonical,
            }),
            logo.as_deref(),
        );
        managed.edits.append_html(
            head.id(),
            format!(
                "<script type=\"application/ld+json\" id=\"structured-data\">{}</script>",
                script_safe_json(&graph)
            ),
        );

        HeadSummary {
            title,
            description,
            canonical,
            og_image,
            is_article: slug.is_some(),
        }
    }

    fn broken_links(&self, doc: &Html, page_dir: &Path, edits: &DomEdits) -> Vec<String> {
        let mut broken = Vec::new();
        for anchor in document_all(doc, "a[href]") {
            if edits.is_removed(anchor.id()) {
                continue;
            }
            let Some(href) = edits.attr(anchor, "href") else {
                continue;
            };
            let path = href.split(['#', '?']).next().unwrap_or_default();
            let lower = path.to_ascii_lowercase();
            if path.is_empty()
                || lower.starts_with("http")
                || lower.starts_with("//")
                || lower.starts_with("mailto:")
                || lower.starts_with("tel:")
                || lower.starts_with("javascript:")
                || lower.starts_with("data:")
            {
                continue;
            }
            let decoded = urlencoding::decode(path)
                .map(|cow| cow.into_owned())
                .unwrap_or_else(|_| path.to_string());
            let target = match decoded.strip_prefix('/') {
                Some(rooted) => self.settings.site_root.join(rooted),
                None => page_dir.join(&decoded),
            };
            if !target.exists() && !broken.contains(&path.to_string()) {
                broken.push(path.to_string());
            }
        }
        broken
    }
}

#[derive(Debug, Default)]
struct HeadSummary {
    title: String,
    description: String,
    canonical: String,
    og_image: Option<String>,
    is_article: bool,
}

/// Replace-or-append helpers for the tags the normalizer owns.
struct HeadEdits<'h, 'e> {
    head: ElementRef<'h>,
    edits: &'e mut DomEdits,
}

impl HeadEdits<'_, '_> {
    fn replace(&mut self, css: &str, tag: Option<String>) {
        for existing in select_all(self.head, css) {
            self.edits.remove(existing.id());
        }
        if let Some(tag) = tag {
            self.edits.append_html(self.head.id(), tag);
        }
    }

    fn meta_name(&mut self, name: &str, content: Option<&str>) {
        let tag = content.map(|content| {
            meta_tag(&[("name", name), ("content", content)])
        });
        self.replace(&format!("meta[name=\"{name}\"]"), tag);
    }

    fn meta_property(&mut self, property: &str, content: Option<&str>) {
        let tag = content.map(|content| {
            meta_tag(&[("property", property), ("content", content)])
        });
        self.replace(&format!("meta[property=\"{property}\"]"), tag);
    }

    fn link(&mut self, rel: &str, href: &str) {
        let attrs = [
            ("rel".to_string(), rel.to_string()),
            ("href".to_string(), href.to_string()),
        ];
        self.replace(
            &format!("link[rel~=\"{rel}\"]"),
            Some(format!("<link{}>", render_attrs(&attrs))),
        );
    }
}

fn meta_tag(pairs: &[(&str, &str)]) -> String {
    let attrs: Vec<(String, String)> = pairs
        .iter()
        .map(|(key, value)| (key.to_string(), value.to_string()))
        .collect();
    format!("<meta{}>", render_attrs(&attrs))
}

struct BlogPostingFields<'a> {
    headline: &'a str,
    description: &'a str,
    image: Option<&'a str>,
    published: Option<&'a str>,
    canonical: &'a str,
}

fn structured_data(
    settings: &SeoSettings,
    article: Option<BlogPostingFields<'_>>,
    logo: Option<&str>,
) -> Value {
    let mut graph = vec![
        json!({
            "@type": "Organization",
            "name": settings.site_name,
            "url": settings.site_url,
            "logo": logo,
        }),
        json!({
            "@type": "WebSite",
            "name": settings.site_name,
            "url": settings.site_url,
        }),
    ];
    if let Some(article) = article {
        graph.push(json!({
            "@type": "BlogPosting",
            "headline": article.headline,
            "description": article.description,
            "image": article.image,
            "datePublished": article.published,
            "dateModified": article.published,
            "author": { "@type": "Organization", "name": settings.site_name },
            "publisher": {
                "@type": "Organization",
                "name": settings.site_name,
                "logo": logo.map(|url| json!({ "@type": "ImageObject", "url": url })),
            },
            "mainEntityOfPage": { "@type": "WebPage", "@id": article.canonical },
        }));
    }
    json!({ "@context": "https://schema.org", "@graph": graph })
}

/// JSON text that cannot close the surrounding `<script>` element.
pub fn script_safe_json(value: &Value) -> String {
    value.to_string().replace("</", "<\\/")
}

/// Title carrying the brand exactly once: a repeated trailing
/// `| Brand` is dropped, a missing brand is appended.
pub fn branded_title(title: &str, brand: &str) -> String {
    let fold = |text: &str| -> Vec<char> {
        fold_accents(text)
            .chars()
            .map(|c| c.to_ascii_lowercase())
            .collect()
    };
    let brand_folded = fold(brand);
    let mut title = title.trim().to_string();

    while count_occurrences(&fold(&title), &brand_folded) > 1 {
        match strip_trailing_brand(&title, &brand_folded) {
            Some(stripped) => title = stripped,
            None => break,
        }
    }
    if count_occurrences(&fold(&title), &brand_folded) == 0 {
        title = format!("{title} | {brand}");
    }
    title
}

fn count_occurrences(haystack: &[char], needle: &[char]) -> usize {
    if needle.is_empty() || haystack.len() < needle.len() {
        return 0;
    }
    haystack.windows(needle.len()).filter(|w| *w == needle).count()
}

fn strip_trailing_brand(title: &str, brand_folded: &[char]) -> Option<String> {
    let chars: Vec<char> = title.trim_end().chars().collect();
    let folded: Vec<char> = fold_accents(&chars.iter().collect::<String>())
        .chars()
        .map(|c| c.to_ascii_lowercase())
        .collect();
    if !folded.ends_with(brand_folded) {
        return None;
    }
    let mut end = chars.len() - brand_folded.len();
    while end > 0 && chars[end - 1].is_whitespace() {
        end -= 1;
    }
    if end == 0 || !TITLE_SEPARATORS.contains(&chars[end - 1]) {
        return None;
    }
    end -= 1;
    Some(chars[..end].iter().collect::<String>().trim_end().to_string())
}

/// Text already cut by [`truncate_excerpt`] is kept as is.
fn fit_description(text: &str, limit: usize) -> String {
    let collapsed = migration_core::collapse_whitespace(text);
    if collapsed.ends_with("...") && collapsed.chars().count() <= limit + 3 {
        return collapsed;
    }
    truncate_excerpt(&collapsed, limit)
}

/// First paragraph or list item of 40+ characters in `<main>`, `<article>`
/// or the body, falling back to the container's whole text.
pub fn find_description(doc: &Html, limit: usize) -> Option<String> {
    let container = document_first(doc, "main")
        .or_else(|| document_first(doc, "article"))
        .or_else(|| document_first(doc, "body"))?;
    for block in select_all(container, "p, li") {
        let text = text_of(block);
        if text.chars().count() >= 40 {
            return Some(truncate_excerpt(&text, limit));
        }
    }
    let text = text_of(container);
    (!text.is_empty()).then(|| truncate_excerpt(&text, limit))
}

/// Readable alt text from an image file name.
pub fn guess_alt_text(src: &str, site_name: &str) -> String {
    let path = src.split(['?', '#']).next().unwrap_or_default();
    let file = path.rsplit('/').next().unwrap_or_default();
    if file.is_empty() || src.starts_with("data:") {
        return String::new();
    }
    let stem = file.rsplit_once('.').map_or(file, |(stem, _)| stem);
    let words: Vec<&str> = stem
        .split(['-', '_'])
        .flat_map(str::split_whitespace)
        .filter(|word| !word.chars().all(|c| c.is_ascii_digit()))
        .collect();
    let name = words.join(" ");
    if name.to_lowercase().contains("logo") {
        return format!("Logo {site_name}");
    }
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

/// Public pages for the SEO pass: every `.html` below `root` outside the
/// tooling and asset directories, sorted by path.
pub fn list_public_pages(root: &Path) -> Vec<PathBuf> {
    const SKIPPED: &[&str] = &["scripts", "data", "imagens", "assets", ".git"];
    let mut pages = Vec::new();
    let mut pending = vec![root.to_path_buf()];
    while let Some(dir) = pending.pop() {
        let Ok(entries) = std::fs::read_dir(&dir) else {
            continue;
        };
        for entry in entries.flatten() {
            let path = entry.path();
            let name = entry.file_name().to_string_lossy().to_string();
            if path.is_dir() {
                if !SKIPPED.contains(&name.as_str()) {
                    pending.push(path);
                }
            } else if name.to_ascii_lowercase().ends_with(".html") {
                pages.push(path);
            }
        }
    }
    pages.sort();
    pages
}
