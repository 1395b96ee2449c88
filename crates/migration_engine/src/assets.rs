use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};

use chrono::Utc;
use migration_core::{normalize_asset_key, MigrationReport};
use migration_logging::{migration_debug, migration_warn};
use scraper::{ElementRef, Html};
use url::Url;

use crate::dom::{render_fragment, select_all, DomEdits};
use crate::extract::absolutize;
use crate::filename::{extension, fallback_image_name, sanitize_filename, with_numeric_suffix};
use crate::persist::AtomicFileWriter;
use crate::{FetchOutput, Fetcher};

/// Image source attributes in priority order; lazy loaders come first.
pub const IMAGE_SOURCE_ATTRS: &[&str] = &[
    "data-src",
    "data-lazy-src",
    "nitro-lazy-src",
    "data-original",
    "src",
];

pub const SRCSET_ATTRS: &[&str] = &["srcset", "nitro-lazy-srcset", "data-srcset"];

/// Dropped from an image once its `src` points at a local file.
pub const LAZY_LOAD_ATTRS: &[&str] = &[
    "srcset",
    "sizes",
    "data-src",
    "data-lazy-src",
    "nitro-lazy-src",
    "nitro-lazy-srcset",
    "data-srcset",
    "data-original",
    "nitro-lazy-empty",
];

const FIGURE_CLASS: &str = "post-figure";

/// The best source reference of an `<img>`, as written in the markup.
pub fn pick_image_reference(element: ElementRef<'_>) -> Option<String> {
    let attrs = element.value();
    IMAGE_SOURCE_ATTRS
        .iter()
        .filter_map(|name| attrs.attr(name))
        .map(str::trim)
        .find(|value| !value.is_empty() && !value.to_ascii_lowercase().starts_with("data:"))
        .or_else(|| {
            SRCSET_ATTRS
                .iter()
                .filter_map(|name| attrs.attr(name))
                .find_map(first_srcset_url)
        })
        .map(str::to_string)
}

/// `pick_image_reference` resolved against the page URL.
pub fn pick_image_url(element: ElementRef<'_>, base: Option<&Url>) -> Option<String> {
    pick_image_reference(element).map(|reference| absolutize(&reference, base))
}

pub fn first_srcset_url(srcset: &str) -> Option<&str> {
    srcset
        .split(',')
        .filter_map(|candidate| candidate.split_whitespace().next())
        .find(|url| !url.is_empty() && !url.to_ascii_lowercase().starts_with("data:"))
}

#[derive(Debug, Clone)]
pub struct AssetSettings {
    pub site_root: PathBuf,
    /// Site-relative directory holding one folder per slug.
    pub images_dir: String,
    /// Prefix stripped when comparing image paths, e.g. the project folder.
    pub strip_prefix: Option<String>,
}

/// Per-run download bookkeeping, owned by the control loop.
#[derive(Debug, Default)]
pub struct AssetContext {
    cache: HashMap<(String, String), String>,
    claimed: HashMap<PathBuf, String>,
}

impl AssetContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cached(&self, slug: &str, url: &str) -> Option<&str> {
        self.cache
            .get(&(slug.to_string(), url.to_string()))
            .map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.cache.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cache.is_empty()
    }

    fn remember(&mut self, slug: &str, url: &str, absolute: PathBuf, relative: &str) {
        self.claimed.insert(absolute, url.to_string());
        self.cache
            .insert((slug.to_string(), url.to_string()), relative.to_string());
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupOutcome {
    pub html: String,
    pub removed_duplicates: usize,
    pub removed_cover: usize,
}

/// Downloads remote images next to the migrated pages and rewrites
/// references to the local copies.
pub struct AssetNormalizer<'a> {
    fetcher: &'a dyn Fetcher,
    settings: AssetSettings,
    writer: AtomicFileWriter,
}

impl<'a> AssetNormalizer<'a> {
    pub fn new(fetcher: &'a dyn Fetcher, settings: AssetSettings) -> Self {
        let writer = AtomicFileWriter::new(settings.site_root.clone());
        Self {
            fetcher,
            settings,
            writer,
        }
    }

    pub fn settings(&self) -> &AssetSettings {
        &self.settings
    }

    fn images_prefix(&self) -> String {
        format!("{}/", self.settings.images_dir.trim_matches('/'))
    }

    /// True for references that already point into the local images folder.
    pub fn is_local(&self, reference: &str) -> bool {
        let trimmed = reference.trim().trim_start_matches("./");
        !trimmed.contains("://") && trimmed.starts_with(&self.images_prefix())
    }

    /// `reference` as [`Self::localize`] expects it: local images and files
    /// present below the site root stay as they are, anything else is joined
    /// onto `base`.
    pub fn resolve_reference(&self, reference: &str, base: Option<&Url>) -> String {
        if self.is_local(reference) || self.local_source(reference).is_some() {
            reference.to_string()
        } else {
            absolutize(reference, base)
        }
    }

    /// Local site-relative path for `url`, downloading it on first sight.
    ///
    /// Failures are recorded as report warnings and yield `None`.
    pub async fn localize(
        &self,
        ctx: &mut AssetContext,
        report: &mut MigrationReport,
        slug: &str,
        url: &str,
    ) -> Option<String> {
        let url = url.trim();
        if url.is_empty() || url.to_ascii_lowercase().starts_with("data:") {
            return None;
        }
        if self.is_local(url) {
            return Some(url.trim_start_matches("./").to_string());
        }
        if let Some(hit) = ctx.cached(slug, url) {
            return Some(hit.to_string());
        }
        if let Some(source) = self.local_source(url) {
            return self.copy_local(ctx, report, slug, url, &source);
        }
        let url = if url.starts_with("//") {
            format!("https:{url}")
        } else {
            url.to_string()
        };
        let url = url.as_str();
        let parsed = match Url::parse(url) {
            Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => parsed,
            _ => {
                report.warn(format!("{slug}: cannot resolve image reference {url}"));
                return None;
            }
        };

        let dir = format!("{}{}", self.images_prefix(), sanitize_filename(slug));
        match file_name_from_url(&parsed) {
            Some(name) => {
                let mut n = 0;
                loop {
                    let candidate = if n == 0 {
                        name.clone()
                    } else {
                        with_numeric_suffix(&name, n)
                    };
                    let relative = format!("{dir}/{candidate}");
                    let absolute = self.settings.site_root.join(&relative);
                    let owner = ctx.claimed.get(&absolute).cloned();
                    match owner.as_deref() {
                        Some(owner) if owner != url => {
                            n += 1;
                            continue;
                        }
                        Some(_) => {
                            ctx.remember(slug, url, absolute, &relative);
                            return Some(relative);
                        }
                        None => {}
                    }
                    if is_non_empty_file(&absolute) {
                        migration_debug!("Reusing existing image {}", relative);
                        ctx.remember(slug, url, absolute, &relative);
                        return Some(relative);
                    }
                    let output = self.download(report, slug, url).await?;
                    return self.store(ctx, report, slug, url, &relative, &output.bytes);
                }
            }
            None => {
                let output = self.download(report, slug, url).await?;
                let name = fallback_image_name(
                    url,
                    Utc::now().timestamp(),
                    output.metadata.content_type.as_deref(),
                );
                let mut n = 0;
                let relative = loop {
                    let candidate = if n == 0 {
                        name.clone()
                    } else {
                        with_numeric_suffix(&name, n)
                    };
                    let relative = format!("{dir}/{candidate}");
                    let absolute = self.settings.site_root.join(&relative);
                    if !ctx.claimed.contains_key(&absolute) && !absolute.exists() {
                        break relative;
                    }
                    n += 1;
                };
                self.store(ctx, report, slug, url, &relative, &output.bytes)
            }
        }
    }

    /// Existing file below the site root that a relative reference names.
    fn local_source(&self, reference: &str) -> Option<PathBuf> {
        if reference.contains("://") || reference.starts_with("//") {
            return None;
        }
        let path = reference.split(['?', '#']).next().unwrap_or_default();
        let decoded = urlencoding::decode(path)
            .map(|cow| cow.into_owned())
            .unwrap_or_else(|_| path.to_string());
        let relative = decoded.trim_start_matches("./").trim_start_matches('/');
        if relative.is_empty() {
            return None;
        }
        let absolute = self.settings.site_root.join(relative);
        absolute.is_file().then_some(absolute)
    }

    /// Copies an image that already lives in the site into the slug folder.
    fn copy_local(
        &self,
        ctx: &mut AssetContext,
        report: &mut MigrationReport,
        slug: &str,
        reference: &str,
        source: &Path,
    ) -> Option<String> {
        let name = source
            .file_name()
            .map(|n| sanitize_filename(&n.to_string_lossy()))
            .unwrap_or_else(|| "imagem".to_string());
        let relative = format!("{}{}/{}", self.images_prefix(), sanitize_filename(slug), name);
        let absolute = self.settings.site_root.join(&relative);
        if is_non_empty_file(&absolute) {
            ctx.remember(slug, reference, absolute, &relative);
            return Some(relative);
        }
        match fs::read(source) {
            Ok(bytes) => self.store(ctx, report, slug, reference, &relative, &bytes),
            Err(err) => {
                report.warn(format!(
                    "{slug}: could not copy {}: {err}",
                    source.display()
                ));
                None
            }
        }
    }

    async fn download(
        &self,
        report: &mut MigrationReport,
        slug: &str,
        url: &str,
    ) -> Option<FetchOutput> {
        match self.fetcher.fetch(url).await {
            Ok(output) if output.bytes.is_empty() => {
                migration_warn!("Empty image body from {}", url);
                report.warn(format!("{slug}: empty image {url}"));
                None
            }
            Ok(output) => Some(output),
            Err(err) => {
                migration_warn!("Image download failed for {}: {}", url, err);
                report.warn(format!("{slug}: image download failed for {url}: {err}"));
                None
            }
        }
    }

    fn store(
        &self,
        ctx: &mut AssetContext,
        report: &mut MigrationReport,
        slug: &str,
        url: &str,
        relative: &str,
        bytes: &[u8],
    ) -> Option<String> {
        match self.writer.write_bytes(relative, bytes) {
            Ok(absolute) => {
                report.images_downloaded += 1;
                ctx.remember(slug, url, absolute, relative);
                Some(relative.to_string())
            }
            Err(err) => {
                report.warn(format!("{slug}: could not save image {relative}: {err}"));
                None
            }
        }
    }

    /// Localizes every `<img>` in `body_html`. Images that cannot be
    /// localized keep their original markup.
    pub async fn normalize_body(
        &self,
        ctx: &mut AssetContext,
        report: &mut MigrationReport,
        slug: &str,
        body_html: &str,
        base: Option<&Url>,
    ) -> String {
        let fragment = Html::parse_fragment(body_html);
        let images: Vec<_> = select_all(fragment.root_element(), "img")
            .into_iter()
            .filter_map(|img| pick_image_reference(img).map(|reference| (img.id(), reference)))
            .collect();

        let mut edits = DomEdits::new();
        for (id, reference) in images {
            let target = self.resolve_reference(&reference, base);
            if let Some(local) = self.localize(ctx, report, slug, &target).await {
                edits.set_attr(id, "src", local);
                for attr in LAZY_LOAD_ATTRS {
                    edits.remove_attr(id, attr);
                }
            }
        }
        render_fragment(&fragment, &edits)
    }
}

/// Percent-decoded, sanitized last path segment; `None` without an extension.
fn file_name_from_url(url: &Url) -> Option<String> {
    let segment = url.path_segments()?.rev().find(|s| !s.is_empty())?;
    let decoded = urlencoding::decode(segment)
        .map(|cow| cow.into_owned())
        .unwrap_or_else(|_| segment.to_string());
    let name = sanitize_filename(&decoded);
    extension(&name).map(|_| name)
}

fn is_non_empty_file(path: &Path) -> bool {
    fs::metadata(path)
        .map(|meta| meta.is_file() && meta.len() > 0)
        .unwrap_or(false)
}

/// Removes images that repeat the cover or an earlier image of the body,
/// together with any `<a>`/`<figure>` wrapper left empty.
pub fn dedupe_images(body_html: &str, cover: Option<&str>, strip_prefix: Option<&str>) -> DedupOutcome {
    let fragment = Html::parse_fragment(body_html);
    let cover_key = cover
        .map(|cover| normalize_asset_key(cover, strip_prefix))
        .filter(|key| !key.is_empty());

    let mut edits = DomEdits::new();
    let mut seen = HashSet::new();
    let mut removed_duplicates = 0;
    let mut removed_cover = 0;

    for img in select_all(fragment.root_element(), "img") {
        let Some(reference) = pick_image_reference(img) else {
            continue;
        };
        let key = normalize_asset_key(&reference, strip_prefix);
        if key.is_empty() {
            continue;
        }
        if cover_key.as_deref() == Some(key.as_str()) {
            remove_image(&mut edits, img);
            removed_cover += 1;
        } else if !seen.insert(key) {
            remove_image(&mut edits, img);
            removed_duplicates += 1;
        }
    }

    DedupOutcome {
        html: render_fragment(&fragment, &edits),
        removed_duplicates,
        removed_cover,
    }
}

fn remove_image(edits: &mut DomEdits, img: ElementRef<'_>) {
    edits.remove(img.id());
    let mut current = img.parent();
    while let Some(node) = current {
        let Some(element) = ElementRef::wrap(node) else {
            break;
        };
        if !matches!(element.value().name(), "a" | "figure") || !is_emptied(element, edits) {
            break;
        }
        edits.remove(element.id());
        current = node.parent();
    }
}

/// No children left except removed nodes, blank text and comments.
fn is_emptied(element: ElementRef<'_>, edits: &DomEdits) -> bool {
    element.children().all(|child| {
        if edits.is_removed(child.id()) {
            return true;
        }
        match child.value() {
            scraper::node::Node::Text(text) => text.trim().is_empty(),
            scraper::node::Node::Comment(_) => true,
            _ => false,
        }
    })
}

/// Dedupes the body against `cover` and itself, counts the removals and
/// finishes the remaining images.
pub fn settle_images(
    body_html: &str,
    cover: Option<&str>,
    strip_prefix: Option<&str>,
    report: &mut MigrationReport,
) -> String {
    let dedup = dedupe_images(body_html, cover, strip_prefix);
    report.images_removed_as_duplicate += dedup.removed_duplicates;
    report.cover_duplicates_removed += dedup.removed_cover;
    finish_images(&dedup.html)
}

/// Adds lazy-loading hints and wraps each image in `<figure class="post-figure">`.
pub fn finish_images(body_html: &str) -> String {
    let fragment = Html::parse_fragment(body_html);
    let mut edits = DomEdits::new();

    for img in select_all(fragment.root_element(), "img") {
        edits.set_attr(img.id(), "loading", "lazy");
        edits.set_attr(img.id(), "decoding", "async");

        let mut target = img;
        if let Some(parent) = img.parent().and_then(ElementRef::wrap) {
            if parent.value().name() == "a" && only_meaningful_child(parent, img) {
                target = parent;
            }
        }

        match target.parent().and_then(ElementRef::wrap) {
            Some(figure) if figure.value().name() == "figure" => {
                let classes = edits
                    .attr(figure, "class")
                    .unwrap_or_default();
                if !classes.split_whitespace().any(|c| c == FIGURE_CLASS) {
                    let merged = format!("{classes} {FIGURE_CLASS}");
                    edits.set_attr(figure.id(), "class", merged.trim().to_string());
                }
            }
            _ => edits.wrap(target.id(), "figure", &[("class", FIGURE_CLASS)]),
        }
    }

    render_fragment(&fragment, &edits)
}

fn only_meaningful_child(parent: ElementRef<'_>, img: ElementRef<'_>) -> bool {
    parent.children().all(|child| {
        child.id() == img.id()
            || match child.value() {
                scraper::node::Node::Text(text) => text.trim().is_empty(),
                scraper::node::Node::Comment(_) => true,
                _ => false,
            }
    })
}
