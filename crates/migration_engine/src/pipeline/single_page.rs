use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;

use migration_core::{
    format_date_pt_br, parse_iso_date, truncate_excerpt, ExtractedArticle, LinkTable,
    MigrationReport, OutputMode, PostCollection, PostRecord,
};
use migration_logging::{migration_error, migration_info, migration_warn, PageScope};
use scraper::Html;
use serde::Serialize;
use url::Url;

use super::{load_posts, read_optional, read_site_file, save_posts, site_url};
use crate::assets::{pick_image_reference, settle_images, AssetContext, AssetNormalizer};
use crate::blog_page::{
    article_file_slug, collect_article_files, reference_files, render_single_page,
    rewrite_article_references,
};
use crate::config::SiteConfig;
use crate::dom::{render_fragment, select_all, select_first, text_of, DomEdits};
use crate::error::{MigrationError, PageError};
use crate::extract::{ArticleHints, ContentExtractor};
use crate::fetch::{fetch_page, Fetcher};
use crate::index::{discover_post_urls, slug_from_post_url};
use crate::links::LinkRewriter;
use crate::persist::{relative_posix, AtomicFileWriter};
use crate::sitemap::prune_sitemap;

pub const SINGLE_PAGE_REPORT: &str = "blog-singlepage-report.json";

/// Marker left in image paths by earlier runs that rewrote them as links.
const ANCHOR_MARKER: &str = "blog.html#post-";
const ARTICLE_LOC: &str = "/artigo-";

#[derive(Debug, Clone, Copy, Default)]
pub struct SinglePageOptions {
    /// Scrape the legacy blog again instead of reusing `posts.json`.
    pub refresh: bool,
    /// Point references at the single page and delete old article files.
    pub prune_articles: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SinglePageReport {
    #[serde(flatten)]
    pub run: MigrationReport,
    pub total_posts: usize,
    pub sitemap_entries_removed: usize,
    pub article_files_removed: Vec<String>,
    /// `"<file> (<count>)"` per file whose references were rewritten.
    pub references_fixed: Vec<String>,
    pub remaining_article_files: usize,
}

struct PostCleaner<'a> {
    rewriter: LinkRewriter<'a>,
    assets: AssetNormalizer<'a>,
    legacy_images_dir: &'a str,
    strip_prefix: Option<&'a str>,
    source_base: Option<Url>,
    excerpt_limit: usize,
}

impl PostCleaner<'_> {
    /// Scripts and styles dropped, article links pointed at anchors, `<h1>`
    /// demoted and image paths damaged by earlier runs repaired.
    fn strip_and_rewrite(&self, content: &str, slug: &str) -> (String, usize) {
        let fragment = Html::parse_fragment(content);
        let root = fragment.root_element();
        let mut edits = DomEdits::new();
        for element in select_all(root, "script, style, noscript") {
            edits.remove(element.id());
        }
        let rewritten = self.rewriter.collect(root, &mut edits);
        for heading in select_all(root, "h1") {
            edits.rename(heading.id(), "h2");
        }
        for img in select_all(root, "img[src]") {
            let src = img.value().attr("src").unwrap_or_default();
            let repaired = repair_anchor_path(src, slug, self.legacy_images_dir);
            if repaired != src {
                edits.set_attr(img.id(), "src", repaired);
            }
        }
        (render_fragment(&fragment, &edits), rewritten)
    }

    async fn clean(&self, post: &mut PostRecord, ctx: &mut AssetContext, report: &mut MigrationReport) {
        let slug = post.slug.clone();
        let content = post.content_html.take().unwrap_or_default();
        if content.trim().is_empty() {
            report.warn(format!("{slug}: empty contentHtml"));
        }
        let (stripped, rewritten) = self.strip_and_rewrite(&content, &slug);
        report.links_rewritten += rewritten;

        let base = post
            .source_url
            .as_deref()
            .and_then(|url| Url::parse(url).ok())
            .or_else(|| self.source_base.clone());
        let cleaned = self
            .assets
            .normalize_body(ctx, report, &slug, &stripped, base.as_ref())
            .await;

        let (first_image, plain_text) = {
            let fragment = Html::parse_fragment(&cleaned);
            let root = fragment.root_element();
            (select_first(root, "img").and_then(pick_image_reference), text_of(root))
        };
        match post.cover().map(str::to_string) {
            Some(cover) => {
                let cover = repair_anchor_path(&cover, &slug, self.legacy_images_dir);
                let target = self.assets.resolve_reference(&cover, base.as_ref());
                post.cover_image_path = self
                    .assets
                    .localize(ctx, report, &slug, &target)
                    .await
                    .unwrap_or(cover);
            }
            None => {
                if let Some(first) = first_image {
                    post.cover_image_path = first;
                }
            }
        }
        if post.excerpt.trim().is_empty() {
            post.excerpt = truncate_excerpt(&plain_text, self.excerpt_limit);
        }
        if post.date_human_pt_br.is_empty() {
            if let Some(date) = parse_iso_date(&post.date_iso) {
                post.date_human_pt_br = format_date_pt_br(date);
            }
        }
        post.content_html = Some(settle_images(&cleaned, post.cover(), self.strip_prefix, report));
    }
}

/// `blog.html#post-<slug>/<file>` (or `-<file>`) back to the image folder.
fn repair_anchor_path(src: &str, slug: &str, images_dir: &str) -> String {
    let file = src
        .split_once(ANCHOR_MARKER)
        .and_then(|(_, tail)| tail.strip_prefix(slug))
        .map(|rest| rest.trim_start_matches('/').trim_start_matches('-'))
        .filter(|file| !file.is_empty());
    match file {
        Some(file) => format!("{}/{slug}/{file}", images_dir.trim_end_matches('/')),
        None => src.to_string(),
    }
}

/// Scrapes the legacy blog into post records that carry their content.
async fn scrape_posts(
    config: &SiteConfig,
    fetcher: &dyn Fetcher,
    report: &mut MigrationReport,
) -> PostCollection {
    let urls = discover_post_urls(
        fetcher,
        &config.blog_index_url(),
        &config.source_base_url,
        config.discovery_pages,
    )
    .await;
    migration_info!("Discovered {} post URLs", urls.len());
    report.total_pages = urls.len();

    let host = config.source_host();
    let extractor = ContentExtractor::new(config.extraction.clone());
    let mut posts = PostCollection::new();
    for url in urls {
        let Some(slug) = slug_from_post_url(&url, &host) else {
            continue;
        };
        let _scope = PageScope::enter(&slug);
        match scrape_post(fetcher, &extractor, &url, &slug, report).await {
            Ok(Some(record)) => {
                posts.upsert(record);
                report.record_success();
            }
            Ok(None) => report.record_failure(&url, "empty content"),
            Err(err) => {
                migration_error!("Could not read {}: {}", url, err);
                report.record_failure(&url, err.to_string());
            }
        }
    }
    posts
}

async fn scrape_post(
    fetcher: &dyn Fetcher,
    extractor: &ContentExtractor,
    url: &str,
    slug: &str,
    report: &mut MigrationReport,
) -> Result<Option<PostRecord>, PageError> {
    let page = fetch_page(fetcher, url).await?;
    let extracted = extractor.extract(&page, slug, &ArticleHints::default())?;
    if extracted.body_html.trim().is_empty() {
        return Ok(None);
    }
    for warning in extracted.warnings {
        report.warn(warning);
    }
    let article = ExtractedArticle {
        slug: slug.to_string(),
        title: extracted.title,
        excerpt: extracted.excerpt,
        category: extracted.category,
        published: extracted.published,
        // Still the remote URL; localized with the rest of the content.
        cover_image_path: extracted.cover_source,
        body_html: extracted.body_html,
    };
    Ok(Some(article.to_record(Some(url.to_string()), None, true)))
}

/// Renders every post into the blog page, switching the site from
/// standalone article files to `blog.html#post-<slug>` anchors.
pub async fn run_single_page(
    config: &SiteConfig,
    fetcher: &dyn Fetcher,
    options: SinglePageOptions,
) -> Result<SinglePageReport, MigrationError> {
    let writer = AtomicFileWriter::new(config.site_root.clone());
    let blog_html = read_site_file(&config.path(&config.blog_html))?;
    let site_url = site_url(config);
    let mut report = SinglePageReport::default();

    let article_files = collect_article_files(config.root());
    let mut slugs: BTreeSet<String> = article_files
        .iter()
        .filter_map(|path| article_file_slug(path))
        .collect();

    let mut posts = match load_posts(config)? {
        Some(posts) if !options.refresh => posts,
        _ => scrape_posts(config, fetcher, &mut report.run).await,
    };
    slugs.extend(posts.slugs());

    let links = LinkTable::new(&config.source_host(), OutputMode::SinglePage).with_articles(slugs);
    let cleaner = PostCleaner {
        rewriter: LinkRewriter::new(&links),
        assets: AssetNormalizer::new(fetcher, config.asset_settings(&config.single_page_assets_dir)),
        legacy_images_dir: &config.images_dir,
        strip_prefix: config.asset_prefix_to_strip.as_deref(),
        source_base: Url::parse(&config.source_base_url).ok(),
        excerpt_limit: config.extraction.excerpt_limit,
    };
    let mut ctx = AssetContext::new();
    for post in posts.iter_mut() {
        let _scope = PageScope::enter(&post.slug);
        cleaner.clean(post, &mut ctx, &mut report.run).await;
    }
    report.total_posts = posts.len();

    save_posts(&writer, config, &posts)?;
    let rendered = render_single_page(&blog_html, &posts, &site_url, &config.site_name);
    writer.write(&config.blog_html, &rendered)?;
    migration_info!("Rendered {} posts into {}", posts.len(), config.blog_html);

    if let Some(xml) = read_optional(&config.path(&config.sitemap_file))? {
        let (pruned, removed) = prune_sitemap(&xml, ARTICLE_LOC);
        if removed > 0 {
            writer.write(&config.sitemap_file, &pruned)?;
        }
        report.sitemap_entries_removed = removed;
    }

    if options.prune_articles {
        prune_articles(config, &writer, &article_files, &mut report)?;
    }
    report.remaining_article_files = collect_article_files(config.root()).len();

    writer.write_json(SINGLE_PAGE_REPORT, &report)?;
    Ok(report)
}

fn prune_articles(
    config: &SiteConfig,
    writer: &AtomicFileWriter,
    article_files: &[PathBuf],
    report: &mut SinglePageReport,
) -> Result<(), MigrationError> {
    for path in reference_files(config.root()) {
        let Ok(text) = fs::read_to_string(&path) else {
            continue;
        };
        let (updated, count) = rewrite_article_references(&text);
        if count == 0 {
            continue;
        }
        let relative = relative_posix(config.root(), &path);
        writer.write(&relative, &updated)?;
        report.references_fixed.push(format!("{relative} ({count})"));
    }

    for path in article_files {
        let relative = relative_posix(config.root(), path);
        match fs::remove_file(path) {
            Ok(()) => report.article_files_removed.push(relative),
            Err(err) => {
                migration_warn!("Could not delete {}: {}", relative, err);
                report.run.warn(format!("could not delete {relative}: {err}"));
            }
        }
    }
    migration_info!(
        "Removed {} article files, fixed references in {} files",
        report.article_files_removed.len(),
        report.references_fixed.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anchor_paths_are_repaired() {
        assert_eq!(
            repair_anchor_path("blog.html#post-licenca/foto.jpg", "licenca", "imagens/blog"),
            "imagens/blog/licenca/foto.jpg"
        );
        assert_eq!(
            repair_anchor_path("../blog.html#post-licenca-foto.jpg", "licenca", "imagens/blog/"),
            "imagens/blog/licenca/foto.jpg"
        );
        assert_eq!(
            repair_anchor_path("imagens/blog/licenca/foto.jpg", "licenca", "imagens/blog"),
            "imagens/blog/licenca/foto.jpg"
        );
        assert_eq!(
            repair_anchor_path("blog.html#post-outro/foto.jpg", "licenca", "imagens/blog"),
            "blog.html#post-outro/foto.jpg"
        );
    }
}
