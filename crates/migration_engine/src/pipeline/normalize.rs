use migration_core::{MigrationReport, PostRecord};
use migration_logging::{migration_info, PageScope};
use scraper::Html;
use serde::Serialize;

use super::{demote_h1, load_posts, save_posts};
use crate::assets::settle_images;
use crate::config::SiteConfig;
use crate::dom::select_all;
use crate::error::MigrationError;
use crate::persist::AtomicFileWriter;

pub const NORMALIZE_REPORT: &str = "blog-normalize-report.json";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NormalizeReport {
    #[serde(flatten)]
    pub run: MigrationReport,
    pub posts_with_changes: Vec<String>,
}

/// Cleans one post's content in place. Returns true when it changed.
pub fn normalize_post(post: &mut PostRecord, strip_prefix: Option<&str>, report: &mut MigrationReport) -> bool {
    let slug = post.slug.clone();
    if post.cover().is_none() {
        report.warn(format!("{slug}: missing coverImagePath"));
    }
    let original = post.content_html.clone().unwrap_or_default();

    let html = demote_h1(&settle_images(&original, post.cover(), strip_prefix, report), "h3");

    if html.trim().is_empty() {
        report.warn(format!("{slug}: empty contentHtml"));
    }
    let has_images = !select_all(Html::parse_fragment(&html).root_element(), "img").is_empty();
    if !has_images {
        report.warn(format!("{slug}: no images in contentHtml"));
    }

    let changed = html != original;
    if changed {
        post.content_html = Some(html);
    }
    changed
}

/// Deduplicates images, wraps them in figures and demotes headings in
/// every post of `posts.json`.
pub fn run_normalize_posts(config: &SiteConfig) -> Result<NormalizeReport, MigrationError> {
    let path = config.path(&config.posts_json);
    let mut posts = load_posts(config)?.ok_or_else(|| {
        MigrationError::io(&path, std::io::Error::from(std::io::ErrorKind::NotFound))
    })?;
    let writer = AtomicFileWriter::new(config.site_root.clone());
    let mut report = NormalizeReport::default();
    report.run.total_pages = posts.len();

    let strip_prefix = config.asset_prefix_to_strip.as_deref();
    for post in posts.iter_mut() {
        let _scope = PageScope::enter(&post.slug);
        if normalize_post(post, strip_prefix, &mut report.run) {
            report.posts_with_changes.push(post.slug.clone());
        }
        report.run.record_success();
    }

    save_posts(&writer, config, &posts)?;
    writer.write_json(NORMALIZE_REPORT, &report)?;
    migration_info!(
        "Normalized {} posts: {} duplicate and {} cover images removed",
        posts.len(),
        report.run.images_removed_as_duplicate,
        report.run.cover_duplicates_removed
    );
    Ok(report)
}
