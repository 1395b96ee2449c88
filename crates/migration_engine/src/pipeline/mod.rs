//! Batch commands. Each one reads the site, rewrites it and writes a JSON
//! report next to it. Page-level failures land in the report; only setup
//! failures are returned as errors.
mod cases;
mod fix_layout;
mod migrate;
mod normalize;
mod seo;
mod single_page;

use std::fs;
use std::io;
use std::path::Path;

use migration_core::PostCollection;
use scraper::Html;

use crate::config::SiteConfig;
use crate::dom::{render_fragment, select_all, DomEdits};
use crate::error::MigrationError;
use crate::persist::AtomicFileWriter;

pub use cases::{run_cases, CASES_REPORT};
pub use fix_layout::{layout_targets, run_fix_layout, LAYOUT_REPORT};
pub use migrate::{run_migrate, MIGRATION_REPORT};
pub use normalize::{normalize_post, run_normalize_posts, NormalizeReport, NORMALIZE_REPORT};
pub use seo::{run_seo, SEO_REPORT, SITEMAP_REPORT};
pub use single_page::{
    run_single_page, SinglePageOptions, SinglePageReport, SINGLE_PAGE_REPORT,
};

pub(crate) fn read_site_file(path: &Path) -> Result<String, MigrationError> {
    let bytes = fs::read(path).map_err(|err| MigrationError::io(path, err))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Text of an optional site file; `None` when it does not exist.
pub(crate) fn read_optional(path: &Path) -> Result<Option<String>, MigrationError> {
    match fs::read(path) {
        Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(None),
        Err(err) => Err(MigrationError::io(path, err)),
    }
}

pub(crate) fn load_posts(config: &SiteConfig) -> Result<Option<PostCollection>, MigrationError> {
    let path = config.path(&config.posts_json);
    let Some(text) = read_optional(&path)? else {
        return Ok(None);
    };
    PostCollection::from_json(&text)
        .map(Some)
        .map_err(|source| MigrationError::Json { path, source })
}

pub(crate) fn save_posts(
    writer: &AtomicFileWriter,
    config: &SiteConfig,
    posts: &PostCollection,
) -> Result<(), MigrationError> {
    let text = posts.to_json().map_err(|source| MigrationError::Json {
        path: config.path(&config.posts_json),
        source,
    })?;
    writer.write(&config.posts_json, &text)?;
    Ok(())
}

/// Published site URL: configured value, then the `CNAME` file, then the
/// canonical link of the blog page, then the default deployment.
pub(crate) fn site_url(config: &SiteConfig) -> String {
    if config.site_url.is_some() {
        return config.resolve_site_url(None);
    }
    if let Ok(cname) = fs::read_to_string(config.path("CNAME")) {
        let domain = cname.trim().trim_end_matches('/');
        if !domain.is_empty() {
            return format!("https://{domain}");
        }
    }
    let blog_html = fs::read_to_string(config.path(&config.blog_html)).ok();
    config.resolve_site_url(blog_html.as_deref())
}

/// Renames every `<h1>` of a fragment to `tag`.
pub(crate) fn demote_h1(html: &str, tag: &str) -> String {
    let fragment = Html::parse_fragment(html);
    let headings = select_all(fragment.root_element(), "h1");
    if headings.is_empty() {
        return html.to_string();
    }
    let mut edits = DomEdits::new();
    for heading in headings {
        edits.rename(heading.id(), tag);
    }
    render_fragment(&fragment, &edits)
}

/// Number of directories between the site root and a POSIX relative path.
pub(crate) fn page_depth(relative: &str) -> usize {
    relative.matches('/').count()
}
