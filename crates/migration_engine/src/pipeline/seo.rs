use std::fs;
use std::path::Path;

use chrono::{DateTime, Local};
use migration_core::LinkTable;
use migration_logging::{migration_error, migration_info, PageScope};

use super::{load_posts, read_site_file, site_url};
use crate::config::SiteConfig;
use crate::error::MigrationError;
use crate::persist::{relative_posix, AtomicFileWriter};
use crate::seo::{article_slug, list_public_pages, SeoNormalizer, SeoReport};
use crate::sitemap::{render_sitemap, robots_txt, SitemapEntry};

pub const SEO_REPORT: &str = "seo-report.json";
pub const SITEMAP_REPORT: &str = "sitemap-report.json";

fn modified_date(path: &Path) -> Option<String> {
    let modified = fs::metadata(path).and_then(|meta| meta.modified()).ok()?;
    Some(DateTime::<Local>::from(modified).format("%Y-%m-%d").to_string())
}

/// Normalizes the head and images of every public page, then rewrites
/// `robots.txt` and `sitemap.xml` from scratch.
pub fn run_seo(config: &SiteConfig) -> Result<SeoReport, MigrationError> {
    let site_url = site_url(config);
    let settings = config.seo_settings(&site_url);
    let posts = load_posts(config)?.unwrap_or_default();
    let links = LinkTable::new(&config.source_host(), config.output_mode).with_articles(posts.slugs());
    let normalizer = SeoNormalizer::new(&settings, &links);
    let writer = AtomicFileWriter::new(config.site_root.clone());

    let mut report = SeoReport::default();
    let mut entries = Vec::new();
    for path in list_public_pages(config.root()) {
        let relative = relative_posix(config.root(), &path);
        let _scope = PageScope::enter(&relative);
        let html = match read_site_file(&path) {
            Ok(html) => html,
            Err(err) => {
                migration_error!("{}", err);
                continue;
            }
        };
        let post = article_slug(&relative).and_then(|slug| posts.get(slug));
        let outcome = normalizer.apply(&html, &relative, post);
        report.record(&relative, &outcome);
        if outcome.html != html {
            if let Err(err) = writer.write(&relative, &outcome.html) {
                migration_error!("Could not write {}: {}", relative, err);
            }
        }

        let lastmod = post
            .map(|post| post.date_iso.clone())
            .filter(|date| !date.is_empty())
            .or_else(|| modified_date(&path))
            .unwrap_or_default();
        entries.push(SitemapEntry {
            loc: settings.canonical_for(&relative),
            lastmod,
        });
    }

    writer.write("robots.txt", &robots_txt(&site_url))?;
    writer.write(&config.sitemap_file, &render_sitemap(&entries))?;
    writer.write_json(SITEMAP_REPORT, &entries)?;
    writer.write_json(SEO_REPORT, &report)?;
    migration_info!(
        "SEO pass over {} pages ({} articles), {} broken links",
        report.total_pages,
        report.total_posts,
        report.broken_links_count
    );
    Ok(report)
}
