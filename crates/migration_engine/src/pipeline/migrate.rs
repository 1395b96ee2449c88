use migration_core::{
    ExtractedArticle, LinkTable, MigrationReport, OutputMode, PostCollection, PostRecord,
};
use migration_logging::{migration_error, migration_info, migration_warn, PageScope};
use url::Url;

use super::{load_posts, read_optional, save_posts, site_url};
use crate::assets::{settle_images, AssetContext, AssetNormalizer};
use crate::compose::render_article_page;
use crate::config::SiteConfig;
use crate::error::{MigrationError, PageError};
use crate::extract::{ArticleHints, ContentExtractor};
use crate::fetch::{fetch_page, Fetcher};
use crate::index::{collect_index, IndexEntry};
use crate::links::LinkRewriter;
use crate::persist::AtomicFileWriter;
use crate::sitemap::{merge_sitemap, SitemapEntry};
use crate::template::Template;

pub const MIGRATION_REPORT: &str = "migration-report.json";

struct PostMigrator<'a> {
    fetcher: &'a dyn Fetcher,
    extractor: ContentExtractor,
    rewriter: LinkRewriter<'a>,
    assets: AssetNormalizer<'a>,
    template: &'a Template,
    writer: &'a AtomicFileWriter,
    site_name: &'a str,
    strip_prefix: Option<&'a str>,
    mode: OutputMode,
}

impl PostMigrator<'_> {
    async fn migrate(
        &self,
        entry: &IndexEntry,
        ctx: &mut AssetContext,
        report: &mut MigrationReport,
    ) -> Result<ExtractedArticle, PageError> {
        let page = fetch_page(self.fetcher, &entry.url).await?;
        let extracted = self
            .extractor
            .extract(&page, &entry.slug, &ArticleHints::from(entry))?;
        for warning in &extracted.warnings {
            migration_warn!("{}", warning);
            report.warn(warning.clone());
        }

        let (body, rewritten) = self.rewriter.rewrite_fragment(&extracted.body_html);
        report.links_rewritten += rewritten;

        let base = Url::parse(&page.location).ok();
        let body = self
            .assets
            .normalize_body(ctx, report, &entry.slug, &body, base.as_ref())
            .await;
        let cover = match extracted.cover_source.as_deref() {
            Some(source) => self.assets.localize(ctx, report, &entry.slug, source).await,
            None => None,
        };
        let body = settle_images(&body, cover.as_deref(), self.strip_prefix, report);

        let article = ExtractedArticle {
            slug: entry.slug.clone(),
            title: extracted.title,
            excerpt: extracted.excerpt,
            category: extracted.category,
            published: extracted.published,
            cover_image_path: cover,
            body_html: body,
        };
        let composed = render_article_page(&article, self.template, self.site_name)?;
        self.writer
            .write(&self.mode.article_destination(&article.slug), &composed.html)?;
        Ok(article)
    }
}

/// Migrates every post of the legacy blog listing into standalone
/// `artigo-<slug>.html` pages, then updates `posts.json` and the sitemap.
pub async fn run_migrate(
    config: &SiteConfig,
    fetcher: &dyn Fetcher,
) -> Result<MigrationReport, MigrationError> {
    let template = Template::load(&config.path(&config.template_file))?;
    let writer = AtomicFileWriter::new(config.site_root.clone());
    let mut report = MigrationReport::new();
    report.template_used = Some(config.template_file.clone());

    let listing = collect_index(fetcher, &config.blog_index_url(), config.max_index_pages).await?;
    migration_info!(
        "Found {} posts on {} listing page(s)",
        listing.entries.len(),
        listing.pages_visited
    );
    for warning in listing.warnings {
        report.warn(warning);
    }
    report.total_pages = listing.entries.len();

    let mode = OutputMode::ArticleFiles;
    let links = LinkTable::new(&config.source_host(), mode)
        .with_articles(listing.entries.iter().map(|entry| entry.slug.clone()));
    let migrator = PostMigrator {
        fetcher,
        extractor: ContentExtractor::new(config.extraction.clone()),
        rewriter: LinkRewriter::new(&links),
        assets: AssetNormalizer::new(fetcher, config.asset_settings(&config.images_dir)),
        template: &template,
        writer: &writer,
        site_name: &config.site_name,
        strip_prefix: config.asset_prefix_to_strip.as_deref(),
        mode,
    };

    let mut posts = load_posts(config)?.unwrap_or_else(PostCollection::new);
    let mut ctx = AssetContext::new();
    let mut migrated = Vec::new();
    for entry in &listing.entries {
        let _scope = PageScope::enter(&entry.slug);
        match migrator.migrate(entry, &mut ctx, &mut report).await {
            Ok(article) => {
                let destination = mode.article_destination(&article.slug);
                migration_info!("Wrote {}", destination);
                let record = article.to_record(Some(entry.url.clone()), Some(destination), false);
                migrated.push(record.clone());
                posts.upsert(record);
                report.record_success();
            }
            Err(err) => {
                migration_error!("Migration of {} failed: {}", entry.url, err);
                report.record_failure(&entry.url, err.to_string());
            }
        }
    }

    save_posts(&writer, config, &posts)?;
    update_sitemap(config, &writer, &migrated, &mut report)?;

    writer.write_json(MIGRATION_REPORT, &report)?;
    migration_info!(
        "Migrated {}/{} posts, {} images downloaded",
        report.succeeded,
        report.total_pages,
        report.images_downloaded
    );
    Ok(report)
}

fn update_sitemap(
    config: &SiteConfig,
    writer: &AtomicFileWriter,
    migrated: &[PostRecord],
    report: &mut MigrationReport,
) -> Result<(), MigrationError> {
    let Some(xml) = read_optional(&config.path(&config.sitemap_file))? else {
        report.warn(format!("{} not found; sitemap not updated", config.sitemap_file));
        return Ok(());
    };
    let site_url = site_url(config);
    let entries: Vec<SitemapEntry> = migrated
        .iter()
        .map(|post| SitemapEntry {
            loc: format!("{site_url}/{}", post.local_url.as_deref().unwrap_or_default()),
            lastmod: post.date_iso.clone(),
        })
        .collect();
    match merge_sitemap(&xml, &entries) {
        Some((merged, added)) => {
            if added > 0 {
                writer.write(&config.sitemap_file, &merged)?;
            }
            migration_info!("Added {} sitemap entries", added);
        }
        None => report.warn(format!("{} has no </urlset>; sitemap not updated", config.sitemap_file)),
    }
    Ok(())
}
