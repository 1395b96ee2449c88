use std::future::Future;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Subcommand;
use migration_core::MigrationReport;
use migration_engine::{
    run_cases, run_fix_layout, run_migrate, run_normalize_posts, run_seo, run_single_page,
    ReqwestFetcher, RetryingFetcher, SinglePageOptions, SiteConfig, CASES_REPORT, LAYOUT_REPORT,
    MIGRATION_REPORT, NORMALIZE_REPORT, SEO_REPORT, SINGLE_PAGE_REPORT,
};
use migration_logging::{migration_info, migration_warn};

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Migrate every post of the legacy blog into an `artigo-<slug>.html` page
    Migrate,
    /// Render all posts into blog.html as `#post-<slug>` sections
    SinglePage {
        /// Scrape the legacy blog again instead of reusing data/posts.json
        #[arg(long)]
        refresh: bool,
        /// Point references at blog.html and delete the old article files
        #[arg(long)]
        prune_articles: bool,
    },
    /// Recompose the article pages around the blog.html template
    FixLayout,
    /// Deduplicate images and headings inside data/posts.json
    NormalizePosts,
    /// Normalize page heads and regenerate robots.txt and sitemap.xml
    Seo,
    /// Build data/cases.json and the case cards of cases.html
    Cases {
        /// Case document; searched below the site root when omitted
        #[arg(long)]
        source: Option<PathBuf>,
    },
}

impl Command {
    pub fn name(&self) -> &'static str {
        match self {
            Command::Migrate => "migrate",
            Command::SinglePage { .. } => "single-page",
            Command::FixLayout => "fix-layout",
            Command::NormalizePosts => "normalize-posts",
            Command::Seo => "seo",
            Command::Cases { .. } => "cases",
        }
    }
}

fn build_fetcher(config: &SiteConfig) -> RetryingFetcher<ReqwestFetcher> {
    RetryingFetcher::new(
        ReqwestFetcher::new(config.fetch_settings()),
        config.retry_policy(),
    )
}

/// Drives one command future to completion on a current-thread runtime.
fn block_on<F: Future>(future: F) -> Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("could not start the async runtime")?;
    Ok(runtime.block_on(future))
}

fn log_run(report: &MigrationReport, report_file: &str) {
    migration_info!(
        "{}/{} succeeded, {} failed, {} skipped, {} warnings; see {}",
        report.succeeded,
        report.total_pages,
        report.failures.len(),
        report.skipped.len(),
        report.warnings.len(),
        report_file
    );
    for failure in &report.failures {
        migration_warn!("Failed {}: {}", failure.target, failure.reason);
    }
}

pub fn run(command: Command, config: &SiteConfig) -> Result<()> {
    match command {
        Command::Migrate => {
            let fetcher = build_fetcher(config);
            let report = block_on(run_migrate(config, &fetcher))??;
            log_run(&report, MIGRATION_REPORT);
        }
        Command::SinglePage {
            refresh,
            prune_articles,
        } => {
            let fetcher = build_fetcher(config);
            let options = SinglePageOptions {
                refresh,
                prune_articles,
            };
            let report = block_on(run_single_page(config, &fetcher, options))??;
            migration_info!(
                "{} posts rendered, {} sitemap entries and {} article files removed",
                report.total_posts,
                report.sitemap_entries_removed,
                report.article_files_removed.len()
            );
            log_run(&report.run, SINGLE_PAGE_REPORT);
        }
        Command::FixLayout => {
            let report = run_fix_layout(config)?;
            log_run(&report, LAYOUT_REPORT);
        }
        Command::NormalizePosts => {
            let report = run_normalize_posts(config)?;
            migration_info!("{} posts changed", report.posts_with_changes.len());
            log_run(&report.run, NORMALIZE_REPORT);
        }
        Command::Seo => {
            let report = run_seo(config)?;
            migration_info!(
                "{} pages, {} articles, {} broken links; see {}",
                report.total_pages,
                report.total_posts,
                report.broken_links_count,
                SEO_REPORT
            );
        }
        Command::Cases { source } => {
            let report = run_cases(config, source)?;
            for warning in &report.warnings {
                migration_warn!("{}", warning);
            }
            migration_info!(
                "{} cases from {}; see {}",
                report.total_cases_generated,
                report.source_document,
                CASES_REPORT
            );
        }
    }
    Ok(())
}
