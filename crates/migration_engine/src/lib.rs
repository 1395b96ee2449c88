//! Migration engine: fetching, HTML rewriting and the batch commands.
mod assets;
mod blog_page;
mod cases;
mod compose;
mod config;
mod decode;
mod dom;
mod error;
mod extract;
mod fetch;
mod filename;
mod image_size;
mod index;
mod links;
mod persist;
mod pipeline;
mod seo;
mod sitemap;
mod template;
mod types;

pub use assets::{
    dedupe_images, finish_images, first_srcset_url, pick_image_reference, pick_image_url,
    AssetContext, AssetNormalizer, AssetSettings, DedupOutcome,
};
pub use blog_page::{
    article_file_slug, collect_article_files, post_json_ld, render_cards, render_single_page,
    rewrite_article_references, site_url_from_canonical, DEFAULT_SITE_URL,
};
pub use cases::{
    find_source_document, infer_segment, normalize_document_text, parse_cases,
    read_source_document, render_case_cards, render_case_details, split_sentences,
    update_cases_page, CaseItem, CasesError, CasesFile, CasesReport, DetailSection,
};
pub use compose::{
    compose, depth_prefix, ensure_doctype, find_broken_assets, render_article_page,
    ComposeError, ComposedPage,
};
pub use config::{FetchConfig, SiteConfig};
pub use decode::{decode_html, DecodedHtml};
pub use dom::{render_document, render_fragment, DomEdits};
pub use error::{MigrationError, PageError};
pub use extract::{
    absolutize, ArticleHints, ContentExtractor, ExtractError, ExtractedContent,
    ExtractionHints, ExtractionStrategy, Page, ParsedPage, StrategyKind, WidgetKind,
};
pub use fetch::{fetch_page, FetchSettings, Fetcher, ReqwestFetcher, RetryPolicy, RetryingFetcher};
pub use filename::{fallback_image_name, sanitize_filename, short_hash, with_numeric_suffix};
pub use image_size::{image_size, image_size_of_file};
pub use index::{
    collect_index, discover_post_urls, discover_slug_links, parse_index_page, slug_from_post_url,
    source_host, IndexEntry, IndexListing, IndexPage,
};
pub use links::LinkRewriter;
pub use persist::{ensure_output_dir, relative_posix, AtomicFileWriter, PersistError};
pub use pipeline::{
    layout_targets, normalize_post, run_cases, run_fix_layout, run_migrate, run_normalize_posts,
    run_seo, run_single_page, NormalizeReport, SinglePageOptions, SinglePageReport, CASES_REPORT,
    LAYOUT_REPORT, MIGRATION_REPORT, NORMALIZE_REPORT, SEO_REPORT, SINGLE_PAGE_REPORT,
    SITEMAP_REPORT,
};
pub use seo::{
    article_slug, branded_title, guess_alt_text, list_public_pages, script_safe_json, SeoNormalizer,
    SeoOutcome, SeoReport, SeoSettings,
};
pub use sitemap::{merge_sitemap, prune_sitemap, render_sitemap, robots_txt, sitemap_locations, SitemapEntry};
pub use template::{HeadAsset, Template, TemplateError};
pub use types::{FailureKind, FetchError, FetchMetadata, FetchOutput};
