//! Migration core: pure data model and text helpers shared by the engine.
//!
//! Nothing in this crate performs IO.
mod article;
mod asset_key;
mod dates;
mod excerpt;
mod links;
mod report;
mod slug;

pub use article::{ExtractedArticle, PostCollection, PostRecord};
pub use asset_key::{normalize_asset_key, strip_generated_suffixes};
pub use dates::{format_date_pt_br, parse_date_text, parse_iso_date, PT_BR_MONTHS};
pub use excerpt::{collapse_whitespace, truncate_excerpt, DEFAULT_EXCERPT_LIMIT};
pub use links::{
    is_non_navigational, LinkTable, LinkTarget, OutputMode, LEGACY_PAGES,
};
pub use report::{BrokenAsset, MigrationReport, PageOutcome};
pub use slug::{fold_accents, slugify, UniqueSlugs};
