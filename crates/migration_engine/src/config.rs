//! Run configuration shared by every command.

use std::path::{Path, PathBuf};
use std::time::Duration;

use migration_core::OutputMode;
use serde::Deserialize;

use crate::assets::AssetSettings;
use crate::extract::ExtractionHints;
use crate::fetch::{FetchSettings, RetryPolicy};
use crate::index::source_host;
use crate::seo::SeoSettings;

/// HTTP client limits, in config-friendly units.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    pub connect_timeout_secs: u64,
    pub request_timeout_secs: u64,
    pub redirect_limit: usize,
    pub max_bytes: u64,
    pub user_agent: String,
    pub accept_language: String,
    pub accept_invalid_certs: bool,
    pub max_attempts: u32,
    pub initial_backoff_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        let settings = FetchSettings::default();
        let retry = RetryPolicy::default();
        Self {
            connect_timeout_secs: settings.connect_timeout.as_secs(),
            request_timeout_secs: settings.request_timeout.as_secs(),
            redirect_limit: settings.redirect_limit,
            max_bytes: settings.max_bytes,
            user_agent: settings.user_agent,
            accept_language: settings.accept_language,
            accept_invalid_certs: settings.accept_invalid_certs,
            max_attempts: retry.max_attempts,
            initial_backoff_ms: retry.initial_backoff.as_millis() as u64,
        }
    }
}

/// Paths are relative to `site_root` unless stated otherwise.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub site_root: PathBuf,
    /// Legacy WordPress site.
    pub source_base_url: String,
    /// Listing path below `source_base_url`.
    pub blog_index_path: String,
    /// Published site. When unset, taken from the canonical link of the
    /// blog page.
    pub site_url: Option<String>,
    pub site_name: String,
    pub template_file: String,
    pub blog_html: String,
    pub cases_html: String,
    pub posts_json: String,
    pub cases_json: String,
    pub sitemap_file: String,
    /// Image folder of the standalone article pages.
    pub images_dir: String,
    /// Image folder of the single-page blog.
    pub single_page_assets_dir: String,
    pub asset_prefix_to_strip: Option<String>,
    /// Layout that internal article links point at.
    pub output_mode: OutputMode,
    pub max_index_pages: usize,
    pub discovery_pages: usize,
    pub fetch: FetchConfig,
    pub extraction: ExtractionHints,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            site_root: PathBuf::from("."),
            source_base_url: "https://www.fcgestaoestrategica.com.br".to_string(),
            blog_index_path: "blog/".to_string(),
            site_url: None,
            site_name: "FC Gestão Estratégica".to_string(),
            template_file: "blog.html".to_string(),
            blog_html: "blog.html".to_string(),
            cases_html: "cases.html".to_string(),
            posts_json: "data/posts.json".to_string(),
            cases_json: "data/cases.json".to_string(),
            sitemap_file: "sitemap.xml".to_string(),
            images_dir: "imagens/blog".to_string(),
            single_page_assets_dir: "assets/blog".to_string(),
            asset_prefix_to_strip: Some("fcge/".to_string()),
            output_mode: OutputMode::ArticleFiles,
            max_index_pages: 50,
            discovery_pages: 9,
            fetch: FetchConfig::default(),
            extraction: ExtractionHints::default(),
        }
    }
}

impl SiteConfig {
    pub fn with_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.site_root = root.into();
        self
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.site_root.join(relative)
    }

    pub fn root(&self) -> &Path {
        &self.site_root
    }

    pub fn source_host(&self) -> String {
        source_host(&self.source_base_url)
    }

    pub fn blog_index_url(&self) -> String {
        format!(
            "{}/{}",
            self.source_base_url.trim_end_matches('/'),
            self.blog_index_path.trim_start_matches('/')
        )
    }

    /// Configured site URL, else the one in `blog_html`'s canonical link,
    /// else the default deployment.
    pub fn resolve_site_url(&self, blog_html: Option<&str>) -> String {
        self.site_url
            .clone()
            .or_else(|| blog_html.and_then(crate::blog_page::site_url_from_canonical))
            .unwrap_or_else(|| crate::blog_page::DEFAULT_SITE_URL.to_string())
            .trim_end_matches('/')
            .to_string()
    }

    pub fn fetch_settings(&self) -> FetchSettings {
        FetchSettings {
            connect_timeout: Duration::from_secs(self.fetch.connect_timeout_secs),
            request_timeout: Duration::from_secs(self.fetch.request_timeout_secs),
            redirect_limit: self.fetch.redirect_limit,
            max_bytes: self.fetch.max_bytes,
            user_agent: self.fetch.user_agent.clone(),
            accept_language: self.fetch.accept_language.clone(),
            accept_invalid_certs: self.fetch.accept_invalid_certs,
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.fetch.max_attempts,
            initial_backoff: Duration::from_millis(self.fetch.initial_backoff_ms),
        }
    }

    pub fn asset_settings(&self, images_dir: &str) -> AssetSettings {
        AssetSettings {
            site_root: self.site_root.clone(),
            images_dir: images_dir.to_string(),
            strip_prefix: self.asset_prefix_to_strip.clone(),
        }
    }

    pub fn seo_settings(&self, site_url: &str) -> SeoSettings {
        let mut settings = SeoSettings::new(self.site_root.clone(), site_url, &self.site_name);
        settings.description_limit = self.extraction.excerpt_limit;
        settings
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blog_index_url_joins_cleanly() {
        let config = SiteConfig {
            source_base_url: "https://old.example/".to_string(),
            blog_index_path: "/blog/".to_string(),
            ..SiteConfig::default()
        };
        assert_eq!(config.blog_index_url(), "https://old.example/blog/");
        assert_eq!(config.source_host(), "old.example");
    }

    #[test]
    fn explicit_site_url_wins_over_canonical() {
        let blog = r#"<html><head><link rel="canonical" href="https://a.example/site/blog.html"></head></html>"#;
        let mut config = SiteConfig::default();
        assert_eq!(config.resolve_site_url(Some(blog)), "https://a.example/site");
        config.site_url = Some("https://b.example/".to_string());
        assert_eq!(config.resolve_site_url(Some(blog)), "https://b.example");
        config.site_url = None;
        assert_eq!(config.resolve_site_url(None), crate::blog_page::DEFAULT_SITE_URL);
    }

    #[test]
    fn retry_policy_follows_fetch_config() {
        let config = SiteConfig::default();
        let policy = config.retry_policy();
        assert_eq!(policy.max_attempts, 3);
        assert_eq!(policy.initial_backoff, Duration::from_secs(1));
        assert_eq!(config.fetch_settings().request_timeout, Duration::from_secs(30));
    }
}
