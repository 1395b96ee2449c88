//! Discovery of posts on the legacy blog listing.

use std::collections::{HashSet, VecDeque};
use std::sync::LazyLock;

use migration_logging::{migration_info, migration_warn};
use regex::Regex;
use scraper::Html;
use url::Url;

use crate::assets::pick_image_url;
use crate::dom::{document_all, select_first, text_of};
use crate::extract::{absolutize, ArticleHints};
use crate::fetch::{fetch_page, Fetcher};
use crate::FetchError;

/// First path segments that are never posts.
const EXCLUDED_SLUGS: &[&str] = &[
    "",
    "blog",
    "contato",
    "servicos",
    "sobre",
    "quem-somos",
    "cases",
    "produtosdigitais",
    "produtos-digitais",
    "index",
    "wp-content",
    "wp-json",
    "wp-admin",
    "category",
    "tag",
    "author",
    "feed",
    "page",
];

const NEXT_LABELS: &[&str] = &["próxima", "proxima", "next"];

static HREF: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?i)href\s*=\s*["']([^"']+)["']"#).expect("valid href regex"));

/// One post card on a listing page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexEntry {
    pub url: String,
    pub slug: String,
    pub title: String,
    pub excerpt: String,
    pub date_text: String,
    pub category: String,
    pub cover_url: Option<String>,
}

impl IndexEntry {
    /// Keeps values already known when a later card repeats the post with
    /// less information.
    fn merge_from(&mut self, newer: IndexEntry) {
        let keep = |old: &mut String, new: String| {
            if !new.is_empty() {
                *old = new;
            }
        };
        self.url = newer.url;
        keep(&mut self.title, newer.title);
        keep(&mut self.excerpt, newer.excerpt);
        keep(&mut self.date_text, newer.date_text);
        keep(&mut self.category, newer.category);
        if newer.cover_url.is_some() {
            self.cover_url = newer.cover_url;
        }
    }
}

impl From<&IndexEntry> for ArticleHints {
    fn from(entry: &IndexEntry) -> Self {
        let non_empty = |value: &str| (!value.is_empty()).then(|| value.to_string());
        ArticleHints {
            title: non_empty(&entry.title),
            excerpt: non_empty(&entry.excerpt),
            category: non_empty(&entry.category),
            date_text: non_empty(&entry.date_text),
            cover_url: entry.cover_url.clone(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexPage {
    pub entries: Vec<IndexEntry>,
    pub next_page: Option<String>,
}

/// Slug of a post URL on `source_host`: a single path segment that is not
/// a known site page and has no file extension.
pub fn slug_from_post_url(url: &str, source_host: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let host = parsed.host_str()?.trim_start_matches("www.");
    if !host.eq_ignore_ascii_case(source_host.trim_start_matches("www.")) {
        return None;
    }
    let segments: Vec<&str> = parsed
        .path_segments()?
        .filter(|segment| !segment.is_empty())
        .collect();
    let [slug] = segments.as_slice() else {
        return None;
    };
    let slug = urlencoding::decode(slug)
        .map(|cow| cow.into_owned())
        .unwrap_or_else(|_| slug.to_string());
    if EXCLUDED_SLUGS.contains(&slug.as_str()) || slug.contains('.') {
        return None;
    }
    Some(slug)
}

/// Host part of a site URL, without `www.`.
pub fn source_host(site_url: &str) -> String {
    Url::parse(site_url)
        .ok()
        .and_then(|url| url.host_str().map(str::to_string))
        .unwrap_or_else(|| site_url.to_string())
        .trim_start_matches("www.")
        .to_string()
}

/// Post cards and the "next page" link of one Elementor listing page.
pub fn parse_index_page(html: &str, page_url: &str) -> IndexPage {
    let doc = Html::parse_document(html);
    let base = Url::parse(page_url).ok();
    let host = source_host(page_url);
    let mut entries = Vec::new();

    for article in document_all(&doc, "article") {
        let link = select_first(article, "a.elementor-post__thumbnail__link[href]")
            .or_else(|| select_first(article, "h3.elementor-post__title a[href]"))
            .or_else(|| select_first(article, "a[href]"));
        let Some(href) = link.and_then(|a| a.value().attr("href")) else {
            continue;
        };
        let url = absolutize(href, base.as_ref());
        let Some(slug) = slug_from_post_url(&url, &host) else {
            continue;
        };
        let text = |css: &str| select_first(article, css).map(text_of).unwrap_or_default();
        let excerpt = select_first(article, "div.elementor-post__excerpt")
            .or_else(|| select_first(article, "p.excerpt"))
            .map(text_of)
            .unwrap_or_default();
        let cover_url = select_first(article, "div.elementor-post__thumbnail img")
            .or_else(|| select_first(article, "img"))
            .and_then(|img| pick_image_url(img, base.as_ref()));

        entries.push(IndexEntry {
            url,
            slug,
            title: text("h3.elementor-post__title"),
            excerpt,
            date_text: text("span.elementor-post-date"),
            category: text("div.elementor-post__badge"),
            cover_url,
        });
    }

    let next_page = document_all(&doc, "a.page-numbers[href]")
        .into_iter()
        .find(|anchor| {
            let label = text_of(*anchor).to_lowercase();
            NEXT_LABELS.iter().any(|next| label.contains(next))
        })
        .and_then(|anchor| anchor.value().attr("href"))
        .map(|href| absolutize(href, base.as_ref()));

    IndexPage { entries, next_page }
}

/// Slugs of every link on a page that looks like a post, in document order.
pub fn discover_slug_links(html: &str, page_url: &str, source_host: &str) -> Vec<String> {
    let base = Url::parse(page_url).ok();
    let mut seen = HashSet::new();
    HREF.captures_iter(html)
        .filter_map(|caps| slug_from_post_url(&absolutize(&caps[1], base.as_ref()), source_host))
        .filter(|slug| seen.insert(slug.clone()))
        .collect()
}

/// Result of walking the listing pages.
#[derive(Debug, Clone, Default)]
pub struct IndexListing {
    /// Unique by slug, in discovery order.
    pub entries: Vec<IndexEntry>,
    pub pages_visited: usize,
    pub warnings: Vec<String>,
}

/// Follows "next" links from `start_url`, visiting each page once and at
/// most `max_pages` pages. Only a failure on the first page is an error.
pub async fn collect_index(
    fetcher: &dyn Fetcher,
    start_url: &str,
    max_pages: usize,
) -> Result<IndexListing, FetchError> {
    let mut listing = IndexListing::default();
    let mut queue = VecDeque::from([start_url.to_string()]);
    let mut visited = HashSet::new();

    while let Some(page_url) = queue.pop_front() {
        if listing.pages_visited >= max_pages {
            listing
                .warnings
                .push(format!("stopped after {max_pages} listing pages"));
            break;
        }
        if !visited.insert(page_url.clone()) {
            continue;
        }
        let page = match fetch_page(fetcher, &page_url).await {
            Ok(page) => page,
            Err(err) if listing.pages_visited == 0 => return Err(err),
            Err(err) => {
                migration_warn!("Listing page {} failed: {}", page_url, err);
                listing
                    .warnings
                    .push(format!("listing page {page_url} failed: {err}"));
                break;
            }
        };
        listing.pages_visited += 1;

        let parsed = parse_index_page(&page.html, &page_url);
        migration_info!("Listing page {} has {} posts", page_url, parsed.entries.len());
        for entry in parsed.entries {
            match listing.entries.iter_mut().find(|e| e.slug == entry.slug) {
                Some(existing) => existing.merge_from(entry),
                None => listing.entries.push(entry),
            }
        }
        if let Some(next) = parsed.next_page {
            queue.push_back(next);
        }
    }
    Ok(listing)
}

/// Scans numbered listing pages (`<index>/2/`, `<index>/3/`, ...) for post
/// links. Stops at the first failing page or after two pages in a row
/// without new posts.
pub async fn discover_post_urls(
    fetcher: &dyn Fetcher,
    index_url: &str,
    source_base: &str,
    max_pages: usize,
) -> Vec<String> {
    let host = source_host(source_base);
    let base = source_base.trim_end_matches('/');
    let index_url = format!("{}/", index_url.trim_end_matches('/'));
    let mut seen = HashSet::new();
    let mut urls = Vec::new();
    let mut empty_streak = 0;

    for page_num in 1..=max_pages {
        let url = if page_num == 1 {
            index_url.clone()
        } else {
            format!("{index_url}{page_num}/")
        };
        let page = match fetch_page(fetcher, &url).await {
            Ok(page) => page,
            Err(err) => {
                migration_info!("Stopping post discovery at {}: {}", url, err);
                break;
            }
        };
        let fresh: Vec<String> = discover_slug_links(&page.html, &url, &host)
            .into_iter()
            .filter(|slug| seen.insert(slug.clone()))
            .collect();
        if fresh.is_empty() {
            empty_streak += 1;
            if empty_streak >= 2 {
                break;
            }
        } else {
            empty_streak = 0;
            urls.extend(fresh.into_iter().map(|slug| format!("{base}/{slug}/")));
        }
    }
    urls
}
