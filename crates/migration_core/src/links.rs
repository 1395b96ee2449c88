use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use url::Url;

/// Legacy site pages and where they live in the static site.
pub const LEGACY_PAGES: &[(&str, &str)] = &[
    ("", "index.html"),
    ("home", "index.html"),
    ("contato", "contato.html"),
    ("servicos", "servicos.html"),
    ("serviços", "servicos.html"),
    ("quem-somos", "sobre.html"),
    ("sobre", "sobre.html"),
    ("cases", "cases.html"),
    ("produtosdigitais", "produtosdigitais.html"),
    ("produtos-digitais", "produtosdigitais.html"),
    ("blog", "blog.html"),
];

const BLOG_INDEX: &str = "blog.html";

static LOCAL_ARTICLE_FILE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?:\.\./)*(?:artigo-|post-|(?:blog|posts)/)([a-z0-9][a-z0-9-]*)\.html$")
        .expect("valid local article regex")
});

/// How migrated articles are laid out in the static site.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OutputMode {
    /// One `artigo-<slug>.html` file per article.
    #[default]
    ArticleFiles,
    /// All articles rendered inside `blog.html`, addressed as `#post-<slug>`.
    SinglePage,
}

impl OutputMode {
    pub fn article_destination(&self, slug: &str) -> String {
        match self {
            OutputMode::ArticleFiles => format!("artigo-{slug}.html"),
            OutputMode::SinglePage => format!("{BLOG_INDEX}#post-{slug}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkTarget {
    Article { slug: String, destination: String },
    LegacyPage { destination: String },
}

impl LinkTarget {
    pub fn destination(&self) -> &str {
        match self {
            LinkTarget::Article { destination, .. } => destination,
            LinkTarget::LegacyPage { destination } => destination,
        }
    }
}

/// True for hrefs that never point at a page: fragments, mail, phone, scripts.
pub fn is_non_navigational(href: &str) -> bool {
    let lower = href.trim().to_ascii_lowercase();
    lower.starts_with('#')
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
        || lower.starts_with("javascript:")
}

/// Maps legacy URLs onto local destinations.
#[derive(Debug, Clone)]
pub struct LinkTable {
    source_host: String,
    mode: OutputMode,
    articles: BTreeSet<String>,
}

impl LinkTable {
    /// `source_host` may be a bare host or a full base URL.
    pub fn new(source_host: &str, mode: OutputMode) -> Self {
        let host = Url::parse(source_host)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string))
            .unwrap_or_else(|| source_host.trim().trim_matches('/').to_string());
        let host = host.to_ascii_lowercase();
        let host = host.strip_prefix("www.").unwrap_or(&host).to_string();
        Self {
            source_host: host,
            mode,
            articles: BTreeSet::new(),
        }
    }

    pub fn with_articles<I, S>(mut self, slugs: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.articles.extend(slugs.into_iter().map(Into::into));
        self
    }

    pub fn add_article(&mut self, slug: impl Into<String>) {
        self.articles.insert(slug.into());
    }

    pub fn mode(&self) -> OutputMode {
        self.mode
    }

    pub fn contains_article(&self, slug: &str) -> bool {
        self.articles.contains(slug)
    }

    pub fn is_source_host(&self, host: &str) -> bool {
        let host = host.to_ascii_lowercase();
        let host = host.strip_prefix("www.").unwrap_or(&host);
        host == self.source_host || host.ends_with(&format!(".{}", self.source_host))
    }

    /// Resolves an href to its local destination, or `None` to leave it as is.
    pub fn resolve(&self, href: &str) -> Option<LinkTarget> {
        let href = href.trim();
        if href.is_empty() || is_non_navigational(href) {
            return None;
        }

        let lower = href.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") || lower.starts_with("//")
        {
            let absolute = if lower.starts_with("//") {
                format!("https:{href}")
            } else {
                href.to_string()
            };
            let url = Url::parse(&absolute).ok()?;
            if !self.is_source_host(url.host_str()?) {
                return None;
            }
            return self.resolve_path(url.path());
        }

        let path = href.split(['?', '#']).next().unwrap_or_default();
        if path.starts_with('/') {
            return self.resolve_path(path);
        }
        self.resolve_local_file(path)
    }

    fn resolve_path(&self, path: &str) -> Option<LinkTarget> {
        let decoded = urlencoding::decode(path)
            .map(|cow| cow.into_owned())
            .unwrap_or_else(|_| path.to_string());
        let segments: Vec<String> = decoded
            .split('/')
            .filter(|s| !s.is_empty())
            .map(|s| s.to_lowercase())
            .collect();

        let slug = segments.last().map(String::as_str).unwrap_or("");
        if self.articles.contains(slug) {
            return Some(self.article_target(slug));
        }
        if segments.len() > 1 && segments[0] == "blog" {
            return Some(LinkTarget::LegacyPage {
                destination: BLOG_INDEX.to_string(),
            });
        }
        LEGACY_PAGES
            .iter()
            .find(|(legacy, _)| *legacy == slug)
            .map(|(_, destination)| LinkTarget::LegacyPage {
                destination: destination.to_string(),
            })
    }

    fn resolve_local_file(&self, path: &str) -> Option<LinkTarget> {
        let path = path.strip_prefix("./").unwrap_or(path);
        let caps = LOCAL_ARTICLE_FILE.captures(path)?;
        let slug = caps.get(1)?.as_str();
        self.articles
            .contains(slug)
            .then(|| self.article_target(slug))
    }

    fn article_target(&self, slug: &str) -> LinkTarget {
        LinkTarget::Article {
            slug: slug.to_string(),
            destination: self.mode.article_destination(slug),
        }
    }
}
