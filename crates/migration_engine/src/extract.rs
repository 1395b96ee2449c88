use chrono::{NaiveDate, Utc};
use migration_core::{parse_date_text, parse_iso_date, truncate_excerpt, DEFAULT_EXCERPT_LIMIT};
use scraper::{ElementRef, Html};
use serde::Deserialize;
use url::Url;

use crate::assets::pick_image_reference;
use crate::dom::{document_first, has_class, select_all, select_first, source_has_tag, text_of};

/// Paragraphs shorter than this are not used as excerpts.
const MIN_EXCERPT_PARAGRAPH: usize = 40;

/// Raw HTML of one page and where it came from (URL or file path).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    pub location: String,
    pub html: String,
}

/// A page parsed once for all strategies.
pub struct ParsedPage {
    pub location: String,
    pub document: Html,
    has_body: bool,
}

impl ParsedPage {
    pub fn parse(page: &Page) -> Self {
        Self {
            location: page.location.clone(),
            document: Html::parse_document(&page.html),
            has_body: source_has_tag(&page.html, "body"),
        }
    }

    /// `None` when the source had no `<body>` at all.
    pub fn body(&self) -> Option<ElementRef<'_>> {
        if !self.has_body {
            return None;
        }
        document_first(&self.document, "body")
    }

    pub fn meta(&self, attr: &str, key: &str) -> Option<String> {
        document_first(&self.document, &format!("meta[{attr}=\"{key}\"]"))
            .and_then(|meta| meta.value().attr("content"))
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
    }

    pub fn base_url(&self) -> Option<Url> {
        Url::parse(&self.location).ok()
    }
}

/// Page-builder markers used to find the article body. Defaults match
/// Elementor output.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExtractionHints {
    pub content_markers: Vec<String>,
    pub post_roots: Vec<String>,
    pub wrapper_selector: String,
    pub widget_class: String,
    pub widget_type_attr: String,
    pub text_inner_selector: String,
    pub generic_inner_selector: String,
    pub excerpt_limit: usize,
}

impl Default for ExtractionHints {
    fn default() -> Self {
        Self {
            content_markers: vec![
                "[itemprop=\"articleBody\"]".to_string(),
                ".entry-content".to_string(),
                ".post-content".to_string(),
            ],
            post_roots: vec![
                "div[data-elementor-type=\"wp-post\"]".to_string(),
                "article".to_string(),
            ],
            wrapper_selector: ".elementor-widget-wrap".to_string(),
            widget_class: "elementor-element".to_string(),
            widget_type_attr: "data-widget_type".to_string(),
            text_inner_selector: ".elementor-text-editor".to_string(),
            generic_inner_selector: ".elementor-widget-container".to_string(),
            excerpt_limit: DEFAULT_EXCERPT_LIMIT,
        }
    }
}

/// Values a caller already knows about the article, typically from the
/// blog listing. Used when the page itself does not say.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleHints {
    pub title: Option<String>,
    pub excerpt: Option<String>,
    pub category: Option<String>,
    pub date_text: Option<String>,
    pub cover_url: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
    MarkedContent,
    DensestWrapper,
    WholeBody,
}

/// One way of locating the article body. Strategies are tried in order and
/// the first `Some` wins.
pub trait ExtractionStrategy: Send + Sync {
    fn kind(&self) -> StrategyKind;
    fn extract_body(&self, page: &ParsedPage, hints: &ExtractionHints) -> Option<String>;
}

/// Explicit content-role containers, used verbatim.
#[derive(Debug, Default)]
pub struct MarkedContent;

impl ExtractionStrategy for MarkedContent {
    fn kind(&self) -> StrategyKind {
        StrategyKind::MarkedContent
    }

    fn extract_body(&self, page: &ParsedPage, hints: &ExtractionHints) -> Option<String> {
        hints
            .content_markers
            .iter()
            .filter_map(|css| document_first(&page.document, css))
            .map(|container| container.inner_html())
            .find(|html| !html.trim().is_empty())
    }
}

/// Picks the wrapper with the most text and rebuilds it from its widgets.
#[derive(Debug, Default)]
pub struct DensestWrapper;

impl ExtractionStrategy for DensestWrapper {
    fn kind(&self) -> StrategyKind {
        StrategyKind::DensestWrapper
    }

    fn extract_body(&self, page: &ParsedPage, hints: &ExtractionHints) -> Option<String> {
        let root = hints
            .post_roots
            .iter()
            .find_map(|css| document_first(&page.document, css))
            .or_else(|| page.body())?;

        let mut best: Option<(ElementRef<'_>, usize)> = None;
        for wrap in select_all(root, &hints.wrapper_selector) {
            let len = text_of(wrap).chars().count();
            if best.map_or(true, |(_, best_len)| len > best_len) {
                best = Some((wrap, len));
            }
        }
        // Ties, all-empty wrappers included, keep the first wrapper.
        let wrap = best.map_or(root, |(wrap, _)| wrap);

        let pieces: Vec<String> = wrap
            .children()
            .filter_map(ElementRef::wrap)
            .filter(|child| child.value().name() == "div" && has_class(*child, &hints.widget_class))
            .filter_map(|widget| render_widget(widget, hints))
            .filter(|html| !html.trim().is_empty())
            .collect();

        let html = if pieces.is_empty() {
            wrap.inner_html()
        } else {
            pieces.join("\n")
        };
        (!html.trim().is_empty()).then_some(html)
    }
}

/// The whole `<body>`, as a last resort.
#[derive(Debug, Default)]
pub struct WholeBody;

impl ExtractionStrategy for WholeBody {
    fn kind(&self) -> StrategyKind {
        StrategyKind::WholeBody
    }

    fn extract_body(&self, page: &ParsedPage, _hints: &ExtractionHints) -> Option<String> {
        page.body().map(|body| body.inner_html())
    }
}

/// Content block kinds produced by the page builder.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WidgetKind {
    TextEditor,
    Image,
    /// Spacers and dividers; they carry no content.
    Decoration,
    Other,
}

impl WidgetKind {
    pub fn classify(widget: ElementRef<'_>, hints: &ExtractionHints) -> Self {
        let widget_type = widget
            .value()
            .attr(&hints.widget_type_attr)
            .unwrap_or_default()
            .to_ascii_lowercase();
        let base_type = widget_type.split('.').next().unwrap_or_default();

        if base_type == "text-editor" || has_class(widget, "elementor-widget-text-editor") {
            WidgetKind::TextEditor
        } else if base_type == "image" || has_class(widget, "elementor-widget-image") {
            WidgetKind::Image
        } else if matches!(base_type, "spacer" | "divider")
            || has_class(widget, "elementor-widget-spacer")
            || has_class(widget, "elementor-widget-divider")
        {
            WidgetKind::Decoration
        } else {
            WidgetKind::Other
        }
    }
}

fn render_widget(widget: ElementRef<'_>, hints: &ExtractionHints) -> Option<String> {
    match WidgetKind::classify(widget, hints) {
        WidgetKind::TextEditor => select_first(widget, &hints.text_inner_selector)
            .map(|editor| editor.inner_html())
            .or_else(|| render_generic(widget, hints)),
        WidgetKind::Image => select_first(widget, "img")
            .map(|img| img.html())
            .or_else(|| render_generic(widget, hints)),
        WidgetKind::Decoration => None,
        WidgetKind::Other => render_generic(widget, hints),
    }
}

fn render_generic(widget: ElementRef<'_>, hints: &ExtractionHints) -> Option<String> {
    // Nested sections and columns hold several widgets, and their first
    // widget container would drop the rest. Keep them whole.
    let is_layout = widget
        .value()
        .attr("data-element_type")
        .is_some_and(|kind| kind != "widget");
    if !is_layout {
        if let Some(container) = select_first(widget, &hints.generic_inner_selector) {
            return Some(container.inner_html());
        }
    }
    Some(widget.inner_html())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedContent {
    pub title: String,
    pub excerpt: String,
    pub category: String,
    pub published: NaiveDate,
    /// Absolute URL (or raw reference) of the cover candidate.
    pub cover_source: Option<String>,
    pub body_html: String,
    pub strategy: StrategyKind,
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractError {
    #[error("page has no <body>")]
    MissingBody,
}

pub struct ContentExtractor {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
    hints: ExtractionHints,
}

impl ContentExtractor {
    pub fn new(hints: ExtractionHints) -> Self {
        Self::with_strategies(
            hints,
            vec![
                Box::new(MarkedContent),
                Box::new(DensestWrapper),
                Box::new(WholeBody),
            ],
        )
    }

    pub fn with_strategies(hints: ExtractionHints, strategies: Vec<Box<dyn ExtractionStrategy>>) -> Self {
        Self { strategies, hints }
    }

    pub fn hints(&self) -> &ExtractionHints {
        &self.hints
    }

    pub fn extract(
        &self,
        page: &Page,
        slug: &str,
        fallbacks: &ArticleHints,
    ) -> Result<ExtractedContent, ExtractError> {
        let parsed = ParsedPage::parse(page);
        if parsed.body().is_none() {
            return Err(ExtractError::MissingBody);
        }

        let mut warnings = Vec::new();
        let (body_html, strategy) = self
            .strategies
            .iter()
            .find_map(|strategy| {
                strategy
                    .extract_body(&parsed, &self.hints)
                    .map(|html| (html, strategy.kind()))
            })
            .ok_or(ExtractError::MissingBody)?;
        if strategy == StrategyKind::WholeBody {
            warnings.push(format!("{slug}: content container not found, using whole body"));
        }

        let body = Html::parse_fragment(&body_html);
        let body_root = body.root_element();

        let title = document_first(&parsed.document, "h1")
            .map(text_of)
            .filter(|t| !t.is_empty())
            .or_else(|| non_blank(fallbacks.title.as_deref()))
            .or_else(|| parsed.meta("property", "og:title"))
            .unwrap_or_else(|| slug.to_string());

        let limit = self.hints.excerpt_limit;
        let excerpt = parsed
            .meta("name", "description")
            .or_else(|| parsed.meta("property", "og:description"))
            .or_else(|| non_blank(fallbacks.excerpt.as_deref()))
            .or_else(|| {
                select_all(body_root, "p, li")
                    .into_iter()
                    .map(text_of)
                    .find(|text| text.chars().count() >= MIN_EXCERPT_PARAGRAPH)
            })
            .unwrap_or_else(|| text_of(body_root));
        let excerpt = truncate_excerpt(&excerpt, limit);

        let category = non_blank(fallbacks.category.as_deref())
            .or_else(|| parsed.meta("property", "article:section"))
            .unwrap_or_else(|| "Blog".to_string());

        let published = parsed
            .meta("property", "article:published_time")
            .and_then(|value| parse_iso_date(&value))
            .or_else(|| fallbacks.date_text.as_deref().and_then(parse_date_text))
            .unwrap_or_else(|| {
                warnings.push(format!("{slug}: publication date not found, using today"));
                Utc::now().date_naive()
            });

        let base = parsed.base_url();
        let cover_source = parsed
            .meta("property", "og:image")
            .or_else(|| non_blank(fallbacks.cover_url.as_deref()))
            .or_else(|| select_first(body_root, "img").and_then(pick_image_reference))
            .map(|reference| absolutize(&reference, base.as_ref()));

        Ok(ExtractedContent {
            title,
            excerpt,
            category,
            published,
            cover_source,
            body_html,
            strategy,
            warnings,
        })
    }
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Joins a reference onto `base`; references that cannot be joined are kept.
pub fn absolutize(reference: &str, base: Option<&Url>) -> String {
    let reference = reference.trim();
    if Url::parse(reference).is_ok() {
        return reference.to_string();
    }
    match base {
        Some(base) => base
            .join(reference)
            .map(|url| url.to_string())
            .unwrap_or_else(|_| reference.to_string()),
        None => reference.to_string(),
    }
}
