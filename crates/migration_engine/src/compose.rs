use std::collections::HashSet;
use std::path::Path;

use ego_tree::NodeId;
use migration_core::{format_date_pt_br, ExtractedArticle};
use scraper::{ElementRef, Html};
use thiserror::Error;

use crate::dom::{
    closest, document_all, document_first, escape_html, is_inside, render_attrs,
    render_document, source_has_doctype, source_has_tag, DomEdits,
};
use crate::template::{identity_of, is_relative_reference, prefix_fragment_paths, Template};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ComposeError {
    #[error("missing head/body")]
    MissingHeadOrBody,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComposedPage {
    pub html: String,
    /// A stylesheet, inline style or the tailwind CDN script is present.
    pub has_css: bool,
}

/// `../` repeated once per directory level below the site root.
pub fn depth_prefix(depth: usize) -> String {
    "../".repeat(depth)
}

/// Rebuilds a page around the template: template head assets are merged
/// into the page head, and the body becomes template header, `<main>` with
/// the page's article content, template footer, then the page's own scripts.
///
/// Composing an already composed page yields the same structure again.
pub fn compose(page_html: &str, template: &Template, depth: usize) -> Result<ComposedPage, ComposeError> {
    if !source_has_tag(page_html, "head") || !source_has_tag(page_html, "body") {
        return Err(ComposeError::MissingHeadOrBody);
    }
    let doc = Html::parse_document(page_html);
    let head = document_first(&doc, "head").ok_or(ComposeError::MissingHeadOrBody)?;
    let body = document_first(&doc, "body").ok_or(ComposeError::MissingHeadOrBody)?;
    let prefix = depth_prefix(depth);
    let mut edits = DomEdits::new();

    let html_element = doc.root_element();
    for (key, value) in template.html_attrs() {
        if html_element.value().attr(key).is_none() {
            edits.set_attr(html_element.id(), key, value.clone());
        }
    }

    let mut existing: HashSet<_> = head
        .children()
        .filter_map(ElementRef::wrap)
        .filter_map(identity_of)
        .collect();
    for asset in template.head_assets() {
        let adjusted = asset.with_prefix(&prefix);
        let identity = adjusted.identity();
        if existing.insert(identity) {
            edits.append_html(head.id(), adjusted.to_html());
        }
    }
    let has_css = existing.iter().any(|identity| identity.is_stylesheet());

    let (content, container) = find_article_content(&doc, body);
    let scripts = carried_scripts(body, container);

    let new_body = format!(
        "\n{}\n<main{}>{}</main>\n{}\n{}",
        prefix_fragment_paths(template.header_html(), &prefix),
        render_attrs(template.main_attrs()),
        content,
        prefix_fragment_paths(template.footer_html(), &prefix),
        scripts.concat(),
    );
    edits.replace_attrs(body.id(), template.body_attrs());
    edits.set_inner_html(body.id(), new_body);

    let html = ensure_doctype(page_html, render_document(&doc, &edits));
    Ok(ComposedPage { html, has_css })
}

/// Article content of a page and the node it came from.
///
/// Tries `<main>` (inner), `<article>` (outer), the nearest section or div
/// around the first `<h1>` (outer) and finally the whole body (inner).
pub fn find_article_content(doc: &Html, body: ElementRef<'_>) -> (String, NodeId) {
    if let Some(main) = document_first(doc, "main") {
        return (main.inner_html(), main.id());
    }
    if let Some(article) = document_first(doc, "article") {
        return (article.html(), article.id());
    }
    if let Some(h1) = document_first(doc, "h1") {
        let block = h1
            .parent()
            .and_then(ElementRef::wrap)
            .and_then(|parent| closest(parent, &["section", "div"]))
            .unwrap_or(h1);
        return (block.html(), block.id());
    }
    (body.inner_html(), body.id())
}

fn carried_scripts(body: ElementRef<'_>, container: NodeId) -> Vec<String> {
    let chrome: Vec<NodeId> = body
        .descendants()
        .filter_map(ElementRef::wrap)
        .filter(|el| matches!(el.value().name(), "header" | "footer"))
        .map(|el| el.id())
        .collect();

    body.descendants()
        .filter_map(ElementRef::wrap)
        .filter(|el| el.value().name() == "script")
        .filter(|script| {
            !script
                .value()
                .attr("type")
                .is_some_and(|t| t.trim().eq_ignore_ascii_case("application/ld+json"))
        })
        .filter(|script| !is_inside(**script, container))
        .filter(|script| !chrome.iter().any(|id| is_inside(**script, *id)))
        .map(|script| script.html())
        .collect()
}

/// Prepends a doctype when the source had one and `output` lost it.
pub fn ensure_doctype(original: &str, output: String) -> String {
    if source_has_doctype(original) && !source_has_doctype(&output) {
        format!("<!DOCTYPE html>\n{output}")
    } else {
        output
    }
}

/// Relative head `link`/`script` and `img` references that do not exist
/// below `page_dir`.
pub fn find_broken_assets(html: &str, page_dir: &Path) -> Vec<String> {
    let doc = Html::parse_document(html);
    let mut references: Vec<String> = Vec::new();
    for element in document_all(&doc, "head link[href], head script[src]") {
        let attr = if element.value().name() == "link" { "href" } else { "src" };
        if let Some(value) = element.value().attr(attr) {
            references.push(value.to_string());
        }
    }
    for img in document_all(&doc, "img[src]") {
        if let Some(value) = img.value().attr("src") {
            references.push(value.to_string());
        }
    }

    references
        .into_iter()
        .filter(|value| is_relative_reference(value))
        .filter(|value| {
            let clean = value.split(['?', '#']).next().unwrap_or_default();
            let decoded = urlencoding::decode(clean)
                .map(|cow| cow.into_owned())
                .unwrap_or_else(|_| clean.to_string());
            !page_dir.join(decoded).exists()
        })
        .collect()
}

/// Full page for one migrated article in the standalone-file layout.
pub fn render_article_page(
    article: &ExtractedArticle,
    template: &Template,
    site_name: &str,
) -> Result<ComposedPage, ComposeError> {
    let title = escape_html(&article.title);
    let excerpt = escape_html(&article.excerpt);
    let category = escape_html(&article.category);
    let human_date = escape_html(&format_date_pt_br(article.published));

    let mut head = vec![
        "<meta charset=\"utf-8\">".to_string(),
        "<meta name=\"viewport\" content=\"width=device-width, initial-scale=1\">".to_string(),
        format!("<title>{title} | {}</title>", escape_html(site_name)),
        format!("<meta name=\"description\" content=\"{excerpt}\">"),
        "<meta property=\"og:type\" content=\"article\">".to_string(),
        format!("<meta property=\"og:title\" content=\"{title}\">"),
        format!("<meta property=\"og:description\" content=\"{excerpt}\">"),
    ];
    let mut cover = String::new();
    if let Some(path) = article.cover_image_path.as_deref() {
        let path = escape_html(path);
        head.push(format!("<meta property=\"og:image\" content=\"{path}\">"));
        cover = format!(
            "<figure class=\"article-cover\"><img src=\"{path}\" alt=\"{title}\" loading=\"eager\" decoding=\"async\"></figure>\n"
        );
    }

    let skeleton = format!(
        "<!DOCTYPE html>\n<html lang=\"pt-BR\">\n<head>\n{}\n</head>\n<body>\n<main>\n\
<article class=\"blog-article\">\n<p class=\"article-meta\">{category} • {human_date}</p>\n\
<h1>{title}</h1>\n{cover}<div class=\"prose\">\n{}\n</div>\n</article>\n</main>\n</body>\n</html>\n",
        head.join("\n"),
        article.body_html,
    );
    compose(&skeleton, template, 0)
}
