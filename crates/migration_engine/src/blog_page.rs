//! Single-page blog: every post rendered into `blog.html`, switched by
//! `#post-<slug>` fragments.

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use migration_core::{PostCollection, PostRecord};
use regex::Regex;
use scraper::Html;
use serde_json::json;

use crate::compose::ensure_doctype;
use crate::dom::{closest, document_all, document_first, escape_html, render_document, DomEdits};
use crate::seo::script_safe_json;

pub const DEFAULT_SITE_URL: &str = "https://hbtmarc.github.io/fcge";

const SPA_SCRIPT: &str = include_str!("../assets/blog_spa.js");
const HIDDEN_RULE: &str = ".is-hidden { display: none !important; }";
const STALE_SELECTORS: &str = "script#blog-spa, script#blog-interactions, script#posts-data, section#blog-back-to-top";

static ARTICLE_REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?i)(?P<lead>^|[\s"'=(>])(?:https?://[^\s"'>]+/)?(?:\.{1,2}/)*(?:artigo-|post-|(?:blog|posts)/)(?P<slug>[a-z0-9][a-z0-9_-]*)\.html"#,
    )
    .expect("valid article reference regex")
});

/// Site URL taken from `<link rel="canonical" href=".../blog.html">`.
pub fn site_url_from_canonical(blog_html: &str) -> Option<String> {
    let doc = Html::parse_document(blog_html);
    let href = document_first(&doc, "link[rel=\"canonical\"][href]")?
        .value()
        .attr("href")?
        .trim_end_matches('/');
    href.strip_suffix("/blog.html").map(str::to_string)
}

fn render_search_controls(categories: &BTreeSet<String>) -> String {
    let options: String = std::iter::once(r#"<option value="all">Todas as categorias</option>"#.to_string())
        .chain(categories.iter().map(|category| {
            format!(
                r#"<option value="{}">{}</option>"#,
                escape_html(&category.to_lowercase()),
                escape_html(category)
            )
        }))
        .collect();
    format!(
        r#"<div id="blog-filters" class="mb-10 flex flex-col md:flex-row gap-4 items-start md:items-end">
  <div class="w-full md:flex-1">
    <label class="text-sm font-semibold text-slate-700" for="blog-search">Buscar</label>
    <input id="blog-search" type="search" placeholder="Buscar por título ou texto" class="mt-2 w-full rounded-lg border border-slate-200 px-4 py-3 text-slate-700">
  </div>
  <div class="w-full md:w-64">
    <label class="text-sm font-semibold text-slate-700" for="blog-category">Categoria</label>
    <select id="blog-category" class="mt-2 w-full rounded-lg border border-slate-200 px-4 py-3 text-slate-700">{options}</select>
  </div>
</div>"#
    )
}

fn category_of(post: &PostRecord) -> &str {
    let category = post.category.trim();
    if category.is_empty() {
        "Blog"
    } else {
        category
    }
}

pub fn render_cards(posts: &PostCollection) -> String {
    posts
        .iter()
        .enumerate()
        .map(|(idx, post)| {
            let category = category_of(post);
            let title = escape_html(&post.title);
            let search = format!("{} {} {}", post.title, post.excerpt, category)
                .trim()
                .to_lowercase();
            let image = match post.cover() {
                Some(cover) => format!(
                    r#"<img src="{}" alt="{title}" class="w-full h-48 object-cover" decoding="async" loading="lazy">"#,
                    escape_html(cover)
                ),
                None => r#"<div class="w-full h-48 bg-gradient-to-r from-slate-200 via-slate-100 to-slate-200"></div>"#.to_string(),
            };
            format!(
                r##"<a href="#post-{slug}" class="post-card block bg-white rounded-lg shadow-md overflow-hidden transition hover:shadow-xl animated-item fade-in" style="transition-delay: {delay}ms;" data-post-card data-category="{category_key}" data-search="{search}">
  {image}
  <div class="p-6">
    <p class="text-sm text-slate-500">{category} • {date}</p>
    <h3 class="mt-2 text-xl font-bold text-slate-900">{title}</h3>
    <p class="mt-2 text-slate-600">{excerpt}</p>
  </div>
</a>"##,
                slug = escape_html(&post.slug),
                delay = idx * 100,
                category_key = escape_html(&category.to_lowercase()),
                search = escape_html(&search),
                category = escape_html(category),
                date = escape_html(&post.date_human_pt_br),
                excerpt = escape_html(&post.excerpt),
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// BlogPosting JSON-LD for one post of the single page.
pub fn post_json_ld(post: &PostRecord, site_url: &str, site_name: &str) -> serde_json::Value {
    let mut data = json!({
        "@context": "https://schema.org",
        "@type": "BlogPosting",
        "headline": post.title,
        "datePublished": post.date_iso,
        "dateModified": post.date_iso,
        "author": { "@type": "Organization", "name": site_name },
        "publisher": {
            "@type": "Organization",
            "name": site_name,
            "logo": { "@type": "ImageObject", "url": format!("{site_url}/imagens/logo/logo12-1.png") },
        },
        "mainEntityOfPage": { "@type": "WebPage", "@id": format!("{site_url}/blog.html#post-{}", post.slug) },
    });
    if let Some(cover) = post.cover() {
        data["image"] = json!([format!("{site_url}/{}", cover.trim_start_matches('/'))]);
    }
    data
}

pub fn render_gallery_section(posts: &PostCollection) -> String {
    let categories: BTreeSet<String> = posts
        .iter()
        .map(|post| post.category.trim().to_string())
        .filter(|category| !category.is_empty())
        .collect();
    format!(
        r#"<section id="blog-gallery" class="py-20 sm:py-28 animated-item fade-in">
  <div class="container mx-auto px-6">
    <div id="blog"></div>
    {}
    <p id="blog-results" class="text-sm text-slate-500 mb-8"></p>
    <div class="grid md:grid-cols-2 lg:grid-cols-3 gap-8" id="posts-container">
      {}
    </div>
  </div>
</section>"#,
        render_search_controls(&categories),
        render_cards(posts)
    )
}

pub fn render_reader_section(posts: &PostCollection, site_url: &str, site_name: &str) -> String {
    let articles: String = posts
        .iter()
        .map(|post| {
            let title = escape_html(&post.title);
            let cover = post
                .cover()
                .map(|cover| {
                    format!(
                        r#"<img src="{}" alt="{title}" class="w-full h-auto rounded-xl shadow-lg my-8" decoding="async" loading="lazy">"#,
                        escape_html(cover)
                    )
                })
                .unwrap_or_default();
            format!(
                r##"<article id="post-{slug}" data-post-article class="post-article bg-white rounded-2xl shadow-lg p-8 md:p-10 animated-item fade-in is-hidden">
  <div class="flex flex-col md:flex-row md:items-center md:justify-between gap-4">
    <div>
      <p class="text-sm text-slate-500">{category} • {date}</p>
      <h2 class="text-2xl md:text-3xl font-bold text-slate-900 mt-2" tabindex="-1">{title}</h2>
      <p class="text-slate-600 mt-3">{excerpt}</p>
    </div>
    <a href="#blog" class="inline-flex items-center justify-center text-white font-bold py-3 px-6 rounded-lg cta-button cta-button-standard">Voltar ao Blog</a>
  </div>
  {cover}
  <div class="prose max-w-none text-slate-600">
    {content}
  </div>
  <div class="mt-8">
    <a href="#blog" class="text-sm font-semibold text-[--brand-blue] hover:underline">Voltar ao Blog</a>
  </div>
  <script type="application/ld+json">{json_ld}</script>
</article>"##,
                slug = escape_html(&post.slug),
                category = escape_html(category_of(post)),
                date = escape_html(&post.date_human_pt_br),
                excerpt = escape_html(&post.excerpt),
                content = post.content_html.as_deref().unwrap_or_default(),
                json_ld = script_safe_json(&post_json_ld(post, site_url, site_name)),
            )
        })
        .collect();
    format!(
        r#"<section id="blog-reader" class="py-20 sm:py-28 bg-slate-50 is-hidden">
  <div class="container mx-auto px-6">
    <div id="blog-reader-container" class="space-y-12">
      {articles}
    </div>
  </div>
</section>"#
    )
}

/// Re-renders the gallery and reader sections of `blog.html` from `posts`.
///
/// Existing `#blog-gallery`/`#blog-list` and `#blog-reader`/`#blog-details`
/// sections are replaced; missing ones go after the page header or at the
/// end of `<main>`. Older blog scripts are dropped and the current one is
/// appended to the body.
pub fn render_single_page(blog_html: &str, posts: &PostCollection, site_url: &str, site_name: &str) -> String {
    let doc = Html::parse_document(blog_html);
    let mut edits = DomEdits::new();

    if !blog_html.contains(".is-hidden") {
        match document_first(&doc, "style") {
            Some(style) => edits.append_html(style.id(), format!("\n{HIDDEN_RULE}\n")),
            None => {
                if let Some(head) = document_first(&doc, "head") {
                    edits.append_html(head.id(), format!("<style>\n{HIDDEN_RULE}\n</style>"));
                }
            }
        }
    }

    for stale in document_all(&doc, STALE_SELECTORS) {
        edits.remove(stale.id());
    }
    for marker in document_all(&doc, "#blog-back-to-top") {
        if let Some(section) = closest(marker, &["section"]) {
            edits.remove(section.id());
        }
    }

    let gallery = render_gallery_section(posts);
    let reader = render_reader_section(posts, site_url, site_name);
    let mut missing = Vec::new();

    match document_first(&doc, "section#blog-gallery").or_else(|| document_first(&doc, "section#blog-list")) {
        Some(existing) => edits.replace_with_html(existing.id(), gallery),
        None => missing.push(gallery),
    }
    match document_first(&doc, "section#blog-reader").or_else(|| document_first(&doc, "section#blog-details")) {
        Some(existing) => edits.replace_with_html(existing.id(), reader),
        None => missing.push(reader),
    }
    if !missing.is_empty() {
        let block = format!("\n{}\n", missing.join("\n"));
        if let Some(hero) = document_first(&doc, "section.page-header") {
            edits.insert_after(hero.id(), block);
        } else if let Some(main) = document_first(&doc, "main") {
            edits.append_html(main.id(), block);
        } else if let Some(body) = document_first(&doc, "body") {
            edits.append_html(body.id(), block);
        }
    }

    if let Some(body) = document_first(&doc, "body") {
        edits.append_html(body.id(), format!("<script id=\"blog-spa\">\n{SPA_SCRIPT}</script>\n"));
    }

    ensure_doctype(blog_html, render_document(&doc, &edits))
}

/// Slug of a legacy standalone article file.
pub fn article_file_slug(path: &Path) -> Option<String> {
    let stem = path.file_stem()?.to_string_lossy().to_string();
    if let Some(slug) = stem.strip_prefix("artigo-").or_else(|| stem.strip_prefix("post-")) {
        return Some(slug.to_string());
    }
    let parent = path
        .parent()
        .and_then(Path::file_name)
        .map(|name| name.to_string_lossy().to_lowercase());
    matches!(parent.as_deref(), Some("blog" | "posts")).then_some(stem)
}

/// Legacy article files: `artigo-*`/`post-*` pages anywhere and every page
/// inside a `blog/` or `posts/` folder, except `blog.html` itself.
pub fn collect_article_files(root: &Path) -> Vec<PathBuf> {
    let mut found = Vec::new();
    walk(root, &mut |path| {
        let is_html = path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("html"));
        let is_index = path.file_name().is_some_and(|name| name == "blog.html");
        if is_html && !is_index && article_file_slug(path).is_some() {
            found.push(path.to_path_buf());
        }
    });
    found.sort();
    found
}

fn walk(dir: &Path, visit: &mut dyn FnMut(&Path)) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let hidden = entry.file_name().to_string_lossy().starts_with('.');
        if path.is_dir() {
            if !hidden {
                walk(&path, visit);
            }
        } else {
            visit(&path);
        }
    }
}

/// Points references to standalone article files at their single-page
/// anchor. Returns the new text and the number of references changed.
pub fn rewrite_article_references(text: &str) -> (String, usize) {
    let mut count = 0;
    let rewritten = ARTICLE_REFERENCE.replace_all(text, |caps: &regex::Captures<'_>| {
        count += 1;
        format!("{}blog.html#post-{}", &caps["lead"], &caps["slug"])
    });
    (rewritten.into_owned(), count)
}

/// Files whose references [`rewrite_article_references`] should fix.
pub fn reference_files(root: &Path) -> Vec<PathBuf> {
    const EXTENSIONS: &[&str] = &["html", "md", "json", "xml"];
    let mut found = Vec::new();
    walk(root, &mut |path| {
        let ext = path
            .extension()
            .map(|ext| ext.to_string_lossy().to_lowercase())
            .unwrap_or_default();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        if EXTENSIONS.contains(&ext.as_str()) && !name.starts_with("artigo-") && !name.starts_with("post-") {
            found.push(path.to_path_buf());
        }
    });
    found.sort();
    found
}
