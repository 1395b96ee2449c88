use std::fs;

use migration_core::{PostCollection, PostRecord};
use migration_engine::{collect_article_files, post_json_ld, render_single_page};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

const SITE: &str = "https://site.example";
const BRAND: &str = "FC Gestão Estratégica";

const BLOG: &str = r#"<!DOCTYPE html>
<html lang="pt-BR"><head><title>Blog</title></head>
<body>
<main>
<section class="page-header"><h1>Blog</h1></section>
<section id="blog-list"><div class="grid"><a href="artigo-velho.html">velho</a></div></section>
</main>
<script id="blog-interactions">antigo()</script>
</body></html>"#;

fn record(slug: &str, date: &str, category: &str, cover: &str) -> PostRecord {
    PostRecord {
        slug: slug.to_string(),
        title: format!("Título {slug}"),
        date_iso: date.to_string(),
        date_human_pt_br: "5 de março de 2024".to_string(),
        category: category.to_string(),
        excerpt: format!("Resumo {slug}"),
        cover_image_path: cover.to_string(),
        source_url: None,
        local_url: None,
        content_html: Some(format!("<p>Conteúdo {slug}</p>")),
    }
}

fn posts() -> PostCollection {
    [
        record("antigo", "2023-01-10", "", ""),
        record("licenca", "2024-03-05", "Licenciamento", "imagens/blog/licenca/capa.jpg"),
    ]
    .into_iter()
    .collect()
}

#[test]
fn single_page_replaces_gallery_and_appends_reader() {
    let html = render_single_page(BLOG, &posts(), SITE, BRAND);

    assert!(html.starts_with("<!DOCTYPE html>"));
    assert!(!html.contains("artigo-velho.html"));
    assert!(!html.contains("antigo()"));
    assert_eq!(html.matches(r#"id="blog-gallery""#).count(), 1);
    assert_eq!(html.matches(r#"id="blog-reader""#).count(), 1);
    assert_eq!(html.matches(r#"id="blog-spa""#).count(), 1);
    assert_eq!(html.matches(".is-hidden { display: none !important; }").count(), 1);

    let newest = html.find(r##"href="#post-licenca""##).expect("licenca card");
    let oldest = html.find(r##"href="#post-antigo""##).expect("antigo card");
    assert!(newest < oldest);
    assert!(html.contains(r#"<option value="licenciamento">Licenciamento</option>"#));
    assert!(html.contains(r#"data-category="blog""#));
    assert!(html.contains(r#"id="post-licenca""#));
    assert!(html.contains("<p>Conteúdo licenca</p>"));
}

#[test]
fn rendering_twice_keeps_one_of_each_section() {
    let once = render_single_page(BLOG, &posts(), SITE, BRAND);
    let twice = render_single_page(&once, &posts(), SITE, BRAND);

    assert_eq!(twice.matches(r#"id="blog-gallery""#).count(), 1);
    assert_eq!(twice.matches(r#"id="blog-reader""#).count(), 1);
    assert_eq!(twice.matches(r#"id="blog-spa""#).count(), 1);
    assert_eq!(twice.matches(r#"class="post-card "#).count(), 2);
    assert_eq!(twice.matches(".is-hidden { display").count(), 1);
}

#[test]
fn json_ld_points_at_the_post_anchor() {
    let post = record("licenca", "2024-03-05", "Licenciamento", "/imagens/blog/licenca/capa.jpg");

    let data = post_json_ld(&post, SITE, BRAND);

    assert_eq!(data["@type"], "BlogPosting");
    assert_eq!(data["headline"], "Título licenca");
    assert_eq!(data["mainEntityOfPage"]["@id"], "https://site.example/blog.html#post-licenca");
    assert_eq!(data["image"][0], "https://site.example/imagens/blog/licenca/capa.jpg");
    assert_eq!(data["publisher"]["name"], BRAND);

    let bare = post_json_ld(&record("x", "2024-01-01", "", ""), SITE, BRAND);
    assert!(bare.get("image").is_none());
}

#[test]
fn article_files_are_found_below_the_root() {
    let root = TempDir::new().unwrap();
    fs::create_dir_all(root.path().join("posts")).unwrap();
    fs::create_dir_all(root.path().join(".git")).unwrap();
    for name in [
        "artigo-a.html",
        "blog.html",
        "contato.html",
        "posts/b.html",
        ".git/artigo-c.html",
    ] {
        fs::write(root.path().join(name), "<html></html>").unwrap();
    }

    let files: Vec<String> = collect_article_files(root.path())
        .iter()
        .map(|path| {
            path.strip_prefix(root.path())
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect();

    assert_eq!(files, vec!["artigo-a.html", "posts/b.html"]);
}
