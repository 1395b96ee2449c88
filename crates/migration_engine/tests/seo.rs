use std::fs;

use migration_core::{LinkTable, OutputMode, PostRecord};
use migration_engine::{list_public_pages, SeoNormalizer, SeoReport, SeoSettings};
use pretty_assertions::assert_eq;
use tempfile::TempDir;

const SITE: &str = "https://site.example";
const BRAND: &str = "FC Gestão Estratégica";

fn post() -> PostRecord {
    PostRecord {
        slug: "licenca".to_string(),
        title: "Licença ambiental".to_string(),
        date_iso: "2024-03-05".to_string(),
        date_human_pt_br: "5 de março de 2024".to_string(),
        category: "Licenciamento".to_string(),
        excerpt: "Como obter a licença ambiental.".to_string(),
        cover_image_path: "imagens/blog/licenca/capa.jpg".to_string(),
        source_url: None,
        local_url: Some("artigo-licenca.html".to_string()),
        content_html: None,
    }
}

/// PNG signature and IHDR chunk; enough to read its size.
fn png_header(width: u32, height: u32) -> Vec<u8> {
    let mut data = b"\x89PNG\r\n\x1a\n\x00\x00\x00\x0dIHDR".to_vec();
    data.extend_from_slice(&width.to_be_bytes());
    data.extend_from_slice(&height.to_be_bytes());
    data.extend_from_slice(&[8, 6, 0, 0, 0]);
    data
}

const ARTICLE: &str = r#"<!DOCTYPE html>
<html><head><meta charset="iso-8859-1"><meta charset="utf-8"><title>Licença ambiental | FC Gestão Estratégica | FC Gestão Estratégica</title>
<meta property="og:title" content="velho"></head>
<body>
<header><img src="imagens/logo/logo12-1.png"></header>
<main>
<h1>Licença ambiental</h1>
<h1>Segundo título</h1>
<p><img src="imagens/blog/licenca/grafico-area.png"></p>
<p><a href="contato.html">contato</a> <a href="nao-existe.html#x">quebrado</a> <a href="https://www.legacy.example/licenca/">antigo</a></p>
</main>
</body></html>"#;

fn site() -> TempDir {
    let root = TempDir::new().unwrap();
    fs::create_dir_all(root.path().join("imagens/blog/licenca")).unwrap();
    fs::create_dir_all(root.path().join("imagens/logo")).unwrap();
    fs::write(root.path().join("imagens/blog/licenca/grafico-area.png"), png_header(640, 480)).unwrap();
    fs::write(root.path().join("imagens/logo/logo12-1.png"), png_header(10, 10)).unwrap();
    fs::write(root.path().join("contato.html"), "<html></html>").unwrap();
    fs::write(root.path().join("artigo-licenca.html"), ARTICLE).unwrap();
    root
}

#[test]
fn article_head_is_normalized() {
    let root = site();
    let settings = SeoSettings::new(root.path().to_path_buf(), SITE, BRAND);
    let links = LinkTable::new("legacy.example", OutputMode::ArticleFiles).with_articles(["licenca"]);
    let normalizer = SeoNormalizer::new(&settings, &links);
    let post = post();

    let outcome = normalizer.apply(ARTICLE, "artigo-licenca.html", Some(&post));
    let html = &outcome.html;

    assert!(outcome.is_article);
    assert_eq!(outcome.title, "Licença ambiental | FC Gestão Estratégica");
    assert_eq!(outcome.description, "Como obter a licença ambiental.");
    assert_eq!(outcome.canonical, "https://site.example/artigo-licenca.html");
    assert_eq!(
        outcome.og_image.as_deref(),
        Some("https://site.example/imagens/blog/licenca/capa.jpg")
    );
    assert_eq!(html.matches("<h1").count(), 1);
    assert!(html.contains("<h2>Segundo título</h2>"));
    assert_eq!(html.matches("charset=").count(), 1);
    assert_eq!(html.matches("name=\"viewport\"").count(), 1);
    assert_eq!(html.matches("property=\"og:title\"").count(), 1);
    assert!(!html.contains("velho"));
    assert!(html.contains(r#"content="article""#));
    assert!(html.contains(r#"content="2024-03-05""#));
    assert!(html.contains("\"@type\":\"BlogPosting\""));
    assert!(html.contains(r#"alt="Grafico area""#));
    assert!(html.contains(r#"width="640""#));
    assert!(html.contains(r#"height="480""#));
    assert!(html.contains(r#"loading="eager""#));
    assert!(html.contains(r#"<a href="artigo-licenca.html">antigo</a>"#));
    assert_eq!(outcome.links_rewritten, 1);
    assert_eq!(outcome.broken_links, vec!["nao-existe.html".to_string()]);
    assert_eq!(outcome.images_missing_alt, 0);
}

#[test]
fn second_pass_changes_nothing() {
    let root = site();
    let settings = SeoSettings::new(root.path().to_path_buf(), SITE, BRAND);
    let links = LinkTable::new("legacy.example", OutputMode::ArticleFiles).with_articles(["licenca"]);
    let normalizer = SeoNormalizer::new(&settings, &links);
    let post = post();

    let once = normalizer.apply(ARTICLE, "artigo-licenca.html", Some(&post));
    let twice = normalizer.apply(&once.html, "artigo-licenca.html", Some(&post));

    assert_eq!(twice.title, once.title);
    assert_eq!(twice.description, once.description);
    assert_eq!(twice.html.matches("structured-data").count(), 1);
    assert_eq!(twice.html.matches("rel=\"canonical\"").count(), 1);
    assert_eq!(twice.html.matches("<title>").count(), 1);
    assert_eq!(twice.html.len(), once.html.len());
}

#[test]
fn plain_pages_are_websites_with_generated_description() {
    let root = site();
    let settings = SeoSettings::new(root.path().to_path_buf(), SITE, BRAND);
    let links = LinkTable::new("legacy.example", OutputMode::ArticleFiles);
    let normalizer = SeoNormalizer::new(&settings, &links);
    let page = "<html><head></head><body><main><p>Consultoria ambiental para empresas que precisam de licenças.</p></main></body></html>";

    let outcome = normalizer.apply(page, "servicos/index.html", None);

    assert!(!outcome.is_article);
    assert_eq!(outcome.title, BRAND);
    assert_eq!(
        outcome.description,
        "Consultoria ambiental para empresas que precisam de licenças."
    );
    assert_eq!(outcome.canonical, "https://site.example/servicos/index.html");
    assert_eq!(
        outcome.og_image.as_deref(),
        Some("https://site.example/imagens/logo/logo12-1.png")
    );
    assert!(outcome.html.contains(r#"content="website""#));
    assert!(outcome.html.contains(r#"href="../assets/icons/favicon.svg""#));
    assert!(outcome.html.contains(r#"<html lang="pt-BR">"#));
}

#[test]
fn report_counts_pages_and_broken_links() {
    let root = site();
    let settings = SeoSettings::new(root.path().to_path_buf(), SITE, BRAND);
    let links = LinkTable::new("legacy.example", OutputMode::ArticleFiles);
    let normalizer = SeoNormalizer::new(&settings, &links);
    let post = post();

    let mut report = SeoReport::default();
    let article = normalizer.apply(ARTICLE, "artigo-licenca.html", Some(&post));
    report.record("artigo-licenca.html", &article);
    let plain = normalizer.apply("<html><head></head><body></body></html>", "index.html", None);
    report.record("index.html", &plain);

    assert_eq!(report.total_pages, 2);
    assert_eq!(report.total_posts, 1);
    assert_eq!(report.pages_with_canonical, 2);
    assert_eq!(report.broken_links_count, 1);
    assert_eq!(plain.canonical, "https://site.example/");
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["pagesWithOG"], 2);
    assert_eq!(json["brokenLinks"]["artigo-licenca.html"][0], "nao-existe.html");
}

#[test]
fn public_pages_skip_tooling_directories() {
    let root = site();
    fs::create_dir_all(root.path().join("data")).unwrap();
    fs::write(root.path().join("data/x.html"), "").unwrap();
    fs::create_dir_all(root.path().join("blog")).unwrap();
    fs::write(root.path().join("blog/a.html"), "").unwrap();
    fs::write(root.path().join("index.html"), "").unwrap();

    let pages: Vec<String> = list_public_pages(root.path())
        .iter()
        .map(|path| {
            path.strip_prefix(root.path())
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect();

    assert_eq!(pages, vec!["artigo-licenca.html", "blog/a.html", "contato.html", "index.html"]);
}
