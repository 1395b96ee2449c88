mod common;

use common::FakeFetcher;
use migration_engine::{
    collect_index, discover_post_urls, parse_index_page, slug_from_post_url, FailureKind,
};
use pretty_assertions::assert_eq;

const BLOG: &str = "https://www.legacy.example/blog/";

fn card(slug: &str, title: &str) -> String {
    format!(
        r#"<article class="elementor-post">
  <a class="elementor-post__thumbnail__link" href="https://www.legacy.example/{slug}/">
    <div class="elementor-post__thumbnail"><img data-src="/wp-content/uploads/{slug}.jpg" src="data:image/gif;base64,R0lG"></div>
  </a>
  <div class="elementor-post__badge">Gestão</div>
  <h3 class="elementor-post__title"><a href="https://www.legacy.example/{slug}/">{title}</a></h3>
  <span class="elementor-post-date">5 de março de 2024</span>
  <div class="elementor-post__excerpt"><p>Resumo de {title}</p></div>
</article>"#
    )
}

fn listing(cards: &[String], next: Option<&str>) -> String {
    let next = next
        .map(|href| format!(r#"<a class="page-numbers next" href="{href}">Próxima »</a>"#))
        .unwrap_or_default();
    format!("<html><body>{}<nav>{next}</nav></body></html>", cards.concat())
}

#[test]
fn parses_elementor_cards() {
    let html = listing(&[card("fluxo-de-caixa", "Fluxo de caixa")], Some("/blog/page/2/"));
    let page = parse_index_page(&html, BLOG);

    assert_eq!(page.entries.len(), 1);
    let entry = &page.entries[0];
    assert_eq!(entry.slug, "fluxo-de-caixa");
    assert_eq!(entry.url, "https://www.legacy.example/fluxo-de-caixa/");
    assert_eq!(entry.title, "Fluxo de caixa");
    assert_eq!(entry.category, "Gestão");
    assert_eq!(entry.date_text, "5 de março de 2024");
    assert_eq!(entry.excerpt, "Resumo de Fluxo de caixa");
    assert_eq!(
        entry.cover_url.as_deref(),
        Some("https://www.legacy.example/wp-content/uploads/fluxo-de-caixa.jpg")
    );
    assert_eq!(
        page.next_page.as_deref(),
        Some("https://www.legacy.example/blog/page/2/")
    );
}

#[test]
fn site_pages_are_not_posts() {
    let host = "legacy.example";
    assert_eq!(
        slug_from_post_url("https://legacy.example/licenca/", host),
        Some("licenca".to_string())
    );
    assert_eq!(slug_from_post_url("https://legacy.example/contato/", host), None);
    assert_eq!(slug_from_post_url("https://legacy.example/blog/x/", host), None);
    assert_eq!(slug_from_post_url("https://legacy.example/arquivo.pdf", host), None);
    assert_eq!(slug_from_post_url("https://outro.example/licenca/", host), None);
}

#[tokio::test]
async fn collect_follows_next_links_and_merges_duplicates() {
    let page2 = "https://www.legacy.example/blog/page/2/";
    let fetcher = FakeFetcher::new()
        .html(
            BLOG,
            &listing(&[card("a", "A"), card("b", "B")], Some(page2)),
        )
        .html(
            page2,
            // links back to the first page: must not loop
            &listing(&[card("b", "B novo"), card("c", "C")], Some(BLOG)),
        );

    let listing = collect_index(&fetcher, BLOG, 10).await.expect("listing");

    let slugs: Vec<&str> = listing.entries.iter().map(|e| e.slug.as_str()).collect();
    assert_eq!(slugs, vec!["a", "b", "c"]);
    assert_eq!(listing.entries[1].title, "B novo");
    assert_eq!(listing.pages_visited, 2);
    assert_eq!(fetcher.calls(), 2);
}

#[tokio::test]
async fn collect_stops_at_the_page_limit() {
    let page2 = "https://www.legacy.example/blog/page/2/";
    let fetcher = FakeFetcher::new()
        .html(BLOG, &listing(&[card("a", "A")], Some(page2)))
        .html(page2, &listing(&[card("b", "B")], None));

    let listing = collect_index(&fetcher, BLOG, 1).await.expect("listing");

    assert_eq!(listing.entries.len(), 1);
    assert_eq!(listing.warnings, vec!["stopped after 1 listing pages".to_string()]);
}

#[tokio::test]
async fn later_page_failures_are_warnings() {
    let fetcher = FakeFetcher::new().html(
        BLOG,
        &listing(&[card("a", "A")], Some("https://www.legacy.example/blog/page/2/")),
    );

    let listing = collect_index(&fetcher, BLOG, 5).await.expect("listing");

    assert_eq!(listing.entries.len(), 1);
    assert_eq!(listing.warnings.len(), 1);
    assert!(listing.warnings[0].contains("page/2"));
}

#[tokio::test]
async fn first_page_failure_is_an_error() {
    let fetcher = FakeFetcher::new();
    let err = collect_index(&fetcher, BLOG, 5).await.unwrap_err();
    assert_eq!(err.kind, FailureKind::HttpStatus(404));
}

#[tokio::test]
async fn discovery_walks_numbered_pages() {
    let fetcher = FakeFetcher::new()
        .html(
            BLOG,
            r#"<a href="/a/">A</a><a href="https://legacy.example/b/">B</a><a href="/contato/">C</a>"#,
        )
        .html(
            "https://www.legacy.example/blog/2/",
            r#"<a href="/b/">B</a><a href="/c/">C</a>"#,
        );

    let urls = discover_post_urls(&fetcher, BLOG, "https://www.legacy.example", 9).await;

    assert_eq!(
        urls,
        vec![
            "https://www.legacy.example/a/",
            "https://www.legacy.example/b/",
            "https://www.legacy.example/c/",
        ]
    );
    assert_eq!(fetcher.calls(), 3);
}
