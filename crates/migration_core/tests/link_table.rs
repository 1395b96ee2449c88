use migration_core::{LinkTable, LinkTarget, OutputMode};
use pretty_assertions::assert_eq;

fn table(mode: OutputMode) -> LinkTable {
    LinkTable::new("https://www.legacy.example", mode).with_articles(["my-post", "outro"])
}

#[test]
fn known_article_maps_per_output_mode() {
    let files = table(OutputMode::ArticleFiles);
    assert_eq!(
        files.resolve("https://legacy.example/my-post/"),
        Some(LinkTarget::Article {
            slug: "my-post".to_string(),
            destination: "artigo-my-post.html".to_string(),
        })
    );

    let single = table(OutputMode::SinglePage);
    assert_eq!(
        single
            .resolve("https://www.legacy.example/my-post/")
            .map(|t| t.destination().to_string()),
        Some("blog.html#post-my-post".to_string())
    );
}

#[test]
fn legacy_pages_and_blog_paths_map_to_static_pages() {
    let links = table(OutputMode::ArticleFiles);
    let dest = |href: &str| links.resolve(href).map(|t| t.destination().to_string());

    assert_eq!(dest("https://legacy.example/"), Some("index.html".to_string()));
    assert_eq!(dest("/contato/"), Some("contato.html".to_string()));
    assert_eq!(dest("/quem-somos"), Some("sobre.html".to_string()));
    assert_eq!(dest("/servi%C3%A7os/"), Some("servicos.html".to_string()));
    assert_eq!(dest("/blog/page/2/"), Some("blog.html".to_string()));
    assert_eq!(dest("//legacy.example/cases/?x=1"), Some("cases.html".to_string()));
}

#[test]
fn external_unknown_and_non_navigational_links_are_untouched() {
    let links = table(OutputMode::ArticleFiles);
    assert_eq!(links.resolve("https://other.example/my-post/"), None);
    assert_eq!(links.resolve("/wp-content/uploads/file.pdf"), None);
    assert_eq!(links.resolve("#top"), None);
    assert_eq!(links.resolve("mailto:a@b.c"), None);
    assert_eq!(links.resolve("tel:+5511"), None);
    assert_eq!(links.resolve("javascript:void(0)"), None);
    assert_eq!(links.resolve("contato.html"), None);
}

#[test]
fn local_article_files_follow_the_mode() {
    let single = table(OutputMode::SinglePage);
    let dest = |href: &str| single.resolve(href).map(|t| t.destination().to_string());
    assert_eq!(dest("artigo-my-post.html"), Some("blog.html#post-my-post".to_string()));
    assert_eq!(dest("../posts/outro.html"), Some("blog.html#post-outro".to_string()));
    assert_eq!(dest("artigo-desconhecido.html"), None);
}
