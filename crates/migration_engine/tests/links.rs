use migration_core::{LinkTable, OutputMode};
use migration_engine::LinkRewriter;
use pretty_assertions::assert_eq;

fn table(mode: OutputMode) -> LinkTable {
    LinkTable::new("https://www.legacy.example", mode).with_articles(["fluxo-de-caixa"])
}

#[test]
fn rewrites_article_and_page_links_in_fragments() {
    let links = table(OutputMode::ArticleFiles);
    let rewriter = LinkRewriter::new(&links);
    let body = concat!(
        r#"<p><a href="https://legacy.example/fluxo-de-caixa/">caixa</a> "#,
        r#"<a href="/contato/">fale</a> "#,
        r#"<a href="https://outro.example/x">fora</a> "#,
        r#"<a href="mailto:a@b.c">mail</a></p>"#,
    );

    let (html, count) = rewriter.rewrite_fragment(body);

    assert_eq!(count, 2);
    assert_eq!(
        html,
        concat!(
            r#"<p><a href="artigo-fluxo-de-caixa.html">caixa</a> "#,
            r#"<a href="contato.html">fale</a> "#,
            r#"<a href="https://outro.example/x">fora</a> "#,
            r#"<a href="mailto:a@b.c">mail</a></p>"#,
        )
    );
}

#[test]
fn single_page_mode_points_at_anchors() {
    let links = table(OutputMode::SinglePage);
    let rewriter = LinkRewriter::new(&links);

    let (html, count) = rewriter.rewrite_fragment(r#"<a href="artigo-fluxo-de-caixa.html">x</a>"#);

    assert_eq!(count, 1);
    assert_eq!(html, r#"<a href="blog.html#post-fluxo-de-caixa">x</a>"#);
}

#[test]
fn untouched_input_is_returned_verbatim() {
    let links = table(OutputMode::ArticleFiles);
    let rewriter = LinkRewriter::new(&links);
    let body = "<p>sem   links<br/></p>";

    assert_eq!(rewriter.rewrite_fragment(body), (body.to_string(), 0));
}

#[test]
fn documents_keep_their_doctype() {
    let links = table(OutputMode::ArticleFiles);
    let rewriter = LinkRewriter::new(&links);
    let page = "<!DOCTYPE html><html><head></head><body><a href=\"/blog/\">blog</a></body></html>";

    let (html, count) = rewriter.rewrite_document(page);

    assert_eq!(count, 1);
    assert!(html.starts_with("<!DOCTYPE html>"));
    assert!(html.contains(r#"<a href="blog.html">blog</a>"#));
}
