use migration_engine::{merge_sitemap, prune_sitemap, render_sitemap, robots_txt, sitemap_locations, SitemapEntry};
use pretty_assertions::assert_eq;

fn entry(loc: &str) -> SitemapEntry {
    SitemapEntry {
        loc: loc.to_string(),
        lastmod: "2024-03-05".to_string(),
    }
}

#[test]
fn renders_entries_in_order() {
    let xml = render_sitemap(&[entry("https://site.example/"), entry("https://site.example/a&b.html")]);

    assert_eq!(
        xml,
        concat!(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n",
            "<urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n",
            "  <url>\n    <loc>https://site.example/</loc>\n    <lastmod>2024-03-05</lastmod>\n  </url>\n",
            "  <url>\n    <loc>https://site.example/a&amp;b.html</loc>\n    <lastmod>2024-03-05</lastmod>\n  </url>\n",
            "</urlset>\n",
        )
    );
    assert!(sitemap_locations(&xml).contains("https://site.example/a&b.html"));
}

#[test]
fn merge_adds_only_new_locations() {
    let xml = render_sitemap(&[entry("https://site.example/")]);

    let (merged, added) = merge_sitemap(
        &xml,
        &[
            entry("https://site.example/"),
            entry("https://site.example/artigo-a.html"),
            entry("https://site.example/artigo-a.html"),
        ],
    )
    .expect("has urlset");

    assert_eq!(added, 1);
    assert_eq!(merged.matches("<url>").count(), 2);
    assert!(merged.trim_end().ends_with("</urlset>"));

    let (again, added_again) = merge_sitemap(&merged, &[entry("https://site.example/artigo-a.html")]).unwrap();
    assert_eq!(added_again, 0);
    assert_eq!(again, merged);
}

#[test]
fn merge_needs_a_closing_urlset() {
    assert_eq!(merge_sitemap("<urlset>", &[entry("https://site.example/")]), None);
}

#[test]
fn prune_removes_matching_entries() {
    let xml = render_sitemap(&[
        entry("https://site.example/blog.html"),
        entry("https://site.example/artigo-a.html"),
        entry("https://site.example/artigo-b.html"),
    ]);

    let (pruned, removed) = prune_sitemap(&xml, "/artigo-");

    assert_eq!(removed, 2);
    assert_eq!(pruned, render_sitemap(&[entry("https://site.example/blog.html")]));
}

#[test]
fn robots_points_at_the_sitemap() {
    assert_eq!(
        robots_txt("https://site.example/"),
        "User-agent: *\nAllow: /\nSitemap: https://site.example/sitemap.xml\n"
    );
}
