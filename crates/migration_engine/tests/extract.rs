use chrono::NaiveDate;
use migration_engine::{
    ArticleHints, ContentExtractor, ExtractError, ExtractionHints, Page, StrategyKind,
};
use pretty_assertions::assert_eq;

fn page(html: &str) -> Page {
    Page {
        location: "https://legacy.example/blog/gestao-de-caixa/".to_string(),
        html: html.to_string(),
    }
}

fn extractor() -> ContentExtractor {
    ContentExtractor::new(ExtractionHints::default())
}

const ELEMENTOR_POST: &str = r#"<!DOCTYPE html>
<html><head>
<meta property="article:published_time" content="2023-04-11T09:30:00+00:00">
</head><body>
<header><nav>menu menu menu</nav></header>
<div data-elementor-type="wp-post">
  <div class="elementor-widget-wrap"><div class="elementor-element"><div class="elementor-widget-container">x</div></div></div>
  <div class="elementor-widget-wrap">
    <div class="elementor-element elementor-widget-heading" data-widget_type="heading.default">
      <div class="elementor-widget-container"><h1>Gestão de caixa</h1></div>
    </div>
    <div class="elementor-element" data-widget_type="spacer.default">
      <div class="elementor-widget-container"><div class="elementor-spacer"></div></div>
    </div>
    <div class="elementor-element" data-widget_type="text-editor.default">
      <div class="elementor-widget-container"><div class="elementor-text-editor"><p>O fluxo de caixa é o coração financeiro de qualquer empresa pequena.</p></div></div>
    </div>
    <div class="elementor-element" data-widget_type="image.default">
      <div class="elementor-widget-container"><img src="/wp-content/uploads/2023/04/caixa.jpg" alt=""></div>
    </div>
  </div>
</div>
</body></html>"#;

#[test]
fn densest_wrapper_rebuilds_body_from_widgets() {
    let content = extractor()
        .extract(&page(ELEMENTOR_POST), "gestao-de-caixa", &ArticleHints::default())
        .expect("extracted");

    assert_eq!(content.strategy, StrategyKind::DensestWrapper);
    assert_eq!(content.title, "Gestão de caixa");
    assert!(content.body_html.contains("<p>O fluxo de caixa"));
    assert!(content.body_html.contains("caixa.jpg"));
    assert!(!content.body_html.contains("elementor-spacer"));
    assert!(!content.body_html.contains("menu menu"));
    assert_eq!(content.published, NaiveDate::from_ymd_opt(2023, 4, 11).unwrap());
    assert_eq!(
        content.cover_source.as_deref(),
        Some("https://legacy.example/wp-content/uploads/2023/04/caixa.jpg")
    );
    assert!(content.warnings.is_empty());
}

#[test]
fn marked_content_is_preferred() {
    let html = r#"<html><head><meta name="description" content="Resumo curto."></head><body>
        <h1>Título</h1>
        <div class="entry-content"><p>Corpo marcado.</p></div>
        <div class="elementor-widget-wrap"><p>Texto bem mais longo do que o corpo marcado, mas fora do marcador.</p></div>
        </body></html>"#;
    let content = extractor()
        .extract(&page(html), "titulo", &ArticleHints::default())
        .expect("extracted");

    assert_eq!(content.strategy, StrategyKind::MarkedContent);
    assert_eq!(content.body_html.trim(), "<p>Corpo marcado.</p>");
    assert_eq!(content.excerpt, "Resumo curto.");
}

#[test]
fn listing_hints_fill_missing_metadata() {
    let html = "<html><body><p>curto</p></body></html>";
    let hints = ArticleHints {
        title: Some("Planejamento estratégico".to_string()),
        excerpt: Some("Como planejar o ano.".to_string()),
        category: Some("Estratégia".to_string()),
        date_text: Some("5 de março de 2024".to_string()),
        cover_url: Some("/wp-content/uploads/capa.png".to_string()),
    };
    let content = extractor()
        .extract(&page(html), "planejamento", &hints)
        .expect("extracted");

    assert_eq!(content.title, "Planejamento estratégico");
    assert_eq!(content.excerpt, "Como planejar o ano.");
    assert_eq!(content.category, "Estratégia");
    assert_eq!(content.published, NaiveDate::from_ymd_opt(2024, 3, 5).unwrap());
    assert_eq!(
        content.cover_source.as_deref(),
        Some("https://legacy.example/wp-content/uploads/capa.png")
    );
}

#[test]
fn missing_date_falls_back_with_a_warning() {
    let html = "<html><body><h1>Sem data</h1><p>texto</p></body></html>";
    let content = extractor()
        .extract(&page(html), "sem-data", &ArticleHints::default())
        .expect("extracted");

    assert_eq!(content.category, "Blog");
    assert!(content
        .warnings
        .iter()
        .any(|warning| warning.contains("publication date not found")));
}

#[test]
fn long_excerpts_are_truncated_on_a_word() {
    let paragraph = "palavra ".repeat(60);
    let html = format!("<html><body><h1>T</h1><div class=\"entry-content\"><p>{paragraph}</p></div></body></html>");
    let content = extractor()
        .extract(&page(&html), "t", &ArticleHints::default())
        .expect("extracted");

    assert!(content.excerpt.ends_with("..."));
    assert!(content.excerpt.chars().count() <= 173);
    assert!(!content.excerpt.contains("  "));
}

#[test]
fn custom_strategy_list_can_fail() {
    let extractor = ContentExtractor::with_strategies(ExtractionHints::default(), Vec::new());
    let err = extractor
        .extract(&page("<html><body><p>x</p></body></html>"), "x", &ArticleHints::default())
        .unwrap_err();
    assert_eq!(err, ExtractError::MissingBody);
}

#[test]
fn nested_layouts_stay_whole_and_dividers_are_dropped() {
    let html = r#"<html><body><div data-elementor-type="wp-post">
  <div class="elementor-widget-wrap">
    <div class="elementor-element" data-widget_type="text-editor.default">
      <div class="elementor-widget-container"><div class="elementor-text-editor"><p>Introdução ao tema.</p></div></div>
    </div>
    <div class="elementor-element elementor-widget-divider" data-element_type="widget">
      <div class="elementor-widget-container"><span class="elementor-divider-separator"></span></div>
    </div>
    <div class="elementor-element" data-element_type="section">
      <div class="elementor-widget-container"><p>Primeira coluna.</p></div>
      <div class="elementor-widget-container"><p>Segunda coluna.</p></div>
    </div>
    <div class="elementor-element" data-element_type="widget" data-widget_type="html.default">
      <div class="elementor-widget-container"><p>Bloco livre.</p></div>
    </div>
  </div>
</div></body></html>"#;

    let content = extractor()
        .extract(&page(html), "colunas", &ArticleHints::default())
        .expect("extracted");

    assert_eq!(content.strategy, StrategyKind::DensestWrapper);
    assert!(!content.body_html.contains("elementor-divider-separator"));
    assert!(content.body_html.contains("<p>Primeira coluna.</p>"));
    assert!(content.body_html.contains("<p>Segunda coluna.</p>"));
    assert!(content.body_html.contains("<p>Bloco livre.</p>"));
    assert!(!content.body_html.contains(r#"data-widget_type="html.default""#));
}

#[test]
fn textless_wrappers_keep_the_first_one() {
    let html = r#"<html><body><div data-elementor-type="wp-post">
  <div class="elementor-widget-wrap">
    <div class="elementor-element" data-widget_type="image.default">
      <div class="elementor-widget-container"><img src="/wp-content/uploads/primeira.jpg" alt=""></div>
    </div>
  </div>
  <div class="elementor-widget-wrap">
    <div class="elementor-element" data-widget_type="image.default">
      <div class="elementor-widget-container"><img src="/wp-content/uploads/segunda.jpg" alt=""></div>
    </div>
  </div>
</div></body></html>"#;

    let content = extractor()
        .extract(&page(html), "so-imagens", &ArticleHints::default())
        .expect("extracted");

    assert_eq!(content.strategy, StrategyKind::DensestWrapper);
    assert!(content.body_html.contains("primeira.jpg"));
    assert!(!content.body_html.contains("segunda.jpg"));
}
