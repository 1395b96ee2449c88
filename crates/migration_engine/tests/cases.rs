use std::fs;

use migration_engine::{
    find_source_document, parse_cases, read_source_document, run_cases, update_cases_page,
    CasesError, MigrationError, SiteConfig, CASES_REPORT,
};
use pretty_assertions::assert_eq;
use serde_json::Value;
use tempfile::TempDir;

const DOCUMENT: &str = "Cases de sucesso da FC
Uma introdução que não vira case.

Case: Usina fotovoltaica em Minas
Contexto: A empresa precisava licenciar uma usina solar. O prazo era
curto .
Metodologia aplicada: Levantamento de campo e estudos. Reuniões com o órgão.
Resultados: Licença emitida em 90 dias. Economia de 20%.

Case: Usina fotovoltaica em Minas
Contexto: Segunda fase do projeto.

Case: Sem contexto aqui
";

const CASES_PAGE: &str = r#"<!DOCTYPE html>
<html><head><title>Cases</title></head><body>
<section class="py-20">
  <h2>Estudos Realizados</h2>
  <div class="grid md:grid-cols-2 gap-8"><a href="old">card antigo</a></div>
</section>
</body></html>"#;

#[test]
fn parses_case_blocks() {
    let cases = parse_cases(DOCUMENT, "docs/cases.md");

    assert_eq!(cases.len(), 2);
    let first = &cases[0];
    assert_eq!(first.slug, "usina-fotovoltaica-em-minas");
    assert_eq!(first.title, "Usina fotovoltaica em Minas");
    assert_eq!(first.segment, "Energia Solar");
    assert_eq!(first.excerpt, "A empresa precisava licenciar uma usina solar.");
    assert_eq!(
        first.bullets,
        vec!["Levantamento de campo e estudos.", "Licença emitida em 90 dias."]
    );
    assert_eq!(first.results, vec!["Licença emitida em 90 dias.", "Economia de 20%."]);
    assert_eq!(
        first.detail_sections[0].content,
        "A empresa precisava licenciar uma usina solar. O prazo era curto."
    );
    assert_eq!(first.source_refs, vec!["docs/cases.md"]);

    let second = &cases[1];
    assert_eq!(second.slug, "usina-fotovoltaica-em-minas-2");
    assert_eq!(second.bullets, vec!["Saiba mais", "Saiba mais"]);
    assert!(second.results.is_empty());
    assert!(second.missing_fields().contains(&"results"));
}

#[test]
fn source_search_prefers_hinted_names() {
    let root = TempDir::new().unwrap();
    fs::create_dir_all(root.path().join("docs")).unwrap();
    fs::write(root.path().join("notas.txt"), "x").unwrap();
    fs::write(root.path().join("docs/portfolio-cases.md"), DOCUMENT).unwrap();

    let found = find_source_document(root.path()).unwrap();
    assert_eq!(found, root.path().join("docs/portfolio-cases.md"));

    let empty = TempDir::new().unwrap();
    assert!(matches!(
        find_source_document(empty.path()),
        Err(CasesError::SourceNotFound(_))
    ));
}

#[test]
fn binary_documents_are_rejected() {
    let root = TempDir::new().unwrap();
    let pdf = root.path().join("cases.pdf");
    fs::write(&pdf, b"%PDF-1.4").unwrap();

    assert!(matches!(
        read_source_document(&pdf),
        Err(CasesError::UnsupportedFormat(_))
    ));
}

#[test]
fn cases_page_gets_cards_and_details() {
    let cases = parse_cases(DOCUMENT, "docs/cases.md");

    let html = update_cases_page(CASES_PAGE, &cases).expect("has case list");

    assert!(html.starts_with("<!DOCTYPE html>"));
    assert!(!html.contains("card antigo"));
    assert!(html.contains(r#"id="case-list""#));
    assert_eq!(html.matches(r##"href="#case-usina-fotovoltaica-em-minas""##).count(), 1);
    assert_eq!(html.matches(r#"id="case-usina-fotovoltaica-em-minas-2""#).count(), 1);
    assert_eq!(html.matches(r#"id="case-details""#).count(), 1);

    let again = update_cases_page(&html, &cases).expect("still has case list");
    assert_eq!(again.matches(r#"id="case-details""#).count(), 1);
    assert_eq!(again.matches("case-card").count(), 2);

    assert_eq!(update_cases_page("<html><body><h2>Outro</h2></body></html>", &cases), None);
}

#[test]
fn run_cases_writes_json_report_and_page() {
    let root = TempDir::new().unwrap();
    fs::create_dir_all(root.path().join("docs")).unwrap();
    fs::write(root.path().join("docs/cases.md"), DOCUMENT).unwrap();
    fs::write(root.path().join("cases.html"), CASES_PAGE).unwrap();
    let config = SiteConfig::default().with_root(root.path());

    let report = run_cases(&config, None).expect("cases");

    assert_eq!(report.source_document, "docs/cases.md");
    assert_eq!(report.total_cases_generated, 2);
    assert!(report.warnings.iter().any(|w| w.contains("KPIs not found")));
    assert!(report.missing_fields.contains_key("usina-fotovoltaica-em-minas"));

    let data: Value =
        serde_json::from_str(&fs::read_to_string(root.path().join("data/cases.json")).unwrap()).unwrap();
    assert_eq!(data["kpis"], Value::Array(Vec::new()));
    assert_eq!(data["cases"][0]["coverImage"], "");
    assert_eq!(data["cases"][1]["slug"], "usina-fotovoltaica-em-minas-2");

    let page = fs::read_to_string(root.path().join("cases.html")).unwrap();
    assert!(page.contains("case-details"));
    assert!(root.path().join(CASES_REPORT).is_file());
}

#[test]
fn explicit_source_must_exist() {
    let root = TempDir::new().unwrap();
    let config = SiteConfig::default().with_root(root.path());

    let err = run_cases(&config, Some("docs/falta.md".into())).unwrap_err();
    assert!(matches!(
        err,
        MigrationError::Cases(CasesError::SourceNotFound(_))
    ));
}
