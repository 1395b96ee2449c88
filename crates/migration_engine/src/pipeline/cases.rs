use std::path::PathBuf;

use migration_logging::{migration_info, migration_warn};

use super::read_optional;
use crate::cases::{
    find_source_document, parse_cases, read_source_document, update_cases_page, CasesError,
    CasesFile, CasesReport,
};
use crate::config::SiteConfig;
use crate::error::MigrationError;
use crate::persist::{relative_posix, AtomicFileWriter};

pub const CASES_REPORT: &str = "cases-migration-report.json";

/// Turns the case document into `cases.json` and the cards of the cases
/// page. `source` overrides the document search; relative paths are taken
/// from the site root.
pub fn run_cases(config: &SiteConfig, source: Option<PathBuf>) -> Result<CasesReport, MigrationError> {
    let source = match source {
        Some(path) if path.is_absolute() => path,
        Some(path) => config.root().join(path),
        None => find_source_document(config.root())?,
    };
    if !source.is_file() {
        return Err(CasesError::SourceNotFound(source).into());
    }
    let text = read_source_document(&source)?;
    let source_ref = relative_posix(config.root(), &source);
    migration_info!("Reading cases from {}", source_ref);

    let cases = parse_cases(&text, &source_ref);
    let writer = AtomicFileWriter::new(config.site_root.clone());
    let payload = CasesFile {
        kpis: Vec::new(),
        cases,
    };
    writer.write_json(&config.cases_json, &payload)?;

    let mut report = CasesReport {
        source_document: source_ref,
        total_cases_in_document: payload.cases.len(),
        total_cases_generated: payload.cases.len(),
        ..CasesReport::default()
    };
    for case in &payload.cases {
        let missing = case.missing_fields();
        if !missing.is_empty() {
            report.missing_fields.insert(
                case.slug.clone(),
                missing.into_iter().map(str::to_string).collect(),
            );
        }
    }
    if payload.kpis.is_empty() {
        report.warnings.push("KPIs not found in the document".to_string());
    }
    if payload.cases.iter().all(|case| case.cover_image.is_empty()) {
        report.warnings.push("no images found in the document".to_string());
    }

    match read_optional(&config.path(&config.cases_html))? {
        Some(html) => match update_cases_page(&html, &payload.cases) {
            Some(updated) => {
                writer.write(&config.cases_html, &updated)?;
                report
                    .warnings
                    .push(format!("case details inserted into {}", config.cases_html));
            }
            None => {
                migration_warn!("{} has no case list section", config.cases_html);
                report
                    .warnings
                    .push(format!("{} has no case list section; page not updated", config.cases_html));
            }
        },
        None => report
            .warnings
            .push(format!("{} not found; page not updated", config.cases_html)),
    }

    writer.write_json(CASES_REPORT, &report)?;
    migration_info!("Generated {} cases", report.total_cases_generated);
    Ok(report)
}
