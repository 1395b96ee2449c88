use std::fs;
use std::path::{Path, PathBuf};

use migration_core::MigrationReport;
use migration_logging::{migration_info, migration_warn, PageScope};

use super::{page_depth, read_site_file};
use crate::compose::{compose, find_broken_assets};
use crate::config::SiteConfig;
use crate::error::{MigrationError, PageError};
use crate::persist::{relative_posix, AtomicFileWriter};
use crate::template::Template;

pub const LAYOUT_REPORT: &str = "layout-fix-report.json";

const ARTICLE_DIRS: &[&str] = &["posts", "blog"];

/// `artigo-*.html` at the root plus every page below the article folders,
/// sorted and without duplicates.
pub fn layout_targets(root: &Path) -> Vec<PathBuf> {
    let mut targets = Vec::new();
    if let Ok(entries) = fs::read_dir(root) {
        targets.extend(entries.flatten().map(|e| e.path()).filter(|path| {
            path.is_file()
                && path.file_name().is_some_and(|name| {
                    let name = name.to_string_lossy();
                    name.starts_with("artigo-") && name.ends_with(".html")
                })
        }));
    }
    for dir in ARTICLE_DIRS {
        collect_html(&root.join(dir), &mut targets);
    }
    targets.sort();
    targets.dedup();
    targets
}

fn collect_html(dir: &Path, out: &mut Vec<PathBuf>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            collect_html(&path, out);
        } else if path
            .extension()
            .is_some_and(|ext| ext.eq_ignore_ascii_case("html"))
        {
            out.push(path);
        }
    }
}

/// Recomposes every article page around the current template.
pub fn run_fix_layout(config: &SiteConfig) -> Result<MigrationReport, MigrationError> {
    let template = Template::load(&config.path(&config.template_file))?;
    let writer = AtomicFileWriter::new(config.site_root.clone());
    let mut report = MigrationReport::new();
    report.template_used = Some(config.template_file.clone());

    let targets = layout_targets(config.root());
    report.total_pages = targets.len();
    migration_info!("Fixing layout of {} pages", targets.len());

    for path in &targets {
        let relative = relative_posix(config.root(), path);
        let _scope = PageScope::enter(&relative);
        let html = match read_site_file(path) {
            Ok(html) => html,
            Err(err) => {
                report.record_skip(&relative, err.to_string());
                continue;
            }
        };
        match fix_page(&html, &relative, path, &template, &writer, &mut report) {
            Ok(()) => report.record_success(),
            Err(err) => {
                migration_warn!("Skipped: {}", err);
                report.record_skip(&relative, err.to_string());
            }
        }
    }

    writer.write_json(LAYOUT_REPORT, &report)?;
    Ok(report)
}

fn fix_page(
    html: &str,
    relative: &str,
    path: &Path,
    template: &Template,
    writer: &AtomicFileWriter,
    report: &mut MigrationReport,
) -> Result<(), PageError> {
    let composed = compose(html, template, page_depth(relative))?;
    if !composed.has_css {
        report.missing_css_after_fix.push(relative.to_string());
    }
    let page_dir = path.parent().unwrap_or(Path::new("."));
    for asset in find_broken_assets(&composed.html, page_dir) {
        report.record_broken_asset(relative, asset);
    }
    writer.write(relative, &composed.html)?;
    Ok(())
}
