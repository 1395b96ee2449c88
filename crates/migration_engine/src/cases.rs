//! Case studies: a plain-text document of `Case:` blocks turned into
//! `data/cases.json` and the card grid of `cases.html`.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;
use std::time::SystemTime;

use migration_core::{collapse_whitespace, fold_accents, UniqueSlugs};
use regex::Regex;
use scraper::{ElementRef, Html};
use serde::Serialize;
use thiserror::Error;

use crate::dom::{document_all, document_first, escape_html, has_class, render_document, select_all, text_of, DomEdits};

const SEARCH_DIRS: &[&str] = &["", "docs", "assets", "content"];
const TEXT_EXTENSIONS: &[&str] = &["md", "txt"];
const BINARY_EXTENSIONS: &[&str] = &["pdf", "docx"];
const NAME_HINTS: &[&str] = &["case", "portfolio", "projeto"];
const LIST_HEADING: &str = "Estudos Realizados";
const MORE: &str = "Saiba mais";

static CASE_SPLIT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bCase:\s*").expect("valid case regex"));
static INTRO: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)^Cases de sucesso.*?Case:\s*").expect("valid intro regex")
});
static SPACE_BEFORE_PUNCT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[ \t]+([.,;:])").expect("valid punctuation regex"));
static RESULTS_LABEL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"Resultados:?").expect("valid results regex"));

#[derive(Debug, Error)]
pub enum CasesError {
    #[error("no case document found below {0}")]
    SourceNotFound(PathBuf),
    #[error("{0} is not a text document; export it to .md or .txt first")]
    UnsupportedFormat(PathBuf),
    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetailSection {
    pub title: String,
    pub content: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaseItem {
    pub slug: String,
    pub client: String,
    pub segment: String,
    pub title: String,
    pub excerpt: String,
    /// Always exactly two entries.
    pub bullets: Vec<String>,
    pub detail_sections: Vec<DetailSection>,
    pub cover_image: String,
    pub gallery_images: Vec<String>,
    pub results: Vec<String>,
    pub source_refs: Vec<String>,
    pub scope: String,
    pub deliverables: Vec<String>,
}

impl CaseItem {
    /// Optional fields the document did not provide.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        let checks = [
            ("client", self.client.is_empty()),
            ("segment", self.segment.is_empty()),
            ("coverImage", self.cover_image.is_empty()),
            ("galleryImages", self.gallery_images.is_empty()),
            ("scope", self.scope.is_empty()),
            ("deliverables", self.deliverables.is_empty()),
            ("results", self.results.is_empty()),
        ];
        checks
            .into_iter()
            .filter_map(|(name, missing)| missing.then_some(name))
            .collect()
    }
}

/// Contents of `data/cases.json`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct CasesFile {
    pub kpis: Vec<serde_json::Value>,
    pub cases: Vec<CaseItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CasesReport {
    pub source_document: String,
    pub total_cases_in_document: usize,
    pub total_cases_generated: usize,
    pub missing_fields: BTreeMap<String, Vec<String>>,
    pub warnings: Vec<String>,
}

/// Picks the case document: `.md`/`.txt`/`.pdf`/`.docx` files below the
/// search directories, preferring names that mention cases or projects,
/// then the most recently modified.
pub fn find_source_document(root: &Path) -> Result<PathBuf, CasesError> {
    let mut candidates: Vec<(bool, SystemTime, PathBuf)> = Vec::new();
    for dir in SEARCH_DIRS {
        let base = root.join(dir);
        let recursive = !dir.is_empty();
        collect_documents(&base, recursive, &mut candidates);
    }
    candidates.sort_by(|a, b| (b.0, b.1).cmp(&(a.0, a.1)));
    candidates
        .into_iter()
        .next()
        .map(|(_, _, path)| path)
        .ok_or_else(|| CasesError::SourceNotFound(root.to_path_buf()))
}

fn collect_documents(dir: &Path, recursive: bool, out: &mut Vec<(bool, SystemTime, PathBuf)>) {
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        let name = entry.file_name().to_string_lossy().to_lowercase();
        if path.is_dir() {
            if recursive && !name.starts_with('.') {
                collect_documents(&path, true, out);
            }
            continue;
        }
        let Some(ext) = path.extension().map(|e| e.to_string_lossy().to_lowercase()) else {
            continue;
        };
        if !TEXT_EXTENSIONS.contains(&ext.as_str()) && !BINARY_EXTENSIONS.contains(&ext.as_str()) {
            continue;
        }
        let folded = fold_accents(&name);
        let hinted = NAME_HINTS.iter().any(|hint| folded.contains(hint));
        let modified = entry
            .metadata()
            .and_then(|meta| meta.modified())
            .unwrap_or(SystemTime::UNIX_EPOCH);
        out.push((hinted, modified, path));
    }
}

/// Reads a text case document. Binary formats are rejected.
pub fn read_source_document(path: &Path) -> Result<String, CasesError> {
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_lowercase())
        .unwrap_or_default();
    if !TEXT_EXTENSIONS.contains(&ext.as_str()) {
        return Err(CasesError::UnsupportedFormat(path.to_path_buf()));
    }
    let bytes = fs::read(path).map_err(|source| CasesError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Joins wrapped lines into paragraphs separated by a single newline and
/// drops whitespace before punctuation.
pub fn normalize_document_text(text: &str) -> String {
    let mut paragraphs: Vec<String> = Vec::new();
    let mut current: Vec<&str> = Vec::new();
    for line in text.lines().map(str::trim) {
        if line.is_empty() {
            if !current.is_empty() {
                paragraphs.push(current.join(" "));
                current.clear();
            }
        } else {
            current.push(line);
        }
    }
    if !current.is_empty() {
        paragraphs.push(current.join(" "));
    }
    let joined = paragraphs
        .iter()
        .map(|p| p.split([' ', '\t']).filter(|w| !w.is_empty()).collect::<Vec<_>>().join(" "))
        .collect::<Vec<_>>()
        .join("\n");
    SPACE_BEFORE_PUNCT.replace_all(&joined, "$1").trim().to_string()
}

/// Sentences ending in `.`, `!` or `?` followed by whitespace.
pub fn split_sentences(text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut start = 0;
    let mut chars = text.char_indices().peekable();
    while let Some((idx, c)) = chars.next() {
        let ends = matches!(c, '.' | '!' | '?')
            && chars.peek().is_some_and(|(_, next)| next.is_whitespace());
        if ends {
            let end = idx + c.len_utf8();
            sentences.push(text[start..end].trim().to_string());
            start = end;
        }
    }
    sentences.push(text[start..].trim().to_string());
    sentences.retain(|s| !s.is_empty());
    sentences
}

/// Segment label guessed from keywords in the title and context.
pub fn infer_segment(title: &str, context: &str) -> String {
    let text = fold_accents(&format!("{title} {context}")).to_lowercase();
    let segment = if text.contains("energia solar") || text.contains("fotovoltaic") {
        "Energia Solar"
    } else if text.contains("trafego") || text.contains("vias urbanas") || text.contains("veiculos") {
        "Mobilidade Urbana"
    } else if text.contains("termel") {
        "Energia"
    } else if text.contains("producao de cal") {
        "Indústria de Cal"
    } else {
        ""
    };
    segment.to_string()
}

struct CaseSections<'a> {
    title: &'a str,
    context: &'a str,
    methodology: &'a str,
    results: &'a str,
}

fn split_block(block: &str) -> Option<CaseSections<'_>> {
    const CONTEXT: &str = "Contexto:";
    const METHOD: &str = "Metodologia aplicada:";
    let context_at = block.find(CONTEXT)?;
    let title = block[..context_at].trim();
    let after_context = context_at + CONTEXT.len();

    let method_at = block[after_context..].find(METHOD).map(|i| i + after_context);
    let results_from = method_at.map_or(after_context, |at| at + METHOD.len());
    let results = RESULTS_LABEL.find_at(block, results_from);

    let context_end = method_at
        .or(results.as_ref().map(|m| m.start()))
        .unwrap_or(block.len());
    let methodology = match method_at {
        Some(at) => {
            let end = results.as_ref().map_or(block.len(), |m| m.start());
            &block[at + METHOD.len()..end]
        }
        None => "",
    };
    Some(CaseSections {
        title,
        context: &block[after_context..context_end],
        methodology,
        results: results.map_or("", |m| &block[m.end()..]),
    })
}

/// Parses every `Case:` block that has a title and a `Contexto:` section.
pub fn parse_cases(text: &str, source_ref: &str) -> Vec<CaseItem> {
    let normalized = normalize_document_text(text);
    let normalized = INTRO.replace(&normalized, "Case: ");
    let mut slugs = UniqueSlugs::new();
    let mut cases = Vec::new();

    for block in CASE_SPLIT.split(&normalized).map(str::trim) {
        let Some(sections) = split_block(block) else {
            continue;
        };
        if sections.title.is_empty() {
            continue;
        }
        let title = collapse_whitespace(sections.title);
        let context = collapse_whitespace(sections.context);
        let methodology = collapse_whitespace(sections.methodology);
        let results = collapse_whitespace(sections.results);

        let method_sentences = split_sentences(&methodology);
        let result_sentences = split_sentences(&results);
        let mut bullets: Vec<String> = method_sentences
            .first()
            .into_iter()
            .chain(result_sentences.first())
            .cloned()
            .collect();
        bullets.resize(2, MORE.to_string());

        cases.push(CaseItem {
            slug: slugs.claim(&title, "case"),
            client: String::new(),
            segment: infer_segment(&title, &context),
            excerpt: split_sentences(&context).into_iter().next().unwrap_or_default(),
            bullets,
            detail_sections: vec![
                DetailSection {
                    title: "Descrição completa".to_string(),
                    content: context,
                },
                DetailSection {
                    title: "Metodologia aplicada".to_string(),
                    content: methodology,
                },
                DetailSection {
                    title: "Resultados".to_string(),
                    content: results,
                },
            ],
            cover_image: String::new(),
            gallery_images: Vec::new(),
            results: result_sentences.into_iter().take(4).collect(),
            source_refs: vec![source_ref.to_string()],
            scope: String::new(),
            deliverables: Vec::new(),
            title,
        });
    }
    cases
}

const CHECK_ICON: &str = r#"<svg class="w-5 h-5 text-[--brand-green] mr-2 flex-shrink-0" fill="currentColor" viewBox="0 0 20 20"><path fill-rule="evenodd" clip-rule="evenodd" d="M10 18a8 8 0 100-16 8 8 0 000 16zm3.707-9.293a1 1 0 00-1.414-1.414L9 10.586 7.707 9.293a1 1 0 00-1.414 1.414l2 2a1 1 0 001.414 0l4-4z"></path></svg>"#;

pub fn render_case_cards(cases: &[CaseItem]) -> String {
    cases
        .iter()
        .enumerate()
        .map(|(idx, case)| {
            let title = escape_html(&case.title);
            let image = if case.cover_image.is_empty() {
                r#"<div class="w-full h-48 bg-gradient-to-r from-slate-200 via-slate-100 to-slate-200"></div>"#.to_string()
            } else {
                format!(
                    r#"<img src="{}" alt="{title}" class="w-full h-48 object-cover" decoding="async" loading="lazy">"#,
                    escape_html(&case.cover_image)
                )
            };
            let segment = if case.segment.is_empty() {
                String::new()
            } else {
                format!(
                    r#"<span class="inline-block px-3 py-1 text-xs font-semibold bg-blue-100 text-[--brand-blue] rounded-full">{}</span>"#,
                    escape_html(&case.segment)
                )
            };
            let client = if case.client.is_empty() {
                String::new()
            } else {
                format!(
                    r#"<span class="text-sm font-bold text-slate-700">{}</span>"#,
                    escape_html(&case.client)
                )
            };
            let bullets: String = case
                .bullets
                .iter()
                .map(|b| format!(r#"<li class="flex items-start">{CHECK_ICON}<span>{}</span></li>"#, escape_html(b)))
                .collect();
            format!(
                r##"<a href="#case-{slug}" class="block" aria-label="Ver detalhes de {title}">
  <div class="bg-white rounded-xl shadow-lg overflow-hidden case-card animated-item fade-in" style="transition-delay: {delay}ms;">
    {image}
    <div class="p-6">
      <div class="flex items-center gap-3 mb-3">{segment}{client}</div>
      <h3 class="text-xl font-bold text-slate-900 mb-2">{title}</h3>
      <p class="text-slate-600 mb-4">{excerpt}</p>
      <ul class="space-y-2 text-sm text-slate-600">{bullets}</ul>
    </div>
  </div>
</a>"##,
                slug = case.slug,
                delay = idx * 100,
                excerpt = escape_html(&case.excerpt),
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn paragraphs(text: &str) -> Vec<String> {
    text.split("\n\n")
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .map(escape_html)
        .collect()
}

pub fn render_case_details(cases: &[CaseItem]) -> String {
    cases
        .iter()
        .enumerate()
        .map(|(idx, case)| {
            let title = escape_html(&case.title);
            let label = [case.client.as_str(), case.segment.as_str()]
                .into_iter()
                .filter(|part| !part.is_empty())
                .collect::<Vec<_>>()
                .join(" • ");
            let cover = if case.cover_image.is_empty() {
                String::new()
            } else {
                format!(
                    r#"<img src="{}" alt="{title}" class="w-full h-auto rounded-xl shadow-lg my-6" decoding="async" loading="lazy">"#,
                    escape_html(&case.cover_image)
                )
            };
            let mut blocks: Vec<String> = case
                .detail_sections
                .iter()
                .filter_map(|section| {
                    let body = paragraphs(&section.content);
                    (!body.is_empty()).then(|| {
                        format!(
                            r#"<div><h4 class="text-xl font-bold text-slate-900 mb-3">{}</h4><div class="prose max-w-none text-slate-600">{}</div></div>"#,
                            escape_html(&section.title),
                            body.iter().map(|p| format!("<p>{p}</p>")).collect::<String>()
                        )
                    })
                })
                .collect();
            if !case.results.is_empty() {
                let items: String = case
                    .results
                    .iter()
                    .map(|r| format!("<li>{}</li>", escape_html(r)))
                    .collect();
                blocks.push(format!(
                    r#"<div><h4 class="text-xl font-bold text-slate-900 mb-3">Resultados e indicadores</h4><ul class="list-disc pl-6 text-slate-600">{items}</ul></div>"#
                ));
            }
            format!(
                r##"<article id="case-{slug}" class="case-detail bg-white rounded-2xl shadow-lg p-8 md:p-10 animated-item fade-in" style="transition-delay: {delay}ms;">
  <div class="flex items-center justify-between mb-4">
    <a href="#case-list" data-case-back class="text-sm font-semibold text-[--brand-blue] hover:underline">Voltar aos cases</a>
  </div>
  <div class="flex flex-col md:flex-row md:items-center md:justify-between gap-4">
    <div>
      <p class="text-xs uppercase tracking-widest text-slate-500">{label}</p>
      <h3 class="text-2xl md:text-3xl font-bold text-slate-900 mt-2">{title}</h3>
      <p class="text-slate-600 mt-3">{excerpt}</p>
    </div>
    <a href="contato.html" class="inline-flex items-center justify-center bg-[--brand-blue] text-white font-bold py-3 px-6 rounded-lg shadow-lg hover:scale-105 transition-transform duration-300">Contato</a>
  </div>
  {cover}
  <div class="mt-6 space-y-6">
    {blocks}
  </div>
</article>"##,
                slug = case.slug,
                delay = idx * 100,
                label = escape_html(&label),
                excerpt = escape_html(&case.excerpt),
                blocks = blocks.join("\n"),
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn details_section(cases: &[CaseItem]) -> String {
    format!(
        r#"<section id="case-details" class="py-20 sm:py-28 bg-slate-50 hidden">
  <div class="container mx-auto px-6">
    <div class="text-center mb-12 animated-item fade-in">
      <span class="font-bold text-[--brand-blue]">DETALHES</span>
      <h2 class="text-3xl md:text-4xl font-bold text-slate-900 mt-2">Detalhes dos Cases</h2>
      <p class="mt-4 text-lg text-slate-600 max-w-3xl mx-auto">Confira o escopo, metodologia e resultados de cada projeto.</p>
    </div>
    <div class="space-y-10">
      {}
    </div>
  </div>
</section>"#,
        render_case_details(cases)
    )
}

fn is_card_grid(element: ElementRef<'_>) -> bool {
    element.value().name() == "div" && has_class(element, "grid") && has_class(element, "md:grid-cols-2")
}

/// Rewrites the case list of `cases.html`. Returns `None` when the page has
/// no "Estudos Realizados" section.
pub fn update_cases_page(html: &str, cases: &[CaseItem]) -> Option<String> {
    let doc = Html::parse_document(html);
    let heading = document_all(&doc, "h2")
        .into_iter()
        .find(|h2| text_of(*h2).contains(LIST_HEADING))?;
    let section = heading
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|el| el.value().name() == "section")?;

    let mut edits = DomEdits::new();
    edits.set_attr(section.id(), "id", "case-list");
    if let Some(grid) = select_all(section, "div").into_iter().find(|el| is_card_grid(*el)) {
        edits.set_inner_html(grid.id(), format!("\n{}\n", render_case_cards(cases)));
    }

    let details = details_section(cases);
    match document_first(&doc, "section#case-details") {
        Some(existing) => edits.replace_with_html(existing.id(), details),
        None => edits.insert_after(section.id(), format!("\n{details}")),
    }
    Some(render_document(&doc, &edits))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentences_split_on_terminal_punctuation() {
        assert_eq!(
            split_sentences("Primeira frase. Segunda! Terceira? fim"),
            vec!["Primeira frase.", "Segunda!", "Terceira?", "fim"]
        );
        assert_eq!(split_sentences("v1.2 mantida."), vec!["v1.2 mantida."]);
    }

    #[test]
    fn wrapped_lines_are_joined() {
        let text = "Linha um\ncontinua aqui .\n\nOutro   parágrafo";
        assert_eq!(
            normalize_document_text(text),
            "Linha um continua aqui.\nOutro parágrafo"
        );
    }

    #[test]
    fn segment_keywords() {
        assert_eq!(infer_segment("Usina fotovoltaica", ""), "Energia Solar");
        assert_eq!(infer_segment("Estudo", "tráfego em vias"), "Mobilidade Urbana");
        assert_eq!(infer_segment("Outro", "nada"), "");
    }
}
