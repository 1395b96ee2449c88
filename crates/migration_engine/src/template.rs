use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use scraper::{ElementRef, Html};
use thiserror::Error;

use crate::dom::{
    document_all, document_first, element_attrs, render_attrs, render_fragment, select_all,
    source_has_tag, DomEdits,
};

const TEMPLATE_LINK_RELS: &[&str] = &[
    "preconnect",
    "stylesheet",
    "icon",
    "apple-touch-icon",
    "manifest",
];

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template not found: {0}")]
    Missing(PathBuf),
    #[error("could not read template {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("template is missing <{0}>")]
    Incomplete(&'static str),
}

/// A `<head>` child carried from the template into composed pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HeadAsset {
    Link { attrs: Vec<(String, String)> },
    Script { attrs: Vec<(String, String)>, body: String },
    Style { attrs: Vec<(String, String)>, text: String },
}

/// What makes two head assets "the same" for merging purposes.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum AssetIdentity {
    Link { rels: Vec<String>, href: String },
    Script(String),
    Style(String),
}

impl AssetIdentity {
    pub fn is_stylesheet(&self) -> bool {
        match self {
            AssetIdentity::Link { rels, .. } => rels.iter().any(|r| r == "stylesheet"),
            AssetIdentity::Style(_) => true,
            AssetIdentity::Script(src) => src.contains("tailwindcss"),
        }
    }
}

impl HeadAsset {
    fn from_template_element(element: ElementRef<'_>) -> Option<Self> {
        let attrs = element_attrs(element);
        match element.value().name() {
            "link" => {
                let rel = element.value().attr("rel").unwrap_or_default().to_ascii_lowercase();
                let carried = rel
                    .split_whitespace()
                    .any(|r| TEMPLATE_LINK_RELS.contains(&r));
                (carried && element.value().attr("href").is_some())
                    .then_some(HeadAsset::Link { attrs })
            }
            "script" => element.value().attr("src").map(|_| HeadAsset::Script {
                attrs,
                body: element.inner_html(),
            }),
            "style" => Some(HeadAsset::Style {
                attrs,
                text: element.text().collect(),
            }),
            _ => None,
        }
    }

    fn attrs(&self) -> &[(String, String)] {
        match self {
            HeadAsset::Link { attrs } => attrs,
            HeadAsset::Script { attrs, .. } => attrs,
            HeadAsset::Style { attrs, .. } => attrs,
        }
    }

    fn attr(&self, name: &str) -> Option<&str> {
        self.attrs()
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    pub fn identity(&self) -> AssetIdentity {
        match self {
            HeadAsset::Link { .. } => AssetIdentity::Link {
                rels: sorted_rels(self.attr("rel").unwrap_or_default()),
                href: normalize_reference(self.attr("href").unwrap_or_default()),
            },
            HeadAsset::Script { .. } => {
                AssetIdentity::Script(normalize_reference(self.attr("src").unwrap_or_default()))
            }
            HeadAsset::Style { text, .. } => AssetIdentity::Style(text.trim().to_string()),
        }
    }

    /// Copy with relative `href`/`src` values moved under `prefix`.
    pub fn with_prefix(&self, prefix: &str) -> Self {
        let adjust = |attrs: &[(String, String)]| -> Vec<(String, String)> {
            attrs
                .iter()
                .map(|(key, value)| {
                    if key == "href" || key == "src" {
                        (key.clone(), prefix_reference(value, prefix))
                    } else {
                        (key.clone(), value.clone())
                    }
                })
                .collect()
        };
        match self {
            HeadAsset::Link { attrs } => HeadAsset::Link {
                attrs: adjust(attrs),
            },
            HeadAsset::Script { attrs, body } => HeadAsset::Script {
                attrs: adjust(attrs),
                body: body.clone(),
            },
            HeadAsset::Style { attrs, text } => HeadAsset::Style {
                attrs: attrs.clone(),
                text: text.clone(),
            },
        }
    }

    pub fn to_html(&self) -> String {
        match self {
            HeadAsset::Link { attrs } => format!("<link{}>", render_attrs(attrs)),
            HeadAsset::Script { attrs, body } => {
                format!("<script{}>{body}</script>", render_attrs(attrs))
            }
            HeadAsset::Style { attrs, text } => {
                format!("<style{}>{text}</style>", render_attrs(attrs))
            }
        }
    }
}

/// Identity of an element already present in a page head, if it is a
/// link, external script or style.
pub fn identity_of(element: ElementRef<'_>) -> Option<AssetIdentity> {
    let value = element.value();
    match value.name() {
        "link" => value.attr("href").map(|href| AssetIdentity::Link {
            rels: sorted_rels(value.attr("rel").unwrap_or_default()),
            href: normalize_reference(href),
        }),
        "script" => value
            .attr("src")
            .map(|src| AssetIdentity::Script(normalize_reference(src))),
        "style" => Some(AssetIdentity::Style(
            element.text().collect::<String>().trim().to_string(),
        )),
        _ => None,
    }
}

fn sorted_rels(rel: &str) -> Vec<String> {
    let mut rels: Vec<String> = rel
        .split_whitespace()
        .map(|r| r.to_ascii_lowercase())
        .collect();
    rels.sort();
    rels
}

fn normalize_reference(value: &str) -> String {
    let value = value.trim();
    value.strip_prefix("./").unwrap_or(value).to_string()
}

/// True for references resolved against the page's own directory.
pub fn is_relative_reference(value: &str) -> bool {
    let value = value.trim();
    if value.is_empty() {
        return false;
    }
    let lower = value.to_ascii_lowercase();
    const ABSOLUTE: &[&str] = &[
        "#", "mailto:", "tel:", "data:", "javascript:", "/", "http://", "https://", "//",
    ];
    !ABSOLUTE.iter().any(|prefix| lower.starts_with(prefix))
}

pub fn prefix_reference(value: &str, prefix: &str) -> String {
    if prefix.is_empty() || !is_relative_reference(value) {
        return value.to_string();
    }
    format!("{prefix}{}", normalize_reference(value))
}

/// Applies [`prefix_reference`] to every `href`/`src` in a fragment.
pub fn prefix_fragment_paths(html: &str, prefix: &str) -> String {
    if prefix.is_empty() {
        return html.to_string();
    }
    let fragment = Html::parse_fragment(html);
    let mut edits = DomEdits::new();
    for element in select_all(fragment.root_element(), "[href], [src]") {
        for name in ["href", "src"] {
            if let Some(value) = element.value().attr(name) {
                let adjusted = prefix_reference(value, prefix);
                if adjusted != value {
                    edits.set_attr(element.id(), name, adjusted);
                }
            }
        }
    }
    render_fragment(&fragment, &edits)
}

/// Header, footer and shared head assets of the site, loaded once per run.
#[derive(Debug, Clone)]
pub struct Template {
    source: PathBuf,
    header_html: String,
    footer_html: String,
    head_assets: Vec<HeadAsset>,
    body_attrs: Vec<(String, String)>,
    main_attrs: Vec<(String, String)>,
    html_attrs: Vec<(String, String)>,
}

impl Template {
    pub fn load(path: &Path) -> Result<Self, TemplateError> {
        if !path.is_file() {
            return Err(TemplateError::Missing(path.to_path_buf()));
        }
        let bytes = fs::read(path).map_err(|source| TemplateError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&String::from_utf8_lossy(&bytes), path)
    }

    pub fn parse(html: &str, source: &Path) -> Result<Self, TemplateError> {
        if !source_has_tag(html, "head") {
            return Err(TemplateError::Incomplete("head"));
        }
        if !source_has_tag(html, "body") {
            return Err(TemplateError::Incomplete("body"));
        }
        let doc = Html::parse_document(html);

        let header = document_first(&doc, "body > header")
            .or_else(|| document_first(&doc, "header"))
            .ok_or(TemplateError::Incomplete("header"))?;
        let footer = document_first(&doc, "body > footer")
            .or_else(|| document_all(&doc, "footer").into_iter().last())
            .ok_or(TemplateError::Incomplete("footer"))?;

        let head_assets = document_all(&doc, "head > link, head > script, head > style")
            .into_iter()
            .filter_map(HeadAsset::from_template_element)
            .collect();

        let attrs_of = |css: &str| {
            document_first(&doc, css)
                .map(element_attrs)
                .unwrap_or_default()
        };

        Ok(Self {
            source: source.to_path_buf(),
            header_html: header.html(),
            footer_html: footer.html(),
            head_assets,
            body_attrs: attrs_of("body"),
            main_attrs: attrs_of("main"),
            html_attrs: attrs_of("html"),
        })
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn header_html(&self) -> &str {
        &self.header_html
    }

    pub fn footer_html(&self) -> &str {
        &self.footer_html
    }

    pub fn head_assets(&self) -> &[HeadAsset] {
        &self.head_assets
    }

    pub fn body_attrs(&self) -> &[(String, String)] {
        &self.body_attrs
    }

    pub fn main_attrs(&self) -> &[(String, String)] {
        &self.main_attrs
    }

    pub fn html_attrs(&self) -> &[(String, String)] {
        &self.html_attrs
    }
}
