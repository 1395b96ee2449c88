use migration_core::LinkTable;
use scraper::{ElementRef, Html};

use crate::dom::{render_document, render_fragment, select_all, DomEdits};

/// Rewrites anchors that point at the legacy site.
pub struct LinkRewriter<'a> {
    table: &'a LinkTable,
}

impl<'a> LinkRewriter<'a> {
    pub fn new(table: &'a LinkTable) -> Self {
        Self { table }
    }

    /// Records href edits for every anchor below `root`. Returns how many
    /// hrefs actually change.
    pub fn collect(&self, root: ElementRef<'_>, edits: &mut DomEdits) -> usize {
        let mut rewritten = 0;
        for anchor in select_all(root, "a[href]") {
            let Some(href) = anchor.value().attr("href") else {
                continue;
            };
            let Some(target) = self.table.resolve(href) else {
                continue;
            };
            if target.destination() != href {
                edits.set_attr(anchor.id(), "href", target.destination());
                rewritten += 1;
            }
        }
        rewritten
    }

    /// Rewrites a body fragment. Input without matching links is returned as is.
    pub fn rewrite_fragment(&self, html: &str) -> (String, usize) {
        let fragment = Html::parse_fragment(html);
        let mut edits = DomEdits::new();
        let count = self.collect(fragment.root_element(), &mut edits);
        if count == 0 {
            return (html.to_string(), 0);
        }
        (render_fragment(&fragment, &edits), count)
    }

    /// Same as [`rewrite_fragment`](Self::rewrite_fragment) for full documents.
    pub fn rewrite_document(&self, html: &str) -> (String, usize) {
        let doc = Html::parse_document(html);
        let mut edits = DomEdits::new();
        let count = self.collect(doc.root_element(), &mut edits);
        if count == 0 {
            return (html.to_string(), 0);
        }
        (render_document(&doc, &edits), count)
    }
}
