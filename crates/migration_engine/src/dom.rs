//! Tree edits on top of `scraper`.
//!
//! Rewrites are recorded against node ids in a [`DomEdits`] set while the
//! parsed tree is borrowed for selection. Rendering applies them to a copy
//! of the tree through `ego_tree` mutators and serializes it with html5ever.

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use ego_tree::{NodeId, NodeRef, Tree};
use html5ever::serialize::{serialize, Serialize, SerializeOpts, TraversalScope};
use html5ever::{ns, Attribute, LocalName, QualName};
use regex::Regex;
use scraper::node::{Element, Node, Text};
use scraper::{ElementRef, Html, Selector};

const RAW_TEXT_ELEMENTS: &[&str] = &["script", "style", "xmp", "iframe", "noembed", "noframes"];

static DOCTYPE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)^\s*<!doctype\b").expect("valid doctype regex"));

#[derive(Debug, Clone)]
enum AttrEdit {
    Set(String, String),
    Remove(String),
    Clear,
}

/// Pending changes to a parsed tree, keyed by node id.
#[derive(Debug, Default)]
pub struct DomEdits {
    removed: HashSet<NodeId>,
    replaced: HashMap<NodeId, String>,
    inner: HashMap<NodeId, String>,
    attrs: HashMap<NodeId, Vec<AttrEdit>>,
    renamed: HashMap<NodeId, String>,
    wrapped: HashMap<NodeId, (String, Vec<(String, String)>)>,
    prepended: HashMap<NodeId, Vec<String>>,
    appended: HashMap<NodeId, Vec<String>>,
    after: HashMap<NodeId, Vec<String>>,
}

impl DomEdits {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.removed.is_empty()
            && self.replaced.is_empty()
            && self.inner.is_empty()
            && self.attrs.is_empty()
            && self.renamed.is_empty()
            && self.wrapped.is_empty()
            && self.prepended.is_empty()
            && self.appended.is_empty()
            && self.after.is_empty()
    }

    pub fn remove(&mut self, id: NodeId) {
        self.removed.insert(id);
    }

    pub fn is_removed(&self, id: NodeId) -> bool {
        self.removed.contains(&id)
    }

    pub fn replace_with_html(&mut self, id: NodeId, html: impl Into<String>) {
        self.replaced.insert(id, html.into());
    }

    /// Replaces the children. Prepended and appended markup is ignored then.
    pub fn set_inner_html(&mut self, id: NodeId, html: impl Into<String>) {
        self.inner.insert(id, html.into());
    }

    pub fn set_attr(&mut self, id: NodeId, name: &str, value: impl Into<String>) {
        self.attrs
            .entry(id)
            .or_default()
            .push(AttrEdit::Set(name.to_string(), value.into()));
    }

    pub fn remove_attr(&mut self, id: NodeId, name: &str) {
        self.attrs
            .entry(id)
            .or_default()
            .push(AttrEdit::Remove(name.to_string()));
    }

    /// Drops every attribute of the element and sets `attrs` instead.
    pub fn replace_attrs(&mut self, id: NodeId, attrs: &[(String, String)]) {
        let edits = self.attrs.entry(id).or_default();
        edits.push(AttrEdit::Clear);
        edits.extend(
            attrs
                .iter()
                .map(|(key, value)| AttrEdit::Set(key.clone(), value.clone())),
        );
    }

    pub fn rename(&mut self, id: NodeId, tag: &str) {
        self.renamed.insert(id, tag.to_string());
    }

    /// Moves the node into a new `<tag>` element placed where it was.
    pub fn wrap(&mut self, id: NodeId, tag: &str, attrs: &[(&str, &str)]) {
        let attrs = attrs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        self.wrapped.insert(id, (tag.to_string(), attrs));
    }

    pub fn prepend_html(&mut self, id: NodeId, html: impl Into<String>) {
        self.prepended.entry(id).or_default().push(html.into());
    }

    pub fn append_html(&mut self, id: NodeId, html: impl Into<String>) {
        self.appended.entry(id).or_default().push(html.into());
    }

    pub fn insert_after(&mut self, id: NodeId, html: impl Into<String>) {
        self.after.entry(id).or_default().push(html.into());
    }

    /// Attribute value after the recorded edits.
    pub fn attr(&self, element: ElementRef<'_>, name: &str) -> Option<String> {
        effective_attrs(element.value(), self.attrs.get(&element.id()))
            .into_iter()
            .find(|(key, _)| attr_name(key) == name)
            .map(|(_, value)| value)
    }

    /// Applies every edit to `tree`. Node ids stay valid for a clone of the
    /// tree the edits were recorded on.
    fn apply(&self, tree: &mut Tree<Node>) {
        for (id, edits) in &self.attrs {
            if let Some(mut node) = tree.get_mut(*id) {
                if let Node::Element(element) = node.value() {
                    let attrs = effective_attrs(element, Some(edits));
                    *element = rebuild_element(element.name.clone(), attrs);
                }
            }
        }
        for (id, tag) in &self.renamed {
            if let Some(mut node) = tree.get_mut(*id) {
                if let Node::Element(element) = node.value() {
                    element.name = QualName::new(None, ns!(html), LocalName::from(tag.as_str()));
                }
            }
        }
        for (id, (tag, attrs)) in &self.wrapped {
            if !is_attached(tree, *id) {
                continue;
            }
            let attrs = attrs
                .iter()
                .map(|(key, value)| (plain_name(key), value.clone()))
                .collect();
            let wrapper = tree
                .orphan(Node::Element(rebuild_element(
                    QualName::new(None, ns!(html), LocalName::from(tag.as_str())),
                    attrs,
                )))
                .id();
            if let Some(mut node) = tree.get_mut(*id) {
                node.insert_id_before(wrapper);
            }
            if let Some(mut wrapper) = tree.get_mut(wrapper) {
                wrapper.append_id(*id);
            }
        }

        let mut followed: Vec<NodeId> = self.replaced.keys().chain(self.after.keys()).copied().collect();
        followed.sort();
        followed.dedup();
        for id in followed {
            if self.removed.contains(&id) || !is_attached(tree, id) {
                continue;
            }
            let mut markup = self.replaced.get(&id).cloned().unwrap_or_default();
            if let Some(items) = self.after.get(&id) {
                markup.extend(items.iter().map(String::as_str));
            }
            let mut anchor = id;
            for new_id in graft(tree, &markup, false) {
                if let Some(mut node) = tree.get_mut(anchor) {
                    node.insert_id_after(new_id);
                }
                anchor = new_id;
            }
            if self.replaced.contains_key(&id) {
                detach(tree, id);
            }
        }

        for (id, markup) in &self.inner {
            if !is_attached(tree, *id) {
                continue;
            }
            let children: Vec<NodeId> = tree
                .get(*id)
                .map(|node| node.children().map(|child| child.id()).collect())
                .unwrap_or_default();
            children.into_iter().for_each(|child| detach(tree, child));
            let raw = is_raw_text(tree, *id);
            for new_id in graft(tree, markup, raw) {
                if let Some(mut node) = tree.get_mut(*id) {
                    node.append_id(new_id);
                }
            }
        }

        for (id, items) in &self.prepended {
            if self.inner.contains_key(id) || !is_attached(tree, *id) {
                continue;
            }
            let raw = is_raw_text(tree, *id);
            for new_id in graft(tree, &items.concat(), raw).into_iter().rev() {
                if let Some(mut node) = tree.get_mut(*id) {
                    node.prepend_id(new_id);
                }
            }
        }
        for (id, items) in &self.appended {
            if self.inner.contains_key(id) || !is_attached(tree, *id) {
                continue;
            }
            let raw = is_raw_text(tree, *id);
            for new_id in graft(tree, &items.concat(), raw) {
                if let Some(mut node) = tree.get_mut(*id) {
                    node.append_id(new_id);
                }
            }
        }

        for id in &self.removed {
            detach(tree, *id);
        }
    }
}

/// Parses `markup` into orphan nodes of `tree` and returns the top-level ids
/// in document order. Inside raw-text elements the markup stays one text node.
fn graft(tree: &mut Tree<Node>, markup: &str, raw: bool) -> Vec<NodeId> {
    if markup.is_empty() {
        return Vec::new();
    }
    if raw {
        let text = Text {
            text: markup.into(),
        };
        return vec![tree.orphan(Node::Text(text)).id()];
    }

    let fragment = Html::parse_fragment(markup);
    let root = tree.extend_tree(fragment.tree).id();
    let holder = tree.get(root).and_then(|root| {
        root.children()
            .find(|child| child.value().is_element())
            .map(|child| child.id())
    });
    match holder.and_then(|holder| tree.get(holder)) {
        Some(holder) => holder.children().map(|child| child.id()).collect(),
        None => Vec::new(),
    }
}

fn detach(tree: &mut Tree<Node>, id: NodeId) {
    if let Some(mut node) = tree.get_mut(id) {
        node.detach();
    }
}

/// True while the node is still reachable from the tree root.
fn is_attached(tree: &Tree<Node>, id: NodeId) -> bool {
    let root = tree.root().id();
    tree.get(id).is_some_and(|node| {
        node.id() == root || node.ancestors().last().is_some_and(|top| top.id() == root)
    })
}

fn is_raw_text(tree: &Tree<Node>, id: NodeId) -> bool {
    tree.get(id)
        .and_then(|node| node.value().as_element().map(|el| RAW_TEXT_ELEMENTS.contains(&el.name())))
        .unwrap_or(false)
}

fn rebuild_element(name: QualName, attrs: Vec<(QualName, String)>) -> Element {
    let attrs = attrs
        .into_iter()
        .map(|(name, value)| Attribute {
            name,
            value: value.into(),
        })
        .collect();
    Element::new(name, attrs)
}

fn plain_name(name: &str) -> QualName {
    QualName::new(None, ns!(), LocalName::from(name))
}

/// Attribute name as written in markup, namespace prefix included.
fn attr_name(name: &QualName) -> String {
    match &name.prefix {
        Some(prefix) => format!("{}:{}", prefix, name.local),
        None if name.ns == ns!(xlink) => format!("xlink:{}", name.local),
        None if name.ns == ns!(xml) => format!("xml:{}", name.local),
        None => name.local.to_string(),
    }
}

fn effective_attrs(element: &Element, edits: Option<&Vec<AttrEdit>>) -> Vec<(QualName, String)> {
    let mut attrs: Vec<(QualName, String)> = element
        .attrs
        .iter()
        .map(|(key, value)| (key.clone(), value.to_string()))
        .collect();
    for edit in edits.into_iter().flatten() {
        match edit {
            AttrEdit::Set(key, value) => match attrs.iter_mut().find(|(k, _)| attr_name(k) == *key) {
                Some(slot) => slot.1 = value.clone(),
                None => attrs.push((plain_name(key), value.clone())),
            },
            AttrEdit::Remove(key) => attrs.retain(|(k, _)| attr_name(k) != *key),
            AttrEdit::Clear => attrs.clear(),
        }
    }
    attrs
}

fn to_html<T: Serialize>(node: &T, scope: TraversalScope) -> String {
    // Pages are parsed with scripting on, so `<noscript>` must serialize raw.
    let opts = SerializeOpts {
        scripting_enabled: true,
        traversal_scope: scope,
        create_missing_parent: false,
    };
    let mut buf = Vec::new();
    serialize(&mut buf, node, opts).expect("serializing into memory cannot fail");
    String::from_utf8_lossy(&buf).into_owned()
}

/// Serializes the whole document with `edits` applied, doctype included.
pub fn render_document(doc: &Html, edits: &DomEdits) -> String {
    if edits.is_empty() {
        return to_html(doc, TraversalScope::IncludeNode);
    }
    let mut edited = doc.clone();
    edits.apply(&mut edited.tree);
    to_html(&edited, TraversalScope::IncludeNode)
}

/// Serializes the children of a fragment parsed with `Html::parse_fragment`.
pub fn render_fragment(fragment: &Html, edits: &DomEdits) -> String {
    if edits.is_empty() {
        return to_html(&fragment.root_element(), TraversalScope::ChildrenOnly(None));
    }
    let mut edited = fragment.clone();
    edits.apply(&mut edited.tree);
    to_html(&edited.root_element(), TraversalScope::ChildrenOnly(None))
}

/// Escapes text for use inside HTML content or a double-quoted attribute.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            other => out.push(other),
        }
    }
    out
}

/// Renders `name="value"` pairs with a leading space each.
pub fn render_attrs(attrs: &[(String, String)]) -> String {
    let mut out = String::new();
    for (key, value) in attrs {
        out.push(' ');
        out.push_str(key);
        out.push_str("=\"");
        out.push_str(&value.replace('&', "&amp;").replace('"', "&quot;"));
        out.push('"');
    }
    out
}

pub fn element_attrs(element: ElementRef<'_>) -> Vec<(String, String)> {
    element
        .value()
        .attrs
        .iter()
        .map(|(key, value)| (attr_name(key), value.to_string()))
        .collect()
}

pub fn selector(css: &str) -> Option<Selector> {
    Selector::parse(css).ok()
}

pub fn select_all<'a>(root: ElementRef<'a>, css: &str) -> Vec<ElementRef<'a>> {
    match selector(css) {
        Some(sel) => root.select(&sel).collect(),
        None => Vec::new(),
    }
}

pub fn select_first<'a>(root: ElementRef<'a>, css: &str) -> Option<ElementRef<'a>> {
    let sel = selector(css)?;
    let found = root.select(&sel).next();
    found
}

/// First match in the whole document, `<html>` included.
pub fn document_first<'a>(doc: &'a Html, css: &str) -> Option<ElementRef<'a>> {
    let sel = selector(css)?;
    let found = doc.select(&sel).next();
    found
}

pub fn document_all<'a>(doc: &'a Html, css: &str) -> Vec<ElementRef<'a>> {
    match selector(css) {
        Some(sel) => doc.select(&sel).collect(),
        None => Vec::new(),
    }
}

/// Concatenated text with whitespace collapsed.
pub fn text_of(element: ElementRef<'_>) -> String {
    migration_core::collapse_whitespace(&element.text().collect::<String>())
}

/// True when the raw source contains an opening `<tag` (parsers synthesize
/// missing `head`/`body` elements, so the tree cannot answer this).
pub fn source_has_tag(raw: &str, tag: &str) -> bool {
    let needle = format!("<{}", tag.to_ascii_lowercase());
    let lower = raw.to_ascii_lowercase();
    lower.match_indices(&needle).any(|(idx, _)| {
        lower[idx + needle.len()..]
            .chars()
            .next()
            .is_some_and(|c| c == '>' || c == '/' || c.is_whitespace())
    })
}

pub fn source_has_doctype(raw: &str) -> bool {
    DOCTYPE.is_match(raw)
}

/// Nearest ancestor (or the element itself) whose tag is in `tags`.
pub fn closest<'a>(element: ElementRef<'a>, tags: &[&str]) -> Option<ElementRef<'a>> {
    if tags.contains(&element.value().name()) {
        return Some(element);
    }
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .find(|ancestor| tags.contains(&ancestor.value().name()))
}

pub fn has_class(element: ElementRef<'_>, class: &str) -> bool {
    element
        .value()
        .attr("class")
        .is_some_and(|classes| classes.split_whitespace().any(|c| c == class))
}

/// True when `node` is `ancestor` or sits below it.
pub fn is_inside(node: NodeRef<'_, Node>, ancestor: NodeId) -> bool {
    node.id() == ancestor || node.ancestors().any(|a| a.id() == ancestor)
}
