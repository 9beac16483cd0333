//! Markup Module for MobiLang Compiler
//!
//! Parses screen markup with html5ever and builds a [`TagTree`]. Document
//! wrappers (`html`, `head`, `body`) are flattened away; only body content is kept.

use html5ever::parse_document;
use markup5ever_rcdom::{Handle, NodeData, RcDom};
use tendril::TendrilSink;

use crate::errors::{CoderError, CoderResult};
use crate::tag::{Tag, TagId, TagTree};

/// Root name used when markup has more than one top-level node.
pub const FRAGMENT: &str = "fragment";

/// Parses a screen's markup. A single top-level element becomes the root;
/// anything else is wrapped in a `fragment` root.
pub fn parse_markup(html: &str) -> CoderResult<TagTree> {
    let dom = parse_dom(html)?;
    let top = body_children(&dom);
    if let [single] = top.as_slice() {
        if let NodeData::Element { name, attrs, .. } = &single.data {
            let mut tree = TagTree::new(element_tag(&name.local, &attrs.borrow()));
            let root = tree.root();
            fill_children(&mut tree, root, single);
            return Ok(tree);
        }
    }
    Ok(build_fragment(&top))
}

/// Parses nested markup, always under a `fragment` root.
pub fn parse_fragment(html: &str) -> CoderResult<TagTree> {
    let dom = parse_dom(html)?;
    Ok(build_fragment(&body_children(&dom)))
}

fn build_fragment(top: &[Handle]) -> TagTree {
    let mut tree = TagTree::new(Tag::new(FRAGMENT));
    let root = tree.root();
    for handle in top {
        insert_handle(&mut tree, root, handle);
    }
    tree
}

fn parse_dom(html: &str) -> CoderResult<RcDom> {
    parse_document(RcDom::default(), Default::default())
        .from_utf8()
        .read_from(&mut html.as_bytes())
        .map_err(|e| CoderError::Markup {
            message: format!("Failed to parse markup: {}", e),
        })
}

/// Significant children of `<body>`. Dropping `dom` empties every node it owns,
/// so the handles must not outlive it.
fn body_children(dom: &RcDom) -> Vec<Handle> {
    let Some(body) = find_body(&dom.document) else {
        return Vec::new();
    };
    let children = body.children.borrow();
    children
        .iter()
        .filter(|child| is_significant(child))
        .cloned()
        .collect()
}

fn find_body(handle: &Handle) -> Option<Handle> {
    if let NodeData::Element { name, .. } = &handle.data {
        if name.local.as_ref() == "body" {
            return Some(handle.clone());
        }
    }
    for child in handle.children.borrow().iter() {
        if let Some(body) = find_body(child) {
            return Some(body);
        }
    }
    None
}

fn is_significant(handle: &Handle) -> bool {
    match &handle.data {
        NodeData::Element { .. } => true,
        NodeData::Text { contents } => !contents.borrow().trim().is_empty(),
        _ => false,
    }
}

fn collapse_whitespace(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn element_tag(name: &str, attrs: &[html5ever::Attribute]) -> Tag {
    let mut tag = Tag::new(name);
    for attr in attrs {
        tag.set_attribute(attr.name.local.as_ref(), attr.value.to_string());
    }
    tag
}

fn insert_handle(tree: &mut TagTree, parent: TagId, handle: &Handle) {
    match &handle.data {
        NodeData::Text { contents } => {
            let text = collapse_whitespace(&contents.borrow());
            if !text.is_empty() {
                tree.append(parent, Tag::text(text));
            }
        }
        NodeData::Element { name, attrs, .. } => {
            let id = tree.append(parent, element_tag(&name.local, &attrs.borrow()));
            fill_children(tree, id, handle);
        }
        _ => {}
    }
}

/// Text-only content becomes the tag's value; mixed content keeps `#text` leaves.
fn fill_children(tree: &mut TagTree, id: TagId, handle: &Handle) {
    let children = handle.children.borrow();
    let significant: Vec<&Handle> = children.iter().filter(|c| is_significant(c)).collect();

    if let [only] = significant.as_slice() {
        if let NodeData::Text { contents } = &only.data {
            let text = collapse_whitespace(&contents.borrow());
            if let Some(tag) = tree.get_mut(id) {
                tag.value = Some(text);
            }
            return;
        }
    }
    for child in significant {
        insert_handle(tree, id, child);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tag::TagNode;
    use pretty_assertions::assert_eq;

    #[test]
    fn single_element_becomes_root() {
        let tree = parse_markup(r#"<div id="main"><button id="go">Go</button></div>"#).unwrap();
        let root = &tree[tree.root()];
        assert_eq!(root.name, "div");
        assert_eq!(root.id(), Some("main"));

        let go = tree.tag_with_id("go").unwrap();
        assert_eq!(tree[go].value.as_deref(), Some("Go"));
        assert_eq!(tree.parent(go), Some(tree.root()));
    }

    #[test]
    fn nested_elements_are_kept() {
        let tree = parse_markup(r#"<div><section><p id="user">x</p></section></div>"#).unwrap();
        assert_eq!(tree.node_count(), 3);
        let user = tree.tag_with_id("user").unwrap();
        assert_eq!(tree[user].value.as_deref(), Some("x"));
        assert_eq!(
            tree.to_code(tree.root()),
            vec!["<div>", "    <section>", "        <p id=\"user\">x</p>", "    </section>", "</div>"]
        );
    }

    #[test]
    fn several_top_level_nodes_share_a_fragment_root() {
        let tree = parse_markup("<b>hi</b><i>there</i>").unwrap();
        assert_eq!(tree[tree.root()].name, FRAGMENT);
        assert_eq!(tree.children(tree.root()).len(), 2);
    }

    #[test]
    fn fragment_keeps_bare_text() {
        let tree = parse_fragment("hello <b>world</b>").unwrap();
        let names: Vec<String> = tree
            .children(tree.root())
            .iter()
            .map(|id| tree[*id].name.clone())
            .collect();
        assert_eq!(names, vec![Tag::TEXT, "b"]);
    }

    #[test]
    fn mixed_content_keeps_text_leaves() {
        let tree = parse_markup("<p>Hello <b>you</b> there</p>").unwrap();
        assert_eq!(
            tree.to_code(tree.root()),
            vec!["<p>", "    Hello", "    <b>you</b>", "    there", "</p>"]
        );
    }

    #[test]
    fn comments_and_blank_text_are_dropped() {
        let tree = parse_markup("<ul>\n  <!-- note -->\n  <li>a</li>\n</ul>").unwrap();
        assert_eq!(tree.node_count(), 2);
    }

    #[test]
    fn rendered_code_reparses_to_same_shape() {
        let source = r#"<div id="app" class="screen"><ul id="list"><li>a</li><li>b</li></ul><input id="name" type="text"></div>"#;
        let tree = parse_markup(source).unwrap();
        let rendered = tree.to_code(tree.root()).join("\n");
        let reparsed = parse_markup(&rendered).unwrap();

        let original: TagNode = tree.to_node(tree.root());
        assert_eq!(reparsed.to_node(reparsed.root()), original);
    }
}
