//! Structural Tree Module for MobiLang Compiler
//!
//! A screen's markup lives in an arena ([`TagTree`]) addressed by [`TagId`].
//! Children are owned through the arena; parents are plain ids used only for
//! upward lookups.

use serde::{Deserialize, Serialize};
use slotmap::{new_key_type, SecondaryMap, SlotMap};
use std::collections::BTreeMap;
use std::fmt;
use std::ops::Index;

use crate::errors::{CoderError, CoderResult};

new_key_type! {
    /// Arena index of a [`Tag`] inside its [`TagTree`].
    pub struct TagId;
}

// ═══════════════════════════════════════════════════════════════════════════════
// TAG
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "camelCase")]
pub enum AttributeValue {
    /// Rendered quoted: `name="value"`
    Static(String),
    /// Rendered in braces: `name={value}`
    Expression(String),
}

impl AttributeValue {
    pub fn as_str(&self) -> &str {
        match self {
            AttributeValue::Static(value) | AttributeValue::Expression(value) => value,
        }
    }

    fn render(&self, name: &str) -> String {
        match self {
            AttributeValue::Static(value) => format!("{}=\"{}\"", name, value),
            AttributeValue::Expression(value) => format!("{}={{{}}}", name, value),
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        AttributeValue::Static(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        AttributeValue::Static(value)
    }
}

/// One structural node. Tree shape lives in [`TagTree`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Tag {
    pub name: String,
    pub value: Option<String>,
    attributes: Vec<(String, AttributeValue)>,
    style: Vec<(String, String)>,
}

impl Tag {
    /// Name of bare text nodes produced for mixed content.
    pub const TEXT: &'static str = "#text";

    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn text(value: impl Into<String>) -> Self {
        Self {
            name: Self::TEXT.to_string(),
            value: Some(value.into()),
            ..Self::default()
        }
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }

    pub fn with_attribute(mut self, name: &str, value: impl Into<AttributeValue>) -> Self {
        self.set_attribute(name, value);
        self
    }

    pub fn is_text(&self) -> bool {
        self.name == Self::TEXT
    }

    pub fn id(&self) -> Option<&str> {
        self.attribute("id").map(AttributeValue::as_str)
    }

    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.attribute("class")
            .map(AttributeValue::as_str)
            .unwrap_or("")
            .split_whitespace()
    }

    pub fn attribute(&self, name: &str) -> Option<&AttributeValue> {
        self.attributes
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value)
    }

    pub fn attributes(&self) -> impl Iterator<Item = (&str, &AttributeValue)> {
        self.attributes.iter().map(|(key, value)| (key.as_str(), value))
    }

    /// Sets an attribute, keeping its original position when it already exists.
    pub fn set_attribute(&mut self, name: &str, value: impl Into<AttributeValue>) {
        let value = value.into();
        match self.attributes.iter_mut().find(|(key, _)| key == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name.to_string(), value)),
        }
    }

    /// Sets an attribute as the first one rendered.
    pub fn prepend_attribute(&mut self, name: &str, value: impl Into<AttributeValue>) {
        self.attributes.retain(|(key, _)| key != name);
        self.attributes.insert(0, (name.to_string(), value.into()));
    }

    pub fn rename_attribute(&mut self, from: &str, to: &str) {
        if let Some(slot) = self.attributes.iter_mut().find(|(key, _)| key == from) {
            slot.0 = to.to_string();
        }
    }

    /// HTML elements that never take a closing tag.
    pub fn is_void(&self) -> bool {
        matches!(
            self.name.as_str(),
            "area" | "base" | "br" | "col" | "embed" | "hr" | "img" | "input" | "link" | "meta"
                | "source" | "track" | "wbr"
        )
    }

    pub fn style(&self) -> &[(String, String)] {
        &self.style
    }

    pub fn set_style(&mut self, property: &str, value: &str) {
        match self.style.iter_mut().find(|(key, _)| key == property) {
            Some(slot) => slot.1 = value.to_string(),
            None => self.style.push((property.to_string(), value.to_string())),
        }
    }

    fn open_tag(&self) -> String {
        let mut open = format!("<{}", self.name);
        for (name, value) in &self.attributes {
            open.push(' ');
            open.push_str(&value.render(name));
        }
        open.push('>');
        open
    }

    fn close_tag(&self) -> String {
        format!("</{}>", self.name)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// TREE
// ═══════════════════════════════════════════════════════════════════════════════

/// A single attribute assignment resolved against the tree at compile time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttributeEdit {
    pub tag_id: String,
    pub attribute: String,
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct TagTree {
    nodes: SlotMap<TagId, Tag>,
    children: SecondaryMap<TagId, Vec<TagId>>,
    parents: SecondaryMap<TagId, TagId>,
    root: TagId,
}

impl TagTree {
    pub fn new(root: Tag) -> Self {
        let mut nodes = SlotMap::with_key();
        let root = nodes.insert(root);
        let mut children = SecondaryMap::new();
        children.insert(root, Vec::new());
        Self {
            nodes,
            children,
            parents: SecondaryMap::new(),
            root,
        }
    }

    pub fn root(&self) -> TagId {
        self.root
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Inserts a detached tag. Attach it with [`TagTree::add_child`].
    pub fn create(&mut self, tag: Tag) -> TagId {
        let id = self.nodes.insert(tag);
        self.children.insert(id, Vec::new());
        id
    }

    /// Appends `child` under `parent`. Absent children are ignored, and so is any
    /// attachment that would make a node its own ancestor or give a `#text` leaf
    /// children.
    ///
    /// A tag holds either a value or children. When `parent` carries a value it is
    /// moved into a leading `#text` child before `child` is attached.
    pub fn add_child(&mut self, parent: TagId, child: Option<TagId>) {
        let Some(child) = child else {
            return;
        };
        let Some(parent_tag) = self.nodes.get(parent) else {
            return;
        };
        if parent_tag.is_text() || !self.nodes.contains_key(child) {
            return;
        }
        if child == parent || self.ancestors(parent).contains(&child) {
            return;
        }
        let displaced = self.nodes.get_mut(parent).and_then(|tag| tag.value.take());
        if let Some(text) = displaced {
            let leaf = self.create(Tag::text(text));
            if let Some(siblings) = self.children.get_mut(parent) {
                siblings.push(leaf);
            }
            self.parents.insert(leaf, parent);
        }
        self.detach(child);
        if let Some(siblings) = self.children.get_mut(parent) {
            siblings.push(child);
        }
        self.parents.insert(child, parent);
    }

    /// Creates `tag` and appends it under `parent`.
    pub fn append(&mut self, parent: TagId, tag: Tag) -> TagId {
        let id = self.create(tag);
        self.add_child(parent, Some(id));
        id
    }

    pub fn get(&self, id: TagId) -> Option<&Tag> {
        self.nodes.get(id)
    }

    pub fn get_mut(&mut self, id: TagId) -> Option<&mut Tag> {
        self.nodes.get_mut(id)
    }

    pub fn children(&self, id: TagId) -> &[TagId] {
        self.children.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn parent(&self, id: TagId) -> Option<TagId> {
        self.parents.get(id).copied()
    }

    /// Parent chain from the closest ancestor up to the root.
    pub fn ancestors(&self, id: TagId) -> Vec<TagId> {
        let mut chain = Vec::new();
        let mut current = self.parent(id);
        while let Some(parent) = current {
            chain.push(parent);
            current = self.parent(parent);
        }
        chain
    }

    /// Finds the tag whose `id` attribute equals `id`.
    ///
    /// The root is checked first, then a LIFO frontier seeded with the root's
    /// children is drained, so later siblings are visited before earlier ones.
    pub fn tag_with_id(&self, id: &str) -> Option<TagId> {
        if self.nodes.get(self.root).and_then(Tag::id) == Some(id) {
            return Some(self.root);
        }
        let mut frontier: Vec<TagId> = self.children(self.root).to_vec();
        while let Some(current) = frontier.pop() {
            if self.nodes.get(current).and_then(Tag::id) == Some(id) {
                return Some(current);
            }
            frontier.extend_from_slice(self.children(current));
        }
        None
    }

    pub fn require_tag_with_id(&self, id: &str) -> CoderResult<TagId> {
        self.tag_with_id(id)
            .ok_or_else(|| CoderError::NodeNotFound { id: id.to_string() })
    }

    /// Pre-order walk of the subtree rooted at `start`, in document order.
    pub fn descendants(&self, start: TagId) -> Vec<TagId> {
        let mut order = Vec::new();
        let mut stack = vec![start];
        while let Some(current) = stack.pop() {
            if !self.nodes.contains_key(current) {
                continue;
            }
            order.push(current);
            stack.extend(self.children(current).iter().rev());
        }
        order
    }

    pub fn set_attribute(&mut self, id: TagId, name: &str, value: impl Into<AttributeValue>) {
        if let Some(tag) = self.nodes.get_mut(id) {
            tag.set_attribute(name, value);
        }
    }

    pub fn apply_edit(&mut self, edit: &AttributeEdit) -> CoderResult<()> {
        let target = self.require_tag_with_id(&edit.tag_id)?;
        self.set_attribute(target, &edit.attribute, edit.value.as_str());
        Ok(())
    }

    /// Drops the children of `id` and makes `value` its content.
    pub fn replace_content(&mut self, id: TagId, value: impl Into<String>) {
        let removed: Vec<TagId> = self.children(id).to_vec();
        for child in removed {
            for node in self.descendants(child) {
                self.nodes.remove(node);
                self.children.remove(node);
                self.parents.remove(node);
            }
        }
        if let Some(children) = self.children.get_mut(id) {
            children.clear();
        }
        if let Some(tag) = self.nodes.get_mut(id) {
            tag.value = Some(value.into());
        }
    }

    fn detach(&mut self, child: TagId) {
        if let Some(old_parent) = self.parents.remove(child) {
            if let Some(siblings) = self.children.get_mut(old_parent) {
                siblings.retain(|sibling| *sibling != child);
            }
        }
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // CODE EMISSION
    // ═══════════════════════════════════════════════════════════════════════════

    /// Renders the subtree rooted at `id` as markup lines.
    pub fn to_code(&self, id: TagId) -> Vec<String> {
        let mut lines = Vec::new();
        self.write_code(id, 0, &mut lines);
        lines
    }

    /// Renders every child of `id`, in order, without the enclosing tag.
    pub fn children_code(&self, id: TagId) -> Vec<String> {
        let mut lines = Vec::new();
        for child in self.children(id) {
            self.write_code(*child, 0, &mut lines);
        }
        lines
    }

    fn write_code(&self, id: TagId, depth: usize, lines: &mut Vec<String>) {
        let Some(tag) = self.nodes.get(id) else {
            return;
        };
        let indent = "    ".repeat(depth);
        if tag.is_text() {
            lines.push(format!("{}{}", indent, tag.value.as_deref().unwrap_or("")));
            return;
        }
        let children = self.children(id);
        if children.is_empty() && tag.value.is_none() && tag.is_void() {
            lines.push(format!("{}{}", indent, tag.open_tag()));
            return;
        }
        if children.is_empty() {
            lines.push(format!(
                "{}{}{}{}",
                indent,
                tag.open_tag(),
                tag.value.as_deref().unwrap_or(""),
                tag.close_tag()
            ));
            return;
        }
        lines.push(format!("{}{}", indent, tag.open_tag()));
        for child in children {
            self.write_code(*child, depth + 1, lines);
        }
        lines.push(format!("{}{}", indent, tag.close_tag()));
    }

    // ═══════════════════════════════════════════════════════════════════════════
    // SERDE SHAPE
    // ═══════════════════════════════════════════════════════════════════════════

    pub fn from_node(node: &TagNode) -> Self {
        let mut tree = TagTree::new(node.to_tag());
        let root = tree.root;
        for child in &node.children {
            tree.insert_node(root, child);
        }
        tree
    }

    fn insert_node(&mut self, parent: TagId, node: &TagNode) {
        let id = self.append(parent, node.to_tag());
        for child in &node.children {
            self.insert_node(id, child);
        }
    }

    pub fn to_node(&self, id: TagId) -> TagNode {
        let Some(tag) = self.nodes.get(id) else {
            return TagNode::default();
        };
        TagNode {
            name: tag.name.clone(),
            value: tag.value.clone(),
            attributes: tag
                .attributes()
                .map(|(name, value)| (name.to_string(), value.as_str().to_string()))
                .collect(),
            children: self
                .children(id)
                .iter()
                .map(|child| self.to_node(*child))
                .collect(),
        }
    }
}

impl Index<TagId> for TagTree {
    type Output = Tag;

    fn index(&self, id: TagId) -> &Tag {
        &self.nodes[id]
    }
}

impl fmt::Display for TagTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for line in self.to_code(self.root) {
            writeln!(f, "{}", line)?;
        }
        Ok(())
    }
}

/// Nested, serializable form of a tree, as exchanged over JSON.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TagNode {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attributes: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<TagNode>,
}

impl TagNode {
    fn to_tag(&self) -> Tag {
        let mut tag = Tag::new(self.name.as_str());
        tag.value = self.value.clone();
        for (name, value) in &self.attributes {
            tag.set_attribute(name, value.as_str());
        }
        tag
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn sample() -> (TagTree, TagId, TagId) {
        let mut tree = TagTree::new(Tag::new("div").with_attribute("id", "root"));
        let root = tree.root();
        let title = tree.append(root, Tag::new("h1").with_value("Hello"));
        let list = tree.append(root, Tag::new("ul").with_attribute("id", "items"));
        tree.append(list, Tag::new("li").with_value("one"));
        (tree, title, list)
    }

    #[test]
    fn add_child_ignores_absent_child() {
        let (mut tree, _, list) = sample();
        let before = tree.children(list).len();
        tree.add_child(list, None);
        assert_eq!(tree.children(list).len(), before);
    }

    #[test]
    fn add_child_sets_parent_and_moves_between_parents() {
        let (mut tree, title, list) = sample();
        let orphan = tree.create(Tag::new("span"));
        tree.add_child(title, Some(orphan));
        assert_eq!(tree.parent(orphan), Some(title));

        tree.add_child(list, Some(orphan));
        assert_eq!(tree.parent(orphan), Some(list));
        assert!(!tree.children(title).contains(&orphan));
        assert_eq!(tree.children(list).last(), Some(&orphan));
    }

    #[test]
    fn add_child_moves_value_into_text_leaf() {
        let (mut tree, title, _) = sample();
        let badge = tree.append(title, Tag::new("span").with_value("new"));

        assert_eq!(tree[title].value, None);
        let children = tree.children(title).to_vec();
        assert_eq!(children.len(), 2);
        assert!(tree[children[0]].is_text());
        assert_eq!(tree[children[0]].value.as_deref(), Some("Hello"));
        assert_eq!(children[1], badge);
        assert_eq!(
            tree.to_code(title),
            vec!["<h1>", "    Hello", "    <span>new</span>", "</h1>"]
        );
    }

    #[test]
    fn add_child_refuses_text_parents() {
        let (mut tree, title, _) = sample();
        let text = tree.append(title, Tag::text("loose"));
        let orphan = tree.create(Tag::new("b"));
        tree.add_child(text, Some(orphan));
        assert!(tree.children(text).is_empty());
        assert_eq!(tree.parent(orphan), None);
    }

    #[test]
    fn add_child_refuses_cycles() {
        let (mut tree, _, list) = sample();
        let root = tree.root();
        tree.add_child(list, Some(root));
        assert_eq!(tree.parent(root), None);
        assert_eq!(tree.parent(list), Some(root));
    }

    #[test]
    fn tag_with_id_checks_root_first() {
        let (tree, _, _) = sample();
        assert_eq!(tree.tag_with_id("root"), Some(tree.root()));
    }

    #[test]
    fn tag_with_id_finds_nested_and_reports_missing() {
        let (tree, _, list) = sample();
        assert_eq!(tree.tag_with_id("items"), Some(list));
        assert_eq!(tree.tag_with_id("nope"), None);
        assert_eq!(
            tree.require_tag_with_id("nope"),
            Err(CoderError::NodeNotFound { id: "nope".into() })
        );
    }

    #[test]
    fn tag_with_id_prefers_last_sibling_on_duplicates() {
        let mut tree = TagTree::new(Tag::new("div"));
        let root = tree.root();
        tree.append(root, Tag::new("p").with_attribute("id", "dup"));
        let second = tree.append(root, Tag::new("span").with_attribute("id", "dup"));
        assert_eq!(tree.tag_with_id("dup"), Some(second));
    }

    #[test]
    fn to_code_renders_nested_markup() {
        let (tree, _, _) = sample();
        assert_eq!(
            tree.to_code(tree.root()),
            vec![
                r#"<div id="root">"#,
                "    <h1>Hello</h1>",
                r#"    <ul id="items">"#,
                "        <li>one</li>",
                "    </ul>",
                "</div>",
            ]
        );
    }

    #[test]
    fn void_elements_render_without_closing_tag() {
        let mut tree = TagTree::new(Tag::new("form"));
        let root = tree.root();
        tree.append(root, Tag::new("input").with_attribute("id", "email"));
        tree.append(root, Tag::new("label").with_value("Email"));
        assert_eq!(
            tree.to_code(root),
            vec![
                "<form>",
                r#"    <input id="email">"#,
                "    <label>Email</label>",
                "</form>",
            ]
        );
    }

    #[test]
    fn expression_attributes_render_in_braces() {
        let tag = Tag::new("Button")
            .with_attribute("title", "Go")
            .with_attribute("onPress", AttributeValue::Expression("() => go()".into()));
        let tree = TagTree::new(tag);
        assert_eq!(
            tree.to_code(tree.root()),
            vec![r#"<Button title="Go" onPress={() => go()}></Button>"#]
        );
    }

    #[test]
    fn set_attribute_keeps_insertion_position() {
        let mut tag = Tag::new("a")
            .with_attribute("id", "x")
            .with_attribute("href", "/");
        tag.set_attribute("id", "y");
        tag.prepend_attribute("class", "link");
        let names: Vec<&str> = tag.attributes().map(|(name, _)| name).collect();
        assert_eq!(names, vec!["class", "id", "href"]);
        assert_eq!(tag.id(), Some("y"));
    }

    #[test]
    fn apply_edit_targets_tag_by_id() {
        let (mut tree, _, list) = sample();
        let edit = AttributeEdit {
            tag_id: "items".into(),
            attribute: "hidden".into(),
            value: "true".into(),
        };
        tree.apply_edit(&edit).unwrap();
        assert_eq!(
            tree[list].attribute("hidden"),
            Some(&AttributeValue::Static("true".into()))
        );

        let missing = AttributeEdit {
            tag_id: "ghost".into(),
            ..edit
        };
        assert!(tree.apply_edit(&missing).is_err());
    }

    #[test]
    fn replace_content_drops_children() {
        let (mut tree, _, list) = sample();
        let before = tree.node_count();
        tree.replace_content(list, "{items}");
        assert!(tree.children(list).is_empty());
        assert_eq!(tree[list].value.as_deref(), Some("{items}"));
        assert_eq!(tree.node_count(), before - 1);
    }

    #[test]
    fn node_shape_round_trips() {
        let (tree, _, _) = sample();
        let node = tree.to_node(tree.root());
        let rebuilt = TagTree::from_node(&node);
        assert_eq!(rebuilt.to_code(rebuilt.root()), tree.to_code(tree.root()));
    }
}
