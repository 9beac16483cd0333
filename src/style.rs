//! Style Module for MobiLang Compiler
//!
//! Ordered style sheet model, the CSS AST front-end, and the style application
//! pass that copies matching declarations onto structural tags.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::{CoderError, CoderResult};
use crate::tag::{Tag, TagId, TagTree};

// ═══════════════════════════════════════════════════════════════════════════════
// STYLE SHEET MODEL
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleSheetRule {
    pub selectors: Vec<String>,
    declarations: Vec<(String, String)>,
}

impl StyleSheetRule {
    pub fn new<S: Into<String>>(selectors: impl IntoIterator<Item = S>) -> Self {
        Self {
            selectors: selectors.into_iter().map(Into::into).collect(),
            declarations: Vec::new(),
        }
    }

    pub fn with_declaration(mut self, property: &str, value: &str) -> Self {
        self.add_declaration(property, value);
        self
    }

    /// Adds a declaration. A repeated property keeps its first position and takes the new value.
    pub fn add_declaration(&mut self, property: &str, value: &str) {
        match self
            .declarations
            .iter_mut()
            .find(|(existing, _)| existing == property)
        {
            Some(slot) => slot.1 = value.to_string(),
            None => self
                .declarations
                .push((property.to_string(), value.to_string())),
        }
    }

    pub fn declarations(&self) -> &[(String, String)] {
        &self.declarations
    }

    pub fn to_code(&self) -> Vec<String> {
        let mut lines = vec![format!("{} {{", self.selectors.join(", "))];
        for (property, value) in &self.declarations {
            lines.push(format!("    {}: {};", property, value));
        }
        lines.push("}".to_string());
        lines
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleSheet {
    pub rules: Vec<StyleSheetRule>,
}

impl StyleSheet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_rule(&mut self, rule: StyleSheetRule) {
        self.rules.push(rule);
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    pub fn to_code(&self) -> Vec<String> {
        self.rules.iter().flat_map(StyleSheetRule::to_code).collect()
    }

    /// Reads the CSS AST JSON shape:
    /// `{"stylesheet": {"rules": [{"type": "rule", "selectors": [..], "declarations": [..]}]}}`.
    /// Entries that are not rules or declarations (comments, at-rules) are skipped.
    pub fn from_ast(ast: &Value) -> CoderResult<Self> {
        let rules = ast
            .get("stylesheet")
            .and_then(|sheet| sheet.get("rules"))
            .and_then(Value::as_array)
            .ok_or_else(|| style_error("missing `stylesheet.rules` array"))?;

        let mut sheet = StyleSheet::new();
        for rule in rules {
            if !has_type(rule, "rule") {
                continue;
            }
            let selectors = rule
                .get("selectors")
                .and_then(Value::as_array)
                .ok_or_else(|| style_error("rule without `selectors`"))?
                .iter()
                .map(|selector| {
                    selector
                        .as_str()
                        .map(str::to_string)
                        .ok_or_else(|| style_error("selector is not a string"))
                })
                .collect::<CoderResult<Vec<String>>>()?;

            let mut parsed = StyleSheetRule::new(selectors);
            let declarations = rule
                .get("declarations")
                .and_then(Value::as_array)
                .map(Vec::as_slice)
                .unwrap_or(&[]);
            for declaration in declarations {
                if !has_type(declaration, "declaration") {
                    continue;
                }
                let property = declaration.get("property").and_then(Value::as_str);
                let value = declaration.get("value").and_then(Value::as_str);
                match (property, value) {
                    (Some(property), Some(value)) => parsed.add_declaration(property, value),
                    _ => return Err(style_error("declaration without `property` or `value`")),
                }
            }
            sheet.add_rule(parsed);
        }
        Ok(sheet)
    }

    pub fn from_ast_str(json: &str) -> CoderResult<Self> {
        let ast: Value = serde_json::from_str(json).map_err(|e| style_error(&e.to_string()))?;
        Self::from_ast(&ast)
    }
}

fn has_type(entry: &Value, expected: &str) -> bool {
    entry
        .get("type")
        .and_then(Value::as_str)
        .map_or(true, |kind| kind == expected)
}

fn style_error(message: &str) -> CoderError {
    CoderError::Style {
        message: message.to_string(),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// SELECTORS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq)]
enum SelectorComponent {
    Type(String),
    Universal,
    Class(String),
    Id(String),
    /// Needs runtime state; never matches at compile time.
    PseudoClass(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Combinator {
    Descendant,
    Child,
}

/// Compound selectors from right to left, each with the combinator linking it to the next one.
#[derive(Debug, Clone, PartialEq)]
struct Selector {
    compounds: Vec<Vec<SelectorComponent>>,
    combinators: Vec<Combinator>,
}

fn parse_selector(text: &str) -> Option<Selector> {
    let mut compounds = Vec::new();
    let mut combinators = Vec::new();
    let mut pending = Combinator::Descendant;

    for token in text.replace('>', " > ").split_whitespace() {
        if token == ">" {
            pending = Combinator::Child;
            continue;
        }
        if !compounds.is_empty() {
            combinators.push(pending);
        }
        compounds.push(parse_compound(token)?);
        pending = Combinator::Descendant;
    }

    if compounds.is_empty() {
        return None;
    }
    compounds.reverse();
    combinators.reverse();
    Some(Selector {
        compounds,
        combinators,
    })
}

fn parse_compound(token: &str) -> Option<Vec<SelectorComponent>> {
    let mut components = Vec::new();
    let mut chars = token.chars().peekable();
    while let Some(c) = chars.next() {
        let marker = match c {
            '*' => {
                components.push(SelectorComponent::Universal);
                continue;
            }
            '.' | '#' | ':' => Some(c),
            _ => None,
        };
        let mut name = String::new();
        if marker.is_none() {
            name.push(c);
        }
        while let Some(next) = chars.peek() {
            if matches!(next, '.' | '#' | ':' | '*') {
                break;
            }
            name.push(*next);
            chars.next();
        }
        let name = name.trim_start_matches(':').to_string();
        if name.is_empty() {
            return None;
        }
        components.push(match marker {
            Some('.') => SelectorComponent::Class(name),
            Some('#') => SelectorComponent::Id(name),
            Some(_) => SelectorComponent::PseudoClass(name),
            None => SelectorComponent::Type(name.to_lowercase()),
        });
    }
    Some(components)
}

fn matches_compound(compound: &[SelectorComponent], tag: &Tag) -> bool {
    compound.iter().all(|component| match component {
        SelectorComponent::Type(name) => tag.name.eq_ignore_ascii_case(name),
        SelectorComponent::Universal => true,
        SelectorComponent::Class(name) => tag.classes().any(|class| class == name),
        SelectorComponent::Id(name) => tag.id() == Some(name.as_str()),
        SelectorComponent::PseudoClass(_) => false,
    })
}

fn matches_selector(selector: &Selector, tree: &TagTree, id: TagId) -> bool {
    let Some(tag) = tree.get(id) else {
        return false;
    };
    if !matches_compound(&selector.compounds[0], tag) {
        return false;
    }

    let mut current = id;
    for (compound, combinator) in selector.compounds[1..].iter().zip(&selector.combinators) {
        let next = match combinator {
            Combinator::Child => tree
                .parent(current)
                .filter(|parent| tree.get(*parent).is_some_and(|p| matches_compound(compound, p))),
            Combinator::Descendant => tree.ancestors(current).into_iter().find(|ancestor| {
                tree.get(*ancestor)
                    .is_some_and(|a| matches_compound(compound, a))
            }),
        };
        match next {
            Some(matched) => current = matched,
            None => return false,
        }
    }
    true
}

// ═══════════════════════════════════════════════════════════════════════════════
// STYLE APPLICATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Copies matching declarations onto every tag in the subtree rooted at `start`.
/// Rules apply in sheet order, so later rules win on conflicting properties.
pub fn apply_styles(sheet: &StyleSheet, tree: &mut TagTree, start: TagId) {
    let compiled: Vec<(Vec<Selector>, &StyleSheetRule)> = sheet
        .rules
        .iter()
        .map(|rule| {
            let selectors = rule
                .selectors
                .iter()
                .filter_map(|selector| parse_selector(selector))
                .collect();
            (selectors, rule)
        })
        .collect();

    for id in tree.descendants(start) {
        for (selectors, rule) in &compiled {
            if !selectors.iter().any(|s| matches_selector(s, tree, id)) {
                continue;
            }
            if let Some(tag) = tree.get_mut(id) {
                for (property, value) in rule.declarations() {
                    tag.set_style(property, value);
                }
            }
        }
    }
}
