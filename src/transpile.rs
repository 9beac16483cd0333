//! DOM-to-State Transpiler Module for MobiLang Compiler
//!
//! Rewrites imperative DOM idioms in a screen script into a reactive state model:
//!
//! - `el.innerHTML = markup` / `+= markup` become accumulator updates plus a setter call
//! - `const el = document.getElementById(id)` binds `el` to a state variable
//! - `document.getElementById(id).attr = value` becomes a compile-time [`AttributeEdit`]
//! - `window.location.href` becomes a navigation call or a navigation-parameter read
//!
//! Each run owns its symbol table and state declarations; nothing is shared across screens.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::debug;

use crate::behavior::Behavior;
use crate::errors::{CoderError, CoderResult};
use crate::tag::{AttributeEdit, TagId, TagTree};

lazy_static! {
    static ref INNER_HTML_RE: Regex = Regex::new(
        r"^\s*(?P<target>[A-Za-z_$][^=;]*?)\.innerHTML\s*(?P<op>\+?=)\s*(?P<value>(?:[^=\s].*?)?)\s*;?\s*$"
    )
    .unwrap();
    static ref ELEMENT_LOOKUP_RE: Regex =
        Regex::new(r#"document\.getElementById\(\s*["'`](?P<id>[^"'`]+)["'`]\s*\)"#).unwrap();
    static ref LOOKUP_DECLARATION_RE: Regex = Regex::new(
        r#"^\s*(?:const|var|let)\s+(?P<name>[A-Za-z0-9_$]+)\s*=\s*document\.getElementById\(\s*["'`](?P<id>[^"'`]+)["'`]\s*\)\s*;?\s*$"#
    )
    .unwrap();
    static ref LOOKUP_MUTATION_RE: Regex = Regex::new(
        r#"^\s*document\.getElementById\(\s*["'`](?P<id>[^"'`]+)["'`]\s*\)\.(?P<attr>[A-Za-z0-9_$-]+)\s*=\s*(?P<value>[^=\s].*?)\s*;?\s*$"#
    )
    .unwrap();
    static ref BOUND_MUTATION_RE: Regex = Regex::new(
        r"^\s*(?P<var>[A-Za-z_$][A-Za-z0-9_$]*)\.(?P<attr>[A-Za-z0-9_$-]+)\s*=\s*(?P<value>[^=\s].*?)\s*;?\s*$"
    )
    .unwrap();
    static ref DECLARATION_RE: Regex =
        Regex::new(r"^\s*(?:const|var|let)\s+(?P<name>[A-Za-z0-9_$]+)").unwrap();
    static ref LOCATION_ASSIGN_RE: Regex =
        Regex::new(r"window\.location\.href\s*=\s*(?P<rhs>[^=;\s][^;]*?)\s*(?P<end>;?)\s*$").unwrap();
}

const LOCATION: &str = "window.location.href";

// ═══════════════════════════════════════════════════════════════════════════════
// TYPES
// ═══════════════════════════════════════════════════════════════════════════════

/// Converts markup into the target framework's node code.
pub trait NodeConverter: Send + Sync {
    /// Converts nested markup text assigned through `innerHTML`.
    fn convert_markup(&self, markup: &str) -> CoderResult<String>;

    /// Converts the current children of `id` in the screen's structure.
    fn convert_children(&self, tree: &TagTree, id: TagId) -> CoderResult<String>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StateVariable {
    pub name: String,
    pub tag_id: String,
    pub initial_value: String,
    /// Set when the variable holds the rendered content of its tag.
    pub binds_content: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranspiledBehavior {
    pub state_declarations: Vec<StateVariable>,
    pub state_body: Vec<String>,
    pub attribute_edits: Vec<AttributeEdit>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TranspilerOptions {
    /// Replacement for reads of the current location.
    pub location_read: String,
    /// Call used for `window.location.href = target`; reads-only rewriting when absent.
    pub navigation_call: Option<String>,
}

impl Default for TranspilerOptions {
    fn default() -> Self {
        Self {
            location_read: "props.route.params.query".to_string(),
            navigation_call: Some("props.navigation.navigate".to_string()),
        }
    }
}

/// Rewrites `window.location.href = target` into the navigation call and every other
/// location reference into the navigation-parameter read.
pub fn rewrite_navigation(line: &str, options: &TranspilerOptions) -> String {
    if !line.contains(LOCATION) {
        return line.to_string();
    }
    let mut rewritten = line.to_string();
    if let Some(call) = &options.navigation_call {
        rewritten = LOCATION_ASSIGN_RE
            .replace_all(&rewritten, |caps: &regex::Captures| {
                format!("{}({}){}", call, &caps["rhs"], &caps["end"])
            })
            .into_owned();
    }
    rewritten.replace(LOCATION, &options.location_read)
}

/// `-` is not valid in identifiers.
pub fn state_name(tag_id: &str) -> String {
    tag_id.replace('-', "_")
}

// ═══════════════════════════════════════════════════════════════════════════════
// TRANSPILER
// ═══════════════════════════════════════════════════════════════════════════════

pub struct DomStateTranspiler<'a> {
    structure: &'a TagTree,
    converter: &'a dyn NodeConverter,
    options: TranspilerOptions,
    symbol_table: HashMap<String, String>,
    bound_variables: HashSet<String>,
    state_declarations: Vec<StateVariable>,
    accumulators: HashSet<String>,
    state_body: Vec<String>,
    attribute_edits: Vec<AttributeEdit>,
}

impl<'a> DomStateTranspiler<'a> {
    pub fn new(structure: &'a TagTree, converter: &'a dyn NodeConverter) -> Self {
        Self::with_options(structure, converter, TranspilerOptions::default())
    }

    pub fn with_options(
        structure: &'a TagTree,
        converter: &'a dyn NodeConverter,
        options: TranspilerOptions,
    ) -> Self {
        Self {
            structure,
            converter,
            options,
            symbol_table: HashMap::new(),
            bound_variables: HashSet::new(),
            state_declarations: Vec::new(),
            accumulators: HashSet::new(),
            state_body: Vec::new(),
            attribute_edits: Vec::new(),
        }
    }

    pub fn transpile(&mut self, behavior: &Behavior) -> CoderResult<TranspiledBehavior> {
        self.transpile_lines(&behavior.to_code())
    }

    pub fn transpile_lines(&mut self, lines: &[String]) -> CoderResult<TranspiledBehavior> {
        self.symbol_table.clear();
        self.bound_variables.clear();
        self.state_declarations.clear();
        self.accumulators.clear();
        self.state_body.clear();
        self.attribute_edits.clear();

        for line in lines {
            self.parse_line(line)?;
        }
        self.flush_setters()?;

        Ok(TranspiledBehavior {
            state_declarations: std::mem::take(&mut self.state_declarations),
            state_body: std::mem::take(&mut self.state_body),
            attribute_edits: std::mem::take(&mut self.attribute_edits),
        })
    }

    /// Local variable → structural id bindings of the last run.
    pub fn symbol_table(&self) -> &HashMap<String, String> {
        &self.symbol_table
    }

    fn parse_line(&mut self, raw: &str) -> CoderResult<()> {
        let line = rewrite_navigation(raw, &self.options);

        if let Some(caps) = INNER_HTML_RE.captures(&line) {
            return self.parse_inner_html(&caps["target"], &caps["op"], &caps["value"]);
        }

        if let Some(caps) = LOOKUP_DECLARATION_RE.captures(&line) {
            let (name, id) = (&caps["name"], &caps["id"]);
            debug!(variable = name, id, "bound element lookup");
            self.register_state(id, false);
            self.symbol_table.insert(name.to_string(), id.to_string());
            self.bound_variables.insert(name.to_string());
            return Ok(());
        }

        if let Some(caps) = LOOKUP_MUTATION_RE.captures(&line) {
            if is_complete_expression(&caps["value"]) {
                return self.record_edit(&caps["id"], &caps["attr"], &caps["value"]);
            }
        }

        if let Some(caps) = BOUND_MUTATION_RE.captures(&line) {
            if let Some(id) = self.bound_element(&caps["var"]) {
                if is_complete_expression(&caps["value"]) {
                    return self.record_edit(&id, &caps["attr"], &caps["value"]);
                }
            }
        }

        if let Some(caps) = DECLARATION_RE.captures(&line) {
            let name = caps["name"].to_string();
            self.bound_variables.remove(&name);
            self.symbol_table.insert(name.clone(), name);
        }

        if !line.trim().is_empty() {
            self.state_body.push(line);
        }
        Ok(())
    }

    fn parse_inner_html(&mut self, target: &str, op: &str, value: &str) -> CoderResult<()> {
        let id = self.resolve_target(target)?;
        let name = state_name(&id);
        self.register_state(&id, true);

        if self.accumulators.insert(name.clone()) {
            let existing = self.existing_children(&id)?;
            self.state_body.push(format!("let _{} = [{}];", name, existing));
        }

        let code = match markup_literal(value) {
            Some(markup) if markup.trim().is_empty() => None,
            Some(markup) => Some(self.converter.convert_markup(&markup)?),
            None => Some(value.to_string()),
        };
        debug!(id = id.as_str(), op, "rewrote content replacement");

        match (op, code) {
            ("=", Some(code)) => self.state_body.push(format!("_{} = [{}];", name, code)),
            ("=", None) => self.state_body.push(format!("_{} = [];", name)),
            (_, Some(code)) => self.state_body.push(format!("_{}.push({});", name, code)),
            (_, None) => {}
        }
        Ok(())
    }

    fn resolve_target(&self, target: &str) -> CoderResult<String> {
        let target = target.trim();
        if let Some(id) = self.symbol_table.get(target) {
            return Ok(id.clone());
        }
        ELEMENT_LOOKUP_RE
            .captures(target)
            .map(|caps| caps["id"].to_string())
            .ok_or_else(|| CoderError::NodeNotFound {
                id: target.to_string(),
            })
    }

    /// Variable bound by an element-lookup declaration, not a self-mapped one.
    fn bound_element(&self, variable: &str) -> Option<String> {
        if !self.bound_variables.contains(variable) {
            return None;
        }
        self.symbol_table.get(variable).cloned()
    }

    fn register_state(&mut self, id: &str, binds_content: bool) {
        let name = state_name(id);
        match self.state_declarations.iter_mut().find(|s| s.name == name) {
            Some(existing) => existing.binds_content |= binds_content,
            None => self.state_declarations.push(StateVariable {
                name,
                tag_id: id.to_string(),
                initial_value: "[]".to_string(),
                binds_content,
            }),
        }
    }

    fn record_edit(&mut self, id: &str, attribute: &str, value: &str) -> CoderResult<()> {
        self.structure.require_tag_with_id(id)?;
        let attribute = match attribute {
            "className" => "class",
            "htmlFor" => "for",
            other => other,
        };
        let value = unquote(value).unwrap_or_else(|| value.to_string());
        debug!(id, attribute, "resolved attribute assignment");
        self.attribute_edits.push(AttributeEdit {
            tag_id: id.to_string(),
            attribute: attribute.to_string(),
            value,
        });
        Ok(())
    }

    fn existing_children(&self, id: &str) -> CoderResult<String> {
        let tag = self.structure.require_tag_with_id(id)?;
        self.converter.convert_children(self.structure, tag)
    }

    fn flush_setters(&mut self) -> CoderResult<()> {
        let declarations = self.state_declarations.clone();
        for state in &declarations {
            if !self.accumulators.contains(&state.name) {
                let existing = self.existing_children(&state.tag_id)?;
                self.state_body
                    .push(format!("let _{} = [{}];", state.name, existing));
                self.accumulators.insert(state.name.clone());
            }
            self.state_body
                .push(format!("set{}(_{});", state.name, state.name));
        }
        Ok(())
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// LITERAL MARKUP
// ═══════════════════════════════════════════════════════════════════════════════

/// Unescaped content of a single- or double-quoted string literal.
fn unquote(value: &str) -> Option<String> {
    let value = value.trim();
    let quote = value.chars().next().filter(|c| matches!(c, '"' | '\''))?;
    if value.len() < 2 || !value.ends_with(quote) {
        return None;
    }
    let inner = &value[1..value.len() - 1];
    Some(
        inner
            .replace(&format!("\\{}", quote), &quote.to_string())
            .replace("\\\\", "\\"),
    )
}

/// Markup text of a literal, concatenation or template value, with embedded
/// expressions rendered as `{expr}`. `None` when the value contains no literal text.
fn markup_literal(value: &str) -> Option<String> {
    let mut markup = String::new();
    let mut has_literal = false;
    for part in split_concatenation(value) {
        let part = part.trim();
        if let Some(text) = unquote(part) {
            has_literal = true;
            markup.push_str(&text);
        } else if part.len() >= 2 && part.starts_with('`') && part.ends_with('`') {
            has_literal = true;
            markup.push_str(&part[1..part.len() - 1].replace("${", "{"));
        } else if !part.is_empty() {
            markup.push('{');
            markup.push_str(part);
            markup.push('}');
        }
    }
    has_literal.then_some(markup)
}

/// True when `value` closes every bracket and string it opens, so the assignment
/// ends on its own line.
fn is_complete_expression(value: &str) -> bool {
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut escaped = false;

    for c in value.chars() {
        if let Some(open) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == open {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' | '`' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0 && quote.is_none() && !value.trim_end().ends_with("=>")
}

/// Splits on top-level `+`, outside strings and brackets.
fn split_concatenation(value: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut start = 0;

    for (index, c) in value.char_indices() {
        if let Some(open) = quote {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == open {
                quote = None;
            }
            continue;
        }
        match c {
            '"' | '\'' | '`' => quote = Some(c),
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' => depth -= 1,
            '+' if depth == 0 => {
                parts.push(&value[start..index]);
                start = index + 1;
            }
            _ => {}
        }
    }
    parts.push(&value[start..]);
    parts
}
