//! React Native Module for MobiLang Compiler
//!
//! Converts screens into function components: markup becomes core components,
//! computed styles become inline style objects, DOM idioms become `useState`
//! hooks, and `mobilang:` directives become React Navigation calls.

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::coder::{component_name, normalized_behavior, CodeFile, Framework, Screen};
use crate::directive::{DirectiveHooks, DirectiveParser};
use crate::errors::CoderResult;
use crate::markup::parse_fragment;
use crate::script::{hoist_functions, ScriptNormalizer};
use crate::style::{apply_styles, StyleSheet};
use crate::tag::{AttributeValue, Tag, TagId, TagTree};
use crate::transpile::{rewrite_navigation, DomStateTranspiler, NodeConverter, TranspilerOptions};

lazy_static! {
    static ref NUMERIC_RE: Regex = Regex::new(r"^-?\d+(?:\.\d+)?(?:px)?$").unwrap();
    static ref FUNCTION_RE: Regex =
        Regex::new(r"^(?:async\s+)?(?:function\b|\(?[A-Za-z0-9_$,\s]*\)?\s*=>)").unwrap();
    static ref IMPORT_RE: Regex = Regex::new(r"^\s*import\s").unwrap();
}

const CORE_COMPONENTS: &[&str] = &["View", "Text", "Button", "TextInput", "Image", "ScrollView"];

// ═══════════════════════════════════════════════════════════════════════════════
// OPTIONS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ReactNativeOptions {
    pub screens_dir: String,
    pub file_suffix: String,
    pub entry_file: String,
}

impl Default for ReactNativeOptions {
    fn default() -> Self {
        Self {
            screens_dir: "src/screens/".to_string(),
            file_suffix: ".js".to_string(),
            entry_file: "App.js".to_string(),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// DIRECTIVE HOOKS
// ═══════════════════════════════════════════════════════════════════════════════

pub struct ReactNativeHooks;

impl DirectiveHooks for ReactNativeHooks {
    fn swap_screen_directive(&self, screen: &str) -> String {
        screen.to_string()
    }

    fn swap_screen_directive_with_parameters(
        &self,
        screen: &str,
        parameters: &[(String, String)],
    ) -> String {
        let fields: Vec<String> = parameters
            .iter()
            .map(|(key, value)| format!("{}: {}", key, if value.is_empty() { "true" } else { value }))
            .collect();
        format!("\"{}\", {{ {} }}", screen, fields.join(", "))
    }

    fn swap_param_directive(&self, param: &str) -> String {
        format!("props.route.params.{}", param)
    }

    fn swap_input_directive(&self, input: &str) -> String {
        format!("input_{}", input.replace('-', "_"))
    }

    fn keeps_directive_quotes(&self) -> bool {
        false
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// STRUCTURE CONVERSION
// ═══════════════════════════════════════════════════════════════════════════════

/// A structure converted to React Native components.
pub struct ReactNativeStructure {
    pub tree: TagTree,
    /// State names of bound text inputs, e.g. `input_email`.
    pub inputs: Vec<String>,
}

fn component_for(tag: &Tag) -> &'static str {
    match tag.name.as_str() {
        "p" | "span" | "label" | "a" | "b" | "strong" | "i" | "em" | "small" | "h1" | "h2"
        | "h3" | "h4" | "h5" | "h6" => "Text",
        "button" => "Button",
        "input" | "textarea" => "TextInput",
        "img" => "Image",
        Tag::TEXT => "Text",
        _ => "View",
    }
}

fn default_text_style(name: &str) -> &'static [(&'static str, &'static str)] {
    match name {
        "h1" => &[("font-size", "32"), ("font-weight", "bold")],
        "h2" => &[("font-size", "24"), ("font-weight", "bold")],
        "h3" => &[("font-size", "19"), ("font-weight", "bold")],
        "b" | "strong" => &[("font-weight", "bold")],
        "i" | "em" => &[("font-style", "italic")],
        _ => &[],
    }
}

/// `background-color` → `backgroundColor`
fn camel_case(property: &str) -> String {
    let mut out = String::with_capacity(property.len());
    let mut upper = false;
    for c in property.chars() {
        if c == '-' {
            upper = !out.is_empty();
            continue;
        }
        if upper {
            out.extend(c.to_uppercase());
            upper = false;
        } else {
            out.push(c);
        }
    }
    out
}

fn style_object(style: &[(String, String)]) -> String {
    let fields: Vec<String> = style
        .iter()
        .map(|(property, value)| {
            let value = value.trim();
            let rendered = if NUMERIC_RE.is_match(value) {
                value.trim_end_matches("px").to_string()
            } else {
                format!("'{}'", value.replace('\'', "\\'"))
            };
            format!("{}: {}", camel_case(property), rendered)
        })
        .collect();
    format!("{{ {} }}", fields.join(", "))
}

fn is_expression_content(value: &str) -> bool {
    value.starts_with('{') && value.ends_with('}')
}

fn press_handler(handler: &str, options: &TranspilerOptions) -> String {
    let handler = handler.trim();
    if FUNCTION_RE.is_match(handler) {
        return handler.to_string();
    }
    format!("() => {{ {} }}", rewrite_navigation(handler, options))
}

/// Converts the subtree rooted at `start` into a standalone React Native tree.
pub fn convert_structure(
    source: &TagTree,
    start: TagId,
    options: &TranspilerOptions,
) -> ReactNativeStructure {
    let mut converter = StructureConverter {
        source,
        options,
        inputs: Vec::new(),
    };
    let tree = converter.convert_root(start);
    ReactNativeStructure {
        tree,
        inputs: converter.inputs,
    }
}

struct StructureConverter<'a> {
    source: &'a TagTree,
    options: &'a TranspilerOptions,
    inputs: Vec<String>,
}

impl StructureConverter<'_> {
    fn convert_root(&mut self, start: TagId) -> TagTree {
        let (converted, text) = self.convert_tag(start);
        let mut tree = TagTree::new(converted);
        let root = tree.root();
        self.finish(&mut tree, root, start, text);
        tree
    }

    fn convert_into(&mut self, tree: &mut TagTree, parent: TagId, id: TagId) {
        let (converted, text) = self.convert_tag(id);
        let target = tree.append(parent, converted);
        self.finish(&mut *tree, target, id, text);
    }

    /// Adds wrapped text and converted children below an already placed tag.
    fn finish(&mut self, tree: &mut TagTree, target: TagId, id: TagId, text: Option<String>) {
        if let Some(text) = text {
            tree.append(target, Tag::new("Text").with_value(text));
        }
        let component = tree[target].name.clone();
        if matches!(component.as_str(), "Button" | "TextInput" | "Image") {
            return;
        }
        for child in self.source.children(id) {
            self.convert_into(tree, target, *child);
        }
    }

    /// The converted tag, plus text that has to be wrapped in its own `Text`.
    fn convert_tag(&mut self, id: TagId) -> (Tag, Option<String>) {
        let tree = self.source;
        let source = &tree[id];
        let component = component_for(source);
        let mut converted = Tag::new(component);
        let mut wrapped_text = None;

        for (name, value) in source.attributes() {
            match (name, component) {
                ("id", _) => converted.set_attribute("nativeID", value.as_str()),
                ("onclick", _) => {
                    let handler = press_handler(value.as_str(), self.options);
                    converted.set_attribute("onPress", AttributeValue::Expression(handler));
                }
                ("src", "Image") => converted.set_attribute(
                    "source",
                    AttributeValue::Expression(format!("{{ uri: '{}' }}", value.as_str())),
                ),
                ("alt", "Image") => converted.set_attribute("accessibilityLabel", value.as_str()),
                ("placeholder", "TextInput") => converted.set_attribute("placeholder", value.as_str()),
                ("type", "TextInput") if value.as_str() == "password" => {
                    converted.set_attribute("secureTextEntry", AttributeValue::Expression("true".into()))
                }
                ("disabled", _) => {
                    converted.set_attribute("disabled", AttributeValue::Expression("true".into()))
                }
                _ => {}
            }
        }

        if component == "TextInput" {
            if let Some(input_id) = source.id() {
                let state = format!("input_{}", input_id.replace('-', "_"));
                converted.set_attribute("value", AttributeValue::Expression(state.clone()));
                converted.set_attribute(
                    "onChangeText",
                    AttributeValue::Expression(format!("set{}", state)),
                );
                if !self.inputs.contains(&state) {
                    self.inputs.push(state);
                }
            }
        }

        let mut style: Vec<(String, String)> = default_text_style(&source.name)
            .iter()
            .map(|(property, value)| (property.to_string(), value.to_string()))
            .collect();
        for (property, value) in source.style() {
            match style.iter_mut().find(|(existing, _)| existing == property) {
                Some(slot) => slot.1 = value.clone(),
                None => style.push((property.clone(), value.clone())),
            }
        }
        if !style.is_empty() && component != "Button" {
            converted.set_attribute("style", AttributeValue::Expression(style_object(&style)));
        }

        if let Some(value) = source.value.as_deref().filter(|v| !v.is_empty()) {
            match component {
                "Text" => converted.value = Some(value.to_string()),
                "Button" => converted.set_attribute("title", value),
                "TextInput" | "Image" => {}
                _ if is_expression_content(value) => converted.value = Some(value.to_string()),
                _ => wrapped_text = Some(value.to_string()),
            }
        }
        if component == "Button" && converted.attribute("title").is_none() {
            converted.set_attribute("title", "");
        }

        debug!(from = source.name.as_str(), to = component, "converted tag");
        (converted, wrapped_text)
    }
}

/// Renders a converted tree on one line, as needed inside arrays.
fn inline_code(tree: &TagTree) -> String {
    tree.to_code(tree.root())
        .iter()
        .map(|line| line.trim())
        .collect::<Vec<_>>()
        .join("")
}

/// Converts markup for the DOM-to-state transpiler.
pub struct ReactNativeConverter<'a> {
    style: &'a StyleSheet,
    options: TranspilerOptions,
}

impl<'a> ReactNativeConverter<'a> {
    pub fn new(style: &'a StyleSheet, options: TranspilerOptions) -> Self {
        Self { style, options }
    }

    fn render_children(&self, tree: &TagTree, id: TagId) -> String {
        tree.children(id)
            .iter()
            .map(|child| inline_code(&convert_structure(tree, *child, &self.options).tree))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl NodeConverter for ReactNativeConverter<'_> {
    fn convert_markup(&self, markup: &str) -> CoderResult<String> {
        let mut fragment = parse_fragment(markup)?;
        let root = fragment.root();
        apply_styles(self.style, &mut fragment, root);
        Ok(self.render_children(&fragment, root))
    }

    fn convert_children(&self, tree: &TagTree, id: TagId) -> CoderResult<String> {
        Ok(self.render_children(tree, id))
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// FRAMEWORK
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default)]
pub struct ReactNativeFramework {
    pub options: ReactNativeOptions,
    pub transpiler: TranspilerOptions,
}

impl ReactNativeFramework {
    pub fn new(options: ReactNativeOptions) -> Self {
        Self {
            options,
            transpiler: TranspilerOptions::default(),
        }
    }

    fn screen_file(&self, screen: &str) -> String {
        format!(
            "{}{}{}",
            self.options.screens_dir,
            component_name(screen),
            self.options.file_suffix
        )
    }
}

impl Framework for ReactNativeFramework {
    fn name(&self) -> &'static str {
        "react-native"
    }

    fn dependencies(&self) -> Vec<String> {
        [
            "@react-navigation/native",
            "@react-navigation/native-stack",
            "react-native-screens",
            "react-native-safe-area-context",
        ]
        .iter()
        .map(|dependency| dependency.to_string())
        .collect()
    }

    fn generate_screen(
        &self,
        screen: &Screen,
        normalizer: &dyn ScriptNormalizer,
    ) -> CoderResult<Vec<CodeFile>> {
        let mut structure = screen.structure.clone();
        let root = structure.root();
        apply_styles(&screen.style, &mut structure, root);

        let script = normalized_behavior(screen, normalizer)?;
        let converter = ReactNativeConverter::new(&screen.style, self.transpiler.clone());
        let transpiled =
            DomStateTranspiler::with_options(&structure, &converter, self.transpiler.clone())
                .transpile_lines(&script)?;

        for edit in &transpiled.attribute_edits {
            structure.apply_edit(edit)?;
        }
        for state in transpiled.state_declarations.iter().filter(|s| s.binds_content) {
            let bound = structure.require_tag_with_id(&state.tag_id)?;
            structure.replace_content(bound, format!("{{{}}}", state.name));
        }

        let converted = convert_structure(&structure, root, &self.transpiler);
        let mut parser = DirectiveParser::new(ReactNativeHooks);
        let jsx = parser.parse(&converted.tree.to_code(converted.tree.root()));
        let (imports, body): (Vec<String>, Vec<String>) = parser
            .parse(&transpiled.state_body)
            .into_iter()
            .partition(|line| IMPORT_RE.is_match(line));

        let mut code = vec![
            "import React, { useState, useEffect } from 'react';".to_string(),
            format!("import {{ {} }} from 'react-native';", CORE_COMPONENTS.join(", ")),
        ];
        code.extend(imports);
        code.push(String::new());
        code.push(format!(
            "export default function {}(props) {{",
            component_name(&screen.name)
        ));
        for state in &transpiled.state_declarations {
            code.push(format!(
                "    const [{0}, set{0}] = useState({1});",
                state.name, state.initial_value
            ));
        }
        for input in &converted.inputs {
            code.push(format!("    const [{0}, set{0}] = useState('');", input));
        }
        let hoisted = hoist_functions(&body);
        for function in &hoisted.functions {
            code.push(String::new());
            code.extend(function.iter().map(|line| format!("    {}", line)));
        }
        if !hoisted.rest.is_empty() {
            code.push(String::new());
            code.push("    useEffect(() => {".to_string());
            code.extend(hoisted.rest.iter().map(|line| format!("        {}", line)));
            code.push("    }, []);".to_string());
        }
        code.push(String::new());
        code.push("    return (".to_string());
        code.push("        <ScrollView>".to_string());
        code.extend(jsx.iter().map(|line| format!("            {}", line)));
        code.push("        </ScrollView>".to_string());
        code.push("    );".to_string());
        code.push("}".to_string());

        Ok(vec![CodeFile::new(self.screen_file(&screen.name), code)])
    }

    fn generate_project_files(&self, screens: &[String]) -> Vec<CodeFile> {
        let mut code = vec![
            "import * as React from 'react';".to_string(),
            "import { NavigationContainer } from '@react-navigation/native';".to_string(),
            "import { createNativeStackNavigator } from '@react-navigation/native-stack';"
                .to_string(),
        ];
        for screen in screens {
            code.push(format!(
                "import {} from './{}{}';",
                component_name(screen),
                self.options.screens_dir,
                component_name(screen)
            ));
        }
        code.push(String::new());
        code.push("const Stack = createNativeStackNavigator();".to_string());
        code.push(String::new());
        code.push("export default function App() {".to_string());
        code.push("    return (".to_string());
        code.push("        <NavigationContainer>".to_string());
        code.push("            <Stack.Navigator>".to_string());
        for screen in screens {
            code.push(format!(
                "                <Stack.Screen name=\"{}\" component={{{}}} />",
                screen,
                component_name(screen)
            ));
        }
        code.push("            </Stack.Navigator>".to_string());
        code.push("        </NavigationContainer>".to_string());
        code.push("    );".to_string());
        code.push("}".to_string());

        vec![CodeFile::new(self.options.entry_file.clone(), code)]
    }
}
