//! Directive Module for MobiLang Compiler
//!
//! Detects `mobilang:` markers embedded in generated script and markup lines and
//! rewrites them. The engine owns detection, extraction and text splicing;
//! a framework's [`DirectiveHooks`] only supplies the replacement text.
//!
//! ```text
//! mobilang:screen:<id>                       navigate, no params
//! mobilang:screen:<id>?<k>=<v>(&<k>=<v>)*     navigate, with params
//! mobilang:param:<name>                       read incoming param
//! mobilang:input:<id>                         read bound input value
//! ```
//!
//! Every marker also exists in a double-colon form (`mobilang::screen::<id>`).

use lazy_static::lazy_static;
use regex::{Captures, Regex};
use tracing::debug;

const TRIGGER: &str = "mobilang:";

fn quoted_marker(kind: &str) -> Regex {
    let marker = format!(r"mobilang(?:::{k}::|:{k}:)([A-Za-z0-9_-]+)", k = kind);
    Regex::new(&format!(r#""{m}"|'{m}'|`{m}`|{m}"#, m = marker)).unwrap()
}

lazy_static! {
    static ref SCREEN_RE: Regex =
        Regex::new(r"mobilang(?:::screen::|:screen:)(?P<name>[A-Za-z0-9_-]+)").unwrap();
    static ref PARAM_RE: Regex = quoted_marker("param");
    static ref INPUT_RE: Regex = quoted_marker("input");
    static ref LOCATION_ASSIGN_RE: Regex =
        Regex::new(r"window\.location(?:\.href)?\s*=\s*$").unwrap();
    static ref TEMPLATE_SUBSTITUTION_RE: Regex = Regex::new(r"\$\{([^}]*)\}").unwrap();
}

// ═══════════════════════════════════════════════════════════════════════════════
// HOOKS
// ═══════════════════════════════════════════════════════════════════════════════

/// Framework-specific replacement text for each directive kind.
pub trait DirectiveHooks: Send + Sync {
    /// Navigation to `screen` without parameters. Replaces only the marker token.
    fn swap_screen_directive(&self, screen: &str) -> String;

    /// Navigation to `screen` with its ordered parameters. Replaces the whole
    /// quoted directive span.
    fn swap_screen_directive_with_parameters(
        &self,
        screen: &str,
        parameters: &[(String, String)],
    ) -> String;

    /// Read of incoming navigation parameter `param`.
    fn swap_param_directive(&self, param: &str) -> String;

    /// Read of the bound value of input element `input`.
    fn swap_input_directive(&self, input: &str) -> String;

    /// Whether the double-colon form with parameters puts the detected quotes back
    /// around [`DirectiveHooks::swap_screen_directive_with_parameters`]. Hooks that
    /// return a complete expression turn this off and replace the quoted span.
    fn keeps_directive_quotes(&self) -> bool {
        true
    }
}

impl<H: DirectiveHooks + ?Sized> DirectiveHooks for &H {
    fn swap_screen_directive(&self, screen: &str) -> String {
        (**self).swap_screen_directive(screen)
    }

    fn swap_screen_directive_with_parameters(
        &self,
        screen: &str,
        parameters: &[(String, String)],
    ) -> String {
        (**self).swap_screen_directive_with_parameters(screen, parameters)
    }

    fn swap_param_directive(&self, param: &str) -> String {
        (**self).swap_param_directive(param)
    }

    fn swap_input_directive(&self, input: &str) -> String {
        (**self).swap_input_directive(input)
    }

    fn keeps_directive_quotes(&self) -> bool {
        (**self).keeps_directive_quotes()
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// PARSER
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveKind {
    Screen,
    Param,
    Input,
}

/// Detects the directive kind a line carries, in screen → param → input order.
pub fn directive_kind(line: &str) -> Option<DirectiveKind> {
    if !line.contains(TRIGGER) {
        return None;
    }
    if SCREEN_RE.is_match(line) {
        Some(DirectiveKind::Screen)
    } else if PARAM_RE.is_match(line) {
        Some(DirectiveKind::Param)
    } else if INPUT_RE.is_match(line) {
        Some(DirectiveKind::Input)
    } else {
        None
    }
}

/// A pending splice of `line[start..end]`.
struct Rewrite {
    start: usize,
    end: usize,
    replacement: String,
}

pub struct DirectiveParser<H: DirectiveHooks> {
    hooks: H,
    screen_parameters: Vec<String>,
    parsed_lines: Vec<String>,
}

impl<H: DirectiveHooks> DirectiveParser<H> {
    pub fn new(hooks: H) -> Self {
        Self {
            hooks,
            screen_parameters: Vec::new(),
            parsed_lines: Vec::new(),
        }
    }

    /// Rewrites every directive in `lines`. State from a previous call is discarded.
    pub fn parse(&mut self, lines: &[String]) -> Vec<String> {
        self.screen_parameters.clear();
        self.parsed_lines.clear();
        for line in lines {
            let parsed = self.parse_line(line);
            self.parsed_lines.push(parsed);
        }
        self.parsed_lines.clone()
    }

    /// Distinct parameter names seen in screen directives, in first-seen order.
    pub fn screen_parameters(&self) -> &[String] {
        &self.screen_parameters
    }

    pub fn parsed_code(&self) -> &[String] {
        &self.parsed_lines
    }

    fn parse_line(&mut self, line: &str) -> String {
        match directive_kind(line) {
            Some(DirectiveKind::Screen) => self.parse_screen_directives(line),
            Some(DirectiveKind::Param) => {
                let hooks = &self.hooks;
                replace_markers(&PARAM_RE, line, |name| {
                    debug!(param = name, "resolved param directive");
                    hooks.swap_param_directive(name)
                })
            }
            Some(DirectiveKind::Input) => {
                let hooks = &self.hooks;
                replace_markers(&INPUT_RE, line, |name| {
                    debug!(input = name, "resolved input directive");
                    hooks.swap_input_directive(name)
                })
            }
            None => line.to_string(),
        }
    }

    fn parse_screen_directives(&mut self, line: &str) -> String {
        let mut output = String::with_capacity(line.len());
        let mut cursor = 0;

        while let Some(caps) = SCREEN_RE.captures_at(line, cursor) {
            let (Some(marker), Some(name)) = (caps.get(0), caps.name("name")) else {
                break;
            };
            let rewrite = if line[marker.end()..].starts_with('?') {
                let double = marker.as_str().starts_with("mobilang::");
                self.rewrite_with_parameters(line, marker.start(), marker.end() + 1, name.as_str(), double)
            } else {
                debug!(screen = name.as_str(), "resolved screen directive");
                Rewrite {
                    start: marker.start(),
                    end: marker.end(),
                    replacement: self.hooks.swap_screen_directive(name.as_str()),
                }
            };
            let start = rewrite.start.max(cursor);
            output.push_str(&line[cursor..start]);
            output.push_str(&rewrite.replacement);
            cursor = rewrite.end.max(start);
        }

        output.push_str(&line[cursor..]);
        output
    }

    fn rewrite_with_parameters(
        &mut self,
        line: &str,
        marker_start: usize,
        params_start: usize,
        screen: &str,
        double: bool,
    ) -> Rewrite {
        let (open_start, delimiter) = opening_delimiter(line, marker_start);
        let (params_end, close_end) = closing_delimiter(line, params_start, &delimiter);

        let parameters = split_parameters(&clean_parameters(&line[params_start..params_end]));
        for (key, _) in &parameters {
            if !self.screen_parameters.contains(key) {
                self.screen_parameters.push(key.clone());
            }
        }
        debug!(screen, parameters = parameters.len(), "resolved screen directive with parameters");

        let navigation = self
            .hooks
            .swap_screen_directive_with_parameters(screen, &parameters);

        if double && self.hooks.keeps_directive_quotes() {
            return Rewrite {
                start: open_start,
                end: close_end,
                replacement: format!("{}{}{}", delimiter, navigation, delimiter),
            };
        }

        let start = LOCATION_ASSIGN_RE
            .find(&line[..open_start])
            .map_or(open_start, |assign| assign.start());
        Rewrite {
            start,
            end: close_end,
            replacement: navigation,
        }
    }
}

fn replace_markers(pattern: &Regex, line: &str, mut swap: impl FnMut(&str) -> String) -> String {
    pattern
        .replace_all(line, |caps: &Captures| {
            let name = (1..caps.len())
                .find_map(|group| caps.get(group))
                .map_or("", |m| m.as_str());
            swap(name)
        })
        .into_owned()
}

/// Quote (possibly backslash-escaped) immediately before the directive token.
fn opening_delimiter(line: &str, marker_start: usize) -> (usize, String) {
    let before = &line[..marker_start];
    match before.chars().last() {
        Some(quote @ ('"' | '\'' | '`')) => {
            let quote_start = marker_start - quote.len_utf8();
            if line[..quote_start].ends_with('\\') {
                (quote_start - 1, format!("\\{}", quote))
            } else {
                (quote_start, quote.to_string())
            }
        }
        _ => (marker_start, String::new()),
    }
}

/// End of the parameter block and end of the closing delimiter. A quoted span runs to
/// the next matching quote, skipping over string concatenations (`" + expr + "`).
fn closing_delimiter(line: &str, params_start: usize, delimiter: &str) -> (usize, usize) {
    if delimiter.is_empty() {
        let end = line[params_start..]
            .find(|c: char| c.is_whitespace() || matches!(c, ';' | ',' | ')'))
            .map_or(line.len(), |offset| params_start + offset);
        return (end, end);
    }

    let mut search_from = params_start;
    loop {
        let Some(offset) = line[search_from..].find(delimiter) else {
            return (line.len(), line.len());
        };
        let close = search_from + offset;
        let after = close + delimiter.len();
        if !line[after..].trim_start().starts_with('+') {
            return (close, after);
        }
        match line[after..].find(delimiter) {
            Some(reopen) if line[..after + reopen].trim_end().ends_with('+') => {
                search_from = after + reopen + delimiter.len();
            }
            _ => {
                let end = expression_end(line, after);
                return (end, end);
            }
        }
    }
}

/// End of a trailing `+ expr` that is never followed by a reopening quote: the first
/// `;` or `,` at depth zero, or an unbalanced closing bracket.
fn expression_end(line: &str, from: usize) -> usize {
    let mut depth = 0i32;
    for (offset, c) in line[from..].char_indices() {
        match c {
            '(' | '[' | '{' => depth += 1,
            ')' | ']' | '}' if depth == 0 => return from + offset,
            ')' | ']' | '}' => depth -= 1,
            ';' | ',' if depth == 0 => return from + offset,
            _ => {}
        }
    }
    line.trim_end().len().max(from)
}

/// `id=" + data[item].id + "` → `id=data[item].id`; `${x}` → `x`.
fn clean_parameters(raw: &str) -> String {
    let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
    let unescaped = compact.replace("\\\"", "\"").replace("\\'", "'");
    let joined = ["\"+", "+\"", "'+", "+'", "`+", "+`"]
        .iter()
        .fold(unescaped, |acc, token| acc.replace(token, ""));
    TEMPLATE_SUBSTITUTION_RE.replace_all(&joined, "$1").into_owned()
}

/// Splits on `&` then `=`. A repeated key keeps its first position and its last value.
fn split_parameters(block: &str) -> Vec<(String, String)> {
    let mut parameters: Vec<(String, String)> = Vec::new();
    for pair in block.split('&').filter(|pair| !pair.is_empty()) {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        match parameters.iter_mut().find(|(existing, _)| existing == key) {
            Some(slot) => slot.1 = value.to_string(),
            None => parameters.push((key.to_string(), value.to_string())),
        }
    }
    parameters
}
