//! Script Module for MobiLang Compiler
//!
//! oxc-based front-end for screen scripts: statement-level conversion into the
//! instruction model, third-party import discovery, and the normalization seam
//! that lowers modern syntax before code generation.

use lazy_static::lazy_static;
use oxc_allocator::Allocator;
use oxc_ast::ast::{Argument, CallExpression, Expression, ImportDeclaration, Statement};
use oxc_ast::ast::{BindingPattern, VariableDeclarationKind};
use oxc_ast_visit::{walk, Visit};
use oxc_codegen::Codegen;
use oxc_parser::Parser;
use oxc_semantic::SemanticBuilder;
use oxc_span::{GetSpan, SourceType, Span};
use oxc_transformer::{TransformOptions, Transformer};
use regex::Regex;
use std::path::Path;

use crate::behavior::{
    Assignment, Behavior, Declaration, Declarator, Instruction, Literal, TemplateElement,
    TemplateLiteral,
};
use crate::errors::{CoderError, CoderResult};

lazy_static! {
    static ref FUNCTION_DECLARATION_RE: Regex = Regex::new(
        r"^(?P<indent>\s*)(?P<async>async\s+)?function\s*(?P<star>\*?)\s*(?P<name>[A-Za-z_$][A-Za-z0-9_$]*)\s*\("
    )
    .unwrap();
}

fn module_source_type() -> SourceType {
    SourceType::default().with_module(true)
}

fn slice(source: &str, span: Span) -> &str {
    source
        .get(span.start as usize..span.end as usize)
        .unwrap_or_default()
}

// ═══════════════════════════════════════════════════════════════════════════════
// INSTRUCTION FRONT-END
// ═══════════════════════════════════════════════════════════════════════════════

/// Parses script text into a [`Behavior`], one instruction per top-level statement.
/// Instructions not modelled structurally keep their exact source text.
pub fn parse_script(source: &str) -> CoderResult<Behavior> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, module_source_type()).parse();

    if !ret.errors.is_empty() {
        return Err(CoderError::Script {
            messages: ret.errors.iter().map(|e| e.to_string()).collect(),
        });
    }

    let mut behavior = Behavior::default();
    for directive in &ret.program.directives {
        behavior.push(Instruction::raw(slice(source, directive.span)));
    }
    for stmt in &ret.program.body {
        behavior.push(statement_instruction(source, stmt));
    }
    Ok(behavior)
}

fn statement_instruction(source: &str, stmt: &Statement) -> Instruction {
    match stmt {
        Statement::VariableDeclaration(var_decl) => {
            let qualifier = match var_decl.kind {
                VariableDeclarationKind::Var => "var",
                VariableDeclarationKind::Let => "let",
                VariableDeclarationKind::Const => "const",
                _ => return Instruction::raw(slice(source, stmt.span())),
            };
            let mut declarators = Vec::new();
            for decl in &var_decl.declarations {
                let BindingPattern::BindingIdentifier(id) = &decl.id else {
                    return Instruction::raw(slice(source, stmt.span()));
                };
                let (kind, init) = match &decl.init {
                    Some(init) => initializer(source, init),
                    None => ("undefined", None),
                };
                declarators.push(Declarator::new(kind, qualifier, id.name.as_str(), init));
            }
            let declaration = Declaration::new(qualifier, declarators);
            // Keep the source when the structured rendering would differ, e.g. trailing comments.
            if declaration.to_code() == slice(source, stmt.span()) {
                Instruction::Declaration(declaration)
            } else {
                Instruction::raw(slice(source, stmt.span()))
            }
        }
        Statement::ExpressionStatement(expr_stmt) => match &expr_stmt.expression {
            Expression::AssignmentExpression(assign) => {
                let assignment = Assignment {
                    target: slice(source, assign.left.span()).to_string(),
                    operator: assign.operator.as_str().to_string(),
                    value: slice(source, assign.right.span()).to_string(),
                };
                if assignment.to_code() == slice(source, stmt.span()) {
                    Instruction::Assignment(assignment)
                } else {
                    Instruction::raw(slice(source, stmt.span()))
                }
            }
            _ => Instruction::raw(slice(source, stmt.span())),
        },
        _ => Instruction::raw(slice(source, stmt.span())),
    }
}

fn initializer(source: &str, init: &Expression) -> (&'static str, Option<Instruction>) {
    let raw = slice(source, init.span());
    match init {
        Expression::StringLiteral(_) => ("string", Some(Instruction::Literal(Literal::from_raw(raw)))),
        Expression::NumericLiteral(_) => ("number", Some(Instruction::Literal(Literal::from_raw(raw)))),
        Expression::BooleanLiteral(_) => ("boolean", Some(Instruction::Literal(Literal::from_raw(raw)))),
        Expression::NullLiteral(_) => ("null", Some(Instruction::Literal(Literal::from_raw(raw)))),
        Expression::TemplateLiteral(template) => {
            let last = template.quasis.len().saturating_sub(1);
            let quasis = template
                .quasis
                .iter()
                .enumerate()
                .map(|(index, quasi)| TemplateElement {
                    value: quasi.value.raw.to_string(),
                    tail: quasi.tail || index == last,
                })
                .collect();
            let expressions = template
                .expressions
                .iter()
                .map(|expr| slice(source, expr.span()).to_string())
                .collect();
            (
                "template",
                Some(Instruction::Template(TemplateLiteral {
                    quasis,
                    expressions,
                })),
            )
        }
        _ => ("expression", Some(Instruction::raw(raw))),
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// IMPORT DISCOVERY
// ═══════════════════════════════════════════════════════════════════════════════

struct ImportCollector {
    packages: Vec<String>,
}

impl ImportCollector {
    fn record(&mut self, specifier: &str) {
        if let Some(package) = package_name(specifier) {
            if !self.packages.contains(&package) {
                self.packages.push(package);
            }
        }
    }
}

impl<'a> Visit<'a> for ImportCollector {
    fn visit_import_declaration(&mut self, decl: &ImportDeclaration<'a>) {
        self.record(decl.source.value.as_str());
        walk::walk_import_declaration(self, decl);
    }

    fn visit_call_expression(&mut self, call: &CallExpression<'a>) {
        if let Expression::Identifier(ident) = &call.callee {
            if ident.name == "require" {
                if let Some(Argument::StringLiteral(specifier)) = call.arguments.first() {
                    self.record(specifier.value.as_str());
                }
            }
        }
        walk::walk_call_expression(self, call);
    }
}

/// `lodash/fp` → `lodash`, `@scope/pkg/sub` → `@scope/pkg`; relative and absolute paths are local.
fn package_name(specifier: &str) -> Option<String> {
    if specifier.is_empty() || specifier.starts_with('.') || specifier.starts_with('/') {
        return None;
    }
    let mut segments = specifier.split('/');
    let first = segments.next()?;
    if first.starts_with('@') {
        let second = segments.next()?;
        Some(format!("{}/{}", first, second))
    } else {
        Some(first.to_string())
    }
}

/// Third-party packages a script imports or requires, in first-use order.
/// Unparseable scripts report none; parse errors surface through [`parse_script`].
pub fn imported_packages(source: &str) -> Vec<String> {
    let allocator = Allocator::default();
    let ret = Parser::new(&allocator, source, module_source_type()).parse();
    let mut collector = ImportCollector {
        packages: Vec::new(),
    };
    collector.visit_program(&ret.program);
    collector.packages
}

// ═══════════════════════════════════════════════════════════════════════════════
// NORMALIZATION
// ═══════════════════════════════════════════════════════════════════════════════

/// Lowers a script to the baseline dialect generated code relies on.
/// An `Err` carries every message the service reported.
pub trait ScriptNormalizer: Send + Sync {
    fn normalize(&self, source: &str) -> Result<String, Vec<String>>;
}

impl<F> ScriptNormalizer for F
where
    F: Fn(&str) -> Result<String, Vec<String>> + Send + Sync,
{
    fn normalize(&self, source: &str) -> Result<String, Vec<String>> {
        self(source)
    }
}

/// Normalizer backed by the oxc transformer.
#[derive(Debug, Clone)]
pub struct OxcNormalizer {
    pub target: String,
}

impl Default for OxcNormalizer {
    fn default() -> Self {
        Self {
            target: "es2015".to_string(),
        }
    }
}

impl OxcNormalizer {
    pub fn new(target: &str) -> Self {
        Self {
            target: target.to_string(),
        }
    }
}

impl ScriptNormalizer for OxcNormalizer {
    fn normalize(&self, source: &str) -> Result<String, Vec<String>> {
        let allocator = Allocator::default();
        let ret = Parser::new(&allocator, source, module_source_type()).parse();
        if !ret.errors.is_empty() {
            return Err(ret.errors.iter().map(|e| e.to_string()).collect());
        }
        let mut program = ret.program;

        let options = TransformOptions::from_target(&self.target).map_err(|e| vec![e])?;
        let semantic = SemanticBuilder::new().build(&program);
        if !semantic.errors.is_empty() {
            return Err(semantic.errors.iter().map(|e| e.to_string()).collect());
        }
        let scoping = semantic.semantic.into_scoping();

        let transformed = Transformer::new(&allocator, Path::new("screen.js"), &options)
            .build_with_scoping(scoping, &mut program);
        if !transformed.errors.is_empty() {
            return Err(transformed.errors.iter().map(|e| e.to_string()).collect());
        }

        Ok(Codegen::new().build(&program).code)
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// HOISTING
// ═══════════════════════════════════════════════════════════════════════════════

/// Script lines with top-level function declarations pulled out.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HoistedScript {
    /// One entry per declaration, in source order.
    pub functions: Vec<Vec<String>>,
    pub rest: Vec<String>,
}

/// Splits top-level `function` declarations from the other statements so targets can
/// place them where event handlers see them. A declaration that never closes its
/// body stays with the other statements.
pub fn hoist_functions(lines: &[String]) -> HoistedScript {
    let mut hoisted = HoistedScript::default();
    let mut depth = 0i32;
    let mut current: Option<Vec<String>> = None;
    let mut opened = false;

    for line in lines {
        if depth == 0 && current.is_none() && FUNCTION_DECLARATION_RE.is_match(line) {
            current = Some(Vec::new());
            opened = false;
        }
        let (delta, opens) = brace_balance(line);
        depth += delta;
        match current.as_mut() {
            Some(block) => {
                block.push(line.clone());
                opened |= opens;
                if opened && depth <= 0 {
                    depth = 0;
                    hoisted.functions.extend(current.take());
                }
            }
            None => {
                hoisted.rest.push(line.clone());
                depth = depth.max(0);
            }
        }
    }
    if let Some(block) = current {
        hoisted.rest.extend(block);
    }
    hoisted
}

/// `function greet(name) {` → `greet(name) {`, for class bodies.
pub fn function_to_method(header: &str) -> String {
    FUNCTION_DECLARATION_RE
        .replace(header, |caps: &regex::Captures| {
            format!(
                "{}{}{}{}(",
                &caps["indent"],
                caps.name("async").map_or("", |m| m.as_str()),
                &caps["star"],
                &caps["name"]
            )
        })
        .into_owned()
}

/// Net `{`/`}` balance of a line outside strings and `//` comments, and whether
/// it opens any brace.
fn brace_balance(line: &str) -> (i32, bool) {
    let mut delta = 0;
    let mut opens = false;
    let mut quote: Option<char> = None;
    let mut escaped = false;
    let mut previous = '\0';

    for c in line.chars() {
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
            '/' if previous == '/' => break,
            '{' => {
                delta += 1;
                opens = true;
            }
            '}' => delta -= 1,
            _ => {}
        }
        previous = c;
    }
    (delta, opens)
}

/// Runs `normalizer` over script lines, turning a failure into an aggregate error.
pub fn normalize_lines(normalizer: &dyn ScriptNormalizer, lines: &[String]) -> CoderResult<String> {
    normalizer
        .normalize(&lines.join("\n"))
        .map_err(|messages| CoderError::Transpilation { messages })
}
