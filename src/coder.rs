//! Coder Module for MobiLang Compiler
//!
//! Orchestrates code generation for a whole project. Each screen is handed to the
//! selected [`Framework`] on its own; screens share no mutable state, so they are
//! generated in parallel when enabled. Output order always follows input order.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeSet;
use tracing::{debug, info, warn};

use crate::behavior::Behavior;
use crate::errors::{CoderError, CoderResult};
use crate::ionic::{IonicFramework, IonicOptions};
use crate::markup::parse_markup;
use crate::react_native::{ReactNativeFramework, ReactNativeOptions};
use crate::script::{imported_packages, normalize_lines, parse_script, OxcNormalizer, ScriptNormalizer};
use crate::style::StyleSheet;
use crate::tag::TagTree;

// ═══════════════════════════════════════════════════════════════════════════════
// SCREENS AND ARTIFACTS
// ═══════════════════════════════════════════════════════════════════════════════

/// Raw screen input as it arrives over JSON or from discovery.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenSource {
    pub name: String,
    pub markup: String,
    /// CSS AST, `null` when the screen has no style sheet.
    #[serde(default)]
    pub style: Value,
    #[serde(default)]
    pub script: String,
}

/// A parsed screen: structure, style and behavior.
#[derive(Debug, Clone)]
pub struct Screen {
    pub name: String,
    pub structure: TagTree,
    pub style: StyleSheet,
    pub behavior: Behavior,
    /// Packages the screen's script imports.
    pub dependencies: Vec<String>,
}

impl Screen {
    pub fn new(name: &str, structure: TagTree, style: StyleSheet, behavior: Behavior) -> Self {
        Self {
            name: name.to_string(),
            structure,
            style,
            behavior,
            dependencies: Vec::new(),
        }
    }

    pub fn from_source(source: &ScreenSource) -> CoderResult<Self> {
        let build = || -> CoderResult<Self> {
            let structure = parse_markup(&source.markup)?;
            let style = if source.style.is_null() {
                StyleSheet::new()
            } else {
                StyleSheet::from_ast(&source.style)?
            };
            let behavior = parse_script(&source.script)?;
            let mut screen = Screen::new(&source.name, structure, style, behavior);
            screen.dependencies = imported_packages(&source.script);
            Ok(screen)
        };
        build().map_err(|e| e.in_screen(&source.name))
    }
}

/// One emitted file: a project-relative path and its lines.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeFile {
    pub name: String,
    pub code: Vec<String>,
}

impl CodeFile {
    pub fn new(name: impl Into<String>, code: Vec<String>) -> Self {
        Self {
            name: name.into(),
            code,
        }
    }

    pub fn to_text(&self) -> String {
        let mut text = self.code.join("\n");
        text.push('\n');
        text
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenFailure {
    pub screen: String,
    pub error: CoderError,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectCodes {
    pub code_files: Vec<CodeFile>,
    pub dependencies: BTreeSet<String>,
    /// Screens skipped under [`FailurePolicy::Continue`].
    pub failures: Vec<ScreenFailure>,
}

/// Artifacts of one screen before they are merged into [`ProjectCodes`].
struct ScreenCode {
    name: String,
    files: Vec<CodeFile>,
    dependencies: Vec<String>,
}

// ═══════════════════════════════════════════════════════════════════════════════
// FRAMEWORK SEAM
// ═══════════════════════════════════════════════════════════════════════════════

pub trait Framework: Send + Sync {
    fn name(&self) -> &'static str;

    /// Packages every project generated for this framework needs.
    fn dependencies(&self) -> Vec<String>;

    fn generate_screen(
        &self,
        screen: &Screen,
        normalizer: &dyn ScriptNormalizer,
    ) -> CoderResult<Vec<CodeFile>>;

    /// Project-level files (entry point, routing) for the generated screens.
    fn generate_project_files(&self, screens: &[String]) -> Vec<CodeFile>;
}

/// Screen script after normalization, one entry per line.
pub fn normalized_behavior(
    screen: &Screen,
    normalizer: &dyn ScriptNormalizer,
) -> CoderResult<Vec<String>> {
    if screen.behavior.is_empty() {
        return Ok(Vec::new());
    }
    let code = normalize_lines(normalizer, &screen.behavior.to_code())?;
    Ok(code
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(str::to_string)
        .collect())
}

/// `product-detail` → `ProductDetail`
pub fn component_name(screen: &str) -> String {
    screen
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
                None => String::new(),
            }
        })
        .collect()
}

// ═══════════════════════════════════════════════════════════════════════════════
// OPTIONS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TargetFramework {
    #[default]
    ReactNative,
    Ionic,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FailurePolicy {
    /// Stop at the first failing screen, in screen order.
    #[default]
    Abort,
    /// Skip failing screens and report them alongside the generated code.
    Continue,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct CoderOptions {
    pub framework: TargetFramework,
    pub failure_policy: FailurePolicy,
    pub parallel: bool,
    pub script_target: String,
    #[serde(flatten)]
    pub react_native: ReactNativeOptions,
    #[serde(flatten)]
    pub ionic: IonicOptions,
}

impl Default for CoderOptions {
    fn default() -> Self {
        Self {
            framework: TargetFramework::default(),
            failure_policy: FailurePolicy::default(),
            parallel: true,
            script_target: "es2015".to_string(),
            react_native: ReactNativeOptions::default(),
            ionic: IonicOptions::default(),
        }
    }
}

impl CoderOptions {
    pub fn from_json(json: &str) -> CoderResult<Self> {
        serde_json::from_str(json).map_err(|e| CoderError::Options {
            message: e.to_string(),
        })
    }

    pub fn build_framework(&self) -> Box<dyn Framework> {
        match self.framework {
            TargetFramework::ReactNative => {
                Box::new(ReactNativeFramework::new(self.react_native.clone()))
            }
            TargetFramework::Ionic => Box::new(IonicFramework::new(self.ionic.clone())),
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CODER
// ═══════════════════════════════════════════════════════════════════════════════

pub struct MobilangCoder {
    framework: Box<dyn Framework>,
    normalizer: Box<dyn ScriptNormalizer>,
    failure_policy: FailurePolicy,
    parallel: bool,
}

impl MobilangCoder {
    pub fn new(framework: Box<dyn Framework>, normalizer: Box<dyn ScriptNormalizer>) -> Self {
        Self {
            framework,
            normalizer,
            failure_policy: FailurePolicy::default(),
            parallel: false,
        }
    }

    pub fn from_options(options: &CoderOptions) -> Self {
        Self::new(
            options.build_framework(),
            Box::new(OxcNormalizer::new(&options.script_target)),
        )
        .with_failure_policy(options.failure_policy)
        .with_parallel(options.parallel)
    }

    pub fn with_failure_policy(mut self, policy: FailurePolicy) -> Self {
        self.failure_policy = policy;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Generates every screen plus the framework's project files.
    pub fn generate_code(&self, screens: &[Screen]) -> CoderResult<ProjectCodes> {
        let outcomes = self.fan_out(screens, |screen| self.generate_screen(screen));
        self.assemble(outcomes)
    }

    /// Parses raw sources and generates them. A source that fails to parse is
    /// handled by the failure policy like any other screen failure.
    pub fn compile(&self, sources: &[ScreenSource]) -> CoderResult<ProjectCodes> {
        let outcomes = self.fan_out(sources, |source| {
            Screen::from_source(source).and_then(|screen| self.generate_screen(&screen))
        });
        self.assemble(outcomes)
    }

    fn fan_out<T, F>(&self, items: &[T], generate: F) -> Vec<CoderResult<ScreenCode>>
    where
        T: Sync,
        F: Fn(&T) -> CoderResult<ScreenCode> + Send + Sync,
    {
        if self.parallel {
            items.par_iter().map(&generate).collect()
        } else {
            items.iter().map(&generate).collect()
        }
    }

    fn generate_screen(&self, screen: &Screen) -> CoderResult<ScreenCode> {
        debug!(
            screen = screen.name.as_str(),
            framework = self.framework.name(),
            "generating screen"
        );
        let files = self
            .framework
            .generate_screen(screen, self.normalizer.as_ref())
            .map_err(|e| e.in_screen(&screen.name))?;
        Ok(ScreenCode {
            name: screen.name.clone(),
            files,
            dependencies: screen.dependencies.clone(),
        })
    }

    fn assemble(&self, outcomes: Vec<CoderResult<ScreenCode>>) -> CoderResult<ProjectCodes> {
        let mut codes = ProjectCodes::default();
        codes.dependencies.extend(self.framework.dependencies());
        let mut generated = Vec::new();

        for outcome in outcomes {
            match outcome {
                Ok(screen) => {
                    codes.code_files.extend(screen.files);
                    codes.dependencies.extend(screen.dependencies);
                    generated.push(screen.name);
                }
                Err(error) if self.failure_policy == FailurePolicy::Abort => return Err(error),
                Err(error) => {
                    let screen = error.screen().unwrap_or_default().to_string();
                    warn!(screen = screen.as_str(), code = error.code(), "skipping screen: {}", error);
                    codes.failures.push(ScreenFailure { screen, error });
                }
            }
        }

        codes
            .code_files
            .extend(self.framework.generate_project_files(&generated));
        info!(
            framework = self.framework.name(),
            screens = generated.len(),
            failures = codes.failures.len(),
            files = codes.code_files.len(),
            "generated project code"
        );
        Ok(codes)
    }
}

/// Parses and generates `sources` with the coder described by `options`.
pub fn compile_project(sources: &[ScreenSource], options: &CoderOptions) -> CoderResult<ProjectCodes> {
    MobilangCoder::from_options(options).compile(sources)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn component_names_are_pascal_case() {
        assert_eq!(component_name("home"), "Home");
        assert_eq!(component_name("product-detail"), "ProductDetail");
        assert_eq!(component_name("my_cart"), "MyCart");
    }

    #[test]
    fn options_fill_defaults() {
        let options = CoderOptions::from_json(r#"{"framework":"ionic","pagesDir":"app/"}"#).unwrap();
        assert_eq!(options.framework, TargetFramework::Ionic);
        assert_eq!(options.failure_policy, FailurePolicy::Abort);
        assert_eq!(options.ionic.pages_dir, "app/");
        assert_eq!(options.ionic.routing_file, "src/app/app-routing.module.ts");
        assert_eq!(options.react_native.screens_dir, "src/screens/");
        assert_eq!(options.script_target, "es2015");
    }

    #[test]
    fn malformed_options_are_reported() {
        let err = CoderOptions::from_json(r#"{"framework":"flutter"}"#).unwrap_err();
        assert!(matches!(err, CoderError::Options { .. }));
    }

    #[test]
    fn code_file_text_ends_with_newline() {
        let file = CodeFile::new("a.js", vec!["one".into(), "two".into()]);
        assert_eq!(file.to_text(), "one\ntwo\n");
    }
}
