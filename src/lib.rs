//! # MobiLang Screen Compiler
//!
//! Compiles platform-neutral screens (markup + style sheet + script) into code for
//! mobile frameworks: React Native function components or Ionic (Angular) pages.
//!
//! ## Pipeline
//!
//! 1. **Front-ends**: markup → [`TagTree`], CSS AST → [`StyleSheet`], script → [`Behavior`].
//! 2. **Normalization**: the script is lowered by a [`ScriptNormalizer`]. Any reported
//!    message aborts the screen with [`CoderError::Transpilation`].
//! 3. **DOM-to-state** (React Native): element lookups and `innerHTML` writes become
//!    `useState` declarations, accumulators and setter calls; attribute writes become
//!    compile-time [`AttributeEdit`]s applied to the tree.
//! 4. **Directives**: `mobilang:screen:`, `mobilang:param:` and `mobilang:input:` markers
//!    are rewritten through the framework's [`DirectiveHooks`].
//! 5. **Assembly**: [`MobilangCoder`] collects per-screen files, project files and the
//!    de-duplicated dependency set.
//!
//! ## Screen Isolation
//!
//! Parsers and transpilers own their state for a single run. Screens never share
//! mutable data, so the coder fans them out with rayon and keeps input order.

#[cfg(feature = "napi")]
use napi_derive::napi;

mod behavior;
mod coder;
mod directive;
mod discovery;
mod errors;
mod ionic;
mod markup;
mod react_native;
mod script;
mod style;
mod tag;
mod transpile;

#[cfg(test)]
mod directive_tests;
#[cfg(test)]
mod transpile_tests;

pub use behavior::{
    Assignment, Behavior, Declaration, Declarator, Instruction, Literal, RawCode, TemplateElement,
    TemplateLiteral,
};
pub use coder::{
    compile_project, component_name, CodeFile, CoderOptions, FailurePolicy, Framework,
    MobilangCoder, ProjectCodes, Screen, ScreenFailure, ScreenSource, TargetFramework,
};
pub use directive::{directive_kind, DirectiveHooks, DirectiveKind, DirectiveParser};
pub use discovery::discover_screens;
pub use errors::*;
pub use ionic::{parse_structure, IonicFramework, IonicHooks, IonicOptions, IonicStructure};
pub use markup::{parse_fragment, parse_markup, FRAGMENT};
pub use react_native::{
    convert_structure, ReactNativeConverter, ReactNativeFramework, ReactNativeHooks,
    ReactNativeOptions, ReactNativeStructure,
};
pub use script::{
    function_to_method, hoist_functions, imported_packages, normalize_lines, parse_script,
    HoistedScript, OxcNormalizer, ScriptNormalizer,
};
pub use style::{apply_styles, StyleSheet, StyleSheetRule};
pub use tag::{AttributeEdit, AttributeValue, Tag, TagId, TagNode, TagTree};
pub use transpile::{
    rewrite_navigation, state_name, DomStateTranspiler, NodeConverter, StateVariable,
    TranspiledBehavior, TranspilerOptions,
};

#[cfg(feature = "napi")]
pub use discovery::discover_screens_native;

/// Compile screens given as a JSON array of `ScreenSource`.
#[cfg(feature = "napi")]
#[napi]
pub fn compile_screens_native(
    sources_json: String,
    options_json: Option<String>,
) -> napi::Result<serde_json::Value> {
    let options = match options_json {
        Some(json) => CoderOptions::from_json(&json),
        None => Ok(CoderOptions::default()),
    }
    .map_err(|e| napi::Error::from_reason(e.to_string()))?;

    let sources: Vec<ScreenSource> = serde_json::from_str(&sources_json)
        .map_err(|e| napi::Error::from_reason(format!("Invalid screen sources: {}", e)))?;

    match compile_project(&sources, &options) {
        Ok(codes) => {
            serde_json::to_value(codes).map_err(|e| napi::Error::from_reason(e.to_string()))
        }
        Err(e) => {
            let diagnostic = serde_json::to_string(&e.diagnostic())
                .unwrap_or_else(|_| e.to_string());
            Err(napi::Error::from_reason(diagnostic))
        }
    }
}

/// Resolve directives in `lines` with the hooks of `framework` (`reactNative` or `ionic`).
#[cfg(feature = "napi")]
#[napi]
pub fn parse_directives_native(
    lines: Vec<String>,
    framework: String,
) -> napi::Result<serde_json::Value> {
    let target: TargetFramework = serde_json::from_value(serde_json::Value::String(framework))
        .map_err(|e| napi::Error::from_reason(format!("Unknown framework: {}", e)))?;

    let (parsed, parameters) = match target {
        TargetFramework::ReactNative => {
            let mut parser = DirectiveParser::new(ReactNativeHooks);
            (parser.parse(&lines), parser.screen_parameters().to_vec())
        }
        TargetFramework::Ionic => {
            let mut parser = DirectiveParser::new(IonicHooks);
            (parser.parse(&lines), parser.screen_parameters().to_vec())
        }
    };

    Ok(serde_json::json!({
        "lines": parsed,
        "screenParameters": parameters,
    }))
}
