//! Discovery Module for MobiLang Compiler
//!
//! Recursively scans a directory for screens. A screen is a `<name>.html` file
//! with optional `<name>.css.json` (style AST) and `<name>.js` (script) siblings.

#[cfg(feature = "napi")]
use napi_derive::napi;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::coder::ScreenSource;
use crate::errors::{CoderError, CoderResult};

const MARKUP_EXTENSION: &str = "html";
const STYLE_SUFFIX: &str = ".css.json";
const SCRIPT_SUFFIX: &str = ".js";

/// Discover all screens under `dir`, sorted by screen name.
#[cfg(feature = "napi")]
#[napi]
pub fn discover_screens_native(dir: String) -> napi::Result<serde_json::Value> {
    let screens = discover_screens(Path::new(&dir))
        .map_err(|e| napi::Error::from_reason(e.to_string()))?;
    serde_json::to_value(screens).map_err(|e| napi::Error::from_reason(e.to_string()))
}

pub fn discover_screens(dir: &Path) -> CoderResult<Vec<ScreenSource>> {
    if !dir.is_dir() {
        return Err(CoderError::Io {
            path: dir.to_string_lossy().to_string(),
            message: "not a directory".to_string(),
        });
    }

    let mut screens = Vec::new();
    for path in find_markup_files(dir) {
        match load_screen(&path) {
            Ok(screen) => {
                debug!(screen = screen.name.as_str(), "discovered screen");
                screens.push(screen);
            }
            Err(e) => warn!(path = %path.display(), "skipping screen: {}", e),
        }
    }

    screens.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(screens)
}

fn find_markup_files(dir: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(dir).follow_links(true) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("skipping unreadable entry: {}", e);
                continue;
            }
        };
        let path = entry.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == MARKUP_EXTENSION) {
            files.push(path.to_path_buf());
        }
    }

    files
}

fn read(path: &Path) -> CoderResult<String> {
    fs::read_to_string(path).map_err(|e| CoderError::Io {
        path: path.to_string_lossy().to_string(),
        message: e.to_string(),
    })
}

fn sibling(markup: &Path, name: &str, suffix: &str) -> PathBuf {
    markup.with_file_name(format!("{}{}", name, suffix))
}

fn load_screen(markup_path: &Path) -> CoderResult<ScreenSource> {
    let name = markup_path
        .file_stem()
        .and_then(|s| s.to_str())
        .map(str::to_string)
        .ok_or_else(|| CoderError::Io {
            path: markup_path.to_string_lossy().to_string(),
            message: "invalid file name".to_string(),
        })?;

    let markup = read(markup_path)?;

    let style_path = sibling(markup_path, &name, STYLE_SUFFIX);
    let style = if style_path.is_file() {
        serde_json::from_str(&read(&style_path)?).map_err(|e| CoderError::Style {
            message: format!("{}: {}", style_path.display(), e),
        })?
    } else {
        Value::Null
    };

    let script_path = sibling(markup_path, &name, SCRIPT_SUFFIX);
    let script = if script_path.is_file() {
        read(&script_path)?
    } else {
        String::new()
    };

    Ok(ScreenSource {
        name,
        markup,
        style,
        script,
    })
}
