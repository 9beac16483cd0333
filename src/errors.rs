//! Error Module for MobiLang Compiler
//!
//! A single error type crosses every phase: front-ends, transpiler, framework coders
//! and the orchestrator. Each variant carries a stable diagnostic code.

use serde::{Deserialize, Serialize};
use thiserror::Error;

// ═══════════════════════════════════════════════════════════════════════════════
// DIAGNOSTIC CODES
// ═══════════════════════════════════════════════════════════════════════════════

pub const ERR_TRANSPILATION: &str = "M-ERR-TRANSPILE-001";
pub const ERR_NODE_NOT_FOUND: &str = "M-ERR-NODE-001";
pub const ERR_MARKUP: &str = "M-ERR-MARKUP-001";
pub const ERR_SCRIPT: &str = "M-ERR-SCRIPT-001";
pub const ERR_STYLE: &str = "M-ERR-STYLE-001";
pub const ERR_IO: &str = "M-ERR-IO-001";
pub const ERR_OPTIONS: &str = "M-ERR-OPTIONS-001";

// ═══════════════════════════════════════════════════════════════════════════════
// ERROR TYPE
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum CoderError {
    /// The script normalization service reported one or more messages.
    #[error("script transpilation failed: {}", messages.join("; "))]
    Transpilation { messages: Vec<String> },

    #[error("referenced node not found: #{id}")]
    NodeNotFound { id: String },

    #[error("invalid markup: {message}")]
    Markup { message: String },

    #[error("invalid script: {}", messages.join("; "))]
    Script { messages: Vec<String> },

    #[error("invalid style sheet: {message}")]
    Style { message: String },

    #[error("{path}: {message}")]
    Io { path: String, message: String },

    #[error("invalid coder options: {message}")]
    Options { message: String },

    #[error("screen '{screen}': {source}")]
    Screen {
        screen: String,
        source: Box<CoderError>,
    },
}

impl CoderError {
    pub fn code(&self) -> &'static str {
        match self {
            CoderError::Transpilation { .. } => ERR_TRANSPILATION,
            CoderError::NodeNotFound { .. } => ERR_NODE_NOT_FOUND,
            CoderError::Markup { .. } => ERR_MARKUP,
            CoderError::Script { .. } => ERR_SCRIPT,
            CoderError::Style { .. } => ERR_STYLE,
            CoderError::Io { .. } => ERR_IO,
            CoderError::Options { .. } => ERR_OPTIONS,
            CoderError::Screen { source, .. } => source.code(),
        }
    }

    /// Attribute this error to a screen. Already-attributed errors are left alone.
    pub fn in_screen(self, screen: &str) -> Self {
        match self {
            CoderError::Screen { .. } => self,
            other => CoderError::Screen {
                screen: screen.to_string(),
                source: Box::new(other),
            },
        }
    }

    pub fn screen(&self) -> Option<&str> {
        match self {
            CoderError::Screen { screen, .. } => Some(screen),
            _ => None,
        }
    }

    /// The innermost error, with screen attribution stripped.
    pub fn root(&self) -> &CoderError {
        match self {
            CoderError::Screen { source, .. } => source.root(),
            other => other,
        }
    }

    /// All messages carried by the error, one per upstream diagnostic.
    pub fn messages(&self) -> Vec<String> {
        match self.root() {
            CoderError::Transpilation { messages } | CoderError::Script { messages } => {
                messages.clone()
            }
            other => vec![other.to_string()],
        }
    }

    pub fn diagnostic(&self) -> Diagnostic {
        Diagnostic {
            code: self.code().to_string(),
            message: self.root().to_string(),
            messages: self.messages(),
            screen: self.screen().map(str::to_string),
        }
    }
}

/// Flattened, serializable view of a [`CoderError`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub code: String,
    pub message: String,
    pub messages: Vec<String>,
    pub screen: Option<String>,
}

pub type CoderResult<T> = Result<T, CoderError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn screen_attribution_wraps_once() {
        let err = CoderError::NodeNotFound { id: "foo".into() }
            .in_screen("home")
            .in_screen("other");

        assert_eq!(err.screen(), Some("home"));
        assert_eq!(err.code(), ERR_NODE_NOT_FOUND);
        assert_eq!(err.to_string(), "screen 'home': referenced node not found: #foo");
    }

    #[test]
    fn transpilation_diagnostic_keeps_every_message() {
        let err = CoderError::Transpilation {
            messages: vec!["first".into(), "second".into()],
        }
        .in_screen("login");

        let diagnostic = err.diagnostic();
        assert_eq!(diagnostic.code, ERR_TRANSPILATION);
        assert_eq!(diagnostic.messages, vec!["first", "second"]);
        assert_eq!(diagnostic.screen.as_deref(), Some("login"));
    }
}
