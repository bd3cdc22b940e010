//! Error types for template compilation

use std::fmt;
use thiserror::Error;

/// Result type alias for template operations
pub type Result<T> = std::result::Result<T, TemplateError>;

/// What went wrong while parsing or rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemplateErrorKind {
    /// Reference to a key missing from the context (rich dialect)
    UnknownKey,
    /// Include/import chain loops back onto itself
    CyclicInclude,
    /// Include/import of a file that is not in the input set
    MissingInclude,
    /// Filter or function failed, or received unusable arguments
    FilterError,
    /// Malformed template, e.g. an unterminated tag
    SyntaxError,
    Other,
}

impl fmt::Display for TemplateErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TemplateErrorKind::UnknownKey => "UnknownKey",
            TemplateErrorKind::CyclicInclude => "CyclicInclude",
            TemplateErrorKind::MissingInclude => "MissingInclude",
            TemplateErrorKind::FilterError => "FilterError",
            TemplateErrorKind::SyntaxError => "SyntaxError",
            TemplateErrorKind::Other => "Other",
        };
        f.write_str(s)
    }
}

/// Errors raised by the template engine
#[derive(Debug, Clone, Error)]
pub enum TemplateError {
    /// Template could not be parsed or its includes could not be resolved
    #[error("failed to parse template '{name}' ({kind}): {message}")]
    Parse {
        name: String,
        kind: TemplateErrorKind,
        message: String,
    },

    /// Template parsed but rendering failed
    #[error("failed to render template '{name}' ({kind}): {message}")]
    Render {
        name: String,
        kind: TemplateErrorKind,
        message: String,
    },
}

impl TemplateError {
    pub fn parse(name: impl Into<String>, kind: TemplateErrorKind, message: impl Into<String>) -> Self {
        Self::Parse {
            name: name.into(),
            kind,
            message: message.into(),
        }
    }

    pub fn render(name: impl Into<String>, kind: TemplateErrorKind, message: impl Into<String>) -> Self {
        Self::Render {
            name: name.into(),
            kind,
            message: message.into(),
        }
    }

    /// Converts a minijinja error, syntax errors become `Parse`
    pub(crate) fn from_minijinja(name: &str, err: minijinja::Error) -> Self {
        use minijinja::ErrorKind;

        let message = err.to_string();
        let kind = match err.kind() {
            ErrorKind::SyntaxError => TemplateErrorKind::SyntaxError,
            ErrorKind::UndefinedError => TemplateErrorKind::UnknownKey,
            ErrorKind::TemplateNotFound => TemplateErrorKind::MissingInclude,
            _ if message.contains("recursion limit") => TemplateErrorKind::CyclicInclude,
            ErrorKind::UnknownFilter
            | ErrorKind::UnknownFunction
            | ErrorKind::MissingArgument
            | ErrorKind::TooManyArguments
            | ErrorKind::InvalidOperation => TemplateErrorKind::FilterError,
            _ => TemplateErrorKind::Other,
        };

        if kind == TemplateErrorKind::SyntaxError {
            Self::parse(name, kind, message)
        } else {
            Self::render(name, kind, message)
        }
    }

    /// Error subkind
    pub fn kind(&self) -> TemplateErrorKind {
        match self {
            Self::Parse { kind, .. } | Self::Render { kind, .. } => *kind,
        }
    }

    /// Name of the template that failed
    pub fn name(&self) -> &str {
        match self {
            Self::Parse { name, .. } | Self::Render { name, .. } => name,
        }
    }

    /// Check if this error happened before rendering started
    pub fn is_parse(&self) -> bool {
        matches!(self, Self::Parse { .. })
    }

    /// Stable string identifier, `TemplateParse` or `TemplateRender`
    pub fn identifier(&self) -> &'static str {
        match self {
            Self::Parse { .. } => "TemplateParse",
            Self::Render { .. } => "TemplateRender",
        }
    }
}
