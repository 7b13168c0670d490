use ego_source::Position;
use thiserror::Error;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum TemplateError {
    /// An opened directive, component tag, attribute tag or expression never
    /// reached its terminator. The position is where it was opened.
    #[error("unexpected end of input at {position}")]
    UnexpectedEndOfInput { position: Position },

    /// Structural violation: mismatched or stray end tags, malformed
    /// identifiers, missing `=`, incomplete or invalid attribute values.
    #[error("{message} at {position}")]
    Syntax { message: String, position: Position },

    /// A template has no `<%! ... %>` declaration block.
    #[error("declaration required: {path}")]
    DeclarationRequired { path: String },

    #[error("package name required")]
    PackageNameRequired,

    /// The destination writer failed during emission.
    #[error("IO error: {0}")]
    Io(String),
}

impl TemplateError {
    pub(crate) fn syntax(message: impl Into<String>, position: &Position) -> Self {
        Self::Syntax {
            message: message.into(),
            position: position.clone(),
        }
    }

    pub(crate) fn eof(position: &Position) -> Self {
        Self::UnexpectedEndOfInput {
            position: position.clone(),
        }
    }

    #[must_use]
    pub fn position(&self) -> Option<&Position> {
        match self {
            TemplateError::UnexpectedEndOfInput { position }
            | TemplateError::Syntax { position, .. } => Some(position),
            TemplateError::DeclarationRequired { .. }
            | TemplateError::PackageNameRequired
            | TemplateError::Io(_) => None,
        }
    }

    /// Stable code used when rendering diagnostics.
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            TemplateError::UnexpectedEndOfInput { .. } => "E001",
            TemplateError::Syntax { .. } => "E002",
            TemplateError::DeclarationRequired { .. } => "E003",
            TemplateError::PackageNameRequired => "E004",
            TemplateError::Io(_) => "E900",
        }
    }

    /// The message without its trailing location.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            TemplateError::UnexpectedEndOfInput { .. } => "unexpected end of input".to_string(),
            TemplateError::Syntax { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }
}

impl From<std::io::Error> for TemplateError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<std::fmt::Error> for TemplateError {
    fn from(err: std::fmt::Error) -> Self {
        Self::Io(err.to_string())
    }
}
