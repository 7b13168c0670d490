use std::fmt;
use std::sync::Arc;

use crate::Span;

/// A location in a template file: the path it was read from and a 1-based
/// line number.
///
/// The path is shared between every block scanned from the same file, so
/// cloning a position is cheap.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Position {
    path: Arc<str>,
    line: u32,
}

impl Position {
    #[must_use]
    pub fn new(path: impl Into<Arc<str>>, line: u32) -> Self {
        Self {
            path: path.into(),
            line,
        }
    }

    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn line(&self) -> u32 {
        self.line
    }

    /// Whether this position can be written out as a `//line` pragma.
    #[must_use]
    pub fn is_addressable(&self) -> bool {
        !self.path.is_empty() && self.line > 0
    }
}

impl Default for Position {
    fn default() -> Self {
        Self::new("", 0)
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.path, self.line)
    }
}

/// Byte offsets of the start of every line in a source text.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LineIndex(Vec<u32>);

impl LineIndex {
    #[must_use]
    pub fn from_text(text: &str) -> Self {
        let mut starts = vec![0];
        starts.extend(
            memchr::memchr_iter(b'\n', text.as_bytes())
                .map(|idx| u32::try_from(idx + 1).unwrap_or(u32::MAX)),
        );
        Self(starts)
    }

    /// Span of a 1-based line, excluding its trailing newline.
    #[must_use]
    pub fn line_span(&self, line: u32, text: &str) -> Option<Span> {
        let idx = usize::try_from(line).ok()?.checked_sub(1)?;
        let start = *self.0.get(idx)? as usize;
        let end = self
            .0
            .get(idx + 1)
            .map_or(text.len(), |next| (*next as usize).saturating_sub(1));
        let end = if text[start..end].ends_with('\r') {
            end - 1
        } else {
            end
        };
        Some(Span::from_bounds(start, end))
    }
}
