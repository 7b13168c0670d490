mod position;
mod render;
mod span;

pub use position::LineIndex;
pub use position::Position;
pub use render::Diagnostic;
pub use render::DiagnosticRenderer;
pub use render::Severity;
pub use span::Span;
