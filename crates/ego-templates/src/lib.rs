//! Scanning, parsing and Go code generation for ego templates.
//!
//! A template is literal text interleaved with `<% ... %>` directives and
//! component tags. Compiling one runs three stages:
//!
//! 1. **Scanning**: [`Scanner`] splits the source into a flat stream of
//!    [`Block`]s. Component attribute values are cut where an
//!    [`ExpressionOracle`] accepts them as complete Go expressions.
//! 2. **Parsing**: [`Parser`] nests components and attribute slots, turns
//!    tags in declared XML namespaces back into text, and normalizes text
//!    runs.
//! 3. **Emission**: [`Template`] renders one Go function; [`Package`] merges
//!    the imports of many templates into one file.
//!
//! ## Example
//!
//! ```
//! let template = ego_templates::parse(
//!     "<%! func Hello(w io.Writer, name string) error %>Hello <%= name %>!",
//!     "hello.ego",
//! )?;
//! let package = ego_templates::Package::new("views", vec![template]);
//! let mut out = Vec::new();
//! package.emit(&mut out)?;
//! # Ok::<(), ego_templates::TemplateError>(())
//! ```

mod block;
mod codegen;
mod error;
mod expr;
mod parser;
mod preamble;
mod scanner;
mod template;

pub use block::normalize;
pub use block::Attr;
pub use block::AttrStart;
pub use block::Block;
pub use block::ComponentStart;
pub use block::Field;
pub use block::TagEnd;
pub use block::Trim;
pub use error::TemplateError;
pub use expr::ExprStatus;
pub use expr::ExpressionOracle;
pub use expr::GoExpr;
pub use parser::Namespaces;
pub use parser::Parser;
pub use preamble::parse_preamble;
pub use preamble::Import;
pub use preamble::Preamble;
pub use scanner::Scanner;
pub use template::Package;
pub use template::Template;

/// Parse one template source into its block tree.
pub fn parse(source: &str, path: &str) -> Result<Template, TemplateError> {
    tracing::debug!(path, bytes = source.len(), "parsing template");
    Parser::new(Scanner::new(source, path)).parse()
}
