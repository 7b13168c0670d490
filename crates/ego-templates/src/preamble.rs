//! Parsing of `<%% ... %%>` header blocks into imports and declarations.

use ego_source::Position;

use crate::error::TemplateError;

/// One import spec, e.g. `h "html/template"`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Import {
    /// An identifier, `.` or `_`.
    pub alias: Option<String>,
    /// The path literal exactly as written, quotes included.
    pub path: String,
}

impl Import {
    /// Identity used to merge imports across templates.
    #[must_use]
    pub fn key(&self) -> String {
        format!("{}:{}", self.alias.as_deref().unwrap_or(""), self.path)
    }

    #[must_use]
    pub fn unaliased(path: &str) -> Self {
        Self {
            alias: None,
            path: format!("\"{path}\""),
        }
    }
}

impl std::fmt::Display for Import {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.alias {
            Some(alias) => write!(f, "{alias} {}", self.path),
            None => f.write_str(&self.path),
        }
    }
}

/// The parts of a header block that survive into a package file.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Preamble {
    pub imports: Vec<Import>,
    /// Everything after the last import, verbatim.
    pub decls: Option<String>,
}

/// Split a header into its imports and trailing declarations. A leading
/// `package` clause is dropped.
pub fn parse_preamble(content: &str, pos: &Position) -> Result<Preamble, TemplateError> {
    let mut cursor = Cursor {
        text: content,
        idx: 0,
        pos,
    };
    let mut preamble = Preamble::default();

    cursor.skip_trivia()?;
    if cursor.keyword("package") {
        cursor.skip_trivia()?;
        if cursor.ident().is_none() {
            return Err(cursor.error("expected package name"));
        }
    }

    loop {
        cursor.skip_trivia()?;
        if cursor.eat(b';') {
            continue;
        }
        if !cursor.keyword("import") {
            break;
        }
        cursor.skip_trivia()?;
        if cursor.eat(b'(') {
            loop {
                cursor.skip_trivia()?;
                if cursor.eat(b';') {
                    continue;
                }
                if cursor.eat(b')') {
                    break;
                }
                if cursor.at_end() {
                    return Err(cursor.error("unterminated import group"));
                }
                preamble.imports.push(cursor.import_spec()?);
            }
        } else {
            preamble.imports.push(cursor.import_spec()?);
        }
    }

    let rest = content[cursor.idx..].trim();
    if !rest.is_empty() {
        preamble.decls = Some(rest.to_string());
    }
    Ok(preamble)
}

struct Cursor<'a> {
    text: &'a str,
    idx: usize,
    pos: &'a Position,
}

impl<'a> Cursor<'a> {
    fn error(&self, message: &str) -> TemplateError {
        TemplateError::syntax(message, self.pos)
    }

    fn rest(&self) -> &'a str {
        &self.text[self.idx..]
    }

    fn at_end(&self) -> bool {
        self.idx >= self.text.len()
    }

    fn eat(&mut self, b: u8) -> bool {
        if self.rest().as_bytes().first() == Some(&b) {
            self.idx += 1;
            true
        } else {
            false
        }
    }

    fn skip_trivia(&mut self) -> Result<(), TemplateError> {
        loop {
            let rest = self.rest();
            let trimmed = rest.trim_start();
            self.idx += rest.len() - trimmed.len();

            if trimmed.starts_with("//") {
                self.idx += trimmed.find('\n').unwrap_or(trimmed.len());
            } else if let Some(body) = trimmed.strip_prefix("/*") {
                let Some(end) = body.find("*/") else {
                    return Err(self.error("unterminated comment"));
                };
                self.idx += end + 4;
            } else {
                return Ok(());
            }
        }
    }

    fn ident(&mut self) -> Option<&'a str> {
        let rest = self.rest();
        let len = rest
            .char_indices()
            .take_while(|(i, c)| *c == '_' || c.is_alphabetic() || (*i > 0 && c.is_numeric()))
            .map(|(i, c)| i + c.len_utf8())
            .last()?;
        self.idx += len;
        Some(&rest[..len])
    }

    /// Consume `word` only when it is not the prefix of a longer identifier.
    fn keyword(&mut self, word: &str) -> bool {
        let Some(after) = self.rest().strip_prefix(word) else {
            return false;
        };
        if after
            .chars()
            .next()
            .map_or(true, |c| !(c == '_' || c.is_alphanumeric()))
        {
            self.idx += word.len();
            true
        } else {
            false
        }
    }

    fn string(&mut self) -> Option<&'a str> {
        let rest = self.rest();
        let bytes = rest.as_bytes();
        let end = match bytes.first()? {
            b'`' => memchr::memchr(b'`', &bytes[1..])? + 2,
            b'"' => {
                let mut idx = 1;
                loop {
                    match bytes.get(idx)? {
                        b'\\' => idx += 2,
                        b'"' => break idx + 1,
                        b'\n' => return None,
                        _ => idx += 1,
                    }
                }
            }
            _ => return None,
        };
        self.idx += end;
        Some(&rest[..end])
    }

    fn import_spec(&mut self) -> Result<Import, TemplateError> {
        let alias = if self.eat(b'.') {
            Some(".".to_string())
        } else {
            self.ident().map(str::to_string)
        };
        if alias.is_some() {
            self.skip_trivia()?;
        }
        let path = self
            .string()
            .ok_or_else(|| self.error("expected import path"))?;
        Ok(Import {
            alias,
            path: path.to_string(),
        })
    }
}
