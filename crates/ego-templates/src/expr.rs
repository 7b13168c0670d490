//! Expression-boundary detection for component attribute values.
//!
//! The scanner does not know where a value like `[]int{1, 2}` ends: the
//! characters that terminate a tag can appear inside it. Instead it asks an
//! [`ExpressionOracle`] at every whitespace, `>` or `/>` boundary whether the
//! text read so far is already a complete expression.

/// Verdict of an [`ExpressionOracle`] on a prefix of an attribute value.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExprStatus {
    /// A complete expression; the scanner stops here.
    Valid,
    /// Not yet complete, but appending more text could make it so.
    Incomplete,
    /// No amount of additional text can make this an expression.
    Invalid,
}

pub trait ExpressionOracle: Send + Sync {
    fn check(&self, text: &str) -> ExprStatus;
}

/// Token-level validator for Go expressions.
///
/// This is not a full Go parser. It lexes the text, balances brackets and
/// rejects token sequences that can never form an expression at the top
/// level; anything nested in brackets is trusted.
#[derive(Clone, Copy, Debug, Default)]
pub struct GoExpr;

impl ExpressionOracle for GoExpr {
    fn check(&self, text: &str) -> ExprStatus {
        let tokens = match lex(text) {
            Ok(tokens) => tokens,
            Err(status) => return status,
        };
        validate(&tokens)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Token<'a> {
    Ident,
    Keyword(&'a str),
    Literal,
    Op(&'a str),
    Open(u8),
    Close(u8),
}

impl Token<'_> {
    fn ends_operand(self) -> bool {
        matches!(self, Token::Ident | Token::Literal | Token::Close(_))
    }
}

const KEYWORDS: &[&str] = &[
    "break",
    "case",
    "chan",
    "const",
    "continue",
    "default",
    "defer",
    "else",
    "fallthrough",
    "for",
    "func",
    "go",
    "goto",
    "if",
    "import",
    "interface",
    "map",
    "package",
    "range",
    "return",
    "select",
    "struct",
    "switch",
    "type",
    "var",
];

/// Keywords that begin a type or function literal and so may appear in an
/// expression.
const TYPE_KEYWORDS: &[&str] = &["chan", "func", "interface", "map", "struct"];

// Longest first, so the first prefix match wins.
const OPERATORS: &[&str] = &[
    "<<=", ">>=", "&^=", "...", "&&", "||", "<-", "++", "--", "==", "!=", "<=", ">=", ":=", "<<",
    ">>", "&^", "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=", "+", "-", "*", "/", "%", "&", "|",
    "^", "<", ">", "=", "!", ".", ",", ":", ";", "~",
];

/// Operators that are statements, not expressions, when they appear outside
/// brackets.
const STATEMENT_OPERATORS: &[&str] = &[
    "=", ":=", "+=", "-=", "*=", "/=", "%=", "&=", "|=", "^=", "<<=", ">>=", "&^=", "++", "--",
    ";", ":",
];

/// Operators that cannot start an expression.
const BINARY_ONLY: &[&str] = &[
    "/", "%", "==", "!=", "<=", ">=", "&&", "||", "<<", ">>", "&^", "|", ".", ",", "...", ">",
];

fn lex(text: &str) -> Result<Vec<Token<'_>>, ExprStatus> {
    let bytes = text.as_bytes();
    let mut tokens = Vec::new();
    let mut idx = 0;

    while idx < bytes.len() {
        let b = bytes[idx];
        match b {
            b' ' | b'\t' | b'\r' | b'\n' => idx += 1,
            b'/' if bytes.get(idx + 1) == Some(&b'/') => {
                idx = memchr::memchr(b'\n', &bytes[idx..]).map_or(bytes.len(), |n| idx + n);
            }
            b'/' if bytes.get(idx + 1) == Some(&b'*') => {
                let Some(end) = memchr::memmem::find(&bytes[idx + 2..], b"*/") else {
                    return Err(ExprStatus::Incomplete);
                };
                idx += end + 4;
            }
            b'"' | b'\'' => {
                idx = skip_quoted(bytes, idx)?;
                tokens.push(Token::Literal);
            }
            b'`' => {
                let Some(end) = memchr::memchr(b'`', &bytes[idx + 1..]) else {
                    return Err(ExprStatus::Incomplete);
                };
                idx += end + 2;
                tokens.push(Token::Literal);
            }
            b'0'..=b'9' => {
                idx = skip_number(bytes, idx);
                tokens.push(Token::Literal);
            }
            b'.' if bytes.get(idx + 1).is_some_and(u8::is_ascii_digit) => {
                idx = skip_number(bytes, idx);
                tokens.push(Token::Literal);
            }
            b'(' | b'[' | b'{' => {
                tokens.push(Token::Open(b));
                idx += 1;
            }
            b')' | b']' | b'}' => {
                tokens.push(Token::Close(b));
                idx += 1;
            }
            _ if b == b'_' || b.is_ascii_alphabetic() || b >= 0x80 => {
                let start = idx;
                for (offset, ch) in text[idx..].char_indices() {
                    if ch == '_' || ch.is_alphanumeric() {
                        idx = start + offset + ch.len_utf8();
                    } else {
                        break;
                    }
                }
                if idx == start {
                    // a non-ASCII character that is not a letter
                    return Err(ExprStatus::Invalid);
                }
                let word = &text[start..idx];
                if KEYWORDS.contains(&word) {
                    tokens.push(Token::Keyword(word));
                } else {
                    tokens.push(Token::Ident);
                }
            }
            _ => {
                let rest = &text[idx..];
                let Some(op) = OPERATORS.iter().find(|op| rest.starts_with(**op)) else {
                    return Err(ExprStatus::Invalid);
                };
                tokens.push(Token::Op(op));
                idx += op.len();
            }
        }
    }

    Ok(tokens)
}

/// Skip an interpreted string or rune literal starting at `start`.
fn skip_quoted(bytes: &[u8], start: usize) -> Result<usize, ExprStatus> {
    let quote = bytes[start];
    let mut idx = start + 1;
    while idx < bytes.len() {
        match bytes[idx] {
            b'\\' => idx += 2,
            b'\n' => return Err(ExprStatus::Invalid),
            b if b == quote => {
                if quote == b'\'' && idx == start + 1 {
                    return Err(ExprStatus::Invalid);
                }
                return Ok(idx + 1);
            }
            _ => idx += 1,
        }
    }
    Err(ExprStatus::Incomplete)
}

fn skip_number(bytes: &[u8], start: usize) -> usize {
    let hex = bytes[start] == b'0' && matches!(bytes.get(start + 1), Some(b'x' | b'X'));
    let mut idx = start;
    while idx < bytes.len() {
        let b = bytes[idx];
        let exponent_sign = matches!(b, b'+' | b'-')
            && idx > start
            && if hex {
                matches!(bytes[idx - 1], b'p' | b'P')
            } else {
                matches!(bytes[idx - 1], b'e' | b'E')
            };
        if b.is_ascii_alphanumeric() || b == b'_' || b == b'.' || exponent_sign {
            idx += 1;
        } else {
            break;
        }
    }
    idx
}

fn validate(tokens: &[Token<'_>]) -> ExprStatus {
    let Some(first) = tokens.first() else {
        return ExprStatus::Incomplete;
    };
    if let Token::Op(op) = first {
        if BINARY_ONLY.contains(op) || STATEMENT_OPERATORS.contains(op) {
            return ExprStatus::Invalid;
        }
    }

    let mut stack: Vec<u8> = Vec::new();
    let mut prev: Option<Token<'_>> = None;

    for &token in tokens {
        let top_level = stack.is_empty();
        match token {
            Token::Open(b) => stack.push(b),
            Token::Close(b) => {
                let expected = match b {
                    b')' => b'(',
                    b']' => b'[',
                    _ => b'{',
                };
                if stack.pop() != Some(expected) {
                    return ExprStatus::Invalid;
                }
            }
            Token::Keyword(word) if top_level && !TYPE_KEYWORDS.contains(&word) => {
                return ExprStatus::Invalid;
            }
            Token::Op(op) if top_level && STATEMENT_OPERATORS.contains(&op) => {
                return ExprStatus::Invalid;
            }
            Token::Ident | Token::Literal if top_level => {
                // `x y` or `1 x`; a closer followed by an identifier is a type
                // such as `[]int`.
                if let Some(p) = prev {
                    if p.ends_operand() && !(matches!(p, Token::Close(_)) && token == Token::Ident)
                    {
                        return ExprStatus::Invalid;
                    }
                }
            }
            _ => {}
        }
        prev = Some(token);
    }

    if !stack.is_empty() {
        return ExprStatus::Incomplete;
    }

    match prev {
        Some(Token::Op(_)) => ExprStatus::Incomplete,
        Some(Token::Keyword(word)) if TYPE_KEYWORDS.contains(&word) => ExprStatus::Incomplete,
        _ => ExprStatus::Valid,
    }
}
