//! Parser Types
//!
//! Token definitions and parse errors shared by the lexer and parser.

use thiserror::Error;

/// File redirection direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    In,
    Out,
    Append,
}

#[derive(Debug, Clone, PartialEq)]
pub enum TokKind {
    /// A word or quoted string.
    Word { text: String, quoted: bool },
    /// `$`
    Dollar,
    /// `$#`
    DollarCount,
    /// `` ` ``, introducing `` `{command} ``
    Backquote,
    LParen,
    RParen,
    LBrace,
    RBrace,
    Semi,
    Newline,
    Amp,
    Pipe,
    AndAnd,
    OrOr,
    Caret,
    /// `<`, `>`, `>>`, with an optional `[n]` fd override already folded in.
    RedirFile { kind: FileKind, fd: i32 },
    /// `>[n=m]`
    RedirDup { fd: i32, from: i32 },
    /// `>[n=]`
    RedirClose { fd: i32 },
    Eof,
}

/// One token plus the bookkeeping the parser needs: the source line for
/// diagnostics, and whether the token abuts the previous one with no
/// intervening blank (adjacent word pieces concatenate).
#[derive(Debug, Clone, PartialEq)]
pub struct Tok {
    pub kind: TokKind,
    pub line: usize,
    pub glued: bool,
}

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ParseError {
    #[error("line {line}: syntax error near {near}")]
    Unexpected { line: usize, near: String },
    #[error("line {line}: unterminated quote")]
    UnterminatedQuote { line: usize },
    #[error("line {line}: expected {expected}")]
    Expected { line: usize, expected: String },
    #[error("line {line}: bad redirection")]
    BadRedirect { line: usize },
}

/// Short rendering of a token for syntax diagnostics.
pub fn describe(kind: &TokKind) -> String {
    match kind {
        TokKind::Word { text, .. } => format!("`{}'", text),
        TokKind::Dollar => "`$'".to_string(),
        TokKind::DollarCount => "`$#'".to_string(),
        TokKind::Backquote => "``'".to_string(),
        TokKind::LParen => "`('".to_string(),
        TokKind::RParen => "`)'".to_string(),
        TokKind::LBrace => "`{'".to_string(),
        TokKind::RBrace => "`}'".to_string(),
        TokKind::Semi => "`;'".to_string(),
        TokKind::Newline => "newline".to_string(),
        TokKind::Amp => "`&'".to_string(),
        TokKind::Pipe => "`|'".to_string(),
        TokKind::AndAnd => "`&&'".to_string(),
        TokKind::OrOr => "`||'".to_string(),
        TokKind::Caret => "`^'".to_string(),
        TokKind::RedirFile { .. } | TokKind::RedirDup { .. } | TokKind::RedirClose { .. } => {
            "redirection".to_string()
        }
        TokKind::Eof => "end of file".to_string(),
    }
}
