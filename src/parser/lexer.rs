//! Lexer
//!
//! Tokenizes the command language: words (with single-quote quoting),
//! operators, and redirections including the `[n]`, `[n=m]`, and `[n=]`
//! fd forms. Comments run from `#` to end of line. Every token records
//! whether it abuts the previous one, which is how adjacent word pieces
//! end up concatenated.

use crate::parser::types::{FileKind, ParseError, Tok, TokKind};

/// Characters that end a bare word.
fn is_word_char(c: char) -> bool {
    !matches!(
        c,
        ' ' | '\t' | '\n' | '#' | ';' | '&' | '|' | '^' | '$' | '`' | '\'' | '{' | '}' | '('
            | ')' | '<' | '>'
    )
}

struct Lexer<'a> {
    src: &'a [u8],
    pos: usize,
    line: usize,
    glued: bool,
}

impl<'a> Lexer<'a> {
    fn new(src: &'a str) -> Self {
        Self { src: src.as_bytes(), pos: 0, line: 1, glued: false }
    }

    fn peek(&self) -> Option<char> {
        self.src.get(self.pos).map(|&b| b as char)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn eat(&mut self, want: char) -> bool {
        if self.peek() == Some(want) {
            self.bump();
            return true;
        }
        false
    }

    fn tok(&self, kind: TokKind) -> Tok {
        Tok { kind, line: self.line, glued: self.glued }
    }

    /// Digits for an fd inside `[...]`.
    fn number(&mut self) -> Option<i32> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.bump();
        }
        if self.pos == start {
            return None;
        }
        std::str::from_utf8(&self.src[start..self.pos])
            .ok()?
            .parse()
            .ok()
    }

    /// The `[n]`, `[n=m]`, `[n=]` suffix of a redirection operator.
    /// `allow_dup` is only true for plain `>`.
    fn redir_suffix(
        &mut self,
        kind: FileKind,
        default_fd: i32,
        allow_dup: bool,
    ) -> Result<TokKind, ParseError> {
        if !self.eat('[') {
            return Ok(TokKind::RedirFile { kind, fd: default_fd });
        }
        let fd = self
            .number()
            .ok_or(ParseError::BadRedirect { line: self.line })?;
        if self.eat('=') {
            if !allow_dup {
                return Err(ParseError::BadRedirect { line: self.line });
            }
            if self.eat(']') {
                return Ok(TokKind::RedirClose { fd });
            }
            let from = self
                .number()
                .ok_or(ParseError::BadRedirect { line: self.line })?;
            if !self.eat(']') {
                return Err(ParseError::BadRedirect { line: self.line });
            }
            return Ok(TokKind::RedirDup { fd, from });
        }
        if !self.eat(']') {
            return Err(ParseError::BadRedirect { line: self.line });
        }
        Ok(TokKind::RedirFile { kind, fd })
    }

    fn quoted_word(&mut self) -> Result<TokKind, ParseError> {
        let mut text = String::new();
        loop {
            match self.bump() {
                None => return Err(ParseError::UnterminatedQuote { line: self.line }),
                Some('\'') => {
                    // A doubled quote is a literal quote.
                    if self.eat('\'') {
                        text.push('\'');
                    } else {
                        return Ok(TokKind::Word { text, quoted: true });
                    }
                }
                Some(c) => text.push(c),
            }
        }
    }

    fn next_token(&mut self) -> Result<Option<Tok>, ParseError> {
        // Blanks break gluing; comments run to end of line.
        loop {
            match self.peek() {
                Some(' ') | Some('\t') => {
                    self.bump();
                    self.glued = false;
                }
                Some('#') => {
                    while matches!(self.peek(), Some(c) if c != '\n') {
                        self.bump();
                    }
                    self.glued = false;
                }
                _ => break,
            }
        }
        let Some(c) = self.peek() else {
            return Ok(None);
        };
        let tok = match c {
            '\n' => {
                let t = self.tok(TokKind::Newline);
                self.bump();
                self.glued = false;
                return Ok(Some(t));
            }
            ';' => {
                self.bump();
                self.tok(TokKind::Semi)
            }
            '&' => {
                self.bump();
                if self.eat('&') {
                    self.tok(TokKind::AndAnd)
                } else {
                    self.tok(TokKind::Amp)
                }
            }
            '|' => {
                self.bump();
                if self.eat('|') {
                    self.tok(TokKind::OrOr)
                } else {
                    self.tok(TokKind::Pipe)
                }
            }
            '^' => {
                self.bump();
                self.tok(TokKind::Caret)
            }
            '(' => {
                self.bump();
                self.tok(TokKind::LParen)
            }
            ')' => {
                self.bump();
                self.tok(TokKind::RParen)
            }
            '{' => {
                self.bump();
                self.tok(TokKind::LBrace)
            }
            '}' => {
                self.bump();
                self.tok(TokKind::RBrace)
            }
            '`' => {
                self.bump();
                self.tok(TokKind::Backquote)
            }
            '$' => {
                self.bump();
                if self.eat('#') {
                    self.tok(TokKind::DollarCount)
                } else {
                    self.tok(TokKind::Dollar)
                }
            }
            '<' => {
                self.bump();
                let kind = self.redir_suffix(FileKind::In, 0, false)?;
                self.tok(kind)
            }
            '>' => {
                self.bump();
                let kind = if self.eat('>') {
                    self.redir_suffix(FileKind::Append, 1, false)?
                } else {
                    self.redir_suffix(FileKind::Out, 1, true)?
                };
                self.tok(kind)
            }
            '\'' => {
                self.bump();
                let kind = self.quoted_word()?;
                self.tok(kind)
            }
            _ => {
                let start = self.pos;
                while matches!(self.peek(), Some(c) if is_word_char(c)) {
                    self.bump();
                }
                let text = String::from_utf8_lossy(&self.src[start..self.pos]).into_owned();
                self.tok(TokKind::Word { text, quoted: false })
            }
        };
        // The token just produced glues to whatever comes right after it.
        self.glued = true;
        Ok(Some(tok))
    }
}

/// Tokenize a whole input. The stream always ends with Eof.
pub fn lex(src: &str) -> Result<Vec<Tok>, ParseError> {
    let mut lexer = Lexer::new(src);
    let mut toks = Vec::new();
    while let Some(tok) = lexer.next_token()? {
        toks.push(tok);
    }
    toks.push(Tok { kind: TokKind::Eof, line: lexer.line, glued: false });
    Ok(toks)
}
