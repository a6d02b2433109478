//! Recursive Descent Parser
//!
//! Consumes the token stream and produces parse trees. Grammar, loosest
//! binding first: sequences (`;`, newline, `&`), and-or chains, pipelines,
//! then commands (control structures, brace blocks, assignments, simple
//! commands). Word expressions handle `$`-forms, subscripts, backquote
//! blocks, lists, and `^`/adjacency concatenation.

use crate::ast::{Node, RedirOp};
use crate::parser::lexer::lex;
use crate::parser::types::{describe, FileKind, ParseError, Tok, TokKind};

struct Parser {
    toks: Vec<Tok>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> &Tok {
        &self.toks[self.pos]
    }

    fn kind(&self) -> &TokKind {
        &self.toks[self.pos].kind
    }

    fn bump(&mut self) -> Tok {
        let t = self.toks[self.pos].clone();
        if self.pos + 1 < self.toks.len() {
            self.pos += 1;
        }
        t
    }

    fn line(&self) -> usize {
        self.peek().line
    }

    fn unexpected<T>(&self) -> Result<T, ParseError> {
        Err(ParseError::Unexpected { line: self.line(), near: describe(self.kind()) })
    }

    fn expect(&mut self, want: &TokKind, what: &str) -> Result<(), ParseError> {
        if self.kind() == want {
            self.bump();
            Ok(())
        } else {
            Err(ParseError::Expected { line: self.line(), expected: what.to_string() })
        }
    }

    fn at_keyword(&self, kw: &str) -> bool {
        matches!(self.kind(), TokKind::Word { text, quoted: false } if text == kw)
    }

    fn at_separator(&self) -> bool {
        matches!(self.kind(), TokKind::Semi | TokKind::Newline | TokKind::Amp)
    }

    fn skip_separators(&mut self) {
        while matches!(self.kind(), TokKind::Semi | TokKind::Newline) {
            self.bump();
        }
    }

    // ---- word expressions ----

    fn at_word_start(&self) -> bool {
        matches!(
            self.kind(),
            TokKind::Word { .. }
                | TokKind::Dollar
                | TokKind::DollarCount
                | TokKind::Backquote
                | TokKind::LParen
        )
    }

    fn parse_word_piece(&mut self) -> Result<Node, ParseError> {
        match self.kind().clone() {
            TokKind::Word { text, quoted } => {
                self.bump();
                Ok(Node::Word { text, quoted })
            }
            TokKind::Dollar => {
                self.bump();
                if !self.at_word_start() || !self.peek().glued {
                    return self.unexpected();
                }
                let name = self.parse_word_piece()?;
                if matches!(self.kind(), TokKind::LParen) && self.peek().glued {
                    self.bump();
                    let mut indices = Vec::new();
                    while !matches!(self.kind(), TokKind::RParen) {
                        if !self.at_word_start() {
                            return self.unexpected();
                        }
                        indices.push(self.parse_word_expr()?);
                    }
                    self.expect(&TokKind::RParen, "`)'")?;
                    Ok(Node::VarSub { name: Box::new(name), indices })
                } else {
                    Ok(Node::Var(Box::new(name)))
                }
            }
            TokKind::DollarCount => {
                self.bump();
                if !self.at_word_start() || !self.peek().glued {
                    return self.unexpected();
                }
                let name = self.parse_word_piece()?;
                Ok(Node::VarCount(Box::new(name)))
            }
            TokKind::Backquote => {
                self.bump();
                self.expect(&TokKind::LBrace, "`{'")?;
                let body = self.parse_body(&TokKind::RBrace)?;
                self.expect(&TokKind::RBrace, "`}'")?;
                Ok(Node::Backquote(Box::new(body)))
            }
            TokKind::LParen => {
                self.bump();
                let mut words = Vec::new();
                loop {
                    self.skip_separators();
                    if matches!(self.kind(), TokKind::RParen) {
                        break;
                    }
                    if !self.at_word_start() {
                        return self.unexpected();
                    }
                    words.push(self.parse_word_expr()?);
                }
                self.expect(&TokKind::RParen, "`)'")?;
                Ok(Node::List(words))
            }
            _ => self.unexpected(),
        }
    }

    fn parse_word_expr(&mut self) -> Result<Node, ParseError> {
        let mut node = self.parse_word_piece()?;
        loop {
            if matches!(self.kind(), TokKind::Caret) {
                self.bump();
                let rhs = self.parse_word_piece()?;
                node = Node::Concat(Box::new(node), Box::new(rhs));
            } else if self.at_word_start() && self.peek().glued {
                let rhs = self.parse_word_piece()?;
                node = Node::Concat(Box::new(node), Box::new(rhs));
            } else {
                break;
            }
        }
        Ok(node)
    }

    // ---- assignments ----

    /// Split a leading word of the shape `name=value` into its parts.
    /// A trailing list or glued continuation becomes the value.
    fn split_assignment(node: &Node) -> Option<(String, Vec<Node>)> {
        fn split_word(text: &str, quoted: bool) -> Option<(String, Option<String>)> {
            if quoted {
                return None;
            }
            let eq = text.find('=')?;
            if eq == 0 {
                return None;
            }
            let rest = &text[eq + 1..];
            Some((
                text[..eq].to_string(),
                if rest.is_empty() { None } else { Some(rest.to_string()) },
            ))
        }
        fn value_of(node: Node) -> Vec<Node> {
            match node {
                Node::List(items) => items,
                other => vec![other],
            }
        }
        match node {
            Node::Word { text, quoted } => {
                let (name, rest) = split_word(text, *quoted)?;
                Some((name, rest.map(|r| vec![Node::word(&r)]).unwrap_or_default()))
            }
            Node::Concat(l, r) => {
                let (name, lvalue) = Self::split_assignment(l)?;
                let value = if lvalue.is_empty() {
                    value_of((**r).clone())
                } else if lvalue.len() == 1 {
                    let only = lvalue.into_iter().next().unwrap();
                    vec![Node::Concat(Box::new(only), r.clone())]
                } else {
                    vec![Node::Concat(Box::new(Node::List(lvalue)), r.clone())]
                };
                Some((name, value))
            }
            _ => None,
        }
    }

    // ---- commands ----

    fn parse_redir(&mut self) -> Result<RedirOp, ParseError> {
        let line = self.line();
        match self.kind().clone() {
            TokKind::RedirFile { kind, fd } => {
                self.bump();
                if !self.at_word_start() {
                    return Err(ParseError::BadRedirect { line });
                }
                let target = Box::new(self.parse_word_expr()?);
                Ok(match kind {
                    FileKind::In => RedirOp::In { fd, target },
                    FileKind::Out => RedirOp::Out { fd, target },
                    FileKind::Append => RedirOp::Append { fd, target },
                })
            }
            TokKind::RedirDup { fd, from } => {
                self.bump();
                Ok(RedirOp::Dup { fd, from })
            }
            TokKind::RedirClose { fd } => {
                self.bump();
                Ok(RedirOp::Close { fd })
            }
            _ => self.unexpected(),
        }
    }

    fn at_redir(&self) -> bool {
        matches!(
            self.kind(),
            TokKind::RedirFile { .. } | TokKind::RedirDup { .. } | TokKind::RedirClose { .. }
        )
    }

    /// Wrap `node` in redirections, first one innermost, so the printed
    /// form lists them in source order. The walker collects them from the
    /// outside in and reverses before applying.
    fn wrap_redirs(node: Node, redirs: Vec<RedirOp>) -> Node {
        let mut node = node;
        for redir in redirs {
            node = Node::Redir { redir, cmd: Box::new(node) };
        }
        node
    }

    /// Trailing redirections after a compound command.
    fn parse_trailing_redirs(&mut self, node: Node) -> Result<Node, ParseError> {
        let mut redirs = Vec::new();
        while self.at_redir() {
            redirs.push(self.parse_redir()?);
        }
        Ok(Self::wrap_redirs(node, redirs))
    }

    fn parse_brace(&mut self) -> Result<Node, ParseError> {
        self.expect(&TokKind::LBrace, "`{'")?;
        let body = self.parse_body(&TokKind::RBrace)?;
        self.expect(&TokKind::RBrace, "`}'")?;
        Ok(Node::Brace(Box::new(body)))
    }

    fn parse_paren_body(&mut self) -> Result<Node, ParseError> {
        self.expect(&TokKind::LParen, "`('")?;
        let body = self.parse_body(&TokKind::RParen)?;
        self.expect(&TokKind::RParen, "`)'")?;
        Ok(body)
    }

    fn parse_command(&mut self) -> Result<Node, ParseError> {
        if self.at_keyword("if") {
            self.bump();
            if self.at_keyword("not") {
                self.bump();
                let body = self.parse_command()?;
                return Ok(Node::IfNot(Box::new(body)));
            }
            let cond = self.parse_paren_body()?;
            let body = self.parse_command()?;
            return Ok(Node::If { cond: Box::new(cond), body: Box::new(body) });
        }
        if self.at_keyword("while") {
            self.bump();
            let cond = self.parse_paren_body()?;
            let body = self.parse_command()?;
            return Ok(Node::While { cond: Box::new(cond), body: Box::new(body) });
        }
        if self.at_keyword("for") {
            self.bump();
            self.expect(&TokKind::LParen, "`('")?;
            let var = match self.kind().clone() {
                TokKind::Word { text, .. } => {
                    self.bump();
                    text
                }
                _ => return self.unexpected(),
            };
            let words = if self.at_keyword("in") {
                self.bump();
                let mut words = Vec::new();
                while self.at_word_start() {
                    words.push(self.parse_word_expr()?);
                }
                Some(words)
            } else {
                None
            };
            self.expect(&TokKind::RParen, "`)'")?;
            let body = self.parse_command()?;
            return Ok(Node::For { var, words, body: Box::new(body) });
        }
        if self.at_keyword("~") {
            self.bump();
            let subject = if self.at_word_start() {
                Some(Box::new(self.parse_word_expr()?))
            } else {
                None
            };
            let mut patterns = Vec::new();
            while self.at_word_start() {
                patterns.push(self.parse_word_expr()?);
            }
            return Ok(Node::Match { subject, patterns });
        }
        if self.at_keyword("fn") {
            self.bump();
            let name = match self.kind().clone() {
                TokKind::Word { text, .. } => {
                    self.bump();
                    text
                }
                _ => return self.unexpected(),
            };
            if matches!(self.kind(), TokKind::LBrace) {
                let body = self.parse_brace()?;
                return Ok(Node::FnDef { name, body: Some(Box::new(body)) });
            }
            return Ok(Node::FnDef { name, body: None });
        }
        if matches!(self.kind(), TokKind::LBrace) {
            let node = self.parse_brace()?;
            return self.parse_trailing_redirs(node);
        }
        self.parse_simple()
    }

    fn parse_simple(&mut self) -> Result<Node, ParseError> {
        let mut words: Vec<Node> = Vec::new();
        let mut redirs: Vec<RedirOp> = Vec::new();
        loop {
            if self.at_redir() {
                redirs.push(self.parse_redir()?);
            } else if self.at_word_start() {
                let word = self.parse_word_expr()?;
                // A leading name=value peels off as an assignment scoped
                // to whatever command follows on the line.
                if words.is_empty() {
                    if let Some((name, value)) = Self::split_assignment(&word) {
                        if self.at_separator()
                            || matches!(
                                self.kind(),
                                TokKind::Eof | TokKind::RBrace | TokKind::RParen
                            )
                        {
                            return Ok(Self::wrap_redirs(Node::Assign { name, value }, redirs));
                        }
                        let cmd = self.parse_command()?;
                        return Ok(Self::wrap_redirs(
                            Node::Local { name, value, cmd: Box::new(cmd) },
                            redirs,
                        ));
                    }
                }
                words.push(word);
            } else {
                break;
            }
        }
        if words.is_empty() && redirs.is_empty() {
            return self.unexpected();
        }
        Ok(Self::wrap_redirs(Node::Simple(words), redirs))
    }

    // ---- command lists ----

    fn parse_pipeline(&mut self) -> Result<Node, ParseError> {
        let mut node = self.parse_command()?;
        while matches!(self.kind(), TokKind::Pipe) {
            self.bump();
            self.skip_newlines_only();
            let rhs = self.parse_command()?;
            node = Node::Pipe(Box::new(node), Box::new(rhs));
        }
        Ok(node)
    }

    fn skip_newlines_only(&mut self) {
        while matches!(self.kind(), TokKind::Newline) {
            self.bump();
        }
    }

    fn parse_andor(&mut self) -> Result<Node, ParseError> {
        let mut node = self.parse_pipeline()?;
        loop {
            match self.kind() {
                TokKind::AndAnd => {
                    self.bump();
                    self.skip_newlines_only();
                    let rhs = self.parse_pipeline()?;
                    node = Node::AndAnd(Box::new(node), Box::new(rhs));
                }
                TokKind::OrOr => {
                    self.bump();
                    self.skip_newlines_only();
                    let rhs = self.parse_pipeline()?;
                    node = Node::OrOr(Box::new(node), Box::new(rhs));
                }
                _ => break,
            }
        }
        Ok(node)
    }

    /// A command list terminated by `end` (or Eof). Statements separated
    /// by `;`/newline build a Seq tree; `&` marks the statement before it
    /// as background.
    fn parse_body(&mut self, end: &TokKind) -> Result<Node, ParseError> {
        let mut acc: Option<Node> = None;
        loop {
            self.skip_separators();
            if self.kind() == end || matches!(self.kind(), TokKind::Eof) {
                break;
            }
            let mut stmt = self.parse_andor()?;
            if matches!(self.kind(), TokKind::Amp) {
                self.bump();
                stmt = Node::Bg(Box::new(stmt));
            }
            acc = Some(match acc {
                None => stmt,
                Some(prev) => Node::Seq(Box::new(prev), Box::new(stmt)),
            });
        }
        Ok(acc.unwrap_or(Node::Simple(Vec::new())))
    }
}

/// Parse a whole input into a list of top-level statements.
pub fn parse(src: &str) -> Result<Vec<Node>, ParseError> {
    let toks = lex(src)?;
    let mut parser = Parser { toks, pos: 0 };
    let mut nodes = Vec::new();
    loop {
        parser.skip_separators();
        if matches!(parser.kind(), TokKind::Eof) {
            break;
        }
        let stmt = parser.parse_andor()?;
        if matches!(parser.kind(), TokKind::Amp) {
            // `&` both marks the statement and separates it from the next.
            parser.bump();
            nodes.push(Node::Bg(Box::new(stmt)));
            continue;
        }
        if !parser.at_separator() && !matches!(parser.kind(), TokKind::Eof) {
            return parser.unexpected();
        }
        nodes.push(stmt);
    }
    Ok(nodes)
}
