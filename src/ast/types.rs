//! Parse Tree Types
//!
//! Node definitions for the command language, plus the canonical textual
//! form used when a function is exported into the environment. The
//! Display output must reparse to an equivalent tree: exporting a
//! function, importing it in a child shell, and exporting again has to
//! reproduce the same bytes.

use std::fmt;

/// A staged redirection. File redirections carry an unexpanded target
/// word; dup and close forms are pure fd arithmetic.
#[derive(Debug, Clone, PartialEq)]
pub enum RedirOp {
    In { fd: i32, target: Box<Node> },
    Out { fd: i32, target: Box<Node> },
    Append { fd: i32, target: Box<Node> },
    Dup { fd: i32, from: i32 },
    Close { fd: i32 },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    /// A literal word. `quoted` records that the word was single-quoted,
    /// which keeps it out of pattern matching.
    Word { text: String, quoted: bool },
    /// `$name` (the name itself is a word tree).
    Var(Box<Node>),
    /// `$#name`
    VarCount(Box<Node>),
    /// `$name(i j n-m ...)`
    VarSub { name: Box<Node>, indices: Vec<Node> },
    /// `` `{command} ``
    Backquote(Box<Node>),
    /// `left^right`
    Concat(Box<Node>, Box<Node>),
    /// `(a b c)` in word position
    List(Vec<Node>),
    /// One command: argv words. May be empty (bare redirection).
    Simple(Vec<Node>),
    /// A command under one redirection; nesting stacks them.
    Redir { redir: RedirOp, cmd: Box<Node> },
    Pipe(Box<Node>, Box<Node>),
    Seq(Box<Node>, Box<Node>),
    AndAnd(Box<Node>, Box<Node>),
    OrOr(Box<Node>, Box<Node>),
    /// `command &`
    Bg(Box<Node>),
    /// `{ commands }`
    Brace(Box<Node>),
    If { cond: Box<Node>, body: Box<Node> },
    /// `if not command`, run when the preceding `if` condition failed.
    IfNot(Box<Node>),
    While { cond: Box<Node>, body: Box<Node> },
    /// `for (x in words) body`; without `in`, iterates `$*`.
    For { var: String, words: Option<Vec<Node>>, body: Box<Node> },
    /// `~ subject patterns...`: true when any pattern matches any
    /// element of the subject. Kept as a node so the subject list stays
    /// separate from the patterns after expansion.
    Match { subject: Option<Box<Node>>, patterns: Vec<Node> },
    /// `fn name { body }`; a bodyless `fn name` deletes the function.
    FnDef { name: String, body: Option<Box<Node>> },
    Assign { name: String, value: Vec<Node> },
    /// `x=v command`: the assignment is stacked for the command's extent.
    Local { name: String, value: Vec<Node>, cmd: Box<Node> },
}

impl Node {
    pub fn word(text: &str) -> Node {
        Node::Word { text: text.to_string(), quoted: false }
    }

    pub fn quoted_word(text: &str) -> Node {
        Node::Word { text: text.to_string(), quoted: true }
    }
}

/// Characters that survive unquoted in the canonical form: everything
/// the lexer would read back as part of a bare word.
fn is_plain_char(c: char) -> bool {
    !matches!(
        c,
        ' ' | '\t' | '\n' | '#' | ';' | '&' | '|' | '^' | '$' | '`' | '\'' | '{' | '}' | '('
            | ')' | '<' | '>'
    ) && !c.is_control()
}

/// Quote a word for the canonical form. Plain words pass through; anything
/// else is single-quoted with embedded quotes doubled.
pub fn quote_word(text: &str) -> String {
    if !text.is_empty() && text.chars().all(is_plain_char) {
        return text.to_string();
    }
    let mut out = String::with_capacity(text.len() + 2);
    out.push('\'');
    for c in text.chars() {
        if c == '\'' {
            out.push('\'');
        }
        out.push(c);
    }
    out.push('\'');
    out
}

fn fmt_value(value: &[Node], f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if value.len() == 1 {
        write!(f, "{}", value[0])
    } else {
        write!(f, "(")?;
        for (i, v) in value.iter().enumerate() {
            if i > 0 {
                write!(f, " ")?;
            }
            write!(f, "{}", v)?;
        }
        write!(f, ")")
    }
}

impl fmt::Display for RedirOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RedirOp::In { fd, target } => {
                if *fd == 0 {
                    write!(f, "<{}", target)
                } else {
                    write!(f, "<[{}]{}", fd, target)
                }
            }
            RedirOp::Out { fd, target } => {
                if *fd == 1 {
                    write!(f, ">{}", target)
                } else {
                    write!(f, ">[{}]{}", fd, target)
                }
            }
            RedirOp::Append { fd, target } => {
                if *fd == 1 {
                    write!(f, ">>{}", target)
                } else {
                    write!(f, ">>[{}]{}", fd, target)
                }
            }
            RedirOp::Dup { fd, from } => write!(f, ">[{}={}]", fd, from),
            RedirOp::Close { fd } => write!(f, ">[{}=]", fd),
        }
    }
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Word { text, quoted } => {
                if *quoted {
                    let mut out = String::with_capacity(text.len() + 2);
                    out.push('\'');
                    for c in text.chars() {
                        if c == '\'' {
                            out.push('\'');
                        }
                        out.push(c);
                    }
                    out.push('\'');
                    write!(f, "{}", out)
                } else {
                    write!(f, "{}", quote_word(text))
                }
            }
            Node::Var(name) => write!(f, "${}", name),
            Node::VarCount(name) => write!(f, "$#{}", name),
            Node::VarSub { name, indices } => {
                write!(f, "${}(", name)?;
                for (i, idx) in indices.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", idx)?;
                }
                write!(f, ")")
            }
            Node::Backquote(cmd) => write!(f, "`{{{}}}", cmd),
            Node::Concat(l, r) => write!(f, "{}^{}", l, r),
            Node::List(words) => {
                write!(f, "(")?;
                for (i, w) in words.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", w)?;
                }
                write!(f, ")")
            }
            Node::Simple(words) => {
                for (i, w) in words.iter().enumerate() {
                    if i > 0 {
                        write!(f, " ")?;
                    }
                    write!(f, "{}", w)?;
                }
                Ok(())
            }
            Node::Redir { redir, cmd } => {
                if matches!(**cmd, Node::Simple(ref words) if words.is_empty()) {
                    write!(f, "{}", redir)
                } else {
                    write!(f, "{} {}", cmd, redir)
                }
            }
            Node::Pipe(l, r) => write!(f, "{}|{}", l, r),
            Node::Seq(l, r) => write!(f, "{};{}", l, r),
            Node::AndAnd(l, r) => write!(f, "{}&&{}", l, r),
            Node::OrOr(l, r) => write!(f, "{}||{}", l, r),
            Node::Bg(cmd) => write!(f, "{}&", cmd),
            Node::Brace(body) => write!(f, "{{{}}}", body),
            Node::If { cond, body } => write!(f, "if({}){}", cond, body),
            Node::IfNot(body) => write!(f, "if not {}", body),
            Node::While { cond, body } => write!(f, "while({}){}", cond, body),
            Node::For { var, words, body } => {
                write!(f, "for({}", var)?;
                if let Some(words) = words {
                    write!(f, " in")?;
                    for w in words {
                        write!(f, " {}", w)?;
                    }
                }
                write!(f, "){}", body)
            }
            Node::Match { subject, patterns } => {
                write!(f, "~")?;
                if let Some(subject) = subject {
                    write!(f, " {}", subject)?;
                }
                for p in patterns {
                    write!(f, " {}", p)?;
                }
                Ok(())
            }
            Node::FnDef { name, body } => match body {
                Some(body) => write!(f, "fn {} {}", quote_word(name), body),
                None => write!(f, "fn {}", quote_word(name)),
            },
            Node::Assign { name, value } => {
                write!(f, "{}=", quote_word(name))?;
                fmt_value(value, f)
            }
            Node::Local { name, value, cmd } => {
                write!(f, "{}=", quote_word(name))?;
                fmt_value(value, f)?;
                write!(f, " {}", cmd)
            }
        }
    }
}
