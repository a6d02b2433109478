//! Word Expansion
//!
//! Turns word trees into argument lists: variable dereference, counts,
//! subscript ranges, list flattening, concatenation distribution, and
//! backquote capture. `$status` reads the status vector; `$1`..`$n` index
//! the `*` list.

use crate::ast::Node;
use crate::interpreter::errors::{Result, ShellError};
use crate::interpreter::types::ShellState;
use crate::interpreter::walk;

/// Default field separators when `$ifs` is unset.
pub const DEFAULT_IFS: &str = " \t\n";

/// Expand a list of word trees into one flat argument list.
pub fn expand_words(shell: &mut ShellState, words: &[Node]) -> Result<Vec<String>> {
    let mut out = Vec::new();
    for word in words {
        out.extend(expand_word(shell, word)?);
    }
    Ok(out)
}

/// Expand one word tree. A word may produce any number of strings.
pub fn expand_word(shell: &mut ShellState, node: &Node) -> Result<Vec<String>> {
    match node {
        Node::Word { text, .. } => Ok(vec![text.clone()]),
        Node::List(items) => expand_words(shell, items),
        Node::Var(name) => {
            let name = expand_one(shell, name, "variable name")?;
            Ok(lookup_list(shell, &name))
        }
        Node::VarCount(name) => {
            let name = expand_one(shell, name, "variable name")?;
            Ok(vec![lookup_list(shell, &name).len().to_string()])
        }
        Node::VarSub { name, indices } => {
            let name = expand_one(shell, name, "variable name")?;
            let list = lookup_list(shell, &name);
            let picks = expand_words(shell, indices)?;
            let mut out = Vec::new();
            for pick in &picks {
                select_range(&list, pick, &mut out);
            }
            Ok(out)
        }
        Node::Concat(l, r) => {
            let left = expand_word(shell, l)?;
            let right = expand_word(shell, r)?;
            concat_lists(left, right)
        }
        Node::Backquote(body) => {
            let captured = walk::backquote(shell, body)?;
            Ok(split_ifs(shell, &captured))
        }
        other => Err(ShellError::Usage(format!(
            "cannot use `{}' as a word",
            other
        ))),
    }
}

/// Expand a word that must produce exactly one string (variable names,
/// redirection targets).
pub fn expand_one(shell: &mut ShellState, node: &Node, what: &str) -> Result<String> {
    let mut list = expand_word(shell, node)?;
    if list.len() != 1 {
        return Err(ShellError::Usage(format!("{} must be a single word", what)));
    }
    Ok(list.pop().unwrap())
}

/// The value of `$name`. `status` is computed from the status vector,
/// digits index the argument list, everything else reads the variable
/// table. Unset names expand to nothing.
pub fn lookup_list(shell: &ShellState, name: &str) -> Vec<String> {
    if name == "status" {
        return shell.status.strings();
    }
    if !name.is_empty() && name.chars().all(|c| c.is_ascii_digit()) && name != "0" {
        let n: usize = match name.parse() {
            Ok(n) => n,
            Err(_) => return Vec::new(),
        };
        let args = shell.vars.get("*").unwrap_or(&[]);
        return match args.get(n - 1) {
            Some(v) => vec![v.clone()],
            None => Vec::new(),
        };
    }
    shell.vars.get(name).map(|v| v.to_vec()).unwrap_or_default()
}

/// Apply one subscript word: `n`, `n-m`, `n-`, or `-m`, 1-based, with
/// out-of-range indices contributing nothing.
fn select_range(list: &[String], pick: &str, out: &mut Vec<String>) {
    let parse = |s: &str| -> Option<usize> {
        if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit()) {
            return None;
        }
        // Absurdly large indices saturate; they just select nothing.
        Some(
            s.parse::<u64>()
                .map(|n| usize::try_from(n).unwrap_or(usize::MAX))
                .unwrap_or(usize::MAX),
        )
    };
    let (lo, hi) = match pick.split_once('-') {
        None => match parse(pick) {
            Some(n) => (n, n),
            None => return,
        },
        Some((a, b)) => {
            let lo = if a.is_empty() { 1 } else { match parse(a) { Some(n) => n, None => return } };
            let hi = if b.is_empty() {
                list.len()
            } else {
                match parse(b) {
                    Some(n) => n,
                    None => return,
                }
            };
            (lo, hi)
        }
    };
    if lo == 0 {
        return;
    }
    let hi = hi.min(list.len());
    for i in lo..=hi {
        if let Some(v) = list.get(i - 1) {
            out.push(v.clone());
        }
    }
}

/// List concatenation: equal lengths join pairwise, a singleton
/// distributes over the other side, anything else is an error.
fn concat_lists(left: Vec<String>, right: Vec<String>) -> Result<Vec<String>> {
    if left.len() == right.len() {
        return Ok(left
            .into_iter()
            .zip(right)
            .map(|(l, r)| format!("{}{}", l, r))
            .collect());
    }
    if left.len() == 1 {
        let l = &left[0];
        return Ok(right.into_iter().map(|r| format!("{}{}", l, r)).collect());
    }
    if right.len() == 1 {
        let r = &right[0];
        return Ok(left.into_iter().map(|l| format!("{}{}", l, r)).collect());
    }
    Err(ShellError::Usage("bad concatenation".to_string()))
}

/// Split backquote output on the `$ifs` characters, dropping empty
/// fields.
pub fn split_ifs(shell: &ShellState, text: &str) -> Vec<String> {
    let ifs = shell
        .vars
        .get("ifs")
        .map(|v| v.join(""))
        .unwrap_or_else(|| DEFAULT_IFS.to_string());
    if ifs.is_empty() {
        if text.is_empty() {
            return Vec::new();
        }
        return vec![text.to_string()];
    }
    text.split(|c| ifs.contains(c))
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}
