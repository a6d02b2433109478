//! Exported Environment
//!
//! Builds the sorted `NAME=value` vector handed to external commands and
//! installs the inherited environment at startup. Variable names that are
//! not valid POSIX identifiers are hex-escaped as `__XX` on export and
//! unescaped on import. Inherited entries that are neither a variable nor
//! a function are retained verbatim ("bozo" strings) and re-exported
//! unchanged. List values travel joined by an 0x01 separator.

use std::collections::HashSet;

use crate::parser;
use crate::signals;
use crate::tables::funcs::FnTable;
use crate::tables::vars::VarTable;

/// Separator between the elements of an exported list value.
pub const LIST_SEP: char = '\u{1}';

fn is_name_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_'
}

fn is_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Hex-escape a variable name for the environment. Safe identifiers pass
/// through untouched.
pub fn escape_name(name: &str) -> String {
    let safe = !name.is_empty()
        && name.chars().next().map(is_name_start).unwrap_or(false)
        && name.chars().all(is_name_char);
    if safe {
        return name.to_string();
    }
    let mut out = String::with_capacity(name.len());
    for (i, c) in name.chars().enumerate() {
        let ok = if i == 0 { is_name_start(c) } else { is_name_char(c) };
        if ok {
            out.push(c);
        } else {
            let mut buf = [0u8; 4];
            for b in c.encode_utf8(&mut buf).as_bytes() {
                out.push_str(&format!("__{:02x}", b));
            }
        }
    }
    out
}

/// Reverse of `escape_name`. A `__` not followed by two hex digits is
/// kept literally.
pub fn unescape_name(name: &str) -> String {
    let bytes = name.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if i + 4 <= bytes.len()
            && bytes[i] == b'_'
            && bytes[i + 1] == b'_'
            && bytes[i + 2].is_ascii_hexdigit()
            && bytes[i + 3].is_ascii_hexdigit()
        {
            let s = std::str::from_utf8(&bytes[i + 2..i + 4]).unwrap();
            out.push(u8::from_str_radix(s, 16).unwrap());
            i += 4;
            continue;
        }
        out.push(bytes[i]);
        i += 1;
    }
    String::from_utf8_lossy(&out).into_owned()
}

pub struct Environ {
    /// Inherited entries that fit neither table; passed through verbatim.
    bozo: Vec<String>,
    /// Sorted exported vector, valid until the next table mutation.
    cache: Option<Vec<String>>,
    /// Names given a default at startup; kept out of the environment
    /// until the user assigns them.
    defaulted: HashSet<String>,
}

impl Environ {
    pub fn new() -> Self {
        Self { bozo: Vec::new(), cache: None, defaulted: HashSet::new() }
    }

    pub fn mark_defaulted(&mut self, name: &str) {
        self.defaulted.insert(name.to_string());
    }

    /// The user assigned this name; it becomes exportable.
    pub fn clear_defaulted(&mut self, name: &str) {
        self.defaulted.remove(name);
    }

    /// Install the inherited environment. `fn_` entries are reparsed into
    /// functions unless `import_fns` is off; `NAME=VALUE` entries become
    /// variables; the rest are retained as bozo strings.
    pub fn init_env(
        &mut self,
        envp: &[String],
        import_fns: bool,
        vars: &mut VarTable,
        funcs: &mut FnTable,
    ) {
        for entry in envp {
            let Some(eq) = entry.find('=') else {
                self.bozo.push(entry.clone());
                continue;
            };
            let rawname = &entry[..eq];
            let value = &entry[eq + 1..];
            if import_fns {
                if let Some(fname) = rawname.strip_prefix("fn_") {
                    if let Some(body) = parse_fn_body(value) {
                        funcs.define(&unescape_name(fname), body);
                        continue;
                    }
                }
            }
            let name = unescape_name(rawname);
            if name.is_empty() {
                self.bozo.push(entry.clone());
                continue;
            }
            let values: Vec<String> = value.split(LIST_SEP).map(String::from).collect();
            vars.set(&name, values, false);
        }
    }

    /// The sorted exported vector. Rebuilt only when a table has been
    /// touched since the last call.
    pub fn make_env(&mut self, vars: &mut VarTable, funcs: &mut FnTable) -> &[String] {
        if self.cache.is_some() && !vars.is_dirty() && !funcs.is_dirty() {
            return self.cache.as_deref().unwrap();
        }
        let noexport: HashSet<String> = vars
            .get("noexport")
            .map(|v| v.iter().cloned().collect())
            .unwrap_or_default();
        let mut out: Vec<String> = Vec::new();
        for name in vars.names() {
            if noexport.contains(&name) || self.defaulted.contains(&name) {
                continue;
            }
            let entry = vars.entry_mut(&name).unwrap();
            if entry.exported.is_none() {
                let values = entry.values.as_ref().unwrap();
                let mut joined = String::new();
                for (i, v) in values.iter().enumerate() {
                    if i > 0 {
                        joined.push(LIST_SEP);
                    }
                    joined.push_str(v);
                }
                entry.exported = Some(format!("{}={}", escape_name(&name), joined));
            }
            out.push(entry.exported.clone().unwrap());
        }
        for name in funcs.names() {
            if signals::is_signal_fn_name(&name) {
                continue;
            }
            if let Some(form) = funcs.exported_form(&name) {
                out.push(form);
            }
        }
        out.extend(self.bozo.iter().cloned());
        out.sort();
        vars.clear_dirty();
        funcs.clear_dirty();
        self.cache = Some(out);
        self.cache.as_deref().unwrap()
    }
}

impl Default for Environ {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse an exported function value, which must be a single brace block.
fn parse_fn_body(value: &str) -> Option<crate::ast::Node> {
    let mut nodes = parser::parse(value).ok()?;
    if nodes.len() != 1 {
        return None;
    }
    let node = nodes.pop().unwrap();
    match node {
        crate::ast::Node::Brace(_) => Some(node),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::Node;

    fn list(words: &[&str]) -> Vec<String> {
        words.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_escape_plain_names() {
        assert_eq!(escape_name("PATH"), "PATH");
        assert_eq!(escape_name("foo_bar2"), "foo_bar2");
    }

    #[test]
    fn test_escape_odd_names() {
        assert_eq!(escape_name("*"), "__2a");
        assert_eq!(escape_name("a-b"), "a__2db");
        assert_eq!(escape_name("2day"), "__32day");
    }

    #[test]
    fn test_unescape_round_trip() {
        for name in ["PATH", "*", "a-b", "2day", "x.y:z"] {
            assert_eq!(unescape_name(&escape_name(name)), name);
        }
    }

    #[test]
    fn test_unescape_leaves_stray_underscores() {
        assert_eq!(unescape_name("a__zz"), "a__zz");
        assert_eq!(unescape_name("a_b"), "a_b");
    }

    #[test]
    fn test_make_env_sorted_and_joined() {
        let mut vars = VarTable::new();
        let mut funcs = FnTable::new();
        let mut environ = Environ::new();
        vars.set("b", list(&["2"]), false);
        vars.set("a", list(&["x", "y"]), false);
        let env = environ.make_env(&mut vars, &mut funcs);
        assert_eq!(env, &["a=x\u{1}y".to_string(), "b=2".to_string()]);
    }

    #[test]
    fn test_make_env_cache_until_dirty() {
        let mut vars = VarTable::new();
        let mut funcs = FnTable::new();
        let mut environ = Environ::new();
        vars.set("a", list(&["1"]), false);
        let first = environ.make_env(&mut vars, &mut funcs).to_vec();
        let again = environ.make_env(&mut vars, &mut funcs).to_vec();
        assert_eq!(first, again);
        vars.set("b", list(&["2"]), false);
        let rebuilt = environ.make_env(&mut vars, &mut funcs).to_vec();
        assert_eq!(rebuilt.len(), 2);
    }

    #[test]
    fn test_make_env_exclusions() {
        let mut vars = VarTable::new();
        let mut funcs = FnTable::new();
        let mut environ = Environ::new();
        environ.mark_defaulted("prompt");
        vars.set("prompt", list(&["; "]), false);
        vars.set("secret", list(&["s"]), false);
        vars.set("noexport", list(&["secret", "noexport"]), false);
        vars.set("ok", list(&["1"]), false);
        let env = environ.make_env(&mut vars, &mut funcs);
        assert_eq!(env, &["ok=1".to_string()]);
    }

    #[test]
    fn test_make_env_skips_signal_functions() {
        let mut vars = VarTable::new();
        let mut funcs = FnTable::new();
        let mut environ = Environ::new();
        let body = Node::Brace(Box::new(Node::Simple(vec![Node::word("echo")])));
        funcs.define("sigint", body.clone());
        funcs.define("sigexit", body.clone());
        funcs.define("greet", body);
        let env = environ.make_env(&mut vars, &mut funcs);
        assert_eq!(env, &["fn_greet={echo}".to_string()]);
    }

    #[test]
    fn test_init_env_variables_and_bozo() {
        let mut vars = VarTable::new();
        let mut funcs = FnTable::new();
        let mut environ = Environ::new();
        let envp = vec![
            "HOME=/home/me".to_string(),
            "x=a\u{1}b".to_string(),
            "notanentry".to_string(),
        ];
        environ.init_env(&envp, true, &mut vars, &mut funcs);
        assert_eq!(vars.get("HOME"), Some(&list(&["/home/me"])[..]));
        assert_eq!(vars.get("x"), Some(&list(&["a", "b"])[..]));
        // The bozo string survives into the next export.
        let env = environ.make_env(&mut vars, &mut funcs).to_vec();
        assert!(env.contains(&"notanentry".to_string()));
    }

    #[test]
    fn test_init_env_imports_functions() {
        let mut vars = VarTable::new();
        let mut funcs = FnTable::new();
        let mut environ = Environ::new();
        let envp = vec!["fn_greet={echo hi}".to_string()];
        environ.init_env(&envp, true, &mut vars, &mut funcs);
        assert!(funcs.contains("greet"));
        assert!(!vars.contains("fn_greet"));
    }

    #[test]
    fn test_init_env_honors_no_import() {
        let mut vars = VarTable::new();
        let mut funcs = FnTable::new();
        let mut environ = Environ::new();
        let envp = vec!["fn_greet={echo hi}".to_string()];
        environ.init_env(&envp, false, &mut vars, &mut funcs);
        assert!(!funcs.contains("greet"));
        assert!(vars.contains("fn_greet"));
    }

    #[test]
    fn test_function_export_round_trip() {
        let mut vars = VarTable::new();
        let mut funcs = FnTable::new();
        let mut environ = Environ::new();
        let envp = vec!["fn_greet={echo hi;echo bye}".to_string()];
        environ.init_env(&envp, true, &mut vars, &mut funcs);
        let exported = funcs.exported_form("greet").unwrap();
        assert_eq!(exported, "fn_greet={echo hi;echo bye}");
    }
}
