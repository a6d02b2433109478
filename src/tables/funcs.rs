//! Function Table
//!
//! Shell functions keep both a parsed body and a lazily built exported
//! string form (`fn_name={body}`). Functions do not stack: redefinition
//! frees the previous body.

use crate::ast::Node;
use crate::tables::env::escape_name;
use crate::tables::hash::HashTable;

pub struct FnEntry {
    /// Parsed body, a brace block.
    pub def: Node,
    /// Cached exported form.
    pub exported: Option<String>,
}

pub struct FnTable {
    table: HashTable<FnEntry>,
    dirty: bool,
}

impl FnTable {
    pub fn new() -> Self {
        Self { table: HashTable::new(), dirty: true }
    }

    pub fn define(&mut self, name: &str, body: Node) {
        self.dirty = true;
        self.table.insert(name, FnEntry { def: body, exported: None });
    }

    pub fn delete(&mut self, name: &str) {
        self.dirty = true;
        self.table.delete(name);
    }

    pub fn get(&self, name: &str) -> Option<&Node> {
        self.table.get(name).map(|e| &e.def)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.table.contains(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.table.iter().map(|(n, _)| n.to_string()).collect()
    }

    /// The `fn_name={body}` environment string, built on first use and
    /// cached until the function is redefined.
    pub fn exported_form(&mut self, name: &str) -> Option<String> {
        let entry = self.table.get_mut(name)?;
        if entry.exported.is_none() {
            entry.exported = Some(format!("fn_{}={}", escape_name(name), entry.def));
        }
        entry.exported.clone()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }
}

impl Default for FnTable {
    fn default() -> Self {
        Self::new()
    }
}
