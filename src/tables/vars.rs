//! Variable Table
//!
//! Shell variables with lexical stacking. A local assignment (`x=v cmd`)
//! pushes a fresh entry in front of the old one; scope exit pops it. At
//! most one entry per name hangs off the table slot; shadowed entries are
//! reachable only through the `shadow` link.

use crate::tables::hash::HashTable;

pub struct VarEntry {
    /// None means the name exists but is currently unset (its value was
    /// cleared while a shadow below it is still alive).
    pub values: Option<Vec<String>>,
    /// Cached "NAME=value" exported form, rebuilt lazily on export.
    pub exported: Option<String>,
    pub shadow: Option<Box<VarEntry>>,
}

impl VarEntry {
    fn new(values: Option<Vec<String>>) -> Self {
        Self { values, exported: None, shadow: None }
    }
}

pub struct VarTable {
    table: HashTable<VarEntry>,
    /// Set on any mutation; consumed by the environment builder.
    dirty: bool,
}

impl VarTable {
    pub fn new() -> Self {
        Self { table: HashTable::new(), dirty: true }
    }

    /// Current value of a variable, if set.
    pub fn get(&self, name: &str) -> Option<&[String]> {
        self.table.get(name).and_then(|e| e.values.as_deref())
    }

    /// Assign. With `stack`, the new value shadows any existing entry
    /// until the matching `unset(name, true)`; without it, the top entry's
    /// value is overwritten in place.
    pub fn set(&mut self, name: &str, values: Vec<String>, stack: bool) {
        self.dirty = true;
        if stack {
            if let Some(top) = self.table.get_mut(name) {
                let old = std::mem::replace(top, VarEntry::new(Some(values)));
                top.shadow = Some(Box::new(old));
            } else {
                self.table.insert(name, VarEntry::new(Some(values)));
            }
        } else {
            let entry = self.table.get_or_insert_with(name, || VarEntry::new(None));
            entry.values = Some(values);
            entry.exported = None;
        }
    }

    /// Remove a binding. With `stack`, pops one shadowed entry back into
    /// place; without, the value is cleared but a live shadow chain keeps
    /// the entry occupied.
    pub fn unset(&mut self, name: &str, stack: bool) {
        self.dirty = true;
        let Some(top) = self.table.get_mut(name) else {
            return;
        };
        if let Some(shadow) = top.shadow.take() {
            if stack {
                *top = *shadow;
            } else {
                top.shadow = Some(shadow);
                top.values = None;
                top.exported = None;
            }
        } else {
            self.table.delete(name);
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Visible (top-of-stack) bindings that currently hold a value.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.table
            .iter()
            .filter_map(|(n, e)| e.values.as_deref().map(|v| (n, v)))
    }

    /// Access an entry for exported-form caching.
    pub fn entry_mut(&mut self, name: &str) -> Option<&mut VarEntry> {
        self.table.get_mut(name)
    }

    pub fn names(&self) -> Vec<String> {
        self.iter().map(|(n, _)| n.to_string()).collect()
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn clear_dirty(&mut self) {
        self.dirty = false;
    }
}

impl Default for VarTable {
    fn default() -> Self {
        Self::new()
    }
}
