//! External symbol table: `name -> dense id` and back.
//!
//! Two independent instances are expected to exist per document class — one
//! for variable names, one for pattern/result names (§6). Neither is part of
//! the core matching algorithm; it is consumed through the opaque `u32`
//! handles the compiler and state machine pass around.

use rustc_hash::FxHashMap;

/// `get_or_create`/`name_of` dense name interner.
///
/// Grounded in `original_source/src/symbolTable.hpp`'s `SymbolTable`, minus
/// its hand-rolled key-block arena and CRC32 hash: those are a micro
/// optimisation orthogonal to the matching engine, so a `Vec<String>` plus a
/// `FxHashMap` stands in for them here.
#[derive(Debug)]
pub struct SymbolTable {
    /// Index 0 is a reserved placeholder: `VariableId`/pattern-name ids of
    /// `0` mean "unbound" everywhere in the compiler and state machine, so
    /// real names are never allocated id `0`.
    names: Vec<String>,
    ids: FxHashMap<String, u32>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        SymbolTable { names: vec![String::new()], ids: FxHashMap::default() }
    }
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the existing id for `name`, or allocates a new one. Never
    /// returns `0`.
    pub fn get_or_create(&mut self, name: &str) -> u32 {
        if let Some(&id) = self.ids.get(name) {
            return id;
        }
        let id = self.names.len() as u32;
        self.names.push(name.to_string());
        self.ids.insert(name.to_string(), id);
        id
    }

    /// Looks up an existing id without creating one.
    pub fn get(&self, name: &str) -> Option<u32> {
        self.ids.get(name).copied()
    }

    /// Resolves an id back to its name. `name_of(0)` always returns `None`.
    pub fn name_of(&self, id: u32) -> Option<&str> {
        if id == 0 {
            return None;
        }
        self.names.get(id as usize).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interns_and_resolves_names() {
        let mut table = SymbolTable::new();
        let a = table.get_or_create("alpha");
        let b = table.get_or_create("beta");
        let a2 = table.get_or_create("alpha");
        assert_eq!(a, a2);
        assert_ne!(a, b);
        assert_eq!(table.name_of(a), Some("alpha"));
        assert_eq!(table.name_of(b), Some("beta"));
        assert_eq!(table.get("gamma"), None);
    }
}
