//! Identifier -> [`MacroDefinition`] map, bucketed by a one-byte hash
//! of the identifier the same way the original preprocessor does,
//! rather than reaching for `std::collections::HashMap`'s SipHash: the
//! bucket count is already a small, fixed, right-sized table for
//! identifier-length keys.

use std::rc::Rc;

use crate::error::PreprocessError;
use crate::macro_def::MacroDefinition;

const BUCKET_COUNT: usize = 256;

/// djb's xor hashing function, truncated to a byte — ported directly
/// from the original preprocessor's `hash_string_djbxor`.
#[must_use]
pub fn hash_string_djbxor(s: &str) -> u8 {
    let mut hash: u32 = 5381;
    for byte in s.bytes() {
        hash = (hash.wrapping_shl(5).wrapping_add(hash)) ^ u32::from(byte);
    }
    hash as u8
}

#[derive(Default)]
pub struct MacroTable {
    buckets: Vec<Vec<MacroDefinition>>,
}

impl MacroTable {
    #[must_use]
    pub fn new() -> Self {
        Self { buckets: (0..BUCKET_COUNT).map(|_| Vec::new()).collect() }
    }

    fn bucket(&self, name: &str) -> &Vec<MacroDefinition> {
        &self.buckets[hash_string_djbxor(name) as usize]
    }

    fn bucket_mut(&mut self, name: &str) -> &mut Vec<MacroDefinition> {
        &mut self.buckets[hash_string_djbxor(name) as usize]
    }

    /// Adds a new definition, failing with `"'<name>' already defined"`
    /// if a definition with this name already exists (redefinition is
    /// an error, not a silent replace).
    pub fn add(&mut self, def: MacroDefinition) -> Result<(), PreprocessError> {
        if self.contains(&def.name) {
            return Err(PreprocessError::already_defined(&def.name));
        }
        self.bucket_mut(&def.name).push(def);
        Ok(())
    }

    /// Inserts, overwriting any existing entry unconditionally. Used
    /// only for the builtin-release path (`#define __FILE__ ...`),
    /// where the caller has already decided a plain add would be wrong.
    pub fn force_insert(&mut self, def: MacroDefinition) {
        let bucket = self.bucket_mut(&def.name);
        bucket.retain(|existing| existing.name.as_ref() != def.name.as_ref());
        bucket.push(def);
    }

    /// Removes a definition; a miss is silently ignored.
    pub fn remove(&mut self, name: &str) {
        self.bucket_mut(name).retain(|def| def.name.as_ref() != name);
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.bucket(name).iter().any(|def| def.name.as_ref() == name)
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&MacroDefinition> {
        self.bucket(name).iter().find(|def| def.name.as_ref() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MacroDefinition> {
        self.buckets.iter().flatten()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;

    fn object_like(name: &str, body: &str) -> MacroDefinition {
        MacroDefinition {
            name: Rc::from(name),
            parameters: Vec::new(),
            paramcount: 0,
            is_variadic: false,
            definition: Rc::from(body),
            original: Rc::from(body),
            definition_location: None,
            is_builtin: false,
        }
    }

    #[test]
    fn add_then_get() {
        let mut table = MacroTable::new();
        table.add(object_like("PI", "3")).unwrap();
        assert_eq!(table.get("PI").unwrap().definition.as_ref(), "3");
    }

    #[test]
    fn duplicate_add_fails() {
        let mut table = MacroTable::new();
        table.add(object_like("PI", "3")).unwrap();
        let err = table.add(object_like("PI", "4")).unwrap_err();
        assert_eq!(err.message(), "'PI' already defined");
    }

    #[test]
    fn remove_is_a_noop_on_miss() {
        let mut table = MacroTable::new();
        table.remove("NOPE");
        assert!(!table.contains("NOPE"));
    }

    #[test]
    fn redefine_after_undef_succeeds() {
        let mut table = MacroTable::new();
        table.add(object_like("A", "X")).unwrap();
        table.remove("A");
        table.add(object_like("A", "X")).unwrap();
        assert_eq!(table.get("A").unwrap().definition.as_ref(), "X");
    }
}
