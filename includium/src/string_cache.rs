//! Interns filenames and identifiers so callers may compare by pointer
//! identity rather than value, matching the contract that `__FILE__`
//! and cached argument/identifier text are stable for the life of a
//! session.

use std::collections::HashMap;
use std::rc::Rc;

#[derive(Debug, Default)]
pub struct StringCache {
    entries: HashMap<Box<str>, Rc<str>>,
}

impl StringCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the interned `Rc<str>` for `value`, reusing an existing
    /// entry on a duplicate insert.
    pub fn intern(&mut self, value: &str) -> Rc<str> {
        if let Some(existing) = self.entries.get(value) {
            return Rc::clone(existing);
        }
        let interned: Rc<str> = Rc::from(value);
        self.entries.insert(Box::from(value), Rc::clone(&interned));
        interned
    }

    /// Pointer-identity comparison for two interned strings, standing in
    /// for the original's pointer-equality contract.
    #[must_use]
    pub fn same(a: &Rc<str>, b: &Rc<str>) -> bool {
        Rc::ptr_eq(a, b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_insert_returns_same_allocation() {
        let mut cache = StringCache::new();
        let a = cache.intern("main.c");
        let b = cache.intern("main.c");
        assert!(StringCache::same(&a, &b));
    }

    #[test]
    fn distinct_values_are_distinct() {
        let mut cache = StringCache::new();
        let a = cache.intern("main.c");
        let b = cache.intern("other.c");
        assert!(!StringCache::same(&a, &b));
    }
}
