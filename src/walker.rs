//! Key-driven traversal of a configuration tree
//!
//! Artifact lists (`images`, `scripts`, `files`) may sit at any depth of
//! the `software` tree, e.g. under a board name and a boot-copy selector.
//! Traversal therefore matches on the key name rather than a fixed schema.
//!
//! Semantics, for every group visited:
//! 1. if the group has a list or array under the key, its elements are
//!    produced in order;
//! 2. then every value of the group is visited in order, recursing into
//!    groups only. Lists are not descended into.

use std::slice;

use swu_libconfig::{Setting, Value};

/// Lazily find all list elements stored under `key`, depth-first in
/// document order.
pub fn find_by_key<'a>(key: &'a str, root: &'a Value) -> KeyMatches<'a> {
    let mut matches = KeyMatches {
        key,
        pending: None,
        stack: Vec::new(),
    };
    matches.enter(root);
    matches
}

/// Iterator returned by [`find_by_key`]
pub struct KeyMatches<'a> {
    key: &'a str,
    /// Elements of the most recently entered group's matching list
    pending: Option<slice::Iter<'a, Value>>,
    /// Settings still to visit, innermost group last
    stack: Vec<slice::Iter<'a, Setting>>,
}

impl<'a> KeyMatches<'a> {
    fn enter(&mut self, value: &'a Value) {
        if let Value::Group(group) = value {
            self.pending = group.get(self.key).and_then(Value::as_items).map(<[Value]>::iter);
            self.stack.push(group.iter());
        }
    }
}

impl<'a> Iterator for KeyMatches<'a> {
    type Item = &'a Value;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(pending) = self.pending.as_mut() {
                if let Some(item) = pending.next() {
                    return Some(item);
                }
                self.pending = None;
            }

            let settings = self.stack.last_mut()?;
            match settings.next() {
                Some(setting) => self.enter(&setting.value),
                None => {
                    self.stack.pop();
                }
            }
        }
    }
}

/// Visit every list element stored under `key` with exclusive access, in
/// the same order as [`find_by_key`]. Stops at the first error.
pub fn try_for_each_by_key_mut<E, F>(key: &str, root: &mut Value, visit: &mut F) -> Result<(), E>
where
    F: FnMut(&mut Value) -> Result<(), E>,
{
    let group = match root {
        Value::Group(group) => group,
        _ => return Ok(()),
    };

    if let Some(items) = group.get_mut(key).and_then(Value::as_items_mut) {
        for item in items.iter_mut() {
            visit(item)?;
        }
    }

    for setting in group.iter_mut() {
        try_for_each_by_key_mut(key, &mut setting.value, visit)?;
    }
    Ok(())
}
