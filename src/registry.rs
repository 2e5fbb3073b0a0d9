// Copyright 2024 The ChromiumOS Authors
// Use of this source code is governed by a BSD-style license that can be
// found in the LICENSE file.

use std::collections::BTreeMap;

use log::warn;

type Creator<A, T> = Box<dyn Fn(A) -> T + Send + Sync>;

/// Maps keys to constructors. Built once at startup and passed to whoever creates objects.
pub struct CodecRegistry<K, A, T> {
    creators: BTreeMap<K, Creator<A, T>>,
}

impl<K: Ord + std::fmt::Debug, A, T> CodecRegistry<K, A, T> {
    pub fn new() -> Self {
        CodecRegistry {
            creators: BTreeMap::new(),
        }
    }

    /// Registers `creator` under `key`. A key that is already taken keeps its first creator and
    /// `false` is returned.
    pub fn register<F>(&mut self, key: K, creator: F) -> bool
    where
        F: Fn(A) -> T + Send + Sync + 'static,
    {
        if self.creators.contains_key(&key) {
            warn!("{:?} is already registered", key);
            return false;
        }
        self.creators.insert(key, Box::new(creator));
        true
    }

    /// Builds the object registered under `key`.
    pub fn create(&self, key: &K, arg: A) -> Option<T> {
        self.creators.get(key).map(|creator| creator(arg))
    }

    pub fn is_registered(&self, key: &K) -> bool {
        self.creators.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &K> {
        self.creators.keys()
    }
}

impl<K: Ord + std::fmt::Debug, A, T> Default for CodecRegistry<K, A, T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_key_keeps_first() {
        let mut registry: CodecRegistry<&str, u32, u32> = CodecRegistry::new();
        assert!(registry.register("double", |x| x * 2));
        assert!(!registry.register("double", |x| x * 3));
        assert!(registry.register("inc", |x| x + 1));

        assert_eq!(registry.create(&"double", 5), Some(10));
        assert_eq!(registry.create(&"inc", 5), Some(6));
        assert_eq!(registry.create(&"missing", 5), None);
        assert!(registry.is_registered(&"inc"));
        assert_eq!(registry.keys().copied().collect::<Vec<_>>(), vec!["double", "inc"]);
    }
}
